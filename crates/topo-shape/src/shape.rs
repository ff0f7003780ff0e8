use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use naming_types::{
    element_type, find_element_name, split_element, trace_name, IndexedName, NameHistory,
    ObjectTag, TopoKind,
};
use shape_kernel::{KernelShape, ShapeIntrospect, ShapeKernel, Transform};

use crate::element_map::ElementMap;
use crate::related_cache::{RelatedCache, RelatedElement};
use crate::ShapeError;

/// Kinds whose names a sub-shape carries over from its parent.
const SUB_ELEMENT_KINDS: [TopoKind; 3] = [TopoKind::Vertex, TopoKind::Edge, TopoKind::Face];

/// Kernel geometry plus its element map and owner tag.
#[derive(Debug, Clone, Default)]
pub struct TopoShape {
    geometry: Option<KernelShape>,
    element_map: Arc<ElementMap>,
    tag: ObjectTag,
    related: Arc<Mutex<RelatedCache>>,
}

impl TopoShape {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn new(geometry: KernelShape) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: ObjectTag) -> Self {
        self.tag = tag;
        self
    }

    pub(crate) fn from_parts(
        geometry: Option<KernelShape>,
        element_map: ElementMap,
        tag: ObjectTag,
    ) -> Self {
        Self {
            geometry,
            element_map: Arc::new(element_map),
            tag,
            related: Arc::default(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.geometry.is_none()
    }

    pub fn geometry(&self) -> Option<&KernelShape> {
        self.geometry.as_ref()
    }

    pub fn tag(&self) -> ObjectTag {
        self.tag
    }

    pub fn set_tag(&mut self, tag: ObjectTag) {
        self.tag = tag;
    }

    pub fn element_map(&self) -> &ElementMap {
        &self.element_map
    }

    /// Replace the element map. The handle gets a fresh related-element cache.
    pub fn set_element_map(&mut self, map: ElementMap) {
        self.element_map = Arc::new(map);
        self.related = Arc::default();
    }

    /// Mutable access to the map, cloning it if shared.
    pub(crate) fn element_map_mut(&mut self) -> &mut ElementMap {
        self.related = Arc::default();
        Arc::make_mut(&mut self.element_map)
    }

    // ── Transform ──

    pub fn transform(&self) -> Transform {
        self.geometry
            .as_ref()
            .map(|g| *g.location())
            .unwrap_or_else(Transform::identity)
    }

    /// Replace the location. Geometry and topology are untouched.
    pub fn set_transform(&mut self, matrix: Transform) {
        if let Some(geometry) = &self.geometry {
            self.geometry = Some(geometry.located(matrix));
        }
    }

    /// Apply `matrix` on top of the current location.
    ///
    /// With `copy` the transform is baked into new kernel geometry. Without
    /// `also_element_map` the element map is dropped.
    pub fn transform_shape(
        &mut self,
        kernel: &mut dyn ShapeKernel,
        matrix: &Transform,
        copy: bool,
        also_element_map: bool,
    ) -> Result<(), ShapeError> {
        let Some(geometry) = &self.geometry else {
            return Ok(());
        };
        let moved = if copy {
            kernel.transform_copy(geometry, matrix)?
        } else {
            geometry.moved(matrix)
        };
        self.geometry = Some(moved);
        if !also_element_map && !self.element_map.is_empty() {
            self.set_element_map(ElementMap::new());
        }
        Ok(())
    }

    // ── Element names ──

    /// Kind of the element addressed by `name`.
    pub fn element_type(name: &str) -> TopoKind {
        element_type(name)
    }

    /// Canonical name of the element addressed by `name`.
    ///
    /// Accepts canonical names, bare mapped names and `;mapped[.Canonical]`
    /// references. A mapped name unknown to this shape falls back to its
    /// canonical hint, if one was given.
    pub fn indexed_name(&self, name: &str) -> Option<IndexedName> {
        let (mapped, canonical) = split_element(name);
        if let Some(mapped) = mapped {
            if let Some(found) = self.element_map.indexed(mapped) {
                return Some(found);
            }
            debug!(mapped, "mapped name not found in element map");
        }
        canonical.and_then(IndexedName::parse)
    }

    /// Mapped name of `name`, or the canonical name when the element is
    /// unmapped.
    pub fn mapped_name(&self, name: &str) -> String {
        let (mapped, canonical) = split_element(name);
        if let Some(mapped) = mapped {
            return mapped.to_string();
        }
        let canonical = canonical.unwrap_or(name);
        IndexedName::parse(canonical)
            .and_then(|n| self.element_map.mapped(&n))
            .unwrap_or(canonical)
            .to_string()
    }

    /// Immediate history of `name` inside this shape.
    pub fn get_element_history(&self, name: &str) -> NameHistory {
        trace_name(&self.mapped_name(name))
    }

    // ── Sub-shapes ──

    pub fn count_sub_shapes(
        &self,
        kernel: &dyn ShapeIntrospect,
        kind: TopoKind,
    ) -> Result<usize, ShapeError> {
        match &self.geometry {
            Some(geometry) => Ok(kernel.count_sub_shapes(geometry, kind)?),
            None => Ok(0),
        }
    }

    pub fn shape_kind(&self, kernel: &dyn ShapeIntrospect) -> Result<TopoKind, ShapeError> {
        match &self.geometry {
            Some(geometry) => Ok(kernel.shape_kind(geometry)?),
            None => Ok(TopoKind::Shape),
        }
    }

    /// Sub-shape addressed by the element part of `path`.
    ///
    /// An empty element yields the whole shape. A name that does not resolve
    /// yields a null shape. The sub-shape keeps the owner tag. Its element of
    /// its own kind, and its vertices, edges and faces, keep the parent's
    /// mapped names under their new indices.
    pub fn get_sub_topo_shape(
        &self,
        kernel: &mut dyn ShapeKernel,
        path: &str,
    ) -> Result<TopoShape, ShapeError> {
        let element = find_element_name(path);
        if element.is_empty() {
            return Ok(self.clone());
        }
        let Some(geometry) = &self.geometry else {
            return Ok(TopoShape::null());
        };
        let Some(indexed) = self.indexed_name(element) else {
            debug!(element, "element does not resolve");
            return Ok(TopoShape::null());
        };
        let count = kernel.count_sub_shapes(geometry, indexed.kind)?;
        if indexed.index > count {
            debug!(%indexed, count, "element index out of range");
            return Ok(TopoShape::null());
        }
        let sub = kernel.sub_shape(geometry, indexed.kind, indexed.index)?;
        let mut map = ElementMap::new();
        if let Some(mapped) = self.element_map.mapped(&indexed) {
            map.set_element_name(IndexedName::new(indexed.kind, 1), mapped.to_string())?;
        }
        if !self.element_map.is_empty() {
            for kind in SUB_ELEMENT_KINDS.into_iter().filter(|&k| k < indexed.kind) {
                let pairs = kernel.sub_shape_indices(geometry, indexed.kind, indexed.index, kind)?;
                for (local, parent) in pairs {
                    if let Some(mapped) = self.element_map.mapped(&IndexedName::new(kind, parent)) {
                        map.set_element_name(IndexedName::new(kind, local), mapped.to_string())?;
                    }
                }
            }
        }
        Ok(TopoShape::from_parts(Some(sub), map, self.tag))
    }

    // ── Related-element cache ──

    /// Fast accessor: a class already computed for the element `name`.
    pub fn related_elements(&self, name: &str, same_type: bool) -> Option<Vec<RelatedElement>> {
        let mapped = self.mapped_name(name);
        self.related
            .lock()
            .by_element(&mapped, same_type)
            .map(<[RelatedElement]>::to_vec)
    }

    /// Class cached under the source identity `(source, tag, same_type)`.
    pub fn related_elements_cached(
        &self,
        source: &str,
        tag: ObjectTag,
        same_type: bool,
    ) -> Option<Vec<RelatedElement>> {
        self.related
            .lock()
            .by_source(source, tag, same_type)
            .map(<[RelatedElement]>::to_vec)
    }

    pub fn cache_related_elements(
        &self,
        source: &str,
        tag: ObjectTag,
        same_type: bool,
        elements: &[RelatedElement],
    ) {
        self.related.lock().insert(source, tag, same_type, elements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use naming_types::compose;
    use shape_kernel::{KernelCall, MockKernel, ShapeBuilder};

    fn unit_box(kernel: &mut MockKernel) -> TopoShape {
        let geometry = kernel
            .make_box(Point3::origin(), Vector3::new(1.0, 1.0, 1.0))
            .unwrap();
        TopoShape::new(geometry)
    }

    #[test]
    fn null_shape_has_identity_transform() {
        let shape = TopoShape::null();
        assert!(shape.is_null());
        assert_eq!(shape.transform(), Transform::identity());
    }

    #[test]
    fn set_transform_keeps_geometry() {
        let mut kernel = MockKernel::new();
        let mut shape = unit_box(&mut kernel);
        let id = shape.geometry().unwrap().id();
        let m = Transform::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        shape.set_transform(m);
        assert_eq!(shape.transform(), m);
        assert_eq!(shape.geometry().unwrap().id(), id);
    }

    #[test]
    fn copy_transform_makes_new_geometry() {
        let mut kernel = MockKernel::new();
        let mut shape = unit_box(&mut kernel);
        let id = shape.geometry().unwrap().id();
        let m = Transform::new_translation(&Vector3::new(5.0, 0.0, 0.0));
        shape.transform_shape(&mut kernel, &m, true, true).unwrap();
        assert_ne!(shape.geometry().unwrap().id(), id);
        assert_eq!(shape.transform(), Transform::identity());
        assert_eq!(kernel.call_count(KernelCall::TransformCopy), 1);
    }

    #[test]
    fn sub_shape_by_canonical_and_mapped_name() {
        let mut kernel = MockKernel::new();
        let mut shape = unit_box(&mut kernel).with_tag(4);
        let mapped = compose("Edge3", "MX", 2, TopoKind::Edge).unwrap();
        shape
            .element_map_mut()
            .set_element_name(IndexedName::new(TopoKind::Edge, 3), mapped.clone())
            .unwrap();

        let by_index = shape.get_sub_topo_shape(&mut kernel, "Edge3").unwrap();
        let by_name = shape
            .get_sub_topo_shape(&mut kernel, &format!("Body.;{mapped}.Edge9"))
            .unwrap();
        assert!(!by_index.is_null());
        // Every extraction stores fresh geometry, so compare what it covers.
        assert_eq!(
            kernel.bounding_box(by_index.geometry().unwrap()).unwrap(),
            kernel.bounding_box(by_name.geometry().unwrap()).unwrap()
        );
        assert_eq!(by_name.tag(), 4);
        assert_eq!(by_name.mapped_name("Edge1"), mapped);
        assert_eq!(by_index.mapped_name("Edge1"), mapped);
    }

    #[test]
    fn extracted_face_keeps_its_edge_names() {
        let mut kernel = MockKernel::new();
        let mut shape = unit_box(&mut kernel).with_tag(4);
        let face = compose("Face3", "MX", 2, TopoKind::Face).unwrap();
        let edge = compose("Edge10", "MX", 2, TopoKind::Edge).unwrap();
        let vertex = compose("Vertex6", "MX", 2, TopoKind::Vertex).unwrap();
        let map = shape.element_map_mut();
        map.set_element_name(IndexedName::new(TopoKind::Face, 3), face.clone())
            .unwrap();
        map.set_element_name(IndexedName::new(TopoKind::Edge, 10), edge.clone())
            .unwrap();
        map.set_element_name(IndexedName::new(TopoKind::Vertex, 6), vertex.clone())
            .unwrap();

        // The front face walks edges 1 10 5 9 and vertices 1 2 6 5.
        let sub = shape.get_sub_topo_shape(&mut kernel, "Face3").unwrap();
        assert_eq!(sub.mapped_name("Face1"), face);
        assert_eq!(sub.mapped_name("Edge2"), edge);
        assert_eq!(sub.mapped_name("Vertex3"), vertex);
        assert_eq!(sub.mapped_name("Edge1"), "Edge1");
        assert_eq!(
            sub.indexed_name(&format!(";{edge}")),
            Some(IndexedName::new(TopoKind::Edge, 2))
        );

        // Edge10 runs from vertex 2 to vertex 6. Faces sit above it.
        let sub = shape.get_sub_topo_shape(&mut kernel, "Edge10").unwrap();
        assert_eq!(sub.mapped_name("Edge1"), edge);
        assert_eq!(sub.mapped_name("Vertex2"), vertex);
        assert_eq!(sub.element_map().len(), 2);
    }

    #[test]
    fn unresolvable_sub_shape_is_null() {
        let mut kernel = MockKernel::new();
        let shape = unit_box(&mut kernel);
        assert!(shape.get_sub_topo_shape(&mut kernel, "Edge13").unwrap().is_null());
        assert!(shape.get_sub_topo_shape(&mut kernel, "Bogus").unwrap().is_null());
        assert!(!shape.get_sub_topo_shape(&mut kernel, "Body.").unwrap().is_null());
    }

    #[test]
    fn element_history_reports_tag_and_intermediates() {
        let mut kernel = MockKernel::new();
        let mut shape = unit_box(&mut kernel);
        let tagged = compose("Face2", "MFUS", 7, TopoKind::Face).unwrap();
        let inner = compose(&tagged, "X", 0, TopoKind::Face).unwrap();
        shape
            .element_map_mut()
            .set_element_name(IndexedName::new(TopoKind::Face, 1), inner)
            .unwrap();
        let history = shape.get_element_history("Face1");
        assert_eq!(history.tag, 7);
        assert_eq!(history.original, "Face2");
        assert_eq!(history.intermediates, vec![tagged]);

        let plain = shape.get_element_history("Face2");
        assert_eq!(plain.tag, 0);
        assert_eq!(plain.original, "Face2");
    }

    #[test]
    fn map_change_drops_related_cache() {
        let mut kernel = MockKernel::new();
        let mut shape = unit_box(&mut kernel);
        let element = RelatedElement {
            mapped: "Edge1;MX:H2,E".into(),
            canonical: IndexedName::new(TopoKind::Edge, 1),
        };
        shape.cache_related_elements("Edge1", 2, true, std::slice::from_ref(&element));
        assert_eq!(
            shape.related_elements(";Edge1;MX:H2,E", true),
            Some(vec![element.clone()])
        );
        assert!(shape.related_elements_cached("Edge1", 2, false).is_none());

        let clone = shape.clone();
        shape.set_element_map(ElementMap::new());
        assert!(shape.related_elements_cached("Edge1", 2, true).is_none());
        assert!(clone.related_elements_cached("Edge1", 2, true).is_some());
    }
}
