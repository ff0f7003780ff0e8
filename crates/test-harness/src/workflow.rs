//! Scenario: fluent API for scripting part-feature sessions in tests.
//!
//! Drives the real `Workspace` and recompute path. All methods take object
//! names instead of references for readability.

use std::collections::HashMap;

use nalgebra::Vector3;

use feature_engine::features::{BoxFeature, FilletElement, FilletFeature, FuseFeature};
use feature_engine::{
    element_history, related_elements, resolve_shape, DocumentId, FeatureBehavior, FeatureStatus,
    HistoryItem, ObjectRef, PartSettings, RecomputeReport, ResolveOptions, Workspace,
};
use modeling_ops::{check_intersection, find_all_faces_cut_by};
use naming_types::TopoKind;
use shape_kernel::{MockKernel, ShapeKernel, TruckKernel};
use topo_shape::TopoShape;

use crate::helpers::{init_tracing, translation, HarnessError};

/// A named-object session over one workspace and one kernel.
///
/// Objects are created in the current document; `document` switches it.
/// Names are unique across documents.
pub struct Scenario {
    pub workspace: Workspace,
    pub(crate) kernel: Box<dyn ShapeKernel>,
    /// Documents in creation order.
    documents: Vec<(String, DocumentId)>,
    current: DocumentId,
    objects: HashMap<String, ObjectRef>,
    auto_check: bool,
}

impl Scenario {
    fn with_kernel(kernel: Box<dyn ShapeKernel>, settings: PartSettings) -> Self {
        init_tracing();
        let mut workspace = Workspace::new(settings);
        let current = workspace.new_document("Part");
        Self {
            workspace,
            kernel,
            documents: vec![("Part".to_string(), current)],
            current,
            objects: HashMap::new(),
            auto_check: false,
        }
    }

    /// Scenario on the deterministic mock kernel.
    pub fn mock() -> Self {
        Self::with_kernel(Box::new(MockKernel::new()), PartSettings::default())
    }

    /// Scenario on real truck geometry.
    pub fn truck() -> Self {
        Self::truck_with(PartSettings::default())
    }

    /// Truck scenario with part settings read from JSON.
    pub fn truck_with_settings(json: &str) -> Result<Self, HarnessError> {
        Ok(Self::truck_with(PartSettings::from_json(json)?))
    }

    /// Truck kernel running booleans at the settings' tolerance.
    pub fn truck_kernel(settings: &PartSettings) -> TruckKernel {
        TruckKernel::with_tolerance(settings.boolean_tolerance)
    }

    fn truck_with(settings: PartSettings) -> Self {
        let kernel = Self::truck_kernel(&settings);
        Self::with_kernel(Box::new(kernel), settings)
    }

    /// Mock scenario with part settings read from JSON.
    pub fn mock_with_settings(json: &str) -> Result<Self, HarnessError> {
        let settings = PartSettings::from_json(json)?;
        Ok(Self::with_kernel(Box::new(MockKernel::new()), settings))
    }

    /// Fail `recompute` whenever a feature fails.
    pub fn with_auto_check(mut self) -> Self {
        self.auto_check = true;
        self
    }

    // ── Documents and objects ───────────────────────────────────────────

    /// Switch to document `name`, creating it on first use.
    pub fn document(&mut self, name: &str) -> &mut Self {
        self.current = match self.documents.iter().find(|(n, _)| n == name) {
            Some((_, doc)) => *doc,
            None => {
                let doc = self.workspace.new_document(name);
                self.documents.push((name.to_string(), doc));
                doc
            }
        };
        self
    }

    pub fn id(&self, name: &str) -> Result<ObjectRef, HarnessError> {
        self.objects
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::ObjectNotFound {
                name: name.to_string(),
            })
    }

    fn ids(&self, names: &[&str]) -> Result<Vec<ObjectRef>, HarnessError> {
        names.iter().map(|n| self.id(n)).collect()
    }

    fn check_name_available(&self, name: &str) -> Result<(), HarnessError> {
        if self.objects.contains_key(name) {
            return Err(HarnessError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn register(&mut self, name: &str, object: ObjectRef) -> ObjectRef {
        self.objects.insert(name.to_string(), object);
        object
    }

    pub fn feature(
        &mut self,
        name: &str,
        behavior: impl FeatureBehavior + 'static,
    ) -> Result<ObjectRef, HarnessError> {
        self.check_name_available(name)?;
        let object = self.workspace.add_feature(self.current, name, behavior)?;
        Ok(self.register(name, object))
    }

    /// Cube of edge `size` with its corner at `origin`.
    pub fn cube(
        &mut self,
        name: &str,
        size: f64,
        origin: [f64; 3],
    ) -> Result<ObjectRef, HarnessError> {
        let object = self.feature(name, BoxFeature::new(size, size, size))?;
        self.place(name, origin)?;
        Ok(object)
    }

    /// Round `(edge index, radius)` pairs on `base`.
    pub fn fillet(
        &mut self,
        name: &str,
        base: &str,
        edges: &[(usize, f64)],
    ) -> Result<ObjectRef, HarnessError> {
        let base = self.id(base)?;
        let edges = edges
            .iter()
            .map(|&(edge, radius)| FilletElement::new(edge, radius))
            .collect();
        self.feature(name, FilletFeature::new(base, edges))
    }

    pub fn fuse(
        &mut self,
        name: &str,
        base: &str,
        tools: &[&str],
    ) -> Result<ObjectRef, HarnessError> {
        let base = self.id(base)?;
        let tools = self.ids(tools)?;
        self.feature(name, FuseFeature::new(base, tools))
    }

    pub fn group(&mut self, name: &str, children: &[&str]) -> Result<ObjectRef, HarnessError> {
        self.check_name_available(name)?;
        let children = self.ids(children)?;
        let object = self.workspace.add_group(self.current, name, &children)?;
        Ok(self.register(name, object))
    }

    pub fn link(&mut self, name: &str, target: &str) -> Result<ObjectRef, HarnessError> {
        self.check_name_available(name)?;
        let target = self.id(target)?;
        let object = self.workspace.add_link(self.current, name, target)?;
        Ok(self.register(name, object))
    }

    pub fn place(&mut self, name: &str, offset: [f64; 3]) -> Result<&mut Self, HarnessError> {
        let object = self.id(name)?;
        self.workspace.set_placement(object, translation(offset))?;
        Ok(self)
    }

    pub fn set_visible(&mut self, name: &str, visible: bool) -> Result<&mut Self, HarnessError> {
        let object = self.id(name)?;
        self.workspace.set_visible(object, visible)?;
        Ok(self)
    }

    /// Override a group child's visibility, or with `None` inherit it.
    pub fn set_child_visibility(
        &mut self,
        group: &str,
        child: &str,
        visible: Option<bool>,
    ) -> Result<&mut Self, HarnessError> {
        let group = self.id(group)?;
        self.workspace.set_child_visibility(group, child, visible)?;
        Ok(self)
    }

    /// Edit a feature property and mark the feature for recompute.
    pub fn modify<F: FeatureBehavior + 'static>(
        &mut self,
        name: &str,
        property: &str,
        edit: impl FnOnce(&mut F),
    ) -> Result<&mut Self, HarnessError> {
        let object = self.id(name)?;
        self.workspace.modify_feature::<F, _>(object, property, edit)?;
        Ok(self)
    }

    // ── Recompute ───────────────────────────────────────────────────────

    /// Recompute every document, oldest first.
    pub fn recompute(&mut self) -> Result<RecomputeReport, HarnessError> {
        let mut total = RecomputeReport::default();
        let documents: Vec<DocumentId> = self.documents.iter().map(|(_, d)| *d).collect();
        for doc in documents {
            let report = self.workspace.recompute(doc, self.kernel.as_mut())?;
            total.recomputed.extend(report.recomputed);
            total.errors.extend(report.errors);
        }
        if self.auto_check && !total.is_ok() {
            return Err(HarnessError::AssertionFailed {
                detail: format!("recompute failed: {}", self.describe_errors(&total)),
            });
        }
        Ok(total)
    }

    fn describe_errors(&self, report: &RecomputeReport) -> String {
        report
            .errors
            .iter()
            .map(|(object, message)| {
                let name = self
                    .workspace
                    .object(*object)
                    .map(|o| o.name.as_str())
                    .unwrap_or("?");
                format!("{name}: {message}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn status(&self, name: &str) -> Result<FeatureStatus, HarnessError> {
        let object = self.id(name)?;
        self.workspace
            .status(object)
            .cloned()
            .ok_or_else(|| HarnessError::NoShape {
                name: name.to_string(),
            })
    }

    pub fn assert_valid(&self, name: &str) -> Result<(), HarnessError> {
        match self.status(name)? {
            FeatureStatus::Valid => Ok(()),
            other => Err(HarnessError::AssertionFailed {
                detail: format!("{name} is {other:?}"),
            }),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// The stored shape of a feature.
    pub fn shape(&self, name: &str) -> Result<TopoShape, HarnessError> {
        let object = self.id(name)?;
        match self.workspace.shape(object) {
            Some(shape) if !shape.is_null() => Ok(shape.clone()),
            _ => Err(HarnessError::NoShape {
                name: name.to_string(),
            }),
        }
    }

    pub fn kernel(&self) -> &dyn ShapeKernel {
        self.kernel.as_ref()
    }

    /// Resolve `subpath` below `name`; the shape may be null.
    pub fn resolve(
        &mut self,
        name: &str,
        subpath: &str,
        options: &ResolveOptions,
    ) -> Result<(TopoShape, Option<ObjectRef>), HarnessError> {
        let object = self.id(name)?;
        let mut ctx = self.workspace.context(self.kernel.as_mut());
        let resolved = resolve_shape(&mut ctx, object, subpath, options);
        Ok((resolved.shape, resolved.owner))
    }

    /// Counts (V, E, F) of the shape resolved from `name`.
    pub fn topology_counts(&mut self, name: &str) -> Result<(usize, usize, usize), HarnessError> {
        let (shape, _) = self.resolve(name, "", &ResolveOptions::default())?;
        if shape.is_null() {
            return Err(HarnessError::NoShape {
                name: name.to_string(),
            });
        }
        let introspect = self.kernel.as_introspect();
        let count = |kind: TopoKind| {
            shape
                .count_sub_shapes(introspect, kind)
                .map_err(|e| HarnessError::AssertionFailed {
                    detail: format!("counting {kind:?} of {name}: {e}"),
                })
        };
        Ok((
            count(TopoKind::Vertex)?,
            count(TopoKind::Edge)?,
            count(TopoKind::Face)?,
        ))
    }

    pub fn history(
        &mut self,
        name: &str,
        element: &str,
        recursive: bool,
        same_type: bool,
    ) -> Result<Vec<HistoryItem>, HarnessError> {
        let object = self.id(name)?;
        let mut ctx = self.workspace.context(self.kernel.as_mut());
        Ok(element_history(&mut ctx, object, element, recursive, same_type))
    }

    /// Owner names along a history chain; `None` for the root item.
    pub fn history_owners(&self, items: &[HistoryItem]) -> Vec<Option<String>> {
        items
            .iter()
            .map(|item| {
                item.object
                    .and_then(|o| self.workspace.object(o))
                    .map(|o| o.name.clone())
            })
            .collect()
    }

    /// Canonical names of the elements related to `element`.
    pub fn related(
        &mut self,
        name: &str,
        element: &str,
        same_type: bool,
    ) -> Result<Vec<String>, HarnessError> {
        let object = self.id(name)?;
        let mut ctx = self.workspace.context(self.kernel.as_mut());
        Ok(related_elements(&mut ctx, object, element, same_type)
            .into_iter()
            .map(|r| r.canonical.to_string())
            .collect())
    }

    /// Faces of `name` hit by the line from the centroid of its `face` along
    /// `direction`, as (distance squared) values, nearest first.
    pub fn faces_cut_by(
        &mut self,
        name: &str,
        face: &str,
        direction: [f64; 3],
    ) -> Result<Vec<f64>, HarnessError> {
        let shape = self.shape(name)?;
        let face_shape = shape
            .get_sub_topo_shape(self.kernel.as_mut(), face)
            .map_err(|e| HarnessError::AssertionFailed {
                detail: format!("{name}.{face}: {e}"),
            })?;
        let tolerance = self.workspace.settings().confusion_tolerance;
        let cut = find_all_faces_cut_by(
            self.kernel.as_mut(),
            &shape,
            &face_shape,
            &Vector3::from(direction),
            tolerance,
        )
        .map_err(|e| HarnessError::AssertionFailed {
            detail: format!("cutting {name} from {face}: {e}"),
        })?;
        Ok(cut.into_iter().map(|c| c.distance_sq).collect())
    }

    pub fn intersects(
        &mut self,
        first: &str,
        second: &str,
        touch_is_intersection: bool,
    ) -> Result<bool, HarnessError> {
        let (a, _) = self.resolve(first, "", &ResolveOptions::default())?;
        let (b, _) = self.resolve(second, "", &ResolveOptions::default())?;
        check_intersection(self.kernel.as_mut(), &a, &b, false, touch_is_intersection).map_err(
            |e| HarnessError::AssertionFailed {
                detail: format!("intersecting {first} and {second}: {e}"),
            },
        )
    }
}
