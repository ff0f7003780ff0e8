//! Operations that build or rewrite element maps.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use naming_types::{
    compose, is_adoption, parse_postfix, trace_name, IndexedName, ObjectTag, TopoKind,
};
use shape_kernel::{HistoryKind, KernelShape, ShapeHistory, ShapeKernel};

use crate::element_map::ElementMap;
use crate::shape::TopoShape;
use crate::ShapeError;

impl TopoShape {
    /// Move the shape under a new owner tag.
    ///
    /// Every mapped name whose upstream tag differs from `tag` gets a
    /// `;:H<tag>` step on top. Unmapped elements stay canonical.
    pub fn re_tag_element_map(&mut self, tag: ObjectTag) -> Result<(), ShapeError> {
        self.wrap_names(tag, |name| trace_name(name).tag != tag)
    }

    /// Adopt the shape across a link boundary.
    ///
    /// Unlike [`re_tag_element_map`](Self::re_tag_element_map), a name gets
    /// the `;:H<tag>` step even when its upstream tag already equals `tag`,
    /// since tags of different documents can coincide. Names whose outermost
    /// step is already that adoption are left alone.
    pub fn adopt_element_map(&mut self, tag: ObjectTag) -> Result<(), ShapeError> {
        self.wrap_names(tag, |name| {
            !parse_postfix(name).is_some_and(|p| is_adoption(&p) && p.tag == tag)
        })
    }

    fn wrap_names(
        &mut self,
        tag: ObjectTag,
        wrap: impl Fn(&str) -> bool,
    ) -> Result<(), ShapeError> {
        if tag == 0 {
            warn!("refusing to re-tag element map with tag 0");
            return Ok(());
        }
        let mut map = ElementMap::new();
        let mut wrapped = 0;
        for (element, name) in self.element_map().iter() {
            let name = if wrap(name) {
                wrapped += 1;
                compose(name, "", tag, element.kind)?
            } else {
                name.to_string()
            };
            map.set_element_name(*element, name)?;
        }
        debug!(from = self.tag(), to = tag, wrapped, "re-tagged element map");
        if wrapped > 0 {
            self.set_element_map(map);
        }
        self.set_tag(tag);
        Ok(())
    }

    /// Aggregate `shapes` into one compound.
    ///
    /// Null children are skipped. Child `i` (1-based among the rest) has its
    /// element names written under op `C<i>` with the child's tag.
    pub fn make_compound(
        kernel: &mut dyn ShapeKernel,
        shapes: &[TopoShape],
    ) -> Result<TopoShape, ShapeError> {
        let children: Vec<&TopoShape> = shapes.iter().filter(|s| !s.is_null()).collect();
        let geometries: Vec<KernelShape> = children
            .iter()
            .filter_map(|s| s.geometry().cloned())
            .collect();
        let compound = kernel.make_compound(&geometries)?;

        let mut map = ElementMap::new();
        let kinds = TopoKind::ADDRESSABLE
            .into_iter()
            .filter(|&kind| kind != TopoKind::Compound);
        for kind in kinds {
            let mut offset = 0;
            for (i, child) in children.iter().enumerate() {
                let count = child.count_sub_shapes(kernel.as_introspect(), kind)?;
                let op = format!("C{}", i + 1);
                for index in 1..=count {
                    let element = IndexedName::new(kind, index);
                    let source = match child.element_map().mapped(&element) {
                        Some(mapped) => mapped.to_string(),
                        None if child.tag() == 0 => continue,
                        None => element.to_string(),
                    };
                    let name = compose(&source, &op, child.tag(), kind)?;
                    map.set_element_name(IndexedName::new(kind, offset + index), name)?;
                }
                offset += count;
            }
        }
        Ok(TopoShape::from_parts(Some(compound), map, 0))
    }

    /// Result shape of a modeling operation, named from its history.
    ///
    /// Output elements are named `<source>;M<op>` or `<source>;G<op>` with
    /// the input's tag. Repeats of a name get an ordinal after the op code,
    /// starting at 2. Elements of untagged inputs with no mapped name stay
    /// canonical.
    pub fn make_shape_with_history(
        geometry: KernelShape,
        inputs: &[&TopoShape],
        history: &ShapeHistory,
        op: &str,
        tag: ObjectTag,
    ) -> Result<TopoShape, ShapeError> {
        let mut map = ElementMap::new();
        let mut named = HashSet::new();
        let mut repeats: HashMap<String, usize> = HashMap::new();
        for entry in &history.entries {
            if named.contains(&entry.output) {
                continue;
            }
            let Some(input) = inputs.get(entry.input) else {
                warn!(input = entry.input, "history refers to a missing input");
                continue;
            };
            let source = match input.element_map().mapped(&entry.source) {
                Some(mapped) => mapped.to_string(),
                None if input.tag() == 0 => continue,
                None => entry.source.to_string(),
            };
            let op_code = match entry.kind {
                HistoryKind::Modified => format!("M{op}"),
                HistoryKind::Generated => format!("G{op}"),
            };
            let mut name = compose(&source, &op_code, input.tag(), entry.output.kind)?;
            let seen = repeats.entry(name.clone()).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                let numbered = format!("{op_code}{seen}");
                name = compose(&source, &numbered, input.tag(), entry.output.kind)?;
            }
            map.set_element_name(entry.output, name)?;
            named.insert(entry.output);
        }
        Ok(TopoShape::from_parts(Some(geometry), map, tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use shape_kernel::{MockKernel, ShapeBuilder};

    fn tagged_box(kernel: &mut MockKernel, x: f64, tag: ObjectTag) -> TopoShape {
        let geometry = kernel
            .make_box(Point3::new(x, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0))
            .unwrap();
        let mut history = ShapeHistory::default();
        for index in 1..=6 {
            let face = IndexedName::new(TopoKind::Face, index);
            history.push(face, 0, face, HistoryKind::Modified);
        }
        let seed = TopoShape::new(geometry.clone()).with_tag(tag);
        TopoShape::make_shape_with_history(geometry, &[&seed], &history, "BOX", tag).unwrap()
    }

    #[test]
    fn history_names_carry_input_tag() {
        let mut kernel = MockKernel::new();
        let shape = tagged_box(&mut kernel, 0.0, 3);
        assert_eq!(shape.tag(), 3);
        assert_eq!(shape.mapped_name("Face2"), "Face2;MBOX:H3,F");
        assert_eq!(shape.mapped_name("Edge2"), "Edge2");
    }

    #[test]
    fn untagged_unmapped_inputs_stay_canonical() {
        let mut kernel = MockKernel::new();
        let geometry = kernel
            .make_box(Point3::origin(), Vector3::new(1.0, 1.0, 1.0))
            .unwrap();
        let input = TopoShape::new(geometry.clone());
        let mut history = ShapeHistory::default();
        let face = IndexedName::new(TopoKind::Face, 1);
        history.push(face, 0, face, HistoryKind::Modified);
        let shape =
            TopoShape::make_shape_with_history(geometry, &[&input], &history, "X", 9).unwrap();
        assert!(shape.element_map().is_empty());
    }

    #[test]
    fn repeated_names_get_ordinals() {
        let mut kernel = MockKernel::new();
        let input = tagged_box(&mut kernel, 0.0, 3);
        let geometry = input.geometry().unwrap().clone();
        let mut history = ShapeHistory::default();
        let edge = IndexedName::new(TopoKind::Edge, 3);
        for index in [1, 2, 3] {
            history.push(
                IndexedName::new(TopoKind::Vertex, index),
                0,
                edge,
                HistoryKind::Generated,
            );
        }
        let shape =
            TopoShape::make_shape_with_history(geometry, &[&input], &history, "FLT", 5).unwrap();
        assert_eq!(shape.mapped_name("Vertex1"), "Edge3;GFLT:H3,V");
        assert_eq!(shape.mapped_name("Vertex2"), "Edge3;GFLT2:H3,V");
        assert_eq!(shape.mapped_name("Vertex3"), "Edge3;GFLT3:H3,V");
    }

    #[test]
    fn re_tag_wraps_every_mapped_name() {
        let mut kernel = MockKernel::new();
        let mut shape = tagged_box(&mut kernel, 0.0, 3);
        shape.re_tag_element_map(0x1f).unwrap();
        assert_eq!(shape.tag(), 0x1f);
        for (_, name) in shape.element_map().iter() {
            assert_eq!(trace_name(name).tag, 0x1f);
            assert!(name.ends_with(";:H1f,F"));
        }
        assert_eq!(shape.mapped_name("Edge1"), "Edge1");
        assert_eq!(shape.get_element_history("Face1").original, "Face1;MBOX:H3,F");
    }

    #[test]
    fn re_tag_decides_per_name_not_per_shape() {
        let mut kernel = MockKernel::new();
        // Names carry the base tag 1 while the shape is already owned by 2.
        let mut shape = tagged_box(&mut kernel, 0.0, 1);
        shape.set_tag(2);
        shape.re_tag_element_map(2).unwrap();
        assert_eq!(shape.mapped_name("Face1"), "Face1;MBOX:H1,F;:H2,F");
        for (_, name) in shape.element_map().iter() {
            assert_eq!(trace_name(name).tag, 2);
        }

        let before = shape.element_map().clone();
        shape.re_tag_element_map(2).unwrap();
        assert_eq!(shape.element_map(), &before);
    }

    #[test]
    fn adoption_wraps_even_matching_tags_once() {
        let mut kernel = MockKernel::new();
        let mut shape = tagged_box(&mut kernel, 0.0, 1);
        shape.adopt_element_map(1).unwrap();
        assert_eq!(shape.mapped_name("Face2"), "Face2;MBOX:H1,F;:H1,F");
        let history = shape.get_element_history("Face2");
        assert!(history.adopted);
        assert_eq!(history.original, "Face2;MBOX:H1,F");

        let before = shape.element_map().clone();
        shape.adopt_element_map(1).unwrap();
        assert_eq!(shape.element_map(), &before);
        assert_eq!(shape.mapped_name("Edge1"), "Edge1");
    }

    #[test]
    fn re_tag_with_zero_is_ignored() {
        let mut kernel = MockKernel::new();
        let mut shape = tagged_box(&mut kernel, 0.0, 3);
        let before = shape.element_map().clone();
        shape.re_tag_element_map(0).unwrap();
        assert_eq!(shape.tag(), 3);
        assert_eq!(shape.element_map(), &before);
    }

    #[test]
    fn compound_namespaces_children() {
        let mut kernel = MockKernel::new();
        let a = tagged_box(&mut kernel, 0.0, 3);
        let b = tagged_box(&mut kernel, 5.0, 4);
        let compound =
            TopoShape::make_compound(&mut kernel, &[a, TopoShape::null(), b]).unwrap();
        assert_eq!(compound.tag(), 0);
        assert_eq!(compound.mapped_name("Face1"), "Face1;MBOX:H3,F;C1:H3,F");
        assert_eq!(compound.mapped_name("Face7"), "Face1;MBOX:H4,F;C2:H4,F");
        assert_eq!(compound.mapped_name("Edge13"), "Edge1;C2:H4,E");
        let history = compound.get_element_history("Face7");
        assert_eq!(history.tag, 4);
        assert_eq!(history.original, "Face1;MBOX:H4,F");
    }

    #[test]
    fn compound_carries_solid_and_shell_names() {
        let mut kernel = MockKernel::new();
        let mut a = tagged_box(&mut kernel, 0.0, 3);
        let solid = compose("Solid1", "MBOX", 3, TopoKind::Solid).unwrap();
        a.element_map_mut()
            .set_element_name(IndexedName::new(TopoKind::Solid, 1), solid.clone())
            .unwrap();
        let b = tagged_box(&mut kernel, 5.0, 4);
        let compound = TopoShape::make_compound(&mut kernel, &[a, b]).unwrap();
        assert_eq!(compound.mapped_name("Solid1"), format!("{solid};C1:H3,O"));
        assert_eq!(compound.mapped_name("Solid2"), "Solid1;C2:H4,O");
        assert_eq!(compound.mapped_name("Shell2"), "Shell1;C2:H4,S");
        assert_eq!(compound.mapped_name("Wire12"), "Wire6;C2:H4,W");
        assert_eq!(
            compound.indexed_name(&format!(";{solid};C1:H3,O")),
            Some(IndexedName::new(TopoKind::Solid, 1))
        );
    }
}
