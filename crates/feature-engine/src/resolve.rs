//! Resolve a document object plus sub-path into a shape.

use tracing::{debug, error, instrument};

use naming_types::{find_element_name, TopoKind};
use shape_kernel::{CurveType, ShapeKernel, Transform};
use topo_shape::{ShapeError, TopoShape};

use crate::graph::ObjectGraph;
use crate::settings::PartSettings;
use crate::types::{ElementVisibility, ObjectRef};

/// Everything shape resolution reads: the object graph, the kernel and the
/// part settings.
pub struct ShapeContext<'a> {
    pub graph: &'a dyn ObjectGraph,
    pub kernel: &'a mut dyn ShapeKernel,
    pub settings: &'a PartSettings,
}

impl<'a> ShapeContext<'a> {
    pub fn new(
        graph: &'a dyn ObjectGraph,
        kernel: &'a mut dyn ShapeKernel,
        settings: &'a PartSettings,
    ) -> Self {
        Self {
            graph,
            kernel,
            settings,
        }
    }

    /// The object's own shape, placed by its placement.
    pub fn shape_of(&mut self, object: ObjectRef) -> TopoShape {
        resolve_shape(self, object, "", &ResolveOptions::default()).shape
    }
}

/// How to resolve a sub-path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Extract the sub-element named at the end of the path.
    pub need_sub_element: bool,
    /// Multiply in the starting object's placement.
    pub transform: bool,
    /// Report the link target rather than the link as owner.
    pub resolve_link: bool,
    /// Drop element maps from the result.
    pub no_element_map: bool,
    /// Placement the path is resolved under.
    pub matrix: Transform,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            need_sub_element: false,
            transform: true,
            resolve_link: false,
            no_element_map: false,
            matrix: Transform::identity(),
        }
    }
}

/// A resolved shape, its owner and the accumulated placement.
#[derive(Debug, Clone)]
pub struct ResolvedShape {
    pub shape: TopoShape,
    /// Owner of the shape: the link target with `resolve_link`, otherwise
    /// the object the path names. `None` when the path does not resolve.
    pub owner: Option<ObjectRef>,
    pub matrix: Transform,
}

impl ResolvedShape {
    fn unresolved(matrix: Transform) -> Self {
        Self {
            shape: TopoShape::null(),
            owner: None,
            matrix,
        }
    }
}

/// Resolve `subpath` below `object` into a shape.
///
/// Resolution failures yield a null shape, never an error. A link's shape is
/// adopted under the link's tag unless element maps are suppressed, so history
/// can tell the link from its target.
#[instrument(level = "debug", skip(ctx, options), fields(need_sub = options.need_sub_element))]
pub fn resolve_shape(
    ctx: &mut ShapeContext<'_>,
    object: ObjectRef,
    subpath: &str,
    options: &ResolveOptions,
) -> ResolvedShape {
    let element = find_element_name(subpath);
    let object_path = &subpath[..subpath.len() - element.len()];
    let Some(sub) = ctx
        .graph
        .sub_object(object, object_path, options.transform, &options.matrix)
    else {
        debug!("sub-path does not resolve");
        return ResolvedShape::unresolved(options.matrix);
    };
    let owner = sub.owner;
    let matrix = sub.matrix;
    let linked = ctx.graph.linked_object(owner);
    let reported = if options.resolve_link { linked } else { owner };
    let wants_element = options.need_sub_element && !element.is_empty();

    let shape = match ctx.graph.shape_property(linked).cloned() {
        Some(stored) => {
            let element = if wants_element { element } else { "" };
            match place_shape(ctx, stored, element, &matrix) {
                Ok(shape) => shape,
                Err(e) => {
                    let name = ctx.graph.object_name(owner).unwrap_or_default();
                    error!(object = name, subpath, error = %e, "failed to resolve sub-shape");
                    TopoShape::null()
                }
            }
        }
        // An element of an object without a shape of its own cannot resolve.
        None if wants_element => TopoShape::null(),
        None => compound_of_children(ctx, owner, &matrix, options.no_element_map),
    };
    let shape = finish(shape, owner, linked, options.no_element_map);
    ResolvedShape {
        shape,
        owner: Some(reported),
        matrix,
    }
}

/// Move a stored shape to `matrix`, optionally extracting `element` first.
fn place_shape(
    ctx: &mut ShapeContext<'_>,
    mut shape: TopoShape,
    element: &str,
    matrix: &Transform,
) -> Result<TopoShape, ShapeError> {
    let relocate = shape.transform() != *matrix;
    if relocate {
        shape.set_transform(Transform::identity());
    }
    if !element.is_empty() {
        shape = shape.get_sub_topo_shape(&mut *ctx.kernel, element)?;
    }
    if relocate && !shape.is_null() {
        let copy = ctx.settings.copy_sub_shape || is_single_circular_edge(ctx, &shape)?;
        shape.transform_shape(&mut *ctx.kernel, matrix, copy, true)?;
    }
    Ok(shape)
}

/// Moving a lone circular edge in place is unreliable on some kernels, so
/// such edges are copied instead.
fn is_single_circular_edge(
    ctx: &mut ShapeContext<'_>,
    shape: &TopoShape,
) -> Result<bool, ShapeError> {
    let Some(geometry) = shape.geometry() else {
        return Ok(false);
    };
    if shape.count_sub_shapes(ctx.kernel.as_introspect(), TopoKind::Edge)? != 1 {
        return Ok(false);
    }
    Ok(ctx.kernel.curve_type(geometry, 1)? == CurveType::Circle)
}

/// Compound of the visible children of an object without a shape.
fn compound_of_children(
    ctx: &mut ShapeContext<'_>,
    owner: ObjectRef,
    matrix: &Transform,
    no_element_map: bool,
) -> TopoShape {
    let mut shapes = Vec::new();
    for name in ctx.graph.sub_objects(owner) {
        let bare = name.trim_end_matches('.');
        if bare.is_empty() {
            continue;
        }
        let visibility = ctx.graph.is_element_visible(owner, bare);
        if visibility == ElementVisibility::Hidden {
            continue;
        }
        let child_options = ResolveOptions {
            transform: false,
            no_element_map,
            ..ResolveOptions::default()
        };
        let child = resolve_shape(ctx, owner, &format!("{bare}."), &child_options);
        if visibility == ElementVisibility::Inherited
            && child.owner.is_some_and(|o| !ctx.graph.is_visible(o))
        {
            continue;
        }
        if !child.shape.is_null() {
            shapes.push(child.shape);
        }
    }
    if shapes.is_empty() {
        return TopoShape::null();
    }
    let compound = TopoShape::make_compound(&mut *ctx.kernel, &shapes).and_then(|mut c| {
        c.transform_shape(&mut *ctx.kernel, matrix, false, true)?;
        Ok(c)
    });
    match compound {
        Ok(shape) => shape,
        Err(e) => {
            error!(error = %e, "failed to build compound of children");
            TopoShape::null()
        }
    }
}

fn finish(
    mut shape: TopoShape,
    owner: ObjectRef,
    linked: ObjectRef,
    no_element_map: bool,
) -> TopoShape {
    if shape.is_null() {
        return shape;
    }
    if no_element_map {
        let mut plain = TopoShape::null();
        if let Some(geometry) = shape.geometry() {
            plain = TopoShape::new(geometry.clone()).with_tag(shape.tag());
        }
        return plain;
    }
    if owner != linked {
        if let Err(e) = shape.adopt_element_map(owner.tag) {
            error!(error = %e, "failed to re-tag linked shape");
        }
    }
    shape
}

/// The object that actually owns the shape at `subpath`: the sub-object's
/// final link target.
pub fn shape_owner(graph: &dyn ObjectGraph, object: ObjectRef, subpath: &str) -> Option<ObjectRef> {
    let element = find_element_name(subpath);
    let object_path = &subpath[..subpath.len() - element.len()];
    let sub = graph.sub_object(object, object_path, false, &Transform::identity())?;
    Some(graph.linked_object(sub.owner))
}
