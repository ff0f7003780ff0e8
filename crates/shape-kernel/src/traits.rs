use nalgebra::{Point3, Vector3};

use crate::types::*;

/// Read-only queries on kernel shapes.
///
/// Every query honors the handle's location.
pub trait ShapeIntrospect {
    /// Topological kind of the shape itself.
    fn shape_kind(&self, shape: &KernelShape) -> Result<TopoKind, KernelError>;

    /// Number of distinct sub-shapes of `kind`. Indexing is 1-based and
    /// matches canonical element names.
    fn count_sub_shapes(&self, shape: &KernelShape, kind: TopoKind) -> Result<usize, KernelError>;

    /// Curve class of edge `index` (1-based).
    fn curve_type(&self, shape: &KernelShape, index: usize) -> Result<CurveType, KernelError>;

    fn bounding_box(&self, shape: &KernelShape) -> Result<BoundingBox, KernelError>;

    /// Area centroid of a face shape.
    fn face_centroid(&self, face: &KernelShape) -> Result<Point3<f64>, KernelError>;

    /// For the `sub_kind` elements of sub-shape `index` of `kind`, pairs of
    /// (index within the extracted sub-shape, index within `shape`).
    /// Elements with no counterpart in `shape` are left out.
    fn sub_shape_indices(
        &self,
        shape: &KernelShape,
        kind: TopoKind,
        index: usize,
        sub_kind: TopoKind,
    ) -> Result<Vec<(usize, usize)>, KernelError>;
}

/// Shape construction and modification.
/// Implemented by TruckKernel (wraps real truck) and MockKernel (deterministic test double).
pub trait ShapeBuilder {
    /// Extract sub-shape `index` (1-based) of `kind`, carrying the parent's location.
    fn sub_shape(
        &mut self,
        shape: &KernelShape,
        kind: TopoKind,
        index: usize,
    ) -> Result<KernelShape, KernelError>;

    /// Intersect the infinite line `origin + t * direction` with every face.
    fn intersect_line(
        &mut self,
        shape: &KernelShape,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        tolerance: f64,
    ) -> Result<Vec<LineHit>, KernelError>;

    fn make_compound(&mut self, shapes: &[KernelShape]) -> Result<KernelShape, KernelError>;

    /// Bake `matrix` (applied after the shape's own location) into new geometry.
    /// The result has an identity location.
    fn transform_copy(
        &mut self,
        shape: &KernelShape,
        matrix: &Transform,
    ) -> Result<KernelShape, KernelError>;

    /// Boolean union. Input 0 is `a`, input 1 is `b` in the returned history.
    fn fuse(&mut self, a: &KernelShape, b: &KernelShape) -> Result<ShapeResult, KernelError>;

    /// Boolean common (material intersection).
    fn common(&mut self, a: &KernelShape, b: &KernelShape) -> Result<ShapeResult, KernelError>;

    /// Axis-aligned box solid from `origin` spanning `size`.
    fn make_box(
        &mut self,
        origin: Point3<f64>,
        size: Vector3<f64>,
    ) -> Result<KernelShape, KernelError>;

    /// Round the given edges, each `(1-based edge index, radius)`.
    fn fillet_edges(
        &mut self,
        solid: &KernelShape,
        edges: &[(usize, f64)],
    ) -> Result<ShapeResult, KernelError>;
}

/// Combined trait for passing a kernel around as one trait object.
pub trait ShapeKernel: ShapeBuilder + ShapeIntrospect {
    fn as_introspect(&self) -> &dyn ShapeIntrospect;
}

impl<T: ShapeBuilder + ShapeIntrospect> ShapeKernel for T {
    fn as_introspect(&self) -> &dyn ShapeIntrospect {
        self
    }
}
