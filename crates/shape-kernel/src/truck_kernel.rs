//! TruckKernel: real geometry kernel wrapping truck's API.
//!
//! truck reports no element history for booleans and has no fillet, so
//! results built here carry empty histories and `fillet_edges` is unsupported.
//! Bounding boxes and centroids are computed from vertices, which is exact for
//! the planar solids this kernel is used with.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};
use truck_modeling::builder;
use truck_modeling::geometry::{Curve, Surface};
use truck_modeling::topology::{Edge, Face, Shell, Solid, Vertex, Wire};

use crate::geom::{line_plane_parameter, polygon_contains};
use crate::traits::{ShapeBuilder, ShapeIntrospect};
use crate::types::*;

/// Tolerance handed to truck's boolean operations.
pub const DEFAULT_BOOLEAN_TOLERANCE: f64 = 0.05;

/// A stored truck shape of any topological kind.
#[derive(Clone)]
enum TruckShape {
    Vertex(Vertex),
    Edge(Edge),
    Face(Face),
    Wire(Wire),
    Shell(Shell),
    Solid(Solid),
    Compound(Vec<TruckShape>),
}

impl TruckShape {
    fn kind(&self) -> TopoKind {
        match self {
            TruckShape::Vertex(_) => TopoKind::Vertex,
            TruckShape::Edge(_) => TopoKind::Edge,
            TruckShape::Face(_) => TopoKind::Face,
            TruckShape::Wire(_) => TopoKind::Wire,
            TruckShape::Shell(_) => TopoKind::Shell,
            TruckShape::Solid(_) => TopoKind::Solid,
            TruckShape::Compound(_) => TopoKind::Compound,
        }
    }

    fn faces(&self) -> Vec<Face> {
        match self {
            TruckShape::Face(f) => vec![f.clone()],
            TruckShape::Shell(s) => s.face_iter().cloned().collect(),
            TruckShape::Solid(s) => s
                .boundaries()
                .iter()
                .flat_map(|shell| shell.face_iter().cloned())
                .collect(),
            TruckShape::Compound(children) => children.iter().flat_map(|c| c.faces()).collect(),
            TruckShape::Vertex(_) | TruckShape::Edge(_) | TruckShape::Wire(_) => Vec::new(),
        }
    }

    fn wires(&self) -> Vec<Wire> {
        match self {
            TruckShape::Wire(w) => vec![w.clone()],
            TruckShape::Compound(children) => children.iter().flat_map(|c| c.wires()).collect(),
            _ => self.faces().iter().flat_map(|f| f.boundaries()).collect(),
        }
    }

    /// Distinct edges in first-seen order.
    fn edges(&self) -> Vec<Edge> {
        let candidates: Vec<Edge> = match self {
            TruckShape::Edge(e) => vec![e.clone()],
            TruckShape::Compound(children) => children.iter().flat_map(|c| c.edges()).collect(),
            _ => self
                .wires()
                .iter()
                .flat_map(|w| w.edge_iter().cloned().collect::<Vec<_>>())
                .collect(),
        };
        let mut seen = HashSet::new();
        candidates.into_iter().filter(|e| seen.insert(e.id())).collect()
    }

    /// Distinct vertices in first-seen order.
    fn vertices(&self) -> Vec<Vertex> {
        let candidates: Vec<Vertex> = match self {
            TruckShape::Vertex(v) => vec![v.clone()],
            TruckShape::Compound(children) => children.iter().flat_map(|c| c.vertices()).collect(),
            _ => self
                .edges()
                .iter()
                .flat_map(|e| [e.front().clone(), e.back().clone()])
                .collect(),
        };
        let mut seen = HashSet::new();
        candidates.into_iter().filter(|v| seen.insert(v.id())).collect()
    }

    fn shells(&self) -> Vec<Shell> {
        match self {
            TruckShape::Shell(s) => vec![s.clone()],
            TruckShape::Solid(s) => s.boundaries().clone(),
            TruckShape::Compound(children) => children.iter().flat_map(|c| c.shells()).collect(),
            _ => Vec::new(),
        }
    }

    fn solids(&self) -> Vec<Solid> {
        match self {
            TruckShape::Solid(s) => vec![s.clone()],
            TruckShape::Compound(children) => children.iter().flat_map(|c| c.solids()).collect(),
            _ => Vec::new(),
        }
    }

    fn count(&self, kind: TopoKind) -> usize {
        match kind {
            TopoKind::Vertex => self.vertices().len(),
            TopoKind::Edge => self.edges().len(),
            TopoKind::Face => self.faces().len(),
            TopoKind::Wire => self.wires().len(),
            TopoKind::Shell => self.shells().len(),
            TopoKind::Solid => self.solids().len(),
            TopoKind::Compound => usize::from(self.kind() == TopoKind::Compound),
            TopoKind::CompSolid | TopoKind::Shape => 0,
        }
    }

    fn sub(&self, kind: TopoKind, index: usize) -> Option<TruckShape> {
        let i = index.checked_sub(1)?;
        match kind {
            TopoKind::Vertex => self.vertices().into_iter().nth(i).map(TruckShape::Vertex),
            TopoKind::Edge => self.edges().into_iter().nth(i).map(TruckShape::Edge),
            TopoKind::Face => self.faces().into_iter().nth(i).map(TruckShape::Face),
            TopoKind::Wire => self.wires().into_iter().nth(i).map(TruckShape::Wire),
            TopoKind::Shell => self.shells().into_iter().nth(i).map(TruckShape::Shell),
            TopoKind::Solid => self.solids().into_iter().nth(i).map(TruckShape::Solid),
            TopoKind::Compound if i == 0 && self.kind() == TopoKind::Compound => Some(self.clone()),
            _ => None,
        }
    }

    fn transformed(&self, matrix: &Transform) -> TruckShape {
        let mat = to_truck_matrix(matrix);
        match self {
            TruckShape::Vertex(v) => TruckShape::Vertex(builder::transformed(v, mat)),
            TruckShape::Edge(e) => TruckShape::Edge(builder::transformed(e, mat)),
            TruckShape::Face(f) => TruckShape::Face(builder::transformed(f, mat)),
            TruckShape::Wire(w) => TruckShape::Wire(builder::transformed(w, mat)),
            TruckShape::Shell(s) => TruckShape::Shell(builder::transformed(s, mat)),
            TruckShape::Solid(s) => TruckShape::Solid(builder::transformed(s, mat)),
            TruckShape::Compound(children) => {
                TruckShape::Compound(children.iter().map(|c| c.transformed(matrix)).collect())
            }
        }
    }
}

fn to_truck_matrix(m: &Transform) -> truck_modeling::Matrix4 {
    // cgmath takes columns, nalgebra indexes (row, col).
    truck_modeling::Matrix4::new(
        m[(0, 0)],
        m[(1, 0)],
        m[(2, 0)],
        m[(3, 0)],
        m[(0, 1)],
        m[(1, 1)],
        m[(2, 1)],
        m[(3, 1)],
        m[(0, 2)],
        m[(1, 2)],
        m[(2, 2)],
        m[(3, 2)],
        m[(0, 3)],
        m[(1, 3)],
        m[(2, 3)],
        m[(3, 3)],
    )
}

fn to_point(p: truck_modeling::Point3) -> Point3<f64> {
    Point3::new(p[0], p[1], p[2])
}

fn to_vector(v: truck_modeling::Vector3) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// Axis-aligned box from `origin` to `origin + size`, swept vertex to edge
/// to face to solid. The sweep order fixes the canonical element indexing.
fn swept_box(origin: &Point3<f64>, size: &Vector3<f64>) -> Solid {
    let corner = builder::vertex(truck_modeling::Point3::new(origin.x, origin.y, origin.z));
    let edge = builder::tsweep(&corner, truck_modeling::Vector3::new(size.x, 0.0, 0.0));
    let face = builder::tsweep(&edge, truck_modeling::Vector3::new(0.0, size.y, 0.0));
    builder::tsweep(&face, truck_modeling::Vector3::new(0.0, 0.0, size.z))
}

/// One solid per non-empty boundary shell.
///
/// truck hands back the disjoint pieces of a boolean as extra shells of a
/// single solid. Inner cavity shells are not told apart from such pieces.
fn split_shells(result: &Solid) -> TruckShape {
    let mut solids: Vec<TruckShape> = result
        .boundaries()
        .iter()
        .filter(|shell| shell.face_iter().next().is_some())
        .filter_map(|shell| match Solid::try_new(vec![shell.clone()]) {
            Ok(solid) => Some(TruckShape::Solid(solid)),
            Err(e) => {
                warn!(error = %e, "dropping boolean shell that is not a closed solid");
                None
            }
        })
        .collect();
    if solids.len() == 1 {
        solids.remove(0)
    } else {
        TruckShape::Compound(solids)
    }
}

/// Pairs of (index in `child`, index in `parent`) for elements sharing a key.
fn shared_positions<T, K: Eq + Hash>(
    parent: &[T],
    child: &[T],
    key: impl Fn(&T) -> K,
) -> Vec<(usize, usize)> {
    let index: HashMap<K, usize> = parent
        .iter()
        .enumerate()
        .map(|(i, e)| (key(e), i + 1))
        .collect();
    child
        .iter()
        .enumerate()
        .filter_map(|(i, e)| index.get(&key(e)).map(|&p| (i + 1, p)))
        .collect()
}

/// Real geometry kernel backed by the truck BREP library.
pub struct TruckKernel {
    next_id: u64,
    shapes: HashMap<u64, TruckShape>,
    tolerance: f64,
}

impl TruckKernel {
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_BOOLEAN_TOLERANCE)
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            next_id: 0,
            shapes: HashMap::new(),
            tolerance,
        }
    }

    /// Tolerance handed to fuse and common.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn store(&mut self, shape: TruckShape) -> KernelShape {
        self.next_id += 1;
        self.shapes.insert(self.next_id, shape);
        KernelShape::new(self.next_id)
    }

    fn stored(&self, shape: &KernelShape) -> Result<&TruckShape, KernelError> {
        self.shapes
            .get(&shape.id)
            .ok_or(KernelError::ShapeNotFound { id: shape.id })
    }

    /// The shape with its location baked in.
    fn world(&self, shape: &KernelShape) -> Result<TruckShape, KernelError> {
        let stored = self.stored(shape)?;
        if shape.location == Transform::identity() {
            Ok(stored.clone())
        } else {
            Ok(stored.transformed(&shape.location))
        }
    }

    fn single_solid(&self, shape: &KernelShape) -> Result<Solid, KernelError> {
        let mut solids = self.world(shape)?.solids();
        match solids.len() {
            1 => Ok(solids.remove(0)),
            n => Err(KernelError::NotSupported {
                operation: format!("boolean on a shape with {n} solids"),
            }),
        }
    }
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeIntrospect for TruckKernel {
    fn shape_kind(&self, shape: &KernelShape) -> Result<TopoKind, KernelError> {
        Ok(self.stored(shape)?.kind())
    }

    fn count_sub_shapes(&self, shape: &KernelShape, kind: TopoKind) -> Result<usize, KernelError> {
        Ok(self.stored(shape)?.count(kind))
    }

    fn curve_type(&self, shape: &KernelShape, index: usize) -> Result<CurveType, KernelError> {
        let stored = self.stored(shape)?;
        let edges = stored.edges();
        let edge = index
            .checked_sub(1)
            .and_then(|i| edges.get(i))
            .ok_or(KernelError::IndexOutOfRange {
                kind: TopoKind::Edge,
                index,
                count: edges.len(),
            })?;
        // Swept circles come back as NURBS and are not recognized as circles.
        Ok(match edge.curve() {
            Curve::Line(_) => CurveType::Line,
            _ => CurveType::Other,
        })
    }

    fn bounding_box(&self, shape: &KernelShape) -> Result<BoundingBox, KernelError> {
        let points: Vec<Point3<f64>> = self
            .stored(shape)?
            .vertices()
            .iter()
            .map(|v| shape.location.transform_point(&to_point(v.point())))
            .collect();
        BoundingBox::from_points(&points).ok_or_else(|| KernelError::Failure {
            message: "bounding box of an empty shape".into(),
        })
    }

    fn face_centroid(&self, face: &KernelShape) -> Result<Point3<f64>, KernelError> {
        let faces = self.stored(face)?.faces();
        let [single] = faces.as_slice() else {
            return Err(KernelError::NotSupported {
                operation: format!("centroid of a shape with {} faces", faces.len()),
            });
        };
        let points: Vec<Point3<f64>> = single
            .boundaries()
            .iter()
            .flat_map(|w| w.vertex_iter().map(|v| to_point(v.point())).collect::<Vec<_>>())
            .collect();
        if points.is_empty() {
            return Err(KernelError::Failure {
                message: "face without boundary vertices".into(),
            });
        }
        let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Ok(face
            .location
            .transform_point(&Point3::from(sum / points.len() as f64)))
    }

    fn sub_shape_indices(
        &self,
        shape: &KernelShape,
        kind: TopoKind,
        index: usize,
        sub_kind: TopoKind,
    ) -> Result<Vec<(usize, usize)>, KernelError> {
        let stored = self.stored(shape)?;
        let piece = stored.sub(kind, index).ok_or(KernelError::IndexOutOfRange {
            kind,
            index,
            count: stored.count(kind),
        })?;
        // Extracted pieces share topology with the parent, so ids line up.
        Ok(match sub_kind {
            TopoKind::Vertex => shared_positions(&stored.vertices(), &piece.vertices(), |v| v.id()),
            TopoKind::Edge => shared_positions(&stored.edges(), &piece.edges(), |e| e.id()),
            TopoKind::Face => shared_positions(&stored.faces(), &piece.faces(), |f| f.id()),
            _ => Vec::new(),
        })
    }
}

impl ShapeBuilder for TruckKernel {
    fn sub_shape(
        &mut self,
        shape: &KernelShape,
        kind: TopoKind,
        index: usize,
    ) -> Result<KernelShape, KernelError> {
        let stored = self.stored(shape)?;
        let sub = stored.sub(kind, index).ok_or(KernelError::IndexOutOfRange {
            kind,
            index,
            count: stored.count(kind),
        })?;
        Ok(self.store(sub).located(shape.location))
    }

    fn intersect_line(
        &mut self,
        shape: &KernelShape,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        tolerance: f64,
    ) -> Result<Vec<LineHit>, KernelError> {
        let world = self.world(shape)?;
        let mut hits = Vec::new();
        for face in world.faces() {
            let Surface::Plane(plane) = face.oriented_surface() else {
                debug!("skipping non-planar face in line intersection");
                continue;
            };
            let normal = to_vector(plane.normal());
            let Some(t) = line_plane_parameter(origin, direction, &to_point(plane.origin()), &normal)
            else {
                continue;
            };
            let point = origin + direction * t;
            let Some(outer) = face.boundaries().into_iter().next() else {
                continue;
            };
            let corners: Vec<Point3<f64>> = outer.vertex_iter().map(|v| to_point(v.point())).collect();
            if polygon_contains(&corners, &normal, &point, tolerance) {
                hits.push((face, point));
            }
        }
        Ok(hits
            .into_iter()
            .map(|(face, point)| LineHit {
                face: self.store(TruckShape::Face(face)),
                point,
            })
            .collect())
    }

    fn make_compound(&mut self, shapes: &[KernelShape]) -> Result<KernelShape, KernelError> {
        let children = shapes
            .iter()
            .map(|s| self.world(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.store(TruckShape::Compound(children)))
    }

    fn transform_copy(
        &mut self,
        shape: &KernelShape,
        matrix: &Transform,
    ) -> Result<KernelShape, KernelError> {
        let baked = self.world(shape)?.transformed(matrix);
        Ok(self.store(baked))
    }

    fn fuse(&mut self, a: &KernelShape, b: &KernelShape) -> Result<ShapeResult, KernelError> {
        let (solid_a, solid_b) = (self.single_solid(a)?, self.single_solid(b)?);
        let result = truck_shapeops::or(&solid_a, &solid_b, self.tolerance).ok_or_else(|| {
            KernelError::BooleanFailed {
                reason: "truck or() returned None".to_string(),
            }
        })?;
        Ok(ShapeResult {
            shape: self.store(split_shells(&result)),
            history: ShapeHistory::default(),
        })
    }

    fn common(&mut self, a: &KernelShape, b: &KernelShape) -> Result<ShapeResult, KernelError> {
        let (solid_a, solid_b) = (self.single_solid(a)?, self.single_solid(b)?);
        let result = truck_shapeops::and(&solid_a, &solid_b, self.tolerance).ok_or_else(|| {
            KernelError::BooleanFailed {
                reason: "truck and() returned None".to_string(),
            }
        })?;
        Ok(ShapeResult {
            shape: self.store(split_shells(&result)),
            history: ShapeHistory::default(),
        })
    }

    fn make_box(
        &mut self,
        origin: Point3<f64>,
        size: Vector3<f64>,
    ) -> Result<KernelShape, KernelError> {
        if size.iter().any(|d| *d <= 0.0) {
            return Err(KernelError::Failure {
                message: format!("box dimensions must be positive, got {size:?}"),
            });
        }
        let solid = swept_box(&origin, &size);
        Ok(self.store(TruckShape::Solid(solid)))
    }

    fn fillet_edges(
        &mut self,
        _solid: &KernelShape,
        _edges: &[(usize, f64)],
    ) -> Result<ShapeResult, KernelError> {
        Err(KernelError::NotSupported {
            operation: "fillet_edges".to_string(),
        })
    }
}
