//! MockKernel: deterministic test double implementing ShapeBuilder + ShapeIntrospect.
//!
//! Solids are axis-aligned boxes with the usual 8V/12E/6F topology. Booleans
//! work on box extents, which is enough to tell overlap, touch and separation
//! apart and to report predictable element history.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use nalgebra::{Point3, Vector3};

use crate::geom::{line_plane_parameter, polygon_contains};
use crate::traits::{ShapeBuilder, ShapeIntrospect};
use crate::types::*;

/// Two extents closer than this are considered touching.
const TOUCH_TOLERANCE: f64 = 1e-9;

/// Kernel entry points, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelCall {
    ShapeKind,
    CountSubShapes,
    CurveType,
    BoundingBox,
    FaceCentroid,
    SubShape,
    SubShapeIndices,
    IntersectLine,
    MakeCompound,
    TransformCopy,
    Fuse,
    Common,
    MakeBox,
    Fillet,
}

/// A mock edge with known endpoints.
#[derive(Debug, Clone)]
struct MockEdge {
    ends: [Point3<f64>; 2],
    curve: CurveType,
}

/// A planar mock face. `edges` index into the owning shape's edge list.
#[derive(Debug, Clone)]
struct MockFace {
    corners: Vec<Point3<f64>>,
    normal: Vector3<f64>,
    edges: Vec<usize>,
}

/// A synthetic shape with deterministic topology.
#[derive(Debug, Clone)]
struct MockShape {
    kind: TopoKind,
    vertices: Vec<Point3<f64>>,
    edges: Vec<MockEdge>,
    faces: Vec<MockFace>,
    solids: Vec<BoundingBox>,
}

impl MockShape {
    fn empty(kind: TopoKind) -> Self {
        Self {
            kind,
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            solids: Vec::new(),
        }
    }

    /// Box solid with 8 vertices, 12 edges, 6 faces.
    fn box_solid(bb: BoundingBox) -> Self {
        let corners = bb.corners();

        // 12 edges of a box: 4 bottom, 4 top, 4 vertical
        let edge_pairs = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];
        let edges = edge_pairs
            .iter()
            .map(|&(s, e)| MockEdge {
                ends: [corners[s], corners[e]],
                curve: CurveType::Line,
            })
            .collect();

        // bottom (z-), top (z+), front (y-), back (y+), left (x-), right (x+)
        let face_defs: [([usize; 4], [usize; 4], [f64; 3]); 6] = [
            ([0, 1, 2, 3], [0, 1, 2, 3], [0.0, 0.0, -1.0]),
            ([4, 5, 6, 7], [4, 5, 6, 7], [0.0, 0.0, 1.0]),
            ([0, 1, 5, 4], [0, 9, 4, 8], [0.0, -1.0, 0.0]),
            ([3, 2, 6, 7], [2, 11, 6, 10], [0.0, 1.0, 0.0]),
            ([0, 3, 7, 4], [3, 8, 7, 11], [-1.0, 0.0, 0.0]),
            ([1, 2, 6, 5], [1, 10, 5, 9], [1.0, 0.0, 0.0]),
        ];
        let faces = face_defs
            .iter()
            .map(|(verts, edges, normal)| MockFace {
                corners: verts.iter().map(|&i| corners[i]).collect(),
                normal: Vector3::from(*normal),
                edges: edges.to_vec(),
            })
            .collect();

        Self {
            kind: TopoKind::Solid,
            vertices: corners.to_vec(),
            edges,
            faces,
            solids: vec![bb],
        }
    }

    fn transformed(&self, matrix: &Transform) -> Self {
        let point = |p: &Point3<f64>| matrix.transform_point(p);
        Self {
            kind: self.kind,
            vertices: self.vertices.iter().map(point).collect(),
            edges: self
                .edges
                .iter()
                .map(|e| MockEdge {
                    ends: [point(&e.ends[0]), point(&e.ends[1])],
                    curve: e.curve,
                })
                .collect(),
            faces: self
                .faces
                .iter()
                .map(|f| MockFace {
                    corners: f.corners.iter().map(point).collect(),
                    normal: matrix
                        .transform_vector(&f.normal)
                        .try_normalize(f64::EPSILON)
                        .unwrap_or(f.normal),
                    edges: f.edges.clone(),
                })
                .collect(),
            solids: self.solids.iter().map(|bb| bb.transformed(matrix)).collect(),
        }
    }

    /// Append `other`'s topology, keeping face→edge indices consistent.
    fn append(&mut self, other: &MockShape) {
        let edge_offset = self.edges.len();
        self.vertices.extend(other.vertices.iter().copied());
        self.edges.extend(other.edges.iter().cloned());
        self.faces.extend(other.faces.iter().map(|f| MockFace {
            corners: f.corners.clone(),
            normal: f.normal,
            edges: f.edges.iter().map(|e| e + edge_offset).collect(),
        }));
        self.solids.extend(other.solids.iter().copied());
    }

    fn count(&self, kind: TopoKind) -> usize {
        match kind {
            TopoKind::Vertex => self.vertices.len(),
            TopoKind::Edge => self.edges.len(),
            TopoKind::Face | TopoKind::Wire => self.faces.len(),
            TopoKind::Shell | TopoKind::Solid => self.solids.len(),
            TopoKind::Compound => usize::from(self.kind == TopoKind::Compound),
            TopoKind::CompSolid | TopoKind::Shape => 0,
        }
    }

    fn sub(&self, kind: TopoKind, index: usize) -> Option<MockShape> {
        let i = index.checked_sub(1)?;
        match kind {
            TopoKind::Vertex => {
                let mut out = MockShape::empty(TopoKind::Vertex);
                out.vertices.push(*self.vertices.get(i)?);
                Some(out)
            }
            TopoKind::Edge => {
                let edge = self.edges.get(i)?.clone();
                let mut out = MockShape::empty(TopoKind::Edge);
                out.vertices.extend(edge.ends);
                out.edges.push(edge);
                Some(out)
            }
            TopoKind::Face | TopoKind::Wire => {
                let face = self.faces.get(i)?;
                let mut out = MockShape::empty(kind);
                out.vertices = face.corners.clone();
                out.edges = face
                    .edges
                    .iter()
                    .filter_map(|&e| self.edges.get(e).cloned())
                    .collect();
                if kind == TopoKind::Face {
                    out.faces.push(MockFace {
                        corners: face.corners.clone(),
                        normal: face.normal,
                        edges: (0..out.edges.len()).collect(),
                    });
                }
                Some(out)
            }
            TopoKind::Shell | TopoKind::Solid => {
                let mut out = MockShape::box_solid(*self.solids.get(i)?);
                out.kind = kind;
                Some(out)
            }
            TopoKind::Compound if i == 0 && self.kind == TopoKind::Compound => Some(self.clone()),
            _ => None,
        }
    }

    /// Pairs of (index in `piece`, index in `self`) for the elements of
    /// `kind` that sit in the same place. Coincident elements resolve to
    /// the lowest index.
    fn matching(&self, piece: &MockShape, kind: TopoKind) -> Vec<(usize, usize)> {
        fn pair<T>(parent: &[T], child: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<(usize, usize)> {
            child
                .iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    parent
                        .iter()
                        .position(|p| same(p, c))
                        .map(|p| (i + 1, p + 1))
                })
                .collect()
        }
        match kind {
            TopoKind::Vertex => pair(&self.vertices, &piece.vertices, |a, b| a == b),
            TopoKind::Edge => pair(&self.edges, &piece.edges, |a, b| {
                a.ends == b.ends || a.ends == [b.ends[1], b.ends[0]]
            }),
            TopoKind::Face => pair(&self.faces, &piece.faces, |a, b| a.corners == b.corners),
            _ => Vec::new(),
        }
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        let corners: Vec<Point3<f64>> = self.solids.iter().flat_map(|bb| bb.corners()).collect();
        BoundingBox::from_points(self.vertices.iter().chain(corners.iter()))
    }
}

/// Deterministic test double for the geometry kernel.
/// Implements both ShapeBuilder and ShapeIntrospect.
#[derive(Debug, Default)]
pub struct MockKernel {
    next_id: u64,
    shapes: HashMap<u64, MockShape>,
    calls: RefCell<HashMap<KernelCall, usize>>,
    failures: HashMap<KernelCall, String>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `call` was entered since creation or the last reset.
    pub fn call_count(&self, call: KernelCall) -> usize {
        self.calls.borrow().get(&call).copied().unwrap_or(0)
    }

    pub fn reset_call_counts(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Make every subsequent `call` fail with `message` (which may be empty).
    pub fn fail_on(&mut self, call: KernelCall, message: impl Into<String>) {
        self.failures.insert(call, message.into());
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    fn enter(&self, call: KernelCall) -> Result<(), KernelError> {
        *self.calls.borrow_mut().entry(call).or_insert(0) += 1;
        match self.failures.get(&call) {
            Some(message) => Err(KernelError::Failure {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn store(&mut self, shape: MockShape) -> KernelShape {
        self.next_id += 1;
        self.shapes.insert(self.next_id, shape);
        KernelShape::new(self.next_id)
    }

    fn stored(&self, shape: &KernelShape) -> Result<&MockShape, KernelError> {
        self.shapes
            .get(&shape.id)
            .ok_or(KernelError::ShapeNotFound { id: shape.id })
    }

    /// The shape with its location baked in.
    fn world(&self, shape: &KernelShape) -> Result<MockShape, KernelError> {
        let stored = self.stored(shape)?;
        if shape.location == Transform::identity() {
            Ok(stored.clone())
        } else {
            Ok(stored.transformed(&shape.location))
        }
    }

    fn solids_of(shape: &MockShape, operation: &str) -> Result<(), KernelError> {
        if shape.solids.is_empty() {
            return Err(KernelError::BooleanFailed {
                reason: format!("{operation} needs solid arguments"),
            });
        }
        Ok(())
    }
}

fn touches(a: &BoundingBox, b: &BoundingBox) -> bool {
    !a.is_out(b, TOUCH_TOLERANCE)
}

/// Group boxes into connected bodies and return one enclosing box per body.
fn merge_connected(boxes: &[BoundingBox]) -> Vec<BoundingBox> {
    let mut groups: Vec<BoundingBox> = Vec::new();
    let mut pending: Vec<BoundingBox> = boxes.to_vec();
    while let Some(mut body) = pending.pop() {
        loop {
            let before = pending.len();
            pending.retain(|other| {
                if touches(&body, other) {
                    body = body.union(other);
                    false
                } else {
                    true
                }
            });
            if pending.len() == before {
                break;
            }
        }
        groups.push(body);
    }
    groups.reverse();
    groups
}

impl ShapeIntrospect for MockKernel {
    fn shape_kind(&self, shape: &KernelShape) -> Result<TopoKind, KernelError> {
        self.enter(KernelCall::ShapeKind)?;
        Ok(self.stored(shape)?.kind)
    }

    fn count_sub_shapes(&self, shape: &KernelShape, kind: TopoKind) -> Result<usize, KernelError> {
        self.enter(KernelCall::CountSubShapes)?;
        Ok(self.stored(shape)?.count(kind))
    }

    fn curve_type(&self, shape: &KernelShape, index: usize) -> Result<CurveType, KernelError> {
        self.enter(KernelCall::CurveType)?;
        let stored = self.stored(shape)?;
        index
            .checked_sub(1)
            .and_then(|i| stored.edges.get(i))
            .map(|e| e.curve)
            .ok_or(KernelError::IndexOutOfRange {
                kind: TopoKind::Edge,
                index,
                count: stored.edges.len(),
            })
    }

    fn bounding_box(&self, shape: &KernelShape) -> Result<BoundingBox, KernelError> {
        self.enter(KernelCall::BoundingBox)?;
        let bb = self
            .stored(shape)?
            .bounding_box()
            .ok_or_else(|| KernelError::Failure {
                message: "bounding box of an empty shape".into(),
            })?;
        Ok(bb.transformed(&shape.location))
    }

    fn face_centroid(&self, face: &KernelShape) -> Result<Point3<f64>, KernelError> {
        self.enter(KernelCall::FaceCentroid)?;
        let stored = self.stored(face)?;
        let [single] = stored.faces.as_slice() else {
            return Err(KernelError::NotSupported {
                operation: format!("centroid of a shape with {} faces", stored.faces.len()),
            });
        };
        let sum = single
            .corners
            .iter()
            .fold(Vector3::zeros(), |acc, c| acc + c.coords);
        let centroid = Point3::from(sum / single.corners.len() as f64);
        Ok(face.location.transform_point(&centroid))
    }

    fn sub_shape_indices(
        &self,
        shape: &KernelShape,
        kind: TopoKind,
        index: usize,
        sub_kind: TopoKind,
    ) -> Result<Vec<(usize, usize)>, KernelError> {
        self.enter(KernelCall::SubShapeIndices)?;
        let stored = self.stored(shape)?;
        let piece = stored
            .sub(kind, index)
            .ok_or(KernelError::IndexOutOfRange {
                kind,
                index,
                count: stored.count(kind),
            })?;
        Ok(stored.matching(&piece, sub_kind))
    }
}

impl ShapeBuilder for MockKernel {
    fn sub_shape(
        &mut self,
        shape: &KernelShape,
        kind: TopoKind,
        index: usize,
    ) -> Result<KernelShape, KernelError> {
        self.enter(KernelCall::SubShape)?;
        let stored = self.stored(shape)?;
        let sub = stored
            .sub(kind, index)
            .ok_or(KernelError::IndexOutOfRange {
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
        self.enter(KernelCall::IntersectLine)?;
        let world = self.world(shape)?;
        let mut hits = Vec::new();
        for (i, face) in world.faces.iter().enumerate() {
            let Some(t) = line_plane_parameter(origin, direction, &face.corners[0], &face.normal)
            else {
                continue;
            };
            let point = origin + direction * t;
            if polygon_contains(&face.corners, &face.normal, &point, tolerance) {
                hits.push((i + 1, point));
            }
        }
        hits.into_iter()
            .map(|(index, point)| {
                let sub = world
                    .sub(TopoKind::Face, index)
                    .ok_or(KernelError::IndexOutOfRange {
                        kind: TopoKind::Face,
                        index,
                        count: world.faces.len(),
                    })?;
                Ok(LineHit {
                    face: self.store(sub),
                    point,
                })
            })
            .collect()
    }

    fn make_compound(&mut self, shapes: &[KernelShape]) -> Result<KernelShape, KernelError> {
        self.enter(KernelCall::MakeCompound)?;
        let mut compound = MockShape::empty(TopoKind::Compound);
        for shape in shapes {
            compound.append(&self.world(shape)?);
        }
        Ok(self.store(compound))
    }

    fn transform_copy(
        &mut self,
        shape: &KernelShape,
        matrix: &Transform,
    ) -> Result<KernelShape, KernelError> {
        self.enter(KernelCall::TransformCopy)?;
        let baked = self.world(shape)?.transformed(matrix);
        Ok(self.store(baked))
    }

    fn fuse(&mut self, a: &KernelShape, b: &KernelShape) -> Result<ShapeResult, KernelError> {
        self.enter(KernelCall::Fuse)?;
        let (wa, wb) = (self.world(a)?, self.world(b)?);
        Self::solids_of(&wa, "fuse")?;
        Self::solids_of(&wb, "fuse")?;

        let mut history = ShapeHistory::default();
        let mut fused = MockShape::empty(TopoKind::Solid);
        for (input, part) in [&wa, &wb].into_iter().enumerate() {
            for kind in [TopoKind::Vertex, TopoKind::Edge, TopoKind::Face] {
                let offset = fused.count(kind);
                for i in 1..=part.count(kind) {
                    history.push(
                        IndexedName::new(kind, offset + i),
                        input,
                        IndexedName::new(kind, i),
                        HistoryKind::Modified,
                    );
                }
            }
            fused.append(part);
        }
        fused.solids = merge_connected(&fused.solids);
        if fused.solids.len() > 1 {
            fused.kind = TopoKind::Compound;
        }
        Ok(ShapeResult {
            shape: self.store(fused),
            history,
        })
    }

    fn common(&mut self, a: &KernelShape, b: &KernelShape) -> Result<ShapeResult, KernelError> {
        self.enter(KernelCall::Common)?;
        let (wa, wb) = (self.world(a)?, self.world(b)?);
        Self::solids_of(&wa, "common")?;
        Self::solids_of(&wb, "common")?;

        let mut result = MockShape::empty(TopoKind::Compound);
        for sa in &wa.solids {
            for sb in &wb.solids {
                let overlap = BoundingBox {
                    min: sa.min.sup(&sb.min),
                    max: sa.max.inf(&sb.max),
                };
                let size = overlap.size();
                if size.iter().any(|d| *d < -TOUCH_TOLERANCE) {
                    continue;
                }
                let thick = size.iter().filter(|d| **d > TOUCH_TOLERANCE).count();
                if thick == 3 {
                    result.append(&MockShape::box_solid(overlap));
                    continue;
                }
                // Pure contact: keep the lower-dimensional leftover only.
                let contact = MockShape::box_solid(overlap);
                match thick {
                    2 => {
                        // left, front or bottom face of the flat box
                        let flat = (0..3).find(|&i| size[i] <= TOUCH_TOLERANCE).unwrap_or(2);
                        if let Some(face) = contact.sub(TopoKind::Face, [5, 3, 1][flat]) {
                            result.append(&face);
                        }
                    }
                    1 => {
                        let along = (0..3).find(|&i| size[i] > TOUCH_TOLERANCE).unwrap_or(0);
                        let edge_index = [1, 2, 9][along];
                        if let Some(edge) = contact.sub(TopoKind::Edge, edge_index) {
                            result.append(&edge);
                        }
                    }
                    _ => result.vertices.push(overlap.min),
                }
            }
        }
        Ok(ShapeResult {
            shape: self.store(result),
            history: ShapeHistory::default(),
        })
    }

    fn make_box(
        &mut self,
        origin: Point3<f64>,
        size: Vector3<f64>,
    ) -> Result<KernelShape, KernelError> {
        self.enter(KernelCall::MakeBox)?;
        if size.iter().any(|d| *d <= 0.0) {
            return Err(KernelError::Failure {
                message: format!("box dimensions must be positive, got {size:?}"),
            });
        }
        let bb = BoundingBox {
            min: origin,
            max: origin + size,
        };
        Ok(self.store(MockShape::box_solid(bb)))
    }

    fn fillet_edges(
        &mut self,
        solid: &KernelShape,
        edges: &[(usize, f64)],
    ) -> Result<ShapeResult, KernelError> {
        self.enter(KernelCall::Fillet)?;
        let input = self.world(solid)?;
        let Some(body) = input.bounding_box().filter(|_| !input.solids.is_empty()) else {
            return Err(KernelError::FilletFailed {
                reason: "fillet needs a solid".into(),
            });
        };
        if edges.is_empty() {
            return Err(KernelError::FilletFailed {
                reason: "no edges selected".into(),
            });
        }
        let mut rounded = HashSet::new();
        for &(index, radius) in edges {
            if index == 0 || index > input.edges.len() {
                return Err(KernelError::FilletFailed {
                    reason: format!("edge index {index} out of range"),
                });
            }
            if radius <= 0.0 {
                return Err(KernelError::FilletFailed {
                    reason: format!("radius {radius} on Edge{index} must be positive"),
                });
            }
            if !rounded.insert(index - 1) {
                return Err(KernelError::FilletFailed {
                    reason: format!("Edge{index} selected twice"),
                });
            }
        }

        let center = Point3::from((body.min.coords + body.max.coords) / 2.0);
        let mut history = ShapeHistory::default();
        let mut out = MockShape::empty(input.kind);
        out.solids = input.solids.clone();

        for (i, v) in input.vertices.iter().enumerate() {
            out.vertices.push(*v);
            history.push(
                IndexedName::new(TopoKind::Vertex, i + 1),
                0,
                IndexedName::new(TopoKind::Vertex, i + 1),
                HistoryKind::Modified,
            );
        }

        let mut edge_map: HashMap<usize, usize> = HashMap::new();
        for (i, e) in input.edges.iter().enumerate() {
            if rounded.contains(&i) {
                continue;
            }
            edge_map.insert(i, out.edges.len());
            out.edges.push(e.clone());
            history.push(
                IndexedName::new(TopoKind::Edge, out.edges.len()),
                0,
                IndexedName::new(TopoKind::Edge, i + 1),
                HistoryKind::Modified,
            );
        }

        for (i, f) in input.faces.iter().enumerate() {
            out.faces.push(MockFace {
                corners: f.corners.clone(),
                normal: f.normal,
                edges: f.edges.iter().filter_map(|e| edge_map.get(e).copied()).collect(),
            });
            history.push(
                IndexedName::new(TopoKind::Face, i + 1),
                0,
                IndexedName::new(TopoKind::Face, i + 1),
                HistoryKind::Modified,
            );
        }

        for &(index, radius) in edges {
            let source = IndexedName::new(TopoKind::Edge, index);
            let [a, b] = input.edges[index - 1].ends;
            let along = (b - a).try_normalize(f64::EPSILON).unwrap_or_else(Vector3::x);
            let to_center = center - a;
            let inward = (to_center - along * to_center.dot(&along))
                .try_normalize(f64::EPSILON)
                .unwrap_or_else(Vector3::z);
            let (a2, b2) = (a + inward * radius, b + inward * radius);

            for p in [a2, b2] {
                out.vertices.push(p);
                history.push(
                    IndexedName::new(TopoKind::Vertex, out.vertices.len()),
                    0,
                    source,
                    HistoryKind::Generated,
                );
            }
            let first_arc = out.edges.len();
            for ends in [[a, a2], [b, b2]] {
                out.edges.push(MockEdge {
                    ends,
                    curve: CurveType::Circle,
                });
                history.push(
                    IndexedName::new(TopoKind::Edge, out.edges.len()),
                    0,
                    source,
                    HistoryKind::Generated,
                );
            }
            let mut normal = along.cross(&inward);
            if normal.dot(&(a - center)) < 0.0 {
                normal = -normal;
            }
            out.faces.push(MockFace {
                corners: vec![a, b, b2, a2],
                normal,
                edges: vec![first_arc, first_arc + 1],
            });
            history.push(
                IndexedName::new(TopoKind::Face, out.faces.len()),
                0,
                source,
                HistoryKind::Generated,
            );
        }

        Ok(ShapeResult {
            shape: self.store(out),
            history,
        })
    }
}
