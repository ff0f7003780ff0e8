use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

pub use naming_types::{IndexedName, TopoKind};

/// Affine 4x4 transform applied to shapes and placements.
pub type Transform = Matrix4<f64>;

/// Opaque handle to a shape stored in a kernel, plus its location.
///
/// Like a located B-rep shape: two handles may share the same stored geometry
/// under different locations. NEVER persisted. Valid only for the kernel
/// session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelShape {
    pub(crate) id: u64,
    pub(crate) location: Transform,
}

impl KernelShape {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            location: Transform::identity(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &Transform {
        &self.location
    }

    /// Same geometry, location replaced.
    pub fn located(&self, location: Transform) -> KernelShape {
        Self {
            id: self.id,
            location,
        }
    }

    /// Same geometry, `matrix` applied on top of the current location.
    pub fn moved(&self, matrix: &Transform) -> KernelShape {
        self.located(matrix * self.location)
    }
}

/// Errors from kernel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("boolean operation failed: {reason}")]
    BooleanFailed { reason: String },

    #[error("fillet failed: {reason}")]
    FilletFailed { reason: String },

    #[error("shape not found: {id}")]
    ShapeNotFound { id: u64 },

    #[error("{kind} index {index} out of range (shape has {count})")]
    IndexOutOfRange {
        kind: TopoKind,
        index: usize,
        count: usize,
    },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },

    /// Raw kernel failure. The message may be empty.
    #[error("{message}")]
    Failure { message: String },
}

impl KernelError {
    /// The kernel's own message, if it gave one.
    pub fn message(&self) -> Option<String> {
        let text = self.to_string();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Curve class of an edge, as far as the consumers here care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    Line,
    Circle,
    Other,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Box enclosing `points`, `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(
            BoundingBox {
                min: first,
                max: first,
            },
            |mut bb, p| {
                for i in 0..3 {
                    bb.min[i] = bb.min[i].min(p[i]);
                    bb.max[i] = bb.max[i].max(p[i]);
                }
                bb
            },
        ))
    }

    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(b.x, b.y, b.z),
            Point3::new(a.x, b.y, b.z),
        ]
    }

    /// Axis-aligned box enclosing this box after `matrix`.
    pub fn transformed(&self, matrix: &Transform) -> Self {
        let corners = self.corners().map(|c| matrix.transform_point(&c));
        // Eight corners are never empty.
        BoundingBox::from_points(&corners).unwrap_or(*self)
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// True when the boxes, each enlarged by `gap`, share no point.
    /// Touching boxes are not out of each other.
    pub fn is_out(&self, other: &BoundingBox, gap: f64) -> bool {
        (0..3).any(|i| {
            self.min[i] - gap > other.max[i] + gap || other.min[i] - gap > self.max[i] + gap
        })
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

/// One intersection between a line and a face.
#[derive(Debug, Clone)]
pub struct LineHit {
    pub face: KernelShape,
    pub point: Point3<f64>,
}

/// How an output element relates to an input element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    /// The output element is a modified version of the input element.
    Modified,
    /// The output element was generated from the input element.
    Generated,
}

/// Output element `output` came from element `source` of input shape `input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub output: IndexedName,
    pub input: usize,
    pub source: IndexedName,
    pub kind: HistoryKind,
}

/// Element history reported by a modeling operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeHistory {
    pub entries: Vec<HistoryEntry>,
}

impl ShapeHistory {
    pub fn push(&mut self, output: IndexedName, input: usize, source: IndexedName, kind: HistoryKind) {
        self.entries.push(HistoryEntry {
            output,
            input,
            source,
            kind,
        });
    }

    /// First recorded source of `output`, if any.
    pub fn source_of(&self, output: &IndexedName) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| &e.output == output)
    }
}

/// Result shape of a modeling operation plus its element history.
#[derive(Debug, Clone)]
pub struct ShapeResult {
    pub shape: KernelShape,
    pub history: ShapeHistory,
}
