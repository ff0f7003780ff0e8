use topo_shape::{ShapeError, TopoShape};

/// A face hit by a line, with the squared distance from the line's origin.
#[derive(Debug, Clone)]
pub struct CutFace {
    pub face: TopoShape,
    pub distance_sq: f64,
}

/// Errors from geometric set operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    #[error("kernel error: {0}")]
    Kernel(#[from] shape_kernel::KernelError),

    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("{operation} needs a non-null shape")]
    NullShape { operation: &'static str },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },
}
