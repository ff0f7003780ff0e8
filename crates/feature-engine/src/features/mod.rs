//! Built-in feature behaviors.

mod custom;
mod fillet;
mod fuse;
mod primitive;

pub use custom::{ComputeFn, CustomFeature, PYTHON_VIEW_PROVIDER};
pub use fillet::{FilletElement, FilletFeature, BASE, EDGES, EDGE_LINKS};
pub use fuse::FuseFeature;
pub use primitive::BoxFeature;
