//! Stateless geometric queries used by boolean-style features.

pub mod cut_faces;
pub mod intersection;
pub mod types;

pub use cut_faces::find_all_faces_cut_by;
pub use intersection::check_intersection;
pub use types::*;
