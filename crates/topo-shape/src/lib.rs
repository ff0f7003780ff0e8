//! Shape handle: kernel geometry plus a persistent element-naming map.
//!
//! A [`TopoShape`] is cheap to clone. Clones share the kernel geometry, the
//! element map (copy-on-write) and the related-element cache.

pub mod element_map;
mod naming;
mod related_cache;
mod shape;

pub use element_map::ElementMap;
pub use related_cache::RelatedElement;
pub use shape::TopoShape;

use naming_types::{IndexedName, NamingError};
use shape_kernel::KernelError;

/// Errors from shape-handle operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShapeError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("{element} is already named {existing:?}, refusing {proposed:?}")]
    NameConflict {
        element: IndexedName,
        existing: String,
        proposed: String,
    },

    #[error("mapped name {name:?} is already used by {element}")]
    DuplicateName { name: String, element: IndexedName },

    #[error("{name:?} is not a mapped name for {element}")]
    InvalidMappedName { element: IndexedName, name: String },
}
