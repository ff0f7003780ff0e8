//! Element naming conventions shared by every layer: topological kinds,
//! canonical `<Prefix><index>` names, and history-carrying mapped names.

pub mod indexed;
pub mod mapped;
pub mod topo;

pub use indexed::*;
pub use mapped::*;
pub use topo::*;

/// Document-local integer ID of the object owning a shape. 0 means none.
pub type ObjectTag = i64;

/// Errors from building or parsing element names.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NamingError {
    #[error("invalid canonical element name: {name}")]
    InvalidCanonicalName { name: String },

    #[error("invalid naming op: {op:?}")]
    InvalidOp { op: String },

    #[error("invalid mapped-name source: {name:?}")]
    InvalidSource { name: String },

    #[error("element kind {kind} has no type code")]
    UntypedElement { kind: TopoKind },
}
