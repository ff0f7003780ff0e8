use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use modeling_ops::OpError;
use naming_types::ObjectTag;
use shape_kernel::KernelError;
use topo_shape::ShapeError;

/// Identifier of a document in a workspace.
pub type DocumentId = Uuid;

/// Fallback message for kernel failures that carry none.
pub const UNKNOWN_KERNEL_EXCEPTION: &str = "Unknown kernel exception";

/// An object addressed by its document and document-local tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub doc: DocumentId,
    pub tag: ObjectTag,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.tag, self.doc)
    }
}

/// Visibility of a child as seen by its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementVisibility {
    Visible,
    Hidden,
    /// No override: the child's own visibility applies.
    Inherited,
}

/// One step of an element's provenance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    /// Feature holding `element`. `None` for the root of the chain, or when
    /// a shallow lookup could not resolve the upstream feature.
    pub object: Option<ObjectRef>,
    pub element: String,
    /// Upstream tag reported for `element`, 0 at the root.
    pub tag: ObjectTag,
    pub intermediates: Vec<String>,
}

/// Outcome of a feature's last recompute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureStatus {
    #[default]
    Touched,
    Valid,
    Failed { message: String },
}

/// Errors from workspace and document operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("document not found: {doc}")]
    DocumentNotFound { doc: DocumentId },

    #[error("object not found: {object}")]
    ObjectNotFound { object: ObjectRef },

    #[error("object {name:?} already exists in the document")]
    DuplicateName { name: String },

    #[error("object {object} is not a {expected}")]
    WrongObjectKind {
        object: ObjectRef,
        expected: &'static str,
    },

    #[error("cyclic dependency between {objects:?}")]
    CyclicDependency { objects: Vec<String> },

    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },
}

/// Failure of a single feature's compute step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("{message}")]
    Kernel { message: String },

    #[error("missing input: {what}")]
    MissingInput { what: String },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("{message}")]
    Failed { message: String },
}

impl From<KernelError> for FeatureError {
    fn from(e: KernelError) -> Self {
        FeatureError::Kernel {
            message: e
                .message()
                .unwrap_or_else(|| UNKNOWN_KERNEL_EXCEPTION.to_string()),
        }
    }
}

impl From<ShapeError> for FeatureError {
    fn from(e: ShapeError) -> Self {
        match e {
            ShapeError::Kernel(k) => k.into(),
            other => FeatureError::Failed {
                message: other.to_string(),
            },
        }
    }
}

impl From<OpError> for FeatureError {
    fn from(e: OpError) -> Self {
        match e {
            OpError::Kernel(k) => k.into(),
            OpError::Shape(s) => s.into(),
            other => FeatureError::Failed {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_kernel_message_gets_fallback() {
        let err: FeatureError = KernelError::Failure {
            message: String::new(),
        }
        .into();
        assert_eq!(err.to_string(), UNKNOWN_KERNEL_EXCEPTION);

        let err: FeatureError = ShapeError::Kernel(KernelError::Failure {
            message: "bad edge".into(),
        })
        .into();
        assert_eq!(err.to_string(), "bad edge");
    }

    #[test]
    fn status_serializes_tagged() {
        let json = serde_json::to_string(&FeatureStatus::Failed {
            message: "x".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"Failed","message":"x"}"#);
    }
}
