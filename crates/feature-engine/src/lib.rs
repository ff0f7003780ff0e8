//! Document model and shape resolution for parametric part features.
//!
//! A [`Workspace`] holds documents of features, groups and links. Features
//! compute tagged [`TopoShape`]s; [`resolve_shape`] turns an object plus
//! sub-path into a placed shape, and the history queries follow element
//! names back across feature boundaries.

pub mod document;
pub mod feature;
pub mod features;
pub mod graph;
pub mod history;
pub mod rebuild;
pub mod related;
pub mod resolve;
pub mod settings;
pub mod types;

pub use document::{Document, DocumentObject, Group, Link, ObjectKind, PartObject, Workspace};
pub use feature::{ElementLinks, FeatureBehavior, PART_VIEW_PROVIDER};
pub use graph::{ObjectGraph, SubObject};
pub use history::{element_history, element_source, upstream_object};
pub use rebuild::RecomputeReport;
pub use related::related_elements;
pub use resolve::{resolve_shape, shape_owner, ResolveOptions, ResolvedShape, ShapeContext};
pub use settings::PartSettings;
pub use types::{
    DocumentId, ElementVisibility, EngineError, FeatureError, FeatureStatus, HistoryItem,
    ObjectRef, UNKNOWN_KERNEL_EXCEPTION,
};

pub use topo_shape::{RelatedElement, TopoShape};
