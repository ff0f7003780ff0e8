use naming_types::ObjectTag;
use shape_kernel::Transform;
use topo_shape::TopoShape;

use crate::types::{DocumentId, ElementVisibility, ObjectRef};

/// An object reached through a sub-path, with the placement accumulated on
/// the way.
#[derive(Debug, Clone, PartialEq)]
pub struct SubObject {
    pub owner: ObjectRef,
    pub matrix: Transform,
}

/// The document-object graph as seen by shape resolution.
pub trait ObjectGraph {
    fn object_name(&self, object: ObjectRef) -> Option<&str>;

    /// Object `tag` of document `doc`.
    fn object_by_id(&self, doc: DocumentId, tag: ObjectTag) -> Option<ObjectRef>;

    /// Follow the object part of `path` (dot-terminated child names) from
    /// `object`, starting from `matrix`.
    ///
    /// Every descended object's placement is multiplied in. The starting
    /// object's placement only when `transform` is set.
    fn sub_object(
        &self,
        object: ObjectRef,
        path: &str,
        transform: bool,
        matrix: &Transform,
    ) -> Option<SubObject>;

    /// Final target of a chain of links, or `object` itself.
    fn linked_object(&self, object: ObjectRef) -> ObjectRef;

    /// Direct target of a link.
    fn link_target(&self, object: ObjectRef) -> Option<ObjectRef>;

    /// Child names, each ending with `.`.
    fn sub_objects(&self, object: ObjectRef) -> Vec<String>;

    /// Visibility override of child `name` inside `object`.
    fn is_element_visible(&self, object: ObjectRef, name: &str) -> ElementVisibility;

    fn is_visible(&self, object: ObjectRef) -> bool;

    /// Stored shape of a shape-producing object.
    fn shape_property(&self, object: ObjectRef) -> Option<&TopoShape>;
}
