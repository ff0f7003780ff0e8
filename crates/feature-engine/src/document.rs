use std::collections::{BTreeMap, HashMap};

use tracing::debug;
use uuid::Uuid;

use naming_types::ObjectTag;
use shape_kernel::{ShapeKernel, Transform};
use topo_shape::TopoShape;

use crate::feature::FeatureBehavior;
use crate::graph::{ObjectGraph, SubObject};
use crate::resolve::ShapeContext;
use crate::settings::PartSettings;
use crate::types::{DocumentId, ElementVisibility, EngineError, FeatureStatus, ObjectRef};

/// A shape-producing feature: placement, stored shape and behavior.
#[derive(Debug)]
pub struct PartObject {
    pub(crate) placement: Transform,
    pub(crate) shape: TopoShape,
    pub(crate) behavior: Box<dyn FeatureBehavior>,
    pub(crate) status: FeatureStatus,
    pub(crate) touched: bool,
}

impl PartObject {
    fn new(behavior: Box<dyn FeatureBehavior>) -> Self {
        Self {
            placement: Transform::identity(),
            shape: TopoShape::null(),
            behavior,
            status: FeatureStatus::Touched,
            touched: true,
        }
    }

    pub fn placement(&self) -> &Transform {
        &self.placement
    }

    pub fn shape(&self) -> &TopoShape {
        &self.shape
    }

    pub fn status(&self) -> &FeatureStatus {
        &self.status
    }

    pub fn behavior(&self) -> &dyn FeatureBehavior {
        self.behavior.as_ref()
    }

    /// Placement changed: the shape follows.
    fn set_placement(&mut self, placement: Transform) {
        self.placement = placement;
        self.shape.set_transform(placement);
    }

    /// Shape changed. During recompute the shape takes the placement,
    /// otherwise a non-null shape's transform becomes the placement.
    pub(crate) fn set_shape(&mut self, mut shape: TopoShape, recomputing: bool) {
        if recomputing {
            shape.set_transform(self.placement);
        } else if !shape.is_null() {
            self.placement = shape.transform();
        }
        self.shape = shape;
    }
}

/// Named children with per-child visibility overrides.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub placement: Transform,
    pub children: Vec<ObjectTag>,
    pub overrides: HashMap<String, bool>,
}

/// A placed reference to another object, possibly in another document.
#[derive(Debug, Clone)]
pub struct Link {
    pub placement: Transform,
    pub target: ObjectRef,
}

#[derive(Debug)]
pub enum ObjectKind {
    Part(PartObject),
    Group(Group),
    Link(Link),
}

#[derive(Debug)]
pub struct DocumentObject {
    pub tag: ObjectTag,
    pub name: String,
    pub visible: bool,
    pub kind: ObjectKind,
}

impl DocumentObject {
    pub fn placement(&self) -> Transform {
        match &self.kind {
            ObjectKind::Part(part) => part.placement,
            ObjectKind::Group(group) => group.placement,
            ObjectKind::Link(link) => link.placement,
        }
    }

    pub fn as_part(&self) -> Option<&PartObject> {
        match &self.kind {
            ObjectKind::Part(part) => Some(part),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub(crate) objects: BTreeMap<ObjectTag, DocumentObject>,
    next_tag: ObjectTag,
    pub(crate) restoring: bool,
}

impl Document {
    fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            objects: BTreeMap::new(),
            next_tag: 1,
            restoring: false,
        }
    }

    pub fn object(&self, tag: ObjectTag) -> Option<&DocumentObject> {
        self.objects.get(&tag)
    }

    pub fn object_by_name(&self, name: &str) -> Option<&DocumentObject> {
        self.objects.values().find(|o| o.name == name)
    }

    /// Objects in creation order.
    pub fn objects(&self) -> impl Iterator<Item = &DocumentObject> {
        self.objects.values()
    }
}

/// In-memory documents plus the part settings they are evaluated with.
#[derive(Debug, Default)]
pub struct Workspace {
    pub(crate) documents: HashMap<DocumentId, Document>,
    pub(crate) settings: PartSettings,
}

impl Workspace {
    pub fn new(settings: PartSettings) -> Self {
        Self {
            documents: HashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &PartSettings {
        &self.settings
    }

    pub fn new_document(&mut self, name: &str) -> DocumentId {
        let doc = Document::new(name);
        let id = doc.id;
        self.documents.insert(id, doc);
        id
    }

    pub fn document(&self, doc: DocumentId) -> Option<&Document> {
        self.documents.get(&doc)
    }

    /// Resolution context over this workspace.
    pub fn context<'a>(&'a self, kernel: &'a mut dyn ShapeKernel) -> ShapeContext<'a> {
        ShapeContext::new(self, kernel, &self.settings)
    }

    pub(crate) fn document_mut(&mut self, doc: DocumentId) -> Result<&mut Document, EngineError> {
        self.documents
            .get_mut(&doc)
            .ok_or(EngineError::DocumentNotFound { doc })
    }

    pub fn object(&self, object: ObjectRef) -> Option<&DocumentObject> {
        self.documents.get(&object.doc)?.objects.get(&object.tag)
    }

    fn object_mut(&mut self, object: ObjectRef) -> Result<&mut DocumentObject, EngineError> {
        self.documents
            .get_mut(&object.doc)
            .and_then(|d| d.objects.get_mut(&object.tag))
            .ok_or(EngineError::ObjectNotFound { object })
    }

    pub(crate) fn part_mut(&mut self, object: ObjectRef) -> Result<&mut PartObject, EngineError> {
        match &mut self.object_mut(object)?.kind {
            ObjectKind::Part(part) => Ok(part),
            _ => Err(EngineError::WrongObjectKind {
                object,
                expected: "part feature",
            }),
        }
    }

    pub fn object_ref(&self, doc: DocumentId, name: &str) -> Option<ObjectRef> {
        let object = self.documents.get(&doc)?.object_by_name(name)?;
        Some(ObjectRef {
            doc,
            tag: object.tag,
        })
    }

    fn insert(
        &mut self,
        doc: DocumentId,
        name: &str,
        kind: ObjectKind,
    ) -> Result<ObjectRef, EngineError> {
        let document = self.document_mut(doc)?;
        if document.object_by_name(name).is_some() {
            return Err(EngineError::DuplicateName {
                name: name.to_string(),
            });
        }
        let tag = document.next_tag;
        document.next_tag += 1;
        document.objects.insert(
            tag,
            DocumentObject {
                tag,
                name: name.to_string(),
                visible: true,
                kind,
            },
        );
        debug!(name, tag, "added object");
        Ok(ObjectRef { doc, tag })
    }

    pub fn add_feature(
        &mut self,
        doc: DocumentId,
        name: &str,
        behavior: impl FeatureBehavior + 'static,
    ) -> Result<ObjectRef, EngineError> {
        let part = PartObject::new(Box::new(behavior));
        self.insert(doc, name, ObjectKind::Part(part))
    }

    /// Add a group over existing objects of the same document.
    pub fn add_group(
        &mut self,
        doc: DocumentId,
        name: &str,
        children: &[ObjectRef],
    ) -> Result<ObjectRef, EngineError> {
        for child in children {
            if child.doc != doc || self.object(*child).is_none() {
                return Err(EngineError::ObjectNotFound { object: *child });
            }
        }
        let group = Group {
            placement: Transform::identity(),
            children: children.iter().map(|c| c.tag).collect(),
            overrides: HashMap::new(),
        };
        self.insert(doc, name, ObjectKind::Group(group))
    }

    pub fn add_link(
        &mut self,
        doc: DocumentId,
        name: &str,
        target: ObjectRef,
    ) -> Result<ObjectRef, EngineError> {
        if self.object(target).is_none() {
            return Err(EngineError::ObjectNotFound { object: target });
        }
        let link = Link {
            placement: Transform::identity(),
            target,
        };
        self.insert(doc, name, ObjectKind::Link(link))
    }

    pub fn set_placement(
        &mut self,
        object: ObjectRef,
        placement: Transform,
    ) -> Result<(), EngineError> {
        match &mut self.object_mut(object)?.kind {
            ObjectKind::Part(part) => part.set_placement(placement),
            ObjectKind::Group(group) => group.placement = placement,
            ObjectKind::Link(link) => link.placement = placement,
        }
        Ok(())
    }

    pub fn set_visible(&mut self, object: ObjectRef, visible: bool) -> Result<(), EngineError> {
        self.object_mut(object)?.visible = visible;
        Ok(())
    }

    /// Override (or with `None`, inherit) a group child's visibility.
    pub fn set_child_visibility(
        &mut self,
        group: ObjectRef,
        child: &str,
        visible: Option<bool>,
    ) -> Result<(), EngineError> {
        let ObjectKind::Group(g) = &mut self.object_mut(group)?.kind else {
            return Err(EngineError::WrongObjectKind {
                object: group,
                expected: "group",
            });
        };
        match visible {
            Some(v) => g.overrides.insert(child.to_string(), v),
            None => g.overrides.remove(child),
        };
        Ok(())
    }

    /// Replace a feature's shape from outside a recompute.
    pub fn set_shape(&mut self, object: ObjectRef, shape: TopoShape) -> Result<(), EngineError> {
        self.part_mut(object)?.set_shape(shape, false);
        Ok(())
    }

    /// Edit a property of the feature behavior `F` and notify it.
    pub fn modify_feature<F, R>(
        &mut self,
        object: ObjectRef,
        property: &str,
        edit: impl FnOnce(&mut F) -> R,
    ) -> Result<R, EngineError>
    where
        F: FeatureBehavior + 'static,
    {
        let restoring = self
            .documents
            .get(&object.doc)
            .is_some_and(|d| d.restoring);
        let part = self.part_mut(object)?;
        let feature = part
            .behavior
            .as_any_mut()
            .downcast_mut::<F>()
            .ok_or(EngineError::WrongObjectKind {
                object,
                expected: std::any::type_name::<F>(),
            })?;
        let result = edit(feature);
        part.behavior.on_changed(property, restoring);
        part.touched = true;
        Ok(result)
    }

    pub fn feature<F: FeatureBehavior + 'static>(&self, object: ObjectRef) -> Option<&F> {
        self.object(object)?
            .as_part()?
            .behavior
            .as_any()
            .downcast_ref::<F>()
    }

    pub fn shape(&self, object: ObjectRef) -> Option<&TopoShape> {
        self.object(object)?.as_part().map(|p| &p.shape)
    }

    pub fn status(&self, object: ObjectRef) -> Option<&FeatureStatus> {
        self.object(object)?.as_part().map(|p| &p.status)
    }

    pub fn view_provider_name(&self, object: ObjectRef) -> Option<&str> {
        self.object(object)?
            .as_part()
            .map(|p| p.behavior.view_provider_name())
    }

    /// Finish loading a document: features get their restore hook while the
    /// document is flagged as restoring.
    pub fn restore_document(&mut self, doc: DocumentId) -> Result<(), EngineError> {
        let document = self.document_mut(doc)?;
        document.restoring = true;
        for object in document.objects.values_mut() {
            if let ObjectKind::Part(part) = &mut object.kind {
                part.behavior.on_document_restored();
            }
        }
        document.restoring = false;
        Ok(())
    }

    fn child_by_name(&self, parent: ObjectRef, name: &str) -> Option<ObjectRef> {
        let children = match &self.object(parent)?.kind {
            ObjectKind::Group(group) => &group.children,
            ObjectKind::Link(link) => return self.child_by_name(link.target, name),
            ObjectKind::Part(_) => return None,
        };
        let document = self.documents.get(&parent.doc)?;
        children
            .iter()
            .filter_map(|tag| document.objects.get(tag))
            .find(|o| o.name == name)
            .map(|o| ObjectRef {
                doc: parent.doc,
                tag: o.tag,
            })
    }
}

impl ObjectGraph for Workspace {
    fn object_name(&self, object: ObjectRef) -> Option<&str> {
        self.object(object).map(|o| o.name.as_str())
    }

    fn object_by_id(&self, doc: DocumentId, tag: ObjectTag) -> Option<ObjectRef> {
        self.documents
            .get(&doc)?
            .objects
            .contains_key(&tag)
            .then_some(ObjectRef { doc, tag })
    }

    fn sub_object(
        &self,
        object: ObjectRef,
        path: &str,
        transform: bool,
        matrix: &Transform,
    ) -> Option<SubObject> {
        let mut current = object;
        let mut matrix = *matrix;
        if transform {
            matrix *= self.object(current)?.placement();
        }
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = self.child_by_name(current, segment)?;
            matrix *= self.object(current)?.placement();
        }
        Some(SubObject {
            owner: current,
            matrix,
        })
    }

    fn linked_object(&self, object: ObjectRef) -> ObjectRef {
        let mut current = object;
        // Bounded by the object count so a cyclic link chain cannot hang.
        let limit: usize = self.documents.values().map(|d| d.objects.len()).sum();
        for _ in 0..=limit {
            match self.link_target(current) {
                Some(target) => current = target,
                None => break,
            }
        }
        current
    }

    fn link_target(&self, object: ObjectRef) -> Option<ObjectRef> {
        match &self.object(object)?.kind {
            ObjectKind::Link(link) => Some(link.target),
            _ => None,
        }
    }

    fn sub_objects(&self, object: ObjectRef) -> Vec<String> {
        let Some(found) = self.object(object) else {
            return Vec::new();
        };
        match &found.kind {
            ObjectKind::Group(group) => {
                let Some(document) = self.documents.get(&object.doc) else {
                    return Vec::new();
                };
                group
                    .children
                    .iter()
                    .filter_map(|tag| document.objects.get(tag))
                    .map(|o| format!("{}.", o.name))
                    .collect()
            }
            ObjectKind::Link(link) => self.sub_objects(link.target),
            ObjectKind::Part(_) => Vec::new(),
        }
    }

    fn is_element_visible(&self, object: ObjectRef, name: &str) -> ElementVisibility {
        let Some(found) = self.object(object) else {
            return ElementVisibility::Inherited;
        };
        match &found.kind {
            ObjectKind::Group(group) => match group.overrides.get(name) {
                Some(true) => ElementVisibility::Visible,
                Some(false) => ElementVisibility::Hidden,
                None => ElementVisibility::Inherited,
            },
            ObjectKind::Link(link) => self.is_element_visible(link.target, name),
            ObjectKind::Part(_) => ElementVisibility::Inherited,
        }
    }

    fn is_visible(&self, object: ObjectRef) -> bool {
        self.object(object).is_some_and(|o| o.visible)
    }

    fn shape_property(&self, object: ObjectRef) -> Option<&TopoShape> {
        self.object(object)?.as_part().map(|p| &p.shape)
    }
}
