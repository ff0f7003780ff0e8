use std::any::Any;
use std::fmt::Debug;

use topo_shape::TopoShape;

use crate::resolve::ShapeContext;
use crate::types::{FeatureError, ObjectRef};

/// View provider used for plain part features.
pub const PART_VIEW_PROVIDER: &str = "PartGui::ViewProviderPart";

/// Element references of one link property: sub-element names into `base`,
/// each with the mapped name it had after the last successful recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementLinks {
    pub base: Option<ObjectRef>,
    pub subs: Vec<String>,
    pub shadows: Vec<Option<String>>,
}

impl ElementLinks {
    pub fn new(base: ObjectRef, subs: Vec<String>) -> Self {
        let shadows = vec![None; subs.len()];
        Self {
            base: Some(base),
            subs,
            shadows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

/// What a shape-producing document object does.
pub trait FeatureBehavior: Debug {
    fn type_name(&self) -> &str;

    /// Objects whose shapes `compute` reads.
    fn dependencies(&self) -> Vec<ObjectRef> {
        Vec::new()
    }

    /// Build the feature's shape. `this` is the feature's own reference.
    fn compute(
        &self,
        ctx: &mut ShapeContext<'_>,
        this: ObjectRef,
    ) -> Result<TopoShape, FeatureError>;

    /// True when a property change requires a recompute.
    fn must_execute(&self) -> bool {
        false
    }

    fn purge_touched(&mut self) {}

    /// Called after `property` was changed from outside.
    fn on_changed(&mut self, _property: &str, _restoring: bool) {}

    fn on_document_restored(&mut self) {}

    fn view_provider_name(&self) -> &str {
        PART_VIEW_PROVIDER
    }

    /// Element-link properties, by property name.
    fn element_links(&self) -> Vec<(&'static str, ElementLinks)> {
        Vec::new()
    }

    fn set_element_links(&mut self, _property: &str, _links: ElementLinks) {}

    /// Called after the sub-element names of `property` were remapped.
    fn on_update_element_reference(&mut self, _property: &str) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
