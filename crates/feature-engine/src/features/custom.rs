use std::any::Any;
use std::fmt;

use topo_shape::TopoShape;

use crate::feature::FeatureBehavior;
use crate::resolve::ShapeContext;
use crate::types::{FeatureError, ObjectRef};

/// View provider used for extension features.
pub const PYTHON_VIEW_PROVIDER: &str = "PartGui::ViewProviderPython";

pub type ComputeFn =
    dyn Fn(&mut ShapeContext<'_>, ObjectRef) -> Result<TopoShape, FeatureError> + Send + Sync;

/// A feature whose compute step is supplied by the embedding application.
pub struct CustomFeature {
    type_name: String,
    dependencies: Vec<ObjectRef>,
    compute: Box<ComputeFn>,
    touched: bool,
}

impl CustomFeature {
    pub fn new(
        type_name: impl Into<String>,
        dependencies: Vec<ObjectRef>,
        compute: impl Fn(&mut ShapeContext<'_>, ObjectRef) -> Result<TopoShape, FeatureError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            dependencies,
            compute: Box::new(compute),
            touched: true,
        }
    }

    /// Mark the feature for recompute.
    pub fn touch(&mut self) {
        self.touched = true;
    }
}

impl fmt::Debug for CustomFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFeature")
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .field("touched", &self.touched)
            .finish_non_exhaustive()
    }
}

impl FeatureBehavior for CustomFeature {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn dependencies(&self) -> Vec<ObjectRef> {
        self.dependencies.clone()
    }

    fn compute(
        &self,
        ctx: &mut ShapeContext<'_>,
        this: ObjectRef,
    ) -> Result<TopoShape, FeatureError> {
        (self.compute)(ctx, this)
    }

    fn must_execute(&self) -> bool {
        self.touched
    }

    fn purge_touched(&mut self) {
        self.touched = false;
    }

    fn on_changed(&mut self, _property: &str, _restoring: bool) {
        self.touched = true;
    }

    fn view_provider_name(&self) -> &str {
        PYTHON_VIEW_PROVIDER
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
