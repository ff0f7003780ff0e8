use std::any::Any;

use nalgebra::{Point3, Vector3};

use topo_shape::TopoShape;

use crate::feature::FeatureBehavior;
use crate::resolve::ShapeContext;
use crate::types::{FeatureError, ObjectRef};

/// Axis-aligned box with one corner at the local origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxFeature {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    touched: bool,
}

impl BoxFeature {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
            touched: true,
        }
    }
}

impl FeatureBehavior for BoxFeature {
    fn type_name(&self) -> &str {
        "Part::Box"
    }

    fn compute(
        &self,
        ctx: &mut ShapeContext<'_>,
        this: ObjectRef,
    ) -> Result<TopoShape, FeatureError> {
        for (what, value) in [
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
        ] {
            if value <= 0.0 {
                return Err(FeatureError::InvalidParameter {
                    reason: format!("box {what} must be positive, got {value}"),
                });
            }
        }
        let geometry = ctx.kernel.make_box(
            Point3::origin(),
            Vector3::new(self.length, self.width, self.height),
        )?;
        Ok(TopoShape::new(geometry).with_tag(this.tag))
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

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
