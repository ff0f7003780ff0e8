use std::any::Any;

use tracing::warn;

use modeling_ops::check_intersection;
use topo_shape::TopoShape;

use crate::feature::FeatureBehavior;
use crate::resolve::ShapeContext;
use crate::types::{FeatureError, ObjectRef};

/// Op code of fuse steps in element names.
const FUSE_OP: &str = "FUS";

/// Boolean union of a base with a list of tools.
///
/// Tools that neither touch nor overlap the accumulated result are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct FuseFeature {
    pub base: ObjectRef,
    pub tools: Vec<ObjectRef>,
    touched: bool,
}

impl FuseFeature {
    pub fn new(base: ObjectRef, tools: Vec<ObjectRef>) -> Self {
        Self {
            base,
            tools,
            touched: true,
        }
    }
}

fn input_shape(
    ctx: &mut ShapeContext<'_>,
    object: ObjectRef,
    role: &str,
) -> Result<TopoShape, FeatureError> {
    let shape = ctx.shape_of(object);
    if shape.is_null() {
        return Err(FeatureError::MissingInput {
            what: format!("{role} {object} has no shape"),
        });
    }
    Ok(shape)
}

impl FeatureBehavior for FuseFeature {
    fn type_name(&self) -> &str {
        "Part::MultiFuse"
    }

    fn dependencies(&self) -> Vec<ObjectRef> {
        std::iter::once(self.base)
            .chain(self.tools.iter().copied())
            .collect()
    }

    fn compute(
        &self,
        ctx: &mut ShapeContext<'_>,
        this: ObjectRef,
    ) -> Result<TopoShape, FeatureError> {
        let mut result = input_shape(ctx, self.base, "base")?;
        let mut fused = 0;
        for &tool_ref in &self.tools {
            let tool = input_shape(ctx, tool_ref, "tool")?;
            if !check_intersection(&mut *ctx.kernel, &result, &tool, false, true)? {
                let name = ctx.graph.object_name(tool_ref).unwrap_or_default();
                warn!(tool = name, "tool does not touch the base, skipping");
                continue;
            }
            let (Some(a), Some(b)) = (result.geometry(), tool.geometry()) else {
                continue;
            };
            let step = ctx.kernel.fuse(a, b)?;
            result = TopoShape::make_shape_with_history(
                step.shape,
                &[&result, &tool],
                &step.history,
                FUSE_OP,
                0,
            )?;
            fused += 1;
        }
        if fused == 0 {
            return Err(FeatureError::InvalidParameter {
                reason: "no tool touches the base".into(),
            });
        }
        result.set_tag(this.tag);
        Ok(result)
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
