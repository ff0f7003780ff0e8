use tracing::debug;

use naming_types::TopoKind;
use shape_kernel::{ShapeKernel, ShapeResult};
use topo_shape::TopoShape;

use crate::types::OpError;

/// Whether `first` and `second` intersect.
///
/// Disjoint bounding boxes answer `false` unless touching counts. With `quick`
/// overlapping boxes answer `true` without a boolean. Otherwise a fuse (touch
/// counts) must yield exactly one solid, or a common (touch does not count)
/// must yield at least one. A failed boolean answers `false`.
pub fn check_intersection(
    kernel: &mut dyn ShapeKernel,
    first: &TopoShape,
    second: &TopoShape,
    quick: bool,
    touch_is_intersection: bool,
) -> Result<bool, OpError> {
    let (Some(a), Some(b)) = (first.geometry(), second.geometry()) else {
        return Ok(false);
    };

    let disjoint = {
        let bb_a = kernel.bounding_box(a)?;
        let bb_b = kernel.bounding_box(b)?;
        bb_a.is_out(&bb_b, 0.0)
    };
    if disjoint && !touch_is_intersection {
        return Ok(false);
    }
    if quick && !disjoint {
        return Ok(true);
    }

    if touch_is_intersection {
        let Some(fused) = boolean_result(kernel.fuse(a, b), "fuse") else {
            return Ok(false);
        };
        let solids = kernel.count_sub_shapes(&fused.shape, TopoKind::Solid)?;
        Ok(solids == 1)
    } else {
        let Some(common) = boolean_result(kernel.common(a, b), "common") else {
            return Ok(false);
        };
        let solids = kernel.count_sub_shapes(&common.shape, TopoKind::Solid)?;
        Ok(solids > 0)
    }
}

fn boolean_result<E: std::fmt::Display>(
    result: Result<ShapeResult, E>,
    operation: &str,
) -> Option<ShapeResult> {
    match result {
        Ok(shape) => Some(shape),
        Err(e) => {
            debug!(operation, error = %e, "boolean failed, assuming no intersection");
            None
        }
    }
}
