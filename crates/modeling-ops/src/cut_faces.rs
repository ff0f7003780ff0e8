use nalgebra::Vector3;
use tracing::debug;

use shape_kernel::ShapeKernel;
use topo_shape::TopoShape;

use crate::types::{CutFace, OpError};

/// Faces of `shape` crossed by the line through `face`'s centroid along
/// `direction`.
///
/// Hits within `tolerance` (squared distance) of the centroid and hits behind
/// it are dropped. The result is unordered.
pub fn find_all_faces_cut_by(
    kernel: &mut dyn ShapeKernel,
    shape: &TopoShape,
    face: &TopoShape,
    direction: &Vector3<f64>,
    tolerance: f64,
) -> Result<Vec<CutFace>, OpError> {
    let (Some(target), Some(face_geometry)) = (shape.geometry(), face.geometry()) else {
        return Err(OpError::NullShape {
            operation: "find_all_faces_cut_by",
        });
    };
    let Some(dir) = direction.try_normalize(f64::EPSILON) else {
        return Err(OpError::InvalidParameter {
            reason: "cut direction has zero length".into(),
        });
    };

    let centroid = kernel.face_centroid(face_geometry)?;
    let hits = kernel.intersect_line(target, &centroid, &dir, tolerance)?;
    let total = hits.len();

    let result: Vec<CutFace> = hits
        .into_iter()
        .filter_map(|hit| {
            let offset = hit.point - centroid;
            let distance_sq = offset.norm_squared();
            // The originating face itself.
            if distance_sq < tolerance {
                return None;
            }
            if offset.dot(&dir) < 0.0 {
                return None;
            }
            Some(CutFace {
                face: TopoShape::new(hit.face),
                distance_sq,
            })
        })
        .collect();
    debug!(hits = total, kept = result.len(), "faces cut by line");
    Ok(result)
}
