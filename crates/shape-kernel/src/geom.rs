//! Small planar helpers shared by the kernels.

use nalgebra::{Point3, Vector3};

/// True when `p` lies inside the convex polygon `corners` (in the plane with
/// `normal`), within `tolerance`. Winding direction does not matter.
pub(crate) fn polygon_contains(
    corners: &[Point3<f64>],
    normal: &Vector3<f64>,
    p: &Point3<f64>,
    tolerance: f64,
) -> bool {
    if corners.len() < 3 {
        return false;
    }
    let mut sign = 0.0_f64;
    for (i, a) in corners.iter().enumerate() {
        let b = &corners[(i + 1) % corners.len()];
        let edge = b - a;
        let side = edge.cross(&(p - a)).dot(normal);
        if side.abs() <= tolerance * edge.norm().max(1.0) {
            continue;
        }
        if sign == 0.0 {
            sign = side.signum();
        } else if side.signum() != sign {
            return false;
        }
    }
    true
}

/// Intersection parameter of the line `origin + t * direction` with a plane,
/// `None` when they are parallel.
pub(crate) fn line_plane_parameter(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    plane_point: &Point3<f64>,
    normal: &Vector3<f64>,
) -> Option<f64> {
    let denom = normal.dot(direction);
    if denom.abs() < f64::EPSILON {
        return None;
    }
    Some(normal.dot(&(plane_point - origin)) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn contains_inside_and_boundary() {
        let n = Vector3::z();
        assert!(polygon_contains(&square(), &n, &Point3::new(0.5, 0.5, 0.0), 1e-9));
        assert!(polygon_contains(&square(), &n, &Point3::new(1.0, 0.5, 0.0), 1e-9));
        assert!(!polygon_contains(&square(), &n, &Point3::new(1.5, 0.5, 0.0), 1e-9));
        let mut reversed = square();
        reversed.reverse();
        assert!(polygon_contains(&reversed, &n, &Point3::new(0.2, 0.7, 0.0), 1e-9));
    }

    #[test]
    fn parallel_line_has_no_parameter() {
        let t = line_plane_parameter(
            &Point3::origin(),
            &Vector3::x(),
            &Point3::new(0.0, 0.0, 1.0),
            &Vector3::z(),
        );
        assert!(t.is_none());
    }
}
