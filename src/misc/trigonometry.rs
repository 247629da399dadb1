use nalgebra::Point3;

use super::FloatingPoint;

/// Flatness test used by adaptive stroking.
/// The squared parallelogram area spanned by the three points is compared
/// against the tolerance.
pub fn three_points_are_flat<T: FloatingPoint>(
    p1: &Point3<T>,
    p2: &Point3<T>,
    p3: &Point3<T>,
    tolerance: T,
) -> bool {
    let p21 = p2 - p1;
    let p31 = p3 - p1;
    let norm = p21.cross(&p31);
    norm.dot(&norm) < tolerance
}
