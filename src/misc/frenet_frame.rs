use nalgebra::{Matrix3, Point3, Vector3};

use super::FloatingPoint;

/// A Frenet frame at a point on a curve.
#[derive(Debug, Clone)]
pub struct FrenetFrame<T: FloatingPoint> {
    position: Point3<T>,
    tangent: Vector3<T>,
    normal: Vector3<T>,
    binormal: Vector3<T>,
}

impl<T: FloatingPoint> FrenetFrame<T> {
    pub fn new(
        position: Point3<T>,
        tangent: Vector3<T>,
        normal: Vector3<T>,
        binormal: Vector3<T>,
    ) -> Self {
        Self {
            position,
            tangent,
            normal,
            binormal,
        }
    }

    pub fn position(&self) -> &Point3<T> {
        &self.position
    }

    pub fn tangent(&self) -> &Vector3<T> {
        &self.tangent
    }

    pub fn normal(&self) -> &Vector3<T> {
        &self.normal
    }

    pub fn binormal(&self) -> &Vector3<T> {
        &self.binormal
    }

    /// World-to-frame rotation with rows (normal, binormal, tangent).
    pub fn rotation(&self) -> Matrix3<T> {
        Matrix3::from_rows(&[
            self.normal.transpose(),
            self.binormal.transpose(),
            self.tangent.transpose(),
        ])
    }
}
