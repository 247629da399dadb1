use nalgebra::{Point2, Vector2};

use super::FloatingPoint;

/// A ray in the plane, used to intersect arc tangent lines.
#[derive(Clone, Debug)]
pub struct Ray2<T: FloatingPoint> {
    origin: Point2<T>,
    direction: Vector2<T>,
}

impl<T: FloatingPoint> Ray2<T> {
    pub fn new(origin: Point2<T>, direction: Vector2<T>) -> Self {
        Self { origin, direction }
    }

    pub fn origin(&self) -> &Point2<T> {
        &self.origin
    }

    pub fn direction(&self) -> &Vector2<T> {
        &self.direction
    }

    pub fn point_at(&self, t: T) -> Point2<T> {
        self.origin + self.direction * t
    }

    /// Finds the intersection of the two carrier lines.
    /// Returns `None` if the lines are parallel.
    pub fn find_intersection(&self, other: &Self) -> Option<Point2<T>> {
        let d = self.direction;
        let e = other.direction;
        let det = d.x * e.y - d.y * e.x;
        if det.abs() < T::default_epsilon() {
            return None;
        }

        let diff = other.origin - self.origin;
        let t = (diff.x * e.y - diff.y * e.x) / det;
        Some(self.point_at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tangent_line_intersection() {
        let r0 = Ray2::new(Point2::new(1.0_f64, 0.0), Vector2::new(0.0, 1.0));
        let r1 = Ray2::new(Point2::new(0.0, 1.0), Vector2::new(1.0, 0.0));
        let p = r0.find_intersection(&r1).unwrap();
        assert!((p - Point2::new(1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn parallel_lines() {
        let r0 = Ray2::new(Point2::new(0.0_f64, 0.0), Vector2::new(1.0, 1.0));
        let r1 = Ray2::new(Point2::new(0.0, 1.0), Vector2::new(2.0, 2.0));
        assert!(r0.find_intersection(&r1).is_none());
    }
}
