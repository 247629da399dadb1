use itertools::Itertools;
use nalgebra::Point2;

use crate::misc::{orientation, FloatingPoint, Orientation};

/// A closed trim loop in normalized `[0, 1] x [0, 1]` surface parameter
/// space. The last point connects back to the first implicitly.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrimBoundary<T: FloatingPoint> {
    points: Vec<Point2<T>>,
}

impl<T: FloatingPoint> TrimBoundary<T> {
    pub fn new(points: Vec<Point2<T>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2<T>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Remap every loop point, e.g. under a parameter-space swap or reversal.
    pub fn map_points<F: Fn(&Point2<T>) -> Point2<T>>(&mut self, f: F) {
        for p in self.points.iter_mut() {
            *p = f(p);
        }
    }

    /// Signed loop area (shoelace); near-zero indicates a degenerate loop.
    pub fn signed_area(&self) -> T {
        if self.points.len() < 3 {
            return T::zero();
        }
        let half = T::from_f64(0.5).unwrap();
        let sum = self
            .points
            .iter()
            .circular_tuple_windows()
            .fold(T::zero(), |sum, (p0, p1)| {
                sum + p0.x * p1.y - p1.x * p0.y
            });
        sum * half
    }

    /// Number of times a ray from `point` crosses this loop.
    pub(crate) fn crossings(&self, point: &Point2<T>) -> usize {
        self.points
            .iter()
            .circular_tuple_windows()
            .filter(|&(p0, p1)| {
                let straddles_up = p0.y <= point.y && p1.y > point.y;
                let straddles_down = p1.y <= point.y && p0.y > point.y;
                if !(straddles_up || straddles_down) {
                    return false;
                }
                let o = orientation(p0, p1, point);
                (straddles_up && o == Orientation::CounterClockwise)
                    || (straddles_down && o == Orientation::Clockwise)
            })
            .count()
    }

    /// Even-odd containment of a single loop.
    /// # Example
    /// ```
    /// use bsurf::prelude::TrimBoundary;
    /// use nalgebra::Point2;
    /// let square = TrimBoundary::new(vec![
    ///     Point2::new(0.2, 0.2),
    ///     Point2::new(0.8, 0.2),
    ///     Point2::new(0.8, 0.8),
    ///     Point2::new(0.2, 0.8),
    /// ]);
    /// assert!(square.contains(&Point2::new(0.5, 0.5)));
    /// assert!(!square.contains(&Point2::new(0.9, 0.5)));
    /// ```
    pub fn contains(&self, point: &Point2<T>) -> bool {
        self.crossings(point) % 2 == 1
    }
}

/// Even-odd parity over a set of loops: `hole_origin` flips the sense so
/// boundaries cut holes out of a solid patch instead of bounding the active
/// region.
pub fn point_in_region<T: FloatingPoint>(
    boundaries: &[TrimBoundary<T>],
    hole_origin: bool,
    point: &Point2<T>,
) -> bool {
    if boundaries.is_empty() {
        return true;
    }
    let crossings: usize = boundaries.iter().map(|b| b.crossings(point)).sum();
    let odd = crossings % 2 == 1;
    odd != hole_origin
}
