use nalgebra::Point2;

use crate::curve::ops::{self, CurveData};
use crate::errors::{Error, Result};
use crate::grid::PoleGrid;
use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

use super::{BsplineSurface, SurfaceDirection};

impl<T: FloatingPoint> BsplineSurface<T> {
    /// Promote to rational form with unit weights; a no-op when already
    /// rational.
    pub fn make_rational(&mut self) {
        self.grid.make_rational();
    }

    /// Exchange the parameter directions, transposing the pole grid and
    /// remapping trim boundaries under `(u, v) -> (v, u)`.
    pub fn swap_uv(&mut self) {
        self.grid = self.grid.transposed();
        std::mem::swap(&mut self.u_params, &mut self.v_params);
        std::mem::swap(&mut self.u_knots, &mut self.v_knots);
        for boundary in self.boundaries.iter_mut() {
            boundary.map_points(|p| Point2::new(p.y, p.x));
        }
    }

    /// Reverse one parameter direction in place, reflecting the knot vector
    /// and the trim boundaries.
    pub fn make_reversed(&mut self, direction: SurfaceDirection) -> Result<()> {
        use crate::misc::Invertible;
        match direction {
            SurfaceDirection::U => {
                self.grid.reverse_u();
                self.u_knots.invert();
                self.u_knots.normalize(&self.u_params)?;
                for boundary in self.boundaries.iter_mut() {
                    boundary.map_points(|p| Point2::new(T::one() - p.x, p.y));
                }
            }
            SurfaceDirection::V => {
                self.grid.reverse_v();
                self.v_knots.invert();
                self.v_knots.normalize(&self.v_params)?;
                for boundary in self.boundaries.iter_mut() {
                    boundary.map_points(|p| Point2::new(p.x, T::one() - p.y));
                }
            }
        }
        Ok(())
    }

    /// Insert a knot in one direction until it reaches `multiplicity`,
    /// recomputing every affected row or column of poles.
    pub fn add_knot(&mut self, direction: SurfaceDirection, u: T, multiplicity: usize) -> Result<()> {
        self.apply_directionwise(direction, |data| ops::insert_knot(data, u, multiplicity))
    }

    /// Elevate one direction to `target_degree`. Elevating to the current
    /// degree is a no-op. A closed direction is opened, elevated and closed
    /// again.
    pub fn elevate_degree(
        &mut self,
        direction: SurfaceDirection,
        target_degree: usize,
    ) -> Result<()> {
        if target_degree <= self.params(direction).degree() {
            return Ok(());
        }
        let closed = self.params(direction).closed;
        let start = self.knots_domain(direction).0;
        self.apply_directionwise(direction, |data| {
            if closed {
                ops::open_periodic(data, start)?;
            }
            ops::elevate_degree(data, target_degree)?;
            if closed {
                ops::close_periodic(data)?;
            }
            Ok(())
        })
    }

    /// Convert a periodic direction to clamped open form, re-anchored at the
    /// natural parameter `at`. Trim boundaries rotate with the seam.
    pub fn make_open(&mut self, direction: SurfaceDirection, at: T) -> Result<()> {
        if !self.params(direction).closed {
            return Ok(());
        }
        let f0 = self.knot_to_fraction(direction, at);
        self.apply_directionwise(direction, |data| ops::open_periodic(data, at))?;

        let rotate = move |f: T| -> T {
            let mut x = f - f0;
            if x < T::zero() {
                x += T::one();
            }
            x
        };
        for boundary in self.boundaries.iter_mut() {
            boundary.map_points(|p| match direction {
                SurfaceDirection::U => Point2::new(rotate(p.x), p.y),
                SurfaceDirection::V => Point2::new(p.x, rotate(p.y)),
            });
        }
        Ok(())
    }

    /// Convert a clamped open direction whose edge poles coincide into
    /// periodic form. Fails with `SeamMismatch`/`NoWrapAround` (leaving the
    /// surface untouched) when the rows do not wrap.
    pub fn make_closed(&mut self, direction: SurfaceDirection) -> Result<()> {
        if self.params(direction).closed {
            return Ok(());
        }
        self.apply_directionwise(direction, ops::close_periodic)
    }

    /// Run a homogeneous curve transformation over every row (`U`) or column
    /// (`V`) of the pole grid, committing the shared structure only if every
    /// strip succeeds with the same result shape.
    fn apply_directionwise<F>(&mut self, direction: SurfaceDirection, f: F) -> Result<()>
    where
        F: Fn(&mut CurveData<T>) -> Result<()>,
    {
        let (params, knots) = match direction {
            SurfaceDirection::U => (self.u_params, self.u_knots.to_vec()),
            SurfaceDirection::V => (self.v_params, self.v_knots.to_vec()),
        };

        let strips = match direction {
            SurfaceDirection::U => self.grid.num_v(),
            SurfaceDirection::V => self.grid.num_u(),
        };

        let mut results = Vec::with_capacity(strips);
        for i in 0..strips {
            let poles = match direction {
                SurfaceDirection::U => self.grid.row(i),
                SurfaceDirection::V => self.grid.column(i),
            };
            let mut data = CurveData {
                poles,
                knots: knots.clone(),
                params,
            };
            f(&mut data)?;
            results.push(data);
        }

        let new_params = results[0].params;
        let new_knots = results[0].knots.clone();
        debug_assert!(results
            .iter()
            .all(|d| d.params == new_params && d.poles.len() == new_params.num_poles));

        let rational = self.is_rational();
        let (num_u, num_v) = match direction {
            SurfaceDirection::U => (new_params.num_poles, self.grid.num_v()),
            SurfaceDirection::V => (self.grid.num_u(), new_params.num_poles),
        };
        let mut grid = PoleGrid::zeroed(num_u, num_v, rational)?;
        for (i, data) in results.iter().enumerate() {
            match direction {
                SurfaceDirection::U => grid.set_row(i, &data.poles),
                SurfaceDirection::V => grid.set_column(i, &data.poles),
            }
        }

        self.grid = grid;
        match direction {
            SurfaceDirection::U => {
                self.u_params = new_params;
                self.u_knots = KnotVector::new(new_knots);
            }
            SurfaceDirection::V => {
                self.v_params = new_params;
                self.v_knots = KnotVector::new(new_knots);
            }
        }
        Ok(())
    }

    /// Elevate both directions to the orders of `other` and refine both knot
    /// vectors until the two surfaces share structure; used to make surfaces
    /// mergeable.
    pub fn make_compatible_with(&mut self, other: &mut Self) -> Result<()> {
        for direction in [SurfaceDirection::U, SurfaceDirection::V] {
            let target = self
                .params(direction)
                .degree()
                .max(other.params(direction).degree());
            self.elevate_degree(direction, target)?;
            other.elevate_degree(direction, target)?;

            if self.params(direction).closed != other.params(direction).closed {
                return Err(Error::InvalidKnots);
            }

            let merged = KnotVector::sorted_union(
                self.knots(direction).as_slice(),
                other.knots(direction).as_slice(),
            );
            let missing_self =
                KnotVector::sorted_difference(&merged, self.knots(direction).as_slice());
            let missing_other =
                KnotVector::sorted_difference(&merged, other.knots(direction).as_slice());
            self.apply_directionwise(direction, |data| ops::refine_knots(data, &missing_self))?;
            other.apply_directionwise(direction, |data| ops::refine_knots(data, &missing_other))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;

    fn wavy() -> BsplineSurface<f64> {
        let mut points = vec![];
        for v in 0..4 {
            for u in 0..5 {
                points.push(Point3::new(
                    u as f64,
                    v as f64,
                    ((u + v) % 3) as f64 * 0.5,
                ));
            }
        }
        BsplineSurface::from_points_and_order(4, 3, 5, 4, points).unwrap()
    }

    fn sample_points(surface: &BsplineSurface<f64>, n: usize) -> Vec<Point3<f64>> {
        let mut out = vec![];
        for j in 0..=n {
            for i in 0..=n {
                out.push(surface.evaluate_point(i as f64 / n as f64, j as f64 / n as f64));
            }
        }
        out
    }

    #[test]
    fn swap_uv_transposes_evaluation() {
        let surface = wavy();
        let mut swapped = surface.clone();
        swapped.swap_uv();
        for j in 0..=6 {
            for i in 0..=6 {
                let u = i as f64 / 6.0;
                let v = j as f64 / 6.0;
                let p = surface.evaluate_point(u, v);
                let q = swapped.evaluate_point(v, u);
                assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn reverse_mirrors_evaluation() {
        let surface = wavy();
        let mut reversed = surface.clone();
        reversed.make_reversed(SurfaceDirection::U).unwrap();
        for j in 0..=6 {
            for i in 0..=6 {
                let u = i as f64 / 6.0;
                let v = j as f64 / 6.0;
                let p = surface.evaluate_point(u, v);
                let q = reversed.evaluate_point(1.0 - u, v);
                assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn add_knot_keeps_shape_and_knot_count() {
        let mut surface = wavy();
        let before = sample_points(&surface, 8);
        surface.add_knot(SurfaceDirection::U, 0.4, 2).unwrap();

        assert_eq!(
            surface.u_knots().len(),
            surface.u_params().num_allocated_knots()
        );
        assert!(surface.u_knots().is_non_decreasing());

        let after = sample_points(&surface, 8);
        for (p, q) in before.iter().zip(after.iter()) {
            assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn elevate_degree_keeps_shape() {
        let mut surface = wavy();
        let before = sample_points(&surface, 8);
        surface.elevate_degree(SurfaceDirection::V, 4).unwrap();
        assert_eq!(surface.v_params().order, 5);
        let after = sample_points(&surface, 8);
        for (p, q) in before.iter().zip(after.iter()) {
            assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn elevate_to_same_degree_is_noop() {
        let mut surface = wavy();
        let before = surface.clone();
        surface.elevate_degree(SurfaceDirection::U, 3).unwrap();
        assert_eq!(surface, before);
    }
}
