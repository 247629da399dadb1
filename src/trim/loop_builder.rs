use log::debug;
use nalgebra::{Point2, Point3, Vector3};
use rand::rngs::ThreadRng;
use rand::Rng;

use crate::curve::BsplineCurve;
use crate::errors::{Error, Result};
use crate::misc::{three_points_are_flat, FloatingPoint};
use crate::surface::{BsplineSurface, SurfaceDirection};

use super::TrimBoundary;

/// Planar frame mapping world points into normalized `(u, v)` parameters of
/// a bilinear patch; the same mapping used to build the patch itself.
#[derive(Clone, Debug)]
pub struct PlaneFrame<T: FloatingPoint> {
    origin: Point3<T>,
    u_axis: Vector3<T>,
    v_axis: Vector3<T>,
    normal: Vector3<T>,
}

impl<T: FloatingPoint> PlaneFrame<T> {
    pub fn new(origin: Point3<T>, u_axis: Vector3<T>, v_axis: Vector3<T>) -> Result<Self> {
        let normal = u_axis.cross(&v_axis);
        if normal.norm() < T::default_epsilon() {
            return Err(Error::DegenerateGeometry("plane frame axes are parallel"));
        }
        Ok(Self {
            origin,
            u_axis,
            v_axis,
            normal: normal.normalize(),
        })
    }

    pub fn origin(&self) -> &Point3<T> {
        &self.origin
    }

    /// Parameter coordinates of a world point (u, v along the frame axes,
    /// each normalized by the axis length).
    pub fn world_to_uv(&self, point: &Point3<T>) -> Point2<T> {
        let d = point - self.origin;
        Point2::new(
            d.dot(&self.u_axis) / self.u_axis.norm_squared(),
            d.dot(&self.v_axis) / self.v_axis.norm_squared(),
        )
    }

    pub fn uv_to_world(&self, uv: &Point2<T>) -> Point3<T> {
        self.origin + self.u_axis * uv.x + self.v_axis * uv.y
    }

    /// Signed distance of a world point off the plane.
    pub fn height(&self, point: &Point3<T>) -> T {
        (point - self.origin).dot(&self.normal)
    }
}

/// Converts closed loops of curves into trim boundaries by stroking each
/// curve to tolerance and mapping the points through a plane frame.
///
/// Degenerate inputs (zero-area loops, off-plane curves) bump an error
/// counter instead of aborting, so partial results are still returned.
pub struct TrimLoopBuilder<T: FloatingPoint> {
    tolerance: T,
    errors: usize,
}

impl<T: FloatingPoint> TrimLoopBuilder<T> {
    pub fn new(tolerance: T) -> Self {
        Self {
            tolerance,
            errors: 0,
        }
    }

    /// Number of loops dropped or clipped so far.
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Stroke one closed loop of curves into a parameter-space boundary.
    /// Returns `None` (and counts an error) for loops that collapse below
    /// the area tolerance.
    pub fn build_loop(
        &mut self,
        curves: &[BsplineCurve<T>],
        frame: &PlaneFrame<T>,
    ) -> Option<TrimBoundary<T>> {
        if curves.is_empty() {
            self.errors += 1;
            return None;
        }

        let mut points: Vec<Point2<T>> = vec![];
        for curve in curves {
            let stroked = stroke_curve(curve, self.tolerance);
            for p in &stroked {
                if frame.height(p).abs() > self.tolerance {
                    self.errors += 1;
                }
                let uv = frame.world_to_uv(p);
                if points
                    .last()
                    .map_or(true, |prev| (uv - prev).norm() > T::default_epsilon())
                {
                    points.push(uv);
                }
            }
        }
        // drop the duplicated closing point, the loop is implicit
        if points.len() > 1
            && (points[0] - points[points.len() - 1]).norm() < T::default_epsilon()
        {
            points.pop();
        }

        let boundary = TrimBoundary::new(points);
        if boundary.len() < 3 || boundary.signed_area().abs() < T::default_epsilon() {
            self.errors += 1;
            return None;
        }
        Some(boundary)
    }

    /// Build every loop, accumulating errors and keeping partial results.
    pub fn build_all(
        &mut self,
        loops: &[Vec<BsplineCurve<T>>],
        frame: &PlaneFrame<T>,
    ) -> Vec<TrimBoundary<T>> {
        let boundaries: Vec<_> = loops
            .iter()
            .filter_map(|l| self.build_loop(l, frame))
            .collect();
        debug!(
            "built {} of {} trim loops ({} errors)",
            boundaries.len(),
            loops.len(),
            self.errors
        );
        boundaries
    }
}

/// Flatten a curve to a polyline within `tolerance` using jittered midpoint
/// subdivision; the jitter avoids sampling exactly on flat inflections.
pub fn stroke_curve<T: FloatingPoint>(curve: &BsplineCurve<T>, tolerance: T) -> Vec<Point3<T>> {
    if curve.degree() == 1 {
        let mut points = curve.unweighted_poles();
        if curve.is_closed() {
            points.push(points[0]);
        }
        return points;
    }

    let mut rng = rand::rng();
    let (start, end) = curve.knots_domain();
    let mut points = stroke_adaptive(curve, start, end, tolerance, &mut rng);
    points.push(curve.point_at(end));
    points
}

fn stroke_adaptive<T: FloatingPoint>(
    curve: &BsplineCurve<T>,
    start: T,
    end: T,
    tolerance: T,
    rng: &mut ThreadRng,
) -> Vec<Point3<T>> {
    let p1 = curve.point_at(start);
    let p3 = curve.point_at(end);

    let delta = end - start;
    if delta < T::from_f64(1e-8).unwrap() {
        return vec![p1];
    }

    let t = 0.5_f64 + 0.2_f64 * rng.random::<f64>();
    let mid = start + delta * T::from_f64(t).unwrap();
    let p2 = curve.point_at(mid);

    let diff = p1 - p3;
    let diff2 = p1 - p2;
    if (diff.dot(&diff) < tolerance && diff2.dot(&diff2) > tolerance)
        || !three_points_are_flat(&p1, &p2, &p3, tolerance)
    {
        let exact_mid = start + delta * T::from_f64(0.5).unwrap();
        let mut left = stroke_adaptive(curve, start, exact_mid, tolerance, rng);
        let right = stroke_adaptive(curve, exact_mid, end, tolerance, rng);
        left.extend(right);
        left
    } else {
        vec![p1]
    }
}

impl<T: FloatingPoint> BsplineSurface<T> {
    /// Build a planar bilinear patch spanning the loops' extent and attach
    /// the loops as trim boundaries. Returns the surface together with the
    /// builder's error count; a region without usable area fails.
    pub fn trimmed_plane_from_loops(
        loops: &[Vec<BsplineCurve<T>>],
        tolerance: T,
    ) -> Result<(Self, usize)> {
        let outer = loops
            .first()
            .filter(|l| !l.is_empty())
            .ok_or(Error::DegenerateGeometry("no boundary loops"))?;

        // plane from the outer loop by Newell's method
        let stroked = outer
            .iter()
            .flat_map(|c| stroke_curve(c, tolerance))
            .collect::<Vec<_>>();
        if stroked.len() < 3 {
            return Err(Error::DegenerateGeometry("outer loop has no area"));
        }
        let mut normal = Vector3::zeros();
        for i in 0..stroked.len() {
            let a = &stroked[i];
            let b = &stroked[(i + 1) % stroked.len()];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        if normal.norm() < T::default_epsilon() {
            return Err(Error::DegenerateGeometry("outer loop has no area"));
        }
        let normal = normal.normalize();
        let seed = stroked[1] - stroked[0];
        let u_dir = (seed - normal * seed.dot(&normal)).normalize();
        let v_dir = normal.cross(&u_dir);

        // extent of all loops in the plane
        let origin = stroked[0];
        let mut min_u = T::max_value().unwrap();
        let mut max_u = -T::max_value().unwrap();
        let mut min_v = T::max_value().unwrap();
        let mut max_v = -T::max_value().unwrap();
        let all_points: Vec<Point3<T>> = loops
            .iter()
            .flatten()
            .flat_map(|c| stroke_curve(c, tolerance))
            .collect();
        for p in &all_points {
            let d = p - origin;
            let a = d.dot(&u_dir);
            let b = d.dot(&v_dir);
            min_u = min_u.min(a);
            max_u = max_u.max(a);
            min_v = min_v.min(b);
            max_v = max_v.max(b);
        }
        let du = max_u - min_u;
        let dv = max_v - min_v;
        if du < T::default_epsilon() || dv < T::default_epsilon() {
            return Err(Error::DegenerateGeometry("trim region has no area"));
        }

        let corner = origin + u_dir * min_u + v_dir * min_v;
        let frame = PlaneFrame::new(corner, u_dir * du, v_dir * dv)?;

        let p00 = frame.uv_to_world(&Point2::new(T::zero(), T::zero()));
        let p10 = frame.uv_to_world(&Point2::new(T::one(), T::zero()));
        let p01 = frame.uv_to_world(&Point2::new(T::zero(), T::one()));
        let p11 = frame.uv_to_world(&Point2::new(T::one(), T::one()));
        let mut surface =
            Self::from_points_and_order(2, 2, 2, 2, vec![p00, p10, p01, p11])?;

        let mut builder = TrimLoopBuilder::new(tolerance);
        for boundary in builder.build_all(loops, &frame) {
            surface.add_trim_boundary(boundary);
        }
        Ok((surface, builder.errors()))
    }

    /// World-space polylines of the trim boundaries, for downstream
    /// consumers that want raw curves.
    pub fn unstructured_boundary_curves(&self) -> Vec<Vec<Point3<T>>> {
        self.boundaries()
            .iter()
            .map(|boundary| {
                boundary
                    .points()
                    .iter()
                    .map(|uv| {
                        let u = self.fraction_to_knot(SurfaceDirection::U, uv.x);
                        let v = self.fraction_to_knot(SurfaceDirection::V, uv.y);
                        self.evaluate_point(u, v)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;

    fn rectangle_loop(z: f64) -> Vec<BsplineCurve<f64>> {
        let corners = [
            Point3::new(0.0, 0.0, z),
            Point3::new(4.0, 0.0, z),
            Point3::new(4.0, 2.0, z),
            Point3::new(0.0, 2.0, z),
        ];
        (0..4)
            .map(|i| {
                BsplineCurve::polyline(vec![corners[i], corners[(i + 1) % 4]]).unwrap()
            })
            .collect()
    }

    #[test]
    fn stroke_line_is_exact() {
        let line = BsplineCurve::polyline(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ])
        .unwrap();
        let points = stroke_curve(&line, 1e-3);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn stroke_refines_curved_spans() {
        let curve = BsplineCurve::from_points_and_order(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            3,
        )
        .unwrap();
        let points = stroke_curve(&curve, 1e-4);
        assert!(points.len() > 4);
        // every stroked point lies on the curve's plane
        for p in &points {
            assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn trimmed_plane_from_rectangle() {
        let loops = vec![rectangle_loop(1.0)];
        let (surface, errors) = BsplineSurface::trimmed_plane_from_loops(&loops, 1e-4).unwrap();
        assert_eq!(errors, 0);
        assert!(surface.is_planar_bilinear());
        assert_eq!(surface.boundaries().len(), 1);

        // the patch carries the plane height
        let p = surface.evaluate_point(0.5, 0.5);
        assert_relative_eq!(p.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_loop_counts_error_but_returns_rest() {
        let mut loops = vec![rectangle_loop(0.0)];
        // a zero-area "loop"
        loops.push(vec![BsplineCurve::polyline(vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ])
        .unwrap()]);
        let (surface, errors) = BsplineSurface::trimmed_plane_from_loops(&loops, 1e-4).unwrap();
        assert_eq!(surface.boundaries().len(), 1);
        assert!(errors > 0);
    }

    #[test]
    fn empty_region_fails() {
        let loops: Vec<Vec<BsplineCurve<f64>>> = vec![];
        assert!(BsplineSurface::trimmed_plane_from_loops(&loops, 1e-4).is_err());
    }

    #[test]
    fn boundary_round_trip_to_world() {
        let loops = vec![rectangle_loop(0.0)];
        let (surface, _) = BsplineSurface::trimmed_plane_from_loops(&loops, 1e-4).unwrap();
        let world = surface.unstructured_boundary_curves();
        assert_eq!(world.len(), 1);
        for p in &world[0] {
            assert_relative_eq!(p.z, 0.0, epsilon = 1e-10);
            assert!(p.x >= -1e-9 && p.x <= 4.0 + 1e-9);
            assert!(p.y >= -1e-9 && p.y <= 2.0 + 1e-9);
        }
    }
}
