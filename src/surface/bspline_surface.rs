use nalgebra::{Matrix4, Point2, Point3, Vector4};
use simba::scalar::SupersetOf;

use crate::errors::{Error, Result};
use crate::grid::PoleGrid;
use crate::knot::{BsplineParams, KnotVector};
use crate::misc::{FloatingPoint, Transformable};
use crate::trim::{point_in_region, TrimBoundary};

use super::SurfaceDirection;

/// Per-direction construction input: structure parameters plus an optional
/// full knot vector (generated when absent).
#[derive(Clone, Debug)]
pub struct DirectionSpec<T> {
    pub order: usize,
    pub num_poles: usize,
    pub closed: bool,
    pub knots: Option<Vec<T>>,
}

impl<T> DirectionSpec<T> {
    pub fn open(order: usize, num_poles: usize) -> Self {
        Self {
            order,
            num_poles,
            closed: false,
            knots: None,
        }
    }

    pub fn closed(order: usize, num_poles: usize) -> Self {
        Self {
            order,
            num_poles,
            closed: true,
            knots: None,
        }
    }

    pub fn with_knots(mut self, knots: Vec<T>) -> Self {
        self.knots = Some(knots);
        self
    }
}

/// Tensor-product B-spline surface over two independent parameter
/// directions.
///
/// The pole grid is row-major with `v` selecting the row, so the pole at
/// `(u, v)` sits at linear index `v * num_u + u`. Rational surfaces store
/// weighted poles and a parallel weight array. Trim loops live in the
/// normalized parameter square and are remapped by every structural
/// transform.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BsplineSurface<T: FloatingPoint> {
    pub(crate) grid: PoleGrid<T>,
    pub(crate) u_params: BsplineParams,
    pub(crate) v_params: BsplineParams,
    pub(crate) u_knots: KnotVector<T>,
    pub(crate) v_knots: KnotVector<T>,
    pub(crate) boundaries: Vec<TrimBoundary<T>>,
    pub(crate) hole_origin: bool,
}

impl<T: FloatingPoint> BsplineSurface<T> {
    /// Build a surface from Euclidean points and validated structure.
    ///
    /// # Failures
    /// - order < 2 or pole count below order in either direction
    /// - `u.num_poles * v.num_poles != points.len()`
    /// - weight count not zero and not equal to the point count
    /// - supplied knot count different from the allocated count (one stray
    ///   leading and trailing knot is trimmed first)
    ///
    /// The target is only constructed when every check passes.
    pub fn populate(
        u: DirectionSpec<T>,
        v: DirectionSpec<T>,
        points: Vec<Point3<T>>,
        weights: Option<Vec<T>>,
        points_are_weighted: bool,
    ) -> Result<Self> {
        let u_params = BsplineParams::new(u.order, u.num_poles, u.closed)?;
        let v_params = BsplineParams::new(v.order, v.num_poles, v.closed)?;

        if u_params.num_poles * v_params.num_poles != points.len() {
            return Err(Error::PoleCountMismatch {
                num_u: u_params.num_poles,
                num_v: v_params.num_poles,
                num_points: points.len(),
            });
        }
        if let Some(w) = &weights {
            if !w.is_empty() && w.len() != points.len() {
                return Err(Error::WeightCountMismatch {
                    num_weights: w.len(),
                    num_poles: points.len(),
                });
            }
        }

        let u_knots = resolve_knots(u.knots, &u_params)?;
        let v_knots = resolve_knots(v.knots, &v_params)?;

        let weights = weights.filter(|w| !w.is_empty());
        let poles = match (&weights, points_are_weighted) {
            (Some(w), false) => points
                .iter()
                .zip(w.iter())
                .map(|(p, w)| p * *w)
                .collect(),
            _ => points,
        };

        let grid = PoleGrid::try_new(u_params.num_poles, v_params.num_poles, poles, weights)?;

        Ok(Self {
            grid,
            u_params,
            v_params,
            u_knots,
            v_knots,
            boundaries: vec![],
            hole_origin: false,
        })
    }

    /// Non-rational clamped surface with uniform knots in both directions.
    pub fn from_points_and_order(
        u_order: usize,
        v_order: usize,
        num_u: usize,
        num_v: usize,
        points: Vec<Point3<T>>,
    ) -> Result<Self> {
        Self::populate(
            DirectionSpec::open(u_order, num_u),
            DirectionSpec::open(v_order, num_v),
            points,
            None,
            false,
        )
    }

    /// Assemble from already consistent parts; used by the surface builders.
    pub(crate) fn from_parts(
        grid: PoleGrid<T>,
        u_params: BsplineParams,
        v_params: BsplineParams,
        u_knots: KnotVector<T>,
        v_knots: KnotVector<T>,
    ) -> Self {
        debug_assert_eq!(grid.num_u(), u_params.num_poles);
        debug_assert_eq!(grid.num_v(), v_params.num_poles);
        debug_assert_eq!(u_knots.len(), u_params.num_allocated_knots());
        debug_assert_eq!(v_knots.len(), v_params.num_allocated_knots());
        Self {
            grid,
            u_params,
            v_params,
            u_knots,
            v_knots,
            boundaries: vec![],
            hole_origin: false,
        }
    }

    pub fn grid(&self) -> &PoleGrid<T> {
        &self.grid
    }

    pub fn params(&self, direction: SurfaceDirection) -> &BsplineParams {
        match direction {
            SurfaceDirection::U => &self.u_params,
            SurfaceDirection::V => &self.v_params,
        }
    }

    pub fn u_params(&self) -> &BsplineParams {
        &self.u_params
    }

    pub fn v_params(&self) -> &BsplineParams {
        &self.v_params
    }

    pub fn knots(&self, direction: SurfaceDirection) -> &KnotVector<T> {
        match direction {
            SurfaceDirection::U => &self.u_knots,
            SurfaceDirection::V => &self.v_knots,
        }
    }

    pub fn u_knots(&self) -> &KnotVector<T> {
        &self.u_knots
    }

    pub fn v_knots(&self) -> &KnotVector<T> {
        &self.v_knots
    }

    pub fn is_rational(&self) -> bool {
        self.grid.is_rational()
    }

    pub fn num_u_poles(&self) -> usize {
        self.u_params.num_poles
    }

    pub fn num_v_poles(&self) -> usize {
        self.v_params.num_poles
    }

    pub fn knots_domain(&self, direction: SurfaceDirection) -> (T, T) {
        match direction {
            SurfaceDirection::U => self.u_knots.domain(&self.u_params),
            SurfaceDirection::V => self.v_knots.domain(&self.v_params),
        }
    }

    /// Map a fraction in `[0, 1]` onto the natural knot domain of a
    /// direction.
    pub fn fraction_to_knot(&self, direction: SurfaceDirection, fraction: T) -> T {
        let (min, max) = self.knots_domain(direction);
        fraction * max + (T::one() - fraction) * min
    }

    /// Map a natural knot value of a direction onto `[0, 1]`.
    pub fn knot_to_fraction(&self, direction: SurfaceDirection, knot: T) -> T {
        let (min, max) = self.knots_domain(direction);
        (knot - min) / (max - min)
    }

    /// Rescale both knot vectors to the `[0, 1]` domain, remapping trim
    /// boundaries by the same affine change of parameters.
    pub fn normalize_knots(&mut self) -> Result<()> {
        let (u_min, u_max) = self.knots_domain(SurfaceDirection::U);
        let (v_min, v_max) = self.knots_domain(SurfaceDirection::V);

        if u_min != T::zero() || v_min != T::zero() || u_max != T::one() || v_max != T::one() {
            let su = T::one() / (u_max - u_min);
            let sv = T::one() / (v_max - v_min);
            for boundary in self.boundaries.iter_mut() {
                boundary.map_points(|p| {
                    Point2::new((p.x - u_min) * su, (p.y - v_min) * sv)
                });
            }
        }

        self.u_knots.normalize(&self.u_params)?;
        self.v_knots.normalize(&self.v_params)?;
        Ok(())
    }

    pub fn boundaries(&self) -> &[TrimBoundary<T>] {
        &self.boundaries
    }

    pub fn hole_origin(&self) -> bool {
        self.hole_origin
    }

    pub fn set_hole_origin(&mut self, hole_origin: bool) {
        self.hole_origin = hole_origin;
    }

    /// Attach a trim loop given in normalized parameter space.
    pub fn add_trim_boundary(&mut self, boundary: TrimBoundary<T>) {
        self.boundaries.push(boundary);
    }

    pub fn clear_trim_boundaries(&mut self) {
        self.boundaries.clear();
    }

    /// Even-odd visibility of a normalized parameter point under the trim
    /// loops, honoring the hole-origin sense.
    pub fn is_parameter_in_region(&self, uv: &Point2<T>) -> bool {
        let unit = T::zero()..=T::one();
        if !unit.contains(&uv.x) || !unit.contains(&uv.y) {
            return false;
        }
        point_in_region(&self.boundaries, self.hole_origin, uv)
    }

    /// True when the poles of the two edge rows of a direction coincide, so
    /// the surface joins itself geometrically even if stored open.
    pub fn is_physically_closed(&self, direction: SurfaceDirection) -> bool {
        let tol = T::from_f64(1.0e-10).unwrap();
        match direction {
            SurfaceDirection::U => {
                if self.u_params.closed {
                    return true;
                }
                let last = self.num_u_poles() - 1;
                (0..self.num_v_poles()).all(|v| {
                    (self.grid.unweighted_pole(0, v) - self.grid.unweighted_pole(last, v)).norm()
                        < tol
                })
            }
            SurfaceDirection::V => {
                if self.v_params.closed {
                    return true;
                }
                let last = self.num_v_poles() - 1;
                (0..self.num_u_poles()).all(|u| {
                    (self.grid.unweighted_pole(u, 0) - self.grid.unweighted_pole(u, last)).norm()
                        < tol
                })
            }
        }
    }

    /// True for an order 2 x 2 surface whose control quads are all planar
    /// within the angle tolerance.
    pub fn is_planar_bilinear_with_tolerance(&self, angle_tolerance: T) -> bool {
        if self.u_params.order != 2 || self.v_params.order != 2 {
            return false;
        }
        for v in 0..self.num_v_poles() - 1 {
            for u in 0..self.num_u_poles() - 1 {
                let p00 = self.grid.unweighted_pole(u, v);
                let p10 = self.grid.unweighted_pole(u + 1, v);
                let p01 = self.grid.unweighted_pole(u, v + 1);
                let p11 = self.grid.unweighted_pole(u + 1, v + 1);

                let n0 = (p10 - p00).cross(&(p11 - p00));
                let n1 = (p11 - p00).cross(&(p01 - p00));
                let cross = n0.cross(&n1).norm();
                let dot = n0.dot(&n1);
                if dot <= T::zero() {
                    return false;
                }
                let angle = cross.atan2(dot);
                if angle.abs() > angle_tolerance {
                    return false;
                }
            }
        }
        true
    }

    pub fn is_planar_bilinear(&self) -> bool {
        self.is_planar_bilinear_with_tolerance(T::from_f64(1.0e-8).unwrap())
    }

    /// Cast the surface to another floating point type.
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> BsplineSurface<F> {
        let points: Vec<_> = self.grid.poles().iter().map(|p| p.cast()).collect();
        let weights = self
            .grid
            .weights()
            .map(|w| w.iter().map(|w| nalgebra::convert(*w)).collect::<Vec<F>>());
        BsplineSurface {
            grid: PoleGrid::try_new(self.grid.num_u(), self.grid.num_v(), points, weights)
                .expect("consistent grid survives casting"),
            u_params: self.u_params,
            v_params: self.v_params,
            u_knots: self.u_knots.cast(),
            v_knots: self.v_knots.cast(),
            boundaries: self
                .boundaries
                .iter()
                .map(|b| {
                    TrimBoundary::new(b.points().iter().map(|p| p.cast()).collect())
                })
                .collect(),
            hole_origin: self.hole_origin,
        }
    }
}

fn resolve_knots<T: FloatingPoint>(
    knots: Option<Vec<T>>,
    params: &BsplineParams,
) -> Result<KnotVector<T>> {
    match knots {
        Some(mut supplied) => {
            // legacy vectors with one sentinel knot on each end are trimmed
            if supplied.len() == params.num_allocated_knots() + 2 {
                supplied.remove(0);
                supplied.pop();
            }
            let expected = params.num_allocated_knots();
            if supplied.len() != expected {
                return Err(Error::KnotCountMismatch {
                    got: supplied.len(),
                    expected,
                });
            }
            let kv = KnotVector::new(supplied);
            if !kv.is_non_decreasing() {
                return Err(Error::InvalidKnots);
            }
            Ok(kv)
        }
        None => Ok(KnotVector::generate(params, None)),
    }
}

/// Transform surface poles by an affine matrix; rational poles get the
/// weighted multiply so the stored form stays pre-multiplied.
impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for BsplineSurface<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        for v in 0..self.grid.num_v() {
            for u in 0..self.grid.num_u() {
                let h = self.grid.homogeneous(u, v);
                let t = transform * Vector4::new(h.x, h.y, h.z, h.w);
                self.grid.set_homogeneous(u, v, t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Matrix4, Point3, Vector3};

    use super::*;
    use crate::misc::Transformable;

    fn flat_2x2() -> BsplineSurface<f64> {
        BsplineSurface::from_points_and_order(
            2,
            2,
            2,
            2,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn populate_validates_counts() {
        let points = vec![Point3::<f64>::origin(); 6];
        let bad = BsplineSurface::populate(
            DirectionSpec::open(2, 2),
            DirectionSpec::open(2, 2),
            points.clone(),
            None,
            false,
        );
        assert!(matches!(bad, Err(Error::PoleCountMismatch { .. })));

        let bad_weights = BsplineSurface::populate(
            DirectionSpec::open(2, 2),
            DirectionSpec::open(2, 3),
            points,
            Some(vec![1.0; 5]),
            false,
        );
        assert!(matches!(bad_weights, Err(Error::WeightCountMismatch { .. })));
    }

    #[test]
    fn planar_bilinear_detection() {
        let surface = flat_2x2();
        assert!(surface.is_planar_bilinear());

        let mut points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        points[3].z = 0.5;
        let bent = BsplineSurface::from_points_and_order(2, 2, 2, 2, points).unwrap();
        assert!(!bent.is_planar_bilinear());
    }

    #[test]
    fn transform_translates_poles() {
        let mut surface = flat_2x2();
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        surface.transform(&m);
        assert_eq!(*surface.grid().pole(0, 0), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn trim_region_parity() {
        let mut surface = flat_2x2();
        assert!(surface.is_parameter_in_region(&nalgebra::Point2::new(0.5, 0.5)));
        surface.add_trim_boundary(TrimBoundary::new(vec![
            nalgebra::Point2::new(0.25, 0.25),
            nalgebra::Point2::new(0.75, 0.25),
            nalgebra::Point2::new(0.75, 0.75),
            nalgebra::Point2::new(0.25, 0.75),
        ]));
        surface.set_hole_origin(true);
        assert!(!surface.is_parameter_in_region(&nalgebra::Point2::new(0.5, 0.5)));
        assert!(surface.is_parameter_in_region(&nalgebra::Point2::new(0.1, 0.1)));
    }
}
