use gauss_quad::GaussLegendre;
use nalgebra::{Matrix4, Point3, Rotation3, UnitVector3, Vector3, Vector4};
use simba::scalar::SupersetOf;

use crate::errors::{Error, Result};
use crate::knot::{
    blending_functions, BlendingValues, BsplineParams, DerivativeRows, KnotVector,
};
use crate::misc::{FloatingPoint, FrenetFrame, Invertible, Transformable};

use super::ops::{self, CurveData};

/// B-spline curve representation
///
/// Poles are stored pre-multiplied by their weights when the curve is
/// rational; the parallel weight array exists iff the rational flag is set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BsplineCurve<T: FloatingPoint> {
    poles: Vec<Point3<T>>,
    weights: Option<Vec<T>>,
    knots: KnotVector<T>,
    params: BsplineParams,
}

/// Point and derivative bundle returned by curve evaluation.
#[derive(Clone, Debug)]
pub struct CurvePoint<T: FloatingPoint> {
    pub point: Point3<T>,
    pub weight: T,
    pub first: Option<Vector3<T>>,
    pub second: Option<Vector3<T>>,
}

impl<T: FloatingPoint> BsplineCurve<T> {
    /// Create a curve from Euclidean points, optional weights and an optional
    /// full knot vector.
    ///
    /// # Failures
    /// - order outside `[2, MAX_ORDER]` or more orders than poles
    /// - weight count differs from point count
    /// - knot count differs from the allocated count for the parameters
    ///   (a vector with exactly one extra leading and trailing knot is
    ///   trimmed before the comparison)
    ///
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// use nalgebra::Point3;
    ///
    /// let points = vec![
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(1., 2., 0.),
    ///     Point3::new(3., 2., 0.),
    ///     Point3::new(4., 0., 0.),
    /// ];
    /// let curve = BsplineCurve::try_new(4, points, None, None, false).unwrap();
    /// assert_eq!(curve.num_poles(), 4);
    /// ```
    pub fn try_new(
        order: usize,
        points: Vec<Point3<T>>,
        weights: Option<Vec<T>>,
        knots: Option<Vec<T>>,
        closed: bool,
    ) -> Result<Self> {
        let params = BsplineParams::new(order, points.len(), closed)?;

        if let Some(w) = &weights {
            if w.len() != points.len() {
                return Err(Error::WeightCountMismatch {
                    num_weights: w.len(),
                    num_poles: points.len(),
                });
            }
        }

        let knots = match knots {
            Some(mut supplied) => {
                fix_knots(&mut supplied, &params);
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
                kv
            }
            None => KnotVector::generate(&params, None),
        };

        let poles = match &weights {
            Some(w) => points
                .iter()
                .zip(w.iter())
                .map(|(p, w)| p * *w)
                .collect(),
            None => points,
        };

        Ok(Self {
            poles,
            weights,
            knots,
            params,
        })
    }

    /// Non-rational clamped curve with a uniform knot vector.
    pub fn from_points_and_order(points: Vec<Point3<T>>, order: usize) -> Result<Self> {
        Self::try_new(order, points, None, None, false)
    }

    /// Order-2 polyline through the given points.
    pub fn polyline(points: Vec<Point3<T>>) -> Result<Self> {
        Self::try_new(2, points, None, None, false)
    }

    pub fn order(&self) -> usize {
        self.params.order
    }

    pub fn degree(&self) -> usize {
        self.params.degree()
    }

    pub fn num_poles(&self) -> usize {
        self.params.num_poles
    }

    pub fn is_closed(&self) -> bool {
        self.params.closed
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    pub fn params(&self) -> &BsplineParams {
        &self.params
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub(crate) fn knots_mut(&mut self) -> &mut KnotVector<T> {
        &mut self.knots
    }

    /// Weighted poles as stored.
    pub fn poles(&self) -> &[Point3<T>] {
        &self.poles
    }

    pub fn weights(&self) -> Option<&[T]> {
        self.weights.as_deref()
    }

    pub fn weight(&self, i: usize) -> T {
        match &self.weights {
            Some(w) => w[i],
            None => T::one(),
        }
    }

    /// Pole with the weight divided back out.
    pub fn unweighted_pole(&self, i: usize) -> Point3<T> {
        match &self.weights {
            Some(w) => &self.poles[i] / w[i],
            None => self.poles[i],
        }
    }

    pub fn unweighted_poles(&self) -> Vec<Point3<T>> {
        (0..self.params.num_poles)
            .map(|i| self.unweighted_pole(i))
            .collect()
    }

    pub fn knots_domain(&self) -> (T, T) {
        self.knots.domain(&self.params)
    }

    /// Map a fraction in `[0, 1]` onto the natural knot domain.
    pub fn fraction_to_knot(&self, fraction: T) -> T {
        let (min, max) = self.knots_domain();
        fraction * max + (T::one() - fraction) * min
    }

    /// Map a natural knot value onto `[0, 1]`.
    pub fn knot_to_fraction(&self, knot: T) -> T {
        let (min, max) = self.knots_domain();
        (knot - min) / (max - min)
    }

    /// Evaluate the curve at a natural parameter, optionally with first and
    /// second derivatives. Parameters outside the domain are clamped.
    pub fn evaluate(&self, t: T, rows: DerivativeRows) -> CurvePoint<T> {
        let b = blending_functions(&self.knots, &self.params, t, rows);
        self.evaluate_with_blending(&b)
    }

    fn evaluate_with_blending(&self, b: &BlendingValues<T>) -> CurvePoint<T> {
        let order = self.params.order;
        let num_poles = self.params.num_poles;
        let span = b.pole_span(&self.params);

        let mut sum = Vector3::zeros();
        let mut s1 = Vector3::zeros();
        let mut s2 = Vector3::zeros();
        let mut h = T::zero();
        let mut h1 = T::zero();
        let mut h2 = T::zero();

        for j in 0..order {
            let idx = (span + j) % num_poles;
            let p = self.poles[idx].coords;
            let w = self.weight(idx);
            let c = b.values[j];
            sum += p * c;
            h += w * c;
            if let Some(first) = &b.first {
                let c = first[j];
                s1 += p * c;
                h1 += w * c;
            }
            if let Some(second) = &b.second {
                let c = second[j];
                s2 += p * c;
                h2 += w * c;
            }
        }

        let point = Point3::from(sum / h);
        let two = T::from_f64(2.0).unwrap();
        let second = b.second.as_ref().map(|_| {
            (s2 - point.coords * h2 + (point.coords * h1 - s1) * (two * h1 / h)) / h
        });
        let first = b
            .first
            .as_ref()
            .map(|_| (s1 - point.coords * h1) / h);

        CurvePoint {
            point,
            weight: h,
            first,
            second,
        }
    }

    /// Evaluate the curve at a natural parameter to get a point.
    pub fn point_at(&self, t: T) -> Point3<T> {
        self.evaluate(t, DerivativeRows::None).point
    }

    /// Evaluate the curve at a natural parameter to get a tangent vector.
    pub fn tangent_at(&self, t: T) -> Vector3<T> {
        self.evaluate(t, DerivativeRows::First).first.unwrap()
    }

    pub fn start_point(&self) -> Point3<T> {
        self.point_at(self.knots_domain().0)
    }

    pub fn end_point(&self) -> Point3<T> {
        self.point_at(self.knots_domain().1)
    }

    /// Greville abscissa associated with each pole.
    pub fn greville_abscissae(&self) -> Vec<T> {
        self.knots
            .greville_abscissae(&self.params, self.knots.tolerance(&self.params))
    }

    /// Curve length by Gauss-Legendre quadrature over each non-degenerate
    /// knot span.
    pub fn length(&self) -> T {
        let (start, end) = self.knots_domain();
        self.length_between(start, end)
    }

    /// Arc length between two natural parameters.
    pub fn length_between(&self, a: T, b: T) -> T {
        let (min, max) = self.knots_domain();
        let a = a.clamp(min, max);
        let b = b.clamp(min, max);
        if b <= a {
            return T::zero();
        }

        let gauss = GaussLegendre::init(16 + self.degree());
        let mut total = T::zero();
        let start_index = self.params.domain_start_index();
        let end_index = self.params.domain_end_index();
        for i in start_index..end_index {
            let lo = self.knots[i].max(a);
            let hi = self.knots[i + 1].min(b);
            if hi <= lo {
                continue;
            }
            let sum = gauss.integrate(lo.to_f64().unwrap(), hi.to_f64().unwrap(), |x| {
                let t = T::from_f64(x).unwrap();
                let tangent = self.evaluate(t, DerivativeRows::First).first.unwrap();
                tangent.norm().to_f64().unwrap()
            });
            total += T::from_f64(sum).unwrap();
        }
        total
    }

    /// Natural parameter at which the arc length from the domain start
    /// reaches `length`, by bisection.
    pub fn parameter_at_length(&self, length: T, tolerance: T) -> T {
        let (min, max) = self.knots_domain();
        if length <= T::zero() {
            return min;
        }
        let total = self.length();
        if length >= total {
            return max;
        }

        let mut lo = min;
        let mut hi = max;
        let half = T::from_f64(0.5).unwrap();
        let mut mid = (lo + hi) * half;
        for _ in 0..64 {
            mid = (lo + hi) * half;
            let l = self.length_between(min, mid);
            if (l - length).abs() < tolerance {
                break;
            }
            if l > length {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        mid
    }

    /// Insert a knot until it reaches `multiplicity`; purely additive.
    pub fn add_knot(&mut self, u: T, multiplicity: usize) -> Result<()> {
        let mut data = self.data();
        ops::insert_knot(&mut data, u, multiplicity)?;
        self.replace_with(data);
        Ok(())
    }

    /// Insert a batch of knots into a clamped open curve.
    pub fn refine_knots(&mut self, knots_to_insert: &[T]) -> Result<()> {
        let mut data = self.data();
        ops::refine_knots(&mut data, knots_to_insert)?;
        self.replace_with(data);
        Ok(())
    }

    /// Elevate to `target_degree`. Elevating to the current degree is a
    /// no-op; lowering is not supported. A closed curve is opened, elevated,
    /// and closed again.
    pub fn elevate_degree(&mut self, target_degree: usize) -> Result<()> {
        if target_degree <= self.degree() {
            return Ok(());
        }
        let was_closed = self.params.closed;
        let mut data = self.data();
        if was_closed {
            let (start, _) = self.knots_domain();
            ops::open_periodic(&mut data, start)?;
        }
        ops::elevate_degree(&mut data, target_degree)?;
        if was_closed {
            ops::close_periodic(&mut data)?;
        }
        self.replace_with(data);
        Ok(())
    }

    /// Convert a periodic curve to its clamped open form, re-anchored at `u`.
    pub fn make_open(&mut self, u: T) -> Result<()> {
        let mut data = self.data();
        ops::open_periodic(&mut data, u)?;
        self.replace_with(data);
        Ok(())
    }

    /// Convert a clamped open curve with coincident end points into periodic
    /// form.
    pub fn make_closed(&mut self) -> Result<()> {
        let mut data = self.data();
        ops::close_periodic(&mut data)?;
        self.replace_with(data);
        Ok(())
    }

    /// Extract the sub-curve between two natural parameters. Swapped bounds
    /// yield the reversed segment; a closed curve is re-anchored at `u1`
    /// first.
    pub fn segment(&self, u1: T, u2: T) -> Result<Self> {
        let tolerance = self.knots.tolerance(&self.params);
        let (min, max) = self.knots_domain();
        let diff = u2 - u1;
        if diff.abs() < tolerance {
            return Err(Error::DegenerateGeometry("zero length segment"));
        }
        let reversed = diff < T::zero();

        if diff.abs() >= max - min {
            let mut out = self.clone();
            if self.params.closed && (u1 - min).abs() > tolerance && (u1 - max).abs() > tolerance
            {
                out.make_open(u1.min(u2))?;
            }
            if reversed {
                out.invert();
            }
            return Ok(out);
        }

        let mut data = self.data();
        let (mut lo, mut hi) = (u1.min(u2), u1.max(u2));
        if self.params.closed {
            ops::open_periodic(&mut data, lo)?;
            hi = diff.abs();
            lo = T::zero();
        } else {
            lo = lo.clamp(min, max);
            hi = hi.clamp(min, max);
        }

        let order = data.params.order;
        ops::insert_knot(&mut data, lo, order)?;
        ops::insert_knot(&mut data, hi, order)?;

        let first_of = |knots: &[T], u: T| -> usize {
            knots
                .iter()
                .position(|k| (*k - u).abs() <= tolerance)
                .unwrap_or(0)
        };
        let a1 = first_of(&data.knots, lo);
        let a2 = first_of(&data.knots, hi);

        let mut segment = CurveData {
            poles: data.poles[a1..a2].to_vec(),
            knots: data.knots[a1..a2 + order].to_vec(),
            params: BsplineParams::new(order, a2 - a1, false)?,
        };
        segment.normalize_knots()?;

        let mut out = Self::from_data(segment, self.is_rational());
        if reversed {
            out.invert();
        }
        Ok(out)
    }

    /// Splice another open curve onto the end of this one with C0
    /// continuity. When the end poles coincide the seam pole is shared,
    /// otherwise both are kept with full seam multiplicity.
    pub fn append(&self, other: &Self) -> Result<Self> {
        if self.params.closed || other.params.closed {
            return Err(Error::InvalidKnots);
        }

        let target = self.degree().max(other.degree());
        let mut a = self.clone();
        let mut b = other.clone();
        a.elevate_degree(target)?;
        b.elevate_degree(target)?;
        a.normalize_knots()?;
        b.normalize_knots()?;

        let order = a.order();
        let mut a_data = a.data();
        let b_data = b.data();

        let seam = (a_data.poles[a.num_poles() - 1] / a_data.poles[a.num_poles() - 1].w
            - b_data.poles[0] / b_data.poles[0].w)
            .norm()
            < T::from_f64(1.0e-10).unwrap();

        // shift the second domain to [1, 2]
        let shifted: Vec<T> = b_data.knots.iter().map(|k| *k + T::one()).collect();

        let mut poles = std::mem::take(&mut a_data.poles);
        let mut knots = a_data.knots.clone();
        if seam {
            // shared seam pole, junction multiplicity degree (C0)
            poles.extend_from_slice(&b_data.poles[1..]);
            knots.pop();
            knots.extend_from_slice(&shifted[order..]);
        } else {
            // both end poles kept, junction saturated to full order
            poles.extend_from_slice(&b_data.poles);
            knots.extend_from_slice(&shifted[order..]);
        }

        let num_poles = poles.len();
        let mut joined = CurveData {
            poles,
            knots,
            params: BsplineParams::new(order, num_poles, false)?,
        };
        joined.normalize_knots()?;
        Ok(Self::from_data(joined, self.is_rational() || other.is_rational()))
    }

    /// Rescale the knot vector so the domain becomes `[0, 1]`.
    pub fn normalize_knots(&mut self) -> Result<()> {
        self.knots.normalize(&self.params)
    }

    /// Compute minimal-twist moving frames at the given parameters, seeded
    /// from the first tangent.
    pub fn compute_frenet_frames(&self, parameters: &[T]) -> Vec<FrenetFrame<T>> {
        let tangents: Vec<Vector3<T>> = parameters
            .iter()
            .map(|u| self.tangent_at(*u).normalize())
            .collect();

        let mut normal = Vector3::x();
        let tx = tangents[0].x.abs();
        let ty = tangents[0].y.abs();
        let tz = tangents[0].z.abs();
        let mut min = T::max_value().unwrap();
        if tx <= min {
            min = tx;
            normal = Vector3::x();
        }
        if ty <= min {
            min = ty;
            normal = Vector3::y();
        }
        if tz <= min {
            normal = Vector3::z();
        }

        let v = tangents[0].cross(&normal).normalize();
        let mut normals = vec![tangents[0].cross(&v).normalize()];
        let mut binormals = vec![tangents[0].cross(&normals[0]).normalize()];

        for i in 1..parameters.len() {
            let prev_normal = normals[i - 1];

            let v = tangents[i - 1].cross(&tangents[i]);
            if v.norm() > T::default_epsilon() {
                let theta = tangents[i - 1]
                    .dot(&tangents[i])
                    .clamp(-T::one(), T::one())
                    .acos();
                let rot = Rotation3::from_axis_angle(&UnitVector3::new_normalize(v), theta);
                normals.push(rot * prev_normal);
            } else {
                normals.push(prev_normal);
            }

            binormals.push(tangents[i].cross(&normals[i]).normalize());
        }

        parameters
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let position = self.point_at(*t);
                FrenetFrame::new(position, tangents[i], normals[i], binormals[i])
            })
            .collect()
    }

    /// Cast the curve to another floating point type.
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> BsplineCurve<F> {
        BsplineCurve {
            poles: self.poles.iter().map(|p| p.cast()).collect(),
            weights: self
                .weights
                .as_ref()
                .map(|w| w.iter().map(|w| nalgebra::convert(*w)).collect()),
            knots: self.knots.cast(),
            params: self.params,
        }
    }

    pub(crate) fn data(&self) -> CurveData<T> {
        CurveData {
            poles: (0..self.params.num_poles)
                .map(|i| {
                    let p = &self.poles[i];
                    Vector4::new(p.x, p.y, p.z, self.weight(i))
                })
                .collect(),
            knots: self.knots.to_vec(),
            params: self.params,
        }
    }

    pub(crate) fn from_data(data: CurveData<T>, rational: bool) -> Self {
        let poles = data
            .poles
            .iter()
            .map(|h| Point3::new(h.x, h.y, h.z))
            .collect();
        let weights = rational.then(|| data.poles.iter().map(|h| h.w).collect());
        Self {
            poles,
            weights,
            knots: KnotVector::new(data.knots),
            params: data.params,
        }
    }

    fn replace_with(&mut self, data: CurveData<T>) {
        let rational = self.is_rational();
        *self = Self::from_data(data, rational);
    }
}

/// Drop exactly one stray leading/trailing knot pair from an over-long
/// supplied vector, the way legacy data with sentinel end knots is accepted.
fn fix_knots<T: FloatingPoint>(knots: &mut Vec<T>, params: &BsplineParams) {
    if knots.len() == params.num_allocated_knots() + 2 {
        knots.remove(0);
        knots.pop();
    }
}

impl<T: FloatingPoint> Invertible for BsplineCurve<T> {
    /// Reverse the direction of the curve.
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    /// let points = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(1.0, 1.0, 0.0),
    /// ];
    /// let mut curve = BsplineCurve::from_points_and_order(points.clone(), 3).unwrap();
    /// curve.invert();
    /// assert_relative_eq!(curve.start_point(), points[2]);
    /// assert_relative_eq!(curve.end_point(), points[0]);
    /// ```
    fn invert(&mut self) {
        self.poles.reverse();
        if let Some(w) = self.weights.as_mut() {
            w.reverse();
        }
        self.knots.invert();
    }
}

/// Transform curve poles by an affine matrix; rational poles are transformed
/// in weighted form so the stored representation stays consistent.
impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for BsplineCurve<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        for i in 0..self.poles.len() {
            let w = self.weight(i);
            let p = &self.poles[i];
            let h = transform * Vector4::new(p.x, p.y, p.z, w);
            self.poles[i] = Point3::new(h.x, h.y, h.z);
            if let Some(weights) = self.weights.as_mut() {
                weights[i] = h.w;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    use super::*;

    fn wavy() -> BsplineCurve<f64> {
        BsplineCurve::from_points_and_order(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, -1.0, 0.0),
                Point3::new(3.0, 1.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
            ],
            4,
        )
        .unwrap()
    }

    /// Quadratic rational unit circle from three 120-degree arcs.
    fn unit_circle() -> BsplineCurve<f64> {
        let w = 0.5;
        let r = 2.0;
        let points = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(r * (std::f64::consts::FRAC_PI_3).cos(), r * (std::f64::consts::FRAC_PI_3).sin(), 0.0),
            Point3::new(-0.5, 3.0_f64.sqrt() / 2.0, 0.0),
            Point3::new(-r, 0.0, 0.0),
            Point3::new(-0.5, -(3.0_f64.sqrt()) / 2.0, 0.0),
            Point3::new(r * (std::f64::consts::FRAC_PI_3).cos(), -r * (std::f64::consts::FRAC_PI_3).sin(), 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let weights = vec![1.0, w, 1.0, w, 1.0, w, 1.0];
        let third = 1.0 / 3.0;
        let two_thirds = 2.0 / 3.0;
        let knots = vec![
            0.0, 0.0, 0.0, third, third, two_thirds, two_thirds, 1.0, 1.0, 1.0,
        ];
        BsplineCurve::try_new(3, points, Some(weights), Some(knots), false).unwrap()
    }

    #[test]
    fn clamped_curve_interpolates_end_poles() {
        let curve = wavy();
        assert_relative_eq!(curve.start_point(), Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(curve.end_point(), Point3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn circle_stays_on_radius() {
        let circle = unit_circle();
        for i in 0..=32 {
            let t = i as f64 / 32.0;
            let p = circle.point_at(t);
            assert_relative_eq!(p.coords.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn circle_length_is_circumference() {
        let circle = unit_circle();
        assert_relative_eq!(circle.length(), std::f64::consts::TAU, epsilon = 1e-4);
    }

    #[test]
    fn add_knot_preserves_shape() {
        let mut curve = wavy();
        let before: Vec<_> = (0..=16)
            .map(|i| curve.point_at(i as f64 / 16.0))
            .collect();
        curve.add_knot(0.4, 2).unwrap();
        assert_eq!(curve.num_poles(), 7);
        assert!(curve.knots().is_non_decreasing());
        for (i, p) in before.iter().enumerate() {
            let q = curve.point_at(i as f64 / 16.0);
            assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn elevate_degree_preserves_shape() {
        let mut curve = wavy();
        let before: Vec<_> = (0..=16)
            .map(|i| curve.point_at(i as f64 / 16.0))
            .collect();
        curve.elevate_degree(5).unwrap();
        assert_eq!(curve.order(), 6);
        for (i, p) in before.iter().enumerate() {
            let q = curve.point_at(i as f64 / 16.0);
            assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn elevate_to_current_degree_is_identity() {
        let mut curve = wavy();
        let original = curve.clone();
        curve.elevate_degree(3).unwrap();
        assert_eq!(curve, original);
    }

    #[test]
    fn segment_matches_parent() {
        let curve = wavy();
        let segment = curve.segment(0.25, 0.75).unwrap();
        for i in 0..=8 {
            let f = i as f64 / 8.0;
            let parent_t = 0.25 + 0.5 * f;
            let p = curve.point_at(parent_t);
            let q = segment.point_at(f);
            assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn tangent_of_line_is_constant() {
        let line = BsplineCurve::polyline(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ])
        .unwrap();
        let t = line.tangent_at(0.5);
        assert_relative_eq!(t, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    }
}
