use nalgebra::{Point3, Vector3};

use crate::knot::{blending_functions, DerivativeRows};
use crate::misc::FloatingPoint;

use super::{BsplineSurface, SurfaceDirection};

/// Position and partial derivatives of a surface at one parameter pair.
#[derive(Clone, Debug)]
pub struct SurfacePartials<T: FloatingPoint> {
    pub point: Point3<T>,
    pub weight: T,
    pub du: Vector3<T>,
    pub dv: Vector3<T>,
    pub duu: Vector3<T>,
    pub dvv: Vector3<T>,
    pub duv: Vector3<T>,
    pub normal: Vector3<T>,
}

/// Principal curvature frame at a surface point, ordered so the first
/// curvature has the larger absolute value.
#[derive(Clone, Debug)]
pub struct PrincipalCurvature<T: FloatingPoint> {
    pub point: Point3<T>,
    pub direction1: Vector3<T>,
    pub curvature1: T,
    pub direction2: Vector3<T>,
    pub curvature2: T,
}

/// Magnitude below which a tangent is treated as degenerate and the normal
/// falls back to the control-polygon estimate.
const ZERO_TANGENT_MAGNITUDE: f64 = 0.001;

impl<T: FloatingPoint> BsplineSurface<T> {
    /// Evaluate the surface position at `(u, v)`. Parameters outside the
    /// domain are clamped.
    pub fn evaluate_point(&self, u: T, v: T) -> Point3<T> {
        self.evaluate_raw(u, v, DerivativeRows::None).0
    }

    /// Evaluate position and first partial derivatives.
    pub fn evaluate_point_and_tangents(&self, u: T, v: T) -> (Point3<T>, Vector3<T>, Vector3<T>) {
        let (point, _, partials) = self.evaluate_raw(u, v, DerivativeRows::First);
        let [du, dv, ..] = partials;
        (point, du, dv)
    }

    /// Evaluate position, first and second partials, and the surface normal.
    ///
    /// The normal is `du x dv`; when either tangent collapses (degenerate
    /// edge) it is replaced by the control-polygon estimate along that edge
    /// rather than reported as an error.
    pub fn evaluate_partials(&self, u: T, v: T) -> SurfacePartials<T> {
        let (point, weight, [du, dv, duu, dvv, duv]) =
            self.evaluate_raw(u, v, DerivativeRows::Second);

        let mut normal = du.cross(&dv);
        let threshold = T::from_f64(ZERO_TANGENT_MAGNITUDE).unwrap();
        if du.norm() < threshold {
            normal = self.zero_tangent_normal(v, SurfaceDirection::U);
        } else if dv.norm() < threshold {
            normal = self.zero_tangent_normal(u, SurfaceDirection::V);
        }

        SurfacePartials {
            point,
            weight,
            du,
            dv,
            duu,
            dvv,
            duv,
            normal,
        }
    }

    /// Surface normal at `(u, v)` including the degenerate-edge fallback.
    pub fn normal_at(&self, u: T, v: T) -> Vector3<T> {
        self.evaluate_partials(u, v).normal
    }

    /// Tensor-product accumulation over the active pole window; returns the
    /// point, the rational weight and `[du, dv, duu, dvv, duv]`.
    fn evaluate_raw(&self, u: T, v: T, rows: DerivativeRows) -> (Point3<T>, T, [Vector3<T>; 5]) {
        let ub = blending_functions(&self.u_knots, &self.u_params, u, rows);
        let vb = blending_functions(&self.v_knots, &self.v_params, v, rows);

        let u_span = ub.pole_span(&self.u_params);
        let v_span = vb.pole_span(&self.v_params);
        let num_u = self.u_params.num_poles;
        let num_v = self.v_params.num_poles;

        let mut s = Vector3::zeros();
        let mut h = T::zero();
        let mut s1 = [Vector3::zeros(); 5];
        let mut h1 = [T::zero(); 5];

        for i in 0..self.u_params.order {
            let ui = (u_span + i) % num_u;
            let cu = ub.values[i];
            let du = ub.first.as_ref().map_or(T::zero(), |d| d[i]);
            let duu = ub.second.as_ref().map_or(T::zero(), |d| d[i]);

            for j in 0..self.v_params.order {
                let vj = (v_span + j) % num_v;
                let cv = vb.values[j];
                let dv = vb.first.as_ref().map_or(T::zero(), |d| d[j]);
                let dvv = vb.second.as_ref().map_or(T::zero(), |d| d[j]);

                let p = self.grid.pole(ui, vj).coords;
                let w = self.grid.weight(ui, vj);

                let c = cu * cv;
                s += p * c;
                h += w * c;

                // [du, dv, duu, dvv, duv]
                let products = [du * cv, cu * dv, duu * cv, cu * dvv, du * dv];
                for (k, c) in products.into_iter().enumerate() {
                    s1[k] += p * c;
                    h1[k] += w * c;
                }
            }
        }

        let point = Point3::from(s / h);
        let p = point.coords;
        let two = T::from_f64(2.0).unwrap();

        // second-order quotient rule first: it reads the raw first-order sums
        let duu = (s1[2] - p * h1[2] + (p * h1[0] - s1[0]) * (two * h1[0] / h)) / h;
        let dvv = (s1[3] - p * h1[3] + (p * h1[1] - s1[1]) * (two * h1[1] / h)) / h;
        let duv = (s1[4] - p * h1[4]
            + (p * (two * h1[0] * h1[1]) - s1[0] * h1[1] - s1[1] * h1[0]) / h)
            / h;
        let du = (s1[0] - p * h1[0]) / h;
        let dv = (s1[1] - p * h1[1]) / h;

        (point, h, [du, dv, duu, dvv, duv])
    }

    /// Estimate the normal near a degenerate edge by averaging cross
    /// products of edge-adjacent control polygon segments.
    ///
    /// `direction` names the degenerate tangent; `param` is the parameter in
    /// the other direction, selecting which edge of the grid to probe.
    fn zero_tangent_normal(&self, param: T, direction: SurfaceDirection) -> Vector3<T> {
        let eps = T::from_f64(1.0e-10).unwrap();
        let num_u = self.u_params.num_poles;
        let num_v = self.v_params.num_poles;
        let mut sum = Vector3::zeros();

        match direction {
            SurfaceDirection::U => {
                let (j0, j1, scale) = if param >= eps {
                    (
                        num_v - 1,
                        num_v - 2,
                        -T::one() / T::from_usize(num_u).unwrap(),
                    )
                } else {
                    (0, 1, T::one() / T::from_usize(num_u).unwrap())
                };
                for i in 0..num_u - 1 {
                    let p11 = self.grid.unweighted_pole(i, j0);
                    let p12 = self.grid.unweighted_pole(i, j1);
                    let p21 = self.grid.unweighted_pole(i + 1, j0);
                    let p22 = self.grid.unweighted_pole(i + 1, j1);
                    sum += (p22 - p21).cross(&(p12 - p11));
                }
                sum * scale
            }
            SurfaceDirection::V => {
                let (i0, i1, sign) = if param >= eps {
                    (num_u - 1, num_u - 2, T::one())
                } else {
                    (0, 1, -T::one())
                };
                for j in 0..num_v - 1 {
                    let p11 = self.grid.unweighted_pole(i0, j);
                    let p12 = self.grid.unweighted_pole(i1, j);
                    let p21 = self.grid.unweighted_pole(i0, j + 1);
                    let p22 = self.grid.unweighted_pole(i1, j + 1);
                    sum += (p22 - p21).cross(&(p12 - p11));
                }
                sum * (sign / T::from_usize(num_v).unwrap())
            }
        }
    }

    /// Evaluate a uniform grid of points over the full parameter domain.
    /// Returns the u parameters, the v parameters and the points in v-major
    /// order (all u for the first v, then the next v).
    pub fn evaluate_uniform_grid(
        &self,
        num_u_points: usize,
        num_v_points: usize,
    ) -> (Vec<T>, Vec<T>, Vec<Point3<T>>) {
        let (u_min, u_max) = self.knots_domain(SurfaceDirection::U);
        let (v_min, v_max) = self.knots_domain(SurfaceDirection::V);

        let interpolate = |min: T, max: T, count: usize| -> Vec<T> {
            if count == 1 {
                return vec![min];
            }
            let last = T::from_usize(count - 1).unwrap();
            (0..count)
                .map(|i| {
                    let f = T::from_usize(i).unwrap() / last;
                    min + (max - min) * f
                })
                .collect()
        };

        let us = interpolate(u_min, u_max, num_u_points);
        let vs = interpolate(v_min, v_max, num_v_points);

        let mut points = Vec::with_capacity(num_u_points * num_v_points);
        for v in &vs {
            for u in &us {
                points.push(self.evaluate_point(*u, *v));
            }
        }
        (us, vs, points)
    }

    /// Principal curvatures from the first and second fundamental forms via
    /// the characteristic quadratic of the shape operator.
    ///
    /// Returns `None` when the first fundamental form is singular (degenerate
    /// tangent plane); this is the documented fallback, not an error.
    pub fn principal_curvature(&self, u: T, v: T) -> Option<PrincipalCurvature<T>> {
        let partials = self.evaluate_partials(u, v);
        let du = partials.du;
        let dv = partials.dv;

        let cross = du.cross(&dv);
        let e = du.dot(&du);
        let f = du.dot(&dv);
        let g = dv.dot(&dv);
        let bb = e * g - f * f;
        if bb <= T::zero() {
            return None;
        }
        let b = bb.sqrt();
        if b < T::default_epsilon() {
            return None;
        }

        let l = partials.duu.dot(&cross) / b;
        let m = partials.duv.dot(&cross) / b;
        let n = partials.dvv.dot(&cross) / b;

        // det(F2 - k F1) = 0
        let c2 = e * g - f * f;
        let c1 = T::from_f64(2.0).unwrap() * m * f - (l * g + e * n);
        let c0 = l * n - m * m;

        let disc = (c1 * c1 - T::from_f64(4.0).unwrap() * c2 * c0).max(T::zero());
        let root = disc.sqrt();
        let half = T::from_f64(0.5).unwrap();
        let k_a = (-c1 + root) * half / c2;
        let k_b = (-c1 - root) * half / c2;

        let direction_for = |k: T| -> Vector3<T> {
            let r0 = (l - k * e, m - k * f);
            let r1 = (m - k * f, n - k * g);
            let n0 = r0.0 * r0.0 + r0.1 * r0.1;
            let n1 = r1.0 * r1.0 + r1.1 * r1.1;
            let (x, y) = if n0 >= n1 {
                (-r0.1, r0.0)
            } else {
                (-r1.1, r1.0)
            };
            let dir = du * x + dv * y;
            if dir.norm() < T::default_epsilon() {
                // umbilic point, any tangent direction works
                du.normalize()
            } else {
                dir.normalize()
            }
        };

        let (k1, k2) = if k_a.abs() >= k_b.abs() {
            (k_a, k_b)
        } else {
            (k_b, k_a)
        };

        Some(PrincipalCurvature {
            point: partials.point,
            direction1: direction_for(k1),
            curvature1: k1,
            direction2: direction_for(k2),
            curvature2: k2,
        })
    }
}
