use crate::misc::FloatingPoint;

use super::{BsplineParams, KnotVector};

/// How many derivative rows the blending evaluation should produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerivativeRows {
    None,
    First,
    Second,
}

/// The non-zero B-spline basis values at a parameter, with optional first and
/// second derivative rows.
///
/// `values[j]` weights the pole with index `(left - order + j)`, taken modulo
/// the pole count for a closed direction.
#[derive(Clone, Debug)]
pub struct BlendingValues<T> {
    pub left: usize,
    pub values: Vec<T>,
    pub first: Option<Vec<T>>,
    pub second: Option<Vec<T>>,
}

impl<T: FloatingPoint> BlendingValues<T> {
    /// Index of the first pole in the active window, wrapped for closed
    /// directions.
    pub fn pole_span(&self, params: &BsplineParams) -> usize {
        let mut span = self.left as isize - params.order as isize;
        if params.closed && span < 0 {
            span += params.num_poles as isize;
        }
        span as usize
    }
}

/// Evaluate the `order` non-vanishing blending functions at `u` by the
/// Cox-de Boor triangular recurrence, together with their first and second
/// derivatives when requested.
///
/// Out-of-domain parameters are clamped onto the domain. A zero-width span
/// contributes its numerator term unscaled instead of dividing by zero.
pub fn blending_functions<T: FloatingPoint>(
    knots: &KnotVector<T>,
    params: &BsplineParams,
    u: T,
    rows: DerivativeRows,
) -> BlendingValues<T> {
    let order = params.order;
    let (u_min, u_max) = knots.domain(params);
    let u = u.clamp(u_min, u_max);

    // left is the smallest index with u < knots[left] (or the domain end)
    let mut left = 1;
    let last = knots.len() - 1;
    while left < last && u >= knots[left] && knots[left] < u_max {
        left += 1;
    }

    let wants_first = rows != DerivativeRows::None;
    let wants_second = rows == DerivativeRows::Second;

    let mut values = vec![T::zero(); order];
    let mut first = wants_first.then(|| vec![T::zero(); order]);
    let mut second = wants_second.then(|| vec![T::zero(); order]);

    let mut d_plus = vec![T::zero(); order];
    let mut d_minus = vec![T::zero(); order];

    values[0] = T::one();

    let two = T::from_f64(2.0).unwrap();
    for s in 0..order - 1 {
        d_plus[s] = knots[left + s] - u;
        d_minus[s] = u - knots[left - 1 - s];

        let mut next_c = T::zero();
        let mut next_dc = T::zero();
        let mut next_ddc = T::zero();

        for r in 0..=s {
            let denom = d_plus[r] + d_minus[s - r];
            let degenerate = denom == T::zero();

            let m = if degenerate {
                values[r]
            } else {
                values[r] / denom
            };
            values[r] = next_c + d_plus[r] * m;
            next_c = d_minus[s - r] * m;

            let mut n = T::zero();
            if let Some(first) = first.as_mut() {
                n = if degenerate { first[r] } else { first[r] / denom };
                first[r] = next_dc + d_plus[r] * n - m;
                next_dc = d_minus[s - r] * n + m;
            }
            if let Some(second) = second.as_mut() {
                let l = if degenerate {
                    second[r]
                } else {
                    second[r] / denom
                };
                second[r] = next_ddc + d_plus[r] * l - two * n;
                next_ddc = d_minus[s - r] * l + two * n;
            }
        }

        values[s + 1] = next_c;
        if let Some(first) = first.as_mut() {
            first[s + 1] = next_dc;
        }
        if let Some(second) = second.as_mut() {
            second[s + 1] = next_ddc;
        }
    }

    BlendingValues {
        left,
        values,
        first,
        second,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn partition_of_unity() {
        let params = BsplineParams::new(4, 7, false).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        for i in 0..=20 {
            let u = i as f64 / 20.0;
            let b = blending_functions(&knots, &params, u, DerivativeRows::Second);
            let sum: f64 = b.values.iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
            let dsum: f64 = b.first.as_ref().unwrap().iter().sum();
            assert_relative_eq!(dsum, 0.0, epsilon = 1e-9);
            let ddsum: f64 = b.second.as_ref().unwrap().iter().sum();
            assert_relative_eq!(ddsum, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn clamped_endpoint_interpolates() {
        let params = BsplineParams::new(3, 5, false).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        let b = blending_functions(&knots, &params, 0.0, DerivativeRows::None);
        assert_eq!(b.pole_span(&params), 0);
        assert_relative_eq!(b.values[0], 1.0, epsilon = 1e-14);
        let b = blending_functions(&knots, &params, 1.0, DerivativeRows::None);
        assert_eq!(b.pole_span(&params) + params.order, params.num_poles);
        assert_relative_eq!(b.values[params.order - 1], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn periodic_window_wraps() {
        let params = BsplineParams::new(3, 6, true).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        let b = blending_functions(&knots, &params, 0.95, DerivativeRows::None);
        let span = b.pole_span(&params);
        assert!(span + params.order > params.num_poles);
        let sum: f64 = b.values.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn out_of_domain_clamps() {
        let params = BsplineParams::new(3, 5, false).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        let lo = blending_functions(&knots, &params, -2.0, DerivativeRows::None);
        let hi = blending_functions(&knots, &params, 0.0, DerivativeRows::None);
        assert_eq!(lo.left, hi.left);
        assert_eq!(lo.values, hi.values);
    }
}
