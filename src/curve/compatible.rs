use crate::errors::Result;
use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

use super::BsplineCurve;

/// Bring a set of curves to a common order and an identical knot vector.
///
/// Closed curves are opened at their domain start; every curve is elevated to
/// the highest degree present, re-normalized to `[0, 1]`, and refined with
/// the knots it is missing from the merged set.
pub fn make_curves_compatible<T: FloatingPoint>(
    curves: &[BsplineCurve<T>],
) -> Result<Vec<BsplineCurve<T>>> {
    let max_degree = curves.iter().fold(0, |d, c| d.max(c.degree()));

    let mut curves: Vec<BsplineCurve<T>> = curves
        .iter()
        .map(|c| {
            let mut c = c.clone();
            if c.is_closed() {
                let (start, _) = c.knots_domain();
                c.make_open(start)?;
            }
            c.elevate_degree(max_degree)?;
            c.normalize_knots()?;
            Ok(c)
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = curves.iter().fold(vec![], |acc, c| {
        KnotVector::sorted_union(c.knots().as_slice(), &acc)
    });

    for curve in curves.iter_mut() {
        let missing = KnotVector::sorted_difference(&merged, curve.knots().as_slice());
        if !missing.is_empty() {
            curve.refine_knots(&missing)?;
        }
    }

    Ok(curves)
}

/// Two-curve convenience wrapper used by the ruled/Coons builders.
pub fn make_two_curves_compatible<T: FloatingPoint>(
    a: &BsplineCurve<T>,
    b: &BsplineCurve<T>,
) -> Result<(BsplineCurve<T>, BsplineCurve<T>)> {
    let mut unified = make_curves_compatible(&[a.clone(), b.clone()])?;
    let second = unified.pop().unwrap();
    let first = unified.pop().unwrap();
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;

    #[test]
    fn unified_curves_share_structure() {
        let a = BsplineCurve::from_points_and_order(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            3,
        )
        .unwrap();
        let b = BsplineCurve::from_points_and_order(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(2.0, 1.0, 1.0),
                Point3::new(3.0, 0.0, 1.0),
                Point3::new(4.0, 0.0, 1.0),
            ],
            4,
        )
        .unwrap();

        let (ua, ub) = make_two_curves_compatible(&a, &b).unwrap();
        assert_eq!(ua.order(), ub.order());
        assert_eq!(ua.num_poles(), ub.num_poles());
        assert_eq!(ua.knots(), ub.knots());

        // shape preserved
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert_relative_eq!((a.point_at(t) - ua.point_at(t)).norm(), 0.0, epsilon = 1e-10);
            assert_relative_eq!((b.point_at(t) - ub.point_at(t)).norm(), 0.0, epsilon = 1e-10);
        }
    }
}
