use std::ops::{Index, IndexMut};

use nalgebra::{convert, RealField};
use simba::scalar::SupersetOf;

use crate::errors::{Error, Result};
use crate::misc::{FloatingPoint, Invertible};

use super::{BsplineParams, KnotMultiplicity, RELATIVE_KNOT_TOLERANCE};

/// Knot vector representation
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: FloatingPoint> KnotVector<T> {
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Generate the full knot vector for the given parameters.
    ///
    /// Interior knots are taken from `interior` when provided (they must be
    /// normalized to (0, 1)), or spaced uniformly otherwise. Open directions
    /// are clamped with full start/end multiplicity; closed directions get the
    /// periodic wrap pattern on both sides of the `[0, 1]` domain.
    ///
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// let params = BsplineParams::new(3, 5, false).unwrap();
    /// let knots: KnotVector<f64> = KnotVector::generate(&params, None);
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 1. / 3., 2. / 3., 1., 1., 1.]);
    /// ```
    pub fn generate(params: &BsplineParams, interior: Option<&[T]>) -> Self {
        let order = params.order;
        let num_interior = params.num_interior_knots();
        let mut knots = vec![T::zero(); params.num_allocated_knots()];

        match interior {
            Some(values) => {
                knots[order..order + num_interior].copy_from_slice(&values[..num_interior]);
            }
            None => {
                let delta = T::one() / T::from_usize(num_interior + 1).unwrap();
                let mut current = T::zero();
                for knot in knots.iter_mut().skip(order).take(num_interior) {
                    current += delta;
                    *knot = current;
                }
            }
        }

        knots[order - 1] = T::zero();
        if params.closed {
            for i in 0..order {
                knots[i] = knots[num_interior + 1 + i] - T::one();
                knots[num_interior + order + i] = knots[order - 1 + i] + T::one();
            }
        } else {
            for i in 0..order {
                knots[i] = T::zero();
                knots[num_interior + order + i] = T::one();
            }
        }

        Self(knots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.0
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<T> {
        self.0.iter_mut()
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.0.windows(2).all(|w| w[0] <= w[1])
    }

    /// The parameter domain spanned by these knots.
    pub fn domain(&self, params: &BsplineParams) -> (T, T) {
        (
            self.0[params.domain_start_index()],
            self.0[params.domain_end_index()],
        )
    }

    pub fn clamp(&self, params: &BsplineParams, u: T) -> T {
        let (min, max) = self.domain(params);
        u.clamp(min, max)
    }

    /// Tolerance for treating two knots of this vector as equal, relative to
    /// the domain span.
    pub fn tolerance(&self, params: &BsplineParams) -> T {
        let (min, max) = self.domain(params);
        T::from_f64(RELATIVE_KNOT_TOLERANCE).unwrap() * (max - min).abs()
    }

    /// Find the span index such that `knots[i] < t <= knots[i + 1]`, with
    /// out-of-domain parameters clamped to the first/last span.
    pub fn find_span(&self, params: &BsplineParams, t: T) -> usize {
        let min_index = params.domain_start_index();
        let max_index = params.domain_end_index();
        let min_knot = self.0[min_index];
        let max_knot = self.0[max_index];

        if t <= min_knot {
            return min_index;
        }
        if t > max_knot {
            return max_index;
        }

        let mut left = params.order;
        let mut right = max_index;
        loop {
            let i = (left + right) / 2;
            if t <= self.0[i] {
                if t > self.0[i - 1] {
                    return i - 1;
                }
                right = i - 1;
            } else {
                if t <= self.0[i + 1] {
                    return i;
                }
                left = i + 1;
            }
        }
    }

    /// Rescale all knots so the domain becomes exactly `[0, 1]`, fixing up
    /// the clamp/wrap pattern afterwards to absorb roundoff.
    pub fn normalize(&mut self, params: &BsplineParams) -> Result<()> {
        let (min, max) = self.domain(params);
        let divisor = max - min;
        if divisor.abs() < T::from_f64(RELATIVE_KNOT_TOLERANCE).unwrap() {
            return Err(Error::InvalidKnots);
        }

        for knot in self.0.iter_mut() {
            *knot = (*knot - min) / divisor;
        }

        let num_knots = self.0.len();
        let order = params.order;
        if params.closed {
            self.0[params.domain_end_index()] = T::one();
            for i in 0..order {
                self.0[i] = self.0[num_knots - 2 * order + 1 + i] - T::one();
                self.0[num_knots - order + i] = self.0[order - 1 + i] + T::one();
            }
        } else {
            for i in 0..order {
                self.0[params.num_poles + i] = T::one();
            }
        }
        Ok(())
    }

    /// Greville abscissa associated with each pole: the average of `degree`
    /// consecutive knots. Node values within `tolerance` of a domain end are
    /// snapped onto it.
    pub fn greville_abscissae(&self, params: &BsplineParams, tolerance: T) -> Vec<T> {
        let degree = params.degree();
        let first = if params.closed { 2 } else { 1 };
        let inv = T::one() / T::from_usize(degree).unwrap();

        let mut nodes: Vec<T> = (0..params.num_poles)
            .map(|i| {
                let mut sum = T::zero();
                for j in 0..degree {
                    sum += self.0[first + i + j];
                }
                sum * inv
            })
            .collect();

        let (min_knot, max_knot) = self.domain(params);
        if (nodes[0] - min_knot).abs() < tolerance {
            nodes[0] = min_knot;
        }
        let last = nodes.len() - 1;
        if (nodes[last] - max_knot).abs() < tolerance {
            nodes[last] = max_knot;
        }
        nodes
    }

    /// Add a knot keeping the vector sorted; returns the index of the added
    /// knot.
    pub fn add(&mut self, knot: T) -> usize {
        match self.0.iter().rposition(|t| *t <= knot) {
            Some(idx) => {
                self.0.insert(idx + 1, knot);
                idx + 1
            }
            None => {
                self.0.insert(0, knot);
                0
            }
        }
    }

    /// Get the multiplicity of each distinct knot.
    /// # Example
    /// ```
    /// use bsurf::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let mult = knots.multiplicity();
    /// assert_eq!(mult[0].multiplicity(), 3);
    /// assert_eq!(mult[1].multiplicity(), 1);
    /// assert_eq!(mult[3].multiplicity(), 3);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let mut current = KnotMultiplicity::new(self.0[0], 0);
        self.0.iter().for_each(|knot| {
            if (*knot - *current.knot()).abs() > T::default_epsilon() {
                mult.push(current);
                current = KnotMultiplicity::new(*knot, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Multiplicity of `t` among the existing knots, together with the
    /// snapped knot value.
    pub fn multiplicity_at(&self, t: T, tolerance: T) -> (T, usize) {
        let mut current = t;
        let mut count = 0;
        for knot in self.0.iter() {
            if (*knot - current).abs() <= tolerance {
                current = *knot;
                count += 1;
            } else if count > 0 {
                break;
            }
        }
        (current, count)
    }

    /// Cast the knot vector to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector::new(self.0.iter().map(|v| convert(*v)).collect())
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> IndexMut<usize> for KnotVector<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<T> FromIterator<T> for KnotVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: FloatingPoint> Invertible for KnotVector<T> {
    /// Reverses the knot vector, preserving span widths.
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// let mut knot = KnotVector::new(vec![0., 0., 0., 1., 2., 2.5, 3.5, 4.0, 4.0]);
    /// knot.invert();
    /// let dst = vec![0.0, 0.0, 0.5, 1.5, 2.0, 3.0, 4.0, 4.0, 4.0];
    /// knot.iter().enumerate().for_each(|(i, v)| {
    ///     assert_eq!(*v, dst[i]);
    /// });
    /// ```
    fn invert(&mut self) {
        let min = self.0.first().unwrap();

        let mut next = vec![*min];
        let len = self.len();
        for i in 1..len {
            next.push(next[i - 1] + (self[len - i] - self[len - i - 1]));
        }

        self.0 = next;
    }
}

impl<T: RealField + Copy> KnotVector<T> {
    /// Merge two sorted knot sequences, collapsing equal values.
    pub fn sorted_union(a: &[T], b: &[T]) -> Vec<T> {
        let mut merged = Vec::new();
        let mut ai = 0;
        let mut bi = 0;
        while ai < a.len() || bi < b.len() {
            if ai >= a.len() {
                merged.push(b[bi]);
                bi += 1;
                continue;
            } else if bi >= b.len() {
                merged.push(a[ai]);
                ai += 1;
                continue;
            }

            let diff = a[ai] - b[bi];
            if diff.abs() < T::default_epsilon() {
                merged.push(a[ai]);
                ai += 1;
                bi += 1;
            } else if diff > T::zero() {
                merged.push(b[bi]);
                bi += 1;
            } else {
                merged.push(a[ai]);
                ai += 1;
            }
        }
        merged
    }

    /// Knots of `a` not present in `b` (both sorted).
    pub fn sorted_difference(a: &[T], b: &[T]) -> Vec<T> {
        let mut result = Vec::new();
        let mut ai = 0;
        let mut bi = 0;
        while ai < a.len() {
            if bi >= b.len() {
                result.push(a[ai]);
                ai += 1;
                continue;
            }
            if (a[ai] - b[bi]).abs() < T::default_epsilon() {
                ai += 1;
                bi += 1;
            } else {
                result.push(a[ai]);
                ai += 1;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_closed_wraps() {
        let params = BsplineParams::new(3, 6, true).unwrap();
        let interior = [
            1.0 / 3.0,
            1.0 / 3.0,
            2.0 / 3.0,
            2.0 / 3.0,
            1.0,
        ];
        let knots: KnotVector<f64> = KnotVector::generate(&params, Some(&interior));
        assert_eq!(knots.len(), params.num_allocated_knots());
        let (min, max) = knots.domain(&params);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
        // periodic wrap repeats span widths across the seam
        assert!((knots[0] - (-1.0 / 3.0)).abs() < 1e-15);
        assert!((knots[1] - 0.0).abs() < 1e-15);
        assert!((knots[9] - 4.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn find_span_semantics() {
        let params = BsplineParams::new(3, 6, false).unwrap();
        let knots = KnotVector::new(vec![0., 0., 0., 0.25, 0.5, 0.75, 1., 1., 1.]);
        assert_eq!(knots.find_span(&params, 0.0), 2);
        assert_eq!(knots.find_span(&params, 0.25), 2);
        assert_eq!(knots.find_span(&params, 0.26), 3);
        assert_eq!(knots.find_span(&params, 1.0), 5);
        assert_eq!(knots.find_span(&params, 2.0), 6);
    }

    #[test]
    fn greville_clamped() {
        let params = BsplineParams::new(3, 5, false).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        let nodes = knots.greville_abscissae(&params, 1e-10);
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes[0], 0.0);
        assert_eq!(nodes[4], 1.0);
        assert!(nodes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn normalize_rescales_domain() {
        let params = BsplineParams::new(2, 3, false).unwrap();
        let mut knots = KnotVector::new(vec![2., 2., 3., 4., 4.]);
        knots.normalize(&params).unwrap();
        assert_eq!(knots.to_vec(), vec![0., 0., 0.5, 1., 1.]);
    }
}
