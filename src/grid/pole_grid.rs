use nalgebra::{Point3, Vector4};

use crate::errors::{Error, Result};
use crate::misc::FloatingPoint;

/// A flattened row-major grid of control points with optional weights.
///
/// The linear index of the pole at `(u, v)` is `v * num_u + u`; this layout
/// is part of the type's contract, not an implementation detail. When the
/// grid is rational the weight array parallels the pole array and the stored
/// poles are pre-multiplied by their weights.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoleGrid<T: FloatingPoint> {
    poles: Vec<Point3<T>>,
    weights: Option<Vec<T>>,
    num_u: usize,
    num_v: usize,
}

impl<T: FloatingPoint> Default for PoleGrid<T> {
    fn default() -> Self {
        Self {
            poles: vec![],
            weights: None,
            num_u: 0,
            num_v: 0,
        }
    }
}

impl<T: FloatingPoint> PoleGrid<T> {
    /// Validating constructor.
    /// # Failures
    /// - the grid is empty
    /// - `poles.len() != num_u * num_v`
    /// - a weight array is present with a different length
    pub fn try_new(
        num_u: usize,
        num_v: usize,
        poles: Vec<Point3<T>>,
        weights: Option<Vec<T>>,
    ) -> Result<Self> {
        let total = num_u * num_v;
        if total == 0 {
            return Err(Error::NoPoles);
        }
        if poles.len() != total {
            return Err(Error::PoleCountMismatch {
                num_u,
                num_v,
                num_points: poles.len(),
            });
        }
        if let Some(w) = &weights {
            if w.len() != total {
                return Err(Error::WeightCountMismatch {
                    num_weights: w.len(),
                    num_poles: total,
                });
            }
        }
        Ok(Self {
            poles,
            weights,
            num_u,
            num_v,
        })
    }

    /// An origin-filled grid, rational when `rational` is set.
    pub fn zeroed(num_u: usize, num_v: usize, rational: bool) -> Result<Self> {
        let total = num_u * num_v;
        if total == 0 {
            return Err(Error::NoPoles);
        }
        Ok(Self {
            poles: vec![Point3::origin(); total],
            weights: rational.then(|| vec![T::one(); total]),
            num_u,
            num_v,
        })
    }

    pub fn num_u(&self) -> usize {
        self.num_u
    }

    pub fn num_v(&self) -> usize {
        self.num_v
    }

    pub fn len(&self) -> usize {
        self.poles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poles.is_empty()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    /// Linear index of `(u, v)`.
    #[inline]
    pub fn index(&self, u: usize, v: usize) -> usize {
        assert!(u < self.num_u && v < self.num_v, "pole index out of range");
        v * self.num_u + u
    }

    pub fn pole(&self, u: usize, v: usize) -> &Point3<T> {
        &self.poles[self.index(u, v)]
    }

    pub fn pole_mut(&mut self, u: usize, v: usize) -> &mut Point3<T> {
        let idx = self.index(u, v);
        &mut self.poles[idx]
    }

    pub fn weight(&self, u: usize, v: usize) -> T {
        match &self.weights {
            Some(w) => w[self.index(u, v)],
            None => T::one(),
        }
    }

    pub fn set_weight(&mut self, u: usize, v: usize, weight: T) {
        let idx = self.index(u, v);
        if let Some(w) = self.weights.as_mut() {
            w[idx] = weight;
        }
    }

    pub fn poles(&self) -> &[Point3<T>] {
        &self.poles
    }

    pub fn poles_mut(&mut self) -> &mut [Point3<T>] {
        &mut self.poles
    }

    pub fn weights(&self) -> Option<&[T]> {
        self.weights.as_deref()
    }

    pub fn weights_mut(&mut self) -> Option<&mut [T]> {
        self.weights.as_deref_mut()
    }

    /// Pole with the weight divided back out.
    pub fn unweighted_pole(&self, u: usize, v: usize) -> Point3<T> {
        let p = self.pole(u, v);
        match &self.weights {
            Some(w) => p / w[self.index(u, v)],
            None => *p,
        }
    }

    /// Homogeneous `(wx, wy, wz, w)` form of the pole at `(u, v)`.
    pub fn homogeneous(&self, u: usize, v: usize) -> Vector4<T> {
        let p = self.pole(u, v);
        Vector4::new(p.x, p.y, p.z, self.weight(u, v))
    }

    pub fn set_homogeneous(&mut self, u: usize, v: usize, h: Vector4<T>) {
        let idx = self.index(u, v);
        self.poles[idx] = Point3::new(h.x, h.y, h.z);
        if let Some(w) = self.weights.as_mut() {
            w[idx] = h.w;
        }
    }

    /// Divide every pole by its weight, leaving the weights in place.
    /// No-op for a non-rational grid.
    pub fn unweight_poles(&mut self) {
        if let Some(weights) = &self.weights {
            for (p, w) in self.poles.iter_mut().zip(weights.iter()) {
                *p /= *w;
            }
        }
    }

    /// Multiply every pole by its weight, restoring the stored form.
    pub fn weight_poles(&mut self) {
        if let Some(weights) = &self.weights {
            for (p, w) in self.poles.iter_mut().zip(weights.iter()) {
                *p *= *w;
            }
        }
    }

    /// Promote the grid to rational with unit weights.
    pub fn make_rational(&mut self) {
        if self.weights.is_none() {
            self.weights = Some(vec![T::one(); self.poles.len()]);
        }
    }

    /// The u-directed row at `v` in homogeneous form.
    pub fn row(&self, v: usize) -> Vec<Vector4<T>> {
        (0..self.num_u).map(|u| self.homogeneous(u, v)).collect()
    }

    /// The v-directed column at `u` in homogeneous form.
    pub fn column(&self, u: usize) -> Vec<Vector4<T>> {
        (0..self.num_v).map(|v| self.homogeneous(u, v)).collect()
    }

    pub fn set_row(&mut self, v: usize, row: &[Vector4<T>]) {
        assert_eq!(row.len(), self.num_u);
        for (u, h) in row.iter().enumerate() {
            self.set_homogeneous(u, v, *h);
        }
    }

    pub fn set_column(&mut self, u: usize, column: &[Vector4<T>]) {
        assert_eq!(column.len(), self.num_v);
        for (v, h) in column.iter().enumerate() {
            self.set_homogeneous(u, v, *h);
        }
    }

    /// Transposed grid: `(u, v)` becomes `(v, u)`.
    pub fn transposed(&self) -> Self {
        let mut out = Self {
            poles: vec![Point3::origin(); self.poles.len()],
            weights: self.weights.as_ref().map(|w| vec![T::one(); w.len()]),
            num_u: self.num_v,
            num_v: self.num_u,
        };
        for v in 0..self.num_v {
            for u in 0..self.num_u {
                out.set_homogeneous(v, u, self.homogeneous(u, v));
            }
        }
        out
    }

    /// Reverse the u ordering of every row.
    pub fn reverse_u(&mut self) {
        for v in 0..self.num_v {
            let mut row = self.row(v);
            row.reverse();
            self.set_row(v, &row);
        }
    }

    /// Reverse the v ordering of every column.
    pub fn reverse_v(&mut self) {
        for u in 0..self.num_u {
            let mut column = self.column(u);
            column.reverse();
            self.set_column(u, &column);
        }
    }

    /// Move the contents out, leaving an empty grid behind.
    pub fn capture(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;

    fn sample_grid() -> PoleGrid<f64> {
        let poles = (0..6)
            .map(|i| Point3::new(i as f64, (i / 2) as f64, 0.0))
            .collect();
        PoleGrid::try_new(2, 3, poles, Some(vec![1., 2., 4., 1., 0.5, 1.])).unwrap()
    }

    #[test]
    fn row_major_indexing() {
        let grid = sample_grid();
        assert_eq!(grid.index(1, 2), 5);
        assert_eq!(grid.pole(1, 1).x, 3.0);
    }

    #[test]
    fn weight_unweight_round_trip() {
        let mut grid = sample_grid();
        let original = grid.clone();
        grid.unweight_poles();
        grid.weight_poles();
        for (a, b) in grid.poles().iter().zip(original.poles().iter()) {
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn transpose_round_trip() {
        let grid = sample_grid();
        let back = grid.transposed().transposed();
        assert_eq!(grid, back);
    }

    #[test]
    fn validation_failures() {
        let poles = vec![Point3::<f64>::origin(); 4];
        assert!(matches!(
            PoleGrid::try_new(2, 3, poles.clone(), None),
            Err(Error::PoleCountMismatch { .. })
        ));
        assert!(matches!(
            PoleGrid::try_new(2, 2, poles, Some(vec![1.0; 3])),
            Err(Error::WeightCountMismatch { .. })
        ));
    }
}
