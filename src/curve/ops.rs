//! Homogeneous-space structural kernels shared by curves and by the
//! direction-wise surface edits that run them over every row or column of a
//! pole grid.
//!
//! Poles are carried as `(wx, wy, wz, w)` vectors so corner-cutting formulas
//! apply uniformly to rational and non-rational data.

use nalgebra::Vector4;

use crate::errors::{Error, Result};
use crate::knot::{BsplineParams, KnotVector, RELATIVE_KNOT_TOLERANCE};
use crate::misc::FloatingPoint;

/// One parameter direction of spline data in homogeneous form.
#[derive(Clone, Debug)]
pub(crate) struct CurveData<T: FloatingPoint> {
    pub poles: Vec<Vector4<T>>,
    pub knots: Vec<T>,
    pub params: BsplineParams,
}

impl<T: FloatingPoint> CurveData<T> {
    pub fn knot_vector(&self) -> KnotVector<T> {
        KnotVector::new(self.knots.clone())
    }

    pub fn domain(&self) -> (T, T) {
        (
            self.knots[self.params.domain_start_index()],
            self.knots[self.params.domain_end_index()],
        )
    }

    pub fn knot_tolerance(&self) -> T {
        let (min, max) = self.domain();
        T::from_f64(RELATIVE_KNOT_TOLERANCE).unwrap() * (max - min).abs()
    }

    pub fn normalize_knots(&mut self) -> Result<()> {
        let mut kv = KnotVector::new(std::mem::take(&mut self.knots));
        kv.normalize(&self.params)?;
        self.knots = kv.to_vec();
        Ok(())
    }
}

fn lerp<T: FloatingPoint>(a: &Vector4<T>, b: &Vector4<T>, t: T) -> Vector4<T> {
    a + (b - a) * t
}

/// Load the `order` poles relevant at `u`, wrapping modulo the pole count for
/// closed curves. Returns the buffer together with `rght` (first knot index
/// with `knots[rght] > u`) and the signed window start.
fn relevant_poles<T: FloatingPoint>(data: &CurveData<T>, u: T) -> (Vec<Vector4<T>>, usize, isize) {
    let num_poles = data.params.num_poles;
    let order = data.params.order;

    let mut rght = 0;
    while rght < data.knots.len() && u >= data.knots[rght] {
        rght += 1;
    }
    let start = rght as isize - order as isize;

    let window: Vec<Vector4<T>> = (0..order)
        .map(|j| {
            let idx = (start + j as isize).rem_euclid(num_poles as isize) as usize;
            data.poles[idx]
        })
        .collect();

    (window, rght, start)
}

/// Insert `u` until it reaches `new_multiplicity` in the knot vector, via
/// corner-cutting pole recomputation. Purely additive; closed curves wrap
/// pole indices at the seam.
pub(crate) fn insert_knot<T: FloatingPoint>(
    data: &mut CurveData<T>,
    u: T,
    new_multiplicity: usize,
) -> Result<()> {
    let order = data.params.order;
    let degree = data.params.degree();
    let num_poles = data.params.num_poles;
    let tolerance = data.knot_tolerance();
    let (min_knot, max_knot) = data.domain();

    if u < min_knot || u > max_knot {
        return Err(Error::ParameterOutOfDomain);
    }

    let (u, current_mult) = data.knot_vector().multiplicity_at(u, tolerance);
    if new_multiplicity <= current_mult {
        return Ok(());
    }
    let add_mult = (new_multiplicity - current_mult).min(order);

    let (window, rght, start) = relevant_poles(data, u);

    // corner-cut the window, one multiplicity at a time
    let mut buffer = vec![Vector4::zeros(); order + add_mult];
    buffer[add_mult..].copy_from_slice(&window);

    let mut end = degree;
    for i in (1..=add_mult).rev() {
        buffer[add_mult - i] = buffer[add_mult];
        for j in 0..end {
            let left = data.knots[(rght as isize - end as isize + j as isize) as usize];
            let right = data.knots[rght + j];
            let denom = right - left;
            let c = if denom == T::zero() {
                T::zero()
            } else {
                (u - left) / denom
            };
            buffer[add_mult + j] = lerp(&buffer[add_mult + j], &buffer[add_mult + j + 1], c);
        }
        end -= 1;
    }

    // splice the recomputed window into a grown pole array
    let mut new_poles = vec![Vector4::zeros(); num_poles + add_mult];
    if start < 0 {
        let shift = (order as isize + start) as usize;
        let tail = (-start) as usize;
        new_poles[..shift + add_mult].copy_from_slice(&buffer[tail..]);
        new_poles[shift + add_mult..shift + add_mult + num_poles - order]
            .copy_from_slice(&data.poles[shift..num_poles - tail]);
        new_poles[num_poles + add_mult - tail..].copy_from_slice(&buffer[..tail]);
    } else if start as usize > num_poles - order {
        let start = start as usize;
        let shift = start + order - num_poles;
        new_poles[..shift].copy_from_slice(&buffer[order + add_mult - shift..]);
        new_poles[shift..shift + num_poles - order]
            .copy_from_slice(&data.poles[shift..num_poles - order + shift]);
        new_poles[start..].copy_from_slice(&buffer[..num_poles + add_mult - start]);
    } else {
        let start = start as usize;
        new_poles[..start].copy_from_slice(&data.poles[..start]);
        new_poles[start..start + order + add_mult].copy_from_slice(&buffer);
        new_poles[start + order + add_mult..].copy_from_slice(&data.poles[start + order..]);
    }

    let mut new_knots = Vec::with_capacity(data.knots.len() + add_mult);
    new_knots.extend_from_slice(&data.knots[..rght]);
    new_knots.extend(std::iter::repeat_n(u, add_mult));
    new_knots.extend_from_slice(&data.knots[rght..]);

    data.poles = new_poles;
    data.knots = new_knots;
    data.params.num_poles += add_mult;
    Ok(())
}

/// Refine a clamped open curve by inserting a batch of knots at once.
pub(crate) fn refine_knots<T: FloatingPoint>(
    data: &mut CurveData<T>,
    knots_to_insert: &[T],
) -> Result<()> {
    if knots_to_insert.is_empty() {
        return Ok(());
    }
    if data.params.closed {
        return Err(Error::InvalidKnots);
    }

    let degree = data.params.degree();
    let knot_vector = data.knot_vector();
    let n = data.params.num_poles - 1;
    let m = n + degree + 1;
    let r = knots_to_insert.len() - 1;
    let a = knot_vector.find_span(&data.params, knots_to_insert[0]);
    let b = knot_vector.find_span(&data.params, knots_to_insert[r]) + 1;

    let mut poles_post = vec![Vector4::zeros(); n + r + 2];
    let mut knots_post = vec![T::zero(); m + 1 + r + 1];

    poles_post[..(a - degree) + 1].copy_from_slice(&data.poles[..(a - degree) + 1]);
    for i in (b - 1)..=n {
        poles_post[i + r + 1] = data.poles[i];
    }
    for i in 0..=a {
        knots_post[i] = data.knots[i];
    }
    for i in (b + degree)..=m {
        knots_post[i + r + 1] = data.knots[i];
    }

    let mut i = b + degree - 1;
    let mut k = b + degree + r;

    for j in (0..=r).rev() {
        while knots_to_insert[j] <= data.knots[i] && i > a {
            poles_post[k - degree - 1] = data.poles[i - degree - 1];
            knots_post[k] = data.knots[i];
            k -= 1;
            i -= 1;
        }
        poles_post[k - degree - 1] = poles_post[k - degree];
        for l in 1..=degree {
            let ind = k - degree + l;
            let alpha = knots_post[k + l] - knots_to_insert[j];
            if alpha.abs() < T::default_epsilon() {
                poles_post[ind - 1] = poles_post[ind];
            } else {
                let denom = knots_post[k + l] - data.knots[i - degree + l];
                let weight = if denom != T::zero() {
                    alpha / denom
                } else {
                    T::zero()
                };
                poles_post[ind - 1] = lerp(&poles_post[ind], &poles_post[ind - 1], weight);
            }
        }
        knots_post[k] = knots_to_insert[j];
        k -= 1;
    }

    data.poles = poles_post;
    data.knots = knots_post;
    data.params.num_poles = n + r + 2;
    Ok(())
}

/// Elevate a clamped open curve to `target_degree` by bezier extraction and
/// recomposition.
pub(crate) fn elevate_degree<T: FloatingPoint>(
    data: &mut CurveData<T>,
    target_degree: usize,
) -> Result<()> {
    let degree = data.params.degree();
    if target_degree <= degree {
        return Ok(());
    }
    if data.params.closed {
        return Err(Error::InvalidKnots);
    }

    let n = data.knots.len() - degree - 2;
    let knots = data.knots.clone();
    let poles = data.poles.clone();
    let degree_inc = target_degree - degree;

    let mut bezalfs = vec![vec![T::zero(); degree + 1]; degree + degree_inc + 1];
    // every distinct interior knot grows the pole count by degree_inc
    let new_pole_count = poles.len() + (poles.len() + 1) * degree_inc + 3;
    let mut bpts = vec![Vector4::zeros(); new_pole_count];
    let mut e_bpts = vec![Vector4::zeros(); new_pole_count];
    let mut next_bpts = vec![Vector4::zeros(); new_pole_count];

    let m = n + degree + 1;
    let ph = target_degree;
    let ph2 = ph / 2;

    let mut q_w = vec![Vector4::zeros(); new_pole_count];
    let mut u_h = vec![T::zero(); new_pole_count + target_degree + 1];

    bezalfs[0][0] = T::one();
    bezalfs[ph][degree] = T::one();

    let binom = |n: usize, k: usize| -> T {
        if k == 0 || k == n {
            return T::one();
        }
        if k > n {
            return T::zero();
        }
        let k = k.min(n - k);
        let mut r = T::one();
        for i in 0..k {
            r = r * T::from_usize(n - i).unwrap() / T::from_usize(i + 1).unwrap();
        }
        r
    };

    for i in 1..=ph2 {
        let inv = T::one() / binom(ph, i);
        let mpi = degree.min(i);
        for j in i.saturating_sub(degree_inc)..=mpi {
            bezalfs[i][j] = inv * binom(degree, j) * binom(degree_inc, i - j);
        }
    }
    for i in (ph2 + 1)..ph {
        let mpi = degree.min(i);
        for j in i.saturating_sub(degree_inc)..=mpi {
            bezalfs[i][j] = bezalfs[ph - i][degree - j];
        }
    }

    let mut kind = ph + 1;
    let mut r: isize = -1;
    let mut a = degree;
    let mut b = degree + 1;
    let mut cind = 1;
    let mut ua = knots[0];
    q_w[0] = poles[0];
    for knot in u_h.iter_mut().take(ph + 1) {
        *knot = ua;
    }

    bpts[..degree + 1].copy_from_slice(&poles[..degree + 1]);

    while b < m {
        let i = b;
        while b < m && knots[b] == knots[b + 1] {
            b += 1;
        }
        let mul = b - i + 1;
        let ub = knots[b];
        let oldr = r;
        r = degree as isize - mul as isize;
        let lbz = if oldr > 0 {
            ((oldr + 2) / 2) as usize
        } else {
            1
        };
        let rbz = if r > 0 {
            ph - ((r + 1) / 2) as usize
        } else {
            ph
        };
        if r > 0 {
            let numer = ub - ua;
            let mut alfs = vec![T::zero(); degree];
            let mut k = degree;
            while k > mul {
                alfs[k - mul - 1] = numer / (knots[a + k] - ua);
                k -= 1;
            }
            for j in 1..=(r as usize) {
                let save = (r as usize) - j;
                let s = mul + j;
                let mut k = degree;
                while k >= s {
                    bpts[k] = lerp(&bpts[k - 1], &bpts[k], alfs[k - s]);
                    k -= 1;
                }
                next_bpts[save] = bpts[degree];
            }
        }

        for i in lbz..=ph {
            e_bpts[i] = Vector4::zeros();
            let mpi = degree.min(i);
            for j in i.saturating_sub(degree_inc)..=mpi {
                e_bpts[i] += bpts[j] * bezalfs[i][j];
            }
        }

        if oldr > 1 {
            let mut first = kind - 2;
            let mut last = kind;
            let den = ub - ua;
            let bet = (ub - u_h[kind - 1]) / den;
            for tr in 1..oldr {
                let mut i = first;
                let mut j = last;
                let mut kj = j - kind + 1;
                let utr = tr as usize;
                while (j as isize - i as isize) > tr {
                    if i < cind {
                        let alf = (ub - u_h[i]) / (ua - u_h[i]);
                        q_w[i] = lerp(&q_w[i - 1], &q_w[i], alf);
                    }
                    if j >= lbz {
                        if (j as isize) - tr <= (kind as isize - ph as isize + oldr) {
                            let gam = (ub - u_h[j - utr]) / den;
                            e_bpts[kj] = lerp(&e_bpts[kj + 1], &e_bpts[kj], gam);
                        }
                    } else {
                        e_bpts[kj] = lerp(&e_bpts[kj + 1], &e_bpts[kj], bet);
                    }
                    i += 1;
                    j -= 1;
                    kj -= 1;
                }
                first -= 1;
                last += 1;
            }
        }

        if a != degree {
            for _ in 0..(ph as isize - oldr) {
                u_h[kind] = ua;
                kind += 1;
            }
        }

        for j in lbz..=rbz {
            q_w[cind] = e_bpts[j];
            cind += 1;
        }

        if b < m {
            let ur = r as usize;
            bpts[..ur].copy_from_slice(&next_bpts[..ur]);
            for j in ur..=degree {
                bpts[j] = poles[b - degree + j];
            }
            a = b;
            b += 1;
            ua = ub;
        } else {
            for i in 0..=ph {
                u_h[kind + i] = ub;
            }
        }
    }

    // the recomposition fills kind + ph + 1 knots; pole count follows from
    // the open-curve knot relation
    let num_knots = kind + ph + 1;
    let num_poles = num_knots - (target_degree + 1);
    q_w.truncate(num_poles);
    u_h.truncate(num_knots);

    data.poles = q_w;
    data.knots = u_h;
    data.params.order = target_degree + 1;
    data.params.num_poles = num_poles;
    Ok(())
}

/// Convert a periodic curve into its clamped open equivalent, re-anchored at
/// parameter `u` (seam rotates to the domain start).
pub(crate) fn open_periodic<T: FloatingPoint>(data: &mut CurveData<T>, u: T) -> Result<()> {
    if !data.params.closed {
        return Ok(());
    }

    let order = data.params.order;
    let tolerance = data.knot_tolerance();
    let (start_knot, end_knot) = data.domain();
    let span = end_knot - start_knot;

    let mut u = u;
    if u < start_knot + tolerance || u > end_knot - tolerance {
        u = start_knot;
    }

    insert_knot(data, u, order)?;

    // first of the saturated copies of u
    let mut count = 0;
    while count < data.knots.len() && data.knots[count] - u <= tolerance {
        count += 1;
    }
    let init_knot = count - order;
    let max_knot_index = data.params.num_poles + order - 1;

    let num_poles = data.params.num_poles;
    data.params.closed = false;

    let mut new_knots = Vec::with_capacity(num_poles + order);
    new_knots.extend_from_slice(&data.knots[init_knot..max_knot_index]);
    let mut i = order - 1;
    while new_knots.len() < num_poles + order {
        new_knots.push(data.knots[i] + span);
        i += 1;
    }

    let mut new_poles = Vec::with_capacity(num_poles);
    new_poles.extend_from_slice(&data.poles[init_knot.min(num_poles)..]);
    new_poles.extend_from_slice(&data.poles[..init_knot.min(num_poles)]);

    data.knots = new_knots;
    data.poles = new_poles;
    data.normalize_knots()
}

/// Close a clamped open curve into periodic form.
///
/// Order-2 curves close with a seam knot only; higher orders are unclamped
/// into the wrap-around formulation and must end up with degree-continuous
/// wrapped poles, otherwise `NoWrapAround` is returned and the input is left
/// unchanged.
pub(crate) fn close_periodic<T: FloatingPoint>(data: &mut CurveData<T>) -> Result<()> {
    if data.params.closed {
        return Ok(());
    }
    let order = data.params.order;
    let num_poles = data.params.num_poles;
    if order == 2 && num_poles == 2 {
        return Ok(());
    }

    // seam poles must coincide (projectively for rational data)
    let first = data.poles[0];
    let last = data.poles[num_poles - 1];
    let seam_tol = T::from_f64(1.0e-10).unwrap();
    let d = first / first.w - last / last.w;
    if d.norm() > seam_tol.max(T::default_epsilon()) {
        return Err(Error::SeamMismatch);
    }

    if order == 2 {
        // a seam knot suffices for C0 wrap
        let n = num_poles;
        data.knots[0] = data.knots[1] - (data.knots[n] - data.knots[n - 1]);
        data.knots[n + 1] = data.knots[n] + (data.knots[2] - data.knots[1]);
        data.params.num_poles -= 1;
        data.params.closed = true;
        data.poles.truncate(data.params.num_poles);
        return Ok(());
    }

    let mut work = data.clone();
    let p = order - 1;
    let n = num_poles - 1;
    if n - p < p {
        return Err(Error::NoWrapAround);
    }

    let u = &mut work.knots;
    let poles = &mut work.poles;

    // unclamp the left end
    for i in 0..=(p - 2) {
        u[p - i - 1] = u[p - i] - (u[n - i + 1] - u[n - i]);
        let mut k = p - 1;
        for j in (0..=i).rev() {
            let a = (u[p] - u[k]) / (u[p + j + 1] - u[k]);
            if a == T::one() {
                return Err(Error::InvalidKnots);
            }
            let b = T::one() / (T::one() - a);
            let a = -a * b;
            poles[j] = poles[j] * b + poles[j + 1] * a;
            k -= 1;
        }
    }
    u[0] = u[1] - (u[n - p + 2] - u[n - p + 1]);

    // unclamp the right end
    for i in 0..=(p - 2) {
        u[n + i + 2] = u[n + i + 1] + (u[p + i + 1] - u[p + i]);
        for j in (0..=i).rev() {
            let a = (u[n + 1] - u[n - j]) / (u[n - j + i + 2] - u[n - j]);
            if a == T::zero() {
                return Err(Error::InvalidKnots);
            }
            let b = T::one() / a;
            let a = (a - T::one()) * b;
            poles[n - j] = poles[n - j] * b + poles[n - j - 1] * a;
        }
    }
    u[n + p + 1] = u[n + p] + (u[2 * p] - u[2 * p - 1]);

    // wrapped poles must agree, or the curve is only C0 at the seam
    let mut max = T::zero();
    for pole in poles.iter() {
        max = max.max(pole.x.abs()).max(pole.y.abs()).max(pole.z.abs());
    }
    let tol = max * T::from_f64(1.0e-10).unwrap();
    for i in 0..p {
        let d = poles[i] - poles[n - p + 1 + i];
        let spatial = nalgebra::Vector3::new(d.x, d.y, d.z).norm();
        if spatial > tol || d.w.abs() > T::from_f64(1.0e-10).unwrap() {
            return Err(Error::NoWrapAround);
        }
    }

    work.params.closed = true;
    work.params.num_poles -= p;
    work.poles.truncate(work.params.num_poles);
    *data = work;
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    use super::*;
    use crate::knot::KnotVector;

    fn line_data() -> CurveData<f64> {
        CurveData {
            poles: vec![
                Vector4::new(0.0, 0.0, 0.0, 1.0),
                Vector4::new(1.0, 0.0, 0.0, 1.0),
            ],
            knots: vec![0.0, 0.0, 1.0, 1.0],
            params: BsplineParams::new(2, 2, false).unwrap(),
        }
    }

    #[test]
    fn insert_single_knot_into_line() {
        let mut data = line_data();
        insert_knot(&mut data, 0.5, 1).unwrap();
        assert_eq!(data.params.num_poles, 3);
        assert_eq!(data.knots, vec![0.0, 0.0, 0.5, 1.0, 1.0]);
        assert_relative_eq!(data.poles[1].x, 0.5, epsilon = 1e-14);
    }

    #[test]
    fn insert_is_idempotent_at_multiplicity() {
        let mut data = line_data();
        insert_knot(&mut data, 0.5, 1).unwrap();
        let before = data.poles.clone();
        insert_knot(&mut data, 0.5, 1).unwrap();
        assert_eq!(before, data.poles);
    }

    #[test]
    fn elevate_line_to_quadratic() {
        let mut data = line_data();
        elevate_degree(&mut data, 2).unwrap();
        assert_eq!(data.params.order, 3);
        assert_eq!(data.params.num_poles, 3);
        assert_eq!(data.knots.len(), 6);
        assert_relative_eq!(data.poles[1].x, 0.5, epsilon = 1e-14);
    }

    #[test]
    fn refine_preserves_counts() {
        let params = BsplineParams::new(3, 5, false).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        let mut data = CurveData {
            poles: (0..5)
                .map(|i| Vector4::new(i as f64, (i * i) as f64, 0.0, 1.0))
                .collect(),
            knots: knots.to_vec(),
            params,
        };
        refine_knots(&mut data, &[0.25, 0.75]).unwrap();
        assert_eq!(data.params.num_poles, 7);
        assert_eq!(data.knots.len(), 10);
        assert!(data.knots.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn open_then_close_round_trip() {
        // uniform periodic quadratic
        let params = BsplineParams::new(3, 6, true).unwrap();
        let knots: KnotVector<f64> = KnotVector::generate(&params, None);
        let poles: Vec<_> = (0..6)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / 6.0;
                Vector4::new(a.cos(), a.sin(), 0.0, 1.0)
            })
            .collect();
        let mut data = CurveData {
            poles,
            knots: knots.to_vec(),
            params,
        };
        let original = data.clone();

        open_periodic(&mut data, 0.0).unwrap();
        assert!(!data.params.closed);
        assert_eq!(data.params.num_poles, 8);

        close_periodic(&mut data).unwrap();
        assert!(data.params.closed);
        assert_eq!(data.params.num_poles, original.params.num_poles);
    }
}
