use log::{debug, trace};
use nalgebra::Vector4;

use crate::errors::Result;
use crate::grid::PoleGrid;
use crate::knot::{KnotVector, RELATIVE_KNOT_TOLERANCE};
use crate::misc::FloatingPoint;

use super::{BsplineSurface, SurfaceDirection};

/// Which knot vectors a removal pass may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnotRemovalDirection {
    U,
    V,
    Both,
}

impl KnotRemovalDirection {
    fn includes(&self, direction: SurfaceDirection) -> bool {
        matches!(
            (self, direction),
            (KnotRemovalDirection::U, SurfaceDirection::U)
                | (KnotRemovalDirection::V, SurfaceDirection::V)
                | (KnotRemovalDirection::Both, _)
        )
    }
}

/// Weight conditioning bounds: a removal that would push any recomputed
/// weight outside `[WMIN, WMAX]` is rejected.
const WMIN: f64 = 1e-5;
const WMAX: f64 = 200.0;

impl<T: FloatingPoint> BsplineSurface<T> {
    /// Remove as many knots as possible while keeping the accumulated
    /// pole-displacement bound under `tolerance`.
    ///
    /// Oversaturated knots are first flattened and reduced to legal
    /// multiplicity. The main loop greedily removes the candidate with the
    /// smallest displacement bound (across both directions when requested)
    /// and stops silently once nothing further is removable; partial
    /// simplification is success, not failure.
    pub fn remove_knots_bounded(
        &mut self,
        direction: KnotRemovalDirection,
        tolerance: T,
    ) -> Result<()> {
        if direction.includes(SurfaceDirection::U) {
            self.flatten_oversaturated(SurfaceDirection::U);
        }
        if direction.includes(SurfaceDirection::V) {
            self.flatten_oversaturated(SurfaceDirection::V);
        }
        self.clean_knots(SurfaceDirection::U)?;
        self.clean_knots(SurfaceDirection::V)?;
        self.remove_knots(direction, tolerance)
    }

    /// Snap knot clusters separated by less than the relative knot tolerance
    /// onto a single value so span bookkeeping sees their true multiplicity.
    fn flatten_oversaturated(&mut self, direction: SurfaceDirection) {
        let params = *self.params(direction);
        let degree = params.degree();
        let r = params.num_allocated_knots() - 1;
        let ktol = T::from_f64(RELATIVE_KNOT_TOLERANCE).unwrap();
        let knots = match direction {
            SurfaceDirection::U => self.u_knots.as_mut_slice(),
            SurfaceDirection::V => self.v_knots.as_mut_slice(),
        };

        // start cluster bleeding into the interior
        if knots[degree + 1] - knots[degree] < ktol {
            let knot = knots[0];
            let mut i = 1;
            while i <= r && knots[i] - knot < ktol {
                knots[i] = knot;
                i += 1;
            }
        }

        // end cluster bleeding into the interior
        if knots[r - degree] - knots[r - degree - 1] < ktol {
            let knot = knots[r];
            let mut i = r as isize - 1;
            while i >= 0 && knot - knots[i as usize] < ktol {
                knots[i as usize] = knot;
                i -= 1;
            }
        }

        // interior clusters
        let mut i = degree + 1;
        while i < r - degree {
            let knot = knots[i];
            let mut mult = 1;
            while i + mult <= r && knots[i + mult] - knot < ktol {
                mult += 1;
            }
            if mult > degree {
                for m in 1..mult {
                    knots[i + m] = knot;
                }
            }
            i += mult;
        }
    }

    /// Drop redundant knots (and their pole strips): end clusters above
    /// order multiplicity, interior clusters above degree multiplicity.
    /// Closed directions are opened first.
    pub(crate) fn clean_knots(&mut self, direction: SurfaceDirection) -> Result<()> {
        if self.params(direction).closed {
            let start = self.knots_domain(direction).0;
            self.make_open(direction, start)?;
        }

        let params = *self.params(direction);
        let order = params.order;
        let knots = self.knots(direction).clone();
        let clusters = knots.multiplicity();

        // (knot index of first removed, pole strip index, count)
        let mut removals: Vec<(usize, usize, usize)> = vec![];
        let mut index = 0;
        let last_cluster = clusters.len() - 1;
        for (c, cluster) in clusters.iter().enumerate() {
            let mult = cluster.multiplicity();
            index += mult;
            if c == 0 {
                if mult > order {
                    let excess = mult - order;
                    removals.push((index - excess, index - mult, excess));
                }
            } else if c == last_cluster {
                if mult > order {
                    removals.push((index - mult, index - mult, mult - order));
                }
            } else if mult >= order {
                removals.push((index - mult, index - mult, mult - order + 1));
            }
        }

        if removals.is_empty() {
            return Ok(());
        }

        let mut knot_values = knots.to_vec();
        let mut shift = 0usize;
        let mut strips: Vec<(usize, usize)> = vec![];
        for (knot_index, strip_index, count) in removals {
            let at = knot_index - shift;
            knot_values.drain(at..at + count);
            strips.push((strip_index - shift, count));
            shift += count;
        }

        self.remove_pole_strips(direction, &strips);
        match direction {
            SurfaceDirection::U => {
                self.u_params.num_poles -= shift;
                self.u_knots = KnotVector::new(knot_values);
            }
            SurfaceDirection::V => {
                self.v_params.num_poles -= shift;
                self.v_knots = KnotVector::new(knot_values);
            }
        }
        Ok(())
    }

    /// Remove the given `(start, count)` index ranges of pole strips in a
    /// direction; ranges are already shifted to account for prior removals.
    fn remove_pole_strips(&mut self, direction: SurfaceDirection, strips: &[(usize, usize)]) {
        for &(start, count) in strips {
            let (num_u, num_v) = (self.grid.num_u(), self.grid.num_v());
            let rational = self.grid.is_rational();
            match direction {
                SurfaceDirection::U => {
                    let mut grid = PoleGrid::zeroed(num_u - count, num_v, rational)
                        .expect("shrunken grid stays non-empty");
                    for v in 0..num_v {
                        let mut row = self.grid.row(v);
                        row.drain(start..start + count);
                        grid.set_row(v, &row);
                    }
                    self.grid = grid;
                }
                SurfaceDirection::V => {
                    let mut grid = PoleGrid::zeroed(num_u, num_v - count, rational)
                        .expect("shrunken grid stays non-empty");
                    for u in 0..num_u {
                        let mut column = self.grid.column(u);
                        column.drain(start..start + count);
                        grid.set_column(u, &column);
                    }
                    self.grid = grid;
                }
            }
        }
    }

    /// Maximum weighted-space pole displacement that removing one instance
    /// of the knot at index `r` (multiplicity `s`) would cause, by
    /// re-deriving the affected poles with the corner-cutting formulas and
    /// comparing against the stored ones.
    pub fn removal_bound(&self, direction: SurfaceDirection, r: usize, s: usize) -> T {
        let huge = T::max_value().unwrap();
        let params = *self.params(direction);
        let p = params.degree();
        if s == 0 || s > p {
            return huge;
        }

        let knots = self.knots(direction);
        let cross_count = match direction {
            SurfaceDirection::U => self.grid.num_v(),
            SurfaceDirection::V => self.grid.num_u(),
        };
        let pole = |prim: usize, cross: usize| -> Vector4<T> {
            match direction {
                SurfaceDirection::U => self.grid.homogeneous(prim, cross),
                SurfaceDirection::V => self.grid.homogeneous(cross, prim),
            }
        };

        let first = r - p;
        let last = r - s;
        let off = first - 1;

        let window = last + 1 - off + 1;
        let mut alf = vec![T::zero(); window];
        let mut oma = vec![T::zero(); window];
        let mut bet = vec![T::zero(); window];
        let mut omb = vec![T::zero(); window];

        let mut i = first;
        let mut j = last;
        while j > i {
            alf[i - first] = (knots[i + p + 1] - knots[i]) / (knots[r] - knots[i]);
            oma[i - first] = T::one() - alf[i - first];
            bet[j - first] = (knots[j + p + 1] - knots[j]) / (knots[j + p + 1] - knots[r]);
            omb[j - first] = T::one() - bet[j - first];
            i += 1;
            j -= 1;
        }
        let del = (knots[r] - knots[i]) / (knots[i + p + 1] - knots[i]);
        let omd = T::one() - del;

        let mut max_error = T::zero();
        let mut tmp = vec![Vector4::zeros(); window + 1];
        for cross in 0..cross_count {
            tmp[0] = pole(off, cross);
            tmp[last + 1 - off] = pole(last + 1, cross);

            let mut i = first;
            let mut j = last;
            let mut ii = 1;
            let mut jj = last - off;
            while j > i {
                tmp[ii] = pole(i, cross) * alf[i - first] + tmp[ii - 1] * oma[i - first];
                tmp[jj] = pole(j, cross) * bet[j - first] + tmp[jj + 1] * omb[j - first];
                i += 1;
                j -= 1;
                ii += 1;
                jj -= 1;
            }

            let dw = if j < i {
                (tmp[ii - 1] - tmp[jj + 1]).norm()
            } else {
                let a = tmp[jj + 1] * del + tmp[ii - 1] * omd;
                (pole(i, cross) - a).norm()
            };
            if dw > max_error {
                max_error = dw;
            }
        }
        max_error
    }

    fn remove_knots(&mut self, direction: KnotRemovalDirection, tolerance: T) -> Result<()> {
        let huge = T::max_value().unwrap();
        let ktol = T::from_f64(RELATIVE_KNOT_TOLERANCE).unwrap();

        // rational surfaces measure the bound in weighted space, so rescale
        // the tolerance by the weight range and pole magnitude
        let mut tol = tolerance;
        if self.is_rational() {
            let mut wmin = huge;
            let mut pmax = T::zero();
            for v in 0..self.grid.num_v() {
                for u in 0..self.grid.num_u() {
                    wmin = wmin.min(self.grid.weight(u, v));
                    pmax = pmax.max(self.grid.unweighted_pole(u, v).coords.norm());
                }
            }
            tol = (tol * wmin) / (T::one() + pmax);
        }

        let u_alloc = self.u_params.num_allocated_knots();
        let v_alloc = self.v_params.num_allocated_knots();
        let mut er = vec![vec![T::zero(); v_alloc]; u_alloc];

        let mut state_u = DirectionState::initialize(
            self,
            SurfaceDirection::U,
            direction.includes(SurfaceDirection::U),
            huge,
            ktol,
        );
        let mut state_v = DirectionState::initialize(
            self,
            SurfaceDirection::V,
            direction.includes(SurfaceDirection::V),
            huge,
            ktol,
        );

        let mut removed = 0usize;
        loop {
            let cand_u = state_u.select(self, SurfaceDirection::U);
            let cand_v = state_v.select(self, SurfaceDirection::V);

            let saturated_u = cand_u.as_ref().map_or(true, |c| c.blocked);
            let saturated_v = cand_v.as_ref().map_or(true, |c| c.blocked);
            match direction {
                KnotRemovalDirection::U if saturated_u => break,
                KnotRemovalDirection::V if saturated_v => break,
                KnotRemovalDirection::Both if saturated_u && saturated_v => break,
                _ => {}
            }

            // greedy: smaller bound first; a direction whose best candidate
            // is blocked yields to the other so the loop always progresses
            let pick_u = match direction {
                KnotRemovalDirection::U => true,
                KnotRemovalDirection::V => false,
                KnotRemovalDirection::Both => {
                    if saturated_v {
                        true
                    } else if saturated_u {
                        false
                    } else {
                        let bu = cand_u.as_ref().map_or(huge, |c| c.bound);
                        let bv = cand_v.as_ref().map_or(huge, |c| c.bound);
                        bu < bv
                    }
                }
            };

            let success = if pick_u {
                let c = cand_u.unwrap();
                self.try_remove(SurfaceDirection::U, &c, tol, ktol, &mut er, &mut state_u)
            } else {
                let c = cand_v.unwrap();
                self.try_remove(SurfaceDirection::V, &c, tol, ktol, &mut er, &mut state_v)
            };

            if success {
                removed += 1;
                trace!(
                    "removed a {} knot, now {}x{} poles",
                    if pick_u { "u" } else { "v" },
                    self.num_u_poles(),
                    self.num_v_poles()
                );
                // no interior knots left in the touched direction
                let done_u = self.u_params.num_poles == self.u_params.order;
                let done_v = self.v_params.num_poles == self.v_params.order;
                match direction {
                    KnotRemovalDirection::U if done_u => break,
                    KnotRemovalDirection::V if done_v => break,
                    KnotRemovalDirection::Both if done_u && done_v => break,
                    _ => {}
                }

                // refresh bounds of the other direction too when both are
                // in play; its corner-cut geometry changed under it
                if direction == KnotRemovalDirection::Both {
                    if pick_u {
                        state_v.refresh_all(self, SurfaceDirection::V, ktol);
                    } else {
                        state_u.refresh_all(self, SurfaceDirection::U, ktol);
                    }
                }
            }
        }

        debug!("bounded knot removal finished after {removed} removals");
        Ok(())
    }

    /// Attempt one removal; returns false (and marks the candidate blocked)
    /// when the accumulated error or the weight conditioning forbids it.
    #[allow(clippy::too_many_arguments)]
    fn try_remove(
        &mut self,
        direction: SurfaceDirection,
        candidate: &Candidate<T>,
        tol: T,
        ktol: T,
        er: &mut [Vec<T>],
        state: &mut DirectionState<T>,
    ) -> bool {
        let params = *self.params(direction);
        let cross_params = *self.params(direction.other());
        let p = params.degree();
        let q = cross_params.degree();
        let ru = candidate.index;
        let su = candidate.mult;

        let knots = self.knots(direction).clone();
        let cross_knots = self.knots(direction.other()).clone();
        let s_cross = cross_params.num_allocated_knots() - 1;

        if su == 0 || su > p {
            state.blocked[ru] = true;
            return false;
        }

        // split point and mid-pole blend for odd degree + multiplicity
        let odd = (p + su) % 2 == 1;
        let (k, l, lam) = if odd {
            let k = (p + su + 1) / 2;
            let l = ru - k + p + 1;
            let al = (knots[ru] - knots[ru - k]) / (knots[ru - k + p + 1] - knots[ru - k]);
            let be =
                (knots[ru] - knots[ru - k + 1]) / (knots[ru - k + p + 2] - knots[ru - k + 1]);
            (k, l, al / (al + be))
        } else {
            ((p + su) / 2, ru - ((p + su) / 2) + p, T::zero())
        };
        let oml = T::one() - lam;

        // accumulated error check over every span the removal touches
        let er_at = |er: &[Vec<T>], prim: usize, cross: usize| -> T {
            match direction {
                SurfaceDirection::U => er[prim][cross],
                SurfaceDirection::V => er[cross][prim],
            }
        };

        let mut accepted: Vec<(usize, usize, T)> = vec![];
        for i in (ru - k)..=l {
            if (knots[i] - knots[i + 1]).abs() <= ktol {
                continue;
            }
            for j in q..=(s_cross - q - 1) {
                if (cross_knots[j] - cross_knots[j + 1]).abs() <= ktol {
                    continue;
                }
                let te = er_at(er, i, j) + candidate.bound;
                if te > tol {
                    state.blocked[ru] = true;
                    return false;
                }
                accepted.push((i, j, te));
            }
        }

        // corner-cut every cross strip, watching rational weights
        let first = ru - p;
        let last = ru - su;
        let off = first - 1;
        let window = last + 1 - off + 1;

        let mut alf = vec![T::zero(); window];
        let mut oma = vec![T::zero(); window];
        let mut bet = vec![T::zero(); window];
        let mut omb = vec![T::zero(); window];
        {
            let mut i = first;
            let mut j = last;
            while j > i {
                alf[i - first] = (knots[i + p + 1] - knots[i]) / (knots[ru] - knots[i]);
                oma[i - first] = T::one() - alf[i - first];
                bet[j - first] = (knots[j + p + 1] - knots[j]) / (knots[j + p + 1] - knots[ru]);
                omb[j - first] = T::one() - bet[j - first];
                i += 1;
                j -= 1;
            }
        }

        let pole = |grid: &PoleGrid<T>, prim: usize, cross: usize| -> Vector4<T> {
            match direction {
                SurfaceDirection::U => grid.homogeneous(prim, cross),
                SurfaceDirection::V => grid.homogeneous(cross, prim),
            }
        };

        let cross_count = match direction {
            SurfaceDirection::U => self.grid.num_v(),
            SurfaceDirection::V => self.grid.num_u(),
        };
        let rational = self.is_rational();
        let wmin_limit = T::from_f64(WMIN).unwrap();
        let wmax_limit = T::from_f64(WMAX).unwrap();

        let mut tmps: Vec<Vec<Vector4<T>>> = Vec::with_capacity(cross_count);
        for cross in 0..cross_count {
            let mut tmp = vec![Vector4::zeros(); window + 1];
            tmp[0] = pole(&self.grid, off, cross);
            tmp[last + 1 - off] = pole(&self.grid, last + 1, cross);

            let mut i = first;
            let mut j = last;
            let mut ii = 1;
            let mut jj = last - off;
            while j > i {
                tmp[ii] =
                    pole(&self.grid, i, cross) * alf[i - first] + tmp[ii - 1] * oma[i - first];
                tmp[jj] =
                    pole(&self.grid, j, cross) * bet[j - first] + tmp[jj + 1] * omb[j - first];
                i += 1;
                j -= 1;
                ii += 1;
                jj -= 1;
            }

            if rational {
                let mut wmin = T::max_value().unwrap();
                let mut wmax = T::zero();
                let mut i = first;
                let mut j = last;
                while j > i {
                    let wi = tmp[i - off].w;
                    let wj = tmp[j - off].w;
                    wmin = wmin.min(wi).min(wj);
                    wmax = wmax.max(wi).max(wj);
                    i += 1;
                    j -= 1;
                }
                if wmin < wmin_limit || wmax > wmax_limit {
                    state.blocked[ru] = true;
                    return false;
                }
            }

            if odd {
                tmp[jj + 1] = tmp[jj + 1] * lam + tmp[ii - 1] * oml;
            }
            tmps.push(tmp);
        }

        // commit: errors, recomputed poles, shifted bookkeeping
        for (i, j, te) in accepted {
            match direction {
                SurfaceDirection::U => er[i][j] = te,
                SurfaceDirection::V => er[j][i] = te,
            }
        }

        let fout = (2 * ru - su - p) / 2;
        let mut strips: Vec<Vec<Vector4<T>>> = Vec::with_capacity(cross_count);
        for (cross, tmp) in tmps.iter().enumerate() {
            let mut strip: Vec<Vector4<T>> = (0..params.num_poles)
                .map(|prim| pole(&self.grid, prim, cross))
                .collect();
            let mut i = first;
            let mut j = last;
            while j > i {
                strip[i] = tmp[i - off];
                strip[j] = tmp[j - off];
                i += 1;
                j -= 1;
            }
            strip.remove(fout);
            strips.push(strip);
        }

        // error bookkeeping follows the surviving knots
        let r_last = params.num_allocated_knots() - 1;
        if su == 1 {
            for j in q..=(s_cross - q - 1) {
                if (cross_knots[j] - cross_knots[j + 1]).abs() > ktol {
                    match direction {
                        SurfaceDirection::U => {
                            er[ru - 1][j] = er[ru - 1][j].max(er[ru][j]);
                        }
                        SurfaceDirection::V => {
                            er[j][ru - 1] = er[j][ru - 1].max(er[j][ru]);
                        }
                    }
                }
            }
        } else {
            state.mults[ru - 1] = state.mults[ru] - 1;
        }
        match direction {
            SurfaceDirection::U => {
                // shift u rows down over the removed knot
                for i in ru..r_last {
                    er[i] = er[i + 1].clone();
                }
            }
            SurfaceDirection::V => {
                for row in er.iter_mut() {
                    for j in ru..r_last {
                        row[j] = row[j + 1];
                    }
                }
            }
        }
        state.bounds.remove(ru);
        state.mults.remove(ru);
        state.blocked.remove(ru);

        // commit the new structure
        let mut knot_values = knots.to_vec();
        knot_values.remove(ru);
        let rational = self.is_rational();
        match direction {
            SurfaceDirection::U => {
                self.u_params.num_poles -= 1;
                let mut grid = PoleGrid::zeroed(
                    self.u_params.num_poles,
                    self.v_params.num_poles,
                    rational,
                )
                .expect("non-empty grid after removal");
                for (v, strip) in strips.iter().enumerate() {
                    grid.set_row(v, strip);
                }
                self.grid = grid;
                self.u_knots = KnotVector::new(knot_values);
            }
            SurfaceDirection::V => {
                self.v_params.num_poles -= 1;
                let mut grid = PoleGrid::zeroed(
                    self.u_params.num_poles,
                    self.v_params.num_poles,
                    rational,
                )
                .expect("non-empty grid after removal");
                for (u, strip) in strips.iter().enumerate() {
                    grid.set_column(u, strip);
                }
                self.grid = grid;
                self.v_knots = KnotVector::new(knot_values);
            }
        }

        // refresh the bounds whose support overlapped the removal
        let params = *self.params(direction);
        let n = params.num_poles - 1;
        let knots = self.knots(direction).clone();
        let lo = (ru - p).max(p + 1);
        let hi = n.min(ru + p - su);
        for i in lo..=hi.min(state.bounds.len().saturating_sub(1)) {
            if (knots[i] - knots[i + 1]).abs() > ktol && !state.blocked[i] {
                state.bounds[i] = self.removal_bound(direction, i, state.mults[i]);
            }
        }

        true
    }
}

#[derive(Clone, Debug)]
struct Candidate<T> {
    index: usize,
    mult: usize,
    bound: T,
    blocked: bool,
}

/// Removal bookkeeping for one direction: per-knot displacement bounds,
/// multiplicities, and not-removable flags, indexed by knot position.
struct DirectionState<T> {
    active: bool,
    bounds: Vec<T>,
    mults: Vec<usize>,
    blocked: Vec<bool>,
}

impl<T: FloatingPoint> DirectionState<T> {
    fn initialize(
        surface: &BsplineSurface<T>,
        direction: SurfaceDirection,
        active: bool,
        huge: T,
        ktol: T,
    ) -> Self {
        let params = *surface.params(direction);
        let alloc = params.num_allocated_knots();
        let mut state = Self {
            active,
            bounds: vec![huge; alloc],
            mults: vec![0; alloc],
            blocked: vec![false; alloc],
        };
        if !active {
            return state;
        }

        let p = params.degree();
        let n = params.num_poles - 1;
        let knots = surface.knots(direction);

        let mut ru = p + 1;
        while ru <= n {
            let start = ru;
            while ru <= n && (knots[ru] - knots[ru + 1]).abs() < ktol {
                ru += 1;
            }
            state.mults[ru] = ru - start + 1;
            state.bounds[ru] = surface.removal_bound(direction, ru, state.mults[ru]);
            ru += 1;
        }
        state
    }

    /// Candidate with the smallest bound among interior knots.
    fn select(
        &self,
        surface: &BsplineSurface<T>,
        direction: SurfaceDirection,
    ) -> Option<Candidate<T>> {
        if !self.active {
            return None;
        }
        let params = surface.params(direction);
        let p = params.degree();
        let r_last = params.num_allocated_knots() - 1;
        if p + 1 > r_last - p - 1 {
            return None;
        }

        let mut best = Candidate {
            index: p + 1,
            mult: self.mults[p + 1],
            bound: self.bounds[p + 1],
            blocked: self.blocked[p + 1],
        };
        for i in (p + 2)..=(r_last - p - 1) {
            if self.bounds[i] < best.bound {
                best = Candidate {
                    index: i,
                    mult: self.mults[i],
                    bound: self.bounds[i],
                    blocked: self.blocked[i],
                };
            }
        }
        // a bound no candidate improved on means there is nothing to remove
        if best.bound == T::max_value().unwrap() {
            best.blocked = true;
        }
        Some(best)
    }

    fn refresh_all(
        &mut self,
        surface: &BsplineSurface<T>,
        direction: SurfaceDirection,
        ktol: T,
    ) {
        if !self.active {
            return;
        }
        let params = surface.params(direction);
        let p = params.degree();
        let r_last = params.num_allocated_knots() - 1;
        let knots = surface.knots(direction);
        if p + 1 > r_last.saturating_sub(p + 1) {
            return;
        }
        for i in (p + 1)..=(r_last - p - 1) {
            if (knots[i] - knots[i + 1]).abs() > ktol && !self.blocked[i] && self.mults[i] > 0 {
                self.bounds[i] = surface.removal_bound(direction, i, self.mults[i]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;

    fn dense_plane() -> BsplineSurface<f64> {
        // bilinear data carrying many superfluous interior knots
        let mut surface = BsplineSurface::from_points_and_order(
            3,
            3,
            3,
            3,
            (0..9)
                .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
                .collect(),
        )
        .unwrap();
        for knot in [0.2, 0.4, 0.6, 0.8] {
            surface.add_knot(SurfaceDirection::U, knot, 1).unwrap();
            surface.add_knot(SurfaceDirection::V, knot, 1).unwrap();
        }
        surface
    }

    #[test]
    fn removal_bound_is_zero_for_superfluous_knot() {
        let mut surface = BsplineSurface::from_points_and_order(
            3,
            3,
            3,
            3,
            (0..9)
                .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
                .collect(),
        )
        .unwrap();
        surface.add_knot(SurfaceDirection::U, 0.5, 1).unwrap();
        let bound = surface.removal_bound(SurfaceDirection::U, 3, 1);
        assert_relative_eq!(bound, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn removes_superfluous_knots_on_plane() {
        let mut surface = dense_plane();
        let before = surface.evaluate_uniform_grid(9, 9).2;
        surface
            .remove_knots_bounded(KnotRemovalDirection::Both, 1e-6)
            .unwrap();
        // planar data reduces all the way back down
        assert_eq!(surface.num_u_poles(), 3);
        assert_eq!(surface.num_v_poles(), 3);
        let after = surface.evaluate_uniform_grid(9, 9).2;
        for (p, q) in before.iter().zip(after.iter()) {
            assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn tight_tolerance_blocks_shape_changing_removal() {
        let mut points = vec![];
        for v in 0..6 {
            for u in 0..6 {
                points.push(Point3::new(
                    u as f64,
                    v as f64,
                    ((u * 7 + v * 3) % 5) as f64 * 0.3,
                ));
            }
        }
        let mut surface = BsplineSurface::from_points_and_order(4, 4, 6, 6, points).unwrap();
        let before = surface.clone();
        surface
            .remove_knots_bounded(KnotRemovalDirection::Both, 1e-12)
            .unwrap();
        // every candidate bound exceeds the tolerance; structure unchanged
        assert_eq!(surface.num_u_poles(), before.num_u_poles());
        assert_eq!(surface.num_v_poles(), before.num_v_poles());
    }

    #[test]
    fn removal_is_idempotent_at_fixed_point() {
        let mut surface = dense_plane();
        surface
            .remove_knots_bounded(KnotRemovalDirection::Both, 1e-6)
            .unwrap();
        let u_poles = surface.num_u_poles();
        let v_poles = surface.num_v_poles();
        let u_knots = surface.u_knots().len();
        surface
            .remove_knots_bounded(KnotRemovalDirection::Both, 1e-6)
            .unwrap();
        assert_eq!(surface.num_u_poles(), u_poles);
        assert_eq!(surface.num_v_poles(), v_poles);
        assert_eq!(surface.u_knots().len(), u_knots);
    }

    #[test]
    fn deviation_stays_under_tolerance() {
        let mut points = vec![];
        for v in 0..8 {
            for u in 0..8 {
                let x = u as f64 / 7.0;
                let y = v as f64 / 7.0;
                points.push(Point3::new(x, y, (x * 3.0).sin() * 0.05 + y * y * 0.02));
            }
        }
        let mut surface = BsplineSurface::from_points_and_order(4, 4, 8, 8, points).unwrap();
        let before = surface.evaluate_uniform_grid(12, 12).2;
        let tol = 1e-3;
        surface
            .remove_knots_bounded(KnotRemovalDirection::Both, tol)
            .unwrap();
        let after = surface.evaluate_uniform_grid(12, 12).2;
        let max_dev = before
            .iter()
            .zip(after.iter())
            .map(|(p, q)| (p - q).norm())
            .fold(0.0_f64, f64::max);
        assert!(max_dev <= tol, "deviation {max_dev} exceeded {tol}");
    }
}
