use log::debug;
use nalgebra::{Matrix3, Point2, Point3, Vector3};

use crate::curve::{make_curves_compatible, make_two_curves_compatible, BsplineCurve};
use crate::errors::{Error, Result};
use crate::grid::PoleGrid;
use crate::knot::{BsplineParams, DerivativeRows, KnotVector};
use crate::misc::{FloatingPoint, Invertible, Ray2};

use super::BsplineSurface;

impl<T: FloatingPoint> BsplineSurface<T> {
    /// Ruled surface between two curves already sharing order and knots.
    /// The curves become the v = 0 and v = 1 pole rows of an order-2 v
    /// direction.
    pub fn ruled_from_compatible(
        curve1: &BsplineCurve<T>,
        curve2: &BsplineCurve<T>,
    ) -> Result<Self> {
        if curve1.order() != curve2.order()
            || curve1.num_poles() != curve2.num_poles()
            || curve1.is_closed() != curve2.is_closed()
        {
            return Err(Error::InvalidKnots);
        }

        let u_params = *curve1.params();
        let v_params = BsplineParams::new(2, 2, false)?;
        let rational = curve1.is_rational() || curve2.is_rational();

        let num_u = u_params.num_poles;
        let mut grid = PoleGrid::zeroed(num_u, 2, rational)?;
        for (v, curve) in [curve1, curve2].into_iter().enumerate() {
            for u in 0..num_u {
                // a non-rational row carries unit weights in a mixed surface
                let w = curve.weight(u);
                let p = curve.poles()[u];
                grid.set_homogeneous(u, v, nalgebra::Vector4::new(p.x, p.y, p.z, w));
            }
        }

        Ok(Self::from_parts(
            grid,
            u_params,
            v_params,
            curve1.knots().clone(),
            KnotVector::new(vec![T::zero(), T::zero(), T::one(), T::one()]),
        ))
    }

    /// Ruled surface between two arbitrary curves; copies are made
    /// compatible first.
    pub fn ruled(curve1: &BsplineCurve<T>, curve2: &BsplineCurve<T>) -> Result<Self> {
        let (a, b) = make_two_curves_compatible(curve1, curve2)?;
        Self::ruled_from_compatible(&a, &b)
    }

    /// Tabulated cylinder: the curve extruded along `delta` with a degree-1,
    /// two-pole v direction.
    pub fn linear_sweep(curve: &BsplineCurve<T>, delta: &Vector3<T>) -> Result<Self> {
        let u_params = *curve.params();
        let v_params = BsplineParams::new(2, 2, false)?;
        let rational = curve.is_rational();

        let num_u = u_params.num_poles;
        let mut grid = PoleGrid::zeroed(num_u, 2, rational)?;
        for u in 0..num_u {
            let w = curve.weight(u);
            let p = curve.poles()[u];
            // weighted translation keeps the stored form consistent
            let q = p + delta * w;
            grid.set_homogeneous(u, 0, nalgebra::Vector4::new(p.x, p.y, p.z, w));
            grid.set_homogeneous(u, 1, nalgebra::Vector4::new(q.x, q.y, q.z, w));
        }

        Ok(Self::from_parts(
            grid,
            u_params,
            v_params,
            curve.knots().clone(),
            KnotVector::new(vec![T::zero(), T::zero(), T::one(), T::one()]),
        ))
    }

    /// Surface of revolution: every curve pole sweeps a rational arc about
    /// the axis through `center`. A full-circle sweep yields a periodic v
    /// direction.
    pub fn rotational_sweep(
        curve: &BsplineCurve<T>,
        center: &Point3<T>,
        axis: &Vector3<T>,
        start: T,
        sweep: T,
    ) -> Result<Self> {
        if axis.norm() < T::default_epsilon() {
            return Err(Error::DegenerateGeometry("zero length rotation axis"));
        }
        let tau = T::from_f64(std::f64::consts::TAU).unwrap();
        let full_circle = (sweep.abs() - tau).abs() < T::from_f64(1.0e-10).unwrap();

        // 1 arc section up to 120 degrees, 2 up to 240, 3 beyond
        let two_thirds_pi = tau / T::from_f64(3.0).unwrap();
        let mut narcs = 1;
        if sweep.abs() > two_thirds_pi {
            narcs += 1;
            if sweep.abs() > two_thirds_pi + two_thirds_pi {
                narcs += 1;
            }
        }
        let num_arc_poles = if full_circle { 2 * narcs } else { 2 * narcs + 1 };
        debug!("rotational sweep with {narcs} arc sections, closed: {full_circle}");

        let u_params = *curve.params();
        let v_params = BsplineParams::new(3, num_arc_poles, full_circle)?;
        let v_knots = KnotVector::generate(&v_params, arc_interior_knots(narcs).as_deref());

        // local frame with the rotation axis as z
        let frame = orthonormal_frame_from_z(axis);
        let num_u = u_params.num_poles;
        let mut grid = PoleGrid::zeroed(num_u, num_arc_poles, true)?;

        for i in 0..num_u {
            let local = frame * (curve.unweighted_pole(i) - center);
            let radius = (local.x * local.x + local.y * local.y).sqrt();
            let arc_start = start + local.y.atan2(local.x);

            let (arc_poles, arc_weights) =
                arc_pole_ring(arc_start, sweep, radius, narcs, full_circle)?;
            for (j, (arc, aw)) in arc_poles.iter().zip(arc_weights.iter()).enumerate() {
                let local_pole = Vector3::new(arc.x, arc.y, local.z);
                let world = center + frame.transpose() * local_pole;
                let weight = curve.weight(i) * *aw;
                grid.set_homogeneous(
                    i,
                    j,
                    nalgebra::Vector4::new(
                        world.x * weight,
                        world.y * weight,
                        world.z * weight,
                        weight,
                    ),
                );
            }
        }

        Ok(Self::from_parts(
            grid,
            u_params,
            v_params,
            curve.knots().clone(),
            v_knots,
        ))
    }

    /// Bilinearly blended Coons patch from four boundary curves forming a
    /// closed loop. Opposite pairs with two poles degenerate to a ruled
    /// surface.
    pub fn coons_patch(curves: &[BsplineCurve<T>; 4]) -> Result<Self> {
        let [q0, p1, q1r, p0r] = order_boundary_loop(curves)?;
        let q1 = q1r.inverse();
        let p0 = p0r.inverse();

        // opposite two-pole pairs are plain ruled surfaces
        if p0.num_poles() == 2 && p1.num_poles() == 2 {
            return Self::ruled(&q0, &q1);
        }
        if q0.num_poles() == 2 && q1.num_poles() == 2 {
            return Self::ruled(&p0, &p1);
        }

        let (p0, p1) = make_two_curves_compatible(&p0, &p1)?;
        let (q0, q1) = make_two_curves_compatible(&q0, &q1)?;

        let n = p0.num_poles();
        let m = q0.num_poles();
        let p_nodes = p0.greville_abscissae();
        let q_nodes = q0.greville_abscissae();

        let corner00 = p0.unweighted_pole(0);
        let corner10 = p1.unweighted_pole(0);
        let corner01 = p0.unweighted_pole(n - 1);
        let corner11 = p1.unweighted_pole(n - 1);

        let rational =
            p0.is_rational() || p1.is_rational() || q0.is_rational() || q1.is_rational();
        let mut grid = PoleGrid::zeroed(m, n, rational)?;

        for i in 0..n {
            let p_node = p_nodes[i];
            let p_node_m1 = T::one() - p_node;
            let pw0 = p0.weight(i);
            let pw1 = p1.weight(i);
            let pp0 = p0.unweighted_pole(i).coords;
            let pp1 = p1.unweighted_pole(i).coords;
            for j in 0..m {
                let q_node = q_nodes[j];
                let q_node_m1 = T::one() - q_node;
                let qw0 = q0.weight(j);
                let qw1 = q1.weight(j);
                let qp0 = q0.unweighted_pole(j).coords;
                let qp1 = q1.unweighted_pole(j).coords;

                let value = pp0 * q_node_m1
                    + pp1 * q_node
                    + qp0 * p_node_m1
                    + qp1 * p_node
                    - corner00.coords * (p_node_m1 * q_node_m1)
                    - corner10.coords * (p_node_m1 * q_node)
                    - corner01.coords * (q_node_m1 * p_node)
                    - corner11.coords * (p_node * q_node);

                let weight = if rational {
                    (pw0 * q_node_m1 + pw1 * q_node) * (qw0 * p_node_m1 + qw1 * p_node)
                } else {
                    T::one()
                };
                grid.set_homogeneous(
                    j,
                    i,
                    nalgebra::Vector4::new(
                        value.x * weight,
                        value.y * weight,
                        value.z * weight,
                        weight,
                    ),
                );
            }
        }

        Ok(Self::from_parts(
            grid,
            *q0.params(),
            *p0.params(),
            q0.knots().clone(),
            p0.knots().clone(),
        ))
    }

    /// Gregory patch: Coons blending with bicubic Hermite weights and corner
    /// cross-derivative twist terms (initialized to zero).
    pub fn gregory_patch(curves: &[BsplineCurve<T>; 4]) -> Result<Self> {
        let [q0c, p1c, q1r, p0r] = order_boundary_loop(curves)?;
        let q1c = q1r.inverse();
        let p0c = p0r.inverse();

        let (p0, p1) = make_two_curves_compatible(&p0c, &p1c)?;
        let (q0, q1) = make_two_curves_compatible(&q0c, &q1c)?;

        let n = p0.num_poles();
        let m = q0.num_poles();
        if n < 3 || m < 3 {
            return Self::coons_patch(curves);
        }
        let p_nodes = p0.greville_abscissae();
        let q_nodes = q0.greville_abscissae();

        // corner layout: 00 and 01 are the ends of the u = 0 edge
        let c00 = p0.unweighted_pole(0).coords;
        let c01 = p1.unweighted_pole(0).coords;
        let c10 = p0.unweighted_pole(n - 1).coords;
        let c11 = p1.unweighted_pole(n - 1).coords;

        let uk = T::from_usize(p0.order() - 1).unwrap();
        let xu00 = (p0.unweighted_pole(1).coords - c00) * uk;
        let xu10 = (c10 - p0.unweighted_pole(n - 2).coords) * uk;
        let xu01 = (p1.unweighted_pole(1).coords - c01) * uk;
        let xu11 = (c11 - p1.unweighted_pole(n - 2).coords) * uk;

        let vl = T::from_usize(q0.order() - 1).unwrap();
        let xv00 = (q0.unweighted_pole(1).coords - c00) * vl;
        let xv01 = (c01 - q0.unweighted_pole(m - 2).coords) * vl;
        let xv10 = (q1.unweighted_pole(1).coords - c10) * vl;
        let xv11 = (c11 - q1.unweighted_pole(m - 2).coords) * vl;

        // corner twists; a refinement could estimate these from the data
        let twist = [Vector3::zeros(); 4];

        let rational =
            p0.is_rational() || p1.is_rational() || q0.is_rational() || q1.is_rational();
        let mut grid = PoleGrid::zeroed(m, n, rational)?;

        for i in 0..n {
            let p_node = p_nodes[i];
            let pw0 = p0.weight(i);
            let pw1 = p1.weight(i);
            let pp0 = p0.unweighted_pole(i).coords;
            let pp1 = p1.unweighted_pole(i).coords;
            let (hu0, hu1, hu2, hu3) = cubic_hermite_blends(p_node);
            for j in 0..m {
                let q_node = q_nodes[j];
                let qw0 = q0.weight(j);
                let qw1 = q1.weight(j);
                let qp0 = q0.unweighted_pole(j).coords;
                let qp1 = q1.unweighted_pole(j).coords;
                let (hv0, hv1, hv2, hv3) = cubic_hermite_blends(q_node);

                let v_par_u0 = xv00 * hu0 + xv10 * hu3 + twist[0] * hu1 + twist[2] * hu2;
                let v_par_u1 = xv01 * hu0 + xv11 * hu3 + twist[1] * hu1 + twist[3] * hu2;
                let u_par_0v = xu00 * hv0 + xu01 * hv3 + twist[0] * hv1 + twist[1] * hv2;
                let u_par_1v = xu10 * hv0 + xu11 * hv3 + twist[2] * hv1 + twist[3] * hv2;

                let value = qp0 * hu0
                    + qp1 * hu3
                    + u_par_0v * hu1
                    + u_par_1v * hu2
                    + pp0 * hv0
                    + pp1 * hv3
                    + v_par_u0 * hv1
                    + v_par_u1 * hv2
                    - (c00 * hu0 + xu00 * hu1 + xu10 * hu2 + c10 * hu3) * hv0
                    - (xv00 * hu0 + twist[0] * hu1 + twist[2] * hu2 + xv10 * hu3) * hv1
                    - (xv01 * hu0 + twist[1] * hu1 + twist[3] * hu2 + xv11 * hu3) * hv2
                    - (c01 * hu0 + xu01 * hu1 + xu11 * hu2 + c11 * hu3) * hv3;

                let q_node_m1 = T::one() - q_node;
                let p_node_m1 = T::one() - p_node;
                let weight = if rational {
                    (pw0 * q_node_m1 + pw1 * q_node) * (qw0 * p_node_m1 + qw1 * p_node)
                } else {
                    T::one()
                };
                grid.set_homogeneous(
                    j,
                    i,
                    nalgebra::Vector4::new(
                        value.x * weight,
                        value.y * weight,
                        value.z * weight,
                        weight,
                    ),
                );
            }
        }

        Ok(Self::from_parts(
            grid,
            *q0.params(),
            *p0.params(),
            q0.knots().clone(),
            p0.knots().clone(),
        ))
    }

    /// Tube surface: sweep a section along a trace curve with a moving
    /// frame. `rigid` keeps the section from twisting about the trace
    /// tangent; otherwise minimal-twist parallel transport is applied.
    pub fn swept_along(
        section: &BsplineCurve<T>,
        trace: &BsplineCurve<T>,
        rigid: bool,
    ) -> Result<Self> {
        let nodes = trace.greville_abscissae();
        let start = trace.knots_domain().0;

        let frame0 = frenet_matrix(trace, start)?;
        let origin = trace.point_at(start);

        // local section coordinates relative to the trace start frame
        let locals: Vec<Vector3<T>> = (0..section.num_poles())
            .map(|i| frame0 * (section.unweighted_pole(i) - origin))
            .collect();

        let num_u = section.num_poles();
        let num_v = trace.num_poles();
        let rational = section.is_rational() || trace.is_rational();
        let mut grid = PoleGrid::zeroed(num_u, num_v, rational)?;

        let mut matrix = frame0;
        for j in 0..num_v {
            let tangent = trace
                .evaluate(nodes[j], DerivativeRows::First)
                .first
                .unwrap();
            if tangent.norm() > T::default_epsilon() {
                matrix = update_sweep_frame(&matrix, &tangent.normalize(), rigid);
            }

            let node_point = trace.unweighted_pole(j);
            for i in 0..num_u {
                let world = node_point + matrix.transpose() * locals[i];
                let weight = section.weight(i) * trace.weight(j);
                grid.set_homogeneous(
                    i,
                    j,
                    nalgebra::Vector4::new(
                        world.x * weight,
                        world.y * weight,
                        world.z * weight,
                        weight,
                    ),
                );
            }
        }

        Ok(Self::from_parts(
            grid,
            *section.params(),
            *trace.params(),
            section.knots().clone(),
            trace.knots().clone(),
        ))
    }

    /// Skinned surface through a stack of section curves; sections are made
    /// compatible and joined by an order-2 v direction (piecewise ruled).
    pub fn skinned(sections: &[BsplineCurve<T>], closed: bool) -> Result<Self> {
        if sections.len() < 2 {
            return Err(Error::DegenerateGeometry("a skin needs at least two sections"));
        }
        let sections = make_curves_compatible(sections)?;
        debug!(
            "skinning {} compatible sections of order {}",
            sections.len(),
            sections[0].order()
        );

        let u_params = *sections[0].params();
        let v_params = BsplineParams::new(2, sections.len(), closed)?;
        let v_knots = KnotVector::generate(&v_params, None);

        let rational = sections.iter().any(|s| s.is_rational());
        let num_u = u_params.num_poles;
        let mut grid = PoleGrid::zeroed(num_u, sections.len(), rational)?;
        for (j, section) in sections.iter().enumerate() {
            for i in 0..num_u {
                let w = section.weight(i);
                let p = section.poles()[i];
                grid.set_homogeneous(i, j, nalgebra::Vector4::new(p.x, p.y, p.z, w));
            }
        }

        Ok(Self::from_parts(
            grid,
            u_params,
            v_params,
            sections[0].knots().clone(),
            v_knots,
        ))
    }
}

/// Hermite basis `h00, h10, h01, h11` at `u`.
fn cubic_hermite_blends<T: FloatingPoint>(u: T) -> (T, T, T, T) {
    let three = T::from_f64(3.0).unwrap();
    let u_sq = u * u;
    let u_two = u + u;
    (
        u_sq * (u_two - three) + T::one(),
        u * (u_sq - u_two + T::one()),
        u_sq * (u - T::one()),
        u_sq * (three - u_two),
    )
}

/// Interior knots of the composite arc: one double knot per internal
/// section break, plus the seam knot when periodic.
fn arc_interior_knots<T: FloatingPoint>(narcs: usize) -> Option<Vec<T>> {
    let third = T::one() / T::from_f64(3.0).unwrap();
    let half = T::from_f64(0.5).unwrap();
    match narcs {
        1 => None,
        2 => Some(vec![half, half]),
        _ => Some(vec![
            third,
            third,
            third + third,
            third + third,
            T::one(),
        ]),
    }
}

/// Poles and weights of a circular arc of `narcs` quadratic sections at the
/// given radius; mid poles sit on the tangent intersections with weight
/// `cos(dtheta / 2)`. The seam pole is dropped for a periodic ring.
fn arc_pole_ring<T: FloatingPoint>(
    start: T,
    sweep: T,
    radius: T,
    narcs: usize,
    periodic: bool,
) -> Result<(Vec<Point2<T>>, Vec<T>)> {
    let dtheta = sweep / T::from_usize(narcs).unwrap();
    let half = T::from_f64(0.5).unwrap();
    let wm = (dtheta * half).cos();
    if wm <= T::default_epsilon() {
        return Err(Error::DegenerateGeometry("arc section sweep too large"));
    }

    let on_circle = |theta: T| Point2::new(radius * theta.cos(), radius * theta.sin());
    let tangent = |theta: T| nalgebra::Vector2::new(-theta.sin(), theta.cos());

    let mut poles = vec![];
    let mut weights = vec![];
    for k in 0..narcs {
        let t0 = start + dtheta * T::from_usize(k).unwrap();
        let t1 = t0 + dtheta;
        let p0 = on_circle(t0);

        poles.push(p0);
        weights.push(T::one());

        let mid = if radius < T::default_epsilon() {
            Point2::origin()
        } else {
            let r0 = Ray2::new(p0, tangent(t0));
            let r1 = Ray2::new(on_circle(t1), tangent(t1));
            r0.find_intersection(&r1).ok_or(Error::NoRayIntersection)?
        };
        poles.push(mid);
        weights.push(wm);
    }
    if !periodic {
        poles.push(on_circle(start + sweep));
        weights.push(T::one());
    }
    Ok((poles, weights))
}

/// Orthonormal world-to-local matrix with the given direction as its z row.
fn orthonormal_frame_from_z<T: FloatingPoint>(axis: &Vector3<T>) -> Matrix3<T> {
    let z = axis.normalize();
    let seed = if z.x.abs() > T::from_f64(0.9).unwrap() {
        Vector3::y()
    } else {
        Vector3::x()
    };
    let x = (seed - z * seed.dot(&z)).normalize();
    let y = z.cross(&x);
    Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()])
}

/// World-to-frame matrix with rows (normal, binormal, tangent) at a curve
/// parameter, falling back to an arbitrary perpendicular when the curve is
/// locally straight.
fn frenet_matrix<T: FloatingPoint>(curve: &BsplineCurve<T>, t: T) -> Result<Matrix3<T>> {
    let eval = curve.evaluate(t, DerivativeRows::Second);
    let d1 = eval.first.unwrap();
    let d2 = eval.second.unwrap();
    if d1.norm() < T::default_epsilon() {
        return Err(Error::DegenerateGeometry("zero tangent on trace curve"));
    }
    let tangent = d1.normalize();

    let binormal = {
        let b = d1.cross(&d2);
        if b.norm() > T::default_epsilon() {
            b.normalize()
        } else {
            // straight segment; any perpendicular frame works
            orthonormal_frame_from_z(&tangent).row(0).transpose()
        }
    };
    let normal = binormal.cross(&tangent).normalize();
    Ok(Matrix3::from_rows(&[
        normal.transpose(),
        binormal.transpose(),
        tangent.transpose(),
    ]))
}

/// Advance the sweep frame to a new tangent: reuse it while the tangent
/// barely turns, re-seat the x axis for a rigid sweep, or pivot about the
/// turning axis carrying the accumulated twist along (minimal twist).
fn update_sweep_frame<T: FloatingPoint>(
    prev: &Matrix3<T>,
    new_tangent: &Vector3<T>,
    rigid: bool,
) -> Matrix3<T> {
    let prev_x = prev.row(0).transpose();
    let prev_y = prev.row(1).transpose();
    let prev_tangent = prev.row(2).transpose();

    if new_tangent.dot(&prev_tangent) > T::from_f64(0.99999).unwrap() {
        return *prev;
    }

    if rigid {
        let x = prev_y.cross(new_tangent).normalize();
        return Matrix3::from_rows(&[x.transpose(), prev_y.transpose(), new_tangent.transpose()]);
    }

    let pivot_x = prev_tangent.cross(new_tangent).normalize();
    let twist_angle = pivot_x.dot(&prev_y).atan2(pivot_x.dot(&prev_x));
    let twist = nalgebra::Rotation3::from_axis_angle(
        &nalgebra::Vector3::z_axis(),
        twist_angle,
    );
    let pivot_y = new_tangent.cross(&pivot_x).normalize();
    let pivot = Matrix3::from_rows(&[
        pivot_x.transpose(),
        pivot_y.transpose(),
        new_tangent.transpose(),
    ]);
    twist.matrix() * pivot
}

/// Reorder four curves into a head-to-tail loop starting from the first,
/// reversing individual curves where needed. Returns `[c0, c1, c2, c3]`
/// walking the loop.
fn order_boundary_loop<T: FloatingPoint>(
    curves: &[BsplineCurve<T>; 4],
) -> Result<[BsplineCurve<T>; 4]> {
    let tol = T::from_f64(1.0e-8).unwrap();
    let mut chain = vec![curves[0].clone()];
    let mut rest: Vec<BsplineCurve<T>> = curves[1..].to_vec();

    while !rest.is_empty() {
        let tail = chain.last().unwrap().end_point();
        let found = rest.iter().position(|c| {
            (c.start_point() - tail).norm() < tol || (c.end_point() - tail).norm() < tol
        });
        match found {
            Some(idx) => {
                let mut next = rest.remove(idx);
                if (next.start_point() - tail).norm() >= tol {
                    next.invert();
                }
                chain.push(next);
            }
            None => return Err(Error::DisconnectedBoundary),
        }
    }

    let closes = (chain[3].end_point() - chain[0].start_point()).norm() < tol;
    if !closes {
        return Err(Error::DisconnectedBoundary);
    }

    let [c0, c1, c2, c3] = <[BsplineCurve<T>; 4]>::try_from(chain)
        .map_err(|_| Error::DisconnectedBoundary)?;
    Ok([c0, c1, c2, c3])
}
