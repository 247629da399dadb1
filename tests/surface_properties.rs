use approx::assert_relative_eq;
use bsurf::prelude::*;
use nalgebra::{Point3, Vector3};

fn wavy_surface() -> BsplineSurface<f64> {
    let mut points = vec![];
    for v in 0..6 {
        for u in 0..6 {
            let x = u as f64;
            let y = v as f64;
            points.push(Point3::new(x, y, (x * 0.9).sin() + (y * 0.7).cos()));
        }
    }
    BsplineSurface::from_points_and_order(4, 4, 6, 6, points).unwrap()
}

fn sample(surface: &BsplineSurface<f64>, n: usize) -> Vec<Point3<f64>> {
    let mut out = vec![];
    for j in 0..=n {
        for i in 0..=n {
            out.push(surface.evaluate_point(i as f64 / n as f64, j as f64 / n as f64));
        }
    }
    out
}

#[test]
fn weighting_round_trip_reproduces_poles() {
    let points: Vec<Point3<f64>> = (0..9)
        .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, (i % 4) as f64))
        .collect();
    let weights: Vec<f64> = (0..9).map(|i| 0.5 + 0.25 * (i % 3) as f64).collect();
    let surface = BsplineSurface::populate(
        DirectionSpec::open(3, 3),
        DirectionSpec::open(3, 3),
        points,
        Some(weights),
        false,
    )
    .unwrap();

    let mut grid = surface.grid().clone();
    let original = grid.clone();
    grid.unweight_poles();
    grid.weight_poles();
    for (a, b) in grid.poles().iter().zip(original.poles().iter()) {
        assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-13);
    }
}

#[test]
fn knot_vector_stays_valid_through_mutations() {
    let mut surface = wavy_surface();

    surface.add_knot(SurfaceDirection::U, 0.37, 2).unwrap();
    assert!(surface.u_knots().is_non_decreasing());
    assert_eq!(
        surface.u_knots().len(),
        surface.u_params().num_allocated_knots()
    );

    surface.elevate_degree(SurfaceDirection::V, 5).unwrap();
    assert!(surface.v_knots().is_non_decreasing());
    assert_eq!(
        surface.v_knots().len(),
        surface.v_params().num_allocated_knots()
    );

    surface
        .remove_knots_bounded(KnotRemovalDirection::Both, 1e-7)
        .unwrap();
    assert!(surface.u_knots().is_non_decreasing());
    assert!(surface.v_knots().is_non_decreasing());
    assert_eq!(
        surface.u_knots().len(),
        surface.u_params().num_allocated_knots()
    );
    assert_eq!(
        surface.v_knots().len(),
        surface.v_params().num_allocated_knots()
    );

    surface.normalize_knots().unwrap();
    assert_eq!(surface.knots_domain(SurfaceDirection::U), (0.0, 1.0));
}

#[test]
fn evaluation_is_continuous_at_interior_knots() {
    let surface = wavy_surface();
    // interior u knots of the clamped degree-3 direction
    for knot in [1.0 / 3.0, 2.0 / 3.0] {
        for j in 0..=5 {
            let v = j as f64 / 5.0;
            let below = surface.evaluate_point(knot - 1e-11, v);
            let at = surface.evaluate_point(knot, v);
            assert_relative_eq!((below - at).norm(), 0.0, epsilon = 1e-7);
        }
    }
}

#[test]
fn degree_elevation_to_current_degree_is_fixed_point() {
    let mut surface = wavy_surface();
    let before = sample(&surface, 7);
    surface.elevate_degree(SurfaceDirection::U, 3).unwrap();
    surface.elevate_degree(SurfaceDirection::V, 3).unwrap();
    let after = sample(&surface, 7);
    assert_eq!(surface.u_params().order, 4);
    assert_eq!(surface.v_params().order, 4);
    for (p, q) in before.iter().zip(after.iter()) {
        assert_relative_eq!((p - q).norm(), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn knot_removal_respects_tolerance() {
    let mut surface = wavy_surface();
    for knot in [0.21, 0.43, 0.77] {
        surface.add_knot(SurfaceDirection::U, knot, 1).unwrap();
        surface.add_knot(SurfaceDirection::V, knot, 1).unwrap();
    }
    let before = sample(&surface, 10);

    let tol = 1e-4;
    surface
        .remove_knots_bounded(KnotRemovalDirection::Both, tol)
        .unwrap();

    let after = sample(&surface, 10);
    let max_dev = before
        .iter()
        .zip(after.iter())
        .map(|(p, q)| (p - q).norm())
        .fold(0.0_f64, f64::max);
    assert!(max_dev <= tol, "max deviation {max_dev} over tolerance {tol}");
}

#[test]
fn knot_removal_is_idempotent_at_fixed_point() {
    let mut surface = wavy_surface();
    for knot in [0.21, 0.43, 0.77] {
        surface.add_knot(SurfaceDirection::U, knot, 1).unwrap();
    }
    surface
        .remove_knots_bounded(KnotRemovalDirection::Both, 1e-5)
        .unwrap();
    let u = surface.num_u_poles();
    let v = surface.num_v_poles();
    let u_knots = surface.u_knots().len();
    let v_knots = surface.v_knots().len();

    surface
        .remove_knots_bounded(KnotRemovalDirection::Both, 1e-5)
        .unwrap();
    assert_eq!(surface.num_u_poles(), u);
    assert_eq!(surface.num_v_poles(), v);
    assert_eq!(surface.u_knots().len(), u_knots);
    assert_eq!(surface.v_knots().len(), v_knots);
}

#[test]
fn ruled_surface_of_two_unit_lines() {
    let c1 = BsplineCurve::polyline(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
    ])
    .unwrap();
    let c2 = BsplineCurve::polyline(vec![
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ])
    .unwrap();

    let surface = BsplineSurface::ruled(&c1, &c2).unwrap();
    assert_eq!(surface.num_u_poles(), 2);
    assert_eq!(surface.num_v_poles(), 2);
    assert_eq!(surface.u_params().degree(), 1);
    assert_eq!(surface.v_params().degree(), 1);
    assert_relative_eq!(
        surface.evaluate_point(0.5, 0.5),
        Point3::new(0.5, 0.5, 0.0),
        epsilon = 1e-13
    );
}

#[test]
fn full_rotational_sweep_closes_in_v() {
    let profile = BsplineCurve::polyline(vec![
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(1.5, 0.0, 2.0),
    ])
    .unwrap();
    let surface = BsplineSurface::rotational_sweep(
        &profile,
        &Point3::origin(),
        &Vector3::z(),
        0.0,
        std::f64::consts::TAU,
    )
    .unwrap();

    assert!(surface.v_params().closed);
    for i in 0..=6 {
        let u = i as f64 / 6.0;
        let a = surface.evaluate_point(u, 0.0);
        let b = surface.evaluate_point(u, 1.0);
        assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-9);
    }
}

#[test]
fn planar_bilinear_classification() {
    let flat = BsplineSurface::from_points_and_order(
        2,
        2,
        2,
        2,
        vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(0.0, 2.0, 1.0),
            Point3::new(2.0, 2.0, 1.0),
        ],
    )
    .unwrap();
    assert!(flat.is_planar_bilinear());

    let bent = BsplineSurface::from_points_and_order(
        2,
        2,
        2,
        2,
        vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(0.0, 2.0, 1.0),
            Point3::new(2.0, 2.0, 1.4),
        ],
    )
    .unwrap();
    assert!(!bent.is_planar_bilinear());
}

#[test]
fn uniform_grid_matches_pointwise_evaluation() {
    let surface = wavy_surface();
    let (us, vs, points) = surface.evaluate_uniform_grid(5, 4);
    assert_eq!(us.len(), 5);
    assert_eq!(vs.len(), 4);
    assert_eq!(points.len(), 20);
    for (j, v) in vs.iter().enumerate() {
        for (i, u) in us.iter().enumerate() {
            let p = surface.evaluate_point(*u, *v);
            assert_relative_eq!((p - points[j * 5 + i]).norm(), 0.0, epsilon = 1e-13);
        }
    }
}

#[test]
fn principal_curvatures_of_a_cylinder() {
    let profile = BsplineCurve::polyline(vec![
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 4.0),
    ])
    .unwrap();
    let cylinder = BsplineSurface::rotational_sweep(
        &profile,
        &Point3::origin(),
        &Vector3::z(),
        0.0,
        std::f64::consts::TAU,
    )
    .unwrap();

    let pc = cylinder.principal_curvature(0.5, 0.3).unwrap();
    // one direction is curved with |k| = 1/r, the other is the straight ruling
    assert_relative_eq!(pc.curvature1.abs(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(pc.curvature2.abs(), 0.0, epsilon = 1e-6);
}

#[test]
fn transform_and_swap_preserve_trim_boundaries() {
    let mut surface = BsplineSurface::from_points_and_order(
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
    .unwrap();
    surface.add_trim_boundary(TrimBoundary::new(vec![
        nalgebra::Point2::new(0.1, 0.2),
        nalgebra::Point2::new(0.6, 0.2),
        nalgebra::Point2::new(0.6, 0.9),
        nalgebra::Point2::new(0.1, 0.9),
    ]));

    surface.swap_uv();
    let b = &surface.boundaries()[0];
    assert_relative_eq!(b.points()[0].x, 0.2);
    assert_relative_eq!(b.points()[0].y, 0.1);

    surface.make_reversed(SurfaceDirection::U).unwrap();
    let b = &surface.boundaries()[0];
    assert_relative_eq!(b.points()[0].x, 0.8);
    assert_relative_eq!(b.points()[0].y, 0.1);
}

#[test]
fn curve_segment_and_append_round_trip() {
    let curve = BsplineCurve::from_points_and_order(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.5, 0.0),
            Point3::new(2.0, -0.5, 0.0),
            Point3::new(3.0, 0.5, 0.0),
        ],
        4,
    )
    .unwrap();

    let left = curve.segment(0.0, 0.4).unwrap();
    let right = curve.segment(0.4, 1.0).unwrap();
    let joined = left.append(&right).unwrap();

    // the pieces meet where the parent was split
    assert_relative_eq!(
        (left.end_point() - right.start_point()).norm(),
        0.0,
        epsilon = 1e-10
    );
    // splicing preserves total geometry up to reparameterization
    assert_relative_eq!(joined.length(), curve.length(), epsilon = 1e-6);
    assert_relative_eq!(
        (joined.start_point() - curve.start_point()).norm(),
        0.0,
        epsilon = 1e-10
    );
    assert_relative_eq!(
        (joined.end_point() - curve.end_point()).norm(),
        0.0,
        epsilon = 1e-10
    );
}

#[test]
fn curve_length_of_known_segment() {
    let line = BsplineCurve::polyline(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(3.0, 4.0, 0.0),
    ])
    .unwrap();
    assert_relative_eq!(line.length(), 5.0, epsilon = 1e-10);
    let half = line.parameter_at_length(2.5, 1e-9);
    assert_relative_eq!(half, 0.5, epsilon = 1e-6);
}
