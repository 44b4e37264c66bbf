use leibniz::backend::LocalBackend;
use leibniz::project::{project, Viewport};
use leibniz::sampler::{
  sample_1d, sample_grid, sample_parametric, sample_polar,
};

#[cfg(test)]
mod trace_tests {
  use super::*;

  #[test]
  fn test_identity_line() {
    let backend = LocalBackend::new();
    let rows = sample_1d(&backend, &["x"], (-1.0, 1.0), 2);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].x, -1.0);
    assert_eq!(rows[0].vals, vec![Some(-1.0)]);
    assert_eq!(rows[1].vals, vec![Some(0.0)]);
    assert_eq!(rows[2].vals, vec![Some(1.0)]);
  }

  #[test]
  fn test_degenerate_domain_samples_once() {
    let backend = LocalBackend::new();
    let rows = sample_1d(&backend, &["x^2"], (2.0, 2.0), 10);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].x, 2.0);
    assert_eq!(rows[0].vals, vec![Some(4.0)]);
  }

  #[test]
  fn test_unparseable_series_stays_empty() {
    let backend = LocalBackend::new();
    let rows = sample_1d(&backend, &["x", "1 +"], (0.0, 1.0), 2);
    assert_eq!(rows.len(), 3);
    for row in &rows {
      assert!(row.vals[0].is_some());
      assert_eq!(row.vals[1], None);
    }
  }

  #[test]
  fn test_pole_drops_value_and_row() {
    let backend = LocalBackend::new();
    // 1/x is infinite at x = 0; the whole row disappears since no
    // series has a finite value there.
    let rows = sample_1d(&backend, &["1 / x"], (-1.0, 1.0), 2);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].x, -1.0);
    assert_eq!(rows[1].x, 1.0);
  }

  #[test]
  fn test_parametric_requires_both_coordinates() {
    let backend = LocalBackend::new();
    let points =
      sample_parametric(&backend, "cos(t)", "sin(t)", (0.0, 0.0), 1);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].x, 1.0);
    assert_eq!(points[0].y, 0.0);
    assert_eq!(points[0].t, 0.0);
  }

  #[test]
  fn test_parametric_drops_non_finite_points() {
    let backend = LocalBackend::new();
    let points =
      sample_parametric(&backend, "1 / t", "t", (-1.0, 1.0), 2);
    assert_eq!(points.len(), 2);
  }

  #[test]
  fn test_polar_converts_to_cartesian() {
    let backend = LocalBackend::new();
    let points = sample_polar(&backend, "1", (0.0, 0.0), 1);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].x, 1.0);
    assert_eq!(points[0].y, 0.0);
    assert_eq!(points[0].r, 1.0);
    assert_eq!(points[0].theta, 0.0);
  }

  #[test]
  fn test_polar_circle_point_count() {
    let backend = LocalBackend::new();
    let points =
      sample_polar(&backend, "1", (0.0, 2.0 * std::f64::consts::PI), 8);
    assert_eq!(points.len(), 9);
    for p in &points {
      assert!((p.x * p.x + p.y * p.y - 1.0).abs() < 1e-9);
    }
  }
}

#[cfg(test)]
mod grid_tests {
  use super::*;

  #[test]
  fn test_plane_grid() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "x + y", (-1.0, 1.0), (-1.0, 1.0), 1);
    assert_eq!(grid.resolution(), 1);
    assert_eq!(grid.points().count(), 4);
    assert_eq!(grid.node(0, 0).unwrap().z, -2.0);
    assert_eq!(grid.node(1, 1).unwrap().z, 2.0);
  }

  #[test]
  fn test_grid_keeps_non_finite_heights() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "1 / x", (0.0, 1.0), (0.0, 1.0), 1);
    // The x = 0 column evaluates to infinity but stays in the grid so
    // indices line up.
    assert_eq!(grid.points().count(), 4);
    assert!(grid.node(0, 0).unwrap().z.is_infinite());
    assert_eq!(grid.node(1, 1).unwrap().z, 1.0);
  }

  #[test]
  fn test_grid_marks_failed_nodes_missing() {
    let backend = LocalBackend::new();
    // sqrt of a negative number is complex, which the real-valued
    // sampler rejects, so every node is missing.
    let grid =
      sample_grid(&backend, "sqrt(x)", (-2.0, -1.0), (0.0, 1.0), 2);
    assert_eq!(grid.points().count(), 0);
  }

  #[test]
  fn test_unparseable_expression_yields_empty_grid() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "x +", (-1.0, 1.0), (-1.0, 1.0), 4);
    assert_eq!(grid.points().count(), 0);
  }

  #[test]
  fn test_out_of_range_node_is_none() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "x + y", (-1.0, 1.0), (-1.0, 1.0), 1);
    assert_eq!(grid.node(2, 0), None);
    assert_eq!(grid.node(0, 2), None);
    assert_eq!(grid.node(usize::MAX, usize::MAX), None);
  }

  #[test]
  fn test_zero_resolution_is_clamped() {
    let backend = LocalBackend::new();
    let grid = sample_grid(&backend, "x", (-1.0, 1.0), (-1.0, 1.0), 0);
    assert_eq!(grid.resolution(), 1);
    assert_eq!(grid.points().count(), 4);
  }
}

#[cfg(test)]
mod projection_tests {
  use super::*;

  #[test]
  fn test_flat_surface_projects_to_centered_quad() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "0 * x", (-1.0, 1.0), (-1.0, 1.0), 1);
    let quads = project(&grid, 0.0, 0.0, Viewport::default());
    assert_eq!(quads.len(), 1);
    let quad = &quads[0];
    // With no rotation, (x, y) = (-1, -1) lands at (150, 375) on the
    // default 600x450 viewport.
    assert_eq!(quad.corners[0], (150.0, 375.0));
    assert_eq!(quad.corners[2], (450.0, 75.0));
    assert_eq!(quad.depth, 0.0);
    assert_eq!(quad.fill.hue, 200.0);
    assert_eq!(quad.fill.alpha, 0.8);
  }

  #[test]
  fn test_quads_with_missing_corners_are_skipped() {
    let backend = LocalBackend::new();
    // sqrt is complex for x < 0, so half the grid is missing and only
    // cells whose four corners evaluated survive.
    let grid =
      sample_grid(&backend, "sqrt(x)", (-1.0, 1.0), (-1.0, 1.0), 2);
    let quads = project(&grid, 45.0, 30.0, Viewport::default());
    assert_eq!(quads.len(), 2);
  }

  #[test]
  fn test_non_finite_heights_are_flattened() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "1 / x", (0.0, 1.0), (0.0, 1.0), 1);
    let quads = project(&grid, 45.0, 30.0, Viewport::default());
    assert_eq!(quads.len(), 1);
    for (px, py) in quads[0].corners {
      assert!(px.is_finite());
      assert!(py.is_finite());
    }
    // The infinite corner is treated as height zero for shading too.
    assert_eq!(quads[0].fill.hue, 200.0);
  }

  #[test]
  fn test_full_grid_quad_count() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "x * y", (-1.0, 1.0), (-1.0, 1.0), 4);
    let quads = project(&grid, 45.0, 30.0, Viewport::default());
    assert_eq!(quads.len(), 16);
  }

  #[test]
  fn test_hue_tracks_height() {
    let backend = LocalBackend::new();
    let grid =
      sample_grid(&backend, "x + y", (-1.0, 1.0), (-1.0, 1.0), 1);
    let quads = project(&grid, 45.0, 30.0, Viewport::default());
    // First cell's anchor corner is (x, y) = (-1, -1), z = -2.
    assert_eq!(quads[0].fill.hue, 200.0 + -2.0 * 20.0);
    assert_eq!(
      quads[0].fill.css(),
      "hsla(160, 70%, 50%, 0.8)"
    );
  }
}
