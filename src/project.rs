use crate::sampler::{GridPoint, SurfaceGrid};

pub const BASE_HUE: f64 = 200.0;
pub const HUE_PER_UNIT_Z: f64 = 20.0;
pub const Z_SCALE: f64 = 0.5;

/// Target drawing surface. Defaults match a 600x450 canvas with the
/// projection scaled by 150 pixels per normalized unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
  pub width: f64,
  pub height: f64,
  pub scale: f64,
}

impl Default for Viewport {
  fn default() -> Self {
    Viewport {
      width: 600.0,
      height: 450.0,
      scale: 150.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsla {
  pub hue: f64,
  pub saturation: f64,
  pub lightness: f64,
  pub alpha: f64,
}

impl Hsla {
  /// Render as a CSS color string.
  pub fn css(&self) -> String {
    format!(
      "hsla({}, {}%, {}%, {})",
      self.hue, self.saturation, self.lightness, self.alpha
    )
  }
}

/// One screen-space quad ready to be filled. `depth` is the rotated
/// depth of the quad's first corner, usable for painter's-order sorts.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedQuad {
  pub corners: [(f64, f64); 4],
  pub depth: f64,
  pub fill: Hsla,
}

/// Project a sampled surface to screen quads. Grid cells with any
/// missing corner are skipped; non-finite heights are flattened to the
/// base plane rather than propagated into screen coordinates.
pub fn project(
  grid: &SurfaceGrid,
  rot_x_deg: f64,
  rot_y_deg: f64,
  viewport: Viewport,
) -> Vec<ProjectedQuad> {
  let rad_x = rot_x_deg.to_radians();
  let rad_y = rot_y_deg.to_radians();
  let res = grid.resolution();
  let mut quads = Vec::new();
  for i in 0..res {
    for j in 0..res {
      let p1 = grid.node(i, j);
      let p2 = grid.node(i + 1, j);
      let p3 = grid.node(i + 1, j + 1);
      let p4 = grid.node(i, j + 1);
      let (p1, p2, p3, p4) = match (p1, p2, p3, p4) {
        (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
        _ => continue,
      };
      let (c1, depth) = project_point(grid, p1, rad_x, rad_y, viewport);
      let (c2, _) = project_point(grid, p2, rad_x, rad_y, viewport);
      let (c3, _) = project_point(grid, p3, rad_x, rad_y, viewport);
      let (c4, _) = project_point(grid, p4, rad_x, rad_y, viewport);
      quads.push(ProjectedQuad {
        corners: [c1, c2, c3, c4],
        depth,
        fill: shade(p1),
      });
    }
  }
  quads
}

/// Rotate and project a single grid node. Returns the screen position
/// and the rotated depth.
fn project_point(
  grid: &SurfaceGrid,
  p: GridPoint,
  rad_x: f64,
  rad_y: f64,
  viewport: Viewport,
) -> ((f64, f64), f64) {
  let nx = normalize(p.x, grid.x_domain());
  let ny = normalize(p.y, grid.y_domain());
  let nz = if p.z.is_finite() { p.z * Z_SCALE } else { 0.0 };
  // Rotate about the vertical axis, then tilt toward the viewer.
  let x1 = nx * rad_x.cos() - ny * rad_x.sin();
  let y1 = nx * rad_x.sin() + ny * rad_x.cos();
  let y2 = y1 * rad_y.cos() - nz * rad_y.sin();
  let z2 = y1 * rad_y.sin() + nz * rad_y.cos();
  let px = viewport.width / 2.0 + x1 * viewport.scale;
  let py = viewport.height / 2.0 - y2 * viewport.scale;
  ((px, py), z2)
}

/// Map a coordinate into [-1, 1] over its domain. A degenerate domain
/// maps everything to the center.
fn normalize(v: f64, domain: (f64, f64)) -> f64 {
  let (min, max) = domain;
  let span = max - min;
  if span == 0.0 || !span.is_finite() {
    return 0.0;
  }
  ((v - min) / span) * 2.0 - 1.0
}

fn shade(p: GridPoint) -> Hsla {
  let z = if p.z.is_finite() { p.z } else { 0.0 };
  Hsla {
    hue: BASE_HUE + z * HUE_PER_UNIT_Z,
    saturation: 70.0,
    lightness: 50.0,
    alpha: 0.8,
  }
}
