use glam::{Vec2, Vec3, Vec3Swizzles};

/// Twice the signed area of the 2D triangle (`point_0`, `point_1`,
/// `point_2`). Positive when the points wind counterclockwise.
pub(crate) fn triangle_area_2(point_0: Vec3, point_1: Vec3, point_2: Vec3) -> f32 {
  (point_1.xy() - point_0.xy()).perp_dot(point_2.xy() - point_0.xy())
}

/// Determines whether `point` lies inside (or on the boundary of) the convex
/// counterclockwise polygon described by `vertices`, ignoring height.
pub(crate) fn point_in_poly_2d(point: Vec2, vertices: &[Vec2]) -> bool {
  for i in 0..vertices.len() {
    let a = vertices[i];
    let b = vertices[if i == vertices.len() - 1 { 0 } else { i + 1 }];
    if (b - a).perp_dot(point - a) < -1e-5 {
      return false;
    }
  }
  true
}

/// Finds the edge through which a 2D ray starting inside the convex
/// counterclockwise polygon exits, along with the ray time of the crossing.
/// Returns `None` when the ray never leaves the polygon (zero direction).
pub(crate) fn exit_edge_2d(
  vertices: &[Vec2],
  start: Vec2,
  direction: Vec2,
) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for i in 0..vertices.len() {
    let a = vertices[i];
    let b = vertices[if i == vertices.len() - 1 { 0 } else { i + 1 }];
    let edge = b - a;
    let facing = edge.perp_dot(direction);
    // The ray only exits through edges it approaches from the inside.
    if facing >= 0.0 {
      continue;
    }
    let t = edge.perp_dot(start - a) / -facing;
    let t = t.max(0.0);
    match best {
      Some((_, best_t)) if best_t <= t => {}
      _ => best = Some((i, t)),
    }
  }
  best
}

/// Interpolates the height of `triangle` at the 2D position `point` using
/// barycentric coordinates. The triangle must not be degenerate in 2D.
pub(crate) fn height_on_triangle(triangle: (Vec3, Vec3, Vec3), point: Vec2) -> f32 {
  let v0 = triangle.1.xy() - triangle.0.xy();
  let v1 = triangle.2.xy() - triangle.0.xy();
  let denominator = v0.perp_dot(v1);
  if denominator.abs() < 1e-10 {
    return triangle.0.z;
  }
  let v2 = point - triangle.0.xy();
  let v = v2.perp_dot(v1) / denominator;
  let w = v0.perp_dot(v2) / denominator;
  let u = 1.0 - v - w;
  triangle.0.z * u + triangle.1.z * v + triangle.2.z * w
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod test;
