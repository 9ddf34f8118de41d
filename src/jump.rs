use glam::{Vec3, Vec3Swizzles};

use crate::{
  mesh::{PolyRef, ValidPolyMesh},
  NavGraphSettings,
};

/// The collision queries the jump arc simulation needs from the hosting
/// world. Builds driven by a game engine implement this over its physics
/// scene; [`MeshCollisionWorld`] is a mesh-only fallback.
pub trait CollisionWorld {
  /// Sweeps a capsule of `radius` and `height` from `start` to `end`.
  /// Returns the fraction of the sweep at the first obstruction, or `None`
  /// when the sweep is clear.
  fn sweep(&self, start: Vec3, end: Vec3, radius: f32, height: f32) -> Option<f32>;

  /// Whether a capsule of `radius` and `height` fits at `point` without
  /// penetrating geometry.
  fn fits(&self, point: Vec3, radius: f32, height: f32) -> bool;

  /// Whether `point` lies in a volume that kills or damages agents.
  fn is_lethal(&self, point: Vec3) -> bool;

  /// The current gravity (negative, Z down).
  fn gravity_z(&self) -> f32;
}

/// The outcome of a successful jump arc simulation.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct JumpTraceResult {
  /// The smallest candidate vertical launch speed that completed the arc.
  pub required_jump_z: f32,
  /// The largest downward speed reached along the winning arc.
  pub max_fall_speed: f32,
}

/// Simulates ballistic jump arcs from `start` (on `start_poly`) to `end`
/// (on `end_poly`) and reports the smallest launch speed that lands them.
///
/// Candidate launch speeds are tried in order: no launch at all (a plain
/// fall), the configured default, the speed that would put `end` on an
/// ideal parabola, and the boosted maximum. Returns `None` when the target
/// is walk-reachable (no jump needed) or no candidate arc lands.
pub(crate) fn jump_trace_test(
  world: &dyn CollisionWorld,
  settings: &NavGraphSettings,
  mesh: &ValidPolyMesh,
  start_poly: PolyRef,
  start: Vec3,
  end: Vec3,
  end_poly: PolyRef,
  radius: f32,
  height: f32,
) -> Option<JumpTraceResult> {
  // Walk to the launch edge first. A clear walk means no jump link is
  // warranted; a blocked one gives the true launch point at the wall.
  let launch = match mesh.raycast_2d(start_poly, start, end) {
    Some(result) if result.is_clear() && result.end_poly == end_poly => {
      return None;
    }
    Some(result) => {
      let at_wall = start + (end - start) * result.t.clamp(0.0, 1.0);
      Vec3::new(at_wall.x, at_wall.y, start.z)
    }
    None => return None,
  };

  if world.is_lethal(launch) || !world.fits(launch, radius, height) {
    return None;
  }

  let desired = parabola_jump_z(launch, end, settings.move_speed, world.gravity_z());
  let candidates = [
    0.0,
    settings.default_jump_z * settings.default_jump_z_factor,
    desired,
    settings.boosted_jump_z,
  ];

  for jump_z in candidates {
    if jump_z > settings.boosted_jump_z {
      continue;
    }
    if let Some(max_fall_speed) = simulate_arc(
      world, settings, mesh, launch, end, end_poly, radius, height, jump_z,
    ) {
      return Some(JumpTraceResult { required_jump_z: jump_z, max_fall_speed });
    }
  }
  None
}

/// The vertical launch speed putting `end` on an ideal drag-free parabola
/// flown at `move_speed` horizontally. Clamped to zero for downward jumps.
fn parabola_jump_z(start: Vec3, end: Vec3, move_speed: f32, gravity_z: f32) -> f32 {
  let flat_distance = end.xy().distance(start.xy());
  if flat_distance < 1e-3 || move_speed < 1e-3 {
    return 0.0;
  }
  let flight_time = flat_distance / move_speed;
  // dz = jump_z * t + 0.5 * g * t^2
  let jump_z = (end.z - start.z) / flight_time - 0.5 * gravity_z * flight_time;
  jump_z.max(0.0)
}

/// Steps one arc at a fixed timestep with collision sweeps. Returns the
/// peak fall speed on success.
#[allow(clippy::too_many_arguments)]
fn simulate_arc(
  world: &dyn CollisionWorld,
  settings: &NavGraphSettings,
  mesh: &ValidPolyMesh,
  launch: Vec3,
  end: Vec3,
  end_poly: PolyRef,
  radius: f32,
  height: f32,
  jump_z: f32,
) -> Option<f32> {
  let time_step = radius / settings.move_speed;
  let half_height = height * 0.5;

  let mut position = launch;
  let mut velocity_z = jump_z;
  let mut max_fall_speed: f32 = 0.0;

  for _ in 0..settings.max_jump_sim_steps {
    // XY velocity always seeks the target at full move speed.
    let to_target = (end - position).xy();
    let horizontal = if to_target.length_squared() < 1e-6 {
      to_target
    } else {
      to_target.normalize() * settings.move_speed
    };
    let velocity = Vec3::new(horizontal.x, horizontal.y, velocity_z);
    let mut next = position + velocity * time_step;

    if let Some(t) = world.sweep(position, next, radius, height) {
      // Touched down. Count it as arrival when the contact is on or next
      // to the destination polygon.
      let contact = position + (next - position) * t.clamp(0.0, 1.0) + Vec3::Z;
      let probe = Vec3::new(radius, radius, settings.mantle_step_height);
      if contact.xy().distance(end.xy()) <= radius
        || mesh.nearest_poly(contact, probe) == Some(end_poly)
      {
        return Some(max_fall_speed);
      }
      if velocity_z > 0.0 {
        // Mantle correction: an ascending arc may clear a ledge lip just
        // above the swept step.
        let lifted = position + Vec3::Z * settings.mantle_step_height;
        let lifted_next = next + Vec3::Z * settings.mantle_step_height;
        if world.sweep(lifted, lifted_next, radius, height).is_some() {
          return None;
        }
        next = lifted_next;
      } else {
        // Came down somewhere other than the destination.
        return None;
      }
    }

    if world.is_lethal(next) {
      return None;
    }

    position = next;
    velocity_z += world.gravity_z() * time_step;
    max_fall_speed = max_fall_speed.max(-velocity_z);

    let reached_box = position.xy().distance(end.xy()) <= radius
      && (position.z - end.z).abs() <= height;
    if reached_box {
      return Some(max_fall_speed);
    }
    // Over the destination polygon while descending onto it.
    if velocity_z <= 0.0 {
      let probe = Vec3::new(radius, radius, half_height.max(1.0));
      if mesh.nearest_poly(position, probe) == Some(end_poly) {
        return Some(max_fall_speed);
      }
    }

    // Fallen past the target while still heading down: the arc missed.
    if velocity_z < 0.0 && position.z < end.z - height * 2.0 {
      return None;
    }
  }
  None
}

/// A [`CollisionWorld`] over just the navigation mesh, for builds without a
/// hosting physics scene. Treats the mesh as floor-only collision: a sweep
/// obstructs when it would end below the walkable surface, and everything
/// below `kill_z` is lethal.
pub struct MeshCollisionWorld<'a> {
  mesh: &'a ValidPolyMesh,
  gravity_z: f32,
  kill_z: f32,
  step_height: f32,
}

impl<'a> MeshCollisionWorld<'a> {
  pub fn new(mesh: &'a ValidPolyMesh, settings: &NavGraphSettings) -> Self {
    Self {
      mesh,
      gravity_z: settings.gravity_z,
      kill_z: settings.kill_z,
      step_height: settings.mantle_step_height,
    }
  }

  /// The highest walkable surface under `point` when viewed from above.
  /// Surfaces more than `max_above` above the point are not its floor.
  fn floor_height(&self, point: Vec3, max_above: f32) -> Option<f32> {
    let mut best: Option<f32> = None;
    for poly in self.mesh.polys_within_2d(point, 256.0) {
      let Some(vertices) = self.mesh.poly_vertices(poly) else { continue };
      let flat =
        vertices.iter().map(|vertex| vertex.xy()).collect::<Vec<_>>();
      if !crate::geometry::point_in_poly_2d(point.xy(), &flat) {
        continue;
      }
      let mut surface = vertices[0].z;
      for i in 2..vertices.len() {
        let triangle = (vertices[0], vertices[i - 1], vertices[i]);
        if crate::geometry::point_in_poly_2d(
          point.xy(),
          &[triangle.0.xy(), triangle.1.xy(), triangle.2.xy()],
        ) {
          surface = crate::geometry::height_on_triangle(triangle, point.xy());
          break;
        }
      }
      if surface > point.z + max_above {
        continue;
      }
      match best {
        Some(existing) if existing >= surface => {}
        _ => best = Some(surface),
      }
    }
    best
  }
}

impl CollisionWorld for MeshCollisionWorld<'_> {
  fn sweep(&self, start: Vec3, end: Vec3, _radius: f32, _height: f32) -> Option<f32> {
    // A floor-only world has no side walls; a sweep ending below a surface,
    // however high, is the column model's obstruction.
    let Some(floor) = self.floor_height(end, f32::INFINITY) else {
      return None;
    };
    if end.z >= floor - 0.1 {
      return None;
    }
    // The sweep ends underground; report the crossing fraction.
    let dz = start.z - end.z;
    if dz <= 1e-6 {
      return Some(0.0);
    }
    Some(((start.z - floor) / dz).clamp(0.0, 1.0))
  }

  fn fits(&self, point: Vec3, _radius: f32, _height: f32) -> bool {
    // A surface more than a mantle step above the point is overhead
    // geometry (a ledge lip sharing the column), not its floor.
    match self.floor_height(point, self.step_height) {
      Some(floor) => point.z >= floor - 0.1,
      None => true,
    }
  }

  fn is_lethal(&self, point: Vec3) -> bool {
    point.z < self.kill_z
  }

  fn gravity_z(&self) -> f32 {
    self.gravity_z
  }
}

#[cfg(test)]
#[path = "jump_test.rs"]
mod test;
