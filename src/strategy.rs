use std::sync::Arc;

use glam::{Vec3, Vec3Swizzles};

use crate::{link::BLOCKED_PATH_COST, poi::ActorId, NavAgent};

/// A flat surcharge on wall dodge links. Dodges are riskier than the plain
/// route, so they only win when meaningfully shorter.
const WALL_DODGE_COST_SURCHARGE: i32 = 500;

/// Height tolerance when deciding whether a lift has carried the agent to
/// its recorded exit stop.
const LIFT_EXIT_Z_TOLERANCE: f32 = 48.0;

/// Resolves strategy actor handles to world state at query time. The POI
/// registry implements this; tests may substitute their own.
pub trait ActorWorld {
  /// The current location of `actor`, or `None` if the handle is stale.
  fn actor_location(&self, actor: ActorId) -> Option<Vec3>;

  /// Whether `actor` still exists.
  fn is_valid(&self, actor: ActorId) -> bool {
    self.actor_location(actor).is_some()
  }
}

/// How a link is traversed beyond plain walking.
///
/// Each variant stores only the geometric facts captured at build time that
/// are needed to re-derive cost and waypoints later; live state (lift
/// position, team policy) is consulted through [`ActorWorld`] at query time.
#[derive(Clone)]
pub enum TraversalStrategy {
  /// A ballistic jump validated by arc simulation during the build.
  Jump {
    /// The vertical launch speed the arc required at build time.
    required_jump_z: f32,
    /// The gravity in effect when the arc was validated. Requirements are
    /// rescaled when the current gravity differs.
    gravity_z: f32,
    /// The launch point of the validated arc.
    start: Vec3,
    /// The landing point of the validated arc.
    end: Vec3,
  },
  /// Riding a lift or elevator between stops.
  Lift { lift: ActorId, board_center: Vec3, exit_center: Vec3 },
  /// Walking into a teleporter.
  Teleport { teleporter: ActorId, trigger_location: Vec3 },
  /// A doorway or field only some teams may pass.
  TeamGate {
    gate: ActorId,
    /// Returns whether the given team is admitted.
    policy: Arc<dyn Fn(u32) -> bool + Send + Sync>,
  },
  /// Jumping at a wall and dodging off it.
  WallDodge { wall_point: Vec3, wall_normal: Vec3, jump_off: Vec3 },
}

impl std::fmt::Debug for TraversalStrategy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Jump { required_jump_z, gravity_z, start, end } => f
        .debug_struct("Jump")
        .field("required_jump_z", required_jump_z)
        .field("gravity_z", gravity_z)
        .field("start", start)
        .field("end", end)
        .finish(),
      Self::Lift { lift, board_center, exit_center } => f
        .debug_struct("Lift")
        .field("lift", lift)
        .field("board_center", board_center)
        .field("exit_center", exit_center)
        .finish(),
      Self::Teleport { teleporter, trigger_location } => f
        .debug_struct("Teleport")
        .field("teleporter", teleporter)
        .field("trigger_location", trigger_location)
        .finish(),
      Self::TeamGate { gate, .. } => {
        f.debug_struct("TeamGate").field("gate", gate).finish_non_exhaustive()
      }
      Self::WallDodge { wall_point, wall_normal, jump_off } => f
        .debug_struct("WallDodge")
        .field("wall_point", wall_point)
        .field("wall_normal", wall_normal)
        .field("jump_off", jump_off)
        .finish(),
    }
  }
}

impl TraversalStrategy {
  /// The vertical launch speed a jump recorded at `build_gravity_z` demands
  /// under `current_gravity_z`. Falls require proportionally more launch
  /// speed under stronger gravity.
  pub fn scaled_jump_z(
    required_jump_z: f32,
    build_gravity_z: f32,
    current_gravity_z: f32,
  ) -> f32 {
    if build_gravity_z == 0.0 {
      return required_jump_z;
    }
    required_jump_z * (current_gravity_z / build_gravity_z).abs().sqrt()
  }

  /// The cost of traversing a link using this strategy, given the link's
  /// default (distance-derived) cost. Returns [`BLOCKED_PATH_COST`] when
  /// the agent cannot use the link right now.
  pub fn cost(
    &self,
    default_cost: i32,
    agent: &NavAgent,
    world: &dyn ActorWorld,
  ) -> i32 {
    match self {
      Self::Jump { required_jump_z, gravity_z, .. } => {
        if !agent.properties.can_jump {
          return BLOCKED_PATH_COST;
        }
        let required =
          Self::scaled_jump_z(*required_jump_z, *gravity_z, agent.gravity_z);
        if agent.max_jump_z + 1.0 < required {
          return BLOCKED_PATH_COST;
        }
        default_cost
      }
      Self::Lift { lift, .. } => {
        if !world.is_valid(*lift) {
          return BLOCKED_PATH_COST;
        }
        default_cost
      }
      Self::Teleport { teleporter, .. } => {
        if !world.is_valid(*teleporter) {
          return BLOCKED_PATH_COST;
        }
        default_cost
      }
      Self::TeamGate { policy, .. } => {
        if !(policy)(agent.team) {
          return BLOCKED_PATH_COST;
        }
        default_cost
      }
      Self::WallDodge { .. } => {
        if !agent.properties.can_jump {
          return BLOCKED_PATH_COST;
        }
        default_cost + WALL_DODGE_COST_SURCHARGE
      }
    }
  }

  /// Whether the agent should hold at `current` before continuing toward
  /// `target`. Checked every tick while the link is being traversed.
  pub fn should_wait(
    &self,
    agent: &NavAgent,
    _current: Vec3,
    _target: Vec3,
    world: &dyn ActorWorld,
  ) -> bool {
    match self {
      Self::Jump { required_jump_z, gravity_z, .. } => {
        // Hold until the agent's launch capability covers the arc, e.g.
        // while switching to a movement tool.
        let required =
          Self::scaled_jump_z(*required_jump_z, *gravity_z, agent.gravity_z);
        agent.max_jump_z + 1.0 < required
      }
      Self::Lift { lift, exit_center, .. } => {
        if !world.is_valid(*lift) {
          return false;
        }
        // Stay aboard until the lift reaches the recorded exit stop.
        (agent.position.z - exit_center.z).abs() > LIFT_EXIT_Z_TOLERANCE
          || agent.base_velocity.z.abs() > 1.0
      }
      Self::Teleport { .. } => false,
      Self::TeamGate { .. } => false,
      Self::WallDodge { jump_off, .. } => {
        // The dodge is a jump from a stable stand at the jump-off point;
        // hold there until vertical motion settles. Anywhere else, keep
        // moving.
        agent.position.xy().distance(jump_off.xy())
          <= agent.properties.radius
          && agent.velocity.z.abs() > 1.0
      }
    }
  }

  /// Gives the strategy a chance to override the waypoints used to traverse
  /// its link. Returns `true` when `points` was populated and plain string
  /// pulling should be skipped.
  pub fn adjust_move_points(
    &self,
    agent: &NavAgent,
    target: Vec3,
    points: &mut Vec<Vec3>,
  ) -> bool {
    let half_height = agent.properties.height * 0.5;
    match self {
      Self::Jump { start, end, .. } => {
        // The launch point is mandatory; jumping early misses the arc.
        points.push(*start + Vec3::Z * half_height);
        points.push(*end + Vec3::Z * half_height);
        if target.xy().distance_squared(end.xy()) > 1.0 {
          points.push(target);
        }
        true
      }
      Self::Lift { board_center, exit_center, .. } => {
        points.push(*board_center + Vec3::Z * half_height);
        points.push(*exit_center + Vec3::Z * half_height);
        true
      }
      Self::Teleport { trigger_location, .. } => {
        // The pad is the real target; the far side is reached by the
        // teleport itself.
        points.push(*trigger_location + Vec3::Z * half_height);
        true
      }
      Self::TeamGate { .. } => false,
      Self::WallDodge { wall_point, jump_off, .. } => {
        points.push(*jump_off + Vec3::Z * half_height);
        points.push(*wall_point + Vec3::Z * half_height);
        points.push(target);
        true
      }
    }
  }

  /// The actor an agent should move toward while traversing this link, if
  /// any. Attached to route items so the agent controller can track moving
  /// actors instead of stale build-time locations.
  pub fn move_target(&self) -> Option<ActorId> {
    match self {
      Self::Lift { lift, .. } => Some(*lift),
      Self::Teleport { teleporter, .. } => Some(*teleporter),
      _ => None,
    }
  }
}

#[cfg(test)]
#[path = "strategy_test.rs"]
mod test;
