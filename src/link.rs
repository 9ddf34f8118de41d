use std::ops::{BitOr, BitOrAssign};

use crate::{
  mesh::PolyRef,
  node::NodeId,
  strategy::{ActorWorld, TraversalStrategy},
  NavAgent,
};

/// The cost sentinel for a link that cannot be traversed. Links reporting
/// this cost are excluded from the current search without failing it.
pub const BLOCKED_PATH_COST: i32 = 10_000_000;

/// The movement capabilities a link demands of its users.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct ReachFlags(u32);

impl ReachFlags {
  /// Plain walking. Every agent satisfies this.
  pub const WALK: ReachFlags = ReachFlags(0);
  /// The link requires a jump.
  pub const JUMP: ReachFlags = ReachFlags(1 << 0);
  /// The link is traversed through a special strategy (lift, teleporter,
  /// gate) rather than raw movement.
  pub const SPECIAL: ReachFlags = ReachFlags(1 << 1);

  /// Whether every flag in `required` is present in `self`.
  pub fn satisfies(&self, required: ReachFlags) -> bool {
    self.0 & required.0 == required.0
  }

  pub fn contains(&self, flag: ReachFlags) -> bool {
    self.0 & flag.0 == flag.0
  }
}

impl BitOr for ReachFlags {
  type Output = ReachFlags;
  fn bitor(self, rhs: Self) -> Self {
    ReachFlags(self.0 | rhs.0)
  }
}

impl BitOrAssign for ReachFlags {
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

/// A directed pathfinding edge between two [`crate::PathNode`]s.
///
/// A link always enters its destination through a single polygon,
/// `end_poly`; additional reachable endpoint polygons in the same
/// destination are folded into `additional_end_polys` instead of spawning
/// one link each.
#[derive(Debug)]
pub struct PathLink {
  /// The node this link leaves from.
  pub start: NodeId,
  /// The polygon on the start side the link exits through.
  pub start_edge_poly: PolyRef,
  /// The node this link arrives at.
  pub end: NodeId,
  /// The polygon the link enters the destination through.
  pub end_poly: PolyRef,
  /// Other endpoint polygons of the destination reachable by this link.
  pub additional_end_polys: Vec<PolyRef>,
  /// The largest agent radius admitted by the link.
  pub collision_radius: i32,
  /// The largest agent height admitted by the link.
  pub collision_height: i32,
  /// The capabilities required to traverse the link.
  pub reach_flags: ReachFlags,
  /// Path cost from each of the start node's polygons to `end_poly`,
  /// indexed parallel to the start node's polygon list. Entries are always
  /// positive once the build completes.
  pub(crate) distances: Vec<i32>,
  /// How the link is traversed beyond plain walking, if at all.
  pub strategy: Option<TraversalStrategy>,
}

impl PathLink {
  /// Whether an agent of the given size and capabilities may use this link
  /// at all. Transient conditions (team policy, missing lift) are checked
  /// separately by [`Self::cost_for`].
  pub fn supports(&self, radius: f32, height: f32, flags: ReachFlags) -> bool {
    radius <= self.collision_radius as f32
      && height <= self.collision_height as f32
      && flags.satisfies(self.reach_flags)
  }

  pub(crate) fn distance_from(&self, start_poly_index: usize) -> i32 {
    self
      .distances
      .get(start_poly_index)
      .copied()
      .unwrap_or(BLOCKED_PATH_COST)
  }

  /// The cost of traversing this link starting from the polygon at
  /// `start_poly_index` of the start node. Returns [`BLOCKED_PATH_COST`]
  /// when the link is disqualified for this agent right now.
  pub fn cost_for(
    &self,
    agent: &NavAgent,
    start_poly_index: usize,
    world: &dyn ActorWorld,
  ) -> i32 {
    let base = self.distance_from(start_poly_index);
    if base >= BLOCKED_PATH_COST {
      return BLOCKED_PATH_COST;
    }
    match &self.strategy {
      Some(strategy) => strategy.cost(base, agent, world),
      None => base,
    }
  }
}

#[cfg(test)]
#[path = "link_test.rs"]
mod test;
