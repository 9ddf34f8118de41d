use glam::Vec3;
use slotmap::new_key_type;

use crate::{link::PathLink, mesh::PolyRef, poi::ActorId};

new_key_type! {
  /// The unique identifier of a [`PathNode`] in its graph. Identifiers are
  /// generational, so an identifier held across a rebuild resolves to
  /// nothing instead of aliasing an unrelated node.
  pub struct NodeId;
}

/// An agent collision envelope, in the integral units used for link
/// admission. Sizes are bucketed through [`CapsuleSize::stepped`] before
/// being compared, so exact float agreement is never required.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct CapsuleSize {
  pub radius: i32,
  pub height: i32,
}

impl CapsuleSize {
  pub fn new(radius: i32, height: i32) -> Self {
    Self { radius, height }
  }

  /// Whether an agent with the given dimensions fits in this envelope.
  pub fn fits(&self, radius: f32, height: f32) -> bool {
    radius <= self.radius as f32 && height <= self.height as f32
  }

  /// Rounds a real capsule down to the largest configured step it still
  /// covers. Each component is bucketed independently. Capsules smaller than
  /// the smallest step are clamped up to it, so every edge lands in some
  /// bucket. `steps` must be ascending; with no steps configured the capsule
  /// passes through unbucketed, rounded up.
  pub(crate) fn stepped(radius: f32, height: f32, steps: &[CapsuleSize]) -> CapsuleSize {
    let Some(&smallest) = steps.first() else {
      return CapsuleSize::new(radius.ceil() as i32, height.ceil() as i32);
    };
    let mut result = smallest;
    for step in steps {
      if radius >= step.radius as f32 {
        result.radius = step.radius;
      }
      if height >= step.height as f32 {
        result.height = step.height;
      }
    }
    result
  }

  /// The component-wise larger of the two sizes.
  pub(crate) fn max(self, other: CapsuleSize) -> CapsuleSize {
    CapsuleSize {
      radius: self.radius.max(other.radius),
      height: self.height.max(other.height),
    }
  }
}

/// A coarse pathfinding region: a group of adjacent polygons whose shared
/// edges all admit the same stepped capsule size, treated as a single vertex
/// by the node-level pathfinder.
#[derive(Debug)]
pub struct PathNode {
  /// The polygons claimed by this node. Grows only while the graph is
  /// building. Every polygon of the mesh belongs to exactly one node once
  /// the build completes.
  pub(crate) polys: Vec<PolyRef>,
  /// The most restrictive stepped capsule that can traverse every internal
  /// polygon boundary of this node.
  pub min_edge_size: CapsuleSize,
  /// The outgoing links of this node.
  pub(crate) links: Vec<PathLink>,
  /// Points of interest anchored inside this node's polygons.
  pub(crate) pois: Vec<ActorId>,
  /// A representative walkable point inside the node. Derived once all
  /// nodes are final.
  pub location: Vec3,
  /// Destination-only nodes may be targeted but are never used as
  /// walk-through route nodes, and never absorb polygons during expansion.
  pub destination_only: bool,
}

impl PathNode {
  pub(crate) fn new(min_edge_size: CapsuleSize, destination_only: bool) -> Self {
    Self {
      polys: Vec::new(),
      min_edge_size,
      links: Vec::new(),
      pois: Vec::new(),
      location: Vec3::ZERO,
      destination_only,
    }
  }

  /// The polygons claimed by this node.
  pub fn polys(&self) -> &[PolyRef] {
    &self.polys
  }

  /// The outgoing links of this node.
  pub fn links(&self) -> &[PathLink] {
    &self.links
  }

  /// Points of interest anchored in this node.
  pub fn pois(&self) -> &[ActorId] {
    &self.pois
  }

  /// The position of `poly` in this node's polygon list. Link distance
  /// tables are indexed by this.
  pub(crate) fn poly_index(&self, poly: PolyRef) -> Option<usize> {
    self.polys.iter().position(|&p| p == poly)
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod test;
