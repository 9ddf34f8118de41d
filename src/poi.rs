use glam::Vec3;
use slotmap::{new_key_type, HopSlotMap};

use crate::{
  link::ReachFlags,
  mesh::PolyRef,
  node::{CapsuleSize, NodeId},
  strategy::{ActorWorld, TraversalStrategy},
};

new_key_type! {
  /// A handle to a registered point of interest. Handles outlive graph
  /// rebuilds; the registry owns the collaborators themselves.
  pub struct ActorId;
}

/// An external game object the graph should know about: pickups,
/// teleporters, lifts, trigger zones. Registered collaborators seed nodes
/// during the build and may contribute special links.
pub trait PointOfInterest {
  /// Where the point of interest sits in the world.
  fn location(&self) -> Vec3;

  /// The claim extent of a destination-only collaborator. Ignored
  /// otherwise.
  fn extent(&self) -> Vec3 {
    Vec3::ZERO
  }

  /// Destination-only collaborators claim all polygons within their extent
  /// into a node that is only ever a route target, never a walk-through.
  fn is_destination_only(&self) -> bool {
    false
  }

  /// Whether this is currently worth a small detour off a route (e.g. a
  /// pickup that is presently spawned).
  fn is_active_detour(&self) -> bool {
    false
  }

  /// Invoked exactly once per full graph build, after node locations are
  /// final. `owner` is the node this collaborator anchored to, if any.
  /// Implementations append special links through `builder`.
  fn add_special_paths(
    &self,
    actor: ActorId,
    owner: Option<NodeId>,
    builder: &mut SpecialPathBuilder,
  ) {
    let _ = (actor, owner, builder);
  }
}

/// A special link requested by a collaborator, resolved against the graph
/// once all collaborators have been consulted.
pub(crate) struct SpecialLinkRequest {
  pub(crate) from_node: Option<NodeId>,
  /// Overrides the start polygon; defaults to the polygon anchoring the
  /// collaborator.
  pub(crate) start_poly: Option<PolyRef>,
  pub(crate) end_location: Vec3,
  pub(crate) reach_flags: ReachFlags,
  pub(crate) size: CapsuleSize,
  pub(crate) strategy: TraversalStrategy,
}

/// Collects special link requests during the POI callback pass. Requests
/// are applied after every collaborator has run, so collaborators never
/// observe a half-mutated graph.
pub struct SpecialPathBuilder<'a> {
  pub(crate) owner: Option<NodeId>,
  pub(crate) requests: &'a mut Vec<SpecialLinkRequest>,
}

impl SpecialPathBuilder<'_> {
  /// Requests a link from the collaborator's node (or from the node owning
  /// `start_poly` when given) to the node owning the polygon nearest
  /// `end_location`.
  pub fn add_special_link(
    &mut self,
    start_poly: Option<PolyRef>,
    end_location: Vec3,
    reach_flags: ReachFlags,
    size: CapsuleSize,
    strategy: TraversalStrategy,
  ) {
    self.requests.push(SpecialLinkRequest {
      from_node: self.owner,
      start_poly,
      end_location,
      reach_flags: reach_flags | ReachFlags::SPECIAL,
      size,
      strategy,
    });
  }
}

/// The registered points of interest of a graph.
#[derive(Default)]
pub struct PoiRegistry {
  pois: HopSlotMap<ActorId, Box<dyn PointOfInterest>>,
}

impl PoiRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, poi: Box<dyn PointOfInterest>) -> ActorId {
    self.pois.insert(poi)
  }

  pub fn remove(&mut self, actor: ActorId) -> Option<Box<dyn PointOfInterest>> {
    self.pois.remove(actor)
  }

  pub fn get(&self, actor: ActorId) -> Option<&dyn PointOfInterest> {
    self.pois.get(actor).map(|poi| poi.as_ref())
  }

  pub fn len(&self) -> usize {
    self.pois.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pois.is_empty()
  }

  pub(crate) fn iter(
    &self,
  ) -> impl Iterator<Item = (ActorId, &dyn PointOfInterest)> {
    self.pois.iter().map(|(actor, poi)| (actor, poi.as_ref()))
  }
}

impl ActorWorld for PoiRegistry {
  fn actor_location(&self, actor: ActorId) -> Option<Vec3> {
    self.get(actor).map(|poi| poi.location())
  }
}
