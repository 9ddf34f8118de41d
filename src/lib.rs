#![doc = include_str!("../README.md")]

mod astar;
mod builder;
mod corridor;
mod geometry;
mod jump;
mod link;
mod mesh;
mod node;
mod pathfind;
mod poi;
mod strategy;
mod util;

use std::{collections::HashMap, sync::Arc};

use glam::Vec3;
use slotmap::HopSlotMap;

pub use builder::BuildPhase;
pub use corridor::{get_move_points, get_move_points_for_link, MovePointsError};
pub use jump::{CollisionWorld, JumpTraceResult, MeshCollisionWorld};
pub use link::{PathLink, ReachFlags, BLOCKED_PATH_COST};
pub use mesh::{
  PolyMesh, PolyRef, Raycast2D, ValidPolyMesh, ValidationError,
};
pub use node::{CapsuleSize, NodeId, PathNode};
pub use pathfind::{
  find_best_path, has_reached_target, BestPath, FindBestPathError,
  FindBestPathOptions, NodeEvaluator, RouteCacheItem, UNAMBIGUOUS_GOAL_WEIGHT,
};
pub use poi::{
  ActorId, PoiRegistry, PointOfInterest, SpecialPathBuilder,
};
pub use strategy::{ActorWorld, TraversalStrategy};
pub use util::BoundingBox;

use builder::BuildState;

/// The tuning knobs of the graph build and its queries. The defaults suit
/// worlds measured in centimeters with human-scale agents; games with other
/// scales should adjust proportionally.
#[derive(Clone, Debug)]
pub struct NavGraphSettings {
  /// The capsule size buckets polygons are classified into, ascending.
  /// Adjacent polygons merge into one node only when their shared edges
  /// land in the same bucket.
  pub size_steps: Vec<CapsuleSize>,
  /// How far from a wall edge the jump discovery pass scans for landing
  /// polygons, in 2D.
  pub jump_scan_radius_2d: f32,
  /// A landing candidate must be roughly in front of the launch wall: the
  /// dot product of the wall's outward normal and the direction to the
  /// candidate must reach this (0.64 is about 50 degrees).
  pub jump_facing_dot: f32,
  /// The vertical launch speed of an ordinary jump.
  pub default_jump_z: f32,
  /// The fraction of `default_jump_z` used when probing arcs, leaving a
  /// margin so discovered jumps are not frame-perfect.
  pub default_jump_z_factor: f32,
  /// The largest vertical launch speed any movement aid can provide. Arcs
  /// requiring more are not discovered.
  pub boosted_jump_z: f32,
  /// The horizontal speed assumed during arc simulation.
  pub move_speed: f32,
  /// How far up the arc simulation may step to clear a ledge lip.
  pub mantle_step_height: f32,
  /// The gravity in effect during the build (negative, Z down).
  pub gravity_z: f32,
  /// Heights below this are lethal to [`MeshCollisionWorld`].
  pub kill_z: f32,
  /// The hard step cap of a single arc simulation.
  pub max_jump_sim_steps: usize,
  /// The minimum drop for a jump link to count as a jump-down and get the
  /// reverse jump-up scan.
  pub jump_down_z_threshold: f32,
  /// How far off a route a detour point of interest may be.
  pub max_detour_distance: f32,
}

impl Default for NavGraphSettings {
  fn default() -> Self {
    Self {
      size_steps: vec![
        CapsuleSize::new(34, 72),
        CapsuleSize::new(46, 92),
        CapsuleSize::new(70, 120),
      ],
      jump_scan_radius_2d: 2048.0,
      jump_facing_dot: 0.64,
      default_jump_z: 540.0,
      default_jump_z_factor: 0.95,
      boosted_jump_z: 1200.0,
      move_speed: 440.0,
      mantle_step_height: 51.0,
      gravity_z: -980.0,
      kill_z: -1.0e6,
      max_jump_sim_steps: 200,
      jump_down_z_threshold: 64.0,
      max_detour_distance: 1024.0,
    }
  }
}

/// The shape and capabilities of an agent, supplied per query.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct NavAgentProperties {
  pub radius: f32,
  pub height: f32,
  pub can_jump: bool,
  pub can_crouch: bool,
}

/// The runtime state of an agent asking for paths.
#[derive(Clone, Debug)]
pub struct NavAgent {
  pub properties: NavAgentProperties,
  pub position: Vec3,
  pub velocity: Vec3,
  /// The velocity of whatever the agent is standing on. Non-zero while
  /// riding a lift, which the start anchoring uses to find the moving
  /// platform's polygon.
  pub base_velocity: Vec3,
  /// The vertical launch speed currently available to the agent.
  pub max_jump_z: f32,
  /// The gravity currently affecting the agent (negative, Z down).
  pub gravity_z: f32,
  pub team: u32,
  /// The capabilities the agent may exercise for this query.
  pub move_flags: ReachFlags,
}

impl NavAgent {
  pub fn new(properties: NavAgentProperties, position: Vec3) -> Self {
    let mut move_flags = ReachFlags::SPECIAL;
    if properties.can_jump {
      move_flags |= ReachFlags::JUMP;
    }
    Self {
      properties,
      position,
      velocity: Vec3::ZERO,
      base_velocity: Vec3::ZERO,
      max_jump_z: 540.0,
      gravity_z: -980.0,
      team: 0,
      move_flags,
    }
  }
}

/// The coarse path-node graph over a validated polygon mesh.
///
/// The graph is built incrementally through [`NavGraph::step_build`] so a
/// large mesh never blocks a frame. Queries against an unbuilt or
/// torn-down graph fail cleanly rather than observe partial structures.
pub struct NavGraph {
  pub settings: NavGraphSettings,
  pub(crate) mesh: Option<Arc<ValidPolyMesh>>,
  pub(crate) nodes: HopSlotMap<NodeId, PathNode>,
  pub(crate) poly_to_node: HashMap<PolyRef, NodeId>,
  pub(crate) pois: PoiRegistry,
  pub(crate) build: BuildState,
}

impl NavGraph {
  pub fn new(settings: NavGraphSettings) -> Self {
    Self {
      settings,
      mesh: None,
      nodes: HopSlotMap::with_key(),
      poly_to_node: HashMap::new(),
      pois: PoiRegistry::new(),
      build: BuildState::idle(),
    }
  }

  /// Installs a new mesh, tearing the existing graph down wholesale first.
  /// In-flight route items from the old graph fail to resolve afterwards;
  /// registered points of interest survive and re-anchor on the next build.
  pub fn set_mesh(&mut self, mesh: ValidPolyMesh) {
    self.nodes.clear();
    self.poly_to_node.clear();
    self.mesh = Some(Arc::new(mesh));
    self.build = BuildState::start();
  }

  pub fn mesh(&self) -> Option<&ValidPolyMesh> {
    self.mesh.as_deref()
  }

  pub fn register_poi(&mut self, poi: Box<dyn PointOfInterest>) -> ActorId {
    self.pois.register(poi)
  }

  pub fn remove_poi(
    &mut self,
    actor: ActorId,
  ) -> Option<Box<dyn PointOfInterest>> {
    self.pois.remove(actor)
  }

  pub fn pois(&self) -> &PoiRegistry {
    &self.pois
  }

  pub fn node(&self, node: NodeId) -> Option<&PathNode> {
    self.nodes.get(node)
  }

  pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &PathNode)> {
    self.nodes.iter()
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// The node that claimed `poly`, if the graph is built.
  pub fn node_for_poly(&self, poly: PolyRef) -> Option<NodeId> {
    self.poly_to_node.get(&poly).copied()
  }

  /// The current build phase. [`BuildPhase::Complete`] means the graph is
  /// ready for queries.
  pub fn build_phase(&self) -> BuildPhase {
    self.build.phase
  }

  pub fn is_built(&self) -> bool {
    self.build.phase == BuildPhase::Complete
  }

  /// See [`find_best_path`].
  pub fn find_best_path(
    &self,
    agent: &NavAgent,
    evaluator: &mut dyn NodeEvaluator,
    options: &FindBestPathOptions,
  ) -> Result<BestPath, FindBestPathError> {
    find_best_path(self, agent, evaluator, options)
  }
}
