use std::collections::HashMap;

use glam::{Vec3, Vec3Swizzles};
use ord_subset::OrdVar;

use crate::{
  jump::{jump_trace_test, CollisionWorld},
  link::{PathLink, ReachFlags, BLOCKED_PATH_COST},
  mesh::{PolyRef, ValidPolyMesh},
  node::{CapsuleSize, NodeId, PathNode},
  poi::SpecialLinkRequest,
  poi::SpecialPathBuilder,
  strategy::TraversalStrategy,
  util::BoundingBox,
  NavAgentProperties, NavGraph,
};

/// The extent used to anchor points of interest and special link endpoints
/// to the mesh.
const ANCHOR_PROBE_EXTENT: Vec3 = Vec3::new(128.0, 128.0, 128.0);

/// The ordered phases of a graph build. Each phase is resumable in small
/// batches through [`NavGraph::step_build`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BuildPhase {
  /// No mesh is installed; there is nothing to build.
  Idle,
  /// Claiming polygons for registered points of interest.
  Seed,
  /// Growing nodes across same-sized polygon boundaries and creating walk
  /// links at size boundaries.
  Expand,
  /// Seeding fresh nodes for polygons no expansion reached.
  Islands,
  /// Filling the per-source-polygon distance tables of walk links.
  Distances,
  /// Deriving each node's representative location.
  Locations,
  /// Letting point-of-interest collaborators contribute special links.
  SpecialPaths,
  /// Discovering jump links from polygon wall edges by arc simulation.
  JumpLinks,
  /// Attempting the reverse arc of each discovered jump-down link.
  ReverseJumpLinks,
  /// Final bookkeeping and build statistics.
  Finalize,
  /// The graph is ready for queries.
  Complete,
}

/// Resumable build progress, persisted on the graph between ticks.
pub(crate) struct BuildState {
  pub(crate) phase: BuildPhase,
  /// The next entry of `node_order` the current phase will process.
  cursor: usize,
  /// A stable ordering of the nodes, captured when a per-node phase is
  /// entered.
  node_order: Vec<NodeId>,
}

impl BuildState {
  pub(crate) fn idle() -> Self {
    Self { phase: BuildPhase::Idle, cursor: 0, node_order: Vec::new() }
  }

  pub(crate) fn start() -> Self {
    Self { phase: BuildPhase::Seed, cursor: 0, node_order: Vec::new() }
  }
}

impl NavGraph {
  /// Runs the build to completion in one call.
  pub fn build_all(&mut self, world: &dyn CollisionWorld) -> BuildPhase {
    loop {
      match self.step_build(64, world) {
        BuildPhase::Idle | BuildPhase::Complete => break,
        _ => {}
      }
    }
    self.build.phase
  }

  /// Performs up to `budget` units of build work and returns the phase the
  /// build is now in. A unit is roughly one node or collaborator processed,
  /// so callers can spread a large build across frames.
  pub fn step_build(
    &mut self,
    budget: usize,
    world: &dyn CollisionWorld,
  ) -> BuildPhase {
    let Some(mesh) = self.mesh.clone() else {
      return BuildPhase::Idle;
    };
    let mut budget = budget.max(1);

    while budget > 0 {
      match self.build.phase {
        BuildPhase::Idle | BuildPhase::Complete => break,
        BuildPhase::Seed => {
          self.seed_pois(&mesh);
          budget = budget.saturating_sub(self.pois.len().max(1));
          self.build.phase = BuildPhase::Expand;
        }
        BuildPhase::Expand => {
          let grew = self.expand_once(&mesh);
          budget = budget.saturating_sub(self.nodes.len().max(1));
          if !grew {
            self.build.phase = BuildPhase::Islands;
          }
        }
        BuildPhase::Islands => {
          let seeded = self.sweep_islands(&mesh);
          budget = budget.saturating_sub(1);
          if seeded {
            self.build.phase = BuildPhase::Expand;
          } else {
            self.enter_node_phase(BuildPhase::Distances);
          }
        }
        BuildPhase::Distances => {
          if let Some(node_id) = self.cursor_node() {
            self.compute_node_distances(&mesh, node_id);
            budget = budget.saturating_sub(1);
          } else {
            self.enter_node_phase(BuildPhase::Locations);
          }
        }
        BuildPhase::Locations => {
          if let Some(node_id) = self.cursor_node() {
            self.finalize_node_location(&mesh, node_id);
            budget = budget.saturating_sub(1);
          } else {
            self.build.phase = BuildPhase::SpecialPaths;
          }
        }
        BuildPhase::SpecialPaths => {
          self.add_special_paths(&mesh);
          budget = budget.saturating_sub(self.pois.len().max(1));
          self.enter_node_phase(BuildPhase::JumpLinks);
        }
        BuildPhase::JumpLinks => {
          if let Some(node_id) = self.cursor_node() {
            self.scan_jump_links(&mesh, world, node_id);
            budget = budget.saturating_sub(1);
          } else {
            self.enter_node_phase(BuildPhase::ReverseJumpLinks);
          }
        }
        BuildPhase::ReverseJumpLinks => {
          if let Some(node_id) = self.cursor_node() {
            self.scan_reverse_jump_links(&mesh, world, node_id);
            budget = budget.saturating_sub(1);
          } else {
            self.build.phase = BuildPhase::Finalize;
          }
        }
        BuildPhase::Finalize => {
          self.finalize();
          budget = budget.saturating_sub(1);
          self.build.phase = BuildPhase::Complete;
        }
      }
    }
    self.build.phase
  }

  fn enter_node_phase(&mut self, phase: BuildPhase) {
    self.build.phase = phase;
    self.build.cursor = 0;
    self.build.node_order = self.nodes.keys().collect();
  }

  /// The node the current per-node phase should process next, advancing the
  /// cursor. `None` once the phase has covered every node.
  fn cursor_node(&mut self) -> Option<NodeId> {
    while self.build.cursor < self.build.node_order.len() {
      let node_id = self.build.node_order[self.build.cursor];
      self.build.cursor += 1;
      if self.nodes.contains_key(node_id) {
        return Some(node_id);
      }
    }
    None
  }

  /// Seed phase. Destination-only collaborators claim every unclaimed
  /// polygon within their extent into a fresh node; others attach to the
  /// node owning their nearest polygon, seeding one when unclaimed.
  fn seed_pois(&mut self, mesh: &ValidPolyMesh) {
    let pois = self
      .pois
      .iter()
      .map(|(actor, poi)| {
        (actor, poi.location(), poi.extent(), poi.is_destination_only())
      })
      .collect::<Vec<_>>();

    for (actor, location, extent, destination_only) in pois {
      if destination_only {
        let claimed = mesh
          .polys_in_box(location, extent.max(Vec3::ONE))
          .into_iter()
          .filter(|poly| !self.poly_to_node.contains_key(poly))
          .collect::<Vec<_>>();
        if claimed.is_empty() {
          log::warn!(
            "Destination-only point of interest at {} claims no polygons; skipping.",
            location
          );
          continue;
        }
        let size = self
          .settings
          .size_steps
          .last()
          .copied()
          .unwrap_or(CapsuleSize::new(1, 1));
        let node_id = self.nodes.insert(PathNode::new(size, true));
        for poly in claimed {
          self.nodes[node_id].polys.push(poly);
          self.poly_to_node.insert(poly, node_id);
        }
        self.nodes[node_id].pois.push(actor);
      } else {
        match mesh.nearest_poly(location, ANCHOR_PROBE_EXTENT) {
          Some(poly) => {
            let node_id = match self.poly_to_node.get(&poly) {
              Some(&node_id) => node_id,
              None => self.seed_node_for_poly(mesh, poly),
            };
            self.nodes[node_id].pois.push(actor);
          }
          None => {
            log::warn!(
              "Point of interest at {} has no polygon nearby; skipping.",
              location
            );
          }
        }
      }
    }
  }

  /// Creates a singleton node claiming `poly`, sized from the polygon's
  /// most restrictive connected edge.
  fn seed_node_for_poly(
    &mut self,
    mesh: &ValidPolyMesh,
    poly: PolyRef,
  ) -> NodeId {
    let size = self.poly_step_size(mesh, poly);
    let node_id = self.nodes.insert(PathNode::new(size, false));
    self.nodes[node_id].polys.push(poly);
    self.poly_to_node.insert(poly, node_id);
    node_id
  }

  /// The size bucket a node seeded from `poly` grows along: the stepped
  /// size of the polygon's most generous connected edge, so wide corridors
  /// merge along their wide edges rather than fragmenting at narrow ones.
  fn poly_step_size(&self, mesh: &ValidPolyMesh, poly: PolyRef) -> CapsuleSize {
    let fallback = self
      .settings
      .size_steps
      .last()
      .copied()
      .unwrap_or(CapsuleSize::new(1, 1));
    let Some(index) = mesh.resolve(poly) else {
      return fallback;
    };
    let mut size: Option<CapsuleSize> = None;
    for edge in 0..mesh.polys[index].vertices.len() {
      if mesh.polys[index].connectivity[edge].is_none() {
        continue;
      }
      let (radius, height) = mesh.edge_capsule(index, edge);
      let stepped =
        CapsuleSize::stepped(radius, height, &self.settings.size_steps);
      size = Some(match size {
        Some(existing) => existing.max(stepped),
        None => stepped,
      });
    }
    size.unwrap_or(fallback)
  }

  /// One expansion sweep over every node. Returns whether any node grew.
  fn expand_once(&mut self, mesh: &ValidPolyMesh) -> bool {
    let mut grew = false;
    let node_ids = self.nodes.keys().collect::<Vec<_>>();
    for node_id in node_ids {
      if !self.nodes.contains_key(node_id)
        || self.nodes[node_id].destination_only
      {
        continue;
      }
      let mut i = 0;
      while i < self.nodes[node_id].polys.len() {
        let poly = self.nodes[node_id].polys[i];
        i += 1;
        let Some(poly_index) = mesh.resolve(poly) else {
          continue;
        };
        for edge in 0..mesh.polys[poly_index].vertices.len() {
          let Some(connection) = &mesh.polys[poly_index].connectivity[edge]
          else {
            continue;
          };
          let neighbor = mesh.poly_ref_at(connection.polygon_index);
          let (radius, height) = mesh.edge_capsule(poly_index, edge);
          let stepped =
            CapsuleSize::stepped(radius, height, &self.settings.size_steps);
          match self.poly_to_node.get(&neighbor).copied() {
            Some(other) if other == node_id => {}
            Some(other) => {
              self.upsert_walk_link(mesh, node_id, poly, other, neighbor, stepped)
            }
            None => {
              if stepped == self.nodes[node_id].min_edge_size {
                self.nodes[node_id].polys.push(neighbor);
                self.poly_to_node.insert(neighbor, node_id);
                grew = true;
              }
            }
          }
        }
      }
    }
    grew
  }

  /// Island sweep. Seeds a singleton node for the first still-unclaimed
  /// polygon so expansion can resume from it. Seeding one polygon at a time
  /// lets expansion grow the fresh node before its neighbours get their own
  /// seeds. Returns whether anything was seeded.
  fn sweep_islands(&mut self, mesh: &ValidPolyMesh) -> bool {
    let unclaimed = mesh
      .poly_refs()
      .find(|poly| !self.poly_to_node.contains_key(poly));
    match unclaimed {
      Some(poly) => {
        self.seed_node_for_poly(mesh, poly);
        true
      }
      None => false,
    }
  }

  /// Creates or extends the walk link `from` → `to` entering through
  /// `entry_poly`. If an existing link enters `to` through a different
  /// polygon, the destination is split so every (start, end) node pair
  /// keeps exactly one entry polygon.
  fn upsert_walk_link(
    &mut self,
    mesh: &ValidPolyMesh,
    from: NodeId,
    start_edge_poly: PolyRef,
    to: NodeId,
    entry_poly: PolyRef,
    size: CapsuleSize,
  ) {
    if let Some(position) = self.nodes[from]
      .links
      .iter()
      .position(|link| link.end == to && link.reach_flags == ReachFlags::WALK)
    {
      if self.nodes[from].links[position].end_poly == entry_poly {
        let link = &mut self.nodes[from].links[position];
        link.collision_radius = link.collision_radius.max(size.radius);
        link.collision_height = link.collision_height.max(size.height);
        return;
      }
      let split = self.split_entry_poly(mesh, to, entry_poly);
      self.push_walk_link(from, start_edge_poly, split, entry_poly, size);
      return;
    }
    self.push_walk_link(from, start_edge_poly, to, entry_poly, size);
  }

  fn push_walk_link(
    &mut self,
    from: NodeId,
    start_edge_poly: PolyRef,
    to: NodeId,
    entry_poly: PolyRef,
    size: CapsuleSize,
  ) {
    self.nodes[from].links.push(PathLink {
      start: from,
      start_edge_poly,
      end: to,
      end_poly: entry_poly,
      additional_end_polys: Vec::new(),
      collision_radius: size.radius,
      collision_height: size.height,
      reach_flags: ReachFlags::WALK,
      distances: Vec::new(),
      strategy: None,
    });
  }

  /// Moves `poly` out of `node_id` into a fresh node, re-homing the links
  /// and points of interest that referenced it. Distance tables touched
  /// here are refilled by the distance phase.
  fn split_entry_poly(
    &mut self,
    mesh: &ValidPolyMesh,
    node_id: NodeId,
    poly: PolyRef,
  ) -> NodeId {
    let (size, destination_only) = {
      let node = &self.nodes[node_id];
      (node.min_edge_size, node.destination_only)
    };
    let split = self.nodes.insert(PathNode::new(size, destination_only));

    if let Some(position) = self.nodes[node_id].poly_index(poly) {
      self.nodes[node_id].polys.remove(position);
    }
    self.nodes[split].polys.push(poly);
    self.poly_to_node.insert(poly, split);

    // Outgoing links that exited through the moved polygon go with it.
    let mut moved = Vec::new();
    {
      let node = &mut self.nodes[node_id];
      let mut i = 0;
      while i < node.links.len() {
        if node.links[i].start_edge_poly == poly {
          moved.push(node.links.remove(i));
        } else {
          i += 1;
        }
      }
    }
    for mut link in moved {
      link.start = split;
      link.distances.clear();
      self.nodes[split].links.push(link);
    }

    // Incoming links that entered through the moved polygon now end at the
    // split node.
    let node_ids = self.nodes.keys().collect::<Vec<_>>();
    for other in node_ids {
      for link in &mut self.nodes[other].links {
        if link.end != node_id {
          continue;
        }
        link.additional_end_polys.retain(|&p| p != poly);
        if link.end_poly == poly {
          link.end = split;
          link.distances.clear();
        }
      }
    }

    // Points of interest anchored in the moved polygon follow it.
    let pois = std::mem::take(&mut self.nodes[node_id].pois);
    let mut kept = Vec::new();
    let mut rehomed = Vec::new();
    for actor in pois {
      let anchor = self
        .pois
        .get(actor)
        .and_then(|poi| mesh.nearest_poly(poi.location(), ANCHOR_PROBE_EXTENT));
      if anchor == Some(poly) {
        rehomed.push(actor);
      } else {
        kept.push(actor);
      }
    }
    self.nodes[node_id].pois = kept;
    self.nodes[split].pois.extend(rehomed);

    split
  }

  /// Distance phase for one node: fills the per-source-polygon table of
  /// every link that does not have one yet.
  fn compute_node_distances(&mut self, mesh: &ValidPolyMesh, node_id: NodeId) {
    let polys = self.nodes[node_id].polys.clone();
    for link_index in 0..self.nodes[node_id].links.len() {
      if !self.nodes[node_id].links[link_index].distances.is_empty() {
        continue;
      }
      let end_poly = self.nodes[node_id].links[link_index].end_poly;
      let distances = polys
        .iter()
        .map(|&source| self.calc_poly_distance(mesh, source, end_poly))
        .collect();
      self.nodes[node_id].links[link_index].distances = distances;
    }
  }

  /// The path distance between two polygon centers: the straight line when
  /// an unobstructed ray exists, otherwise the polygon-level shortest path.
  fn calc_poly_distance(
    &self,
    mesh: &ValidPolyMesh,
    a: PolyRef,
    b: PolyRef,
  ) -> i32 {
    let (Some(center_a), Some(center_b)) =
      (mesh.poly_center(a), mesh.poly_center(b))
    else {
      return BLOCKED_PATH_COST;
    };
    let straight = (center_a.distance(center_b) as i32).max(1);
    if a == b {
      return straight;
    }
    if let Some(ray) = mesh.raycast_2d(a, center_a, center_b) {
      if ray.is_clear() && ray.end_poly == b {
        return straight;
      }
    }
    let permissive = NavAgentProperties {
      radius: 0.0,
      height: 0.0,
      can_jump: false,
      can_crouch: false,
    };
    match mesh.find_poly_path_cost(a, &permissive, b) {
      Some(cost) => (cost as i32).max(1),
      None => {
        log::warn!(
          "No polygon path between {:?} and {:?}; using straight-line distance.",
          a,
          b
        );
        straight
      }
    }
  }

  /// Location phase for one node: the representative location is the
  /// surface center of the member polygon closest to the node's bounding
  /// box center. An L-shaped node's raw box center can be off the walkable
  /// area entirely.
  fn finalize_node_location(&mut self, mesh: &ValidPolyMesh, node_id: NodeId) {
    let bounds = self.nodes[node_id].polys.iter().fold(
      BoundingBox::Empty,
      |bounds, &poly| match mesh.poly_bounds(poly) {
        Some(poly_bounds) => bounds.union(&poly_bounds),
        None => bounds,
      },
    );
    let Some(box_center) = bounds.center() else {
      return;
    };
    let best = self.nodes[node_id]
      .polys
      .iter()
      .filter_map(|&poly| mesh.poly_center(poly).map(|center| (poly, center)))
      .min_by_key(|(_, center)| {
        OrdVar::new_checked(center.distance_squared(box_center))
      });
    if let Some((poly, _)) = best {
      if let Some(location) = mesh.poly_surface_center(poly) {
        self.nodes[node_id].location = location;
      }
    }
  }

  /// Special path phase: consults every collaborator exactly once, then
  /// resolves the collected requests against the graph.
  fn add_special_paths(&mut self, mesh: &ValidPolyMesh) {
    let mut owner_of = HashMap::new();
    for (node_id, node) in self.nodes.iter() {
      for &actor in &node.pois {
        owner_of.insert(actor, node_id);
      }
    }

    let mut requests = Vec::new();
    for (actor, poi) in self.pois.iter() {
      let owner = owner_of.get(&actor).copied();
      let mut builder = SpecialPathBuilder { owner, requests: &mut requests };
      poi.add_special_paths(actor, owner, &mut builder);
    }

    for request in requests {
      self.apply_special_link(mesh, request);
    }
  }

  fn apply_special_link(
    &mut self,
    mesh: &ValidPolyMesh,
    request: SpecialLinkRequest,
  ) {
    let from = request.from_node.or_else(|| {
      request
        .start_poly
        .and_then(|poly| self.poly_to_node.get(&poly).copied())
    });
    let Some(from) = from else {
      log::warn!("Special link request has no resolvable start node; skipping.");
      return;
    };
    let start_poly = request
      .start_poly
      .or_else(|| {
        mesh.nearest_poly(self.nodes[from].location, ANCHOR_PROBE_EXTENT)
      })
      .or_else(|| self.nodes[from].polys.first().copied());
    let Some(start_poly) = start_poly else {
      return;
    };

    let end = mesh
      .nearest_poly(request.end_location, ANCHOR_PROBE_EXTENT)
      .and_then(|poly| {
        self.poly_to_node.get(&poly).copied().map(|node| (node, poly))
      });
    let Some((end_node, end_poly)) = end else {
      log::warn!(
        "Special link endpoint {} has no owning node; skipping.",
        request.end_location
      );
      return;
    };

    let end_center = mesh.poly_center(end_poly);
    let distances = self.nodes[from]
      .polys
      .iter()
      .map(|&source| match (mesh.poly_center(source), end_center) {
        (Some(a), Some(b)) => (a.distance(b) as i32).max(1),
        _ => BLOCKED_PATH_COST,
      })
      .collect();
    self.nodes[from].links.push(PathLink {
      start: from,
      start_edge_poly: start_poly,
      end: end_node,
      end_poly,
      additional_end_polys: Vec::new(),
      collision_radius: request.size.radius,
      collision_height: request.size.height,
      reach_flags: request.reach_flags,
      distances,
      strategy: Some(request.strategy),
    });
  }

  /// Jump discovery for one node: from each wall edge of each member
  /// polygon, scan nearby polygons in front of the wall and arc-test the
  /// ones that are not walk-reachable.
  fn scan_jump_links(
    &mut self,
    mesh: &ValidPolyMesh,
    world: &dyn CollisionWorld,
    node_id: NodeId,
  ) {
    if self.nodes[node_id].destination_only {
      return;
    }
    let polys = self.nodes[node_id].polys.clone();
    let radius = self.nodes[node_id].min_edge_size.radius as f32;
    let height = self.nodes[node_id].min_edge_size.height as f32;

    for poly in polys {
      let Some(center) = mesh.poly_surface_center(poly) else {
        continue;
      };
      if world.is_lethal(center)
        || !world.fits(center + Vec3::Z * (height * 0.5), radius, height)
      {
        continue;
      }
      for (a, b) in mesh.poly_walls(poly) {
        if (b - a).length_squared() < 1.0 {
          continue;
        }
        let mid = (a + b) * 0.5;
        let outward = (mid - center).xy();
        if outward.length_squared() < 1e-6 {
          continue;
        }
        let outward = outward.normalize();

        for candidate in
          mesh.polys_within_2d(mid, self.settings.jump_scan_radius_2d)
        {
          if candidate == poly {
            continue;
          }
          let Some(&candidate_node) = self.poly_to_node.get(&candidate) else {
            continue;
          };
          if candidate_node == node_id {
            continue;
          }
          let Some(target) = mesh.poly_surface_center(candidate) else {
            continue;
          };
          let to_target = (target - mid).xy();
          if to_target.length_squared() < 1e-6 {
            continue;
          }
          if outward.dot(to_target.normalize()) < self.settings.jump_facing_dot
          {
            continue;
          }
          if world.is_lethal(target) {
            continue;
          }
          // Walk-reachable candidates never warrant a jump link.
          if mesh.raycast_with_z_check(
            poly,
            center,
            target,
            self.settings.mantle_step_height,
          ) {
            continue;
          }
          if self.nodes[node_id].links.iter().any(|link| {
            link.end == candidate_node
              && link.reach_flags.contains(ReachFlags::JUMP)
              && (link.end_poly == candidate
                || link.additional_end_polys.contains(&candidate))
          }) {
            continue;
          }
          if let Some(result) = jump_trace_test(
            world,
            &self.settings,
            mesh,
            poly,
            center,
            target,
            candidate,
            radius,
            height,
          ) {
            self.upsert_jump_link(
              node_id,
              poly,
              candidate_node,
              candidate,
              result.required_jump_z,
              center,
              target,
            );
          }
        }
      }
    }
    self.finish_jump_links(mesh, node_id);
  }

  #[allow(clippy::too_many_arguments)]
  fn upsert_jump_link(
    &mut self,
    from: NodeId,
    start_edge_poly: PolyRef,
    to: NodeId,
    end_poly: PolyRef,
    required_jump_z: f32,
    start: Vec3,
    end: Vec3,
  ) {
    if let Some(link) = self.nodes[from]
      .links
      .iter_mut()
      .find(|link| link.end == to && link.reach_flags.contains(ReachFlags::JUMP))
    {
      if link.end_poly != end_poly
        && !link.additional_end_polys.contains(&end_poly)
      {
        link.additional_end_polys.push(end_poly);
      }
      if let Some(TraversalStrategy::Jump { required_jump_z: existing, .. }) =
        &mut link.strategy
      {
        // Every folded endpoint must remain reachable.
        if required_jump_z > *existing {
          *existing = required_jump_z;
        }
      }
      return;
    }
    let size = self.nodes[from].min_edge_size;
    let gravity_z = self.settings.gravity_z;
    self.nodes[from].links.push(PathLink {
      start: from,
      start_edge_poly,
      end: to,
      end_poly,
      additional_end_polys: Vec::new(),
      collision_radius: size.radius,
      collision_height: size.height,
      reach_flags: ReachFlags::JUMP,
      distances: Vec::new(),
      strategy: Some(TraversalStrategy::Jump {
        required_jump_z,
        gravity_z,
        start,
        end,
      }),
    });
  }

  /// Elects the representative end polygon of each fresh jump link (the
  /// group member nearest the group's center) and fills its distance table.
  fn finish_jump_links(&mut self, mesh: &ValidPolyMesh, node_id: NodeId) {
    let polys = self.nodes[node_id].polys.clone();
    for link in &mut self.nodes[node_id].links {
      if !link.distances.is_empty() {
        continue;
      }
      if !link.additional_end_polys.is_empty() {
        let mut group = vec![link.end_poly];
        group.append(&mut link.additional_end_polys);
        let centers = group
          .iter()
          .filter_map(|&poly| mesh.poly_center(poly))
          .collect::<Vec<_>>();
        if !centers.is_empty() {
          let group_center =
            centers.iter().copied().sum::<Vec3>() / centers.len() as f32;
          let best = group
            .iter()
            .filter_map(|&poly| {
              mesh.poly_center(poly).map(|center| (poly, center))
            })
            .min_by_key(|(_, center)| {
              OrdVar::new_checked(center.distance_squared(group_center))
            });
          if let Some((best_poly, _)) = best {
            link.end_poly = best_poly;
          }
        }
        link.additional_end_polys =
          group.into_iter().filter(|&poly| poly != link.end_poly).collect();
      }
      let end_center = mesh.poly_center(link.end_poly);
      link.distances = polys
        .iter()
        .map(|&source| match (mesh.poly_center(source), end_center) {
          (Some(a), Some(b)) => (a.distance(b) as i32).max(1),
          _ => BLOCKED_PATH_COST,
        })
        .collect();
    }
  }

  /// Reverse scan for one node: every jump-down link gets the symmetric
  /// jump-up arc attempted from its landing polygon. This catches
  /// open-area-to-ledge jumps whose launch side has no wall edge to scan
  /// from.
  fn scan_reverse_jump_links(
    &mut self,
    mesh: &ValidPolyMesh,
    world: &dyn CollisionWorld,
    node_id: NodeId,
  ) {
    let candidates = self.nodes[node_id]
      .links
      .iter()
      .filter(|link| link.reach_flags.contains(ReachFlags::JUMP))
      .filter_map(|link| {
        let start_z = mesh.poly_center(link.start_edge_poly)?.z;
        let end_z = mesh.poly_center(link.end_poly)?.z;
        (start_z - end_z >= self.settings.jump_down_z_threshold)
          .then_some((link.end, link.end_poly, link.start_edge_poly))
      })
      .collect::<Vec<_>>();

    for (end_node, landing_poly, origin_poly) in candidates {
      if !self.nodes.contains_key(end_node)
        || self.nodes[end_node].destination_only
      {
        continue;
      }
      if self.nodes[end_node].links.iter().any(|link| {
        link.end == node_id && link.reach_flags.contains(ReachFlags::JUMP)
      }) {
        continue;
      }
      let (Some(launch), Some(target)) = (
        mesh.poly_surface_center(landing_poly),
        mesh.poly_surface_center(origin_poly),
      ) else {
        continue;
      };
      let radius = self.nodes[end_node].min_edge_size.radius as f32;
      let height = self.nodes[end_node].min_edge_size.height as f32;
      if let Some(result) = jump_trace_test(
        world,
        &self.settings,
        mesh,
        landing_poly,
        launch,
        target,
        origin_poly,
        radius,
        height,
      ) {
        self.upsert_jump_link(
          end_node,
          landing_poly,
          node_id,
          origin_poly,
          result.required_jump_z,
          launch,
          target,
        );
        self.finish_jump_links(mesh, end_node);
      }
    }
  }

  fn finalize(&mut self) {
    let link_count =
      self.nodes.values().map(|node| node.links.len()).sum::<usize>();
    let jump_count = self
      .nodes
      .values()
      .flat_map(|node| node.links.iter())
      .filter(|link| link.reach_flags.contains(ReachFlags::JUMP))
      .count();
    log::info!(
      "Path node graph build complete: {} nodes, {} links ({} jump).",
      self.nodes.len(),
      link_count,
      jump_count
    );
  }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod test;
