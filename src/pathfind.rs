use std::{
  cmp::Reverse,
  collections::{BinaryHeap, HashMap},
};

use glam::{Vec3, Vec3Swizzles};
use ord_subset::OrdVar;
use thiserror::Error;

use crate::{
  link::BLOCKED_PATH_COST,
  mesh::{PolyRef, ValidPolyMesh},
  node::NodeId,
  poi::ActorId,
  NavAgent, NavGraph,
};

/// Weights above this are unambiguous goals; the search stops as soon as an
/// evaluator reports one.
pub const UNAMBIGUOUS_GOAL_WEIGHT: f32 = 1.0;

/// A pluggable goal predicate for [`find_best_path`]. Evaluators rate every
/// node the search reaches, which lets one search answer queries like
/// "nearest spawned pickup" that have no single goal location.
pub trait NodeEvaluator {
  /// Called once before the search. Returning `false` rejects the whole
  /// query (e.g. the goal location is itself off the mesh).
  fn init(&mut self, graph: &NavGraph, agent: &NavAgent) -> bool {
    let _ = (graph, agent);
    true
  }

  /// Rates `node` as a destination. Weights at or below the query's
  /// minimum are ignored; weights above [`UNAMBIGUOUS_GOAL_WEIGHT`] end the
  /// search immediately.
  fn eval(
    &mut self,
    graph: &NavGraph,
    node: NodeId,
    entry_location: Vec3,
    total_distance: i32,
  ) -> f32;

  /// An extra route step appended after the winning node, e.g. the precise
  /// goal location inside it.
  fn route_goal(&mut self) -> Option<RouteCacheItem> {
    None
  }
}

/// A step in a resolved route: a node to cross, an actor to move toward, or
/// a raw location.
#[derive(Clone, Debug)]
pub struct RouteCacheItem {
  pub node: Option<NodeId>,
  pub actor: Option<ActorId>,
  pub location: Vec3,
  /// The polygon used to enter this step, when known.
  pub target_poly: Option<PolyRef>,
  /// A direct target is off the mesh and approached by raw movement.
  pub direct: bool,
}

impl RouteCacheItem {
  pub fn to_location(location: Vec3) -> Self {
    Self { node: None, actor: None, location, target_poly: None, direct: true }
  }
}

/// A successful [`find_best_path`] result.
#[derive(Debug)]
pub struct BestPath {
  /// The route steps in travel order.
  pub route: Vec<RouteCacheItem>,
  /// The winning node's evaluator weight.
  pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct FindBestPathOptions {
  /// Whether a single nearby point of interest may be inserted as a detour
  /// at the front of the route.
  pub allow_detours: bool,
  /// The minimum evaluator weight for a node to count as a destination.
  pub min_weight: f32,
}

impl Default for FindBestPathOptions {
  fn default() -> Self {
    Self { allow_detours: true, min_weight: 0.0 }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FindBestPathError {
  #[error("The graph has not finished building.")]
  GraphNotBuilt,
  #[error("The start location could not be anchored to any node.")]
  StartNotOnMesh,
  #[error("The evaluator rejected the query during initialization.")]
  EvaluatorRejected,
  #[error("No node met the minimum goal weight.")]
  NoAcceptableNode,
}

struct NodeRecord {
  distance: i32,
  previous: Option<(NodeId, usize)>,
  entry_poly: PolyRef,
  entry_location: Vec3,
}

/// Best-first search over the node graph from the agent's position toward
/// whatever `evaluator` rates highest.
pub fn find_best_path(
  graph: &NavGraph,
  agent: &NavAgent,
  evaluator: &mut dyn NodeEvaluator,
  options: &FindBestPathOptions,
) -> Result<BestPath, FindBestPathError> {
  if !graph.is_built() {
    return Err(FindBestPathError::GraphNotBuilt);
  }
  let mesh = graph.mesh().ok_or(FindBestPathError::GraphNotBuilt)?;

  let extent = Vec3::new(
    agent.properties.radius,
    agent.properties.radius,
    agent.properties.height,
  );
  // Anchor the start: tight extent, then a forgiving one, then the moving
  // platform resolver. Anything but the tight anchor means the agent must
  // first actually move into the start node.
  let mut needs_move_to_start = false;
  let start_poly = match mesh.nearest_poly(agent.position, extent) {
    Some(poly) => poly,
    None => {
      needs_move_to_start = true;
      match mesh.nearest_poly(agent.position, extent * 2.0) {
        Some(poly) => poly,
        None => find_lift_poly(mesh, agent)
          .ok_or(FindBestPathError::StartNotOnMesh)?,
      }
    }
  };
  let start_node = graph
    .node_for_poly(start_poly)
    .ok_or(FindBestPathError::StartNotOnMesh)?;

  if !evaluator.init(graph, agent) {
    return Err(FindBestPathError::EvaluatorRejected);
  }

  let mut records = HashMap::new();
  let mut queue = BinaryHeap::new();
  records.insert(
    start_node,
    NodeRecord {
      distance: 0,
      previous: None,
      entry_poly: start_poly,
      entry_location: agent.position,
    },
  );
  queue.push(Reverse((0, start_node)));

  let mut best: Option<(NodeId, f32)> = None;

  while let Some(Reverse((distance, node_id))) = queue.pop() {
    let (entry_poly, entry_location) = {
      let record = &records[&node_id];
      if distance > record.distance {
        continue;
      }
      (record.entry_poly, record.entry_location)
    };
    let Some(node) = graph.node(node_id) else {
      continue;
    };

    let weight = evaluator.eval(graph, node_id, entry_location, distance);
    if weight > options.min_weight
      && best.map_or(true, |(_, best_weight)| weight > best_weight)
    {
      best = Some((node_id, weight));
    }
    if weight > UNAMBIGUOUS_GOAL_WEIGHT {
      break;
    }

    // Destination-only nodes are never crossed, only arrived at.
    if node.destination_only && node_id != start_node {
      continue;
    }
    let Some(entry_index) = node.poly_index(entry_poly) else {
      continue;
    };

    for (link_index, link) in node.links().iter().enumerate() {
      if !link.supports(
        agent.properties.radius,
        agent.properties.height,
        agent.move_flags,
      ) {
        continue;
      }
      let mut cost = link.cost_for(agent, entry_index, graph.pois());
      if cost >= BLOCKED_PATH_COST {
        continue;
      }
      if cost <= 0 {
        log::warn!(
          "Link cost {} from node {:?} clamped to 1 to keep the search loop-free.",
          cost,
          node_id
        );
        cost = 1;
      }
      let next_distance = distance + cost;
      let known = records.get(&link.end);
      if known.map_or(true, |record| next_distance < record.distance) {
        let entry_location = mesh
          .poly_surface_center(link.end_poly)
          .or_else(|| graph.node(link.end).map(|n| n.location))
          .unwrap_or(agent.position);
        records.insert(
          link.end,
          NodeRecord {
            distance: next_distance,
            previous: Some((node_id, link_index)),
            entry_poly: link.end_poly,
            entry_location,
          },
        );
        queue.push(Reverse((next_distance, link.end)));
      }
    }
  }

  let Some((best_node, weight)) = best else {
    return Err(FindBestPathError::NoAcceptableNode);
  };

  let mut route = Vec::new();
  let mut current = best_node;
  loop {
    let record = &records[&current];
    let actor = record
      .previous
      .and_then(|(prev, link_index)| {
        graph.node(prev).and_then(|n| n.links().get(link_index))
      })
      .and_then(|link| link.strategy.as_ref())
      .and_then(|strategy| strategy.move_target());
    let location =
      graph.node(current).map(|n| n.location).unwrap_or(record.entry_location);
    route.push(RouteCacheItem {
      node: Some(current),
      actor,
      location,
      target_poly: Some(record.entry_poly),
      direct: false,
    });
    match record.previous {
      Some((prev, _)) => current = prev,
      None => break,
    }
  }
  route.reverse();
  // The agent already stands in the start node unless it anchored loosely;
  // only then is moving to the start node a real first step.
  if !needs_move_to_start && route.len() > 1 {
    route.remove(0);
  }

  if options.allow_detours && !needs_move_to_start {
    if let Some(detour) = pick_detour(graph, mesh, agent, &route, extent) {
      route.insert(0, detour);
    }
  }
  if let Some(goal) = evaluator.route_goal() {
    route.push(goal);
  }

  Ok(BestPath { route, weight })
}

/// At most one point of interest in the route's first node may be worth a
/// bounded detour: it must be active, near the agent, and not behind it
/// relative to the route direction.
fn pick_detour(
  graph: &NavGraph,
  mesh: &ValidPolyMesh,
  agent: &NavAgent,
  route: &[RouteCacheItem],
  extent: Vec3,
) -> Option<RouteCacheItem> {
  let first_node = route.first().and_then(|item| item.node)?;
  let node = graph.node(first_node)?;
  let route_direction =
    (route.first()?.location - agent.position).xy().normalize_or_zero();

  node
    .pois()
    .iter()
    .filter_map(|&actor| {
      let poi = graph.pois().get(actor)?;
      if !poi.is_active_detour() {
        return None;
      }
      let location = poi.location();
      let offset = location - agent.position;
      let distance = offset.length();
      if distance > graph.settings.max_detour_distance {
        return None;
      }
      if route_direction.dot(offset.xy().normalize_or_zero()) < 0.0 {
        return None;
      }
      Some((actor, location, distance))
    })
    .min_by_key(|&(_, _, distance)| OrdVar::new_checked(distance))
    .map(|(actor, location, _)| RouteCacheItem {
      node: None,
      actor: Some(actor),
      location,
      target_poly: mesh.nearest_poly(location, extent),
      direct: false,
    })
}

/// Resolves the polygon under an agent riding a moving platform: the anchor
/// queries miss because the agent hangs in the air mid-ride, so extend the
/// query along the platform's velocity and line-test candidate bounds.
fn find_lift_poly(mesh: &ValidPolyMesh, agent: &NavAgent) -> Option<PolyRef> {
  if agent.base_velocity.length_squared() < 1.0 {
    return None;
  }
  let travel = agent.base_velocity * 0.5;
  let center = agent.position + travel * 0.5;
  let extent = Vec3::new(
    agent.properties.radius,
    agent.properties.radius,
    agent.properties.height,
  ) + travel.abs() * 0.5;

  mesh
    .polys_in_box(center, extent)
    .into_iter()
    .filter(|&poly| {
      mesh.poly_bounds(poly).is_some_and(|bounds| {
        bounds.intersects_segment_2d(agent.position, agent.position + travel)
      })
    })
    .filter_map(|poly| {
      mesh
        .poly_center(poly)
        .map(|poly_center| (poly, poly_center.distance_squared(agent.position)))
    })
    .min_by_key(|&(_, distance)| OrdVar::new_checked(distance))
    .map(|(poly, _)| poly)
}

/// Whether the agent has arrived at a route step. Actor and direct targets
/// use a plain overlap test; node targets prefer polygon identity, with a
/// half-extent box fallback for layered geometry where the anchor query can
/// resolve to the wrong layer.
pub fn has_reached_target(
  graph: &NavGraph,
  agent: &NavAgent,
  target: &RouteCacheItem,
) -> bool {
  let radius = agent.properties.radius;
  let height = agent.properties.height;
  let delta = target.location - agent.position;

  if target.direct || target.actor.is_some() {
    return delta.xy().length() <= radius && delta.z.abs() <= height;
  }

  let Some(mesh) = graph.mesh() else {
    return false;
  };
  let extent = Vec3::new(radius, radius, height);
  let agent_poly = mesh.nearest_poly(agent.position, extent);

  if let Some(agent_poly) = agent_poly {
    if target.target_poly == Some(agent_poly) {
      return true;
    }
    if let Some(node) = target.node {
      if graph
        .node(node)
        .is_some_and(|n| n.poly_index(agent_poly).is_some())
      {
        return true;
      }
    }
    if mesh.nearest_poly(target.location, extent) == Some(agent_poly) {
      return true;
    }
  }

  delta.xy().length() <= radius * 0.5 && delta.z.abs() <= height * 0.5
}

#[cfg(test)]
#[path = "pathfind_test.rs"]
mod test;
