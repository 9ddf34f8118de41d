use glam::Vec3;
use thiserror::Error;

use crate::{
  geometry::triangle_area_2,
  link::PathLink,
  mesh::{PolyRef, ValidPolyMesh},
  NavAgent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MovePointsError {
  #[error("The polygon route is empty.")]
  EmptyRoute,
  #[error("The polygon route contains a stale or non-adjacent polygon.")]
  BrokenRoute,
}

/// Converts a polygon-level route into the minimal waypoint sequence that
/// stays inside the glued polygon corridor, using the funnel algorithm.
///
/// Interior waypoints sit on portal vertices and are raised by the agent's
/// half height; `start` and `goal` are taken to be in agent space already.
/// Deterministic: the same inputs always produce the same waypoints.
pub fn get_move_points(
  mesh: &ValidPolyMesh,
  start: Vec3,
  agent: &NavAgent,
  route: &[PolyRef],
  goal: Vec3,
) -> Result<Vec<Vec3>, MovePointsError> {
  if route.is_empty() {
    return Err(MovePointsError::EmptyRoute);
  }
  if route.len() == 1 {
    return Ok(vec![goal]);
  }

  let mut portals = Vec::with_capacity(route.len() + 1);
  portals.push((start, start));
  for pair in route.windows(2) {
    let portal = portal_between(mesh, pair[0], pair[1])
      .ok_or(MovePointsError::BrokenRoute)?;
    portals.push(portal);
  }
  portals.push((goal, goal));

  let half_height = agent.properties.height * 0.5;
  let mut points = Vec::new();

  let mut apex = portals[0].0;
  let mut apex_index = 0;
  let (mut left, mut right) = (apex, apex);
  let (mut left_index, mut right_index) = (0, 0);

  let mut i = 1;
  while i < portals.len() {
    let (portal_left, portal_right) = portals[i];

    // The right bound only ever tightens (rotates counterclockwise); when
    // it would cross the left bound, the left bound is a corner of the
    // pulled string.
    if triangle_area_2(apex, right, portal_right) >= 0.0 {
      if apex == right || triangle_area_2(apex, left, portal_right) <= 0.0 {
        right = portal_right;
        right_index = i;
      } else {
        points.push(left + Vec3::Z * half_height);
        apex = left;
        apex_index = left_index;
        left = apex;
        right = apex;
        left_index = apex_index;
        right_index = apex_index;
        i = apex_index + 1;
        continue;
      }
    }

    if triangle_area_2(apex, left, portal_left) <= 0.0 {
      if apex == left || triangle_area_2(apex, right, portal_left) >= 0.0 {
        left = portal_left;
        left_index = i;
      } else {
        points.push(right + Vec3::Z * half_height);
        apex = right;
        apex_index = right_index;
        left = apex;
        right = apex;
        left_index = apex_index;
        right_index = apex_index;
        i = apex_index + 1;
        continue;
      }
    }

    i += 1;
  }
  points.push(goal);
  Ok(points)
}

/// Waypoints for traversing one link. A link with a strategy gets to
/// override plain string pulling (a teleporter pad or jump launch point is
/// mandatory); otherwise the polygon route under the link is string-pulled.
pub fn get_move_points_for_link(
  mesh: &ValidPolyMesh,
  agent: &NavAgent,
  link: &PathLink,
  start: Vec3,
  target: Vec3,
) -> Result<Vec<Vec3>, MovePointsError> {
  if let Some(strategy) = &link.strategy {
    let mut points = Vec::new();
    if strategy.adjust_move_points(agent, target, &mut points) {
      return Ok(points);
    }
  }

  let extent = Vec3::new(
    agent.properties.radius,
    agent.properties.radius,
    agent.properties.height,
  );
  let start_poly =
    mesh.nearest_poly(start, extent).unwrap_or(link.start_edge_poly);
  let route = mesh
    .find_poly_path(start_poly, &agent.properties, link.end_poly)
    .ok_or(MovePointsError::BrokenRoute)?;
  get_move_points(mesh, start, agent, &route, target)
}

/// The shared edge crossed when travelling from `from` into `to`, as a
/// (left, right) pair relative to the travel direction.
fn portal_between(
  mesh: &ValidPolyMesh,
  from: PolyRef,
  to: PolyRef,
) -> Option<(Vec3, Vec3)> {
  let from_index = mesh.resolve(from)?;
  let to_index = mesh.resolve(to)?;
  let poly = &mesh.polys[from_index];
  for (edge, connection) in poly.connectivity.iter().enumerate() {
    if connection.as_ref().map(|c| c.polygon_index) == Some(to_index) {
      let (a, b) = poly.edge_indices(edge);
      // Counterclockwise winding puts the edge start on the traveller's
      // right.
      return Some((mesh.vertices[b], mesh.vertices[a]));
    }
  }
  None
}

#[cfg(test)]
#[path = "corridor_test.rs"]
mod test;
