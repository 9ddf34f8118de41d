use std::collections::HashSet;

use glam::Vec3;

use crate::{
  builder::BuildPhase,
  jump::MeshCollisionWorld,
  link::{ReachFlags, BLOCKED_PATH_COST},
  mesh::{PolyMesh, ValidPolyMesh},
  node::{CapsuleSize, NodeId},
  poi::{ActorId, PointOfInterest, SpecialPathBuilder},
  strategy::TraversalStrategy,
  NavGraph, NavGraphSettings,
};

/// A `width` x `depth` grid of flat 100-unit squares at z=0.
fn grid_mesh(width: usize, depth: usize, clearances: Vec<f32>) -> ValidPolyMesh {
  let mut vertices = Vec::new();
  for y in 0..=depth {
    for x in 0..=width {
      vertices.push(Vec3::new(x as f32 * 100.0, y as f32 * 100.0, 0.0));
    }
  }
  let vertex = |x: usize, y: usize| y * (width + 1) + x;
  let mut polygons = Vec::new();
  for y in 0..depth {
    for x in 0..width {
      polygons.push(vec![
        vertex(x, y),
        vertex(x + 1, y),
        vertex(x + 1, y + 1),
        vertex(x, y + 1),
      ]);
    }
  }
  PolyMesh { vertices, polygons, clearances }
    .validate()
    .expect("grid mesh is valid")
}

fn build(graph: &mut NavGraph) {
  let mesh = graph.mesh.clone().expect("a mesh is installed");
  let world = MeshCollisionWorld::new(&mesh, &graph.settings);
  assert_eq!(graph.build_all(&world), BuildPhase::Complete);
}

/// Checks the structural invariants every finished build must satisfy:
/// full single-owner polygon coverage and positive, polygon-parallel link
/// distance tables.
fn check_build_invariants(graph: &NavGraph) {
  let mesh = graph.mesh().expect("a mesh is installed");

  let mut claimed = HashSet::new();
  for (node_id, node) in graph.nodes() {
    for &poly in node.polys() {
      assert!(claimed.insert(poly), "{poly:?} is claimed twice");
      assert_eq!(graph.node_for_poly(poly), Some(node_id));
    }
  }
  assert_eq!(claimed.len(), mesh.poly_count());

  for (_, node) in graph.nodes() {
    let mut destinations = HashSet::new();
    for link in node.links() {
      assert!(
        destinations.insert((link.end, link.reach_flags)),
        "two links of the same kind lead to the same destination"
      );
      assert_eq!(link.distances.len(), node.polys().len());
      for &distance in &link.distances {
        assert!(distance > 0);
        assert!(distance < BLOCKED_PATH_COST);
      }
    }
  }
}

#[test]
fn uniform_grid_collapses_into_one_node() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(3, 3, vec![]));
  build(&mut graph);

  assert!(graph.is_built());
  assert_eq!(graph.node_count(), 1);
  let (_, node) = graph.nodes().next().unwrap();
  assert_eq!(node.polys().len(), 9);
  assert!(node.links().is_empty());
  // The representative location is the surface center of the middle
  // polygon.
  assert_eq!(node.location, Vec3::new(150.0, 150.0, 0.0));
  check_build_invariants(&graph);
}

#[test]
fn step_build_resumes_across_calls() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(3, 3, vec![]));
  let mesh = graph.mesh.clone().unwrap();
  let world = MeshCollisionWorld::new(&mesh, &graph.settings);

  assert_ne!(graph.step_build(1, &world), BuildPhase::Complete);
  assert!(!graph.is_built());

  let mut steps = 0;
  while graph.step_build(1, &world) != BuildPhase::Complete {
    steps += 1;
    assert!(steps < 10_000, "the build failed to converge");
  }

  assert!(graph.is_built());
  assert_eq!(graph.node_count(), 1);
  check_build_invariants(&graph);
}

#[test]
fn disconnected_islands_get_separate_nodes_and_no_links() {
  // Two squares too far apart even for the jump scan.
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(
    PolyMesh {
      vertices: vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(100.0, 0.0, 0.0),
        Vec3::new(100.0, 100.0, 0.0),
        Vec3::new(0.0, 100.0, 0.0),
        Vec3::new(3000.0, 0.0, 0.0),
        Vec3::new(3100.0, 0.0, 0.0),
        Vec3::new(3100.0, 100.0, 0.0),
        Vec3::new(3000.0, 100.0, 0.0),
      ],
      polygons: vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
      clearances: vec![],
    }
    .validate()
    .expect("island mesh is valid"),
  );
  build(&mut graph);

  assert_eq!(graph.node_count(), 2);
  for (_, node) in graph.nodes() {
    assert!(node.links().is_empty());
  }
  check_build_invariants(&graph);
}

#[test]
fn clearance_boundaries_split_nodes_with_one_entry_polygon_per_link() {
  // The south row has tall clearance, the north row does not, so the rows
  // land in different height buckets and cannot merge. The north node
  // reaches the south row through two different polygons, which forces the
  // south node to split so every link keeps a single entry polygon.
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(2, 2, vec![200.0, 200.0, 95.0, 95.0]));
  build(&mut graph);
  let mesh = graph.mesh().unwrap();
  let refs = mesh.poly_refs().collect::<Vec<_>>();

  assert_eq!(graph.node_count(), 3);
  let south_a = graph.node_for_poly(refs[0]).unwrap();
  let south_b = graph.node_for_poly(refs[1]).unwrap();
  let north = graph.node_for_poly(refs[2]).unwrap();
  assert_ne!(south_a, south_b);
  assert_eq!(graph.node_for_poly(refs[3]), Some(north));

  let north_node = graph.node(north).unwrap();
  assert_eq!(north_node.polys().len(), 2);
  assert_eq!(north_node.links().len(), 2);
  let mut entries = north_node
    .links()
    .iter()
    .map(|link| (link.end, link.end_poly))
    .collect::<Vec<_>>();
  entries.sort();
  let mut expected = vec![(south_a, refs[0]), (south_b, refs[1])];
  expected.sort();
  assert_eq!(entries, expected);

  check_build_invariants(&graph);
}

struct Zone {
  location: Vec3,
  extent: Vec3,
}

impl PointOfInterest for Zone {
  fn location(&self) -> Vec3 {
    self.location
  }

  fn extent(&self) -> Vec3 {
    self.extent
  }

  fn is_destination_only(&self) -> bool {
    true
  }
}

#[test]
fn destination_only_zones_claim_but_never_expand() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  let zone = graph.register_poi(Box::new(Zone {
    location: Vec3::new(50.0, 50.0, 0.0),
    extent: Vec3::new(40.0, 40.0, 40.0),
  }));
  graph.set_mesh(grid_mesh(2, 2, vec![]));
  build(&mut graph);
  let refs = graph.mesh().unwrap().poly_refs().collect::<Vec<_>>();

  assert_eq!(graph.node_count(), 2);
  let zone_node_id = graph.node_for_poly(refs[0]).unwrap();
  let zone_node = graph.node(zone_node_id).unwrap();
  assert!(zone_node.destination_only);
  assert_eq!(zone_node.polys(), &[refs[0]]);
  assert_eq!(zone_node.pois(), &[zone]);
  // Arrived at, never crossed: no outgoing links.
  assert!(zone_node.links().is_empty());

  let free_node_id = graph.node_for_poly(refs[1]).unwrap();
  let free_node = graph.node(free_node_id).unwrap();
  assert_eq!(free_node.polys().len(), 3);
  assert_eq!(free_node.links().len(), 1);
  assert_eq!(free_node.links()[0].end, zone_node_id);
  assert_eq!(free_node.links()[0].end_poly, refs[0]);

  check_build_invariants(&graph);
}

struct Marker(Vec3);

impl PointOfInterest for Marker {
  fn location(&self) -> Vec3 {
    self.0
  }
}

#[test]
fn points_of_interest_anchor_to_the_owning_node() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  let marker = graph.register_poi(Box::new(Marker(Vec3::new(150.0, 50.0, 0.0))));
  graph.set_mesh(grid_mesh(2, 2, vec![]));
  build(&mut graph);

  assert_eq!(graph.node_count(), 1);
  let (_, node) = graph.nodes().next().unwrap();
  assert_eq!(node.pois(), &[marker]);
  check_build_invariants(&graph);
}

struct Teleporter {
  pad: Vec3,
  exit: Vec3,
}

impl PointOfInterest for Teleporter {
  fn location(&self) -> Vec3 {
    self.pad
  }

  fn add_special_paths(
    &self,
    actor: ActorId,
    _owner: Option<NodeId>,
    builder: &mut SpecialPathBuilder,
  ) {
    builder.add_special_link(
      None,
      self.exit,
      ReachFlags::WALK,
      CapsuleSize::new(34, 72),
      TraversalStrategy::Teleport {
        teleporter: actor,
        trigger_location: self.pad,
      },
    );
  }
}

#[test]
fn teleporters_bridge_islands_with_special_links() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  let teleporter = graph.register_poi(Box::new(Teleporter {
    pad: Vec3::new(50.0, 50.0, 0.0),
    exit: Vec3::new(3050.0, 50.0, 0.0),
  }));
  graph.set_mesh(
    PolyMesh {
      vertices: vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(100.0, 0.0, 0.0),
        Vec3::new(100.0, 100.0, 0.0),
        Vec3::new(0.0, 100.0, 0.0),
        Vec3::new(3000.0, 0.0, 0.0),
        Vec3::new(3100.0, 0.0, 0.0),
        Vec3::new(3100.0, 100.0, 0.0),
        Vec3::new(3000.0, 100.0, 0.0),
      ],
      polygons: vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
      clearances: vec![],
    }
    .validate()
    .expect("island mesh is valid"),
  );
  build(&mut graph);
  let refs = graph.mesh().unwrap().poly_refs().collect::<Vec<_>>();

  let near = graph.node_for_poly(refs[0]).unwrap();
  let far = graph.node_for_poly(refs[1]).unwrap();
  let near_node = graph.node(near).unwrap();

  assert_eq!(near_node.links().len(), 1);
  let link = &near_node.links()[0];
  assert_eq!(link.end, far);
  assert_eq!(link.end_poly, refs[1]);
  assert!(link.reach_flags.contains(ReachFlags::SPECIAL));
  assert_eq!(link.distances, vec![3000]);
  match &link.strategy {
    Some(TraversalStrategy::Teleport { teleporter: actor, .. }) => {
      assert_eq!(*actor, teleporter);
    }
    other => panic!("expected a teleport strategy, got {other:?}"),
  }

  check_build_invariants(&graph);
}

/// A ground strip and a raised ledge offset diagonally, so only the
/// ledge's west wall faces the ground closely enough for the forward jump
/// scan. The jump up is only discoverable as the reverse of the found
/// jump down.
fn corner_ledge_mesh() -> ValidPolyMesh {
  PolyMesh {
    vertices: vec![
      Vec3::new(-300.0, 0.0, 0.0),
      Vec3::new(0.0, 0.0, 0.0),
      Vec3::new(0.0, 100.0, 0.0),
      Vec3::new(-300.0, 100.0, 0.0),
      Vec3::new(0.0, 200.0, 100.0),
      Vec3::new(200.0, 200.0, 100.0),
      Vec3::new(200.0, 300.0, 100.0),
      Vec3::new(0.0, 300.0, 100.0),
    ],
    polygons: vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
    clearances: vec![],
  }
  .validate()
  .expect("ledge mesh is valid")
}

#[test]
fn ledge_jumps_are_discovered_in_both_directions() {
  let settings =
    NavGraphSettings { jump_facing_dot: 0.55, ..Default::default() };
  let default_jump = settings.default_jump_z * settings.default_jump_z_factor;
  let mut graph = NavGraph::new(settings);
  graph.set_mesh(corner_ledge_mesh());
  build(&mut graph);
  let refs = graph.mesh().unwrap().poly_refs().collect::<Vec<_>>();

  let ground = graph.node_for_poly(refs[0]).unwrap();
  let ledge = graph.node_for_poly(refs[1]).unwrap();
  assert_ne!(ground, ledge);

  // The drop off the ledge needs no launch speed at all.
  let ledge_node = graph.node(ledge).unwrap();
  assert_eq!(ledge_node.links().len(), 1);
  let down = &ledge_node.links()[0];
  assert_eq!(down.end, ground);
  assert!(down.reach_flags.contains(ReachFlags::JUMP));
  match &down.strategy {
    Some(TraversalStrategy::Jump { required_jump_z, .. }) => {
      assert_eq!(*required_jump_z, 0.0);
    }
    other => panic!("expected a jump strategy, got {other:?}"),
  }

  // The way back up was discovered by reversing the drop, and demands an
  // actual jump.
  let ground_node = graph.node(ground).unwrap();
  assert_eq!(ground_node.links().len(), 1);
  let up = &ground_node.links()[0];
  assert_eq!(up.end, ledge);
  assert!(up.reach_flags.contains(ReachFlags::JUMP));
  match &up.strategy {
    Some(TraversalStrategy::Jump { required_jump_z, .. }) => {
      assert_eq!(*required_jump_z, default_jump);
    }
    other => panic!("expected a jump strategy, got {other:?}"),
  }

  check_build_invariants(&graph);
}
