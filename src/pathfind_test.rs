use glam::Vec3;

use crate::{
  jump::MeshCollisionWorld,
  mesh::{PolyMesh, ValidPolyMesh},
  node::NodeId,
  pathfind::{has_reached_target, FindBestPathError, RouteCacheItem},
  poi::PointOfInterest,
  FindBestPathOptions, NavAgent, NavAgentProperties, NavGraph,
  NavGraphSettings, NodeEvaluator,
};

/// Rates only the node under `goal` as a destination, and appends the
/// exact goal location as the final route step.
struct GoalEvaluator {
  goal: Vec3,
  goal_node: Option<NodeId>,
}

impl GoalEvaluator {
  fn new(goal: Vec3) -> Self {
    Self { goal, goal_node: None }
  }
}

impl NodeEvaluator for GoalEvaluator {
  fn init(&mut self, graph: &NavGraph, _agent: &NavAgent) -> bool {
    let extent = Vec3::new(50.0, 50.0, 100.0);
    self.goal_node = graph
      .mesh()
      .and_then(|mesh| mesh.nearest_poly(self.goal, extent))
      .and_then(|poly| graph.node_for_poly(poly));
    self.goal_node.is_some()
  }

  fn eval(
    &mut self,
    _graph: &NavGraph,
    node: NodeId,
    _entry_location: Vec3,
    _total_distance: i32,
  ) -> f32 {
    if Some(node) == self.goal_node {
      2.0
    } else {
      0.0
    }
  }

  fn route_goal(&mut self) -> Option<RouteCacheItem> {
    Some(RouteCacheItem::to_location(self.goal))
  }
}

fn agent_at(position: Vec3) -> NavAgent {
  NavAgent::new(
    NavAgentProperties {
      radius: 30.0,
      height: 80.0,
      can_jump: true,
      can_crouch: false,
    },
    position,
  )
}

fn grid_mesh(width: usize, depth: usize) -> ValidPolyMesh {
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
  PolyMesh { vertices, polygons, clearances: vec![] }
    .validate()
    .expect("grid mesh is valid")
}

fn build(graph: &mut NavGraph) {
  let mesh = graph.mesh.clone().expect("a mesh is installed");
  let world = MeshCollisionWorld::new(&mesh, &graph.settings);
  graph.build_all(&world);
  assert!(graph.is_built());
}

#[test]
fn queries_against_an_unbuilt_graph_fail() {
  let graph = NavGraph::new(NavGraphSettings::default());
  let result = graph.find_best_path(
    &agent_at(Vec3::ZERO),
    &mut GoalEvaluator::new(Vec3::ZERO),
    &FindBestPathOptions::default(),
  );
  assert_eq!(result.unwrap_err(), FindBestPathError::GraphNotBuilt);
}

#[test]
fn a_start_far_off_the_mesh_fails_to_anchor() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(1, 1));
  build(&mut graph);

  let result = graph.find_best_path(
    &agent_at(Vec3::new(5000.0, 0.0, 0.0)),
    &mut GoalEvaluator::new(Vec3::new(50.0, 50.0, 0.0)),
    &FindBestPathOptions::default(),
  );
  assert_eq!(result.unwrap_err(), FindBestPathError::StartNotOnMesh);
}

#[test]
fn a_goal_in_the_start_node_routes_straight_to_it() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(2, 2));
  build(&mut graph);
  assert_eq!(graph.node_count(), 1);
  let (node_id, _) = graph.nodes().next().unwrap();

  let agent = agent_at(Vec3::new(20.0, 20.0, 0.0));
  let goal = Vec3::new(80.0, 80.0, 0.0);
  let path = graph
    .find_best_path(
      &agent,
      &mut GoalEvaluator::new(goal),
      &FindBestPathOptions::default(),
    )
    .expect("the goal shares the agent's node");

  assert_eq!(path.weight, 2.0);
  assert_eq!(path.route.len(), 2);
  assert_eq!(path.route[0].node, Some(node_id));
  assert!(!path.route[0].direct);
  assert!(path.route[1].direct);
  assert_eq!(path.route[1].location, goal);

  let mut arrived = agent.clone();
  arrived.position = goal;
  assert!(has_reached_target(&graph, &arrived, &path.route[1]));
  assert!(!has_reached_target(&graph, &agent, &path.route[1]));
}

/// A ground strip and a raised ledge connected only by a discovered jump.
fn ledge_graph() -> NavGraph {
  let mut graph = NavGraph::new(NavGraphSettings {
    jump_facing_dot: 0.55,
    ..Default::default()
  });
  graph.set_mesh(
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
    .expect("ledge mesh is valid"),
  );
  build(&mut graph);
  graph
}

#[test]
fn jump_links_gate_on_the_agent_capabilities() {
  let graph = ledge_graph();
  let refs = graph.mesh().unwrap().poly_refs().collect::<Vec<_>>();
  let ledge = graph.node_for_poly(refs[1]).unwrap();

  let start = Vec3::new(-150.0, 50.0, 0.0);
  let goal = Vec3::new(100.0, 250.0, 100.0);

  let path = graph
    .find_best_path(
      &agent_at(start),
      &mut GoalEvaluator::new(goal),
      &FindBestPathOptions::default(),
    )
    .expect("a capable agent can jump up");
  assert_eq!(path.route.len(), 2);
  assert_eq!(path.route[0].node, Some(ledge));
  assert!(path.route[1].direct);

  // Too weak a jump, or none at all, and the ledge is unreachable.
  let mut weak = agent_at(start);
  weak.max_jump_z = 300.0;
  let result = graph.find_best_path(
    &weak,
    &mut GoalEvaluator::new(goal),
    &FindBestPathOptions::default(),
  );
  assert_eq!(result.unwrap_err(), FindBestPathError::NoAcceptableNode);

  let grounded = NavAgent::new(
    NavAgentProperties { can_jump: false, ..agent_at(start).properties },
    start,
  );
  let result = graph.find_best_path(
    &grounded,
    &mut GoalEvaluator::new(goal),
    &FindBestPathOptions::default(),
  );
  assert_eq!(result.unwrap_err(), FindBestPathError::NoAcceptableNode);
}

#[test]
fn riding_a_platform_anchors_along_its_velocity() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(1, 1));
  build(&mut graph);

  // The agent hangs in the air off the polygon, but the platform carries
  // it toward the mesh.
  let mut rider = agent_at(Vec3::new(300.0, 50.0, 0.0));
  rider.base_velocity = Vec3::new(-400.0, 0.0, 0.0);
  let path = graph
    .find_best_path(
      &rider,
      &mut GoalEvaluator::new(Vec3::new(50.0, 50.0, 0.0)),
      &FindBestPathOptions::default(),
    )
    .expect("the platform resolves the start polygon");
  // Anchoring was loose, so reaching the start node is a real step.
  assert_eq!(path.route.len(), 2);
  assert!(path.route[0].node.is_some());

  let mut falling = agent_at(Vec3::new(300.0, 50.0, 0.0));
  falling.base_velocity = Vec3::ZERO;
  let result = graph.find_best_path(
    &falling,
    &mut GoalEvaluator::new(Vec3::new(50.0, 50.0, 0.0)),
    &FindBestPathOptions::default(),
  );
  assert_eq!(result.unwrap_err(), FindBestPathError::StartNotOnMesh);
}

struct Pickup(Vec3);

impl PointOfInterest for Pickup {
  fn location(&self) -> Vec3 {
    self.0
  }

  fn is_active_detour(&self) -> bool {
    true
  }
}

#[test]
fn an_active_pickup_ahead_becomes_a_detour() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  let pickup =
    graph.register_poi(Box::new(Pickup(Vec3::new(60.0, 50.0, 0.0))));
  graph.set_mesh(grid_mesh(2, 2));
  build(&mut graph);

  let agent = agent_at(Vec3::new(20.0, 50.0, 0.0));
  let path = graph
    .find_best_path(
      &agent,
      &mut GoalEvaluator::new(Vec3::new(180.0, 50.0, 0.0)),
      &FindBestPathOptions::default(),
    )
    .expect("the route resolves");

  assert_eq!(path.route.len(), 3);
  assert_eq!(path.route[0].actor, Some(pickup));
  assert_eq!(path.route[0].location, Vec3::new(60.0, 50.0, 0.0));
  assert!(path.route[1].node.is_some());

  // With detours disabled the pickup is ignored.
  let path = graph
    .find_best_path(
      &agent,
      &mut GoalEvaluator::new(Vec3::new(180.0, 50.0, 0.0)),
      &FindBestPathOptions { allow_detours: false, ..Default::default() },
    )
    .expect("the route resolves");
  assert_eq!(path.route.len(), 2);
  assert_eq!(path.route[0].actor, None);
}

#[test]
fn node_targets_are_reached_anywhere_inside_the_node() {
  let mut graph = NavGraph::new(NavGraphSettings::default());
  graph.set_mesh(grid_mesh(2, 2));
  build(&mut graph);
  let refs = graph.mesh().unwrap().poly_refs().collect::<Vec<_>>();
  let (node_id, _) = graph.nodes().next().unwrap();

  // Standing on a different polygon of the target node still counts.
  let agent = agent_at(Vec3::new(150.0, 150.0, 0.0));
  let target = RouteCacheItem {
    node: Some(node_id),
    actor: None,
    location: Vec3::new(50.0, 50.0, 0.0),
    target_poly: Some(refs[0]),
    direct: false,
  };
  assert!(has_reached_target(&graph, &agent, &target));

  // A direct target at the same location is a plain overlap test and is
  // still out of reach.
  let direct = RouteCacheItem::to_location(Vec3::new(50.0, 50.0, 0.0));
  assert!(!has_reached_target(&graph, &agent, &direct));
}
