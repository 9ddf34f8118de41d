use std::{
  collections::HashMap,
  sync::atomic::{AtomicU32, Ordering},
};

use disjoint::DisjointSet;
use glam::{Vec3, Vec3Swizzles};
use kdtree::{distance::squared_euclidean, KdTree};
use thiserror::Error;

use crate::{
  astar::{self, SearchProblem},
  geometry::{exit_edge_2d, height_on_triangle, point_in_poly_2d},
  util::BoundingBox,
  NavAgentProperties,
};

/// An opaque reference to a polygon of a [`ValidPolyMesh`].
///
/// References encode the generation of the mesh they came from, so a
/// reference held across a mesh rebuild resolves to nothing instead of
/// aliasing an unrelated polygon. Only equality is meaningful to users.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct PolyRef(u64);

impl PolyRef {
  pub(crate) fn new(generation: u32, index: usize) -> Self {
    Self(((generation as u64) << 32) | index as u64)
  }

  fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }

  fn index(self) -> usize {
    (self.0 & 0xffff_ffff) as usize
  }
}

/// Each validated mesh gets a distinct generation so stale [`PolyRef`]s can
/// be rejected.
static NEXT_MESH_GENERATION: AtomicU32 = AtomicU32::new(1);

/// A walkable polygon mesh, as handed over by an external mesh generator.
#[derive(Clone, Debug)]
pub struct PolyMesh {
  /// The vertices that make up the polygons.
  pub vertices: Vec<Vec3>,
  /// The polygons of the mesh as indices into `vertices`. Polygons must be
  /// convex and wound counterclockwise (right hand rule, Z up).
  pub polygons: Vec<Vec<usize>>,
  /// The vertical clearance above each polygon. May be empty, in which case
  /// every polygon is treated as unbounded above. Otherwise must have the
  /// same length as `polygons`.
  pub clearances: Vec<f32>,
}

/// An error when validating a polygon mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  /// Stores the number of polygons and the number of clearances.
  #[error("There are {0} polygons, but {1} clearances.")]
  ClearancesHaveWrongLength(usize, usize),
  /// Stores the index of the polygon.
  #[error(
    "The polygon at index {0} is concave or has edges in clockwise order."
  )]
  ConcavePolygon(usize),
  /// Stores the index of the polygon.
  #[error("The polygon at index {0} does not have at least 3 vertices.")]
  NotEnoughVerticesInPolygon(usize),
  /// Stores the index of the polygon.
  #[error("The polygon at index {0} references an out-of-bounds vertex.")]
  InvalidVertexIndexInPolygon(usize),
  /// Stores the index of the polygon.
  #[error("The polygon at index {0} contains a degenerate edge (an edge with zero length).")]
  DegenerateEdgeInPolygon(usize),
  /// Stores the indices of the two vertices that make up the edge.
  #[error(
    "The edge made from vertices {0} and {1} is used by more than two polygons."
  )]
  DoublyConnectedEdge(usize, usize),
}

impl PolyMesh {
  /// Ensures required invariants of the mesh, and computes the derived data
  /// (connectivity, regions, bounds, the poly-center index) needed by the
  /// query facade. Returns an error if the mesh is invalid in some way.
  pub fn validate(mut self) -> Result<ValidPolyMesh, ValidationError> {
    if !self.clearances.is_empty()
      && self.clearances.len() != self.polygons.len()
    {
      return Err(ValidationError::ClearancesHaveWrongLength(
        self.polygons.len(),
        self.clearances.len(),
      ));
    }

    let vertices = self.vertices;

    let mesh_bounds = vertices
      .iter()
      .fold(BoundingBox::Empty, |acc, &vertex| acc.expand_to_point(vertex));

    let mut region_sets = DisjointSet::with_len(self.polygons.len());

    enum ConnectivityState {
      Disconnected,
      Boundary {
        polygon: usize,
        edge: usize,
      },
      Connected {
        polygon_1: usize,
        edge_1: usize,
        polygon_2: usize,
        edge_2: usize,
      },
    }
    let mut connectivity_set = HashMap::new();

    for (polygon_index, polygon) in self.polygons.iter().enumerate() {
      if polygon.len() < 3 {
        return Err(ValidationError::NotEnoughVerticesInPolygon(polygon_index));
      }

      for vertex_index in polygon {
        if *vertex_index >= vertices.len() {
          return Err(ValidationError::InvalidVertexIndexInPolygon(
            polygon_index,
          ));
        }
      }

      // A repeated consecutive vertex would also trip the winding check
      // below, so classify it as the degenerate edge it is first.
      for i in 0..polygon.len() {
        let next = polygon[if i == polygon.len() - 1 { 0 } else { i + 1 }];
        if polygon[i] == next {
          return Err(ValidationError::DegenerateEdgeInPolygon(polygon_index));
        }
      }

      for i in 0..polygon.len() {
        let left_vertex =
          polygon[if i == 0 { polygon.len() - 1 } else { i - 1 }];
        let center_vertex = polygon[i];
        let right_vertex =
          polygon[if i == polygon.len() - 1 { 0 } else { i + 1 }];

        // Derive connectivity for the edge.

        let edge = if center_vertex < right_vertex {
          (center_vertex, right_vertex)
        } else {
          (right_vertex, center_vertex)
        };

        let state = connectivity_set
          .entry(edge)
          .or_insert(ConnectivityState::Disconnected);
        match state {
          ConnectivityState::Disconnected => {
            *state =
              ConnectivityState::Boundary { polygon: polygon_index, edge: i };
          }
          &mut ConnectivityState::Boundary {
            polygon: polygon_1,
            edge: edge_1,
            ..
          } => {
            *state = ConnectivityState::Connected {
              polygon_1,
              edge_1,
              polygon_2: polygon_index,
              edge_2: i,
            };
            region_sets.join(polygon_1, polygon_index);
          }
          ConnectivityState::Connected { .. } => {
            return Err(ValidationError::DoublyConnectedEdge(edge.0, edge.1));
          }
        }

        // Check if the vertex is concave.

        let left_vertex = vertices[left_vertex].xy();
        let center_vertex = vertices[center_vertex].xy();
        let right_vertex = vertices[right_vertex].xy();

        let left_edge = left_vertex - center_vertex;
        let right_edge = right_vertex - center_vertex;

        match right_edge.perp_dot(left_edge).partial_cmp(&0.0) {
          Some(std::cmp::Ordering::Greater) => {}
          Some(std::cmp::Ordering::Equal)
            if right_edge.dot(left_edge) < 0.0 => {}
          _ => return Err(ValidationError::ConcavePolygon(polygon_index)),
        }
      }
    }

    let mut region_to_normalized_region = HashMap::new();

    let mut polys = self
      .polygons
      .drain(..)
      .enumerate()
      .map(|(polygon_index, polygon_vertices)| ValidPoly {
        bounds: polygon_vertices
          .iter()
          .fold(BoundingBox::Empty, |bounds, vertex| {
            bounds.expand_to_point(vertices[*vertex])
          }),
        center: polygon_vertices.iter().map(|i| vertices[*i]).sum::<Vec3>()
          / polygon_vertices.len() as f32,
        connectivity: vec![None; polygon_vertices.len()],
        clearance: if self.clearances.is_empty() {
          f32::INFINITY
        } else {
          self.clearances[polygon_index]
        },
        region: {
          let region = region_sets.root_of(polygon_index);
          let new_normalized_region = region_to_normalized_region.len();
          *region_to_normalized_region
            .entry(region)
            .or_insert_with(|| new_normalized_region)
        },
        vertices: polygon_vertices,
      })
      .collect::<Vec<_>>();

    let mut boundary_edges = Vec::new();
    for connectivity_state in connectivity_set.values() {
      match connectivity_state {
        ConnectivityState::Disconnected => panic!("Value is never stored"),
        &ConnectivityState::Boundary { polygon, edge } => {
          boundary_edges
            .push(MeshEdgeRef { polygon_index: polygon, edge_index: edge });
        }
        &ConnectivityState::Connected {
          polygon_1,
          edge_1,
          polygon_2,
          edge_2,
        } => {
          let edge = polys[polygon_1].edge_indices(edge_1);
          let edge_center = (vertices[edge.0] + vertices[edge.1]) / 2.0;
          let travel_distances = (
            polys[polygon_1].center.distance(edge_center),
            polys[polygon_2].center.distance(edge_center),
          );
          polys[polygon_1].connectivity[edge_1] = Some(PolyConnection {
            polygon_index: polygon_2,
            travel_distances,
          });
          polys[polygon_2].connectivity[edge_2] = Some(PolyConnection {
            polygon_index: polygon_1,
            travel_distances: (travel_distances.1, travel_distances.0),
          });
        }
      }
    }

    let mut center_index = KdTree::new(/* dimensions= */ 2);
    for (polygon_index, poly) in polys.iter().enumerate() {
      center_index
        .add([poly.center.x, poly.center.y], polygon_index)
        .expect("Poly center is finite");
    }

    Ok(ValidPolyMesh {
      generation: NEXT_MESH_GENERATION.fetch_add(1, Ordering::Relaxed),
      mesh_bounds,
      vertices,
      polys,
      boundary_edges,
      center_index,
    })
  }
}

/// A polygon mesh which has been validated, with derived query data.
pub struct ValidPolyMesh {
  /// The generation baked into this mesh's [`PolyRef`]s.
  generation: u32,
  /// A tight bounding box around the mesh vertices.
  mesh_bounds: BoundingBox,
  /// The vertices that make up the polygons.
  pub(crate) vertices: Vec<Vec3>,
  /// The polygons of the mesh.
  pub(crate) polys: Vec<ValidPoly>,
  /// The boundary edges of the mesh (edges with no neighbouring polygon).
  pub(crate) boundary_edges: Vec<MeshEdgeRef>,
  /// A 2D index of polygon centers, for radius queries.
  center_index: KdTree<f32, usize, [f32; 2]>,
}

/// A valid polygon, indexing the `vertices` of its [`ValidPolyMesh`].
#[derive(PartialEq, Debug, Clone)]
pub(crate) struct ValidPoly {
  /// The vertices of the polygon.
  pub(crate) vertices: Vec<usize>,
  /// The connectivity of each edge of the polygon. `None` entries are
  /// boundary edges ("walls").
  pub(crate) connectivity: Vec<Option<PolyConnection>>,
  /// The connected region this polygon belongs to. Two polygons with equal
  /// regions are connected by some walkable polygon path.
  pub(crate) region: usize,
  /// The vertical clearance above the polygon surface.
  pub(crate) clearance: f32,
  /// The bounding box of the polygon.
  pub(crate) bounds: BoundingBox,
  /// The average of the polygon's vertices.
  pub(crate) center: Vec3,
}

/// A connection between two polygons across an edge.
#[derive(PartialEq, Debug, Clone)]
pub(crate) struct PolyConnection {
  /// The index of the polygon this edge leads to.
  pub(crate) polygon_index: usize,
  /// The distance travelled across the source polygon to the edge, and from
  /// the edge across the destination polygon.
  pub(crate) travel_distances: (f32, f32),
}

/// A reference to an edge of a polygon.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub(crate) struct MeshEdgeRef {
  /// The index of the polygon that this edge belongs to.
  pub(crate) polygon_index: usize,
  /// The index of the edge within the polygon.
  pub(crate) edge_index: usize,
}

impl ValidPoly {
  /// Determines the vertex indices corresponding to `edge`.
  pub(crate) fn edge_indices(&self, edge: usize) -> (usize, usize) {
    (
      self.vertices[edge],
      self.vertices[if edge == self.vertices.len() - 1 { 0 } else { edge + 1 }],
    )
  }
}

/// The result of a 2D raycast across the mesh.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Raycast2D {
  /// The fraction of the ray that was traversed before hitting a wall.
  /// A value of 1.0 or more means the ray was unobstructed.
  pub t: f32,
  /// The polygon the ray ended in (the terminal polygon if unobstructed,
  /// otherwise the polygon whose wall was hit).
  pub end_poly: PolyRef,
}

impl Raycast2D {
  /// Whether the ray reached its end point unobstructed.
  pub fn is_clear(&self) -> bool {
    self.t >= 1.0
  }
}

impl ValidPolyMesh {
  /// Returns the bounds of the mesh.
  pub fn bounds(&self) -> BoundingBox {
    self.mesh_bounds
  }

  /// The number of polygons in the mesh.
  pub fn poly_count(&self) -> usize {
    self.polys.len()
  }

  /// Iterates over references to every polygon of the mesh.
  pub fn poly_refs(&self) -> impl Iterator<Item = PolyRef> + '_ {
    (0..self.polys.len()).map(|index| PolyRef::new(self.generation, index))
  }

  pub(crate) fn poly_ref_at(&self, index: usize) -> PolyRef {
    PolyRef::new(self.generation, index)
  }

  /// Resolves `poly` to its polygon index. Fails for references from another
  /// mesh generation.
  pub(crate) fn resolve(&self, poly: PolyRef) -> Option<usize> {
    (poly.generation() == self.generation && poly.index() < self.polys.len())
      .then(|| poly.index())
  }

  /// The average of the polygon's vertices. This can be off the surface on
  /// sloped polygons; see [`Self::poly_surface_center`].
  pub fn poly_center(&self, poly: PolyRef) -> Option<Vec3> {
    self.resolve(poly).map(|index| self.polys[index].center)
  }

  /// The XY center of the polygon's bounds, projected onto the polygon
  /// surface height.
  pub fn poly_surface_center(&self, poly: PolyRef) -> Option<Vec3> {
    let index = self.resolve(poly)?;
    let poly = &self.polys[index];
    let center_2d = poly.bounds.center().expect("polygon is non-empty").xy();
    for i in 2..poly.vertices.len() {
      let triangle = (
        self.vertices[poly.vertices[0]],
        self.vertices[poly.vertices[i - 1]],
        self.vertices[poly.vertices[i]],
      );
      if point_in_poly_2d(
        center_2d,
        &[triangle.0.xy(), triangle.1.xy(), triangle.2.xy()],
      ) {
        return Some(center_2d.extend(height_on_triangle(triangle, center_2d)));
      }
    }
    Some(center_2d.extend(poly.center.z))
  }

  /// The world-space vertices of the polygon.
  pub fn poly_vertices(&self, poly: PolyRef) -> Option<Vec<Vec3>> {
    let index = self.resolve(poly)?;
    Some(
      self.polys[index]
        .vertices
        .iter()
        .map(|&vertex| self.vertices[vertex])
        .collect(),
    )
  }

  /// The bounding box of the polygon.
  pub fn poly_bounds(&self, poly: PolyRef) -> Option<BoundingBox> {
    self.resolve(poly).map(|index| self.polys[index].bounds)
  }

  /// The vertical clearance above the polygon.
  pub fn poly_clearance(&self, poly: PolyRef) -> Option<f32> {
    self.resolve(poly).map(|index| self.polys[index].clearance)
  }

  /// The boundary edges ("walls") of the polygon, as world-space segments.
  /// These are candidate jump launch edges.
  pub fn poly_walls(&self, poly: PolyRef) -> Vec<(Vec3, Vec3)> {
    let Some(index) = self.resolve(poly) else {
      return Vec::new();
    };
    let poly = &self.polys[index];
    poly
      .connectivity
      .iter()
      .enumerate()
      .filter(|(_, connection)| connection.is_none())
      .map(|(edge, _)| {
        let (a, b) = poly.edge_indices(edge);
        (self.vertices[a], self.vertices[b])
      })
      .collect()
  }

  /// The polygons sharing an edge with `poly`.
  pub fn adjacent_polys(&self, poly: PolyRef) -> Vec<PolyRef> {
    let Some(index) = self.resolve(poly) else {
      return Vec::new();
    };
    self.polys[index]
      .connectivity
      .iter()
      .flatten()
      .map(|connection| self.poly_ref_at(connection.polygon_index))
      .collect()
  }

  /// Finds the polygon nearest to `point`, searching within `extent` of it
  /// on each axis. Returns `None` if no polygon is near enough.
  pub fn nearest_poly(&self, point: Vec3, extent: Vec3) -> Option<PolyRef> {
    let sample_box =
      BoundingBox::new_box(point, point).expand_by_size(extent.max(Vec3::ONE * 1e-3));

    let mut best: Option<(usize, f32)> = None;
    for (polygon_index, poly) in self.polys.iter().enumerate() {
      if !sample_box.intersects_bounds(&poly.bounds) {
        continue;
      }
      for i in 2..poly.vertices.len() {
        let triangle = (
          self.vertices[poly.vertices[0]],
          self.vertices[poly.vertices[i - 1]],
          self.vertices[poly.vertices[i]],
        );
        let projected = project_to_triangle(triangle, point);
        if !sample_box.contains_point(projected) {
          continue;
        }
        let distance = point.distance_squared(projected);
        match best {
          Some((_, best_distance)) if best_distance <= distance => {}
          _ => best = Some((polygon_index, distance)),
        }
      }
    }

    best.map(|(polygon_index, _)| self.poly_ref_at(polygon_index))
  }

  /// Finds every polygon whose bounds intersect the box around `center`
  /// expanded by `extent`.
  pub fn polys_in_box(&self, center: Vec3, extent: Vec3) -> Vec<PolyRef> {
    let query =
      BoundingBox::new_box(center, center).expand_by_size(extent);
    self
      .polys
      .iter()
      .enumerate()
      .filter(|(_, poly)| query.intersects_bounds(&poly.bounds))
      .map(|(polygon_index, _)| self.poly_ref_at(polygon_index))
      .collect()
  }

  /// Finds every polygon whose center is within `radius` of `center` when
  /// viewed from above.
  pub fn polys_within_2d(&self, center: Vec3, radius: f32) -> Vec<PolyRef> {
    self
      .center_index
      .within(&[center.x, center.y], radius * radius, &squared_euclidean)
      .map(|found| {
        found
          .into_iter()
          .map(|(_, &polygon_index)| self.poly_ref_at(polygon_index))
          .collect()
      })
      .unwrap_or_default()
  }

  /// Casts a 2D ray across the mesh from `start` (in `start_poly`) towards
  /// `end`, walking polygon adjacency. Returns `None` for a stale
  /// `start_poly`. Note this ignores height entirely; see
  /// [`Self::raycast_with_z_check`] for multi-layer geometry.
  pub fn raycast_2d(
    &self,
    start_poly: PolyRef,
    start: Vec3,
    end: Vec3,
  ) -> Option<Raycast2D> {
    let mut current = self.resolve(start_poly)?;

    let start_2d = start.xy();
    let end_2d = end.xy();
    let direction = end_2d - start_2d;
    if direction.length_squared() < 1e-10 {
      return Some(Raycast2D { t: 1.0, end_poly: self.poly_ref_at(current) });
    }

    let mut scratch = Vec::new();
    for _ in 0..=self.polys.len() {
      let poly = &self.polys[current];
      scratch.clear();
      scratch
        .extend(poly.vertices.iter().map(|&vertex| self.vertices[vertex].xy()));

      if point_in_poly_2d(end_2d, &scratch) {
        return Some(Raycast2D { t: 1.0, end_poly: self.poly_ref_at(current) });
      }

      let Some((exit_edge, exit_t)) = exit_edge_2d(&scratch, start_2d, direction)
      else {
        break;
      };
      if exit_t >= 1.0 {
        // The segment ends inside this polygon.
        return Some(Raycast2D { t: 1.0, end_poly: self.poly_ref_at(current) });
      }
      match &poly.connectivity[exit_edge] {
        Some(connection) => current = connection.polygon_index,
        None => {
          return Some(Raycast2D {
            t: exit_t.clamp(0.0, 1.0),
            end_poly: self.poly_ref_at(current),
          });
        }
      }
    }

    // Degenerate geometry made the walk loop; report the ray as blocked.
    Some(Raycast2D { t: 0.0, end_poly: self.poly_ref_at(current) })
  }

  /// Like [`Self::raycast_2d`], but only reports the ray clear when the
  /// terminal polygon is also the polygon geometrically expected at `end`
  /// and its surface lies within `z_extent` of the ray's height window. The
  /// plain 2D test can false-negative on stacked walkable layers.
  pub fn raycast_with_z_check(
    &self,
    start_poly: PolyRef,
    start: Vec3,
    end: Vec3,
    z_extent: f32,
  ) -> bool {
    let Some(result) = self.raycast_2d(start_poly, start, end) else {
      return false;
    };
    if !result.is_clear() {
      return false;
    }
    let Some(end_center) = self.poly_center(result.end_poly) else {
      return false;
    };
    let z_min = start.z.min(end.z) - z_extent;
    let z_max = start.z.max(end.z) + z_extent;
    if end_center.z < z_min || end_center.z > z_max {
      return false;
    }
    match self.nearest_poly(end, Vec3::new(z_extent, z_extent, z_extent)) {
      Some(expected) => expected == result.end_poly,
      None => false,
    }
  }

  /// The traversable capsule of the edge at `edge_index` of the polygon at
  /// `polygon_index`: half the edge length as radius, the smaller clearance
  /// of the two polygons as height.
  pub(crate) fn edge_capsule(
    &self,
    polygon_index: usize,
    edge_index: usize,
  ) -> (f32, f32) {
    let poly = &self.polys[polygon_index];
    let (a, b) = poly.edge_indices(edge_index);
    let radius = self.vertices[a].distance(self.vertices[b]) * 0.5;
    let height = match &poly.connectivity[edge_index] {
      Some(connection) => {
        poly.clearance.min(self.polys[connection.polygon_index].clearance)
      }
      None => poly.clearance,
    };
    (radius, height)
  }

  /// Finds the shortest polygon-level path from `start` to `target` for an
  /// agent of the given properties, rejecting edges the agent cannot fit
  /// through. Returns the ordered polygon list including both endpoints.
  pub fn find_poly_path(
    &self,
    start: PolyRef,
    agent: &NavAgentProperties,
    target: PolyRef,
  ) -> Option<Vec<PolyRef>> {
    self.find_poly_path_internal(start, agent, target).map(|path| {
      path.states.into_iter().map(|index| self.poly_ref_at(index)).collect()
    })
  }

  /// Like [`Self::find_poly_path`], but reports only the path cost.
  pub fn find_poly_path_cost(
    &self,
    start: PolyRef,
    agent: &NavAgentProperties,
    target: PolyRef,
  ) -> Option<f32> {
    self.find_poly_path_internal(start, agent, target).map(|path| path.cost)
  }

  fn find_poly_path_internal(
    &self,
    start: PolyRef,
    agent: &NavAgentProperties,
    target: PolyRef,
  ) -> Option<astar::SearchPath<usize>> {
    let start = self.resolve(start)?;
    let target = self.resolve(target)?;
    if self.polys[start].region != self.polys[target].region {
      return None;
    }

    struct PolyPathProblem<'a> {
      mesh: &'a ValidPolyMesh,
      agent: &'a NavAgentProperties,
      start: usize,
      target: usize,
    }

    impl SearchProblem for PolyPathProblem<'_> {
      type State = usize;

      fn initial_state(&self) -> usize {
        self.start
      }

      fn successors(&self, state: &usize) -> Vec<(f32, usize)> {
        let poly = &self.mesh.polys[*state];
        poly
          .connectivity
          .iter()
          .enumerate()
          .filter_map(|(edge_index, connection)| {
            let connection = connection.as_ref()?;
            let (radius, height) = self.mesh.edge_capsule(*state, edge_index);
            if radius * 2.0 < self.agent.radius || height < self.agent.height {
              return None;
            }
            Some((
              connection.travel_distances.0 + connection.travel_distances.1,
              connection.polygon_index,
            ))
          })
          .collect()
      }

      fn heuristic(&self, state: &usize) -> f32 {
        self.mesh.polys[*state]
          .center
          .distance(self.mesh.polys[self.target].center)
      }

      fn is_goal_state(&self, state: &usize) -> bool {
        *state == self.target
      }
    }

    astar::find_path(&PolyPathProblem { mesh: self, agent, start, target })
  }
}

fn project_to_triangle(triangle: (Vec3, Vec3, Vec3), point: Vec3) -> Vec3 {
  let triangle_deltas = (
    triangle.1 - triangle.0,
    triangle.2 - triangle.1,
    triangle.0 - triangle.2,
  );
  let triangle_deltas_flat = (
    triangle_deltas.0.xy(),
    triangle_deltas.1.xy(),
    triangle_deltas.2.xy(),
  );

  if triangle_deltas_flat.0.perp_dot(point.xy() - triangle.0.xy()) < 0.0 {
    let s = triangle_deltas_flat.0.dot(point.xy() - triangle.0.xy())
      / triangle_deltas_flat.0.length_squared();
    return triangle_deltas.0 * s.clamp(0.0, 1.0) + triangle.0;
  }
  if triangle_deltas_flat.1.perp_dot(point.xy() - triangle.1.xy()) < 0.0 {
    let s = triangle_deltas_flat.1.dot(point.xy() - triangle.1.xy())
      / triangle_deltas_flat.1.length_squared();
    return triangle_deltas.1 * s.clamp(0.0, 1.0) + triangle.1;
  }
  if triangle_deltas_flat.2.perp_dot(point.xy() - triangle.2.xy()) < 0.0 {
    let s = triangle_deltas_flat.2.dot(point.xy() - triangle.2.xy())
      / triangle_deltas_flat.2.length_squared();
    return triangle_deltas.2 * s.clamp(0.0, 1.0) + triangle.2;
  }

  let normal = -triangle_deltas.0.cross(triangle_deltas.2).normalize();
  let height = normal.dot(point - triangle.0) / normal.z;
  Vec3::new(point.x, point.y, point.z - height)
}

#[cfg(test)]
#[path = "mesh_test.rs"]
mod test;
