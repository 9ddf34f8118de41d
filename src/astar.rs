use std::{
  cmp::Reverse,
  collections::{BinaryHeap, HashMap},
  hash::Hash,
};

/// A generic best-first search problem. Used for polygon-level pathing
/// beneath the node graph.
pub(crate) trait SearchProblem {
  /// The state that the search explores.
  type State: Hash + Eq + Clone;

  /// The state the search starts from.
  fn initial_state(&self) -> Self::State;

  /// All states reachable from `state` by one step, with the cost of taking
  /// that step.
  fn successors(&self, state: &Self::State) -> Vec<(f32, Self::State)>;

  /// An estimate of the remaining cost from `state` to a goal. Must be
  /// non-negative, and zero for goal states.
  fn heuristic(&self, state: &Self::State) -> f32;

  /// Whether `state` is a goal state.
  fn is_goal_state(&self, state: &Self::State) -> bool;
}

/// A step along a discovered path.
struct SearchNode<P: SearchProblem> {
  /// The total cost of reaching this state.
  cost: f32,
  /// The state itself.
  state: P::State,
  /// The index of the previous node, or `None` for the initial state.
  previous: Option<usize>,
}

/// A heap entry pointing at a [`SearchNode`]. Ordered by estimate so the heap
/// pops the most promising state first.
struct QueueEntry {
  estimate: f32,
  cost: f32,
  index: usize,
}

impl PartialEq for QueueEntry {
  fn eq(&self, other: &Self) -> bool {
    self.estimate == other.estimate
  }
}
impl Eq for QueueEntry {}

// Floats are only partially ordered, so order in PartialOrd and unwrap in
// Ord. Estimates are never NaN.
#[allow(clippy::non_canonical_partial_ord_impl)]
impl PartialOrd for QueueEntry {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    match self.estimate.partial_cmp(&other.estimate) {
      Some(std::cmp::Ordering::Equal) => {
        Reverse(self.cost).partial_cmp(&Reverse(other.cost))
      }
      ord => ord,
    }
  }
}

impl Ord for QueueEntry {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.partial_cmp(other).unwrap()
  }
}

/// The result of a successful search.
pub(crate) struct SearchPath<State> {
  /// The visited states in order, starting with the initial state and ending
  /// with a goal state.
  pub(crate) states: Vec<State>,
  /// The total cost of the path.
  pub(crate) cost: f32,
}

/// Finds the cheapest path from the initial state of `problem` to one of its
/// goal states. Returns `None` if no goal state is reachable.
pub(crate) fn find_path<P: SearchProblem>(
  problem: &P,
) -> Option<SearchPath<P::State>> {
  let mut nodes = Vec::<SearchNode<P>>::new();
  let mut queue = BinaryHeap::new();
  let mut best_estimates = HashMap::new();

  fn try_enqueue<P: SearchProblem>(
    problem: &P,
    node: SearchNode<P>,
    nodes: &mut Vec<SearchNode<P>>,
    queue: &mut BinaryHeap<Reverse<QueueEntry>>,
    best_estimates: &mut HashMap<P::State, f32>,
  ) {
    let estimate = node.cost + problem.heuristic(&node.state);
    let best =
      best_estimates.entry(node.state.clone()).or_insert(f32::INFINITY);
    if *best <= estimate {
      return;
    }
    *best = estimate;
    queue.push(Reverse(QueueEntry { estimate, cost: node.cost, index: nodes.len() }));
    nodes.push(node);
  }

  try_enqueue(
    problem,
    SearchNode { cost: 0.0, state: problem.initial_state(), previous: None },
    &mut nodes,
    &mut queue,
    &mut best_estimates,
  );

  while let Some(Reverse(entry)) = queue.pop() {
    let current_state = nodes[entry.index].state.clone();
    let current_cost = nodes[entry.index].cost;
    // A better path to this state was already expanded.
    if *best_estimates.get(&current_state).unwrap() < entry.estimate {
      continue;
    }

    if problem.is_goal_state(&current_state) {
      let mut states = Vec::new();
      let mut index = Some(entry.index);
      while let Some(i) = index {
        states.push(nodes[i].state.clone());
        index = nodes[i].previous;
      }
      states.reverse();
      return Some(SearchPath { states, cost: entry.cost });
    }

    let successors = problem.successors(&current_state);
    for (step_cost, state) in successors {
      try_enqueue(
        problem,
        SearchNode {
          cost: current_cost + step_cost,
          state,
          previous: Some(entry.index),
        },
        &mut nodes,
        &mut queue,
        &mut best_estimates,
      );
    }
  }

  None
}

#[cfg(test)]
#[path = "astar_test.rs"]
mod test;
