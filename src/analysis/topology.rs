use crate::store::VariableStore;
use std::collections::{HashSet, VecDeque};

/// Dependency adjacency derived from the declared `depends` lists.
/// Names that do not resolve to a variable are dropped here; reporting them
/// is the validator's job.
pub struct DependencyGraph {
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn build(store: &VariableStore) -> Self {
        let count = store.len();
        let mut parents = vec![Vec::new(); count];
        let mut children = vec![Vec::new(); count];

        for (idx, var) in store.iter().enumerate() {
            for dep in &var.depends {
                if let Some(p) = store.index_of(dep) {
                    parents[idx].push(p);
                    children[p].push(idx);
                }
            }
        }
        Self { parents, children }
    }

    pub fn count(&self) -> usize { self.parents.len() }

    pub fn parents(&self, idx: usize) -> &[usize] { &self.parents[idx] }
}

/// Performs a topological sort using depth-first search.
///
/// Returns variable indices where every dependency appears before its
/// consumer, or the index path of the first cycle found.
pub fn sort(graph: &DependencyGraph) -> Result<Vec<usize>, Vec<usize>> {
    let count = graph.count();
    let mut order = Vec::with_capacity(count);
    let mut state = vec![VisitState::None; count];
    let mut path = Vec::new();

    // Iterate every index so disconnected variables are visited too.
    for i in 0..count {
        if state[i] == VisitState::None {
            visit(i, graph, &mut state, &mut path, &mut order)?;
        }
    }
    Ok(order)
}

#[derive(Clone, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

fn visit(
    node: usize,
    graph: &DependencyGraph,
    state: &mut Vec<VisitState>,
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), Vec<usize>> {
    match state[node] {
        VisitState::Visited => return Ok(()),
        VisitState::Visiting => {
            let start = path.iter().position(|&n| n == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Err(cycle);
        }
        VisitState::None => state[node] = VisitState::Visiting,
    }

    path.push(node);
    for &parent in graph.parents(node) {
        visit(parent, graph, state, path, order)?;
    }
    path.pop();

    state[node] = VisitState::Visited;
    order.push(node);
    Ok(())
}

/// Every variable that reads, directly or transitively, one of `start`.
/// The start indices themselves are included.
pub fn downstream_from(graph: &DependencyGraph, start: &[usize]) -> HashSet<usize> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start.to_vec());

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            queue.extend(graph.children[node].iter().copied());
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Department, Variable};

    fn store(vars: Vec<Variable>) -> VariableStore {
        VariableStore::from_variables(vars).unwrap()
    }

    #[test]
    fn test_sort_diamond_dependency() {
        // Shape: A -> B, A -> C, B+C -> D
        let s = store(vec![
            Variable::derived(4, "D", Department::Ocean, 4, "B + C").with_depends(["B", "C"]),
            Variable::derived(2, "B", Department::Ocean, 2, "A").with_depends(["A"]),
            Variable::input(1, "A", Department::Ocean, Some(1.0)),
            Variable::derived(3, "C", Department::Ocean, 3, "A").with_depends(["A"]),
        ]);
        let res = sort(&DependencyGraph::build(&s)).expect("Sort failed");

        let pos = |id: &str| res.iter().position(|&x| x == s.index_of(id).unwrap()).unwrap();
        assert!(pos("A") < pos("B"));
        assert!(pos("A") < pos("C"));
        assert!(pos("B") < pos("D"));
        assert!(pos("C") < pos("D"));
    }

    #[test]
    fn test_cycle_detection() {
        let s = store(vec![
            Variable::derived(1, "A", Department::Ocean, 1, "B").with_depends(["B"]),
            Variable::derived(2, "B", Department::Ocean, 2, "A").with_depends(["A"]),
        ]);
        let cycle = sort(&DependencyGraph::build(&s)).unwrap_err();
        assert_eq!(cycle, vec![0, 1, 0]);
    }

    #[test]
    fn test_downstream() {
        let s = store(vec![
            Variable::input(1, "x", Department::Ocean, Some(1.0)),
            Variable::derived(2, "a", Department::Ocean, 1, "x").with_depends(["x"]),
            Variable::derived(3, "b", Department::Ocean, 2, "a").with_depends(["a"]),
            Variable::derived(4, "c", Department::Ocean, 3, "1"),
        ]);
        let down = downstream_from(&DependencyGraph::build(&s), &[0]);
        assert_eq!(down, HashSet::from([0, 1, 2]));
    }
}
