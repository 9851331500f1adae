//! Department graph handed to the rendering layer.

use crate::flow::aggregate::{AggregatedEdge, FlowKey};
use crate::store::{Department, NId};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

/// Payload of one aggregated graph edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowWeight {
    pub total_value: f64,
    pub variables: Vec<NId>,
}

/// One node per department, one edge per aggregated directed pair.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    graph: DiGraph<Department, FlowWeight>,
}

impl FlowGraph {
    /// Builds the graph from aggregated edges. Every department is present as
    /// a node, whether or not it carries any flow.
    pub fn from_aggregated<'e, 'a: 'e>(edges: impl IntoIterator<Item = &'e AggregatedEdge<'a>>) -> Self {
        let mut graph = DiGraph::with_capacity(Department::ALL.len(), 0);
        for dept in Department::ALL {
            graph.add_node(dept);
        }
        let mut fg = Self { graph };
        for edge in edges {
            let weight = FlowWeight {
                total_value: edge.total_value,
                variables: edge.variables.iter().map(|v| v.n_id).collect(),
            };
            fg.graph.add_edge(Self::node(edge.from), Self::node(edge.to), weight);
        }
        fg
    }

    // Nodes are inserted in `Department::ALL` order, so the index is the discriminant.
    fn node(dept: Department) -> NodeIndex {
        NodeIndex::new(dept as usize)
    }

    pub fn inner(&self) -> &DiGraph<Department, FlowWeight> { &self.graph }

    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn edge_count(&self) -> usize { self.graph.edge_count() }

    pub fn node_index(&self, dept: Department) -> NodeIndex { Self::node(dept) }

    pub fn edge(&self, key: FlowKey) -> Option<&FlowWeight> {
        self.find_edge(key).map(|e| &self.graph[e])
    }

    fn find_edge(&self, key: FlowKey) -> Option<EdgeIndex> {
        self.graph.find_edge(Self::node(key.from), Self::node(key.to))
    }

    /// Sum of every aggregated flow entering `dept`.
    pub fn inflow(&self, dept: Department) -> f64 {
        self.directed_total(dept, Direction::Incoming)
    }

    /// Sum of every aggregated flow leaving `dept`.
    pub fn outflow(&self, dept: Department) -> f64 {
        self.directed_total(dept, Direction::Outgoing)
    }

    fn directed_total(&self, dept: Department, dir: Direction) -> f64 {
        self.graph
            .edges_directed(Self::node(dept), dir)
            .map(|e| e.weight().total_value)
            .sum()
    }

    /// Departments that neither send nor receive any flow.
    pub fn isolated(&self) -> Vec<Department> {
        self.graph
            .node_indices()
            .filter(|&n| self.graph.neighbors_undirected(n).next().is_none())
            .map(|n| self.graph[n])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::aggregate::aggregate_flows;
    use crate::store::Department::*;
    use crate::store::Variable;

    #[test]
    fn test_projection() {
        let vars = vec![
            Variable::input(1, "a", Atmosphere, Some(5.0)).with_flow(Atmosphere, SurfaceWater),
            Variable::input(2, "b", Agriculture, Some(2.0)).with_flow(Agriculture, SurfaceWater),
            Variable::input(3, "c", SurfaceWater, Some(1.5)).with_flow(SurfaceWater, Ocean),
        ];
        let edges = aggregate_flows(&vars);
        let graph = FlowGraph::from_aggregated(edges.values());

        assert_eq!(graph.node_count(), 15);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.inner()[graph.node_index(Ocean)], Ocean);
        assert_eq!(graph.inflow(SurfaceWater), 7.0);
        assert_eq!(graph.outflow(SurfaceWater), 1.5);
        assert_eq!(graph.edge(FlowKey::new(Atmosphere, SurfaceWater)).unwrap().variables, vec![NId(1)]);
        assert!(graph.edge(FlowKey::new(SurfaceWater, Atmosphere)).is_none());
        assert_eq!(graph.isolated().len(), 11);
    }
}
