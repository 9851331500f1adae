//! Projects evaluated flow variables onto department-to-department edges.
pub mod aggregate;
pub mod graph;
pub mod parallel;

pub use aggregate::{aggregate_flows, AggregatedEdge, FlowKey};
pub use graph::{FlowGraph, FlowWeight};
pub use parallel::{multi_edge_pairs, parallel_edges, ParallelEdge};
