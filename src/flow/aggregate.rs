//! Folds flow variables into one edge per directed department pair.

use crate::store::{Department, FlowEndpoints, Variable};
use serde::Serialize;
use std::collections::BTreeMap;

/// Directed department pair. `a -> b` and `b -> a` are different keys.
pub type FlowKey = FlowEndpoints;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEdge<'a> {
    pub from: Department,
    pub to: Department,
    pub total_value: f64,
    /// Contributing variables in input order.
    pub variables: Vec<&'a Variable>,
}

impl<'a> AggregatedEdge<'a> {
    fn empty(key: FlowKey) -> Self {
        Self { from: key.from, to: key.to, total_value: 0.0, variables: Vec::new() }
    }

    pub fn key(&self) -> FlowKey {
        FlowEndpoints::new(self.from, self.to)
    }

    pub fn variable_count(&self) -> usize { self.variables.len() }

    pub fn is_loop(&self) -> bool { self.from == self.to }
}

/// Groups every valued flow variable by its directed department pair.
///
/// Variables without endpoints or without a value are ignored, so no group
/// ever holds zero contributors. Self-loops form their own group. Keys are
/// ordered by department declaration order.
pub fn aggregate_flows<'a, I>(variables: I) -> BTreeMap<FlowKey, AggregatedEdge<'a>>
where
    I: IntoIterator<Item = &'a Variable>,
{
    let mut edges: BTreeMap<FlowKey, AggregatedEdge<'a>> = BTreeMap::new();
    for var in variables {
        let (Some(key), Some(value)) = (var.flow, var.value) else {
            continue;
        };
        let edge = edges.entry(key).or_insert_with(|| AggregatedEdge::empty(key));
        edge.total_value += value;
        edge.variables.push(var);
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Department::*;

    fn flow(n_id: u32, from: Department, to: Department, value: Option<f64>) -> Variable {
        Variable::input(n_id, format!("f{}", n_id), from, value).with_flow(from, to)
    }

    #[test]
    fn test_direction_is_not_merged() {
        let vars = vec![
            flow(1, Agriculture, SurfaceWater, Some(2.0)),
            flow(2, Agriculture, SurfaceWater, Some(3.5)),
            flow(3, SurfaceWater, Agriculture, Some(1.0)),
        ];
        let edges = aggregate_flows(&vars);
        assert_eq!(edges.len(), 2);

        let fwd = &edges[&FlowKey::new(Agriculture, SurfaceWater)];
        assert_eq!(fwd.total_value, 5.5);
        assert_eq!(fwd.variable_count(), 2);

        let rev = &edges[&FlowKey::new(SurfaceWater, Agriculture)];
        assert_eq!(rev.total_value, 1.0);
        assert_eq!(rev.variable_count(), 1);
    }

    #[test]
    fn test_null_values_do_not_create_edges() {
        let vars = vec![
            flow(1, Industry, Atmosphere, None),
            flow(2, Industry, Ocean, Some(0.0)),
            flow(3, Industry, Ocean, None),
        ];
        let edges = aggregate_flows(&vars);
        assert_eq!(edges.len(), 1);
        let ocean = &edges[&FlowKey::new(Industry, Ocean)];
        assert_eq!(ocean.variable_count(), 1);
        assert_eq!(ocean.variables[0].id, "f2");
    }

    #[test]
    fn test_self_loop_is_its_own_group() {
        let vars = vec![
            flow(1, Groundwater, Groundwater, Some(4.0)),
            flow(2, Groundwater, SurfaceWater, Some(1.0)),
        ];
        let edges = aggregate_flows(&vars);
        let lp = &edges[&FlowKey::new(Groundwater, Groundwater)];
        assert!(lp.is_loop());
        assert_eq!(lp.total_value, 4.0);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_contributors_keep_input_order() {
        let vars = vec![
            flow(9, Fishery, Ocean, Some(1.0)),
            flow(3, Fishery, Ocean, Some(1.0)),
            flow(5, Fishery, Ocean, Some(1.0)),
        ];
        let edges = aggregate_flows(&vars);
        let ids: Vec<u32> = edges[&FlowKey::new(Fishery, Ocean)].variables.iter().map(|v| v.n_id.0).collect();
        assert_eq!(ids, vec![9, 3, 5]);
    }

    #[test]
    fn test_non_flow_variables_ignored() {
        let vars = vec![Variable::input(1, "plain", Forestry, Some(3.0))];
        assert!(aggregate_flows(&vars).is_empty());
    }
}
