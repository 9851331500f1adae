//! Un-aggregated mode: one edge record per labelled flow variable.

use crate::flow::aggregate::FlowKey;
use crate::store::{Department, NId, Variable};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelEdge<'a> {
    pub id: NId,
    pub from: Department,
    pub to: Department,
    pub label: String,
    pub value: Option<f64>,
    /// Position among the edges of the same directed pair, in input order.
    pub lane: usize,
    /// +1 when the source name sorts before the target name, -1 otherwise,
    /// so `a -> b` and `b -> a` bend to opposite sides.
    pub side: i8,
    #[serde(skip)]
    pub variable: &'a Variable,
}

impl<'a> ParallelEdge<'a> {
    pub fn key(&self) -> FlowKey {
        FlowKey::new(self.from, self.to)
    }

    pub fn is_loop(&self) -> bool { self.from == self.to }

    /// Signed distance of this lane from the straight edge, `spacing` per lane.
    pub fn offset(&self, spacing: f64) -> f64 {
        (self.lane + 1) as f64 * spacing * f64::from(self.side)
    }
}

/// Turns every flow variable with a non-empty caption into its own edge record.
///
/// Values are carried as-is, including `None`; the lane counter is kept per
/// directed pair.
pub fn parallel_edges<'a, I>(variables: I) -> Vec<ParallelEdge<'a>>
where
    I: IntoIterator<Item = &'a Variable>,
{
    let mut lanes: HashMap<FlowKey, usize> = HashMap::new();
    variables
        .into_iter()
        .filter_map(|var| {
            let key = var.flow?;
            let label = var.caption.clone().filter(|c| !c.is_empty())?;
            let counter = lanes.entry(key).or_insert(0);
            let lane = *counter;
            *counter += 1;
            Some(ParallelEdge {
                id: var.n_id,
                from: key.from,
                to: key.to,
                label,
                value: var.value,
                lane,
                side: if key.from.as_str() < key.to.as_str() { 1 } else { -1 },
                variable: var,
            })
        })
        .collect()
}

/// Directed pairs carrying more than one parallel edge, with their counts,
/// in order of first appearance.
pub fn multi_edge_pairs(edges: &[ParallelEdge<'_>]) -> Vec<(FlowKey, usize)> {
    let mut counts: Vec<(FlowKey, usize)> = Vec::new();
    for edge in edges {
        match counts.iter_mut().find(|(k, _)| *k == edge.key()) {
            Some((_, n)) => *n += 1,
            None => counts.push((edge.key(), 1)),
        }
    }
    counts.retain(|(_, n)| *n > 1);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Department::*;

    fn labelled(n_id: u32, from: Department, to: Department, caption: Option<&str>) -> Variable {
        let var = Variable::input(n_id, format!("v{}", n_id), from, Some(1.0)).with_flow(from, to);
        match caption {
            Some(c) => var.with_caption(c),
            None => var,
        }
    }

    #[test]
    fn test_lanes_per_direction() {
        let vars = vec![
            labelled(1, Agriculture, SurfaceWater, Some("leaching")),
            labelled(2, SurfaceWater, Agriculture, Some("irrigation")),
            labelled(3, Agriculture, SurfaceWater, Some("runoff")),
        ];
        let edges = parallel_edges(&vars);
        assert_eq!(edges.len(), 3);
        assert_eq!((edges[0].lane, edges[1].lane, edges[2].lane), (0, 0, 1));

        // "agriculture" < "surface_water"
        assert_eq!(edges[0].side, 1);
        assert_eq!(edges[1].side, -1);
        assert_eq!(edges[2].offset(30.0), 60.0);
        assert_eq!(edges[1].offset(30.0), -30.0);
        assert_eq!(edges[2].variable.id, "v3");
    }

    #[test]
    fn test_uncaptioned_flows_are_skipped() {
        let vars = vec![
            labelled(1, Industry, Atmosphere, None),
            labelled(2, Industry, Atmosphere, Some("")),
            labelled(3, Industry, Atmosphere, Some("emission")),
        ];
        let edges = parallel_edges(&vars);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, NId(3));
        assert_eq!(edges[0].lane, 0);
    }

    #[test]
    fn test_self_loop_edge() {
        let vars = vec![labelled(1, Ocean, Ocean, Some("internal cycling"))];
        let edges = parallel_edges(&vars);
        assert!(edges[0].is_loop());
        assert_eq!(edges[0].side, -1);
    }

    #[test]
    fn test_multi_edge_pairs() {
        let vars = vec![
            labelled(1, Agriculture, SurfaceWater, Some("a")),
            labelled(2, Industry, Ocean, Some("b")),
            labelled(3, Agriculture, SurfaceWater, Some("c")),
        ];
        let edges = parallel_edges(&vars);
        assert_eq!(multi_edge_pairs(&edges), vec![(FlowKey::new(Agriculture, SurfaceWater), 2)]);
    }
}
