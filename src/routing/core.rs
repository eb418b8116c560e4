use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use super::storage::RoutingGraph;

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    cost: f64,
    node: usize,
}

// Reversed so that BinaryHeap pops the cheapest entry first.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

/// Dijkstra from `source`, stopped as soon as every target is settled.
/// Returns the travel time to each target (`None` when unreachable), in the order of `targets`.
pub fn shortest_travel_times(
    graph: &RoutingGraph,
    source: usize,
    targets: &[usize],
) -> Vec<Option<f64>> {
    let mut result = vec![None; targets.len()];
    if targets.is_empty() {
        return result;
    }

    let mut positions_by_node: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (i, &target) in targets.iter().enumerate() {
        positions_by_node.entry(target).or_default().push(i);
    }

    let mut distances = vec![f64::INFINITY; graph.num_nodes()];
    let mut queue = BinaryHeap::new();
    distances[source] = 0.0;
    queue.push(QueueEntry {
        cost: 0.0,
        node: source,
    });

    while let Some(QueueEntry { cost, node }) = queue.pop() {
        if cost > distances[node] {
            continue;
        }

        if let Some(positions) = positions_by_node.remove(&node) {
            for i in positions {
                result[i] = Some(cost);
            }
            if positions_by_node.is_empty() {
                break;
            }
        }

        for (head, weight) in graph.arcs(node) {
            let candidate = cost + weight;
            if candidate < distances[head] {
                distances[head] = candidate;
                queue.push(QueueEntry {
                    cost: candidate,
                    node: head,
                });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::network::tests::line_network;
    use crate::network::{RoadEdge, RoadNetwork, RoadNode};
    use crate::utils::Crs;

    fn weighted_network(arcs: &[(usize, usize, f64)], num_nodes: usize) -> RoadNetwork {
        let network = line_network(num_nodes, &[]);
        let edges = arcs
            .iter()
            .map(|&(s, t, w)| {
                let mut edge = RoadEdge::new(s, t, 1, "primary", w);
                edge.set_travel_time(w);
                edge
            })
            .collect();
        RoadNetwork::from_parts(network.nodes().clone(), edges, network.crs())
    }

    #[test]
    fn test_takes_the_fastest_path() {
        // The direct road 0 -> 3 is slower than the detour through 1 and 2.
        let network = weighted_network(
            &[(0, 3, 100.0), (0, 1, 10.0), (1, 2, 10.0), (2, 3, 10.0)],
            4,
        );
        let graph = RoutingGraph::new(&network);
        assert_eq!(
            shortest_travel_times(&graph, 0, &[3, 2]),
            vec![Some(30.0), Some(20.0)]
        );
    }

    #[test]
    fn test_respects_direction() {
        let network = weighted_network(&[(0, 1, 5.0)], 2);
        let graph = RoutingGraph::new(&network);
        assert_eq!(shortest_travel_times(&graph, 1, &[0]), vec![None]);
        assert_eq!(
            shortest_travel_times(&graph, 0, &[0, 1, 1]),
            vec![Some(0.0), Some(5.0), Some(5.0)]
        );
    }

    #[test]
    fn test_no_targets() {
        let network = line_network(2, &[(0, 1)]);
        let graph = RoutingGraph::new(&network);
        assert!(shortest_travel_times(&graph, 0, &[]).is_empty());
    }

    #[test]
    fn test_queue_order() {
        let mut queue = BinaryHeap::new();
        for (cost, node) in [(3.0, 0), (1.0, 1), (2.0, 2)] {
            queue.push(QueueEntry { cost, node });
        }
        let order = std::iter::from_fn(|| queue.pop().map(|e| e.node)).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_single_node() {
        let crs = Crs::default();
        let nodes = vec![RoadNode::new(1, -5.5, 31.5, crs)];
        let network = RoadNetwork::from_parts(nodes, vec![], crs);
        let graph = RoutingGraph::new(&network);
        assert_eq!(shortest_travel_times(&graph, 0, &[0]), vec![Some(0.0)]);
    }
}
