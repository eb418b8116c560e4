use rustc_hash::FxHashMap;

use super::RoadNetwork;

pub fn clean(network: &mut RoadNetwork, junction_tolerance: f64, verbose: bool) {
    let nodes_before = network.nodes().len();
    let edges_before = network.edges().len();

    let merged = consolidate_junctions(network, junction_tolerance);
    let loops = remove_self_loops(network);
    let duplicates = deduplicate_parallel_edges(network);
    let isolated = network.remove_isolated_nodes();

    if verbose {
        log::info!(
            "Cleaning: {merged} junction nodes merged, {loops} self loops, {duplicates} parallel edges and {isolated} isolated nodes removed"
        );
    }
    log::info!(
        "Cleaned network: {} -> {} nodes, {} -> {} edges",
        nodes_before,
        network.nodes().len(),
        edges_before,
        network.edges().len()
    );
}

pub fn remove_self_loops(network: &mut RoadNetwork) -> usize {
    network.retain_edges(|e| e.source != e.target)
}

/// Merges the nodes lying within `tolerance` meters of each other.
/// Each cluster collapses onto its node with the smallest OSM id.
pub fn consolidate_junctions(network: &mut RoadNetwork, tolerance: f64) -> usize {
    if tolerance <= 0.0 || network.nodes.is_empty() {
        return 0;
    }

    let mut clusters = UnionFind::new(network.nodes.len());
    let tree = network.node_tree();
    for (i, node) in network.nodes.iter().enumerate() {
        for neighbor in tree.within_radius(&[node.x, node.y], tolerance) {
            let j = neighbor.index();
            if i != j {
                clusters.union(i, j, |a, b| network.nodes[a].osm_id < network.nodes[b].osm_id);
            }
        }
    }

    let roots = (0..network.nodes.len())
        .map(|i| clusters.find(i))
        .collect::<Vec<_>>();
    for edge in &mut network.edges {
        edge.source = roots[edge.source];
        edge.target = roots[edge.target];
    }

    let keep = roots
        .iter()
        .enumerate()
        .map(|(i, &root)| i == root)
        .collect::<Vec<_>>();
    network.retain_nodes(&keep)
}

/// Keeps the shortest edge for every (source, target) pair.
pub fn deduplicate_parallel_edges(network: &mut RoadNetwork) -> usize {
    let mut shortest: FxHashMap<(usize, usize), usize> = FxHashMap::default();
    for (i, edge) in network.edges.iter().enumerate() {
        shortest
            .entry((edge.source, edge.target))
            .and_modify(|j| {
                if edge.length < network.edges[*j].length {
                    *j = i;
                }
            })
            .or_insert(i);
    }

    let mut keep = vec![false; network.edges.len()];
    for &i in shortest.values() {
        keep[i] = true;
    }

    let mut i = 0;
    network.retain_edges(|_| {
        i += 1;
        keep[i - 1]
    })
}

// ------------------------------------------------------------------------------------------------
// --- UnionFind
// ------------------------------------------------------------------------------------------------

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// `precedes(a, b)` tells whether root `a` should absorb root `b`.
    fn union<F: Fn(usize, usize) -> bool>(&mut self, a: usize, b: usize, precedes: F) {
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return;
        }
        if precedes(a, b) {
            self.parent[b] = a;
        } else {
            self.parent[a] = b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::network::tests::line_network;
    use crate::network::{RoadEdge, RoadNode};
    use crate::utils::Crs;

    #[test]
    fn test_remove_self_loops() {
        let mut network = line_network(2, &[(0, 1), (1, 1), (1, 0)]);
        assert_eq!(remove_self_loops(&mut network), 1);
        assert_eq!(network.edges().len(), 2);
    }

    #[test]
    fn test_consolidate_junctions() {
        let crs = Crs::default();
        // Nodes 1 and 2 are a few centimeters apart, the third one is about 95 m away.
        let nodes = vec![
            RoadNode::new(30, -5.53, 31.51, crs),
            RoadNode::new(20, -5.5300002, 31.51, crs),
            RoadNode::new(10, -5.529, 31.51, crs),
        ];
        let edges = vec![
            RoadEdge::new(0, 2, 1, "primary", 95.0),
            RoadEdge::new(2, 1, 1, "primary", 95.0),
            RoadEdge::new(0, 1, 2, "service", 0.02),
        ];
        let mut network = RoadNetwork::from_parts(nodes, edges, crs);

        assert_eq!(consolidate_junctions(&mut network, 0.5), 1);
        let ids = network.nodes().iter().map(|n| n.osm_id()).collect::<Vec<_>>();
        assert_eq!(ids, vec![20, 10]);
        let pairs = network
            .edges()
            .iter()
            .map(|e| (e.source(), e.target()))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (0, 0)]);
    }

    #[test]
    fn test_consolidate_without_tolerance() {
        let mut network = line_network(3, &[(0, 1), (1, 2)]);
        assert_eq!(consolidate_junctions(&mut network, 0.0), 0);
        assert_eq!(network.nodes().len(), 3);
    }

    #[test]
    fn test_deduplicate_parallel_edges() {
        let crs = Crs::default();
        let nodes = vec![
            RoadNode::new(1, -5.53, 31.51, crs),
            RoadNode::new(2, -5.52, 31.51, crs),
        ];
        let edges = vec![
            RoadEdge::new(0, 1, 1, "primary", 1200.0),
            RoadEdge::new(0, 1, 2, "tertiary", 950.0),
            RoadEdge::new(1, 0, 1, "primary", 1200.0),
        ];
        let mut network = RoadNetwork::from_parts(nodes, edges, crs);

        assert_eq!(deduplicate_parallel_edges(&mut network), 1);
        let ways = network.edges().iter().map(|e| e.way_id()).collect::<Vec<_>>();
        assert_eq!(ways, vec![2, 1]);
    }

    #[test]
    fn test_clean() {
        let mut network = line_network(4, &[(0, 1), (1, 0), (1, 1), (0, 1)]);
        clean(&mut network, 0.5, true);
        assert_eq!(network.nodes().len(), 2);
        assert_eq!(network.edges().len(), 2);
    }
}
