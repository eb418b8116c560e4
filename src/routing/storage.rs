// ------------------------------------------------------------------------------------------------
// --- RoutingGraph
// ------------------------------------------------------------------------------------------------

use crate::network::RoadNetwork;

/// Forward star representation of the road network: the arcs leaving node `i` are stored in
/// `heads[first_out[i]..first_out[i + 1]]`, with the matching travel times in `weights`.
#[derive(Debug)]
pub struct RoutingGraph {
    first_out: Vec<usize>,
    heads: Vec<usize>,
    weights: Vec<f64>,
}

impl RoutingGraph {
    pub fn new(network: &RoadNetwork) -> Self {
        let num_nodes = network.nodes().len();

        let mut first_out = vec![0; num_nodes + 1];
        for edge in network.edges() {
            first_out[edge.source() + 1] += 1;
        }
        for i in 0..num_nodes {
            first_out[i + 1] += first_out[i];
        }

        let mut next = first_out.clone();
        let mut heads = vec![0; network.edges().len()];
        let mut weights = vec![0.0; network.edges().len()];
        for edge in network.edges() {
            let position = next[edge.source()];
            heads[position] = edge.target();
            weights[position] = edge.travel_time();
            next[edge.source()] += 1;
        }

        Self {
            first_out,
            heads,
            weights,
        }
    }

    // Getters/Setters

    pub fn first_out(&self) -> &Vec<usize> {
        &self.first_out
    }

    pub fn heads(&self) -> &Vec<usize> {
        &self.heads
    }

    pub fn weights(&self) -> &Vec<f64> {
        &self.weights
    }

    // Functions

    pub fn num_nodes(&self) -> usize {
        self.first_out.len() - 1
    }

    pub fn num_arcs(&self) -> usize {
        self.heads.len()
    }

    /// (head, travel time) of the arcs leaving `node`.
    pub fn arcs(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.first_out[node]..self.first_out[node + 1];
        self.heads[range.clone()]
            .iter()
            .copied()
            .zip(self.weights[range].iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::network::tests::line_network;

    #[test]
    fn test_forward_star() {
        let network = line_network(4, &[(2, 0), (0, 1), (2, 3), (1, 2)]);
        let graph = RoutingGraph::new(&network);

        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_arcs(), 4);
        assert_eq!(graph.first_out(), &vec![0, 1, 2, 4, 4]);
        assert_eq!(graph.heads(), &vec![1, 2, 0, 3]);
        assert_eq!(graph.arcs(2).map(|(h, _)| h).collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(graph.arcs(3).count(), 0);
    }
}
