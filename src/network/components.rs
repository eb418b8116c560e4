use std::cmp::Reverse;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{RError, RResult};

use super::RoadNetwork;

const UNVISITED: usize = usize::MAX;

/// Edge counts before and after keeping only the largest strongly connected component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    edges_before: usize,
    edges_after: usize,
}

impl NetworkStats {
    pub fn new(edges_before: usize, edges_after: usize) -> Self {
        Self {
            edges_before,
            edges_after,
        }
    }

    // Getters/Setters

    pub fn edges_before(&self) -> usize {
        self.edges_before
    }

    pub fn edges_after(&self) -> usize {
        self.edges_after
    }

    // Functions

    pub fn difference(&self) -> usize {
        self.edges_before - self.edges_after
    }

    pub fn difference_percent(&self) -> f64 {
        self.difference() as f64 / self.edges_before as f64 * 100.0
    }

    pub fn retained_percent(&self) -> f64 {
        100.0 - self.difference_percent()
    }
}

impl Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "G before: {} edges, G after: {} edges, difference {} ({:.2} %), retained {:.2} %",
            self.edges_before,
            self.edges_after,
            self.difference(),
            self.difference_percent(),
            self.retained_percent()
        )
    }
}

/// Tarjan's algorithm, without recursion so that long rural roads do not overflow the stack.
/// Components are returned in the order they are completed.
pub fn strongly_connected_components(num_nodes: usize, arcs: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); num_nodes];
    for &(source, target) in arcs {
        adjacency[source].push(target);
    }

    let mut index = vec![UNVISITED; num_nodes];
    let mut lowlink = vec![0; num_nodes];
    let mut on_stack = vec![false; num_nodes];
    let mut stack = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0;

    for root in 0..num_nodes {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        // (node, position of the next neighbor to explore)
        let mut call_stack = vec![(root, 0)];

        while let Some(frame) = call_stack.last_mut() {
            let v = frame.0;

            if frame.1 < adjacency[v].len() {
                let w = adjacency[v][frame.1];
                frame.1 += 1;

                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(u, _)) = call_stack.last() {
                lowlink[u] = lowlink[u].min(lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

/// Removes everything outside of the largest strongly connected component.
/// Equally large components are decided by their smallest node index.
pub fn keep_largest_component(network: &mut RoadNetwork) -> RResult<NetworkStats> {
    let edges_before = network.edges.len();
    if edges_before == 0 {
        return Err(RError::EmptyNetwork(String::from("cleaning")));
    }

    let arcs = network
        .edges
        .iter()
        .map(|e| (e.source, e.target))
        .collect::<Vec<_>>();
    let components = strongly_connected_components(network.nodes.len(), &arcs);

    let largest = components
        .iter()
        .max_by_key(|c| (c.len(), Reverse(c.iter().min().copied())))
        .ok_or_else(|| RError::EmptyNetwork(String::from("cleaning")))?;

    let mut keep = vec![false; network.nodes.len()];
    for &i in largest {
        keep[i] = true;
    }
    network.retain_nodes(&keep);

    let stats = NetworkStats::new(edges_before, network.edges.len());
    log::info!("{stats}");

    if stats.edges_after() == 0 {
        return Err(RError::EmptyNetwork(String::from(
            "keeping the largest strongly connected component",
        )));
    }
    Ok(stats)
}
