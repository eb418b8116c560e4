mod core;
mod models;
mod storage;

use std::time::Instant;

use orx_parallel::*;

pub use self::core::shortest_travel_times;
pub use models::OdMatrix;
pub use storage::RoutingGraph;

/// Computes the shortest travel time (seconds) from every origin node to every destination node.
/// Origins are explored in parallel; the rows keep the order of `origins`.
pub fn calculate_od(
    graph: &RoutingGraph,
    origins: &[usize],
    destinations: &[usize],
    fail_value: f64,
    num_threads: usize,
    verbose: bool,
) -> OdMatrix {
    let start_time = Instant::now();

    let rows = (0..origins.len())
        .into_par()
        .num_threads(num_threads)
        .map(|i| shortest_travel_times(graph, origins[i], destinations))
        .collect::<Vec<_>>();

    if verbose {
        log::info!(
            "OD matrix {}x{} computed in {:.2?}",
            origins.len(),
            destinations.len(),
            start_time.elapsed()
        );
    }

    OdMatrix::new(origins.to_vec(), destinations.to_vec(), rows, fail_value)
}
