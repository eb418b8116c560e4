use rustc_hash::FxHashMap;

use crate::config::SpeedTable;
use crate::error::RResult;

use super::RoadNetwork;

/// Seconds needed to cover `length` meters at `speed` km/h.
pub fn travel_time(length: f64, speed: f64) -> f64 {
    length / (speed * 1000.0 / 3600.0)
}

/// Sets the travel time of every edge from its highway class.
/// Returns the number of edges which fell back on the default speed.
pub fn convert_network_to_time(network: &mut RoadNetwork, speeds: &SpeedTable) -> RResult<usize> {
    speeds.validate()?;

    let mut defaulted: FxHashMap<String, usize> = FxHashMap::default();
    for edge in &mut network.edges {
        let speed = match speeds.speed(&edge.highway) {
            Some(speed) => speed,
            None => {
                *defaulted.entry(edge.highway.clone()).or_default() += 1;
                speeds.default_speed
            }
        };
        edge.set_travel_time(travel_time(edge.length, speed));
    }

    let count = defaulted.values().sum();
    if count > 0 {
        let mut classes = defaulted.into_iter().collect::<Vec<_>>();
        classes.sort();
        log::info!(
            "{count} edges use the default speed of {} km/h: {classes:?}",
            speeds.default_speed
        );
    }
    Ok(count)
}
