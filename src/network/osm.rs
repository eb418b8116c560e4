use std::time::Instant;

use geo::{Distance, Haversine, Point};
use osmpbf::{Element, ElementReader};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{RError, RResult};
use crate::utils::Crs;

use super::{RoadEdge, RoadNetwork, RoadNode};

type Tags<'a> = FxHashMap<&'a str, &'a str>;

const EXCLUDED_HIGHWAYS: [&str; 20] = [
    "abandoned",
    "bridleway",
    "bus_guideway",
    "construction",
    "corridor",
    "cycleway",
    "elevator",
    "escalator",
    "footway",
    "no",
    "path",
    "pedestrian",
    "planned",
    "platform",
    "proposed",
    "raceway",
    "razed",
    "service",
    "steps",
    "track",
];

const EXCLUDED_SERVICES: [&str; 6] = [
    "alley",
    "driveway",
    "emergency_access",
    "parking",
    "parking_aisle",
    "private",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Forward,
    Reverse,
    Both,
}

impl Direction {
    fn from_tags(tags: &Tags) -> Self {
        match tags.get("oneway").copied() {
            Some("yes" | "true" | "1") => Self::Forward,
            Some("-1" | "reverse") => Self::Reverse,
            Some("no" | "false" | "0") => Self::Both,
            _ if tags.get("junction") == Some(&"roundabout") => Self::Forward,
            _ if tags.get("highway") == Some(&"motorway") => Self::Forward,
            _ => Self::Both,
        }
    }
}

struct DriveWay {
    id: i64,
    refs: Vec<i64>,
    highway: String,
    direction: Direction,
}

/// Reads the drivable part of an .osm.pbf extract.
/// The first pass keeps the ways, the second one the nodes they reference.
pub fn read_pbf(path: &str, crs: Crs, verbose: bool) -> RResult<RoadNetwork> {
    let start_time = Instant::now();

    let mut ways = Vec::new();
    ElementReader::from_path(path)?.for_each(|element| {
        if let Element::Way(way) = element {
            let tags = way.tags().collect::<Tags>();
            if is_drivable(&tags) {
                ways.push(DriveWay {
                    id: way.id(),
                    refs: way.refs().collect(),
                    highway: tags.get("highway").copied().unwrap_or_default().to_string(),
                    direction: Direction::from_tags(&tags),
                });
            }
        }
    })?;

    if ways.is_empty() {
        return Err(RError::NoWaysFound);
    }

    let referenced = ways
        .iter()
        .flat_map(|w| w.refs.iter().copied())
        .collect::<FxHashSet<_>>();

    let mut coordinates = FxHashMap::default();
    ElementReader::from_path(path)?.for_each(|element| match element {
        Element::Node(node) if referenced.contains(&node.id()) => {
            coordinates.insert(node.id(), (node.lon(), node.lat()));
        }
        Element::DenseNode(node) if referenced.contains(&node.id()) => {
            coordinates.insert(node.id(), (node.lon(), node.lat()));
        }
        _ => {}
    })?;

    if coordinates.is_empty() {
        return Err(RError::NoNodesFound);
    }

    let network = build_network(&ways, &coordinates, crs);

    if verbose {
        log::info!(
            "{} ways, {} nodes, {} edges imported in {:.2?}",
            ways.len(),
            network.nodes().len(),
            network.edges().len(),
            start_time.elapsed()
        );
    }
    Ok(network)
}

/// Same criteria as osmnx's `drive` network type.
fn is_drivable(tags: &Tags) -> bool {
    let Some(highway) = tags.get("highway") else {
        return false;
    };

    if EXCLUDED_HIGHWAYS.contains(highway) {
        return false;
    }
    if tags.get("area") == Some(&"yes") {
        return false;
    }
    if tags.get("motor_vehicle") == Some(&"no") || tags.get("motorcar") == Some(&"no") {
        return false;
    }
    if tags.get("access") == Some(&"private") {
        return false;
    }
    if let Some(service) = tags.get("service") {
        if EXCLUDED_SERVICES.contains(service) {
            return false;
        }
    }

    true
}

fn build_network(
    ways: &[DriveWay],
    coordinates: &FxHashMap<i64, (f64, f64)>,
    crs: Crs,
) -> RoadNetwork {
    let mut node_index = FxHashMap::default();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut skipped = 0;

    let mut index_of = |osm_id: i64, nodes: &mut Vec<RoadNode>| -> Option<usize> {
        let (longitude, latitude) = *coordinates.get(&osm_id)?;
        Some(*node_index.entry(osm_id).or_insert_with(|| {
            nodes.push(RoadNode::new(osm_id, longitude, latitude, crs));
            nodes.len() - 1
        }))
    };

    for way in ways {
        for pair in way.refs.windows(2) {
            let (Some(a), Some(b)) = (index_of(pair[0], &mut nodes), index_of(pair[1], &mut nodes))
            else {
                skipped += 1;
                continue;
            };

            let length = Haversine.distance(
                Point::new(nodes[a].longitude(), nodes[a].latitude()),
                Point::new(nodes[b].longitude(), nodes[b].latitude()),
            );

            if way.direction != Direction::Reverse {
                edges.push(RoadEdge::new(a, b, way.id, &way.highway, length));
            }
            if way.direction != Direction::Forward {
                edges.push(RoadEdge::new(b, a, way.id, &way.highway, length));
            }
        }
    }

    if skipped > 0 {
        log::warn!("{skipped} segments skipped because of missing nodes");
    }

    RoadNetwork::from_parts(nodes, edges, crs)
}
