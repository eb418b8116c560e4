use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{AccessConfig, TimeUnit};
use crate::error::{RError, RResult};
use crate::network::RoadNetwork;
use crate::places::{Snapper, read_layer, unique_nodes};
use crate::routing::{RoutingGraph, shortest_travel_times};

// ------------------------------------------------------------------------------------------------
// --- AccessState
// ------------------------------------------------------------------------------------------------

/// Everything needed to answer requests: the network, its routing graph and the facility nodes
/// of each destination layer.
pub struct AccessState {
    network: RoadNetwork,
    graph: RoutingGraph,
    snapper: Snapper,
    layers: Vec<(String, Vec<usize>)>,
    unit: TimeUnit,
}

impl AccessState {
    pub fn new(network: RoadNetwork, config: &AccessConfig) -> RResult<Self> {
        let graph = RoutingGraph::new(&network);
        let snapper = Snapper::new(&network);

        let layers = config
            .destinations
            .iter()
            .map(|layer| {
                let places = read_layer(layer)?;
                let snapped = snapper.snap_layer(&places, layer.crs)?;
                Ok((layer.name.clone(), unique_nodes(&snapped)))
            })
            .collect::<RResult<Vec<_>>>()?;

        Ok(Self::from_parts(
            network,
            graph,
            snapper,
            layers,
            config.matrix.unit,
        ))
    }

    pub fn from_parts(
        network: RoadNetwork,
        graph: RoutingGraph,
        snapper: Snapper,
        layers: Vec<(String, Vec<usize>)>,
        unit: TimeUnit,
    ) -> Self {
        Self {
            network,
            graph,
            snapper,
            layers,
            unit,
        }
    }

    pub fn metadata(&self) -> MetadataResponse {
        MetadataResponse {
            num_nodes: self.network.nodes().len(),
            num_edges: self.network.edges().len(),
            crs: self.network.crs().to_string(),
            unit: self.unit,
            layers: self.layers.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    /// Travel time from a WGS84 position to the closest facility of each layer
    /// (or only of `layer`).
    pub fn accessibility(
        &self,
        longitude: f64,
        latitude: f64,
        layer: Option<&str>,
    ) -> RResult<AccessibilityResponse> {
        let layers = match layer {
            Some(name) => {
                let found = self
                    .layers
                    .iter()
                    .filter(|(n, _)| n == name)
                    .collect::<Vec<_>>();
                if found.is_empty() {
                    return Err(RError::UnknownLayer(name.to_string()));
                }
                found
            }
            None => self.layers.iter().collect(),
        };

        let (x, y) = self.network.crs().from_wgs84(longitude, latitude);
        let (node, snap_distance) = self
            .snapper
            .nearest(x, y)
            .ok_or_else(|| RError::EmptyNetwork(String::from("snapping")))?;

        let targets = layers
            .iter()
            .flat_map(|(_, nodes)| nodes.iter().copied())
            .collect::<Vec<_>>();
        let times = shortest_travel_times(&self.graph, node, &targets);

        let mut offset = 0;
        let layers = layers
            .iter()
            .map(|(name, nodes)| {
                let range = offset..offset + nodes.len();
                offset += nodes.len();

                let nearest = nodes
                    .iter()
                    .zip(&times[range])
                    .filter_map(|(&n, t)| t.map(|t| (n, t)))
                    .min_by(|a, b| a.1.total_cmp(&b.1));

                LayerAccessibility {
                    name: name.clone(),
                    nearest_node: nearest.map(|(n, _)| self.network.osm_id(n)),
                    travel_time: nearest.map(|(_, t)| self.unit.from_seconds(t)),
                }
            })
            .collect();

        Ok(AccessibilityResponse {
            node: self.network.osm_id(node),
            snap_distance,
            unit: self.unit,
            layers,
        })
    }
}

pub async fn run_service(state: AccessState, ip_addr: Ipv4Addr, port: u16) -> RResult<()> {
    log::info!("Starting the server...");

    let state = Arc::new(state);
    let state_1 = Arc::clone(&state);
    let state_2 = Arc::clone(&state);
    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any);

    #[rustfmt::skip]
    let app = Router::new()
        .route(
            "/metadata",
            get(move || metadata(Arc::clone(&state_1))),
        )
        .route(
            "/accessibility",
            get(move |params| accessibility(Arc::clone(&state_2), params)),
        )
        .layer(cors);
    let address = SocketAddr::from((ip_addr, port));
    let listener = tokio::net::TcpListener::bind(address).await?;

    log::info!("Listening on {ip_addr}:{port}...");

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    num_nodes: usize,
    num_edges: usize,
    crs: String,
    unit: TimeUnit,
    layers: Vec<String>,
}

async fn metadata(state: Arc<AccessState>) -> Json<MetadataResponse> {
    Json(state.metadata())
}

#[derive(Debug, Deserialize)]
struct AccessibilityRequest {
    latitude: f64,
    longitude: f64,
    layer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessibilityResponse {
    node: i64,
    snap_distance: f64,
    unit: TimeUnit,
    layers: Vec<LayerAccessibility>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct LayerAccessibility {
    name: String,
    nearest_node: Option<i64>,
    travel_time: Option<f64>,
}

async fn accessibility(
    state: Arc<AccessState>,
    Query(params): Query<AccessibilityRequest>,
) -> Result<Json<AccessibilityResponse>, StatusCode> {
    if !(-90.0..=90.0).contains(&params.latitude) || !(-180.0..=180.0).contains(&params.longitude)
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.accessibility(params.longitude, params.latitude, params.layer.as_deref()) {
        Ok(response) => Ok(Json(response)),
        Err(RError::UnknownLayer(name)) => {
            log::warn!("Unknown layer requested: {name}");
            Err(StatusCode::BAD_REQUEST)
        }
        Err(e) => {
            log::error!("{e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::config::SpeedTable;
    use crate::network::tests::line_network;

    fn state() -> AccessState {
        // 0 <-> 1 <-> 2 -> 3, 12 s per edge.
        let mut network = line_network(4, &[(0, 1), (1, 0), (1, 2), (2, 1), (2, 3)]);
        network.set_travel_times(&SpeedTable::default()).unwrap();
        let graph = RoutingGraph::new(&network);
        let snapper = Snapper::new(&network);
        let layers = vec![
            (String::from("health"), vec![2, 0]),
            (String::from("schools"), vec![3]),
        ];
        AccessState::from_parts(network, graph, snapper, layers, TimeUnit::Seconds)
    }

    #[test]
    fn test_metadata() {
        let metadata = state().metadata();
        assert_eq!(metadata.num_nodes, 4);
        assert_eq!(metadata.num_edges, 5);
        assert_eq!(metadata.crs, "EPSG:32629");
        assert_eq!(metadata.layers, vec!["health", "schools"]);
    }

    #[test]
    fn test_accessibility() {
        let state = state();
        let response = state.accessibility(-5.5291, 31.51, None).unwrap();
        assert_eq!(response.node, 101);
        assert!(response.snap_distance < 15.0);
        assert_eq!(
            response.layers,
            vec![
                LayerAccessibility {
                    name: String::from("health"),
                    nearest_node: Some(102),
                    travel_time: Some(12.0),
                },
                LayerAccessibility {
                    name: String::from("schools"),
                    nearest_node: Some(103),
                    travel_time: Some(24.0),
                },
            ]
        );
    }

    #[test]
    fn test_unreachable_layer() {
        let state = state();
        // Nothing leaves node 3.
        let response = state.accessibility(-5.527, 31.51, Some("health")).unwrap();
        assert_eq!(response.node, 103);
        assert_eq!(response.layers.len(), 1);
        assert_eq!(response.layers[0].travel_time, None);
        assert_eq!(response.layers[0].nearest_node, None);
    }

    #[test]
    fn test_unknown_layer() {
        assert!(matches!(
            state().accessibility(-5.53, 31.51, Some("markets")),
            Err(RError::UnknownLayer(_))
        ));
    }
}
