mod app;
mod cli;
mod config;
mod error;
mod export;
mod network;
mod places;
mod routing;
mod service;
mod utils;

pub use app::{run_od, run_pipeline, run_prepare};
pub use cli::{Cli, Mode, NetworkArgsBuilder};
pub use config::{
    AccessConfig, LayerConfig, MatrixConfig, NetworkConfig, SpeedTable, TimeUnit,
    default_destinations,
};
pub use error::{RError, RResult};
pub use export::{write_nearest, write_od_matrix, write_snapped};
pub use network::{
    NetworkArgs, NetworkStats, NodePoint, RoadEdge, RoadNetwork, RoadNode, read_aoi,
};
pub use places::{Place, SnappedPlace, Snapper, read_layer, read_places, unique_nodes};
pub use routing::{OdMatrix, RoutingGraph, calculate_od, shortest_travel_times};
pub use service::{AccessState, run_service};
pub use utils::{Crs, utm_to_wgs84, wgs84_to_utm};
