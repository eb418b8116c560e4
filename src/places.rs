mod readers;
mod snapping;

use serde::{Deserialize, Serialize};

use crate::config::LayerConfig;
use crate::error::{RError, RResult};

pub use readers::read_places;
pub use snapping::{Snapper, unique_nodes};

/// Reads the points of a layer and checks that there is at least one.
pub fn read_layer(layer: &LayerConfig) -> RResult<Vec<Place>> {
    let places = read_places(&layer.path)?;
    if places.is_empty() {
        return Err(RError::EmptyLayer(layer.name.clone()));
    }
    log::info!("{} places read from layer {}", places.len(), layer.name);
    Ok(places)
}

// ------------------------------------------------------------------------------------------------
// --- Place
// ------------------------------------------------------------------------------------------------

/// A village or a facility, in the CRS of its layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    id: String,
    x: f64,
    y: f64,
}

impl Place {
    pub fn new(id: String, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }

    // Getters/Setters

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

// ------------------------------------------------------------------------------------------------
// --- SnappedPlace
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnappedPlace {
    place: Place,
    node: usize,
    nn: i64,
    nn_dist: f64,
}

impl SnappedPlace {
    pub fn new(place: Place, node: usize, nn: i64, nn_dist: f64) -> Self {
        Self {
            place,
            node,
            nn,
            nn_dist,
        }
    }

    // Getters/Setters

    pub fn place(&self) -> &Place {
        &self.place
    }

    /// Index of the nearest node in the network.
    pub fn node(&self) -> usize {
        self.node
    }

    /// OSM id of the nearest node.
    pub fn nn(&self) -> i64 {
        self.nn
    }

    /// Distance to the nearest node in meters.
    pub fn nn_dist(&self) -> f64 {
        self.nn_dist
    }
}
