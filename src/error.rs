use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RError {
    #[error("Io Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("GeoJsonError: {0}")]
    GeoJsonError(Box<geojson::Error>),
    #[error("Toml error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Postcard error: {0}")]
    PostcardError(#[from] postcard::Error),
    #[error("Failed to parse integer: {0}")]
    ParseIntError(#[from] ParseIntError),
    #[error("Failed to parse float: {0}")]
    ParseFloatError(#[from] ParseFloatError),
    #[error("Csv error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed reading .pbf file: {0}")]
    PbfError(#[from] osmpbf::Error),
    #[error("Shapefile error: {0}")]
    ShapefileError(#[from] shapefile::Error),
    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("The area of interest contains no polygon")]
    EmptyAoi,
    #[error("pbf does not contain any drivable 'way' elements")]
    NoWaysFound,
    #[error("pbf does not contain the 'node' elements referenced by the ways")]
    NoNodesFound,
    #[error("The road network is empty after {0}")]
    EmptyNetwork(String),
    #[error("Layer {0} contains no point")]
    EmptyLayer(String),
    #[error("Unknown layer {0}")]
    UnknownLayer(String),
}

impl From<geojson::Error> for RError {
    fn from(value: geojson::Error) -> Self {
        Self::GeoJsonError(Box::new(value))
    }
}

pub type RResult<T> = Result<T, RError>;
