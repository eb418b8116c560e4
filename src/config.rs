use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use crate::error::{RError, RResult};
use crate::utils::{Crs, extension};

/// Everything the accessibility pipeline needs besides the OSM extract and the area of interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub network: NetworkConfig,
    pub speeds: SpeedTable,
    pub matrix: MatrixConfig,
    pub origins: LayerConfig,
    pub destinations: Vec<LayerConfig>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            speeds: SpeedTable::default(),
            matrix: MatrixConfig::default(),
            origins: LayerConfig::default(),
            destinations: default_destinations(),
        }
    }
}

impl AccessConfig {
    pub fn destination(&self, name: &str) -> RResult<&LayerConfig> {
        self.destinations
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| RError::UnknownLayer(name.to_string()))
    }

    /// Fails on settings that would produce meaningless travel times.
    pub fn validate(&self) -> RResult<()> {
        if self.network.crs.is_geographic() {
            return Err(RError::Configuration(String::from(
                "the working CRS must be projected (meters), e.g. EPSG:32629",
            )));
        }
        if self.network.junction_tolerance < 0.0 {
            return Err(RError::Configuration(format!(
                "negative junction tolerance: {}",
                self.network.junction_tolerance
            )));
        }
        self.speeds.validate()?;

        let mut names = self.destinations.iter().map(|l| &l.name).collect::<Vec<_>>();
        names.sort();
        names.dedup();
        if names.len() != self.destinations.len() {
            return Err(RError::Configuration(String::from(
                "destination layer names must be unique",
            )));
        }

        Ok(())
    }
}

impl TryFrom<&str> for AccessConfig {
    type Error = RError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        let s = std::fs::read_to_string(path)?;

        let config: AccessConfig = match extension(path).as_str() {
            "toml" => toml::from_str(&s)?,
            "json" => serde_json::from_str(&s)?,
            _ => return Err(RError::UnsupportedFormat(path.to_string())),
        };
        config.validate()?;
        Ok(config)
    }
}

// ------------------------------------------------------------------------------------------------
// --- NetworkConfig
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Projected CRS in which snapping and junction consolidation happen.
    pub crs: Crs,
    /// Junctions closer than this distance (in meters) are merged.
    pub junction_tolerance: f64,
    /// Keeps the segments crossing the boundary of the area of interest.
    pub truncate_by_edge: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            crs: Crs::default(),
            junction_tolerance: 0.5,
            truncate_by_edge: false,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// --- SpeedTable
// ------------------------------------------------------------------------------------------------

/// Driving speeds in km/h per OSM highway class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedTable {
    pub default_speed: f64,
    pub speeds: BTreeMap<String, f64>,
}

impl SpeedTable {
    pub fn speed(&self, highway: &str) -> Option<f64> {
        self.speeds.get(highway).copied()
    }

    pub fn validate(&self) -> RResult<()> {
        if let Some((highway, speed)) = self
            .speeds
            .iter()
            .map(|(h, s)| (h.as_str(), *s))
            .chain(std::iter::once(("default", self.default_speed)))
            .find(|(_, s)| !(*s > 0.0))
        {
            return Err(RError::Configuration(format!(
                "speed for {highway} must be positive, got {speed}"
            )));
        }
        Ok(())
    }
}

impl Default for SpeedTable {
    fn default() -> Self {
        let speeds = [
            ("residential", 30.0),
            ("primary", 60.0),
            ("primary_link", 55.0),
            ("trunk", 40.0),
            ("trunk_link", 35.0),
            ("secondary", 50.0),
            ("secondary_link", 45.0),
            ("tertiary", 40.0),
            ("tertiary_link", 35.0),
            ("unclassified", 30.0),
            ("road", 20.0),
            ("crossing", 20.0),
            ("living_street", 10.0),
        ]
        .into_iter()
        .map(|(h, s)| (h.to_string(), s))
        .collect();

        Self {
            default_speed: 20.0,
            speeds,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// --- MatrixConfig
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Written for origin/destination pairs without a path.
    pub fail_value: f64,
    pub unit: TimeUnit,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            fail_value: 9999999.0,
            unit: TimeUnit::Minutes,
        }
    }
}

#[derive(Debug, EnumString, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[strum(serialize = "seconds")]
    Seconds,
    #[strum(serialize = "minutes")]
    Minutes,
}

impl TimeUnit {
    pub fn from_seconds(&self, seconds: f64) -> f64 {
        match self {
            Self::Seconds => seconds,
            Self::Minutes => seconds / 60.0,
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds => write!(f, "seconds"),
            Self::Minutes => write!(f, "minutes"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// --- LayerConfig
// ------------------------------------------------------------------------------------------------

/// A point layer (villages, health centres, ...) and where its results go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub path: String,
    pub crs: Crs,
    /// File name of the OD matrix, only meaningful for destinations.
    #[serde(default)]
    pub output: Option<String>,
}

impl LayerConfig {
    pub fn new(name: &str, path: &str, crs: Crs, output: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            crs,
            output: output.map(String::from),
        }
    }

    pub fn output_file_name(&self, origins: &str) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| format!("OD_{origins}2{}.csv", self.name))
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self::new("villages", "data/Tinghir_Villages.shp", Crs::default(), None)
    }
}

pub fn default_destinations() -> Vec<LayerConfig> {
    vec![
        LayerConfig::new(
            "health",
            "data/Tinghir_Health.shp",
            Crs::default(),
            Some("OD_village2health.csv"),
        ),
        LayerConfig::new(
            "markets",
            "data/tinghirMarketsP.shp",
            Crs::Wgs84,
            Some("OD_village2market.csv"),
        ),
        LayerConfig::new(
            "schools",
            "data/tinghirSchoolP.shp",
            Crs::Wgs84,
            Some("OD_village2school.csv"),
        ),
    ]
}
