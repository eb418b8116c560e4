use std::env;
use std::fs::{self, File};
use std::fmt::Display;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{RError, RResult};

// ------------------------------------------------------------------------------------------------
// --- Crs
// ------------------------------------------------------------------------------------------------

/// Coordinate reference systems understood by the engine.
/// Only geographic WGS84 and the WGS84 / UTM zones are supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Wgs84,
    Utm { zone: u8, north: bool },
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match *self {
            Self::Wgs84 => 4326,
            Self::Utm { zone, north: true } => 32600 + zone as u32,
            Self::Utm { zone, north: false } => 32700 + zone as u32,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Wgs84)
    }

    /// Converts a (x, y) pair expressed in this CRS to (longitude, latitude).
    pub fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Wgs84 => (x, y),
            Self::Utm { zone, north } => {
                let (latitude, longitude) = utm_to_wgs84(x, y, zone, north);
                (longitude, latitude)
            }
        }
    }

    /// Converts a (longitude, latitude) pair to a (x, y) pair expressed in this CRS.
    pub fn from_wgs84(&self, longitude: f64, latitude: f64) -> (f64, f64) {
        match *self {
            Self::Wgs84 => (longitude, latitude),
            Self::Utm { zone, north } => wgs84_to_utm(latitude, longitude, zone, north),
        }
    }

    /// Expresses a point given in `from` in this CRS.
    pub fn transform(&self, from: Crs, x: f64, y: f64) -> (f64, f64) {
        if from == *self {
            return (x, y);
        }

        let (longitude, latitude) = from.to_wgs84(x, y);
        self.from_wgs84(longitude, latitude)
    }
}

impl Default for Crs {
    fn default() -> Self {
        // Morocco, zone 29N.
        Self::Utm {
            zone: 29,
            north: true,
        }
    }
}

impl FromStr for Crs {
    type Err = RError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .to_lowercase()
            .strip_prefix("epsg:")
            .ok_or_else(|| RError::UnsupportedCrs(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| RError::UnsupportedCrs(s.to_string()))?;

        match code {
            4326 => Ok(Self::Wgs84),
            32601..=32660 => Ok(Self::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Self::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => Err(RError::UnsupportedCrs(s.to_string())),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = RError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

// ------------------------------------------------------------------------------------------------
// --- Transverse Mercator (WGS84 / UTM)
// ------------------------------------------------------------------------------------------------

const WGS84_A: f64 = 6378137.0;
const WGS84_F: f64 = 1.0 / 298.257223563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10000000.0;

fn central_meridian(zone: u8) -> f64 {
    (zone as f64 * 6.0 - 183.0).to_radians()
}

/// https://pubs.usgs.gov/pp/1395/report.pdf (Snyder, p. 61)
#[rustfmt::skip]
pub fn wgs84_to_utm(latitude: f64, longitude: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let phi = latitude.to_radians();
    let lambda = longitude.to_radians();

    let n = WGS84_A / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * phi.cos().powi(2);
    let a = phi.cos() * (lambda - central_meridian(zone));

    let m = WGS84_A * (
        (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin()
    );

    let easting = UTM_K0 * n * (
        a
        + (1.0 - t + c) * a.powi(3) / 6.0
        + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0
    ) + UTM_FALSE_EASTING;

    let northing = UTM_K0 * (
        m + n * phi.tan() * (
            a * a / 2.0
            + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
            + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0
        )
    );
    let northing = if north { northing } else { northing + UTM_FALSE_NORTHING_SOUTH };

    (easting, northing)
}

/// https://pubs.usgs.gov/pp/1395/report.pdf (Snyder, p. 63)
#[rustfmt::skip]
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let x = easting - UTM_FALSE_EASTING;
    let y = if north { northing } else { northing - UTM_FALSE_NORTHING_SOUTH };

    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let n1 = WGS84_A / (1.0 - e2 * phi1.sin().powi(2)).sqrt();
    let t1 = phi1.tan().powi(2);
    let c1 = ep2 * phi1.cos().powi(2);
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * phi1.sin().powi(2)).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let phi = phi1 - (n1 * phi1.tan() / r1) * (
        d * d / 2.0
        - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
        + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1) * d.powi(6) / 720.0
    );

    let lambda = central_meridian(zone) + (
        d
        - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0
    ) / phi1.cos();

    (phi.to_degrees(), lambda.to_degrees())
}

// ------------------------------------------------------------------------------------------------
// --- Files
// ------------------------------------------------------------------------------------------------

/// Builds "<prefix>/<sha256 of the parts>.cache".
pub fn cache_path(cache_prefix: Option<String>, parts: &[&str]) -> String {
    format!(
        "{}/{:x}.cache",
        cache_prefix.unwrap_or(String::from("./")),
        Sha256::digest(parts.iter().fold(String::new(), |res, &s| res + s).as_bytes())
    )
    .replace("//", "/")
}

/// Returns a local path for `url_or_path`. URLs are downloaded once into the temp dir of the OS.
pub async fn resolve_local_path(url_or_path: &str) -> RResult<String> {
    if Url::parse(url_or_path).is_err() {
        return Ok(url_or_path.to_string());
    }

    let data_path = download_path(url_or_path);
    if !is_downloaded(&data_path) {
        log::info!("Downloading {url_or_path} to {data_path}...");
        let response = reqwest::get(url_or_path).await?.error_for_status()?;
        let content = response.bytes().await?;
        store_download(&data_path, &content)?;
    }

    Ok(data_path)
}

fn download_path(url: &str) -> String {
    let file_name = url.rsplit('/').next().unwrap_or_default();
    env::temp_dir()
        .join(format!("{:x}-{file_name}", Sha256::digest(url.as_bytes())))
        .to_string_lossy()
        .into_owned()
}

/// Empty files are leftovers of an interrupted transfer.
fn is_downloaded(path: &str) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Writes next to `path` first so that `path` only ever holds a complete file.
fn store_download(path: &str, content: &[u8]) -> RResult<()> {
    let part_path = format!("{path}.part");
    let mut file = File::create(&part_path)?;
    std::io::copy(&mut Cursor::new(content), &mut file)?;
    file.sync_all()?;
    fs::rename(&part_path, path)?;
    Ok(())
}

/// Lower case extension of a path, empty when absent.
pub fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::from_str("epsg:4326").unwrap(), Crs::Wgs84);
        assert_eq!(
            Crs::from_str("EPSG:32629").unwrap(),
            Crs::Utm {
                zone: 29,
                north: true
            }
        );
        assert_eq!(
            Crs::from_str("epsg:32733").unwrap(),
            Crs::Utm {
                zone: 33,
                north: false
            }
        );
        assert!(Crs::from_str("epsg:2056").is_err());
        assert!(Crs::from_str("32629").is_err());
        assert_eq!(Crs::default().to_string(), "EPSG:32629");
    }

    #[test]
    fn test_central_meridian_on_equator() {
        let (easting, northing) = wgs84_to_utm(0.0, -9.0, 29, true);
        assert!((easting - 500000.0).abs() < 1e-6);
        assert!(northing.abs() < 1e-6);
    }

    #[test]
    fn test_utm_is_symmetric_around_central_meridian() {
        let (east, north_1) = wgs84_to_utm(31.5, -8.0, 29, true);
        let (west, north_2) = wgs84_to_utm(31.5, -10.0, 29, true);
        assert!((east - 500000.0 - (500000.0 - west)).abs() < 1e-6);
        assert!((north_1 - north_2).abs() < 1e-6);
        // One degree of longitude at 31.5° is roughly 95 km.
        assert!((east - 500000.0 - 95000.0).abs() < 1000.0);
    }

    #[test]
    fn test_utm_inverse() {
        // Tinghir.
        let (easting, northing) = wgs84_to_utm(31.5147, -5.5328, 29, true);
        let (latitude, longitude) = utm_to_wgs84(easting, northing, 29, true);
        assert!((latitude - 31.5147).abs() < 1e-5);
        assert!((longitude + 5.5328).abs() < 1e-5);

        let (easting, northing) = wgs84_to_utm(-33.9, 18.4, 34, false);
        assert!(northing > 6000000.0);
        let (latitude, longitude) = utm_to_wgs84(easting, northing, 34, false);
        assert!((latitude + 33.9).abs() < 1e-5);
        assert!((longitude - 18.4).abs() < 1e-5);
    }

    #[test]
    fn test_transform_between_crs() {
        let utm = Crs::default();
        let (x, y) = utm.transform(Crs::Wgs84, -9.0, 0.0);
        assert!((x - 500000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        assert_eq!(utm.transform(utm, 1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn test_cache_path() {
        let path = cache_path(Some(String::from("/tmp/")), &["a", "b"]);
        assert!(path.starts_with("/tmp/"));
        assert!(path.ends_with(".cache"));
        assert!(!path.contains("//"));
        assert_eq!(path, cache_path(Some(String::from("/tmp")), &["ab"]));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("data/Tinghir_Villages.SHP"), "shp");
        assert_eq!(extension("noext"), "");
    }

    #[test]
    fn test_partial_download_is_not_reused() {
        let url = "https://example.org/extracts/osm_access_engine_partial.osm.pbf";
        let path = download_path(url);
        let part_path = format!("{path}.part");
        let _ = fs::remove_file(&path);

        // Interrupted transfers leave either a .part file or an empty file behind.
        fs::write(&part_path, b"trunc").unwrap();
        assert!(!is_downloaded(&path));
        fs::write(&path, b"").unwrap();
        assert!(!is_downloaded(&path));

        store_download(&path, b"complete extract").unwrap();
        assert!(is_downloaded(&path));
        assert!(!Path::new(&part_path).exists());
        assert_eq!(fs::read(&path).unwrap(), b"complete extract");

        fs::remove_file(&path).unwrap();
    }
}
