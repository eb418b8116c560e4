use std::fs::File;
use std::io::BufReader;

use geojson::GeoJson;
use geojson::feature::Id;
use serde::Deserialize;
use shapefile::dbase::FieldValue;

use crate::error::{RError, RResult};
use crate::utils::extension;

use super::Place;

const ID_FIELDS: [&str; 3] = ["id", "ID", "Id"];

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    #[serde(default, alias = "ID", alias = "Id")]
    id: Option<String>,
    #[serde(alias = "X", alias = "lon", alias = "longitude")]
    x: f64,
    #[serde(alias = "Y", alias = "lat", alias = "latitude")]
    y: f64,
}

/// Reads point places from a CSV, GeoJSON or shapefile layer.
/// Places without an id are named after their position in the file.
pub fn read_places(path: &str) -> RResult<Vec<Place>> {
    match extension(path).as_str() {
        "csv" => read_csv(path),
        "geojson" | "json" => read_geojson(path),
        "shp" => read_shapefile(path),
        _ => Err(RError::UnsupportedFormat(path.to_string())),
    }
}

fn read_csv(path: &str) -> RResult<Vec<Place>> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<PlaceRecord>()
        .enumerate()
        .map(|(i, result)| -> RResult<Place> {
            let record = result?;
            let id = record.id.unwrap_or_else(|| i.to_string());
            Ok(Place::new(id, record.x, record.y))
        })
        .collect()
}

fn read_geojson(path: &str) -> RResult<Vec<Place>> {
    let reader = BufReader::new(File::open(path)?);
    let geojson: GeoJson = serde_json::from_reader(reader)?;

    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => return Err(RError::UnsupportedFormat(path.to_string())),
    };

    let mut places = Vec::new();
    for (i, feature) in features.into_iter().enumerate() {
        let id = match (&feature.id, feature.property("id")) {
            (Some(Id::String(s)), _) => s.clone(),
            (Some(Id::Number(n)), _) => n.to_string(),
            (None, Some(serde_json::Value::String(s))) => s.clone(),
            (None, Some(serde_json::Value::Number(n))) => n.to_string(),
            _ => i.to_string(),
        };

        match feature.geometry.map(|g| g.value) {
            Some(geojson::Value::Point(coordinates)) if coordinates.len() >= 2 => {
                places.push(Place::new(id, coordinates[0], coordinates[1]));
            }
            _ => log::warn!("{path}: feature {id} is not a point, skipped"),
        }
    }
    Ok(places)
}

fn read_shapefile(path: &str) -> RResult<Vec<Place>> {
    let mut places = Vec::new();

    for (i, (shape, record)) in shapefile::read(path)?.into_iter().enumerate() {
        let id = ID_FIELDS
            .iter()
            .find_map(|name| record.get(name).and_then(field_to_string))
            .unwrap_or_else(|| i.to_string());

        let (x, y) = match shape {
            shapefile::Shape::Point(p) => (p.x, p.y),
            shapefile::Shape::PointM(p) => (p.x, p.y),
            shapefile::Shape::PointZ(p) => (p.x, p.y),
            other => {
                log::warn!("{path}: record {id} is a {}, skipped", other.shapetype());
                continue;
            }
        };
        places.push(Place::new(id, x, y));
    }
    Ok(places)
}

fn field_to_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
        FieldValue::Numeric(Some(n)) => Some(n.to_string()),
        FieldValue::Integer(n) => Some(n.to_string()),
        FieldValue::Double(n) => Some(n.to_string()),
        FieldValue::Float(Some(n)) => Some(n.to_string()),
        _ => None,
    }
}
