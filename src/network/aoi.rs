use std::fs::File;
use std::io::BufReader;

use geo::{Coord, Intersects, MapCoordsInPlace, MultiPolygon, Point};
use geojson::GeoJson;

use crate::error::{RError, RResult};
use crate::utils::{Crs, extension};

use super::RoadNetwork;

/// Reads the first polygon of a GeoJSON file or a shapefile and returns it in WGS84.
pub fn read_aoi(path: &str, crs: Crs) -> RResult<MultiPolygon> {
    let mut aoi = match extension(path).as_str() {
        "geojson" | "json" => read_geojson_polygon(path)?,
        "shp" => read_shapefile_polygon(path)?,
        _ => return Err(RError::UnsupportedFormat(path.to_string())),
    };

    if !crs.is_geographic() {
        aoi.map_coords_in_place(|c| {
            let (x, y) = crs.to_wgs84(c.x, c.y);
            Coord { x, y }
        });
    }
    Ok(aoi)
}

fn read_geojson_polygon(path: &str) -> RResult<MultiPolygon> {
    let reader = BufReader::new(File::open(path)?);
    let geojson: GeoJson = serde_json::from_reader(reader)?;

    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry],
    };

    for geometry in geometries {
        match geo::Geometry::<f64>::try_from(geometry)? {
            geo::Geometry::Polygon(polygon) => return Ok(MultiPolygon::new(vec![polygon])),
            geo::Geometry::MultiPolygon(polygons) => return Ok(polygons),
            other => log::warn!("Skipping non polygonal geometry {other:?}"),
        }
    }
    Err(RError::EmptyAoi)
}

fn read_shapefile_polygon(path: &str) -> RResult<MultiPolygon> {
    for shape in shapefile::read_shapes(path)? {
        let polygons: Result<MultiPolygon, _> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into(),
            shapefile::Shape::PolygonM(polygon) => polygon.try_into(),
            other => {
                log::warn!("Skipping shape of type {}", other.shapetype());
                continue;
            }
        };
        return polygons.map_err(|e| RError::Configuration(format!("{path}: {e}")));
    }
    Err(RError::EmptyAoi)
}

/// Restricts the network to the area of interest.
/// By node, both endpoints of an edge must lie inside; by edge, one is enough.
/// Nodes on the boundary count as inside.
pub fn truncate(network: &mut RoadNetwork, aoi: &MultiPolygon, by_edge: bool) -> RResult<usize> {
    let inside = network
        .nodes()
        .iter()
        .map(|n| aoi.intersects(&Point::new(n.longitude(), n.latitude())))
        .collect::<Vec<_>>();

    let removed = if by_edge {
        network.retain_edges(|e| inside[e.source()] || inside[e.target()]);
        network.remove_isolated_nodes()
    } else {
        let removed = network.retain_nodes(&inside);
        network.remove_isolated_nodes() + removed
    };

    log::info!("{removed} nodes outside of the area of interest removed");
    if network.nodes().is_empty() {
        return Err(RError::EmptyNetwork(String::from("truncation")));
    }
    Ok(removed)
}
