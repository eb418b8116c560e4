mod aoi;
mod cleaning;
mod components;
mod osm;
mod speeds;

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::time::Instant;

use kd_tree::{KdPoint, KdTree};
use serde::{Deserialize, Serialize};

use crate::config::{AccessConfig, NetworkConfig, SpeedTable};
use crate::error::{RError, RResult};
use crate::utils::{Crs, cache_path, resolve_local_path};

pub use aoi::read_aoi;
pub use components::NetworkStats;

/// Where the road network comes from.
#[derive(Debug, Clone)]
pub struct NetworkArgs {
    /// Path or URL of an .osm.pbf extract.
    pub pbf: String,
    /// Polygon (GeoJSON or shapefile) delimiting the study area.
    pub aoi: String,
    pub aoi_crs: Crs,
    pub verbose: bool,
}

impl Display for NetworkArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pbf: {}, aoi: {}, aoi_crs: {}",
            self.pbf, self.aoi, self.aoi_crs
        )
    }
}

// ------------------------------------------------------------------------------------------------
// --- RoadNetwork
// ------------------------------------------------------------------------------------------------

/// Directed drivable road network whose edges carry a travel time in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadNetwork {
    nodes: Vec<RoadNode>,
    edges: Vec<RoadEdge>,
    crs: Crs,
    stats: Option<NetworkStats>,
}

impl RoadNetwork {
    /// Loads the road network from the cache or builds it (import, truncation, cleaning,
    /// connectivity repair and travel times).
    /// If an URL is provided for the extract, it is downloaded automatically.
    pub async fn new(
        args: &NetworkArgs,
        config: &AccessConfig,
        force_rebuild_cache: bool,
        cache_prefix: Option<String>,
    ) -> RResult<Self> {
        let settings = serde_json::to_string(&(&config.network, &config.speeds))?;
        let aoi_crs = args.aoi_crs.to_string();
        let cache_path = cache_path(cache_prefix, &[&args.pbf, &args.aoi, &aoi_crs, &settings]);

        let network = if Path::new(&cache_path).exists() && !force_rebuild_cache {
            log::info!("Loading road network from cache ({cache_path})...");

            // If loading from cache fails, None is returned.
            Self::load(&cache_path).ok()
        } else {
            None
        };

        let network = if let Some(network) = network {
            network
        } else {
            let pbf_path = resolve_local_path(&args.pbf).await?;
            let aoi = read_aoi(&args.aoi, args.aoi_crs)?;
            let network = Self::build(
                &pbf_path,
                &aoi,
                &config.network,
                &config.speeds,
                args.verbose,
            )?;

            log::info!("Building cache...");
            network.save(&cache_path)?;
            network
        };

        Ok(network)
    }

    /// Runs the whole preparation on a local extract.
    pub fn build(
        pbf_path: &str,
        aoi: &geo::MultiPolygon,
        config: &NetworkConfig,
        speeds: &SpeedTable,
        verbose: bool,
    ) -> RResult<Self> {
        let start_time = Instant::now();
        log::info!("start: {}", chrono::Local::now().format("%a %b %e %T %Y"));

        let mut network = osm::read_pbf(pbf_path, config.crs, verbose)?;
        network.prepare(aoi, config, speeds, verbose)?;

        log::info!("end: {}", chrono::Local::now().format("%a %b %e %T %Y"));
        if verbose {
            log::info!("Time preparing the network : {:.2?}", start_time.elapsed());
        }
        Ok(network)
    }

    /// Everything after the import, on an already loaded network.
    pub fn prepare(
        &mut self,
        aoi: &geo::MultiPolygon,
        config: &NetworkConfig,
        speeds: &SpeedTable,
        verbose: bool,
    ) -> RResult<()> {
        aoi::truncate(self, aoi, config.truncate_by_edge)?;
        if self.edges.is_empty() {
            return Err(RError::EmptyNetwork(String::from("truncation")));
        }

        cleaning::clean(self, config.junction_tolerance, verbose);
        if self.edges.is_empty() {
            return Err(RError::EmptyNetwork(String::from("cleaning")));
        }

        self.stats = Some(components::keep_largest_component(self)?);
        self.set_travel_times(speeds)?;
        Ok(())
    }

    /// Recomputes the travel time of every edge, returns how many edges used the default speed.
    pub fn set_travel_times(&mut self, speeds: &SpeedTable) -> RResult<usize> {
        speeds::convert_network_to_time(self, speeds)
    }

    pub fn from_parts(nodes: Vec<RoadNode>, edges: Vec<RoadEdge>, crs: Crs) -> Self {
        Self {
            nodes,
            edges,
            crs,
            stats: None,
        }
    }

    pub fn load(path: &str) -> RResult<Self> {
        let data = fs::read(path)?;
        let network = postcard::from_bytes(&data)?;
        Ok(network)
    }

    pub fn save(&self, path: &str) -> RResult<()> {
        let data = postcard::to_stdvec(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    // Getters/Setters

    pub fn nodes(&self) -> &Vec<RoadNode> {
        &self.nodes
    }

    pub fn edges(&self) -> &Vec<RoadEdge> {
        &self.edges
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn stats(&self) -> Option<&NetworkStats> {
        self.stats.as_ref()
    }

    // Functions

    pub fn node(&self, index: usize) -> &RoadNode {
        &self.nodes[index]
    }

    pub fn osm_id(&self, index: usize) -> i64 {
        self.nodes[index].osm_id()
    }

    /// Spatial index over the node positions in the working CRS.
    pub fn node_tree(&self) -> KdTree<NodePoint> {
        KdTree::build_by_ordered_float(
            self.nodes
                .iter()
                .enumerate()
                .map(|(index, node)| NodePoint {
                    point: [node.x(), node.y()],
                    index,
                })
                .collect(),
        )
    }

    /// Keeps the edges for which `f` returns true.
    fn retain_edges<F: FnMut(&RoadEdge) -> bool>(&mut self, f: F) -> usize {
        let before = self.edges.len();
        self.edges.retain(f);
        before - self.edges.len()
    }

    /// Keeps the nodes marked in `keep`, drops the edges touching a removed node
    /// and renumbers the remaining ones.
    fn retain_nodes(&mut self, keep: &[bool]) -> usize {
        let mut new_index = vec![usize::MAX; self.nodes.len()];
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for (i, node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if keep[i] {
                new_index[i] = nodes.len();
                nodes.push(node);
            }
        }
        let removed = new_index.len() - nodes.len();
        self.nodes = nodes;

        self.edges.retain(|e| keep[e.source] && keep[e.target]);
        for edge in &mut self.edges {
            edge.source = new_index[edge.source];
            edge.target = new_index[edge.target];
        }

        removed
    }

    /// Removes the nodes without any incident edge.
    fn remove_isolated_nodes(&mut self) -> usize {
        let mut keep = vec![false; self.nodes.len()];
        for edge in &self.edges {
            keep[edge.source] = true;
            keep[edge.target] = true;
        }
        self.retain_nodes(&keep)
    }
}

// ------------------------------------------------------------------------------------------------
// --- RoadNode
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    osm_id: i64,
    longitude: f64,
    latitude: f64,
    // Position in the working CRS of the network.
    x: f64,
    y: f64,
}

impl RoadNode {
    pub fn new(osm_id: i64, longitude: f64, latitude: f64, crs: Crs) -> Self {
        let (x, y) = crs.from_wgs84(longitude, latitude);
        Self {
            osm_id,
            longitude,
            latitude,
            x,
            y,
        }
    }

    // Getters/Setters

    pub fn osm_id(&self) -> i64 {
        self.osm_id
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NodePoint {
    point: [f64; 2],
    index: usize,
}

impl NodePoint {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl KdPoint for NodePoint {
    type Scalar = f64;
    type Dim = typenum::U2;

    fn at(&self, k: usize) -> f64 {
        self.point[k]
    }
}

// ------------------------------------------------------------------------------------------------
// --- RoadEdge
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    source: usize,
    target: usize,
    way_id: i64,
    highway: String,
    length: f64,      // In meters.
    travel_time: f64, // In seconds.
}

impl RoadEdge {
    pub fn new(source: usize, target: usize, way_id: i64, highway: &str, length: f64) -> Self {
        Self {
            source,
            target,
            way_id,
            highway: highway.to_string(),
            length,
            travel_time: 0.0,
        }
    }

    // Getters/Setters

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn way_id(&self) -> i64 {
        self.way_id
    }

    pub fn highway(&self) -> &str {
        &self.highway
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn travel_time(&self) -> f64 {
        self.travel_time
    }

    pub fn set_travel_time(&mut self, value: f64) {
        self.travel_time = value;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use geo::{LineString, MultiPolygon, Polygon};
    use pretty_assertions::assert_eq;
    use test_log::test;

    /// Nodes laid out on a line near Tinghir, 0.001° of longitude apart (about 95 m).
    pub fn line_network(num_nodes: usize, edges: &[(usize, usize)]) -> RoadNetwork {
        let crs = Crs::default();
        let nodes = (0..num_nodes)
            .map(|i| RoadNode::new(100 + i as i64, -5.53 + 0.001 * i as f64, 31.51, crs))
            .collect();
        let edges = edges
            .iter()
            .map(|&(s, t)| RoadEdge::new(s, t, 1, "residential", 100.0))
            .collect();
        RoadNetwork::from_parts(nodes, edges, crs)
    }

    pub fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]),
            vec![],
        )])
    }

    #[test]
    fn test_retain_nodes_renumbers_edges() {
        let mut network = line_network(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let removed = network.retain_nodes(&[true, false, true, true]);
        assert_eq!(removed, 1);
        assert_eq!(network.nodes().len(), 3);
        let pairs = network
            .edges()
            .iter()
            .map(|e| (e.source(), e.target()))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(1, 2), (2, 0)]);
        assert_eq!(network.osm_id(1), 102);
    }

    #[test]
    fn test_remove_isolated_nodes() {
        let mut network = line_network(3, &[(0, 2)]);
        assert_eq!(network.remove_isolated_nodes(), 1);
        assert_eq!(network.osm_id(1), 102);
        assert_eq!(network.edges()[0].target(), 1);
    }

    #[test]
    fn test_prepare() {
        // 0 <-> 1 <-> 2 <-> 3, plus a one-way dead end 3 -> 4 and a node outside of the area.
        let mut network = line_network(
            6,
            &[
                (0, 1),
                (1, 0),
                (1, 2),
                (2, 1),
                (2, 3),
                (3, 2),
                (3, 4),
                (4, 5),
                (5, 4),
            ],
        );
        let aoi = square(-5.54, 31.5, -5.5255, 31.52);
        network
            .prepare(
                &aoi,
                &NetworkConfig::default(),
                &SpeedTable::default(),
                false,
            )
            .unwrap();

        assert_eq!(network.nodes().len(), 4);
        assert_eq!(network.edges().len(), 6);
        let stats = network.stats().unwrap();
        assert_eq!(stats.edges_before(), 7);
        assert_eq!(stats.edges_after(), 6);
        // 100 m at 30 km/h.
        assert!((network.edges()[0].travel_time() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load() {
        let network = line_network(2, &[(0, 1)]);
        let path = std::env::temp_dir()
            .join("osm_access_engine_test_network.cache")
            .to_string_lossy()
            .into_owned();
        network.save(&path).unwrap();
        let loaded = RoadNetwork::load(&path).unwrap();
        assert_eq!(loaded.nodes(), network.nodes());
        assert_eq!(loaded.edges(), network.edges());
        assert_eq!(loaded.crs(), network.crs());
    }
}
