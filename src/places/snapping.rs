use kd_tree::KdTree;
use rustc_hash::FxHashSet;

use crate::error::{RError, RResult};
use crate::network::{NodePoint, RoadNetwork};
use crate::utils::Crs;

use super::{Place, SnappedPlace};

/// Finds the closest network node of a point, in the working CRS of the network.
pub struct Snapper {
    tree: KdTree<NodePoint>,
    osm_ids: Vec<i64>,
    crs: Crs,
}

impl Snapper {
    pub fn new(network: &RoadNetwork) -> Self {
        Self {
            tree: network.node_tree(),
            osm_ids: network.nodes().iter().map(|n| n.osm_id()).collect(),
            crs: network.crs(),
        }
    }

    /// Index of the nearest node and the distance to it (meters), `x` and `y` being expressed in
    /// the working CRS.
    pub fn nearest(&self, x: f64, y: f64) -> Option<(usize, f64)> {
        self.tree
            .nearest(&[x, y])
            .map(|found| (found.item.index(), found.squared_distance.sqrt()))
    }

    pub fn snap(&self, place: &Place, crs: Crs) -> RResult<SnappedPlace> {
        let (x, y) = self.crs.transform(crs, place.x(), place.y());
        let (node, distance) = self
            .nearest(x, y)
            .ok_or_else(|| RError::EmptyNetwork(String::from("snapping")))?;
        Ok(SnappedPlace::new(
            place.clone(),
            node,
            self.osm_ids[node],
            distance,
        ))
    }

    pub fn snap_layer(&self, places: &[Place], crs: Crs) -> RResult<Vec<SnappedPlace>> {
        let snapped = places
            .iter()
            .map(|p| self.snap(p, crs))
            .collect::<RResult<Vec<_>>>()?;

        if let Some(farthest) = snapped.iter().map(|s| s.nn_dist()).reduce(f64::max) {
            log::info!(
                "{} places snapped, farthest one is {:.1} m away from the network",
                snapped.len(),
                farthest
            );
        }
        Ok(snapped)
    }
}

/// Distinct nearest nodes in order of first appearance.
pub fn unique_nodes(snapped: &[SnappedPlace]) -> Vec<usize> {
    let mut seen = FxHashSet::default();
    snapped
        .iter()
        .map(|s| s.node())
        .filter(|&node| seen.insert(node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::network::tests::line_network;

    #[test]
    fn test_snap_projected_place() {
        let network = line_network(3, &[(0, 1), (1, 2)]);
        let snapper = Snapper::new(&network);

        // 10 m north of the second node.
        let node = network.node(1);
        let place = Place::new(String::from("V1"), node.x(), node.y() + 10.0);
        let snapped = snapper.snap(&place, Crs::default()).unwrap();

        assert_eq!(snapped.node(), 1);
        assert_eq!(snapped.nn(), 101);
        assert!((snapped.nn_dist() - 10.0).abs() < 1e-6);
        assert_eq!(snapped.place(), &place);
    }

    #[test]
    fn test_snap_geographic_place() {
        let network = line_network(3, &[(0, 1), (1, 2)]);
        let snapper = Snapper::new(&network);

        let place = Place::new(String::from("M1"), -5.5281, 31.5101);
        let snapped = snapper.snap(&place, Crs::Wgs84).unwrap();
        assert_eq!(snapped.nn(), 102);
        assert!(snapped.nn_dist() > 5.0 && snapped.nn_dist() < 25.0);
    }

    #[test]
    fn test_unique_nodes() {
        let network = line_network(3, &[(0, 1), (1, 2)]);
        let snapper = Snapper::new(&network);
        let places = [2, 0, 2, 1, 0]
            .iter()
            .map(|&i| {
                let node = network.node(i);
                Place::new(i.to_string(), node.x() + 1.0, node.y())
            })
            .collect::<Vec<_>>();

        let snapped = snapper.snap_layer(&places, Crs::default()).unwrap();
        assert_eq!(unique_nodes(&snapped), vec![2, 0, 1]);
    }
}
