use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{AccessConfig, LayerConfig};
use crate::error::RResult;
use crate::export::{create_file, write_nearest, write_od_matrix, write_snapped};
use crate::network::{NetworkArgs, RoadNetwork};
use crate::places::{Snapper, SnappedPlace, read_layer, unique_nodes};
use crate::routing::{RoutingGraph, calculate_od};

/// Builds the road network (or loads it from the cache) and saves it to `output`.
pub async fn run_prepare(
    args: &NetworkArgs,
    config: &AccessConfig,
    output: &str,
    force_rebuild_cache: bool,
    cache_prefix: Option<String>,
) -> RResult<RoadNetwork> {
    log::info!("Preparing the road network: {args}");

    let network = RoadNetwork::new(args, config, force_rebuild_cache, cache_prefix).await?;
    log::info!(
        "Road network: {} nodes, {} edges",
        network.nodes().len(),
        network.edges().len()
    );
    if let Some(stats) = network.stats() {
        log::info!(
            "Largest strongly connected component retains {:.2} % of the edges",
            stats.retained_percent()
        );
    }

    if let Some(parent) = Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    network.save(output)?;
    log::info!("Road network saved to {output}");

    Ok(network)
}

/// Snaps the origins and every destination layer, then writes one OD matrix per destination
/// layer along with the nearest facility of each origin. Returns the written files.
pub fn run_od(
    network: &RoadNetwork,
    config: &AccessConfig,
    output_dir: &str,
    num_threads: usize,
    verbose: bool,
) -> RResult<Vec<PathBuf>> {
    let start_time = Instant::now();
    log::info!("start: {}", chrono::Local::now().format("%a %b %e %T %Y"));

    let graph = RoutingGraph::new(network);
    let snapper = Snapper::new(network);
    let mut written = Vec::new();

    let origins = &config.origins;
    let snapped_origins = snap_layer(&snapper, origins, output_dir, &mut written)?;
    let origin_nodes = unique_nodes(&snapped_origins);
    log::info!(
        "{} {} snapped onto {} distinct nodes",
        snapped_origins.len(),
        origins.name,
        origin_nodes.len()
    );

    for destinations in &config.destinations {
        let snapped = snap_layer(&snapper, destinations, output_dir, &mut written)?;
        let destination_nodes = unique_nodes(&snapped);

        let matrix = calculate_od(
            &graph,
            &origin_nodes,
            &destination_nodes,
            config.matrix.fail_value,
            num_threads,
            verbose,
        )
        .to_unit(config.matrix.unit);

        let (rows, columns) = matrix.shape();
        log::info!(
            "OD matrix {}2{}: {rows}x{columns}, {} unreachable pairs",
            origins.name,
            destinations.name,
            matrix.num_unreachable()
        );

        let file_name = destinations.output_file_name(&origins.name);
        let (file, path) = create_file(output_dir, &file_name)?;
        write_od_matrix(file, &matrix, network)?;
        written.push(path);

        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(file_name.clone());
        let (file, path) = create_file(output_dir, &format!("{stem}_nearest.csv"))?;
        write_nearest(file, &matrix, network)?;
        written.push(path);
    }

    log::info!("end: {}", chrono::Local::now().format("%a %b %e %T %Y"));
    if verbose {
        log::info!("Time computing the OD matrices : {:.2?}", start_time.elapsed());
    }
    log::info!("Results written to {output_dir}");

    Ok(written)
}

/// Prepares the network then computes the OD matrices.
pub async fn run_pipeline(
    args: &NetworkArgs,
    config: &AccessConfig,
    output_dir: &str,
    force_rebuild_cache: bool,
    cache_prefix: Option<String>,
    num_threads: usize,
) -> RResult<Vec<PathBuf>> {
    let network_path = Path::new(output_dir)
        .join("network.bin")
        .to_string_lossy()
        .into_owned();
    let network = run_prepare(
        args,
        config,
        &network_path,
        force_rebuild_cache,
        cache_prefix,
    )
    .await?;
    run_od(&network, config, output_dir, num_threads, args.verbose)
}

fn snap_layer(
    snapper: &Snapper,
    layer: &LayerConfig,
    output_dir: &str,
    written: &mut Vec<PathBuf>,
) -> RResult<Vec<SnappedPlace>> {
    let places = read_layer(layer)?;
    let snapped = snapper.snap_layer(&places, layer.crs)?;

    let (file, path) = create_file(output_dir, &format!("{}_snapped.csv", layer.name))?;
    write_snapped(file, &snapped)?;
    written.push(path);

    Ok(snapped)
}
