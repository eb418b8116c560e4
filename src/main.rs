use std::error::Error;

use clap::Parser;
use log::LevelFilter;
use osm_access_engine::{
    AccessConfig, AccessState, Cli, Mode, RoadNetwork, run_od, run_pipeline, run_prepare,
    run_service,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Off)
        .with_module_level("osm_access_engine", LevelFilter::Info)
        .env()
        .init()?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AccessConfig::try_from(path.as_str())?,
        None => AccessConfig::default(),
    };

    match cli.mode {
        Mode::Prepare {
            network_args,
            output,
        } => {
            run_prepare(
                &network_args.finalize()?,
                &config,
                &output,
                cli.force_rebuild,
                cli.cache_prefix,
            )
            .await?;
        }
        Mode::Od {
            network,
            output_dir,
            verbose,
        } => {
            let network = RoadNetwork::load(&network)?;
            run_od(&network, &config, &output_dir, cli.num_threads, verbose)?;
        }
        Mode::Run {
            network_args,
            output_dir,
        } => {
            run_pipeline(
                &network_args.finalize()?,
                &config,
                &output_dir,
                cli.force_rebuild,
                cli.cache_prefix,
                cli.num_threads,
            )
            .await?;
        }
        Mode::Serve {
            network,
            address,
            port,
        } => {
            let network = RoadNetwork::load(&network)?;
            let state = AccessState::new(network, &config)?;
            run_service(state, address, port).await?;
        }
    }

    Ok(())
}
