use std::net::Ipv4Addr;

use clap::{Parser, Subcommand};

use crate::RResult;
use crate::network::NetworkArgs;

#[derive(Parser, Debug, Clone)]
pub struct NetworkArgsBuilder {
    /// Path or URL of the OpenStreetMap extract (.osm.pbf)
    #[arg(long, default_value_t = String::from("data/morocco-latest.osm.pbf"))]
    pbf: String,
    /// Area of interest: a polygon in a GeoJSON file or a shapefile
    #[arg(long, default_value_t = String::from("data/tinghirP.shp"))]
    aoi: String,
    /// Coordinate reference system of the area of interest
    #[arg(long, default_value_t = String::from("EPSG:4326"))]
    aoi_crs: String,
    /// Verbose on or off
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl NetworkArgsBuilder {
    pub fn finalize(self) -> RResult<NetworkArgs> {
        let Self {
            pbf,
            aoi,
            aoi_crs,
            verbose,
        } = self;

        Ok(NetworkArgs {
            pbf,
            aoi,
            aoi_crs: aoi_crs.parse()?,
            verbose,
        })
    }
}

#[derive(Subcommand)]
pub enum Mode {
    /// Build the drivable road network of the area and save it
    Prepare {
        #[command(flatten)]
        network_args: NetworkArgsBuilder,
        /// Where the prepared network is written
        #[arg(short, long, default_value_t = String::from("output/network.bin"))]
        output: String,
    },
    /// Compute the OD matrices on a prepared network
    Od {
        /// Network written by the prepare mode
        #[arg(short, long, default_value_t = String::from("output/network.bin"))]
        network: String,
        /// Directory receiving the csv files
        #[arg(short, long, default_value_t = String::from("output"))]
        output_dir: String,
        /// Verbose on or off
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
    /// Prepare the network then compute the OD matrices
    Run {
        #[command(flatten)]
        network_args: NetworkArgsBuilder,
        /// Directory receiving the network and the csv files
        #[arg(short, long, default_value_t = String::from("output"))]
        output_dir: String,
    },
    /// Serve mode to a given port
    Serve {
        /// Network written by the prepare mode
        #[arg(short, long, default_value_t = String::from("output/network.bin"))]
        network: String,
        /// Tpv4 served, defaults to 0.0.0.0
        #[arg(short, long, default_value_t = Ipv4Addr::new(0, 0, 0, 0))]
        address: Ipv4Addr,
        /// Port exposed on the server
        #[arg(short, long, default_value_t = 8100)]
        port: u16,
    },
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Prefix path for the cache, when absent defaults lo "./"
    #[arg(short, long)]
    pub cache_prefix: Option<String>,
    /// Force to rebuild the cache
    #[arg(short, long, default_value_t = false)]
    pub force_rebuild: bool,
    // Maximum number of cores used. If 0 is given all cores are automatically assigned
    #[arg(long, default_value_t = 4)]
    pub num_threads: usize,
    /// Configuration file (.toml or .json), built-in Tinghir settings when absent
    #[arg(long)]
    pub config: Option<String>,
    /// What mode is used
    #[command(subcommand)]
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::utils::Crs;

    #[test]
    fn test_parse_prepare() {
        let cli = Cli::parse_from([
            "osm-access-engine",
            "--num-threads",
            "2",
            "prepare",
            "--pbf",
            "https://download.geofabrik.de/africa/morocco-latest.osm.pbf",
            "--aoi",
            "tinghir.geojson",
            "--aoi-crs",
            "epsg:32629",
        ]);
        assert_eq!(cli.num_threads, 2);
        assert!(cli.config.is_none());

        let Mode::Prepare {
            network_args,
            output,
        } = cli.mode
        else {
            panic!("expected the prepare mode");
        };
        let args = network_args.finalize().unwrap();
        assert_eq!(args.aoi, "tinghir.geojson");
        assert_eq!(args.aoi_crs, Crs::default());
        assert_eq!(output, "output/network.bin");
    }

    #[test]
    fn test_invalid_crs() {
        let cli = Cli::parse_from(["osm-access-engine", "run", "--aoi-crs", "EPSG:2154"]);
        let Mode::Run { network_args, .. } = cli.mode else {
            panic!("expected the run mode");
        };
        assert!(network_args.finalize().is_err());
    }
}
