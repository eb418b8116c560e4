use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::RResult;
use crate::network::RoadNetwork;
use crate::places::SnappedPlace;
use crate::routing::OdMatrix;

/// Writes the matrix with the OSM ids of the destination nodes as header and the OSM id of the
/// origin node leading each row. The top left cell stays empty.
pub fn write_od_matrix<W: Write>(
    writer: W,
    matrix: &OdMatrix,
    network: &RoadNetwork,
) -> RResult<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let header = std::iter::once(String::new())
        .chain(
            matrix
                .destinations()
                .iter()
                .map(|&node| network.osm_id(node).to_string()),
        )
        .collect::<Vec<_>>();
    writer.write_record(&header)?;

    for (i, &origin) in matrix.origins().iter().enumerate() {
        let record = std::iter::once(network.osm_id(origin).to_string())
            .chain(matrix.row(i).into_iter().map(format_value))
            .collect::<Vec<_>>();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// One row per snapped place: `id,x,y,NN,NN_dist`.
pub fn write_snapped<W: Write>(writer: W, snapped: &[SnappedPlace]) -> RResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["id", "x", "y", "NN", "NN_dist"])?;

    for s in snapped {
        writer.write_record([
            s.place().id().to_string(),
            s.place().x().to_string(),
            s.place().y().to_string(),
            s.nn().to_string(),
            format_value(s.nn_dist()),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Travel time from each origin node to the closest destination, `fail_value` when none is
/// reachable.
pub fn write_nearest<W: Write>(
    writer: W,
    matrix: &OdMatrix,
    network: &RoadNetwork,
) -> RResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["NN", "nearest"])?;

    for (&origin, nearest) in matrix.origins().iter().zip(matrix.nearest()) {
        writer.write_record([
            network.osm_id(origin).to_string(),
            format_value(nearest.unwrap_or(matrix.fail_value())),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Creates `directory` if needed and returns the path of `file_name` inside it.
pub fn output_path(directory: &str, file_name: &str) -> RResult<PathBuf> {
    fs::create_dir_all(directory)?;
    Ok(Path::new(directory).join(file_name))
}

pub fn create_file(directory: &str, file_name: &str) -> RResult<(File, PathBuf)> {
    let path = output_path(directory, file_name)?;
    let file = File::create(&path)?;
    Ok((file, path))
}

// Floats always carry a decimal part ("24.0"), like the dataframes the files used to come from.
fn format_value(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use crate::network::tests::line_network;
    use crate::places::Place;

    #[test]
    fn test_write_od_matrix() {
        let network = line_network(3, &[(0, 1)]);
        let matrix = OdMatrix::new(
            vec![0, 2],
            vec![1, 0],
            vec![vec![Some(90.0), Some(0.0)], vec![None, Some(30.0)]],
            9999999.0,
        )
        .to_unit(crate::config::TimeUnit::Minutes);

        let mut buffer = Vec::new();
        write_od_matrix(&mut buffer, &matrix, &network).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            ",101,100\n100,1.5,0.0\n102,166666.65,0.5\n"
        );

        let mut buffer = Vec::new();
        write_nearest(&mut buffer, &matrix, &network).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "NN,nearest\n100,0.0\n102,0.5\n"
        );
    }

    #[test]
    fn test_write_snapped() {
        let snapped = vec![SnappedPlace::new(
            Place::new(String::from("V1"), 300100.5, 3487000.0),
            4,
            123456,
            12.25,
        )];
        let mut buffer = Vec::new();
        write_snapped(&mut buffer, &snapped).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "id,x,y,NN,NN_dist\nV1,300100.5,3487000,123456,12.25\n"
        );
    }

    #[test]
    fn test_output_path() {
        let directory = std::env::temp_dir().join("osm_access_engine_test_output/nested");
        let path = output_path(directory.to_str().unwrap(), "OD_village2health.csv").unwrap();
        assert!(directory.exists());
        assert_eq!(path, directory.join("OD_village2health.csv"));
    }
}
