//! End to end extraction: read input files and run them through the core.
//!
//! Every endpoint goes through these functions, so file reading, alignment and assembly behave
//! the same whichever way the input files were found.

use crate::align::{align, AlignOptions};
use crate::assemble::{assemble, AssembleOptions};
use crate::error::FlowmapError;
use crate::geometry::extract_geometry;
use crate::geopackage::read_layer;
use crate::models::{AlignedTimeSeries, CombinedResponse, GeometrySummary};
use crate::netcdf_reader::read_dataset;
use crate::sources::SourceFiles;

use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Options for one extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
    /// GeoPackage feature layer
    pub layer: String,
    /// Identifier column of the layer
    pub id_column: String,
    pub align: AlignOptions,
    pub assemble: AssembleOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            layer: "flowpaths".to_string(),
            id_column: "id".to_string(),
            align: AlignOptions::default(),
            assemble: AssembleOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Copy of these options with another resample width.
    pub fn with_resample(&self, bucket_hours: u32) -> Self {
        let mut options = self.clone();
        options.align.bucket_hours = bucket_hours;
        options
    }
}

/// Summarise the feature layer of a GeoPackage.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_geometry(path: &Path, options: &PipelineOptions) -> Result<GeometrySummary, FlowmapError> {
    let start = Instant::now();
    let layer = read_layer(path, &options.layer, &options.id_column)?;
    debug!(elapsed = ?start.elapsed(), "Read GeoPackage");
    let summary = extract_geometry(&layer)?;
    info!(
        features = summary.count,
        elapsed = ?start.elapsed(),
        "Extracted geometry"
    );
    Ok(summary)
}

/// Read and align the time series of a NetCDF file.
#[instrument(skip_all, fields(path = %path.display(), bucket_hours = options.align.bucket_hours))]
pub fn load_time_series(
    path: &Path,
    options: &PipelineOptions,
) -> Result<AlignedTimeSeries, FlowmapError> {
    let start = Instant::now();
    let dataset = read_dataset(
        path,
        &options.align.time_dimension,
        &options.align.reach_dimension,
    )?;
    debug!(elapsed = ?start.elapsed(), "Read NetCDF file");
    let series = align(&dataset, &options.align)?;
    info!(
        times = series.num_times,
        features = series.num_features,
        elapsed = ?start.elapsed(),
        "Aligned time series"
    );
    Ok(series)
}

/// Load both files of a pair and combine them.
#[instrument(skip_all)]
pub fn load_combined(
    files: &SourceFiles,
    options: &PipelineOptions,
) -> Result<CombinedResponse, FlowmapError> {
    let geometry = load_geometry(&files.geopackage, options)?;
    let series = load_time_series(&files.netcdf, options)?;
    assemble(geometry, series, files.names(), &options.assemble)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{self, FixtureFeature};

    fn staged_geopackage(dir: &Path) -> std::path::PathBuf {
        let path = dir.join(crate::sources::STAGED_GEOPACKAGE);
        test_utils::write_geopackage(
            &path,
            "flowpaths",
            4326,
            &[
                FixtureFeature::line(102, &[[-94.0, 30.5], [-93.0, 31.0]]),
                FixtureFeature::line(101, &[[-95.0, 29.0]]),
            ],
        );
        path
    }

    #[test]
    fn with_resample() {
        let options = PipelineOptions::default().with_resample(6);
        assert_eq!(6, options.align.bucket_hours);
        assert_eq!("flowpaths", options.layer);
    }

    #[test]
    fn geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_geopackage(dir.path());
        let summary = load_geometry(&path, &PipelineOptions::default()).unwrap();
        assert_eq!(vec![101, 102], summary.feature_ids);
        assert_eq!([-95.0, 29.0, -93.0, 31.0], summary.bounds);
    }

    #[test]
    fn geometry_from_other_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_geopackage(dir.path());
        let options = PipelineOptions {
            layer: "divides".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            load_geometry(&path, &options),
            Err(FlowmapError::MissingLayer { .. })
        ));
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn combined_without_netcdf_support() {
        let dir = tempfile::tempdir().unwrap();
        staged_geopackage(dir.path());
        std::fs::write(dir.path().join(crate::sources::STAGED_NETCDF), b"").unwrap();
        let files = SourceFiles::staged(dir.path()).unwrap();
        assert!(matches!(
            load_combined(&files, &PipelineOptions::default()),
            Err(FlowmapError::NetCDFSupportDisabled)
        ));
    }

    #[cfg(feature = "netcdf")]
    #[test]
    fn combined() {
        use ndarray::array;

        let dir = tempfile::tempdir().unwrap();
        staged_geopackage(dir.path());
        test_utils::write_netcdf(&dir.path().join(crate::sources::STAGED_NETCDF));
        let files = SourceFiles::staged(dir.path()).unwrap();
        let options = PipelineOptions {
            assemble: AssembleOptions { strict_ids: true },
            ..Default::default()
        };

        let response = load_combined(&files, &options).unwrap();
        assert_eq!(vec![101, 102], response.geopackage.feature_ids);
        assert_eq!(vec![101, 102], response.netcdf.feature_ids);
        assert_eq!(
            array![[2.0, 1.0], [4.0, 3.0], [6.0, 5.0]],
            response.netcdf.flow
        );
        let depth = response.netcdf.depth.unwrap();
        assert!(depth[[0, 1]].is_nan());
        assert_eq!(0.5, depth[[1, 0]]);
        assert_eq!("uploaded.nc", response.files.netcdf);
    }

    #[cfg(feature = "netcdf")]
    #[test]
    fn resampled_time_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("troute_output.nc");
        test_utils::write_netcdf(&path);
        let series = load_time_series(&path, &PipelineOptions::default().with_resample(3)).unwrap();
        assert_eq!(vec!["2023-01-01T00:00:00".to_string()], series.time_steps);
        assert_eq!(ndarray::array![[4.0, 3.0]], series.flow);
        assert_eq!(3, series.resample_hours);
    }
}
