//! Combined geometry and time series responses.

use crate::dataset::ReachId;
use crate::error::FlowmapError;
use crate::models::{AlignedTimeSeries, CombinedResponse, GeometrySummary, SourceNames};

use hashbrown::HashSet;
use tracing::{debug, warn};

/// Response assembly options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Reject responses whose geometry and time series identifier sets differ
    pub strict_ids: bool,
}

/// Combine a geometry summary and an aligned time series into one response.
///
/// The two identifier sets are independent unless `options.strict_ids` is set, in which case
/// any difference is an [FlowmapError::IdentifierMismatch].
pub fn assemble(
    geometry: GeometrySummary,
    series: AlignedTimeSeries,
    files: SourceNames,
    options: &AssembleOptions,
) -> Result<CombinedResponse, FlowmapError> {
    let (missing_from_geometry, missing_from_time_series) =
        identifier_differences(&geometry.feature_ids, &series.feature_ids);
    if missing_from_geometry + missing_from_time_series > 0 {
        if options.strict_ids {
            return Err(FlowmapError::IdentifierMismatch {
                missing_from_geometry,
                missing_from_time_series,
            });
        }
        warn!(
            missing_from_geometry,
            missing_from_time_series, "Feature identifiers differ between inputs"
        );
    } else {
        debug!(count = geometry.feature_ids.len(), "Feature identifiers match");
    }
    Ok(CombinedResponse {
        geopackage: geometry,
        netcdf: series,
        files,
    })
}

/// Counts of distinct time series ids absent from the geometry, and of distinct geometry ids
/// absent from the time series.
fn identifier_differences(geometry: &[ReachId], series: &[ReachId]) -> (usize, usize) {
    let geometry: HashSet<ReachId> = geometry.iter().copied().collect();
    let series: HashSet<ReachId> = series.iter().copied().collect();
    (
        series.difference(&geometry).count(),
        geometry.difference(&series).count(),
    )
}
