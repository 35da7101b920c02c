//! Time series alignment.
//!
//! Produces matrices indexed `[time][reach]` whose columns follow ascending reach identifier,
//! whatever axis order each variable was stored with.

use crate::axis::{which_axis_is_reach, ReachAxis};
use crate::dataset::{TimeSeriesDataset, Variable};
use crate::error::FlowmapError;
use crate::models::AlignedTimeSeries;
use crate::resample::{resample_dataset, BucketOrigin};
use crate::sort::{duplicate_ids, sort_permutation};
use crate::timestamps::format_timestamp;
use crate::variable::{resolve_flow_variable, DEPTH_VARIABLE, VELOCITY_VARIABLE};

use ndarray::{Array2, Ix2};
use std::borrow::Cow;
use tracing::{debug, instrument, warn};

/// Alignment options.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignOptions {
    /// Resample width in hours; 1 leaves the time axis untouched
    pub bucket_hours: u32,
    /// Anchoring of resample buckets
    pub origin: BucketOrigin,
    /// Name of the reach identifier dimension
    pub reach_dimension: String,
    /// Name of the time dimension
    pub time_dimension: String,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            bucket_hours: 1,
            origin: BucketOrigin::default(),
            reach_dimension: "feature_id".to_string(),
            time_dimension: "time".to_string(),
        }
    }
}

/// Align a dataset into `[time][reach]` matrices with sorted reach identifiers.
///
/// The flow variable is required; velocity and depth are included when present.
#[instrument(skip_all, fields(bucket_hours = options.bucket_hours))]
pub fn align(
    dataset: &TimeSeriesDataset,
    options: &AlignOptions,
) -> Result<AlignedTimeSeries, FlowmapError> {
    for dimension in [&options.time_dimension, &options.reach_dimension] {
        if !dataset.has_dimension(dimension) {
            return Err(FlowmapError::MissingDimension {
                dimension: dimension.clone(),
            });
        }
    }
    if options.bucket_hours == 0 {
        return Err(FlowmapError::InvalidBucketWidth { hours: 0 });
    }
    let flow_variable = resolve_flow_variable(dataset.names())?;
    debug!(flow_variable, "Resolved flow variable");

    let dataset = if options.bucket_hours > 1 {
        Cow::Owned(resample_dataset(
            dataset,
            options.bucket_hours,
            options.origin,
            &options.time_dimension,
        )?)
    } else {
        Cow::Borrowed(dataset)
    };
    let times = dataset
        .time_coordinate(&options.time_dimension)
        .ok_or_else(|| FlowmapError::MissingTimeCoordinate {
            dimension: options.time_dimension.clone(),
        })?;

    // Present as the dimension exists.
    let ids = dataset
        .reach_ids(&options.reach_dimension)
        .unwrap_or_default();
    let (feature_ids, permutation) = sort_permutation(&ids);
    let duplicates = duplicate_ids(&feature_ids);
    if !duplicates.is_empty() {
        warn!(
            count = duplicates.len(),
            first = duplicates[0],
            "Duplicate reach identifiers in time series"
        );
    }

    let flow = dataset
        .variable(flow_variable)
        .ok_or_else(|| FlowmapError::VariableNotFound {
            candidates: flow_variable.to_string(),
        })?;
    let flow = canonical_matrix(flow_variable, flow, &permutation, options)?;
    let velocity = optional_matrix(&dataset, VELOCITY_VARIABLE, &permutation, options)?;
    let depth = optional_matrix(&dataset, DEPTH_VARIABLE, &permutation, options)?;

    let time_steps = times
        .iter()
        .map(format_timestamp)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        num_times = time_steps.len(),
        num_features = feature_ids.len(),
        has_velocity = velocity.is_some(),
        has_depth = depth.is_some(),
        "Aligned time series"
    );
    Ok(AlignedTimeSeries {
        num_times: time_steps.len(),
        num_features: feature_ids.len(),
        time_steps,
        feature_ids,
        flow,
        velocity,
        depth,
        resample_hours: options.bucket_hours,
    })
}

fn optional_matrix(
    dataset: &TimeSeriesDataset,
    name: &str,
    permutation: &[usize],
    options: &AlignOptions,
) -> Result<Option<Array2<f64>>, FlowmapError> {
    dataset
        .variable(name)
        .map(|variable| canonical_matrix(name, variable, permutation, options))
        .transpose()
}

/// Reorder the reach axis of a variable by `permutation` and lay it out `[time][reach]`.
fn canonical_matrix(
    name: &str,
    variable: &Variable,
    permutation: &[usize],
    options: &AlignOptions,
) -> Result<Array2<f64>, FlowmapError> {
    let reach_axis = which_axis_is_reach(
        name,
        variable.dimensions(),
        &options.reach_dimension,
        &options.time_dimension,
    )?;
    let data = variable.data().into_dimensionality::<Ix2>()?;
    let axis = reach_axis.reach_axis();
    if permutation.len() != data.len_of(axis) {
        return Err(FlowmapError::PermutationMismatch {
            variable: name.to_string(),
            permutation: permutation.len(),
            axis: data.len_of(axis),
        });
    }
    let sorted = data.select(axis, permutation);
    let canonical = match reach_axis {
        ReachAxis::First => sorted.reversed_axes(),
        ReachAxis::Second => sorted,
    };
    Ok(canonical.as_standard_layout().into_owned())
}
