//! Temporal resampling.
//!
//! Time steps are grouped into fixed-width buckets and each bucket is replaced by the mean of its
//! non-missing values. Buckets are closed on the left and labelled by their left edge. The first
//! output bucket is the earliest non-empty one and the last is the latest non-empty one; empty
//! buckets in between are kept and hold NaN.

use crate::axis::time_axis_position;
use crate::dataset::TimeSeriesDataset;
use crate::error::FlowmapError;

use ndarray::{Array, Array2, ArrayView, ArrayView2, Axis, Dimension, RemoveAxis, Zip};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use time::{OffsetDateTime, Time, UtcOffset};
use tracing::debug;

const NANOS_PER_HOUR: i128 = 3_600_000_000_000;

/// Where bucket boundaries are anchored.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BucketOrigin {
    /// Midnight UTC of the day holding the first time step
    #[default]
    StartDay,
    /// The first time step
    Start,
}

/// Assignment of time steps to buckets.
#[derive(Clone, Debug, PartialEq)]
pub struct Buckets {
    /// Left edge of each output bucket
    labels: Vec<OffsetDateTime>,
    /// Output bucket of each input time step
    assignment: Vec<usize>,
}

impl Buckets {
    /// Assign time steps to buckets of `bucket_hours` hours.
    ///
    /// # Arguments
    ///
    /// * `times`: Time coordinate, in any order
    /// * `bucket_hours`: Bucket width in hours, at least 1
    /// * `origin`: Bucket anchoring
    pub fn new(
        times: &[OffsetDateTime],
        bucket_hours: u32,
        origin: BucketOrigin,
    ) -> Result<Self, FlowmapError> {
        if bucket_hours == 0 {
            return Err(FlowmapError::InvalidBucketWidth { hours: 0 });
        }
        let Some(first) = times.iter().min() else {
            return Ok(Self {
                labels: vec![],
                assignment: vec![],
            });
        };
        let origin = match origin {
            BucketOrigin::StartDay => first.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT),
            BucketOrigin::Start => *first,
        }
        .unix_timestamp_nanos();
        let width = NANOS_PER_HOUR * i128::from(bucket_hours);

        let indices: Vec<i128> = times
            .iter()
            .map(|time| (time.unix_timestamp_nanos() - origin).div_euclid(width))
            .collect();
        // Both exist as times is non-empty.
        let low = indices.iter().copied().min().unwrap_or_default();
        let high = indices.iter().copied().max().unwrap_or_default();

        let labels = (low..=high)
            .map(|index| {
                OffsetDateTime::from_unix_timestamp_nanos(origin + index * width)
                    .map_err(|_| FlowmapError::InvalidBucketWidth { hours: bucket_hours })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let assignment = indices
            .iter()
            .map(|index| usize::try_from(index - low))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { labels, assignment })
    }

    /// Number of output buckets.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no output buckets.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Left edge of each output bucket.
    pub fn labels(&self) -> &[OffsetDateTime] {
        &self.labels
    }

    /// Output bucket of each input time step.
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Average `values` over each bucket along `time_axis`.
    ///
    /// NaN values do not contribute to a mean; a bucket with no values is NaN.
    pub fn mean<D>(&self, values: ArrayView<f64, D>, time_axis: Axis) -> Array<f64, D>
    where
        D: Dimension + RemoveAxis,
    {
        let mut shape = values.raw_dim();
        shape[time_axis.index()] = self.len();
        let mut totals = Array::<(f64, u32), D>::from_elem(shape, (0.0, 0));
        for (step, lane) in values.axis_iter(time_axis).enumerate() {
            let mut target = totals.index_axis_mut(time_axis, self.assignment[step]);
            Zip::from(&mut target)
                .and(&lane)
                .for_each(|(sum, count), &value| {
                    if !value.is_nan() {
                        *sum += value;
                        *count += 1;
                    }
                });
        }
        totals.mapv(|(sum, count)| {
            if count == 0 {
                f64::NAN
            } else {
                sum / f64::from(count)
            }
        })
    }
}

/// Resample a `[time][reach]` matrix into buckets of `bucket_hours` hours.
///
/// Returns the bucket labels and the resampled matrix. A width of one hour returns the input
/// unchanged.
pub fn resample(
    times: &[OffsetDateTime],
    bucket_hours: u32,
    values: ArrayView2<f64>,
    origin: BucketOrigin,
) -> Result<(Vec<OffsetDateTime>, Array2<f64>), FlowmapError> {
    if times.len() != values.nrows() {
        return Err(FlowmapError::ShapeMismatch {
            variable: "values".to_string(),
            expected: vec![times.len(), values.ncols()],
            actual: values.shape().to_vec(),
        });
    }
    match bucket_hours {
        0 => Err(FlowmapError::InvalidBucketWidth { hours: 0 }),
        1 => Ok((times.to_vec(), values.to_owned())),
        _ => {
            let buckets = Buckets::new(times, bucket_hours, origin)?;
            let resampled = buckets.mean(values, Axis(0));
            Ok((buckets.labels, resampled))
        }
    }
}

/// Resample every variable of a dataset that has a time dimension.
///
/// Variables without a time dimension and identifier coordinates are carried over unchanged.
pub fn resample_dataset(
    dataset: &TimeSeriesDataset,
    bucket_hours: u32,
    origin: BucketOrigin,
    time_dimension: &str,
) -> Result<TimeSeriesDataset, FlowmapError> {
    let times = dataset
        .time_coordinate(time_dimension)
        .ok_or_else(|| FlowmapError::MissingTimeCoordinate {
            dimension: time_dimension.to_string(),
        })?;
    match bucket_hours {
        0 => return Err(FlowmapError::InvalidBucketWidth { hours: 0 }),
        1 => return Ok(dataset.clone()),
        _ => (),
    }
    let buckets = Buckets::new(times, bucket_hours, origin)?;
    debug!(
        bucket_hours,
        input_steps = times.len(),
        output_steps = buckets.len(),
        "resampling"
    );

    let mut resampled = TimeSeriesDataset::new();
    for (name, len) in dataset.dimensions() {
        if name == time_dimension {
            resampled.add_dimension(name, buckets.len())?;
        } else {
            resampled.add_dimension(name, len)?;
            if let Some(ids) = dataset.id_coordinate(name) {
                resampled.add_id_coordinate(name, ids.to_vec())?;
            }
        }
    }
    resampled.add_time_coordinate(time_dimension, buckets.labels().to_vec())?;
    for (name, variable) in dataset.variables() {
        let data = match time_axis_position(variable.dimensions(), time_dimension) {
            Some(axis) => buckets.mean(variable.data(), axis),
            None => variable.data().to_owned(),
        };
        resampled.add_variable(name, variable.dimensions().to_vec(), data)?;
    }
    Ok(resampled)
}
