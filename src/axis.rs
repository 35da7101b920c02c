//! Physical axis order of stored 2-D arrays.
//!
//! Routing output does not fix the storage order of its arrays: the same file may hold
//! `flow(feature_id, time)` next to `velocity(time, feature_id)`. The order is therefore
//! inspected per array and carried as a [ReachAxis] tag from inspection through to the
//! permutation and transpose steps.

use crate::error::FlowmapError;

use ndarray::Axis;
use strum_macros::Display;

/// Which physical axis of a 2-D array is indexed by reach.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ReachAxis {
    /// Stored as `[reach][time]`
    First,
    /// Stored as `[time][reach]`
    Second,
}

impl ReachAxis {
    /// Physical axis holding reaches.
    pub fn reach_axis(self) -> Axis {
        match self {
            Self::First => Axis(0),
            Self::Second => Axis(1),
        }
    }

    /// Physical axis holding time steps.
    pub fn time_axis(self) -> Axis {
        match self {
            Self::First => Axis(1),
            Self::Second => Axis(0),
        }
    }
}

/// Determine which physical axis of an array is the reach axis.
///
/// # Arguments
///
/// * `variable`: Name of the array, for error reporting
/// * `dimensions`: Dimension names in storage order
/// * `reach_dimension`: Name of the reach identifier dimension
/// * `time_dimension`: Name of the time dimension
pub fn which_axis_is_reach<S: AsRef<str>>(
    variable: &str,
    dimensions: &[S],
    reach_dimension: &str,
    time_dimension: &str,
) -> Result<ReachAxis, FlowmapError> {
    let names: Vec<&str> = dimensions.iter().map(AsRef::as_ref).collect();
    match names.as_slice() {
        [first, second] if *first == reach_dimension && *second == time_dimension => {
            Ok(ReachAxis::First)
        }
        [first, second] if *first == time_dimension && *second == reach_dimension => {
            Ok(ReachAxis::Second)
        }
        _ => Err(FlowmapError::AmbiguousAxes {
            variable: variable.to_string(),
            dimensions: names.iter().map(|name| name.to_string()).collect(),
        }),
    }
}

/// Returns the position of the time dimension in an array of any rank, if it has one.
pub fn time_axis_position<S: AsRef<str>>(dimensions: &[S], time_dimension: &str) -> Option<Axis> {
    dimensions
        .iter()
        .position(|name| name.as_ref() == time_dimension)
        .map(Axis)
}
