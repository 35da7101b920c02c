//! Routing output reader.
//!
//! Loads a NetCDF file into a [TimeSeriesDataset]: dimensions, the decoded time coordinate, reach
//! identifiers and every numeric variable laid over the time or reach dimension. Reading needs
//! the `netcdf` cargo feature, which links the system NetCDF library.

use crate::dataset::TimeSeriesDataset;
use crate::error::FlowmapError;

use std::path::Path;

/// Load the dataset stored at `path`.
///
/// # Arguments
///
/// * `path`: NetCDF file
/// * `time_dimension`: Name of the time dimension and coordinate
/// * `reach_dimension`: Name of the reach dimension and identifier coordinate
#[cfg(feature = "netcdf")]
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn read_dataset(
    path: &Path,
    time_dimension: &str,
    reach_dimension: &str,
) -> Result<TimeSeriesDataset, FlowmapError> {
    use crate::missing::Encoding;
    use crate::timestamps::TimeUnits;

    use ndarray::{ArrayD, IxDyn};
    use tracing::debug;

    if !path.is_file() {
        return Err(FlowmapError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let file = netcdf::open(path)?;
    let mut dataset = TimeSeriesDataset::new();
    for dimension in file.dimensions() {
        dataset.add_dimension(&dimension.name(), dimension.len())?;
    }

    if let Some(variable) = file.variable(time_dimension) {
        let units = string_attribute(&variable, "units").ok_or_else(|| {
            FlowmapError::InvalidTimeUnits {
                units: String::new(),
            }
        })?;
        let units: TimeUnits = units.parse()?;
        let raw: Vec<f64> = variable.get_values(..)?;
        dataset.add_time_coordinate(time_dimension, units.decode_all(&raw)?)?;
    }
    if let Some(variable) = file.variable(reach_dimension) {
        let ids: Vec<i64> = variable.get_values(..)?;
        dataset.add_id_coordinate(reach_dimension, ids)?;
    }

    for variable in file.variables() {
        let name = variable.name();
        if name == time_dimension || name == reach_dimension {
            continue;
        }
        let dimensions: Vec<String> = variable
            .dimensions()
            .iter()
            .map(|dimension| dimension.name())
            .collect();
        if !dimensions
            .iter()
            .any(|dimension| dimension == time_dimension || dimension == reach_dimension)
        {
            continue;
        }
        let mut values: Vec<f64> = match variable.get_values(..) {
            Ok(values) => values,
            Err(err) => {
                debug!(variable = %name, error = %err, "Skipping non-numeric variable");
                continue;
            }
        };
        encoding(&variable).decode_in_place(&mut values);
        let shape: Vec<usize> = variable
            .dimensions()
            .iter()
            .map(|dimension| dimension.len())
            .collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        dataset.add_variable(&name, dimensions, data)?;
    }
    debug!(
        variables = dataset.variables().count(),
        "Read time series dataset"
    );
    Ok(dataset)
}

/// Load the dataset stored at `path`.
///
/// This build has no NetCDF support and always fails.
#[cfg(not(feature = "netcdf"))]
pub fn read_dataset(
    path: &Path,
    _time_dimension: &str,
    _reach_dimension: &str,
) -> Result<TimeSeriesDataset, FlowmapError> {
    if !path.is_file() {
        return Err(FlowmapError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Err(FlowmapError::NetCDFSupportDisabled)
}

#[cfg(feature = "netcdf")]
fn encoding(variable: &netcdf::Variable) -> crate::missing::Encoding {
    let scalar = |name: &str| numeric_attribute(variable, name).and_then(|v| v.first().copied());
    crate::missing::Encoding::from_attributes(
        &numeric_attribute(variable, "_FillValue").unwrap_or_default(),
        &numeric_attribute(variable, "missing_value").unwrap_or_default(),
        scalar("valid_min"),
        scalar("valid_max"),
        &numeric_attribute(variable, "valid_range").unwrap_or_default(),
        scalar("scale_factor"),
        scalar("add_offset"),
    )
}

#[cfg(feature = "netcdf")]
fn numeric_attribute(variable: &netcdf::Variable, name: &str) -> Option<Vec<f64>> {
    use netcdf::AttributeValue;

    fn widen<T: Copy + Into<f64>>(values: &[T]) -> Vec<f64> {
        values.iter().map(|value| (*value).into()).collect()
    }

    let value = variable.attribute_value(name)?.ok()?;
    Some(match value {
        AttributeValue::Double(value) => vec![value],
        AttributeValue::Doubles(values) => values,
        AttributeValue::Float(value) => vec![value.into()],
        AttributeValue::Floats(values) => widen(&values),
        AttributeValue::Schar(value) => vec![value.into()],
        AttributeValue::Schars(values) => widen(&values),
        AttributeValue::Uchar(value) => vec![value.into()],
        AttributeValue::Uchars(values) => widen(&values),
        AttributeValue::Short(value) => vec![value.into()],
        AttributeValue::Shorts(values) => widen(&values),
        AttributeValue::Ushort(value) => vec![value.into()],
        AttributeValue::Ushorts(values) => widen(&values),
        AttributeValue::Int(value) => vec![value.into()],
        AttributeValue::Ints(values) => widen(&values),
        AttributeValue::Uint(value) => vec![value.into()],
        AttributeValue::Uints(values) => widen(&values),
        AttributeValue::Longlong(value) => vec![value as f64],
        AttributeValue::Longlongs(values) => values.iter().map(|value| *value as f64).collect(),
        AttributeValue::Ulonglong(value) => vec![value as f64],
        AttributeValue::Ulonglongs(values) => values.iter().map(|value| *value as f64).collect(),
        _ => return None,
    })
}

#[cfg(feature = "netcdf")]
fn string_attribute(variable: &netcdf::Variable, name: &str) -> Option<String> {
    match variable.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(value) => Some(value),
        _ => None,
    }
}
