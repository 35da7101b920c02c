//! In-memory time series dataset.
//!
//! A [TimeSeriesDataset] is the fully materialised content of one routing output file: named
//! dimensions, a time coordinate, integer identifier coordinates and numeric variables. Variables
//! keep the dimension order they were stored with; nothing here assumes a layout.

use crate::error::FlowmapError;

use ndarray::{ArrayD, ArrayViewD};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Stream reach identifier.
pub type ReachId = i64;

/// A numeric variable and the names of its dimensions in storage order.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    dimensions: Vec<String>,
    data: ArrayD<f64>,
}

impl Variable {
    /// Dimension names in storage order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Values, shaped by [Variable::dimensions].
    pub fn data(&self) -> ArrayViewD<f64> {
        self.data.view()
    }
}

/// Coordinate values attached to a dimension.
#[derive(Clone, Debug, PartialEq)]
enum Coordinate {
    Time(Vec<OffsetDateTime>),
    Ids(Vec<ReachId>),
}

impl Coordinate {
    fn len(&self) -> usize {
        match self {
            Self::Time(times) => times.len(),
            Self::Ids(ids) => ids.len(),
        }
    }
}

/// Dimensions, coordinates and variables of one time series file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeriesDataset {
    dimensions: BTreeMap<String, usize>,
    coordinates: BTreeMap<String, Coordinate>,
    variables: BTreeMap<String, Variable>,
}

impl TimeSeriesDataset {
    /// Returns an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dimension.
    ///
    /// Declaring an existing dimension again is only allowed with the same length.
    pub fn add_dimension(&mut self, name: &str, len: usize) -> Result<(), FlowmapError> {
        match self.dimensions.get(name) {
            Some(&declared) if declared != len => Err(FlowmapError::ShapeMismatch {
                variable: name.to_string(),
                expected: vec![declared],
                actual: vec![len],
            }),
            _ => {
                self.dimensions.insert(name.to_string(), len);
                Ok(())
            }
        }
    }

    /// Attach time values to a dimension, declaring it if necessary.
    pub fn add_time_coordinate(
        &mut self,
        dimension: &str,
        times: Vec<OffsetDateTime>,
    ) -> Result<(), FlowmapError> {
        self.add_coordinate(dimension, Coordinate::Time(times))
    }

    /// Attach identifier values to a dimension, declaring it if necessary.
    pub fn add_id_coordinate(
        &mut self,
        dimension: &str,
        ids: Vec<ReachId>,
    ) -> Result<(), FlowmapError> {
        self.add_coordinate(dimension, Coordinate::Ids(ids))
    }

    fn add_coordinate(
        &mut self,
        dimension: &str,
        coordinate: Coordinate,
    ) -> Result<(), FlowmapError> {
        self.add_dimension(dimension, coordinate.len())?;
        self.coordinates.insert(dimension.to_string(), coordinate);
        Ok(())
    }

    /// Add a variable.
    ///
    /// Every dimension must already be declared and the array shape must match the declared
    /// dimension lengths in order.
    pub fn add_variable(
        &mut self,
        name: &str,
        dimensions: Vec<String>,
        data: ArrayD<f64>,
    ) -> Result<(), FlowmapError> {
        let expected = dimensions
            .iter()
            .map(|dimension| {
                self.dimension_len(dimension)
                    .ok_or_else(|| FlowmapError::UnknownDimension {
                        variable: name.to_string(),
                        dimension: dimension.clone(),
                    })
            })
            .collect::<Result<Vec<usize>, _>>()?;
        if expected != data.shape() {
            return Err(FlowmapError::ShapeMismatch {
                variable: name.to_string(),
                expected,
                actual: data.shape().to_vec(),
            });
        }
        self.variables
            .insert(name.to_string(), Variable { dimensions, data });
        Ok(())
    }

    /// Length of a dimension, if declared.
    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    /// Whether a dimension is declared.
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.contains_key(name)
    }

    /// Declared dimensions and their lengths.
    pub fn dimensions(&self) -> impl Iterator<Item = (&str, usize)> {
        self.dimensions
            .iter()
            .map(|(name, len)| (name.as_str(), *len))
    }

    /// Time values attached to a dimension.
    pub fn time_coordinate(&self, dimension: &str) -> Option<&[OffsetDateTime]> {
        match self.coordinates.get(dimension) {
            Some(Coordinate::Time(times)) => Some(times),
            _ => None,
        }
    }

    /// Stored identifier values of a dimension.
    pub fn id_coordinate(&self, dimension: &str) -> Option<&[ReachId]> {
        match self.coordinates.get(dimension) {
            Some(Coordinate::Ids(ids)) => Some(ids),
            _ => None,
        }
    }

    /// Identifiers along a dimension.
    ///
    /// A dimension without identifier values is indexed by position.
    pub fn reach_ids(&self, dimension: &str) -> Option<Vec<ReachId>> {
        match self.id_coordinate(dimension) {
            Some(ids) => Some(ids.to_vec()),
            None => self
                .dimension_len(dimension)
                .map(|len| (0..len as ReachId).collect()),
        }
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// All variables, by name.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables
            .iter()
            .map(|(name, variable)| (name.as_str(), variable))
    }

    /// Names of all variables and coordinates.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .keys()
            .chain(self.coordinates.keys())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{array, IxDyn};
    use time::macros::datetime;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn coordinates_declare_dimensions() {
        let mut dataset = TimeSeriesDataset::new();
        dataset
            .add_time_coordinate("time", vec![datetime!(2023-01-01 0:00 UTC)])
            .unwrap();
        dataset.add_id_coordinate("feature_id", vec![3, 1]).unwrap();
        assert_eq!(Some(1), dataset.dimension_len("time"));
        assert_eq!(Some(2), dataset.dimension_len("feature_id"));
        assert_eq!(Some(&[3, 1][..]), dataset.id_coordinate("feature_id"));
        assert_eq!(Some(vec![3, 1]), dataset.reach_ids("feature_id"));
        assert_eq!(
            Some(&[datetime!(2023-01-01 0:00 UTC)][..]),
            dataset.time_coordinate("time")
        );
    }

    #[test]
    fn coordinate_length_must_match_dimension() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_dimension("feature_id", 3).unwrap();
        match dataset.add_id_coordinate("feature_id", vec![1, 2]).unwrap_err() {
            FlowmapError::ShapeMismatch {
                variable,
                expected,
                actual,
            } => {
                assert_eq!("feature_id", variable);
                assert_eq!(vec![3], expected);
                assert_eq!(vec![2], actual);
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn redeclared_dimension_keeps_length() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_id_coordinate("feature_id", vec![4, 5]).unwrap();
        dataset.add_dimension("feature_id", 2).unwrap();
        match dataset.add_dimension("feature_id", 3).unwrap_err() {
            FlowmapError::ShapeMismatch {
                variable,
                expected,
                actual,
            } => {
                assert_eq!("feature_id", variable);
                assert_eq!(vec![2], expected);
                assert_eq!(vec![3], actual);
            }
            err => panic!("unexpected error {err:?}"),
        };
        assert_eq!(Some(2), dataset.dimension_len("feature_id"));
        assert_eq!(Some(vec![4, 5]), dataset.reach_ids("feature_id"));
    }

    #[test]
    fn reach_ids_default_to_positions() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_dimension("feature_id", 3).unwrap();
        assert_eq!(None, dataset.id_coordinate("feature_id"));
        assert_eq!(Some(vec![0, 1, 2]), dataset.reach_ids("feature_id"));
        assert_eq!(None, dataset.reach_ids("link"));
    }

    #[test]
    fn add_variable() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_dimension("time", 3).unwrap();
        dataset.add_dimension("feature_id", 2).unwrap();
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        dataset
            .add_variable("flow", dims(&["feature_id", "time"]), data.clone())
            .unwrap();
        let variable = dataset.variable("flow").unwrap();
        assert_eq!(dims(&["feature_id", "time"]), variable.dimensions());
        assert_eq!(data.view(), variable.data());
    }

    #[test]
    fn add_variable_shape_mismatch() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_dimension("time", 3).unwrap();
        dataset.add_dimension("feature_id", 2).unwrap();
        let data = ArrayD::zeros(IxDyn(&[3, 2]));
        match dataset
            .add_variable("flow", dims(&["feature_id", "time"]), data)
            .unwrap_err()
        {
            FlowmapError::ShapeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(vec![2, 3], expected);
                assert_eq!(vec![3, 2], actual);
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn add_variable_unknown_dimension() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_dimension("time", 1).unwrap();
        let data = ArrayD::zeros(IxDyn(&[1, 1]));
        match dataset
            .add_variable("flow", dims(&["time", "station"]), data)
            .unwrap_err()
        {
            FlowmapError::UnknownDimension {
                variable,
                dimension,
            } => {
                assert_eq!("flow", variable);
                assert_eq!("station", dimension);
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn names_include_coordinates() {
        let mut dataset = TimeSeriesDataset::new();
        dataset.add_id_coordinate("feature_id", vec![1]).unwrap();
        dataset
            .add_variable(
                "q",
                dims(&["feature_id"]),
                ArrayD::zeros(IxDyn(&[1])),
            )
            .unwrap();
        let names: Vec<&str> = dataset.names().collect();
        assert_eq!(vec!["q", "feature_id"], names);
    }
}
