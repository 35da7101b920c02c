//! Missing data descriptors and packed value decoding.
//!
//! Stored variables may mark missing data and may be packed into a smaller integer type. We
//! support the conventional attributes:
//!
//! * `_FillValue` and `missing_value` (single or multiple values)
//! * `valid_min`, `valid_max` and `valid_range`
//! * `scale_factor` and `add_offset`
//!
//! Missing values are tested against the stored (packed) value and become NaN after decoding.

/// Missing data
///
/// Each variant describes one way in which stored values are marked as missing.
#[derive(Clone, Debug, PartialEq)]
pub enum Missing<T> {
    /// A single missing value
    MissingValue(T),
    /// Multiple missing values
    MissingValues(Vec<T>),
    /// Valid minimum
    ValidMin(T),
    /// Valid maximum
    ValidMax(T),
    /// Valid range
    ValidRange(T, T),
}

impl<T: PartialOrd> Missing<T> {
    /// Filter function to check whether the provided value is a 'missing' value
    pub fn is_missing(&self, x: &T) -> bool {
        match self {
            Missing::MissingValue(value) => x == value,
            Missing::MissingValues(values) => values.contains(x),
            Missing::ValidMin(min) => x < min,
            Missing::ValidMax(max) => x > max,
            Missing::ValidRange(min, max) => x < min || x > max,
        }
    }
}

/// Linear packing applied to stored values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Packing {
    pub scale_factor: f64,
    pub add_offset: f64,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            add_offset: 0.0,
        }
    }
}

/// Everything needed to turn stored values into physical values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Encoding {
    pub missing: Vec<Missing<f64>>,
    pub packing: Option<Packing>,
}

impl Encoding {
    /// Build an encoding from attribute values.
    ///
    /// Empty attribute vectors are treated as absent. A `valid_range` with fewer than two values
    /// is ignored.
    pub fn from_attributes(
        fill_value: &[f64],
        missing_value: &[f64],
        valid_min: Option<f64>,
        valid_max: Option<f64>,
        valid_range: &[f64],
        scale_factor: Option<f64>,
        add_offset: Option<f64>,
    ) -> Self {
        let mut missing = vec![];
        for values in [fill_value, missing_value] {
            match values {
                [] => (),
                [value] => missing.push(Missing::MissingValue(*value)),
                values => missing.push(Missing::MissingValues(values.to_vec())),
            }
        }
        match (valid_range, valid_min, valid_max) {
            ([min, max, ..], _, _) => missing.push(Missing::ValidRange(*min, *max)),
            (_, Some(min), Some(max)) => missing.push(Missing::ValidRange(min, max)),
            (_, Some(min), None) => missing.push(Missing::ValidMin(min)),
            (_, None, Some(max)) => missing.push(Missing::ValidMax(max)),
            _ => (),
        }
        let packing = match (scale_factor, add_offset) {
            (None, None) => None,
            (scale_factor, add_offset) => Some(Packing {
                scale_factor: scale_factor.unwrap_or(1.0),
                add_offset: add_offset.unwrap_or(0.0),
            }),
        };
        Self { missing, packing }
    }

    /// Decode a single stored value.
    pub fn decode(&self, raw: f64) -> f64 {
        if self.missing.iter().any(|missing| missing.is_missing(&raw)) {
            return f64::NAN;
        }
        match self.packing {
            Some(Packing {
                scale_factor,
                add_offset,
            }) => raw * scale_factor + add_offset,
            None => raw,
        }
    }

    /// Decode stored values in place.
    pub fn decode_in_place(&self, values: &mut [f64]) {
        if self.missing.is_empty() && self.packing.is_none() {
            return;
        }
        values.iter_mut().for_each(|value| *value = self.decode(*value));
    }
}
