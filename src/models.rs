//! Data types and associated functions and methods

use crate::dataset::ReachId;

use axum::body::Bytes;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

/// Largest accepted resample width in hours (one leap year).
pub const MAX_RESAMPLE_HOURS: u32 = 8784;

fn default_resample() -> u32 {
    1
}

/// Query parameters for time series endpoints.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Validate)]
pub struct ResampleQuery {
    /// Resample width in hours
    #[serde(default = "default_resample")]
    #[validate(range(min = 1, max = 8784, message = "resample must be between 1 and 8784 hours"))]
    pub resample: u32,
}

impl Default for ResampleQuery {
    fn default() -> Self {
        Self {
            resample: default_resample(),
        }
    }
}

/// Bounding box and sorted identifiers of a feature layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeometrySummary {
    /// `[min_x, min_y, max_x, max_y]` in EPSG:4326, NaN when the layer has no coordinates
    pub bounds: [f64; 4],
    /// Feature identifiers in ascending order
    pub feature_ids: Vec<ReachId>,
    /// Number of features
    pub count: usize,
}

/// Time series with rows indexed by time step and columns by sorted reach identifier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlignedTimeSeries {
    /// Time step labels, `YYYY-MM-DDTHH:MM:SS`
    pub time_steps: Vec<String>,
    /// Reach identifiers in ascending order
    pub feature_ids: Vec<ReachId>,
    #[serde(serialize_with = "serialize_rows")]
    pub flow: Array2<f64>,
    #[serde(serialize_with = "serialize_optional_rows")]
    pub velocity: Option<Array2<f64>>,
    #[serde(serialize_with = "serialize_optional_rows")]
    pub depth: Option<Array2<f64>>,
    pub num_times: usize,
    pub num_features: usize,
    pub resample_hours: u32,
}

/// Names of the files a combined response was built from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceNames {
    pub geopackage: String,
    pub netcdf: String,
}

/// Geometry and time series of one run, ready for rendering.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CombinedResponse {
    pub geopackage: GeometrySummary,
    pub netcdf: AlignedTimeSeries,
    /// Base names of the files actually read: `uploaded.gpkg` and `uploaded.nc` for staged
    /// uploads, or the discovered GeoPackage and `troute_*.nc` names for a run folder.
    pub files: SourceNames,
}

struct Row<'a>(ArrayView1<'a, f64>);

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Serialise a matrix as a list of rows.
fn serialize_rows<S: Serializer>(matrix: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(matrix.rows().into_iter().map(Row))
}

fn serialize_optional_rows<S: Serializer>(
    matrix: &Option<Array2<f64>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match matrix {
        Some(matrix) => serialize_rows(matrix, serializer),
        None => serializer.serialize_none(),
    }
}

/// Pre-serialised JSON response body.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonBody(pub Bytes);

impl JsonBody {
    /// Serialise a value.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Size of the body in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoResponse for JsonBody {
    fn into_response(self) -> Response {
        (
            [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
            self.0,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;
    use serde_json::json;
    use serde_test::{assert_de_tokens, assert_de_tokens_error, Token};

    fn series() -> AlignedTimeSeries {
        AlignedTimeSeries {
            time_steps: vec![
                "2023-01-01T00:00:00".to_string(),
                "2023-01-01T01:00:00".to_string(),
            ],
            feature_ids: vec![101, 102],
            flow: array![[2.0, 1.0], [f64::NAN, 3.0]],
            velocity: None,
            depth: Some(array![[0.5, 0.25], [0.0, 1.0]]),
            num_times: 2,
            num_features: 2,
            resample_hours: 1,
        }
    }

    #[test]
    fn resample_query_default() {
        assert_de_tokens(
            &ResampleQuery::default(),
            &[
                Token::Struct {
                    name: "ResampleQuery",
                    len: 0,
                },
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn resample_query() {
        let query = ResampleQuery { resample: 6 };
        assert_de_tokens(
            &query,
            &[
                Token::Struct {
                    name: "ResampleQuery",
                    len: 1,
                },
                Token::Str("resample"),
                Token::U32(6),
                Token::StructEnd,
            ],
        );
        query.validate().unwrap();
    }

    #[test]
    fn resample_query_negative() {
        assert_de_tokens_error::<ResampleQuery>(
            &[
                Token::Struct {
                    name: "ResampleQuery",
                    len: 1,
                },
                Token::Str("resample"),
                Token::I32(-1),
                Token::StructEnd,
            ],
            "invalid value: integer `-1`, expected u32",
        );
    }

    #[test]
    #[should_panic(expected = "resample must be between 1 and 8784 hours")]
    fn resample_query_zero() {
        ResampleQuery { resample: 0 }.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "resample must be between 1 and 8784 hours")]
    fn resample_query_too_large() {
        ResampleQuery {
            resample: MAX_RESAMPLE_HOURS + 1,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn serialize_series() {
        let value = serde_json::to_value(series()).unwrap();
        assert_eq!(
            json!({
                "time_steps": ["2023-01-01T00:00:00", "2023-01-01T01:00:00"],
                "feature_ids": [101, 102],
                "flow": [[2.0, 1.0], [null, 3.0]],
                "velocity": null,
                "depth": [[0.5, 0.25], [0.0, 1.0]],
                "num_times": 2,
                "num_features": 2,
                "resample_hours": 1
            }),
            value
        );
    }

    #[test]
    fn serialize_transposed_matrix_by_rows() {
        let mut series = series();
        series.flow = array![[1.0, 3.0], [2.0, 4.0]].reversed_axes();
        let value = serde_json::to_value(series).unwrap();
        assert_eq!(json!([[1.0, 2.0], [3.0, 4.0]]), value["flow"]);
    }

    #[test]
    fn serialize_geometry_without_coordinates() {
        let summary = GeometrySummary {
            bounds: [f64::NAN; 4],
            feature_ids: vec![],
            count: 0,
        };
        assert_eq!(
            json!({"bounds": [null, null, null, null], "feature_ids": [], "count": 0}),
            serde_json::to_value(summary).unwrap()
        );
    }

    #[test]
    fn json_body() {
        let body = JsonBody::from_value(&json!({"status": "ok"})).unwrap();
        assert_eq!(r#"{"status":"ok"}"#.len(), body.len());
        let response = body.into_response();
        assert_eq!(
            "application/json",
            response.headers()[&header::CONTENT_TYPE]
        );
    }
}
