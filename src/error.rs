//! Error handling.

use axum::{
    extract::rejection::QueryRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};

/// Flowmap error type
///
/// This type encapsulates the various errors that may occur while loading, aligning and
/// assembling data. Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum FlowmapError {
    /// Variable dimensions do not match their declared lengths
    #[error("variable {variable} has shape {actual:?} but its dimensions have lengths {expected:?}")]
    ShapeMismatch {
        variable: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Variable refers to a dimension that the dataset does not declare
    #[error("variable {variable} uses undeclared dimension {dimension}")]
    UnknownDimension { variable: String, dimension: String },

    /// Reach axis of an array cannot be determined from its dimension names
    #[error("cannot determine the reach axis of {variable} from dimensions {dimensions:?}")]
    AmbiguousAxes {
        variable: String,
        dimensions: Vec<String>,
    },

    /// Requested dataset dimension is absent
    #[error("{dimension} dimension not found in time series")]
    MissingDimension { dimension: String },

    /// Time dimension has no coordinate values
    #[error("{dimension} coordinate not found in time series")]
    MissingTimeCoordinate { dimension: String },

    /// None of the flow variable aliases are present
    #[error("Flow variable not found (tried {candidates})")]
    VariableNotFound { candidates: String },

    /// Feature layer is absent from the GeoPackage
    #[error("layer {layer} not found in GeoPackage")]
    MissingLayer { layer: String },

    /// Feature layer lacks a required column
    #[error("column {column} not found in layer {layer}")]
    MissingColumn { layer: String, column: String },

    /// Feature identifier is not integer-like
    #[error("feature identifier {value} is not an integer")]
    InvalidIdentifier { value: String },

    /// Resample bucket width must be positive
    #[error("resample width must be at least 1 hour, got {hours}")]
    InvalidBucketWidth { hours: u32 },

    /// File name is not acceptable
    #[error("invalid file name {filename}")]
    InvalidFileName { filename: String },

    /// Coordinate reference system with no available projection to EPSG:4326
    #[error("unsupported coordinate reference system {crs}")]
    UnsupportedCrs { crs: String },

    /// Geometry and time series identifier sets differ
    #[error("feature identifiers differ: {missing_from_geometry} only in time series, {missing_from_time_series} only in geometry")]
    IdentifierMismatch {
        missing_from_geometry: usize,
        missing_from_time_series: usize,
    },

    /// Insufficient memory to process request
    #[error("Insufficient memory to process request ({requested} > {total})")]
    InsufficientMemory { requested: usize, total: usize },

    /// Error deserialising the query string
    #[error("request query is not valid")]
    RequestQueryRejection(#[from] QueryRejection),

    /// Error validating request parameters
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Input file does not exist
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Error reading an input file
    #[error("failed to read input file")]
    Io(#[from] std::io::Error),

    /// Error reading a GeoPackage
    #[error("error reading GeoPackage")]
    Sqlite(#[from] rusqlite::Error),

    /// Error reading a NetCDF file
    #[cfg(feature = "netcdf")]
    #[error("error reading NetCDF file")]
    NetCDF(#[from] netcdf::Error),

    /// NetCDF reading was not compiled in
    #[error("NetCDF support is not enabled in this build")]
    NetCDFSupportDisabled,

    /// Malformed geometry blob
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// Time coordinate units could not be decoded
    #[error("cannot decode time units {units:?}")]
    InvalidTimeUnits { units: String },

    /// Time step cannot be rendered as a label
    #[error("failed to format time step")]
    TimestampFormat(#[from] time::error::Format),

    /// Error creating ndarray Array from Shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Permutation and reach axis lengths disagree
    #[error("permutation of length {permutation} cannot reorder reach axis of length {axis} in {variable}")]
    PermutationMismatch {
        variable: String,
        permutation: usize,
        axis: usize,
    },

    /// Error serialising a response body
    #[error("failed to serialise response")]
    Serialization(#[from] serde_json::Error),

    /// Blocking extraction task panicked or was cancelled
    #[error("extraction task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl IntoResponse for FlowmapError {
    /// Convert from a `FlowmapError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    error: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody {
            error: message,
            caused_by,
        }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    #[serde(flatten)]
    body: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            body: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<FlowmapError> for ErrorResponse {
    /// Convert from a `FlowmapError` into an `ErrorResponse`.
    fn from(error: FlowmapError) -> Self {
        let response = match &error {
            // Bad request
            FlowmapError::ShapeMismatch { .. }
            | FlowmapError::UnknownDimension { .. }
            | FlowmapError::MissingDimension { .. }
            | FlowmapError::MissingTimeCoordinate { .. }
            | FlowmapError::VariableNotFound { .. }
            | FlowmapError::MissingLayer { .. }
            | FlowmapError::MissingColumn { .. }
            | FlowmapError::InvalidIdentifier { .. }
            | FlowmapError::InvalidBucketWidth { .. }
            | FlowmapError::InvalidFileName { .. }
            | FlowmapError::UnsupportedCrs { .. }
            | FlowmapError::IdentifierMismatch { .. }
            | FlowmapError::InsufficientMemory { .. }
            | FlowmapError::RequestQueryRejection(_)
            | FlowmapError::RequestDataValidation(_) => Self::bad_request(&error),

            // Not found
            FlowmapError::FileNotFound { .. } => Self::not_found(&error),

            // Internal server error
            FlowmapError::Io(_)
            | FlowmapError::Sqlite(_)
            | FlowmapError::NetCDFSupportDisabled
            | FlowmapError::InvalidGeometry { .. }
            | FlowmapError::InvalidTimeUnits { .. }
            | FlowmapError::TimestampFormat(_)
            | FlowmapError::ShapeInvalid(_)
            | FlowmapError::Serialization(_)
            | FlowmapError::TaskJoin(_)
            | FlowmapError::SemaphoreAcquireError(_)
            | FlowmapError::TryFromInt(_) => Self::internal_server_error(&error),

            #[cfg(feature = "netcdf")]
            FlowmapError::NetCDF(_) => Self::internal_server_error(&error),

            // Alignment invariants. These indicate a logic error, not bad input.
            FlowmapError::AmbiguousAxes { .. } | FlowmapError::PermutationMismatch { .. } => {
                Self::internal_server_error(&error)
            }
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
