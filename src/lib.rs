//! This crate provides flowmap, a streamflow map server. It pairs the river network geometry of a
//! hydrofabric GeoPackage with routed discharge time series from a NetCDF model output, and
//! serves both as JSON ready for rendering on a web map.
//!
//! The core is a set of pure functions over in-memory data:
//!
//! * [sort] computes the permutation that orders reach identifiers.
//! * [variable] picks the flow variable among the names routing models use.
//! * [axis] works out which axis of a 2-D variable runs over reaches.
//! * [resample] averages time steps into fixed-width hourly buckets.
//! * [align] produces `[time][reach]` matrices whose columns follow sorted reach identifiers.
//! * [geometry] computes the EPSG:4326 bounds and sorted identifiers of a feature layer.
//! * [assemble] combines both into one response.
//!
//! Input files are read by [geopackage] (through SQLite) and [netcdf_reader] (behind the
//! default `netcdf` cargo feature, which links the system NetCDF library). [pipeline] joins readers and
//! core, and [app] exposes it over HTTP.
//!
//! The service is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team.
//! * [Serde](serde) performs serialisation of JSON response data.
//! * [ndarray] provides n-dimensional arrays used in numerical computation.
//! * [rusqlite] reads GeoPackage files.

pub mod align;
pub mod app;
pub mod app_state;
pub mod assemble;
pub mod axis;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod geopackage;
pub mod metrics;
pub mod missing;
pub mod models;
pub mod netcdf_reader;
pub mod pipeline;
pub mod projection;
pub mod resample;
pub mod resource_manager;
pub mod response_cache;
pub mod server;
pub mod sort;
pub mod sources;
#[cfg(test)]
pub mod test_utils;
pub mod timestamps;
pub mod tracing;
pub mod validated_query;
pub mod variable;
