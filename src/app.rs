//! HTTP routes.

use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::error::FlowmapError;
use crate::metrics;
use crate::models::{JsonBody, ResampleQuery};
use crate::pipeline::{load_combined, load_geometry, load_time_series};
use crate::response_cache::CacheKey;
use crate::sources::{resolve_file, FileKind};
use crate::validated_query::ValidatedQuery;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Service that serves the application, with trailing slashes removed from request paths.
pub type Service = NormalizePath<Router>;

/// Returns a [Service] for the given arguments.
pub fn service(args: &CommandLineArgs) -> Service {
    let state = Arc::new(AppState::new(args));
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Returns the application router.
pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(config))
        .route("/api/netcdf/:filename", get(netcdf))
        .route("/api/geopackage/:filename", get(geopackage))
        .route("/api/load-local-files", get(load_local_files))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(
            TraceLayer::new_for_http()
                .on_request(metrics::request_counter)
                .on_response(metrics::record_response_metrics),
        )
        .with_state(state)
}

/// Log where input files will be found.
pub fn init(args: &CommandLineArgs) {
    match &args.run_dir {
        Some(run_dir) => info!(run_dir = %run_dir.display(), "Serving model run folder"),
        None => info!(data_dir = %args.data_dir.display(), "Serving staged files"),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn config(State(state): State<SharedAppState>) -> Json<Value> {
    Json(json!({ "auto_loaded": state.sources.auto_loaded() }))
}

async fn netcdf(
    State(state): State<SharedAppState>,
    Path(filename): Path<String>,
    ValidatedQuery(query): ValidatedQuery<ResampleQuery>,
) -> Result<JsonBody, FlowmapError> {
    let path = resolve_file(&state.args.data_dir, &filename, FileKind::NetCDF)?;
    metrics::record_resample(query.resample);
    let options = state.pipeline.with_resample(query.resample);
    let paths = vec![path.clone()];
    extract(&state, "netcdf", paths, query.resample, move || {
        JsonBody::from_value(&load_time_series(&path, &options)?).map_err(FlowmapError::from)
    })
    .await
}

async fn geopackage(
    State(state): State<SharedAppState>,
    Path(filename): Path<String>,
) -> Result<JsonBody, FlowmapError> {
    let path = resolve_file(&state.args.data_dir, &filename, FileKind::GeoPackage)?;
    let options = state.pipeline.clone();
    let paths = vec![path.clone()];
    extract(&state, "geopackage", paths, 1, move || {
        JsonBody::from_value(&load_geometry(&path, &options)?).map_err(FlowmapError::from)
    })
    .await
}

async fn load_local_files(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<ResampleQuery>,
) -> Result<JsonBody, FlowmapError> {
    let files = state.sources.locate()?;
    info!(
        geopackage = %files.geopackage.display(),
        netcdf = %files.netcdf.display(),
        resample = query.resample,
        "Loading local files"
    );
    metrics::record_resample(query.resample);
    let options = state.pipeline.with_resample(query.resample);
    let paths = vec![files.geopackage.clone(), files.netcdf.clone()];
    extract(&state, "load-local-files", paths, query.resample, move || {
        JsonBody::from_value(&load_combined(&files, &options)?).map_err(FlowmapError::from)
    })
    .await
}

/// Run an extraction as a blocking task under the resource limits.
///
/// When the response cache is enabled, the input files are hashed first and a cached body is
/// returned without running the extraction.
async fn extract<F>(
    state: &SharedAppState,
    route: &'static str,
    paths: Vec<PathBuf>,
    resample_hours: u32,
    f: F,
) -> Result<JsonBody, FlowmapError>
where
    F: FnOnce() -> Result<JsonBody, FlowmapError> + Send + 'static,
{
    let mut size = 0;
    for path in &paths {
        size += usize::try_from(tokio::fs::metadata(path).await?.len())?;
    }
    let _memory = state.resource_manager.memory(size).await?;
    let _task = state.resource_manager.task().await?;

    let state = state.clone();
    let body = run_blocking(state.args.use_rayon, move || {
        let Some(cache) = &state.cache else {
            return f();
        };
        let paths: Vec<&std::path::Path> = paths.iter().map(PathBuf::as_path).collect();
        let key = CacheKey::new(route, &paths, resample_hours, state.pipeline.align.origin)?;
        let cached = cache.get(&key);
        metrics::record_cache_lookup(cached.is_some());
        if let Some(body) = cached {
            return Ok(JsonBody(body));
        }
        let body = f()?;
        cache.set(key, body.0.clone());
        Ok(body)
    })
    .await?;
    metrics::record_payload_size(body.len());
    Ok(body)
}

/// Run a CPU-bound closure off the async executor, on Rayon or the Tokio blocking pool.
async fn run_blocking<F, T>(use_rayon: bool, f: F) -> Result<T, FlowmapError>
where
    F: FnOnce() -> Result<T, FlowmapError> + Send + 'static,
    T: Send + 'static,
{
    if use_rayon {
        tokio_rayon::spawn(f).await
    } else {
        tokio::task::spawn_blocking(f).await?
    }
}
