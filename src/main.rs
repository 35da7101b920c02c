//! This file defines the flowmap binary entry point.

use flowmap::app;
use flowmap::cli;
use flowmap::metrics;
use flowmap::server;
use flowmap::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    ::tracing::debug!(?args, "Parsed command line arguments");
    metrics::register_metrics();
    app::init(&args);
    let service = app::service(&args);
    server::serve(&args, service).await;
}
