//! Prometheus metrics

use axum::{body::Body, http::Request, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry,
};
use std::sync::Once;
use tracing::Span;

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Simple request counter
    pub static ref INCOMING_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("incoming_requests", "The number of HTTP requests received"),
        &["http_method"]
    ).unwrap();
    // Request counter by status code
    pub static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_response", "The number of responses sent."),
        &["status_code"]
    ).unwrap();
    // Request histogram by response time
    pub static ref RESPONSE_TIME_COLLECTOR: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("response_time", "The time taken to respond to each request"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &[],
    ).unwrap();
    // Size of JSON bodies returned by the data endpoints
    pub static ref PAYLOAD_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("payload_size_bytes", "Size of successful data responses in bytes")
            .buckets(prometheus::exponential_buckets(1024.0, 4.0, 10).unwrap()),
    ).unwrap();
    // Time series requests by resample width
    pub static ref RESAMPLE_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("resample_requests", "The number of time series requests by resample width in hours"),
        &["hours"]
    ).unwrap();
    // Response cache lookups
    pub static ref CACHE_HITS: IntCounter = IntCounter::new(
        "response_cache_hits", "The number of responses served from the cache"
    ).unwrap();
    pub static ref CACHE_MISSES: IntCounter = IntCounter::new(
        "response_cache_misses", "The number of cache lookups that found no response"
    ).unwrap();
}

static REGISTER: Once = Once::new();

/// Register every metric with [REGISTRY]. Further calls do nothing.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(INCOMING_REQUESTS.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(RESPONSE_CODE_COLLECTOR.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(RESPONSE_TIME_COLLECTOR.clone()))
            .unwrap();
        REGISTRY.register(Box::new(PAYLOAD_SIZE.clone())).unwrap();
        REGISTRY
            .register(Box::new(RESAMPLE_REQUESTS.clone()))
            .unwrap();
        REGISTRY.register(Box::new(CACHE_HITS.clone())).unwrap();
        REGISTRY.register(Box::new(CACHE_MISSES.clone())).unwrap();
    });
}

/// Render every registered metric in the Prometheus text format.
pub async fn metrics_handler() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(error = %err, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Increments the prometheus counter on all incoming requests, labelled by http method
pub fn request_counter(request: &Request<Body>, _span: &Span) {
    INCOMING_REQUESTS
        .with_label_values(&[&request.method().to_string().to_ascii_uppercase()])
        .inc();
}

/// Increment the prometheus counter on all outgoing responses, labelled by status code
pub fn record_response_metrics<B>(
    response: &Response<B>,
    latency: std::time::Duration,
    _span: &Span,
) {
    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[response.status().as_str()])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[])
        .observe(latency.as_secs_f64());
}

/// Record the size of a data response.
pub fn record_payload_size(bytes: usize) {
    PAYLOAD_SIZE.observe(bytes as f64);
}

/// Count a time series request with its resample width.
pub fn record_resample(hours: u32) {
    RESAMPLE_REQUESTS
        .with_label_values(&[&hours.to_string()])
        .inc();
}

/// Count a response cache lookup.
pub fn record_cache_lookup(hit: bool) {
    if hit {
        CACHE_HITS.inc();
    } else {
        CACHE_MISSES.inc();
    }
}
