//! Prometheus metrics for chat-service.
//!
//! Covers HTTP traffic, routing decisions, model calls and session counts.

use axum::{extract::MatchedPath, extract::Request, middleware::Next, response::Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Instant;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Conversation metrics
pub static ROUTING_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ACTIVE_SESSIONS: OnceLock<IntGaugeVec> = OnceLock::new();
pub static UPLOAD_REJECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Model metrics
pub static MODEL_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static MODEL_FALLBACKS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once; only the first call
/// installs the registry.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("Failed to create http_requests_total metric");

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "path"],
    )
    .expect("Failed to create http_request_duration_seconds metric");

    let routing_decisions = IntCounterVec::new(
        Opts::new(
            "chat_routing_decisions_total",
            "Supervisor routing decisions by handler and source",
        ),
        &["agent", "source"],
    )
    .expect("Failed to create chat_routing_decisions_total metric");

    let active_sessions = IntGaugeVec::new(
        Opts::new("chat_active_sessions", "Sessions currently held in memory"),
        &["store"],
    )
    .expect("Failed to create chat_active_sessions metric");

    let upload_rejections = IntCounterVec::new(
        Opts::new("chat_upload_rejections_total", "Rejected file uploads"),
        &["reason"],
    )
    .expect("Failed to create chat_upload_rejections_total metric");

    let model_latency = HistogramVec::new(
        HistogramOpts::new(
            "chat_model_latency_seconds",
            "Language model call latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider", "purpose"],
    )
    .expect("Failed to create chat_model_latency_seconds metric");

    let model_fallbacks = IntCounterVec::new(
        Opts::new(
            "chat_model_fallbacks_total",
            "Model calls replaced by a deterministic fallback",
        ),
        &["purpose", "reason"],
    )
    .expect("Failed to create chat_model_fallbacks_total metric");

    // Register all metrics
    registry
        .register(Box::new(http_requests_total.clone()))
        .expect("Failed to register http_requests_total");
    registry
        .register(Box::new(http_request_duration.clone()))
        .expect("Failed to register http_request_duration_seconds");
    registry
        .register(Box::new(routing_decisions.clone()))
        .expect("Failed to register chat_routing_decisions_total");
    registry
        .register(Box::new(active_sessions.clone()))
        .expect("Failed to register chat_active_sessions");
    registry
        .register(Box::new(upload_rejections.clone()))
        .expect("Failed to register chat_upload_rejections_total");
    registry
        .register(Box::new(model_latency.clone()))
        .expect("Failed to register chat_model_latency_seconds");
    registry
        .register(Box::new(model_fallbacks.clone()))
        .expect("Failed to register chat_model_fallbacks_total");

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = ROUTING_DECISIONS_TOTAL.set(routing_decisions);
    let _ = ACTIVE_SESSIONS.set(active_sessions);
    let _ = UPLOAD_REJECTIONS_TOTAL.set(upload_rejections);
    let _ = MODEL_LATENCY_SECONDS.set(model_latency);
    let _ = MODEL_FALLBACKS_TOTAL.set(model_fallbacks);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Axum middleware recording request counts and latency per matched route.
pub async fn http_metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // Route templates keep thread ids out of the label set.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[&method, &path, &status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[&method, &path])
            .observe(start.elapsed().as_secs_f64());
    }

    response
}

// Helper functions for recording metrics

/// Record a supervisor decision.
pub fn record_routing_decision(agent: &str, source: &str) {
    if let Some(counter) = ROUTING_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[agent, source]).inc();
    }
}

/// Publish the current size of a session store.
pub fn set_active_sessions(store: &str, count: usize) {
    if let Some(gauge) = ACTIVE_SESSIONS.get() {
        gauge.with_label_values(&[store]).set(count as i64);
    }
}

/// Record a rejected upload.
pub fn record_upload_rejection(reason: &str) {
    if let Some(counter) = UPLOAD_REJECTIONS_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

/// Record model latency.
pub fn record_model_latency(provider: &str, purpose: &str, duration_secs: f64) {
    if let Some(histogram) = MODEL_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, purpose])
            .observe(duration_secs);
    }
}

/// Record a model call that fell back to a canned reply.
pub fn record_model_fallback(purpose: &str, reason: &str) {
    if let Some(counter) = MODEL_FALLBACKS_TOTAL.get() {
        counter.with_label_values(&[purpose, reason]).inc();
    }
}
