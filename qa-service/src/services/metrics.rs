//! Prometheus metrics for qa-service.
//!
//! Recording helpers are no-ops until [`init_metrics`] has run, so library
//! code and tests can call them unconditionally.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static QA_QUESTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static QA_CONTEXT_LOADS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub static QA_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static QA_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub static QA_DB_OPERATION_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once; later calls are ignored.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    // outcome: answered, fallback
    let questions = IntCounterVec::new(
        Opts::new("qa_questions_total", "Total questions handled"),
        &["outcome"],
    )
    .expect("Failed to create qa_questions_total metric");

    // source: cache, scrape, fallback
    let context_loads = IntCounterVec::new(
        Opts::new("qa_context_loads_total", "Total context loads by source"),
        &["source"],
    )
    .expect("Failed to create qa_context_loads_total metric");

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "qa_provider_latency_seconds",
            "Generative-language API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider", "model"],
    )
    .expect("Failed to create qa_provider_latency_seconds metric");

    let provider_errors = IntCounterVec::new(
        Opts::new("qa_provider_errors_total", "Total generative-language API errors"),
        &["provider", "error_type"],
    )
    .expect("Failed to create qa_provider_errors_total metric");

    let db_duration = HistogramVec::new(
        HistogramOpts::new(
            "qa_db_operation_duration_seconds",
            "Question log operation duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"],
    )
    .expect("Failed to create qa_db_operation_duration_seconds metric");

    registry
        .register(Box::new(questions.clone()))
        .expect("Failed to register qa_questions_total");
    registry
        .register(Box::new(context_loads.clone()))
        .expect("Failed to register qa_context_loads_total");
    registry
        .register(Box::new(provider_latency.clone()))
        .expect("Failed to register qa_provider_latency_seconds");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register qa_provider_errors_total");
    registry
        .register(Box::new(db_duration.clone()))
        .expect("Failed to register qa_db_operation_duration_seconds");

    if REGISTRY.set(registry).is_err() {
        // Another thread initialized first.
        return;
    }
    let _ = QA_QUESTIONS_TOTAL.set(questions);
    let _ = QA_CONTEXT_LOADS_TOTAL.set(context_loads);
    let _ = QA_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = QA_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = QA_DB_OPERATION_DURATION_SECONDS.set(db_duration);

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

pub fn record_question(outcome: &str) {
    if let Some(counter) = QA_QUESTIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_context_load(source: &str) {
    if let Some(counter) = QA_CONTEXT_LOADS_TOTAL.get() {
        counter.with_label_values(&[source]).inc();
    }
}

/// Record provider latency.
pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = QA_PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = QA_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record database operation duration.
pub fn record_db_operation(operation: &str, duration_secs: f64) {
    if let Some(histogram) = QA_DB_OPERATION_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}
