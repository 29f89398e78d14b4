/// Prometheus metrics for the risk prediction service.
///
/// Covers:
/// - HTTP request counts, latency and in-flight requests
/// - Predictions by category and request mode, scoring latency
/// - Validation failures and internal errors
/// - Model training time and forest size
///
/// # Example
/// ```no_run
/// use emberalert_ml::metrics::{self, PREDICTIONS_TOTAL};
///
/// metrics::init_metrics().ok();
/// PREDICTIONS_TOTAL.with_label_values(&["single", "High"]).inc();
/// ```

mod middleware;

pub use middleware::{MetricsLayer, MetricsService};

use crate::ml::RiskCategory;
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "emberalert_ml";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Requests currently being served
    pub static ref HTTP_REQUESTS_IN_FLIGHT: Gauge = Gauge::with_opts(
        Opts::new("http_requests_in_flight", "Number of HTTP requests being served")
            .namespace(NAMESPACE)
    ).expect("Failed to create HTTP_REQUESTS_IN_FLIGHT metric");

    // ============================================================================
    // Prediction Metrics
    // ============================================================================

    /// Total number of locations scored
    ///
    /// Labels: mode (single/batch), category
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of risk predictions")
            .namespace(NAMESPACE),
        &["mode", "category"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Time spent scoring one request, excluding HTTP handling
    ///
    /// Labels: mode
    pub static ref PREDICTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Time spent scoring a request"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["mode"]
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Locations per batch request
    pub static ref BATCH_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("batch_size", "Locations per batch request")
            .namespace(NAMESPACE)
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0])
    ).expect("Failed to create BATCH_SIZE metric");

    /// Requests rejected as invalid
    pub static ref VALIDATION_FAILURES_TOTAL: Counter = Counter::with_opts(
        Opts::new("validation_failures_total", "Total number of rejected requests")
            .namespace(NAMESPACE)
    ).expect("Failed to create VALIDATION_FAILURES_TOTAL metric");

    /// Internal errors surfaced to clients
    ///
    /// Labels: error_code
    pub static ref INTERNAL_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("internal_errors_total", "Total number of internal errors")
            .namespace(NAMESPACE),
        &["error_code"]
    ).expect("Failed to create INTERNAL_ERRORS_TOTAL metric");

    // ============================================================================
    // Model Metrics
    // ============================================================================

    /// Wall time of the last model training
    pub static ref MODEL_TRAINING_SECONDS: Gauge = Gauge::with_opts(
        Opts::new("model_training_seconds", "Duration of the last model training")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_TRAINING_SECONDS metric");

    /// Trees in the serving forest
    pub static ref MODEL_TREES: Gauge = Gauge::with_opts(
        Opts::new("model_trees", "Number of trees in the serving forest")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_TREES metric");

    /// Application build info
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once: collectors that are already registered are
/// skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(PREDICTIONS_TOTAL.clone()),
        Box::new(PREDICTION_DURATION_SECONDS.clone()),
        Box::new(BATCH_SIZE.clone()),
        Box::new(VALIDATION_FAILURES_TOTAL.clone()),
        Box::new(INTERNAL_ERRORS_TOTAL.clone()),
        Box::new(MODEL_TRAINING_SECONDS.clone()),
        Box::new(MODEL_TREES.clone()),
        Box::new(BUILD_INFO.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to UTF-8: {}", e);
        String::from("# Error converting metrics\n")
    })
}

pub fn record_prediction(mode: &str, category: RiskCategory) {
    PREDICTIONS_TOTAL
        .with_label_values(&[mode, category.label()])
        .inc();
}

pub fn record_prediction_latency(mode: &str, seconds: f64) {
    PREDICTION_DURATION_SECONDS
        .with_label_values(&[mode])
        .observe(seconds);
}

pub fn record_batch(size: usize) {
    BATCH_SIZE.observe(size as f64);
}

pub fn record_validation_failure() {
    VALIDATION_FAILURES_TOTAL.inc();
}

pub fn record_internal_error(error_code: &str) {
    INTERNAL_ERRORS_TOTAL.with_label_values(&[error_code]).inc();
}

pub fn record_training(seconds: f64, trees: usize) {
    MODEL_TRAINING_SECONDS.set(seconds);
    MODEL_TREES.set(trees as f64);
}
