// * Telemetry - JSON Logging and Prometheus Metrics
// * Structured logging setup and counters for every call to the alerting service

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    // * Alerting API calls by operation and outcome (success, failure, timeout)
    pub static ref API_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "alerting_api_requests_total",
        "Requests sent to the alerting service",
        &["operation", "outcome"]
    ).expect("alerting_api_requests_total registers once");

    // * Calls skipped because no API key was configured
    pub static ref SKIPPED_CALLS_TOTAL: CounterVec = register_counter_vec!(
        "alerting_skipped_calls_total",
        "Alerting calls skipped for a missing API key",
        &["operation"]
    ).expect("alerting_skipped_calls_total registers once");

    // * Best-effort deliveries that failed and were only logged
    pub static ref DELIVERY_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "alerting_delivery_failures_total",
        "Best-effort alerting calls that failed",
        &["operation"]
    ).expect("alerting_delivery_failures_total registers once");

    // * Open-alert cache populations by result
    pub static ref CACHE_POPULATIONS_TOTAL: CounterVec = register_counter_vec!(
        "alerting_cache_populations_total",
        "Open-alert cache population attempts",
        &["result"]
    ).expect("alerting_cache_populations_total registers once");

    // * Alerts currently held in the open-alert cache
    pub static ref CACHE_OPEN_ALERTS: Gauge = register_gauge!(
        "alerting_cache_open_alerts",
        "Open alerts held in the cache"
    ).expect("alerting_cache_open_alerts registers once");

    // * Timed-out attempts that were retried
    pub static ref RETRY_ATTEMPTS_TOTAL: Counter = register_counter!(
        "alerting_retry_attempts_total",
        "Timed-out attempts that were retried"
    ).expect("alerting_retry_attempts_total registers once");

    // * Calls waiting on the outbound rate limiter
    pub static ref LIMITER_QUEUE_DEPTH: Gauge = register_gauge!(
        "alerting_rate_limiter_queue_depth",
        "Calls queued behind the outbound rate limiter"
    ).expect("alerting_rate_limiter_queue_depth registers once");
}

/// Initializes the tracing subscriber with JSON formatting
///
/// # Example
/// ```ignore
/// use genie_relay::ops::telemetry;
///
/// telemetry::init_tracing();
/// tracing::info!(alias = "wallet-low-balance", "Creating alert");
/// ```
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Initializes tracing with custom log level
pub fn init_tracing_with_level(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initializes tracing with pretty formatting (for development)
pub fn init_tracing_pretty() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty())
        .init();
}

/// Metrics server handle for graceful shutdown
pub struct MetricsServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
}

impl MetricsServerHandle {
    /// Signals the metrics server to shut down
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.running.store(false, Ordering::Relaxed);
    }

    /// Returns true if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Starts the Prometheus metrics HTTP server on the specified port
///
/// Serves `/metrics`, `/health` and `/ready`. Returns a handle that can be used
/// for graceful shutdown.
pub async fn start_metrics_server(port: u16) -> MetricsServerHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tokio::spawn(async move {
        let make_svc = hyper::service::make_service_fn(|_conn| async {
            Ok::<_, std::convert::Infallible>(hyper::service::service_fn(handle_metrics_request))
        });

        let server = match hyper::Server::try_bind(&addr) {
            Ok(builder) => builder.serve(make_svc).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            }),
            Err(e) => {
                tracing::error!(port = port, error = %e, "Metrics server failed to bind");
                running_clone.store(false, Ordering::Relaxed);
                return;
            }
        };

        tracing::info!(port = port, "Metrics server started");

        if let Err(e) = server.await {
            tracing::error!(error = %e, "Metrics server error");
        }

        running_clone.store(false, Ordering::Relaxed);
        tracing::info!("Metrics server stopped");
    });

    MetricsServerHandle {
        shutdown_tx: Some(shutdown_tx),
        running,
    }
}

fn text_response(status: u16, body: impl Into<hyper::Body>) -> hyper::Response<hyper::Body> {
    let mut resp = hyper::Response::new(body.into());
    *resp.status_mut() = hyper::StatusCode::from_u16(status).unwrap_or(hyper::StatusCode::OK);
    resp
}

/// Handles incoming HTTP requests to the metrics endpoint
async fn handle_metrics_request(
    req: hyper::Request<hyper::Body>,
) -> Result<hyper::Response<hyper::Body>, std::convert::Infallible> {
    let resp = match req.uri().path() {
        "/metrics" => {
            let encoder = TextEncoder::new();
            let mut buffer = Vec::new();
            match encoder.encode(&prometheus::gather(), &mut buffer) {
                Ok(()) => {
                    let mut resp = text_response(200, buffer);
                    if let Ok(value) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
                        resp.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
                    }
                    resp
                }
                Err(e) => text_response(500, e.to_string()),
            }
        }
        "/health" => text_response(200, "OK"),
        "/ready" => text_response(200, "READY"),
        _ => text_response(404, "Not Found"),
    };
    Ok(resp)
}

/// Returns the current metrics as a string
pub fn get_metrics_string() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Records a request sent to the alerting service
pub fn record_api_request(operation: &str, outcome: &str) {
    API_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Records a call skipped for a missing API key
pub fn record_skipped_call(operation: &str) {
    SKIPPED_CALLS_TOTAL.with_label_values(&[operation]).inc();
}

/// Records a best-effort delivery that failed
pub fn record_delivery_failure(operation: &str) {
    DELIVERY_FAILURES_TOTAL.with_label_values(&[operation]).inc();
}

/// Records a cache population result ("success", "failure", "skipped")
pub fn record_cache_population(result: &str) {
    CACHE_POPULATIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn set_cache_open_alerts(count: usize) {
    CACHE_OPEN_ALERTS.set(count as f64);
}

pub fn record_retry_attempt() {
    RETRY_ATTEMPTS_TOTAL.inc();
}

pub fn set_limiter_queue_depth(depth: usize) {
    LIMITER_QUEUE_DEPTH.set(depth as f64);
}
