/*!
Observability for Fragkit.

- Structured logging setup on top of `tracing-subscriber`
- Prometheus metrics for remote API traffic and strategy fallbacks (feature `metrics`)
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Instant;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{FragkitError, Result};

#[cfg(feature = "metrics")]
static METRICS: OnceLock<Option<SyncMetrics>> = OnceLock::new();

/// Metrics for synchronization with a remote server
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct SyncMetrics {
    pub api_requests_total: Counter,
    pub api_errors_total: Counter,
    pub api_latency_seconds: Histogram,
    /// Bulk attempts that fell back to the legacy strategy
    pub fallbacks_total: Counter,

    registry: Registry,
}

#[cfg(feature = "metrics")]
impl SyncMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let api_requests_total = Counter::new(
            "fragkit_api_requests_total",
            "Total remote API requests made by Fragkit",
        )
        .map_err(|e| FragkitError::config(format!("Failed to create api_requests_total metric: {e}")))?;

        let api_errors_total = Counter::new(
            "fragkit_api_errors_total",
            "Total remote API requests that failed",
        )
        .map_err(|e| FragkitError::config(format!("Failed to create api_errors_total metric: {e}")))?;

        let api_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "fragkit_api_latency_seconds",
            "Duration of remote API requests in seconds",
        ))
        .map_err(|e| FragkitError::config(format!("Failed to create api_latency_seconds metric: {e}")))?;

        let fallbacks_total = Counter::new(
            "fragkit_fallbacks_total",
            "Bulk import/export attempts that fell back to the legacy strategy",
        )
        .map_err(|e| FragkitError::config(format!("Failed to create fallbacks_total metric: {e}")))?;

        for collector in [
            Box::new(api_requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(api_errors_total.clone()),
            Box::new(api_latency_seconds.clone()),
            Box::new(fallbacks_total.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| FragkitError::config(format!("Failed to register metric: {e}")))?;
        }

        Ok(Self {
            api_requests_total,
            api_errors_total,
            api_latency_seconds,
            fallbacks_total,
            registry,
        })
    }

    /// Global metrics instance, `None` if the registry could not be built
    pub fn global() -> Option<&'static SyncMetrics> {
        METRICS
            .get_or_init(|| match Self::new() {
                Ok(metrics) => Some(metrics),
                Err(error) => {
                    tracing::warn!(error = %error, "Metrics disabled");
                    None
                }
            })
            .as_ref()
    }

    pub fn record_request(&self, _operation: &str) {
        self.api_requests_total.inc();
    }

    pub fn record_error(&self, _operation: &str) {
        self.api_errors_total.inc();
    }

    pub fn record_latency(&self, _operation: &str, duration: std::time::Duration) {
        self.api_latency_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_fallback(&self, _engine: &str) {
        self.fallbacks_total.inc();
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| FragkitError::config(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| FragkitError::config(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Record a bulk-to-legacy fallback, if metrics are enabled
#[allow(unused_variables)]
pub fn record_fallback(engine: &str) {
    #[cfg(feature = "metrics")]
    if let Some(metrics) = SyncMetrics::global() {
        metrics.record_fallback(engine);
    }
}

/// Measures one API request
#[cfg(feature = "metrics")]
pub struct MetricsTimer {
    start: Instant,
    operation: String,
}

#[cfg(feature = "metrics")]
impl MetricsTimer {
    /// Count a request and start timing it
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        if let Some(metrics) = SyncMetrics::global() {
            metrics.record_request(&operation);
        }
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn finish(self) {
        if let Some(metrics) = SyncMetrics::global() {
            metrics.record_latency(&self.operation, self.start.elapsed());
        }
    }

    pub fn finish_with_error(self) {
        if let Some(metrics) = SyncMetrics::global() {
            metrics.record_latency(&self.operation, self.start.elapsed());
            metrics.record_error(&self.operation);
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global tracing subscriber
///
/// # Arguments
/// * `verbose` - Default to `debug` instead of `info` when `RUST_LOG` is unset
/// * `json` - Emit JSON lines instead of human-readable output
///
/// # Returns
/// An error if a global subscriber was already installed
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    let _ = SyncMetrics::global();

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        set_global_default(TracingRegistry::default().with(env_filter(verbose)).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
        set_global_default(TracingRegistry::default().with(env_filter(verbose)).with(fmt_layer))
    };

    result.map_err(|e| FragkitError::config(format!("Failed to set global tracing subscriber: {e}")))
}
