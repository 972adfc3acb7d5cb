use std::time::Duration;

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// `record_rpc_latency` lets us record with the method as a tag.
pub fn record_rpc_latency(method: &str, latency: Duration) {
    metrics::histogram!("keyrelay_rpc_latency", "method" => method.to_string())
        .record(latency.as_secs_f64());
}

/// Metrics for the submission engine.
/// Conventions:
/// - Durations are recorded in seconds (histograms).
/// - Counters are monotonic event counts.
#[derive(Metrics, Clone)]
#[metrics(scope = "keyrelay_engine")]
pub struct EngineMetrics {
    #[metric(describe = "Operations sent to the bundler, replacements included")]
    pub submissions: Counter,

    #[metric(describe = "Automatic fee replacements")]
    pub fee_replacements: Counter,

    #[metric(describe = "Operations confirmed with a successful receipt")]
    pub confirmations: Counter,

    #[metric(describe = "Operations included but reverted")]
    pub reverts: Counter,

    #[metric(describe = "Operations with no receipt before the deadline")]
    pub timeouts: Counter,

    #[metric(describe = "Operations the relay rejected")]
    pub rejections: Counter,

    #[metric(describe = "Time from first submission to receipt")]
    pub confirmation_latency: Histogram,
}
