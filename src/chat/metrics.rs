//! Dispatch metrics
//!
//! Per-model dispatch outcomes and latency, plus one counter per send.
//!
//! # Metrics
//!
//! - `nymval_dispatch_total`: Counter of model calls by model and outcome
//! - `nymval_dispatch_duration_seconds`: Histogram of model call latency
//! - `nymval_sends_total`: Counter of sends by outcome
//!
//! # Examples
//!
//! ```
//! use nymval::chat::metrics::DispatchMetrics;
//!
//! let metrics = DispatchMetrics::new("llama3-70b");
//! metrics.record_success();
//! ```

use metrics::{histogram, increment_counter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Metrics for one model call within a send
///
/// Only the first `record_*` call has any effect.
#[derive(Debug)]
pub struct DispatchMetrics {
    model: String,
    start: Instant,
    recorded: AtomicBool,
}

impl DispatchMetrics {
    /// Start timing a call to `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            start: Instant::now(),
            recorded: AtomicBool::new(false),
        }
    }

    /// Record a successful reply
    pub fn record_success(&self) {
        self.record("success");
    }

    /// Record a failure, labelled with the failure kind
    pub fn record_failure(&self, kind: &str) {
        self.record(kind);
    }

    fn record(&self, outcome: &str) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }

        histogram!(
            "nymval_dispatch_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "model" => self.model.clone()
        );

        increment_counter!(
            "nymval_dispatch_total",
            "model" => self.model.clone(),
            "outcome" => outcome.to_string()
        );
    }

    /// Model being measured
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an outcome has been recorded
    pub fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::SeqCst)
    }
}

/// Count a finished send
pub fn record_send(outcome: &str) {
    increment_counter!("nymval_sends_total", "outcome" => outcome.to_string());
}
