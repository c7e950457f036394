//! Correlation IDs and token accounting for generation runs.
//!
//! Assigns a unique `trace_id` to each run and a `span_id` to each step
//! within it. Tracks cumulative token usage.

use crate::UsageInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for a run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates calls within the same clock tick.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for a step within a run.
pub fn generate_span_id(trace_id: &str, step: usize) -> String {
    format!("{trace_id}:s{step}")
}

/// Cumulative token usage for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record usage reported for one model call. Missing counts add zero.
    pub fn record(&mut self, usage: &UsageInfo) {
        self.prompt_tokens += u64::from(usage.prompt_tokens.unwrap_or(0));
        self.completion_tokens += u64::from(usage.completion_tokens.unwrap_or(0));
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total",
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens(),
        )
    }
}
