//! Provider-call support: retry with backoff and run correlation.
//!
//! - [`retry`]: transient error detection (429, 5xx, transport failures)
//!   with configurable exponential backoff and jitter, plus
//!   [`RetryingModel`](retry::RetryingModel), a [`ChatModel`](crate::ChatModel)
//!   wrapper that applies it. Never retries 400/401 errors.
//! - [`tracing`]: correlation IDs (`trace_id` / `span_id`) and cumulative
//!   [`UsageTotals`](tracing::UsageTotals).

pub mod retry;
pub mod tracing;

pub use retry::{RetryConfig, RetryingModel, is_transient};
pub use tracing::{UsageTotals, generate_span_id, generate_trace_id};
