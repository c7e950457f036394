//! Picks the text surfaced to the caller from a finished run.
//!
//! When the final round was a pure tool-call round with no narrative, the
//! last meaningful utterance sits earlier in the transcript. The selector
//! therefore walks steps from newest to oldest and takes the first
//! non-empty text, falling back to the final completion text.

use super::events::Step;

/// Latest non-empty step text, else `fallback`, else `""`.
pub fn select_text(steps: &[Step], fallback: &str) -> String {
    steps
        .iter()
        .rev()
        .map(|step| step.text.as_str())
        .find(|text| !text.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
