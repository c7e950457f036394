//! Events, handlers, and run results for the [`Agent`](super::harness::Agent).
//!
//! The agent reports progress through [`AgentEvent`] variants covering the
//! whole run, from step start through tool execution to the terminal
//! state. Implement [`EventHandler`] to observe them.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use super::selector::select_text;
use crate::api::tracing::UsageTotals;
use crate::error::GenerateError;
use crate::tools::{ToolCallRequest, ToolResult};
use crate::{Message, UsageInfo};
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the agent during a run.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A model call is about to be made. `step` is 1-based.
    StepStart { step: usize, max_steps: u32 },
    /// The model returned non-empty text (possibly alongside tool calls).
    Text(&'a str),
    /// The model requested tool calls this step.
    ToolCallsReceived { step: usize, count: usize },
    /// A single tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A single tool finished executing.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
        success: bool,
    },
    /// Token usage reported for one model call.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The model answered without requesting tools.
    Finished,
    /// The step budget ran out while the model was still calling tools.
    StepBudgetExhausted { max_steps: u32 },
    /// The run ended on a provider failure or cancellation.
    Failed(&'a GenerateError),
}

/// Handler for agent events. The default implementation ignores everything.
///
/// ```ignore
/// struct Printer;
///
/// impl EventHandler for Printer {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::ToolResult { name, result, .. } = event {
///             eprintln!("[{name}] {result}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::Text(text) = event {
///         eprintln!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that dispatches every event to inner handlers in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, my_printer);
/// ```
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::StepStart { step, max_steps } => {
                info!("[step {step}/{max_steps}] calling model");
            }
            AgentEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            AgentEvent::ToolCallsReceived { step, count } => {
                debug!("{count} tool call(s) in step {step}");
            }
            AgentEvent::ToolExecuting { name, arguments } => {
                debug!("Executing tool: {name}({arguments})");
            }
            AgentEvent::ToolResult {
                name,
                result,
                success,
                ..
            } => {
                if *success {
                    debug!("Tool {name} result: {} bytes", result.len());
                } else {
                    warn!("Tool {name} failed: {result}");
                }
            }
            AgentEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            AgentEvent::Finished => {
                info!("Agent finished (no more tool calls)");
            }
            AgentEvent::StepBudgetExhausted { max_steps } => {
                info!("Agent hit step budget ({max_steps})");
            }
            AgentEvent::Failed(error) => {
                warn!("Agent run failed: {error}");
            }
        }
    }
}

// ── Transcript ─────────────────────────────────────────────────────

/// One round of the loop: the model's text plus the tool calls it made and
/// their results, paired by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Zero-based position in the run.
    pub index: usize,
    /// Assistant text for this round, possibly empty.
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub tool_results: Vec<ToolResult>,
    pub usage: Option<UsageInfo>,
}

/// Why a successful run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model answered without requesting tools.
    Completed,
    /// The step budget ran out.
    StepBudgetExhausted,
}

// ── Run result ─────────────────────────────────────────────────────

/// The outcome of one [`Agent::run`](super::harness::Agent::run).
///
/// Produced exactly once per run. A failed run keeps every step recorded
/// before the failure.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub trace_id: String,
    /// Text of the last model response received, possibly empty.
    pub text: String,
    pub steps: Vec<Step>,
    /// The full transcript, starting with the system and user turns.
    pub messages: Vec<Message>,
    pub usage: UsageTotals,
    pub model_calls: u32,
    /// Set for successful runs.
    pub finish: Option<FinishReason>,
    /// Set for failed runs.
    pub error: Option<GenerateError>,
}

impl GenerateResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// The answer text: the latest non-empty step text, else [`text`](Self::text).
    pub fn selected_text(&self) -> String {
        select_text(&self.steps, &self.text)
    }

    /// The selected answer, or the error that ended the run.
    pub fn into_answer(self) -> Result<String, GenerateError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(select_text(&self.steps, &self.text)),
        }
    }
}
