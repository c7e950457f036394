//! Step-level helpers for the [`Agent`](super::harness::Agent) loop.
//!
//! Holds the pieces of a step that do not touch the transcript: sending one
//! model request under the run deadline, decoding the model's tool calls,
//! and dispatching a round of tool calls sequentially or concurrently.

use super::config::{GenerateOptions, StopSignal};
use super::events::{AgentEvent, EventHandler};
use crate::error::{GenerateError, ValueError};
use crate::tools::{ToolCallRequest, ToolContext, ToolRegistry, ToolResult};
use crate::value::{self, Map, Value};
use crate::{ChatCompletion, ChatModel, ChatRequest, ToolCall};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// ── Cancellation ───────────────────────────────────────────────────

/// Wall-clock limit for a run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// `None` when `limit` lies beyond what the clock can represent, which
    /// means no deadline.
    pub(crate) fn after(limit: Duration) -> Option<Self> {
        Instant::now()
            .checked_add(limit)
            .map(|at| Self { at, limit })
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    fn reason(&self) -> String {
        format!("timed out after {:.1}s", self.limit.as_secs_f64())
    }
}

/// Why the run must stop at this point, if it must.
pub(crate) fn cancellation(
    stop_signal: Option<&StopSignal>,
    deadline: Option<&Deadline>,
) -> Option<String> {
    if stop_signal.is_some_and(|signal| signal()) {
        return Some("stop signal received".into());
    }
    deadline.filter(|d| d.expired()).map(Deadline::reason)
}

/// Await `fut`, giving up at the deadline.
async fn bounded<T>(deadline: Option<Deadline>, fut: impl Future<Output = T>) -> Result<T, String> {
    match deadline {
        Some(d) => tokio::time::timeout_at(d.at, fut)
            .await
            .map_err(|_| d.reason()),
        None => Ok(fut.await),
    }
}

// ── Model call ─────────────────────────────────────────────────────

/// Send one model request. Provider errors pass through unretried; running
/// past the deadline is a cancellation.
pub(crate) async fn send_step_request(
    model: &dyn ChatModel,
    request: &ChatRequest,
    deadline: Option<Deadline>,
) -> Result<ChatCompletion, GenerateError> {
    match bounded(deadline, model.chat(request)).await {
        Ok(result) => Ok(result?),
        Err(reason) => {
            info!("Model call abandoned: {reason}");
            Err(GenerateError::Cancelled(reason))
        }
    }
}

// ── Tool calls ─────────────────────────────────────────────────────

/// Decode tool-call argument text. Blank text means no arguments (`{}`).
pub fn parse_tool_arguments(raw: &str) -> Result<Value, ValueError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    value::parse(raw)
}

/// A model tool call turned into a registry request. Undecodable arguments
/// leave the request with `null` arguments and a decode error.
fn decode_call(call: &ToolCall) -> (ToolCallRequest, Option<ValueError>) {
    match parse_tool_arguments(&call.function.arguments) {
        Ok(args) => (
            ToolCallRequest::new(&call.id, &call.function.name, args),
            None,
        ),
        Err(e) => (
            ToolCallRequest::new(&call.id, &call.function.name, Value::Null),
            Some(e),
        ),
    }
}

/// Tool requests and results of one round, in request order.
#[derive(Debug, Default)]
pub(crate) struct RoundOutcome {
    pub requests: Vec<ToolCallRequest>,
    pub results: Vec<ToolResult>,
    /// Set when the round was cut short; `results` then holds the calls
    /// that completed.
    pub cancelled: Option<String>,
}

async fn run_call(
    tools: &ToolRegistry,
    call: &ToolCall,
    request: &ToolCallRequest,
    decode_error: Option<&ValueError>,
    step: usize,
    handler: &dyn EventHandler,
) -> ToolResult {
    let name = call.function.name.as_str();
    handler.on_event(&AgentEvent::ToolExecuting {
        name,
        arguments: &call.function.arguments,
    });

    let result = match decode_error {
        Some(e) => {
            warn!("Malformed arguments for {name}: {e}");
            ToolResult::failure(
                &request.id,
                format!("Error: arguments for tool '{name}' are not valid JSON: {e}"),
            )
        }
        None => {
            tools
                .invoke(request, &ToolContext::for_call(request, step))
                .await
        }
    };

    let text = value::serialize(&result.value);
    handler.on_event(&AgentEvent::ToolResult {
        name,
        call_id: &result.call_id,
        result: &text,
        success: result.success,
    });
    result
}

/// Execute every tool call of one round.
///
/// Calls run concurrently unless `sequential_tools` is set; results come
/// back in request order either way. The deadline bounds each call, and in
/// sequential mode the stop signal is also checked between calls.
pub(crate) async fn execute_round(
    tools: &ToolRegistry,
    calls: &[ToolCall],
    step: usize,
    options: &GenerateOptions,
    deadline: Option<Deadline>,
    handler: &dyn EventHandler,
) -> RoundOutcome {
    let decoded: Vec<_> = calls.iter().map(decode_call).collect();
    let mut outcome = RoundOutcome::default();

    if options.sequential_tools || calls.len() == 1 {
        for (call, (request, decode_error)) in calls.iter().zip(&decoded) {
            if let Some(reason) = cancellation(options.stop_signal.as_ref(), deadline.as_ref()) {
                outcome.cancelled = Some(reason);
                break;
            }
            let fut = run_call(tools, call, request, decode_error.as_ref(), step, handler);
            match bounded(deadline, fut).await {
                Ok(result) => outcome.results.push(result),
                Err(reason) => {
                    outcome.cancelled = Some(reason);
                    break;
                }
            }
        }
    } else {
        debug!("Running {} tool calls concurrently", calls.len());
        let futures = calls
            .iter()
            .zip(&decoded)
            .map(|(call, (request, decode_error))| {
                bounded(
                    deadline,
                    run_call(tools, call, request, decode_error.as_ref(), step, handler),
                )
            });
        for completed in futures::future::join_all(futures).await {
            match completed {
                Ok(result) => outcome.results.push(result),
                Err(reason) => outcome.cancelled = Some(reason),
            }
        }
    }

    if let Some(reason) = &outcome.cancelled {
        info!(
            "Tool round cancelled after {}/{} call(s): {reason}",
            outcome.results.len(),
            calls.len()
        );
    }
    outcome.requests = decoded.into_iter().map(|(request, _)| request).collect();
    outcome
}
