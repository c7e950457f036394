//! The bounded tool-calling loop.
//!
//! The [`Agent`] sends the transcript plus tool definitions to the model,
//! executes any tool calls it returns through the [`ToolRegistry`], appends
//! the results and repeats until the model answers without tools or the
//! step budget is spent. Callers observe the loop via [`EventHandler`].
//!
//! States: `Start -> ModelCall -> {ToolExecution -> ModelCall}* -> Done | Failed`.
//! Tool failures never end the run. A provider failure or cancellation ends
//! it in `Failed`, keeping the steps recorded so far.

use super::config::GenerateOptions;
use super::events::{
    AgentEvent, EventHandler, FinishReason, GenerateResult, NoopHandler, Step,
};
use super::execution::{Deadline, cancellation, execute_round, send_step_request};
use crate::api::tracing::{UsageTotals, generate_span_id, generate_trace_id};
use crate::error::GenerateError;
use crate::tools::ToolRegistry;
use crate::value;
use crate::{ChatModel, ChatRequest, Message};
use tracing::{debug, info};

/// The tool-calling loop for one run.
///
/// ```ignore
/// let model = OpenAiClient::new(api_key)?;
/// let tools = ToolRegistry::builder()
///     .with_introspection_tools(Arc::new(CommandBackend::psql()))
///     .build()?;
/// let handler = LoggingHandler;
///
/// let result = Agent::new(&model, &tools, GenerateOptions::new("show all users"))
///     .with_event_handler(&handler)
///     .run()
///     .await;
/// println!("{}", result.into_answer()?);
/// ```
///
/// # Lifetimes
///
/// `Agent<'a>` borrows the model, the registry and the handler. Bind them to
/// `let` bindings before building the agent so they outlive `.run()`.
pub struct Agent<'a> {
    model: &'a dyn ChatModel,
    tools: &'a ToolRegistry,
    options: GenerateOptions,
    event_handler: &'a dyn EventHandler,
}

/// Mutable state of one run, owned exclusively by the loop.
struct RunState {
    trace_id: String,
    messages: Vec<Message>,
    steps: Vec<Step>,
    usage: UsageTotals,
    model_calls: u32,
    last_text: String,
}

impl RunState {
    fn finish(self, finish: Option<FinishReason>, error: Option<GenerateError>) -> GenerateResult {
        GenerateResult {
            trace_id: self.trace_id,
            text: self.last_text,
            steps: self.steps,
            messages: self.messages,
            usage: self.usage,
            model_calls: self.model_calls,
            finish,
            error,
        }
    }
}

impl<'a> Agent<'a> {
    pub fn new(model: &'a dyn ChatModel, tools: &'a ToolRegistry, options: GenerateOptions) -> Self {
        Self {
            model,
            tools,
            options,
            event_handler: &NoopHandler,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Run the loop to completion. Never panics and never returns early
    /// without a result: failures are reported in [`GenerateResult::error`].
    pub async fn run(self) -> GenerateResult {
        let options = &self.options;
        let max_steps = options.step_budget();
        let deadline = options.timeout.and_then(Deadline::after);
        let tool_defs = self.tools.definitions();
        let tools_option = (!tool_defs.is_empty()).then_some(tool_defs);

        let mut state = RunState {
            trace_id: generate_trace_id(),
            messages: vec![
                Message::system(&options.system),
                Message::user(&options.prompt),
            ],
            steps: Vec::new(),
            usage: UsageTotals::new(),
            model_calls: 0,
            last_text: String::new(),
        };

        info!(
            "Generation started: trace_id={}, model={}, max_steps={max_steps}, tools={}",
            state.trace_id,
            options.model,
            self.tools.len(),
        );

        for index in 0..max_steps as usize {
            if let Some(reason) = cancellation(options.stop_signal.as_ref(), deadline.as_ref()) {
                return self.fail(state, GenerateError::Cancelled(reason));
            }

            debug!(
                "Step {} span_id={}",
                index + 1,
                generate_span_id(&state.trace_id, index)
            );
            self.event_handler.on_event(&AgentEvent::StepStart {
                step: index + 1,
                max_steps,
            });

            let request = ChatRequest {
                model: options.model.clone(),
                messages: state.messages.clone(),
                max_tokens: options.max_tokens,
                temperature: options.temperature,
                tools: tools_option.clone(),
            };
            let completion = match send_step_request(self.model, &request, deadline).await {
                Ok(completion) => completion,
                Err(e) => return self.fail(state, e),
            };
            state.model_calls += 1;

            if let Some(usage) = &completion.usage {
                state.usage.record(usage);
                self.event_handler.on_event(&AgentEvent::TokenUsage {
                    prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                    completion_tokens: usage.completion_tokens.unwrap_or(0),
                });
            }

            let text = completion.content.unwrap_or_default();
            if !text.is_empty() {
                self.event_handler.on_event(&AgentEvent::Text(&text));
            }
            state.last_text.clone_from(&text);

            if completion.tool_calls.is_empty() {
                state.messages.push(Message::assistant_text(&text));
                state.steps.push(Step {
                    index,
                    text,
                    usage: completion.usage,
                    ..Step::default()
                });
                self.event_handler.on_event(&AgentEvent::Finished);
                return self.complete(state, FinishReason::Completed);
            }

            let calls = completion.tool_calls;
            self.event_handler.on_event(&AgentEvent::ToolCallsReceived {
                step: index + 1,
                count: calls.len(),
            });
            state
                .messages
                .push(Message::assistant_tool_calls(Some(text.clone()), calls.clone()));

            if let Some(reason) = cancellation(options.stop_signal.as_ref(), deadline.as_ref()) {
                state.steps.push(Step {
                    index,
                    text,
                    usage: completion.usage,
                    ..Step::default()
                });
                return self.fail(state, GenerateError::Cancelled(reason));
            }

            let round = execute_round(
                self.tools,
                &calls,
                index,
                options,
                deadline,
                self.event_handler,
            )
            .await;

            for result in &round.results {
                state.messages.push(Message::tool_result(
                    &result.call_id,
                    value::serialize(&result.value),
                ));
            }
            state.steps.push(Step {
                index,
                text,
                tool_calls: round.requests,
                tool_results: round.results,
                usage: completion.usage,
            });

            if let Some(reason) = round.cancelled {
                return self.fail(state, GenerateError::Cancelled(reason));
            }
        }

        self.event_handler
            .on_event(&AgentEvent::StepBudgetExhausted { max_steps });
        self.complete(state, FinishReason::StepBudgetExhausted)
    }

    fn complete(&self, state: RunState, reason: FinishReason) -> GenerateResult {
        info!(
            "Generation finished: trace_id={}, reason={reason:?}, model_calls={}, {}",
            state.trace_id,
            state.model_calls,
            state.usage.summary(),
        );
        state.finish(Some(reason), None)
    }

    fn fail(&self, state: RunState, error: GenerateError) -> GenerateResult {
        self.event_handler.on_event(&AgentEvent::Failed(&error));
        info!(
            "Generation failed: trace_id={}, steps={}, error={error}",
            state.trace_id,
            state.steps.len(),
        );
        state.finish(None, Some(error))
    }
}
