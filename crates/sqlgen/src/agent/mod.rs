//! Agent runtime: the [`Agent`] loop and its supporting modules.
//!
//! - [`harness::Agent`]: the bounded tool-calling loop. Start here.
//! - [`config::GenerateOptions`]: model, prompts, step budget, sampling and
//!   cancellation for one run.
//! - [`events`]: the [`EventHandler`] trait, [`AgentEvent`] and the run
//!   result types [`Step`] and [`GenerateResult`].
//! - [`selector`]: picks the answer text out of a finished run.
//! - [`prompt`]: the built-in SQL generator system prompt.

pub mod config;
pub mod events;
pub mod execution;
pub mod harness;
pub mod prompt;
pub mod selector;

pub use config::{DEFAULT_MAX_STEPS, GenerateOptions, StopSignal};
pub use events::{
    AgentEvent, CompositeEventHandler, EventHandler, FinishReason, FnEventHandler,
    GenerateResult, LoggingHandler, NoopHandler, Step,
};
pub use execution::parse_tool_arguments;
pub use harness::Agent;
pub use prompt::{SystemPromptBuilder, default_system_prompt};
pub use selector::select_text;
