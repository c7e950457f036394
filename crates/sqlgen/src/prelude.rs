//! Convenience re-exports for common `sqlgen` types.
//!
//! ```ignore
//! use sqlgen::prelude::*;
//! ```
//!
//! Pulls in the model client, the generator, the agent loop with its
//! options and handlers, the tool traits and the backends. Wire-level and
//! retry types stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatModel, ChatRequest, Message, OpenAiClient, ToolDef};

// ── Entry point ─────────────────────────────────────────────────────
pub use crate::generator::SqlGenerator;

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentEvent, CompositeEventHandler, EventHandler, FinishReason, FnEventHandler,
    GenerateOptions, GenerateResult, LoggingHandler, NoopHandler, Step, select_text,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    FnTool, ParamType, Tool, ToolCallRequest, ToolContext, ToolFuture, ToolRegistry, ToolResult,
    ToolSpec,
};

// ── Backends ────────────────────────────────────────────────────────
pub use crate::backend::{CommandBackend, IntrospectionBackend, StaticBackend};

// ── Errors and values ───────────────────────────────────────────────
pub use crate::error::{GenerateError, ProviderError, ToolError};
pub use crate::value::{Value, ValueExt, json};
