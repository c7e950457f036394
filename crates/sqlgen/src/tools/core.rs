//! Tool abstraction for the generation loop.
//!
//! The [`Tool`] trait defines the interface every tool implements: a
//! declarative [`ToolSpec`] and an async `execute` that maps an argument
//! [`Value`] to a result [`Value`]. Tools are collected into an immutable
//! [`ToolRegistry`] which owns the error boundary: unknown names, invalid
//! arguments, handler errors, panics and timeouts all come back as failed
//! [`ToolResult`]s rather than escaping to the caller.

use crate::ToolDef;
use crate::error::{RegistryError, ToolError};
use crate::tools::spec::ToolSpec;
use crate::value::{self, Value, json};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Default timeout for tool execution (60 seconds).
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

// ── Call / result types ────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Correlation id pairing this request with its result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one tool invocation.
///
/// A failed result still carries a `{"result": "..."}` diagnostic so the
/// model can read what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub value: Value,
    pub success: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, value: Value) -> Self {
        Self {
            call_id: call_id.into(),
            value,
            success: true,
        }
    }

    pub fn failure(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            value: json!({ "result": message.into() }),
            success: false,
        }
    }

    /// The human-readable `result` field, if present.
    pub fn result_text(&self) -> Option<&str> {
        self.value.get("result").and_then(Value::as_str)
    }
}

/// What a handler may know about its own invocation.
///
/// Carries no transcript: handlers see only their arguments and this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    pub call_id: String,
    pub tool_name: String,
    /// Zero-based index of the step that requested the call.
    pub step: usize,
}

impl ToolContext {
    pub fn for_call(request: &ToolCallRequest, step: usize) -> Self {
        Self {
            call_id: request.id.clone(),
            tool_name: request.name.clone(),
            step,
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool the model can invoke via function-calling.
///
/// # Example
///
/// ```ignore
/// struct Ping { spec: ToolSpec }
///
/// impl Tool for Ping {
///     fn spec(&self) -> &ToolSpec { &self.spec }
///
///     fn execute<'a>(&'a self, _args: &'a Value, _ctx: &'a ToolContext) -> ToolFuture<'a> {
///         Box::pin(async { Ok(json!({"result": "pong"})) })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Declarative description of the tool.
    fn spec(&self) -> &ToolSpec;

    /// Run the tool. Errors are converted to failed results by the registry.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute<'a>(&'a self, args: &'a Value, ctx: &'a ToolContext) -> ToolFuture<'a>;

    fn name(&self) -> &str {
        &self.spec().name
    }

    /// The tool definition sent to the provider.
    fn definition(&self) -> ToolDef {
        self.spec().to_tool_def()
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// An immutable name → tool mapping with a uniform error boundary.
///
/// Built once with [`ToolRegistry::builder`], then shared read-only
/// (typically behind an `Arc`) by any number of concurrent runs.
///
/// ```ignore
/// let tools = ToolRegistry::builder()
///     .with_introspection_tools(backend)
///     .with_if(debug, EchoTool::new())
///     .with_default_timeout(Some(Duration::from_secs(30)))
///     .build()?;
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
    validate_args: bool,
    default_timeout: Option<Duration>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("validate_args", &self.validate_args)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            validate_args: true,
            default_timeout: None,
        }
    }

    /// Definitions for the provider API, in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Per-call limit applied by [`invoke`](Self::invoke), if any.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Invoke a tool by name. Never fails: every problem becomes a failed
    /// [`ToolResult`] carrying a diagnostic `result` string.
    pub async fn invoke(&self, request: &ToolCallRequest, ctx: &ToolContext) -> ToolResult {
        let name = request.name.as_str();
        let Some(tool) = self.get(name) else {
            warn!("Model requested unknown tool '{name}'");
            return ToolResult::failure(&request.id, format!("unknown tool: {name}"));
        };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.spec(), &request.arguments)
        {
            warn!("Rejected arguments for {name}: {error}");
            return ToolResult::failure(&request.id, error);
        }

        log_tool_call(name, &request.arguments);
        let start = Instant::now();

        let guarded =
            AssertUnwindSafe(async { tool.execute(&request.arguments, ctx).await }).catch_unwind();
        let outcome = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    return ToolResult::failure(
                        &request.id,
                        format!(
                            "Error: tool '{name}' timed out after {:.0} seconds",
                            limit.as_secs_f64()
                        ),
                    );
                }
            },
            None => guarded.await,
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(Ok(value)) => {
                debug!("Tool {name} completed in {elapsed_ms:.0}ms");
                trace!("Tool {name} result: {}", preview(&value::serialize(&value), 300));
                ToolResult::ok(&request.id, value)
            }
            Ok(Err(e)) => {
                warn!("Tool {name} failed after {elapsed_ms:.0}ms: {e}");
                ToolResult::failure(&request.id, format!("Error: {e}"))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!("Tool {name} panicked: {msg}");
                ToolResult::failure(&request.id, format!("Error: tool '{name}' panicked: {msg}"))
            }
        }
    }
}

/// Builder for [`ToolRegistry`]. Duplicate names are reported by
/// [`build`](Self::build).
pub struct ToolRegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
    validate_args: bool,
    default_timeout: Option<Duration>,
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self {
            tools: Vec::new(),
            validate_args: true,
            default_timeout: None,
        }
    }
}

impl ToolRegistryBuilder {
    /// Register a tool.
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    /// Register a tool only when `condition` is `true`.
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Validate arguments against each tool's schema before execution.
    /// Enabled by default.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Per-call timeout. `None` disables timeouts.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(RegistryError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
            validate_args: self.validate_args,
            default_timeout: self.default_timeout,
        })
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler = Box<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>> + Send + Sync,
>;

/// A closure-based tool that deserializes its arguments and delegates to a
/// handler.
///
/// Use for stateless tools. Tools that hold a backend or other shared state
/// implement [`Tool`] directly.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct EchoArgs { text: String }
///
/// let echo = FnTool::new(
///     ToolSpec::builder("echo").param("text", ParamType::String, "").build(),
///     |args: EchoArgs| async move { Ok(json!({"result": args.text})) },
/// );
/// ```
pub struct FnTool {
    spec: ToolSpec,
    handler: ErasedToolHandler,
}

impl FnTool {
    pub fn new<A, F, Fut>(spec: ToolSpec, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        use crate::value::ValueExt;
        let erased = move |raw: Value| -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>> {
            match raw.try_get::<A>() {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move { Err(ToolError::InvalidArguments(e)) }),
            }
        };
        Self {
            spec,
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn execute<'a>(&'a self, args: &'a Value, _ctx: &'a ToolContext) -> ToolFuture<'a> {
        (self.handler)(args.clone())
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").field("name", &self.spec.name).finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate arguments against the schema derived from `spec`.
///
/// Returns `None` if valid, or a message the model can use to self-correct.
pub fn validate_tool_arguments(spec: &ToolSpec, args: &Value) -> Option<String> {
    let schema = spec.parameters_schema();
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping validation for {}: invalid schema: {e}", spec.name);
            return None;
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}",
            spec.name,
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, args: &Value) {
    let text = value::serialize(args);
    info!("[tool] {name}({})", preview(&text, 120));
    trace!("[tool] {name} arguments: {text}");
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
