//! The natural-language to SQL entry point.
//!
//! [`SqlGenerator`] owns a model client, an immutable tool registry and a
//! template [`GenerateOptions`]. Each call runs an independent [`Agent`]
//! with the template's settings and the caller's prompt, so one generator
//! can serve concurrent requests through `&self`.

use crate::ChatModel;
use crate::agent::{Agent, EventHandler, GenerateOptions, GenerateResult, NoopHandler};
use crate::backend::IntrospectionBackend;
use crate::error::{GenerateError, RegistryError};
use crate::tools::{DEFAULT_TOOL_TIMEOUT, ToolRegistry};
use std::sync::Arc;
use tracing::warn;

/// Generates SQL from natural-language requests.
///
/// ```ignore
/// let generator = SqlGenerator::new(model, backend, GenerateOptions::default())?;
///
/// match generator.generate("create a table named orders for users").await {
///     Ok(sql) => println!("{sql}"),
///     Err(e) if e.is_cancelled() => eprintln!("gave up: {e}"),
///     Err(e) => eprintln!("failed: {e}"),
/// }
/// ```
pub struct SqlGenerator {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    options: GenerateOptions,
    event_handler: Arc<dyn EventHandler>,
}

impl SqlGenerator {
    /// A generator exposing the three introspection tools over `backend`,
    /// each call limited to [`DEFAULT_TOOL_TIMEOUT`].
    pub fn new(
        model: Arc<dyn ChatModel>,
        backend: Arc<dyn IntrospectionBackend>,
        options: GenerateOptions,
    ) -> Result<Self, RegistryError> {
        let tools = ToolRegistry::builder()
            .with_introspection_tools(backend)
            .with_default_timeout(Some(DEFAULT_TOOL_TIMEOUT))
            .build()?;
        Ok(Self::with_registry(model, tools, options))
    }

    /// A generator over a caller-built registry.
    pub fn with_registry(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        options: GenerateOptions,
    ) -> Self {
        Self {
            model,
            tools,
            options,
            event_handler: Arc::new(NoopHandler),
        }
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handler = Arc::new(handler);
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one generation and return the full result, transcript included.
    pub async fn run(&self, prompt: &str) -> GenerateResult {
        let options = self.options.clone().with_prompt(prompt);
        Agent::new(self.model.as_ref(), &self.tools, options)
            .with_event_handler(self.event_handler.as_ref())
            .run()
            .await
    }

    /// Generate SQL for `prompt`.
    ///
    /// Returns the selected answer text, or the provider failure or
    /// cancellation that ended the run.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.run(prompt).await.into_answer()
    }

    /// String-only form of [`generate`](Self::generate) for boundaries that
    /// cannot carry a result type: on failure the returned text is the
    /// human-readable diagnostic instead of SQL.
    pub async fn generate_text(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(sql) => sql,
            Err(e) => {
                warn!("Generation failed, returning diagnostic text: {e}");
                e.to_string()
            }
        }
    }
}

impl std::fmt::Debug for SqlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlGenerator")
            .field("tools", &self.tools.names())
            .field("options", &self.options)
            .finish()
    }
}
