//! Natural-language to SQL generation driven by a tool-calling language model.
//!
//! `sqlgen` sends a user request ("create a table named orders for users")
//! to an OpenAI-compatible chat completions API together with three
//! database introspection tools. The model may list databases, list tables
//! and fetch a table's DDL before answering with a single SQL statement.
//! The core abstraction is the [`Agent`](agent::harness::Agent): a bounded
//! loop that calls the model, executes requested tools, appends their
//! results to the transcript and repeats until the model answers in plain
//! text or the step budget runs out.
//!
//! # Getting started
//!
//! ```ignore
//! use sqlgen::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENAI_API_KEY")?;
//!     let model = Arc::new(OpenAiClient::new(api_key)?);
//!     let backend = Arc::new(CommandBackend::psql());
//!
//!     let generator = SqlGenerator::new(model, backend, GenerateOptions::default())?;
//!     let sql = generator.generate("insert 3 rows into the users table").await?;
//!     println!("{sql}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Entry point:** [`SqlGenerator`](generator::SqlGenerator), with the
//!   typed [`generate`](generator::SqlGenerator::generate) and the
//!   string-only [`generate_text`](generator::SqlGenerator::generate_text).
//! - **The loop:** [`Agent`](agent::harness::Agent) configured by
//!   [`GenerateOptions`](agent::config::GenerateOptions), observed through
//!   [`EventHandler`](agent::events::EventHandler), answered by
//!   [`select_text`](agent::selector::select_text).
//! - **Tools:** the [`Tool`](tools::core::Tool) trait,
//!   [`ToolRegistry`](tools::core::ToolRegistry) and the introspection tools
//!   in [`tools::introspection`].
//! - **Database access:** [`IntrospectionBackend`](backend::IntrospectionBackend)
//!   with [`CommandBackend`](backend::CommandBackend) (psql) and
//!   [`StaticBackend`](backend::StaticBackend) (fixtures).
//! - **Values:** [`value`] for the JSON value type, checked accessors and
//!   the tolerant list decoder.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Agent loop, options, events, result selection, default prompt |
//! | [`tools`] | Tool trait, registry, specs, introspection tools |
//! | [`backend`] | Introspection backends |
//! | [`api`] | Retry with backoff, trace ids |
//! | [`config`] | TOML configuration |
//! | [`error`] | Error types |

pub mod agent;
pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod prelude;
pub mod tools;
pub mod value;

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for generation.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// HTTP request timeout for one model call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, Some(content.into()))
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, Some(content.into()))
    }

    /// An assistant turn that requested tools, echoing any text it carried.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::new(MessageRole::Assistant, content.filter(|c| !c.is_empty()))
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(MessageRole::Tool, Some(content.into()))
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model. `arguments` is raw JSON text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// One model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A text-only response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("stop".into()),
            ..Self::default()
        }
    }

    /// A response requesting tools.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some("tool_calls".into()),
            ..Self::default()
        }
    }
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Decode a chat completions HTTP response.
///
/// Non-2xx statuses, undecodable bodies and explicit `error` objects map to
/// distinct [`ProviderError`] variants. A response without choices is an
/// empty completion, not an error.
pub fn parse_chat_response(status: u16, body: &str) -> Result<ChatCompletion, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(ProviderError::Http {
            status,
            body: body.to_string(),
        });
    }

    let parsed: RawChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(ProviderError::Api(err.message));
    }

    let choice = parsed.choices.and_then(|c| c.into_iter().next());
    Ok(match choice {
        Some(c) => ChatCompletion {
            content: c.message.content,
            tool_calls: c.message.tool_calls.unwrap_or_default(),
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        },
        None => ChatCompletion {
            usage: parsed.usage,
            ..ChatCompletion::default()
        },
    })
}

// ── Model seam ─────────────────────────────────────────────────────

/// Boxed future returned by [`ChatModel::chat`].
pub type ChatFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatCompletion, ProviderError>> + Send + 'a>>;

/// Anything that can answer a chat completion request.
///
/// Implemented by [`OpenAiClient`]; tests drive the loop with scripted
/// implementations.
pub trait ChatModel: Send + Sync {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient").field("url", &self.url).finish()
    }
}

impl OpenAiClient {
    /// Create a client for the default OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sqlgen/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: OPENAI_URL.to_string(),
        })
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a chat completion request.
    pub async fn send(&self, body: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={:?}, temp={:?}",
            body.model,
            body.messages.len(),
            body.tools.as_ref().map_or(0, |t| t.len()),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        let completion = parse_chat_response(status.as_u16(), &text)?;
        if let Some(usage) = completion.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }
        debug!(
            "LLM output: {} chars text, {} tool call(s)",
            completion.content.as_ref().map_or(0, |s| s.len()),
            completion.tool_calls.len()
        );
        Ok(completion)
    }
}

impl ChatModel for OpenAiClient {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.send(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));

        let calls = Message::assistant_tool_calls(
            Some("checking".into()),
            vec![ToolCall::new("c1", "list_databases", "{}")],
        );
        assert_eq!(calls.content.as_deref(), Some("checking"));
        assert_eq!(calls.tool_calls.as_ref().unwrap().len(), 1);

        let silent = Message::assistant_tool_calls(Some(String::new()), vec![]);
        assert_eq!(silent.content, None);
    }

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "gpt-4.1-nano".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["messages"][0].get("tool_calls").is_none());
    }

    #[test]
    fn zero_temperature_is_sent() {
        let req = ChatRequest {
            temperature: Some(0.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn parses_text_response() {
        let body = r#"{
            "choices": [{"message": {"content": "SELECT 1;"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }"#;
        let c = parse_chat_response(200, body).unwrap();
        assert_eq!(c.content.as_deref(), Some("SELECT 1;"));
        assert!(c.tool_calls.is_empty());
        assert_eq!(c.usage.unwrap().total_tokens, Some(13));
        assert_eq!(c.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn parses_tool_calls() {
        let body = r#"{"choices": [{"message": {"content": null, "tool_calls": [
            {"id": "call_a", "type": "function",
             "function": {"name": "get_schema_for_table",
                          "arguments": "{\"database_name\":\"app\",\"table_name\":\"users\"}"}}
        ]}, "finish_reason": "tool_calls"}]}"#;
        let c = parse_chat_response(200, body).unwrap();
        assert_eq!(c.content, None);
        assert_eq!(c.tool_calls.len(), 1);
        assert_eq!(c.tool_calls[0].id, "call_a");
        assert_eq!(c.tool_calls[0].function.name, "get_schema_for_table");
    }

    #[test]
    fn maps_failures_to_distinct_errors() {
        assert!(matches!(
            parse_chat_response(429, "slow down"),
            Err(ProviderError::Http { status: 429, .. })
        ));
        assert!(matches!(
            parse_chat_response(200, "<html>"),
            Err(ProviderError::Decode(_))
        ));
        let err = parse_chat_response(200, r#"{"error": {"message": "invalid api key"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "provider API error: invalid api key");
    }

    #[test]
    fn no_choices_is_an_empty_completion() {
        let c = parse_chat_response(200, r#"{"choices": []}"#).unwrap();
        assert_eq!(c, ChatCompletion::default());
    }

    #[test]
    fn tool_def_serializes_in_function_format() {
        let def = ToolDef::new("list_databases", "List the databases", serde_json::json!({}));
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "list_databases");
    }
}
