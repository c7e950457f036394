//! Error taxonomy for the generator.
//!
//! Failures are split by who recovers them. [`ValueError`], [`BackendError`]
//! and [`ToolError`] never leave the tool boundary: the registry turns them
//! into failed tool results the model can react to. [`ProviderError`] and
//! cancellation end a run and surface as [`GenerateError`].

use thiserror::Error;

/// Shape or syntax problems with a [`Value`](crate::value::Value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The text was not well-formed JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The value exists but has a different type than requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An object did not contain the requested key.
    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    /// An array index was past the end.
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Failures from an introspection backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend process could not be started.
    #[error("failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The backend process exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The backend did not answer in time.
    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The backend is not available at all.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised inside a tool handler.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments did not match the tool's declared parameters.
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] ValueError),

    /// The backend behind the tool failed.
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

/// Configuration errors in the tool registry, raised at build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate tool name: '{0}'")]
    DuplicateTool(String),
}

/// Failures talking to the language-model provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The request never produced an HTTP response (DNS, TLS, reset, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider API HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// The provider returned an explicit error object.
    #[error("provider API error: {0}")]
    Api(String),
}

/// Fatal outcomes of a generation run.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// The model call failed. Not retried by the loop.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The run was stopped by a stop signal or its deadline.
    #[error("generation cancelled: {0}")]
    Cancelled(String),
}

impl GenerateError {
    /// Whether the run was cancelled rather than failed by the provider.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerateError::Cancelled(_))
    }
}

/// Errors loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
