//! TOML configuration file.
//!
//! Every field has a default, so an absent file or an empty one yields a
//! working psql-backed configuration.
//!
//! ```toml
//! [model]
//! name = "gpt-4.1-mini"
//! temperature = 0.2
//! api_key_env = "OPENAI_API_KEY"
//!
//! [agent]
//! max_steps = 8
//! timeout_secs = 60
//! retries = 2
//!
//! [backend.tables]
//! program = "psql"
//! args = ["-X", "-A", "-t", "-d", "app", "-f", "-"]
//! stdin = "SELECT json_agg(tablename) FROM pg_tables WHERE schemaname = 'public';"
//! ```

use crate::agent::GenerateOptions;
use crate::api::RetryConfig;
use crate::backend::{CommandBackend, CommandSpec};
use crate::error::ConfigError;
use crate::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, OPENAI_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default environment variable holding the provider API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Upper bound for any configured timeout: one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlgenConfig {
    pub model: ModelSection,
    pub agent: AgentSection,
    pub backend: BackendSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub name: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Chat completions endpoint of an OpenAI-compatible provider.
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
            base_url: OPENAI_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: u32,
    pub timeout_secs: Option<u64>,
    pub sequential_tools: bool,
    /// Provider-call retries for transient failures.
    pub retries: u32,
    /// Replaces the built-in SQL generator prompt.
    pub system_prompt: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: crate::agent::DEFAULT_MAX_STEPS,
            timeout_secs: None,
            sequential_tools: false,
            retries: 0,
            system_prompt: None,
        }
    }
}

/// One command per introspection operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub databases: CommandSpec,
    pub tables: CommandSpec,
    pub schema: CommandSpec,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            databases: CommandSpec::psql_list_databases(),
            tables: CommandSpec::psql_list_tables(),
            schema: CommandSpec::psql_schema_for_table(),
        }
    }
}

impl BackendSection {
    pub fn to_backend(&self) -> CommandBackend {
        CommandBackend::new(
            self.databases.clone(),
            self.tables.clone(),
            self.schema.clone(),
        )
    }
}

impl SqlgenConfig {
    /// Parse TOML text and validate it.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid("agent.max_steps must be at least 1".into()));
        }
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Invalid("model.name must not be empty".into()));
        }
        if let Some(t) = self.model.temperature
            && !(t >= 0.0 && t.is_finite())
        {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be a non-negative number, got {t}"
            )));
        }
        if let Some(secs) = self.agent.timeout_secs
            && !(1..=MAX_TIMEOUT_SECS).contains(&secs)
        {
            return Err(ConfigError::Invalid(format!(
                "agent.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}, got {secs}"
            )));
        }
        for (name, spec) in [
            ("databases", &self.backend.databases),
            ("tables", &self.backend.tables),
            ("schema", &self.backend.schema),
        ] {
            if spec.program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend.{name}.program must not be empty"
                )));
            }
            if !(1..=MAX_TIMEOUT_SECS).contains(&spec.timeout_secs) {
                return Err(ConfigError::Invalid(format!(
                    "backend.{name}.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"
                )));
            }
        }
        Ok(())
    }

    /// Run options built from the `[model]` and `[agent]` sections.
    pub fn generate_options(&self) -> GenerateOptions {
        let mut options = GenerateOptions::default()
            .with_model(&self.model.name)
            .with_max_steps(self.agent.max_steps)
            .with_sequential_tools(self.agent.sequential_tools);
        options.temperature = self.model.temperature;
        options.max_tokens = self.model.max_tokens;
        options.timeout = self.agent.timeout_secs.map(Duration::from_secs);
        if let Some(prompt) = &self.agent.system_prompt {
            options.system.clone_from(prompt);
        }
        options
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_retries(self.agent.retries)
    }
}

/// Load the configuration at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<SqlgenConfig, ConfigError> {
    let origin = path.display().to_string();
    if !path.exists() {
        debug!("No config file at {origin}, using defaults");
        return Ok(SqlgenConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: origin.clone(),
        reason: e.to_string(),
    })?;
    debug!("Loaded config from {origin} ({} bytes)", text.len());
    SqlgenConfig::from_toml(&text, &origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("sqlgen.toml")).unwrap();
        assert_eq!(config, SqlgenConfig::default());
        assert_eq!(config.backend.schema.program, "psql");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
            [model]
            name = "gpt-4.1-mini"
            temperature = 0.0

            [agent]
            max_steps = 8
            timeout_secs = 30
            system_prompt = "Only SELECT."

            [backend.tables]
            program = "cat"
            args = ["tables.json"]
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.model.name, "gpt-4.1-mini");
        assert_eq!(config.model.base_url, OPENAI_URL);
        assert_eq!(config.backend.tables.program, "cat");
        assert_eq!(config.backend.tables.stdin, None);
        assert_eq!(config.backend.tables.timeout_secs, 30);
        assert_eq!(config.backend.schema, CommandSpec::psql_schema_for_table());

        let options = config.generate_options();
        assert_eq!(options.model, "gpt-4.1-mini");
        assert_eq!(options.max_steps, 8);
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.system, "Only SELECT.");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "[agent]\nmax_steps = 0",
            "[model]\ntemperature = -0.5",
            "[backend.schema]\nprogram = \"\"",
            "[agent]\ntimeout_secs = 0",
            "[backend.tables]\ntimeout_secs = 86401",
        ] {
            let file = write_config(text);
            assert!(
                matches!(load_config(file.path()), Err(ConfigError::Invalid(_))),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn oversized_cli_timeout_fails_validation() {
        let mut config = SqlgenConfig::default();
        config.agent.timeout_secs = Some(u64::MAX);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("agent.timeout_secs must be between 1 and 86400"));

        config.agent.timeout_secs = Some(MAX_TIMEOUT_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let file = write_config("[agent\nmax_steps = 3");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("failed to parse"));
    }

    #[test]
    fn retries_feed_the_retry_config() {
        let config = SqlgenConfig::from_toml("[agent]\nretries = 3", "inline").unwrap();
        assert_eq!(config.retry_config().max_retries, 3);
        assert_eq!(SqlgenConfig::default().retry_config().max_retries, 0);
    }
}
