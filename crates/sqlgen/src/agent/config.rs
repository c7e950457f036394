//! Per-run options for the [`Agent`](super::harness::Agent).
//!
//! ```ignore
//! let options = GenerateOptions::new("insert 3 rows into users")
//!     .with_model("gpt-4.1-mini")
//!     .with_max_steps(8)
//!     .with_temperature(0.2)
//!     .with_timeout(Duration::from_secs(30));
//! ```

use super::prompt::default_system_prompt;
use crate::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use std::sync::Arc;
use std::time::Duration;

/// Default step budget.
pub const DEFAULT_MAX_STEPS: u32 = 5;

/// External cancellation check. Returns `true` once the run should stop.
pub type StopSignal = Arc<dyn Fn() -> bool + Send + Sync>;

/// Options for one generation run. Immutable once the run starts.
#[derive(Clone)]
pub struct GenerateOptions {
    /// Model identifier sent with every request.
    pub model: String,
    /// First conversational turn, passed verbatim.
    pub system: String,
    /// The user's request.
    pub prompt: String,
    /// Maximum number of model calls. Values below 1 are treated as 1.
    pub max_steps: u32,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Run each round's tool calls one at a time instead of concurrently.
    pub sequential_tools: bool,
    /// Wall-clock limit for the whole run.
    pub timeout: Option<Duration>,
    pub stop_signal: Option<StopSignal>,
}

impl std::fmt::Debug for GenerateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateOptions")
            .field("model", &self.model)
            .field("system", &format_args!("{} chars", self.system.len()))
            .field("prompt", &self.prompt)
            .field("max_steps", &self.max_steps)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("sequential_tools", &self.sequential_tools)
            .field("timeout", &self.timeout)
            .field("stop_signal", &self.stop_signal.is_some())
            .finish()
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system: default_system_prompt(),
            prompt: String::new(),
            max_steps: DEFAULT_MAX_STEPS,
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
            sequential_tools: false,
            timeout: None,
            stop_signal: None,
        }
    }
}

impl GenerateOptions {
    /// Defaults with the given user prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_sequential_tools(mut self, sequential: bool) -> Self {
        self.sequential_tools = sequential;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stop_signal(mut self, signal: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.stop_signal = Some(Arc::new(signal));
        self
    }

    /// The step budget actually enforced.
    pub fn step_budget(&self) -> u32 {
        self.max_steps.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn defaults_match_the_sql_generator() {
        let options = GenerateOptions::default();
        assert_eq!(options.model, "gpt-4.1-nano");
        assert_eq!(options.max_steps, 5);
        assert_eq!(options.temperature, Some(1.0));
        assert!(options.system.contains("SQL code generator"));
        assert!(options.prompt.is_empty());
        assert!(!options.sequential_tools);
        assert!(options.stop_signal.is_none());
    }

    #[test]
    fn builder_methods() {
        let options = GenerateOptions::new("show all users")
            .with_model("m")
            .with_system("sys")
            .with_max_steps(2)
            .with_temperature(0.0)
            .with_max_tokens(256)
            .with_sequential_tools(true)
            .with_timeout(Duration::from_secs(3));
        assert_eq!(options.prompt, "show all users");
        assert_eq!(options.model, "m");
        assert_eq!(options.system, "sys");
        assert_eq!(options.step_budget(), 2);
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.max_tokens, Some(256));
        assert!(options.sequential_tools);
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn zero_budget_is_clamped() {
        assert_eq!(GenerateOptions::default().with_max_steps(0).step_budget(), 1);
    }

    #[test]
    fn stop_signal_is_shared_across_clones() {
        let flag = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&flag);
        let options = GenerateOptions::default().with_stop_signal(move || f.load(Ordering::SeqCst));
        let copy = options.clone();
        flag.store(true, Ordering::SeqCst);
        assert!(copy.stop_signal.as_ref().is_some_and(|s| s()));
        assert!(format!("{options:?}").contains("stop_signal: true"));
    }
}
