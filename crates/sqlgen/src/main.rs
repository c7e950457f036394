//! Turn a natural-language request into one SQL statement.
//!
//! Reads the provider API key from the environment variable named by
//! `model.api_key_env` in the config (default `OPENAI_API_KEY`) and
//! introspects the database with `psql`, connecting through the standard
//! `PG*` environment variables.
//!
//! # Examples
//!
//! ```sh
//! # Uses ./sqlgen.toml if present
//! sqlgen "insert 3 rows into the users table"
//!
//! # Override the model and step budget, with info logs on stderr
//! sqlgen --model gpt-4.1-mini --max-steps 8 -v "show all users from accounts"
//!
//! # No database access: every introspection tool reports no data
//! sqlgen --offline "create a table named orders for users"
//! ```

use clap::Parser;
use sqlgen::agent::LoggingHandler;
use sqlgen::api::RetryingModel;
use sqlgen::backend::{IntrospectionBackend, StaticBackend};
use sqlgen::config::{SqlgenConfig, load_config};
use sqlgen::generator::SqlGenerator;
use sqlgen::{ChatModel, OpenAiClient, logging};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;

/// Generate SQL from a natural-language request.
#[derive(Parser)]
#[command(name = "sqlgen", version)]
struct Cli {
    /// Configuration file. Missing means built-in defaults.
    #[arg(long, default_value = "sqlgen.toml")]
    config: PathBuf,

    /// Model to use for completions.
    #[arg(long)]
    model: Option<String>,

    /// Maximum model calls per request.
    #[arg(long)]
    max_steps: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f32>,

    /// Give up after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Do not touch the database; introspection tools return no data.
    #[arg(long)]
    offline: bool,

    /// More logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// The request, e.g. "create a table named orders for users".
    #[arg(required = true)]
    prompt: Vec<String>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut SqlgenConfig) {
        if let Some(model) = &self.model {
            config.model.name.clone_from(model);
        }
        if let Some(steps) = self.max_steps {
            config.agent.max_steps = steps;
        }
        if let Some(t) = self.temperature {
            config.model.temperature = Some(t);
        }
        if let Some(secs) = self.timeout_secs {
            config.agent.timeout_secs = Some(secs);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli).await {
        Ok(sql) => println!("{}", sql.trim()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<String, Box<dyn Error>> {
    let mut config = load_config(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let api_key = std::env::var(&config.model.api_key_env).map_err(|_| {
        format!(
            "{} environment variable is not set",
            config.model.api_key_env
        )
    })?;
    let client = OpenAiClient::new(api_key)?.with_url(&config.model.base_url);
    let retry = config.retry_config();
    let model: Arc<dyn ChatModel> = if retry.max_retries > 0 {
        Arc::new(RetryingModel::new(client, retry))
    } else {
        Arc::new(client)
    };

    let backend: Arc<dyn IntrospectionBackend> = if cli.offline {
        info!("Offline mode: introspection tools will report no data");
        Arc::new(StaticBackend::new())
    } else {
        Arc::new(config.backend.to_backend())
    };

    let generator = SqlGenerator::new(model, backend, config.generate_options())?
        .with_event_handler(LoggingHandler);

    let prompt = cli.prompt.join(" ");
    Ok(generator.generate(&prompt).await?)
}
