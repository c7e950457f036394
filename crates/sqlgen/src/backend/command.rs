//! External-command introspection backend.
//!
//! Each operation runs one program directly (no shell). Arguments may
//! contain a `{{table}}` placeholder that is replaced with the requested
//! table name; the optional `stdin` script is written verbatim and never
//! substituted. The default specs drive `psql`, passing the table name as a
//! psql variable so psql does the quoting.

use super::{BackendFuture, IntrospectionBackend, non_empty};
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, trace, warn};

/// Placeholder substituted with the table name in command arguments.
pub const TABLE_PLACEHOLDER: &str = "{{table}}";

/// Default timeout for one backend command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

const LIST_DATABASES_SQL: &str = "\
SELECT COALESCE(json_agg(datname)::text, '[]')
FROM (SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname) q;
";

const LIST_TABLES_SQL: &str = "\
SELECT COALESCE(json_agg(format('%s.%s', n.nspname, c.relname))::text, '[]')
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'v', 'p')
  AND n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
  AND pg_catalog.pg_table_is_visible(c.oid);
";

const SCHEMA_FOR_TABLE_SQL: &str = "\
WITH cols AS (
  SELECT n.nspname, c.relname, a.attnum, a.attname,
         pg_catalog.format_type(a.atttypid, a.atttypmod) AS coltype,
         pg_get_expr(ad.adbin, ad.adrelid) AS coldefault,
         a.attnotnull
  FROM pg_class c
  JOIN pg_namespace n ON n.oid = c.relnamespace
  JOIN pg_attribute a ON a.attrelid = c.oid
  LEFT JOIN pg_attrdef ad ON ad.adrelid = c.oid AND ad.adnum = a.attnum
  WHERE c.relkind = 'r' AND a.attnum > 0 AND NOT a.attisdropped
    AND c.relname = :'table'
)
SELECT 'CREATE TABLE ' || nspname || '.' || relname || ' (' ||
       string_agg(' ' || attname || ' ' || coltype
                  || COALESCE(' DEFAULT ' || coldefault, '')
                  || CASE WHEN attnotnull THEN ' NOT NULL' ELSE '' END,
                  ',' ORDER BY attnum) || ');'
FROM cols
GROUP BY nspname, relname;
";

/// How to run one backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Script written to the child's stdin, if any.
    pub stdin: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            stdin: None,
            timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_stdin(mut self, script: impl Into<String>) -> Self {
        self.stdin = Some(script.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// `psql` in quiet, unaligned, tuples-only mode reading `sql` from stdin.
    pub fn psql(sql: &str) -> Self {
        Self::new(
            "psql",
            [
                "-X",
                "-q",
                "-A",
                "-t",
                "-v",
                "ON_ERROR_STOP=1",
                "-v",
                "table={{table}}",
                "-f",
                "-",
            ],
        )
        .with_stdin(sql)
    }

    pub fn psql_list_databases() -> Self {
        Self::psql(LIST_DATABASES_SQL)
    }

    pub fn psql_list_tables() -> Self {
        Self::psql(LIST_TABLES_SQL)
    }

    pub fn psql_schema_for_table() -> Self {
        Self::psql(SCHEMA_FOR_TABLE_SQL)
    }

    /// Arguments with [`TABLE_PLACEHOLDER`] replaced by `table` (or removed).
    pub fn render_args(&self, table: Option<&str>) -> Vec<String> {
        let replacement = table.unwrap_or("");
        self.args
            .iter()
            .map(|arg| arg.replace(TABLE_PLACEHOLDER, replacement))
            .collect()
    }

    /// Run the command and return trimmed stdout, or `None` if it printed
    /// nothing.
    pub async fn run(&self, table: Option<&str>) -> Result<Option<String>, BackendError> {
        let program = self.program.clone();
        let args = self.render_args(table);
        debug!("Running backend command: {program} {}", args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        // The stdin write and the wait share one time limit.
        let feed = feed_stdin(child.stdin.take(), self.stdin.as_deref());
        let limit = Duration::from_secs(self.timeout_secs);
        let (written, output) =
            match tokio::time::timeout(limit, async { tokio::join!(feed, child.wait_with_output()) })
                .await
            {
                Ok(pair) => pair,
                Err(_) => {
                    return Err(BackendError::Timeout {
                        program,
                        secs: self.timeout_secs,
                    });
                }
            };
        let output = output.map_err(|e| BackendError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let stderr = match written {
                Err(e) if stderr.is_empty() => format!("failed to write stdin: {e}"),
                _ => stderr,
            };
            return Err(BackendError::CommandFailed {
                program,
                status: output.status.to_string(),
                stderr,
            });
        }
        if let Err(e) = written {
            warn!("{program} exited before reading all of stdin: {e}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        trace!("Backend command {program} printed {} bytes", stdout.len());
        Ok(non_empty(Some(stdout)))
    }
}

/// Write `script` to the child's stdin, then close it.
async fn feed_stdin(pipe: Option<ChildStdin>, script: Option<&str>) -> std::io::Result<()> {
    match (pipe, script) {
        (Some(mut pipe), Some(script)) => {
            pipe.write_all(script.as_bytes()).await?;
            pipe.shutdown().await
        }
        _ => Ok(()),
    }
}

/// A backend that runs one [`CommandSpec`] per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBackend {
    pub databases: CommandSpec,
    pub tables: CommandSpec,
    pub schema: CommandSpec,
}

impl CommandBackend {
    pub fn new(databases: CommandSpec, tables: CommandSpec, schema: CommandSpec) -> Self {
        Self {
            databases,
            tables,
            schema,
        }
    }

    /// `psql` against the database selected by the `PG*` environment.
    pub fn psql() -> Self {
        Self::new(
            CommandSpec::psql_list_databases(),
            CommandSpec::psql_list_tables(),
            CommandSpec::psql_schema_for_table(),
        )
    }
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::psql()
    }
}

impl IntrospectionBackend for CommandBackend {
    fn list_databases(&self) -> BackendFuture<'_> {
        Box::pin(self.databases.run(None))
    }

    fn list_tables(&self) -> BackendFuture<'_> {
        Box::pin(self.tables.run(None))
    }

    fn schema_for_table<'a>(&'a self, table: &'a str) -> BackendFuture<'a> {
        Box::pin(self.schema.run(Some(table)))
    }
}
