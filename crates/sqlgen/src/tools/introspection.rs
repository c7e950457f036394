//! The three database introspection tools exposed to the model.
//!
//! Each tool wraps one [`IntrospectionBackend`] operation and returns an
//! object with a human-readable `result` summary plus structured keys
//! (`databases`, `tables`, or `database`/`table`/`schema`). Missing or
//! malformed backend payloads become empty lists or an empty schema, never
//! an error.

use crate::backend::{IntrospectionBackend, non_empty};
use crate::error::ToolError;
use crate::tools::core::{Tool, ToolContext, ToolFuture, ToolRegistryBuilder};
use crate::tools::names;
use crate::tools::spec::{ParamType, ToolSpec};
use crate::value::{Value, ValueExt, decode_string_list, json};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

impl ToolRegistryBuilder {
    /// Register `list_databases`, `list_tables_in_database` and
    /// `get_schema_for_table` against one shared backend.
    pub fn with_introspection_tools(self, backend: Arc<dyn IntrospectionBackend>) -> Self {
        self.with(ListDatabases::new(Arc::clone(&backend)))
            .with(ListTables::new(Arc::clone(&backend)))
            .with(GetSchemaForTable::new(backend))
    }
}

/// Strip everything up to and including the first `.`: `public.users` →
/// `users`.
pub fn strip_schema_prefix(table: &str) -> &str {
    table.split_once('.').map_or(table, |(_, rest)| rest)
}

fn bullet_list(header: String, items: &[String]) -> String {
    let mut out = header;
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out
}

// ── list_databases ─────────────────────────────────────────────────

pub struct ListDatabases {
    spec: ToolSpec,
    backend: Arc<dyn IntrospectionBackend>,
}

impl ListDatabases {
    pub fn new(backend: Arc<dyn IntrospectionBackend>) -> Self {
        Self {
            spec: ToolSpec::builder(names::LIST_DATABASES)
                .purpose("List the databases")
                .output_format("{result, databases: [name]}")
                .build(),
            backend,
        }
    }
}

impl Tool for ListDatabases {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn execute<'a>(&'a self, _args: &'a Value, _ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(list_databases(self.backend.as_ref()))
    }
}

async fn list_databases(backend: &dyn IntrospectionBackend) -> Result<Value, ToolError> {
    let databases = match non_empty(backend.list_databases().await?) {
        Some(payload) => decode_string_list(&payload),
        None => {
            debug!("list_databases backend returned no payload");
            Vec::new()
        }
    };
    let result = bullet_list(format!("Found {} databases:\n", databases.len()), &databases);
    info!("{}", result.trim_end());
    Ok(json!({ "result": result, "databases": databases }))
}

// ── list_tables_in_database ────────────────────────────────────────

pub struct ListTables {
    spec: ToolSpec,
    backend: Arc<dyn IntrospectionBackend>,
}

impl ListTables {
    pub fn new(backend: Arc<dyn IntrospectionBackend>) -> Self {
        Self {
            spec: ToolSpec::builder(names::LIST_TABLES)
                .purpose("List tables in database")
                .when_to_use("To check whether a table exists before using it")
                .output_format("{result, tables: [schema.table]}")
                .build(),
            backend,
        }
    }
}

impl Tool for ListTables {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn execute<'a>(&'a self, _args: &'a Value, _ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(list_tables(self.backend.as_ref()))
    }
}

async fn list_tables(backend: &dyn IntrospectionBackend) -> Result<Value, ToolError> {
    let tables = non_empty(backend.list_tables().await?)
        .map(|payload| decode_string_list(&payload))
        .unwrap_or_default();
    let mut result = bullet_list(
        format!("Found {} tables in database:\n", tables.len()),
        &tables,
    );
    if tables.is_empty() {
        result.push_str("No tables in this database\n");
    }
    info!("{}", result.trim_end());
    Ok(json!({ "result": result, "tables": tables }))
}

// ── get_schema_for_table ───────────────────────────────────────────

pub struct GetSchemaForTable {
    spec: ToolSpec,
    backend: Arc<dyn IntrospectionBackend>,
}

#[derive(Debug, Deserialize)]
struct SchemaArgs {
    database_name: String,
    table_name: String,
}

impl GetSchemaForTable {
    pub fn new(backend: Arc<dyn IntrospectionBackend>) -> Self {
        Self {
            spec: ToolSpec::builder(names::GET_SCHEMA_FOR_TABLE)
                .purpose("Get the schema for an existing table")
                .when_to_use("Before generating INSERT or SELECT statements for a table")
                .output_format("{result, database, table, schema}; schema is empty when not found")
                .param("database_name", ParamType::String, "Database the table lives in")
                .param("table_name", ParamType::String, "Table name, optionally schema-qualified")
                .build(),
            backend,
        }
    }
}

impl Tool for GetSchemaForTable {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn execute<'a>(&'a self, args: &'a Value, _ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(schema_for_table(self.backend.as_ref(), args))
    }
}

async fn schema_for_table(
    backend: &dyn IntrospectionBackend,
    args: &Value,
) -> Result<Value, ToolError> {
    let SchemaArgs {
        database_name: db,
        table_name,
    } = args.try_get()?;
    let table = strip_schema_prefix(&table_name);
    debug!("get_schema_for_table: database='{db}' table='{table}'");

    let schema = non_empty(backend.schema_for_table(table).await?).unwrap_or_default();
    let result = if schema.is_empty() {
        format!("No schema found for {db}.{table}")
    } else {
        format!("Schema for {db}.{table}:\n{schema}")
    };
    info!("{result}");
    Ok(json!({
        "result": result,
        "database": db,
        "table": table,
        "schema": schema,
    }))
}
