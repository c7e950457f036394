//! In-memory introspection backend.

use super::{BackendFuture, IntrospectionBackend};
use crate::error::BackendError;
use std::collections::HashMap;
use std::sync::Mutex;

/// A backend that answers from fixed payloads.
///
/// Every schema lookup key is recorded so callers can check exactly which
/// table name reached the backend.
///
/// ```ignore
/// let backend = StaticBackend::new()
///     .with_tables(r#"["public.users"]"#)
///     .with_schema("users", "CREATE TABLE public.users ( id bigint NOT NULL);");
/// ```
#[derive(Debug, Default)]
pub struct StaticBackend {
    databases: Option<String>,
    tables: Option<String>,
    schemas: HashMap<String, String>,
    unavailable: Option<String>,
    lookups: Mutex<Vec<String>>,
}

impl StaticBackend {
    /// A backend with no data: every answer is `None`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_databases(mut self, payload: impl Into<String>) -> Self {
        self.databases = Some(payload.into());
        self
    }

    pub fn with_tables(mut self, payload: impl Into<String>) -> Self {
        self.tables = Some(payload.into());
        self
    }

    pub fn with_schema(mut self, table: impl Into<String>, ddl: impl Into<String>) -> Self {
        self.schemas.insert(table.into(), ddl.into());
        self
    }

    /// Make every operation fail with [`BackendError::Unavailable`].
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    /// Table names passed to [`IntrospectionBackend::schema_for_table`], in
    /// call order.
    pub fn schema_lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn answer(&self, payload: &Option<String>) -> Result<Option<String>, BackendError> {
        match &self.unavailable {
            Some(reason) => Err(BackendError::Unavailable(reason.clone())),
            None => Ok(payload.clone()),
        }
    }
}

impl IntrospectionBackend for StaticBackend {
    fn list_databases(&self) -> BackendFuture<'_> {
        let answer = self.answer(&self.databases);
        Box::pin(async move { answer })
    }

    fn list_tables(&self) -> BackendFuture<'_> {
        let answer = self.answer(&self.tables);
        Box::pin(async move { answer })
    }

    fn schema_for_table<'a>(&'a self, table: &'a str) -> BackendFuture<'a> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(table.to_string());
        let answer = self.answer(&self.schemas.get(table).cloned());
        Box::pin(async move { answer })
    }
}
