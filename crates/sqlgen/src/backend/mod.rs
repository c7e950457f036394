//! Database introspection backends.
//!
//! A backend answers three questions about a live database: which databases
//! exist, which tables are visible, and what a given table looks like as
//! DDL. Each answer is an owned payload string handed to the caller, or
//! `None` when the backend has nothing to say. An empty string is treated
//! the same as `None` by every consumer.
//!
//! - [`StaticBackend`]: in-memory fixture, used by tests and offline mode.
//! - [`CommandBackend`]: runs one external command per question (by
//!   default `psql` against the standard `PG*` environment).

pub mod command;
pub mod fixture;

pub use command::{CommandBackend, CommandSpec};
pub use fixture::StaticBackend;

use crate::error::BackendError;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`IntrospectionBackend`] methods.
pub type BackendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<String>, BackendError>> + Send + 'a>>;

/// Source of raw introspection payloads.
pub trait IntrospectionBackend: Send + Sync {
    /// JSON array of database names, e.g. `["app","analytics"]`.
    fn list_databases(&self) -> BackendFuture<'_>;

    /// JSON array of schema-qualified table names, e.g. `["public.users"]`.
    fn list_tables(&self) -> BackendFuture<'_>;

    /// `CREATE TABLE ...;` text for an unqualified table name.
    fn schema_for_table<'a>(&'a self, table: &'a str) -> BackendFuture<'a>;
}

/// Collapse `Some("")` (and whitespace-only payloads) into `None`.
pub fn non_empty(payload: Option<String>) -> Option<String> {
    payload.filter(|p| !p.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payloads_are_absent() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some(" \n".into())), None);
        assert_eq!(non_empty(Some("[]".into())), Some("[]".into()));
    }
}
