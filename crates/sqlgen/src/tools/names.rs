//! Canonical tool name constants.
//!
//! The model sees these names verbatim; the system prompt refers to them too.

pub const LIST_DATABASES: &str = "list_databases";
pub const LIST_TABLES: &str = "list_tables_in_database";
pub const GET_SCHEMA_FOR_TABLE: &str = "get_schema_for_table";
