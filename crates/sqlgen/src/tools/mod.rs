//! Tool abstractions for the generation loop.
//!
//! Every capability the model can call is a [`Tool`] implementor. Tools are
//! collected into an immutable [`ToolRegistry`] which handles lookup,
//! argument validation, timeouts, and converting every failure into a
//! failed [`ToolResult`] the model can read.
//!
//! # Defining tools
//!
//! - **[`FnTool`]**: closure-based, deserializes typed arguments. Best for
//!   stateless tools.
//! - **`impl Tool`**: a struct with its own [`ToolSpec`]. Best for tools
//!   holding shared state such as a backend.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolRegistry`] and its builder, [`FnTool`],
//!   call/result/context types.
//! - [`spec`]: [`ToolSpec`] builder and parameter type tags.
//! - [`introspection`]: `list_databases`, `list_tables_in_database` and
//!   `get_schema_for_table`.
//! - [`names`]: canonical tool names.

pub mod core;
pub mod introspection;
pub mod names;
pub mod spec;

pub use core::{
    DEFAULT_TOOL_TIMEOUT, FnTool, Tool, ToolCallRequest, ToolContext, ToolFuture, ToolRegistry,
    ToolRegistryBuilder, ToolResult, validate_tool_arguments,
};
pub use introspection::{GetSchemaForTable, ListDatabases, ListTables, strip_schema_prefix};
pub use spec::{ParamSpec, ParamType, ToolSpec};
