//! System prompt assembly.
//!
//! [`SystemPromptBuilder`] joins a preamble and `## Heading` sections with
//! blank lines. [`default_system_prompt`] uses it to produce the built-in
//! SQL generator instructions sent as the first turn of every run unless the
//! caller supplies its own prompt.

use crate::tools::names;

/// Builder for multi-section system prompts.
///
/// Empty sections are skipped.
///
/// ```
/// use sqlgen::agent::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("You write SQL.")
///     .section("Rules", "1. Output SQL only.")
///     .section_opt("Dialect", None::<String>)
///     .build();
///
/// assert_eq!(prompt, "You write SQL.\n\n## Rules\n\n1. Output SQL only.");
/// ```
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a named section. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    /// Append a section only if the content is `Some`.
    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append raw text without a heading. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

const RULES: &str = "\
1. Output SQL that is ready to execute as-is: a single line, no line breaks and no '+' continuation characters.
2. Never ask questions or request clarification.
3. Never explain the SQL or add any other text.
4. For CREATE TABLE requests, always choose a reasonable schema from the table name.";

const RESPONSE_FORMAT: &str = "Reply with exactly one SQL statement and nothing else:\n[SQL STATEMENT]";

const TASKS: &str = "\
\"create a table named X for users\":
- CREATE TABLE with columns id BIGINT, user TEXT, created_at TIMESTAMP WITH TIME ZONE NOT NULL

\"insert 3 rows into X table\":
- If the table exists, fetch its schema with the tools
- INSERT using the columns from that schema, with sample values

\"show all users from X\" or \"find all Y from X\":
- An appropriate SELECT statement";

/// The built-in SQL generator instructions.
pub fn default_system_prompt() -> String {
    let tools = format!(
        "- {}(): lists all databases\n\
         - {}(): lists the tables of the current database\n\
         - {}(database_name, table_name): fetches the schema of an existing table",
        names::LIST_DATABASES,
        names::LIST_TABLES,
        names::GET_SCHEMA_FOR_TABLE,
    );

    SystemPromptBuilder::new(
        "You are a SQL code generator. Your only job is to output SQL statements.",
    )
    .section("Tools", tools)
    .section("Rules", RULES)
    .section("Response format", RESPONSE_FORMAT)
    .section("Tasks", TASKS)
    .raw(
        "Important: even if the tools show that the database or table does not exist, \
         still generate the SQL that was requested.",
    )
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_are_skipped() {
        let prompt = SystemPromptBuilder::new("Preamble")
            .section("Empty", "")
            .raw("")
            .section_opt("Present", Some("body"))
            .build();
        assert_eq!(prompt, "Preamble\n\n## Present\n\nbody");
    }

    #[test]
    fn default_prompt_names_every_tool() {
        let prompt = default_system_prompt();
        for name in [
            names::LIST_DATABASES,
            names::LIST_TABLES,
            names::GET_SCHEMA_FOR_TABLE,
        ] {
            assert!(prompt.contains(name), "missing {name}");
        }
    }

    #[test]
    fn default_prompt_insists_on_sql_for_missing_tables() {
        let prompt = default_system_prompt();
        assert!(prompt.starts_with("You are a SQL code generator."));
        assert!(prompt.contains("## Rules"));
        assert!(prompt.contains("still generate the SQL"));
    }
}
