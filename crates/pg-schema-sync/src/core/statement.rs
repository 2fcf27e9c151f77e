//! Emitted statements.
//!
//! A [`Statement`] is an immutable value: once the emitter has rendered it,
//! nothing downstream mutates it. The orchestrator applies statements one by
//! one, never inside a transaction envelope, because concurrent index
//! creation cannot run inside one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of schema-changing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateDb,
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    AlterColumn,
    AddIndex,
    DropIndex,
    AddUnique,
    DropUnique,
    Raw,
}

impl StatementKind {
    /// Short label used in rendered plans.
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::CreateDb => "create database",
            StatementKind::CreateTable => "create table",
            StatementKind::DropTable => "drop table",
            StatementKind::AddColumn => "add column",
            StatementKind::DropColumn => "drop column",
            StatementKind::AlterColumn => "alter column",
            StatementKind::AddIndex => "add index",
            StatementKind::DropIndex => "drop index",
            StatementKind::AddUnique => "add unique",
            StatementKind::DropUnique => "drop unique",
            StatementKind::Raw => "raw",
        }
    }
}

/// One fully-rendered schema-changing statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Target table. Empty for database-level statements.
    pub table: String,

    /// Statement kind.
    pub kind: StatementKind,

    /// Fully-rendered SQL text.
    pub sql: String,

    /// Short human label, e.g. `add column "user_bio"`.
    pub description: String,
}

impl Statement {
    /// Construct a statement value.
    pub fn new(
        table: impl Into<String>,
        kind: StatementKind,
        sql: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            kind,
            sql: sql.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_empty() {
            write!(f, "[{}] {}", self.kind.label(), self.description)
        } else {
            write!(f, "[{}] {}: {}", self.kind.label(), self.table, self.description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_table_and_label() {
        let stmt = Statement::new(
            "users",
            StatementKind::AddColumn,
            "ALTER TABLE \"users\" ADD COLUMN \"bio\" TEXT NULL",
            "add column \"bio\"",
        );
        let rendered = stmt.to_string();
        assert!(rendered.contains("add column"));
        assert!(rendered.contains("users"));
    }

    #[test]
    fn test_database_level_display_omits_table() {
        let stmt = Statement::new(
            "",
            StatementKind::CreateDb,
            "CREATE DATABASE \"app\" ENCODING 'UTF8'",
            "create database \"app\"",
        );
        assert_eq!(stmt.to_string(), "[create database] create database \"app\"");
    }
}
