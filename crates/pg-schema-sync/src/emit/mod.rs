//! SQL emitter: pure constructors for every statement kind.
//!
//! Index creation always uses CONCURRENTLY, which cannot run inside a
//! transaction; that is why the orchestrator applies statements one by one
//! and never wraps them in BEGIN/COMMIT.

use crate::core::identifier::{
    composite_index_name, composite_unique_index_name, index_name, quote_ident,
    unique_constraint_name,
};
use crate::core::schema::{FieldDefinition, KeyKind, Nullability, ParsedSchema};
use crate::core::statement::{Statement, StatementKind};
use crate::dsl::defaults::normalize_default;

/// Render one column definition fragment for CREATE TABLE / ADD COLUMN.
///
/// Shape: `"name" TYPE [NULL|NOT NULL] [DEFAULT expr] [extra] [PRIMARY KEY]`.
/// SERIAL columns never get a DEFAULT clause.
fn column_definition(field: &FieldDefinition, with_primary: bool) -> String {
    let mut def = format!("{} {}", quote_ident(&field.name), field.type_spec);

    match field.nullable {
        Nullability::NotNull => def.push_str(" NOT NULL"),
        Nullability::Null => def.push_str(" NULL"),
        Nullability::Unspecified => {}
    }

    if !field.is_serial() {
        if let Some(raw) = &field.default_raw {
            if let Some(expr) = normalize_default(raw, &field.type_spec) {
                def.push_str(" DEFAULT ");
                def.push_str(&expr);
            }
        }
    }

    if let Some(extra) = &field.extra {
        def.push(' ');
        def.push_str(extra);
    }

    if with_primary && field.key == KeyKind::Primary {
        def.push_str(" PRIMARY KEY");
    }

    def
}

/// CREATE TABLE plus the follow-up unique constraints for `unique` columns.
pub fn create_table(table: &str, schema: &ParsedSchema) -> Vec<Statement> {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| column_definition(f, true))
        .collect();

    let mut statements = vec![Statement::new(
        table,
        StatementKind::CreateTable,
        format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", ")),
        format!("create table {}", quote_ident(table)),
    )];

    for field in schema.unique_fields() {
        statements.push(add_unique_constraint(table, &field.name));
    }

    statements
}

/// `ALTER TABLE "T" ADD COLUMN ...`. The PRIMARY KEY clause is only valid
/// inline in CREATE TABLE, so it is omitted here.
pub fn add_column(table: &str, field: &FieldDefinition) -> Statement {
    Statement::new(
        table,
        StatementKind::AddColumn,
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(table),
            column_definition(field, false)
        ),
        format!("add column {}", quote_ident(&field.name)),
    )
}

/// `ALTER TABLE "T" DROP COLUMN "c"`.
pub fn drop_column(table: &str, column: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::DropColumn,
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(table),
            quote_ident(column)
        ),
        format!("drop column {}", quote_ident(column)),
    )
}

/// `ALTER TABLE "T" ALTER COLUMN "c" TYPE <type>`.
pub fn alter_column_type(table: &str, column: &str, type_spec: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::AlterColumn,
        format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            quote_ident(table),
            quote_ident(column),
            type_spec
        ),
        format!("alter column {} type {}", quote_ident(column), type_spec),
    )
}

/// `ALTER TABLE "T" ALTER COLUMN "c" SET DEFAULT <expr>`.
pub fn set_column_default(table: &str, column: &str, expr: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::AlterColumn,
        format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
            quote_ident(table),
            quote_ident(column),
            expr
        ),
        format!("set default on {}", quote_ident(column)),
    )
}

/// `ALTER TABLE "T" ALTER COLUMN "c" DROP DEFAULT`.
pub fn drop_column_default(table: &str, column: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::AlterColumn,
        format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
            quote_ident(table),
            quote_ident(column)
        ),
        format!("drop default on {}", quote_ident(column)),
    )
}

/// `ALTER TABLE "T" ALTER COLUMN "c" SET NOT NULL`.
pub fn set_not_null(table: &str, column: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::AlterColumn,
        format!(
            "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
            quote_ident(table),
            quote_ident(column)
        ),
        format!("set not null on {}", quote_ident(column)),
    )
}

/// `ALTER TABLE "T" ALTER COLUMN "c" DROP NOT NULL`.
pub fn drop_not_null(table: &str, column: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::AlterColumn,
        format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
            quote_ident(table),
            quote_ident(column)
        ),
        format!("drop not null on {}", quote_ident(column)),
    )
}

/// `CREATE INDEX CONCURRENTLY "T_col_idx" ON "T" ("col")`.
pub fn add_index(table: &str, column: &str) -> Statement {
    let name = index_name(table, column);
    Statement::new(
        table,
        StatementKind::AddIndex,
        format!(
            "CREATE INDEX CONCURRENTLY {} ON {} ({})",
            quote_ident(&name),
            quote_ident(table),
            quote_ident(column)
        ),
        format!("add index {}", quote_ident(&name)),
    )
}

/// `CREATE INDEX CONCURRENTLY "T_group_idx" ON "T" ("c1", "c2", ...)`.
pub fn add_composite_index(table: &str, group: &str, columns: &[String]) -> Statement {
    let name = composite_index_name(table, group);
    Statement::new(
        table,
        StatementKind::AddIndex,
        format!(
            "CREATE INDEX CONCURRENTLY {} ON {} ({})",
            quote_ident(&name),
            quote_ident(table),
            quoted_list(columns)
        ),
        format!("add index {}", quote_ident(&name)),
    )
}

/// `CREATE UNIQUE INDEX CONCURRENTLY "T_group_unique_idx" ON "T" (...)`.
pub fn add_composite_unique_index(table: &str, group: &str, columns: &[String]) -> Statement {
    let name = composite_unique_index_name(table, group);
    Statement::new(
        table,
        StatementKind::AddIndex,
        format!(
            "CREATE UNIQUE INDEX CONCURRENTLY {} ON {} ({})",
            quote_ident(&name),
            quote_ident(table),
            quoted_list(columns)
        ),
        format!("add unique index {}", quote_ident(&name)),
    )
}

/// `ALTER TABLE "T" ADD CONSTRAINT "T_col_unique" UNIQUE ("col")`.
pub fn add_unique_constraint(table: &str, column: &str) -> Statement {
    let name = unique_constraint_name(table, column);
    Statement::new(
        table,
        StatementKind::AddUnique,
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            quote_ident(table),
            quote_ident(&name),
            quote_ident(column)
        ),
        format!("add unique {}", quote_ident(&name)),
    )
}

/// `ALTER TABLE "T" DROP CONSTRAINT "name"`.
pub fn drop_constraint(table: &str, name: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::DropUnique,
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote_ident(table),
            quote_ident(name)
        ),
        format!("drop unique {}", quote_ident(name)),
    )
}

/// `DROP INDEX IF EXISTS "name"`.
pub fn drop_index(table: &str, name: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::DropIndex,
        format!("DROP INDEX IF EXISTS {}", quote_ident(name)),
        format!("drop index {}", quote_ident(name)),
    )
}

/// `DROP TABLE IF EXISTS "T" CASCADE`.
pub fn drop_table(table: &str) -> Statement {
    Statement::new(
        table,
        StatementKind::DropTable,
        format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table)),
        format!("drop table {}", quote_ident(table)),
    )
}

/// `CREATE DATABASE "N" ENCODING 'UTF8'`. Runs through the admin executor.
pub fn create_database(name: &str) -> Statement {
    Statement::new(
        "",
        StatementKind::CreateDb,
        format!("CREATE DATABASE {} ENCODING 'UTF8'", quote_ident(name)),
        format!("create database {}", quote_ident(name)),
    )
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}
