//! Live-schema reflection.
//!
//! Catalog reads that turn one table into a comparable [`TableShape`], plus
//! the table list and the primary-key/unique-index lookups the seed
//! reconciler needs for match-column discovery. Each call is independent;
//! failures surface to the caller, which decides whether to warn and skip.

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::shape::{ColumnShape, TableShape};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::executor::PgExecutor;

/// Reflector bound to one target database.
pub struct Reflector {
    executor: PgExecutor,
}

impl Reflector {
    pub fn new(executor: PgExecutor) -> Self {
        Self { executor }
    }

    /// Base tables in the public namespace, alphabetical.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .executor
            .query(
                "SELECT table_name::text \
                 FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// Reflected columns of one table, in ordinal order.
    pub async fn columns_of(&self, table: &str) -> Result<Vec<ColumnShape>> {
        let rows = self
            .executor
            .query_named(
                "SELECT column_name::text, \
                        data_type::text, \
                        (is_nullable = 'YES'), \
                        character_maximum_length::int4, \
                        column_default::text, \
                        numeric_precision::int4, \
                        numeric_scale::int4 \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = :table \
                 ORDER BY ordinal_position",
                &[("table".to_string(), SqlValue::Text(table.to_string()))],
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(ColumnShape {
                name: row.get(0),
                data_type: row.get(1),
                is_nullable: row.get(2),
                char_max_length: row.get(3),
                default_expr: row.get(4),
                numeric_precision: row.get(5),
                numeric_scale: row.get(6),
            });
        }
        debug!("reflected {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    /// Names of all indexes on one table.
    pub async fn index_names_of(&self, table: &str) -> Result<BTreeSet<String>> {
        let rows = self
            .executor
            .query(
                "SELECT indexname::text \
                 FROM pg_catalog.pg_indexes \
                 WHERE schemaname = 'public' AND tablename = $1",
                &[SqlValue::Text(table.to_string())],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// Names of all unique constraints on one table.
    pub async fn unique_constraint_names_of(&self, table: &str) -> Result<BTreeSet<String>> {
        let rows = self
            .executor
            .query(
                "SELECT c.conname::text \
                 FROM pg_catalog.pg_constraint c \
                 JOIN pg_catalog.pg_class t ON t.oid = c.conrelid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
                 WHERE n.nspname = 'public' AND t.relname = $1 AND c.contype = 'u'",
                &[SqlValue::Text(table.to_string())],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// The full comparable shape of one table.
    pub async fn table_shape(&self, table: &str) -> Result<TableShape> {
        Ok(TableShape {
            columns: self.columns_of(table).await?,
            index_names: self.index_names_of(table).await?,
            unique_constraint_names: self.unique_constraint_names_of(table).await?,
        })
    }

    /// Primary-key column names in key (ordinal) order.
    pub async fn primary_key_columns_of(&self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .executor
            .query(
                "SELECT a.attname::text \
                 FROM pg_catalog.pg_constraint c \
                 JOIN pg_catalog.pg_class t ON t.oid = c.conrelid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid \
                 WHERE n.nspname = 'public' \
                   AND t.relname = $1 \
                   AND c.contype = 'p' \
                   AND a.attnum = ANY(c.conkey) \
                 ORDER BY array_position(c.conkey, a.attnum)",
                &[SqlValue::Text(table.to_string())],
            )
            .await?;
        let columns: Vec<String> = rows.iter().map(|r| r.get::<_, String>(0)).collect();
        debug!("primary key for {}: {:?}", table, columns);
        Ok(columns)
    }

    /// Non-primary unique indexes with their column lists, in catalog order.
    ///
    /// Used by the seed reconciler to find a match set when the primary key
    /// is absent from a declared row.
    pub async fn unique_index_defs_of(&self, table: &str) -> Result<Vec<(String, Vec<String>)>> {
        let rows = self
            .executor
            .query_named(
                "SELECT i.relname::text, a.attname::text \
                 FROM pg_catalog.pg_index ix \
                 JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_catalog.pg_attribute a \
                   ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey::int2[]) \
                 WHERE n.nspname = 'public' \
                   AND t.relname = :table \
                   AND ix.indisunique \
                   AND NOT ix.indisprimary \
                 ORDER BY i.oid, array_position(ix.indkey::int2[], a.attnum)",
                &[("table".to_string(), SqlValue::Text(table.to_string()))],
            )
            .await?;

        let mut defs: Vec<(String, Vec<String>)> = Vec::new();
        for row in &rows {
            let index: String = row.get(0);
            let column: String = row.get(1);
            match defs.last_mut() {
                Some((name, columns)) if *name == index => columns.push(column),
                _ => defs.push((index, vec![column])),
            }
        }
        Ok(defs)
    }
}

/// Whether a database with this name exists. Runs on the admin executor,
/// which is connected to the server's meta database.
pub async fn database_exists(admin: &PgExecutor, name: &str) -> Result<bool> {
    let rows = admin
        .query(
            "SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1",
            &[SqlValue::Text(name.to_string())],
        )
        .await?;
    Ok(!rows.is_empty())
}
