//! The query-executing port.
//!
//! The engine talks to PostgreSQL exclusively through [`PgExecutor`]: a thin
//! handle over a shared deadpool pool. Pure components (parser, diff,
//! normalizers) never see this module. Every method is a suspension point.

mod params;
mod pools;

pub use params::rewrite_named;
pub use pools::PoolRegistry;

use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::core::value::SqlValue;
use crate::error::{Result, SyncError};

/// Executor handle bound to one `(user, host, port, database)` endpoint.
#[derive(Clone)]
pub struct PgExecutor {
    pool: deadpool_postgres::Pool,
    context: String,
}

impl PgExecutor {
    pub(crate) fn new(pool: deadpool_postgres::Pool, context: String) -> Self {
        Self { pool, context }
    }

    /// `user@host:port/database` for logs and error context.
    pub fn context(&self) -> &str {
        &self.context
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("getting connection for {}", self.context)))
    }

    /// Run a query with positional `$N` parameters.
    pub async fn query(&self, sql: &str, values: &[SqlValue]) -> Result<Vec<Row>> {
        let client = self.client().await?;
        let refs = to_sql_refs(values);
        Ok(client.query(sql, &refs).await?)
    }

    /// Run a query with `:name` parameters.
    pub async fn query_named(
        &self,
        sql: &str,
        values: &[(String, SqlValue)],
    ) -> Result<Vec<Row>> {
        let (rewritten, ordered) = rewrite_named(sql, values)?;
        self.query(&rewritten, &ordered).await
    }

    /// Run a statement with positional parameters, returning the row count.
    pub async fn execute(&self, sql: &str, values: &[SqlValue]) -> Result<u64> {
        let client = self.client().await?;
        let refs = to_sql_refs(values);
        Ok(client.execute(sql, &refs).await?)
    }

    /// Run a statement with `:name` parameters.
    pub async fn execute_named(&self, sql: &str, values: &[(String, SqlValue)]) -> Result<u64> {
        let (rewritten, ordered) = rewrite_named(sql, values)?;
        self.execute(&rewritten, &ordered).await
    }

    /// Run parameter-less SQL through the simple-query protocol.
    ///
    /// DDL goes through here: statements like CREATE INDEX CONCURRENTLY must
    /// run outside any transaction, and the simple protocol issues exactly
    /// the text it is given.
    pub async fn batch(&self, sql: &str) -> Result<()> {
        let client = self.client().await?;
        client.batch_execute(sql).await?;
        Ok(())
    }
}

fn to_sql_refs(values: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}
