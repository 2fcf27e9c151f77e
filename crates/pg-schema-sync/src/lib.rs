//! # pg-schema-sync
//!
//! Declarative schema management and data seeding for PostgreSQL.
//!
//! Tables are described in YAML declaration files; the engine reflects the
//! live database, computes the minimal ordered set of schema-change
//! statements, and either renders or applies them. A companion seed flow
//! reconciles declared row sets against live table contents using
//! primary-key or unique-column matching.
//!
//! The core (DSL parsing, default normalization, diff computation, statement
//! emission) is pure; all I/O goes through the executor port.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_schema_sync::{Config, MigrateOptions, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> pg_schema_sync::Result<()> {
//!     let config = Config::load("config.yml")?;
//!     let migrator = Migrator::new(config);
//!     let plans = migrator.plan(&MigrateOptions::default()).await?;
//!     let report = migrator.apply(&plans, None).await?;
//!     migrator.close().await;
//!     println!("applied {} of {} statements", report.executed(), report.total());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod diff;
pub mod dsl;
pub mod emit;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod reflect;
pub mod seed;

// Re-exports for convenient access
pub use config::{Config, DisplayMode, NodeConfig, Target};
pub use core::{
    ColumnShape, FieldDefinition, KeyKind, Nullability, ParsedSchema, SqlValue, Statement,
    StatementKind, TableShape,
};
pub use diff::diff_table;
pub use error::{Result, SyncError};
pub use executor::{PgExecutor, PoolRegistry};
pub use orchestrator::{
    MigrateOptions, MigrationReport, Migrator, StatementFailure, TargetPlan, TargetReport,
};
pub use reflect::Reflector;
pub use seed::{
    dump::{dump_tables, DumpOptions},
    RowAction, SeedEngine, SeedReport, SeedTable, TableAnalysis,
};
