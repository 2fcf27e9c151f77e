//! Seed dumping: live table contents back into seed YAML.
//!
//! The inverse of the reconciler, used to capture reference data from a
//! database that is already in the desired state. Serial columns (anything
//! with a sequence-bound default) can be skipped so re-seeding does not pin
//! generated keys.

use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::info;

use crate::core::identifier::quote_ident;
use crate::core::value::row_to_values;
use crate::error::Result;
use crate::executor::PgExecutor;
use crate::reflect::Reflector;

/// Options for one dump run.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Tables to dump. Empty means "all" (requires `all`).
    pub tables: Vec<String>,

    /// Tables to leave out.
    pub exclude: Vec<String>,

    /// Dump every table when no explicit list is given.
    pub all: bool,

    /// Row limit per table.
    pub limit: Option<i64>,

    /// Skip columns with sequence-bound defaults.
    pub skip_auto: bool,
}

/// Result of dumping one table.
#[derive(Debug, Clone)]
pub struct DumpedTable {
    pub table: String,
    pub rows: usize,
    pub file: PathBuf,
}

/// Dump selected tables into seed files under `seed_path`, one file per
/// table named `<table><suffix>.yml`.
pub async fn dump_tables(
    executor: &PgExecutor,
    seed_path: &str,
    seed_suffix: &str,
    options: &DumpOptions,
) -> Result<Vec<DumpedTable>> {
    let reflector = Reflector::new(executor.clone());

    let mut tables = if options.tables.is_empty() {
        if !options.all {
            return Err(crate::error::SyncError::Config(
                "no tables selected: pass table names or the all flag".into(),
            ));
        }
        reflector.list_tables().await?
    } else {
        options.tables.clone()
    };
    tables.retain(|t| !options.exclude.iter().any(|e| e == t));

    std::fs::create_dir_all(seed_path)?;

    let mut dumped = Vec::with_capacity(tables.len());
    for table in &tables {
        dumped.push(dump_one(executor, &reflector, seed_path, seed_suffix, table, options).await?);
    }
    Ok(dumped)
}

async fn dump_one(
    executor: &PgExecutor,
    reflector: &Reflector,
    seed_path: &str,
    seed_suffix: &str,
    table: &str,
    options: &DumpOptions,
) -> Result<DumpedTable> {
    let columns = reflector.columns_of(table).await?;
    if columns.is_empty() {
        return Err(crate::error::SyncError::reflection(
            table,
            "table does not exist in the target database",
        ));
    }

    let selected: Vec<&str> = columns
        .iter()
        .filter(|c| !(options.skip_auto && c.has_sequence_default()))
        .map(|c| c.name.as_str())
        .collect();

    let column_list = selected
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {} FROM {}", column_list, quote_ident(table));
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let rows = executor.query(&sql, &[]).await?;

    let mut row_values = Vec::with_capacity(rows.len());
    for row in &rows {
        row_values.push(row_to_values(row)?);
    }

    let file = Path::new(seed_path).join(format!("{}{}.yml", table, seed_suffix));
    let document = render_seed_yaml(table, &row_values)?;
    std::fs::write(&file, document)?;

    info!("dumped {} rows of {} to {}", row_values.len(), table, file.display());
    Ok(DumpedTable {
        table: table.to_string(),
        rows: row_values.len(),
        file,
    })
}

fn render_seed_yaml(table: &str, rows: &[Vec<(String, JsonValue)>]) -> Result<String> {
    let mut sequence = Vec::with_capacity(rows.len());
    for row in rows {
        let mut mapping = Mapping::new();
        for (name, value) in row {
            mapping.insert(
                YamlValue::String(name.clone()),
                serde_yaml::to_value(value)?,
            );
        }
        sequence.push(YamlValue::Mapping(mapping));
    }

    let mut document = Mapping::new();
    document.insert(
        YamlValue::String(table.to_string()),
        YamlValue::Sequence(sequence),
    );
    Ok(serde_yaml::to_string(&YamlValue::Mapping(document))?)
}
