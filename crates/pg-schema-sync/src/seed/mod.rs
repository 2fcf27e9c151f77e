//! Seed reconciler.
//!
//! Declared row sets are reconciled against live table contents in two
//! phases. The analyze pass discovers the match columns (primary key first,
//! then the first fully-present unique index) and classifies every declared
//! row as insert, update or unchanged via the value normalizer. The apply
//! pass runs upserts (`ON CONFLICT ... DO UPDATE ... RETURNING (xmax = 0)`)
//! or, when no match set exists, a check-then-insert. Callers can interleave
//! a confirmation prompt between the two phases.

pub mod dump;
pub mod normalize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

use crate::core::identifier::quote_ident;
use crate::core::value::{bind_for_column, row_to_values, SqlValue};
use crate::error::{Result, SyncError};
use crate::executor::PgExecutor;
use crate::reflect::Reflector;
use self::normalize::values_equal;

/// One declared row: ordered column/value pairs.
pub type SeedRow = Vec<(String, JsonValue)>;

/// One declared table from a seed file.
#[derive(Debug, Clone)]
pub struct SeedTable {
    /// Table name as written (before prefix rewriting).
    pub table: String,

    /// Declared rows in file order.
    pub rows: Vec<SeedRow>,

    /// File the rows came from.
    pub source_file: PathBuf,
}

/// Classification of one declared row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Insert,
    Update,
    Unchanged,
}

/// Analyze-pass result for one table.
#[derive(Debug)]
pub struct TableAnalysis {
    /// Final table name (prefix applied).
    pub table: String,

    /// File the rows came from.
    pub source_file: PathBuf,

    /// Columns used to match declared rows to live rows. Empty means
    /// insert-only via check-then-insert.
    pub match_columns: Vec<String>,

    /// Classified rows.
    pub rows: Vec<(SeedRow, RowAction)>,

    /// Rows that could not be analyzed.
    pub skipped: usize,

    /// Reflected wire type per column, drives parameter binding.
    column_types: HashMap<String, String>,
}

impl TableAnalysis {
    /// (insert, update, unchanged) counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for (_, action) in &self.rows {
            match action {
                RowAction::Insert => counts.0 += 1,
                RowAction::Update => counts.1 += 1,
                RowAction::Unchanged => counts.2 += 1,
            }
        }
        counts
    }

    /// True when the apply pass would do nothing.
    pub fn is_trivial(&self) -> bool {
        self.rows
            .iter()
            .all(|(_, action)| *action == RowAction::Unchanged)
    }
}

/// Apply-pass counts for one table.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub table: String,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Seed reconciler bound to one target database.
pub struct SeedEngine {
    executor: PgExecutor,
    reflector: Reflector,
    prefix: Option<String>,
}

impl SeedEngine {
    pub fn new(executor: PgExecutor, prefix: Option<String>) -> Self {
        let reflector = Reflector::new(executor.clone());
        Self {
            executor,
            reflector,
            prefix,
        }
    }

    /// Rewrite a declared name under the cluster prefix.
    fn target_table(&self, declared: &str) -> String {
        match &self.prefix {
            Some(p) if !declared.starts_with(p.as_str()) => format!("{}{}", p, declared),
            _ => declared.to_string(),
        }
    }

    /// Analyze one declared table without changing anything.
    pub async fn analyze(&self, declared: &SeedTable) -> Result<TableAnalysis> {
        let table = self.target_table(&declared.table);

        let columns = self.reflector.columns_of(&table).await?;
        if columns.is_empty() {
            return Err(SyncError::reflection(
                table.clone(),
                "table does not exist in the target database",
            ));
        }
        let column_types: HashMap<String, String> = columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type.clone()))
            .collect();

        let match_columns = self.discover_match_columns(&table, declared).await?;
        debug!("match columns for {}: {:?}", table, match_columns);

        let mut analysis = TableAnalysis {
            table: table.clone(),
            source_file: declared.source_file.clone(),
            match_columns: match_columns.clone(),
            rows: Vec::with_capacity(declared.rows.len()),
            skipped: 0,
            column_types,
        };

        for row in &declared.rows {
            if let Some(unknown) = row
                .iter()
                .find(|(name, _)| !analysis.column_types.contains_key(name))
            {
                warn!("{}: unknown column {}, skipping row", table, unknown.0);
                analysis.skipped += 1;
                continue;
            }

            if match_columns.is_empty() {
                analysis.rows.push((row.clone(), RowAction::Insert));
                continue;
            }

            match self.classify_row(&analysis, row).await {
                Ok(action) => analysis.rows.push((row.clone(), action)),
                Err(e) => {
                    warn!("{}: cannot analyze row: {}", table, e);
                    analysis.skipped += 1;
                }
            }
        }

        Ok(analysis)
    }

    /// Primary-key columns when the sample row carries them all, else the
    /// first unique index (catalog order) fully present in the sample row,
    /// else empty.
    async fn discover_match_columns(
        &self,
        table: &str,
        declared: &SeedTable,
    ) -> Result<Vec<String>> {
        let Some(sample) = declared.rows.first() else {
            return Ok(Vec::new());
        };
        let has = |column: &str| sample.iter().any(|(name, _)| name == column);

        let pk = self.reflector.primary_key_columns_of(table).await?;
        if !pk.is_empty() && pk.iter().all(|c| has(c)) {
            return Ok(pk);
        }

        for (_, columns) in self.reflector.unique_index_defs_of(table).await? {
            if columns.iter().all(|c| has(c)) {
                return Ok(columns);
            }
        }

        Ok(Vec::new())
    }

    async fn classify_row(&self, analysis: &TableAnalysis, row: &SeedRow) -> Result<RowAction> {
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        for (i, column) in analysis.match_columns.iter().enumerate() {
            let value = row
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    SyncError::Config(format!("match column {} missing from row", column))
                })?;
            conditions.push(format!(
                "{} IS NOT DISTINCT FROM ${}",
                quote_ident(column),
                i + 1
            ));
            params.push(self.bind(analysis, column, value)?);
        }

        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            quote_ident(&analysis.table),
            conditions.join(" AND ")
        );
        let found = self.executor.query(&sql, &params).await?;

        match found.len() {
            0 => Ok(RowAction::Insert),
            1 => {
                let live: HashMap<String, JsonValue> =
                    row_to_values(&found[0])?.into_iter().collect();
                for (column, declared_value) in row {
                    if analysis.match_columns.iter().any(|m| m == column) {
                        continue;
                    }
                    let live_value = live.get(column).unwrap_or(&JsonValue::Null);
                    if !values_equal(declared_value, live_value) {
                        return Ok(RowAction::Update);
                    }
                }
                Ok(RowAction::Unchanged)
            }
            n => Err(SyncError::Config(format!(
                "match columns are not unique: {} live rows",
                n
            ))),
        }
    }

    fn bind(&self, analysis: &TableAnalysis, column: &str, value: &JsonValue) -> Result<SqlValue> {
        let data_type = analysis
            .column_types
            .get(column)
            .map(|s| s.as_str())
            .unwrap_or("text");
        bind_for_column(data_type, value)
    }

    /// Apply one analyzed table. Unchanged rows are not re-sent.
    pub async fn apply(&self, analysis: &TableAnalysis) -> SeedReport {
        let mut report = SeedReport {
            table: analysis.table.clone(),
            skipped: analysis.skipped,
            ..Default::default()
        };

        for (row, action) in &analysis.rows {
            if *action == RowAction::Unchanged {
                report.unchanged += 1;
                continue;
            }

            let outcome = if analysis.match_columns.is_empty() {
                self.check_then_insert(analysis, row).await
            } else {
                self.upsert(analysis, row).await
            };

            match outcome {
                Ok(RowAction::Insert) => report.inserted += 1,
                Ok(RowAction::Update) => report.updated += 1,
                Ok(RowAction::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    warn!("{}: row failed: {}", analysis.table, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn upsert(&self, analysis: &TableAnalysis, row: &SeedRow) -> Result<RowAction> {
        let columns: Vec<&str> = row.iter().map(|(name, _)| name.as_str()).collect();
        let non_match: Vec<&str> = columns
            .iter()
            .filter(|c| !analysis.match_columns.iter().any(|m| m == **c))
            .copied()
            .collect();

        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let conflict_list = analysis
            .match_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = if non_match.is_empty() {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING \
                 RETURNING (xmax = 0) AS is_insert",
                quote_ident(&analysis.table),
                column_list,
                placeholders,
                conflict_list
            )
        } else {
            let updates = non_match
                .iter()
                .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {} \
                 RETURNING (xmax = 0) AS is_insert",
                quote_ident(&analysis.table),
                column_list,
                placeholders,
                conflict_list,
                updates
            )
        };

        let params = row
            .iter()
            .map(|(name, value)| self.bind(analysis, name, value))
            .collect::<Result<Vec<_>>>()?;

        let returned = self.executor.query(&sql, &params).await?;
        // xmax = 0 marks a freshly inserted tuple; an absent row (DO NOTHING
        // hit a conflict after analysis) counts as insert.
        match returned.first() {
            Some(r) if !r.get::<_, bool>(0) => Ok(RowAction::Update),
            _ => Ok(RowAction::Insert),
        }
    }

    async fn check_then_insert(&self, analysis: &TableAnalysis, row: &SeedRow) -> Result<RowAction> {
        let conditions = row
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!("{} IS NOT DISTINCT FROM ${}", quote_ident(name), i + 1)
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let params = row
            .iter()
            .map(|(name, value)| self.bind(analysis, name, value))
            .collect::<Result<Vec<_>>>()?;

        let check = format!(
            "SELECT 1 FROM {} WHERE {} LIMIT 1",
            quote_ident(&analysis.table),
            conditions
        );
        if !self.executor.query(&check, &params).await?.is_empty() {
            return Ok(RowAction::Unchanged);
        }

        let column_list = row
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=row.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&analysis.table),
            column_list,
            placeholders
        );
        self.executor.execute(&insert, &params).await?;
        Ok(RowAction::Insert)
    }
}

/// Enumerate seed files: `.yml`/`.yaml` under `seed_path`, optionally
/// filtered by a stem suffix, lexicographic.
pub fn discover_seed_files(seed_path: &str, suffix: &str) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(seed_path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read seed directory {}: {}", seed_path, e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yml") | Some("yaml")
                )
                && (suffix.is_empty()
                    || p.file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.ends_with(suffix))
                        .unwrap_or(false))
        })
        .collect();
    files.sort();
    files
}

/// Parse one seed file: a mapping from table name to a list of row mappings.
pub fn parse_seed_file(path: &Path) -> Result<Vec<SeedTable>> {
    let content = std::fs::read_to_string(path)?;
    parse_seed_content(&content, path)
        .map_err(|e| SyncError::parse(path.display().to_string(), e))
}

pub(crate) fn parse_seed_content(
    content: &str,
    path: &Path,
) -> std::result::Result<Vec<SeedTable>, String> {
    let doc: YamlValue = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    let YamlValue::Mapping(tables) = doc else {
        return Err("expected a mapping of table names to row lists".to_string());
    };

    let mut out = Vec::new();
    for (key, value) in &tables {
        let YamlValue::String(table) = key else {
            return Err("table names must be strings".to_string());
        };
        let YamlValue::Sequence(rows) = value else {
            return Err(format!("table {} must hold a list of rows", table));
        };

        let mut parsed_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let YamlValue::Mapping(columns) = row else {
                return Err(format!("table {}: each row must be a mapping", table));
            };
            let mut parsed = Vec::with_capacity(columns.len());
            for (column, cell) in columns {
                let YamlValue::String(name) = column else {
                    return Err(format!("table {}: column names must be strings", table));
                };
                let json = serde_json::to_value(cell)
                    .map_err(|e| format!("table {}: column {}: {}", table, name, e))?;
                parsed.push((name.clone(), json));
            }
            parsed_rows.push(parsed);
        }

        out.push(SeedTable {
            table: table.clone(),
            rows: parsed_rows,
            source_file: path.to_path_buf(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_seed_file_shape() {
        let yaml = "users:\n  - { user_id: 1, user_name: A }\n  - { user_id: 2, user_name: B }\n";
        let tables = parse_seed_content(yaml, Path::new("seed/users.yml")).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].table, "users");
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(
            tables[0].rows[0],
            vec![
                ("user_id".to_string(), json!(1)),
                ("user_name".to_string(), json!("A")),
            ]
        );
    }

    #[test]
    fn test_parse_seed_file_rejects_non_lists() {
        assert!(parse_seed_content("users: 1\n", Path::new("x.yml")).is_err());
        assert!(parse_seed_content("users:\n  - just_a_string\n", Path::new("x.yml")).is_err());
    }

    #[test]
    fn test_discover_seed_files_suffix_filter() {
        let dir = TempDir::new().unwrap();
        for name in ["users_seed.yml", "other.yml", "b_seed.yaml"] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(f, "t: []").unwrap();
        }
        let base = dir.path().to_string_lossy().to_string();

        let all = discover_seed_files(&base, "");
        assert_eq!(all.len(), 3);

        let filtered = discover_seed_files(&base, "_seed");
        let names: Vec<_> = filtered
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b_seed.yaml", "users_seed.yml"]);
    }

    #[test]
    fn test_analysis_counts() {
        let analysis = TableAnalysis {
            table: "users".to_string(),
            source_file: PathBuf::from("seed/users.yml"),
            match_columns: vec!["id".to_string()],
            rows: vec![
                (vec![("id".to_string(), json!(1))], RowAction::Insert),
                (vec![("id".to_string(), json!(2))], RowAction::Update),
                (vec![("id".to_string(), json!(3))], RowAction::Unchanged),
                (vec![("id".to_string(), json!(4))], RowAction::Insert),
            ],
            skipped: 1,
            column_types: HashMap::new(),
        };
        assert_eq!(analysis.counts(), (2, 1, 1));
    }
}
