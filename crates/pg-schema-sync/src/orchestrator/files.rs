//! Declaration file discovery and parsing.
//!
//! Declarations are YAML files mapping table names to field maps. Only
//! `.yml`/`.yaml` files are considered and enumeration order is
//! lexicographic, so a run is deterministic regardless of filesystem order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_yaml::Value as YamlValue;
use tracing::warn;

use crate::error::{Result, SyncError};

/// One table block from a declaration file, after prefix rewriting and
/// `~ignore` filtering.
#[derive(Debug, Clone)]
pub struct DeclaredTable {
    /// Final table name (prefix applied).
    pub name: String,

    /// Ordered field map, exactly as written.
    pub fields: Vec<(String, String)>,
}

/// Enumerate declaration files under the given directories, lexicographic
/// per directory, directories in configuration order. Duplicate directories
/// were already removed by the caller; a missing directory is skipped with a
/// warning.
pub fn discover_files(dirs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut seen = BTreeSet::new();

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot read declaration directory {}: {}", dir, e);
                continue;
            }
        };

        let mut batch: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_declaration_file(p))
            .collect();
        batch.sort();

        for path in batch {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    files
}

fn is_declaration_file(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        )
}

/// Parse one declaration file into its table blocks.
///
/// Table-level handling:
/// * a `~ignore` key with any truthy value skips the whole table;
/// * a name starting with `~` is rewritten to `prefix + rest` when the
///   cluster has a prefix, and skipped with a warning otherwise.
pub fn parse_declaration_file(path: &Path, prefix: Option<&str>) -> Result<Vec<DeclaredTable>> {
    let content = std::fs::read_to_string(path)?;
    parse_declarations(&content, prefix)
        .map_err(|e| SyncError::parse(path.display().to_string(), e))
}

fn parse_declarations(
    content: &str,
    prefix: Option<&str>,
) -> std::result::Result<Vec<DeclaredTable>, String> {
    let doc: YamlValue = serde_yaml::from_str(content).map_err(|e| e.to_string())?;

    let YamlValue::Mapping(tables) = doc else {
        return Err("expected a mapping of table names".to_string());
    };

    let mut declared = Vec::new();

    for (key, value) in &tables {
        let raw_name = scalar_to_string(key)
            .ok_or_else(|| "table names must be strings".to_string())?;

        let YamlValue::Mapping(field_map) = value else {
            return Err(format!("table {} must be a mapping of columns", raw_name));
        };

        if field_map.get("~ignore").map(is_truthy).unwrap_or(false) {
            continue;
        }

        let name = match raw_name.strip_prefix('~') {
            Some(rest) => match prefix {
                Some(p) => format!("{}{}", p, rest),
                None => {
                    warn!("skipping table ~{}: no cluster prefix configured", rest);
                    continue;
                }
            },
            None => raw_name.clone(),
        };

        let mut fields = Vec::with_capacity(field_map.len());
        for (field_key, field_value) in field_map {
            let field_name = scalar_to_string(field_key)
                .ok_or_else(|| format!("table {}: column names must be strings", name))?;
            let field_spec = scalar_to_string(field_value).ok_or_else(|| {
                format!("table {}: column {} must be a scalar", name, field_name)
            })?;
            fields.push((field_name, field_spec));
        }

        declared.push(DeclaredTable { name, fields });
    }

    Ok(declared)
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &YamlValue) -> bool {
    match value {
        YamlValue::Null => false,
        YamlValue::Bool(b) => *b,
        YamlValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        YamlValue::String(s) => !s.is_empty() && s != "false" && s != "0",
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_basic_declaration() {
        let tables = parse_declarations(
            "users:\n  user_id: id\n  user_name: \"str required\"\n",
            None,
        )
        .unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");
        assert_eq!(
            tables[0].fields,
            vec![
                ("user_id".to_string(), "id".to_string()),
                ("user_name".to_string(), "str required".to_string()),
            ]
        );
    }

    #[test]
    fn test_ignore_marker_skips_table() {
        let yaml = "users:\n  user_id: id\nlegacy:\n  '~ignore': true\n  old: str\n";
        let tables = parse_declarations(yaml, None).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");
    }

    #[test]
    fn test_ignore_marker_accepts_any_truthy_value() {
        let yaml = "legacy:\n  '~ignore': 1\n  old: str\n";
        assert!(parse_declarations(yaml, None).unwrap().is_empty());

        let yaml = "legacy:\n  '~ignore': false\n  old: str\n";
        assert_eq!(parse_declarations(yaml, None).unwrap().len(), 1);
    }

    #[test]
    fn test_tenant_prefix_rewrite() {
        let yaml = "'~sessions':\n  sid: str\n";
        let tables = parse_declarations(yaml, Some("t1_")).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "t1_sessions");

        // Without a prefix the tenant table never materializes.
        assert!(parse_declarations(yaml, None).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document_is_a_parse_error() {
        assert!(parse_declarations("users: just a string\n", None).is_err());
        assert!(parse_declarations("- a\n- b\n", None).is_err());
    }

    #[test]
    fn test_discovery_is_lexicographic_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.yml", "a.yaml", "ignored.txt", "c.yml"] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(f, "t:\n  id: id").unwrap();
        }

        let files = discover_files(&[dir.path().to_string_lossy().to_string()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yml", "c.yml"]);
    }

    #[test]
    fn test_discovery_missing_directory_is_empty() {
        let files = discover_files(&["/nonexistent/path/for/sure".to_string()]);
        assert!(files.is_empty());
    }
}
