//! Reflected-side schema model.
//!
//! A [`TableShape`] is the live database's answer to "what does this table
//! look like right now": the catalog's columns plus the existing index and
//! unique-constraint names. Shapes are produced on demand per table and
//! discarded right after diffing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One column as reported by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnShape {
    /// Column name.
    pub name: String,

    /// Catalog wire form, lower-case (e.g. "character varying").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// character_maximum_length, when the type carries one.
    pub char_max_length: Option<i32>,

    /// column_default, exactly as the catalog reports it.
    pub default_expr: Option<String>,

    /// numeric_precision, when the type carries one.
    pub numeric_precision: Option<i32>,

    /// numeric_scale, when the type carries one.
    pub numeric_scale: Option<i32>,
}

impl ColumnShape {
    /// Whether the reflected default is bound to a sequence.
    pub fn has_sequence_default(&self) -> bool {
        self.default_expr
            .as_deref()
            .map(|d| d.to_ascii_lowercase().contains("nextval("))
            .unwrap_or(false)
    }
}

/// Reflected shape of one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableShape {
    /// Columns keyed by name, in reflection (ordinal) order.
    pub columns: Vec<ColumnShape>,

    /// Names of all existing indexes on the table.
    pub index_names: BTreeSet<String>,

    /// Names of all existing unique constraints on the table.
    pub unique_constraint_names: BTreeSet<String>,
}

impl TableShape {
    /// Look up a reflected column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnShape> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(name: &str, default_expr: Option<&str>) -> ColumnShape {
        ColumnShape {
            name: name.to_string(),
            data_type: "integer".to_string(),
            is_nullable: false,
            char_max_length: None,
            default_expr: default_expr.map(|s| s.to_string()),
            numeric_precision: Some(32),
            numeric_scale: Some(0),
        }
    }

    #[test]
    fn test_sequence_default_detection() {
        assert!(shape("id", Some("nextval('users_id_seq'::regclass)")).has_sequence_default());
        assert!(shape("id", Some("NEXTVAL('users_id_seq')")).has_sequence_default());
        assert!(!shape("id", Some("0")).has_sequence_default());
        assert!(!shape("id", None).has_sequence_default());
    }

    #[test]
    fn test_column_lookup() {
        let table = TableShape {
            columns: vec![shape("a", None), shape("b", None)],
            ..Default::default()
        };
        assert!(table.has_column("a"));
        assert!(!table.has_column("c"));
        assert_eq!(table.column("b").unwrap().name, "b");
    }
}
