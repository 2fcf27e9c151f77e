//! Declared-side schema model.
//!
//! A [`ParsedSchema`] is what the DSL parser produces for one table: an
//! ordered set of column definitions plus the index and uniqueness groups
//! declared on them. Insertion order is preserved because it drives column
//! order in CREATE TABLE.

use serde::{Deserialize, Serialize};

/// Nullability requirement for a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nullability {
    /// The column must be NOT NULL.
    NotNull,
    /// The column must allow NULL.
    Null,
    /// No requirement; never diffed. SERIAL columns always land here.
    Unspecified,
}

/// Key role of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// Inline PRIMARY KEY. At most one per table.
    Primary,
    /// Single-column unique constraint (`T_col_unique`).
    Unique,
    /// No key role.
    None,
}

/// One column as declared in a schema file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Column name.
    pub name: String,

    /// Upper-case wire-ready type, e.g. `VARCHAR(64)`, `NUMERIC(16,8)`, `SERIAL`.
    pub type_spec: String,

    /// Nullability requirement.
    pub nullable: Nullability,

    /// Key role.
    pub key: KeyKind,

    /// Raw default expression as written in the declaration, if any.
    pub default_raw: Option<String>,

    /// Free-form trailing fragment, upper-case.
    pub extra: Option<String>,
}

impl FieldDefinition {
    /// Whether this column is any SERIAL variant.
    ///
    /// SERIAL columns are implicitly NOT NULL and carry a sequence-bound
    /// default the engine must never emit or diff.
    pub fn is_serial(&self) -> bool {
        let head = self
            .type_spec
            .split('(')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_uppercase();
        matches!(
            head.as_str(),
            "SERIAL" | "SERIAL2" | "SERIAL4" | "SERIAL8" | "SMALLSERIAL" | "BIGSERIAL"
        )
    }
}

/// Parsed declaration of one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSchema {
    /// Columns in declaration order.
    fields: Vec<FieldDefinition>,

    /// Columns carrying a non-grouped index, in declaration order.
    pub individual_indexes: Vec<String>,

    /// Composite index groups: group name -> columns in encounter order.
    pub composite_indexes: Vec<(String, Vec<String>)>,

    /// Composite unique-index groups, same shape as `composite_indexes`.
    pub composite_unique_indexes: Vec<(String, Vec<String>)>,
}

impl ParsedSchema {
    /// Append a column definition. Names are expected to be unique; a repeated
    /// name replaces the earlier definition in place, keeping its position.
    pub fn push_field(&mut self, field: FieldDefinition) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Columns in declaration order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Look up a column by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a column with this name is declared.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// The primary-key column, if one is declared.
    pub fn primary_key(&self) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == KeyKind::Primary)
    }

    /// Columns declared with a single-column unique constraint.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.key == KeyKind::Unique)
    }

    /// Record a non-grouped index on a column. Idempotent per column.
    pub fn add_individual_index(&mut self, column: &str) {
        if !self.individual_indexes.iter().any(|c| c == column) {
            self.individual_indexes.push(column.to_string());
        }
    }

    /// Append a column to a composite index group, creating the group on
    /// first sight. Group order and member order are encounter order.
    pub fn add_composite_index(&mut self, group: &str, column: &str) {
        Self::append_group(&mut self.composite_indexes, group, column);
    }

    /// Append a column to a composite unique-index group.
    pub fn add_composite_unique(&mut self, group: &str, column: &str) {
        Self::append_group(&mut self.composite_unique_indexes, group, column);
    }

    fn append_group(groups: &mut Vec<(String, Vec<String>)>, group: &str, column: &str) {
        if let Some((_, cols)) = groups.iter_mut().find(|(g, _)| g == group) {
            if !cols.iter().any(|c| c == column) {
                cols.push(column.to_string());
            }
        } else {
            groups.push((group.to_string(), vec![column.to_string()]));
        }
    }

    /// True when nothing at all was declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
