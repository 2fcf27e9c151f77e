//! Schema diff engine.
//!
//! Pure comparison of a [`ParsedSchema`] against a reflected [`TableShape`]:
//! same inputs produce the identical statement list byte for byte. The output
//! order is fixed and is a correctness property — drops come before adds so a
//! replacement column can be re-indexed, and index creation comes last:
//!
//! 1. drop columns no longer declared
//! 2. drop unique constraints not in the expected set
//! 3. drop indexes not in the expected set (never the primary-key index)
//! 4. add missing columns
//! 5. alter mismatched column types (incl. length and precision/scale)
//! 6. set/drop mismatched defaults
//! 7. set/drop mismatched NOT NULL
//! 8. add missing indexes
//! 9. add missing unique constraints

use std::collections::BTreeSet;

use crate::core::identifier::{
    composite_index_name, composite_unique_index_name, index_name, primary_key_name,
    unique_constraint_name,
};
use crate::core::schema::{FieldDefinition, KeyKind, Nullability, ParsedSchema};
use crate::core::shape::{ColumnShape, TableShape};
use crate::core::statement::Statement;
use crate::dsl::defaults::{compare_default, DefaultDiff};
use crate::dsl::typemap::parse_type_spec;
use crate::emit;

/// Compute the ordered statement list that brings `shape` into agreement with
/// `schema`. Never touches the network.
pub fn diff_table(table: &str, schema: &ParsedSchema, shape: &TableShape) -> Vec<Statement> {
    let mut statements = Vec::new();

    // 1. Columns that exist but are no longer declared.
    for column in &shape.columns {
        if !schema.has_field(&column.name) {
            statements.push(emit::drop_column(table, &column.name));
        }
    }

    let expected_indexes = expected_index_names(table, schema);
    let expected_constraints = expected_constraint_names(table, schema);
    let pkey = primary_key_name(table);

    // 2. Unique constraints this tool did not ask for.
    for name in &shape.unique_constraint_names {
        if !expected_constraints.contains(name) && *name != pkey {
            statements.push(emit::drop_constraint(table, name));
        }
    }

    // 3. Indexes this tool did not ask for. The primary-key index is never
    //    dropped, whatever the declaration says.
    for name in &shape.index_names {
        if !expected_indexes.contains(name) && *name != pkey {
            statements.push(emit::drop_index(table, name));
        }
    }

    // 4. Declared columns missing from the reflection.
    for field in schema.fields() {
        if !shape.has_column(&field.name) {
            statements.push(emit::add_column(table, field));
        }
    }

    // 5-7. Retained columns, in declaration order.
    for field in schema.fields() {
        let Some(column) = shape.column(&field.name) else {
            continue;
        };

        if let Some(type_spec) = type_mismatch(field, column) {
            statements.push(emit::alter_column_type(table, &field.name, &type_spec));
        }

        if let Some(stmt) = default_mismatch(table, field, column) {
            statements.push(stmt);
        }

        if let Some(stmt) = nullability_mismatch(table, field, column) {
            statements.push(stmt);
        }
    }

    // 8. Missing indexes: individual, composite, composite-unique.
    for column in &schema.individual_indexes {
        if !shape.index_names.contains(&index_name(table, column)) {
            statements.push(emit::add_index(table, column));
        }
    }
    for (group, columns) in &schema.composite_indexes {
        if !shape.index_names.contains(&composite_index_name(table, group)) {
            statements.push(emit::add_composite_index(table, group, columns));
        }
    }
    for (group, columns) in &schema.composite_unique_indexes {
        if !shape
            .index_names
            .contains(&composite_unique_index_name(table, group))
        {
            statements.push(emit::add_composite_unique_index(table, group, columns));
        }
    }

    // 9. Missing single-column unique constraints.
    for field in schema.unique_fields() {
        let name = unique_constraint_name(table, &field.name);
        if !shape.unique_constraint_names.contains(&name) {
            statements.push(emit::add_unique_constraint(table, &field.name));
        }
    }

    statements
}

/// Index names the declaration accounts for. Anything else on the table is
/// foreign and gets dropped.
fn expected_index_names(table: &str, schema: &ParsedSchema) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for column in &schema.individual_indexes {
        names.insert(index_name(table, column));
    }
    for (group, _) in &schema.composite_indexes {
        names.insert(composite_index_name(table, group));
    }
    for (group, _) in &schema.composite_unique_indexes {
        names.insert(composite_unique_index_name(table, group));
    }
    for field in schema.unique_fields() {
        names.insert(unique_constraint_name(table, &field.name));
    }
    names.insert(primary_key_name(table));
    names
}

fn expected_constraint_names(table: &str, schema: &ParsedSchema) -> BTreeSet<String> {
    schema
        .unique_fields()
        .map(|f| unique_constraint_name(table, &f.name))
        .collect()
}

/// Decide whether the reflected column type disagrees with the declared one.
/// Returns the type to ALTER to.
fn type_mismatch(field: &FieldDefinition, column: &ColumnShape) -> Option<String> {
    let spec = parse_type_spec(&field.type_spec);

    if spec.wire != column.data_type {
        // A serial head is CREATE-only vocabulary; altering targets the
        // underlying integer type.
        if field.is_serial() {
            return Some(spec.wire.to_ascii_uppercase());
        }
        return Some(field.type_spec.clone());
    }

    if spec.is_character() {
        if let Some(declared) = spec.length {
            if column.char_max_length != Some(declared) {
                return Some(field.type_spec.clone());
            }
        }
    }

    if spec.is_numeric() {
        if let Some(declared_precision) = spec.precision {
            if column.numeric_precision != Some(declared_precision) {
                return Some(field.type_spec.clone());
            }
        }
        if let Some(declared_scale) = spec.scale {
            if column.numeric_scale != Some(declared_scale) {
                return Some(field.type_spec.clone());
            }
        }
    }

    None
}

fn default_mismatch(
    table: &str,
    field: &FieldDefinition,
    column: &ColumnShape,
) -> Option<Statement> {
    if field.is_serial() {
        return None;
    }
    if field.key == KeyKind::Primary && column.has_sequence_default() {
        return None;
    }

    match compare_default(
        field.default_raw.as_deref(),
        &field.type_spec,
        column.default_expr.as_deref(),
    ) {
        DefaultDiff::Same => None,
        DefaultDiff::Set(expr) => Some(emit::set_column_default(table, &field.name, &expr)),
        DefaultDiff::Drop => Some(emit::drop_column_default(table, &field.name)),
    }
}

fn nullability_mismatch(
    table: &str,
    field: &FieldDefinition,
    column: &ColumnShape,
) -> Option<Statement> {
    if field.is_serial() {
        return None;
    }
    match field.nullable {
        Nullability::Unspecified => None,
        Nullability::NotNull if column.is_nullable => Some(emit::set_not_null(table, &field.name)),
        Nullability::Null if !column.is_nullable => Some(emit::drop_not_null(table, &field.name)),
        _ => None,
    }
}
