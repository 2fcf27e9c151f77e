//! Core data model shared across the engine.
//!
//! The types here are passive value objects: the declared side
//! ([`schema::ParsedSchema`]), the reflected side ([`shape::TableShape`]),
//! the emitted side ([`statement::Statement`]), and the helpers that keep
//! identifier and parameter handling consistent everywhere.

pub mod identifier;
pub mod schema;
pub mod shape;
pub mod statement;
pub mod value;

pub use identifier::{
    composite_index_name, composite_unique_index_name, index_name, primary_key_name, quote_ident,
    unique_constraint_name,
};
pub use schema::{FieldDefinition, KeyKind, Nullability, ParsedSchema};
pub use shape::{ColumnShape, TableShape};
pub use statement::{Statement, StatementKind};
pub use value::SqlValue;
