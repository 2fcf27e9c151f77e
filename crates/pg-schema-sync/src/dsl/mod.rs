//! The declaration DSL: type dictionary, default normalization, field parsing.
//!
//! Everything in this module is pure. The parser turns a raw field map into a
//! [`crate::core::ParsedSchema`]; the type dictionary translates DSL type
//! heads into the catalog's wire forms; the default normalizer converts
//! declared defaults into statement-ready expressions and reflected defaults
//! into a canonical form fit for comparison.

pub mod defaults;
pub mod parser;
pub mod typemap;

pub use defaults::{canonicalize_reflected, compare_default, normalize_default, DefaultDiff};
pub use parser::{parse_fields, FieldAlias};
pub use typemap::{parse_type_spec, wire_type, TypeSpec};
