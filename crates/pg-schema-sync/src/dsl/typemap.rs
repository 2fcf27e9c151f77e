//! Type dictionary: DSL type heads to catalog wire forms.
//!
//! The catalog reports `character varying` where the DSL says `VARCHAR(64)`;
//! the diff engine needs both sides in the catalog's vocabulary before it can
//! compare them. Unknown heads map to their lower-case identity so raw
//! PostgreSQL types pass through untouched.

/// A declared type split into its comparable parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    /// Upper-case head, e.g. `VARCHAR`, `NUMERIC`, `SERIAL`.
    pub head: String,

    /// Catalog wire form of the head, e.g. `character varying`.
    pub wire: String,

    /// Declared `(N)` length for character types.
    pub length: Option<i32>,

    /// Declared `(P[,S])` for numeric types.
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

/// Map a DSL type head to the wire form the catalog reports.
pub fn wire_type(head: &str) -> String {
    match head.to_ascii_lowercase().as_str() {
        "serial" | "serial4" => "integer".to_string(),
        "smallserial" | "serial2" => "smallint".to_string(),
        "bigserial" | "serial8" => "bigint".to_string(),
        "varchar" => "character varying".to_string(),
        "char" => "character".to_string(),
        "int" | "integer" | "int4" => "integer".to_string(),
        "int2" | "smallint" => "smallint".to_string(),
        "int8" | "bigint" => "bigint".to_string(),
        "real" | "float4" => "real".to_string(),
        "double" | "float" | "float8" => "double precision".to_string(),
        "numeric" | "decimal" => "numeric".to_string(),
        "timestamp" => "timestamp without time zone".to_string(),
        "timestamptz" => "timestamp with time zone".to_string(),
        "date" => "date".to_string(),
        "time" => "time without time zone".to_string(),
        "timetz" => "time with time zone".to_string(),
        "boolean" | "bool" => "boolean".to_string(),
        "json" => "json".to_string(),
        "jsonb" => "jsonb".to_string(),
        "uuid" => "uuid".to_string(),
        "varbit" => "bit varying".to_string(),
        other => other.to_string(),
    }
}

/// Split an upper-case type spec like `VARCHAR(64)` or `NUMERIC(16,8)` into
/// head, wire form and the declared length or precision/scale.
pub fn parse_type_spec(type_spec: &str) -> TypeSpec {
    let spec = type_spec.trim();
    let (head, args) = match spec.find('(') {
        Some(open) => {
            let head = spec[..open].trim();
            let args = spec[open + 1..].trim_end_matches(')').trim();
            (head, Some(args))
        }
        None => (spec, None),
    };

    let mut length = None;
    let mut precision = None;
    let mut scale = None;

    if let Some(args) = args {
        let parts: Vec<_> = args.split(',').map(|p| p.trim()).collect();
        match parts.as_slice() {
            [one] => {
                let n = one.parse::<i32>().ok();
                length = n;
                precision = n;
            }
            [p, s] => {
                precision = p.parse::<i32>().ok();
                scale = s.parse::<i32>().ok();
            }
            _ => {}
        }
    }

    TypeSpec {
        head: head.to_ascii_uppercase(),
        wire: wire_type(head),
        length,
        precision,
        scale,
    }
}

impl TypeSpec {
    /// Whether the wire form carries a character length.
    pub fn is_character(&self) -> bool {
        matches!(self.wire.as_str(), "character varying" | "character")
    }

    /// Whether the wire form carries numeric precision/scale.
    pub fn is_numeric(&self) -> bool {
        self.wire == "numeric"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_serial_family() {
        assert_eq!(wire_type("SERIAL"), "integer");
        assert_eq!(wire_type("serial4"), "integer");
        assert_eq!(wire_type("smallserial"), "smallint");
        assert_eq!(wire_type("SERIAL2"), "smallint");
        assert_eq!(wire_type("BIGSERIAL"), "bigint");
        assert_eq!(wire_type("serial8"), "bigint");
    }

    #[test]
    fn test_wire_type_character_and_numeric() {
        assert_eq!(wire_type("VARCHAR"), "character varying");
        assert_eq!(wire_type("char"), "character");
        assert_eq!(wire_type("NUMERIC"), "numeric");
        assert_eq!(wire_type("decimal"), "numeric");
    }

    #[test]
    fn test_wire_type_integers_and_floats() {
        assert_eq!(wire_type("INT"), "integer");
        assert_eq!(wire_type("int4"), "integer");
        assert_eq!(wire_type("INT2"), "smallint");
        assert_eq!(wire_type("int8"), "bigint");
        assert_eq!(wire_type("FLOAT4"), "real");
        assert_eq!(wire_type("FLOAT"), "double precision");
        assert_eq!(wire_type("double"), "double precision");
    }

    #[test]
    fn test_wire_type_temporal_and_misc() {
        assert_eq!(wire_type("TIMESTAMP"), "timestamp without time zone");
        assert_eq!(wire_type("TIMESTAMPTZ"), "timestamp with time zone");
        assert_eq!(wire_type("TIME"), "time without time zone");
        assert_eq!(wire_type("TIMETZ"), "time with time zone");
        assert_eq!(wire_type("BOOL"), "boolean");
        assert_eq!(wire_type("VARBIT"), "bit varying");
    }

    #[test]
    fn test_wire_type_unknown_is_lowercase_identity() {
        assert_eq!(wire_type("TEXT"), "text");
        assert_eq!(wire_type("Bytea"), "bytea");
        assert_eq!(wire_type("tsvector"), "tsvector");
    }

    #[test]
    fn test_parse_type_spec_with_length() {
        let spec = parse_type_spec("VARCHAR(64)");
        assert_eq!(spec.head, "VARCHAR");
        assert_eq!(spec.wire, "character varying");
        assert_eq!(spec.length, Some(64));
        assert!(spec.is_character());
    }

    #[test]
    fn test_parse_type_spec_with_precision_scale() {
        let spec = parse_type_spec("NUMERIC(16,8)");
        assert_eq!(spec.head, "NUMERIC");
        assert_eq!(spec.wire, "numeric");
        assert_eq!(spec.precision, Some(16));
        assert_eq!(spec.scale, Some(8));
        assert_eq!(spec.length, None);
        assert!(spec.is_numeric());
    }

    #[test]
    fn test_parse_type_spec_bare() {
        let spec = parse_type_spec("SERIAL");
        assert_eq!(spec.head, "SERIAL");
        assert_eq!(spec.wire, "integer");
        assert_eq!(spec.length, None);
        assert_eq!(spec.precision, None);
    }
}
