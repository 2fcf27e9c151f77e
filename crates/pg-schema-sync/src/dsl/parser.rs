//! Declaration field parser.
//!
//! A field value is one string: a type spec followed by whitespace-separated
//! modifiers, e.g. `"varchar/64 required unique index/search"`. The type spec
//! is `alias[/length]` where the alias resolves through the configured custom
//! aliases (falling back to the built-in table, then to the literal type
//! head). Modifiers set nullability, key role, index membership and defaults.

use std::collections::HashMap;

use crate::core::schema::{FieldDefinition, KeyKind, Nullability, ParsedSchema};
use crate::error::{Result, SyncError};

/// A named type shortcut: resolved type plus optional key/default/extra.
#[derive(Debug, Clone, Default)]
pub struct FieldAlias {
    /// Resolved type spec, e.g. `VARCHAR(64)` or `SERIAL`.
    pub type_spec: String,

    /// Key role: `primary` or `unique`. Overrides a plain `unique` modifier.
    pub key: Option<String>,

    /// Default inherited when the field has no `default/` modifier.
    pub default: Option<String>,

    /// Trailing fragment appended upper-cased.
    pub extra: Option<String>,
}

impl FieldAlias {
    fn typed(type_spec: &str) -> Self {
        Self {
            type_spec: type_spec.to_string(),
            ..Default::default()
        }
    }

    /// Built-in alias table. Config `customFields` shadow these by name.
    fn builtin(name: &str) -> Option<FieldAlias> {
        let alias = match name {
            "id" => FieldAlias {
                type_spec: "SERIAL".to_string(),
                key: Some("primary".to_string()),
                ..Default::default()
            },
            "str" => Self::typed("VARCHAR(64)"),
            "email" => Self::typed("VARCHAR(128)"),
            "pass" => Self::typed("VARCHAR(64)"),
            "int" => Self::typed("INT"),
            "bigint" => Self::typed("BIGINT"),
            "float" => Self::typed("DOUBLE"),
            "bool" => Self::typed("BOOLEAN"),
            "text" => Self::typed("TEXT"),
            "json" => Self::typed("JSONB"),
            "time" => Self::typed("TIMESTAMP"),
            "date" => Self::typed("DATE"),
            "uuid" => Self::typed("UUID"),
            _ => return None,
        };
        Some(alias)
    }
}

/// Parse an ordered field map into a [`ParsedSchema`].
///
/// Keys beginning with `~` are meta-keys and never become columns; the caller
/// handles table-level meta-keys (`~ignore`) before parsing.
pub fn parse_fields(
    table: &str,
    fields: &[(String, String)],
    custom_aliases: &HashMap<String, FieldAlias>,
) -> Result<ParsedSchema> {
    let mut schema = ParsedSchema::default();

    for (name, value) in fields {
        if name.starts_with('~') {
            continue;
        }

        let field = parse_field(table, name, value, custom_aliases)?;

        if field.key == KeyKind::Primary && schema.primary_key().is_some() {
            return Err(SyncError::Config(format!(
                "table {} declares more than one primary key ({})",
                table, name
            )));
        }

        apply_modifier_indexes(&mut schema, name, value);
        schema.push_field(field);
    }

    Ok(schema)
}

fn parse_field(
    table: &str,
    name: &str,
    value: &str,
    custom_aliases: &HashMap<String, FieldAlias>,
) -> Result<FieldDefinition> {
    let mut tokens = value.split_whitespace();
    let type_token = tokens.next().ok_or_else(|| {
        SyncError::Config(format!("table {}: column {} has an empty type", table, name))
    })?;

    let (alias_name, length) = match type_token.split_once('/') {
        Some((alias, len)) => (alias, Some(len)),
        None => (type_token, None),
    };

    let alias = custom_aliases
        .get(alias_name)
        .cloned()
        .or_else(|| FieldAlias::builtin(alias_name))
        .unwrap_or_else(|| FieldAlias::typed(alias_name));

    let type_spec = resolve_type(&alias.type_spec, length);

    let mut required = false;
    let mut key_modifier = KeyKind::None;
    let mut default_raw: Option<String> = None;
    let mut extra_tokens: Vec<String> = Vec::new();

    for token in tokens {
        if token == "required" {
            required = true;
        } else if token == "unique" {
            key_modifier = KeyKind::Unique;
        } else if token == "index" || token.starts_with("index/") || token.starts_with("unique/") {
            // Index membership is recorded separately by apply_modifier_indexes.
        } else if let Some(v) = token.strip_prefix("default/") {
            default_raw = Some(v.to_string());
        } else {
            extra_tokens.push(token.to_ascii_uppercase());
        }
    }

    // Modifiers first, alias second: the alias Key wins when both are present.
    let mut key = key_modifier;
    if let Some(alias_key) = &alias.key {
        if alias_key.eq_ignore_ascii_case("primary") {
            key = KeyKind::Primary;
        } else if alias_key.eq_ignore_ascii_case("unique") {
            key = KeyKind::Unique;
        }
    }

    if default_raw.is_none() {
        default_raw = alias.default.clone();
    }

    if let Some(alias_extra) = &alias.extra {
        extra_tokens.push(alias_extra.to_ascii_uppercase());
    }
    let extra = if extra_tokens.is_empty() {
        None
    } else {
        Some(extra_tokens.join(" "))
    };

    let mut field = FieldDefinition {
        name: name.to_string(),
        type_spec,
        nullable: if required {
            Nullability::NotNull
        } else {
            Nullability::Null
        },
        key,
        default_raw,
        extra,
    };

    if field.is_serial() {
        field.nullable = Nullability::Unspecified;
    }

    Ok(field)
}

/// Record `index`/`index/group`/`unique/group` memberships for one column.
fn apply_modifier_indexes(schema: &mut ParsedSchema, column: &str, value: &str) {
    for token in value.split_whitespace().skip(1) {
        if token == "index" {
            schema.add_individual_index(column);
        } else if let Some(groups) = token.strip_prefix("index/") {
            for group in groups.split(',').filter(|g| !g.is_empty()) {
                schema.add_composite_index(group, column);
            }
        } else if let Some(groups) = token.strip_prefix("unique/") {
            for group in groups.split(',').filter(|g| !g.is_empty()) {
                schema.add_composite_unique(group, column);
            }
        }
    }
}

/// Apply an optional `/length` to a resolved type and upper-case the result.
///
/// A length replaces an existing parenthesized part or is appended when the
/// resolved type has none.
fn resolve_type(base: &str, length: Option<&str>) -> String {
    let resolved = match length {
        Some(len) => match base.find('(') {
            Some(open) => format!("{}({})", &base[..open], len),
            None => format!("{}({})", base, len),
        },
        None => base.to_string(),
    };
    resolved.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fields: &[(&str, &str)]) -> ParsedSchema {
        let owned: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        parse_fields("users", &owned, &HashMap::new()).unwrap()
    }

    #[test]
    fn test_standard_alias_resolution() {
        let schema = parse(&[
            ("user_id", "id"),
            ("user_name", "str required"),
            ("user_email", "email unique index"),
        ]);

        let id = schema.field("user_id").unwrap();
        assert_eq!(id.type_spec, "SERIAL");
        assert_eq!(id.key, KeyKind::Primary);
        assert_eq!(id.nullable, Nullability::Unspecified);

        let name = schema.field("user_name").unwrap();
        assert_eq!(name.type_spec, "VARCHAR(64)");
        assert_eq!(name.nullable, Nullability::NotNull);

        let email = schema.field("user_email").unwrap();
        assert_eq!(email.type_spec, "VARCHAR(128)");
        assert_eq!(email.key, KeyKind::Unique);
        assert_eq!(email.nullable, Nullability::Null);
        assert_eq!(schema.individual_indexes, vec!["user_email"]);
    }

    #[test]
    fn test_length_replaces_or_appends() {
        let schema = parse(&[("a", "str/200"), ("b", "varchar/32"), ("c", "numeric/16,8")]);
        assert_eq!(schema.field("a").unwrap().type_spec, "VARCHAR(200)");
        assert_eq!(schema.field("b").unwrap().type_spec, "VARCHAR(32)");
        assert_eq!(schema.field("c").unwrap().type_spec, "NUMERIC(16,8)");
    }

    #[test]
    fn test_raw_type_passthrough() {
        let schema = parse(&[("bio", "text"), ("raw", "tsvector")]);
        assert_eq!(schema.field("bio").unwrap().type_spec, "TEXT");
        assert_eq!(schema.field("raw").unwrap().type_spec, "TSVECTOR");
    }

    #[test]
    fn test_default_modifier() {
        let schema = parse(&[("state", "str default/active"), ("count", "int default/0")]);
        assert_eq!(
            schema.field("state").unwrap().default_raw.as_deref(),
            Some("active")
        );
        assert_eq!(schema.field("count").unwrap().default_raw.as_deref(), Some("0"));
    }

    #[test]
    fn test_composite_groups() {
        let schema = parse(&[
            ("owner_id", "int index/by_owner"),
            ("slug", "str unique/owner_slug"),
            ("created_at", "time index/by_owner,by_date"),
            ("kind", "str unique/owner_slug"),
        ]);
        assert_eq!(
            schema.composite_indexes,
            vec![
                ("by_owner".to_string(), vec!["owner_id".to_string(), "created_at".to_string()]),
                ("by_date".to_string(), vec!["created_at".to_string()]),
            ]
        );
        assert_eq!(
            schema.composite_unique_indexes,
            vec![("owner_slug".to_string(), vec!["slug".to_string(), "kind".to_string()])]
        );
    }

    #[test]
    fn test_custom_alias_inherits_default_key_and_extra() {
        let mut aliases = HashMap::new();
        aliases.insert(
            "state".to_string(),
            FieldAlias {
                type_spec: "VARCHAR(16)".to_string(),
                key: None,
                default: Some("active".to_string()),
                extra: Some("check (char_length(\"state\") > 0)".to_string()),
            },
        );
        let fields = vec![("state".to_string(), "state".to_string())];
        let schema = parse_fields("users", &fields, &aliases).unwrap();
        let f = schema.field("state").unwrap();
        assert_eq!(f.type_spec, "VARCHAR(16)");
        assert_eq!(f.default_raw.as_deref(), Some("active"));
        assert!(f.extra.as_deref().unwrap().starts_with("CHECK"));
    }

    #[test]
    fn test_alias_key_overrides_unique_modifier() {
        let mut aliases = HashMap::new();
        aliases.insert(
            "code".to_string(),
            FieldAlias {
                type_spec: "VARCHAR(8)".to_string(),
                key: Some("primary".to_string()),
                ..Default::default()
            },
        );
        let fields = vec![("code".to_string(), "code unique".to_string())];
        let schema = parse_fields("items", &fields, &aliases).unwrap();
        assert_eq!(schema.field("code").unwrap().key, KeyKind::Primary);
    }

    #[test]
    fn test_explicit_default_wins_over_alias_default() {
        let mut aliases = HashMap::new();
        aliases.insert(
            "state".to_string(),
            FieldAlias {
                type_spec: "VARCHAR(16)".to_string(),
                default: Some("active".to_string()),
                ..Default::default()
            },
        );
        let fields = vec![("state".to_string(), "state default/paused".to_string())];
        let schema = parse_fields("jobs", &fields, &aliases).unwrap();
        assert_eq!(
            schema.field("state").unwrap().default_raw.as_deref(),
            Some("paused")
        );
    }

    #[test]
    fn test_serial_ignores_required() {
        let schema = parse(&[("id", "id required")]);
        assert_eq!(schema.field("id").unwrap().nullable, Nullability::Unspecified);
    }

    #[test]
    fn test_meta_keys_skipped() {
        let schema = parse(&[("~ignore", "true"), ("name", "str")]);
        assert_eq!(schema.fields().len(), 1);
        assert!(schema.field("~ignore").is_none());
    }

    #[test]
    fn test_unknown_modifiers_collect_into_extra() {
        let schema = parse(&[("owner", "int references users(user_id)")]);
        assert_eq!(
            schema.field("owner").unwrap().extra.as_deref(),
            Some("REFERENCES USERS(USER_ID)")
        );
    }

    #[test]
    fn test_duplicate_primary_rejected() {
        let fields = vec![
            ("a".to_string(), "id".to_string()),
            ("b".to_string(), "id".to_string()),
        ];
        assert!(parse_fields("users", &fields, &HashMap::new()).is_err());
    }

    #[test]
    fn test_empty_value_rejected() {
        let fields = vec![("a".to_string(), "  ".to_string())];
        assert!(parse_fields("users", &fields, &HashMap::new()).is_err());
    }
}
