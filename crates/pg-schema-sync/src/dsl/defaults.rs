//! Default-value normalization.
//!
//! Defaults live a double life: the declaration writes `default/active`, the
//! catalog reports `'active'::character varying`. Comparison only works after
//! both sides are reduced to the same canonical form. Two pure directions:
//!
//! * [`normalize_default`] turns a raw DSL default into the expression that
//!   goes after `DEFAULT` in emitted SQL (or nothing at all).
//! * [`canonicalize_reflected`] reduces a catalog `column_default` to a bare
//!   comparable value by peeling casts, parentheses and quoting.
//!
//! [`compare_default`] combines the two into a set/drop/same decision.

/// Outcome of comparing a declared default against the reflected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultDiff {
    /// Both sides agree; no statement needed.
    Same,
    /// The column's default must be set to this emission-form expression.
    Set(String),
    /// The column carries a default the declaration no longer wants.
    Drop,
}

/// Normalize a raw DSL default into a statement-ready expression.
///
/// Returns `None` when no DEFAULT clause should be emitted (absent, empty or
/// explicit null). Everything else comes back as an expression that can be
/// appended verbatim after `DEFAULT`.
pub fn normalize_default(raw: &str, type_upper: &str) -> Option<String> {
    let mut value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }

    // Tolerate a redundant leading "default " from the declaration.
    if let Some(prefix) = value.get(..8) {
        if prefix.eq_ignore_ascii_case("default ") {
            value = value[8..].trim_start();
            if value.is_empty() {
                return None;
            }
        }
    }

    // Function calls and the CURRENT_* pseudo-functions pass through.
    if value.ends_with(')')
        || value.eq_ignore_ascii_case("CURRENT_TIMESTAMP")
        || value.eq_ignore_ascii_case("CURRENT_DATE")
        || value.eq_ignore_ascii_case("CURRENT_TIME")
    {
        return Some(value.to_string());
    }

    if value.eq_ignore_ascii_case("true") {
        return Some("TRUE".to_string());
    }
    if value.eq_ignore_ascii_case("false") {
        return Some("FALSE".to_string());
    }

    if is_numeric_literal(value) {
        return Some(value.to_string());
    }

    // JSON document defaults are quoted and cast so the catalog round-trips
    // them to the same expression. JSONB is checked first: "JSONB" contains
    // "JSON" as a substring.
    if value.starts_with('{') || value.starts_with('[') {
        if type_upper.contains("JSONB") {
            return Some(format!("'{}'::jsonb", escape_single(value)));
        }
        if type_upper.contains("JSON") {
            return Some(format!("'{}'::json", escape_single(value)));
        }
    }

    if is_canonical_uuid(value) {
        return Some(format!("'{}'", value.to_ascii_lowercase()));
    }

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return Some(value.to_string());
    }

    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        return Some(format!("'{}'", escape_single(inner)));
    }

    Some(format!("'{}'", escape_single(value)))
}

/// Reduce a reflected `column_default` to its canonical comparable form.
///
/// Sequence-bound defaults (`nextval(...)`) are returned unchanged: they are
/// never diffed, only tolerated.
pub fn canonicalize_reflected(reflected: &str) -> String {
    // Collapse internal whitespace so multi-word casts compare reliably.
    let collapsed = reflected.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.to_ascii_lowercase().contains("nextval(") {
        return collapsed;
    }

    let mut value = collapsed;

    if value.to_ascii_lowercase().starts_with("encode(") {
        value = value.replace("::text", "").replace("::unknown", "");
    }

    // Casts and wrapping parens can nest (`('now'::text)::timestamp`), so
    // peel until stable before touching the quotes.
    loop {
        let before = value.clone();
        value = strip_trailing_casts(value);
        value = strip_outer_parens(value);
        if value == before {
            break;
        }
    }

    value = strip_outer_quotes(value);

    if value.eq_ignore_ascii_case("true") {
        return "true".to_string();
    }
    if value.eq_ignore_ascii_case("false") {
        return "false".to_string();
    }

    value
}

/// Compare a declared default against the reflected one.
pub fn compare_default(
    raw: Option<&str>,
    type_upper: &str,
    reflected: Option<&str>,
) -> DefaultDiff {
    let emission = raw.and_then(|r| normalize_default(r, type_upper));
    let canonical_reflected = reflected.map(canonicalize_reflected).unwrap_or_default();

    match emission {
        None => {
            if canonical_reflected.is_empty() {
                DefaultDiff::Same
            } else {
                DefaultDiff::Drop
            }
        }
        Some(expr) => {
            if canonicalize_reflected(&expr) == canonical_reflected {
                DefaultDiff::Same
            } else {
                DefaultDiff::Set(expr)
            }
        }
    }
}

/// `-?\d+(\.\d+)?`
fn is_numeric_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() {
        return false;
    }
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match frac_part {
        None => true,
        Some(f) => !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()),
    }
}

/// Canonical dashed lower-case UUID form.
fn is_canonical_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit() && !c.is_ascii_uppercase(),
    })
}

fn escape_single(s: &str) -> String {
    s.replace('\'', "''")
}

/// Repeatedly strip a trailing `::type` where `type` is an identifier that
/// may contain spaces (`::timestamp without time zone`).
fn strip_trailing_casts(mut value: String) -> String {
    loop {
        let Some(pos) = value.rfind("::") else {
            break;
        };
        let suffix = &value[pos + 2..];
        let is_type_name = !suffix.is_empty()
            && suffix
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false)
            && suffix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ');
        if !is_type_name {
            break;
        }
        value.truncate(pos);
    }
    value
}

/// Strip one balanced outer paren pair.
fn strip_outer_parens(value: String) -> String {
    if value.len() >= 2 && value.starts_with('(') && value.ends_with(')') {
        value[1..value.len() - 1].to_string()
    } else {
        value
    }
}

/// Strip one outer single-quote pair and unescape doubled quotes.
fn strip_outer_quotes(value: String) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value[1..value.len() - 1].replace("''", "'")
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // normalize_default
    // =========================================================================

    #[test]
    fn test_absent_forms_produce_no_clause() {
        assert_eq!(normalize_default("", "TEXT"), None);
        assert_eq!(normalize_default("   ", "TEXT"), None);
        assert_eq!(normalize_default("null", "TEXT"), None);
        assert_eq!(normalize_default("NULL", "TEXT"), None);
    }

    #[test]
    fn test_default_prefix_is_stripped() {
        assert_eq!(
            normalize_default("default active", "VARCHAR(32)"),
            Some("'active'".to_string())
        );
        assert_eq!(
            normalize_default("DEFAULT 0", "INT"),
            Some("0".to_string())
        );
    }

    #[test]
    fn test_expressions_pass_through() {
        assert_eq!(
            normalize_default("now()", "TIMESTAMP"),
            Some("now()".to_string())
        );
        assert_eq!(
            normalize_default("gen_random_uuid()", "UUID"),
            Some("gen_random_uuid()".to_string())
        );
        assert_eq!(
            normalize_default("current_timestamp", "TIMESTAMP"),
            Some("current_timestamp".to_string())
        );
        assert_eq!(
            normalize_default("CURRENT_DATE", "DATE"),
            Some("CURRENT_DATE".to_string())
        );
    }

    #[test]
    fn test_booleans_upper_cased() {
        assert_eq!(normalize_default("true", "BOOLEAN"), Some("TRUE".to_string()));
        assert_eq!(normalize_default("False", "BOOLEAN"), Some("FALSE".to_string()));
    }

    #[test]
    fn test_numeric_literals_unquoted() {
        assert_eq!(normalize_default("0", "INT"), Some("0".to_string()));
        assert_eq!(normalize_default("-12", "INT"), Some("-12".to_string()));
        assert_eq!(
            normalize_default("180.00", "NUMERIC(16,8)"),
            Some("180.00".to_string())
        );
        // Not a bare numeric literal: quoted like a string.
        assert_eq!(normalize_default("1.2.3", "TEXT"), Some("'1.2.3'".to_string()));
    }

    #[test]
    fn test_json_documents_cast() {
        assert_eq!(
            normalize_default("{}", "JSONB"),
            Some("'{}'::jsonb".to_string())
        );
        assert_eq!(
            normalize_default("[]", "JSON"),
            Some("'[]'::json".to_string())
        );
        assert_eq!(
            normalize_default("{\"it's\": 1}", "JSONB"),
            Some("'{\"it''s\": 1}'::jsonb".to_string())
        );
        // A brace default on a non-JSON column is just a string.
        assert_eq!(normalize_default("{}", "TEXT"), Some("'{}'".to_string()));
    }

    #[test]
    fn test_uuid_quoted_lowercase() {
        assert_eq!(
            normalize_default("f81d4fae-7dec-11d0-a765-00a0c91e6bf6", "UUID"),
            Some("'f81d4fae-7dec-11d0-a765-00a0c91e6bf6'".to_string())
        );
        // Upper-case hex is not the canonical pattern; treated as a string.
        assert_eq!(
            normalize_default("F81D4FAE-7DEC-11D0-A765-00A0C91E6BF6", "UUID"),
            Some("'F81D4FAE-7DEC-11D0-A765-00A0C91E6BF6'".to_string())
        );
    }

    #[test]
    fn test_quoting_rules() {
        assert_eq!(
            normalize_default("'already'", "TEXT"),
            Some("'already'".to_string())
        );
        assert_eq!(
            normalize_default("\"wrapped\"", "TEXT"),
            Some("'wrapped'".to_string())
        );
        assert_eq!(
            normalize_default("plain", "TEXT"),
            Some("'plain'".to_string())
        );
        assert_eq!(
            normalize_default("it's", "TEXT"),
            Some("'it''s'".to_string())
        );
    }

    // =========================================================================
    // canonicalize_reflected
    // =========================================================================

    #[test]
    fn test_nextval_untouched() {
        let d = "nextval('users_user_id_seq'::regclass)";
        assert_eq!(canonicalize_reflected(d), d);
    }

    #[test]
    fn test_cast_and_quote_peeling() {
        assert_eq!(canonicalize_reflected("'active'::character varying"), "active");
        assert_eq!(
            canonicalize_reflected("'2020-01-01'::timestamp without time zone"),
            "2020-01-01"
        );
        assert_eq!(canonicalize_reflected("(0)::numeric"), "0");
        assert_eq!(canonicalize_reflected("('now'::text)::timestamp"), "now");
    }

    #[test]
    fn test_encode_inner_casts_removed() {
        assert_eq!(
            canonicalize_reflected("encode(sha256('x'::text::bytea), 'hex'::text)"),
            "encode(sha256('x'::bytea), 'hex')"
        );
    }

    #[test]
    fn test_booleans_lower_cased() {
        assert_eq!(canonicalize_reflected("TRUE"), "true");
        assert_eq!(canonicalize_reflected("false"), "false");
    }

    #[test]
    fn test_doubled_quotes_unescaped() {
        assert_eq!(canonicalize_reflected("'it''s'::text"), "it's");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(
            canonicalize_reflected("'a'::timestamp   without    time zone"),
            "a"
        );
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let samples = [
            "'active'::character varying",
            "nextval('t_id_seq'::regclass)",
            "(0)::numeric",
            "('now'::text)::timestamp without time zone",
            "TRUE",
            "'{}'::jsonb",
            "42",
        ];
        for d in samples {
            let once = canonicalize_reflected(d);
            assert_eq!(canonicalize_reflected(&once), once, "not idempotent: {}", d);
        }
    }

    // =========================================================================
    // compare_default
    // =========================================================================

    #[test]
    fn test_compare_matching_string_default() {
        assert_eq!(
            compare_default(
                Some("active"),
                "VARCHAR(32)",
                Some("'active'::character varying")
            ),
            DefaultDiff::Same
        );
    }

    #[test]
    fn test_compare_absent_vs_present_drops() {
        assert_eq!(
            compare_default(None, "TEXT", Some("'x'::text")),
            DefaultDiff::Drop
        );
        assert_eq!(compare_default(None, "TEXT", None), DefaultDiff::Same);
    }

    #[test]
    fn test_compare_changed_value_sets() {
        assert_eq!(
            compare_default(Some("inactive"), "TEXT", Some("'active'::text")),
            DefaultDiff::Set("'inactive'".to_string())
        );
    }

    #[test]
    fn test_compare_numeric_wire_skew() {
        assert_eq!(
            compare_default(Some("0"), "NUMERIC(16,8)", Some("(0)::numeric")),
            DefaultDiff::Same
        );
    }

    #[test]
    fn test_compare_boolean_forms() {
        assert_eq!(
            compare_default(Some("true"), "BOOLEAN", Some("true")),
            DefaultDiff::Same
        );
        assert_eq!(
            compare_default(Some("false"), "BOOLEAN", Some("true")),
            DefaultDiff::Set("FALSE".to_string())
        );
    }

    #[test]
    fn test_compare_after_emit_is_always_same() {
        let cases = [
            ("active", "VARCHAR(32)"),
            ("0", "INT"),
            ("true", "BOOLEAN"),
            ("now()", "TIMESTAMP"),
            ("{}", "JSONB"),
            ("f81d4fae-7dec-11d0-a765-00a0c91e6bf6", "UUID"),
            ("it's", "TEXT"),
        ];
        for (raw, ty) in cases {
            let emitted = normalize_default(raw, ty).unwrap();
            assert_eq!(
                compare_default(Some(raw), ty, Some(&emitted)),
                DefaultDiff::Same,
                "emit round-trip failed for {:?}",
                raw
            );
        }
    }
}
