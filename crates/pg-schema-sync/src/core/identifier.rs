//! Identifier quoting and deterministic object naming.
//!
//! All emitted identifiers are double-quoted. Index and constraint names are
//! derived deterministically from `(table, column-or-group)` so the diff
//! engine can tell its own objects apart from foreign ones and never drops
//! what it is about to recreate.

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Index name for a single indexed column: `T_col_idx`.
pub fn index_name(table: &str, column: &str) -> String {
    format!("{}_{}_idx", table, column)
}

/// Index name for a composite group: `T_group_idx`.
pub fn composite_index_name(table: &str, group: &str) -> String {
    format!("{}_{}_idx", table, group)
}

/// Unique-index name for a composite group: `T_group_unique_idx`.
pub fn composite_unique_index_name(table: &str, group: &str) -> String {
    format!("{}_{}_unique_idx", table, group)
}

/// Constraint (and backing index) name for a single unique column: `T_col_unique`.
pub fn unique_constraint_name(table: &str, column: &str) -> String {
    format!("{}_{}_unique", table, column)
}

/// Primary-key index name: `T_pkey`.
pub fn primary_key_name(table: &str) -> String {
    format!("{}_pkey", table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_normal() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("user_name"), "\"user_name\"");
    }

    #[test]
    fn test_quote_ident_escapes_double_quote() {
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(index_name("users", "user_email"), "users_user_email_idx");
        assert_eq!(composite_index_name("events", "by_owner"), "events_by_owner_idx");
        assert_eq!(
            composite_unique_index_name("events", "owner_slug"),
            "events_owner_slug_unique_idx"
        );
        assert_eq!(
            unique_constraint_name("users", "user_email"),
            "users_user_email_unique"
        );
        assert_eq!(primary_key_name("users"), "users_pkey");
    }
}
