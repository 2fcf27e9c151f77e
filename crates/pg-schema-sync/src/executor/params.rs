//! Named-parameter rewriting.
//!
//! Executor queries accept either positional `$N` values or a `:name`
//! mapping. The rewriter turns `:name` placeholders into `$N` before
//! dispatch. The scanner is quote-aware and skips the `::type` cast form, so
//! `SELECT '{}'::jsonb WHERE id = :id` only binds `:id`. Placeholder names
//! are ASCII identifiers; everything else in the text, quoted or not, passes
//! through untouched.

use crate::core::value::SqlValue;
use crate::error::{Result, SyncError};

/// Rewrite `:name` placeholders to `$N` and order the parameter values by
/// first use. A name used twice binds the same `$N`.
pub fn rewrite_named(sql: &str, params: &[(String, SqlValue)]) -> Result<(String, Vec<SqlValue>)> {
    let mut out = String::with_capacity(sql.len());
    let mut ordered: Vec<(String, SqlValue)> = Vec::new();

    let mut chars = sql.char_indices().peekable();
    let mut prev: Option<char> = None;
    let mut in_single = false;
    let mut in_double = false;

    while let Some((_, c)) = chars.next() {
        if in_single {
            out.push(c);
            if c == '\'' {
                in_single = false;
            }
            prev = Some(c);
            continue;
        }
        if in_double {
            out.push(c);
            if c == '"' {
                in_double = false;
            }
            prev = Some(c);
            continue;
        }

        match c {
            '\'' => {
                in_single = true;
                out.push(c);
            }
            '"' => {
                in_double = true;
                out.push(c);
            }
            ':' => {
                // A placeholder is a colon followed by an identifier start.
                // Anything else stays: the colon of `::` casts (and the one
                // right after it), array slices, bare colons.
                let prev_is_colon = prev == Some(':');
                let start = match chars.peek() {
                    Some((pos, first))
                        if !prev_is_colon
                            && (first.is_ascii_alphabetic() || *first == '_') =>
                    {
                        *pos
                    }
                    _ => {
                        out.push(c);
                        prev = Some(c);
                        continue;
                    }
                };

                // Identifier characters are ASCII, one byte each; the first
                // non-identifier character ends the name.
                let mut end = start;
                while let Some((pos, nc)) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || *nc == '_' {
                        end = pos + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }

                let name = &sql[start..end];
                let position = match ordered.iter().position(|(n, _)| n == name) {
                    Some(pos) => pos,
                    None => {
                        let value = params
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| {
                                SyncError::Config(format!(
                                    "no value bound for placeholder :{}",
                                    name
                                ))
                            })?;
                        ordered.push((name.to_string(), value));
                        ordered.len() - 1
                    }
                };
                out.push('$');
                out.push_str(&(position + 1).to_string());
                prev = name.chars().last();
                continue;
            }
            _ => {
                out.push(c);
            }
        }
        prev = Some(c);
    }

    Ok((out, ordered.into_iter().map(|(_, v)| v).collect()))
}
