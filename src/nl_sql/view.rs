//! Materializing the last successful query as a named view

use crate::nl_sql::dialect::SqlDialect;
use crate::nl_sql::error::{NlSqlError, NlSqlResult};
use crate::nl_sql::extract::normalize;
use crate::nl_sql::safety::{check_statement_shape, scan};
use tracing::debug;

/// Keep only letters, digits and underscores
pub fn sanitize_view_name(name: &str) -> NlSqlResult<String> {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if sanitized.is_empty() {
        return Err(NlSqlError::InvalidViewName(name.to_string()));
    }
    Ok(sanitized)
}

/// Drop comments and the trailing top-level `ORDER BY` clause.
///
/// Only an `ORDER BY` outside parentheses and quotes counts, so ordering inside
/// window functions and subqueries is kept.
pub fn strip_trailing_order_by(sql: &str) -> String {
    let code = scan(sql).code;
    match last_top_level_order_by(&code) {
        Some(at) => code[..at].to_string(),
        None => code,
    }
}

/// Byte offset of the last `ORDER BY` at parenthesis depth zero
fn last_top_level_order_by(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0usize;
    let mut found = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`' | b'[') => {
                let close = if quote == b'[' { b']' } else { quote };
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == close {
                        if bytes.get(i + 1) == Some(&close) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ => {
                if depth == 0 && starts_order_by(bytes, i) {
                    found = Some(i);
                }
                i += 1;
            }
        }
    }

    found
}

fn starts_order_by(bytes: &[u8], at: usize) -> bool {
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    if at > 0 && is_word(bytes[at - 1]) {
        return false;
    }
    let rest = &bytes[at..];
    if rest.len() < 5 || !rest[..5].eq_ignore_ascii_case(b"order") {
        return false;
    }
    let mut j = 5;
    let gap_start = j;
    while j < rest.len() && rest[j].is_ascii_whitespace() {
        j += 1;
    }
    if j == gap_start || rest.len() < j + 2 || !rest[j..j + 2].eq_ignore_ascii_case(b"by") {
        return false;
    }
    rest.get(j + 2).is_none_or(|b| !is_word(*b))
}

/// Statements that materialize `last_sql` as `namespace.name` in `dialect`
pub fn view_statements(
    dialect: SqlDialect,
    namespace: &str,
    view_name: &str,
    last_sql: &str,
) -> NlSqlResult<Vec<String>> {
    let name = sanitize_view_name(view_name)?;
    let body = normalize(&strip_trailing_order_by(last_sql));

    // Body must still be a single read-only SELECT
    check_statement_shape(&body)?;

    debug!("Creating view {}.{} from: {}", namespace, name, body);
    Ok(dialect.create_or_replace_view(namespace, &name, &body))
}
