//! Extraction of a single SQL statement from free-form model output

use crate::nl_sql::error::{NlSqlError, NlSqlResult};
use regex::Regex;
use std::sync::OnceLock;

/// Characters of the raw response quoted back in a `NoStatementFound` error
const EXCERPT_CHARS: usize = 400;

fn fenced_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```sql\s*(.*?)```").expect("fenced block pattern"))
}

fn bare_select_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bSELECT\b.*?;").expect("select pattern"))
}

/// Pull the candidate statement out of a model response.
///
/// A ```sql fenced block wins; otherwise the shortest text running from a
/// `SELECT` keyword to the next `;` is taken. The result is normalized with
/// [`normalize`].
pub fn extract(raw_text: &str) -> NlSqlResult<String> {
    let fenced = fenced_block_regex()
        .captures(raw_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|body| !is_blank_statement(body));

    let candidate = fenced.or_else(|| {
        bare_select_regex()
            .find(raw_text)
            .map(|m| m.as_str())
    });

    match candidate {
        Some(sql) => Ok(normalize(sql)),
        None => Err(NlSqlError::NoStatementFound(
            raw_text.chars().take(EXCERPT_CHARS).collect(),
        )),
    }
}

/// Trim whitespace and trailing terminators, then end with exactly one `;`.
/// Idempotent.
pub fn normalize(sql: &str) -> String {
    let body = sql
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{body};")
}

fn is_blank_statement(body: &str) -> bool {
    body.trim_matches(|c: char| c == ';' || c.is_whitespace())
        .is_empty()
}
