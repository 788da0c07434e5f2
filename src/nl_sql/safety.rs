//! Safety validation of generated SQL
//!
//! Two checks gate execution:
//!
//! - **Statement shape**: after comments are removed the text must start with
//!   `SELECT` or `WITH`, hold at most one `;`, and contain no mutating keyword
//!   outside string literals.
//! - **Column conformance**: every `qualifier.column` pair whose qualifier is a
//!   real table, or an alias bound to a real table in a `FROM`/`JOIN` clause,
//!   must name a real column of that table.
//!
//! Both checks are pattern based. Qualifiers that resolve to neither a table nor
//! a bound alias (CTE names, derived tables, comma-joined aliases) are not
//! verified.

use crate::database::SchemaInspector;
use crate::nl_sql::error::{NlSqlError, NlSqlResult};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::debug;

/// Keywords that may never appear outside a string literal
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "ALTER", "DROP", "CREATE", "MERGE", "EXEC", "INTO", "TRUNCATE",
];

/// Words that can follow a table name in FROM/JOIN without being its alias
const NON_ALIAS_WORDS: &[&str] = &[
    "where", "on", "join", "inner", "left", "right", "full", "cross", "outer", "group", "order",
    "having", "union", "except", "intersect", "with", "as", "limit", "offset", "window", "using",
    "natural", "apply", "pivot", "unpivot", "for", "select", "option", "into", "from",
];

/// IDENT: `[quoted]`, `"quoted"`, `` `quoted` `` or a bare word not starting with a digit
const IDENT: &str = r#"(?:\[[^\]]+\]|"[^"]+"|`[^`]+`|[^\W\d]\w*)"#;

fn statement_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(?:select|with)\b").expect("statement start pattern"))
}

fn forbidden_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(insert|update|delete|alter|drop|create|merge|exec(?:ute)?|into|truncate)\b")
            .expect("forbidden keyword pattern")
    })
}

fn qualified_chain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{IDENT}(?:\.{IDENT})+")).expect("qualified chain pattern")
    })
}

fn chain_part_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENT).expect("identifier pattern"))
}

fn table_binding_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\b(?:from|join)\s+((?:{IDENT}\s*\.\s*)*{IDENT})(?:\s+(?:as\s+)?({IDENT}))?"
        ))
        .expect("table binding pattern")
    })
}

/// A `qualifier.column` pair found in the SQL text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReference {
    pub qualifier: String,
    pub column: String,
}

/// SQL text split into what the checks look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSql {
    /// Comments replaced by a space, literals intact
    pub code: String,
    /// Like `code`, with every string literal emptied to `''`
    pub masked: String,
    /// Kind of quoted token left open at the end of the text
    pub unterminated: Option<&'static str>,
}

/// Strip comments and mask string literals in one pass
pub fn scan(sql: &str) -> ScannedSql {
    let chars: Vec<char> = sql.chars().collect();
    let mut code = String::with_capacity(sql.len());
    let mut masked = String::with_capacity(sql.len());
    let mut unterminated = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                code.push(' ');
                masked.push(' ');
            }
            '/' if next == Some('*') => {
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                code.push(' ');
                masked.push(' ');
            }
            '\'' => {
                let (end, closed) = quoted_end(&chars, i, '\'');
                code.extend(&chars[i..end]);
                masked.push_str("''");
                if !closed {
                    unterminated = Some("string literal");
                }
                i = end;
            }
            '[' | '"' | '`' => {
                let close = if c == '[' { ']' } else { c };
                let (end, closed) = quoted_end(&chars, i, close);
                code.extend(&chars[i..end]);
                masked.extend(&chars[i..end]);
                if !closed {
                    unterminated = Some("quoted identifier");
                }
                i = end;
            }
            _ => {
                code.push(c);
                masked.push(c);
                i += 1;
            }
        }
    }

    ScannedSql {
        code,
        masked,
        unterminated,
    }
}

/// Index just past the closing quote; a doubled closer is an escape
fn quoted_end(chars: &[char], start: usize, close: char) -> (usize, bool) {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == close {
            if chars.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return (i + 1, true);
        }
        i += 1;
    }
    (chars.len(), false)
}

/// Statement-shape check: single read-only SELECT/WITH statement
pub fn check_statement_shape(sql: &str) -> NlSqlResult<()> {
    check_scanned_shape(&scan(sql))
}

fn check_scanned_shape(scanned: &ScannedSql) -> NlSqlResult<()> {
    if let Some(kind) = scanned.unterminated {
        return Err(NlSqlError::UnsafeStatement(format!("unterminated {kind}")));
    }

    if !statement_start_regex().is_match(&scanned.code) {
        return Err(NlSqlError::UnsafeStatement(
            "statement must begin with SELECT or WITH".to_string(),
        ));
    }

    let terminators = scanned.code.matches(';').count();
    if terminators > 1 {
        return Err(NlSqlError::UnsafeStatement(format!(
            "{terminators} statement terminators found, at most one is allowed"
        )));
    }

    if let Some(found) = forbidden_keyword_regex().find(&scanned.masked) {
        return Err(NlSqlError::UnsafeStatement(format!(
            "forbidden keyword {}",
            found.as_str().to_uppercase()
        )));
    }

    Ok(())
}

/// Every `qualifier.column` pair in the SQL, comments and literals excluded.
/// A chain `a.b.c` yields `(a, b)` and `(b, c)`.
pub fn scan_column_references(sql: &str) -> Vec<ColumnReference> {
    references_in(&scan(sql).masked)
}

fn references_in(masked: &str) -> Vec<ColumnReference> {
    let mut references = Vec::new();
    for chain in qualified_chain_regex().find_iter(masked) {
        let parts: Vec<String> = chain_part_regex()
            .find_iter(chain.as_str())
            .map(|m| unquote(m.as_str()))
            .collect();
        for pair in parts.windows(2) {
            references.push(ColumnReference {
                qualifier: pair[0].clone(),
                column: pair[1].clone(),
            });
        }
    }
    references
}

/// Aliases bound to known tables by `FROM table [AS] alias` / `JOIN table [AS] alias`.
/// Keys are lowercase; values are the tables' real names.
fn alias_bindings(
    masked: &str,
    known_tables: &HashMap<String, String>,
) -> HashMap<String, Vec<String>> {
    let mut bindings: HashMap<String, Vec<String>> = HashMap::new();

    for caps in table_binding_regex().captures_iter(masked) {
        let (Some(target), Some(alias)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let alias = unquote(alias.as_str());
        if NON_ALIAS_WORDS.contains(&alias.to_lowercase().as_str()) {
            continue;
        }
        let Some(table_part) = chain_part_regex().find_iter(target.as_str()).last() else {
            continue;
        };
        let Some(table) = known_tables.get(&unquote(table_part.as_str()).to_lowercase()) else {
            continue;
        };

        let bound = bindings.entry(alias.to_lowercase()).or_default();
        if !bound.iter().any(|t| t.eq_ignore_ascii_case(table)) {
            bound.push(table.clone());
        }
    }

    bindings
}

fn unquote(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some('['), Some(']')) => trimmed[1..trimmed.len() - 1].replace("]]", "]"),
        (Some('"'), Some('"')) => trimmed[1..trimmed.len() - 1].replace("\"\"", "\""),
        (Some('`'), Some('`')) => trimmed[1..trimmed.len() - 1].replace("``", "`"),
        _ => trimmed.to_string(),
    }
}

/// Column-conformance check against the live schema
pub async fn check_column_conformance<I: SchemaInspector + ?Sized>(
    sql: &str,
    inspector: &I,
    namespace: &str,
) -> NlSqlResult<()> {
    check_scanned_conformance(&scan(sql), inspector, namespace).await
}

async fn check_scanned_conformance<I: SchemaInspector + ?Sized>(
    scanned: &ScannedSql,
    inspector: &I,
    namespace: &str,
) -> NlSqlResult<()> {
    let references = references_in(&scanned.masked);
    if references.is_empty() {
        return Ok(());
    }

    let known_tables: HashMap<String, String> = inspector
        .list_tables(namespace)
        .await
        .map_err(|e| NlSqlError::SchemaError(e.to_string()))?
        .into_iter()
        .map(|t| (t.to_lowercase(), t))
        .collect();
    let aliases = alias_bindings(&scanned.masked, &known_tables);

    let mut columns_by_table: HashMap<String, HashSet<String>> = HashMap::new();

    for reference in references {
        let qualifier = reference.qualifier.to_lowercase();
        let targets: Vec<String> = match known_tables.get(&qualifier) {
            Some(table) => vec![table.clone()],
            None => match aliases.get(&qualifier) {
                Some(tables) => tables.clone(),
                None => {
                    debug!("Skipping unresolved qualifier {}", reference.qualifier);
                    continue;
                }
            },
        };

        // An alias bound to several tables must resolve in every one of them
        for table in targets {
            let key = table.to_lowercase();
            if !columns_by_table.contains_key(&key) {
                let columns = inspector
                    .list_columns(&table, namespace)
                    .await
                    .map_err(|e| NlSqlError::SchemaError(e.to_string()))?;
                columns_by_table.insert(
                    key.clone(),
                    columns.into_iter().map(|c| c.to_lowercase()).collect(),
                );
            }

            let known = columns_by_table
                .get(&key)
                .is_some_and(|cols| cols.contains(&reference.column.to_lowercase()));
            if !known {
                return Err(NlSqlError::UnknownColumn {
                    table,
                    column: reference.column,
                });
            }
        }
    }

    Ok(())
}

/// Run both checks; the shape check runs first so mutating SQL is always
/// reported as unsafe.
pub async fn validate<I: SchemaInspector + ?Sized>(
    sql: &str,
    inspector: &I,
    namespace: &str,
) -> NlSqlResult<()> {
    let scanned = scan(sql);
    check_scanned_shape(&scanned)?;
    check_scanned_conformance(&scanned, inspector, namespace).await
}
