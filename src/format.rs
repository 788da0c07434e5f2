use crate::interaction_log::Interaction;
use crate::nl_sql::executor::Row as ResultRow;
use crate::nl_sql::{DatasetDescriptor, QueryResult, SaveViewResult};
use prettytable::format::consts::FORMAT_BOX_CHARS;
use prettytable::{Cell, Row, Table};
use serde_json::Value;

/// Text shown in a table cell for a JSON value
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One bordered table, header first
pub fn format_rows(rows: &[ResultRow]) -> String {
    let Some(first) = rows.first() else {
        return "(0 rows)\n".to_string();
    };

    let mut table = Table::new();
    table.set_format(*FORMAT_BOX_CHARS);
    table.set_titles(Row::new(first.columns().map(Cell::new).collect()));
    for row in rows {
        table.add_row(Row::new(
            row.values().map(|v| Cell::new(&cell_text(v))).collect(),
        ));
    }

    let noun = if rows.len() == 1 { "row" } else { "rows" };
    format!("{}({} {})\n", table, rows.len(), noun)
}

/// One two-column table per record
pub fn format_rows_expanded(rows: &[ResultRow]) -> String {
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new(&format!("Record {}", i + 1)),
            Cell::new(""),
        ]));
        for (column, value) in row.columns().zip(row.values()) {
            table.add_row(Row::new(vec![Cell::new(column), Cell::new(&cell_text(value))]));
        }
        out.push_str(&table.to_string());
    }
    out
}

/// Human-readable rendering of a query result
pub fn format_query_result(result: &QueryResult, expanded: bool) -> String {
    let mut out = String::new();
    if let Some(sql) = &result.sql {
        out.push_str(&format!("SQL: {sql}\n"));
    }

    if let Some(error) = &result.error {
        out.push_str(&format!("Error: {error}\n"));
        return out;
    }

    let rows = result.rows.as_deref().unwrap_or_default();
    if expanded {
        out.push_str(&format_rows_expanded(rows));
    } else {
        out.push_str(&format_rows(rows));
    }

    if let (Some(gen_ms), Some(exec_ms)) = (result.gen_ms, result.exec_ms) {
        out.push_str(&format!("Generation: {gen_ms:.1} ms, execution: {exec_ms:.1} ms\n"));
    }
    out
}

pub fn format_save_view_result(result: &SaveViewResult) -> String {
    if result.is_success() {
        format!("{}\n", result.msg)
    } else {
        format!("Error: {}\n", result.msg)
    }
}

pub fn format_datasets(descriptors: &[DatasetDescriptor]) -> String {
    let mut table = Table::new();
    table.set_format(*FORMAT_BOX_CHARS);
    table.set_titles(Row::new(vec![Cell::new("Id"), Cell::new("Dataset")]));
    for descriptor in descriptors {
        table.add_row(Row::new(vec![
            Cell::new(&descriptor.id.to_string()),
            Cell::new(descriptor.name),
        ]));
    }
    table.to_string()
}

pub fn format_interactions(entries: &[Interaction]) -> String {
    if entries.is_empty() {
        return "No interactions logged yet.\n".to_string();
    }

    let mut table = Table::new();
    table.set_format(*FORMAT_BOX_CHARS);
    table.set_titles(Row::new(vec![
        Cell::new("Time"),
        Cell::new("Dataset"),
        Cell::new("Question"),
        Cell::new("Status"),
        Cell::new("SQL"),
    ]));
    for entry in entries {
        let field = |name: &str| entry.response.get(name).map(cell_text).unwrap_or_default();
        table.add_row(Row::new(vec![
            Cell::new(&entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(&entry.dataset.to_string()),
            Cell::new(&entry.question),
            Cell::new(&field("status")),
            Cell::new(&field("sql")),
        ]));
    }
    table.to_string()
}
