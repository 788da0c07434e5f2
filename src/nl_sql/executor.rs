//! Execution of validated statements

use crate::database::{QueryBackend, ResultSet};
use crate::nl_sql::error::NlSqlResult;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::debug;

/// One result row: column name to value, in the column order of the result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Value of the first column with this name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Pair every row of a result set with its column names
pub fn rows_from_result_set(result: ResultSet) -> Vec<Row> {
    let ResultSet { columns, rows } = result;
    rows.into_iter()
        .map(|values| Row::new(columns.iter().cloned().zip(values).collect()))
        .collect()
}

/// Execute a statement once and return its rows. No retries.
pub async fn execute(sql: &str, backend: &dyn QueryBackend) -> NlSqlResult<Vec<Row>> {
    let result = backend.fetch(sql).await?;
    debug!(
        "Statement returned {} rows over {} columns",
        result.rows.len(),
        result.columns.len()
    );
    Ok(rows_from_result_set(result))
}
