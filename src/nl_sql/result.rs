//! Structured results returned to callers

use crate::nl_sql::error::NlSqlError;
use crate::nl_sql::executor::Row;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Outcome of answering one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    /// Generation time in milliseconds, one decimal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gen_ms: Option<f64>,
    /// Validation plus execution time in milliseconds, one decimal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error kind, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl QueryResult {
    pub fn success(sql: String, rows: Vec<Row>, gen_ms: f64, exec_ms: f64) -> Self {
        Self {
            status: Status::Success,
            sql: Some(sql),
            rows: Some(rows),
            gen_ms: Some(round_ms(gen_ms)),
            exec_ms: Some(round_ms(exec_ms)),
            error: None,
            error_kind: None,
        }
    }

    pub fn error(err: &NlSqlError) -> Self {
        Self {
            status: Status::Error,
            sql: None,
            rows: None,
            gen_ms: None,
            exec_ms: None,
            error: Some(err.user_message()),
            error_kind: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Outcome of saving a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveViewResult {
    pub status: Status,
    pub msg: String,
}

impl SaveViewResult {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            msg: msg.into(),
        }
    }

    pub fn error(err: &NlSqlError) -> Self {
        Self {
            status: Status::Error,
            msg: err.user_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Round to one decimal place
pub fn round_ms(ms: f64) -> f64 {
    (ms * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let row = Row::new(vec![("Id".to_string(), json!(1))]);
        let result = QueryResult::success("SELECT 1;".to_string(), vec![row], 12.345, 0.04);

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "success",
                "sql": "SELECT 1;",
                "rows": [{"Id": 1}],
                "gen_ms": 12.3,
                "exec_ms": 0.0
            })
        );
    }

    #[test]
    fn test_error_shape() {
        let result = QueryResult::error(&NlSqlError::UnsupportedDataset(7));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["error_kind"], "unsupported_dataset");
        assert!(value["error"].as_str().unwrap().contains("Dataset 7"));
        assert!(value.get("rows").is_none());
        assert!(value.get("sql").is_none());
    }

    #[test]
    fn test_save_view_error_message() {
        let result = SaveViewResult::error(&NlSqlError::NoPriorQuery(1));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "msg": "Run a query first."})
        );
    }
}
