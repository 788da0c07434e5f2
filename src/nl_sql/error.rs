//! Error types for the natural-language query pipeline

use crate::database::DatabaseError;
use thiserror::Error;

/// Result type for pipeline operations
pub type NlSqlResult<T> = Result<T, NlSqlError>;

/// Errors that can occur while answering a question or saving a view
#[derive(Error, Debug)]
pub enum NlSqlError {
    #[error("Model response contained no SQL statement: {0}")]
    NoStatementFound(String),

    #[error("Unsafe statement: {0}")]
    UnsafeStatement(String),

    #[error("Unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("Execution error: {0}")]
    ExecutionError(#[from] DatabaseError),

    #[error("No query has been run for dataset {0} yet")]
    NoPriorQuery(u8),

    #[error("Unsupported dataset: {0}")]
    UnsupportedDataset(i64),

    #[error("Schema introspection error: {0}")]
    SchemaError(String),

    #[error("Invalid view name: {0:?}")]
    InvalidViewName(String),

    #[error("LLM provider error: {0}")]
    ProviderError(String),

    #[error("API error: {status_code} - {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl NlSqlError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            NlSqlError::NoStatementFound(excerpt) => {
                format!("The model did not return a SELECT statement:\n{excerpt}")
            }
            NlSqlError::UnsafeStatement(reason) => {
                format!("Only single SELECT statements are allowed ({reason}); the SQL was not executed.")
            }
            NlSqlError::UnknownColumn { table, column } => format!(
                "The model produced a column that does not exist ({table}.{column}); the SQL was not executed."
            ),
            NlSqlError::ExecutionError(e) => format!("The database rejected the query: {e}"),
            NlSqlError::NoPriorQuery(_) => "Run a query first.".to_string(),
            NlSqlError::UnsupportedDataset(id) => {
                format!("Dataset {id} is not supported; choose 1, 2 or 3.")
            }
            NlSqlError::InvalidViewName(name) => format!(
                "View name {name:?} has no letters, digits or underscores left after sanitizing."
            ),
            NlSqlError::ConfigurationError(msg) => {
                format!("Configuration issue: {msg}. Check your config file or environment variables.")
            }
            NlSqlError::NetworkError(msg) => {
                format!("Network error: {msg}. Check the LLM endpoint.")
            }
            _ => self.to_string(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            NlSqlError::NoStatementFound(_) => "no_statement_found",
            NlSqlError::UnsafeStatement(_) => "unsafe_statement",
            NlSqlError::UnknownColumn { .. } => "unknown_column",
            NlSqlError::ExecutionError(_) => "execution_error",
            NlSqlError::NoPriorQuery(_) => "no_prior_query",
            NlSqlError::UnsupportedDataset(_) => "unsupported_dataset",
            NlSqlError::SchemaError(_) => "schema_error",
            NlSqlError::InvalidViewName(_) => "invalid_view_name",
            NlSqlError::ProviderError(_)
            | NlSqlError::ApiError { .. }
            | NlSqlError::NetworkError(_) => "provider_error",
            NlSqlError::ConfigurationError(_) => "configuration_error",
        }
    }
}
