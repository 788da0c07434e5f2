//! Database capability used by the query pipeline
//!
//! The pipeline needs three things from a database: schema introspection for the
//! column-conformance check, single-statement execution for validated queries, and
//! a transactional path for view materialization. Backends implement the traits
//! below; `database_sqlite` provides the sqlx-backed implementation.
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    SQLite,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

impl DatabaseType {
    /// Resolve the engine from a connection URL scheme
    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        let parsed = Url::parse(url)
            .map_err(|e| DatabaseError::ConnectionError(format!("Invalid database URL: {e}")))?;
        match parsed.scheme() {
            "sqlite" => Ok(DatabaseType::SQLite),
            other => Err(DatabaseError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Metadata error: {0}")]
    MetadataError(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

/// Column names and row values exactly as the database returned them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Live schema introspection
#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// List table and view names in a namespace
    async fn list_tables(&self, namespace: &str) -> Result<Vec<String>, DatabaseError>;

    /// List column names of a table in a namespace
    async fn list_columns(&self, table: &str, namespace: &str)
    -> Result<Vec<String>, DatabaseError>;
}

/// Statement execution on top of introspection
#[async_trait]
pub trait QueryBackend: SchemaInspector {
    /// Execute one statement read-only and collect its result set
    async fn fetch(&self, sql: &str) -> Result<ResultSet, DatabaseError>;

    /// Execute statements in order inside a single transaction
    async fn execute_in_transaction(&self, statements: &[String]) -> Result<(), DatabaseError>;

    /// Namespace that holds the queryable tables (`dbo`, `main`, ...)
    fn namespace(&self) -> &str;
}

/// Create a backend for a connection URL
pub async fn connect(
    url: &str,
    namespace: &str,
    max_connections: u32,
) -> Result<Box<dyn QueryBackend>, DatabaseError> {
    let database_type = DatabaseType::from_url(url)?;
    debug!("[database::connect] Opening {} backend", database_type);
    match database_type {
        DatabaseType::SQLite => {
            let backend =
                crate::database_sqlite::SqliteBackend::connect(url, namespace, max_connections)
                    .await?;
            Ok(Box::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sqlite://data.db")]
    #[case("sqlite::memory:")]
    #[case("SQLITE://upper.db")]
    fn test_sqlite_urls_resolve(#[case] url: &str) {
        assert_eq!(DatabaseType::from_url(url).unwrap(), DatabaseType::SQLite);
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let err = DatabaseType::from_url("mssql://host/db").unwrap_err();
        assert!(matches!(err, DatabaseError::UnsupportedScheme(s) if s == "mssql"));
    }
}
