//! SQLite implementation of the database capability
use crate::database::{DatabaseError, QueryBackend, ResultSet, SchemaInspector};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};
use tracing::{debug, warn};

/// SQLite backend over a sqlx pool
pub struct SqliteBackend {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteBackend {
    pub async fn connect(
        url: &str,
        namespace: &str,
        max_connections: u32,
    ) -> Result<Self, DatabaseError> {
        debug!("[SqliteBackend::connect] Connecting to: {}", url);

        // An in-memory database lives only as long as its single connection
        let in_memory = url.contains(":memory:");
        let mut options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(10));
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = options
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self::from_pool(pool, namespace))
    }

    pub fn from_pool(pool: SqlitePool, namespace: &str) -> Self {
        Self {
            pool,
            namespace: namespace.to_string(),
        }
    }

    async fn fetch_on(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
    ) -> Result<ResultSet, DatabaseError> {
        let rows = sqlx::query(sql).fetch_all(&mut **conn).await?;

        let columns: Vec<String> = match rows.first() {
            Some(first) => first
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            // No rows to read names from, ask the prepared statement instead
            None => (&mut **conn)
                .describe(sql)
                .await?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..row.len() {
                record.push(sqlite_value(row, index)?);
            }
            values.push(record);
        }

        Ok(ResultSet {
            columns,
            rows: values,
        })
    }
}

#[async_trait]
impl SchemaInspector for SqliteBackend {
    async fn list_tables(&self, namespace: &str) -> Result<Vec<String>, DatabaseError> {
        debug!("[SqliteBackend::list_tables] namespace: {}", namespace);

        let query = format!(
            r#"
            SELECT name
            FROM {}.sqlite_master
            WHERE type IN ('table', 'view')
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
            quote_identifier(namespace)
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        let tables: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()?;

        debug!("[SqliteBackend::list_tables] Found {} tables", tables.len());
        Ok(tables)
    }

    async fn list_columns(
        &self,
        table: &str,
        namespace: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        debug!(
            "[SqliteBackend::list_columns] table: '{}', namespace: {}",
            table, namespace
        );

        let rows = sqlx::query("SELECT name FROM pragma_table_info(?1, ?2) ORDER BY cid")
            .bind(table)
            .bind(namespace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        let columns = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    async fn fetch(&self, sql: &str) -> Result<ResultSet, DatabaseError> {
        debug!("[SqliteBackend::fetch] Executing query");

        let mut conn = self.pool.acquire().await?;
        sqlx::query("PRAGMA query_only = ON")
            .execute(&mut *conn)
            .await?;

        let outcome = Self::fetch_on(&mut conn, sql).await;

        if let Err(e) = sqlx::query("PRAGMA query_only = OFF")
            .execute(&mut *conn)
            .await
        {
            warn!("Could not reset query_only, discarding connection: {}", e);
            conn.close_on_drop();
        }

        let result = outcome?;
        debug!(
            "[SqliteBackend::fetch] Query completed with {} rows",
            result.rows.len()
        );
        Ok(result)
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for statement in statements {
            debug!("[SqliteBackend::execute_in_transaction] {}", statement);
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Convert a SQLite value to JSON, following the storage class of the value
fn sqlite_value(row: &SqliteRow, index: usize) -> Result<Value, DatabaseError> {
    let storage_class = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };

    match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => Ok(Value::from(row.try_get::<i64, _>(index)?)),
        "REAL" => Ok(float_value(row.try_get::<f64, _>(index)?)),
        "BLOB" => Ok(Value::String(hex::encode(
            row.try_get::<Vec<u8>, _>(index)?,
        ))),
        "TEXT" => Ok(Value::String(row.try_get::<String, _>(index)?)),
        _ => {
            if let Ok(val) = row.try_get::<i64, _>(index) {
                return Ok(Value::from(val));
            }
            if let Ok(val) = row.try_get::<f64, _>(index) {
                return Ok(float_value(val));
            }
            if let Ok(val) = row.try_get::<String, _>(index) {
                return Ok(Value::String(val));
            }
            Err(DatabaseError::QueryError(format!(
                "Unable to convert SQLite {storage_class} value at column {index}"
            )))
        }
    }
}

fn float_value(val: f64) -> Value {
    serde_json::Number::from_f64(val)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
