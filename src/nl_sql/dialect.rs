//! SQL dialects the generated queries and materialized views target
//!
//! The dialect decides how the model is addressed, which namespace holds the
//! queryable tables, how identifiers are quoted and how a view is created.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    SqlServer,
    Sqlite,
}

impl SqlDialect {
    /// Product name used when addressing the model
    pub fn dialect_name(&self) -> &'static str {
        match self {
            SqlDialect::SqlServer => "Microsoft SQL Server",
            SqlDialect::Sqlite => "SQLite",
        }
    }

    /// Namespace that holds user tables
    pub fn default_namespace(&self) -> &'static str {
        match self {
            SqlDialect::SqlServer => "dbo",
            SqlDialect::Sqlite => "main",
        }
    }

    /// Quote identifier (table name, view name) according to dialect rules
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            SqlDialect::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
            SqlDialect::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Statements that create or replace `namespace.name` with `body` as its query
    pub fn create_or_replace_view(&self, namespace: &str, name: &str, body: &str) -> Vec<String> {
        let qualified = format!(
            "{}.{}",
            self.quote_identifier(namespace),
            self.quote_identifier(name)
        );
        match self {
            SqlDialect::SqlServer => vec![format!("CREATE OR ALTER VIEW {qualified} AS {body}")],
            SqlDialect::Sqlite => vec![
                format!("DROP VIEW IF EXISTS {qualified}"),
                format!("CREATE VIEW {qualified} AS {body}"),
            ],
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect_name())
    }
}
