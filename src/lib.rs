pub mod cli;
pub mod config;
pub mod database; // Database capability traits
pub mod database_sqlite; // SQLite implementation
pub mod format;
pub mod interaction_log;
pub mod logging;
pub mod nl_sql;
pub mod shell;

pub use config::Config;
pub use nl_sql::{NlSqlError, NlSqlResult, QueryEngine, QueryResult, SaveViewResult};
