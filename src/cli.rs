use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nlsql - answer questions about plant data with validated, read-only SQL
#[derive(Parser, Debug, Clone)]
#[command(name = "nlsql")]
#[command(version, long_about = None)]
#[command(about = "Answer natural-language questions with validated, read-only SQL")]
pub struct Args {
    /// Config file (default: ~/.config/nlsql/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database connection URL, overrides the config file
    ///
    /// Example: sqlite:///path/to/entegre_veritabani.db
    #[arg(long, global = true, value_name = "URL", env = "NLSQL_DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ask one question and print the result
    Ask {
        /// Dataset to query (1 factory, 2 raw material, 3 line performance)
        #[arg(short, long, default_value_t = 1)]
        dataset: i64,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// One record per table
        #[arg(short = 'x', long)]
        expanded: bool,

        /// Save the query as a view with this name when it succeeds
        #[arg(long, value_name = "NAME")]
        save_view: Option<String>,

        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List supported datasets
    Datasets,

    /// Show recent interactions
    Logs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Interactive question loop
    Shell {
        #[arg(short, long, default_value_t = 1)]
        dataset: i64,
    },
}
