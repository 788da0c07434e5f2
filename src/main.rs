use clap::Parser;
use nlsql::cli::{Args, Command};
use nlsql::config::Config;
use nlsql::database;
use nlsql::format::{
    format_datasets, format_interactions, format_query_result, format_save_view_result,
};
use nlsql::interaction_log::InteractionLog;
use nlsql::logging;
use nlsql::nl_sql::datasets::all_descriptors;
use nlsql::nl_sql::{DatasetDescriptor, ProviderFactory, QueryEngine, create_llm_client};
use nlsql::shell::run_shell;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::debug;

async fn build_engine(args: &Args, config: &Config) -> Result<QueryEngine, Box<dyn StdError>> {
    let url = args
        .database_url
        .clone()
        .unwrap_or_else(|| config.database.connection_url());
    let namespace = config.database.namespace();
    debug!("Connecting to {} (namespace {})", url, namespace);
    let backend = database::connect(&url, &namespace, config.database.max_connections).await?;

    // Clients are built on a dataset's first question, so commands that never
    // reach the model run without credentials
    let llm = config.llm.clone();
    let factory: ProviderFactory =
        Arc::new(move |_descriptor: &DatasetDescriptor| create_llm_client(&llm));

    let mut engine = QueryEngine::new(Arc::from(backend), config.database.dialect, factory)
        .with_generation(config.llm.temperature, config.llm.max_tokens);
    if config.interaction_log.enabled {
        engine = engine.with_interaction_log(InteractionLog::new(config.interaction_log.log_path()));
    }
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    logging::init(&config.logging);
    debug!("Parsed args: {:?}", args);

    match &args.command {
        Command::Ask {
            dataset,
            json,
            expanded,
            save_view,
            question,
        } => {
            let engine = build_engine(&args, &config).await?;
            let result = engine.answer(&question.join(" "), *dataset).await;
            let mut succeeded = result.is_success();

            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", format_query_result(&result, *expanded));
            }

            if let (Some(name), true) = (save_view, succeeded) {
                let saved = engine.save_view(name, *dataset).await;
                succeeded = saved.is_success();
                if *json {
                    println!("{}", serde_json::to_string_pretty(&saved)?);
                } else {
                    print!("{}", format_save_view_result(&saved));
                }
            }

            if !succeeded {
                std::process::exit(1);
            }
        }
        Command::Datasets => {
            print!("{}", format_datasets(all_descriptors()));
        }
        Command::Logs { limit } => {
            let log = InteractionLog::new(config.interaction_log.log_path());
            let entries = log.recent(*limit)?;
            print!("{}", format_interactions(&entries));
        }
        Command::Shell { dataset } => {
            let engine = build_engine(&args, &config).await?;
            run_shell(&engine, *dataset).await?;
        }
    }

    Ok(())
}
