//! Natural-language questions answered with validated, read-only SQL
//!
//! A question runs through a fixed pipeline:
//!
//! 1. resolve the dataset descriptor (DDL, rules, examples)
//! 2. build the prompt and ask the dataset's LLM client, temperature 0
//! 3. extract one statement from the free-form response
//! 4. validate its shape and its column references against the live schema
//! 5. execute it once and return the rows
//!
//! Every failure ends the pipeline and comes back as a structured error
//! result. The last SQL that executed successfully per dataset can then be
//! saved as a view.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nlsql::nl_sql::{QueryEngine, SqlDialect};
//!
//! let engine = QueryEngine::new(backend, SqlDialect::Sqlite, factory);
//! let result = engine.answer("List factories and their machines", 1).await;
//! let saved = engine.save_view("factory_machines", 1).await;
//! ```

pub mod client;
pub mod config;
pub mod datasets;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod extract;
pub mod prompt;
pub mod result;
pub mod safety;
pub mod session;
pub mod view;

pub use client::{LlmProvider, create_llm_client};
pub use config::{LlmConfig, LlmProviderType};
pub use datasets::{DatasetDescriptor, DatasetId, get_descriptor};
pub use dialect::SqlDialect;
pub use error::{NlSqlError, NlSqlResult};
pub use executor::Row;
pub use prompt::{ChatMessage, PromptGenerator};
pub use result::{QueryResult, SaveViewResult, Status};
pub use session::{ProviderFactory, SessionRegistry};

use crate::database::QueryBackend;
use crate::interaction_log::InteractionLog;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Orchestrates question answering and view materialization
pub struct QueryEngine {
    backend: Arc<dyn QueryBackend>,
    dialect: SqlDialect,
    sessions: SessionRegistry,
    temperature: f32,
    max_tokens: u32,
    interaction_log: Option<InteractionLog>,
}

impl QueryEngine {
    pub fn new(backend: Arc<dyn QueryBackend>, dialect: SqlDialect, factory: ProviderFactory) -> Self {
        let defaults = LlmConfig::default();
        Self {
            backend,
            dialect,
            sessions: SessionRegistry::new(factory),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            interaction_log: None,
        }
    }

    /// Generation parameters passed to every LLM call
    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_interaction_log(mut self, log: InteractionLog) -> Self {
        self.interaction_log = Some(log);
        self
    }

    /// Last SQL that executed successfully for a dataset
    pub fn last_sql(&self, dataset_id: i64) -> Option<String> {
        let descriptor = get_descriptor(dataset_id).ok()?;
        self.sessions.get(descriptor.id)?.last_sql()
    }

    /// Answer a question against a dataset. Never fails: errors are reported
    /// in the returned result.
    pub async fn answer(&self, question: &str, dataset_id: i64) -> QueryResult {
        info!(
            "[QueryEngine::answer] dataset {}: {}",
            dataset_id,
            question.trim()
        );

        let result = match self.run(question, dataset_id).await {
            Ok(result) => result,
            Err(error) => {
                warn!("[QueryEngine::answer] {} ({})", error, error.kind());
                QueryResult::error(&error)
            }
        };

        if let (Some(log), Ok(id)) = (&self.interaction_log, DatasetId::try_from(dataset_id)) {
            log.record(
                id.get(),
                question,
                serde_json::to_value(&result).unwrap_or_default(),
            );
        }

        result
    }

    async fn run(&self, question: &str, dataset_id: i64) -> NlSqlResult<QueryResult> {
        // Resolved before anything reaches the model
        let descriptor = get_descriptor(dataset_id)?;
        let session = self.sessions.get_or_create(descriptor)?;

        let gen_start = Instant::now();
        let messages = PromptGenerator::build(question, descriptor, self.dialect);
        let raw = {
            let _generation = session.lock_generation().await;
            debug!(
                "Calling {} for dataset {}",
                session.provider().name(),
                descriptor.id
            );
            session
                .provider()
                .complete(&messages, self.temperature, self.max_tokens)
                .await?
        };
        let sql = extract::extract(&raw)?;
        let gen_ms = elapsed_ms(gen_start);
        info!("Generated SQL in {:.1} ms: {}", gen_ms, sql);

        let exec_start = Instant::now();
        safety::validate(&sql, self.backend.as_ref(), self.backend.namespace())
            .await
            .inspect_err(|e| warn!("Rejected SQL {}: {}", sql, e))?;
        let rows = executor::execute(&sql, self.backend.as_ref())
            .await
            .inspect_err(|e| warn!("SQL failed {}: {}", sql, e))?;
        let exec_ms = elapsed_ms(exec_start);
        info!("Returned {} rows in {:.1} ms", rows.len(), exec_ms);

        session.set_last_sql(sql.clone());
        Ok(QueryResult::success(sql, rows, gen_ms, exec_ms))
    }

    /// Save the dataset's last successful SQL as a view. Never fails: errors
    /// are reported in the returned result.
    pub async fn save_view(&self, view_name: &str, dataset_id: i64) -> SaveViewResult {
        match self.materialize(view_name, dataset_id).await {
            Ok(name) => {
                info!("[QueryEngine::save_view] View {} saved", name);
                SaveViewResult::success(format!("View {name} saved."))
            }
            Err(e) => {
                warn!("[QueryEngine::save_view] {} ({})", e, e.kind());
                SaveViewResult::error(&e)
            }
        }
    }

    async fn materialize(&self, view_name: &str, dataset_id: i64) -> NlSqlResult<String> {
        let descriptor = get_descriptor(dataset_id)?;
        let last_sql = self
            .sessions
            .get(descriptor.id)
            .and_then(|session| session.last_sql())
            .ok_or(NlSqlError::NoPriorQuery(descriptor.id.get()))?;

        let name = view::sanitize_view_name(view_name)?;
        let statements =
            view::view_statements(self.dialect, self.backend.namespace(), &name, &last_sql)?;
        self.backend.execute_in_transaction(&statements).await?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_sqlite::tests::factory_backend;
    use crate::nl_sql::session::tests::ScriptedProvider;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        engine: QueryEngine,
        backend: Arc<dyn QueryBackend>,
        provider: Arc<ScriptedProvider>,
        built: Arc<AtomicUsize>,
    }

    async fn harness(responses: &[&str]) -> Harness {
        let backend: Arc<dyn QueryBackend> = Arc::new(factory_backend().await);
        let provider = Arc::new(ScriptedProvider::new(responses));
        let built = Arc::new(AtomicUsize::new(0));

        let shared = Arc::clone(&provider);
        let counter = Arc::clone(&built);
        let factory: ProviderFactory = Arc::new(move |_descriptor: &DatasetDescriptor| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&shared) as Arc<dyn LlmProvider>)
        });

        Harness {
            engine: QueryEngine::new(Arc::clone(&backend), SqlDialect::Sqlite, factory),
            backend,
            provider,
            built,
        }
    }

    #[tokio::test]
    async fn test_valid_query_returns_ordered_rows() {
        let h = harness(&["```sql\nSELECT M.Id, M.Definition FROM Machine M;\n```"]).await;

        let result = h.engine.answer("List machines", 1).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.sql.as_deref(), Some("SELECT M.Id, M.Definition FROM Machine M;"));
        let rows = result.rows.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["Id", "Definition"]);
        assert!(result.gen_ms.is_some());
        assert!(result.exec_ms.is_some());
        assert_eq!(
            h.engine.last_sql(1).as_deref(),
            Some("SELECT M.Id, M.Definition FROM Machine M;")
        );
    }

    #[tokio::test]
    async fn test_hallucinated_column_is_rejected_before_execution() {
        let h = harness(&[
            "```sql\nSELECT F.Name, M.Definition FROM Factory F JOIN Machine M ON M.UnitId = F.Id;\n```",
        ])
        .await;

        let result = h.engine.answer("List factories and their machines", 1).await;

        assert_eq!(result.status, Status::Error);
        assert_eq!(result.error_kind, Some("unknown_column"));
        assert!(result.error.unwrap().contains("Factory.Name"));
        assert!(result.rows.is_none());
        assert!(result.sql.is_none());
        assert_eq!(h.engine.last_sql(1), None);
    }

    #[tokio::test]
    async fn test_error_result_carries_only_status_and_error() {
        let h = harness(&["```sql\nSELECT F.Name FROM Factory F;\n```"]).await;

        let result = h.engine.answer("Factory names", 1).await;

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], json!("error"));
        assert_eq!(value["error_kind"], json!("unknown_column"));
        assert!(value.get("sql").is_none());
        assert!(value.get("rows").is_none());
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(-1)]
    #[tokio::test]
    async fn test_unsupported_dataset_never_reaches_the_model(#[case] dataset: i64) {
        let h = harness(&["SELECT 1;"]).await;

        let result = h.engine.answer("anything", dataset).await;

        assert_eq!(result.error_kind, Some("unsupported_dataset"));
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.built.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    #[case("I am not able to help with that.", "no_statement_found")]
    #[case("```sql\nDELETE FROM Machine;\n```", "unsafe_statement")]
    #[case("```sql\nSELECT M.Id FROM Machine M; DROP TABLE Machine;\n```", "unsafe_statement")]
    #[case("SELECT M.Id FROM Machine M WHERE M.Id = no_such_function(1);", "execution_error")]
    #[tokio::test]
    async fn test_failures_become_error_results(#[case] response: &str, #[case] kind: &str) {
        let h = harness(&[response]).await;

        let result = h.engine.answer("List machines", 1).await;

        assert_eq!(result.status, Status::Error);
        assert_eq!(result.error_kind, Some(kind));
        assert_eq!(h.engine.last_sql(1), None);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_error_result() {
        let h = harness(&[]).await;
        let result = h.engine.answer("List machines", 1).await;
        assert_eq!(result.error_kind, Some("provider_error"));
    }

    #[tokio::test]
    async fn test_prompt_carries_question_and_ddl() {
        let h = harness(&["SELECT 1;"]).await;

        h.engine.answer("How many machines are there?", 1).await;

        let seen = h.provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0][0].content.contains("SQLite"));
        assert!(seen[0][1].content.contains("How many machines are there?"));
        assert!(seen[0][1].content.contains(get_descriptor(1).unwrap().ddl));
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_build_one_client() {
        let h = harness(&["SELECT 1;", "SELECT 2;", "SELECT 3;", "SELECT 4;"]).await;
        let engine = Arc::new(h.engine);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.answer("Count", 2).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_success());
        }

        assert_eq!(h.built.load(Ordering::SeqCst), 1);
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_save_view_without_prior_query() {
        let h = harness(&[]).await;

        let result = h.engine.save_view("report", 1).await;

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "msg": "Run a query first."})
        );
    }

    #[tokio::test]
    async fn test_save_view_is_per_dataset() {
        let h = harness(&["SELECT M.Id FROM Machine M;"]).await;
        assert!(h.engine.answer("List machines", 1).await.is_success());

        let result = h.engine.save_view("report", 2).await;
        assert!(!result.is_success());
        assert_eq!(result.msg, "Run a query first.");
    }

    #[tokio::test]
    async fn test_save_view_materializes_last_query() {
        let h = harness(&["SELECT M.Id, M.Definition FROM Machine M ORDER BY M.Id DESC;"]).await;
        assert!(h.engine.answer("List machines", 1).await.is_success());

        let result = h.engine.save_view("machine list; DROP TABLE Machine; --", 1).await;

        assert!(result.is_success(), "{result:?}");
        assert!(result.msg.contains("machinelistDROPTABLEMachine"));
        let tables = h.backend.list_tables("main").await.unwrap();
        assert!(tables.contains(&"Machine".to_string()));
        let view = h
            .backend
            .fetch("SELECT Id FROM machinelistDROPTABLEMachine ORDER BY Id;")
            .await
            .unwrap();
        assert_eq!(view.rows, vec![vec![json!(10)], vec![json!(11)]]);
    }

    #[tokio::test]
    async fn test_save_view_replaces_existing_view() {
        let h = harness(&["SELECT M.Id FROM Machine M;", "SELECT F.Id FROM Factory F;"]).await;

        assert!(h.engine.answer("machines", 1).await.is_success());
        assert!(h.engine.save_view("ids", 1).await.is_success());
        assert!(h.engine.answer("factories", 1).await.is_success());
        assert!(h.engine.save_view("ids", 1).await.is_success());

        let view = h.backend.fetch("SELECT Id FROM ids ORDER BY Id;").await.unwrap();
        assert_eq!(view.rows, vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[tokio::test]
    async fn test_invalid_view_name() {
        let h = harness(&["SELECT M.Id FROM Machine M;"]).await;
        assert!(h.engine.answer("machines", 1).await.is_success());

        let result = h.engine.save_view("--;", 1).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_answers_are_logged() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("interactions.jsonl");
        let h = harness(&["SELECT M.Id FROM Machine M;"]).await;
        let engine = h.engine.with_interaction_log(InteractionLog::new(&path));

        engine.answer("List machines", 1).await;
        engine.answer("Unsupported", 9).await;

        let entries = InteractionLog::new(&path).recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].question, "List machines");
        assert_eq!(entries[0].response["status"], "success");
    }
}
