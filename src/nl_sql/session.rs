//! Per-dataset session state
//!
//! Each dataset gets one lazily created session holding its generation client
//! and the last SQL that executed successfully for it.

use crate::nl_sql::client::LlmProvider;
use crate::nl_sql::datasets::{DatasetDescriptor, DatasetId};
use crate::nl_sql::error::NlSqlResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Builds the generation client for a dataset
pub type ProviderFactory =
    Arc<dyn Fn(&DatasetDescriptor) -> NlSqlResult<Arc<dyn LlmProvider>> + Send + Sync>;

/// State shared by every request against one dataset
pub struct DatasetSession {
    provider: Arc<dyn LlmProvider>,
    last_sql: Mutex<Option<String>>,
    /// Held across one generation call
    generation: tokio::sync::Mutex<()>,
}

impl DatasetSession {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            last_sql: Mutex::new(None),
            generation: tokio::sync::Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Serializes generation calls on this dataset's client
    pub async fn lock_generation(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.generation.lock().await
    }

    pub fn last_sql(&self) -> Option<String> {
        lock(&self.last_sql).clone()
    }

    pub fn set_last_sql(&self, sql: String) {
        *lock(&self.last_sql) = Some(sql);
    }
}

/// The guarded values stay consistent even if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lazily created sessions, at most one per dataset
pub struct SessionRegistry {
    factory: ProviderFactory,
    sessions: Mutex<HashMap<DatasetId, Arc<DatasetSession>>>,
}

impl SessionRegistry {
    pub fn new(factory: ProviderFactory) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Session for `descriptor`, building it on first use.
    ///
    /// Construction happens under the registry lock, so concurrent first
    /// requests for one dataset build its client exactly once. A failed
    /// construction leaves no entry behind.
    pub fn get_or_create(
        &self,
        descriptor: &'static DatasetDescriptor,
    ) -> NlSqlResult<Arc<DatasetSession>> {
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.get(&descriptor.id) {
            return Ok(Arc::clone(session));
        }

        debug!("Creating generation client for dataset {}", descriptor.id);
        let provider = (self.factory)(descriptor)?;
        let session = Arc::new(DatasetSession::new(provider));
        sessions.insert(descriptor.id, Arc::clone(&session));
        Ok(session)
    }

    /// Existing session without creating one
    pub fn get(&self, id: DatasetId) -> Option<Arc<DatasetSession>> {
        lock(&self.sessions).get(&id).cloned()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::nl_sql::datasets::descriptor;
    use crate::nl_sql::error::NlSqlError;
    use crate::nl_sql::prompt::ChatMessage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that replays canned responses and counts calls
    pub(crate) struct ScriptedProvider {
        responses: Mutex<VecDeque<String>>,
        pub(crate) calls: AtomicUsize,
        pub(crate) seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: u32,
        ) -> NlSqlResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| NlSqlError::ProviderError("script exhausted".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn counting_factory(built: Arc<AtomicUsize>) -> ProviderFactory {
        Arc::new(move |_descriptor: &DatasetDescriptor| {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedProvider::new(&[])) as Arc<dyn LlmProvider>)
        })
    }

    #[test]
    fn test_session_is_reused() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = SessionRegistry::new(counting_factory(Arc::clone(&built)));
        let factory = descriptor(DatasetId::FACTORY);

        let first = registry.get_or_create(factory).unwrap();
        let second = registry.get_or_create(factory).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(registry.get(DatasetId::RAW_MATERIAL).is_none());
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(SessionRegistry::new(counting_factory(Arc::clone(&built))));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .get_or_create(descriptor(DatasetId::LINE_PERFORMANCE))
                        .unwrap()
                })
            })
            .collect();
        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_construction_is_retried_next_time() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let factory: ProviderFactory = Arc::new(move |_descriptor: &DatasetDescriptor| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(NlSqlError::ConfigurationError("missing key".to_string()))
            } else {
                Ok(Arc::new(ScriptedProvider::new(&[])) as Arc<dyn LlmProvider>)
            }
        });
        let registry = SessionRegistry::new(factory);

        assert!(registry.get_or_create(descriptor(DatasetId::FACTORY)).is_err());
        assert!(registry.get_or_create(descriptor(DatasetId::FACTORY)).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_last_sql_per_session() {
        let registry = SessionRegistry::new(counting_factory(Arc::new(AtomicUsize::new(0))));
        let one = registry.get_or_create(descriptor(DatasetId::FACTORY)).unwrap();
        let two = registry.get_or_create(descriptor(DatasetId::RAW_MATERIAL)).unwrap();

        one.set_last_sql("SELECT 1;".to_string());

        assert_eq!(one.last_sql().as_deref(), Some("SELECT 1;"));
        assert_eq!(two.last_sql(), None);
    }
}
