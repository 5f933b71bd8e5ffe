//! Session layer — load, stitch and persist per-user context.
//!
//! The [`ContextStitcher`] is plain state; this module wires it to a
//! [`StateStore`] and an optional generation [`Provider`]. Every mutating
//! operation holds a per-key async lock for its whole load → mutate → save
//! sequence, so two requests for the same user never interleave while
//! different users proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use tutorstitch_config::{AppConfig, GenerationConfig};
use tutorstitch_core::error::{Error, Result};
use tutorstitch_core::provider::{Provider, ProviderRequest};
use tutorstitch_core::state::ContextState;
use tutorstitch_core::store::{StateStore, validate_key};

use crate::stitcher::{ContextStitcher, StitcherSettings, SummaryEvent};

/// Lock table size above which idle entries are dropped.
const LOCK_TABLE_SWEEP: usize = 10_000;

/// Location and stage for users seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserDefaults {
    pub location: String,
    pub stage: u32,
}

impl Default for NewUserDefaults {
    fn default() -> Self {
        Self {
            location: "Erode".into(),
            stage: 14,
        }
    }
}

/// Model parameters for generation calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
        }
    }
}

/// One incoming message.
#[derive(Debug, Clone)]
pub struct StitchRequest {
    pub user_key: String,
    pub message: String,
    /// Only used when the user has no stored record yet.
    pub location: Option<String>,
    /// Only used when the user has no stored record yet. `u32::MAX` is
    /// rejected since it leaves no stage to advance to.
    pub stage: Option<u32>,
}

impl StitchRequest {
    pub fn new(user_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_key: user_key.into(),
            message: message.into(),
            location: None,
            stage: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_stage(mut self, stage: u32) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// Result of [`SessionManager::stitch`].
#[derive(Debug, Clone, Serialize)]
pub struct StitchReply {
    pub prompt: String,
    pub summarized: Option<SummaryEvent>,
    /// The state as persisted after this call.
    pub state: ContextState,
    /// Whether this call created the user's record.
    pub created: bool,
}

/// Result of [`SessionManager::respond`].
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub stitched: StitchReply,
    /// Model output, when a provider is attached and the call succeeded.
    pub completion: Option<String>,
    /// Provider failure message, when the call failed.
    pub error: Option<String>,
}

/// Coordinates stitchers, storage and generation.
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    settings: StitcherSettings,
    defaults: NewUserDefaults,
    generation: Option<(Arc<dyn Provider>, GenerationSettings)>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        settings: StitcherSettings,
        defaults: NewUserDefaults,
    ) -> Self {
        Self {
            store,
            settings,
            defaults,
            generation: None,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Build from the application config. The provider is attached
    /// separately with [`with_provider`](Self::with_provider).
    pub fn from_config(config: &AppConfig, store: Arc<dyn StateStore>) -> Self {
        Self::new(
            store,
            StitcherSettings::from_config(config),
            NewUserDefaults {
                location: config.stitcher.default_location.clone(),
                stage: config.stitcher.default_stage,
            },
        )
    }

    pub fn with_provider(
        mut self,
        provider: Arc<dyn Provider>,
        settings: GenerationSettings,
    ) -> Self {
        self.generation = Some((provider, settings));
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn settings(&self) -> &StitcherSettings {
        &self.settings
    }

    pub fn has_provider(&self) -> bool {
        self.generation.is_some()
    }

    fn lock_for(&self, user_key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.len() > LOCK_TABLE_SWEEP {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry(user_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load the stored stitcher for a user, or create one.
    async fn load(
        &self,
        user_key: &str,
        location: Option<&str>,
        stage: Option<u32>,
    ) -> Result<(ContextStitcher, bool)> {
        let (state, created) = match self.store.get(user_key).await? {
            Some(state) => (state, false),
            None => {
                let state = ContextState::new(
                    user_key,
                    location.unwrap_or(self.defaults.location.as_str()),
                    stage.unwrap_or(self.defaults.stage),
                );
                debug!(
                    user = user_key,
                    location = %state.location,
                    stage = state.current_stage,
                    "New user state"
                );
                (state, true)
            }
        };
        Ok((ContextStitcher::restore(state, self.settings.clone()), created))
    }

    /// Stitch one message into the user's context and persist the result.
    pub async fn stitch(&self, request: StitchRequest) -> Result<StitchReply> {
        validate_key(&request.user_key)?;
        if let Some(stage) = request.stage.filter(|s| *s == u32::MAX) {
            return Err(Error::StageOutOfRange { stage });
        }
        let lock = self.lock_for(&request.user_key);
        let _guard = lock.lock().await;

        let (mut stitcher, created) = self
            .load(&request.user_key, request.location.as_deref(), request.stage)
            .await?;
        let stitched = stitcher.stitch_detailed(&request.message);
        let state = stitcher.into_state();
        self.store.put(&request.user_key, &state).await?;

        Ok(StitchReply {
            prompt: stitched.prompt,
            summarized: stitched.summarized,
            state,
            created,
        })
    }

    /// Stitch, persist, then ask the provider (if any) for a completion.
    ///
    /// Provider failures never fail the call: the state is already saved
    /// and the error is returned alongside the prompt.
    pub async fn respond(&self, request: StitchRequest) -> Result<ChatReply> {
        let stitched = self.stitch(request).await?;

        let Some((provider, gen_settings)) = &self.generation else {
            return Ok(ChatReply {
                stitched,
                completion: None,
                error: None,
            });
        };

        let mut provider_request =
            ProviderRequest::from_prompt(gen_settings.model.clone(), stitched.prompt.clone());
        provider_request.temperature = gen_settings.temperature;
        provider_request.max_tokens = gen_settings.max_tokens;

        match provider.complete(provider_request).await {
            Ok(response) => {
                debug!(
                    user = %stitched.state.user_key,
                    provider = provider.name(),
                    model = %response.model,
                    "Completion received"
                );
                Ok(ChatReply {
                    stitched,
                    completion: Some(response.content),
                    error: None,
                })
            }
            Err(e) => {
                warn!(
                    user = %stitched.state.user_key,
                    provider = provider.name(),
                    error = %e,
                    "Generation failed, returning prompt only"
                );
                Ok(ChatReply {
                    stitched,
                    completion: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Record a milestone and move the user to the next stage.
    pub async fn advance_stage(
        &self,
        user_key: &str,
        milestone: &str,
    ) -> Result<ContextState> {
        validate_key(user_key)?;
        let lock = self.lock_for(user_key);
        let _guard = lock.lock().await;

        let (mut stitcher, _) = self.load(user_key, None, None).await?;
        stitcher.advance_stage(milestone)?;
        let state = stitcher.into_state();
        self.store.put(user_key, &state).await?;
        Ok(state)
    }

    /// The stored state for a user, if any.
    pub async fn state(&self, user_key: &str) -> Result<Option<ContextState>> {
        validate_key(user_key)?;
        Ok(self.store.get(user_key).await?)
    }

    /// Delete a user's state. Returns whether a record existed.
    pub async fn reset(&self, user_key: &str) -> Result<bool> {
        validate_key(user_key)?;
        let lock = self.lock_for(user_key);
        let _guard = lock.lock().await;
        Ok(self.store.delete(user_key).await?)
    }

    /// Every user with a stored record, sorted.
    pub async fn users(&self) -> Result<Vec<String>> {
        Ok(self.store.keys().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tutorstitch_core::error::{ProviderError, StoreError};
    use tutorstitch_core::provider::ProviderResponse;
    use tutorstitch_memory::InMemoryStore;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                content: format!("{} chars", request.prompt.len()),
                usage: None,
                model: request.model,
            })
        }
    }

    struct DownProvider;

    #[async_trait]
    impl Provider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(InMemoryStore::new()),
            StitcherSettings::default(),
            NewUserDefaults::default(),
        )
    }

    fn gen_settings() -> GenerationSettings {
        GenerationSettings {
            model: "test-model".into(),
            temperature: 0.2,
            max_tokens: Some(64),
        }
    }

    #[tokio::test]
    async fn first_message_creates_user_with_defaults() {
        let mgr = manager();
        let reply = mgr.stitch(StitchRequest::new("student_018", "hello")).await.unwrap();
        assert!(reply.created);
        assert_eq!(reply.state.location, "Erode");
        assert_eq!(reply.state.current_stage, 14);
        assert_eq!(reply.state.interaction_count, 1);
        assert!(reply.prompt.contains("### [QUERY]\nhello\n"));

        let stored = mgr.state("student_018").await.unwrap().unwrap();
        assert_eq!(stored, reply.state);
    }

    #[tokio::test]
    async fn request_seed_applies_only_to_new_users() {
        let mgr = manager();
        let first = StitchRequest::new("s", "a").with_location("Chennai").with_stage(20);
        let reply = mgr.stitch(first).await.unwrap();
        assert_eq!(reply.state.location, "Chennai");
        assert_eq!(reply.state.current_stage, 20);

        let second = StitchRequest::new("s", "b").with_location("Tuticorin").with_stage(2);
        let reply = mgr.stitch(second).await.unwrap();
        assert!(!reply.created);
        assert_eq!(reply.state.location, "Chennai");
        assert_eq!(reply.state.current_stage, 20);
        assert_eq!(reply.state.interaction_count, 2);
    }

    #[tokio::test]
    async fn state_survives_across_calls_and_triggers() {
        let mgr = manager();
        let mut events = 0;
        for i in 1..=5 {
            let reply = mgr.stitch(StitchRequest::new("s", format!("Q{i}"))).await.unwrap();
            if reply.summarized.is_some() {
                events += 1;
            }
        }
        assert_eq!(events, 1);
        let state = mgr.state("s").await.unwrap().unwrap();
        assert_eq!(state.interaction_count, 0);
        assert!(state.episodic_buffer.is_empty());
        assert_eq!(state.summary, "Recent focus: Student: Q5...");
    }

    #[tokio::test]
    async fn advance_stage_persists() {
        let mgr = manager();
        mgr.stitch(StitchRequest::new("s", "hi").with_stage(3)).await.unwrap();
        let state = mgr.advance_stage("s", "Problem identification completed").await.unwrap();
        assert_eq!(state.current_stage, 4);
        assert_eq!(state.completed_milestones[0].stage, 3);
        assert_eq!(mgr.state("s").await.unwrap().unwrap().current_stage, 4);
    }

    #[tokio::test]
    async fn advance_for_unknown_user_starts_from_defaults() {
        let mgr = manager();
        let state = mgr.advance_stage("new", "kickoff").await.unwrap();
        assert_eq!(state.current_stage, 15);
        assert_eq!(state.location, "Erode");
    }

    #[tokio::test]
    async fn seed_without_room_to_advance_is_rejected() {
        let mgr = manager();
        let err = mgr
            .stitch(StitchRequest::new("s", "hi").with_stage(u32::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StageOutOfRange { stage: u32::MAX }));
        assert!(mgr.state("s").await.unwrap().is_none());

        mgr.stitch(StitchRequest::new("s", "hi").with_stage(u32::MAX - 1))
            .await
            .unwrap();
        let state = mgr.advance_stage("s", "last").await.unwrap();
        assert_eq!(state.current_stage, u32::MAX);

        let err = mgr.advance_stage("s", "beyond").await.unwrap_err();
        assert!(err.is_client_error());
        let stored = mgr.state("s").await.unwrap().unwrap();
        assert_eq!(stored.current_stage, u32::MAX);
        assert_eq!(stored.completed_milestones.len(), 1);
    }

    #[tokio::test]
    async fn reset_and_users() {
        let mgr = manager();
        mgr.stitch(StitchRequest::new("b", "x")).await.unwrap();
        mgr.stitch(StitchRequest::new("a", "x")).await.unwrap();
        assert_eq!(mgr.users().await.unwrap(), vec!["a", "b"]);

        assert!(mgr.reset("a").await.unwrap());
        assert!(!mgr.reset("a").await.unwrap());
        assert_eq!(mgr.users().await.unwrap(), vec!["b"]);
        assert!(mgr.state("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_keys_are_rejected() {
        let mgr = manager();
        let err = mgr.stitch(StitchRequest::new("../etc", "x")).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::InvalidKey(_))));
        assert!(mgr.state("").await.is_err());
        assert!(mgr.users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn respond_without_provider_returns_prompt_only() {
        let reply = manager().respond(StitchRequest::new("s", "hi")).await.unwrap();
        assert!(reply.completion.is_none());
        assert!(reply.error.is_none());
        assert!(!reply.stitched.prompt.is_empty());
    }

    #[tokio::test]
    async fn respond_with_provider_returns_completion() {
        let mgr = manager().with_provider(Arc::new(EchoProvider), gen_settings());
        assert!(mgr.has_provider());
        let reply = mgr.respond(StitchRequest::new("s", "hi")).await.unwrap();
        let expected = format!("{} chars", reply.stitched.prompt.len());
        assert_eq!(reply.completion.as_deref(), Some(expected.as_str()));
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn provider_failure_degrades_but_keeps_state() {
        let mgr = manager().with_provider(Arc::new(DownProvider), gen_settings());
        let reply = mgr.respond(StitchRequest::new("s", "hi")).await.unwrap();
        assert!(reply.completion.is_none());
        assert!(reply.error.unwrap().contains("connection refused"));
        let stored = mgr.state("s").await.unwrap().unwrap();
        assert_eq!(stored.interaction_count, 1);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_user_are_serialized() {
        let mgr = Arc::new(manager());
        let mut handles = Vec::new();
        for i in 0..7 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move {
                mgr.stitch(StitchRequest::new("shared", format!("m{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let state = mgr.state("shared").await.unwrap().unwrap();
        // 7 messages: one reset at the fifth, two left in the buffer.
        assert_eq!(state.interaction_count, 2);
        assert_eq!(state.episodic_buffer.len(), 2);
    }

    #[tokio::test]
    async fn from_config_uses_configured_defaults() {
        let mut config = AppConfig::default();
        config.stitcher.default_location = "Tuticorin".into();
        config.stitcher.default_stage = 1;
        let mgr = SessionManager::from_config(&config, Arc::new(InMemoryStore::new()));
        let reply = mgr.stitch(StitchRequest::new("s", "hi")).await.unwrap();
        assert_eq!(reply.state.location, "Tuticorin");
        assert!(reply.prompt.contains("coral reef"));
    }
}
