//! HTTP API gateway for TutorStitch.
//!
//! Exposes the session layer over REST:
//!
//! | Method | Path | |
//! |--------|------|-|
//! | GET | `/health` | liveness |
//! | POST | `/chat` | stitch a message (and generate, if enabled) |
//! | GET | `/users` | stored user keys |
//! | GET | `/users/{key}` | one user's state |
//! | POST | `/users/{key}/advance` | complete the current stage |
//! | DELETE | `/users/{key}` | forget a user |
//!
//! Built on Axum.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use tutorstitch_core::error::Error;
use tutorstitch_core::state::ContextState;
use tutorstitch_engine::session::{GenerationSettings, SessionManager, StitchRequest};
use tutorstitch_engine::stitcher::SummaryEvent;

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub sessions: SessionManager,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/users", get(list_users_handler))
        .route(
            "/users/{key}",
            get(get_user_handler).delete(delete_user_handler),
        )
        .route("/users/{key}/advance", post(advance_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: tutorstitch_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = tutorstitch_memory::open_store(&config.store).await?;
    let mut sessions = SessionManager::from_config(&config, store);
    if let Some(provider) = tutorstitch_providers::build_from_config(&config.generation) {
        sessions =
            sessions.with_provider(provider, GenerationSettings::from_config(&config.generation));
    }

    let app = build_router(Arc::new(GatewayState { sessions }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Errors ---

/// A session failure rendered as `{"error": "..."}`.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "Store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn not_found(key: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("no state stored for '{key}'"),
        }),
    )
        .into_response()
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(alias = "student_id")]
    user_key: String,
    message: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    stage: Option<u32>,
}

#[derive(Serialize)]
struct ChatResponse {
    prompt_to_send_to_llm: String,
    summarized: Option<SummaryEvent>,
    stage: u32,
    interaction_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(
        user = %payload.user_key,
        message_len = payload.message.len(),
        "Chat message received"
    );

    let request = StitchRequest {
        user_key: payload.user_key,
        message: payload.message,
        location: payload.location,
        stage: payload.stage,
    };
    let reply = state.sessions.respond(request).await?;

    Ok(Json(ChatResponse {
        stage: reply.stitched.state.current_stage,
        interaction_count: reply.stitched.state.interaction_count,
        prompt_to_send_to_llm: reply.stitched.prompt,
        summarized: reply.stitched.summarized,
        completion: reply.completion,
        error: reply.error,
    }))
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<String>,
}

async fn list_users_handler(
    State(state): State<SharedState>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.sessions.users().await?;
    Ok(Json(UsersResponse { users }))
}

async fn get_user_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match state.sessions.state(&key).await? {
        Some(record) => Json(record).into_response(),
        None => not_found(&key),
    })
}

#[derive(Deserialize)]
struct AdvanceRequest {
    milestone: String,
}

async fn advance_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(payload): Json<AdvanceRequest>,
) -> Result<Json<ContextState>, ApiError> {
    let record = state.sessions.advance_stage(&key, &payload.milestone).await?;
    info!(user = %key, stage = record.current_stage, "Stage advanced");
    Ok(Json(record))
}

async fn delete_user_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    Ok(if state.sessions.reset(&key).await? {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use tutorstitch_core::error::{ProviderError, StoreError};
    use tutorstitch_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use tutorstitch_core::store::StateStore;
    use tutorstitch_engine::session::NewUserDefaults;
    use tutorstitch_engine::stitcher::StitcherSettings;
    use tutorstitch_memory::InMemoryStore;

    fn sessions() -> SessionManager {
        SessionManager::new(
            Arc::new(InMemoryStore::new()),
            StitcherSettings::default(),
            NewUserDefaults::default(),
        )
    }

    fn app_with(sessions: SessionManager) -> Router {
        build_router(Arc::new(GatewayState { sessions }))
    }

    fn app() -> Router {
        app_with(sessions())
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, json) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn chat_returns_stitched_prompt() {
        let app = app();
        let (status, json) = send(
            &app,
            post_json(
                "/chat",
                serde_json::json!({"user_key": "student_019", "message": "I need pH sensors", "location": "Chennai", "stage": 20}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let prompt = json["prompt_to_send_to_llm"].as_str().unwrap();
        assert!(prompt.contains("Stage: 20/36"));
        assert!(prompt.contains("Location: Chennai"));
        assert!(prompt.contains("Student: I need pH sensors"));
        assert_eq!(json["interaction_count"], 1);
        assert_eq!(json["stage"], 20);
        assert!(json["summarized"].is_null());
        assert!(json.get("completion").is_none());
    }

    #[tokio::test]
    async fn legacy_student_id_is_accepted() {
        let (status, json) = send(
            &app(),
            post_json("/chat", serde_json::json!({"student_id": "s1", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stage"], 14);
    }

    #[tokio::test]
    async fn fifth_chat_reports_summarization() {
        let app = app();
        let mut last = serde_json::Value::Null;
        for i in 1..=5 {
            let (_, json) = send(
                &app,
                post_json("/chat", serde_json::json!({"user_key": "s", "message": format!("Q{i}")})),
            )
            .await;
            last = json;
        }
        assert_eq!(last["interaction_count"], 0);
        assert_eq!(last["summarized"]["reason"], "interaction_count");
        assert_eq!(last["summarized"]["compressed_messages"], 5);
        assert_eq!(last["summarized"]["summary"], "Recent focus: Student: Q5...");
    }

    #[tokio::test]
    async fn invalid_key_is_bad_request() {
        let (status, json) = send(
            &app(),
            post_json("/chat", serde_json::json!({"user_key": "", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Invalid"));
    }

    #[tokio::test]
    async fn stage_without_headroom_is_bad_request() {
        let app = app();
        let (status, json) = send(
            &app,
            post_json(
                "/chat",
                serde_json::json!({"user_key": "edge", "message": "hi", "stage": 4294967295u64}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("4294967295"));

        let (status, _) = send(
            &app,
            post_json(
                "/chat",
                serde_json::json!({"user_key": "edge", "message": "hi", "stage": 4294967294u64}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let advance = |m: &str| {
            post_json("/users/edge/advance", serde_json::json!({"milestone": m}))
        };
        let (status, json) = send(&app, advance("last")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["current_stage"], 4294967295u64);
        let (status, _) = send(&app, advance("beyond")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_message_is_rejected() {
        let resp = app()
            .oneshot(post_json("/chat", serde_json::json!({"user_key": "s"})))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let big = "x".repeat(BODY_LIMIT + 1);
        let resp = app()
            .oneshot(post_json("/chat", serde_json::json!({"user_key": "s", "message": big})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn user_lifecycle() {
        let app = app();
        send(
            &app,
            post_json("/chat", serde_json::json!({"user_key": "bob", "message": "hi", "stage": 1})),
        )
        .await;

        let (status, json) = send(&app, get("/users")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["users"], serde_json::json!(["bob"]));

        let (status, json) = send(
            &app,
            post_json("/users/bob/advance", serde_json::json!({"milestone": "Problem identified"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["current_stage"], 2);
        assert_eq!(json["completed_milestones"][0]["stage"], 1);

        let (status, json) = send(&app, get("/users/bob")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user_key"], "bob");
        assert_eq!(json["episodic_buffer"][0], "Student: hi");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/users/bob")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, get("/users/bob")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_unknown_user_is_not_found() {
        let req = Request::builder()
            .method("DELETE")
            .uri("/users/ghost")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app(), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    struct BrokenStore;

    #[async_trait]
    impl StateStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get(&self, _: &str) -> Result<Option<ContextState>, StoreError> {
            Err(StoreError::Storage("disk unavailable".into()))
        }
        async fn put(&self, _: &str, _: &ContextState) -> Result<(), StoreError> {
            Err(StoreError::Storage("disk unavailable".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Storage("disk unavailable".into()))
        }
        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Storage("disk unavailable".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_server_error() {
        let app = app_with(SessionManager::new(
            Arc::new(BrokenStore),
            StitcherSettings::default(),
            NewUserDefaults::default(),
        ));
        let (status, json) = send(
            &app,
            post_json("/chat", serde_json::json!({"user_key": "s", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("disk unavailable"));
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            })
        }
    }

    #[tokio::test]
    async fn provider_failure_returns_prompt_and_error() {
        let sessions = sessions().with_provider(
            Arc::new(FailingProvider),
            GenerationSettings {
                model: "m".into(),
                temperature: 0.7,
                max_tokens: None,
            },
        );
        let (status, json) = send(
            &app_with(sessions),
            post_json("/chat", serde_json::json!({"user_key": "s", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["prompt_to_send_to_llm"].is_string());
        assert!(json["completion"].is_null());
        assert!(json["error"].as_str().unwrap().contains("Rate limited"));
    }
}
