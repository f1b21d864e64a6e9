//! HTTP surface of the steward daemon.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use steward_core::{EnergyLevel, Orchestrator, StewardError, DEFAULT_USER_ID};

const LOG_TARGET: &str = "steward::daemon";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/message", post(message))
        .route("/api/v1/state", get(state_get))
        .route("/api/v1/state/energy", post(energy_post))
        .route("/api/v1/state/focus", post(focus_post))
        .route("/api/v1/jobs", get(jobs_get))
        .route("/api/v1/jobs/:name/run", post(job_run))
        .route("/api/v1/diagnostics", get(diagnostics))
        .with_state(state)
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "status": "error", "error": message.into() })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let cfg = state.orchestrator.config();
    Json(json!({
        "status": "ok",
        "app_name": cfg.app_name,
        "llm_mode": cfg.llm_mode,
    }))
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    user_id: Option<String>,
    text: String,
}

/// POST /api/v1/message: route one inbound message and return the reply.
async fn message(State(state): State<AppState>, Json(body): Json<MessageBody>) -> ApiResult {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "text must not be empty"));
    }
    let user_id = body
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_USER_ID);
    let routed = state.orchestrator.handle_message(user_id, text).await;
    Ok(Json(json!(routed)))
}

async fn state_get(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.orchestrator.state().get()))
}

#[derive(Deserialize)]
struct EnergyBody {
    level: String,
}

async fn energy_post(State(state): State<AppState>, Json(body): Json<EnergyBody>) -> ApiResult {
    let level: EnergyLevel = body
        .level
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
    Ok(Json(json!(state.orchestrator.state().set_energy(level))))
}

#[derive(Deserialize)]
struct FocusBody {
    mode: String,
}

async fn focus_post(State(state): State<AppState>, Json(body): Json<FocusBody>) -> ApiResult {
    if body.mode.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "mode must not be empty"));
    }
    Ok(Json(json!(state.orchestrator.state().set_focus(&body.mode))))
}

async fn jobs_get(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.orchestrator.scheduler().snapshot().await))
}

/// POST /api/v1/jobs/:name/run: run a scheduler job now, outside its trigger.
async fn job_run(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let now = Local::now().naive_local();
    match state.orchestrator.scheduler().trigger(&name, now).await {
        Ok(report) => Ok(Json(json!({ "status": "ok", "report": report }))),
        Err(StewardError::UnknownJob(name)) => {
            Err(api_error(StatusCode::NOT_FOUND, format!("unknown job: {name}")))
        }
        Err(e) => {
            tracing::error!(target: LOG_TARGET, job = %name, error = %e, "manual job run failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /api/v1/diagnostics: local checks now, reasoning ping as recorded at boot.
async fn diagnostics(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.orchestrator.diagnostics()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use steward_core::CoreConfig;
    use steward_skills::{GeminiClient, GoogleWorkspace, LlmMode, SlackMessenger};
    use tower::ServiceExt;

    /// Offline app: mock reasoning, unconfigured Google and Slack clients.
    fn test_app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..CoreConfig::default()
        };
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(GeminiClient::with_endpoint(LlmMode::Mock, "http://127.0.0.1:9", None)),
            Arc::new(GoogleWorkspace::with_endpoint("http://127.0.0.1:9", None, "UTC")),
            Arc::new(SlackMessenger::with_endpoint("http://127.0.0.1:9", None)),
        )
        .unwrap();
        let app = router(AppState {
            orchestrator: Arc::new(orchestrator),
        });
        (dir, app)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_mode() {
        let (_dir, app) = test_app();
        let (status, json) = send(app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["llm_mode"], "mock");
    }

    #[tokio::test]
    async fn message_is_answered_by_fast_stage_in_mock_mode() {
        let (_dir, app) = test_app();
        let (status, json) = send(app.clone(), "POST", "/api/v1/message", Some(json!({"text": "hello"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stage"], "fast");
        assert!(json["reply"].as_str().unwrap().starts_with("[Mock"));

        let (_, state) = send(app, "GET", "/api/v1/state", None).await;
        assert_eq!(state["metrics"]["fast_path_hits"], 1);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (_dir, app) = test_app();
        let (status, json) = send(app, "POST", "/api/v1/message", Some(json!({"text": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn energy_and_focus_updates() {
        let (_dir, app) = test_app();
        let (status, json) = send(app.clone(), "POST", "/api/v1/state/energy", Some(json!({"level": "medium"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["energy_level"], "MED");

        let (status, _) = send(app.clone(), "POST", "/api/v1/state/energy", Some(json!({"level": "sleepy"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(app.clone(), "POST", "/api/v1/state/focus", Some(json!({"mode": "deep work"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["focus_mode"], "DEEP WORK");

        let (_, state) = send(app, "GET", "/api/v1/state", None).await;
        assert_eq!(state["energy_level"], "MED");
    }

    #[tokio::test]
    async fn manual_job_runs() {
        let (_dir, app) = test_app();
        let (status, json) = send(app.clone(), "POST", "/api/v1/jobs/daily_sync/run", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["report"]["job"], "daily_sync");

        let (status, _) = send(app, "POST", "/api/v1/jobs/make_coffee/run", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn diagnostics_are_healthy_offline() {
        let (_dir, app) = test_app();
        let (status, json) = send(app, "GET", "/api/v1/diagnostics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["healthy"], true);
        assert!(json["checks"].as_array().unwrap().len() >= 5);
    }
}
