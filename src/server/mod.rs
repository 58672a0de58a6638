use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{RosterError, RosterResult};
use crate::model::pattern::RecurringShiftPattern;
use crate::model::requirement::{AutoAssignment, ShiftSkillRequirement, SkillMatchResult, SkillWeights};
use crate::model::shift::Shift;
use crate::model::staff::{StaffId, StaffMember};
use crate::model::time::hhmm;
use crate::schedule::MAX_WEEKS_TO_GENERATE;
use crate::session::{AutoStaffing, GenerationReport, HistoryView, RosterSession};
use crate::store::autosave::{AutosaveStatus, Autosaver};
use crate::store::kv::FileKeyValueStore;
use crate::store::pattern::PatternStore;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RosterSession>,
    pub patterns: Arc<Mutex<PatternStore>>,
}

impl AppState {
    pub fn new(session: RosterSession, patterns: PatternStore) -> Self {
        Self {
            session: Arc::new(session),
            patterns: Arc::new(Mutex::new(patterns)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/roster", get(get_roster))
        .route("/roster/shifts", post(add_shift))
        .route("/roster/shifts/:id", put(update_shift).delete(delete_shift))
        .route("/roster/shifts/:id/move", post(move_shift))
        .route("/roster/shifts/:id/resize", post(resize_shift))
        .route("/roster/copy-week", post(copy_week))
        .route("/roster/generate", post(generate))
        .route("/roster/auto-staff", post(auto_staff))
        .route("/roster/rank", post(rank))
        .route("/history", get(get_history))
        .route("/history/undo", post(undo))
        .route("/history/redo", post(redo))
        .route("/history/revert", post(revert))
        .route("/patterns", get(list_patterns).post(create_pattern))
        .route("/patterns/:id", get(get_pattern).put(update_pattern))
        .route("/patterns/:id/deactivate", post(deactivate_pattern))
        .route("/autosave", get(autosave_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Open the configured autosave slot and restore the roster from it.
pub async fn build_state(config: &AppConfig) -> RosterResult<AppState> {
    let autosaver = if config.autosave.enabled {
        let store = FileKeyValueStore::open(&config.autosave.path).await?;
        Some(Arc::new(Autosaver::new(Arc::new(store), config.autosave.key.clone())))
    } else {
        None
    };

    let session = RosterSession::open(config, autosaver).await;
    Ok(AppState::new(session, PatternStore::new()))
}

pub async fn run_http_server(config: AppConfig) -> RosterResult<()> {
    let state = build_state(&config).await?;
    let autosave = state
        .session
        .spawn_autosave(Duration::from_secs(config.autosave.interval_secs.max(1)));

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|err| RosterError::ConfigError(format!("invalid server address: {err}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| RosterError::Internal(format!("failed to bind server: {err}")))?;

    tracing::info!(%addr, "roster server listening");
    let served = axum::serve(listener, app)
        .await
        .map_err(|err| RosterError::Internal(format!("server error: {err}")));

    if let Some(handle) = autosave {
        handle.abort();
    }
    served
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<RosterError> for ApiError {
    fn from(err: RosterError) -> Self {
        let status = match &err {
            RosterError::PatternNotFound(_) | RosterError::ShiftNotFound(_) => StatusCode::NOT_FOUND,
            RosterError::InvalidPattern(_) | RosterError::InvalidShift(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse { error: self.message });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RosterView {
    pub changed: bool,
    pub revision: u64,
    pub shifts: Vec<Shift>,
}

async fn roster_view(session: &RosterSession, changed: bool) -> RosterView {
    let revision = session.history().await.revision;
    RosterView {
        changed,
        revision,
        shifts: session.shifts().await.as_ref().clone(),
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn get_roster(State(state): State<AppState>) -> Json<RosterView> {
    Json(roster_view(&state.session, false).await)
}

async fn add_shift(State(state): State<AppState>, Json(shift): Json<Shift>) -> ApiResult<RosterView> {
    let changed = state.session.add_shift(shift).await?;
    Ok(Json(roster_view(&state.session, changed).await))
}

async fn update_shift(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut shift): Json<Shift>,
) -> ApiResult<RosterView> {
    shift.id = id;
    let changed = state.session.update_shift(shift).await?;
    Ok(Json(roster_view(&state.session, changed).await))
}

async fn delete_shift(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<RosterView> {
    let changed = state.session.delete_shift(id).await?;
    Ok(Json(roster_view(&state.session, changed).await))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
}

async fn move_shift(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<RosterView> {
    let changed = state.session.move_shift(id, request.date, request.staff_id).await?;
    Ok(Json(roster_view(&state.session, changed).await))
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

async fn resize_shift(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResizeRequest>,
) -> ApiResult<RosterView> {
    let changed = state
        .session
        .resize_shift(id, request.start_time, request.end_time)
        .await?;
    Ok(Json(roster_view(&state.session, changed).await))
}

#[derive(Debug, Deserialize)]
pub struct CopyWeekRequest {
    pub from_week: NaiveDate,
    pub to_week: NaiveDate,
}

async fn copy_week(State(state): State<AppState>, Json(request): Json<CopyWeekRequest>) -> ApiResult<RosterView> {
    let changed = state.session.copy_week(request.from_week, request.to_week).await?;
    Ok(Json(roster_view(&state.session, changed).await))
}

// ---------------------------------------------------------------------------
// Generation and matching
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub window_start: NaiveDate,
    pub weeks: u32,
    /// When present, open occurrences are auto-staffed from this pool.
    #[serde(default)]
    pub staff: Option<Vec<StaffMember>>,
    #[serde(default)]
    pub skill_weights: SkillWeights,
}

async fn generate(State(state): State<AppState>, Json(request): Json<GenerateRequest>) -> ApiResult<GenerationReport> {
    if request.weeks > MAX_WEEKS_TO_GENERATE {
        return Err(ApiError::bad_request(format!(
            "weeks must be at most {MAX_WEEKS_TO_GENERATE}"
        )));
    }

    let patterns: Vec<RecurringShiftPattern> = state.patterns.lock().await.active().cloned().collect();

    let auto_staff = request.staff.as_deref().map(|staff| AutoStaffing {
        staff,
        skill_weights: &request.skill_weights,
    });

    let report = state
        .session
        .generate_from_patterns(&patterns, request.window_start, request.weeks, auto_staff)
        .await;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct AutoStaffRequest {
    pub staff: Vec<StaffMember>,
    pub requirements: Vec<ShiftSkillRequirement>,
    #[serde(default)]
    pub skill_weights: SkillWeights,
}

#[derive(Debug, Serialize)]
pub struct AutoStaffResponse {
    pub assignments: Vec<AutoAssignment>,
    pub unassigned: Vec<Uuid>,
}

async fn auto_staff(State(state): State<AppState>, Json(request): Json<AutoStaffRequest>) -> Json<AutoStaffResponse> {
    let (assignments, unassigned) = state
        .session
        .auto_staff(&request.staff, &request.requirements, &request.skill_weights)
        .await;
    Json(AutoStaffResponse {
        assignments,
        unassigned,
    })
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub staff: Vec<StaffMember>,
    pub requirement: ShiftSkillRequirement,
    #[serde(default)]
    pub skill_weights: SkillWeights,
}

async fn rank(State(state): State<AppState>, Json(request): Json<RankRequest>) -> Json<Vec<SkillMatchResult>> {
    let ranked = state
        .session
        .rank_for_shift(&request.staff, &request.requirement, &request.skill_weights)
        .await;
    Json(ranked)
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

async fn get_history(State(state): State<AppState>) -> Json<HistoryView> {
    Json(state.session.history().await)
}

async fn undo(State(state): State<AppState>) -> Json<RosterView> {
    let changed = state.session.undo().await;
    Json(roster_view(&state.session, changed).await)
}

async fn redo(State(state): State<AppState>) -> Json<RosterView> {
    let changed = state.session.redo().await;
    Json(roster_view(&state.session, changed).await)
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    #[serde(default)]
    pub entry_id: Option<Uuid>,
    #[serde(default)]
    pub index: Option<usize>,
}

async fn revert(State(state): State<AppState>, Json(request): Json<RevertRequest>) -> ApiResult<RosterView> {
    let changed = match (request.entry_id, request.index) {
        (Some(entry_id), _) => state.session.revert_to_entry(entry_id).await,
        (None, Some(index)) => state.session.revert_to_index(index).await,
        (None, None) => return Err(ApiError::bad_request("entry_id or index is required")),
    };
    Ok(Json(roster_view(&state.session, changed).await))
}

async fn autosave_status(State(state): State<AppState>) -> ApiResult<AutosaveStatus> {
    state
        .session
        .autosave_status()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("autosave is disabled"))
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

async fn list_patterns(State(state): State<AppState>) -> Json<Vec<RecurringShiftPattern>> {
    Json(state.patterns.lock().await.list().to_vec())
}

async fn create_pattern(
    State(state): State<AppState>,
    Json(pattern): Json<RecurringShiftPattern>,
) -> Result<(StatusCode, Json<RecurringShiftPattern>), ApiError> {
    let mut patterns = state.patterns.lock().await;
    let id = patterns.create(pattern)?;
    let created = patterns.get(id).cloned().ok_or(RosterError::PatternNotFound(id))?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_pattern(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<RecurringShiftPattern> {
    let patterns = state.patterns.lock().await;
    let pattern = patterns.get(id).cloned().ok_or(RosterError::PatternNotFound(id))?;
    Ok(Json(pattern))
}

async fn update_pattern(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut pattern): Json<RecurringShiftPattern>,
) -> ApiResult<RecurringShiftPattern> {
    pattern.id = id;
    let mut patterns = state.patterns.lock().await;
    patterns.update(pattern)?;
    let updated = patterns.get(id).cloned().ok_or(RosterError::PatternNotFound(id))?;
    Ok(Json(updated))
}

async fn deactivate_pattern(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<RecurringShiftPattern> {
    let mut patterns = state.patterns.lock().await;
    patterns.deactivate(id)?;
    let pattern = patterns.get(id).cloned().ok_or(RosterError::PatternNotFound(id))?;
    Ok(Json(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::matching::SkillMatchEngine;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let session = RosterSession::new(Vec::new(), 50, SkillMatchEngine::new(MatchConfig::default()));
        build_router(AppState::new(session, PatternStore::new()))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn early_pattern() -> Value {
        json!({
            "id": Uuid::new_v4(),
            "name": "Early",
            "recurrence": "weekly",
            "start_date": "2024-03-04",
            "days_of_week": [1, 3, 5],
            "shift_template": {
                "start_time": "07:00",
                "end_time": "15:00",
                "centre_id": "C1",
                "break_minutes": 30
            }
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_then_undo_redo() {
        let app = app();
        let shift = json!({
            "id": Uuid::new_v4(),
            "date": "2024-03-04",
            "start_time": "09:00",
            "end_time": "17:00",
            "centre_id": "C1"
        });

        let (status, body) = call(&app, Method::POST, "/roster/shifts", Some(shift)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], true);
        assert_eq!(body["shifts"].as_array().unwrap().len(), 1);

        let (_, body) = call(&app, Method::POST, "/history/undo", None).await;
        assert_eq!(body["changed"], true);
        assert!(body["shifts"].as_array().unwrap().is_empty());

        let (_, body) = call(&app, Method::POST, "/history/undo", None).await;
        assert_eq!(body["changed"], false);

        let (_, body) = call(&app, Method::GET, "/history", None).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
        assert_eq!(body["can_redo"], true);
    }

    #[tokio::test]
    async fn test_unknown_shift_is_not_found() {
        let app = app();
        let uri = format!("/roster/shifts/{}", Uuid::new_v4());
        let (status, body) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("Shift not found"));
    }

    #[tokio::test]
    async fn test_revert_requires_target() {
        let app = app();
        let (status, _) = call(&app, Method::POST, "/history/revert", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pattern_crud_and_generation() {
        let app = app();

        let (status, created) = call(&app, Method::POST, "/patterns", Some(early_pattern())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (_, body) = call(
            &app,
            Method::POST,
            "/roster/generate",
            Some(json!({ "window_start": "2024-03-04", "weeks": 2 })),
        )
        .await;
        assert_eq!(body["created"], 6);
        assert_eq!(body["committed"], true);

        let (_, body) = call(&app, Method::POST, &format!("/patterns/{id}/deactivate"), None).await;
        assert_eq!(body["is_active"], false);

        let (_, body) = call(
            &app,
            Method::POST,
            "/roster/generate",
            Some(json!({ "window_start": "2024-03-18", "weeks": 1 })),
        )
        .await;
        assert_eq!(body["created"], 0);

        let (status, _) = call(&app, Method::GET, &format!("/patterns/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_rejects_oversized_window() {
        let app = app();
        call(&app, Method::POST, "/patterns", Some(early_pattern())).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/roster/generate",
            Some(json!({ "window_start": "2024-03-04", "weeks": 4_000_000_000u32 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("weeks"));

        let (_, history) = call(&app, Method::GET, "/history", None).await;
        assert_eq!(history["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_autosave_status_disabled() {
        let app = app();
        let (status, _) = call(&app, Method::GET, "/autosave", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
