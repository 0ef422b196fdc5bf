//! HTTP API gateway for CourseCraft.
//!
//! Exposes the session/chat boundary of the orchestration layer as REST
//! endpoints: session bootstrap, chat turns, the review loop, memory
//! search, and course/profile ingestion. Built on Axum.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use coursecraft_agents::{ContextAssembler, DraftingInvoker};
use coursecraft_core::context::ContextPayload;
use coursecraft_core::course::{Course, UserProfile};
use coursecraft_core::error::{AgentError, Error, MemoryError, StateError};
use coursecraft_core::memory::MemoryQuery;
use coursecraft_core::phase::SessionPhase;
use coursecraft_core::protocol::ProtocolMessage;
use coursecraft_core::session::{CourseId, SessionId, UserId};
use coursecraft_guardrails::RuleSet;
use coursecraft_memory::MemoryIndex;
use coursecraft_store::{Actor, CourseCatalog, SessionStore};
use coursecraft_workflow::{ChatRequest, ChatResponse, Orchestrator};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    /// The concrete course catalog, kept for upserts; the orchestrator only
    /// sees it through the provider port.
    pub catalog: Arc<CourseCatalog>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sessions/initialize", post(initialize_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/context", get(get_context_handler))
        .route("/sessions/{id}/context", put(update_context_handler))
        .route("/sessions/{id}/review", post(review_handler))
        .route("/chat", post(chat_handler))
        .route("/users/{id}/history", get(history_handler))
        .route("/users/{id}/courses", get(user_courses_handler))
        .route("/users/{id}/courses", post(add_course_handler))
        .route("/users/{id}/profile", post(add_profile_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Assemble the full application stack from configuration.
pub fn build_state(config: &coursecraft_config::AppConfig) -> SharedState {
    let catalog = Arc::new(CourseCatalog::new());
    let rules = load_rules(config);
    let orchestrator = Orchestrator::new(
        SessionStore::new(),
        MemoryIndex::in_memory(),
        catalog.clone(),
        Arc::new(DraftingInvoker::new(
            config.drafting.weeks,
            config.drafting.objective_count,
        )),
    )
    .with_assembler(ContextAssembler::new(
        config.orchestrator.recent_turns,
        config.orchestrator.recall_limit,
    ))
    .with_rules(rules)
    .with_invoke_timeout(std::time::Duration::from_secs(
        config.orchestrator.invoke_timeout_secs,
    ))
    .with_max_retries(config.orchestrator.max_retries);

    Arc::new(GatewayState {
        orchestrator,
        catalog,
    })
}

fn load_rules(config: &coursecraft_config::AppConfig) -> RuleSet {
    let Some(path) = &config.guardrails.rules_file else {
        return RuleSet::builtin();
    };
    match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|content| {
        RuleSet::from_toml(&content).map_err(|e| e.to_string())
    }) {
        Ok(rules) => {
            info!(path = %path.display(), rules = rules.active_count(), "Loaded guardrail rules");
            rules
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to load rules file, using built-ins");
            RuleSet::builtin()
        }
    }
}

/// Start the gateway HTTP server.
pub async fn start(
    config: coursecraft_config::AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(&config);

    // Background sweep: sessions idle past the threshold go stale and stop
    // being reused by bootstrap.
    let stale_threshold = chrono::Duration::minutes(config.orchestrator.stale_threshold_minutes);
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let marked = sweeper_state.orchestrator.sweep_stale(stale_threshold).await;
            if marked > 0 {
                info!(marked, "Stale sessions swept");
            }
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "CourseCraft gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Error mapping ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_error(err: Error) -> ApiError {
    let status = match &err {
        Error::State(StateError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
        Error::State(StateError::LockTimeout { .. }) => StatusCode::CONFLICT,
        Error::State(_) => StatusCode::BAD_REQUEST,
        Error::Memory(MemoryError::InvalidRecord(_)) => StatusCode::BAD_REQUEST,
        Error::Agent(AgentError::Unavailable { .. } | AgentError::Timeout { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn memory_error(err: MemoryError) -> ApiError {
    map_error(Error::Memory(err))
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

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default)]
    pub current_course: Option<Course>,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub session_id: SessionId,
    pub phase: SessionPhase,
}

async fn initialize_handler(
    State(state): State<SharedState>,
    Json(payload): Json<InitializeRequest>,
) -> Result<Json<InitializeResponse>, ApiError> {
    if let Some(course) = &payload.current_course {
        state.catalog.upsert(&payload.user_id, course.clone()).await;
    }
    let session_id = state
        .orchestrator
        .initialize(
            payload.user_id,
            payload.user_profile.as_ref(),
            payload.current_course.as_ref(),
        )
        .await
        .map_err(map_error)?;
    let session = state
        .orchestrator
        .session(&session_id)
        .await
        .map_err(map_error)?;
    Ok(Json(InitializeResponse {
        session_id,
        phase: session.phase,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionInfoResponse {
    pub session_id: SessionId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    pub phase: SessionPhase,
    pub turn_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
    pub stale: bool,
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let session = state
        .orchestrator
        .session(&SessionId::from(&id))
        .await
        .map_err(map_error)?;
    Ok(Json(SessionInfoResponse {
        session_id: session.id,
        user_id: session.user_id,
        course_id: session.course_id,
        phase: session.phase,
        turn_count: session.turns.len(),
        created_at: session.created_at,
        last_activity: session.last_activity,
        stale: session.stale,
    }))
}

async fn get_context_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ContextPayload>, ApiError> {
    let payload = state
        .orchestrator
        .assemble_context(&SessionId::from(&id), "")
        .await
        .map_err(map_error)?;
    Ok(Json(payload))
}

#[derive(Debug, Deserialize)]
pub struct UpdateContextRequest {
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default)]
    pub current_course: Option<Course>,
}

async fn update_context_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateContextRequest>,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let session_id = SessionId::from(&id);
    let session = state
        .orchestrator
        .session(&session_id)
        .await
        .map_err(map_error)?;

    if let Some(profile) = &payload.user_profile {
        state
            .orchestrator
            .memory()
            .remember_user(profile)
            .await
            .map_err(memory_error)?;
    }
    if let Some(course) = &payload.current_course {
        state.catalog.upsert(&session.user_id, course.clone()).await;
        state
            .orchestrator
            .memory()
            .remember_course(&session.user_id, course)
            .await
            .map_err(memory_error)?;
        state
            .orchestrator
            .store()
            .update_course_context(&session_id, Some(course.id.clone()), &Actor::system())
            .await
            .map_err(|e| map_error(e.into()))?;
    }

    get_session_handler(State(state), Path(id)).await
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // Absorb request-supplied course data so assembly can resolve it.
    if let Some(course) = &payload.course {
        state.catalog.upsert(&payload.user_id, course.clone()).await;
    }
    let response = state
        .orchestrator
        .handle_turn(payload)
        .await
        .map_err(map_error)?;
    Ok(Json(response))
}

async fn review_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(message): Json<ProtocolMessage>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state
        .orchestrator
        .review(&SessionId::from(&id), message)
        .await
        .map_err(map_error)?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub kind: String,
    pub content: String,
    pub score: f32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<HistoryEntry>,
}

async fn history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let mut query = MemoryQuery::new(UserId::from(&id), params.query.unwrap_or_default());
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    let results = state
        .orchestrator
        .memory()
        .search(&query)
        .await
        .map_err(memory_error)?;
    let records = results
        .into_iter()
        .map(|scored| HistoryEntry {
            id: scored.record.id,
            kind: scored.record.kind.as_str().to_string(),
            content: scored.record.content,
            score: scored.score,
            created_at: scored.record.created_at,
        })
        .collect();
    Ok(Json(HistoryResponse { records }))
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<Course>,
}

async fn user_courses_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CourseListResponse>, ApiError> {
    let user_id = UserId::from(&id);
    let mut courses = state
        .orchestrator
        .courses()
        .courses_for_user(&user_id)
        .await
        .map_err(|e| map_error(e.into()))?;

    // Courses known only through memory snapshots round out the list.
    let remembered = state
        .orchestrator
        .memory()
        .courses_for_user(&user_id)
        .await
        .map_err(memory_error)?;
    for course in remembered {
        if !courses.iter().any(|c| c.id == course.id) {
            courses.push(course);
        }
    }
    Ok(Json(CourseListResponse { courses }))
}

async fn add_course_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(course): Json<Course>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let user_id = UserId::from(&id);
    state.catalog.upsert(&user_id, course.clone()).await;
    state
        .orchestrator
        .memory()
        .remember_course(&user_id, &course)
        .await
        .map_err(memory_error)?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn add_profile_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(mut profile): Json<UserProfile>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    // The path owns the profile, whatever the body claims.
    profile.user_id = UserId::from(&id);
    state
        .orchestrator
        .memory()
        .remember_user(&profile)
        .await
        .map_err(memory_error)?;
    Ok((StatusCode::CREATED, Json(profile)))
}
