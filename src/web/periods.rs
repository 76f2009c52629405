use crate::db;
use crate::domain::models::{PeriodStatus, QuestionKind, QuestionScope};
use crate::state::SharedState;
use crate::web::require_admin;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePeriodPayload {
    pub name: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePeriodPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchivePayload {
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePeriodQuestionPayload {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default = "crate::web::questions::default_scope")]
    pub scope: QuestionScope,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePeriodQuestionPayload {
    pub text: Option<String>,
    pub kind: Option<QuestionKind>,
    pub scope: Option<QuestionScope>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderPayload {
    pub question_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ImportPresetPayload {
    pub preset_id: Uuid,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_periods))
        .route("/", post(create_period))
        .route("/:id", get(get_period))
        .route("/:id", patch(update_period))
        .route("/:id", delete(delete_period))
        .route("/:id/publish", post(publish_period))
        .route("/:id/unpublish", post(unpublish_period))
        .route("/:id/archive", post(archive_period))
        .route("/:id/publish-results", post(publish_results))
        .route("/:id/questions", get(list_questions))
        .route("/:id/questions", post(create_question))
        .route("/:id/questions/reorder", post(reorder_questions))
        .route("/:id/questions/import-preset", post(import_preset))
        .route("/:id/questions/:qid", patch(update_question))
        .route("/:id/questions/:qid", delete(delete_question))
        .with_state(state.clone())
        .merge(super::assignments::router(state))
}

async fn is_admin(state: &SharedState, user_id: Uuid) -> Result<bool, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let role = db::find_role_by_name(&state.pool, &user.role)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(role.map(|r| r.is_admin).unwrap_or(false))
}

/// Nested collections exist only while the owning period row does.
async fn require_period(state: &SharedState, id: Uuid) -> Result<db::Period, StatusCode> {
    db::find_period(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_periods(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::Period>>, StatusCode> {
    let include_drafts = is_admin(&state, user_id).await?;
    let rows = db::list_periods(&state.pool, include_drafts)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load periods: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(rows))
}

async fn get_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Period>, StatusCode> {
    let period = require_period(&state, id).await?;
    if period.status != PeriodStatus::Published && !is_admin(&state, user_id).await? {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(period))
}

async fn create_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreatePeriodPayload>,
) -> Result<Json<db::Period>, StatusCode> {
    require_admin(&state, user_id).await?;

    let name = payload.name.trim();
    if name.is_empty() || payload.start_date.trim().is_empty() || payload.end_date.trim().is_empty()
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::insert_period(
        &state.pool,
        name,
        payload.description.as_deref(),
        payload.start_date.trim(),
        payload.end_date.trim(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create period: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(row))
}

async fn update_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePeriodPayload>,
) -> Result<Json<db::Period>, StatusCode> {
    require_admin(&state, user_id).await?;
    let current = require_period(&state, id).await?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.name);
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::update_period(
        &state.pool,
        id,
        name,
        payload
            .description
            .as_deref()
            .or(current.description.as_deref()),
        payload.start_date.as_deref().unwrap_or(&current.start_date),
        payload.end_date.as_deref().unwrap_or(&current.end_date),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update period {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn delete_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    // Nested questions and assignments are left behind as orphans.
    let deleted = db::delete_period(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete period {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status(
    state: &SharedState,
    user_id: Uuid,
    id: Uuid,
    status: PeriodStatus,
) -> Result<Json<db::Period>, StatusCode> {
    require_admin(state, user_id).await?;
    let row = db::set_period_status(&state.pool, id, status)
        .await
        .map_err(|e| {
            tracing::error!("Failed to set period {} status: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn publish_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Period>, StatusCode> {
    set_status(&state, user_id, id, PeriodStatus::Published).await
}

async fn unpublish_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Period>, StatusCode> {
    set_status(&state, user_id, id, PeriodStatus::Draft).await
}

async fn archive_period(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ArchivePayload>,
) -> Result<Json<db::Period>, StatusCode> {
    require_admin(&state, user_id).await?;
    let row = db::set_period_archived(&state.pool, id, payload.archived)
        .await
        .map_err(|e| {
            tracing::error!("Failed to archive period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn publish_results(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::Period>, StatusCode> {
    require_admin(&state, user_id).await?;
    let row = db::publish_period_results(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to publish results for period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!("Results published for period {}", id);
    Ok(Json(row))
}

// ---------- Nested questions ----------

async fn list_questions(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<db::PeriodQuestion>>, StatusCode> {
    require_period(&state, id).await?;
    let rows = db::list_period_questions(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load questions for period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(rows))
}

async fn create_question(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreatePeriodQuestionPayload>,
) -> Result<Json<db::PeriodQuestion>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::insert_period_question(&state.pool, id, text, payload.kind, payload.scope)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question in period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(row))
}

async fn update_question(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path((id, qid)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePeriodQuestionPayload>,
) -> Result<Json<db::PeriodQuestion>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let current = db::list_period_questions(&state.pool, id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_iter()
        .find(|q| q.id == qid)
        .ok_or(StatusCode::NOT_FOUND)?;

    let text = payload
        .text
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.text);
    if text.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::update_period_question(
        &state.pool,
        id,
        qid,
        text,
        payload.kind.unwrap_or(current.kind),
        payload.scope.unwrap_or(current.scope),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update question {} in period {}: {}", qid, id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn delete_question(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path((id, qid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let deleted = db::delete_period_question(&state.pool, id, qid)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question {} in period {}: {}", qid, id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_questions(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderPayload>,
) -> Result<Json<Vec<db::PeriodQuestion>>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    if payload.question_ids.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let ordering: Vec<(Uuid, i32)> = payload
        .question_ids
        .iter()
        .enumerate()
        .map(|(index, &qid)| (qid, index as i32))
        .collect();

    db::reorder_period_questions(&state.pool, id, &ordering)
        .await
        .map_err(|e| {
            tracing::error!("Failed to reorder questions in period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let rows = db::list_period_questions(&state.pool, id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(rows))
}

/// Copies a preset's questions into the period after whatever is already
/// there, preserving the preset's order. Ids missing from the question bank
/// (deleted since the preset was saved) are skipped.
async fn import_preset(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ImportPresetPayload>,
) -> Result<Json<Vec<db::PeriodQuestion>>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let preset = db::find_preset(&state.pool, payload.preset_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let bank = db::find_questions_by_ids(&state.pool, &preset.question_ids.0)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let ordered: Vec<db::Question> = preset
        .question_ids
        .0
        .iter()
        .filter_map(|qid| bank.iter().find(|q| q.id == *qid).cloned())
        .collect();

    if ordered.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let rows = db::import_preset_questions(&state.pool, id, &ordered)
        .await
        .map_err(|e| {
            tracing::error!("Failed to import preset into period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(rows))
}
