use crate::db;
use crate::domain::models::{QuestionKind, QuestionScope};
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
pub struct CreateQuestionPayload {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default = "default_scope")]
    pub scope: QuestionScope,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionPayload {
    pub text: Option<String>,
    pub kind: Option<QuestionKind>,
    pub scope: Option<QuestionScope>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderPayload {
    /// Full ordering, first entry gets index 0.
    pub question_ids: Vec<Uuid>,
}

pub(crate) fn default_scope() -> QuestionScope {
    QuestionScope::All
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_questions))
        .route("/", post(create_question))
        .route("/reorder", post(reorder_questions))
        .route("/:id", patch(update_question))
        .route("/:id", delete(delete_question))
        .with_state(state)
}

async fn list_questions(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::Question>>, StatusCode> {
    let rows = db::list_questions(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load questions: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rows))
}

async fn create_question(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<Json<db::Question>, StatusCode> {
    require_admin(&state, user_id).await?;

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::insert_question(&state.pool, text, payload.kind, payload.scope)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(row))
}

async fn update_question(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionPayload>,
) -> Result<Json<db::Question>, StatusCode> {
    require_admin(&state, user_id).await?;

    let current = db::list_questions(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_iter()
        .find(|q| q.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;

    let text = payload
        .text
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.text);
    if text.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::update_question(
        &state.pool,
        id,
        text,
        payload.kind.unwrap_or(current.kind),
        payload.scope.unwrap_or(current.scope),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update question {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn delete_question(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    // Presets and submitted responses referencing this question keep their
    // dangling ids.
    let deleted = db::delete_question(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete question {}: {}", id, e);
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
    Json(payload): Json<ReorderPayload>,
) -> Result<Json<Vec<db::Question>>, StatusCode> {
    require_admin(&state, user_id).await?;

    if payload.question_ids.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let ordering: Vec<(Uuid, i32)> = payload
        .question_ids
        .iter()
        .enumerate()
        .map(|(index, &id)| (id, index as i32))
        .collect();

    db::reorder_questions(&state.pool, &ordering)
        .await
        .map_err(|e| {
            tracing::error!("Failed to reorder questions: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let rows = db::list_questions(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(rows))
}
