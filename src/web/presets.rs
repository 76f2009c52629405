use crate::db;
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
pub struct CreatePresetPayload {
    pub name: String,
    pub description: Option<String>,
    /// Ordered global question ids; order is preserved on import.
    #[serde(default)]
    pub question_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePresetPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub question_ids: Option<Vec<Uuid>>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_presets))
        .route("/", post(create_preset))
        .route("/:id", patch(update_preset))
        .route("/:id", delete(delete_preset))
        .with_state(state)
}

async fn list_presets(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::QuestionPreset>>, StatusCode> {
    require_admin(&state, user_id).await?;

    let rows = db::list_presets(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load presets: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rows))
}

async fn create_preset(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreatePresetPayload>,
) -> Result<Json<db::QuestionPreset>, StatusCode> {
    require_admin(&state, user_id).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::insert_preset(
        &state.pool,
        name,
        payload.description.as_deref(),
        &payload.question_ids,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create preset: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(row))
}

async fn update_preset(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePresetPayload>,
) -> Result<Json<db::QuestionPreset>, StatusCode> {
    require_admin(&state, user_id).await?;

    let current = db::find_preset(&state.pool, id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.name);
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let question_ids = payload
        .question_ids
        .as_deref()
        .unwrap_or(&current.question_ids.0);

    let row = db::update_preset(
        &state.pool,
        id,
        name,
        payload
            .description
            .as_deref()
            .or(current.description.as_deref()),
        question_ids,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update preset {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn delete_preset(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    let deleted = db::delete_preset(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete preset {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
