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
pub struct DepartmentPayload {
    pub name: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_departments))
        .route("/", post(create_department))
        .route("/:id", patch(update_department))
        .route("/:id", delete(delete_department))
        .with_state(state)
}

async fn list_departments(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::Department>>, StatusCode> {
    let rows = db::list_departments(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load departments: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rows))
}

async fn create_department(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<DepartmentPayload>,
) -> Result<Json<db::Department>, StatusCode> {
    require_admin(&state, user_id).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::insert_department(&state.pool, name).await.map_err(|e| {
        tracing::error!("Failed to create department: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(row))
}

async fn update_department(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DepartmentPayload>,
) -> Result<Json<db::Department>, StatusCode> {
    require_admin(&state, user_id).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::update_department(&state.pool, id, name)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update department {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn delete_department(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    // Users pointing at this department keep their dangling reference.
    let deleted = db::delete_department(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete department {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
