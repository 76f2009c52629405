use crate::db;
use crate::state::SharedState;
use crate::web::require_admin;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateUserPayload {
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<Uuid>,
    /// Explicit detach, since an absent department_id means "keep".
    #[serde(default)]
    pub clear_department: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", patch(update_user))
        .route("/:id", delete(delete_user))
        .with_state(state)
}

async fn list_users(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::DbUser>>, StatusCode> {
    require_admin(&state, user_id).await?;

    let users = db::list_users(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load users: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(users))
}

async fn update_user(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<db::DbUser>, StatusCode> {
    require_admin(&state, user_id).await?;

    let current = db::find_user_by_id(&state.pool, id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.display_name);
    if display_name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let role = payload.role.as_deref().unwrap_or(&current.role);
    if role.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let department_id = if payload.clear_department {
        None
    } else {
        payload.department_id.or(current.department_id)
    };

    let updated = db::update_user(&state.pool, id, display_name, role, department_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update user {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(updated))
}

async fn delete_user(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    let deleted = db::delete_user(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete user {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
