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
pub struct CreateRolePayload {
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub can_manage_team: bool,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolePayload {
    pub name: Option<String>,
    pub is_admin: Option<bool>,
    pub can_manage_team: Option<bool>,
    pub description: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_roles))
        .route("/", post(create_role))
        .route("/:id", patch(update_role))
        .route("/:id", delete(delete_role))
        .with_state(state)
}

async fn list_roles(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::Role>>, StatusCode> {
    let roles = db::list_roles(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load roles: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(roles))
}

async fn create_role(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateRolePayload>,
) -> Result<Json<db::Role>, StatusCode> {
    require_admin(&state, user_id).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    if db::find_role_by_name(&state.pool, name)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    let role = db::insert_role(
        &state.pool,
        name,
        payload.is_admin,
        payload.can_manage_team,
        payload.description.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create role: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(role))
}

async fn update_role(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<Json<db::Role>, StatusCode> {
    require_admin(&state, user_id).await?;

    let current = db::find_role_by_id(&state.pool, id)
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

    if name != current.name {
        if db::find_role_by_name(&state.pool, name)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_some()
        {
            return Err(StatusCode::CONFLICT);
        }
    }

    // Renaming a role orphans users still holding the old name; the original
    // behaves the same way.
    let role = db::update_role(
        &state.pool,
        id,
        name,
        payload.is_admin.unwrap_or(current.is_admin),
        payload.can_manage_team.unwrap_or(current.can_manage_team),
        payload
            .description
            .as_deref()
            .or(current.description.as_deref()),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update role {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(role))
}

async fn delete_role(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    let deleted = db::delete_role(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete role {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
