pub mod assignments;
pub mod auth;
pub mod departments;
pub mod evaluations;
pub mod overview;
pub mod periods;
pub mod presets;
pub mod questions;
pub mod relationships;
pub mod results;
pub mod roles;
pub mod session;
pub mod users;

use crate::db;
use crate::state::SharedState;
use axum::http::StatusCode;
use axum::{routing::get, Router};
use uuid::Uuid;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/users", users::router(state.clone()))
        .nest("/departments", departments::router(state.clone()))
        .nest("/roles", roles::router(state.clone()))
        .nest("/relationships", relationships::router(state.clone()))
        .nest("/questions", questions::router(state.clone()))
        .nest("/presets", presets::router(state.clone()))
        .nest("/periods", periods::router(state.clone()))
        .nest("/evaluations", evaluations::router(state.clone()))
        .nest("/results", results::router(state.clone()))
        .nest("/admin", overview::router(state))
}

/// Resolves the caller's role against the roles table and rejects anyone
/// whose role lacks the admin flag. A dangling role name simply has no
/// flags.
pub(crate) async fn require_admin(
    state: &SharedState,
    user_id: Uuid,
) -> Result<db::DbUser, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find requesting user {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let role = db::find_role_by_name(&state.pool, &user.role)
        .await
        .map_err(|e| {
            tracing::error!("Failed to resolve role {:?}: {}", user.role, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !role.map(|r| r.is_admin).unwrap_or(false) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(user)
}

/// Admins or roles carrying the team-management flag.
pub(crate) async fn require_team_access(
    state: &SharedState,
    user_id: Uuid,
) -> Result<db::DbUser, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find requesting user {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let role = db::find_role_by_name(&state.pool, &user.role)
        .await
        .map_err(|e| {
            tracing::error!("Failed to resolve role {:?}: {}", user.role, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !role
        .map(|r| r.is_admin || r.can_manage_team)
        .unwrap_or(false)
    {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(user)
}
