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
pub struct RelationshipPayload {
    pub name: String,
    pub reviewer_role_id: Uuid,
    /// Omitted means the rule is a self review.
    pub reviewee_role_id: Option<Uuid>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_relationships))
        .route("/", post(create_relationship))
        .route("/:id", patch(update_relationship))
        .route("/:id", delete(delete_relationship))
        .with_state(state)
}

async fn list_relationships(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::RoleRelationship>>, StatusCode> {
    let rows = db::list_relationships(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load relationships: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rows))
}

async fn validate_payload(
    state: &SharedState,
    payload: &RelationshipPayload,
) -> Result<(), StatusCode> {
    if payload.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    // The reviewer role must exist right now; the reference can still go
    // dangling later when the role is deleted.
    if db::find_role_by_id(&state.pool, payload.reviewer_role_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_none()
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    if let Some(reviewee_role_id) = payload.reviewee_role_id {
        if db::find_role_by_id(&state.pool, reviewee_role_id)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_none()
        {
            return Err(StatusCode::BAD_REQUEST);
        }
    }
    Ok(())
}

async fn create_relationship(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<RelationshipPayload>,
) -> Result<Json<db::RoleRelationship>, StatusCode> {
    require_admin(&state, user_id).await?;
    validate_payload(&state, &payload).await?;

    let row = db::insert_relationship(
        &state.pool,
        payload.name.trim(),
        payload.reviewer_role_id,
        payload.reviewee_role_id,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create relationship: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(row))
}

async fn update_relationship(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RelationshipPayload>,
) -> Result<Json<db::RoleRelationship>, StatusCode> {
    require_admin(&state, user_id).await?;
    validate_payload(&state, &payload).await?;

    let row = db::update_relationship(
        &state.pool,
        id,
        payload.name.trim(),
        payload.reviewer_role_id,
        payload.reviewee_role_id,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update relationship {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

async fn delete_relationship(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;

    let deleted = db::delete_relationship(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to delete relationship {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
