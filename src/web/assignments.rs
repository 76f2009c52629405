use crate::db;
use crate::domain::assignment_rules::{
    self, ExistingAssignment, RelationshipChoice, RosterUser, RuleError, RuleSpec,
};
use crate::state::SharedState;
use crate::web::require_admin;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CandidatesPayload {
    pub reviewer_ids: Vec<Uuid>,
    #[serde(default)]
    pub relationship: RelationshipChoice,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreatePayload {
    pub reviewer_ids: Vec<Uuid>,
    #[serde(default)]
    pub relationship: RelationshipChoice,
    #[serde(default)]
    pub reviewee_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeletePayload {
    pub assignment_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    /// The effective choice after re-validation; when it differs from the
    /// request the client must clear its reviewee selection.
    pub relationship: RelationshipChoice,
    pub reset: bool,
    pub candidates: Vec<Candidate>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id/assignments", get(list_assignments))
        .route("/:id/assignments", post(bulk_create))
        .route("/:id/assignments/candidates", post(candidates))
        .route("/:id/assignments/delete-batch", post(delete_batch))
        .route("/:id/assignments/:aid", delete(delete_assignment))
        .with_state(state)
}

/// Loads the roster, the resolved relationship rules and the period's
/// current assignments -- the three snapshots the rule engine runs over.
async fn load_engine_inputs(
    state: &SharedState,
    period_id: Uuid,
) -> Result<(Vec<RosterUser>, Vec<RuleSpec>, Vec<ExistingAssignment>), StatusCode> {
    let users = db::list_users(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load roster: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let roster: Vec<RosterUser> = users
        .into_iter()
        .map(|u| RosterUser {
            id: u.id,
            name: u.display_name,
            role: u.role,
        })
        .collect();

    let roles = db::list_roles(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load roles: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let relationships = db::list_relationships(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load relationships: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // Rules whose role references went dangling are dropped here, which is
    // what makes a stale selection reset to peer.
    let role_name = |id: Uuid| roles.iter().find(|r| r.id == id).map(|r| r.name.clone());
    let rules: Vec<RuleSpec> = relationships
        .into_iter()
        .filter_map(|rel| {
            let reviewer_role = role_name(rel.reviewer_role_id)?;
            let reviewee_role = match rel.reviewee_role_id {
                Some(id) => Some(role_name(id)?),
                None => None,
            };
            Some(RuleSpec {
                id: rel.id,
                label: rel.name,
                reviewer_role,
                reviewee_role,
            })
        })
        .collect();

    let existing = db::list_assignments(&state.pool, period_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load assignments for period {}: {}", period_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .into_iter()
        .map(|a| ExistingAssignment {
            evaluator_id: a.evaluator_id,
            evaluatee_id: a.evaluatee_id,
            relationship: a.relationship,
        })
        .collect();

    Ok((roster, rules, existing))
}

async fn require_period(state: &SharedState, id: Uuid) -> Result<db::Period, StatusCode> {
    db::find_period(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_assignments(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<db::Assignment>>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let rows = db::list_assignments(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to load assignments for period {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rows))
}

/// Re-validates the wizard selection and returns the reviewee candidate
/// pool. Called on every reviewer or rule change.
async fn candidates(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CandidatesPayload>,
) -> Result<Json<CandidatesResponse>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let (roster, rules, existing) = load_engine_inputs(&state, id).await?;

    let (choice, reset) = assignment_rules::effective_choice(
        payload.relationship,
        &payload.reviewer_ids,
        &roster,
        &rules,
    );

    let candidates = match assignment_rules::candidate_reviewees(
        choice,
        &payload.reviewer_ids,
        &roster,
        &rules,
        &existing,
    ) {
        Ok(pool) => pool
            .into_iter()
            .map(|u| Candidate {
                id: u.id,
                name: u.name,
                role: u.role,
            })
            .collect(),
        // Mixed roles means the peer fallback has no computable pool; the
        // wizard shows an empty reviewee list until the selection changes.
        Err(RuleError::MixedRoles) | Err(RuleError::NoReviewers) => Vec::new(),
        Err(RuleError::UnknownReviewer(rid)) => {
            tracing::warn!("Candidate request referenced unknown reviewer {}", rid);
            return Err(StatusCode::BAD_REQUEST);
        }
        Err(e) => {
            tracing::warn!("Candidate computation rejected: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(Json(CandidatesResponse {
        relationship: choice,
        reset,
        candidates,
    }))
}

/// Expands the final wizard selection and inserts the whole record set
/// atomically. Duplicate exclusion happened against the snapshot read here;
/// two admins racing can still double-assign.
async fn bulk_create(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BulkCreatePayload>,
) -> Result<Json<Vec<db::Assignment>>, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let (roster, rules, existing) = load_engine_inputs(&state, id).await?;

    let records = assignment_rules::expand(
        payload.relationship,
        &payload.reviewer_ids,
        &payload.reviewee_ids,
        &roster,
        &rules,
        &existing,
    )
    .map_err(|e| {
        tracing::warn!("Bulk assignment rejected for period {}: {}", id, e);
        StatusCode::BAD_REQUEST
    })?;

    if records.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let created = db::insert_assignments(&state.pool, id, &records)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert assignments for period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!("Created {} assignments in period {}", created.len(), id);
    Ok(Json(created))
}

async fn delete_assignment(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path((id, aid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    let deleted = db::delete_assignment(&state.pool, id, aid)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete assignment {}: {}", aid, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_batch(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BatchDeletePayload>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&state, user_id).await?;
    require_period(&state, id).await?;

    if payload.assignment_ids.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let deleted = db::delete_assignments_batch(&state.pool, id, &payload.assignment_ids)
        .await
        .map_err(|e| {
            tracing::error!("Failed to batch-delete assignments in period {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!("Deleted {} assignments in period {}", deleted, id);
    Ok(StatusCode::NO_CONTENT)
}
