use crate::db;
use crate::domain::models::AssignmentStatus;
use crate::state::SharedState;
use crate::web::require_admin;
use crate::web::session::UserSession;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    /// Period whose assignment progress to report.
    pub period: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub users: i64,
    pub periods: i64,
    pub evaluations: i64,
    pub pending_assignments: Option<i64>,
    pub completed_assignments: Option<i64>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/overview", get(overview))
        .with_state(state)
}

async fn overview(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<OverviewResponse>, StatusCode> {
    require_admin(&state, user_id).await?;

    let count = |table: &'static str| db::count_rows(&state.pool, table);
    let users = count("users").await.map_err(|e| {
        tracing::error!("Failed to count users: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let periods = count("periods")
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let evaluations = count("evaluations")
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let (pending_assignments, completed_assignments) = match query.period {
        Some(period_id) => {
            let pending =
                db::count_assignments_by_status(&state.pool, period_id, AssignmentStatus::Pending)
                    .await
                    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let completed = db::count_assignments_by_status(
                &state.pool,
                period_id,
                AssignmentStatus::Completed,
            )
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            (Some(pending), Some(completed))
        }
        None => (None, None),
    };

    Ok(Json(OverviewResponse {
        users,
        periods,
        evaluations,
        pending_assignments,
        completed_assignments,
    }))
}
