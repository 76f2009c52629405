use crate::db;
use crate::domain::models::QuestionKind;
use crate::domain::results::{self, EvaluationInput, GroupSummary, SummaryQuestion};
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct MyResultsResponse {
    /// Relationship-type label -> anonymized summary.
    pub groups: BTreeMap<String, GroupSummary>,
    pub total: usize,
}

pub fn router(state: SharedState) -> Router {
    Router::new().route("/me", get(my_results)).with_state(state)
}

/// Anonymized feedback for the signed-in employee: every shared, unarchived
/// evaluation targeting them, reduced per relationship type. Any fetch
/// failure aborts the whole computation.
async fn my_results(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<MyResultsResponse>, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let evaluations =
        db::list_shared_evaluations_for(&state.pool, user.id, &user.display_name)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load shared evaluations for {}: {}", user.id, e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

    let mut period_ids: Vec<Uuid> = evaluations.iter().map(|e| e.period_id).collect();
    period_ids.sort_unstable();
    period_ids.dedup();

    let questions: Vec<SummaryQuestion> =
        db::list_summary_questions(&state.pool, &period_ids)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load question list: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .into_iter()
            .map(|(id, kind): (Uuid, QuestionKind)| SummaryQuestion { id, kind })
            .collect();

    let total = evaluations.len();
    let inputs: Vec<EvaluationInput> = evaluations
        .into_iter()
        .map(|e| EvaluationInput {
            relationship: e.relationship,
            submitted_at: e.submitted_at,
            responses: e.responses.0,
        })
        .collect();

    let groups = results::summarize(&inputs, &questions);
    Ok(Json(MyResultsResponse { groups, total }))
}
