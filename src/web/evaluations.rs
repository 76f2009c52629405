use crate::db;
use crate::domain::models::{Answer, QuestionKind, QuestionScope};
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{require_admin, require_team_access};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct FormQuestion {
    pub id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    pub scope: QuestionScope,
    pub order_index: i32,
}

#[derive(Debug, Serialize)]
pub struct PendingForm {
    pub assignment: db::Assignment,
    pub questions: Vec<FormQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub assignment_id: Uuid,
    pub responses: HashMap<Uuid, Answer>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub period: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct FlagsPayload {
    pub shared: Option<bool>,
    pub archived: Option<bool>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_evaluations))
        .route("/", post(submit))
        .route("/mine", get(my_pending))
        .route("/:id/flags", patch(set_flags))
        .with_state(state)
}

/// Every answer must reference a question on the form, match its kind and
/// keep scale ratings in range. Unanswered questions are allowed.
fn responses_are_valid(
    responses: &HashMap<Uuid, Answer>,
    kinds: &HashMap<Uuid, QuestionKind>,
) -> bool {
    responses.iter().all(|(question_id, answer)| {
        let Some(&kind) = kinds.get(question_id) else {
            return false;
        };
        if !answer.matches(kind) {
            return false;
        }
        match answer {
            Answer::Scale { value, .. } => value.in_range(),
            Answer::Paragraph { .. } => true,
        }
    })
}

/// The question set backing an assignment's form: the period's nested
/// questions, or the global bank when the period has none. Self-scoped
/// questions only show up when the evaluator reviews themselves.
async fn form_questions(
    state: &SharedState,
    assignment: &db::Assignment,
) -> Result<Vec<FormQuestion>, StatusCode> {
    let nested = db::list_period_questions(&state.pool, assignment.period_id)
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to load questions for period {}: {}",
                assignment.period_id,
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut questions: Vec<FormQuestion> = if nested.is_empty() {
        db::list_questions(&state.pool)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .into_iter()
            .map(|q| FormQuestion {
                id: q.id,
                text: q.text,
                kind: q.kind,
                scope: q.scope,
                order_index: q.order_index,
            })
            .collect()
    } else {
        nested
            .into_iter()
            .map(|q| FormQuestion {
                id: q.id,
                text: q.text,
                kind: q.kind,
                scope: q.scope,
                order_index: q.order_index,
            })
            .collect()
    };

    let is_self = assignment.evaluator_id == assignment.evaluatee_id;
    if !is_self {
        questions.retain(|q| q.scope != QuestionScope::SelfOnly);
    }
    Ok(questions)
}

async fn my_pending(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<PendingForm>>, StatusCode> {
    let assignments = db::list_pending_assignments_for(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load pending assignments for {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut out = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let questions = form_questions(&state, &assignment).await?;
        out.push(PendingForm {
            assignment,
            questions,
        });
    }
    Ok(Json(out))
}

async fn submit(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<SubmitPayload>,
) -> Result<Json<db::Evaluation>, StatusCode> {
    let assignment = db::find_assignment(&state.pool, payload.assignment_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if assignment.evaluator_id != user_id {
        return Err(StatusCode::FORBIDDEN);
    }

    // The owning period must still exist for the assignment to be actionable.
    db::find_period(&state.pool, assignment.period_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if payload.responses.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let questions = form_questions(&state, &assignment).await?;
    let kinds: HashMap<Uuid, QuestionKind> =
        questions.iter().map(|q| (q.id, q.kind)).collect();

    if !responses_are_valid(&payload.responses, &kinds) {
        return Err(StatusCode::BAD_REQUEST);
    }

    match db::submit_evaluation(&state.pool, &assignment, &payload.responses)
        .await
        .map_err(|e| {
            tracing::error!("Failed to submit evaluation for {}: {}", assignment.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })? {
        db::SubmitOutcome::Submitted(evaluation) => {
            tracing::info!(
                "Evaluation {} submitted for assignment {}",
                evaluation.id,
                assignment.id
            );
            Ok(Json(*evaluation))
        }
        db::SubmitOutcome::AlreadyCompleted => Err(StatusCode::CONFLICT),
    }
}

async fn list_evaluations(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<db::Evaluation>>, StatusCode> {
    require_team_access(&state, user_id).await?;

    let rows = db::list_evaluations(&state.pool, query.period)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load evaluations: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(rows))
}

/// Evaluations are immutable after submission; only these two admin flags
/// can change.
async fn set_flags(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FlagsPayload>,
) -> Result<Json<db::Evaluation>, StatusCode> {
    require_admin(&state, user_id).await?;

    if payload.shared.is_none() && payload.archived.is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = db::set_evaluation_flags(&state.pool, id, payload.shared, payload.archived)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update evaluation {} flags: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ScaleValue;

    fn kinds(entries: &[(u128, QuestionKind)]) -> HashMap<Uuid, QuestionKind> {
        entries
            .iter()
            .map(|&(id, kind)| (Uuid::from_u128(id), kind))
            .collect()
    }

    fn responses(entries: Vec<(u128, Answer)>) -> HashMap<Uuid, Answer> {
        entries
            .into_iter()
            .map(|(id, answer)| (Uuid::from_u128(id), answer))
            .collect()
    }

    #[test]
    fn valid_mixed_responses_pass() {
        let kinds = kinds(&[(1, QuestionKind::Scale), (2, QuestionKind::Paragraph)]);
        let responses = responses(vec![
            (
                1,
                Answer::Scale {
                    value: ScaleValue::Rating(8),
                    comment: Some("steady output".to_string()),
                },
            ),
            (
                2,
                Answer::Paragraph {
                    text: "keep doing demos".to_string(),
                },
            ),
        ]);
        assert!(responses_are_valid(&responses, &kinds));
    }

    #[test]
    fn not_applicable_is_a_valid_scale_answer() {
        let kinds = kinds(&[(1, QuestionKind::Scale)]);
        let responses = responses(vec![(
            1,
            Answer::Scale {
                value: ScaleValue::NotApplicable,
                comment: None,
            },
        )]);
        assert!(responses_are_valid(&responses, &kinds));
    }

    #[test]
    fn unknown_question_id_is_rejected() {
        let kinds = kinds(&[(1, QuestionKind::Scale)]);
        let responses = responses(vec![(
            99,
            Answer::Scale {
                value: ScaleValue::Rating(5),
                comment: None,
            },
        )]);
        assert!(!responses_are_valid(&responses, &kinds));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let kinds = kinds(&[(1, QuestionKind::Paragraph)]);
        let responses = responses(vec![(
            1,
            Answer::Scale {
                value: ScaleValue::Rating(5),
                comment: None,
            },
        )]);
        assert!(!responses_are_valid(&responses, &kinds));
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let kinds = kinds(&[(1, QuestionKind::Scale)]);
        let responses = responses(vec![(
            1,
            Answer::Scale {
                value: ScaleValue::Rating(11),
                comment: None,
            },
        )]);
        assert!(!responses_are_valid(&responses, &kinds));
    }
}
