pub mod seed;

use crate::domain::models::{
    Answer, AssignmentStatus, PeriodStatus, QuestionKind, QuestionScope,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub provider_uid: String,
    pub email: String,
    pub display_name: String,
    /// Free-text role name, resolved against the roles table for flags.
    pub role: String,
    pub department_id: Option<Uuid>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub can_manage_team: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleRelationship {
    pub id: Uuid,
    pub name: String,
    pub reviewer_role_id: Uuid,
    /// None is the "self" sentinel.
    pub reviewee_role_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Period {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: PeriodStatus,
    pub archived: bool,
    pub results_published: bool,
    pub start_date: String,
    pub end_date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    pub scope: QuestionScope,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PeriodQuestion {
    pub id: Uuid,
    pub period_id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    pub scope: QuestionScope,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionPreset {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub question_ids: Json<Vec<Uuid>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub period_id: Uuid,
    pub evaluator_id: Uuid,
    pub evaluator_name: String,
    pub evaluatee_id: Uuid,
    pub evaluatee_name: String,
    pub relationship: String,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Evaluation {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub period_id: Uuid,
    pub evaluator_id: Uuid,
    pub evaluator_name: String,
    pub evaluatee_id: Option<Uuid>,
    pub evaluatee_name: String,
    pub relationship: Option<String>,
    pub responses: Json<HashMap<Uuid, Answer>>,
    pub shared: bool,
    pub archived: bool,
    pub submitted_at: DateTime<Utc>,
}

// ---------- Users ----------

const USER_COLUMNS: &str = "id, provider_uid, email, display_name, role, department_id, photo_url, created_at, updated_at";

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Mirror a signed-in identity into the users collection. Profile fields
/// follow the provider on every exchange; the role is only set on first
/// mirror and stays under admin control afterwards.
pub async fn upsert_mirrored_user(
    pool: &PgPool,
    provider_uid: &str,
    email: &str,
    display_name: &str,
    photo_url: Option<&str>,
    initial_role: &str,
) -> Result<DbUser> {
    let user = sqlx::query_as::<_, DbUser>(&format!(
        r#"
        INSERT INTO users (id, provider_uid, email, display_name, role, photo_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (provider_uid) DO UPDATE
        SET email = EXCLUDED.email,
            display_name = EXCLUDED.display_name,
            photo_url = EXCLUDED.photo_url,
            updated_at = NOW()
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(provider_uid)
    .bind(email)
    .bind(display_name)
    .bind(initial_role)
    .bind(photo_url)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<DbUser>> {
    let users = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY display_name ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn update_user(
    pool: &PgPool,
    id: Uuid,
    display_name: &str,
    role: &str,
    department_id: Option<Uuid>,
) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(&format!(
        r#"
        UPDATE users
        SET display_name = $2, role = $3, department_id = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(display_name)
    .bind(role)
    .bind(department_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Deleting a user leaves its references in assignments and evaluations
/// dangling, same as the original store.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------- Departments ----------

pub async fn list_departments(pool: &PgPool) -> Result<Vec<Department>> {
    let rows = sqlx::query_as::<_, Department>(
        "SELECT id, name, created_at FROM departments ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert_department(pool: &PgPool, name: &str) -> Result<Department> {
    let row = sqlx::query_as::<_, Department>(
        "INSERT INTO departments (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_department(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<Department>> {
    let row = sqlx::query_as::<_, Department>(
        "UPDATE departments SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
    )
    .bind(id)
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn delete_department(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM departments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------- Roles ----------

const ROLE_COLUMNS: &str = "id, name, is_admin, can_manage_team, description, created_at";

pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>> {
    let roles = sqlx::query_as::<_, Role>(&format!(
        "SELECT {ROLE_COLUMNS} FROM roles ORDER BY name ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(roles)
}

pub async fn find_role_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>(&format!(
        "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(role)
}

pub async fn find_role_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>(&format!(
        "SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(role)
}

pub async fn insert_role(
    pool: &PgPool,
    name: &str,
    is_admin: bool,
    can_manage_team: bool,
    description: Option<&str>,
) -> Result<Role> {
    let role = sqlx::query_as::<_, Role>(&format!(
        r#"
        INSERT INTO roles (id, name, is_admin, can_manage_team, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ROLE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(is_admin)
    .bind(can_manage_team)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(role)
}

pub async fn update_role(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    is_admin: bool,
    can_manage_team: bool,
    description: Option<&str>,
) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>(&format!(
        r#"
        UPDATE roles
        SET name = $2, is_admin = $3, can_manage_team = $4, description = $5
        WHERE id = $1
        RETURNING {ROLE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(is_admin)
    .bind(can_manage_team)
    .bind(description)
    .fetch_optional(pool)
    .await?;
    Ok(role)
}

pub async fn delete_role(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------- Role relationships ----------

const RELATIONSHIP_COLUMNS: &str = "id, name, reviewer_role_id, reviewee_role_id, created_at";

pub async fn list_relationships(pool: &PgPool) -> Result<Vec<RoleRelationship>> {
    let rows = sqlx::query_as::<_, RoleRelationship>(&format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM role_relationships ORDER BY created_at ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert_relationship(
    pool: &PgPool,
    name: &str,
    reviewer_role_id: Uuid,
    reviewee_role_id: Option<Uuid>,
) -> Result<RoleRelationship> {
    let row = sqlx::query_as::<_, RoleRelationship>(&format!(
        r#"
        INSERT INTO role_relationships (id, name, reviewer_role_id, reviewee_role_id)
        VALUES ($1, $2, $3, $4)
        RETURNING {RELATIONSHIP_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(reviewer_role_id)
    .bind(reviewee_role_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_relationship(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    reviewer_role_id: Uuid,
    reviewee_role_id: Option<Uuid>,
) -> Result<Option<RoleRelationship>> {
    let row = sqlx::query_as::<_, RoleRelationship>(&format!(
        r#"
        UPDATE role_relationships
        SET name = $2, reviewer_role_id = $3, reviewee_role_id = $4
        WHERE id = $1
        RETURNING {RELATIONSHIP_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(reviewer_role_id)
    .bind(reviewee_role_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn delete_relationship(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM role_relationships WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------- Global questions ----------

const QUESTION_COLUMNS: &str = "id, text, kind, scope, order_index, created_at";

pub async fn list_questions(pool: &PgPool) -> Result<Vec<Question>> {
    let rows = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY order_index ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert_question(
    pool: &PgPool,
    text: &str,
    kind: QuestionKind,
    scope: QuestionScope,
) -> Result<Question> {
    let row = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions (id, text, kind, scope, order_index)
        VALUES ($1, $2, $3, $4,
            (SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions))
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(text)
    .bind(kind)
    .bind(scope)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_question(
    pool: &PgPool,
    id: Uuid,
    text: &str,
    kind: QuestionKind,
    scope: QuestionScope,
) -> Result<Option<Question>> {
    let row = sqlx::query_as::<_, Question>(&format!(
        r#"
        UPDATE questions SET text = $2, kind = $3, scope = $4 WHERE id = $1
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(text)
    .bind(kind)
    .bind(scope)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn delete_question(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Applies a full id -> index ordering in one transaction.
pub async fn reorder_questions(pool: &PgPool, ordering: &[(Uuid, i32)]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for (id, order_index) in ordering {
        sqlx::query("UPDATE questions SET order_index = $2 WHERE id = $1")
            .bind(id)
            .bind(order_index)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn find_questions_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Question>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ---------- Question presets ----------

const PRESET_COLUMNS: &str = "id, name, description, question_ids, created_at";

pub async fn list_presets(pool: &PgPool) -> Result<Vec<QuestionPreset>> {
    let rows = sqlx::query_as::<_, QuestionPreset>(&format!(
        "SELECT {PRESET_COLUMNS} FROM question_presets ORDER BY name ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_preset(pool: &PgPool, id: Uuid) -> Result<Option<QuestionPreset>> {
    let row = sqlx::query_as::<_, QuestionPreset>(&format!(
        "SELECT {PRESET_COLUMNS} FROM question_presets WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn insert_preset(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    question_ids: &[Uuid],
) -> Result<QuestionPreset> {
    let row = sqlx::query_as::<_, QuestionPreset>(&format!(
        r#"
        INSERT INTO question_presets (id, name, description, question_ids)
        VALUES ($1, $2, $3, $4)
        RETURNING {PRESET_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .bind(Json(question_ids))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_preset(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    description: Option<&str>,
    question_ids: &[Uuid],
) -> Result<Option<QuestionPreset>> {
    let row = sqlx::query_as::<_, QuestionPreset>(&format!(
        r#"
        UPDATE question_presets
        SET name = $2, description = $3, question_ids = $4
        WHERE id = $1
        RETURNING {PRESET_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(Json(question_ids))
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn delete_preset(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM question_presets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------- Periods ----------

const PERIOD_COLUMNS: &str = "id, name, description, status, archived, results_published, start_date, end_date, created_at, updated_at";

/// Admins see everything; everyone else only published, non-archived periods.
pub async fn list_periods(pool: &PgPool, include_drafts: bool) -> Result<Vec<Period>> {
    let sql = if include_drafts {
        format!("SELECT {PERIOD_COLUMNS} FROM periods ORDER BY created_at DESC")
    } else {
        format!(
            "SELECT {PERIOD_COLUMNS} FROM periods WHERE status = 'published' AND NOT archived ORDER BY created_at DESC"
        )
    };
    let rows = sqlx::query_as::<_, Period>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn find_period(pool: &PgPool, id: Uuid) -> Result<Option<Period>> {
    let row = sqlx::query_as::<_, Period>(&format!(
        "SELECT {PERIOD_COLUMNS} FROM periods WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn insert_period(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    start_date: &str,
    end_date: &str,
) -> Result<Period> {
    let row = sqlx::query_as::<_, Period>(&format!(
        r#"
        INSERT INTO periods (id, name, description, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PERIOD_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_period(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    description: Option<&str>,
    start_date: &str,
    end_date: &str,
) -> Result<Option<Period>> {
    let row = sqlx::query_as::<_, Period>(&format!(
        r#"
        UPDATE periods
        SET name = $2, description = $3, start_date = $4, end_date = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING {PERIOD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(start_date)
    .bind(end_date)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// No cascade: the period's nested questions and assignments stay behind as
/// orphans, same as the original store.
pub async fn delete_period(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM periods WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_period_status(
    pool: &PgPool,
    id: Uuid,
    status: PeriodStatus,
) -> Result<Option<Period>> {
    let row = sqlx::query_as::<_, Period>(&format!(
        r#"
        UPDATE periods SET status = $2, updated_at = NOW() WHERE id = $1
        RETURNING {PERIOD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn set_period_archived(pool: &PgPool, id: Uuid, archived: bool) -> Result<Option<Period>> {
    let row = sqlx::query_as::<_, Period>(&format!(
        r#"
        UPDATE periods SET archived = $2, updated_at = NOW() WHERE id = $1
        RETURNING {PERIOD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(archived)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Marks a period's results published and shares its evaluations, in one
/// transaction.
pub async fn publish_period_results(pool: &PgPool, id: Uuid) -> Result<Option<Period>> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, Period>(&format!(
        r#"
        UPDATE periods SET results_published = TRUE, updated_at = NOW() WHERE id = $1
        RETURNING {PERIOD_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    if row.is_none() {
        tx.rollback().await?;
        return Ok(None);
    }
    sqlx::query("UPDATE evaluations SET shared = TRUE WHERE period_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(row)
}

// ---------- Period questions ----------

const PERIOD_QUESTION_COLUMNS: &str = "id, period_id, text, kind, scope, order_index, created_at";

pub async fn list_period_questions(pool: &PgPool, period_id: Uuid) -> Result<Vec<PeriodQuestion>> {
    let rows = sqlx::query_as::<_, PeriodQuestion>(&format!(
        "SELECT {PERIOD_QUESTION_COLUMNS} FROM period_questions WHERE period_id = $1 ORDER BY order_index ASC"
    ))
    .bind(period_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert_period_question(
    pool: &PgPool,
    period_id: Uuid,
    text: &str,
    kind: QuestionKind,
    scope: QuestionScope,
) -> Result<PeriodQuestion> {
    let row = sqlx::query_as::<_, PeriodQuestion>(&format!(
        r#"
        INSERT INTO period_questions (id, period_id, text, kind, scope, order_index)
        VALUES ($1, $2, $3, $4, $5,
            (SELECT COALESCE(MAX(order_index) + 1, 0) FROM period_questions WHERE period_id = $2))
        RETURNING {PERIOD_QUESTION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(period_id)
    .bind(text)
    .bind(kind)
    .bind(scope)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_period_question(
    pool: &PgPool,
    period_id: Uuid,
    id: Uuid,
    text: &str,
    kind: QuestionKind,
    scope: QuestionScope,
) -> Result<Option<PeriodQuestion>> {
    let row = sqlx::query_as::<_, PeriodQuestion>(&format!(
        r#"
        UPDATE period_questions
        SET text = $3, kind = $4, scope = $5
        WHERE id = $2 AND period_id = $1
        RETURNING {PERIOD_QUESTION_COLUMNS}
        "#
    ))
    .bind(period_id)
    .bind(id)
    .bind(text)
    .bind(kind)
    .bind(scope)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn delete_period_question(pool: &PgPool, period_id: Uuid, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM period_questions WHERE id = $2 AND period_id = $1")
        .bind(period_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn reorder_period_questions(
    pool: &PgPool,
    period_id: Uuid,
    ordering: &[(Uuid, i32)],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    for (id, order_index) in ordering {
        sqlx::query("UPDATE period_questions SET order_index = $3 WHERE id = $2 AND period_id = $1")
            .bind(period_id)
            .bind(id)
            .bind(order_index)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Copies a preset's global questions into the period, in preset order,
/// after the current maximum order index. One transaction.
pub async fn import_preset_questions(
    pool: &PgPool,
    period_id: Uuid,
    questions: &[Question],
) -> Result<Vec<PeriodQuestion>> {
    let mut tx = pool.begin().await?;
    let base: i32 = sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(order_index) + 1, 0) FROM period_questions WHERE period_id = $1",
    )
    .bind(period_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut out = Vec::with_capacity(questions.len());
    for (offset, question) in questions.iter().enumerate() {
        let row = sqlx::query_as::<_, PeriodQuestion>(&format!(
            r#"
            INSERT INTO period_questions (id, period_id, text, kind, scope, order_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PERIOD_QUESTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(period_id)
        .bind(&question.text)
        .bind(question.kind)
        .bind(question.scope)
        .bind(base + offset as i32)
        .fetch_one(&mut *tx)
        .await?;
        out.push(row);
    }
    tx.commit().await?;
    Ok(out)
}

// ---------- Assignments ----------

const ASSIGNMENT_COLUMNS: &str = "id, period_id, evaluator_id, evaluator_name, evaluatee_id, evaluatee_name, relationship, status, created_at";

pub async fn list_assignments(pool: &PgPool, period_id: Uuid) -> Result<Vec<Assignment>> {
    let rows = sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM period_assignments WHERE period_id = $1 ORDER BY created_at ASC"
    ))
    .bind(period_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_assignment(pool: &PgPool, id: Uuid) -> Result<Option<Assignment>> {
    let row = sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM period_assignments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts the expanded record set all-or-nothing.
pub async fn insert_assignments(
    pool: &PgPool,
    period_id: Uuid,
    records: &[crate::domain::assignment_rules::NewAssignment],
) -> Result<Vec<Assignment>> {
    let mut tx = pool.begin().await?;
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let row = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO period_assignments
                (id, period_id, evaluator_id, evaluator_name, evaluatee_id, evaluatee_name, relationship)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(period_id)
        .bind(record.evaluator_id)
        .bind(&record.evaluator_name)
        .bind(record.evaluatee_id)
        .bind(&record.evaluatee_name)
        .bind(&record.relationship)
        .fetch_one(&mut *tx)
        .await?;
        out.push(row);
    }
    tx.commit().await?;
    Ok(out)
}

pub async fn delete_assignment(pool: &PgPool, period_id: Uuid, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM period_assignments WHERE id = $2 AND period_id = $1")
        .bind(period_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_assignments_batch(pool: &PgPool, period_id: Uuid, ids: &[Uuid]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM period_assignments WHERE period_id = $1 AND id = ANY($2)")
        .bind(period_id)
        .bind(ids)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected())
}

/// Pending work for an evaluator across published, non-archived periods.
pub async fn list_pending_assignments_for(pool: &PgPool, evaluator_id: Uuid) -> Result<Vec<Assignment>> {
    let rows = sqlx::query_as::<_, Assignment>(
        r#"
        SELECT a.id, a.period_id, a.evaluator_id, a.evaluator_name,
               a.evaluatee_id, a.evaluatee_name, a.relationship, a.status, a.created_at
        FROM period_assignments a
        JOIN periods p ON p.id = a.period_id
        WHERE a.evaluator_id = $1
          AND a.status = 'pending'
          AND p.status = 'published'
          AND NOT p.archived
        ORDER BY a.created_at ASC
        "#,
    )
    .bind(evaluator_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ---------- Evaluations ----------

const EVALUATION_COLUMNS: &str = "id, assignment_id, period_id, evaluator_id, evaluator_name, evaluatee_id, evaluatee_name, relationship, responses, shared, archived, submitted_at";

#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(Box<Evaluation>),
    AlreadyCompleted,
}

/// Inserts the evaluation and flips its assignment pending -> completed in
/// one transaction. The guarded update makes the transition happen exactly
/// once; a second submission rolls back.
pub async fn submit_evaluation(
    pool: &PgPool,
    assignment: &Assignment,
    responses: &HashMap<Uuid, Answer>,
) -> Result<SubmitOutcome> {
    let mut tx = pool.begin().await?;

    let flipped = sqlx::query(
        "UPDATE period_assignments SET status = 'completed' WHERE id = $1 AND status = 'pending'",
    )
    .bind(assignment.id)
    .execute(&mut *tx)
    .await?;
    if flipped.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(SubmitOutcome::AlreadyCompleted);
    }

    let evaluation = sqlx::query_as::<_, Evaluation>(&format!(
        r#"
        INSERT INTO evaluations
            (id, assignment_id, period_id, evaluator_id, evaluator_name,
             evaluatee_id, evaluatee_name, relationship, responses)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {EVALUATION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(assignment.id)
    .bind(assignment.period_id)
    .bind(assignment.evaluator_id)
    .bind(&assignment.evaluator_name)
    .bind(assignment.evaluatee_id)
    .bind(&assignment.evaluatee_name)
    .bind(&assignment.relationship)
    .bind(Json(responses))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(SubmitOutcome::Submitted(Box::new(evaluation)))
}

pub async fn list_evaluations(pool: &PgPool, period_id: Option<Uuid>) -> Result<Vec<Evaluation>> {
    let rows = match period_id {
        Some(period_id) => {
            sqlx::query_as::<_, Evaluation>(&format!(
                "SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE period_id = $1 ORDER BY submitted_at DESC"
            ))
            .bind(period_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Evaluation>(&format!(
                "SELECT {EVALUATION_COLUMNS} FROM evaluations ORDER BY submitted_at DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Evaluations are immutable after submission except these two flags.
pub async fn set_evaluation_flags(
    pool: &PgPool,
    id: Uuid,
    shared: Option<bool>,
    archived: Option<bool>,
) -> Result<Option<Evaluation>> {
    let row = sqlx::query_as::<_, Evaluation>(&format!(
        r#"
        UPDATE evaluations
        SET shared = COALESCE($2, shared),
            archived = COALESCE($3, archived)
        WHERE id = $1
        RETURNING {EVALUATION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(shared)
    .bind(archived)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Shareable feedback targeting one employee, most recent first. Legacy rows
/// without an evaluatee id fall back to a display-name match.
pub async fn list_shared_evaluations_for(
    pool: &PgPool,
    evaluatee_id: Uuid,
    display_name: &str,
) -> Result<Vec<Evaluation>> {
    let rows = sqlx::query_as::<_, Evaluation>(&format!(
        r#"
        SELECT {EVALUATION_COLUMNS}
        FROM evaluations
        WHERE shared AND NOT archived
          AND (evaluatee_id = $1 OR (evaluatee_id IS NULL AND evaluatee_name = $2))
        ORDER BY submitted_at DESC
        "#
    ))
    .bind(evaluatee_id)
    .bind(display_name)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Question ids and kinds the aggregator needs: the global bank plus the
/// nested questions of the given periods.
pub async fn list_summary_questions(
    pool: &PgPool,
    period_ids: &[Uuid],
) -> Result<Vec<(Uuid, QuestionKind)>> {
    let rows = sqlx::query_as::<_, (Uuid, QuestionKind)>(
        r#"
        SELECT id, kind FROM questions
        UNION ALL
        SELECT id, kind FROM period_questions WHERE period_id = ANY($1)
        "#,
    )
    .bind(period_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ---------- Counts ----------

pub async fn count_rows(pool: &PgPool, table: &str) -> Result<i64> {
    // Table names come from a fixed whitelist in the overview handler, never
    // from request input.
    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_assignments_by_status(
    pool: &PgPool,
    period_id: Uuid,
    status: AssignmentStatus,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM period_assignments WHERE period_id = $1 AND status = $2",
    )
    .bind(period_id)
    .bind(status)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
