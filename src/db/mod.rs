pub mod seed;

use crate::domain::models::{
    AccountRole, AssignmentStatus, CompletionStats, RosterEntry, RunStatus, SurveyQuestion,
    SurveyStatus,
};
use anyhow::Result;
use argon2::password_hash::{rand_core::OsRng as HashRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: Uuid,
    pub email: String,
    pub hash: String,
    pub name: String,
    pub role: AccountRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSurvey {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub survey_type: String,
    pub status: SurveyStatus,
    pub questions: Json<Vec<SurveyQuestion>>,
    pub due_date: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbSubject {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub surveys_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbRespondent {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub email: String,
    pub relationship: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSurveyRun {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub subject_id: Uuid,
    pub account_id: Uuid,
    pub launched_by: Uuid,
    pub status: RunStatus,
    pub due_date: DateTime<Utc>,
    pub launched_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response_count: i32,
    pub completion_rate: f64,
    pub total_weight: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row struct only; the response_token stays out of every admin-facing
/// serialization, so this deliberately does not derive Serialize.
#[derive(Debug, Clone, FromRow)]
pub struct DbRunRespondent {
    pub run_id: Uuid,
    pub respondent_id: Uuid,
    pub weight: i32,
    pub relationship: String,
    pub status: AssignmentStatus,
    pub invited_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response_token: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSurveyResponse {
    pub id: Uuid,
    pub survey_run_id: Uuid,
    pub survey_id: Uuid,
    pub respondent_id: Uuid,
    pub response_token: String,
    pub answers: Json<HashMap<String, i32>>,
    pub submitted_at: DateTime<Utc>,
}

// ---------- password hashing ----------

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut HashRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ---------- accounts ----------

pub async fn find_account_by_email(pool: &PgPool, email: &str) -> Result<Option<DbAccount>> {
    let account = sqlx::query_as::<_, DbAccount>(
        r#"
        SELECT id, email, hash, name, role, is_active, created_at
        FROM accounts
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn find_account_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbAccount>> {
    let account = sqlx::query_as::<_, DbAccount>(
        r#"
        SELECT id, email, hash, name, role, is_active, created_at
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn create_account(
    pool: &PgPool,
    email: &str,
    hash: &str,
    name: &str,
    role: AccountRole,
) -> Result<DbAccount> {
    let account = sqlx::query_as::<_, DbAccount>(
        r#"
        INSERT INTO accounts (id, email, hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, hash, name, role, is_active, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hash)
    .bind(name)
    .bind(role)
    .fetch_one(pool)
    .await?;
    Ok(account)
}

pub async fn count_accounts(pool: &PgPool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ---------- surveys ----------

pub struct NewSurvey {
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub survey_type: String,
    pub status: SurveyStatus,
    pub questions: Vec<SurveyQuestion>,
    pub due_date: Option<DateTime<Utc>>,
}

pub async fn create_survey(pool: &PgPool, survey: NewSurvey) -> Result<DbSurvey> {
    let row = sqlx::query_as::<_, DbSurvey>(
        r#"
        INSERT INTO surveys
            (id, account_id, created_by, title, description, survey_type, status, questions, due_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(survey.account_id)
    .bind(survey.created_by)
    .bind(&survey.title)
    .bind(&survey.description)
    .bind(&survey.survey_type)
    .bind(survey.status)
    .bind(Json(&survey.questions))
    .bind(survey.due_date)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find_survey_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbSurvey>> {
    let survey = sqlx::query_as::<_, DbSurvey>("SELECT * FROM surveys WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(survey)
}

pub async fn list_surveys_by_account(pool: &PgPool, account_id: Uuid) -> Result<Vec<DbSurvey>> {
    let surveys = sqlx::query_as::<_, DbSurvey>(
        r#"
        SELECT * FROM surveys
        WHERE account_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(surveys)
}

/// Move a survey between lifecycle statuses, guarded by the expected
/// current status. Returns false when the survey was not in that status.
pub async fn transition_survey_status(
    pool: &PgPool,
    id: Uuid,
    from: &[SurveyStatus],
    to: SurveyStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE surveys
        SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status = ANY($3)
        "#,
    )
    .bind(id)
    .bind(to)
    .bind(from)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn approve_survey(pool: &PgPool, id: Uuid, approver: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE surveys
        SET status = 'approved', approved_by = $2, approved_at = NOW(),
            rejection_reason = NULL, updated_at = NOW()
        WHERE id = $1 AND status = 'pending_approval'
        "#,
    )
    .bind(id)
    .bind(approver)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn reject_survey(pool: &PgPool, id: Uuid, approver: Uuid, reason: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE surveys
        SET status = 'rejected', approved_by = $2, approved_at = NOW(),
            rejection_reason = $3, updated_at = NOW()
        WHERE id = $1 AND status = 'pending_approval'
        "#,
    )
    .bind(id)
    .bind(approver)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

// ---------- subjects ----------

pub async fn create_subject(
    pool: &PgPool,
    account_id: Uuid,
    name: &str,
    email: Option<&str>,
    position: Option<&str>,
    department: Option<&str>,
) -> Result<DbSubject> {
    let subject = sqlx::query_as::<_, DbSubject>(
        r#"
        INSERT INTO subjects (id, account_id, name, email, position, department)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account_id)
    .bind(name)
    .bind(email)
    .bind(position)
    .bind(department)
    .fetch_one(pool)
    .await?;
    Ok(subject)
}

pub async fn find_subject_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbSubject>> {
    let subject = sqlx::query_as::<_, DbSubject>("SELECT * FROM subjects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(subject)
}

pub async fn list_subjects_by_account(pool: &PgPool, account_id: Uuid) -> Result<Vec<DbSubject>> {
    let subjects = sqlx::query_as::<_, DbSubject>(
        r#"
        SELECT * FROM subjects
        WHERE account_id = $1 AND is_active = TRUE
        ORDER BY created_at DESC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(subjects)
}

// ---------- respondents ----------

pub async fn create_respondent(
    pool: &PgPool,
    subject_id: Uuid,
    name: &str,
    email: &str,
    relationship: &str,
) -> Result<DbRespondent> {
    let respondent = sqlx::query_as::<_, DbRespondent>(
        r#"
        INSERT INTO respondents (id, subject_id, name, email, relationship)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subject_id)
    .bind(name)
    .bind(email)
    .bind(relationship)
    .fetch_one(pool)
    .await?;
    Ok(respondent)
}

pub async fn find_respondent_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbRespondent>> {
    let respondent = sqlx::query_as::<_, DbRespondent>("SELECT * FROM respondents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(respondent)
}

pub async fn list_respondents_by_subject(
    pool: &PgPool,
    subject_id: Uuid,
) -> Result<Vec<DbRespondent>> {
    let respondents = sqlx::query_as::<_, DbRespondent>(
        r#"
        SELECT * FROM respondents
        WHERE subject_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;
    Ok(respondents)
}

// ---------- survey runs ----------

pub async fn find_active_run_id(
    pool: &PgPool,
    survey_id: Uuid,
    subject_id: Uuid,
) -> Result<Option<Uuid>> {
    let id: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM survey_runs
        WHERE survey_id = $1 AND subject_id = $2 AND status = 'active'
        "#,
    )
    .bind(survey_id)
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Persist a run together with its full respondent roster (all pending)
/// and bump the subject's running survey count, atomically.
pub async fn create_survey_run(
    pool: &PgPool,
    survey_id: Uuid,
    subject_id: Uuid,
    account_id: Uuid,
    launched_by: Uuid,
    due_date: DateTime<Utc>,
    roster: &[(RosterEntry, String)],
) -> Result<DbSurveyRun> {
    let mut tx = pool.begin().await?;

    let run = sqlx::query_as::<_, DbSurveyRun>(
        r#"
        INSERT INTO survey_runs
            (id, survey_id, subject_id, account_id, launched_by, due_date, total_weight)
        VALUES ($1, $2, $3, $4, $5, $6, 100)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(survey_id)
    .bind(subject_id)
    .bind(account_id)
    .bind(launched_by)
    .bind(due_date)
    .fetch_one(&mut *tx)
    .await?;

    for (entry, token) in roster {
        sqlx::query(
            r#"
            INSERT INTO run_respondents
                (run_id, respondent_id, weight, relationship, response_token)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(run.id)
        .bind(entry.respondent_id)
        .bind(entry.weight)
        .bind(&entry.relationship)
        .bind(token)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE subjects SET surveys_count = surveys_count + 1 WHERE id = $1")
        .bind(subject_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(run)
}

pub async fn find_run_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbSurveyRun>> {
    let run = sqlx::query_as::<_, DbSurveyRun>("SELECT * FROM survey_runs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(run)
}

pub async fn list_runs_by_account(pool: &PgPool, account_id: Uuid) -> Result<Vec<DbSurveyRun>> {
    let runs = sqlx::query_as::<_, DbSurveyRun>(
        r#"
        SELECT * FROM survey_runs
        WHERE account_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(runs)
}

pub async fn list_assignments(pool: &PgPool, run_id: Uuid) -> Result<Vec<DbRunRespondent>> {
    let assignments = sqlx::query_as::<_, DbRunRespondent>(
        r#"
        SELECT * FROM run_respondents
        WHERE run_id = $1
        ORDER BY invited_at
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}

/// Resolve a response token to its run and assignment.
pub async fn find_assignment_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<(DbSurveyRun, DbRunRespondent)>> {
    let assignment = sqlx::query_as::<_, DbRunRespondent>(
        "SELECT * FROM run_respondents WHERE response_token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(assignment) = assignment else {
        return Ok(None);
    };

    let run = find_run_by_id(pool, assignment.run_id).await?;
    Ok(run.map(|run| (run, assignment)))
}

pub async fn cancel_run(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE survey_runs
        SET status = 'cancelled', updated_at = NOW()
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Flip every overdue active run to expired. Returns the number expired.
pub async fn expire_overdue_runs(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE survey_runs
        SET status = 'expired', updated_at = NOW()
        WHERE status = 'active' AND due_date < NOW()
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ---------- survey responses ----------

pub async fn response_exists_for_token(pool: &PgPool, token: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM survey_responses WHERE response_token = $1)")
            .bind(token)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

pub async fn list_responses_by_run(pool: &PgPool, run_id: Uuid) -> Result<Vec<DbSurveyResponse>> {
    let responses = sqlx::query_as::<_, DbSurveyResponse>(
        r#"
        SELECT * FROM survey_responses
        WHERE survey_run_id = $1
        ORDER BY submitted_at
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;
    Ok(responses)
}

#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub response_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub run_completed: bool,
}

/// Persist a submission and all its run-side effects in one transaction:
/// insert the response, flip the assignment to completed, recompute the
/// run's counters, and auto-complete the run once the roster is done.
///
/// Returns None when a response for this token was inserted concurrently;
/// the unique constraint on response_token makes the token single-use even
/// across racing requests.
pub async fn record_submission(
    pool: &PgPool,
    run: &DbSurveyRun,
    respondent_id: Uuid,
    token: &str,
    answers: &HashMap<String, i32>,
) -> Result<Option<SubmissionRecord>> {
    let mut tx = pool.begin().await?;

    let inserted: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
        r#"
        INSERT INTO survey_responses
            (id, survey_run_id, survey_id, respondent_id, response_token, answers)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (response_token) DO NOTHING
        RETURNING id, submitted_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(run.id)
    .bind(run.survey_id)
    .bind(respondent_id)
    .bind(token)
    .bind(Json(answers))
    .fetch_optional(&mut *tx)
    .await?;

    let Some((response_id, submitted_at)) = inserted else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        r#"
        UPDATE run_respondents
        SET status = 'completed', completed_at = $3
        WHERE run_id = $1 AND respondent_id = $2
        "#,
    )
    .bind(run.id)
    .bind(respondent_id)
    .bind(submitted_at)
    .execute(&mut *tx)
    .await?;

    let statuses: Vec<AssignmentStatus> = sqlx::query_scalar(
        "SELECT status FROM run_respondents WHERE run_id = $1",
    )
    .bind(run.id)
    .fetch_all(&mut *tx)
    .await?;

    let stats = CompletionStats::from_statuses(&statuses);
    let run_completed = stats.all_completed();

    if run_completed {
        sqlx::query(
            r#"
            UPDATE survey_runs
            SET response_count = $2, completion_rate = $3,
                status = 'completed', completed_at = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(stats.completed)
        .bind(stats.completion_rate)
        .bind(submitted_at)
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(
            r#"
            UPDATE survey_runs
            SET response_count = $2, completion_rate = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(stats.completed)
        .bind(stats.completion_rate)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(Some(SubmissionRecord {
        response_id,
        submitted_at,
        run_completed,
    }))
}
