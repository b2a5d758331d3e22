use crate::analytics::run_stats::{self, CompletionSummary};
use crate::db;
use crate::domain::models::{days_until_due, is_overdue, AssignmentStatus, RunStatus};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::AuthSession;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Admin-facing run projection. Assignment tokens never appear here.
#[derive(Serialize)]
pub struct RunView {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub subject_id: Uuid,
    pub status: RunStatus,
    pub due_date: DateTime<Utc>,
    pub launched_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response_count: i32,
    pub completion_rate: f64,
    pub total_weight: i32,
    pub is_overdue: bool,
    pub days_until_due: i64,
    pub respondents: Vec<AssignmentView>,
}

#[derive(Serialize)]
pub struct AssignmentView {
    pub respondent_id: Uuid,
    pub weight: i32,
    pub relationship: String,
    pub status: AssignmentStatus,
    pub invited_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ResponseView {
    pub id: Uuid,
    pub respondent_id: Uuid,
    pub answers: HashMap<String, i32>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct QuestionAnalytics {
    pub question_id: String,
    pub question_text: Option<String>,
    pub average_rating: f64,
    pub total_responses: usize,
    pub ratings_distribution: BTreeMap<u8, u32>,
}

#[derive(Serialize)]
pub struct RunAnalytics {
    pub survey_run_id: Uuid,
    pub status: RunStatus,
    pub expected_responses: usize,
    pub received_responses: usize,
    pub response_rate: f64,
    pub questions: Vec<QuestionAnalytics>,
    pub summary: CompletionSummary,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_runs))
        .route("/:id", get(get_run))
        .route("/:id/responses", get(list_responses))
        .route("/:id/analytics", get(run_analytics))
        .route("/:id/cancel", post(cancel_run))
        .with_state(state)
}

fn build_view(run: db::DbSurveyRun, assignments: Vec<db::DbRunRespondent>) -> RunView {
    let now = Utc::now();
    RunView {
        id: run.id,
        survey_id: run.survey_id,
        subject_id: run.subject_id,
        status: run.status,
        due_date: run.due_date,
        launched_at: run.launched_at,
        completed_at: run.completed_at,
        response_count: run.response_count,
        completion_rate: run.completion_rate,
        total_weight: run.total_weight,
        is_overdue: run.status == RunStatus::Active && is_overdue(run.due_date, now),
        days_until_due: days_until_due(run.due_date, now),
        respondents: assignments
            .into_iter()
            .map(|a| AssignmentView {
                respondent_id: a.respondent_id,
                weight: a.weight,
                relationship: a.relationship,
                status: a.status,
                invited_at: a.invited_at,
                completed_at: a.completed_at,
            })
            .collect(),
    }
}

async fn load_owned_run(
    state: &SharedState,
    claims: &crate::web::session::SessionClaims,
    id: Uuid,
) -> Result<db::DbSurveyRun, ApiError> {
    let run = db::find_run_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey run not found"))?;
    super::ensure_owner(claims, run.account_id)?;
    Ok(run)
}

async fn list_runs(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<RunView>>, ApiError> {
    let runs = db::list_runs_by_account(&state.pool, claims.account_id).await?;
    let mut views = Vec::with_capacity(runs.len());
    for run in runs {
        let assignments = db::list_assignments(&state.pool, run.id).await?;
        views.push(build_view(run, assignments));
    }
    Ok(Json(views))
}

async fn get_run(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunView>, ApiError> {
    let run = load_owned_run(&state, &claims, id).await?;
    let assignments = db::list_assignments(&state.pool, run.id).await?;
    Ok(Json(build_view(run, assignments)))
}

async fn list_responses(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResponseView>>, ApiError> {
    let run = load_owned_run(&state, &claims, id).await?;
    let responses = db::list_responses_by_run(&state.pool, run.id).await?;
    Ok(Json(
        responses
            .into_iter()
            .map(|r| ResponseView {
                id: r.id,
                respondent_id: r.respondent_id,
                answers: r.answers.0,
                submitted_at: r.submitted_at,
            })
            .collect(),
    ))
}

async fn run_analytics(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunAnalytics>, ApiError> {
    let run = load_owned_run(&state, &claims, id).await?;
    let assignments = db::list_assignments(&state.pool, run.id).await?;
    let responses = db::list_responses_by_run(&state.pool, run.id).await?;

    let survey = db::find_survey_by_id(&state.pool, run.survey_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("survey {} missing", run.survey_id)))?;
    let question_texts: HashMap<&str, &str> = survey
        .questions
        .0
        .iter()
        .map(|q| (q.id.as_str(), q.text.as_str()))
        .collect();

    let answer_maps: Vec<HashMap<String, i32>> =
        responses.into_iter().map(|r| r.answers.0).collect();

    let questions = run_stats::per_question_stats(&answer_maps)
        .into_iter()
        .map(|stats| QuestionAnalytics {
            question_text: question_texts
                .get(stats.question_id.as_str())
                .map(|t| t.to_string()),
            question_id: stats.question_id,
            average_rating: stats.average_rating,
            total_responses: stats.total_responses,
            ratings_distribution: stats.ratings_distribution,
        })
        .collect();

    Ok(Json(RunAnalytics {
        survey_run_id: run.id,
        status: run.status,
        expected_responses: assignments.len(),
        received_responses: answer_maps.len(),
        response_rate: run_stats::response_rate(answer_maps.len(), assignments.len()),
        questions,
        summary: run_stats::completion_summary(&answer_maps),
    }))
}

async fn cancel_run(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunView>, ApiError> {
    let run = load_owned_run(&state, &claims, id).await?;

    let cancelled = db::cancel_run(&state.pool, run.id).await?;
    if !cancelled {
        return Err(ApiError::InvalidState(format!(
            "only active runs can be cancelled (status: {:?})",
            run.status
        )));
    }

    tracing::info!("Survey run {} cancelled by {}", run.id, claims.account_id);

    let run = db::find_run_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey run not found"))?;
    let assignments = db::list_assignments(&state.pool, run.id).await?;
    Ok(Json(build_view(run, assignments)))
}
