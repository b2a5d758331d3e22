//! Public token-gated endpoints. These are the only routes reachable
//! without a session; a respondent holds nothing but the single-use
//! response token from their invitation email.

use crate::analytics::run_stats::{self, ResponseSummary};
use crate::db;
use crate::domain::models::{days_until_due, SurveyQuestion};
use crate::domain::respond::{check_gates, validate_answers, GateRefusal};
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) static RESPOND_RATE_LIMITER: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(30, 60));

#[derive(Serialize)]
pub struct SurveyFormView {
    pub survey_run_id: Uuid,
    pub survey: FormSurvey,
    pub subject: FormSubject,
    pub respondent: FormRespondent,
    pub due_date: DateTime<Utc>,
    pub days_until_due: i64,
}

#[derive(Serialize)]
pub struct FormSurvey {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub survey_type: String,
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Serialize)]
pub struct FormSubject {
    pub name: String,
    pub position: Option<String>,
    pub department: Option<String>,
}

#[derive(Serialize)]
pub struct FormRespondent {
    pub name: String,
    pub relationship: String,
    pub weight: i32,
}

#[derive(Deserialize)]
pub struct SubmitPayload {
    #[serde(default)]
    pub responses: HashMap<String, i32>,
}

#[derive(Serialize)]
pub struct SubmitReceipt {
    pub response_id: Uuid,
    pub survey_run_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub run_completed: bool,
    pub summary: ResponseSummary,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:token", get(get_form).post(submit))
        .with_state(state)
}

/// Everything a gated request needs, resolved from the token in one pass.
struct TokenContext {
    run: db::DbSurveyRun,
    assignment: db::DbRunRespondent,
    survey: db::DbSurvey,
    subject: db::DbSubject,
    respondent: db::DbRespondent,
}

async fn resolve_token(state: &SharedState, token: &str) -> Result<TokenContext, ApiError> {
    let response_exists = db::response_exists_for_token(&state.pool, token).await?;

    let Some((run, assignment)) = db::find_assignment_by_token(&state.pool, token).await? else {
        return Err(ApiError::not_found("survey not found"));
    };

    check_gates(run.status, run.due_date, response_exists, Utc::now()).map_err(|refusal| {
        match refusal {
            GateRefusal::AlreadyCompleted => ApiError::Conflict(
                "a response has already been submitted for this invitation".to_string(),
            ),
            GateRefusal::NotActive => ApiError::InvalidState(
                "this survey is no longer accepting responses".to_string(),
            ),
            GateRefusal::Expired => {
                ApiError::Expired("this survey has passed its due date".to_string())
            }
        }
    })?;

    // The foreign keys guarantee these rows exist; missing means a broken
    // database, not a bad request.
    let survey = db::find_survey_by_id(&state.pool, run.survey_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("survey {} missing", run.survey_id)))?;
    let subject = db::find_subject_by_id(&state.pool, run.subject_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("subject {} missing", run.subject_id)))?;
    let respondent = db::find_respondent_by_id(&state.pool, assignment.respondent_id)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!(
                "respondent {} missing",
                assignment.respondent_id
            ))
        })?;

    Ok(TokenContext {
        run,
        assignment,
        survey,
        subject,
        respondent,
    })
}

async fn rate_limit(headers: &HeaderMap) -> Result<(), ApiError> {
    let ip = super::client_ip(headers);
    if !RESPOND_RATE_LIMITER.check(&ip).await {
        tracing::warn!("Respond rate limit exceeded for IP: {ip}");
        return Err(ApiError::RateLimited);
    }
    Ok(())
}

async fn get_form(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<Json<SurveyFormView>, ApiError> {
    rate_limit(&headers).await?;

    let ctx = resolve_token(&state, &token).await?;
    let now = Utc::now();

    Ok(Json(SurveyFormView {
        survey_run_id: ctx.run.id,
        survey: FormSurvey {
            id: ctx.survey.id,
            title: ctx.survey.title,
            description: ctx.survey.description,
            survey_type: ctx.survey.survey_type,
            questions: ctx.survey.questions.0,
        },
        subject: FormSubject {
            name: ctx.subject.name,
            position: ctx.subject.position,
            department: ctx.subject.department,
        },
        respondent: FormRespondent {
            name: ctx.respondent.name,
            relationship: ctx.assignment.relationship,
            weight: ctx.assignment.weight,
        },
        due_date: ctx.run.due_date,
        days_until_due: days_until_due(ctx.run.due_date, now),
    }))
}

async fn submit(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Path(token): Path<String>,
    Json(payload): Json<SubmitPayload>,
) -> Result<Json<SubmitReceipt>, ApiError> {
    rate_limit(&headers).await?;

    let ctx = resolve_token(&state, &token).await?;

    let errors = validate_answers(&payload.responses, &ctx.survey.questions.0);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let record = db::record_submission(
        &state.pool,
        &ctx.run,
        ctx.assignment.respondent_id,
        &token,
        &payload.responses,
    )
    .await?
    .ok_or_else(|| {
        ApiError::Conflict("a response has already been submitted for this invitation".to_string())
    })?;

    tracing::info!(
        "Response {} recorded for run {} (completed: {})",
        record.response_id,
        ctx.run.id,
        record.run_completed
    );

    // Confirmation email is best effort; the submission already committed.
    state
        .mailer
        .send_completion_confirmation(
            &ctx.respondent.email,
            &ctx.respondent.name,
            &ctx.subject.name,
            &ctx.survey.title,
        )
        .await;

    Ok(Json(SubmitReceipt {
        response_id: record.response_id,
        survey_run_id: ctx.run.id,
        submitted_at: record.submitted_at,
        run_completed: record.run_completed,
        summary: run_stats::response_summary(&payload.responses),
    }))
}
