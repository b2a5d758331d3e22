use crate::db::{self, NewSurvey};
use crate::domain::launch::{validate_launch, LaunchRequest};
use crate::domain::models::{AccountRole, RunStatus, SurveyQuestion, SurveyStatus};
use crate::state::SharedState;
use crate::token;
use crate::web::error::ApiError;
use crate::web::session::AuthSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateSurveyPayload {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub survey_type: Option<String>,
    #[serde(default)]
    pub questions: Vec<SurveyQuestion>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct RejectPayload {
    #[serde(default)]
    pub reason: String,
}

/// Admin-facing survey projection. Never includes response tokens.
#[derive(Serialize)]
pub struct SurveyView {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub survey_type: String,
    pub status: SurveyStatus,
    pub questions: Vec<SurveyQuestion>,
    pub due_date: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<db::DbSurvey> for SurveyView {
    fn from(s: db::DbSurvey) -> Self {
        Self {
            id: s.id,
            account_id: s.account_id,
            created_by: s.created_by,
            title: s.title,
            description: s.description,
            survey_type: s.survey_type,
            status: s.status,
            questions: s.questions.0,
            due_date: s.due_date,
            approved_by: s.approved_by,
            approved_at: s.approved_at,
            rejection_reason: s.rejection_reason,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct InvitationOutcome {
    pub respondent_id: Uuid,
    pub email: String,
    pub sent: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct LaunchReceipt {
    pub survey_run_id: Uuid,
    pub survey_id: Uuid,
    pub subject_id: Uuid,
    pub status: RunStatus,
    pub due_date: DateTime<Utc>,
    pub respondent_count: usize,
    pub invitations_sent: usize,
    pub invitations: Vec<InvitationOutcome>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(create_survey).get(list_surveys))
        .route("/:id", get(get_survey))
        .route("/:id/submit", post(submit_for_approval))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/run", post(launch_run))
        .with_state(state)
}

fn validate_survey_payload(payload: &CreateSurveyPayload) -> Vec<String> {
    let mut errors = Vec::new();

    if payload.title.trim().is_empty() {
        errors.push("title is required".to_string());
    }
    if payload.questions.is_empty() {
        errors.push("questions must be a non-empty list".to_string());
    }

    let mut seen = HashSet::new();
    for (idx, question) in payload.questions.iter().enumerate() {
        if question.id.trim().is_empty() {
            errors.push(format!("question #{}: id is required", idx + 1));
        } else if !seen.insert(question.id.as_str()) {
            errors.push(format!("question #{}: duplicate id {}", idx + 1, question.id));
        }
        if question.text.trim().is_empty() {
            errors.push(format!("question #{}: text is required", idx + 1));
        }
    }

    errors
}

async fn create_survey(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateSurveyPayload>,
) -> Result<(StatusCode, Json<SurveyView>), ApiError> {
    let errors = validate_survey_payload(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Domain admin creations skip the draft stage and go straight into the
    // approval queue.
    let status = match claims.role {
        AccountRole::DomainAdmin => SurveyStatus::PendingApproval,
        _ => SurveyStatus::Draft,
    };

    let survey = db::create_survey(
        &state.pool,
        NewSurvey {
            account_id: claims.account_id,
            created_by: claims.account_id,
            title: payload.title.trim().to_string(),
            description: payload.description,
            survey_type: payload
                .survey_type
                .unwrap_or_else(|| "360_feedback".to_string()),
            status,
            questions: payload.questions,
            due_date: payload.due_date,
        },
    )
    .await?;

    tracing::info!("Survey {} created by account {}", survey.id, claims.account_id);
    Ok((StatusCode::CREATED, Json(survey.into())))
}

async fn list_surveys(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<SurveyView>>, ApiError> {
    let surveys = db::list_surveys_by_account(&state.pool, claims.account_id).await?;
    Ok(Json(surveys.into_iter().map(SurveyView::from).collect()))
}

async fn get_survey(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SurveyView>, ApiError> {
    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey not found"))?;
    super::ensure_owner(&claims, survey.account_id)?;
    Ok(Json(survey.into()))
}

async fn submit_for_approval(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SurveyView>, ApiError> {
    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey not found"))?;
    super::ensure_owner(&claims, survey.account_id)?;

    let moved = db::transition_survey_status(
        &state.pool,
        id,
        &[SurveyStatus::Draft, SurveyStatus::Rejected],
        SurveyStatus::PendingApproval,
    )
    .await?;
    if !moved {
        return Err(ApiError::InvalidState(
            "only draft or rejected surveys can be submitted for approval".to_string(),
        ));
    }

    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey not found"))?;
    Ok(Json(survey.into()))
}

async fn approve(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SurveyView>, ApiError> {
    if claims.role != AccountRole::SysAdmin {
        return Err(ApiError::Forbidden);
    }

    let approved = db::approve_survey(&state.pool, id, claims.account_id).await?;
    if !approved {
        // Distinguish a missing survey from one in the wrong status.
        let survey = db::find_survey_by_id(&state.pool, id)
            .await?
            .ok_or_else(|| ApiError::not_found("survey not found"))?;
        return Err(ApiError::InvalidState(format!(
            "survey is not pending approval (status: {:?})",
            survey.status
        )));
    }

    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey not found"))?;
    tracing::info!("Survey {} approved by {}", id, claims.account_id);
    Ok(Json(survey.into()))
}

async fn reject(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<Json<SurveyView>, ApiError> {
    if claims.role != AccountRole::SysAdmin {
        return Err(ApiError::Forbidden);
    }
    if payload.reason.trim().is_empty() {
        return Err(ApiError::Validation(vec![
            "a rejection reason is required".to_string(),
        ]));
    }

    let rejected = db::reject_survey(&state.pool, id, claims.account_id, payload.reason.trim()).await?;
    if !rejected {
        let survey = db::find_survey_by_id(&state.pool, id)
            .await?
            .ok_or_else(|| ApiError::not_found("survey not found"))?;
        return Err(ApiError::InvalidState(format!(
            "survey is not pending approval (status: {:?})",
            survey.status
        )));
    }

    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey not found"))?;
    tracing::info!("Survey {} rejected by {}", id, claims.account_id);
    Ok(Json(survey.into()))
}

async fn launch_run(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<LaunchRequest>,
) -> Result<(StatusCode, Json<LaunchReceipt>), ApiError> {
    let plan = validate_launch(&payload, Utc::now()).map_err(ApiError::Validation)?;

    let survey = db::find_survey_by_id(&state.pool, survey_id)
        .await?
        .ok_or_else(|| ApiError::not_found("survey not found"))?;
    super::ensure_owner(&claims, survey.account_id)?;

    if survey.status != SurveyStatus::Approved {
        return Err(ApiError::InvalidState(format!(
            "survey must be approved before launching (status: {:?})",
            survey.status
        )));
    }

    let subject = db::find_subject_by_id(&state.pool, plan.subject_id)
        .await?
        .ok_or_else(|| ApiError::not_found("subject not found"))?;
    if subject.account_id != survey.account_id {
        return Err(ApiError::Forbidden);
    }

    // The roster must be drawn from the subject's own respondent pool, and
    // each respondent may appear at most once.
    let known: std::collections::HashMap<Uuid, db::DbRespondent> =
        db::list_respondents_by_subject(&state.pool, subject.id)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for entry in &plan.roster {
        if !known.contains_key(&entry.respondent_id) {
            errors.push(format!(
                "respondent {} does not belong to this subject",
                entry.respondent_id
            ));
        }
        if !seen.insert(entry.respondent_id) {
            errors.push(format!(
                "respondent {} appears more than once",
                entry.respondent_id
            ));
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Last gate: at most one active run per survey and subject.
    if let Some(existing) = db::find_active_run_id(&state.pool, survey.id, subject.id).await? {
        return Err(ApiError::Conflict(format!(
            "an active survey run already exists for this survey and subject: {existing}"
        )));
    }

    let roster: Vec<_> = plan
        .roster
        .iter()
        .map(|entry| (entry.clone(), token::generate_response_token()))
        .collect();

    let run = db::create_survey_run(
        &state.pool,
        survey.id,
        subject.id,
        survey.account_id,
        claims.account_id,
        plan.due_date,
        &roster,
    )
    .await?;

    tracing::info!(
        "Survey run {} launched for survey {} with {} respondents",
        run.id,
        survey.id,
        roster.len()
    );

    let mut invitations = Vec::with_capacity(roster.len());
    for (entry, response_token) in &roster {
        // Membership was checked above; the map lookup cannot miss.
        let Some(respondent) = known.get(&entry.respondent_id) else {
            continue;
        };
        let outcome = state
            .mailer
            .send_survey_invitation(
                run.id,
                &respondent.email,
                &respondent.name,
                &subject.name,
                &survey.title,
                response_token,
                run.due_date,
            )
            .await;
        invitations.push(InvitationOutcome {
            respondent_id: entry.respondent_id,
            email: respondent.email.clone(),
            sent: outcome.success,
            message: outcome.message,
        });
    }

    let invitations_sent = invitations.iter().filter(|i| i.sent).count();

    Ok((
        StatusCode::CREATED,
        Json(LaunchReceipt {
            survey_run_id: run.id,
            survey_id: survey.id,
            subject_id: subject.id,
            status: run.status,
            due_date: run.due_date,
            respondent_count: roster.len(),
            invitations_sent,
            invitations,
        }),
    ))
}
