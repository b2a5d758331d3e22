use crate::db;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::AuthSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateSubjectPayload {
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateRespondentPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub relationship: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(create_subject).get(list_subjects))
        .route("/:id", get(get_subject))
        .route("/:id/respondents", post(create_respondent).get(list_respondents))
        .with_state(state)
}

async fn create_subject(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateSubjectPayload>,
) -> Result<(StatusCode, Json<db::DbSubject>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation(vec!["name is required".to_string()]));
    }

    let subject = db::create_subject(
        &state.pool,
        claims.account_id,
        payload.name.trim(),
        payload.email.as_deref(),
        payload.position.as_deref(),
        payload.department.as_deref(),
    )
    .await?;

    tracing::info!("Subject {} created by account {}", subject.id, claims.account_id);
    Ok((StatusCode::CREATED, Json(subject)))
}

async fn list_subjects(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::DbSubject>>, ApiError> {
    let subjects = db::list_subjects_by_account(&state.pool, claims.account_id).await?;
    Ok(Json(subjects))
}

async fn load_owned_subject(
    state: &SharedState,
    claims: &crate::web::session::SessionClaims,
    id: Uuid,
) -> Result<db::DbSubject, ApiError> {
    let subject = db::find_subject_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("subject not found"))?;
    super::ensure_owner(claims, subject.account_id)?;
    Ok(subject)
}

async fn get_subject(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::DbSubject>, ApiError> {
    let subject = load_owned_subject(&state, &claims, id).await?;
    Ok(Json(subject))
}

async fn create_respondent(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateRespondentPayload>,
) -> Result<(StatusCode, Json<db::DbRespondent>), ApiError> {
    let subject = load_owned_subject(&state, &claims, id).await?;

    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push("name is required".to_string());
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        errors.push("a valid email is required".to_string());
    }
    if payload.relationship.trim().is_empty() {
        errors.push("relationship is required".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let respondent = db::create_respondent(
        &state.pool,
        subject.id,
        payload.name.trim(),
        payload.email.trim(),
        payload.relationship.trim(),
    )
    .await?;

    tracing::info!("Respondent {} added to subject {}", respondent.id, subject.id);
    Ok((StatusCode::CREATED, Json(respondent)))
}

async fn list_respondents(
    AuthSession(claims): AuthSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<db::DbRespondent>>, ApiError> {
    let subject = load_owned_subject(&state, &claims, id).await?;
    let respondents = db::list_respondents_by_subject(&state.pool, subject.id).await?;
    Ok(Json(respondents))
}
