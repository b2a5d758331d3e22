use crate::db;
use crate::domain::models::AccountRole;
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use crate::web::session;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// 5 attempts per 60 seconds per IP against credential stuffing.
pub(crate) static LOGIN_RATE_LIMITER: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(5, 60));

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub account_id: Uuid,
    pub role: AccountRole,
    pub name: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .with_state(state)
}

async fn login(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ip = super::client_ip(&headers);
    if !LOGIN_RATE_LIMITER.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {ip}");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let account = db::find_account_by_email(&state.pool, &payload.email)
        .await
        .map_err(|e| {
            tracing::error!("Account lookup failed: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !account.is_active || !db::verify_password(&account.hash, &payload.password) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = session::sign_session(account.id, account.role, &state.session_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        axum::http::header::SET_COOKIE,
        format!("session={token}; HttpOnly; SameSite=Lax; Path=/")
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );

    tracing::info!("Account {} logged in", account.id);

    Ok((
        response_headers,
        Json(LoginResponse {
            token,
            account_id: account.id,
            role: account.role,
            name: account.name,
        }),
    ))
}
