pub mod auth;
pub mod error;
pub mod respond;
pub mod runs;
pub mod session;
pub mod subjects;
pub mod surveys;

use crate::domain::models::AccountRole;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::SessionClaims;
use axum::{http::HeaderMap, routing::get, Router};
use uuid::Uuid;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/surveys", surveys::router(state.clone()))
        .nest("/subjects", subjects::router(state.clone()))
        .nest("/survey-runs", runs::router(state.clone()))
        .nest("/survey/respond", respond::router(state))
}

/// Accounts see their own resources; sys admins see everything.
pub(crate) fn ensure_owner(claims: &SessionClaims, account_id: Uuid) -> Result<(), ApiError> {
    if claims.role == AccountRole::SysAdmin || claims.account_id == account_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Client IP from the X-Forwarded-For header set by the reverse proxy.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

/// Drop elapsed rate-limit windows; scheduled hourly.
pub async fn cleanup_rate_limiters() {
    auth::LOGIN_RATE_LIMITER.cleanup().await;
    respond::RESPOND_RATE_LIMITER.cleanup().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: AccountRole, account_id: Uuid) -> SessionClaims {
        SessionClaims {
            account_id,
            role,
            exp: 0,
        }
    }

    #[test]
    fn owner_and_sys_admin_pass_ownership() {
        let id = Uuid::new_v4();
        assert!(ensure_owner(&claims(AccountRole::Account, id), id).is_ok());
        assert!(ensure_owner(&claims(AccountRole::SysAdmin, Uuid::new_v4()), id).is_ok());
        assert!(ensure_owner(&claims(AccountRole::DomainAdmin, Uuid::new_v4()), id).is_err());
    }

    #[test]
    fn client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers), "203.0.113.9");
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
