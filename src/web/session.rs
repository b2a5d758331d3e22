use crate::db;
use crate::domain::models::AccountRole;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub account_id: Uuid,
    pub role: AccountRole,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(account_id: Uuid, role: AccountRole, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(24);
    let payload = format!("{}|{}|{}", account_id, role_string(role), exp.timestamp());
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(SessionError::Invalid);
    }
    let payload_bytes = general_purpose::STANDARD
        .decode(parts[0])
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    if pieces.len() != 3 {
        return Err(SessionError::Invalid);
    }
    let account_id = Uuid::parse_str(pieces[0]).map_err(|_| SessionError::Invalid)?;
    let role = parse_role(pieces[1])?;
    let exp: i64 = pieces[2].parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims {
        account_id,
        role,
        exp,
    })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

fn role_string(role: AccountRole) -> &'static str {
    match role {
        AccountRole::SysAdmin => "sys_admin",
        AccountRole::DomainAdmin => "domain_admin",
        AccountRole::Account => "account",
    }
}

fn parse_role(raw: &str) -> Result<AccountRole, SessionError> {
    match raw {
        "sys_admin" => Ok(AccountRole::SysAdmin),
        "domain_admin" => Ok(AccountRole::DomainAdmin),
        "account" => Ok(AccountRole::Account),
        _ => Err(SessionError::Role),
    }
}

/// Axum extractor that validates the session and yields the claims.
///
/// Usage:
/// ```ignore
/// async fn handler(AuthSession(claims): AuthSession) -> ... {}
/// ```
pub struct AuthSession(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = crate::state::SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = verify_session(&token, &shared.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {e}");
            StatusCode::UNAUTHORIZED
        })?;

        let account = db::find_account_by_id(&shared.pool, claims.account_id)
            .await
            .map_err(|e| {
                tracing::warn!("Account lookup failed for session: {e}");
                StatusCode::UNAUTHORIZED
            })?;

        let Some(account) = account else {
            return Err(StatusCode::UNAUTHORIZED);
        };
        if !account.is_active {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthSession(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn sign_verify_roundtrip() {
        let account_id = Uuid::new_v4();
        let token = sign_session(account_id, AccountRole::Account, KEY).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.account_id, account_id);
        assert_eq!(claims.role, AccountRole::Account);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = sign_session(Uuid::new_v4(), AccountRole::SysAdmin, KEY).unwrap();
        let err = verify_session(&token, b"another-key-entirely-32-bytes!!!").unwrap_err();
        assert!(matches!(err, SessionError::Signature));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for bad in ["", "no-dot-here", "a.b.c", "!!!.???"] {
            assert!(verify_session(bad, KEY).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn bearer_and_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer tok123".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok123"));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "theme=dark; session=tok456".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok456"));
    }
}
