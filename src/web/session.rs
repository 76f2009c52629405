use crate::db;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: Uuid,
    /// Role *name* at sign-in time; the database stays the source of truth
    /// for permission checks.
    pub role: String,
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
}

fn sign_payload(payload: &[u8], key: &[u8]) -> Result<String, SessionError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload);
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload),
        general_purpose::STANDARD.encode(sig)
    ))
}

/// Verifies the `payload.signature` envelope and returns the payload bytes.
pub fn verify_envelope(token: &str, key: &[u8]) -> Result<Vec<u8>, SessionError> {
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

    Ok(payload_bytes)
}

pub fn sign_session(user_id: Uuid, role: &str, key: &[u8]) -> Result<String, SessionError> {
    let claims = SessionClaims {
        user_id,
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(24)).timestamp(),
    };
    let payload = serde_json::to_vec(&claims).map_err(|_| SessionError::Invalid)?;
    sign_payload(&payload, key)
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let payload = verify_envelope(token, key)?;
    let claims: SessionClaims =
        serde_json::from_slice(&payload).map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > claims.exp {
        return Err(SessionError::Expired);
    }
    Ok(claims)
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
                let trimmed = pair.trim();
                if let Some(rest) = trimmed.strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

/// Axum extractor that validates the session and yields the authenticated
/// user id. The user row is re-checked so deleted users lose access
/// immediately.
pub struct UserSession(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = verify_session(&token, &shared_state.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

        let user = db::find_user_by_id(&shared_state.pool, claims.user_id)
            .await
            .map_err(|e| {
                tracing::warn!("User lookup failed for session: {}", e);
                StatusCode::UNAUTHORIZED
            })?;

        if user.is_none() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(UserSession(claims.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = b"test-session-key";
        let user_id = Uuid::new_v4();

        let token = sign_session(user_id, "Engineer", key).unwrap();
        let claims = verify_session(&token, key).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, "Engineer");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let key = b"test-session-key";
        let token = sign_session(Uuid::new_v4(), "Engineer", key).unwrap();

        let mut tampered = token.clone();
        tampered.insert(3, 'x');
        assert!(verify_session(&tampered, key).is_err());

        assert!(verify_session(&token, b"other-key").is_err());
    }

    #[test]
    fn token_extraction_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc.def".parse().unwrap(),
        );
        headers.insert(
            axum::http::header::COOKIE,
            "theme=dark; session=ghi.jkl".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));

        headers.remove(axum::http::header::AUTHORIZATION);
        assert_eq!(extract_token(&headers).as_deref(), Some("ghi.jkl"));
    }
}
