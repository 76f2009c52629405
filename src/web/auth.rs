use crate::db;
use crate::state::SharedState;
use crate::web::session::{self, UserSession};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// How long an identity assertion stays exchangeable.
const ASSERTION_WINDOW_SECS: i64 = 300;

/// What the external identity gateway signs after it authenticates a user.
/// Sign-in itself (passwords, OAuth redirects) lives entirely on that side;
/// this service only verifies the envelope and mirrors the profile.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityAssertion {
    pub provider_uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub issued_at: i64,
}

#[derive(Deserialize)]
pub struct SessionRequest {
    pub assertion: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: db::DbUser,
    pub is_admin: bool,
    pub can_manage_team: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/session", post(create_session))
        .route("/session", delete(destroy_session))
        .route("/me", get(me))
        .with_state(state)
}

fn session_cookie(token: &str) -> Result<HeaderMap, StatusCode> {
    let is_production = std::env::var("PRODUCTION").is_ok();
    let secure_flag = if is_production { "; Secure" } else { "" };

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("session={token}; HttpOnly; SameSite=Lax; Path=/{secure_flag}")
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );
    Ok(headers)
}

async fn create_session(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ip = addr.ip().to_string();
    if !state.session_rate_limiter.check(&ip).await {
        tracing::warn!("Session exchange rate limit exceeded for IP: {}", ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let assertion_bytes = session::verify_envelope(&payload.assertion, &state.identity_key)
        .map_err(|e| {
            tracing::warn!("Identity assertion rejected: {}", e);
            StatusCode::UNAUTHORIZED
        })?;
    let assertion: IdentityAssertion =
        serde_json::from_slice(&assertion_bytes).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let age = Utc::now().timestamp() - assertion.issued_at;
    if !(0..=ASSERTION_WINDOW_SECS).contains(&age) {
        tracing::warn!(
            "Stale identity assertion for {} (age {}s)",
            assertion.provider_uid,
            age
        );
        return Err(StatusCode::UNAUTHORIZED);
    }

    if assertion.email.trim().is_empty() || assertion.display_name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let email = assertion.email.trim().to_lowercase();
    let initial_role = if state.admin_emails.iter().any(|e| e == &email) {
        "Admin"
    } else {
        "Employee"
    };

    let user = db::upsert_mirrored_user(
        &state.pool,
        &assertion.provider_uid,
        &email,
        assertion.display_name.trim(),
        assertion.photo_url.as_deref(),
        initial_role,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to mirror user {}: {}", assertion.provider_uid, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let token = session::sign_session(user.id, &user.role, &state.session_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let headers = session_cookie(&token)?;

    tracing::info!("User {} signed in", user.id);
    Ok((headers, Json(user)))
}

async fn destroy_session(
    UserSession(user_id): UserSession,
) -> Result<impl IntoResponse, StatusCode> {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );
    tracing::info!("User {} signed out", user_id);
    Ok((headers, StatusCode::NO_CONTENT))
}

async fn me(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<MeResponse>, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // A deleted role leaves the name dangling; that just means no flags.
    let role = db::find_role_by_name(&state.pool, &user.role)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let (is_admin, can_manage_team) = role
        .map(|r| (r.is_admin, r.can_manage_team))
        .unwrap_or((false, false));

    Ok(Json(MeResponse {
        user,
        is_admin,
        can_manage_team,
    }))
}

/// Builds a signed assertion the way the identity gateway does.
#[cfg(test)]
fn sign_assertion(assertion: &IdentityAssertion, key: &[u8]) -> String {
    use base64::{engine::general_purpose, Engine as _};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let payload = serde_json::to_vec(assertion).unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
    mac.update(&payload);
    let sig = mac.finalize().into_bytes();
    format!(
        "{}.{}",
        general_purpose::STANDARD.encode(&payload),
        general_purpose::STANDARD.encode(sig)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_envelope_roundtrip() {
        let key = b"gateway-shared-key";
        let assertion = IdentityAssertion {
            provider_uid: "uid-123".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
            photo_url: None,
            issued_at: Utc::now().timestamp(),
        };

        let token = sign_assertion(&assertion, key);
        let bytes = session::verify_envelope(&token, key).unwrap();
        let parsed: IdentityAssertion = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.provider_uid, "uid-123");

        assert!(session::verify_envelope(&token, b"wrong-key").is_err());
    }
}
