use crate::middleware::RateLimiter;
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState {
    pub pool: PgPool,
    /// Key for the session cookies this service signs.
    pub session_key: Vec<u8>,
    /// Shared key the external identity gateway signs assertions with.
    pub identity_key: Vec<u8>,
    /// Emails mirrored with the Admin role on first sign-in.
    pub admin_emails: Vec<String>,
    pub session_rate_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
