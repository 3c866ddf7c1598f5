//! Shared-password login and signed session cookies.
//!
//! A session is a small JSON payload (`expires_at`) signed with
//! HMAC-SHA256. The [`require_login`] middleware verifies the cookie and
//! hands the decoded [`AuthSession`] to handlers through request extensions.

use crate::config::AuthConfig;
use crate::server::error::AppError;
use crate::server::flash;
use crate::server::AppContext;
use axum::{
    extract::{Query, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const SESSION_COOKIE_NAME: &str = "imagebed_session";

pub const WRONG_PASSWORD: &str = "Invalid password";
pub const AUTH_NOT_CONFIGURED: &str = "Authentication not configured";

type HmacSha256 = Hmac<Sha256>;

/// Authenticated session, inserted into request extensions by [`require_login`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Unix timestamp (seconds) after which the session is rejected.
    pub expires_at: i64,
}

impl AuthSession {
    pub fn new(timeout_hours: u64) -> Self {
        let timeout = i64::try_from(timeout_hours.saturating_mul(3600)).unwrap_or(i64::MAX);
        Self {
            expires_at: chrono::Utc::now().timestamp().saturating_add(timeout),
        }
    }

    pub fn is_valid(&self) -> bool {
        chrono::Utc::now().timestamp() < self.expires_at
    }
}

/// Key used to sign and verify session cookies.
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// A per-process random key.
    pub fn random() -> Self {
        Self::new(generate_secret())
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        match auth.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Self::new(secret),
            _ => {
                tracing::info!("No session secret configured; sessions will not survive a restart");
                Self::random()
            }
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    /// Encode a session as `<base64url json>.<hex hmac>`.
    pub fn encode(&self, session: &AuthSession) -> String {
        let json = serde_json::to_vec(session).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{payload}.{signature}")
    }

    /// Decode and verify a cookie value. Forged, malformed and expired
    /// sessions all yield `None`.
    pub fn decode(&self, value: &str) -> Option<AuthSession> {
        let (payload, signature) = value.split_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let session: AuthSession = serde_json::from_slice(&json).ok()?;
        session.is_valid().then_some(session)
    }
}

/// Middleware guarding routes that require a logged-in session.
///
/// Unauthenticated requests are redirected to `/login`; GET requests keep
/// their path in `next` so the user lands back where they started.
pub async fn require_login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let session = jar
        .get(SESSION_COOKIE_NAME)
        .and_then(|c| ctx.session_key.decode(c.value()));

    match session {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            let target = if request.method() == Method::GET {
                request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/")
            } else {
                "/"
            };
            tracing::debug!(path = %request.uri().path(), "Unauthenticated request, redirecting to login");
            Redirect::to(&login_location(target)).into_response()
        }
    }
}

/// `/login` URL carrying the page to return to.
pub fn login_location(next: &str) -> String {
    if next == "/" {
        "/login".to_string()
    } else {
        format!("/login?next={}", urlencoding::encode(next))
    }
}

/// Only local absolute paths are accepted as redirect targets.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login form payload
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Show the login form
pub async fn login_page(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());
    let (jar, message) = flash::take(jar);

    match ctx.templates.render_login(&next, message.as_deref()) {
        Ok(page) => (jar, page).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Check the shared password and start a session
pub async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let auth_config = &ctx.config.auth;
    let next = safe_next(form.next.as_deref());

    let Some(password_hash) = auth_config.password_hash.as_deref() else {
        tracing::warn!("Login attempted but no password is configured");
        return login_failure(&ctx, StatusCode::SERVICE_UNAVAILABLE, &next, AUTH_NOT_CONFIGURED);
    };

    match bcrypt::verify(&form.password, password_hash) {
        Ok(true) => {
            let session = AuthSession::new(auth_config.session_timeout_hours);
            let cookie = Cookie::build((SESSION_COOKIE_NAME, ctx.session_key.encode(&session)))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::hours(
                    i64::try_from(auth_config.session_timeout_hours)
                        .unwrap_or(i64::MAX)
                        .min(i64::MAX / 3600),
                ))
                .build();

            tracing::info!("Login successful");
            (jar.add(cookie), Redirect::to(&next)).into_response()
        }
        Ok(false) => {
            tracing::warn!("Rejected login with wrong password");
            login_failure(&ctx, StatusCode::UNAUTHORIZED, &next, WRONG_PASSWORD)
        }
        Err(e) => {
            tracing::error!("Configured password hash is unusable: {}", e);
            login_failure(&ctx, StatusCode::UNAUTHORIZED, &next, WRONG_PASSWORD)
        }
    }
}

fn login_failure(ctx: &AppContext, status: StatusCode, next: &str, message: &str) -> Response {
    match ctx.templates.render_login(next, Some(message)) {
        Ok(page) => (status, page).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Clear the session and return to the login page
pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    (jar.remove(cookie), Redirect::to("/login"))
}

/// Generate a bcrypt password hash
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

/// Generate a random session signing secret
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
