//! Session verification.
//!
//! Identity lives with the hosted identity provider; this server only needs to know *who* is making a
//! request. The provider issues a compact signed session token:
//!
//! ```text
//!     base64url(payload) "." base64url(hmac_sha256(secret, payload))
//! ```
//!
//! with a JSON payload `{"sub": <user id>, "email": ..., "exp": <unix seconds>}`. The same
//! `TAP_SESSION_SECRET` is shared with the provider, so any token it mints verifies here without a network
//! round trip.
//!
//! Handlers that *require* a session take [`SessionClaims`] directly and fail with a 401. The OAuth
//! handlers instead take `Option<SessionClaims>` and answer "no session" with a redirect to the login
//! page, carrying the original URL as a `return_to` parameter so the flow resumes where it left off.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest, HttpResponse};
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tap_common::Secret;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "tap_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SessionPayload {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    exp: i64,
}

/// Verify a session token against the shared secret and return its claims.
pub fn verify_session_token(secret: &Secret<String>, token: &str) -> Result<SessionClaims, AuthError> {
    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Missing signature separator".to_string()))?;
    let payload_bytes = base64::decode_config(payload_b64, base64::URL_SAFE_NO_PAD)
        .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let signature = base64::decode_config(signature_b64, base64::URL_SAFE_NO_PAD)
        .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let mut mac =
        HmacSha256::new_from_slice(secret.reveal().as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(&payload_bytes);
    mac.verify_slice(&signature).map_err(|e| AuthError::ValidationError(e.to_string()))?;
    let payload: SessionPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    if payload.exp <= Utc::now().timestamp() {
        return Err(AuthError::Expired);
    }
    Ok(SessionClaims { user_id: payload.sub, email: payload.email })
}

/// Mint a session token. In production the identity provider does this; the server-side implementation
/// exists for local development and tests.
pub fn sign_session_token(secret: &Secret<String>, claims: &SessionClaims, expires_at: i64) -> String {
    let payload =
        SessionPayload { sub: claims.user_id.clone(), email: claims.email.clone(), exp: expires_at };
    let payload_bytes = serde_json::to_vec(&payload).expect("Session payload serialization cannot fail");
    let mut mac =
        HmacSha256::new_from_slice(secret.reveal().as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(&payload_bytes);
    let signature = mac.finalize().into_bytes();
    format!(
        "{}.{}",
        base64::encode_config(&payload_bytes, base64::URL_SAFE_NO_PAD),
        base64::encode_config(signature, base64::URL_SAFE_NO_PAD),
    )
}

fn session_from_request(req: &HttpRequest) -> Result<SessionClaims, ServerError> {
    let config = req
        .app_data::<web::Data<AuthConfig>>()
        .ok_or_else(|| ServerError::InitializeError("AuthConfig is not registered with the app".to_string()))?;
    let token = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(String::from)
        })
        .ok_or_else(|| {
            ServerError::AuthenticationError(AuthError::PoorlyFormattedToken(
                "No session token provided".to_string(),
            ))
        })?;
    let claims = verify_session_token(&config.session_secret, &token).map_err(|e| {
        debug!("💻️ Session token did not verify. {e}");
        ServerError::AuthenticationError(e)
    })?;
    Ok(claims)
}

impl FromRequest for SessionClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(session_from_request(req))
    }
}

/// A 302 to the login page, carrying `return_to` so the user lands back on the interrupted flow.
pub fn login_redirect(return_to: &str) -> HttpResponse {
    let location = format!("/login?return_to={}", urlencoding::encode(return_to));
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}

#[cfg(test)]
mod test {
    use super::*;

    fn secret() -> Secret<String> {
        Secret::new("a-session-secret-that-is-long-enough!!".to_string())
    }

    fn claims() -> SessionClaims {
        SessionClaims { user_id: "user-abc".to_string(), email: Some("vendor@example.com".to_string()) }
    }

    #[test]
    fn session_tokens_round_trip() {
        let token = sign_session_token(&secret(), &claims(), Utc::now().timestamp() + 3600);
        let verified = verify_session_token(&secret(), &token).expect("Token should verify");
        assert_eq!(verified, claims());
    }

    #[test]
    fn expired_sessions_are_rejected() {
        let token = sign_session_token(&secret(), &claims(), Utc::now().timestamp() - 1);
        assert!(matches!(verify_session_token(&secret(), &token), Err(AuthError::Expired)));
    }

    #[test]
    fn forged_sessions_are_rejected() {
        let token = sign_session_token(&Secret::new("wrong-secret-wrong-secret-wrong!".to_string()), &claims(), i64::MAX);
        assert!(matches!(verify_session_token(&secret(), &token), Err(AuthError::ValidationError(_))));
    }

    #[test]
    fn garbage_is_poorly_formatted() {
        assert!(matches!(
            verify_session_token(&secret(), "definitely-not-a-token"),
            Err(AuthError::PoorlyFormattedToken(_))
        ));
    }
}
