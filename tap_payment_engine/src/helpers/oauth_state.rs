//! # OAuth state token format
//!
//! When a vendor starts the account-linking flow, the server round-trips an opaque `state` value through
//! the provider's authorization redirect. The callback must be able to prove that the state it receives was
//! minted by this server, for this vendor, recently — otherwise anyone could forge a callback and attach
//! their merchant credentials to someone else's shop.
//!
//! The token is a capability for *attribution only*: it identifies which vendor a callback belongs to.
//! It is not a session and is never accepted as a bearer credential anywhere else.
//!
//! ## Format
//!
//! ```text
//!     base64url(payload) "." base64url(hmac_sha256(secret, payload))
//! ```
//!
//! where the payload is the canonical JSON `{"v":<vendor_id>,"t":<unix_seconds>}`. Base64 is URL-safe
//! without padding so the token survives query strings untouched. The signature is verified in constant
//! time, and tokens older than the configured max age are rejected.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tap_common::Secret;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// State tokens expire after ten minutes by default; an authorization round trip that takes longer than
/// that has gone wrong anyway.
pub const DEFAULT_STATE_MAX_AGE_SECS: i64 = 600;

/// Allowance for clock skew between instances when checking `issued_at`.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTokenError {
    #[error("State token is not in the correct format")]
    Malformed,
    #[error("State token signature is invalid")]
    BadSignature,
    #[error("State token has expired")]
    Expired,
}

/// The decoded contents of a valid state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub vendor_id: i64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StatePayload {
    v: i64,
    t: i64,
}

/// Encoder/decoder pair for OAuth state tokens. Pure; the only inputs are the token, the secret, and the
/// clock.
#[derive(Clone)]
pub struct StateTokenCodec {
    secret: Secret<String>,
    max_age: Duration,
}

impl StateTokenCodec {
    pub fn new(secret: Secret<String>, max_age: Duration) -> Self {
        Self { secret, max_age }
    }

    pub fn with_default_max_age(secret: Secret<String>) -> Self {
        Self::new(secret, Duration::seconds(DEFAULT_STATE_MAX_AGE_SECS))
    }

    fn mac_for(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.reveal().as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac
    }

    /// Mint a state token for `vendor_id`, stamped with the current time.
    pub fn encode(&self, vendor_id: i64) -> String {
        let payload = StatePayload { v: vendor_id, t: Utc::now().timestamp() };
        let payload_bytes = serde_json::to_vec(&payload).expect("State payload serialization cannot fail");
        let signature = self.mac_for(&payload_bytes).finalize().into_bytes();
        format!(
            "{}.{}",
            base64::encode_config(&payload_bytes, base64::URL_SAFE_NO_PAD),
            base64::encode_config(signature, base64::URL_SAFE_NO_PAD),
        )
    }

    /// Verify and decode a state token. Any structural problem is `Malformed`; a structurally valid token
    /// whose signature does not match is `BadSignature`; a genuine token past its max age is `Expired`.
    pub fn decode(&self, token: &str) -> Result<OAuthState, StateTokenError> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(StateTokenError::Malformed)?;
        let payload_bytes = base64::decode_config(payload_b64, base64::URL_SAFE_NO_PAD)
            .map_err(|_| StateTokenError::Malformed)?;
        let signature = base64::decode_config(signature_b64, base64::URL_SAFE_NO_PAD)
            .map_err(|_| StateTokenError::Malformed)?;
        self.mac_for(&payload_bytes).verify_slice(&signature).map_err(|_| StateTokenError::BadSignature)?;
        let payload: StatePayload =
            serde_json::from_slice(&payload_bytes).map_err(|_| StateTokenError::Malformed)?;
        let issued_at = Utc.timestamp_opt(payload.t, 0).single().ok_or(StateTokenError::Malformed)?;
        let age = Utc::now().signed_duration_since(issued_at);
        if age > self.max_age || age < -Duration::seconds(MAX_CLOCK_SKEW_SECS) {
            return Err(StateTokenError::Expired);
        }
        Ok(OAuthState { vendor_id: payload.v, issued_at })
    }
}
