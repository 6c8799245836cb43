//! Access-token expiry inspection.
//!
//! Access tokens are JWTs. Only the `exp` claim is read, and only to decide
//! whether to refresh before sending; signatures are never verified here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Unix timestamp at which the token expires, if it is a JWT with `exp`.
#[must_use]
pub fn expires_at(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok()?.exp
}

/// Whether the token expires within `seconds`. Opaque tokens never do.
#[must_use]
pub fn expires_within(token: &str, seconds: i64) -> bool {
    expires_at(token).is_some_and(|exp| chrono::Utc::now().timestamp() >= exp.saturating_sub(seconds))
}
