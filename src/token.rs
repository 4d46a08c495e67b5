use crate::util::now_millis;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Decides whether a project token must be refreshed before it is used
pub trait TokenValidator: Send + Sync {
    fn is_expired(&self, token: &str) -> bool;
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Reads the `exp` claim (seconds) of a JWT project token and compares it with the wall clock.
///
/// Tokens that cannot be decoded, or carry no `exp`, are reported as not expired and left for
/// the server to judge.
#[derive(Clone, Copy, Debug, Default)]
pub struct JwtExpiry;

impl JwtExpiry {
    pub fn expires_at_millis(token: &str) -> Option<i64> {
        let payload = token.split('.').nth(1)?;
        let decoded = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Token payload is not base64: {}", e);
                return None;
            }
        };
        let claims: Claims = match serde_json::from_slice(&decoded) {
            Ok(claims) => claims,
            Err(e) => {
                log::debug!("Token payload is not a claim set: {}", e);
                return None;
            }
        };
        claims.exp.map(|exp| exp.saturating_mul(1000))
    }

    pub fn is_expired_at(token: &str, now_ms: i64) -> bool {
        match JwtExpiry::expires_at_millis(token) {
            Some(expires) => expires <= now_ms,
            None => false,
        }
    }
}

impl TokenValidator for JwtExpiry {
    fn is_expired(&self, token: &str) -> bool {
        JwtExpiry::is_expired_at(token, now_millis())
    }
}
