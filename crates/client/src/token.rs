// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The held credential and its expiry bookkeeping.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::claims;
use crate::error::Error;

/// Refresh this long before the access token actually expires, to absorb
/// request latency.
pub const EXPIRY_MARGIN_MS: u64 = 60_000;

/// Raw token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// The credential held for the current identity.
///
/// `expires_at` is derived from the `exp` claim of the access token actually
/// held, never computed independently. A token whose claims cannot be decoded
/// has no expiry and is treated as already stale.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Token {
    /// Build a credential from a token endpoint response, reading the expiry
    /// out of the access token's claim segment.
    pub fn from_response(raw: TokenResponse) -> Self {
        let expires_at = match decode_expiry(&raw.access_token) {
            Ok(at) => at,
            Err(e) => {
                // The raw token never appears in the log line.
                tracing::warn!(err = %e, "failed to read expiry claim from access token");
                None
            }
        };
        Self { access_token: raw.access_token, refresh_token: raw.refresh_token, expires_at }
    }

    /// Whether the access token is within the default refresh margin of its
    /// expiry, or has no readable expiry at all.
    pub fn is_stale(&self, now_ms: u64) -> bool {
        self.is_stale_within(now_ms, EXPIRY_MARGIN_MS)
    }

    /// Staleness against an explicit margin.
    pub fn is_stale_within(&self, now_ms: u64, margin_ms: u64) -> bool {
        match self.expires_at {
            Some(at) => at.saturating_sub(margin_ms) <= now_ms,
            None => true,
        }
    }
}

// Token material stays out of debug output.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Pull the `exp` claim (epoch seconds) from a compact token and convert it
/// to epoch milliseconds. A decodable token without an `exp` claim simply has
/// no expiry.
fn decode_expiry(access_token: &str) -> Result<Option<u64>, Error> {
    let payload = access_token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Decode("token has no claims segment".into()))?;
    let claims = claims::decode_segment(payload)?;
    Ok(claims.get("exp").and_then(exp_millis))
}

fn exp_millis(value: &Value) -> Option<u64> {
    if let Some(secs) = value.as_u64() {
        return secs.checked_mul(1000);
    }
    value.as_f64().map(|secs| (secs * 1000.0) as u64)
}

/// Current time in epoch milliseconds.
pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
