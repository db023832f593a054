// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the keygate client.

use serde_json::Value;

/// Errors surfaced by the client.
///
/// `Clone` because the outcome of a deduplicated refresh exchange is fanned
/// out to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A token segment was not valid base64url JSON.
    #[error("failed to decode token segment: {0}")]
    Decode(String),

    /// The request never produced a structured server response.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{message}")]
    AuthRejected { status: u16, message: String },

    /// The caller supplied insufficient or inconsistent parameters.
    #[error("{0}")]
    Validation(String),
}

impl Error {
    /// Rejection for a non-success response, preferring the server's
    /// structured error envelope for the message.
    pub(crate) fn rejected(status: u16, body: &Value) -> Self {
        let message = body
            .get("msg")
            .or_else(|| body.get("error_description"))
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self::AuthRejected { status, message }
    }

    /// HTTP status of a server rejection, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
