// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Configuration for [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the identity API, e.g. `https://example.com/identity`.
    pub api_url: String,
    /// Default tenant audience attached to authenticated requests.
    pub audience: String,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Override for the session state directory. `None` resolves the
    /// platform default; when nothing resolves, persistence is disabled.
    pub state_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { api_url: String::new(), audience: String::new(), timeout_secs: 30, state_dir: None }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self { api_url: api_url.into(), ..Self::default() }
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fail fast on configuration that can never produce a working client.
    pub fn validate(&self) -> Result<(), Error> {
        if self.api_url.is_empty() {
            return Err(Error::Validation("api_url is required".into()));
        }
        if self.api_url.starts_with("http://") {
            tracing::warn!(
                "identity API configured over plain http; tokens will cross the wire unencrypted"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
