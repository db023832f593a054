// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated user's runtime representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::token::Token;

/// How the current identity came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Constructed from a live auth exchange.
    Fresh,
    /// Recovered from the session store at startup.
    FromStorage,
}

/// Server-held user attributes.
///
/// Known fields are typed; anything else the server sends lands in `extra`.
/// Profile updates replace this struct wholesale, so attribute merging can
/// never touch the credential or audience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub app_metadata: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub user_metadata: Value,
    /// Attributes without a typed field.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The current authenticated user: credential plus profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub token: Token,
    pub profile: UserProfile,
    /// Tenant scoping value attached to authenticated requests. Empty when
    /// the deployment is single-tenant.
    pub audience: String,
    pub origin: Origin,
    /// Whether the session is persisted and should be re-persisted after a
    /// refresh. Runtime-only, never serialized.
    pub(crate) remembered: bool,
}

impl Identity {
    pub(crate) fn new(token: Token, audience: String, origin: Origin) -> Self {
        Self {
            token,
            profile: UserProfile::default(),
            audience,
            origin,
            remembered: origin == Origin::FromStorage,
        }
    }

    /// Whether this session is currently persisted to the store.
    pub fn remembered(&self) -> bool {
        self.remembered
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
