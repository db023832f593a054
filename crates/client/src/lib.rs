// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keygate: client-side session manager for a token-based identity API.
//!
//! The [`Client`] authenticates against a remote identity service, owns the
//! resulting credential, keeps it fresh across its lifetime, and persists it
//! across process restarts. Every authenticated call funnels through
//! [`Client::authenticated_request`], which transparently refreshes a stale
//! access token (deduplicating concurrent refreshes) before attaching it as
//! a bearer credential.

pub mod admin;
pub mod claims;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod refresh;
pub mod store;
pub mod token;
pub mod transport;

pub use {
    admin::Admin,
    client::{Client, SessionPhase, Settings, VerifyKind},
    config::ClientConfig,
    error::Error,
    identity::{Identity, Origin, UserProfile},
    store::{FileStore, MemoryStore, NoopStore, PersistedSession, SessionStore},
    token::{Token, TokenResponse, EXPIRY_MARGIN_MS},
    transport::{Api, RequestBody, RequestOptions, AUDIENCE_HEADER},
};
