// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session manager: owns the current identity and its lifecycle.
//!
//! At most one identity is current at a time. It lives in a single slot whose
//! writes are confined to the lifecycle transitions — construction, refresh
//! success, refresh failure, logout — so a rejected refresh can never leave a
//! dangling "authenticated" session behind, and a logout racing a refresh
//! always wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::admin::Admin;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::identity::{Identity, Origin, UserProfile};
use crate::refresh::RefreshCoordinator;
use crate::store::{FileStore, NoopStore, PersistedSession, SessionStore};
use crate::token::{epoch_ms, Token, TokenResponse};
use crate::transport::{Api, RequestOptions, AUDIENCE_HEADER};

/// Observable session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    Expired,
}

/// The session slot. Everything the lifecycle owns lives here.
enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated(Identity),
    Refreshing(Identity),
    Expired,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            Self::Anonymous => SessionPhase::Anonymous,
            Self::Authenticating => SessionPhase::Authenticating,
            Self::Authenticated(_) => SessionPhase::Authenticated,
            Self::Refreshing(_) => SessionPhase::Refreshing,
            Self::Expired => SessionPhase::Expired,
        }
    }

    fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) | Self::Refreshing(identity) => Some(identity),
            _ => None,
        }
    }

    fn identity_mut(&mut self) -> Option<&mut Identity> {
        match self {
            Self::Authenticated(identity) | Self::Refreshing(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Identity service settings (`GET /settings`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub autoconfirm: bool,
    #[serde(default)]
    pub disable_signup: bool,
    /// External providers and whether each is enabled.
    #[serde(default)]
    pub external: BTreeMap<String, bool>,
}

/// Verification exchange kinds accepted by `POST /verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyKind {
    Signup,
    Recovery,
}

impl VerifyKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Recovery => "recovery",
        }
    }
}

/// Client for a token-based identity service.
///
/// All methods take `&self`; share it behind an [`Arc`] for concurrent use.
pub struct Client {
    api: Api,
    audience: String,
    store: Arc<dyn SessionStore>,
    refresher: Arc<RefreshCoordinator>,
    session: RwLock<SessionState>,
}

impl Client {
    /// Build a client and recover any persisted session.
    ///
    /// Without a resolvable state directory the client still works, it just
    /// won't persist sessions across restarts.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let store: Arc<dyn SessionStore> = match &config.state_dir {
            Some(dir) => Arc::new(FileStore::new(dir.clone())),
            None => match FileStore::open_default() {
                Some(store) => Arc::new(store),
                None => {
                    tracing::warn!("no state directory available; sessions will not persist");
                    Arc::new(NoopStore)
                }
            },
        };
        Self::with_store(config, store)
    }

    /// Build a client over an explicit session store.
    pub fn with_store(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self, Error> {
        config.validate()?;
        let api = Api::new(config.api_url.trim_end_matches('/'), config.timeout());
        let refresher = Arc::new(RefreshCoordinator::new(api.clone()));
        let session = RwLock::new(recover_session(store.as_ref(), &api));
        Ok(Self { api, audience: config.audience, store, refresher, session })
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.session.read().await.phase()
    }

    /// Snapshot of the current identity, if one is active.
    pub async fn current_identity(&self) -> Option<Identity> {
        self.session.read().await.identity().cloned()
    }

    /// Admin facade for user management endpoints.
    pub fn admin(&self) -> Admin<'_> {
        Admin::new(self)
    }

    /// Register a new user. Returns the created profile; does not start a
    /// session, since the account may still need confirmation.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        data: Option<Value>,
    ) -> Result<UserProfile, Error> {
        let body = json!({ "email": email, "password": password, "data": data });
        let value = self.api.request("/signup", RequestOptions::post_json(body)).await?;
        parse_profile(value)
    }

    /// Exchange email and password for a session.
    pub async fn log_in(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Identity, Error> {
        self.establish_session(
            "/token",
            RequestOptions::post_form(vec![
                ("grant_type".to_owned(), "password".to_owned()),
                ("username".to_owned(), email.to_owned()),
                ("password".to_owned(), password.to_owned()),
            ]),
            remember,
        )
        .await
    }

    /// Complete a verification exchange with the emailed token.
    pub async fn verify(
        &self,
        kind: VerifyKind,
        token: &str,
        remember: bool,
    ) -> Result<Identity, Error> {
        self.establish_session(
            "/verify",
            RequestOptions::post_json(json!({ "token": token, "type": kind.as_str() })),
            remember,
        )
        .await
    }

    /// Confirm a signup with the token from the confirmation email.
    pub async fn confirm_signup(&self, token: &str, remember: bool) -> Result<Identity, Error> {
        self.verify(VerifyKind::Signup, token, remember).await
    }

    /// Send a password recovery email.
    pub async fn request_password_recovery(&self, email: &str) -> Result<(), Error> {
        self.api.request("/recover", RequestOptions::post_json(json!({ "email": email }))).await?;
        Ok(())
    }

    /// Complete password recovery with the token from the recovery email.
    pub async fn complete_recovery(&self, token: &str, remember: bool) -> Result<Identity, Error> {
        self.verify(VerifyKind::Recovery, token, remember).await
    }

    /// Accept an invite, setting the initial password.
    pub async fn accept_invite(
        &self,
        token: &str,
        password: &str,
        remember: bool,
    ) -> Result<Identity, Error> {
        self.establish_session(
            "/verify",
            RequestOptions::post_json(json!({
                "token": token,
                "password": password,
                "type": "signup",
            })),
            remember,
        )
        .await
    }

    /// URL to send a user to for an external-provider login.
    pub fn external_login_url(&self, provider: &str) -> String {
        format!("{}/authorize?provider={provider}", self.api.base_url())
    }

    /// URL for accepting an invite through an external provider.
    pub fn external_invite_url(&self, provider: &str, invite_token: &str) -> String {
        format!(
            "{}/authorize?provider={provider}&invite_token={invite_token}",
            self.api.base_url()
        )
    }

    /// Resolve an access token that is safe to attach to a request,
    /// refreshing first when the held one is stale. A fresh credential never
    /// triggers an exchange.
    pub async fn access_token(&self) -> Result<String, Error> {
        {
            let session = self.session.read().await;
            match session.identity() {
                Some(identity) if !identity.token.is_stale(epoch_ms()) => {
                    return Ok(identity.token.access_token.clone());
                }
                Some(_) => {}
                None => return Err(Error::Validation("no active session".into())),
            }
        }
        self.refresh_current().await
    }

    /// Issue an authenticated request.
    ///
    /// The funnel for every authenticated call: resolves a fresh access
    /// token, attaches the bearer header plus the audience header when one is
    /// set, and propagates the server's rewritten error on failure.
    pub async fn authenticated_request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, Error> {
        let token = self.access_token().await?;
        let audience = if options.audience.is_empty() {
            self.audience.clone()
        } else {
            options.audience.clone()
        };
        self.request_with_token(&token, &audience, path, options).await
    }

    /// Update the current user's attributes (`PUT /user`). The response
    /// replaces the held profile; the credential and audience are untouched.
    pub async fn update_profile(&self, attributes: Value) -> Result<Identity, Error> {
        let value =
            self.authenticated_request("/user", RequestOptions::put_json(attributes)).await?;
        let profile = parse_profile(value)?;
        let mut session = self.session.write().await;
        match session.identity_mut() {
            Some(identity) => {
                identity.profile = profile;
                Ok(identity.clone())
            }
            None => Err(Error::Validation("no active session".into())),
        }
    }

    /// End the session. The server-side revoke is best-effort: local state is
    /// cleared even when the call fails.
    pub async fn log_out(&self) -> Result<(), Error> {
        if self.session.read().await.identity().is_none() {
            return Ok(());
        }
        if let Err(e) = self.authenticated_request("/logout", RequestOptions::post()).await {
            tracing::warn!(err = %e, "logout revoke failed; clearing session anyway");
        }
        self.store.clear();
        *self.session.write().await = SessionState::Anonymous;
        tracing::info!("session cleared");
        Ok(())
    }

    /// Fetch the identity service's public settings.
    pub async fn settings(&self) -> Result<Settings, Error> {
        let value = self.api.request("/settings", RequestOptions::get()).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Network(format!("invalid settings response: {e}")))
    }

    /// Run a token exchange and install the resulting identity.
    async fn establish_session(
        &self,
        path: &str,
        options: RequestOptions,
        remember: bool,
    ) -> Result<Identity, Error> {
        *self.session.write().await = SessionState::Authenticating;

        let result = self.build_identity(path, options, remember).await;
        let mut session = self.session.write().await;
        match result {
            Ok(identity) => {
                *session = SessionState::Authenticated(identity.clone());
                tracing::info!(origin = "fresh", "session established");
                Ok(identity)
            }
            Err(e) => {
                *session = SessionState::Anonymous;
                Err(e)
            }
        }
    }

    async fn build_identity(
        &self,
        path: &str,
        options: RequestOptions,
        remember: bool,
    ) -> Result<Identity, Error> {
        let value = self.api.request(path, options).await?;
        let raw: TokenResponse = serde_json::from_value(value)
            .map_err(|e| Error::Network(format!("invalid token response: {e}")))?;
        let token = Token::from_response(raw);
        let mut identity = Identity::new(token, self.audience.clone(), Origin::Fresh);

        // A new login supersedes whatever was persisted before.
        self.store.clear();

        // The identity is not current yet, so the profile fetch uses the new
        // credential directly instead of the authenticated funnel.
        let profile_value = self
            .request_with_token(
                &identity.token.access_token,
                &identity.audience,
                "/user",
                RequestOptions::get(),
            )
            .await?;
        identity.profile = parse_profile(profile_value)?;

        if remember {
            identity.remembered = true;
            self.persist(&identity);
        }
        Ok(identity)
    }

    /// Run one deduplicated refresh and apply its outcome to the session.
    async fn refresh_current(&self) -> Result<String, Error> {
        let refresh_token = {
            let mut session = self.session.write().await;
            let token = match session.identity() {
                Some(identity) => identity.token.clone(),
                None => return Err(Error::Validation("no active session".into())),
            };
            // Re-check under the write lock: a caller that raced here on a
            // stale snapshot must not burn a second refresh token after the
            // first one already renewed the credential.
            if !token.is_stale(epoch_ms()) {
                return Ok(token.access_token);
            }
            let state = std::mem::replace(&mut *session, SessionState::Anonymous);
            *session = match state {
                SessionState::Authenticated(identity) => SessionState::Refreshing(identity),
                other => other,
            };
            token.refresh_token
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(new_token) => {
                let snapshot = {
                    let mut session = self.session.write().await;
                    let state = std::mem::replace(&mut *session, SessionState::Anonymous);
                    match state {
                        SessionState::Refreshing(mut identity)
                        | SessionState::Authenticated(mut identity) => {
                            // Install only over the credential this exchange
                            // renewed; a login that raced the refresh keeps
                            // its own newer token.
                            let snapshot = if identity.token.refresh_token == refresh_token {
                                identity.token = new_token.clone();
                                Some(identity.clone())
                            } else {
                                None
                            };
                            *session = SessionState::Authenticated(identity);
                            snapshot
                        }
                        // A logout won the race; don't resurrect the session.
                        other => {
                            *session = other;
                            return Err(Error::Validation(
                                "session was closed during refresh".into(),
                            ));
                        }
                    }
                };
                if let Some(identity) = snapshot {
                    if identity.remembered {
                        self.persist(&identity);
                    }
                    tracing::debug!("access token refreshed");
                }
                Ok(new_token.access_token)
            }
            Err(e) => {
                // The refresh token is burned; drop every trace of the
                // session before surfacing the failure. A state other than
                // Refreshing means a logout or a new login already owns the
                // slot and must not be disturbed.
                let mut session = self.session.write().await;
                if matches!(&*session, SessionState::Refreshing(_)) {
                    self.store.clear();
                    *session = SessionState::Expired;
                    tracing::warn!(err = %e, "token refresh failed; session expired");
                }
                Err(e)
            }
        }
    }

    async fn request_with_token(
        &self,
        access_token: &str,
        audience: &str,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, Error> {
        let mut options = options.header("Authorization", format!("Bearer {access_token}"));
        if !audience.is_empty() {
            options = options.header(AUDIENCE_HEADER, audience);
        }
        self.api.request(path, options).await
    }

    fn persist(&self, identity: &Identity) {
        self.store.save(&PersistedSession {
            url: self.api.base_url().to_owned(),
            token: identity.token.clone(),
            audience: identity.audience.clone(),
        });
    }
}

/// Restore the persisted session, if a structurally valid record exists for
/// this API.
fn recover_session(store: &dyn SessionStore, api: &Api) -> SessionState {
    let Some(record) = store.load() else {
        return SessionState::Anonymous;
    };
    if record.url.is_empty() || record.token.access_token.is_empty() {
        tracing::warn!("discarding structurally invalid session record");
        return SessionState::Anonymous;
    }
    if record.url != api.base_url() {
        tracing::warn!(stored = %record.url, "persisted session belongs to a different API; ignoring");
        return SessionState::Anonymous;
    }
    let identity = Identity::new(record.token, record.audience, Origin::FromStorage);
    tracing::info!("session restored from storage");
    SessionState::Authenticated(identity)
}

fn parse_profile(value: Value) -> Result<UserProfile, Error> {
    serde_json::from_value(value).map_err(|e| Error::Network(format!("invalid profile response: {e}")))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
