// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle specs: login, persistence, restore, logout.

use std::sync::atomic::Ordering;

use keygate::{Client, Origin, SessionPhase, SessionStore};
use keygate_specs::{IdentityServer, EMAIL, PASSWORD};

#[tokio::test]
async fn login_establishes_a_session() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, _store) = server.client()?;

    let identity = client.log_in(EMAIL, PASSWORD, false).await?;
    assert_eq!(identity.origin, Origin::Fresh);
    assert_eq!(identity.profile.email, EMAIL);
    assert_eq!(identity.profile.id, "user-1");
    assert_eq!(client.phase().await, SessionPhase::Authenticated);

    let current = client.current_identity().await.ok_or_else(|| anyhow::anyhow!("no identity"))?;
    assert_eq!(current.token.access_token, identity.token.access_token);
    Ok(())
}

#[tokio::test]
async fn login_without_remember_leaves_the_store_empty() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, store) = server.client()?;

    client.log_in(EMAIL, PASSWORD, false).await?;
    assert!(client.current_identity().await.is_some());
    assert_eq!(store.load(), None);
    Ok(())
}

#[tokio::test]
async fn login_with_remember_persists_the_session() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, store) = server.client()?;

    let identity = client.log_in(EMAIL, PASSWORD, true).await?;
    assert!(identity.remembered());

    let record = store.load().ok_or_else(|| anyhow::anyhow!("nothing persisted"))?;
    assert_eq!(record.url, server.base_url);
    assert_eq!(record.token, identity.token);
    Ok(())
}

#[tokio::test]
async fn a_new_login_supersedes_the_persisted_session() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, store) = server.client()?;

    client.log_in(EMAIL, PASSWORD, true).await?;
    let first = store.load().ok_or_else(|| anyhow::anyhow!("nothing persisted"))?;

    // Logging in again without remember drops the old record.
    client.log_in(EMAIL, PASSWORD, false).await?;
    assert_eq!(store.load(), None);

    let current = client.current_identity().await.ok_or_else(|| anyhow::anyhow!("no identity"))?;
    assert_ne!(current.token.refresh_token, first.token.refresh_token);
    Ok(())
}

#[tokio::test]
async fn rejected_login_returns_to_anonymous() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, _store) = server.client()?;

    let err = match client.log_in(EMAIL, "wrong", false).await {
        Err(e) => e,
        Ok(_) => anyhow::bail!("login should have been rejected"),
    };
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "invalid email or password");
    assert_eq!(client.phase().await, SessionPhase::Anonymous);
    assert!(client.current_identity().await.is_none());
    Ok(())
}

#[tokio::test]
async fn session_survives_a_process_restart() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let dir = tempfile::tempdir()?;
    let config = server.config().state_dir(dir.path());

    let first = Client::new(config.clone())?;
    let identity = first.log_in(EMAIL, PASSWORD, true).await?;
    drop(first);

    let second = Client::new(config)?;
    let restored =
        second.current_identity().await.ok_or_else(|| anyhow::anyhow!("nothing restored"))?;
    assert_eq!(restored.origin, Origin::FromStorage);
    assert!(restored.remembered());
    assert_eq!(restored.token.access_token, identity.token.access_token);
    Ok(())
}

#[tokio::test]
async fn restored_sessions_replay_persistence_on_refresh() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let dir = tempfile::tempdir()?;
    let config = server.config().state_dir(dir.path());

    // Issue an already-expired token so the restored session must refresh.
    server.state.token_ttl_secs.store(-120, Ordering::SeqCst);
    let first = Client::new(config.clone())?;
    let stale = first.log_in(EMAIL, PASSWORD, true).await?;
    drop(first);

    server.state.token_ttl_secs.store(3600, Ordering::SeqCst);
    let second = Client::new(config)?;
    second.authenticated_request("/user", keygate::RequestOptions::get()).await?;

    let store = keygate::FileStore::new(dir.path());
    let record = store.load().ok_or_else(|| anyhow::anyhow!("nothing persisted"))?;
    assert_ne!(record.token.access_token, stale.token.access_token);
    assert_eq!(server.state.refresh_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_persisted_state_means_no_session() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("session.json"), "][ not a record")?;

    let client = Client::new(server.config().state_dir(dir.path()))?;
    assert_eq!(client.phase().await, SessionPhase::Anonymous);
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_and_store() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, store) = server.client()?;

    client.log_in(EMAIL, PASSWORD, true).await?;
    client.log_out().await?;

    assert_eq!(client.phase().await, SessionPhase::Anonymous);
    assert!(client.current_identity().await.is_none());
    assert_eq!(store.load(), None);
    assert_eq!(server.state.logout_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn logout_clears_state_even_when_the_revoke_fails() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, store) = server.client()?;

    client.log_in(EMAIL, PASSWORD, true).await?;
    server.state.fail_logout.store(true, Ordering::SeqCst);
    client.log_out().await?;

    assert_eq!(client.phase().await, SessionPhase::Anonymous);
    assert_eq!(store.load(), None);
    assert_eq!(server.state.logout_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn update_profile_merges_server_attributes() -> anyhow::Result<()> {
    let server = IdentityServer::start().await?;
    let (client, _store) = server.client()?;

    client.log_in(EMAIL, PASSWORD, false).await?;
    let updated =
        client.update_profile(serde_json::json!({ "data": { "color": "green" } })).await?;

    assert_eq!(updated.profile.user_metadata["color"], "green");
    assert_eq!(updated.profile.user_metadata["name"], "Jo");

    // The held identity reflects the update; the credential does not change.
    let current = client.current_identity().await.ok_or_else(|| anyhow::anyhow!("no identity"))?;
    assert_eq!(current.profile.user_metadata["color"], "green");
    assert_eq!(current.token, updated.token);
    Ok(())
}
