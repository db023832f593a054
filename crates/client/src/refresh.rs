// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token refresh with per-token deduplication of in-flight exchanges.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::error::Error;
use crate::token::{Token, TokenResponse};
use crate::transport::{Api, RequestOptions};

/// Coordinates refresh exchanges so each refresh token has at most one
/// in-flight request, no matter how many callers notice staleness at once.
///
/// Token servers treat refresh tokens as single-use; two racing exchanges
/// would invalidate whichever one loses.
pub struct RefreshCoordinator {
    api: Api,
    in_flight: Mutex<HashMap<String, broadcast::Sender<Result<Token, Error>>>>,
}

impl RefreshCoordinator {
    pub fn new(api: Api) -> Self {
        Self { api, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Exchange a refresh token for a new credential.
    ///
    /// Concurrent calls with the same refresh token all receive the outcome
    /// of the single underlying exchange. The in-flight entry is removed
    /// before the outcome is propagated, so a later call starts a fresh
    /// exchange. Failures are final: the refresh token is burned and the
    /// caller must drop the session rather than retry.
    pub async fn refresh(self: &Arc<Self>, refresh_token: &str) -> Result<Token, Error> {
        let mut rx = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(refresh_token) {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    in_flight.insert(refresh_token.to_owned(), tx.clone());
                    self.spawn_exchange(refresh_token.to_owned(), tx);
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // The exchange task died before sending; treat as transport loss.
            Err(_) => Err(Error::Network("refresh exchange abandoned".into())),
        }
    }

    /// Run the exchange on its own task so a cancelled caller cannot leave
    /// other waiters hanging on a half-finished request.
    fn spawn_exchange(
        self: &Arc<Self>,
        refresh_token: String,
        tx: broadcast::Sender<Result<Token, Error>>,
    ) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = coordinator.exchange(&refresh_token).await;
            coordinator.in_flight.lock().await.remove(&refresh_token);
            let _ = tx.send(outcome);
        });
    }

    async fn exchange(&self, refresh_token: &str) -> Result<Token, Error> {
        let body = self
            .api
            .request(
                "/token",
                RequestOptions::post_form(vec![
                    ("grant_type".to_owned(), "refresh_token".to_owned()),
                    ("refresh_token".to_owned(), refresh_token.to_owned()),
                ]),
            )
            .await?;
        let raw: TokenResponse = serde_json::from_value(body)
            .map_err(|e| Error::Network(format!("invalid token response: {e}")))?;
        Ok(Token::from_response(raw))
    }
}
