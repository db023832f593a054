// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session persistence: one durable slot, file-backed when possible.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// File name of the session slot inside the state directory.
const SESSION_FILE: &str = "session.json";

/// The serialized session record.
///
/// Runtime-only state (in-flight refresh bookkeeping, whether the session
/// was remembered) never lands here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// API base URL the credential was issued against.
    pub url: String,
    pub token: Token,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
}

/// Persistence boundary for the current session.
///
/// Implementations absorb their own failures: `save` and `clear` log and
/// continue, `load` treats malformed content as an absent session.
pub trait SessionStore: Send + Sync {
    fn save(&self, record: &PersistedSession);
    fn load(&self) -> Option<PersistedSession>;
    fn clear(&self);
}

/// JSON-file store under a state directory, written atomically.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store under an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { path: dir.into().join(SESSION_FILE) }
    }

    /// Store under the default state directory, if one can be resolved.
    pub fn open_default() -> Option<Self> {
        state_dir().map(Self::new)
    }
}

impl SessionStore for FileStore {
    fn save(&self, record: &PersistedSession) {
        if let Err(e) = write_atomic(&self.path, record) {
            tracing::warn!(err = %e, "failed to persist session");
        }
    }

    fn load(&self) -> Option<PersistedSession> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(err = %e, "discarding malformed session record");
                None
            }
        }
    }

    fn clear(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(err = %e, "failed to remove session record");
            }
        }
    }
}

/// Atomic write: unique temp name (PID + counter), then rename. Concurrent
/// saves racing on a shared `.tmp` name could otherwise interleave a shorter
/// write with trailing bytes of a longer previous one.
fn write_atomic(path: &Path, record: &PersistedSession) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(record)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the state directory for keygate data.
///
/// Checks `KEYGATE_STATE_DIR`, then `$XDG_STATE_HOME/keygate`, then
/// `$HOME/.local/state/keygate`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("KEYGATE_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("keygate"));
    }
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".local/state/keygate"));
    }
    None
}

/// In-process store for tests and embedders that manage their own durability.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, record: &PersistedSession) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(record.clone());
        }
    }

    fn load(&self) -> Option<PersistedSession> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Store used when no durable state directory is available. Everything is a
/// no-op; the client stays usable, sessions just don't survive restarts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl SessionStore for NoopStore {
    fn save(&self, _record: &PersistedSession) {}

    fn load(&self) -> Option<PersistedSession> {
        None
    }

    fn clear(&self) {}
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
