//! Durable per-device persistence of the session snapshot.
//!
//! The store is a string-keyed map with two session entries (credential and
//! serialized profile) plus an optional remembered-login pair used only to
//! prefill the login form. Reads never fail upward: anything unreadable or
//! unparsable is treated as absent and purged. Writes of the session pair
//! are both-or-neither (temp file + rename).

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::identity::UserProfile;

const KEY_CREDENTIAL: &str = "credential";
const KEY_PROFILE: &str = "profile";
const KEY_REMEMBERED_EMAIL: &str = "remembered_email";
const KEY_REMEMBERED_PASSWORD: &str = "remembered_password";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedSession {
    pub credential: String,
    pub profile: UserProfile,
}

/// Synchronous, device-local persistence. Written only by the session
/// manager; the guard and dispatcher never touch it.
pub trait SessionStore: Send + Sync {
    /// Overwrite both session entries; both-or-neither observable.
    fn save(&self, credential: &str, profile: &UserProfile) -> Result<()>;
    /// Last saved pair, or `None` if absent or unparsable. Never errors.
    fn load(&self) -> Option<PersistedSession>;
    /// Remove both session entries; safe when already empty.
    fn clear(&self);

    /// Remembered-login pair: prefill only, never silent re-authentication.
    fn save_remembered(&self, email: &str, password: &str);
    fn load_remembered(&self) -> Option<(String, String)>;
    fn clear_remembered(&self);
}

/// File-backed store: one JSON object under the configured state dir.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self { path: state_dir.as_ref().join("session.json") }
    }

    /// Read the whole key map. A file that exists but does not parse is
    /// corrupt persisted state: purge it and report absent.
    fn read_entries(&self) -> BTreeMap<String, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(target: "mediportal::store", "discarding unparsable session file {}: {}", self.path.display(), e);
                let _ = std::fs::remove_file(&self.path);
                BTreeMap::new()
            }
        }
    }

    fn write_entries(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if map.is_empty() {
            let _ = std::fs::remove_file(&self.path);
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).ok();
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(map)?;
        std::fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, credential: &str, profile: &UserProfile) -> Result<()> {
        let mut map = self.read_entries();
        map.insert(KEY_CREDENTIAL.to_string(), credential.to_string());
        map.insert(KEY_PROFILE.to_string(), serde_json::to_string(profile)?);
        self.write_entries(&map)?;
        debug!(target: "mediportal::store", "session.save user={}", profile.id);
        Ok(())
    }

    fn load(&self) -> Option<PersistedSession> {
        let map = self.read_entries();
        let credential = map.get(KEY_CREDENTIAL)?.clone();
        let raw_profile = map.get(KEY_PROFILE)?;
        match serde_json::from_str::<UserProfile>(raw_profile) {
            Ok(profile) => Some(PersistedSession { credential, profile }),
            Err(e) => {
                // Corrupt profile entry: drop the session pair, keep the
                // remembered-login entries.
                warn!(target: "mediportal::store", "discarding unparsable profile snapshot: {}", e);
                self.clear();
                None
            }
        }
    }

    fn clear(&self) {
        let mut map = self.read_entries();
        map.remove(KEY_CREDENTIAL);
        map.remove(KEY_PROFILE);
        if let Err(e) = self.write_entries(&map) {
            warn!(target: "mediportal::store", "session.clear failed: {}", e);
        }
    }

    fn save_remembered(&self, email: &str, password: &str) {
        let mut map = self.read_entries();
        map.insert(KEY_REMEMBERED_EMAIL.to_string(), email.to_string());
        map.insert(KEY_REMEMBERED_PASSWORD.to_string(), password.to_string());
        if let Err(e) = self.write_entries(&map) {
            warn!(target: "mediportal::store", "remembered.save failed: {}", e);
        }
    }

    fn load_remembered(&self) -> Option<(String, String)> {
        let map = self.read_entries();
        let email = map.get(KEY_REMEMBERED_EMAIL)?.clone();
        let password = map.get(KEY_REMEMBERED_PASSWORD)?.clone();
        Some((email, password))
    }

    fn clear_remembered(&self) {
        let mut map = self.read_entries();
        map.remove(KEY_REMEMBERED_EMAIL);
        map.remove(KEY_REMEMBERED_PASSWORD);
        if let Err(e) = self.write_entries(&map) {
            warn!(target: "mediportal::store", "remembered.clear failed: {}", e);
        }
    }
}

/// In-memory store for tests and embedders that do not want durability.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<MemoryEntries>,
}

#[derive(Default)]
struct MemoryEntries {
    session: Option<PersistedSession>,
    remembered: Option<(String, String)>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(credential: &str, profile: UserProfile) -> Self {
        let store = Self::default();
        store.inner.write().session = Some(PersistedSession {
            credential: credential.to_string(),
            profile,
        });
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, credential: &str, profile: &UserProfile) -> Result<()> {
        self.inner.write().session = Some(PersistedSession {
            credential: credential.to_string(),
            profile: profile.clone(),
        });
        Ok(())
    }

    fn load(&self) -> Option<PersistedSession> {
        self.inner.read().session.clone()
    }

    fn clear(&self) {
        self.inner.write().session = None;
    }

    fn save_remembered(&self, email: &str, password: &str) {
        self.inner.write().remembered = Some((email.to_string(), password.to_string()));
    }

    fn load_remembered(&self) -> Option<(String, String)> {
        self.inner.read().remembered.clone()
    }

    fn clear_remembered(&self) {
        self.inner.write().remembered = None;
    }
}
