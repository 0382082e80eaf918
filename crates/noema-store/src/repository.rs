//! Durable per-session consciousness state.
//!
//! An in-memory map keyed by session id, mirrored to one JSON document.
//! Every load, save and flush runs under the same mutex, and writes go
//! through a temporary file renamed over the target, so readers never see
//! a torn document.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use noema_core::ConsciousnessState;
use noema_core::time::{now_iso8601, now_unix_millis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

pub const DOCUMENT_VERSION: &str = "1.0";

/// On-disk layout: `{states: [...], savedAt, version}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocument {
    pub states: Vec<ConsciousnessState>,
    pub saved_at: String,
    pub version: String,
}

pub struct StateRepository {
    path: PathBuf,
    states: Mutex<HashMap<String, ConsciousnessState>>,
}

impl StateRepository {
    /// Open the repository backed by `path`, creating the parent directory
    /// and loading whatever is already there.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let repo = Self {
            path: path.to_path_buf(),
            states: Mutex::new(HashMap::new()),
        };
        repo.load()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConsciousnessState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Merge the on-disk document into memory. A missing file is a no-op; an
    /// undeserializable one is moved aside to a timestamped backup and the
    /// in-memory map is left as it was. Returns the number of states read.
    pub fn load(&self) -> Result<usize> {
        let mut states = self.lock();
        if !self.path.exists() {
            return Ok(0);
        }
        let bytes = fs::read(&self.path)?;
        match serde_json::from_slice::<PersistedDocument>(&bytes) {
            Ok(doc) => {
                let count = doc.states.len();
                for state in doc.states {
                    states.insert(state.session_id.clone(), state);
                }
                tracing::debug!("loaded {count} consciousness states from {}", self.path.display());
                Ok(count)
            }
            Err(e) => {
                let backup = self.quarantine_path();
                match fs::rename(&self.path, &backup) {
                    Ok(()) => tracing::warn!(
                        "state file {} is corrupt ({e}); moved to {}",
                        self.path.display(),
                        backup.display()
                    ),
                    Err(rename_err) => tracing::warn!(
                        "state file {} is corrupt ({e}) and could not be quarantined: {rename_err}",
                        self.path.display()
                    ),
                }
                Ok(0)
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<ConsciousnessState> {
        self.lock().get(session_id).cloned()
    }

    /// The stored state, or a fresh empty one registered in memory.
    pub fn get_or_create(&self, session_id: &str) -> ConsciousnessState {
        self.lock()
            .entry(session_id.to_string())
            .or_insert_with(|| ConsciousnessState::new(session_id))
            .clone()
    }

    /// Bump version and modified time, store, and flush everything to disk.
    pub fn save(&self, state: &mut ConsciousnessState) -> Result<()> {
        if state.session_id.is_empty() {
            return Err(StoreError::InvalidData("state has no session id".into()));
        }
        state.touch();
        let mut states = self.lock();
        states.insert(state.session_id.clone(), state.clone());
        self.flush_locked(&states)
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> Result<bool> {
        let mut states = self.lock();
        let existed = states.remove(session_id).is_some();
        if existed {
            self.flush_locked(&states)?;
        }
        Ok(existed)
    }

    /// Sorted session ids.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn flush(&self) -> Result<()> {
        let states = self.lock();
        self.flush_locked(&states)
    }

    fn flush_locked(&self, states: &HashMap<String, ConsciousnessState>) -> Result<()> {
        let mut sorted: Vec<&ConsciousnessState> = states.values().collect();
        sorted.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        let doc = DocumentRef {
            states: sorted,
            saved_at: now_iso8601(),
            version: DOCUMENT_VERSION,
        };
        let json = serde_json::to_string_pretty(&doc)?;

        let tmp = self.sibling(&format!("{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            tracing::warn!(
                "atomic rename onto {} failed ({e}); writing in place",
                self.path.display()
            );
            let direct = fs::write(&self.path, &json);
            let _ = fs::remove_file(&tmp);
            direct?;
        }
        Ok(())
    }

    fn quarantine_path(&self) -> PathBuf {
        self.sibling(&format!("corrupt-{}.bak", now_unix_millis()))
    }

    /// `<target>.<suffix>` in the target's directory.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        self.path.with_file_name(format!("{name}.{suffix}"))
    }
}

/// Borrowing twin of `PersistedDocument` so flushing never clones states.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRef<'a> {
    states: Vec<&'a ConsciousnessState>,
    saved_at: String,
    version: &'a str,
}
