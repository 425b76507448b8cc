//! `JsonFileSessionStore`: a [`dialog_core::adapters::SessionStore`] that
//! persists one JSON file per session under a base directory.
//!
//! Grounded on `coordination/src/state/store.rs`'s `StateStore` shape (a
//! struct wrapping a lock-guarded handle, `put`/`get` helpers, a dedicated
//! error enum) but with the on-disk RocksDB+bincode column families
//! replaced by one `serde_json` file per session, since `handle_turn`'s
//! load/save contract (§6) only ever needs one blob per `session_id` — no
//! counterpart to the teacher's multi-column-family key space survives in
//! this domain.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use dialog_core::adapters::SessionStore;
use dialog_core::error::{DialogError, DialogResult};
use dialog_core::session::SessionState;

pub struct JsonFileSessionStore {
    base_dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", sanitize(session_id)))
    }
}

/// Session ids are caller-supplied; don't let one escape `base_dir` via
/// path separators.
fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    /// Returns a fresh state for unknown ids and for any file that fails to
    /// parse (§3's lifecycle rule; a corrupt blob is treated the same as
    /// "never seen" rather than surfaced as an error, consistent with
    /// `handle_turn`'s no-throw contract).
    async fn load(&self, session_id: &str) -> SessionState {
        let path = self.path_for(session_id);
        match fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(session_id, error = %e, "session state failed to parse, starting fresh");
                SessionState::new(session_id)
            }),
            Err(_) => SessionState::new(session_id),
        }
    }

    async fn save(&self, state: &SessionState) -> DialogResult<()> {
        ensure_dir(&self.base_dir)
            .await
            .map_err(DialogError::Store)?;
        let path = self.path_for(&state.session_id);
        let raw = serde_json::to_string_pretty(state).map_err(|e| DialogError::Deserialize {
            message: e.to_string(),
        })?;
        fs::write(&path, raw).await.map_err(DialogError::Store)
    }
}

async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_returns_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        let state = store.load("never-seen").await;
        assert_eq!(state.session_id, "never-seen");
        assert_eq!(state.turn_count, 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        let mut state = SessionState::new("s1");
        state.turn_count = 3;
        state.category = Some("Furniture".into());

        store.save(&state).await.unwrap();
        let loaded = store.load("s1").await;
        assert_eq!(loaded.turn_count, 3);
        assert_eq!(loaded.category, state.category);
    }

    #[tokio::test]
    async fn session_id_cannot_escape_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        let mut state = SessionState::new("../../etc/passwd");
        state.turn_count = 1;
        store.save(&state).await.unwrap();

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        assert!(!entry.file_name().to_string_lossy().contains(".."));
    }
}
