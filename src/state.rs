//! Persistence for the sent-article state file.
//!
//! The state file is a single JSON object, read once at process start and
//! rewritten once at the end of the run. An absent file means a first run;
//! a corrupt file is logged and treated as empty rather than aborting, so a
//! bad write can never wedge the schedule permanently.
//!
//! Writes go through a sibling temp file plus rename so a crash mid-write
//! leaves the previous state intact.

use crate::models::RunState;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Load run state from `path`.
///
/// Returns the default empty state when the file is missing or unparseable;
/// only the corrupt case is logged.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn load(path: &str) -> RunState {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => {
            info!("No state file found; starting with empty state");
            return RunState::default();
        }
    };

    match serde_json::from_str::<RunState>(&raw) {
        Ok(state) => {
            info!(sent = state.sent.len(), "Loaded state");
            state
        }
        Err(e) => {
            warn!(error = %e, "State file is corrupt; starting with empty state");
            RunState::default()
        }
    }
}

/// Persist run state to `path` atomically.
///
/// Serializes to pretty JSON, writes a `.tmp` sibling, then renames it over
/// the target.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn save(path: &str, state: &RunState) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(state)?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = format!("{}.tmp", path);
    fs::write(&tmp_path, json).await?;
    fs::rename(&tmp_path, path).await?;
    info!(sent = state.sent.len(), "Wrote state file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_absent_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = load(path.to_str().unwrap()).await;
        assert!(state.sent.is_empty());
        assert!(state.last_check.is_none());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json at all").unwrap();
        let state = load(path.to_str().unwrap()).await;
        assert!(state.sent.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let path_str = path.to_str().unwrap();

        let mut state = RunState::default();
        state.mark_sent("https://example.com/a", "Article A", Utc::now());
        state.mark_sent("https://example.com/b", "Article B", Utc::now());
        state.last_check = Some(Utc::now());

        save(path_str, &state).await.unwrap();
        let loaded = load(path_str).await;

        assert_eq!(loaded.sent.len(), 2);
        assert_eq!(loaded.sent[0].url, "https://example.com/a");
        assert!(loaded.last_check.is_some());
        assert!(loaded.contains_url("https://example.com/b"));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let path_str = path.to_str().unwrap();

        save(path_str, &RunState::default()).await.unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        save(path.to_str().unwrap(), &RunState::default())
            .await
            .unwrap();
        assert!(path.exists());
    }
}
