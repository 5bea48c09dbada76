// LootScribe - app/state_store.rs
//
// Council state persistence between runs.
//
// The correlator is only idempotent when replayed from the same starting
// registry, so incremental tracking saves the full snapshot (registry,
// per-instance council records, applied event keys) after every run and
// feeds it back in on the next.
//
// - Saves are atomic (write temp, rename) so a crash mid-save keeps the
//   previous good state.
// - A missing file is a first run. A malformed or version-mismatched file is
//   an error: silently starting fresh would renumber every instance.

use crate::core::council::{CouncilSnapshot, CouncilState};
use crate::core::correlator::IndexPolicy;
use crate::platform::fs::write_atomic;
use crate::util::constants::STATE_VERSION;
use crate::util::error::StateError;
use std::path::Path;

/// Save `state` to `path` atomically.
pub fn save(state: &CouncilState, path: &Path) -> Result<(), StateError> {
    let snapshot = state.snapshot();
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| StateError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    write_atomic(path, json.as_bytes()).map_err(|e| StateError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(
        path = %path.display(),
        instances = snapshot.registry.len(),
        "Council state saved"
    );
    Ok(())
}

/// Load a snapshot from `path`. `Ok(None)` when the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<CouncilSnapshot>, StateError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No saved council state; starting fresh");
            return Ok(None);
        }
        Err(e) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let snapshot: CouncilSnapshot = serde_json::from_str(&content).map_err(|e| StateError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    if snapshot.version != STATE_VERSION {
        return Err(StateError::VersionMismatch {
            path: path.to_path_buf(),
            found: snapshot.version,
            expected: STATE_VERSION,
        });
    }

    tracing::info!(
        path = %path.display(),
        instances = snapshot.registry.len(),
        "Council state loaded"
    );
    Ok(Some(snapshot))
}

/// Load saved state, or a fresh state using `policy` when none exists.
pub fn load_or_new(path: &Path, policy: Box<dyn IndexPolicy>) -> Result<CouncilState, StateError> {
    Ok(match load_snapshot(path)? {
        Some(snapshot) => CouncilState::from_snapshot(snapshot, policy),
        None => CouncilState::new(policy),
    })
}
