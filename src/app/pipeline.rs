// LootScribe - app/pipeline.rs
//
// Orchestration of the per-command pipelines: read the log, run the core
// matchers over it, and for tracking fold the events into persisted state.

use crate::app::state_store;
use crate::core::council::CouncilItem;
use crate::core::correlator::PolicyKind;
use crate::core::kills::{match_npc_kills, NpcKill};
use crate::core::master_loot::{compile_patterns, match_loot_lines, LootPickup, MasterLootPattern};
use crate::core::model::Event;
use crate::core::parser::{parse_loot_council_with_stats, ParseOutcome};
use crate::core::timestamp::RaidWindow;
use crate::platform::fs::read_file_lossy;
use crate::util::error::{LootScribeError, Result};
use std::path::Path;

fn read_log(path: &Path) -> Result<String> {
    read_file_lossy(path).map_err(|e| LootScribeError::Io {
        path: path.to_path_buf(),
        operation: "read log",
        source: e,
    })
}

/// Parse loot-council events from the log at `log_path`.
pub fn council_events(log_path: &Path, window: &RaidWindow) -> Result<ParseOutcome> {
    let content = read_log(log_path)?;
    let outcome = parse_loot_council_with_stats(&content, window);
    tracing::info!(
        path = %log_path.display(),
        events = outcome.events.len(),
        "Parsed loot council events"
    );
    Ok(outcome)
}

/// Result of one tracking run.
#[derive(Debug)]
pub struct TrackOutcome {
    /// Events parsed from the log.
    pub events: Vec<Event>,
    /// Events not seen in any previous run.
    pub newly_applied: usize,
    /// All tracked items after this run, ordered by start time.
    pub items: Vec<CouncilItem>,
}

/// Parse the log, fold its events into the state at `state_path`, and save.
pub fn track(
    log_path: &Path,
    window: &RaidWindow,
    state_path: &Path,
    policy: PolicyKind,
) -> Result<TrackOutcome> {
    let outcome = council_events(log_path, window)?;
    let mut state = state_store::load_or_new(state_path, policy.build())?;

    let newly_applied = state.apply_all(&outcome.events);
    state_store::save(&state, state_path)?;

    tracing::info!(
        state = %state_path.display(),
        new_events = newly_applied,
        instances = state.registry().len(),
        "Council state tracked"
    );
    Ok(TrackOutcome {
        items: state.items().into_iter().cloned().collect(),
        events: outcome.events,
        newly_applied,
    })
}

/// Match guild master-loot patterns against the log.
///
/// Invalid patterns are skipped with a warning; if none survive, the scan
/// yields nothing.
pub fn loot(
    log_path: &Path,
    window: &RaidWindow,
    patterns: &[MasterLootPattern],
) -> Result<Vec<LootPickup>> {
    let (compiled, errors) = compile_patterns(patterns);
    if compiled.is_empty() {
        tracing::warn!(
            configured = patterns.len(),
            rejected = errors.len(),
            "No usable master-loot patterns configured"
        );
        return Ok(Vec::new());
    }
    let content = read_log(log_path)?;
    Ok(match_loot_lines(&content, window, &compiled))
}

/// Extract NPC kills from the log.
pub fn kills(log_path: &Path, window: &RaidWindow) -> Result<Vec<NpcKill>> {
    let content = read_log(log_path)?;
    Ok(match_npc_kills(&content, window))
}
