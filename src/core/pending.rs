// LootScribe - core/pending.rs
//
// Pending-loot snapshot diffing.
//
// The client can dump the list of items still awaiting a council decision:
//
//   ---------- Pending Loot ----------
//   1) [Sebilis] Crystalline Spear | Status: Pending | NPC: a froglok knight
//   2) [Sebilis] Spider Silk | Status: Pending
//
// Items present in one dump but missing from the next were disposed of
// without an explicit line; each yields a DISCARDED event with origin
// PENDING_SNAPSHOT.

use crate::core::model::{DiscardOrigin, Event, EventKind};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
struct SnapshotEntry {
    key: String,
    item_name: String,
    raw_line: String,
}

/// Tracks successive pending-loot dumps.
#[derive(Debug, Default)]
pub struct PendingTracker {
    previous: Option<Vec<SnapshotEntry>>,
    building: Option<Vec<SnapshotEntry>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a dump is being collected.
    pub fn is_active(&self) -> bool {
        self.building.is_some()
    }

    /// Handle a `-- Pending Loot --` header: finalize any dump in progress
    /// and start a new one.
    pub fn begin(&mut self, timestamp: DateTime<Utc>) -> Vec<Event> {
        let discarded = self.finalize(timestamp);
        self.building = Some(Vec::new());
        discarded
    }

    /// Add one pending-list entry to the dump in progress.
    ///
    /// Entries seen outside a dump are ignored here; the caller still emits
    /// their ITEM_CONSIDERED event.
    pub fn record(&mut self, item_name: &str, zone: Option<&str>, npc: Option<&str>, raw_line: &str) {
        let Some(building) = self.building.as_mut() else {
            return;
        };
        let key = snapshot_key(item_name, zone, npc);
        let entry = SnapshotEntry {
            key,
            item_name: item_name.to_string(),
            raw_line: raw_line.to_string(),
        };
        match building.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => building.push(entry),
        }
    }

    /// Close the dump in progress and diff it against the previous one.
    ///
    /// Discards are stamped with `timestamp`, the time of the line that
    /// ended the dump. The first dump of a run never yields discards.
    pub fn finalize(&mut self, timestamp: DateTime<Utc>) -> Vec<Event> {
        let Some(current) = self.building.take() else {
            return Vec::new();
        };

        let mut discarded = Vec::new();
        if let Some(previous) = self.previous.take() {
            let present: HashSet<&str> = current.iter().map(|e| e.key.as_str()).collect();
            for entry in previous {
                if present.contains(entry.key.as_str()) {
                    continue;
                }
                discarded.push(Event::new(
                    timestamp,
                    &format!("{}::pending-discard", entry.item_name),
                    &entry.raw_line,
                    entry.item_name,
                    EventKind::Discarded {
                        origin: DiscardOrigin::PendingSnapshot,
                    },
                ));
            }
        }

        if !discarded.is_empty() {
            tracing::debug!(count = discarded.len(), "Pending loot items disappeared between dumps");
        }
        self.previous = Some(current);
        discarded
    }
}

fn snapshot_key(item_name: &str, zone: Option<&str>, npc: Option<&str>) -> String {
    let part = |v: Option<&str>, fallback: &str| {
        v.map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };
    format!(
        "{}::{}::{}",
        item_name.to_lowercase(),
        part(zone, "unknown-zone"),
        part(npc, "unknown-npc")
    )
}

struct PendingPatterns {
    header: Regex,
    filler: Regex,
}

fn patterns() -> &'static PendingPatterns {
    static PATTERNS: OnceLock<PendingPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("pending: invalid built-in regex")
        };
        PendingPatterns {
            header: re(r"^-+\s*Pending Loot\s*-+$"),
            filler: re(r"^(?:Options:|\[Loot Council\]|>|-+|$)"),
        }
    })
}

/// `---------- Pending Loot ----------`
pub fn is_header(body: &str) -> bool {
    patterns().header.is_match(body)
}

/// Lines the client interleaves with a pending dump without ending it.
pub fn is_filler(body: &str) -> bool {
    patterns().filler.is_match(body.trim())
}
