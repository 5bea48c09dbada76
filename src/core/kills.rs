// LootScribe - core/kills.rs
//
// NPC kill extraction with zone attribution.

use crate::core::timestamp::{LogLine, RaidWindow};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::sync::OnceLock;

/// One NPC kill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcKill {
    pub timestamp: DateTime<Utc>,
    pub npc_name: String,
    pub killer_name: Option<String>,
    pub zone_name: Option<String>,
    pub raw_line: String,
}

struct KillPatterns {
    zone: Regex,
    you_slew: Regex,
    slain_by: Regex,
}

fn patterns() -> &'static KillPatterns {
    static PATTERNS: OnceLock<KillPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("kills: invalid built-in regex")
        };
        KillPatterns {
            zone: re(r"^You have entered (?P<zone>.+?)\.$"),
            you_slew: re(r"^You have slain (?P<npc>.+?)!$"),
            slain_by: re(r"^(?P<npc>.+?) has been slain by (?P<killer>.+?)!$"),
        }
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Match a kill line body to (npc, killer).
fn match_kill(body: &str) -> Option<(String, Option<String>)> {
    let p = patterns();
    if let Some(caps) = p.you_slew.captures(body) {
        return Some((caps["npc"].to_string(), Some("You".to_string())));
    }
    let caps = p.slain_by.captures(body)?;
    let killer = caps["killer"].trim();
    Some((
        caps["npc"].to_string(),
        (!killer.is_empty()).then(|| killer.to_string()),
    ))
}

/// Extract NPC kills inside `window`.
///
/// Zone changes are collected from every timestamped line, inside the
/// window or not, so a kill early in the raid still sees the zone entered
/// before it began. Each kill takes the latest zone entered at or before it.
pub fn match_npc_kills(content: &str, window: &RaidWindow) -> Vec<NpcKill> {
    let mut zone_changes: Vec<(DateTime<Utc>, String)> = Vec::new();
    for raw in content.lines() {
        if !raw.contains("You have entered") {
            continue;
        }
        let line = LogLine::read(raw);
        let Some(ts) = line.timestamp else { continue };
        if let Some(caps) = patterns().zone.captures(line.body()) {
            let zone = caps["zone"].trim();
            if !zone.is_empty() {
                zone_changes.push((ts, zone.to_string()));
            }
        }
    }
    // Stable: equal timestamps keep file order, so the later line wins.
    zone_changes.sort_by_key(|(ts, _)| *ts);

    let zone_at = |ts: DateTime<Utc>| -> Option<String> {
        let idx = zone_changes.partition_point(|(changed, _)| *changed <= ts);
        idx.checked_sub(1).map(|i| zone_changes[i].1.clone())
    };

    let mut kills = Vec::new();
    for raw in content.lines() {
        if !raw.to_ascii_lowercase().contains("slain") {
            continue;
        }
        let Some((line, ts)) = window.qualify(raw) else {
            continue;
        };
        let Some((npc, killer)) = match_kill(line.body()) else {
            continue;
        };
        let npc_name = collapse_whitespace(&npc);
        if npc_name.is_empty() {
            continue;
        }
        kills.push(NpcKill {
            timestamp: ts,
            npc_name,
            killer_name: killer,
            zone_name: zone_at(ts),
            raw_line: raw.to_string(),
        });
    }

    tracing::debug!(
        kills = kills.len(),
        zone_changes = zone_changes.len(),
        "NPC kill scan complete"
    );
    kills
}
