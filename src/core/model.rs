// LootScribe - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies. These types are the shared vocabulary across all layers and
// the JSON contract handed to downstream collaborators.

use crate::util::constants::EVENT_KEY_SEPARATOR;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Event (normalised output of parsing)
// =============================================================================

/// A single loot-council event recognised in the log.
///
/// Events are immutable once emitted. The `key` is derived from the timestamp
/// and a type-specific discriminator so that re-parsing overlapping input
/// produces the same key for the same logical event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Idempotent merge key (`<ISO timestamp>::<discriminator>`).
    pub key: String,

    /// Timestamp taken from the line's bracketed prefix.
    pub timestamp: DateTime<Utc>,

    /// Original line text as read from the log.
    pub raw_line: String,

    /// Cleaned item display name (quantity suffix, ordinal and tag removed).
    pub item_name: String,

    /// Type tag plus type-specific payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Build an event, deriving its key from `timestamp` and `discriminator`.
    pub fn new(
        timestamp: DateTime<Utc>,
        discriminator: &str,
        raw_line: &str,
        item_name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            key: event_key(timestamp, discriminator),
            timestamp,
            raw_line: raw_line.to_string(),
            item_name: item_name.into(),
            kind,
        }
    }

    /// The wire tag of this event (`"SYNC_SUMMARY"`, `"VOTE"`, ...).
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Build an event key from a timestamp and a discriminator.
///
/// The timestamp is rendered as ISO-8601 UTC with millisecond precision
/// (`2025-11-10T13:02:18.000Z`).
pub fn event_key(timestamp: DateTime<Utc>, discriminator: &str) -> String {
    format!(
        "{}{EVENT_KEY_SEPARATOR}{discriminator}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Type-specific payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    /// An item was announced or listed as under loot-council consideration.
    ItemConsidered {
        ordinal: Option<u32>,
        origin: ConsideredOrigin,
    },

    /// A player asked to be considered for the item.
    Request {
        player_name: String,
        replacing: Option<String>,
        mode: InterestMode,
    },

    /// A player withdrew a previous request.
    Withdrawal { player_name: String },

    /// One "Showing All Loot Requests For" block, aggregated.
    SyncSummary {
        requests: Vec<InterestEntry>,
        empty: bool,
        session_id: Option<u32>,
        session_order: Option<u32>,
        session_item_index: Option<u32>,
    },

    /// An officer voted for a candidate.
    Vote {
        candidate_name: String,
        voter_name: String,
    },

    /// The item was awarded by the council or master looter.
    Award { awarded_to: String },

    /// The item was donated to the master looter's guild.
    Donation,

    /// The item was awarded by random roll.
    RandomAward { awarded_to: String },

    /// The item was looted by the master looter.
    MasterLooted,

    /// The item was left on a corpse.
    LeftOnCorpse { corpse: String },

    /// The item was discarded, either announced or inferred from a pending list.
    Discarded { origin: DiscardOrigin },
}

impl EventKind {
    /// The wire tag of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::ItemConsidered { .. } => "ITEM_CONSIDERED",
            EventKind::Request { .. } => "REQUEST",
            EventKind::Withdrawal { .. } => "WITHDRAWAL",
            EventKind::SyncSummary { .. } => "SYNC_SUMMARY",
            EventKind::Vote { .. } => "VOTE",
            EventKind::Award { .. } => "AWARD",
            EventKind::Donation => "DONATION",
            EventKind::RandomAward { .. } => "RANDOM_AWARD",
            EventKind::MasterLooted => "MASTER_LOOTED",
            EventKind::LeftOnCorpse { .. } => "LEFT_ON_CORPSE",
            EventKind::Discarded { .. } => "DISCARDED",
        }
    }

    /// True for events that settle the fate of an item drop.
    pub fn is_disposition(&self) -> bool {
        matches!(
            self,
            EventKind::Award { .. }
                | EventKind::RandomAward { .. }
                | EventKind::Donation
                | EventKind::MasterLooted
                | EventKind::LeftOnCorpse { .. }
                | EventKind::Discarded { .. }
        )
    }

    /// Short human-readable detail used by the CSV export.
    pub fn detail(&self) -> String {
        match self {
            EventKind::ItemConsidered { ordinal, origin } => match ordinal {
                Some(n) => format!("{} #{n}", origin.label()),
                None => origin.label().to_string(),
            },
            EventKind::Request {
                player_name,
                replacing,
                ..
            } => match replacing {
                Some(old) => format!("{player_name} (replacing {old})"),
                None => format!("{player_name} (not replacing)"),
            },
            EventKind::Withdrawal { player_name } => player_name.clone(),
            EventKind::SyncSummary {
                requests, empty, ..
            } => {
                if *empty {
                    "no requests".to_string()
                } else {
                    requests
                        .iter()
                        .map(|r| r.player_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            }
            EventKind::Vote {
                candidate_name,
                voter_name,
            } => format!("{voter_name} -> {candidate_name}"),
            EventKind::Award { awarded_to } | EventKind::RandomAward { awarded_to } => {
                awarded_to.clone()
            }
            EventKind::LeftOnCorpse { corpse } => corpse.clone(),
            EventKind::Discarded { origin } => origin.label().to_string(),
            EventKind::Donation | EventKind::MasterLooted => String::new(),
        }
    }
}

// =============================================================================
// Interest
// =============================================================================

/// Whether a requesting player would replace an equipped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestMode {
    Replacing,
    NotReplacing,
}

/// One request listed inside a sync summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestEntry {
    pub player_name: String,
    pub replacing: Option<String>,
    pub mode: InterestMode,
    pub votes: Option<u32>,
}

// =============================================================================
// Origins
// =============================================================================

/// Where an ITEM_CONSIDERED event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsideredOrigin {
    /// "X is being considered by the loot council" announcement.
    Announce,
    /// Numbered "Status: Pending" list line.
    Pending,
}

impl ConsideredOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            ConsideredOrigin::Announce => "announce",
            ConsideredOrigin::Pending => "pending",
        }
    }
}

/// Where a DISCARDED event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscardOrigin {
    /// An explicit "X discarded!" line.
    Explicit,
    /// The item disappeared between two pending-loot dumps.
    PendingSnapshot,
}

impl DiscardOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            DiscardOrigin::Explicit => "discarded",
            DiscardOrigin::PendingSnapshot => "missing from pending list",
        }
    }
}
