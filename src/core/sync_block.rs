// LootScribe - core/sync_block.rs
//
// State machine for the multi-line "Showing All Loot Requests" report.
//
// A report looks like:
//
//   ------ [Showing All Loot Requests For: {Low Quality Cat Pelt}
//   Request #1) Vayle, Current Votes: 0
//   Item Replaced: Rusty Two Handed Battle Axe --> [Vote for Player]
//   --------------------------------
//
// The accumulator aggregates one such block into a single SYNC_SUMMARY
// event. It also tracks sync sessions: a full dump covering several items,
// either bracketed by explicit `////// Showing All Loot Requests //////`
// lines or inferred from consecutive headers sharing a timestamp.

use crate::core::correlator::name_key;
use crate::core::model::{Event, EventKind, InterestEntry, InterestMode};
use crate::util::constants::{SYNC_SESSION_END_MIN_SLASHES, SYNC_TERMINATOR_MIN_RUN};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::OnceLock;

/// One open sync report, owned by the accumulator until it is flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncBlock {
    pub item_name: String,
    pub timestamp: DateTime<Utc>,
    pub raw_line: String,
    pub requests: Vec<InterestEntry>,
    pub marked_empty: bool,
    pub session_id: Option<u32>,
    pub session_order: Option<u32>,
    pub session_item_index: Option<u32>,
}

/// A request line seen but not yet completed by its replacement line.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub player_name: String,
    pub votes: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl PendingRequest {
    fn into_entry(self, replacing: Option<String>) -> InterestEntry {
        InterestEntry {
            player_name: self.player_name,
            replacing,
            mode: InterestMode::Replacing,
            votes: self.votes,
        }
    }
}

/// Accumulator state. At most one block is open at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SyncState {
    #[default]
    Closed,
    Open {
        block: SyncBlock,
        pending: Option<PendingRequest>,
    },
}

#[derive(Debug, Clone)]
struct SyncSession {
    /// Set only for sessions bracketed by explicit start/end lines.
    id: Option<u32>,
    block_order: u32,
    item_indexes: HashMap<String, u32>,
    last_header_at: Option<DateTime<Utc>>,
}

impl SyncSession {
    fn new(id: Option<u32>) -> Self {
        Self {
            id,
            block_order: 0,
            item_indexes: HashMap::new(),
            last_header_at: None,
        }
    }

    fn is_explicit(&self) -> bool {
        self.id.is_some()
    }

    /// Register a header; returns (session order, per-name item index).
    fn register(&mut self, item_name: &str, timestamp: DateTime<Utc>) -> (u32, u32) {
        self.block_order += 1;
        self.last_header_at = Some(timestamp);
        let index = self.item_indexes.entry(name_key(item_name)).or_insert(0);
        *index += 1;
        (self.block_order, *index)
    }
}

/// Aggregates sync report lines into SYNC_SUMMARY events.
#[derive(Debug, Default)]
pub struct SyncAccumulator {
    state: SyncState,
    session: Option<SyncSession>,
    sessions_started: u32,
}

impl SyncAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SyncState::Open { .. })
    }

    /// Open a block for `item_name`, flushing any block already open.
    ///
    /// Returns the summary of the block that was closed, if any.
    pub fn open(
        &mut self,
        item_name: &str,
        timestamp: DateTime<Utc>,
        raw_line: &str,
    ) -> Option<Event> {
        let flushed = self.close();

        let session = match self.session.take() {
            Some(s) if s.is_explicit() || s.last_header_at == Some(timestamp) => s,
            _ => SyncSession::new(None),
        };
        let session = self.session.insert(session);
        let (order, index) = session.register(item_name, timestamp);

        self.state = SyncState::Open {
            block: SyncBlock {
                item_name: item_name.to_string(),
                timestamp,
                raw_line: raw_line.to_string(),
                requests: Vec::new(),
                marked_empty: false,
                session_id: session.id,
                session_order: Some(order),
                session_item_index: Some(index),
            },
            pending: None,
        };
        flushed
    }

    /// Offer a line body to the open block.
    ///
    /// Returns `true` when the line was consumed as sync content. Lines that
    /// are not sync content, or arrive while no block is open, leave the
    /// state untouched and return `false`.
    pub fn feed_line(&mut self, body: &str, timestamp: DateTime<Utc>) -> bool {
        let SyncState::Open { block, pending } = &mut self.state else {
            return false;
        };
        let patterns = sync_patterns();

        if patterns.empty_marker.is_match(body) {
            // The client says nobody is interested: an unfinished request
            // line before it is stale and dropped.
            block.marked_empty = true;
            if let Some(p) = pending.take() {
                tracing::trace!(player = %p.player_name, "Dropping request superseded by empty marker");
            }
            return true;
        }

        if let Some(caps) = patterns.request.captures(body) {
            let player_name = caps["player"].trim().to_string();
            if player_name.is_empty() {
                return false;
            }
            if let Some(p) = pending.take() {
                block.requests.push(p.into_entry(None));
            }
            *pending = Some(PendingRequest {
                player_name,
                votes: caps["votes"].parse().ok(),
                timestamp,
            });
            return true;
        }

        if let Some(caps) = patterns.replacement.captures(body) {
            if let Some(p) = pending.take() {
                let replacement = caps["replacement"].trim().to_string();
                block.requests.push(p.into_entry(Some(replacement)));
                return true;
            }
        }

        false
    }

    /// Close the open block, if any, and return its summary event.
    pub fn close(&mut self) -> Option<Event> {
        let SyncState::Open { mut block, pending } = std::mem::take(&mut self.state) else {
            return None;
        };
        if let Some(p) = pending {
            block.requests.push(p.into_entry(None));
        }
        Some(summarize(block))
    }

    /// Handle an explicit session start line.
    ///
    /// An implicit session in progress is replaced; an explicit one
    /// continues.
    pub fn begin_session(&mut self) -> Option<Event> {
        let flushed = self.close();
        if !self.session.as_ref().is_some_and(SyncSession::is_explicit) {
            self.sessions_started += 1;
            self.session = Some(SyncSession::new(Some(self.sessions_started)));
        }
        flushed
    }

    /// Handle a session end line: flush the block and forget the session.
    pub fn end_session(&mut self) -> Option<Event> {
        let flushed = self.close();
        self.session = None;
        flushed
    }
}

fn summarize(block: SyncBlock) -> Event {
    let discriminator = format!(
        "{}::sync-summary::{}::{}",
        block.item_name,
        block.requests.len(),
        block.session_item_index.unwrap_or(0)
    );
    let empty = block.marked_empty && block.requests.is_empty();
    Event::new(
        block.timestamp,
        &discriminator,
        &block.raw_line,
        block.item_name,
        EventKind::SyncSummary {
            requests: block.requests,
            empty,
            session_id: block.session_id,
            session_order: block.session_order,
            session_item_index: block.session_item_index,
        },
    )
}

// =============================================================================
// Line shapes
// =============================================================================

struct SyncPatterns {
    empty_marker: Regex,
    request: Regex,
    replacement: Regex,
    session_start: Regex,
}

fn sync_patterns() -> &'static SyncPatterns {
    static PATTERNS: OnceLock<SyncPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("sync_block: invalid built-in regex")
        };
        SyncPatterns {
            empty_marker: re(r"^There are no loot requests for this item\."),
            request: re(r"^Request\s+#\d+\)\s+(?P<player>[^,]+),\s+Current Votes:\s+(?P<votes>\d+)"),
            replacement: re(r"^Item Replaced:\s+(?P<replacement>.+?)\s+-->"),
            session_start: re(r"^/{2,}\s*Showing All Loot Requests\s*/{2,}$"),
        }
    })
}

/// `////// Showing All Loot Requests //////`
pub fn is_session_start(body: &str) -> bool {
    sync_patterns().session_start.is_match(body)
}

/// A line of only slashes and whitespace with enough slashes to end a session.
pub fn is_session_end(body: &str) -> bool {
    !body.trim().is_empty()
        && body.chars().all(|c| c == '/' || c.is_whitespace())
        && body.chars().filter(|&c| c == '/').count() >= SYNC_SESSION_END_MIN_SLASHES
}

/// A dash/slash rule line closing a sync block.
pub fn is_terminator(body: &str) -> bool {
    if !body.chars().all(|c| c == '-' || c == '/' || c.is_whitespace()) {
        return false;
    }
    let mut run = 0usize;
    for c in body.chars() {
        if c == '-' || c == '/' {
            run += 1;
            if run >= SYNC_TERMINATOR_MIN_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}
