// LootScribe - core/parser.rs
//
// Loot-council event extraction over a complete log text.
// Core layer: accepts the text as a string, never touches the filesystem.
//
// Lines are processed strictly in textual order. Each line goes through the
// timestamp extractor and raid-window filter, then structural checks (sync
// session brackets, pending-loot header, rule lines), then the rule table,
// and finally the open sync block's sub-rules.

use crate::core::model::Event;
use crate::core::pending::{self, PendingTracker};
use crate::core::rules::{self, Classified};
use crate::core::sync_block::{self, SyncAccumulator};
use crate::core::timestamp::{LogLine, RaidWindow};
use crate::util::logging::preview;
use chrono::{DateTime, Utc};

/// Result of parsing one log text.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Events in emission order.
    pub events: Vec<Event>,
    /// Total lines read.
    pub lines_processed: u64,
    /// Lines with a valid timestamp inside the raid window.
    pub lines_in_window: u64,
    /// Lines dropped for a missing or unparsable timestamp.
    pub lines_without_timestamp: u64,
    /// Lines dropped for a timestamp outside the raid window.
    pub lines_out_of_window: u64,
}

/// Parse loot-council events from `content` within `window`.
///
/// Never fails: malformed or unrecognised lines only produce fewer events.
pub fn parse_loot_council(content: &str, window: &RaidWindow) -> Vec<Event> {
    parse_loot_council_with_stats(content, window).events
}

/// As [`parse_loot_council`], also reporting line counters.
pub fn parse_loot_council_with_stats(content: &str, window: &RaidWindow) -> ParseOutcome {
    let mut run = ParseRun::default();
    let mut outcome = ParseOutcome::default();
    let mut last_timestamp: Option<DateTime<Utc>> = None;

    for raw in content.lines() {
        outcome.lines_processed += 1;

        let line = LogLine::read(raw);
        let Some(timestamp) = line.timestamp else {
            outcome.lines_without_timestamp += 1;
            continue;
        };
        if !window.contains(timestamp) {
            outcome.lines_out_of_window += 1;
            continue;
        }
        outcome.lines_in_window += 1;
        last_timestamp = Some(timestamp);

        let body = line.body();
        if body.is_empty() {
            continue;
        }
        run.process(body, timestamp, raw);
    }

    run.finish(last_timestamp.unwrap_or(window.start));
    outcome.events = run.events;

    tracing::debug!(
        lines = outcome.lines_processed,
        in_window = outcome.lines_in_window,
        no_timestamp = outcome.lines_without_timestamp,
        out_of_window = outcome.lines_out_of_window,
        events = outcome.events.len(),
        "Loot council parse complete"
    );
    outcome
}

/// Mutable state threaded through one parse.
#[derive(Default)]
struct ParseRun {
    events: Vec<Event>,
    sync: SyncAccumulator,
    pending: PendingTracker,
}

impl ParseRun {
    fn process(&mut self, body: &str, timestamp: DateTime<Utc>, raw: &str) {
        if sync_block::is_session_start(body) {
            let flushed = self.sync.begin_session();
            self.emit(flushed);
            return;
        }
        if sync_block::is_session_end(body) {
            let flushed = self.sync.end_session();
            self.emit(flushed);
            return;
        }
        if pending::is_header(body) {
            let flushed = self.sync.close();
            self.emit(flushed);
            let discarded = self.pending.begin(timestamp);
            self.events.extend(discarded);
            return;
        }
        if sync_block::is_terminator(body) {
            // Dash rules are also pending-dump filler, so the dump stays open.
            let flushed = self.sync.close();
            self.emit(flushed);
            return;
        }

        match rules::classify(body, timestamp, raw) {
            Some(Classified::PendingEntry { event, zone, npc }) => {
                let flushed = self.sync.close();
                self.emit(flushed);
                self.pending
                    .record(&event.item_name, zone.as_deref(), npc.as_deref(), raw);
                self.events.push(event);
            }
            Some(Classified::SyncHeader { item_name }) => {
                self.settle_pending(body, timestamp);
                let flushed = self.sync.open(&item_name, timestamp, raw);
                self.emit(flushed);
            }
            Some(Classified::Event(event)) => {
                self.settle_pending(body, timestamp);
                let flushed = self.sync.close();
                self.emit(flushed);
                self.events.push(event);
            }
            None => {
                self.settle_pending(body, timestamp);
                if !self.sync.feed_line(body, timestamp) {
                    tracing::trace!(line = preview(raw), "Unclassified line");
                }
            }
        }
    }

    /// A non-filler line ends the pending dump in progress.
    fn settle_pending(&mut self, body: &str, timestamp: DateTime<Utc>) {
        if self.pending.is_active() && !pending::is_filler(body) {
            let discarded = self.pending.finalize(timestamp);
            self.events.extend(discarded);
        }
    }

    fn emit(&mut self, event: Option<Event>) {
        if let Some(e) = event {
            self.events.push(e);
        }
    }

    fn finish(&mut self, last_timestamp: DateTime<Utc>) {
        let flushed = self.sync.close();
        self.emit(flushed);
        let discarded = self.pending.finalize(last_timestamp);
        self.events.extend(discarded);
    }
}
