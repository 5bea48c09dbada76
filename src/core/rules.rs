// LootScribe - core/rules.rs
//
// Priority-ordered line classifier for loot-council chat lines.
//
// Each rule is a compiled, case-insensitive regex with named groups plus an
// extractor that turns the captures into an event. Rules are tried in table
// order against the line body (timestamp prefix removed); the first rule
// whose regex matches and whose extractor accepts the captures wins.
//
// The multi-line sync report and pending-loot dumps need state across lines
// and live in `sync_block` and `pending`. This module only recognises the
// sync header that opens a block.

use crate::core::model::{ConsideredOrigin, DiscardOrigin, Event, EventKind, InterestMode};
use chrono::{DateTime, Utc};
use regex::{Captures, Regex, RegexBuilder};
use std::sync::OnceLock;

/// Result of classifying one line body.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// A complete single-line event.
    Event(Event),

    /// A numbered "Status: Pending" list line. Carries the zone and NPC so
    /// the pending-loot tracker can key its snapshot entries.
    PendingEntry {
        event: Event,
        zone: Option<String>,
        npc: Option<String>,
    },

    /// A "Showing All Loot Requests For: {item}" header.
    SyncHeader { item_name: String },
}

/// Inputs shared by every extractor.
struct LineContext<'a> {
    timestamp: DateTime<Utc>,
    raw_line: &'a str,
}

type Extractor = fn(&Captures<'_>, &LineContext<'_>) -> Option<Classified>;

struct Rule {
    name: &'static str,
    re: Regex,
    extract: Extractor,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

    RULES.get_or_init(|| {
        fn rule(name: &'static str, pattern: &str, extract: Extractor) -> Rule {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("rules: invalid built-in regex");
            Rule { name, re, extract }
        }

        vec![
            rule(
                "item-considered",
                r"^(?:(?P<ordinal>\d+)\)\s*)?(?:\[[^\]]+\]\s*)?(?P<item>.+?)\s+is\s+(?:now\s+)?being\s+considered\s+by\s+the\s+loot\s+council",
                extract_considered,
            ),
            rule(
                "pending-list",
                r"^(?P<ordinal>\d+)\)\s+(?:\[(?P<zone>[^\]]+)\]\s*)?(?P<item>.+?)\s+\|\s+Status:\s+Pending(?:\s+\|\s+NPC:\s+(?P<npc>.+))?",
                extract_pending_entry,
            ),
            rule(
                "request-replacing",
                r"\[Loot Council\] System said, '(?P<player>.+?) has requested to be considered for (?P<item>.+?) to replace (?P<replace>.+?)\.",
                extract_request_replacing,
            ),
            rule(
                "request-not-replacing",
                r"\[Loot Council\] System said, '(?P<player>.+?) has requested to be considered for (?P<item>.+?)\.\s+(?P<repeat>.+?) is not replacing anything\.",
                extract_request_not_replacing,
            ),
            rule(
                "withdrawal",
                r"\[Loot Council\] System said, '(?P<player>.+?) has withdrawn their interest in (?P<item>.+?)!'\s*$",
                extract_withdrawal,
            ),
            rule(
                "vote",
                r"\[Loot Council\] System said, '(?P<voter>.+?) has voted for (?P<candidate>.+?) to rec(?:ie|ei)ve (?P<item>.+?)'\s*$",
                extract_vote,
            ),
            rule(
                "award",
                r"^(?:\[[^\]]+\]\s*)?(?P<item>.+?) has been awarded to (?P<player>.+?) by the (?:Loot Council|Master Looter)",
                extract_award,
            ),
            rule(
                "donation",
                r"^(?:\[[^\]]+\]\s*)?(?P<item>.+?) has been donated to the Master Looter(?:'s)? guild\.",
                extract_donation,
            ),
            rule(
                "random-award",
                r"^(?:\[[^\]]+\]\s*)?(?P<item>.+?) has been awarded to (?P<player>.+?) by random roll\.",
                extract_random_award,
            ),
            rule(
                "master-looted",
                r"^(?:\[[^\]]+\]\s*)?(?P<item>.+?) has been looted by the Master Looter\.",
                extract_master_looted,
            ),
            rule(
                "left-on-corpse",
                r"^(?:\[[^\]]+\]\s*)?(?P<item>.+?) has been left on the '(?P<target>.+?)'\.",
                extract_left_on_corpse,
            ),
            rule(
                "discarded",
                r"(?:.*\.\s+)?(?P<item>[^.]+?)\s+discarded!$",
                extract_discarded,
            ),
            rule(
                "sync-header",
                r"^-+\s*\[?Showing All Loot Requests For:\s*\{(?P<item>.+?)\}\]?$",
                extract_sync_header,
            ),
        ]
    })
}

/// Classify a timestamp-qualified line body.
///
/// `body` is the trimmed line with its timestamp prefix removed; `raw_line`
/// is kept verbatim on the emitted event. Returns `None` when no rule
/// matches.
pub fn classify(body: &str, timestamp: DateTime<Utc>, raw_line: &str) -> Option<Classified> {
    let ctx = LineContext {
        timestamp,
        raw_line,
    };
    rules().iter().find_map(|rule| {
        let caps = rule.re.captures(body)?;
        (rule.extract)(&caps, &ctx)
    })
}

/// Rule names in evaluation order.
pub fn rule_names() -> Vec<&'static str> {
    rules().iter().map(|r| r.name).collect()
}

fn clean_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("clean_item_name: invalid regex");
        [
            re(r"^\s*\d+\)\s*"),
            re(r"\s*\(\d+\)\s*$"),
            re(r"^\s*\[[^\]]+\]\s*"),
        ]
    })
}

/// Normalise an item display name.
///
/// Strips, in order, a leading `N)` ordinal, a trailing `(N)` quantity and a
/// leading `[tag]`, then trims. `"Velium Warhammer (12)"` becomes
/// `"Velium Warhammer"`.
pub fn clean_item_name(value: &str) -> String {
    let [ordinal, quantity, tag] = clean_patterns();
    let s = ordinal.replace(value, "");
    let s = quantity.replace(&s, "");
    let s = tag.replace(&s, "");
    s.trim().to_string()
}

// =============================================================================
// Extractors
// =============================================================================

/// Trimmed, non-empty capture.
fn group<'c>(caps: &'c Captures<'_>, name: &str) -> Option<&'c str> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Cleaned item name, rejecting names that clean down to nothing.
fn item(caps: &Captures<'_>) -> Option<String> {
    let cleaned = clean_item_name(group(caps, "item")?);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn event(ctx: &LineContext<'_>, discriminator: &str, item: String, kind: EventKind) -> Event {
    Event::new(ctx.timestamp, discriminator, ctx.raw_line, item, kind)
}

fn extract_considered(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let ordinal = group(caps, "ordinal").and_then(|s| s.parse().ok());
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::considered"),
        item,
        EventKind::ItemConsidered {
            ordinal,
            origin: ConsideredOrigin::Announce,
        },
    )))
}

fn extract_pending_entry(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let ordinal = group(caps, "ordinal").and_then(|s| s.parse().ok());
    let event = event(
        ctx,
        &format!("{item}::pending"),
        item,
        EventKind::ItemConsidered {
            ordinal,
            origin: ConsideredOrigin::Pending,
        },
    );
    Some(Classified::PendingEntry {
        event,
        zone: group(caps, "zone").map(str::to_string),
        npc: group(caps, "npc").map(str::to_string),
    })
}

fn extract_request_replacing(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let player = group(caps, "player")?.to_string();
    let replacing = group(caps, "replace")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::{player}::request"),
        item,
        EventKind::Request {
            player_name: player,
            replacing: Some(replacing),
            mode: InterestMode::Replacing,
        },
    )))
}

fn extract_request_not_replacing(
    caps: &Captures<'_>,
    ctx: &LineContext<'_>,
) -> Option<Classified> {
    let item = item(caps)?;
    let player = group(caps, "player")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::{player}::request"),
        item,
        EventKind::Request {
            player_name: player,
            replacing: None,
            mode: InterestMode::NotReplacing,
        },
    )))
}

fn extract_withdrawal(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let player = group(caps, "player")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::{player}::withdrawal"),
        item,
        EventKind::Withdrawal {
            player_name: player,
        },
    )))
}

fn extract_vote(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let candidate = group(caps, "candidate")?.to_string();
    let voter = group(caps, "voter")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::{candidate}::vote::{voter}"),
        item,
        EventKind::Vote {
            candidate_name: candidate,
            voter_name: voter,
        },
    )))
}

fn extract_award(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let player = group(caps, "player")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::award"),
        item,
        EventKind::Award { awarded_to: player },
    )))
}

fn extract_donation(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::donation"),
        item,
        EventKind::Donation,
    )))
}

fn extract_random_award(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let player = group(caps, "player")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::random-award"),
        item,
        EventKind::RandomAward { awarded_to: player },
    )))
}

fn extract_master_looted(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::master-looted"),
        item,
        EventKind::MasterLooted,
    )))
}

fn extract_left_on_corpse(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    let corpse = group(caps, "target")?.to_string();
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::left-on"),
        item,
        EventKind::LeftOnCorpse { corpse },
    )))
}

fn extract_discarded(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<Classified> {
    let item = item(caps)?;
    Some(Classified::Event(event(
        ctx,
        &format!("{item}::discarded"),
        item,
        EventKind::Discarded {
            origin: DiscardOrigin::Explicit,
        },
    )))
}

fn extract_sync_header(caps: &Captures<'_>, _ctx: &LineContext<'_>) -> Option<Classified> {
    Some(Classified::SyncHeader {
        item_name: item(caps)?,
    })
}
