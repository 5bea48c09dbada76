// LootScribe - core/council.rs
//
// Per-instance loot-council state built by folding the event stream.
//
// Every event is first correlated onto an item instance, then applied to
// that instance's record: interests from live requests and sync dumps,
// officer votes, and the final disposition. Events whose key has already
// been applied are skipped, so overlapping log ranges can be re-fed against
// persisted state.

use crate::core::correlator::{correlate, IndexPolicy, ItemRegistry, PolicyKind};
use crate::core::model::{Event, EventKind, InterestEntry, InterestMode};
use crate::util::constants::STATE_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle of one item instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Active,
    Awarded,
    Removed,
}

/// Where an interest was last refreshed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestSource {
    Live,
    Sync,
}

/// One player's interest in an item instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interest {
    pub player_key: String,
    pub player_name: String,
    pub replacing: Option<String>,
    pub mode: InterestMode,
    pub votes: Option<u32>,
    pub last_updated_at: DateTime<Utc>,
    pub source: InterestSource,
    pub voters: Vec<String>,
}

impl Interest {
    fn new(player_name: &str, at: DateTime<Utc>, source: InterestSource) -> Self {
        Self {
            player_key: player_key(player_name),
            player_name: player_name.to_string(),
            replacing: None,
            mode: InterestMode::NotReplacing,
            votes: None,
            last_updated_at: at,
            source,
            voters: Vec::new(),
        }
    }
}

/// Council record of one item instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilItem {
    pub instance_id: u64,
    pub item_name: String,
    pub ordinal: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub status: ItemStatus,
    pub awarded_to: Option<String>,
    pub interests: Vec<Interest>,
}

impl CouncilItem {
    fn new(instance_id: u64, item_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            instance_id,
            item_name: item_name.to_string(),
            ordinal: None,
            started_at: at,
            last_updated_at: at,
            status: ItemStatus::Active,
            awarded_to: None,
            interests: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status != ItemStatus::Active
    }

    pub fn interest(&self, player_name: &str) -> Option<&Interest> {
        let key = player_key(player_name);
        self.interests.iter().find(|i| i.player_key == key)
    }

    fn interest_mut(&mut self, player_name: &str, at: DateTime<Utc>) -> &mut Interest {
        let key = player_key(player_name);
        let pos = match self.interests.iter().position(|i| i.player_key == key) {
            Some(pos) => pos,
            None => {
                self.interests
                    .push(Interest::new(player_name, at, InterestSource::Live));
                self.interests.len() - 1
            }
        };
        &mut self.interests[pos]
    }

    fn apply(&mut self, event: &Event) {
        let at = event.timestamp;
        match &event.kind {
            EventKind::ItemConsidered { ordinal, .. } => {
                if ordinal.is_some() {
                    self.ordinal = *ordinal;
                }
            }
            EventKind::Request {
                player_name,
                replacing,
                mode,
            } => {
                let interest = self.interest_mut(player_name, at);
                interest.player_name = player_name.clone();
                interest.replacing = replacing.clone();
                interest.mode = *mode;
                interest.last_updated_at = at;
                interest.source = InterestSource::Live;
            }
            EventKind::Withdrawal { player_name } => {
                let key = player_key(player_name);
                self.interests.retain(|i| i.player_key != key);
            }
            EventKind::SyncSummary { requests, .. } => self.replace_interests(requests, at),
            EventKind::Vote {
                candidate_name,
                voter_name,
            } => {
                let interest = self.interest_mut(candidate_name, at);
                let voter_key = player_key(voter_name);
                if !interest.voters.iter().any(|v| player_key(v) == voter_key) {
                    interest.voters.push(voter_name.clone());
                }
                let count = u32::try_from(interest.voters.len()).unwrap_or(u32::MAX);
                interest.votes = Some(interest.votes.unwrap_or(0).max(count));
                interest.last_updated_at = at;
            }
            EventKind::Award { awarded_to } | EventKind::RandomAward { awarded_to } => {
                self.status = ItemStatus::Awarded;
                self.awarded_to = Some(awarded_to.clone());
            }
            kind if kind.is_disposition() => self.status = ItemStatus::Removed,
            _ => {}
        }
        if at > self.last_updated_at {
            self.last_updated_at = at;
        }
    }

    /// A sync dump is the authoritative interest list at its time.
    fn replace_interests(&mut self, requests: &[InterestEntry], at: DateTime<Utc>) {
        let previous = std::mem::take(&mut self.interests);
        for entry in requests {
            let key = player_key(&entry.player_name);
            if self.interests.iter().any(|i| i.player_key == key) {
                continue;
            }
            let voters = previous
                .iter()
                .find(|i| i.player_key == key)
                .map(|i| i.voters.clone())
                .unwrap_or_default();
            self.interests.push(Interest {
                player_key: key,
                player_name: entry.player_name.clone(),
                replacing: entry.replacing.clone(),
                mode: entry.mode,
                votes: entry.votes,
                last_updated_at: at,
                source: InterestSource::Sync,
                voters,
            });
        }
    }
}

fn player_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// =============================================================================
// CouncilState
// =============================================================================

/// Correlated council state for one raid.
#[derive(Debug)]
pub struct CouncilState {
    registry: ItemRegistry,
    items: BTreeMap<u64, CouncilItem>,
    applied_keys: BTreeSet<String>,
    policy: Box<dyn IndexPolicy>,
}

impl Default for CouncilState {
    fn default() -> Self {
        Self::new(PolicyKind::default().build())
    }
}

impl CouncilState {
    pub fn new(policy: Box<dyn IndexPolicy>) -> Self {
        Self {
            registry: ItemRegistry::new(),
            items: BTreeMap::new(),
            applied_keys: BTreeSet::new(),
            policy,
        }
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn item(&self, instance_id: u64) -> Option<&CouncilItem> {
        self.items.get(&instance_id)
    }

    /// Items ordered by (started at, instance id).
    pub fn items(&self) -> Vec<&CouncilItem> {
        let mut items: Vec<&CouncilItem> = self.items.values().collect();
        items.sort_by_key(|i| (i.started_at, i.instance_id));
        items
    }

    /// Apply one event. Returns the instance it landed on, or `None` when
    /// the event key was already applied.
    pub fn apply(&mut self, event: &Event) -> Option<u64> {
        if !self.applied_keys.insert(event.key.clone()) {
            tracing::trace!(key = %event.key, "Event already applied, skipping");
            return None;
        }

        let items = &self.items;
        let id = correlate(&mut self.registry, self.policy.as_ref(), event, |id| {
            items.get(&id).is_some_and(CouncilItem::is_resolved)
        });

        self.items
            .entry(id)
            .or_insert_with(|| CouncilItem::new(id, &event.item_name, event.timestamp))
            .apply(event);
        Some(id)
    }

    /// Apply events in order; returns how many were new.
    pub fn apply_all(&mut self, events: &[Event]) -> usize {
        let applied = events.iter().filter_map(|e| self.apply(e)).count();
        tracing::debug!(
            events = events.len(),
            applied,
            instances = self.registry.len(),
            policy = self.policy.name(),
            "Council state updated"
        );
        applied
    }

    pub fn snapshot(&self) -> CouncilSnapshot {
        CouncilSnapshot {
            version: STATE_VERSION,
            policy: self.policy.name().to_string(),
            registry: self.registry.clone(),
            items: self.items.values().cloned().collect(),
            applied_keys: self.applied_keys.iter().cloned().collect(),
        }
    }

    /// Rebuild state from a snapshot. The caller checks `version`.
    pub fn from_snapshot(snapshot: CouncilSnapshot, policy: Box<dyn IndexPolicy>) -> Self {
        if snapshot.policy != policy.name() {
            tracing::warn!(
                saved = %snapshot.policy,
                current = policy.name(),
                "Correlation policy differs from the one that built the saved state"
            );
        }
        Self {
            registry: snapshot.registry,
            items: snapshot
                .items
                .into_iter()
                .map(|i| (i.instance_id, i))
                .collect(),
            applied_keys: snapshot.applied_keys.into_iter().collect(),
            policy,
        }
    }
}

/// Serialisable form of [`CouncilState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilSnapshot {
    pub version: u32,
    pub policy: String,
    pub registry: ItemRegistry,
    pub items: Vec<CouncilItem>,
    #[serde(default)]
    pub applied_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlator::{ActiveOrdinal, SingleInstance};
    use crate::core::model::{ConsideredOrigin, DiscardOrigin};
    use chrono::TimeZone;

    fn at(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, 13, m, 0).unwrap()
    }

    fn ev(m: u32, disc: &str, item: &str, kind: EventKind) -> Event {
        Event::new(at(m), disc, "raw", item, kind)
    }

    fn considered(m: u32, item: &str, ordinal: Option<u32>) -> Event {
        ev(
            m,
            &format!("{item}::considered"),
            item,
            EventKind::ItemConsidered {
                ordinal,
                origin: ConsideredOrigin::Announce,
            },
        )
    }

    fn request(m: u32, item: &str, player: &str) -> Event {
        ev(
            m,
            &format!("{item}::{player}::request"),
            item,
            EventKind::Request {
                player_name: player.into(),
                replacing: Some("Old Axe".into()),
                mode: InterestMode::Replacing,
            },
        )
    }

    fn vote(m: u32, item: &str, candidate: &str, voter: &str) -> Event {
        ev(
            m,
            &format!("{item}::{candidate}::vote::{voter}"),
            item,
            EventKind::Vote {
                candidate_name: candidate.into(),
                voter_name: voter.into(),
            },
        )
    }

    fn award(m: u32, item: &str, to: &str) -> Event {
        ev(
            m,
            &format!("{item}::award"),
            item,
            EventKind::Award {
                awarded_to: to.into(),
            },
        )
    }

    #[test]
    fn test_request_vote_award_lifecycle() {
        let mut state = CouncilState::default();
        let id = state.apply(&considered(0, "Spider Silk", Some(2))).unwrap();
        state.apply(&request(1, "Spider Silk", "Vayle"));
        state.apply(&vote(2, "Spider Silk", "Vayle", "Officer"));
        state.apply(&vote(3, "Spider Silk", "Vayle", "Captain"));
        state.apply(&award(4, "Spider Silk", "Vayle"));

        let item = state.item(id).unwrap();
        assert_eq!(item.ordinal, Some(2));
        assert_eq!(item.status, ItemStatus::Awarded);
        assert_eq!(item.awarded_to.as_deref(), Some("Vayle"));
        assert_eq!(item.last_updated_at, at(4));
        let interest = item.interest("vayle").unwrap();
        assert_eq!(interest.votes, Some(2));
        assert_eq!(interest.voters, vec!["Officer", "Captain"]);
        assert_eq!(interest.replacing.as_deref(), Some("Old Axe"));
        assert_eq!(interest.source, InterestSource::Live);
    }

    #[test]
    fn test_withdrawal_removes_interest() {
        let mut state = CouncilState::default();
        let id = state.apply(&request(0, "Spider Silk", "Vayle")).unwrap();
        state.apply(&ev(
            1,
            "Spider Silk::Vayle::withdrawal",
            "Spider Silk",
            EventKind::Withdrawal {
                player_name: "VAYLE".into(),
            },
        ));
        assert!(state.item(id).unwrap().interests.is_empty());
    }

    #[test]
    fn test_donation_and_corpse_leftover_remove_item() {
        let mut state = CouncilState::default();
        let silk = state.apply(&request(0, "Spider Silk", "Vayle")).unwrap();
        let rune = state.apply(&considered(0, "Ancient Rune", None)).unwrap();
        state.apply(&ev(1, "Spider Silk::donation", "Spider Silk", EventKind::Donation));
        state.apply(&ev(
            2,
            "Ancient Rune::left-on-corpse",
            "Ancient Rune",
            EventKind::LeftOnCorpse {
                corpse: "a sebilis crypt crawler".into(),
            },
        ));

        let silk = state.item(silk).unwrap();
        assert_eq!(silk.status, ItemStatus::Removed);
        assert_eq!(silk.awarded_to, None);
        assert_eq!(silk.last_updated_at, at(1));
        assert_eq!(state.item(rune).unwrap().status, ItemStatus::Removed);
    }

    #[test]
    fn test_sync_summary_replaces_interests_and_keeps_voters() {
        let mut state = CouncilState::default();
        let id = state.apply(&request(0, "Spider Silk", "Vayle")).unwrap();
        state.apply(&request(0, "Spider Silk", "Brom"));
        state.apply(&vote(1, "Spider Silk", "Vayle", "Officer"));
        state.apply(&ev(
            2,
            "Spider Silk::sync-summary::1::1",
            "Spider Silk",
            EventKind::SyncSummary {
                requests: vec![InterestEntry {
                    player_name: "Vayle".into(),
                    replacing: None,
                    mode: InterestMode::Replacing,
                    votes: Some(1),
                }],
                empty: false,
                session_id: None,
                session_order: Some(1),
                session_item_index: Some(1),
            },
        ));

        let item = state.item(id).unwrap();
        assert_eq!(item.interests.len(), 1);
        let vayle = &item.interests[0];
        assert_eq!(vayle.source, InterestSource::Sync);
        assert_eq!(vayle.voters, vec!["Officer"]);
        assert_eq!(vayle.votes, Some(1));
        assert_eq!(vayle.replacing, None);
    }

    #[test]
    fn test_second_drop_after_award_gets_new_instance() {
        let mut state = CouncilState::new(Box::new(ActiveOrdinal));
        let first = state.apply(&considered(0, "Spider Silk", None)).unwrap();
        state.apply(&award(1, "Spider Silk", "Vayle"));
        let second = state.apply(&considered(2, "spider silk", None)).unwrap();
        assert_ne!(first, second);
        assert_eq!(state.item(second).unwrap().status, ItemStatus::Active);

        state.apply(&ev(
            3,
            "Spider Silk::discarded",
            "Spider Silk",
            EventKind::Discarded {
                origin: DiscardOrigin::Explicit,
            },
        ));
        assert_eq!(state.item(second).unwrap().status, ItemStatus::Removed);
        assert_eq!(state.item(first).unwrap().status, ItemStatus::Awarded);

        let order: Vec<u64> = state.items().iter().map(|i| i.instance_id).collect();
        assert_eq!(order, vec![first, second]);
    }

    #[test]
    fn test_single_instance_policy_merges_drops() {
        let mut state = CouncilState::new(Box::new(SingleInstance));
        let a = state.apply(&considered(0, "Spider Silk", None)).unwrap();
        state.apply(&award(1, "Spider Silk", "Vayle"));
        let b = state.apply(&considered(2, "Spider Silk", None)).unwrap();
        assert_eq!(a, b);
        assert_eq!(state.policy_name(), "single");
    }

    #[test]
    fn test_duplicate_keys_are_applied_once() {
        let mut state = CouncilState::default();
        let e = vote(0, "Spider Silk", "Vayle", "Officer");
        assert!(state.apply(&e).is_some());
        assert!(state.apply(&e).is_none());
        assert_eq!(state.apply_all(&[e.clone(), award(1, "Spider Silk", "Vayle")]), 1);
    }

    #[test]
    fn test_snapshot_roundtrip_continues_numbering() {
        let mut state = CouncilState::default();
        state.apply(&considered(0, "Spider Silk", None));
        state.apply(&award(1, "Spider Silk", "Vayle"));

        let json = serde_json::to_string(&state.snapshot()).unwrap();
        let snapshot: CouncilSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.version, STATE_VERSION);

        let mut restored = CouncilState::from_snapshot(snapshot, Box::new(ActiveOrdinal));
        assert_eq!(restored.snapshot(), state.snapshot());
        assert_eq!(restored.registry().next_id(), 2);

        // Replayed event is skipped; a new drop continues from next_id.
        assert!(restored.apply(&award(1, "Spider Silk", "Vayle")).is_none());
        assert_eq!(restored.apply(&considered(5, "Spider Silk", None)), Some(2));
    }
}
