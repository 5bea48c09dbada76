// LootScribe - core/correlator.rs
//
// Item-drop instance correlation.
//
// The log never carries an instance identifier, yet a common item can drop
// many times in one raid. The registry keeps, per normalised name, an ordered
// list of distinct instances and hands out the one at a requested 1-based
// position, creating instances when the position runs past the end.
//
// Storage is an append-only arena (position = id - 1) plus a side index from
// name key to ids sorted by (first seen, id). Ids are never reused or
// renumbered, so callers may hold them across runs.

use crate::core::model::{Event, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Normalise a display name into a correlation key.
///
/// Case-folds, trims and collapses internal whitespace. Display names are
/// kept verbatim on the instance; the key only groups variants.
pub fn name_key(display_name: &str) -> String {
    let collapsed = display_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if collapsed.is_empty() {
        display_name.trim().to_lowercase()
    } else {
        collapsed
    }
}

/// One distinct occurrence of an item during a raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInstance {
    pub instance_id: u64,
    pub name_key: String,
    pub display_name: String,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ItemInstance {
    fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.first_seen, self.instance_id)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Raid-scoped registry of item instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegistryRepr", into = "RegistryRepr")]
pub struct ItemRegistry {
    instances: Vec<ItemInstance>,
    by_key: BTreeMap<String, Vec<u64>>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances across all names.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Id the next created instance will receive.
    pub fn next_id(&self) -> u64 {
        self.instances.len() as u64 + 1
    }

    pub fn instance(&self, id: u64) -> Option<&ItemInstance> {
        let pos = usize::try_from(id.checked_sub(1)?).ok()?;
        self.instances.get(pos)
    }

    /// Instances sharing `display_name`'s key, in (first seen, id) order.
    pub fn candidates(&self, display_name: &str) -> Vec<&ItemInstance> {
        self.by_key
            .get(&name_key(display_name))
            .map(|ids| ids.iter().filter_map(|&id| self.instance(id)).collect())
            .unwrap_or_default()
    }

    /// Select the instance at 1-based `index` for `display_name`.
    ///
    /// Indices below 1 clamp to 1. When fewer than `index` instances exist,
    /// new ones are appended until the list is long enough; existing
    /// positions never shift. A created instance's `first_seen` is
    /// `timestamp`, raised to the current tail's `first_seen` when earlier. The selected instance's `last_updated` advances to
    /// `timestamp`. Returns the selected instance id.
    pub fn resolve(&mut self, display_name: &str, timestamp: DateTime<Utc>, index: usize) -> u64 {
        let key = name_key(display_name);
        let index = index.max(1);
        let instances = &mut self.instances;
        let ids = self.by_key.entry(key.clone()).or_default();

        while ids.len() < index {
            let id = instances.len() as u64 + 1;
            // Grown instances always go last; first_seen never precedes the
            // current tail so the list stays in (first seen, id) order.
            let first_seen = ids
                .last()
                .and_then(|&last| instances.get((last - 1) as usize))
                .map_or(timestamp, |tail| tail.first_seen.max(timestamp));
            instances.push(ItemInstance {
                instance_id: id,
                name_key: key.clone(),
                display_name: display_name.to_string(),
                first_seen,
                last_updated: timestamp,
            });
            ids.push(id);
            tracing::trace!(id, key = %key, position = ids.len(), "Item instance created");
        }

        let id = ids[index - 1];
        if let Some(selected) = instances.get_mut((id - 1) as usize) {
            if timestamp > selected.last_updated {
                selected.last_updated = timestamp;
            }
        }
        id
    }
}

/// Serialised form: the arena alone. The side index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct RegistryRepr {
    instances: Vec<ItemInstance>,
}

impl From<ItemRegistry> for RegistryRepr {
    fn from(r: ItemRegistry) -> Self {
        Self {
            instances: r.instances,
        }
    }
}

impl TryFrom<RegistryRepr> for ItemRegistry {
    type Error = String;

    fn try_from(repr: RegistryRepr) -> Result<Self, Self::Error> {
        let mut by_key: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for (pos, inst) in repr.instances.iter().enumerate() {
            if inst.instance_id != pos as u64 + 1 {
                return Err(format!(
                    "instance ids must be contiguous from 1: found {} at position {}",
                    inst.instance_id,
                    pos + 1
                ));
            }
            by_key
                .entry(inst.name_key.clone())
                .or_default()
                .push(inst.instance_id);
        }
        let instances = repr.instances;
        for ids in by_key.values_mut() {
            ids.sort_by_key(|&id| instances[(id - 1) as usize].order_key());
        }
        Ok(Self { instances, by_key })
    }
}

// =============================================================================
// Index policies
// =============================================================================

/// A correlation candidate: an existing instance and whether its fate is
/// already settled.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub instance: &'a ItemInstance,
    pub resolved: bool,
}

/// Derives the 1-based positional index an event targets.
///
/// `candidates` are the existing instances for the event's name key in
/// (first seen, id) order. Returning `candidates.len() + n` asks the
/// registry to create `n` new instances.
pub trait IndexPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn occurrence_index(&self, event: &Event, candidates: &[Candidate<'_>]) -> usize;
}

/// Maps events onto instances that are still open.
///
/// A sync summary's `session_item_index = k` targets the k-th unresolved
/// candidate. Other events target the first unresolved candidate; once every
/// candidate is settled a fresh consideration or request opens a new
/// instance, and anything else lands on the latest one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveOrdinal;

impl IndexPolicy for ActiveOrdinal {
    fn name(&self) -> &'static str {
        "active"
    }

    fn occurrence_index(&self, event: &Event, candidates: &[Candidate<'_>]) -> usize {
        let mut open = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.resolved)
            .map(|(pos, _)| pos + 1);

        if let EventKind::SyncSummary {
            session_item_index, ..
        } = &event.kind
        {
            let k = session_item_index.unwrap_or(1).max(1) as usize;
            let open: Vec<usize> = open.collect();
            return match open.get(k - 1) {
                Some(&pos) => pos,
                None => candidates.len() + (k - open.len()),
            };
        }

        if let Some(pos) = open.next() {
            return pos;
        }
        match event.kind {
            EventKind::ItemConsidered { .. } | EventKind::Request { .. } => candidates.len() + 1,
            _ => candidates.len().max(1),
        }
    }
}

/// Uses the raw per-session item index over all candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOrdinal;

impl IndexPolicy for SessionOrdinal {
    fn name(&self) -> &'static str {
        "session"
    }

    fn occurrence_index(&self, event: &Event, _candidates: &[Candidate<'_>]) -> usize {
        match event.kind {
            EventKind::SyncSummary {
                session_item_index: Some(k),
                ..
            } => k as usize,
            _ => 1,
        }
    }
}

/// Every event for a name maps onto one instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleInstance;

impl IndexPolicy for SingleInstance {
    fn name(&self) -> &'static str {
        "single"
    }

    fn occurrence_index(&self, _event: &Event, _candidates: &[Candidate<'_>]) -> usize {
        1
    }
}

/// Policy selector used by configuration and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Active,
    Session,
    Single,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn IndexPolicy> {
        match self {
            PolicyKind::Active => Box::new(ActiveOrdinal),
            PolicyKind::Session => Box::new(SessionOrdinal),
            PolicyKind::Single => Box::new(SingleInstance),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Active => "active",
            PolicyKind::Session => "session",
            PolicyKind::Single => "single",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(PolicyKind::Active),
            "session" => Ok(PolicyKind::Session),
            "single" => Ok(PolicyKind::Single),
            other => Err(format!(
                "unknown correlation policy '{other}' (expected active, session or single)"
            )),
        }
    }
}

/// Correlate one event onto the registry.
///
/// `is_resolved` reports whether an instance's fate is already settled.
pub fn correlate(
    registry: &mut ItemRegistry,
    policy: &dyn IndexPolicy,
    event: &Event,
    is_resolved: impl Fn(u64) -> bool,
) -> u64 {
    let index = {
        let candidates: Vec<Candidate<'_>> = registry
            .candidates(&event.item_name)
            .into_iter()
            .map(|instance| Candidate {
                instance,
                resolved: is_resolved(instance.instance_id),
            })
            .collect();
        policy.occurrence_index(event, &candidates)
    };
    registry.resolve(&event.item_name, event.timestamp, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ConsideredOrigin, DiscardOrigin};
    use chrono::TimeZone;

    fn at(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, 13, m, 0).unwrap()
    }

    fn considered(item: &str, m: u32) -> Event {
        Event::new(
            at(m),
            &format!("{item}::considered"),
            "raw",
            item,
            EventKind::ItemConsidered {
                ordinal: None,
                origin: ConsideredOrigin::Announce,
            },
        )
    }

    fn summary(item: &str, m: u32, index: Option<u32>) -> Event {
        Event::new(
            at(m),
            &format!("{item}::sync-summary::0::0"),
            "raw",
            item,
            EventKind::SyncSummary {
                requests: Vec::new(),
                empty: true,
                session_id: None,
                session_order: Some(1),
                session_item_index: index,
            },
        )
    }

    #[test]
    fn test_name_key_normalisation() {
        assert_eq!(name_key("  Spider   Silk "), "spider silk");
        assert_eq!(name_key("SPIDER SILK"), "spider silk");
        assert_eq!(name_key("   "), "");
    }

    #[test]
    fn test_resolve_grows_to_requested_index() {
        let mut reg = ItemRegistry::new();
        reg.resolve("Other", at(0), 1);
        let n = reg.next_id();
        assert_eq!(n, 2);

        let id = reg.resolve("Spider Silk", at(1), 3);
        assert_eq!(id, n + 2);
        let ids: Vec<u64> = reg
            .candidates("Spider Silk")
            .iter()
            .map(|i| i.instance_id)
            .collect();
        assert_eq!(ids, vec![n, n + 1, n + 2]);
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn test_resolve_clamps_zero_index() {
        let mut reg = ItemRegistry::new();
        assert_eq!(reg.resolve("Spider Silk", at(0), 0), 1);
        assert_eq!(reg.resolve("Spider Silk", at(1), 0), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_case_and_whitespace_variants_share_instances() {
        let mut reg = ItemRegistry::new();
        let a = reg.resolve("Spider Silk", at(0), 1);
        let b = reg.resolve("spider  SILK ", at(1), 1);
        assert_eq!(a, b);
        let inst = reg.instance(a).unwrap();
        assert_eq!(inst.display_name, "Spider Silk");
        assert_eq!(inst.last_updated, at(1));
    }

    #[test]
    fn test_existing_instances_are_never_renumbered() {
        let mut reg = ItemRegistry::new();
        let first = reg.resolve("Spider Silk", at(5), 1);
        // An earlier timestamp still grows the list at the end.
        let second = reg.resolve("Spider Silk", at(1), 2);
        assert_eq!((first, second), (1, 2));
        let order: Vec<u64> = reg
            .candidates("Spider Silk")
            .iter()
            .map(|i| i.instance_id)
            .collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(reg.instance(1).unwrap().first_seen, at(5));
        assert_eq!(reg.instance(2).unwrap().first_seen, at(5));
        assert_eq!(reg.instance(2).unwrap().last_updated, at(1));

        // Positions stay put on later lookups.
        assert_eq!(reg.resolve("Spider Silk", at(0), 1), 1);
        assert_eq!(reg.resolve("Spider Silk", at(0), 2), 2);
    }

    #[test]
    fn test_growth_from_earlier_log_selects_created_instance() {
        let mut reg = ItemRegistry::new();
        reg.resolve("Spider Silk", at(5), 1);
        let third = reg.resolve("Spider Silk", at(1), 3);
        assert_eq!(third, 3);
        assert_eq!(reg.len(), 3);

        let json = serde_json::to_string(&reg).unwrap();
        let back: ItemRegistry = serde_json::from_str(&json).unwrap();
        let order: Vec<u64> = back
            .candidates("Spider Silk")
            .iter()
            .map(|i| i.instance_id)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_instance_lookup_out_of_range() {
        let reg = ItemRegistry::new();
        assert!(reg.instance(0).is_none());
        assert!(reg.instance(1).is_none());
    }

    #[test]
    fn test_registry_json_roundtrip_rebuilds_index() {
        let mut reg = ItemRegistry::new();
        reg.resolve("Spider Silk", at(0), 2);
        reg.resolve("Cat Pelt", at(1), 1);
        let json = serde_json::to_string(&reg).unwrap();
        let back: ItemRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reg);
        assert_eq!(back.next_id(), 4);
    }

    #[test]
    fn test_registry_rejects_gapped_ids() {
        let json = r#"{"instances":[{"instanceId":2,"nameKey":"a","displayName":"A",
            "firstSeen":"2025-11-10T13:00:00Z","lastUpdated":"2025-11-10T13:00:00Z"}]}"#;
        assert!(serde_json::from_str::<ItemRegistry>(json).is_err());
    }

    #[test]
    fn test_active_policy_targets_unresolved() {
        let mut reg = ItemRegistry::new();
        reg.resolve("Spider Silk", at(0), 2);
        let resolved_first = |id: u64| id == 1;

        // Non-sync event goes to the first open instance.
        let id = correlate(&mut reg, &ActiveOrdinal, &considered("Spider Silk", 1), resolved_first);
        assert_eq!(id, 2);

        // Sync index 2 skips the settled instance and grows by one.
        let id = correlate(
            &mut reg,
            &ActiveOrdinal,
            &summary("Spider Silk", 2, Some(2)),
            resolved_first,
        );
        assert_eq!(id, 3);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_active_policy_all_resolved() {
        let mut reg = ItemRegistry::new();
        reg.resolve("Spider Silk", at(0), 1);
        let all = |_: u64| true;

        let id = correlate(&mut reg, &ActiveOrdinal, &considered("Spider Silk", 1), all);
        assert_eq!(id, 2);

        let discard = Event::new(
            at(2),
            "Spider Silk::discarded",
            "raw",
            "Spider Silk",
            EventKind::Discarded {
                origin: DiscardOrigin::Explicit,
            },
        );
        let id = correlate(&mut reg, &ActiveOrdinal, &discard, all);
        assert_eq!(id, 2);
    }

    #[test]
    fn test_session_and_single_policies() {
        let mut reg = ItemRegistry::new();
        let id = correlate(&mut reg, &SessionOrdinal, &summary("Silk", 0, Some(3)), |_| false);
        assert_eq!(id, 3);
        let id = correlate(&mut reg, &SessionOrdinal, &considered("Silk", 1), |_| false);
        assert_eq!(id, 1);

        let mut reg = ItemRegistry::new();
        let id = correlate(&mut reg, &SingleInstance, &summary("Silk", 0, Some(3)), |_| true);
        assert_eq!(id, 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_policy_kind_parsing() {
        assert_eq!("Active".parse::<PolicyKind>(), Ok(PolicyKind::Active));
        assert_eq!("session".parse::<PolicyKind>(), Ok(PolicyKind::Session));
        assert!("ordinal".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::default().build().name(), "active");
    }
}
