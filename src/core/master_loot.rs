// LootScribe - core/master_loot.rs
//
// Guild-configurable master-loot pickup matcher.
//
// Guilds describe how their loot lines look with plain regexes. Each pattern
// names its captures `item`, `looter` and optionally `method`; patterns
// without names fall back to positional groups 1, 2 and 3. Patterns are
// tried in order against the whole sanitised line and the first match wins.

use crate::core::timestamp::RaidWindow;
use crate::util::constants::{MAX_MASTER_LOOT_PATTERNS, MAX_REGEX_PATTERN_LENGTH};
use crate::util::error::PatternError;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// One pattern as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MasterLootPattern {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub pattern: String,
    /// Loot methods (case-insensitive) whose lines are dropped.
    #[serde(default)]
    pub ignored_methods: Vec<String>,
}

/// A validated pattern ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub id: String,
    pub label: String,
    regex: Regex,
    ignored_methods: Vec<String>,
}

impl CompiledPattern {
    fn ignores(&self, method: &str) -> bool {
        let method = method.trim().to_lowercase();
        self.ignored_methods.iter().any(|m| *m == method)
    }
}

/// A loot pickup recognised by one of the guild patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LootPickup {
    pub timestamp: DateTime<Utc>,
    pub raw_line: String,
    pub item_name: Option<String>,
    pub looter: Option<String>,
    pub method: Option<String>,
    pub pattern_id: String,
    pub context: String,
}

/// Compile guild patterns case-insensitively.
///
/// Invalid patterns are skipped and reported; the remainder are returned in
/// configuration order. Patterns beyond the configured maximum are ignored.
pub fn compile_patterns(defs: &[MasterLootPattern]) -> (Vec<CompiledPattern>, Vec<PatternError>) {
    let mut compiled = Vec::with_capacity(defs.len().min(MAX_MASTER_LOOT_PATTERNS));
    let mut errors = Vec::new();

    if defs.len() > MAX_MASTER_LOOT_PATTERNS {
        let err = PatternError::TooManyPatterns {
            count: defs.len(),
            max: MAX_MASTER_LOOT_PATTERNS,
        };
        tracing::warn!(error = %err, "Truncating master-loot pattern list");
        errors.push(err);
    }

    for def in defs.iter().take(MAX_MASTER_LOOT_PATTERNS) {
        match compile_one(def) {
            Ok(p) => compiled.push(p),
            Err(e) => {
                tracing::warn!(pattern = %def.id, error = %e, "Skipping master-loot pattern");
                errors.push(e);
            }
        }
    }

    tracing::debug!(
        compiled = compiled.len(),
        skipped = errors.len(),
        "Master-loot patterns compiled"
    );
    (compiled, errors)
}

fn compile_one(def: &MasterLootPattern) -> Result<CompiledPattern, PatternError> {
    let id = def.id.trim();
    if id.is_empty() {
        return Err(PatternError::MissingField {
            pattern_id: "<unnamed>".to_string(),
            field: "id",
        });
    }
    if def.pattern.trim().is_empty() {
        return Err(PatternError::MissingField {
            pattern_id: id.to_string(),
            field: "pattern",
        });
    }
    if def.pattern.len() > MAX_REGEX_PATTERN_LENGTH {
        return Err(PatternError::RegexTooLong {
            pattern_id: id.to_string(),
            length: def.pattern.len(),
            max_length: MAX_REGEX_PATTERN_LENGTH,
        });
    }

    let regex = RegexBuilder::new(&def.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PatternError::InvalidRegex {
            pattern_id: id.to_string(),
            pattern: def.pattern.clone(),
            source: e,
        })?;

    Ok(CompiledPattern {
        id: id.to_string(),
        label: def.label.clone(),
        regex,
        ignored_methods: def
            .ignored_methods
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect(),
    })
}

/// Named group, falling back to a positional group.
fn capture(caps: &Captures<'_>, name: &str, position: usize) -> Option<String> {
    caps.name(name)
        .or_else(|| caps.get(position))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Scan `content` for loot pickups inside `window`.
pub fn match_loot_lines(
    content: &str,
    window: &RaidWindow,
    patterns: &[CompiledPattern],
) -> Vec<LootPickup> {
    let mut pickups = Vec::new();
    if patterns.is_empty() {
        return pickups;
    }

    for raw in content.lines() {
        let Some((line, timestamp)) = window.qualify(raw) else {
            continue;
        };
        let text = line.sanitized.as_ref();

        let Some((pattern, caps)) = patterns
            .iter()
            .find_map(|p| p.regex.captures(text).map(|c| (p, c)))
        else {
            continue;
        };

        let method = capture(&caps, "method", 3);
        if method.as_deref().is_some_and(|m| pattern.ignores(m)) {
            tracing::trace!(pattern = %pattern.id, method = ?method, "Ignored loot method");
            continue;
        }

        pickups.push(LootPickup {
            timestamp,
            raw_line: raw.to_string(),
            item_name: capture(&caps, "item", 1),
            looter: capture(&caps, "looter", 2),
            method,
            pattern_id: pattern.id.clone(),
            context: pattern.label.clone(),
        });
    }

    tracing::debug!(pickups = pickups.len(), "Master-loot scan complete");
    pickups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> RaidWindow {
        RaidWindow::starting_at(Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap())
    }

    fn def(id: &str, pattern: &str) -> MasterLootPattern {
        MasterLootPattern {
            id: id.to_string(),
            label: format!("{id} label"),
            pattern: pattern.to_string(),
            ignored_methods: Vec::new(),
        }
    }

    const LOG: &str = "\
[Mon Nov 10 13:00:00 2025] --Vayle has looted a Spider Silk from a spider's corpse.--
[Mon Nov 10 13:00:05 2025] Brom was given Cat Pelt by master loot.
[Mon Nov 10 13:00:09 2025] Brom was given Rusty Axe by free-for-all.
[Mon Nov 10 11:00:00 2025] --Early has looted a Bone Chip from a skeleton's corpse.--
";

    #[test]
    fn test_named_and_positional_groups() {
        let (patterns, errors) = compile_patterns(&[
            def("looted", r"--(?P<looter>\w+) has looted an? (?P<item>.+?) from"),
            def("given", r"(\w+) was given (.+?) by (.+?)\.$"),
        ]);
        assert!(errors.is_empty());

        let pickups = match_loot_lines(LOG, &window(), &patterns);
        assert_eq!(pickups.len(), 3);
        assert_eq!(pickups[0].item_name.as_deref(), Some("Spider Silk"));
        assert_eq!(pickups[0].looter.as_deref(), Some("Vayle"));
        assert_eq!(pickups[0].method, None);
        assert_eq!(pickups[0].pattern_id, "looted");
        assert_eq!(pickups[0].context, "looted label");

        // Positional fallback: group 1 is the item slot, 2 the looter slot.
        assert_eq!(pickups[1].item_name.as_deref(), Some("Brom"));
        assert_eq!(pickups[1].looter.as_deref(), Some("Cat Pelt"));
        assert_eq!(pickups[1].method.as_deref(), Some("master loot"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped_with_warning() {
        let (patterns, errors) = compile_patterns(&[
            def("broken", r"(?P<item>unclosed"),
            def("looted", r"--(?P<looter>\w+) has looted an? (?P<item>.+?) from"),
        ]);
        assert_eq!(patterns.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], PatternError::InvalidRegex { pattern_id, .. } if pattern_id == "broken"));

        let pickups = match_loot_lines(LOG, &window(), &patterns);
        assert_eq!(pickups.len(), 1);
        assert_eq!(pickups[0].looter.as_deref(), Some("Vayle"));
    }

    #[test]
    fn test_ignored_methods_drop_line() {
        let mut given = def("given", r"(?P<looter>\w+) was given (?P<item>.+?) by (?P<method>.+?)\.$");
        given.ignored_methods = vec!["Free-For-All".to_string()];
        let (patterns, _) = compile_patterns(&[given]);

        let pickups = match_loot_lines(LOG, &window(), &patterns);
        assert_eq!(pickups.len(), 1);
        assert_eq!(pickups[0].item_name.as_deref(), Some("Cat Pelt"));
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let (patterns, _) = compile_patterns(&[def("looted", r"HAS LOOTED AN? (?P<item>.+?) FROM")]);
        let pickups = match_loot_lines(LOG, &window(), &patterns);
        assert_eq!(pickups.len(), 1);
        assert_eq!(pickups[0].item_name.as_deref(), Some("Spider Silk"));
    }

    #[test]
    fn test_missing_fields_and_length_limit() {
        let (_, errors) = compile_patterns(&[
            def("", "x"),
            def("empty", "  "),
            def("long", &"a".repeat(MAX_REGEX_PATTERN_LENGTH + 1)),
        ]);
        assert!(matches!(errors[0], PatternError::MissingField { field: "id", .. }));
        assert!(matches!(errors[1], PatternError::MissingField { field: "pattern", .. }));
        assert!(matches!(errors[2], PatternError::RegexTooLong { .. }));
    }

    #[test]
    fn test_too_many_patterns_truncates() {
        let defs: Vec<_> = (0..MAX_MASTER_LOOT_PATTERNS + 2)
            .map(|i| def(&format!("p{i}"), "looted"))
            .collect();
        let (patterns, errors) = compile_patterns(&defs);
        assert_eq!(patterns.len(), MAX_MASTER_LOOT_PATTERNS);
        assert!(matches!(errors[0], PatternError::TooManyPatterns { .. }));
    }
}
