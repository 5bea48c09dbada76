// LootScribe - platform/config.rs
//
// Platform-specific configuration, data directory resolution, and config.toml
// loading with validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::correlator::PolicyKind;
use crate::core::master_loot::MasterLootPattern;
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LootScribe configuration and state.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/lootscribe/ or %APPDATA%\LootScribe\config\)
    pub config_dir: PathBuf,

    /// Data directory for persisted council state.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
            }
        }
    }

    /// Default location of `config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }

    /// Default location of the persisted council state.
    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join(constants::STATE_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored so a newer config file still loads in
/// an older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[logging]` section.
    pub logging: LoggingSection,
    /// `[correlation]` section.
    pub correlation: CorrelationSection,
    /// `[state]` section.
    pub state: StateSection,
    /// `[master_loot]` section.
    pub master_loot: MasterLootSection,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// `[correlation]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct CorrelationSection {
    /// Index policy: "active", "session" or "single".
    pub policy: Option<String>,
}

/// `[state]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct StateSection {
    /// Override for the council state file path.
    pub file: Option<String>,
}

/// `[master_loot]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct MasterLootSection {
    /// `[[master_loot.patterns]]` entries, in match order.
    pub patterns: Vec<MasterLootPattern>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Correlation index policy.
    pub policy: PolicyKind,
    /// Council state file override.
    pub state_file: Option<PathBuf>,
    /// Guild master-loot patterns, uncompiled.
    pub master_loot_patterns: Vec<MasterLootPattern>,
}

/// Load and validate `config.toml` at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal
/// warnings. A missing file at the default location means first run and
/// yields defaults. When `explicit` is set the user named the file, so a
/// missing, unreadable or unparseable file is an error instead.
pub fn load_config(
    config_path: &Path,
    explicit: bool,
) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let mut warnings: Vec<String> = Vec::new();

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
            return Ok((AppConfig::default(), warnings));
        }
        Err(e) if !explicit => {
            let msg = format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return Ok((AppConfig::default(), warnings));
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: config_path.to_path_buf(),
                source: e,
            })
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(e) if !explicit => {
            let msg = format!(
                "Failed to parse config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return Ok((AppConfig::default(), warnings));
        }
        Err(e) => {
            return Err(ConfigError::TomlParse {
                path: config_path.to_path_buf(),
                source: e,
            })
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");
    let (config, validation_warnings) = validate(raw);
    warnings.extend(validation_warnings);

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }
    Ok((config, warnings))
}

/// Validate every field, accumulating all problems.
fn validate(raw: RawConfig) -> (AppConfig, Vec<String>) {
    let mut config = AppConfig::default();
    let mut warnings = Vec::new();

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(
                ConfigError::ValueOutOfRange {
                    field: "[logging] level".to_string(),
                    value: level.clone(),
                    expected: "one of error, warn, info, debug, trace (using info)".to_string(),
                }
                .to_string(),
            );
        }
    }

    // -- Correlation: policy --
    if let Some(ref policy) = raw.correlation.policy {
        match policy.parse::<PolicyKind>() {
            Ok(kind) => config.policy = kind,
            Err(_) => warnings.push(
                ConfigError::ValueOutOfRange {
                    field: "[correlation] policy".to_string(),
                    value: policy.clone(),
                    expected: format!(
                        "one of active, session, single (using {})",
                        PolicyKind::default()
                    ),
                }
                .to_string(),
            ),
        }
    }

    // -- State: file --
    if let Some(ref file) = raw.state.file {
        if !file.trim().is_empty() {
            config.state_file = Some(PathBuf::from(file.trim()));
        }
    }

    // -- Master loot: patterns --
    // Regex validity is checked when the patterns are compiled.
    let mut seen_ids = std::collections::HashSet::new();
    for pattern in raw.master_loot.patterns {
        if !pattern.id.is_empty() && !seen_ids.insert(pattern.id.clone()) {
            warnings.push(format!(
                "[master_loot] duplicate pattern id \"{}\"; only the first is used.",
                pattern.id
            ));
            continue;
        }
        config.master_loot_patterns.push(pattern);
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(constants::CONFIG_FILE_NAME);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let (config, warnings) =
            load_config(&dir.path().join("config.toml"), false).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.policy, PolicyKind::Active);
        assert!(config.master_loot_patterns.is_empty());
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("nope.toml"), true).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[logging]
level = "DEBUG"

[correlation]
policy = "session"

[state]
file = "/tmp/raid.json"

[[master_loot.patterns]]
id = "looted"
label = "Looted from corpse"
pattern = '--(?P<looter>\w+) has looted an? (?P<item>.+?) from'

[[master_loot.patterns]]
id = "given"
pattern = '(?P<looter>\w+) was given (?P<item>.+?) by (?P<method>.+?)\.$'
ignored_methods = ["free-for-all"]
"#,
        );
        let (config, warnings) = load_config(&path, true).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.policy, PolicyKind::Session);
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/raid.json")));
        assert_eq!(config.master_loot_patterns.len(), 2);
        assert_eq!(config.master_loot_patterns[1].ignored_methods, vec!["free-for-all"]);
        assert_eq!(config.master_loot_patterns[1].label, "");
    }

    #[test]
    fn test_invalid_values_warn_and_fall_back() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[logging]
level = "loud"

[correlation]
policy = "guess"

[[master_loot.patterns]]
id = "a"
pattern = "x"

[[master_loot.patterns]]
id = "a"
pattern = "y"
"#,
        );
        let (config, warnings) = load_config(&path, false).unwrap();
        assert_eq!(warnings.len(), 3, "{warnings:?}");
        assert!(warnings[0].contains("[logging] level"));
        assert!(warnings[1].contains("[correlation] policy"));
        assert!(warnings[2].contains("duplicate"));
        assert_eq!(config.log_level, None);
        assert_eq!(config.policy, PolicyKind::Active);
        assert_eq!(config.master_loot_patterns.len(), 1);
        assert_eq!(config.master_loot_patterns[0].pattern, "x");
    }

    #[test]
    fn test_unparseable_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[logging\nlevel = ");

        let (config, warnings) = load_config(&path, false).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.policy, PolicyKind::Active);

        let err = load_config(&path, true).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[future]\nflag = true\n[logging]\nlevel = \"warn\"\n");
        let (config, warnings) = load_config(&path, true).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }
}
