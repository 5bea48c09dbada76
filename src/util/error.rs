// LootScribe - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.
//
// The loot-council parser itself never returns an error: malformed input
// only ever produces fewer events. These types cover the surfaces around
// it (configuration, user regexes, export, persisted state).

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LootScribe operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LootScribeError {
    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// A user-supplied master-loot pattern was rejected.
    Pattern(PatternError),

    /// Export operation failed.
    Export(ExportError),

    /// Persisted council state could not be read or written.
    State(StateError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LootScribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Pattern(e) => write!(f, "Pattern error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::State(e) => write!(f, "State error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LootScribeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Pattern(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::State(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LootScribeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

/// Errors related to guild-defined master-loot patterns.
///
/// These are surfaced as warnings: the offending pattern is skipped and
/// matching continues with the remaining patterns.
#[derive(Debug)]
pub enum PatternError {
    /// The regex failed to compile.
    InvalidRegex {
        pattern_id: String,
        pattern: String,
        source: regex::Error,
    },

    /// The regex exceeds the maximum allowed length.
    RegexTooLong {
        pattern_id: String,
        length: usize,
        max_length: usize,
    },

    /// The pattern has an empty id or pattern string.
    MissingField {
        pattern_id: String,
        field: &'static str,
    },

    /// More patterns were configured than the matcher accepts.
    TooManyPatterns { count: usize, max: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegex {
                pattern_id,
                pattern,
                source,
            } => write!(
                f,
                "Pattern '{pattern_id}': invalid regex ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                pattern_id,
                length,
                max_length,
            } => write!(
                f,
                "Pattern '{pattern_id}': regex is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::MissingField { pattern_id, field } => {
                write!(f, "Pattern '{pattern_id}': missing required field '{field}'")
            }
            Self::TooManyPatterns { count, max } => write!(
                f,
                "Too many master-loot patterns ({count}), only the first {max} are used"
            ),
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PatternError> for LootScribeError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Export would exceed maximum event count.
    TooManyEvents { count: usize, max: usize },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
            Self::TooManyEvents { count, max } => write!(
                f,
                "Export of {count} events exceeds maximum of {max}. \
                 Narrow the raid window to reduce the result set."
            ),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ExportError> for LootScribeError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// State errors
// ---------------------------------------------------------------------------

/// Errors related to persisted council state.
#[derive(Debug)]
pub enum StateError {
    /// I/O error reading or writing the state file.
    Io { path: PathBuf, source: io::Error },

    /// The state file is not valid JSON for the expected schema.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The state file was written by an incompatible version.
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "State I/O error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "State file '{}' is malformed: {source}", path.display())
            }
            Self::VersionMismatch {
                path,
                found,
                expected,
            } => write!(
                f,
                "State file '{}' has version {found}, expected {expected}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<StateError> for LootScribeError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

/// Convenience type alias for LootScribe results.
pub type Result<T> = std::result::Result<T, LootScribeError>;
