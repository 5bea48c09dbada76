// LootScribe - util/constants.rs
//
// Single source of truth for named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LootScribe";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LootScribe";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Log line shapes
// =============================================================================

/// chrono format for the bracketed client timestamp once the weekday name
/// has been removed (`Nov 10 13:02:18 2025`).
pub const LOG_TIMESTAMP_FORMAT: &str = "%b %d %H:%M:%S %Y";

/// Minimum run of `-` or `/` characters that terminates a sync block.
pub const SYNC_TERMINATOR_MIN_RUN: usize = 5;

/// Minimum number of slashes on a line that ends an explicit sync session.
pub const SYNC_SESSION_END_MIN_SLASHES: usize = 5;

/// Separator between the timestamp and the discriminator in event keys.
pub const EVENT_KEY_SEPARATOR: &str = "::";

// =============================================================================
// Pattern limits
// =============================================================================

/// Maximum user-supplied regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Maximum number of master-loot patterns accepted from configuration.
pub const MAX_MASTER_LOOT_PATTERNS: usize = 100;

// =============================================================================
// Export
// =============================================================================

/// Maximum number of events that can be exported in a single operation.
pub const MAX_EXPORT_EVENTS: usize = 5_000_000;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration and persistence
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default file name for persisted council state (in the platform data dir).
pub const STATE_FILE_NAME: &str = "council_state.json";

/// Schema version stamped into persisted council state.
pub const STATE_VERSION: u32 = 1;
