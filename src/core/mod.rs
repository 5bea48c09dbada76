// LootScribe - core/mod.rs
//
// Core business logic layer.
// Dependencies: regex, chrono, serde, tracing.
// Must NOT depend on: platform, app, or touch the filesystem.

pub mod council;
pub mod correlator;
pub mod export;
pub mod kills;
pub mod master_loot;
pub mod model;
pub mod parser;
pub mod pending;
pub mod rules;
pub mod sync_block;
pub mod timestamp;
