// LootScribe - app/mod.rs
//
// Application layer: per-command orchestration and state persistence.
// Dependencies: core and platform layers.

pub mod pipeline;
pub mod state_store;
