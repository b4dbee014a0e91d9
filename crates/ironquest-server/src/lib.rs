//! IronQuest Server - SpacetimeDB Module
//!
//! Habit/fitness RPG progression running as a SpacetimeDB module.
//! All progression rules live in `ironquest-logic`; reducers here load
//! rows, run the pure engine, and persist the results. Clients are thin
//! renderers that subscribe to the tables and reuse the same logic crate
//! (compiled to WASM) for display math like progress-to-next-level.

mod reducers;
mod tables;

pub use reducers::*;
pub use tables::*;
