//! Minegrid - Provably Fair Mines Game Service
//!
//! HTTP service for a single provably-fair minigame backed by a durable
//! wallet ledger. The server commits to each game's secret seed before
//! play and discloses it after resolution, so players can independently
//! recompute every mine layout.

pub mod api;
pub mod config;
pub mod errors;
pub mod game_store;
pub mod games;
pub mod ledger;
pub mod storage;

pub use config::MinegridConfig;
pub use errors::{EngineError, EngineResult};
