//! Error types for the Mines game engine.
//!
//! Every failure path is a distinct variant so callers can react to the
//! specific condition instead of a generic boolean or string. Nothing in
//! here is fatal to the process; all failures are per-request.

use crate::games::types::GameStatus;

/// Errors produced by the game engine, ledger and session store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bet amount rejected before any state was touched.
    #[error("bet of {bet_micros} micros outside allowed range [{min_micros}, {max_micros}]")]
    InvalidAmount {
        bet_micros: u64,
        min_micros: u64,
        max_micros: u64,
    },

    #[error("mine count {mine_count} outside allowed range [1, {max_mines}]")]
    InvalidMineCount { mine_count: u8, max_mines: u8 },

    /// A grid needs at least one mine and one safe tile.
    #[error("grid of {grid_size} tiles is too small, need at least 2")]
    InvalidGridSize { grid_size: u8 },

    #[error("tile index {tile} outside grid of {grid_size} tiles")]
    InvalidTile { tile: u8, grid_size: u8 },

    /// Balance check failed inside the bet transaction. No debit happened.
    #[error("insufficient funds: {available_micros} micros available, {required_micros} required")]
    InsufficientFunds {
        available_micros: u64,
        required_micros: u64,
    },

    #[error("game {game_id} not found")]
    NotFound { game_id: String },

    #[error("game {game_id} does not belong to the requesting user")]
    Forbidden { game_id: String },

    /// Operation requires an active game but the game already resolved.
    #[error("game is {status}, not active")]
    InvalidState { status: GameStatus },

    #[error("tile {tile} was already revealed")]
    AlreadyRevealed { tile: u8 },

    #[error("cannot cash out before revealing at least one tile")]
    NothingToCashOut,

    /// Underlying RocksDB failure. Nothing was committed; the whole
    /// operation is safe to retry.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A persisted record failed to decode.
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

impl From<rocksdb::Error> for EngineError {
    fn from(e: rocksdb::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Corrupted(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
