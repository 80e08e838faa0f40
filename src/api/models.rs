//! API Request and Response Models
//!
//! Request bodies are typed per operation; shape mismatches surface as
//! validation errors at the boundary instead of deep inside handlers.
//! Amounts cross the wire as decimal units and are converted to integer
//! micros immediately.

use crate::games::types::{GameStatus, SessionView};
use crate::ledger::MICROS_PER_UNIT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convert a wire amount to micros. Rejects non-finite, non-positive and
/// absurdly large values before any state is touched.
pub fn micros_from_amount(amount: f64) -> Option<u64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let micros = (amount * MICROS_PER_UNIT as f64).round();
    if micros < 1.0 || micros > u64::MAX as f64 {
        return None;
    }
    Some(micros as u64)
}

pub fn amount_from_micros(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_UNIT as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// POST /api/mines/bet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub bet_amount: f64,
    pub mine_count: u8,
    #[serde(default)]
    pub client_seed: String,
}

/// POST /api/mines/:game_id/reveal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealTileRequest {
    pub user_id: String,
    pub tile_index: u8,
}

/// POST /api/mines/:game_id/cashout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashoutRequest {
    pub user_id: String,
}

/// Game session as returned to callers. Mine layout and server seed are
/// present only once the game is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSessionResponse {
    pub game_id: String,
    pub user_id: String,
    pub bet_amount: f64,
    pub mine_count: u8,
    pub grid_size: u8,
    pub revealed_tiles: Vec<u8>,
    pub status: GameStatus,
    pub payout_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashed_out_amount: Option<f64>,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_seed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mine_locations: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionView> for GameSessionResponse {
    fn from(view: SessionView) -> Self {
        Self {
            game_id: view.id,
            user_id: view.user_id,
            bet_amount: amount_from_micros(view.bet_micros),
            mine_count: view.mine_count,
            grid_size: view.grid_size,
            revealed_tiles: view.revealed_tiles,
            status: view.status,
            payout_multiplier: view.payout_multiplier,
            cashed_out_amount: view.cashed_out_micros.map(amount_from_micros),
            server_seed_hash: view.server_seed_hash,
            client_seed: view.client_seed,
            nonce: view.nonce,
            server_seed: view.server_seed,
            mine_locations: view.mine_locations,
            created_at: view.created_at,
        }
    }
}

/// POST /api/mines/verify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
    pub mine_count: u8,
    #[serde(default)]
    pub grid_size: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
    pub mine_locations: Vec<u8>,
}

/// GET /api/wallet/:user_id/balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: f64,
    pub balance_micros: u64,
}

/// POST /api/wallet/:user_id/credit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub amount: f64,
}
