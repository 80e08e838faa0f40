use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Mines grid: 5x5, tile indices 0..24.
pub const DEFAULT_GRID_SIZE: u8 = 25;

/// Game lifecycle status. `Busted` and `CashedOut` are terminal; a
/// terminal session is never mutated again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Busted,
    CashedOut,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Active)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Active => write!(f, "active"),
            GameStatus::Busted => write!(f, "busted"),
            GameStatus::CashedOut => write!(f, "cashed_out"),
        }
    }
}

/// Fairness commitment for one game.
///
/// The server seed stays secret while the game is active; only its hash is
/// shown to the player up front. After the game resolves the seed is
/// disclosed so the player can recompute the mine layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPair {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    /// Server-assigned, strictly increasing per (server seed, client seed)
    /// pairing. Always 1 today because every game mints a fresh server
    /// seed, but the counter is tracked for real.
    pub nonce: u64,
}

/// Full persisted game session record. Owns its mine layout and seed pair
/// for the lifetime of the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinesSession {
    pub id: String,
    pub user_id: String,
    pub bet_micros: u64,
    pub mine_count: u8,
    pub grid_size: u8,
    /// Write-once at creation, sorted ascending.
    pub mine_locations: Vec<u8>,
    /// Append-only while active, strictly growing, no duplicates.
    pub revealed_tiles: Vec<u8>,
    pub status: GameStatus,
    pub payout_multiplier: f64,
    pub cashed_out_micros: Option<u64>,
    pub seeds: SeedPair,
    pub created_at: DateTime<Utc>,
}

impl MinesSession {
    pub fn is_mine(&self, tile: u8) -> bool {
        self.mine_locations.binary_search(&tile).is_ok()
    }

    pub fn revealed_count(&self) -> u8 {
        self.revealed_tiles.len() as u8
    }

    /// Caller-facing projection. The mine layout and server seed are
    /// withheld until the game reaches a terminal state.
    pub fn view(&self) -> SessionView {
        let disclosed = self.status.is_terminal();
        SessionView {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            bet_micros: self.bet_micros,
            mine_count: self.mine_count,
            grid_size: self.grid_size,
            revealed_tiles: self.revealed_tiles.clone(),
            status: self.status,
            payout_multiplier: self.payout_multiplier,
            cashed_out_micros: self.cashed_out_micros,
            server_seed_hash: self.seeds.server_seed_hash.clone(),
            client_seed: self.seeds.client_seed.clone(),
            nonce: self.seeds.nonce,
            server_seed: disclosed.then(|| self.seeds.server_seed.clone()),
            mine_locations: disclosed.then(|| self.mine_locations.clone()),
            created_at: self.created_at,
        }
    }
}

/// What the caller is allowed to see of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub user_id: String,
    pub bet_micros: u64,
    pub mine_count: u8,
    pub grid_size: u8,
    pub revealed_tiles: Vec<u8>,
    pub status: GameStatus,
    pub payout_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashed_out_micros: Option<u64>,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    /// Present only once the game is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_seed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mine_locations: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(status: GameStatus) -> MinesSession {
        MinesSession {
            id: "g-1".to_string(),
            user_id: "u-1".to_string(),
            bet_micros: 10_000_000,
            mine_count: 5,
            grid_size: DEFAULT_GRID_SIZE,
            mine_locations: vec![2, 7, 11, 19, 23],
            revealed_tiles: vec![0],
            status,
            payout_multiplier: 1.2375,
            cashed_out_micros: None,
            seeds: SeedPair {
                server_seed: "secret".to_string(),
                server_seed_hash: "hash".to_string(),
                client_seed: "client".to_string(),
                nonce: 1,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_view_withholds_layout_and_seed() {
        let view = session(GameStatus::Active).view();
        assert!(view.server_seed.is_none());
        assert!(view.mine_locations.is_none());
        assert_eq!(view.server_seed_hash, "hash");
    }

    #[test]
    fn test_terminal_view_discloses_layout_and_seed() {
        let view = session(GameStatus::Busted).view();
        assert_eq!(view.server_seed.as_deref(), Some("secret"));
        assert_eq!(view.mine_locations, Some(vec![2, 7, 11, 19, 23]));
    }

    #[test]
    fn test_is_mine_uses_sorted_layout() {
        let s = session(GameStatus::Active);
        assert!(s.is_mine(7));
        assert!(!s.is_mine(8));
    }

    #[test]
    fn test_status_display_matches_wire_format() {
        assert_eq!(GameStatus::CashedOut.to_string(), "cashed_out");
        assert_eq!(
            serde_json::to_string(&GameStatus::CashedOut).unwrap(),
            "\"cashed_out\""
        );
    }
}
