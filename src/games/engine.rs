//! Mines game state machine.
//!
//! Owns the game lifecycle: bet placement, tile reveals, bust/cashout
//! resolution. Every mutating operation is all-or-nothing: the ledger
//! movement and the session transition are staged into one storage batch
//! and committed together. Lock discipline is per-game then per-user; bet
//! placement takes only the user lock, so different games never block each
//! other.

use crate::config::GameConfig;
use crate::errors::{EngineError, EngineResult};
use crate::game_store::GameStore;
use crate::games::commitment::{generate_mine_locations, generate_server_seed, hash_server_seed};
use crate::games::payout::{multiplier, winnings_micros};
use crate::games::types::{GameStatus, MinesSession, SeedPair, SessionView};
use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Operator-chosen resolution for an abandoned active game. The engine
/// never applies one on its own; an external reaper decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonedResolution {
    /// Return the stake and close the game as cashed out for the bet.
    Refund,
    /// Close the game as busted with no credit.
    Forfeit,
}

pub struct MinesEngine {
    store: Arc<GameStore>,
    ledger: Arc<Ledger>,
    config: GameConfig,
}

impl MinesEngine {
    pub fn new(store: Arc<GameStore>, ledger: Arc<Ledger>, config: GameConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Place a bet: validate stake and mine count, debit the stake, derive
    /// the committed layout, persist the new session. One atomic commit;
    /// on any failure nothing is created or mutated.
    pub async fn place_bet(
        &self,
        user_id: &str,
        bet_micros: u64,
        mine_count: u8,
        client_seed: &str,
    ) -> EngineResult<SessionView> {
        if bet_micros < self.config.min_bet_micros || bet_micros > self.config.max_bet_micros {
            return Err(EngineError::InvalidAmount {
                bet_micros,
                min_micros: self.config.min_bet_micros,
                max_micros: self.config.max_bet_micros,
            });
        }
        if mine_count == 0 || mine_count > self.config.max_mines() {
            return Err(EngineError::InvalidMineCount {
                mine_count,
                max_mines: self.config.max_mines(),
            });
        }

        let server_seed = generate_server_seed();
        let server_seed_hash = hash_server_seed(&server_seed);
        let game_id = Uuid::new_v4().to_string();

        let _user_guard = self.ledger.lock_user(user_id).await;
        let mut ops = Vec::new();

        let nonce = self
            .store
            .stage_next_nonce(&server_seed_hash, client_seed, &mut ops)?;
        let mine_locations = generate_mine_locations(
            &server_seed,
            client_seed,
            nonce,
            self.config.grid_size,
            mine_count,
        )?;
        self.ledger
            .stage_debit(user_id, bet_micros, &game_id, &mut ops)?;

        let session = MinesSession {
            id: game_id.clone(),
            user_id: user_id.to_string(),
            bet_micros,
            mine_count,
            grid_size: self.config.grid_size,
            mine_locations,
            revealed_tiles: Vec::new(),
            status: GameStatus::Active,
            payout_multiplier: multiplier(
                0,
                mine_count,
                self.config.grid_size,
                self.config.house_edge_bps,
            ),
            cashed_out_micros: None,
            seeds: SeedPair {
                server_seed,
                server_seed_hash,
                client_seed: client_seed.to_string(),
                nonce,
            },
            created_at: Utc::now(),
        };
        self.store.stage_create(&session, &mut ops)?;
        self.store.commit(ops)?;

        tracing::info!(
            game_id = %session.id,
            user_id,
            bet_micros,
            mine_count,
            "mines bet placed"
        );
        Ok(session.view())
    }

    /// Reveal one tile. A mine ends the game as busted with no credit; a
    /// safe tile grows the revealed set and recomputes the multiplier.
    pub async fn reveal_tile(
        &self,
        user_id: &str,
        game_id: &str,
        tile: u8,
    ) -> EngineResult<SessionView> {
        let _game_guard = self.store.lock_game(game_id).await;
        let mut session = self.load_owned(user_id, game_id)?;
        // The session's own grid governs; the configured size only shapes
        // new games.
        if tile >= session.grid_size {
            return Err(EngineError::InvalidTile {
                tile,
                grid_size: session.grid_size,
            });
        }
        if session.status.is_terminal() {
            return Err(EngineError::InvalidState {
                status: session.status,
            });
        }
        if session.revealed_tiles.contains(&tile) {
            return Err(EngineError::AlreadyRevealed { tile });
        }

        let mut ops = Vec::new();
        if session.is_mine(tile) {
            session.status = GameStatus::Busted;
            self.store.stage_update(&session, &mut ops)?;
            self.store.commit(ops)?;
            self.store.release_game(game_id);
            tracing::info!(game_id, user_id, tile, "mine hit, game busted");
        } else {
            session.revealed_tiles.push(tile);
            session.payout_multiplier = multiplier(
                session.revealed_count(),
                session.mine_count,
                session.grid_size,
                self.config.house_edge_bps,
            );
            self.store.stage_update(&session, &mut ops)?;
            self.store.commit(ops)?;
            tracing::debug!(
                game_id,
                user_id,
                tile,
                multiplier = session.payout_multiplier,
                "safe tile revealed"
            );
        }
        Ok(session.view())
    }

    /// Cash out an active game with at least one reveal. Winnings credit
    /// and terminal transition commit atomically.
    pub async fn cashout(&self, user_id: &str, game_id: &str) -> EngineResult<SessionView> {
        let _game_guard = self.store.lock_game(game_id).await;
        let mut session = self.load_owned(user_id, game_id)?;
        if session.status.is_terminal() {
            return Err(EngineError::InvalidState {
                status: session.status,
            });
        }
        if session.revealed_tiles.is_empty() {
            return Err(EngineError::NothingToCashOut);
        }

        let winnings = winnings_micros(
            session.bet_micros,
            session.revealed_count(),
            session.mine_count,
            session.grid_size,
            self.config.house_edge_bps,
        );

        let _user_guard = self.ledger.lock_user(user_id).await;
        let mut ops = Vec::new();
        self.ledger
            .stage_credit(user_id, winnings, game_id, &mut ops)?;
        session.status = GameStatus::CashedOut;
        session.cashed_out_micros = Some(winnings);
        self.store.stage_update(&session, &mut ops)?;
        self.store.commit(ops)?;
        self.store.release_game(game_id);

        tracing::info!(
            game_id,
            user_id,
            winnings_micros = winnings,
            revealed = session.revealed_tiles.len(),
            "game cashed out"
        );
        Ok(session.view())
    }

    /// Fetch a session for its owner; redacted while active.
    pub async fn session(&self, user_id: &str, game_id: &str) -> EngineResult<SessionView> {
        Ok(self.load_owned(user_id, game_id)?.view())
    }

    /// Active games created before `cutoff`, oldest first. Feed for an
    /// external reaper.
    pub fn stale_active_games(&self, cutoff: DateTime<Utc>, limit: usize) -> Vec<String> {
        self.store.active_sessions_before(cutoff, limit)
    }

    /// Resolve an abandoned active game on behalf of an operator, under
    /// the same per-game lock discipline as player operations.
    pub async fn resolve_abandoned(
        &self,
        game_id: &str,
        resolution: AbandonedResolution,
    ) -> EngineResult<SessionView> {
        let _game_guard = self.store.lock_game(game_id).await;
        let mut session = self
            .store
            .load_session(game_id)?
            .ok_or_else(|| EngineError::NotFound {
                game_id: game_id.to_string(),
            })?;
        if session.status.is_terminal() {
            return Err(EngineError::InvalidState {
                status: session.status,
            });
        }

        let _user_guard = self.ledger.lock_user(&session.user_id).await;
        let mut ops = Vec::new();
        match resolution {
            AbandonedResolution::Refund => {
                self.ledger
                    .stage_credit(&session.user_id, session.bet_micros, game_id, &mut ops)?;
                session.status = GameStatus::CashedOut;
                session.cashed_out_micros = Some(session.bet_micros);
            }
            AbandonedResolution::Forfeit => {
                session.status = GameStatus::Busted;
            }
        }
        self.store.stage_update(&session, &mut ops)?;
        self.store.commit(ops)?;
        self.store.release_game(game_id);

        tracing::warn!(game_id, ?resolution, "abandoned game resolved");
        Ok(session.view())
    }

    fn load_owned(&self, user_id: &str, game_id: &str) -> EngineResult<MinesSession> {
        let session = self
            .store
            .load_session(game_id)?
            .ok_or_else(|| EngineError::NotFound {
                game_id: game_id.to_string(),
            })?;
        if session.user_id != user_id {
            return Err(EngineError::Forbidden {
                game_id: game_id.to_string(),
            });
        }
        Ok(session)
    }
}
