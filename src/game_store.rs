//! Persistent Mines session records.
//!
//! Sessions are JSON rows keyed by game id, with an active-game index used
//! by an external reaper to find abandoned sessions. Mutations are staged
//! into a caller-owned batch and committed together with the matching
//! ledger movement. A per-game lock registry serializes mutating
//! operations on the same game id; operations on different games never
//! block each other.

use crate::errors::{EngineError, EngineResult};
use crate::games::types::MinesSession;
use crate::storage::{BatchOp, Storage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const SESSION_PREFIX: &str = "game:session:";
const ACTIVE_INDEX_PREFIX: &[u8] = b"game:index:active:";
const NONCE_PREFIX: &str = "fairness:nonce:";

pub struct GameStore {
    storage: Storage,
    game_locks: DashMap<String, Arc<Mutex<()>>>,
}

fn session_key(game_id: &str) -> Vec<u8> {
    format!("{SESSION_PREFIX}{game_id}").into_bytes()
}

// Key layout: prefix | created_at_millis(be) | game_id. Big-endian millis
// keep the index scan oldest-first, which is the order a reaper wants.
fn active_index_key(created_at: DateTime<Utc>, game_id: &str) -> Vec<u8> {
    let millis = created_at.timestamp_millis().max(0) as u64;
    let mut key = Vec::with_capacity(ACTIVE_INDEX_PREFIX.len() + 8 + game_id.len());
    key.extend_from_slice(ACTIVE_INDEX_PREFIX);
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(game_id.as_bytes());
    key
}

fn nonce_key(server_seed_hash: &str, client_seed: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(server_seed_hash.as_bytes());
    hasher.update(b":");
    hasher.update(client_seed.as_bytes());
    format!("{NONCE_PREFIX}{}", hex::encode(hasher.finalize())).into_bytes()
}

impl GameStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            game_locks: DashMap::new(),
        }
    }

    /// Acquire the per-game critical section. Every mutating operation on
    /// a game (reveal, cashout, abandoned resolution) runs under this.
    pub async fn lock_game(&self, game_id: &str) -> OwnedMutexGuard<()> {
        let handle = self
            .game_locks
            .entry(game_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        handle.lock_owned().await
    }

    /// Drop the lock entry for a terminal game. Terminal sessions are
    /// immutable, so a straggler holding an old handle can only observe
    /// `InvalidState` after reloading.
    pub fn release_game(&self, game_id: &str) {
        self.game_locks.remove(game_id);
    }

    pub fn load_session(&self, game_id: &str) -> EngineResult<Option<MinesSession>> {
        let Some(bytes) = self.storage.get(&session_key(game_id))? else {
            return Ok(None);
        };
        let session = serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::Corrupted(format!("session {game_id}: {e}"))
        })?;
        Ok(Some(session))
    }

    /// Stage a freshly created session plus its active-index row.
    pub fn stage_create(
        &self,
        session: &MinesSession,
        ops: &mut Vec<BatchOp>,
    ) -> EngineResult<()> {
        ops.push(BatchOp::Put(
            session_key(&session.id),
            serde_json::to_vec(session)?,
        ));
        ops.push(BatchOp::Put(
            active_index_key(session.created_at, &session.id),
            Vec::new(),
        ));
        Ok(())
    }

    /// Stage a session update. A transition into a terminal state also
    /// removes the active-index row in the same batch.
    pub fn stage_update(
        &self,
        session: &MinesSession,
        ops: &mut Vec<BatchOp>,
    ) -> EngineResult<()> {
        ops.push(BatchOp::Put(
            session_key(&session.id),
            serde_json::to_vec(session)?,
        ));
        if session.status.is_terminal() {
            ops.push(BatchOp::Delete(active_index_key(
                session.created_at,
                &session.id,
            )));
        }
        Ok(())
    }

    /// Read and stage the next nonce for a (server seed, client seed)
    /// pairing. The increment commits atomically with the bet, so the
    /// sequence is strictly increasing and server-assigned.
    pub fn stage_next_nonce(
        &self,
        server_seed_hash: &str,
        client_seed: &str,
        ops: &mut Vec<BatchOp>,
    ) -> EngineResult<u64> {
        let key = nonce_key(server_seed_hash, client_seed);
        let current = match self.storage.get(&key)? {
            None => 0,
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    EngineError::Corrupted(format!(
                        "nonce counter for hash {server_seed_hash}"
                    ))
                })?;
                u64::from_le_bytes(arr)
            }
        };
        let next = current + 1;
        ops.push(BatchOp::Put(key, next.to_le_bytes().to_vec()));
        Ok(next)
    }

    pub fn commit(&self, ops: Vec<BatchOp>) -> EngineResult<()> {
        self.storage.apply_batch(ops)?;
        Ok(())
    }

    /// Game ids of active sessions created before `cutoff`, oldest first.
    /// Feed for an external reaper; this module imposes no policy.
    pub fn active_sessions_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Vec<String> {
        let cutoff_millis = cutoff.timestamp_millis().max(0) as u64;
        let rows = self
            .storage
            .scan_prefix(ACTIVE_INDEX_PREFIX, None, limit.max(1));

        let mut ids = Vec::new();
        for (key, _value) in rows {
            if key.len() < ACTIVE_INDEX_PREFIX.len() + 8 {
                continue;
            }
            let millis_off = ACTIVE_INDEX_PREFIX.len();
            let millis_bytes: [u8; 8] = key[millis_off..millis_off + 8]
                .try_into()
                .unwrap_or([0u8; 8]);
            if u64::from_be_bytes(millis_bytes) >= cutoff_millis {
                break;
            }
            if let Ok(id) = String::from_utf8(key[millis_off + 8..].to_vec()) {
                ids.push(id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{GameStatus, SeedPair, DEFAULT_GRID_SIZE};
    use chrono::Duration;

    fn temp_store() -> (tempfile::TempDir, GameStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::open(dir.path()).expect("open storage");
        (dir, GameStore::new(storage))
    }

    fn session(id: &str, created_at: DateTime<Utc>) -> MinesSession {
        MinesSession {
            id: id.to_string(),
            user_id: "u-1".to_string(),
            bet_micros: 1_000_000,
            mine_count: 3,
            grid_size: DEFAULT_GRID_SIZE,
            mine_locations: vec![1, 5, 9],
            revealed_tiles: Vec::new(),
            status: GameStatus::Active,
            payout_multiplier: 0.99,
            cashed_out_micros: None,
            seeds: SeedPair {
                server_seed: "seed".to_string(),
                server_seed_hash: "hash".to_string(),
                client_seed: "client".to_string(),
                nonce: 1,
            },
            created_at,
        }
    }

    #[test]
    fn test_create_then_load_round_trip() {
        let (_dir, store) = temp_store();
        let s = session("g-1", Utc::now());

        let mut ops = Vec::new();
        store.stage_create(&s, &mut ops).unwrap();
        store.commit(ops).unwrap();

        let loaded = store.load_session("g-1").unwrap().unwrap();
        assert_eq!(loaded.id, "g-1");
        assert_eq!(loaded.mine_locations, vec![1, 5, 9]);
        assert!(store.load_session("missing").unwrap().is_none());
    }

    #[test]
    fn test_terminal_update_clears_active_index() {
        let (_dir, store) = temp_store();
        let created = Utc::now() - Duration::minutes(10);
        let mut s = session("g-2", created);

        let mut ops = Vec::new();
        store.stage_create(&s, &mut ops).unwrap();
        store.commit(ops).unwrap();
        assert_eq!(
            store.active_sessions_before(Utc::now(), 10),
            vec!["g-2".to_string()]
        );

        s.status = GameStatus::Busted;
        let mut ops = Vec::new();
        store.stage_update(&s, &mut ops).unwrap();
        store.commit(ops).unwrap();
        assert!(store.active_sessions_before(Utc::now(), 10).is_empty());
    }

    #[test]
    fn test_active_index_respects_cutoff_and_order() {
        let (_dir, store) = temp_store();
        let old = session("g-old", Utc::now() - Duration::hours(2));
        let new = session("g-new", Utc::now() - Duration::minutes(1));

        let mut ops = Vec::new();
        store.stage_create(&new, &mut ops).unwrap();
        store.stage_create(&old, &mut ops).unwrap();
        store.commit(ops).unwrap();

        let cutoff = Utc::now() - Duration::hours(1);
        assert_eq!(
            store.active_sessions_before(cutoff, 10),
            vec!["g-old".to_string()]
        );
        let all = store.active_sessions_before(Utc::now(), 10);
        assert_eq!(all, vec!["g-old".to_string(), "g-new".to_string()]);
    }

    #[test]
    fn test_nonce_counter_increments_per_pairing() {
        let (_dir, store) = temp_store();

        let mut ops = Vec::new();
        assert_eq!(store.stage_next_nonce("hash-a", "client", &mut ops).unwrap(), 1);
        store.commit(ops).unwrap();

        let mut ops = Vec::new();
        assert_eq!(store.stage_next_nonce("hash-a", "client", &mut ops).unwrap(), 2);
        // A different pairing starts its own sequence.
        assert_eq!(store.stage_next_nonce("hash-b", "client", &mut ops).unwrap(), 1);
        store.commit(ops).unwrap();

        let mut ops = Vec::new();
        assert_eq!(store.stage_next_nonce("hash-a", "client", &mut ops).unwrap(), 3);
    }
}
