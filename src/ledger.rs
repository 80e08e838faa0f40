//! Wallet balance ledger.
//!
//! Stand-in for the surrounding wallet platform, exposing only what the
//! game engine consumes: an atomic debit at bet time, an atomic credit at
//! cashout, balance reads, and an append-only transaction log. Amounts are
//! integer micros (1.00 = 1_000_000); no floating point touches money.
//!
//! Mutations are staged into a caller-owned batch so the ledger write and
//! the game session transition land in one atomic storage commit. Stage
//! methods require the per-user lock to be held; `lock_user` hands it out.

use crate::errors::{EngineError, EngineResult};
use crate::storage::{BatchOp, Storage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Micros per whole currency unit.
pub const MICROS_PER_UNIT: u64 = 1_000_000;

const BALANCE_PREFIX: &str = "ledger:balance:";
const ENTRY_PREFIX: &str = "ledger:entry:";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Debit,
    Credit,
}

/// One row of the transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub kind: EntryKind,
    pub amount_micros: u64,
    /// What the movement was for: a game id, or "funding".
    pub reference: String,
    pub balance_after_micros: u64,
    pub created_at: DateTime<Utc>,
}

pub struct Ledger {
    storage: Storage,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

fn balance_key(user_id: &str) -> Vec<u8> {
    format!("{BALANCE_PREFIX}{user_id}").into_bytes()
}

fn entry_key(user_id: &str, created_at: DateTime<Utc>, entry_id: &str) -> Vec<u8> {
    let millis = created_at.timestamp_millis().max(0) as u64;
    let mut key = format!("{ENTRY_PREFIX}{user_id}:").into_bytes();
    key.extend_from_slice(&millis.to_be_bytes());
    key.push(b':');
    key.extend_from_slice(entry_id.as_bytes());
    key
}

fn decode_balance(user_id: &str, bytes: &[u8]) -> EngineResult<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        EngineError::Corrupted(format!(
            "balance row for {user_id}: expected 8 bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(u64::from_le_bytes(arr))
}

impl Ledger {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            user_locks: DashMap::new(),
        }
    }

    /// Acquire the per-user critical section. Concurrent bets by the same
    /// user serialize here, so a balance sufficient for one bet admits
    /// exactly one of two simultaneous bets.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let handle = self
            .user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        handle.lock_owned().await
    }

    /// Current balance, zero for a user with no row. Read failures and
    /// undecodable rows surface as errors rather than a phantom zero, so
    /// no later write can be staged on top of a balance that was never
    /// actually read.
    pub fn balance_micros(&self, user_id: &str) -> EngineResult<u64> {
        match self.storage.get(&balance_key(user_id))? {
            Some(bytes) => decode_balance(user_id, &bytes),
            None => Ok(0),
        }
    }

    /// Stage a debit plus its log entry. Fails with `InsufficientFunds`
    /// without staging anything when the balance does not cover `amount`.
    /// The per-user lock must be held across stage and commit.
    pub fn stage_debit(
        &self,
        user_id: &str,
        amount_micros: u64,
        reference: &str,
        ops: &mut Vec<BatchOp>,
    ) -> EngineResult<u64> {
        let balance = self.balance_micros(user_id)?;
        if balance < amount_micros {
            return Err(EngineError::InsufficientFunds {
                available_micros: balance,
                required_micros: amount_micros,
            });
        }
        let after = balance - amount_micros;
        self.stage_entry(user_id, EntryKind::Debit, amount_micros, reference, after, ops)?;
        Ok(after)
    }

    /// Stage a credit plus its log entry. The per-user lock must be held
    /// across stage and commit.
    pub fn stage_credit(
        &self,
        user_id: &str,
        amount_micros: u64,
        reference: &str,
        ops: &mut Vec<BatchOp>,
    ) -> EngineResult<u64> {
        let balance = self.balance_micros(user_id)?;
        let after = balance.saturating_add(amount_micros);
        self.stage_entry(user_id, EntryKind::Credit, amount_micros, reference, after, ops)?;
        Ok(after)
    }

    fn stage_entry(
        &self,
        user_id: &str,
        kind: EntryKind,
        amount_micros: u64,
        reference: &str,
        balance_after_micros: u64,
        ops: &mut Vec<BatchOp>,
    ) -> EngineResult<()> {
        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            amount_micros,
            reference: reference.to_string(),
            balance_after_micros,
            created_at: Utc::now(),
        };
        ops.push(BatchOp::Put(
            balance_key(user_id),
            balance_after_micros.to_le_bytes().to_vec(),
        ));
        ops.push(BatchOp::Put(
            entry_key(user_id, entry.created_at, &entry.id),
            serde_json::to_vec(&entry)?,
        ));
        Ok(())
    }

    /// Immediate credit used to fund accounts (the external wallet's
    /// deposit flow stands behind this in production).
    pub async fn credit(
        &self,
        user_id: &str,
        amount_micros: u64,
        reference: &str,
    ) -> EngineResult<u64> {
        let _guard = self.lock_user(user_id).await;
        let mut ops = Vec::new();
        let after = self.stage_credit(user_id, amount_micros, reference, &mut ops)?;
        self.storage.apply_batch(ops)?;
        tracing::info!(user_id, amount_micros, reference, "ledger credit applied");
        Ok(after)
    }

    /// Slice of the user's transaction log, keyed by creation time.
    pub fn entries(&self, user_id: &str, limit: usize) -> EngineResult<Vec<LedgerEntry>> {
        let prefix = format!("{ENTRY_PREFIX}{user_id}:").into_bytes();
        let rows = self.storage.scan_prefix(&prefix, None, limit.max(1));
        let mut entries = Vec::with_capacity(rows.len());
        for (_key, value) in rows {
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}
