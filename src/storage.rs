//! RocksDB-backed storage layer.
//!
//! Single key-value namespace shared by the ledger and the game session
//! store so one write batch can span both (balance change + session
//! transition commit or fail together).

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

/// A single operation inside an atomic write batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

#[derive(Clone)]
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rocksdb::Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, rocksdb::Error> {
        self.db.get(key)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.delete(key)
    }

    /// Apply all operations atomically. Either every put and delete in the
    /// batch becomes durable or none of them does.
    pub fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<(), rocksdb::Error> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put(key, value) => batch.put(key, value),
                BatchOp::Delete(key) => batch.delete(key),
            }
        }
        self.db.write(batch)
    }

    /// Scan keys under `prefix` in ascending key order, starting strictly
    /// after `after` when given. Stops at `limit` rows or the end of the
    /// prefix range.
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let start = after.unwrap_or(prefix);
        let iter = self
            .db
            .iterator(IteratorMode::From(start, Direction::Forward));

        let mut rows = Vec::new();
        for entry in iter {
            let Ok((key, value)) = entry else { break };
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(after) = after {
                if key.as_ref() == after {
                    continue;
                }
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::open(dir.path()).expect("open storage");
        (dir, storage)
    }

    #[test]
    fn test_put_get_delete() {
        let (_dir, storage) = temp_storage();
        storage.put(b"k", b"v").unwrap();
        assert_eq!(storage.get(b"k").unwrap(), Some(b"v".to_vec()));
        storage.delete(b"k").unwrap();
        assert_eq!(storage.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_batch_mixes_puts_and_deletes() {
        let (_dir, storage) = temp_storage();
        storage.put(b"old", b"1").unwrap();

        storage
            .apply_batch(vec![
                BatchOp::Put(b"new".to_vec(), b"2".to_vec()),
                BatchOp::Delete(b"old".to_vec()),
            ])
            .unwrap();

        assert_eq!(storage.get(b"old").unwrap(), None);
        assert_eq!(storage.get(b"new").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_scan_prefix_ordering_and_limit() {
        let (_dir, storage) = temp_storage();
        storage.put(b"idx:b", b"").unwrap();
        storage.put(b"idx:a", b"").unwrap();
        storage.put(b"idx:c", b"").unwrap();
        storage.put(b"other:z", b"").unwrap();

        let rows = storage.scan_prefix(b"idx:", None, 10);
        let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"idx:a".to_vec(), b"idx:b".to_vec(), b"idx:c".to_vec()]);

        let rows = storage.scan_prefix(b"idx:", Some(b"idx:a"), 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, b"idx:b".to_vec());
    }
}
