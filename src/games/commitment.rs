//! Seed commitment and deterministic mine placement.
//!
//! The fairness contract: the server commits to a secret seed via its
//! SHA-256 hash before play, and the mine layout is a pure function of
//! (server seed, client seed, nonce). After the game resolves the seed is
//! disclosed, letting the player recompute the layout and check it against
//! the gameplay they experienced.

use crate::errors::{EngineError, EngineResult};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

type HmacSha512 = Hmac<Sha512>;

/// Server seeds are 32 random bytes, hex-encoded (64 chars).
pub const SERVER_SEED_BYTES: usize = 32;

/// Generate a fresh server seed from the OS CSPRNG.
pub fn generate_server_seed() -> String {
    let mut bytes = [0u8; SERVER_SEED_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Public commitment for a server seed: SHA-256 over the seed string.
pub fn hash_server_seed(server_seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic byte stream derived from the seed triple.
///
/// Block 0 is HMAC-SHA512(server_seed, "{client_seed}:{nonce}"); when a
/// block runs out the stream extends with "{client_seed}:{nonce}:{block}".
/// Every block is 64 bytes, comfortably more than one grid of tiles.
struct SeedStream<'a> {
    server_seed: &'a str,
    client_seed: &'a str,
    nonce: u64,
    block: u64,
    buf: Vec<u8>,
    cursor: usize,
}

impl<'a> SeedStream<'a> {
    fn new(server_seed: &'a str, client_seed: &'a str, nonce: u64) -> Self {
        let mut stream = Self {
            server_seed,
            client_seed,
            nonce,
            block: 0,
            buf: Vec::new(),
            cursor: 0,
        };
        stream.buf = stream.digest_block(0);
        stream
    }

    fn digest_block(&self, block: u64) -> Vec<u8> {
        // HMAC keys of any length are valid for SHA-512; new_from_slice
        // only fails for incompatible key schedules, which cannot happen.
        let mut mac = HmacSha512::new_from_slice(self.server_seed.as_bytes())
            .expect("HMAC-SHA512 accepts keys of any length");
        if block == 0 {
            mac.update(format!("{}:{}", self.client_seed, self.nonce).as_bytes());
        } else {
            mac.update(format!("{}:{}:{}", self.client_seed, self.nonce, block).as_bytes());
        }
        mac.finalize().into_bytes().to_vec()
    }

    fn next_u32(&mut self) -> u32 {
        if self.cursor + 4 > self.buf.len() {
            self.block += 1;
            self.buf = self.digest_block(self.block);
            self.cursor = 0;
        }
        let word = u32::from_be_bytes(
            self.buf[self.cursor..self.cursor + 4]
                .try_into()
                .expect("4-byte slice"),
        );
        self.cursor += 4;
        word
    }

    /// Uniform draw in [0, bound) by rejection sampling, so swap partners
    /// carry no modulo bias.
    fn draw(&mut self, bound: u32) -> u32 {
        debug_assert!(bound > 0);
        let range = u64::from(bound);
        let accept_below = (u64::from(u32::MAX) + 1) / range * range;
        loop {
            let word = u64::from(self.next_u32());
            if word < accept_below {
                return (word % range) as u32;
            }
        }
    }
}

/// Derive the mine layout for one game: Fisher-Yates over `[0, grid_size)`
/// driven by the seed stream, take the first `mine_count` entries, sorted
/// ascending for canonical storage.
///
/// Bit-for-bit reproducible for fixed inputs, across processes.
pub fn generate_mine_locations(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    grid_size: u8,
    mine_count: u8,
) -> EngineResult<Vec<u8>> {
    if grid_size < 2 {
        return Err(EngineError::InvalidGridSize { grid_size });
    }
    if mine_count == 0 || mine_count > grid_size - 1 {
        return Err(EngineError::InvalidMineCount {
            mine_count,
            max_mines: grid_size - 1,
        });
    }

    let mut tiles: Vec<u8> = (0..grid_size).collect();
    let mut stream = SeedStream::new(server_seed, client_seed, nonce);
    for i in (1..tiles.len()).rev() {
        let j = stream.draw((i + 1) as u32) as usize;
        tiles.swap(i, j);
    }

    let mut mines = tiles[..mine_count as usize].to_vec();
    mines.sort_unstable();
    Ok(mines)
}
