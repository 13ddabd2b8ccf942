//! Proof-of-work search and verification
//!
//! A proof is valid for `last_proof` when the SHA-256 hex digest of the
//! decimal product `last_proof * proof` ends in `difficulty` zero characters.
//! The search scans nonces upward from zero in fixed-size batches so that a
//! stop signal can be observed, and optionally fans each batch out over a
//! dedicated rayon pool while still returning the smallest valid nonce.

use crate::crypto::sha256_hex;
use crate::error::ChainError;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trailing zero hex characters required by default (`"0000"`).
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Maximum meaningful difficulty: a SHA-256 hex digest has 64 characters.
pub const MAX_DIFFICULTY: usize = 64;

/// Nonces checked between two looks at the stop signal.
const SEARCH_BATCH: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofOfWork {
    /// Single-threaded proof of work at the given difficulty.
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty: difficulty.min(MAX_DIFFICULTY),
            pool: None,
        }
    }

    /// Spreads each search batch over `threads` workers. One thread (or
    /// zero) keeps the plain sequential scan.
    pub fn with_threads(mut self, threads: usize) -> Result<Self, ChainError> {
        self.pool = if threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("pow-worker-{}", i))
                .build()
                .map_err(|e| ChainError::ConfigError(format!("Failed to start PoW workers: {}", e)))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(self)
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Checks whether `proof` solves the puzzle posed by `last_proof`.
    ///
    /// The product is taken in 128 bits so it never wraps. A product of zero
    /// is hashed like any other guess.
    pub fn valid(&self, last_proof: u64, proof: u64) -> bool {
        let guess = (last_proof as u128 * proof as u128).to_string();
        let digest = sha256_hex(guess.as_bytes());
        digest.bytes().rev().take(self.difficulty).all(|b| b == b'0')
    }

    /// Returns the smallest valid proof for `last_proof`.
    ///
    /// The search is unbounded. Callers that need to give up should use
    /// [`ProofOfWork::find_until`].
    pub fn find(&self, last_proof: u64) -> u64 {
        let mut start = 0u64;
        loop {
            if let Some(proof) = self.scan_batch(last_proof, start) {
                return proof;
            }
            start += SEARCH_BATCH;
        }
    }

    /// Like [`ProofOfWork::find`] but gives up once `stop` is raised.
    ///
    /// The flag is polled between batches, so a search may run up to one
    /// batch past the signal. Returns `None` only when stopped.
    pub fn find_until(&self, last_proof: u64, stop: &AtomicBool) -> Option<u64> {
        let mut start = 0u64;
        loop {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            if let Some(proof) = self.scan_batch(last_proof, start) {
                return Some(proof);
            }
            start = start.checked_add(SEARCH_BATCH)?;
        }
    }

    fn scan_batch(&self, last_proof: u64, start: u64) -> Option<u64> {
        let end = start.saturating_add(SEARCH_BATCH);
        match &self.pool {
            Some(pool) => pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .find_first(|&proof| self.valid(last_proof, proof))
            }),
            None => (start..end).find(|&proof| self.valid(last_proof, proof)),
        }
    }
}
