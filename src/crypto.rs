//! Hashing primitives and node identity for Hashledger

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// Number of random bytes behind a node identifier (32 hex characters).
const NODE_ID_BYTES: usize = 16;

pub fn sha256(bytes: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// SHA-256 of `bytes` rendered as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

/// Generates the random identifier a node uses as its mining reward
/// recipient. Created once per process and treated as an opaque string.
pub fn node_identifier() -> String {
    let mut bytes = [0u8; NODE_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
