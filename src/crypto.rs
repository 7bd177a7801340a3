//! Hashing and address helpers for TrinityChain

use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// Type alias for an unlock hash: the 32-byte digest of a spending condition.
pub type Address = [u8; 32];

/// Deterministic hash function
pub fn hash_data(data: &[u8]) -> Sha256Hash {
    Sha256::digest(data).into()
}

/// Convenience function to create an address from a string (hashes the string).
/// Useful for testing and debugging.
pub fn address_from_string(s: &str) -> Address {
    hash_data(s.as_bytes())
}

/// Convert an address to a hex string for display.
pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}
