//! Common cryptography helper functions for Stoa

use crate::types::KeyHash;
use blake2::{
    digest::consts::{U28, U32},
    Blake2b, Digest,
};

/// Get a Blake2b-224 hash of a key, as used for payment and stake credentials
pub fn keyhash_224(key: &[u8]) -> KeyHash {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update(key);
    hasher.finalize().to_vec()
}

/// Get a Blake2b-256 hash, as used for transaction body and auxiliary data hashes
pub fn hash_256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}
