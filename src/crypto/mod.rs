//! Cryptographic primitives used by the hashing opcodes
//!
//! This module provides:
//! - Keccak-256 and the Keccak-f[1600] permutation
//! - The SHA-256 compression function
//! - The `HashBackend` trait through which the VM consumes all five primitives

pub mod backend;
pub mod hash;

pub use backend::{HashBackend, POSEIDON2_WIDTH};
pub use hash::{
    keccak256, keccak256_hex, keccakf1600, sha256_compression, KECCAK256_DIGEST_LEN,
    KECCAKF1600_LANES, SHA256_BLOCK_WORDS, SHA256_STATE_WORDS,
};
