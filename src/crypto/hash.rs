//! Byte and word oriented hash primitives
//!
//! Thin wrappers over the hashing crates: Keccak-256 and the Keccak-f[1600]
//! permutation from `tiny-keccak`, and the SHA-256 compression function
//! from `sha2`.

use sha2::digest::generic_array::GenericArray;
use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 digest length in bytes
pub const KECCAK256_DIGEST_LEN: usize = 32;

/// Number of 64-bit lanes in the Keccak-f[1600] state
pub const KECCAKF1600_LANES: usize = 25;

/// SHA-256 state words
pub const SHA256_STATE_WORDS: usize = 8;

/// SHA-256 message block words
pub const SHA256_BLOCK_WORDS: usize = 16;

/// Computes the Keccak-256 digest of the input (pre-standard Keccak padding,
/// as used by Ethereum)
pub fn keccak256(data: &[u8]) -> [u8; KECCAK256_DIGEST_LEN] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut digest = [0u8; KECCAK256_DIGEST_LEN];
    hasher.finalize(&mut digest);
    digest
}

/// Computes the Keccak-256 digest and returns it as a hex string
pub fn keccak256_hex(data: &[u8]) -> String {
    hex::encode(keccak256(data))
}

/// Applies the Keccak-f[1600] permutation to 25 lanes in place
pub fn keccakf1600(lanes: &mut [u64; KECCAKF1600_LANES]) {
    tiny_keccak::keccakf(lanes);
}

/// Runs one SHA-256 compression round over a 16-word block.
///
/// Words are interpreted big-endian, as in FIPS 180-4.
pub fn sha256_compression(
    state: &[u32; SHA256_STATE_WORDS],
    block: &[u32; SHA256_BLOCK_WORDS],
) -> [u32; SHA256_STATE_WORDS] {
    let mut bytes = [0u8; SHA256_BLOCK_WORDS * 4];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(block) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }

    let mut output = *state;
    let block = GenericArray::clone_from_slice(&bytes);
    sha2::compress256(&mut output, std::slice::from_ref(&block));
    output
}
