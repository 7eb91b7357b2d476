//! Hash backend
//!
//! The VM treats its five hash primitives as an external collaborator. The
//! byte and word primitives have default implementations; the field-element
//! primitives (Poseidon2 and Pedersen over BN254) must come from the host.

use crate::crypto::hash::{
    self, KECCAK256_DIGEST_LEN, KECCAKF1600_LANES, SHA256_BLOCK_WORDS, SHA256_STATE_WORDS,
};
use ark_bn254::Fr;
use std::sync::Arc;

/// Width of the Poseidon2 permutation state
pub const POSEIDON2_WIDTH: usize = 4;

/// Pure, deterministic hash primitives consumed by the hashing opcodes
pub trait HashBackend: Send + Sync {
    /// Poseidon2 permutation over a 4-element state
    fn poseidon2_permutation(&self, state: &[Fr; POSEIDON2_WIDTH]) -> [Fr; POSEIDON2_WIDTH];

    /// Pedersen hash of `inputs`, domain-separated by `generator_index`
    fn pedersen_hash(&self, inputs: &[Fr], generator_index: u32) -> Fr;

    fn keccak256(&self, input: &[u8]) -> [u8; KECCAK256_DIGEST_LEN] {
        hash::keccak256(input)
    }

    fn keccakf1600(&self, lanes: &mut [u64; KECCAKF1600_LANES]) {
        hash::keccakf1600(lanes)
    }

    fn sha256_compression(
        &self,
        state: &[u32; SHA256_STATE_WORDS],
        block: &[u32; SHA256_BLOCK_WORDS],
    ) -> [u32; SHA256_STATE_WORDS] {
        hash::sha256_compression(state, block)
    }
}

impl<T: HashBackend + ?Sized> HashBackend for &T {
    fn poseidon2_permutation(&self, state: &[Fr; POSEIDON2_WIDTH]) -> [Fr; POSEIDON2_WIDTH] {
        (**self).poseidon2_permutation(state)
    }

    fn pedersen_hash(&self, inputs: &[Fr], generator_index: u32) -> Fr {
        (**self).pedersen_hash(inputs, generator_index)
    }

    fn keccak256(&self, input: &[u8]) -> [u8; KECCAK256_DIGEST_LEN] {
        (**self).keccak256(input)
    }

    fn keccakf1600(&self, lanes: &mut [u64; KECCAKF1600_LANES]) {
        (**self).keccakf1600(lanes)
    }

    fn sha256_compression(
        &self,
        state: &[u32; SHA256_STATE_WORDS],
        block: &[u32; SHA256_BLOCK_WORDS],
    ) -> [u32; SHA256_STATE_WORDS] {
        (**self).sha256_compression(state, block)
    }
}

impl<T: HashBackend + ?Sized> HashBackend for Arc<T> {
    fn poseidon2_permutation(&self, state: &[Fr; POSEIDON2_WIDTH]) -> [Fr; POSEIDON2_WIDTH] {
        (**self).poseidon2_permutation(state)
    }

    fn pedersen_hash(&self, inputs: &[Fr], generator_index: u32) -> Fr {
        (**self).pedersen_hash(inputs, generator_index)
    }

    fn keccak256(&self, input: &[u8]) -> [u8; KECCAK256_DIGEST_LEN] {
        (**self).keccak256(input)
    }

    fn keccakf1600(&self, lanes: &mut [u64; KECCAKF1600_LANES]) {
        (**self).keccakf1600(lanes)
    }

    fn sha256_compression(
        &self,
        state: &[u32; SHA256_STATE_WORDS],
        block: &[u32; SHA256_BLOCK_WORDS],
    ) -> [u32; SHA256_STATE_WORDS] {
        (**self).sha256_compression(state, block)
    }
}
