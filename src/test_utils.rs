//! Shared test fixtures

use crate::avm::instruction::{encode_all, Instruction};
use crate::crypto::{HashBackend, POSEIDON2_WIDTH};
use ark_bn254::Fr;
use ark_ff::PrimeField;
use rand::Rng;

/// Backend with deterministic stand-ins for the field-element primitives.
/// Byte and word primitives use the crate's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestBackend;

impl HashBackend for TestBackend {
    fn poseidon2_permutation(&self, state: &[Fr; POSEIDON2_WIDTH]) -> [Fr; POSEIDON2_WIDTH] {
        let sum: Fr = state.iter().sum();
        std::array::from_fn(|i| sum * Fr::from(i as u64 + 3) + state[i] * state[i])
    }

    fn pedersen_hash(&self, inputs: &[Fr], generator_index: u32) -> Fr {
        inputs
            .iter()
            .fold(Fr::from(u64::from(generator_index) + 1), |acc, x| acc * Fr::from(7u64) + x)
    }
}

/// Encode a straight-line program
pub fn program(code: &[Instruction]) -> Vec<u8> {
    encode_all(code)
}

/// Parse a `0x`-prefixed big-endian hex field element
pub fn field_from_hex(hex_str: &str) -> Fr {
    let bytes = hex::decode(hex_str.trim_start_matches("0x")).unwrap();
    Fr::from_be_bytes_mod_order(&bytes)
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

pub fn random_words<const N: usize>() -> [u32; N] {
    let mut rng = rand::thread_rng();
    std::array::from_fn(|_| rng.gen())
}
