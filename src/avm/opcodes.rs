//! AVM opcodes
//!
//! Defines the instruction identifiers understood by the dispatch loop.

use crate::avm::instruction::{
    Address, CalldataCopy, Jump, Keccak, KeccakF1600, Pedersen, Poseidon2, Return, Revert,
    Sender, Set, Sha256Compression, WireFormat,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opcodes for the AVM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // Memory (0x30 - 0x3F)
    /// Write a tagged constant
    Set = 0x30,
    /// Copy calldata fields into memory
    CalldataCopy = 0x31,
    /// Write the executing contract's address
    Address = 0x32,
    /// Write the caller's address
    Sender = 0x33,

    // Control flow (0x40 - 0x4F)
    /// Unconditional jump
    Jump = 0x40,
    /// Halt successfully with output
    Return = 0x43,
    /// Halt with a revert and output
    Revert = 0x44,

    // Hashing (0x90 - 0x9F)
    /// Poseidon2 permutation over 4 field elements
    Poseidon2 = 0x90,
    /// Keccak-256 over a byte region
    Keccak = 0x91,
    /// Raw Keccak-f[1600] permutation over 25 lanes
    KeccakF1600 = 0x92,
    /// SHA-256 block compression
    Sha256Compression = 0x93,
    /// Pedersen hash over field elements
    Pedersen = 0x94,
}

impl Opcode {
    /// Every opcode, in id order
    pub const ALL: [Opcode; 12] = [
        Opcode::Set,
        Opcode::CalldataCopy,
        Opcode::Address,
        Opcode::Sender,
        Opcode::Jump,
        Opcode::Return,
        Opcode::Revert,
        Opcode::Poseidon2,
        Opcode::Keccak,
        Opcode::KeccakF1600,
        Opcode::Sha256Compression,
        Opcode::Pedersen,
    ];

    /// Convert byte to opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x30 => Some(Opcode::Set),
            0x31 => Some(Opcode::CalldataCopy),
            0x32 => Some(Opcode::Address),
            0x33 => Some(Opcode::Sender),
            0x40 => Some(Opcode::Jump),
            0x43 => Some(Opcode::Return),
            0x44 => Some(Opcode::Revert),
            0x90 => Some(Opcode::Poseidon2),
            0x91 => Some(Opcode::Keccak),
            0x92 => Some(Opcode::KeccakF1600),
            0x93 => Some(Opcode::Sha256Compression),
            0x94 => Some(Opcode::Pedersen),
            _ => None,
        }
    }

    /// Look up an opcode by mnemonic (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.name().eq_ignore_ascii_case(name))
    }

    /// Fixed encoded size of this opcode's instructions, opcode byte included
    pub fn wire_size(&self) -> usize {
        match self {
            Opcode::Set => Set::WIRE_SIZE,
            Opcode::CalldataCopy => CalldataCopy::WIRE_SIZE,
            Opcode::Address => Address::WIRE_SIZE,
            Opcode::Sender => Sender::WIRE_SIZE,
            Opcode::Jump => Jump::WIRE_SIZE,
            Opcode::Return => Return::WIRE_SIZE,
            Opcode::Revert => Revert::WIRE_SIZE,
            Opcode::Poseidon2 => Poseidon2::WIRE_SIZE,
            Opcode::Keccak => Keccak::WIRE_SIZE,
            Opcode::KeccakF1600 => KeccakF1600::WIRE_SIZE,
            Opcode::Sha256Compression => Sha256Compression::WIRE_SIZE,
            Opcode::Pedersen => Pedersen::WIRE_SIZE,
        }
    }

    /// Number of operands that are memory offsets covered by the indirect byte
    pub fn offset_operands(&self) -> usize {
        match self {
            Opcode::Jump => 0,
            Opcode::Set | Opcode::Address | Opcode::Sender => 1,
            Opcode::Return | Opcode::Revert => 1,
            Opcode::Poseidon2 => 2,
            Opcode::CalldataCopy | Opcode::Keccak | Opcode::KeccakF1600 => 3,
            Opcode::Pedersen => 4,
            Opcode::Sha256Compression => 5,
        }
    }

    /// Get opcode name for disassembly
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Set => "SET",
            Opcode::CalldataCopy => "CALLDATACOPY",
            Opcode::Address => "ADDRESS",
            Opcode::Sender => "SENDER",
            Opcode::Jump => "JUMP",
            Opcode::Return => "RETURN",
            Opcode::Revert => "REVERT",
            Opcode::Poseidon2 => "POSEIDON2",
            Opcode::Keccak => "KECCAK",
            Opcode::KeccakF1600 => "KECCAKF1600",
            Opcode::Sha256Compression => "SHA256COMPRESSION",
            Opcode::Pedersen => "PEDERSEN",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for op in Opcode::ALL {
            let byte = op as u8;
            assert_eq!(Opcode::from_byte(byte), Some(op));
            assert_eq!(Opcode::from_name(op.name()), Some(op));
        }
        assert_eq!(Opcode::from_byte(0x00), None);
        assert_eq!(Opcode::from_name("sstore"), None);
    }

    #[test]
    fn test_wire_sizes() {
        assert_eq!(Opcode::Set.wire_size(), 23);
        assert_eq!(Opcode::CalldataCopy.wire_size(), 14);
        assert_eq!(Opcode::Address.wire_size(), 6);
        assert_eq!(Opcode::Jump.wire_size(), 5);
        assert_eq!(Opcode::Return.wire_size(), 10);
        assert_eq!(Opcode::Poseidon2.wire_size(), 6);
        assert_eq!(Opcode::Keccak.wire_size(), 10);
        assert_eq!(Opcode::KeccakF1600.wire_size(), 8);
        assert_eq!(Opcode::Sha256Compression.wire_size(), 12);
        assert_eq!(Opcode::Pedersen.wire_size(), 18);
    }

    #[test]
    fn test_mnemonic_is_case_insensitive() {
        assert_eq!(Opcode::from_name("keccakf1600"), Some(Opcode::KeccakF1600));
        assert_eq!(Opcode::KeccakF1600.to_string(), "KECCAKF1600");
    }
}
