//! Operand addressing modes
//!
//! Each memory-offset operand of an instruction is either DIRECT (the offset
//! is the effective address) or INDIRECT (the offset names a `u32` cell that
//! holds the effective address). The modes travel on the wire as one byte,
//! bit `i` covering the `i`-th offset operand.

use crate::memory::{MemoryError, TaggedMemory};
use bitflags::bitflags;

/// Maximum number of offset operands the indirect byte can describe
pub const MAX_OPERANDS: usize = 8;

bitflags! {
    /// Wire-level indirect bitfield
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IndirectFlags: u8 {
        const OPERAND_0 = 1 << 0;
        const OPERAND_1 = 1 << 1;
        const OPERAND_2 = 1 << 2;
        const OPERAND_3 = 1 << 3;
        const OPERAND_4 = 1 << 4;
        const OPERAND_5 = 1 << 5;
        const OPERAND_6 = 1 << 6;
        const OPERAND_7 = 1 << 7;
    }
}

impl IndirectFlags {
    /// Flag for the operand at `index` (empty beyond the eighth operand)
    pub fn operand(index: usize) -> Self {
        if index < MAX_OPERANDS {
            Self::from_bits_retain(1 << index)
        } else {
            Self::empty()
        }
    }
}

/// How a single operand offset is turned into an effective address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Direct,
    Indirect,
}

/// Addressing modes of all offset operands of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    flags: IndirectFlags,
    operand_count: usize,
}

impl Addressing {
    /// Build from per-operand modes, in operand order
    pub fn new(modes: &[AddressingMode]) -> Self {
        let flags = modes
            .iter()
            .enumerate()
            .filter(|(_, mode)| **mode == AddressingMode::Indirect)
            .fold(IndirectFlags::empty(), |acc, (i, _)| acc | IndirectFlags::operand(i));
        Self {
            flags,
            operand_count: modes.len().min(MAX_OPERANDS),
        }
    }

    /// Decode the indirect byte of an instruction with `operand_count` offsets
    pub fn from_wire(wire: u8, operand_count: usize) -> Self {
        Self {
            flags: IndirectFlags::from_bits_retain(wire),
            operand_count: operand_count.min(MAX_OPERANDS),
        }
    }

    /// Encode as the indirect byte; bits past `operand_count` are dropped
    pub fn to_wire(&self) -> u8 {
        let mask = (0..self.operand_count)
            .fold(IndirectFlags::empty(), |acc, i| acc | IndirectFlags::operand(i));
        (self.flags & mask).bits()
    }

    /// Mode of the operand at `index`
    pub fn mode(&self, index: usize) -> AddressingMode {
        if index < self.operand_count && self.flags.contains(IndirectFlags::operand(index)) {
            AddressingMode::Indirect
        } else {
            AddressingMode::Direct
        }
    }

    /// Modes of all operands, in operand order
    pub fn modes(&self) -> Vec<AddressingMode> {
        (0..self.operand_count).map(|i| self.mode(i)).collect()
    }

    /// Resolve raw operand offsets to effective addresses.
    ///
    /// Operands are resolved in order; every indirect operand is an
    /// independent `u32` read and fails on a tag mismatch.
    pub fn resolve<const N: usize>(
        &self,
        offsets: [u32; N],
        memory: &TaggedMemory,
    ) -> Result<[u32; N], MemoryError> {
        let mut resolved = offsets;
        for (i, slot) in resolved.iter_mut().enumerate() {
            if self.mode(i) == AddressingMode::Indirect {
                *slot = memory.read::<u32>(*slot)?;
            }
        }
        Ok(resolved)
    }
}
