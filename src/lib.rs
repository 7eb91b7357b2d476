//! Rollup AVM: the execution core of a rollup's contract VM
//!
//! This crate provides:
//! - Tagged memory with explicit, never-coerced cell types
//! - A fixed-width instruction codec and indirect addressing
//! - A gas-metered dispatch loop over per-invocation execution contexts
//! - Poseidon2, Keccak, Keccak-f[1600], SHA-256 compression and Pedersen opcodes
//! - A text assembler and disassembler
//!
//! Field-element hash primitives are supplied by the host through
//! [`crypto::HashBackend`]; the byte and word primitives ship with the crate.

pub mod avm;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod memory;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use avm::{
    Assembler, Environment, ExecutionContext, ExecutionResult, Halt, Instruction, Opcode, Vm,
    VmError,
};
pub use config::{GasSchedule, VmConfig};
pub use crypto::HashBackend;
pub use memory::{Cell, MemoryError, Tag, TaggedMemory};
