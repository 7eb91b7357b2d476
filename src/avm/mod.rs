//! AVM core
//!
//! A register-free bytecode VM over tagged memory.
//!
//! # Overview
//!
//! This module implements:
//! - The instruction codec with fixed per-opcode wire sizes
//! - Direct and indirect operand addressing
//! - Execution contexts with gas metering
//! - The hashing opcode family and a few structural opcodes
//! - An assembly-like text syntax and a disassembler
//!
//! # Example
//!
//! ```rust
//! use ark_bn254::Fr;
//! use rollup_avm::avm::{Assembler, Environment, Vm};
//! use rollup_avm::crypto::HashBackend;
//! use rollup_avm::memory::Cell;
//!
//! // The host supplies the field-element primitives
//! struct Host;
//!
//! impl HashBackend for Host {
//!     fn poseidon2_permutation(&self, state: &[Fr; 4]) -> [Fr; 4] {
//!         *state
//!     }
//!
//!     fn pedersen_hash(&self, inputs: &[Fr], _generator_index: u32) -> Fr {
//!         inputs.iter().sum()
//!     }
//! }
//!
//! let code = Assembler::new().assemble("
//!     SET field 0 42
//!     RETURN 0 1
//! ").unwrap();
//!
//! let vm = Vm::new(Host);
//! let mut ctx = vm.context(code, Environment::default());
//! let result = vm.execute(&mut ctx);
//! assert!(result.success());
//! assert_eq!(result.output, vec![Cell::Field(Fr::from(42u64))]);
//! ```

pub mod addressing;
pub mod assembler;
pub mod context;
mod control;
mod hashing;
pub mod instruction;
pub mod opcodes;
pub mod vm;

pub use addressing::{Addressing, AddressingMode, IndirectFlags};
pub use assembler::{disassemble, disassemble_with_gas, Assembler, AssemblerError};
pub use context::{Environment, ExecutionContext};
pub use instruction::{decode_all, encode_all, DecodeError, Instruction, WireFormat};
pub use opcodes::Opcode;
pub use vm::{ErrorKind, ExecutionResult, Halt, Vm, VmError};
