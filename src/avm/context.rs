//! Per-invocation execution state
//!
//! An `ExecutionContext` owns the bytecode, the typed memory, the program
//! counter and the remaining gas of exactly one contract invocation. Nested
//! invocations get a fresh context with their own memory.

use crate::avm::vm::VmError;
use crate::memory::TaggedMemory;
use ark_bn254::Fr;

/// Immutable environment of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Address of the executing contract
    pub address: Fr,
    /// Address of the caller
    pub sender: Fr,
    /// Call arguments
    pub calldata: Vec<Fr>,
}

impl Environment {
    pub fn new(address: Fr, sender: Fr, calldata: Vec<Fr>) -> Self {
        Self {
            address,
            sender,
            calldata,
        }
    }
}

/// State of a single contract invocation
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    env: Environment,
    bytecode: Vec<u8>,
    memory: TaggedMemory,
    /// Byte offset of the next instruction
    pc: usize,
    gas_limit: u64,
    gas_left: u64,
    /// Nesting depth, 0 for a top-level call
    depth: usize,
    halted: bool,
}

impl ExecutionContext {
    /// Create a top-level context with empty memory
    pub fn new(bytecode: Vec<u8>, env: Environment, gas_limit: u64) -> Self {
        Self {
            env,
            bytecode,
            memory: TaggedMemory::new(),
            pc: 0,
            gas_limit,
            gas_left: gas_limit,
            depth: 0,
            halted: false,
        }
    }

    /// Create a context for a nested call.
    ///
    /// The child starts with fresh memory; nothing is shared with `self`.
    pub fn child(
        &self,
        bytecode: Vec<u8>,
        env: Environment,
        gas_limit: u64,
        max_depth: usize,
    ) -> Result<Self, VmError> {
        let depth = self.depth + 1;
        if depth >= max_depth {
            return Err(VmError::CallDepthExceeded(depth, max_depth));
        }

        let mut child = Self::new(bytecode, env, gas_limit);
        child.depth = depth;
        Ok(child)
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn memory(&self) -> &TaggedMemory {
        &self.memory
    }

    /// Mutable memory access, for the host to seed inputs before execution
    pub fn memory_mut(&mut self) -> &mut TaggedMemory {
        &mut self.memory
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn gas_left(&self) -> u64 {
        self.gas_left
    }

    /// Gas consumed since the context was created
    pub fn gas_used(&self) -> u64 {
        self.gas_limit - self.gas_left
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    /// Deduct gas, failing without deducting anything if the budget is short
    pub(crate) fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        if self.gas_left < amount {
            return Err(VmError::OutOfGas {
                required: amount,
                remaining: self.gas_left,
            });
        }
        self.gas_left -= amount;
        Ok(())
    }
}
