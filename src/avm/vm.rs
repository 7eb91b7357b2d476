//! AVM dispatch loop
//!
//! Fetches the instruction at the program counter, charges its base gas,
//! runs its handler against the context's memory and advances. Every fault
//! ends the context; none of them escapes as a panic or an `Err` to the host.

use crate::avm::context::{Environment, ExecutionContext};
use crate::avm::instruction::{DecodeError, Instruction};
use crate::config::{ConfigError, VmConfig};
use crate::crypto::HashBackend;
use crate::memory::{Cell, MemoryError};
use thiserror::Error;

/// VM execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("Malformed instruction: {0}")]
    MalformedInstruction(#[from] DecodeError),
    #[error("Out of gas: required {required}, remaining {remaining}")]
    OutOfGas { required: u64, remaining: u64 },
    #[error("Invalid jump destination: {0}")]
    InvalidJump(u32),
    #[error("Invalid tag: {0}")]
    InvalidTag(u8),
    #[error("Region size mismatch: expected {expected}, declared {declared}")]
    RegionSizeMismatch { expected: u32, declared: u32 },
    #[error("Calldata out of range: start {start}, size {size}, available {available}")]
    CalldataOutOfRange {
        start: u32,
        size: u32,
        available: usize,
    },
    #[error("Call depth exceeded: {0} (max: {1})")]
    CallDepthExceeded(usize, usize),
    #[error("Execution reverted")]
    Reverted,
    #[error("Context already halted")]
    AlreadyHalted,
}

/// Coarse classification of a `VmError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TagMismatch,
    AddressOverflow,
    MalformedInstruction,
    OutOfResource,
    /// Opcode-specific faults and explicit reverts
    Execution,
}

impl VmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::Memory(MemoryError::TagMismatch { .. }) => ErrorKind::TagMismatch,
            VmError::Memory(MemoryError::AddressOverflow { .. }) | VmError::RegionSizeMismatch { .. } => {
                ErrorKind::AddressOverflow
            }
            VmError::MalformedInstruction(_) => ErrorKind::MalformedInstruction,
            VmError::OutOfGas { .. } => ErrorKind::OutOfResource,
            _ => ErrorKind::Execution,
        }
    }
}

/// How a context stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// RETURN reached, or the program counter ran off the end of the bytecode
    Success,
    /// A fault or an explicit REVERT; the host owns unwinding of memory effects
    Reverted(VmError),
    /// The gas budget could not cover an instruction
    OutOfGas,
}

/// Result of running a context to a halt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub halt: Halt,
    /// Cells returned by RETURN or REVERT
    pub output: Vec<Cell>,
    /// Gas used since the context was created
    pub gas_used: u64,
    pub gas_left: u64,
    /// Program counter at the halt
    pub pc: usize,
    /// Instructions executed by this call
    pub steps: u64,
}

impl ExecutionResult {
    /// Whether execution succeeded
    pub fn success(&self) -> bool {
        self.halt == Halt::Success
    }

    /// The fault that reverted execution, if any
    pub fn error(&self) -> Option<&VmError> {
        match &self.halt {
            Halt::Reverted(err) => Some(err),
            _ => None,
        }
    }
}

/// What a handler asks the dispatch loop to do next
#[derive(Debug)]
pub(super) enum Flow {
    /// Fall through to the following instruction
    Next,
    /// Continue at an absolute bytecode offset
    Jump(usize),
    Exit(Exit),
}

/// Halting instructions
#[derive(Debug)]
pub(super) enum Exit {
    Return(Vec<Cell>),
    Revert(Vec<Cell>),
}

/// The AVM
pub struct Vm<B> {
    pub(super) backend: B,
    pub(super) config: VmConfig,
}

impl<B: HashBackend> Vm<B> {
    /// Create a VM with the default configuration
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: VmConfig::default(),
        }
    }

    /// Create a VM with a validated configuration
    pub fn with_config(backend: B, config: VmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create a top-level context with the configured gas limit
    pub fn context(&self, bytecode: Vec<u8>, env: Environment) -> ExecutionContext {
        ExecutionContext::new(bytecode, env, self.config.gas_limit)
    }

    /// Create a nested context, enforcing the configured call depth
    pub fn child_context(
        &self,
        parent: &ExecutionContext,
        bytecode: Vec<u8>,
        env: Environment,
        gas_limit: u64,
    ) -> Result<ExecutionContext, VmError> {
        parent.child(bytecode, env, gas_limit, self.config.max_call_depth)
    }

    /// Run the context until it halts
    pub fn execute(&self, ctx: &mut ExecutionContext) -> ExecutionResult {
        if ctx.is_halted() {
            return self.finish(ctx, Halt::Reverted(VmError::AlreadyHalted), Vec::new(), 0);
        }

        let mut steps = 0u64;
        loop {
            if ctx.pc() >= ctx.bytecode().len() {
                return self.finish(ctx, Halt::Success, Vec::new(), steps);
            }

            steps += 1;
            let (halt, output) = match self.step(ctx) {
                Ok(None) => continue,
                Ok(Some(Exit::Return(output))) => (Halt::Success, output),
                Ok(Some(Exit::Revert(output))) => (Halt::Reverted(VmError::Reverted), output),
                Err(VmError::OutOfGas { required, remaining }) => {
                    log::debug!(
                        "Out of gas at pc {}: required {}, remaining {}",
                        ctx.pc(),
                        required,
                        remaining
                    );
                    (Halt::OutOfGas, Vec::new())
                }
                Err(err) => {
                    log::warn!("Execution reverted at pc {}: {}", ctx.pc(), err);
                    (Halt::Reverted(err), Vec::new())
                }
            };
            return self.finish(ctx, halt, output, steps);
        }
    }

    /// Execute a single instruction.
    ///
    /// Returns `Ok(None)` while the context keeps running.
    fn step(&self, ctx: &mut ExecutionContext) -> Result<Option<Exit>, VmError> {
        let pc = ctx.pc();
        let code = ctx.bytecode().get(pc..).unwrap_or_default();
        let instruction = Instruction::decode(code)?;
        let opcode = instruction.opcode();
        ctx.consume_gas(self.config.gas.base_cost(opcode))?;
        log::trace!("{:04x}: {}", pc, opcode);

        let flow = match &instruction {
            Instruction::Set(inst) => self.exec_set(inst, ctx),
            Instruction::CalldataCopy(inst) => self.exec_calldata_copy(inst, ctx),
            Instruction::Address(inst) => self.exec_address(inst, ctx),
            Instruction::Sender(inst) => self.exec_sender(inst, ctx),
            Instruction::Jump(inst) => self.exec_jump(inst, ctx),
            Instruction::Return(inst) => self.exec_return(inst, ctx),
            Instruction::Revert(inst) => self.exec_revert(inst, ctx),
            Instruction::Poseidon2(inst) => self.exec_poseidon2(inst, ctx),
            Instruction::Keccak(inst) => self.exec_keccak(inst, ctx),
            Instruction::KeccakF1600(inst) => self.exec_keccakf1600(inst, ctx),
            Instruction::Sha256Compression(inst) => self.exec_sha256_compression(inst, ctx),
            Instruction::Pedersen(inst) => self.exec_pedersen(inst, ctx),
        }?;

        match flow {
            Flow::Next => {
                ctx.set_pc(pc + instruction.wire_size());
                Ok(None)
            }
            Flow::Jump(target) => {
                ctx.set_pc(target);
                Ok(None)
            }
            Flow::Exit(exit) => Ok(Some(exit)),
        }
    }

    fn finish(
        &self,
        ctx: &mut ExecutionContext,
        halt: Halt,
        output: Vec<Cell>,
        steps: u64,
    ) -> ExecutionResult {
        ctx.halt();
        log::debug!(
            "Context halted: {:?}, gas used {}, steps {}",
            halt,
            ctx.gas_used(),
            steps
        );
        ExecutionResult {
            halt,
            output,
            gas_used: ctx.gas_used(),
            gas_left: ctx.gas_left(),
            pc: ctx.pc(),
            steps,
        }
    }
}
