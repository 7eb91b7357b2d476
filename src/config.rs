//! VM configuration
//!
//! Gas schedule and resource limits, loadable from a JSON file. Missing
//! fields fall back to the defaults.

use crate::avm::opcodes::Opcode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default gas budget for a new context
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// Maximum nesting depth of contexts
pub const MAX_CALL_DEPTH: usize = 1024;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Opcode {0} has zero base gas cost")]
    ZeroCost(Opcode),
}

/// Gas costs per opcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    pub set: u64,
    pub calldata_copy: u64,
    pub address: u64,
    pub sender: u64,
    pub jump: u64,
    #[serde(rename = "return")]
    pub return_: u64,
    pub revert: u64,
    pub poseidon2: u64,
    pub keccak: u64,
    pub keccakf1600: u64,
    pub sha256_compression: u64,
    pub pedersen: u64,
    /// Charged per input byte of KECCAK
    pub keccak_per_byte: u64,
    /// Charged per input element of PEDERSEN
    pub pedersen_per_element: u64,
    /// Charged per copied element of CALLDATACOPY
    pub calldata_per_element: u64,
    /// Charged per output cell of RETURN and REVERT
    pub return_per_element: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            set: 2,
            calldata_copy: 3,
            address: 2,
            sender: 2,
            jump: 8,
            return_: 1,
            revert: 1,
            poseidon2: 40,
            keccak: 30,
            keccakf1600: 60,
            sha256_compression: 50,
            pedersen: 60,
            keccak_per_byte: 1,
            pedersen_per_element: 10,
            calldata_per_element: 1,
            return_per_element: 1,
        }
    }
}

impl GasSchedule {
    /// Static cost charged before the opcode runs
    pub fn base_cost(&self, opcode: Opcode) -> u64 {
        match opcode {
            Opcode::Set => self.set,
            Opcode::CalldataCopy => self.calldata_copy,
            Opcode::Address => self.address,
            Opcode::Sender => self.sender,
            Opcode::Jump => self.jump,
            Opcode::Return => self.return_,
            Opcode::Revert => self.revert,
            Opcode::Poseidon2 => self.poseidon2,
            Opcode::Keccak => self.keccak,
            Opcode::KeccakF1600 => self.keccakf1600,
            Opcode::Sha256Compression => self.sha256_compression,
            Opcode::Pedersen => self.pedersen,
        }
    }
}

/// VM configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Gas budget for contexts created through `Vm::context`
    pub gas_limit: u64,
    /// Contexts deeper than this cannot be created
    pub max_call_depth: usize,
    pub gas: GasSchedule,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            max_call_depth: MAX_CALL_DEPTH,
            gas: GasSchedule::default(),
        }
    }
}

impl VmConfig {
    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: VmConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Every opcode must cost gas, so every program terminates
    pub fn validate(&self) -> Result<(), ConfigError> {
        for opcode in Opcode::ALL {
            if self.gas.base_cost(opcode) == 0 {
                return Err(ConfigError::ZeroCost(opcode));
            }
        }
        Ok(())
    }
}
