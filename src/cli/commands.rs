//! CLI commands for the AVM toolchain
//!
//! Implements all command handlers for the CLI interface.

use crate::avm::{disassemble_with_gas, Assembler};
use crate::config::VmConfig;
use std::fs;
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the config file if one was given, otherwise the defaults
pub fn load_config(path: Option<&Path>) -> CliResult<VmConfig> {
    match path {
        Some(path) => {
            log::info!("Loading config from {:?}", path);
            Ok(VmConfig::load(path)?)
        }
        None => Ok(VmConfig::default()),
    }
}

/// Assemble a source file, printing the hex bytecode or writing it to `output`
pub fn cmd_assemble(file: &Path, output: Option<&Path>) -> CliResult<()> {
    let source = fs::read_to_string(file)?;
    let mut assembler = Assembler::new();
    let bytecode = assembler.assemble(&source)?;
    let encoded = hex::encode(&bytecode);
    log::info!("Assembled {:?}: {} bytes", file, bytecode.len());

    match output {
        Some(path) => {
            fs::write(path, format!("{}\n", encoded))?;
            println!("✅ Assembled {} bytes of bytecode", bytecode.len());
            println!("   Output: {:?}", path);
        }
        None => println!("{}", encoded),
    }

    Ok(())
}

/// Read bytecode from a hex file or a hex string
pub fn load_bytecode(file: Option<&Path>, hex_str: Option<&str>) -> CliResult<Vec<u8>> {
    let text = match (file, hex_str) {
        (Some(path), None) => fs::read_to_string(path)?,
        (None, Some(hex_str)) => hex_str.to_string(),
        _ => return Err("Specify exactly one of --file or --hex".into()),
    };

    let text = text.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    Ok(hex::decode(text)?)
}

/// Print the disassembly with per-instruction base gas
pub fn cmd_disasm(file: Option<&Path>, hex_str: Option<&str>, config: &VmConfig) -> CliResult<()> {
    let bytecode = load_bytecode(file, hex_str)?;
    log::info!("Disassembling {} bytes", bytecode.len());

    if bytecode.is_empty() {
        println!("📭 Empty bytecode");
        return Ok(());
    }

    print!("{}", disassemble_with_gas(&bytecode, &config.gas));
    Ok(())
}

/// Print the active configuration
pub fn cmd_config(config: &VmConfig) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
