//! AVM toolchain CLI
//!
//! Assembles, disassembles and inspects AVM bytecode.

use clap::{Parser, Subcommand};
use rollup_avm::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avm")]
#[command(version = "0.1.0")]
#[command(about = "Assembler and disassembler for rollup AVM bytecode", long_about = None)]
struct Cli {
    /// JSON config file (gas schedule and limits)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file to hex bytecode
    Assemble {
        /// Assembly source file
        #[arg(short, long)]
        file: PathBuf,

        /// Write the hex bytecode here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Disassemble hex bytecode
    Disasm {
        /// File containing hex bytecode
        #[arg(short, long, conflicts_with = "hex")]
        file: Option<PathBuf>,

        /// Hex bytecode
        #[arg(long)]
        hex: Option<String>,
    },

    /// Print the active configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Assemble { file, output } => {
            cli::cmd_assemble(&file, output.as_deref())?;
        }

        Commands::Disasm { file, hex } => {
            cli::cmd_disasm(file.as_deref(), hex.as_deref(), &config)?;
        }

        Commands::Config => {
            cli::cmd_config(&config)?;
        }
    }

    Ok(())
}
