//! AVM assembler
//!
//! Assembles a line-oriented text syntax to bytecode, and renders bytecode
//! back to the same syntax.
//!
//! ```text
//! ; comment
//! :loop
//! SET field 10 5
//! SET 0x07 11 0          ; raw tag byte
//! KECCAK 200 @0 1        ; `@` marks an indirect operand
//! JUMP loop
//! ```

use crate::avm::addressing::{Addressing, AddressingMode};
use crate::avm::instruction::{
    encode_all, Address, CalldataCopy, Instruction, Jump, Keccak, KeccakF1600, Pedersen,
    Poseidon2, Return, Revert, Sender, Set, Sha256Compression,
};
use crate::avm::opcodes::Opcode;
use crate::config::GasSchedule;
use crate::memory::Tag;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Assembler errors, each carrying the 1-based source line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("line {line}: unknown instruction: {name}")]
    UnknownInstruction { line: usize, name: String },
    #[error("line {line}: invalid argument: {message}")]
    InvalidArgument { line: usize, message: String },
    #[error("line {line}: invalid number: {value}")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: undefined label: {label}")]
    UndefinedLabel { line: usize, label: String },
    #[error("line {line}: duplicate label: {label}")]
    DuplicateLabel { line: usize, label: String },
}

/// Two-pass assembler for AVM bytecode
pub struct Assembler {
    /// Parsed instructions
    instructions: Vec<Instruction>,
    /// Byte offset of the next instruction
    offset: usize,
    /// Label positions
    labels: HashMap<String, u32>,
    /// Pending label references (instruction index, label, source line)
    label_refs: Vec<(usize, String, usize)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            offset: 0,
            labels: HashMap::new(),
            label_refs: Vec::new(),
        }
    }

    /// Assemble source text to bytecode
    pub fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        self.instructions.clear();
        self.offset = 0;
        self.labels.clear();
        self.label_refs.clear();

        // First pass: parse instructions and collect labels
        for (index, raw) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.split(';').next().unwrap_or_default().trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(label) = line.strip_prefix(':') {
                let label = label.trim();
                if label.is_empty() || label.contains(char::is_whitespace) {
                    return Err(AssemblerError::InvalidArgument {
                        line: line_no,
                        message: format!("bad label definition '{}'", line),
                    });
                }
                if self.labels.contains_key(label) {
                    return Err(AssemblerError::DuplicateLabel {
                        line: line_no,
                        label: label.to_string(),
                    });
                }
                self.labels.insert(label.to_string(), self.offset as u32);
                continue;
            }

            let instruction = self.parse_instruction(line_no, line)?;
            self.offset += instruction.wire_size();
            self.instructions.push(instruction);
        }

        // Second pass: resolve label references
        for (index, label, line) in &self.label_refs {
            let loc = *self
                .labels
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line,
                    label: label.clone(),
                })?;
            self.instructions[*index] = Jump { loc }.into();
        }

        log::debug!(
            "Assembled {} instructions, {} labels, {} bytes",
            self.instructions.len(),
            self.labels.len(),
            self.offset
        );
        Ok(encode_all(&self.instructions))
    }

    /// Byte offset of a label from the last `assemble` call
    pub fn label(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    fn parse_instruction(&mut self, line: usize, text: &str) -> Result<Instruction, AssemblerError> {
        let mut parts = text.split_whitespace();
        let mnemonic = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let opcode = Opcode::from_name(mnemonic).ok_or_else(|| AssemblerError::UnknownInstruction {
            line,
            name: mnemonic.to_uppercase(),
        })?;
        let ops = Operands { line, opcode, args: &args };

        let instruction: Instruction = match opcode {
            Opcode::Set => {
                ops.expect_count(3)?;
                let tag = ops.tag_byte(args[0])?;
                let (indirect, [dst_offset]) = ops.offsets::<1>(&args[1..2])?;
                let value = ops.number(args[2])?;
                if let Some(tag) = Tag::from_byte(tag) {
                    if !fits_tag(tag, value) {
                        return Err(ops.invalid(format!("{} does not fit in {}", value, tag)));
                    }
                }
                Set {
                    indirect,
                    tag,
                    dst_offset,
                    value,
                }
                .into()
            }
            Opcode::CalldataCopy => {
                let (indirect, [cd_start_offset, copy_size_offset, dst_offset]) = ops.offsets::<3>(&args)?;
                CalldataCopy {
                    indirect,
                    cd_start_offset,
                    copy_size_offset,
                    dst_offset,
                }
                .into()
            }
            Opcode::Address => {
                let (indirect, [dst_offset]) = ops.offsets::<1>(&args)?;
                Address { indirect, dst_offset }.into()
            }
            Opcode::Sender => {
                let (indirect, [dst_offset]) = ops.offsets::<1>(&args)?;
                Sender { indirect, dst_offset }.into()
            }
            Opcode::Jump => {
                ops.expect_count(1)?;
                let target = args[0];
                if target.starts_with(|c: char| c.is_ascii_digit()) {
                    Jump {
                        loc: ops.u32(target)?,
                    }
                    .into()
                } else {
                    self.label_refs
                        .push((self.instructions.len(), target.to_string(), line));
                    Jump { loc: 0 }.into()
                }
            }
            Opcode::Return | Opcode::Revert => {
                ops.expect_count(2)?;
                let (indirect, [ret_offset]) = ops.offsets::<1>(&args[..1])?;
                let ret_size = ops.u32(args[1])?;
                if opcode == Opcode::Return {
                    Return {
                        indirect,
                        ret_offset,
                        ret_size,
                    }
                    .into()
                } else {
                    Revert {
                        indirect,
                        ret_offset,
                        ret_size,
                    }
                    .into()
                }
            }
            Opcode::Poseidon2 => {
                let (indirect, [input, output]) = ops.offsets::<2>(&args)?;
                Poseidon2 {
                    indirect,
                    input_state_offset: ops.narrow(input)?,
                    output_state_offset: ops.narrow(output)?,
                }
                .into()
            }
            Opcode::Keccak => {
                let (indirect, [dst_offset, message, size]) = ops.offsets::<3>(&args)?;
                Keccak {
                    indirect,
                    dst_offset,
                    message_offset: ops.narrow(message)?,
                    message_size_offset: ops.narrow(size)?,
                }
                .into()
            }
            Opcode::KeccakF1600 => {
                let (indirect, [dst, message, size]) = ops.offsets::<3>(&args)?;
                KeccakF1600 {
                    indirect,
                    dst_offset: ops.narrow(dst)?,
                    message_offset: ops.narrow(message)?,
                    message_size_offset: ops.narrow(size)?,
                }
                .into()
            }
            Opcode::Sha256Compression => {
                let (indirect, [dst, state, state_size, inputs, inputs_size]) = ops.offsets::<5>(&args)?;
                Sha256Compression {
                    indirect,
                    dst_offset: ops.narrow(dst)?,
                    state_offset: ops.narrow(state)?,
                    state_size_offset: ops.narrow(state_size)?,
                    inputs_offset: ops.narrow(inputs)?,
                    inputs_size_offset: ops.narrow(inputs_size)?,
                }
                .into()
            }
            Opcode::Pedersen => {
                let (indirect, [gen_index_offset, dst_offset, message_offset, message_size_offset]) =
                    ops.offsets::<4>(&args)?;
                Pedersen {
                    indirect,
                    gen_index_offset,
                    dst_offset,
                    message_offset,
                    message_size_offset,
                }
                .into()
            }
        };

        Ok(instruction)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Operand parsing for one source line
struct Operands<'a> {
    line: usize,
    opcode: Opcode,
    args: &'a [&'a str],
}

impl Operands<'_> {
    fn invalid(&self, message: String) -> AssemblerError {
        AssemblerError::InvalidArgument {
            line: self.line,
            message,
        }
    }

    fn expect_count(&self, count: usize) -> Result<(), AssemblerError> {
        if self.args.len() != count {
            return Err(self.invalid(format!(
                "{} expects {} operands, got {}",
                self.opcode,
                count,
                self.args.len()
            )));
        }
        Ok(())
    }

    /// Parse offset operands, packing `@` markers into the indirect byte
    fn offsets<const N: usize>(&self, args: &[&str]) -> Result<(u8, [u32; N]), AssemblerError> {
        if args.len() != N {
            return Err(self.invalid(format!(
                "{} expects {} operands, got {}",
                self.opcode,
                N,
                args.len()
            )));
        }

        let mut modes = [AddressingMode::Direct; N];
        let mut values = [0u32; N];
        for (i, arg) in args.iter().enumerate() {
            let digits = match arg.strip_prefix('@') {
                Some(rest) => {
                    modes[i] = AddressingMode::Indirect;
                    rest
                }
                None => arg,
            };
            values[i] = self.u32(digits)?;
        }
        Ok((Addressing::new(&modes).to_wire(), values))
    }

    /// Parse a number (decimal or hex)
    fn number(&self, s: &str) -> Result<u128, AssemblerError> {
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u128::from_str_radix(hex, 16),
            None => s.parse::<u128>(),
        };
        parsed.map_err(|_| AssemblerError::InvalidNumber {
            line: self.line,
            value: s.to_string(),
        })
    }

    fn u32(&self, s: &str) -> Result<u32, AssemblerError> {
        let value = self.number(s)?;
        u32::try_from(value).map_err(|_| self.invalid(format!("{} does not fit in 32 bits", value)))
    }

    /// A tag name, or a raw tag byte. Raw bytes that name no tag are kept so
    /// the VM can reject them at run time.
    fn tag_byte(&self, s: &str) -> Result<u8, AssemblerError> {
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            let value = self.number(s)?;
            return u8::try_from(value).map_err(|_| self.invalid(format!("tag {} does not fit in 8 bits", value)));
        }
        Tag::from_name(s)
            .map(|tag| tag as u8)
            .ok_or_else(|| self.invalid(format!("unknown tag '{}'", s)))
    }

    /// 16-bit offset operand
    fn narrow(&self, value: u32) -> Result<u16, AssemblerError> {
        u16::try_from(value)
            .map_err(|_| self.invalid(format!("{} offset {} does not fit in 16 bits", self.opcode, value)))
    }
}

fn fits_tag(tag: Tag, value: u128) -> bool {
    match tag {
        Tag::U8 => value <= u128::from(u8::MAX),
        Tag::U16 => value <= u128::from(u16::MAX),
        Tag::U32 => value <= u128::from(u32::MAX),
        Tag::U64 => value <= u128::from(u64::MAX),
        Tag::U128 | Tag::Field => true,
    }
}

/// Render offsets, prefixing indirect ones with `@`
fn offsets(indirect: u8, values: &[u32]) -> String {
    let addressing = Addressing::from_wire(indirect, values.len());
    values
        .iter()
        .enumerate()
        .map(|(i, value)| match addressing.mode(i) {
            AddressingMode::Direct => value.to_string(),
            AddressingMode::Indirect => format!("@{}", value),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders in assembler syntax
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode())?;
        match self {
            Instruction::Set(i) => {
                let tag = Tag::from_byte(i.tag)
                    .map(|tag| tag.name().to_string())
                    .unwrap_or_else(|| format!("0x{:02x}", i.tag));
                write!(f, " {} {} {}", tag, offsets(i.indirect, &[i.dst_offset]), i.value)
            }
            Instruction::CalldataCopy(i) => write!(
                f,
                " {}",
                offsets(i.indirect, &[i.cd_start_offset, i.copy_size_offset, i.dst_offset])
            ),
            Instruction::Address(i) => write!(f, " {}", offsets(i.indirect, &[i.dst_offset])),
            Instruction::Sender(i) => write!(f, " {}", offsets(i.indirect, &[i.dst_offset])),
            Instruction::Jump(i) => write!(f, " 0x{:04x}", i.loc),
            Instruction::Return(i) => {
                write!(f, " {} {}", offsets(i.indirect, &[i.ret_offset]), i.ret_size)
            }
            Instruction::Revert(i) => {
                write!(f, " {} {}", offsets(i.indirect, &[i.ret_offset]), i.ret_size)
            }
            Instruction::Poseidon2(i) => write!(
                f,
                " {}",
                offsets(
                    i.indirect,
                    &[u32::from(i.input_state_offset), u32::from(i.output_state_offset)]
                )
            ),
            Instruction::Keccak(i) => write!(
                f,
                " {}",
                offsets(
                    i.indirect,
                    &[
                        i.dst_offset,
                        u32::from(i.message_offset),
                        u32::from(i.message_size_offset)
                    ]
                )
            ),
            Instruction::KeccakF1600(i) => write!(
                f,
                " {}",
                offsets(
                    i.indirect,
                    &[
                        u32::from(i.dst_offset),
                        u32::from(i.message_offset),
                        u32::from(i.message_size_offset)
                    ]
                )
            ),
            Instruction::Sha256Compression(i) => write!(
                f,
                " {}",
                offsets(
                    i.indirect,
                    &[
                        u32::from(i.dst_offset),
                        u32::from(i.state_offset),
                        u32::from(i.state_size_offset),
                        u32::from(i.inputs_offset),
                        u32::from(i.inputs_size_offset)
                    ]
                )
            ),
            Instruction::Pedersen(i) => write!(
                f,
                " {}",
                offsets(
                    i.indirect,
                    &[
                        i.gen_index_offset,
                        i.dst_offset,
                        i.message_offset,
                        i.message_size_offset
                    ]
                )
            ),
        }
    }
}

/// Disassemble bytecode to readable format
pub fn disassemble(code: &[u8]) -> String {
    render_listing(code, None)
}

/// Disassemble with each instruction's base gas cost as a trailing comment
pub fn disassemble_with_gas(code: &[u8], gas: &GasSchedule) -> String {
    render_listing(code, Some(gas))
}

fn render_listing(code: &[u8], gas: Option<&GasSchedule>) -> String {
    let mut output = String::new();
    let mut pc = 0;

    while pc < code.len() {
        match Instruction::decode(&code[pc..]) {
            Ok(instruction) => {
                output.push_str(&format!("{:04x}: {}", pc, instruction));
                if let Some(gas) = gas {
                    output.push_str(&format!(" ; gas {}", gas.base_cost(instruction.opcode())));
                }
                output.push('\n');
                pc += instruction.wire_size();
            }
            Err(_) => {
                output.push_str(&format!("{:04x}: UNKNOWN 0x{:02x}\n", pc, code[pc]));
                pc += 1;
            }
        }
    }

    output
}
