//! Instruction wire format
//!
//! Every instruction is a fixed-size record: one opcode byte followed by its
//! operands in declared order, each big-endian and of a width fixed by the
//! opcode. Hashing and memory opcodes carry an indirect bitfield byte right
//! after the opcode (see [`crate::avm::addressing`]).

use crate::avm::opcodes::Opcode;
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use thiserror::Error;

/// Instruction decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No bytes to decode")]
    Empty,
    #[error("Unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("Opcode mismatch: expected {expected}, found 0x{found:02x}")]
    OpcodeMismatch { expected: Opcode, found: u8 },
    #[error("Truncated {opcode}: needs {expected} bytes, {available} available")]
    Truncated {
        opcode: Opcode,
        expected: usize,
        available: usize,
    },
}

/// A fixed-width big-endian operand
pub trait Operand: Copy + Default + PartialEq + fmt::Debug {
    /// Encoded width in bytes
    const WIDTH: usize;

    /// Read from the front of `buf`; the caller has checked the length
    fn get(buf: &mut &[u8]) -> Self;

    fn put(self, buf: &mut BytesMut);
}

macro_rules! operand {
    ($($ty:ty => $width:expr, $get:ident, $put:ident;)*) => {
        $(
            impl Operand for $ty {
                const WIDTH: usize = $width;

                fn get(buf: &mut &[u8]) -> Self {
                    buf.$get()
                }

                fn put(self, buf: &mut BytesMut) {
                    buf.$put(self);
                }
            }
        )*
    };
}

operand! {
    u8 => 1, get_u8, put_u8;
    u16 => 2, get_u16, put_u16;
    u32 => 4, get_u32, put_u32;
    u128 => 16, get_u128, put_u128;
}

/// Binary encoding of one instruction type
pub trait WireFormat: Sized {
    const OPCODE: Opcode;
    /// Encoded size in bytes, opcode byte included
    const WIRE_SIZE: usize;

    /// Decode from the front of `bytes`, consuming exactly `WIRE_SIZE` bytes
    fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError>;

    fn serialize(&self) -> Vec<u8>;
}

/// Validate the opcode byte and length, returning the operand bytes
fn operand_bytes(bytes: &[u8], opcode: Opcode, wire_size: usize) -> Result<&[u8], DecodeError> {
    let found = *bytes.first().ok_or(DecodeError::Empty)?;
    if found != opcode as u8 {
        return Err(DecodeError::OpcodeMismatch {
            expected: opcode,
            found,
        });
    }
    if bytes.len() < wire_size {
        return Err(DecodeError::Truncated {
            opcode,
            expected: wire_size,
            available: bytes.len(),
        });
    }
    Ok(&bytes[1..wire_size])
}

macro_rules! instructions {
    ($(
        $(#[$meta:meta])*
        $name:ident => $opcode:ident {
            $( $(#[$field_meta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name {
                $( $(#[$field_meta])* pub $field: $ty, )*
            }

            impl WireFormat for $name {
                const OPCODE: Opcode = Opcode::$opcode;
                const WIRE_SIZE: usize = 1 $( + <$ty as Operand>::WIDTH )*;

                fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
                    #[allow(unused_mut, unused_variables)]
                    let mut buf = operand_bytes(bytes, Self::OPCODE, Self::WIRE_SIZE)?;
                    Ok(Self {
                        $( $field: <$ty as Operand>::get(&mut buf), )*
                    })
                }

                fn serialize(&self) -> Vec<u8> {
                    let mut buf = BytesMut::with_capacity(Self::WIRE_SIZE);
                    buf.put_u8(Self::OPCODE as u8);
                    $( Operand::put(self.$field, &mut buf); )*
                    buf.to_vec()
                }
            }

            impl From<$name> for Instruction {
                fn from(instruction: $name) -> Self {
                    Instruction::$name(instruction)
                }
            }
        )*

        /// A decoded instruction, one variant per opcode
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Instruction {
            $( $name($name), )*
        }

        impl Instruction {
            /// Decode the instruction at the front of `bytes`
            pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
                let byte = *bytes.first().ok_or(DecodeError::Empty)?;
                let opcode = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode(byte))?;
                match opcode {
                    $( Opcode::$opcode => $name::deserialize(bytes).map(Instruction::$name), )*
                }
            }

            /// Encode to the instruction's wire bytes
            pub fn encode(&self) -> Vec<u8> {
                match self {
                    $( Instruction::$name(inner) => inner.serialize(), )*
                }
            }

            pub fn opcode(&self) -> Opcode {
                match self {
                    $( Instruction::$name(_) => Opcode::$opcode, )*
                }
            }
        }
    };
}

instructions! {
    /// Write `value` as a cell of `tag` at `dst_offset`
    Set => Set {
        indirect: u8,
        tag: u8,
        dst_offset: u32,
        value: u128,
    }

    /// Copy `calldata[*cd_start_offset .. + *copy_size_offset]` to `dst_offset`
    CalldataCopy => CalldataCopy {
        indirect: u8,
        cd_start_offset: u32,
        copy_size_offset: u32,
        dst_offset: u32,
    }

    /// Write the contract address to `dst_offset`
    Address => Address {
        indirect: u8,
        dst_offset: u32,
    }

    /// Write the sender address to `dst_offset`
    Sender => Sender {
        indirect: u8,
        dst_offset: u32,
    }

    /// Jump to an absolute bytecode offset
    Jump => Jump {
        loc: u32,
    }

    /// Halt successfully, returning `ret_size` field cells from `ret_offset`
    Return => Return {
        indirect: u8,
        ret_offset: u32,
        /// Immediate cell count, not a memory offset
        ret_size: u32,
    }

    /// Halt with a revert, returning `ret_size` field cells from `ret_offset`
    Revert => Revert {
        indirect: u8,
        ret_offset: u32,
        /// Immediate cell count, not a memory offset
        ret_size: u32,
    }

    /// Poseidon2 permutation of the 4 field cells at `input_state_offset`
    Poseidon2 => Poseidon2 {
        indirect: u8,
        input_state_offset: u16,
        output_state_offset: u16,
    }

    /// Keccak-256 of the `u8` region at `message_offset`
    Keccak => Keccak {
        indirect: u8,
        dst_offset: u32,
        message_offset: u16,
        message_size_offset: u16,
    }

    /// Keccak-f[1600] over the 25 `u64` lanes at `message_offset`
    KeccakF1600 => KeccakF1600 {
        indirect: u8,
        dst_offset: u16,
        message_offset: u16,
        message_size_offset: u16,
    }

    /// SHA-256 compression of 8 state words and 16 block words (`u32`)
    Sha256Compression => Sha256Compression {
        indirect: u8,
        dst_offset: u16,
        state_offset: u16,
        state_size_offset: u16,
        inputs_offset: u16,
        inputs_size_offset: u16,
    }

    /// Pedersen hash of the field region at `message_offset`
    Pedersen => Pedersen {
        indirect: u8,
        gen_index_offset: u32,
        dst_offset: u32,
        message_offset: u32,
        message_size_offset: u32,
    }
}

impl Instruction {
    /// Fixed encoded size of this instruction
    pub fn wire_size(&self) -> usize {
        self.opcode().wire_size()
    }

    /// The indirect bitfield, if the opcode carries one
    pub fn indirect(&self) -> Option<u8> {
        match self {
            Instruction::Set(i) => Some(i.indirect),
            Instruction::CalldataCopy(i) => Some(i.indirect),
            Instruction::Address(i) => Some(i.indirect),
            Instruction::Sender(i) => Some(i.indirect),
            Instruction::Jump(_) => None,
            Instruction::Return(i) => Some(i.indirect),
            Instruction::Revert(i) => Some(i.indirect),
            Instruction::Poseidon2(i) => Some(i.indirect),
            Instruction::Keccak(i) => Some(i.indirect),
            Instruction::KeccakF1600(i) => Some(i.indirect),
            Instruction::Sha256Compression(i) => Some(i.indirect),
            Instruction::Pedersen(i) => Some(i.indirect),
        }
    }
}

/// Decode a whole bytecode stream into `(offset, instruction)` pairs
pub fn decode_all(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut instructions = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let instruction = Instruction::decode(&code[pc..])?;
        instructions.push((pc, instruction));
        pc += instruction.wire_size();
    }
    Ok(instructions)
}

/// Encode a sequence of instructions back to back
pub fn encode_all(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().flat_map(|i| i.encode()).collect()
}
