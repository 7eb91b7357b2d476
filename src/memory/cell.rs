//! Memory cells and their runtime tags
//!
//! Every cell carries its tag. Readers state the tag they expect and the
//! memory refuses to coerce between tags.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime type marker of a memory cell
///
/// The discriminants are the wire values used by the `SET` instruction.
/// Zero is reserved for "uninitialized" and is never a valid tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Tag {
    /// 8-bit unsigned integer
    U8 = 1,
    /// 16-bit unsigned integer
    U16 = 2,
    /// 32-bit unsigned integer
    U32 = 3,
    /// 64-bit unsigned integer
    U64 = 4,
    /// 128-bit unsigned integer
    U128 = 5,
    /// BN254 scalar field element
    Field = 6,
}

impl Tag {
    /// All tags in wire order
    pub const ALL: [Tag; 6] = [Tag::U8, Tag::U16, Tag::U32, Tag::U64, Tag::U128, Tag::Field];

    /// Convert a wire byte to a tag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Tag::U8),
            2 => Some(Tag::U16),
            3 => Some(Tag::U32),
            4 => Some(Tag::U64),
            5 => Some(Tag::U128),
            6 => Some(Tag::Field),
            _ => None,
        }
    }

    /// Parse the lowercase tag name used by the assembler
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(name))
    }

    /// Tag name for disassembly and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Tag::U8 => "u8",
            Tag::U16 => "u16",
            Tag::U32 => "u32",
            Tag::U64 => "u64",
            Tag::U128 => "u128",
            Tag::Field => "field",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged memory value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Field(Fr),
}

impl Cell {
    /// The cell's runtime tag
    pub fn tag(&self) -> Tag {
        match self {
            Cell::U8(_) => Tag::U8,
            Cell::U16(_) => Tag::U16,
            Cell::U32(_) => Tag::U32,
            Cell::U64(_) => Tag::U64,
            Cell::U128(_) => Tag::U128,
            Cell::Field(_) => Tag::Field,
        }
    }

    /// Zero value of the given tag
    pub fn zero(tag: Tag) -> Self {
        Self::from_u128(tag, 0)
    }

    /// Build a cell of `tag` from a raw integer.
    ///
    /// Integer tags keep the low bits that fit their width; `Field` embeds
    /// the value as a field element.
    pub fn from_u128(tag: Tag, value: u128) -> Self {
        match tag {
            Tag::U8 => Cell::U8(value as u8),
            Tag::U16 => Cell::U16(value as u16),
            Tag::U32 => Cell::U32(value as u32),
            Tag::U64 => Cell::U64(value as u64),
            Tag::U128 => Cell::U128(value),
            Tag::Field => Cell::Field(Fr::from(value)),
        }
    }
}

/// Unwritten memory reads as a 32-bit zero.
impl Default for Cell {
    fn default() -> Self {
        Cell::U32(0)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::U8(v) => write!(f, "u8({})", v),
            Cell::U16(v) => write!(f, "u16({})", v),
            Cell::U32(v) => write!(f, "u32({})", v),
            Cell::U64(v) => write!(f, "u64({})", v),
            Cell::U128(v) => write!(f, "u128({})", v),
            Cell::Field(v) => write!(f, "field(0x{})", field_to_hex(v)),
        }
    }
}

/// Big-endian hex encoding of a field element (no `0x` prefix)
pub fn field_to_hex(value: &Fr) -> String {
    hex::encode(value.into_bigint().to_bytes_be())
}

/// Rust types that correspond to exactly one memory tag
pub trait TaggedValue: Copy + Default + Sized {
    const TAG: Tag;

    /// Extract the value if the cell carries this type's tag
    fn from_cell(cell: Cell) -> Option<Self>;

    /// Wrap the value in a cell
    fn into_cell(self) -> Cell;
}

macro_rules! tagged_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl TaggedValue for $ty {
                const TAG: Tag = Tag::$variant;

                fn from_cell(cell: Cell) -> Option<Self> {
                    match cell {
                        Cell::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                fn into_cell(self) -> Cell {
                    Cell::$variant(self)
                }
            }

            impl From<$ty> for Cell {
                fn from(value: $ty) -> Self {
                    Cell::$variant(value)
                }
            }
        )*
    };
}

tagged_value! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    Fr => Field,
}
