//! Typed VM memory
//!
//! This module provides:
//! - Tagged cells (field elements and unsigned integers of 8 to 128 bits)
//! - A sparse, 32-bit addressed memory that checks the tag on every read
//! - Range checking for slice accesses

pub mod cell;
pub mod tagged;

pub use cell::{field_to_hex, Cell, Tag, TaggedValue};
pub use tagged::{MemoryError, TaggedMemory, MEMORY_SIZE};
