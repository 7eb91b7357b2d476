//! Tagged memory
//!
//! A sparse map from 32-bit offsets to tagged cells. Each execution context
//! owns exactly one instance.

use crate::memory::cell::{Cell, Tag, TaggedValue};
use std::collections::HashMap;
use thiserror::Error;

/// Number of addressable cells (offsets are 32-bit)
pub const MEMORY_SIZE: u64 = 1 << 32;

/// Memory access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Tag mismatch at offset {offset}: expected {expected}, found {found}")]
    TagMismatch { offset: u32, expected: Tag, found: Tag },
    #[error("Address overflow: offset {offset} + length {length} exceeds the 32-bit address space")]
    AddressOverflow { offset: u32, length: u64 },
}

/// Typed VM memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedMemory {
    /// Written cells; anything absent reads as `Cell::default()`
    cells: HashMap<u32, Cell>,
}

impl TaggedMemory {
    /// Create an empty memory
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// Number of cells written so far
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Tag of the cell at `offset` (unwritten cells report the default tag)
    pub fn tag_at(&self, offset: u32) -> Tag {
        self.cell(offset).tag()
    }

    /// Read one cell, checking its tag
    pub fn get(&self, offset: u32, expected: Tag) -> Result<Cell, MemoryError> {
        let cell = self.cell(offset);
        if cell.tag() != expected {
            return Err(MemoryError::TagMismatch {
                offset,
                expected,
                found: cell.tag(),
            });
        }
        Ok(cell)
    }

    /// Overwrite one cell, whatever it held before
    pub fn set(&mut self, offset: u32, cell: Cell) {
        self.cells.insert(offset, cell);
    }

    /// Read `length` consecutive cells, all of which must carry `expected`
    pub fn get_slice(&self, offset: u32, length: u32, expected: Tag) -> Result<Vec<Cell>, MemoryError> {
        Self::check_range(offset, u64::from(length))?;
        let mut cells = Vec::new();
        for i in 0..length {
            cells.push(self.get(offset + i, expected)?);
        }
        Ok(cells)
    }

    /// Write consecutive cells starting at `offset`.
    ///
    /// The range is validated first, so either every cell is written or none.
    pub fn set_slice(&mut self, offset: u32, values: &[Cell]) -> Result<(), MemoryError> {
        Self::check_range(offset, values.len() as u64)?;
        for (i, cell) in values.iter().enumerate() {
            self.cells.insert(offset + i as u32, *cell);
        }
        Ok(())
    }

    /// Read a value of a statically known tag
    pub fn read<T: TaggedValue>(&self, offset: u32) -> Result<T, MemoryError> {
        let cell = self.get(offset, T::TAG)?;
        T::from_cell(cell).ok_or(MemoryError::TagMismatch {
            offset,
            expected: T::TAG,
            found: cell.tag(),
        })
    }

    /// Write a value of a statically known tag
    pub fn write<T: TaggedValue>(&mut self, offset: u32, value: T) {
        self.set(offset, value.into_cell());
    }

    /// Read `length` consecutive values of one tag
    pub fn read_slice<T: TaggedValue>(&self, offset: u32, length: u32) -> Result<Vec<T>, MemoryError> {
        Self::check_range(offset, u64::from(length))?;
        let mut values = Vec::new();
        for i in 0..length {
            values.push(self.read(offset + i)?);
        }
        Ok(values)
    }

    /// Read a fixed number of consecutive values of one tag
    pub fn read_array<T: TaggedValue, const N: usize>(&self, offset: u32) -> Result<[T; N], MemoryError> {
        Self::check_range(offset, N as u64)?;
        let mut values = [T::default(); N];
        for (i, slot) in values.iter_mut().enumerate() {
            *slot = self.read(offset + i as u32)?;
        }
        Ok(values)
    }

    /// Write consecutive values of one tag
    pub fn write_slice<T: TaggedValue>(&mut self, offset: u32, values: &[T]) -> Result<(), MemoryError> {
        Self::check_range(offset, values.len() as u64)?;
        for (i, value) in values.iter().enumerate() {
            self.write(offset + i as u32, *value);
        }
        Ok(())
    }

    fn cell(&self, offset: u32) -> Cell {
        self.cells.get(&offset).copied().unwrap_or_default()
    }

    /// `[offset, offset + length)` must fit in the address space
    fn check_range(offset: u32, length: u64) -> Result<(), MemoryError> {
        match u64::from(offset).checked_add(length) {
            Some(end) if end <= MEMORY_SIZE => Ok(()),
            _ => Err(MemoryError::AddressOverflow { offset, length }),
        }
    }
}
