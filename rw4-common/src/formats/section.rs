//! Section handles and the 24-byte section index entry
//!
//! # Layout
//! ```text
//! 0x00: position u32    (raw-data sections: biased by -section_index_end)
//! 0x04: reserved u32    (always 0, H201)
//! 0x08: size u32
//! 0x0C: alignment u32
//! 0x10: type_code_index u32   (index into the header's type-code table)
//! 0x14: type_code u32
//! ```

use std::fmt;
use std::io::Write;

use crate::error::Result;
use crate::formats::type_code;
use crate::stream::{Rw4Reader, Rw4Writer};

/// Stable handle to a section of a [`crate::Model`].
///
/// Unlike the section number, a key survives insertions and removals of
/// other sections. Right after a read, key `n` is section number `n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey(pub(crate) u32);

impl SectionKey {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the section index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionEntry {
    pub number: u32,
    /// Absolute file position (bias already removed)
    pub position: u32,
    pub size: u32,
    pub alignment: u32,
    pub type_code_index: u32,
    pub type_code: u32,
}

impl SectionEntry {
    pub const SIZE: u32 = 24;

    /// Whether the section lives in the raw-data region after the index
    pub fn is_raw_data(&self) -> bool {
        self.type_code == type_code::BUFFER
    }

    pub fn end(&self) -> u64 {
        self.position as u64 + self.size as u64
    }

    pub fn read(r: &mut Rw4Reader<'_>, number: u32, index_end: u32) -> Result<Self> {
        let position = r.read_u32()?;
        r.expect(0, "H201")?;
        let size = r.read_u32()?;
        let alignment = r.read_u32()?;
        let type_code_index = r.read_u32()?;
        let type_code = r.read_u32()?;
        let mut entry = Self {
            number,
            position,
            size,
            alignment,
            type_code_index,
            type_code,
        };
        if entry.is_raw_data() {
            entry.position = entry.position.wrapping_add(index_end);
        }
        Ok(entry)
    }

    pub fn write<W: Write>(&self, w: &mut Rw4Writer<W>, index_end: u32) -> Result<()> {
        let position = if self.is_raw_data() {
            self.position.wrapping_sub(index_end)
        } else {
            self.position
        };
        w.write_u32(position)?;
        w.write_u32(0)?;
        w.write_u32(self.size)?;
        w.write_u32(self.alignment)?;
        w.write_u32(self.type_code_index)?;
        w.write_u32(self.type_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_data_position_is_biased() {
        let entry = SectionEntry {
            number: 0,
            position: 0x400,
            size: 0x20,
            alignment: 0x10,
            type_code_index: 1,
            type_code: type_code::BUFFER,
        };
        let mut w = Rw4Writer::new(Vec::new());
        entry.write(&mut w, 0x300).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), SectionEntry::SIZE as usize);
        assert_eq!(&bytes[0..4], &0x100u32.to_le_bytes());

        let mut r = Rw4Reader::new(&bytes);
        let back = SectionEntry::read(&mut r, 0, 0x300).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_reserved_field_checked() {
        let mut bytes = vec![0u8; 24];
        bytes[4] = 1;
        let mut r = Rw4Reader::new(&bytes);
        assert_eq!(SectionEntry::read(&mut r, 0, 0).unwrap_err().code(), "H201");
    }
}
