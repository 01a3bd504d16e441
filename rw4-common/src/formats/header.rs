//! RW4 file header, type-code table and section index
//!
//! # Layout
//! ```text
//! 0x00: magic [u8; 28]          "\x89RW4w32\0\r\n\x1a\n\0 \x04\0454\0000\0\0\0\0\0"
//! 0x1C: file_type u32           1 = model, 0x04000000 = texture
//! 0x20: section_count u32 (twice)
//! 0x28: file_type_const u32     16 for models, 4 for textures
//! 0x2C: 0 u32
//! 0x30: section_index_begin u32
//! 0x34: header_sections_begin u32   (0x98)
//! 0x38: 0, 0, 0
//! 0x44: section_index_end u32
//! 0x48: file_type_const u32
//! 0x4C: file_end - section_index_end u32
//! 0x50: 4, 0, 1, 0, 1
//! 0x64: unknown_bits_030 u32
//! 0x68: 4, 0, 1, 0, 1
//! 0x7C: 0, 1, 0, 0, 0, 0, 0
//! 0x98: header sub-structures 0x10004 .. 0x10008, including the type-code table
//! ...   sections, section index, fixup table, raw-data sections
//! ```
//!
//! The sub-structures at 0x98 are undocumented; every field is checked
//! against the constant it always holds and written back the same way.

use std::io::Write;

use hashbrown::HashMap;
use tracing::debug;

use crate::error::Result;
use crate::formats::section::SectionEntry;
use crate::stream::{Rw4Reader, Rw4Writer};

pub const MAGIC: [u8; 28] = [
    137, 82, 87, 52, 119, 51, 50, 0, 13, 10, 26, 10, 0, 32, 4, 0, 52, 53, 52, 0, 48, 48, 48, 0, 0,
    0, 0, 0,
];

/// Type codes pinned to the first slots of the type-code table
pub const FIXED_SECTION_TYPES: [u32; 5] = [0, 0x10030, 0x10031, 0x10032, 0x10010];

/// Offset of the first header sub-structure
pub const HEADER_SECTIONS_BEGIN: u32 = 0x98;

/// Kind of RW4 file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    Model,
    Texture,
}

impl FileType {
    pub fn code(self) -> u32 {
        match self {
            Self::Model => 1,
            Self::Texture => 0x0400_0000,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Model),
            0x0400_0000 => Some(Self::Texture),
            _ => None,
        }
    }

    /// Constant stored twice in the header, depends on the file type
    fn header_const(self) -> u32 {
        match self {
            Self::Model => 16,
            Self::Texture => 4,
        }
    }
}

/// Section index entries with their opaque fixup offsets
#[derive(Clone, Debug, Default)]
pub struct SectionTable {
    pub entries: Vec<SectionEntry>,
    /// Fixup offsets per section, parallel to `entries`
    pub fixups: Vec<Vec<u32>>,
}

impl SectionTable {
    pub fn fixup_count(&self) -> usize {
        self.fixups.iter().map(Vec::len).sum()
    }
}

/// Header fields that are not derived from the section layout
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub file_type: FileType,
    pub unknown_bits_030: u32,
    pub section_index_begin: u32,
    /// Zero bytes between the fixup table and the raw-data region
    pub section_index_padding: u32,
}

impl Header {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            ..Self::default()
        }
    }

    pub fn section_index_end(&self, section_count: usize, fixup_count: usize) -> u32 {
        self.section_index_begin
            + SectionEntry::SIZE * section_count as u32
            + 8 * fixup_count as u32
            + self.section_index_padding
    }

    /// First byte after the header sub-structures
    pub fn header_end(type_count: usize) -> u32 {
        HEADER_SECTIONS_BEGIN + 116 + 4 * type_count as u32
    }

    pub fn read(r: &mut Rw4Reader<'_>) -> Result<(Self, SectionTable)> {
        let magic = r.read_bytes(MAGIC.len())?;
        if magic != MAGIC {
            return Err(r.error_value("H000", "not an RW4 file"));
        }

        let file_type_code = r.read_u32()?;
        let file_type =
            FileType::from_code(file_type_code).ok_or_else(|| r.error_value("H005", file_type_code))?;
        let ft_const = file_type.header_const();

        let section_count = r.read_u32()?;
        r.expect(section_count, "H001")?;
        r.expect(ft_const, "H002")?;
        r.expect(0, "H003")?;

        let section_index_begin = r.read_u32()?;
        let header_sections_begin = r.read_u32()?;
        r.expect_all(&[0, 0, 0], "H010")?;
        let section_index_end = r.read_u32()?;
        r.expect(ft_const, "H011")?;
        let file_size = u64::from(r.read_u32()?) + u64::from(section_index_end);
        if r.len() != file_size {
            return Err(r.error_value("H012", file_size));
        }

        r.expect_all(&[4, 0, 1, 0, 1], "H020")?;
        let unknown_bits_030 = r.read_u32()?;
        r.expect_all(&[4, 0, 1, 0, 1], "H040")?;
        r.expect_all(&[0, 1, 0, 0, 0, 0, 0], "H041")?;
        if r.position() != u64::from(HEADER_SECTIONS_BEGIN) {
            return Err(r.error_value("H099", r.position()));
        }

        r.seek(u64::from(header_sections_begin));
        r.expect(0x10004, "H140")?;
        let mut offsets = [0u64; 6];
        for offset in &mut offsets {
            *offset = u64::from(r.read_u32()?) + u64::from(header_sections_begin);
        }

        if offsets[2] != r.position() {
            return Err(r.error_value("H145", r.position()));
        }
        r.expect(0x10005, "H150")?;
        let type_count = r.read_u32()?;
        r.expect(12, "H151")?;
        let mut section_types = Vec::new();
        for _ in 0..type_count {
            section_types.push(r.read_u32()?);
        }

        if offsets[3] != r.position() {
            return Err(r.error_value("H146", r.position()));
        }
        r.expect(0x10006, "H160")?;
        r.expect_all(
            &[3, 0x18, file_type_code, 0xffb0_0000, file_type_code, 0, 0, 0],
            "H161",
        )?;

        if offsets[4] != r.position() {
            return Err(r.error_value("H147", r.position()));
        }
        r.expect(0x10007, "H170")?;
        let fixup_count = r.read_u32()?;
        r.expect(0, "H171")?;
        r.expect(0, "H172")?;
        let index_entries_end = section_index_begin.wrapping_add(section_count.wrapping_mul(24));
        r.expect(
            index_entries_end.wrapping_add(fixup_count.wrapping_mul(8)),
            "H173",
        )?;
        r.expect(index_entries_end, "H174")?;
        r.expect(fixup_count, "H176")?;

        if offsets[5] != r.position() {
            return Err(r.error_value("H148", r.position()));
        }
        r.expect(0x10008, "H180")?;
        r.expect_all(&[0, 0], "H181")?;

        r.seek(u64::from(section_index_begin));
        let mut table = SectionTable::default();
        for number in 0..section_count {
            table
                .entries
                .push(SectionEntry::read(r, number, section_index_end)?);
            table.fixups.push(Vec::new());
        }
        for _ in 0..fixup_count {
            let section = r.read_u32()?;
            let offset = r.read_u32()?;
            table
                .fixups
                .get_mut(section as usize)
                .ok_or_else(|| r.error_value("H202", section))?
                .push(offset);
        }

        let padding = i64::from(section_index_end) - r.position() as i64;
        r.read_padding(padding)?;

        let mut used = vec![false; section_types.len()];
        for entry in &table.entries {
            let index = entry.type_code_index as usize;
            if section_types.get(index) != Some(&entry.type_code) {
                return Err(r.error_value("H300", entry.type_code_index));
            }
            used[index] = true;
        }
        for (i, fixed) in FIXED_SECTION_TYPES.iter().enumerate() {
            if section_types.get(i) != Some(fixed) {
                return Err(r.error_value("H301", i));
            }
        }
        for (i, &code) in section_types.iter().enumerate().skip(FIXED_SECTION_TYPES.len()) {
            if !used[i] {
                return Err(r.error_value("H302", format!("0x{code:x}")));
            }
        }

        debug!(
            ?file_type,
            sections = section_count,
            fixups = fixup_count,
            "read RW4 header"
        );

        let header = Self {
            file_type,
            unknown_bits_030,
            section_index_begin,
            section_index_padding: padding as u32,
        };
        Ok((header, table))
    }

    /// Write everything up to [`Header::header_end`]
    pub fn write<W: Write>(
        &self,
        w: &mut Rw4Writer<W>,
        table: &SectionTable,
        section_types: &[u32],
    ) -> Result<()> {
        let file_type_code = self.file_type.code();
        let ft_const = self.file_type.header_const();
        let section_count = table.entries.len() as u32;
        let fixup_count = table.fixup_count() as u32;
        let index_end = self.section_index_end(table.entries.len(), table.fixup_count());

        w.write_bytes(&MAGIC)?;
        w.write_u32(file_type_code)?;
        w.write_u32(section_count)?;
        w.write_u32(section_count)?;
        w.write_u32(ft_const)?;
        w.write_u32(0)?;

        w.write_u32(self.section_index_begin)?;
        w.write_u32(HEADER_SECTIONS_BEGIN)?;
        w.write_u32s(&[0, 0, 0])?;
        w.write_u32(index_end)?;
        w.write_u32(ft_const)?;

        let file_end = table
            .entries
            .iter()
            .map(|e| e.position + e.size)
            .fold(index_end, u32::max);
        w.write_u32(file_end - index_end)?;

        w.write_u32s(&[4, 0, 1, 0, 1])?;
        w.write_u32(self.unknown_bits_030)?;
        w.write_u32s(&[4, 0, 1, 0, 1])?;
        w.write_u32s(&[0, 1, 0, 0, 0, 0, 0])?;

        if w.position() != u64::from(HEADER_SECTIONS_BEGIN) {
            return Err(w.error_value("WH099", w.position()));
        }

        w.write_u32(0x10004)?;
        let mut offsets = [4, 8, 16, 12 + 4 * section_types.len() as u32, 36, 28];
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }
        w.write_u32s(&offsets)?;

        w.write_u32(0x10005)?;
        w.write_u32(section_types.len() as u32)?;
        w.write_u32(12)?;
        w.write_u32s(section_types)?;

        w.write_u32(0x10006)?;
        w.write_u32s(&[3, 0x18, file_type_code, 0xffb0_0000, file_type_code, 0, 0, 0])?;

        w.write_u32(0x10007)?;
        w.write_u32(fixup_count)?;
        w.write_u32(0)?;
        w.write_u32(0)?;
        w.write_u32(self.section_index_begin + section_count * 24 + fixup_count * 8)?;
        w.write_u32(self.section_index_begin + section_count * 24)?;
        w.write_u32(fixup_count)?;

        w.write_u32(0x10008)?;
        w.write_u32s(&[0, 0])
    }

    /// Write the section index and fixup table at `section_index_begin`
    pub fn write_index<W: Write>(&self, w: &mut Rw4Writer<W>, table: &SectionTable) -> Result<()> {
        if w.position() != u64::from(self.section_index_begin) {
            return Err(w.error_value("WH200", w.position()));
        }
        let index_end = self.section_index_end(table.entries.len(), table.fixup_count());
        for entry in &table.entries {
            entry.write(w, index_end)?;
        }
        for (entry, fixups) in table.entries.iter().zip(&table.fixups) {
            for &offset in fixups {
                w.write_u32(entry.number)?;
                w.write_u32(offset)?;
            }
        }
        w.pad_to(u64::from(index_end))?;
        if w.position() != u64::from(index_end) {
            return Err(w.error_value("WH299", w.position()));
        }
        Ok(())
    }
}

/// Rebuild the type-code table: fixed codes first, then each new code in
/// section order. Updates every entry's `type_code_index`.
pub fn build_type_table(entries: &mut [SectionEntry]) -> Vec<u32> {
    let mut slots: HashMap<u32, u32> = FIXED_SECTION_TYPES
        .iter()
        .enumerate()
        .map(|(i, &code)| (code, i as u32))
        .collect();
    let mut table = FIXED_SECTION_TYPES.to_vec();
    for entry in entries.iter_mut() {
        entry.type_code_index = *slots.entry(entry.type_code).or_insert_with(|| {
            table.push(entry.type_code);
            table.len() as u32 - 1
        });
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_file(file_type: FileType) -> Vec<u8> {
        let mut header = Header::new(file_type);
        let table = SectionTable::default();
        let types = FIXED_SECTION_TYPES.to_vec();
        header.section_index_begin = Header::header_end(types.len());
        let mut w = Rw4Writer::new(Vec::new());
        header.write(&mut w, &table, &types).unwrap();
        header.write_index(&mut w, &table).unwrap();
        w.into_inner()
    }

    #[test]
    fn test_header_end_matches_written_header() {
        let bytes = empty_file(FileType::Model);
        assert_eq!(bytes.len() as u32, Header::header_end(FIXED_SECTION_TYPES.len()));
    }

    #[test]
    fn test_empty_header_roundtrip() {
        for file_type in [FileType::Model, FileType::Texture] {
            let bytes = empty_file(file_type);
            let mut r = Rw4Reader::new(&bytes);
            let (header, table) = Header::read(&mut r).unwrap();
            assert_eq!(header.file_type, file_type);
            assert!(table.entries.is_empty());
            assert_eq!(header.section_index_padding, 0);
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = empty_file(FileType::Model);
        bytes[1] = b'X';
        let mut r = Rw4Reader::new(&bytes);
        assert_eq!(Header::read(&mut r).unwrap_err().code(), "H000");
    }

    #[test]
    fn test_unknown_file_type() {
        let mut bytes = empty_file(FileType::Model);
        bytes[0x1C] = 7;
        let mut r = Rw4Reader::new(&bytes);
        assert_eq!(Header::read(&mut r).unwrap_err().code(), "H005");
    }

    #[test]
    fn test_section_count_must_repeat() {
        let mut bytes = empty_file(FileType::Model);
        bytes[0x24] = 1;
        let mut r = Rw4Reader::new(&bytes);
        assert_eq!(Header::read(&mut r).unwrap_err().code(), "H001");
    }

    #[test]
    fn test_file_size_checked() {
        let mut bytes = empty_file(FileType::Texture);
        bytes.push(0);
        let mut r = Rw4Reader::new(&bytes);
        assert_eq!(Header::read(&mut r).unwrap_err().code(), "H012");
    }

    #[test]
    fn test_type_table_first_seen_order() {
        let mut entries = vec![
            SectionEntry {
                type_code: 0x70001,
                ..Default::default()
            },
            SectionEntry {
                type_code: 0x10030,
                ..Default::default()
            },
            SectionEntry {
                type_code: 0x20004,
                ..Default::default()
            },
            SectionEntry {
                type_code: 0x70001,
                ..Default::default()
            },
        ];
        let table = build_type_table(&mut entries);
        assert_eq!(&table[..5], &FIXED_SECTION_TYPES);
        assert_eq!(&table[5..], &[0x70001, 0x20004]);
        let indices: Vec<u32> = entries.iter().map(|e| e.type_code_index).collect();
        assert_eq!(indices, vec![5, 1, 6, 5]);
    }
}
