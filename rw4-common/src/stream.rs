//! Little-endian stream helpers
//!
//! [`Rw4Reader`] reads from an in-memory file with random access (sections
//! are decoded out of order). [`Rw4Writer`] is strictly sequential and
//! tracks its own position, so any `Write` sink works.
//!
//! Both carry the two checks used everywhere in the format: `expect` for
//! fields with a fixed value and zero-only padding.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Reader over a complete RW4 file
pub struct Rw4Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Rw4Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn seek(&mut self, position: u64) {
        self.cursor.set_position(position);
    }

    /// Total length of the underlying data
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    /// Fail with `code` unless `bytes` more bytes lie between the current
    /// position and `end` (clamped to the data). Checked before any
    /// count-sized allocation.
    pub fn expect_room(&self, bytes: u64, end: u64, code: &'static str) -> Result<()> {
        let end = end.min(self.len());
        if self.position().saturating_add(bytes) > end {
            return Err(self.error_value(code, bytes));
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.cursor.read_i32::<LittleEndian>()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.cursor.read_u16::<LittleEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.cursor.read_f32::<LittleEndian>()?)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if count as u64 > self.remaining() {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        let mut bytes = vec![0u8; count];
        self.cursor.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a u32 that must hold `value`
    pub fn expect(&mut self, value: u32, code: &'static str) -> Result<()> {
        let actual = self.read_u32()?;
        if actual != value {
            return Err(self.error_value(code, actual));
        }
        Ok(())
    }

    pub fn expect_all(&mut self, values: &[u32], code: &'static str) -> Result<()> {
        for &value in values {
            self.expect(value, code)?;
        }
        Ok(())
    }

    /// Skip `pad` bytes that must all be zero
    pub fn read_padding(&mut self, pad: i64) -> Result<()> {
        if pad < 0 {
            return Err(self.error_value("PAD001", pad));
        }
        for _ in 0..pad {
            if self.cursor.read_u8()? != 0 {
                return Err(self.error("PAD002"));
            }
        }
        Ok(())
    }

    /// Format error at the current position
    pub fn error(&self, code: &'static str) -> Error {
        Error::format(code, self.position())
    }

    pub fn error_value(&self, code: &'static str, value: impl std::fmt::Display) -> Error {
        Error::format_value(code, self.position(), value)
    }
}

/// Sequential writer that knows its absolute file position
pub struct Rw4Writer<W: Write> {
    writer: W,
    position: u64,
}

impl<W: Write> Rw4Writer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_u32s(&mut self, values: &[u32]) -> Result<()> {
        for &value in values {
            self.write_u32(value)?;
        }
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<LittleEndian>(value)?;
        self.position += 2;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.writer.write_f32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Emit `pad` zero bytes
    pub fn write_padding(&mut self, pad: i64) -> Result<()> {
        if pad < 0 {
            return Err(self.error_value("PAD001", pad));
        }
        const ZEROS: [u8; 64] = [0; 64];
        let mut left = pad as usize;
        while left > 0 {
            let n = left.min(ZEROS.len());
            self.write_bytes(&ZEROS[..n])?;
            left -= n;
        }
        Ok(())
    }

    /// Zero-pad up to an absolute position
    pub fn pad_to(&mut self, position: u64) -> Result<()> {
        self.write_padding(position as i64 - self.position as i64)
    }

    pub fn error(&self, code: &'static str) -> Error {
        Error::format(code, self.position)
    }

    pub fn error_value(&self, code: &'static str, value: impl std::fmt::Display) -> Error {
        Error::format_value(code, self.position, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_tracks_position() {
        let mut w = Rw4Writer::new(Vec::new());
        w.write_u32(1).unwrap();
        w.write_u16(2).unwrap();
        w.pad_to(16).unwrap();
        w.write_f32(1.5).unwrap();
        assert_eq!(w.position(), 20);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[0..6], &[1, 0, 0, 0, 2, 0]);
        assert!(bytes[6..16].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_negative_padding_rejected() {
        let mut w = Rw4Writer::new(Vec::new());
        w.write_u32(0).unwrap();
        let err = w.pad_to(2).unwrap_err();
        assert_eq!(err.code(), "PAD001");
    }

    #[test]
    fn test_oversized_reads_fail_before_allocating() {
        let data = [0u8; 8];
        let mut r = Rw4Reader::new(&data);
        r.read_u32().unwrap();
        assert_eq!(r.remaining(), 4);
        assert_eq!(r.read_bytes(usize::MAX).unwrap_err().code(), "EOF");
        r.expect_room(4, 100, "HI013").unwrap();
        assert_eq!(r.expect_room(5, 100, "HI013").unwrap_err().code(), "HI013");
        assert_eq!(r.expect_room(4, 6, "HI013").unwrap_err().code(), "HI013");
        assert_eq!(r.expect_room(u64::MAX, 100, "HI013").unwrap_err().code(), "HI013");
    }

    #[test]
    fn test_expect_reports_value_and_offset() {
        let data = [8u8, 0, 0, 0, 9, 0, 0, 0];
        let mut r = Rw4Reader::new(&data);
        r.expect(8, "TA002").unwrap();
        let err = r.expect(8, "TA002").unwrap_err();
        match err {
            Error::Format(e) => {
                assert_eq!(e.code, "TA002");
                assert_eq!(e.offset, 8);
                assert_eq!(e.value.as_deref(), Some("9"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_padding_rejected() {
        let data = [0u8, 0, 1, 0];
        let mut r = Rw4Reader::new(&data);
        r.read_padding(2).unwrap();
        assert_eq!(r.read_padding(2).unwrap_err().code(), "PAD002");
    }

    #[test]
    fn test_truncated_read_is_eof() {
        let data = [1u8, 2];
        let mut r = Rw4Reader::new(&data);
        assert_eq!(r.read_u32().unwrap_err().code(), "EOF");
    }
}
