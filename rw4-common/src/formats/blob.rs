//! Opaque byte sections
//!
//! Sections the codec does not interpret are carried as raw bytes. A blob
//! whose role is known (texture pixels, vertex format, ...) may be moved by
//! the packer. An unreferenced blob is pinned to the position it was read
//! from: its contents may hold absolute offsets.

use std::io::Write;

use crate::error::Result;
use crate::formats::object::{Codec, Decoder, Encoder};
use crate::formats::section::SectionEntry;
use crate::formats::type_code;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobKind {
    /// Not reached from any decoded object
    Unreferenced,
    /// Concatenated mip levels of a [`crate::Texture`]
    TextureData,
    VertexFormat,
    Animations,
    ModelHandles,
}

impl BlobKind {
    pub fn is_relocatable(self) -> bool {
        !matches!(self, Self::Unreferenced)
    }

    pub fn from_type_code(code: u32) -> Self {
        match code {
            type_code::TEXTURE_DATA => Self::TextureData,
            type_code::VERTEX_FORMAT => Self::VertexFormat,
            type_code::ANIMATIONS => Self::Animations,
            type_code::MODEL_HANDLES => Self::ModelHandles,
            _ => Self::Unreferenced,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub kind: BlobKind,
    pub data: Vec<u8>,
    /// Absolute position an unreferenced blob must be written back to
    pub required_position: Option<u32>,
}

impl Blob {
    /// New relocatable blob
    pub fn new(kind: BlobKind, data: Vec<u8>) -> Self {
        Self {
            kind,
            data,
            required_position: None,
        }
    }

    pub(crate) fn decode_kind(
        d: &mut Decoder<'_>,
        entry: &SectionEntry,
        kind: BlobKind,
    ) -> Result<Self> {
        let required_position = (!kind.is_relocatable()).then_some(d.position() as u32);
        let data = d.read_bytes(entry.size as usize)?;
        Ok(Self {
            kind,
            data,
            required_position,
        })
    }
}

impl Codec for Blob {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        Self::decode_kind(d, entry, BlobKind::from_type_code(entry.type_code))
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        if let Some(position) = self.required_position
            && e.position() != u64::from(position)
        {
            return Err(e.error_value("BL001", format!("0x{position:x}")));
        }
        e.write_bytes(&self.data)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(self.data.len() as u32)
    }
}
