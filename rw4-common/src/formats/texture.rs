//! Texture header and material texture metadata
//!
//! ```text
//! Texture (0x20003, 32 bytes)
//!   texture_type (fourcc), 8, unk1, width u16, height u16, mipmap_info, 0, 0,
//!   data_section (TextureData blob: mip levels back to back)
//!
//! TexMetadata (0x2000b)
//!   opaque bytes (size - 148), texture_section, 36 x i32
//! ```

use std::io::Write;

use crate::error::Result;
use crate::formats::blob::BlobKind;
use crate::formats::object::{Codec, Decoder, Encoder};
use crate::formats::section::{SectionEntry, SectionKey};
use crate::formats::type_code;

/// `DXT5` fourcc
pub const DXT5: u32 = 0x35545844;

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub texture_type: u32,
    pub unk1: u32,
    pub width: u16,
    pub height: u16,
    /// `0x100 * mip_levels + 8`
    pub mipmap_info: u32,
    /// TextureData blob section
    pub data: SectionKey,
}

impl Texture {
    pub const SIZE: u32 = 32;

    pub fn mip_levels(&self) -> u32 {
        self.mipmap_info / 0x100
    }

    /// Byte size of DXT5 mip level `level`
    pub fn dxt5_level_size(width: u32, height: u32, level: u32) -> u32 {
        (width >> level).max(4) * (height >> level).max(4)
    }
}

impl Codec for Texture {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::TEXTURE {
            return Err(d.error_value("T000", format!("0x{:x}", entry.type_code)));
        }
        let texture_type = d.read_u32()?;
        d.expect(8, "T001")?;
        let unk1 = d.read_u32()?;
        let width = d.read_u16()?;
        let height = d.read_u16()?;
        let mipmap_info = d.read_u32()?;
        d.expect(0, "T002")?;
        d.expect(0, "T003")?;
        let section = d.read_i32()?;

        let data = d.blob(section, BlobKind::TextureData)?;
        Ok(Self {
            texture_type,
            unk1,
            width,
            height,
            mipmap_info,
            data,
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let data = e.number(self.data)?;
        e.write_u32(self.texture_type)?;
        e.write_u32(8)?;
        e.write_u32(self.unk1)?;
        e.write_u16(self.width)?;
        e.write_u16(self.height)?;
        e.write_u32(self.mipmap_info)?;
        e.write_u32(0)?;
        e.write_u32(0)?;
        e.write_u32(data)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}

/// Material texture binding. Nearly constant across files, so most of it
/// is carried as opaque data.
#[derive(Clone, Debug, PartialEq)]
pub struct TexMetadata {
    pub texture: SectionKey,
    pub unk_data_1: Vec<u8>,
    pub unk_data_2: [i32; 36],
}

impl TexMetadata {
    const TAIL_SIZE: u32 = 4 + 36 * 4;
}

impl Codec for TexMetadata {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::TEX_METADATA {
            return Err(d.error_value("TM000", format!("0x{:x}", entry.type_code)));
        }
        let lead = i64::from(entry.size) - i64::from(Self::TAIL_SIZE);
        if lead < 0 {
            return Err(d.error_value("TM001", lead));
        }
        let unk_data_1 = d.read_bytes(lead as usize)?;
        let section = d.read_i32()?;
        let mut unk_data_2 = [0i32; 36];
        for v in &mut unk_data_2 {
            *v = d.read_i32()?;
        }

        let texture = d.object::<Texture>(section)?;
        Ok(Self {
            texture,
            unk_data_1,
            unk_data_2,
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let texture = e.number(self.texture)?;
        e.write_bytes(&self.unk_data_1)?;
        e.write_u32(texture)?;
        for &v in &self.unk_data_2 {
            e.write_i32(v)?;
        }
        Ok(())
    }

    fn computed_size(&self) -> Option<u32> {
        Some(self.unk_data_1.len() as u32 + Self::TAIL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dxt5_level_sizes() {
        assert_eq!(Texture::dxt5_level_size(64, 64, 0), 4096);
        assert_eq!(Texture::dxt5_level_size(64, 64, 3), 64);
        // clamped to one 4x4 block edge
        assert_eq!(Texture::dxt5_level_size(64, 64, 5), 16);
        assert_eq!(Texture::dxt5_level_size(64, 64, 6), 16);
        assert_eq!(Texture::dxt5_level_size(128, 32, 4), 8 * 4);
    }

    #[test]
    fn test_fourcc() {
        assert_eq!(&DXT5.to_le_bytes(), b"DXT5");
    }
}
