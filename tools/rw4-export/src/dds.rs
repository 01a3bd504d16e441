//! DDS textures (DXT5 only)
//!
//! ```text
//! 0x00: "DDS " magic
//! 0x04: header size (124), flags, height, width, pitch/linear size, depth,
//!       mip count, 11 reserved words
//! 0x4C: pixel format: size (32), flags (4 = fourcc), fourcc, bit count,
//!       r/g/b/a masks
//! 0x6C: caps, caps2, caps3, caps4, reserved
//! 0x80: mip levels, largest first
//! ```

use std::io::Write;

use rw4_common::stream::{Rw4Reader, Rw4Writer};
use rw4_common::{DXT5, Result, Texture};

/// `"DDS "`
pub const DDS_MAGIC: u32 = 0x2053_4444;
const HEADER_SIZE: u32 = 0x7C;
/// caps | height | width | pixel format | mip count | linear size
const HEADER_FLAGS: u32 = 0xA1007;
const PIXEL_FORMAT_SIZE: u32 = 32;
const PF_FOURCC: u32 = 4;
/// Deepest mip chain a 16-bit texture can have
const MAX_MIP_LEVELS: u32 = 16;

/// A compressed image with its full mip chain
#[derive(Debug, Clone, PartialEq)]
pub struct DdsImage {
    pub width: u32,
    pub height: u32,
    pub fourcc: u32,
    pub mip_count: u32,
    /// All mip levels back to back
    pub data: Vec<u8>,
}

impl DdsImage {
    /// Total byte size of a DXT5 mip chain
    pub fn dxt5_size(width: u32, height: u32, mip_count: u32) -> usize {
        (0..mip_count)
            .map(|level| Texture::dxt5_level_size(width, height, level) as usize)
            .sum()
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut r = Rw4Reader::new(bytes);
        r.expect(DDS_MAGIC, "DDS000")?;
        let header_size = r.read_u32()?;
        if header_size < HEADER_SIZE {
            return Err(r.error_value("DDS001", header_size));
        }
        let _flags = r.read_u32()?;
        let height = r.read_u32()?;
        let width = r.read_u32()?;
        let _linear_size = r.read_u32()?;
        r.expect(0, "DDS002")?;
        // A missing mip count means the top level only
        let mip_count = r.read_u32()?.max(1);
        if mip_count > MAX_MIP_LEVELS {
            return Err(r.error_value("DDS003", mip_count));
        }
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(r.error_value("DDS004", format!("{width}x{height}")));
        }

        r.seek(r.position() + 11 * 4);
        let pf_size = r.read_u32()?;
        if pf_size < PIXEL_FORMAT_SIZE {
            return Err(r.error_value("DDS011", pf_size));
        }
        let pf_flags = r.read_u32()?;
        if pf_flags & PF_FOURCC == 0 {
            return Err(r.error_value("DDS012", format!("0x{pf_flags:x}")));
        }
        let fourcc = r.read_u32()?;
        if fourcc != DXT5 {
            return Err(r.error_value("DDS013", format!("0x{fourcc:08x}")));
        }

        r.seek(u64::from(header_size) + 4);
        let data = r.read_bytes(Self::dxt5_size(width, height, mip_count))?;
        Ok(Self {
            width,
            height,
            fourcc,
            mip_count,
            data,
        })
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<W> {
        let mut w = Rw4Writer::new(writer);
        w.write_u32s(&[
            DDS_MAGIC,
            HEADER_SIZE,
            HEADER_FLAGS,
            self.height,
            self.width,
            // top level size, exact for DXT5 above 4x4
            self.height.wrapping_mul(self.width),
            0,
            self.mip_count,
        ])?;
        w.write_u32s(&[0; 11])?;
        w.write_u32s(&[
            PIXEL_FORMAT_SIZE,
            PF_FOURCC,
            self.fourcc,
            32,
            0x00ff_0000,
            0x0000_ff00,
            0x0000_00ff,
            0xff00_0000,
        ])?;
        w.write_u32s(&[0; 5])?;
        w.write_bytes(&self.data)?;
        Ok(w.into_inner())
    }

    /// Image stored by a texture section and its data blob
    pub fn from_texture(texture: &Texture, data: &[u8]) -> Self {
        Self {
            width: u32::from(texture.width),
            height: u32::from(texture.height),
            fourcc: texture.texture_type,
            mip_count: texture.mip_levels(),
            data: data.to_vec(),
        }
    }

    /// `0x100` per mip level plus the constant 8
    pub fn mipmap_info(&self) -> u32 {
        0x100 * self.mip_count + 8
    }
}
