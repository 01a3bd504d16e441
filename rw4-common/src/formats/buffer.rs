//! Fixed-size records and the two containers that hold them
//!
//! [`Buffer`] is a raw-data section (type 0x10030) holding nothing but
//! `count × record`; its owner stores the count. [`Matrices`] is a
//! count-prefixed array with a 16-byte header:
//!
//! ```text
//! 0x00: p1 u32      absolute position of the first record (= section start + 16)
//! 0x04: count u32
//! 0x08: 0 u32
//! 0x0C: 0 u32
//! 0x10: records
//! ```

use std::io::Write;

use crate::error::Result;
use crate::formats::object::{Codec, Decoder, Encoder};
use crate::formats::section::SectionEntry;
use crate::formats::type_code;
use crate::stream::{Rw4Reader, Rw4Writer};

/// A record with a fixed on-disk size
pub trait Record: Sized + Clone {
    const SIZE: u32;

    fn read(r: &mut Rw4Reader<'_>) -> Result<Self>;
    fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()>;
}

// ============================================================================
// Vertex
// ============================================================================

/// 36-byte skinned vertex
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Three bytes, see [`Vertex::pack_normal`]
    pub normal: u32,
    pub tangent: u32,
    pub uv: [f32; 2],
    /// Up to four joint indices, one per byte
    pub bone_indices: u32,
    /// Weights matching `bone_indices`, 0..=255; 0 marks an unused slot
    pub bone_weights: u32,
}

impl Vertex {
    /// Pack a unit vector into three bytes (x | y << 8 | z << 16)
    pub fn pack_normal(v: [f32; 3]) -> u32 {
        let byte = |c: f32| (c * 127.5 + 127.5) as u8 as u32;
        byte(v[0]) | (byte(v[1]) << 8) | (byte(v[2]) << 16)
    }

    pub fn unpack_normal(packed: u32) -> [f32; 3] {
        let component = |dim: u32| (((packed >> (dim * 8)) & 0xff) as f32 - 127.5) / 127.5;
        [component(0), component(1), component(2)]
    }

    /// `(joint, weight)` pairs with a nonzero weight
    pub fn bone_assignments(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (0..4).filter_map(move |i| {
            let index = (self.bone_indices >> (i * 8)) as u8;
            let weight = (self.bone_weights >> (i * 8)) as u8;
            (weight != 0).then_some((index, weight))
        })
    }

    /// Pack up to four assignments; extra pairs are dropped
    pub fn set_bone_assignments(&mut self, assignments: &[(u8, u8)]) {
        self.bone_indices = 0;
        self.bone_weights = 0;
        for (i, &(index, weight)) in assignments.iter().take(4).enumerate() {
            self.bone_indices |= u32::from(index) << (i * 8);
            self.bone_weights |= u32::from(weight) << (i * 8);
        }
    }
}

impl Record for Vertex {
    const SIZE: u32 = 36;

    fn read(r: &mut Rw4Reader<'_>) -> Result<Self> {
        Ok(Self {
            position: [r.read_f32()?, r.read_f32()?, r.read_f32()?],
            normal: r.read_u32()?,
            tangent: r.read_u32()?,
            uv: [r.read_f32()?, r.read_f32()?],
            bone_indices: r.read_u32()?,
            bone_weights: r.read_u32()?,
        })
    }

    fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()> {
        for c in self.position {
            w.write_f32(c)?;
        }
        w.write_u32(self.normal)?;
        w.write_u32(self.tangent)?;
        w.write_f32(self.uv[0])?;
        w.write_f32(self.uv[1])?;
        w.write_u32(self.bone_indices)?;
        w.write_u32(self.bone_weights)
    }
}

/// Triangle of 16-bit vertex indices
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [u16; 3],
}

impl Triangle {
    pub fn new(i: u16, j: u16, k: u16) -> Self {
        Self { indices: [i, j, k] }
    }
}

impl Record for Triangle {
    const SIZE: u32 = 6;

    fn read(r: &mut Rw4Reader<'_>) -> Result<Self> {
        Ok(Self::new(r.read_u16()?, r.read_u16()?, r.read_u16()?))
    }

    fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()> {
        for i in self.indices {
            w.write_u16(i)?;
        }
        Ok(())
    }
}

/// 4x4 float matrix, column-major as stored
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4x4 {
    pub m: [f32; 16],
}

impl Default for Mat4x4 {
    fn default() -> Self {
        Self {
            m: [
                1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
            ],
        }
    }
}

/// 3 rows of 4 floats
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4x3 {
    pub m: [f32; 12],
}

impl Default for Mat4x3 {
    fn default() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }
}

fn read_floats<const N: usize>(r: &mut Rw4Reader<'_>) -> Result<[f32; N]> {
    let mut m = [0.0; N];
    for v in &mut m {
        *v = r.read_f32()?;
    }
    Ok(m)
}

impl Record for Mat4x4 {
    const SIZE: u32 = 64;

    fn read(r: &mut Rw4Reader<'_>) -> Result<Self> {
        Ok(Self {
            m: read_floats(r)?,
        })
    }

    fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()> {
        self.m.iter().try_for_each(|&v| w.write_f32(v))
    }
}

impl Record for Mat4x3 {
    const SIZE: u32 = 48;

    fn read(r: &mut Rw4Reader<'_>) -> Result<Self> {
        Ok(Self {
            m: read_floats(r)?,
        })
    }

    fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()> {
        self.m.iter().try_for_each(|&v| w.write_f32(v))
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Raw-data section of records
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Buffer<T> {
    pub items: Vec<T>,
}

impl<T> Buffer<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Record> Codec for Buffer<T> {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::BUFFER {
            return Err(d.error_value("VB000", format!("0x{:x}", entry.type_code)));
        }
        if entry.size % T::SIZE != 0 {
            return Err(d.error_value("VB001", entry.size));
        }
        d.expect_room(u64::from(entry.size), entry.end(), "VB003")?;
        let count = entry.size / T::SIZE;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(T::read(d)?);
        }
        Ok(Self { items })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        self.items.iter().try_for_each(|item| item.write(e))
    }

    fn computed_size(&self) -> Option<u32> {
        Some(T::SIZE * self.items.len() as u32)
    }
}

/// Count-prefixed record array with a self-referencing header
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matrices<T> {
    pub items: Vec<T>,
}

impl<T> Matrices<T> {
    pub const HEADER_SIZE: u32 = 16;

    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T: Record> Codec for Matrices<T> {
    fn decode(d: &mut Decoder<'_>, _entry: &SectionEntry) -> Result<Self> {
        let p1 = d.read_u32()?;
        let count = d.read_u32()?;
        d.expect(0, "MS001")?;
        d.expect(0, "MS002")?;
        if u64::from(p1) != d.position() {
            return Err(d.error_value("MS010", p1));
        }
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(T::read(d)?);
        }
        Ok(Self { items })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let p1 = e.position() as u32 + Self::HEADER_SIZE;
        e.write_u32(p1)?;
        e.write_u32(self.items.len() as u32)?;
        e.write_u32(0)?;
        e.write_u32(0)?;
        self.items.iter().try_for_each(|item| item.write(e))
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::HEADER_SIZE + T::SIZE * self.items.len() as u32)
    }
}
