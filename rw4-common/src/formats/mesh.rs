//! Mesh, vertex/triangle arrays and the bounding box
//!
//! # Layouts
//! ```text
//! TriangleArray (0x20007, 28 bytes)
//!   unk1, 0, index_count, 8, 101, 4, buffer_section
//!
//! VertexArray (0x20005, 28 bytes)
//!   format_section, unk2, 0, vertex_count, 8, vertex_size (36), buffer_section
//!
//! Mesh (0x20009, 40 bytes)
//!   40, 4, triangle_array_section, triangle_count, 1, 0, triangle_count * 3, 0,
//!   vertex_count, vertex_array_section (0x400000 = none)
//!
//! BBox (0x80005, 32 bytes)
//!   min xyz f32, unk1, max xyz f32, unk2
//! ```

use std::io::Write;

use crate::error::Result;
use crate::formats::blob::BlobKind;
use crate::formats::buffer::{Buffer, Record, Triangle, Vertex};
use crate::formats::object::{Codec, Decoder, Encoder, ObjectLookup};
use crate::formats::section::{SectionEntry, SectionKey};
use crate::formats::type_code;
use crate::stream::{Rw4Reader, Rw4Writer};

/// Stored in place of a vertex array section number when a mesh has none
pub const NO_SECTION: u32 = 0x400000;

// ============================================================================
// TriangleArray
// ============================================================================

/// Wrapper around a triangle buffer
#[derive(Clone, Debug, PartialEq)]
pub struct TriangleArray {
    pub unk1: u32,
    /// [`Buffer<Triangle>`] section
    pub triangles: SectionKey,
}

impl TriangleArray {
    pub const SIZE: u32 = 28;

    pub fn new(triangles: SectionKey) -> Self {
        Self { unk1: 0, triangles }
    }

    pub fn triangle_count(&self, objects: &impl ObjectLookup) -> Result<u32> {
        Ok(objects.lookup::<Buffer<Triangle>>(self.triangles)?.len() as u32)
    }
}

impl Codec for TriangleArray {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::TRIANGLE_ARRAY {
            return Err(d.error_value("TA000", format!("0x{:x}", entry.type_code)));
        }
        let unk1 = d.read_u32()?;
        d.expect(0, "TA001")?;
        let index_count = d.read_u32()?;
        d.expect(8, "TA002")?;
        d.expect(101, "TA003")?;
        d.expect(4, "TA004")?;
        let section = d.read_i32()?;
        if index_count % 3 != 0 {
            return Err(d.error_value("TA010", index_count));
        }
        let triangles = d.buffer::<Triangle>(section, index_count / 3)?;
        Ok(Self { unk1, triangles })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let count = self.triangle_count(&*e)?;
        let section = e.number(self.triangles)?;
        e.write_u32(self.unk1)?;
        e.write_u32(0)?;
        e.write_u32(count * 3)?;
        e.write_u32s(&[8, 101, 4])?;
        e.write_u32(section)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}

// ============================================================================
// VertexArray
// ============================================================================

/// Vertex buffer plus its (opaque) vertex format
#[derive(Clone, Debug, PartialEq)]
pub struct VertexArray {
    /// Vertex format blob section
    pub format: SectionKey,
    pub unk2: u32,
    /// [`Buffer<Vertex>`] section
    pub vertices: SectionKey,
}

impl VertexArray {
    pub const SIZE: u32 = 28;

    pub fn new(format: SectionKey, vertices: SectionKey) -> Self {
        Self {
            format,
            unk2: 0,
            vertices,
        }
    }

    pub fn vertex_count(&self, objects: &impl ObjectLookup) -> Result<u32> {
        Ok(objects.lookup::<Buffer<Vertex>>(self.vertices)?.len() as u32)
    }
}

impl Codec for VertexArray {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::VERTEX_ARRAY {
            return Err(d.error_value("VA000", format!("0x{:x}", entry.type_code)));
        }
        let format_section = d.read_i32()?;
        let unk2 = d.read_u32()?;
        d.expect(0, "VA001")?;
        let vertex_count = d.read_u32()?;
        d.expect(8, "VA002")?;
        let vertex_size = d.read_u32()?;
        if vertex_size != Vertex::SIZE {
            return Err(d.error_value("VA100", vertex_size));
        }
        let section = d.read_i32()?;

        let vertices = d.buffer::<Vertex>(section, vertex_count)?;

        let format_entry = d.entry(format_section)?;
        if format_entry.type_code != type_code::VERTEX_FORMAT {
            return Err(d.error_value("VA101", format!("0x{:x}", format_entry.type_code)));
        }
        let format = d.blob(format_section, BlobKind::VertexFormat)?;

        Ok(Self {
            format,
            unk2,
            vertices,
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let count = self.vertex_count(&*e)?;
        let format = e.number(self.format)?;
        let vertices = e.number(self.vertices)?;
        e.write_u32(format)?;
        e.write_u32(self.unk2)?;
        e.write_u32(0)?;
        e.write_u32(count)?;
        e.write_u32(8)?;
        e.write_u32(Vertex::SIZE)?;
        e.write_u32(vertices)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// A triangle list over an optional vertex array
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    /// [`TriangleArray`] section
    pub triangles: SectionKey,
    /// [`VertexArray`] section
    pub vertices: Option<SectionKey>,
    /// Vertex count of a mesh without a vertex array; unused otherwise
    pub vertex_count: u32,
}

impl Mesh {
    pub const SIZE: u32 = 40;

    pub fn new(triangles: SectionKey, vertices: SectionKey) -> Self {
        Self {
            triangles,
            vertices: Some(vertices),
            vertex_count: 0,
        }
    }

    pub fn triangle_count(&self, objects: &impl ObjectLookup) -> Result<u32> {
        objects
            .lookup::<TriangleArray>(self.triangles)?
            .triangle_count(objects)
    }

    pub fn vertex_count(&self, objects: &impl ObjectLookup) -> Result<u32> {
        match self.vertices {
            Some(key) => objects.lookup::<VertexArray>(key)?.vertex_count(objects),
            None => Ok(self.vertex_count),
        }
    }
}

impl Codec for Mesh {
    fn decode(d: &mut Decoder<'_>, _entry: &SectionEntry) -> Result<Self> {
        d.expect(40, "ME001")?;
        d.expect(4, "ME002")?;
        let triangle_section = d.read_i32()?;
        let triangle_count = d.read_u32()?;
        d.expect(1, "ME003")?;
        d.expect(0, "ME004")?;
        d.expect(triangle_count.wrapping_mul(3), "ME005")?;
        d.expect(0, "ME006")?;
        let vertex_count = d.read_u32()?;
        let vertex_section = d.read_i32()?;

        let triangles = d.object::<TriangleArray>(triangle_section)?;
        let mut mesh = Self {
            triangles,
            vertices: None,
            vertex_count,
        };
        let actual = mesh.triangle_count(&*d)?;
        if actual != triangle_count {
            return Err(d.error_value("ME100", format!("{triangle_count} != {actual}")));
        }

        if vertex_section as u32 != NO_SECTION {
            mesh.vertices = Some(d.object::<VertexArray>(vertex_section)?);
            let actual = mesh.vertex_count(&*d)?;
            if actual != vertex_count {
                return Err(d.error_value("ME200", format!("{vertex_count} != {actual}")));
            }
            mesh.vertex_count = 0;
        }
        Ok(mesh)
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let triangle_count = self.triangle_count(&*e)?;
        let vertex_count = self.vertex_count(&*e)?;
        let triangles = e.number(self.triangles)?;
        let vertices = match self.vertices {
            Some(key) => e.number(key)?,
            None => NO_SECTION,
        };
        e.write_u32(40)?;
        e.write_u32(4)?;
        e.write_u32(triangles)?;
        e.write_u32(triangle_count)?;
        e.write_u32(1)?;
        e.write_u32(0)?;
        e.write_u32(triangle_count * 3)?;
        e.write_u32(0)?;
        e.write_u32(vertex_count)?;
        e.write_u32(vertices)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}

// ============================================================================
// BBox
// ============================================================================

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub min: [f32; 3],
    pub unk1: u32,
    pub max: [f32; 3],
    pub unk2: u32,
}

impl BBox {
    pub const SIZE: u32 = 32;

    pub fn read(r: &mut Rw4Reader<'_>) -> Result<Self> {
        let min = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let unk1 = r.read_u32()?;
        let max = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let unk2 = r.read_u32()?;
        if (0..3).any(|i| min[i] > max[i]) {
            return Err(r.error("BBOX011"));
        }
        Ok(Self {
            min,
            unk1,
            max,
            unk2,
        })
    }

    pub fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()> {
        for c in self.min {
            w.write_f32(c)?;
        }
        w.write_u32(self.unk1)?;
        for c in self.max {
            w.write_f32(c)?;
        }
        w.write_u32(self.unk2)
    }

    /// Bitwise equality, including the unknown words
    pub fn is_identical(&self, other: &BBox) -> bool {
        self.min.map(f32::to_bits) == other.min.map(f32::to_bits)
            && self.max.map(f32::to_bits) == other.max.map(f32::to_bits)
            && self.unk1 == other.unk1
            && self.unk2 == other.unk2
    }
}

impl Codec for BBox {
    fn decode(d: &mut Decoder<'_>, _entry: &SectionEntry) -> Result<Self> {
        BBox::read(d)
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        self.write(e)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_rejects_inverted_bounds() {
        let bbox = BBox {
            min: [0.0, 2.0, 0.0],
            max: [1.0, 1.0, 1.0],
            ..Default::default()
        };
        let mut w = Rw4Writer::new(Vec::new());
        bbox.write(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut r = Rw4Reader::new(&bytes);
        assert_eq!(BBox::read(&mut r).unwrap_err().code(), "BBOX011");
    }

    #[test]
    fn test_bbox_identical() {
        let a = BBox {
            min: [-1.0, -1.0, -1.0],
            unk1: 7,
            max: [1.0, 1.0, 1.0],
            unk2: 0,
        };
        let mut b = a;
        assert!(a.is_identical(&b));
        b.unk2 = 1;
        assert!(!a.is_identical(&b));
    }
}
