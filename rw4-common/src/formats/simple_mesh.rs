//! Low-detail self-contained mesh (type 0x80003)
//!
//! ```text
//! bbox (32 bytes)
//! 0xd59208, unk1, triangle_count, 0, vertex_count
//! p2, p1, p4, p3
//! padding to p1 (16-aligned)
//! p1: vertices, 16 bytes each (xyz f32, 0)
//! p2: triangles, 16 bytes each (i, j, k u32, 0)
//! p3: 4-bit flags, 8 per u32; unused trailing nibbles are 0xF
//! padding to p4 = p3 + ((triangle_count / 2 + 15) & !15)
//! p1 - 32, aux_count, triangle_count, 0
//! bbox again (bitwise identical)
//! aux_count * 8 u32
//! ```
//!
//! Every offset is absolute, so the encoded size depends on where the
//! section lands and [`Codec::computed_size`] is unknown.

use std::io::Write;

use crate::error::Result;
use crate::formats::mesh::BBox;
use crate::formats::object::{Codec, Decoder, Encoder};
use crate::formats::section::SectionEntry;

const MAGIC: u32 = 0xd59208;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimpleTriangle {
    pub indices: [u32; 3],
    /// Low nibble only
    pub flags: u8,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimpleMesh {
    pub bbox: BBox,
    pub unk1: u32,
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<SimpleTriangle>,
    /// Eight words per record
    pub aux: Vec<u32>,
}

fn align16(v: u64) -> u64 {
    (v + 15) & !15
}

fn flags_size(triangle_count: u64) -> u64 {
    align16(triangle_count / 2)
}

impl Codec for SimpleMesh {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        let bbox = BBox::read(d)?;
        d.expect(MAGIC, "SM001")?;
        let unk1 = d.read_u32()?;
        let triangle_count = d.read_u32()?;
        d.expect(0, "SM002")?;
        let vertex_count = d.read_u32()?;

        let p2 = u64::from(d.read_u32()?);
        let p1 = u64::from(d.read_u32()?);
        let p4 = u64::from(d.read_u32()?);
        let p3 = u64::from(d.read_u32()?);

        if p1 != align16(d.position()) {
            return Err(d.error_value("SM010", p1));
        }
        let pad = p1 as i64 - d.position() as i64;
        d.read_padding(pad)?;

        let (tc, vc) = (u64::from(triangle_count), u64::from(vertex_count));
        if p2 != p1 + vc * 16 {
            return Err(d.error("SM101"));
        }
        if p3 != p2 + tc * 16 {
            return Err(d.error("SM102"));
        }
        if p4 != p3 + flags_size(tc) {
            return Err(d.error("SM103"));
        }
        d.expect_room(p4 - p1, entry.end(), "SM104")?;

        let mut vertices = Vec::with_capacity(vertex_count as usize);
        for _ in 0..vertex_count {
            let v = [d.read_f32()?, d.read_f32()?, d.read_f32()?];
            d.expect(0, "4V001")?;
            vertices.push(v);
        }

        let mut triangles = Vec::with_capacity(triangle_count as usize);
        for t in 0..triangle_count {
            let mut indices = [0u32; 3];
            for index in &mut indices {
                *index = d.read_u32()?;
                if *index >= vertex_count {
                    return Err(d.error_value("SM200", t));
                }
            }
            d.expect(0, "SM201")?;
            triangles.push(SimpleTriangle { indices, flags: 0 });
        }

        let mut word = 0u32;
        for (t, triangle) in triangles.iter_mut().enumerate() {
            if t % 8 == 0 {
                word = d.read_u32()?;
            }
            triangle.flags = ((word >> ((t % 8) * 4)) & 0xf) as u8;
        }
        let padded = (triangles.len() + 7) & !7;
        for t in triangles.len()..padded {
            if (word >> ((t % 8) * 4)) & 0xf != 0xf {
                return Err(d.error_value("SM210", t));
            }
        }
        let pad = p4 as i64 - d.position() as i64;
        d.read_padding(pad)?;

        d.expect((p1 as u32).wrapping_sub(32), "SM301")?;
        let aux_count = d.read_u32()?;
        d.expect(triangle_count, "SM302")?;
        d.expect(0, "SM303")?;

        let bbox2 = BBox::read(d)?;
        if !bbox.is_identical(&bbox2) {
            return Err(d.error("SM310"));
        }

        d.expect_room(u64::from(aux_count) * 32, entry.end(), "SM311")?;
        let mut aux = Vec::with_capacity(aux_count as usize * 8);
        for _ in 0..u64::from(aux_count) * 8 {
            aux.push(d.read_u32()?);
        }

        Ok(Self {
            bbox,
            unk1,
            vertices,
            triangles,
            aux,
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let tc = self.triangles.len() as u64;
        let vc = self.vertices.len() as u64;

        self.bbox.write(e)?;
        e.write_u32(MAGIC)?;
        e.write_u32(self.unk1)?;
        e.write_u32(tc as u32)?;
        e.write_u32(0)?;
        e.write_u32(vc as u32)?;

        let p1 = align16(e.position() + 16);
        let p2 = p1 + vc * 16;
        let p3 = p2 + tc * 16;
        let p4 = p3 + flags_size(tc);
        e.write_u32s(&[p2 as u32, p1 as u32, p4 as u32, p3 as u32])?;
        e.pad_to(p1)?;

        for v in &self.vertices {
            for &c in v {
                e.write_f32(c)?;
            }
            e.write_u32(0)?;
        }
        for triangle in &self.triangles {
            e.write_u32s(&triangle.indices)?;
            e.write_u32(0)?;
        }

        for chunk in self.triangles.chunks(8) {
            let mut word = 0u32;
            for t in 0..8 {
                let nibble = chunk.get(t).map_or(0xf, |tri| u32::from(tri.flags & 0xf));
                word |= nibble << (t * 4);
            }
            e.write_u32(word)?;
        }
        e.pad_to(p4)?;

        e.write_u32((p1 as u32).wrapping_sub(32))?;
        e.write_u32((self.aux.len() / 8) as u32)?;
        e.write_u32(tc as u32)?;
        e.write_u32(0)?;
        self.bbox.write(e)?;
        e.write_u32s(&self.aux)
    }

    fn computed_size(&self) -> Option<u32> {
        None
    }
}
