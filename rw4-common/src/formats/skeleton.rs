//! Joint hierarchy and skeleton
//!
//! ```text
//! HierarchyInfo (0x70002, 24 + 12n bytes)
//!   p2 = p1 + 4n, p3 = p1 + 8n, p1 = section_start + 24, n, id, n
//!   p1: n name hashes, p2: n flag words, p3: n parent indices (-1 = root)
//!   the three arrays must fit in the section (HI013)
//!
//! Skeleton (0x7000c, 20 bytes)
//!   0x400000, 0x8d6da0, mat4x3_section, hierarchy_section, mat4x4_section
//! ```

use std::io::Write;

use crate::error::Result;
use crate::formats::buffer::{Mat4x3, Mat4x4, Matrices};
use crate::formats::object::{Codec, Decoder, Encoder};
use crate::formats::section::{SectionEntry, SectionKey};
use crate::formats::type_code;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Joint {
    /// FNV hash of the joint name
    pub name_fnv: u32,
    /// Small flag word, 0..=3 in known files
    pub flags: u32,
    /// Index of the parent joint within the same hierarchy
    pub parent: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HierarchyInfo {
    /// Referenced by [`crate::Anim::skeleton_id`]
    pub id: u32,
    pub items: Vec<Joint>,
}

impl HierarchyInfo {
    const HEADER_SIZE: u32 = 24;
}

impl Codec for HierarchyInfo {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::HIERARCHY_INFO {
            return Err(d.error_value("HI000", format!("0x{:x}", entry.type_code)));
        }
        let p2 = u64::from(d.read_u32()?);
        let p3 = u64::from(d.read_u32()?);
        let p1 = u64::from(d.read_u32()?);
        let count = d.read_u32()?;
        let id = d.read_u32()?;
        d.expect(count, "HI001")?;

        let n = u64::from(count);
        if p1 != d.position() {
            return Err(d.error_value("HI010", p1));
        }
        if p2 != p1 + 4 * n {
            return Err(d.error_value("HI011", p2));
        }
        if p3 != p1 + 8 * n {
            return Err(d.error_value("HI012", p3));
        }
        d.expect_room(12 * n, entry.end(), "HI013")?;

        let mut items = vec![Joint::default(); count as usize];
        for joint in &mut items {
            joint.name_fnv = d.read_u32()?;
        }
        for joint in &mut items {
            joint.flags = d.read_u32()?;
        }
        let len = items.len();
        for joint in &mut items {
            joint.parent = match d.read_i32()? {
                -1 => None,
                p if p >= 0 && (p as usize) < len => Some(p as usize),
                p => return Err(d.error_value("HI020", p)),
            };
        }
        Ok(Self { id, items })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let n = self.items.len() as u32;
        let p1 = e.position() as u32 + Self::HEADER_SIZE;
        e.write_u32s(&[p1 + 4 * n, p1 + 8 * n, p1, n, self.id, n])?;
        for joint in &self.items {
            e.write_u32(joint.name_fnv)?;
        }
        for joint in &self.items {
            e.write_u32(joint.flags)?;
        }
        for joint in &self.items {
            e.write_i32(joint.parent.map_or(-1, |p| p as i32))?;
        }
        Ok(())
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::HEADER_SIZE + 12 * self.items.len() as u32)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    pub unk1: u32,
    /// [`Matrices<Mat4x3>`]: inverse bind pose per joint
    pub mat3: SectionKey,
    /// [`HierarchyInfo`] section
    pub joints: SectionKey,
    /// [`Matrices<Mat4x4>`] section
    pub mat4: SectionKey,
}

impl Skeleton {
    pub const SIZE: u32 = 20;
    /// The only `unk1` value the decoder accepts
    pub const UNK1: u32 = 0x8d6da0;

    pub fn new(mat3: SectionKey, joints: SectionKey, mat4: SectionKey) -> Self {
        Self {
            unk1: Self::UNK1,
            mat3,
            joints,
            mat4,
        }
    }
}

impl Codec for Skeleton {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::SKELETON {
            return Err(d.error_value("SK000", format!("0x{:x}", entry.type_code)));
        }
        d.expect(0x400000, "SK001")?;
        d.expect(Self::UNK1, "SK002")?;
        let mat3_section = d.read_i32()?;
        let joints_section = d.read_i32()?;
        let mat4_section = d.read_i32()?;

        let mat3 = d.object::<Matrices<Mat4x3>>(mat3_section)?;
        let joints = d.object::<HierarchyInfo>(joints_section)?;
        let mat4 = d.object::<Matrices<Mat4x4>>(mat4_section)?;
        Ok(Self {
            unk1: Self::UNK1,
            mat3,
            joints,
            mat4,
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let mat3 = e.number(self.mat3)?;
        let joints = e.number(self.joints)?;
        let mat4 = e.number(self.mat4)?;
        e.write_u32s(&[0x400000, self.unk1, mat3, joints, mat4])
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}
