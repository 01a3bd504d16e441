//! Material and mesh/material binding
//!
//! ```text
//! Material (0x7000b, 32 bytes)
//!   0x400000, 0x63ffb0, section_start + 24, 0x400000,
//!   names_section (HierarchyInfo with one item), 1, tex_section, 0
//!
//! MeshMaterialAssignment (0x2001a)
//!   mesh_section, count, count x tex_metadata_section
//! ```

use std::io::Write;

use crate::error::Result;
use crate::formats::mesh::Mesh;
use crate::formats::object::{Codec, Decoder, Encoder, ObjectLookup};
use crate::formats::section::{SectionEntry, SectionKey};
use crate::formats::skeleton::HierarchyInfo;
use crate::formats::texture::TexMetadata;
use crate::formats::type_code;

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub unk1: u32,
    /// [`HierarchyInfo`] naming the material
    pub names: SectionKey,
    /// [`TexMetadata`] section
    pub tex: SectionKey,
}

impl Material {
    pub const SIZE: u32 = 32;
    /// The only `unk1` value the decoder accepts
    pub const UNK1: u32 = 0x63ffb0;

    pub fn new(names: SectionKey, tex: SectionKey) -> Self {
        Self {
            unk1: Self::UNK1,
            names,
            tex,
        }
    }
}

impl Codec for Material {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::MATERIAL {
            return Err(d.error_value("MT000", format!("0x{:x}", entry.type_code)));
        }
        d.expect(0x400000, "MT001")?;
        d.expect(Self::UNK1, "MT002")?;
        let inner = d.position() as u32 + 16;
        d.expect(inner, "MT003")?;
        d.expect(0x400000, "MT004")?;
        let names_section = d.read_i32()?;
        d.expect(1, "MT005")?;
        let tex_section = d.read_i32()?;
        d.expect(0, "MT006")?;

        let names = d.object::<HierarchyInfo>(names_section)?;
        let tex = d.object::<TexMetadata>(tex_section)?;

        let count = d.lookup::<HierarchyInfo>(names)?.items.len();
        if count != 1 {
            return Err(d.error_value("MT100", count));
        }
        Ok(Self {
            unk1: Self::UNK1,
            names,
            tex,
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let names = e.number(self.names)?;
        let tex = e.number(self.tex)?;
        e.write_u32(0x400000)?;
        e.write_u32(self.unk1)?;
        let inner = e.position() as u32 + 16;
        e.write_u32(inner)?;
        e.write_u32(0x400000)?;
        e.write_u32(names)?;
        e.write_u32(1)?;
        e.write_u32(tex)?;
        e.write_u32(0)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(Self::SIZE)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshMaterialAssignment {
    /// [`Mesh`] section
    pub mesh: SectionKey,
    /// [`TexMetadata`] sections; always one in known files
    pub materials: Vec<SectionKey>,
}

impl Codec for MeshMaterialAssignment {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        let mesh_section = d.read_i32()?;
        let count = d.read_u32()?;
        d.expect_room(4 * u64::from(count), entry.end(), "MA001")?;
        let mut sections = Vec::with_capacity(count as usize);
        for _ in 0..count {
            sections.push(d.read_i32()?);
        }

        let mesh = d.object::<Mesh>(mesh_section)?;
        let materials = sections
            .into_iter()
            .map(|s| d.object::<TexMetadata>(s))
            .collect::<Result<_>>()?;
        Ok(Self { mesh, materials })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let mesh = e.number(self.mesh)?;
        let materials = self
            .materials
            .iter()
            .map(|&key| e.number(key))
            .collect::<Result<Vec<_>>>()?;
        e.write_u32(mesh)?;
        e.write_u32(materials.len() as u32)?;
        e.write_u32s(&materials)
    }

    fn computed_size(&self) -> Option<u32> {
        Some(8 + 4 * self.materials.len() as u32)
    }
}
