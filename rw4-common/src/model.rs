//! Section arena, model read/write and the packing algorithm
//!
//! A [`Model`] owns every section. Sections are addressed by a stable
//! [`SectionKey`]; their on-disk number is their index in the current order
//! and is kept dense (`0..len`) across inserts and removals.
//!
//! Writing always packs first:
//! 1. every payload with a known size overrides the section's size
//! 2. non raw-data sections are laid out after the header in section order,
//!    each aligned; the end becomes the section index start
//! 3. raw-data sections are laid out after the section index and fixups,
//!    again in section order
//!
//! Relative order within each region is insertion order, never re-sorted.

use std::io::Write;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::formats::blob::BlobKind;
use crate::formats::header::{Header, SectionTable, build_type_table};
use crate::formats::object::{Decoder, Encoder, ObjectKind, ObjectLookup, Rw4Object};
use crate::formats::section::{SectionEntry, SectionKey};
use crate::formats::simple_mesh::SimpleMesh;
use crate::formats::{
    Anim, BBox, FileType, HierarchyInfo, Material, Mesh, MeshMaterialAssignment, Skeleton,
    Texture, type_code,
};
use crate::stream::{Rw4Reader, Rw4Writer};

/// Alignment given to sections created with [`Model::add_object`]
pub const DEFAULT_ALIGNMENT: u32 = 0x10;

/// One section: layout metadata plus its payload
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub(crate) number: u32,
    pub position: u32,
    pub size: u32,
    pub alignment: u32,
    pub type_code: u32,
    pub type_code_index: u32,
    /// Opaque loader fixups, carried through unmodified
    pub fixup_offsets: Vec<u32>,
    pub object: Rw4Object,
}

impl Section {
    fn new(number: u32, object: Rw4Object, type_code: u32) -> Self {
        Self {
            number,
            position: 0,
            size: 0,
            alignment: DEFAULT_ALIGNMENT,
            type_code,
            type_code_index: 0,
            fixup_offsets: Vec::new(),
            object,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn end(&self) -> u64 {
        u64::from(self.position) + u64::from(self.size)
    }

    pub fn is_raw_data(&self) -> bool {
        self.type_code == type_code::BUFFER
    }

    fn entry(&self) -> SectionEntry {
        SectionEntry {
            number: self.number,
            position: self.position,
            size: self.size,
            alignment: self.alignment,
            type_code_index: self.type_code_index,
            type_code: self.type_code,
        }
    }
}

/// Options for [`Model::read_with`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Decode 0x80003 sections as [`SimpleMesh`] instead of keeping them as
    /// opaque blobs
    pub decode_simple_meshes: bool,
}

/// An RW4 file in memory
#[derive(Clone, Debug, Default)]
pub struct Model {
    header: Header,
    /// Indexed by key; `None` once removed
    slots: Vec<Option<Section>>,
    /// Keys in section-number order
    order: Vec<SectionKey>,
}

fn align(position: u32, alignment: u32) -> u32 {
    let a = alignment.max(1);
    (position + a - 1) & !(a - 1)
}

impl Model {
    /// Empty model of the given file type
    pub fn new(file_type: FileType) -> Self {
        Self {
            header: Header::new(file_type),
            ..Self::default()
        }
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_with(data, ReadOptions::default())
    }

    /// Parse a whole file. Known top-level types are decoded in section
    /// order (pulling in whatever they reference); every section still
    /// undecoded afterwards is kept as a pinned opaque blob.
    pub fn read_with(data: &[u8], options: ReadOptions) -> Result<Self> {
        let mut r = Rw4Reader::new(data);
        let (header, table) = Header::read(&mut r)?;

        let mut d = Decoder::new(r, &table.entries);
        for entry in &table.entries {
            let n = entry.number as i32;
            match entry.type_code {
                type_code::MESH => d.object::<Mesh>(n)?,
                type_code::MATERIAL => d.object::<Material>(n)?,
                type_code::SKELETON => d.object::<Skeleton>(n)?,
                type_code::TEXTURE => d.object::<Texture>(n)?,
                type_code::HIERARCHY_INFO => d.object::<HierarchyInfo>(n)?,
                type_code::MESH_MATERIAL_ASSIGNMENT => d.object::<MeshMaterialAssignment>(n)?,
                type_code::BBOX => d.object::<BBox>(n)?,
                type_code::ANIM => d.object::<Anim>(n)?,
                type_code::MODEL_HANDLES => d.blob(n, BlobKind::ModelHandles)?,
                type_code::ANIMATIONS => d.blob(n, BlobKind::Animations)?,
                type_code::SIMPLE_MESH if options.decode_simple_meshes => {
                    d.object::<SimpleMesh>(n)?
                }
                _ => continue,
            };
        }

        let mut unreferenced = 0;
        for entry in &table.entries {
            if d.is_undecoded(entry.number as usize) {
                d.blob(entry.number as i32, BlobKind::Unreferenced)?;
                unreferenced += 1;
            }
        }

        let objects = d.into_objects();
        let mut slots = Vec::with_capacity(objects.len());
        for ((entry, fixups), object) in table.entries.iter().zip(table.fixups).zip(objects) {
            let object = object
                .ok_or_else(|| Error::format_value("S006", u64::from(entry.position), entry.number))?;
            slots.push(Some(Section {
                number: entry.number,
                position: entry.position,
                size: entry.size,
                alignment: entry.alignment,
                type_code: entry.type_code,
                type_code_index: entry.type_code_index,
                fixup_offsets: fixups,
                object,
            }));
        }

        debug!(
            file_type = ?header.file_type,
            sections = slots.len(),
            unreferenced,
            "read model"
        );

        let order = (0..slots.len() as u32).map(SectionKey).collect();
        Ok(Self {
            header,
            slots,
            order,
        })
    }

    /// Pack, then emit the whole file. On error the sink holds a partial,
    /// invalid file.
    pub fn write<W: Write>(&mut self, writer: W) -> Result<W> {
        let types = self.pack();
        let table = self.section_table();
        let index_end = u64::from(
            self.header
                .section_index_end(table.entries.len(), table.fixup_count()),
        );

        let mut w = Rw4Writer::new(writer);
        self.header.write(&mut w, &table, &types)?;

        let mut by_position: Vec<&Section> = self.sections().map(|(_, s)| s).collect();
        by_position.sort_by_key(|s| s.position);

        let mut e = Encoder::new(w, &self.slots);
        let mut wrote_index = false;
        for section in by_position {
            if !wrote_index && u64::from(section.position) >= index_end {
                self.write_index(&mut e, &table)?;
                wrote_index = true;
            }
            e.pad_to(u64::from(section.position))?;
            section.object.encode(&mut e)?;
            if e.position() != section.end() {
                return Err(e.error_value("S003", section.number));
            }
            trace!(
                section = section.number,
                kind = section.object.name(),
                position = section.position,
                size = section.size,
                "wrote section"
            );
        }
        if !wrote_index {
            self.write_index(&mut e, &table)?;
        }
        Ok(e.into_inner().into_inner())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.write(Vec::new())
    }

    fn write_index<W: Write>(&self, e: &mut Encoder<'_, W>, table: &SectionTable) -> Result<()> {
        e.pad_to(u64::from(self.header.section_index_begin))?;
        self.header.write_index(e, table)
    }

    fn section_table(&self) -> SectionTable {
        let (entries, fixups) = self
            .sections()
            .map(|(_, s)| (s.entry(), s.fixup_offsets.clone()))
            .unzip();
        SectionTable { entries, fixups }
    }

    /// Recompute sizes, type-code indices and positions. Returns the
    /// type-code table.
    pub fn pack(&mut self) -> Vec<u32> {
        for section in self.slots.iter_mut().flatten() {
            if let Some(size) = section.object.computed_size() {
                section.size = size;
            }
        }

        let mut entries: Vec<SectionEntry> = self.sections().map(|(_, s)| s.entry()).collect();
        let types = build_type_table(&mut entries);
        let fixup_count: usize = self.sections().map(|(_, s)| s.fixup_offsets.len()).sum();
        let section_count = self.order.len();

        let order = self.order.clone();
        for (key, entry) in order.iter().zip(&entries) {
            if let Some(section) = self.slot_mut(*key) {
                section.type_code_index = entry.type_code_index;
            }
        }

        let mut p = Header::header_end(types.len());
        for &key in &order {
            if let Some(section) = self.slot_mut(key)
                && !section.is_raw_data()
            {
                section.position = align(p, section.alignment);
                p = section.position + section.size;
            }
        }
        self.header.section_index_begin = p;

        let mut p = self.header.section_index_end(section_count, fixup_count);
        for &key in &order {
            if let Some(section) = self.slot_mut(key)
                && section.is_raw_data()
            {
                section.position = align(p, section.alignment);
                p = section.position + section.size;
            }
        }

        debug!(
            sections = section_count,
            types = types.len(),
            index_begin = self.header.section_index_begin,
            "packed model"
        );
        types
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    /// Append a section holding `object`
    pub fn add_object(&mut self, object: impl Into<Rw4Object>, type_code: u32) -> SectionKey {
        let number = self.order.len() as u32;
        let key = SectionKey(self.slots.len() as u32);
        self.slots
            .push(Some(Section::new(number, object.into(), type_code)));
        self.order.push(key);
        key
    }

    /// Insert a section at position `index`, shifting later sections up
    pub fn insert_section(
        &mut self,
        index: usize,
        object: impl Into<Rw4Object>,
        type_code: u32,
    ) -> Result<SectionKey> {
        if index > self.order.len() {
            return Err(Error::format_value("S000", 0, index));
        }
        let key = SectionKey(self.slots.len() as u32);
        self.slots
            .push(Some(Section::new(index as u32, object.into(), type_code)));
        self.order.insert(index, key);
        self.renumber(index);
        Ok(key)
    }

    /// Remove a section; later sections shift down. Objects still
    /// referencing it fail on write with [`Error::SectionRemoved`].
    pub fn remove_section(&mut self, key: SectionKey) -> Result<Section> {
        let mut section = self
            .slots
            .get_mut(key.index())
            .and_then(Option::take)
            .ok_or(Error::SectionRemoved(key.0))?;
        let index = section.number as usize;
        self.order.remove(index);
        self.renumber(index);
        section.number = u32::MAX;
        Ok(section)
    }

    fn renumber(&mut self, from: usize) {
        let order = &self.order;
        for (number, key) in order.iter().enumerate().skip(from) {
            if let Some(Some(section)) = self.slots.get_mut(key.index()) {
                section.number = number as u32;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------------

    fn slot_mut(&mut self, key: SectionKey) -> Option<&mut Section> {
        self.slots.get_mut(key.index()).and_then(Option::as_mut)
    }

    pub fn section(&self, key: SectionKey) -> Result<&Section> {
        self.slots
            .get(key.index())
            .and_then(Option::as_ref)
            .ok_or(Error::SectionRemoved(key.0))
    }

    pub fn section_mut(&mut self, key: SectionKey) -> Result<&mut Section> {
        self.slot_mut(key).ok_or(Error::SectionRemoved(key.0))
    }

    pub fn object_mut<T: ObjectKind>(&mut self, key: SectionKey) -> Result<&mut T> {
        let section = self.section_mut(key)?;
        let (number, found) = (section.number, section.object.name());
        T::from_object_mut(&mut section.object).ok_or(Error::ObjectType {
            number,
            expected: T::NAME,
            found,
        })
    }

    /// Sections in number order
    pub fn sections(&self) -> impl Iterator<Item = (SectionKey, &Section)> + '_ {
        self.order
            .iter()
            .filter_map(|&key| Some((key, self.slots.get(key.index())?.as_ref()?)))
    }

    /// Every section holding a `T`, in number order
    pub fn objects_of<'a, T: ObjectKind + 'a>(&'a self) -> impl Iterator<Item = (SectionKey, &'a T)> + 'a {
        self.sections()
            .filter_map(|(key, s)| T::from_object(&s.object).map(|o| (key, o)))
    }

    /// Key of the section currently numbered `number`
    pub fn key_of(&self, number: u32) -> Option<SectionKey> {
        self.order.get(number as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn file_type(&self) -> FileType {
        self.header.file_type
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl ObjectLookup for Model {
    fn lookup<T: ObjectKind>(&self, key: SectionKey) -> Result<&T> {
        let section = self.section(key)?;
        T::from_object(&section.object).ok_or(Error::ObjectType {
            number: section.number,
            expected: T::NAME,
            found: section.object.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Blob, Buffer, Triangle};

    fn numbers(model: &Model) -> Vec<u32> {
        model.sections().map(|(_, s)| s.number()).collect()
    }

    #[test]
    fn test_align() {
        assert_eq!(align(0x11, 0x10), 0x20);
        assert_eq!(align(0x20, 0x10), 0x20);
        assert_eq!(align(0x13, 0), 0x13);
        assert_eq!(align(0x13, 1), 0x13);
    }

    #[test]
    fn test_numbering_stays_dense() {
        let mut model = Model::new(FileType::Model);
        let a = model.add_object(BBox::default(), type_code::BBOX);
        let b = model.add_object(BBox::default(), type_code::BBOX);
        let c = model
            .insert_section(1, Blob::new(BlobKind::VertexFormat, vec![1]), type_code::VERTEX_FORMAT)
            .unwrap();
        assert_eq!(numbers(&model), vec![0, 1, 2]);
        assert_eq!(model.section(c).unwrap().number(), 1);
        assert_eq!(model.section(b).unwrap().number(), 2);

        let removed = model.remove_section(a).unwrap();
        assert_eq!(removed.number(), u32::MAX);
        assert_eq!(numbers(&model), vec![0, 1]);
        assert_eq!(model.key_of(0), Some(c));
        assert_eq!(model.key_of(1), Some(b));
        assert!(matches!(model.section(a), Err(Error::SectionRemoved(_))));
        assert!(model.remove_section(a).is_err());
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut model = Model::new(FileType::Model);
        let err = model
            .insert_section(1, BBox::default(), type_code::BBOX)
            .unwrap_err();
        assert_eq!(err.code(), "S000");
    }

    #[test]
    fn test_pack_places_raw_data_after_index() {
        let mut model = Model::new(FileType::Model);
        let buffer = model.add_object(
            Buffer::new(vec![Triangle::new(0, 1, 2)]),
            type_code::BUFFER,
        );
        let bbox = model.add_object(BBox::default(), type_code::BBOX);
        let types = model.pack();

        assert_eq!(types.len(), 6);
        let bbox = model.section(bbox).unwrap();
        let buffer = model.section(buffer).unwrap();
        assert_eq!(bbox.position, align(Header::header_end(6), 0x10));
        assert_eq!(bbox.size, BBox::SIZE);
        assert_eq!(model.header().section_index_begin, bbox.position + 32);
        let index_end = model.header().section_index_end(2, 0);
        assert_eq!(buffer.position, align(index_end, 0x10));
        assert_eq!(buffer.size, 6);
        assert_eq!(buffer.type_code_index, 1);
        assert_eq!(bbox.type_code_index, 5);
    }

    #[test]
    fn test_object_type_mismatch() {
        let mut model = Model::new(FileType::Model);
        let key = model.add_object(BBox::default(), type_code::BBOX);
        assert_eq!(model.lookup::<Mesh>(key).unwrap_err().code(), "OT001");
        model.object_mut::<BBox>(key).unwrap().unk1 = 5;
        assert_eq!(model.lookup::<BBox>(key).unwrap().unk1, 5);
    }
}
