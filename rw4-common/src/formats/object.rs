//! Payload objects and the decode/encode contexts
//!
//! Each section holds exactly one [`Rw4Object`]. Decoding is lazy and
//! memoized per section: a parent asks the [`Decoder`] for the object at a
//! section number, which decodes it on first request and hands back a
//! [`SectionKey`] afterwards. A section that is still being decoded when it
//! is requested again is a reference cycle and fails.
//!
//! Encoding goes through an [`Encoder`], which resolves keys back to the
//! current section numbers.

use std::io::Write;
use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::error::{Error, Result};
use crate::formats::animation::Anim;
use crate::formats::blob::{Blob, BlobKind};
use crate::formats::buffer::{Buffer, Mat4x3, Mat4x4, Matrices, Record, Triangle, Vertex};
use crate::formats::material::{Material, MeshMaterialAssignment};
use crate::formats::mesh::{BBox, Mesh, TriangleArray, VertexArray};
use crate::formats::section::{SectionEntry, SectionKey};
use crate::formats::simple_mesh::SimpleMesh;
use crate::formats::skeleton::{HierarchyInfo, Skeleton};
use crate::formats::texture::{TexMetadata, Texture};
use crate::model::Section;
use crate::stream::{Rw4Reader, Rw4Writer};

/// Binary layout of one payload type
pub trait Codec: Sized {
    /// Decode from the section start; the reader is positioned there
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self>;

    /// Encode at the section start
    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()>;

    /// Exact encoded size, or `None` when it depends on the position
    fn computed_size(&self) -> Option<u32>;
}

/// Resolve a section key to a typed object
pub trait ObjectLookup {
    fn lookup<T: ObjectKind>(&self, key: SectionKey) -> Result<&T>;
}

fn type_mismatch<T: ObjectKind>(number: u32, object: &Rw4Object) -> Error {
    Error::ObjectType {
        number,
        expected: T::NAME,
        found: object.name(),
    }
}

/// Typed access to one [`Rw4Object`] variant
pub trait ObjectKind: Sized {
    const NAME: &'static str;

    fn from_object(object: &Rw4Object) -> Option<&Self>;
    fn from_object_mut(object: &mut Rw4Object) -> Option<&mut Self>;
    fn into_object(self) -> Rw4Object;
}

macro_rules! rw4_objects {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Payload of a section
        #[derive(Clone, Debug, PartialEq)]
        pub enum Rw4Object {
            $($variant($ty),)*
        }

        impl Rw4Object {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($variant),)*
                }
            }

            pub fn computed_size(&self) -> Option<u32> {
                match self {
                    $(Self::$variant(o) => o.computed_size(),)*
                }
            }

            pub fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
                match self {
                    $(Self::$variant(o) => o.encode(e),)*
                }
            }
        }

        $(
            impl ObjectKind for $ty {
                const NAME: &'static str = stringify!($variant);

                fn from_object(object: &Rw4Object) -> Option<&Self> {
                    match object {
                        Rw4Object::$variant(o) => Some(o),
                        _ => None,
                    }
                }

                fn from_object_mut(object: &mut Rw4Object) -> Option<&mut Self> {
                    match object {
                        Rw4Object::$variant(o) => Some(o),
                        _ => None,
                    }
                }

                fn into_object(self) -> Rw4Object {
                    Rw4Object::$variant(self)
                }
            }

            impl From<$ty> for Rw4Object {
                fn from(o: $ty) -> Self {
                    Rw4Object::$variant(o)
                }
            }
        )*
    };
}

rw4_objects! {
    VertexBuffer(Buffer<Vertex>),
    TriangleBuffer(Buffer<Triangle>),
    Matrices4x4(Matrices<Mat4x4>),
    Matrices4x3(Matrices<Mat4x3>),
    TriangleArray(TriangleArray),
    VertexArray(VertexArray),
    BBox(BBox),
    SimpleMesh(SimpleMesh),
    Mesh(Mesh),
    Texture(Texture),
    TexMetadata(TexMetadata),
    MeshMaterialAssignment(MeshMaterialAssignment),
    Material(Material),
    HierarchyInfo(HierarchyInfo),
    Skeleton(Skeleton),
    Anim(Anim),
    Blob(Blob),
}

// ============================================================================
// Decoder
// ============================================================================

enum Slot {
    Undecoded,
    Decoding,
    Decoded(Rw4Object),
}

/// Read context: the file, the section index and the per-section cache
pub struct Decoder<'a> {
    reader: Rw4Reader<'a>,
    entries: &'a [SectionEntry],
    slots: Vec<Slot>,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(reader: Rw4Reader<'a>, entries: &'a [SectionEntry]) -> Self {
        Self {
            reader,
            entries,
            slots: entries.iter().map(|_| Slot::Undecoded).collect(),
        }
    }

    fn slot_index(&self, number: i32) -> Result<usize> {
        usize::try_from(number)
            .ok()
            .filter(|&i| i < self.slots.len())
            .ok_or_else(|| self.reader.error_value("S000", number))
    }

    /// Object of type `T` at section `number`, decoded on first use
    pub fn object<T: Codec + ObjectKind>(&mut self, number: i32) -> Result<SectionKey> {
        let index = self.slot_index(number)?;
        if let Slot::Decoded(object) = &self.slots[index] {
            if T::from_object(object).is_none() {
                return Err(type_mismatch::<T>(index as u32, object));
            }
            return Ok(SectionKey(index as u32));
        }
        self.load(index, |d, entry| T::decode(d, entry).map(T::into_object))
    }

    /// Buffer of exactly `count` records. A buffer belongs to one owner, so
    /// a second request for the same section fails.
    pub fn buffer<T: Record>(&mut self, number: i32, count: u32) -> Result<SectionKey>
    where
        Buffer<T>: Codec + ObjectKind,
    {
        let index = self.slot_index(number)?;
        let key = self.load(index, |d, entry| {
            Buffer::<T>::decode(d, entry).map(ObjectKind::into_object)
        })?;
        let len = self.get::<Buffer<T>>(key).map_or(0, Buffer::len);
        if len != count as usize {
            return Err(self.reader.error_value("VB002", format!("{count} != {len}")));
        }
        Ok(key)
    }

    /// Opaque blob at section `number`
    pub fn blob(&mut self, number: i32, kind: BlobKind) -> Result<SectionKey> {
        let index = self.slot_index(number)?;
        if let Slot::Decoded(object) = &self.slots[index] {
            if Blob::from_object(object).is_none() {
                return Err(type_mismatch::<Blob>(index as u32, object));
            }
            return Ok(SectionKey(index as u32));
        }
        self.load(index, |d, entry| {
            Blob::decode_kind(d, entry, kind).map(Rw4Object::Blob)
        })
    }

    /// Already-decoded object behind `key`
    pub fn get<T: ObjectKind>(&self, key: SectionKey) -> Option<&T> {
        match self.slots.get(key.index()) {
            Some(Slot::Decoded(object)) => T::from_object(object),
            _ => None,
        }
    }

    /// Index entry of section `number`
    pub fn entry(&self, number: i32) -> Result<SectionEntry> {
        Ok(self.entries[self.slot_index(number)?])
    }

    pub(crate) fn is_undecoded(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Undecoded))
    }

    fn load(
        &mut self,
        index: usize,
        decode: impl FnOnce(&mut Self, &SectionEntry) -> Result<Rw4Object>,
    ) -> Result<SectionKey> {
        match &self.slots[index] {
            Slot::Undecoded => {}
            Slot::Decoding => return Err(self.reader.error_value("S005", index)),
            Slot::Decoded(_) => return Err(self.reader.error_value("S004", index)),
        }

        let entry = self.entries[index];
        let start = self.reader.position();
        self.slots[index] = Slot::Decoding;
        self.reader.seek(u64::from(entry.position));

        let object = decode(self, &entry)?;
        trace!(
            section = index,
            kind = object.name(),
            position = entry.position,
            size = entry.size,
            "decoded section"
        );

        if self.reader.position() != entry.end() {
            return Err(self.reader.error_value("S001", index));
        }
        if let Some(size) = object.computed_size()
            && size != entry.size
        {
            return Err(self.reader.error_value("S002", index));
        }

        self.reader.seek(start);
        self.slots[index] = Slot::Decoded(object);
        Ok(SectionKey(index as u32))
    }

    /// Decoded objects in section order; `None` for sections never decoded
    pub(crate) fn into_objects(self) -> Vec<Option<Rw4Object>> {
        self.slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Decoded(object) => Some(object),
                _ => None,
            })
            .collect()
    }
}

impl ObjectLookup for Decoder<'_> {
    fn lookup<T: ObjectKind>(&self, key: SectionKey) -> Result<&T> {
        match self.slots.get(key.index()) {
            Some(Slot::Decoded(object)) => {
                T::from_object(object).ok_or_else(|| type_mismatch::<T>(key.0, object))
            }
            _ => Err(self.reader.error_value("S006", key)),
        }
    }
}

impl<'a> Deref for Decoder<'a> {
    type Target = Rw4Reader<'a>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl DerefMut for Decoder<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Write context: the output stream and the section arena
pub struct Encoder<'m, W: Write> {
    writer: Rw4Writer<W>,
    sections: &'m [Option<Section>],
}

impl<'m, W: Write> Encoder<'m, W> {
    pub(crate) fn new(writer: Rw4Writer<W>, sections: &'m [Option<Section>]) -> Self {
        Self { writer, sections }
    }

    fn section(&self, key: SectionKey) -> Result<&'m Section> {
        self.sections
            .get(key.index())
            .and_then(Option::as_ref)
            .ok_or(Error::SectionRemoved(key.0))
    }

    /// Current section number of `key`
    pub fn number(&self, key: SectionKey) -> Result<u32> {
        Ok(self.section(key)?.number)
    }

    pub(crate) fn into_inner(self) -> Rw4Writer<W> {
        self.writer
    }
}

impl<W: Write> ObjectLookup for Encoder<'_, W> {
    fn lookup<T: ObjectKind>(&self, key: SectionKey) -> Result<&T> {
        let section = self.section(key)?;
        T::from_object(&section.object).ok_or_else(|| type_mismatch::<T>(section.number, &section.object))
    }
}

impl<W: Write> Deref for Encoder<'_, W> {
    type Target = Rw4Writer<W>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl<W: Write> DerefMut for Encoder<'_, W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::mesh::NO_SECTION;
    use crate::formats::type_code;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn entry(number: u32, position: u32, size: u32, type_code: u32) -> SectionEntry {
        SectionEntry {
            number,
            position,
            size,
            type_code,
            ..Default::default()
        }
    }

    fn triangle_array(buffer_section: u32) -> Vec<u8> {
        words(&[0, 0, 3, 8, 101, 4, buffer_section])
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        // a mesh whose triangle array is the mesh itself
        let data = words(&[40, 4, 0, 1, 1, 0, 3, 0, 0, NO_SECTION]);
        let entries = [entry(0, 0, 40, type_code::MESH)];
        let mut d = Decoder::new(Rw4Reader::new(&data), &entries);
        assert_eq!(d.object::<Mesh>(0).unwrap_err().code(), "S005");
    }

    #[test]
    fn test_shared_buffer_decoded_twice() {
        let mut data = triangle_array(2);
        data.extend(triangle_array(2));
        data.extend([0, 0, 1, 0, 2, 0]);
        let entries = [
            entry(0, 0, 28, type_code::TRIANGLE_ARRAY),
            entry(1, 28, 28, type_code::TRIANGLE_ARRAY),
            entry(2, 56, 6, type_code::BUFFER),
        ];
        let mut d = Decoder::new(Rw4Reader::new(&data), &entries);
        d.object::<TriangleArray>(0).unwrap();
        assert_eq!(d.object::<TriangleArray>(1).unwrap_err().code(), "S004");
    }

    #[test]
    fn test_section_not_fully_read() {
        // one spare word after the 32-byte bbox
        let mut data = words(&[0, 0, 0, 0]);
        data.extend(words(&[
            1f32.to_bits(),
            1f32.to_bits(),
            1f32.to_bits(),
            0,
            0,
        ]));
        let entries = [entry(0, 0, 36, type_code::BBOX)];
        let mut d = Decoder::new(Rw4Reader::new(&data), &entries);
        assert_eq!(d.object::<BBox>(0).unwrap_err().code(), "S001");
    }

    #[test]
    fn test_memoized_object_returns_same_key() {
        let data = words(&[0, 0, 0, 0, 0, 0, 0, 0]);
        let entries = [entry(0, 0, 32, type_code::BBOX)];
        let mut d = Decoder::new(Rw4Reader::new(&data), &entries);
        let key = d.object::<BBox>(0).unwrap();
        assert_eq!(d.object::<BBox>(0).unwrap(), key);
        assert_eq!(d.object::<Mesh>(0).unwrap_err().code(), "OT001");
        assert_eq!(d.object::<BBox>(1).unwrap_err().code(), "S000");
    }
}
