//! RW4 binary layouts
//!
//! [`header`] covers the file preamble, the type-code table and the section
//! index. Every other module is one family of payload objects; each object
//! implements [`Codec`] and is held by a section as a [`Rw4Object`].
//!
//! All integers are little-endian. Sections refer to each other by section
//! number on disk and by [`SectionKey`] in memory.

pub mod animation;
pub mod blob;
pub mod buffer;
pub mod header;
pub mod material;
pub mod mesh;
pub mod object;
pub mod section;
pub mod simple_mesh;
pub mod skeleton;
pub mod texture;

pub use animation::{Anim, AnimChannel, JointPose, POSE_COMPONENTS};
pub use blob::{Blob, BlobKind};
pub use buffer::{Buffer, Mat4x3, Mat4x4, Matrices, Record, Triangle, Vertex};
pub use header::{FileType, Header};
pub use material::{Material, MeshMaterialAssignment};
pub use mesh::{BBox, Mesh, TriangleArray, VertexArray};
pub use object::{Codec, Decoder, Encoder, ObjectKind, ObjectLookup, Rw4Object};
pub use section::{SectionEntry, SectionKey};
pub use simple_mesh::{SimpleMesh, SimpleTriangle};
pub use skeleton::{HierarchyInfo, Joint, Skeleton};
pub use texture::{DXT5, TexMetadata, Texture};

/// Section type codes
pub mod type_code {
    /// Raw data placed after the section index (buffers, texture mips)
    pub const BUFFER: u32 = 0x10030;
    pub const TEXTURE_DATA: u32 = BUFFER;
    pub const TEXTURE: u32 = 0x20003;
    pub const VERTEX_FORMAT: u32 = 0x20004;
    pub const VERTEX_ARRAY: u32 = 0x20005;
    pub const TRIANGLE_ARRAY: u32 = 0x20007;
    pub const MESH: u32 = 0x20009;
    pub const TEX_METADATA: u32 = 0x2000b;
    pub const MESH_MATERIAL_ASSIGNMENT: u32 = 0x2001a;
    pub const ANIM: u32 = 0x70001;
    pub const HIERARCHY_INFO: u32 = 0x70002;
    pub const MATRICES_4X4: u32 = 0x70003;
    pub const MATERIAL: u32 = 0x7000b;
    pub const SKELETON: u32 = 0x7000c;
    pub const MATRICES_4X3: u32 = 0x7000f;
    pub const SIMPLE_MESH: u32 = 0x80003;
    pub const BBOX: u32 = 0x80005;
    pub const MODEL_HANDLES: u32 = 0xff0000;
    pub const ANIMATIONS: u32 = 0xff0001;

    /// Readable name of a type code, for listings
    pub fn name(code: u32) -> &'static str {
        match code {
            BUFFER => "Buffer",
            TEXTURE => "Texture",
            VERTEX_FORMAT => "VertexFormat",
            VERTEX_ARRAY => "VertexArray",
            TRIANGLE_ARRAY => "TriangleArray",
            MESH => "Mesh",
            TEX_METADATA => "TexMetadata",
            MESH_MATERIAL_ASSIGNMENT => "MeshMaterialAssignment",
            ANIM => "Anim",
            HIERARCHY_INFO => "HierarchyInfo",
            MATRICES_4X4 => "Matrices4x4",
            MATERIAL => "Material",
            SKELETON => "Skeleton",
            MATRICES_4X3 => "Matrices4x3",
            SIMPLE_MESH => "SimpleMesh",
            BBOX => "BBox",
            MODEL_HANDLES => "ModelHandles",
            ANIMATIONS => "Animations",
            _ => "Unknown",
        }
    }
}
