//! Interchange files → RW4
//!
//! Mesh packing synthesises a complete single-mesh model: a one-joint
//! skeleton with its bind matrices, a one-key animation clip, the mesh with
//! its vertex and triangle buffers, and a 64x64 placeholder texture bound
//! through a material. The vertex format descriptor and the texture
//! metadata words are opaque; they are copied from a template model.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use rw4_common::{
    Anim, AnimChannel, Blob, BlobKind, Buffer, DXT5, FileType, HierarchyInfo, Joint, JointPose,
    Mat4x3, Mat4x4, Matrices, Mesh, MeshMaterialAssignment, Model, Skeleton, TexMetadata, Texture,
    TriangleArray, VertexArray, type_code,
};
use rw4_shared::fnv_hash;

use crate::dds::DdsImage;
use crate::error::ExportError;
use crate::mesh_xml::MeshGeometry;
use crate::xml::Element;

const SKELETON_NAME: &str = "skeleton1";
const JOINT_NAME: &str = "joint1";
const CLIP_LENGTH: f32 = 1.25;
const CLIP_FLAGS: u32 = 3;

/// Bind matrix of the single joint: a quarter turn about z
const JOINT_BIND: [f32; 16] = [
    0.0, 1.0, 0.0, 0.0, //
    -1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 0.0,
];

const PLACEHOLDER_SIZE: u16 = 64;
/// Seven DXT5 mips of a 64x64 image
const PLACEHOLDER_MIPMAP_INFO: u32 = 0x708;

/// Opaque payloads lifted from an existing model
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub vertex_format: Vec<u8>,
    pub material_lead: Vec<u8>,
    pub material_words: [i32; 36],
}

impl Template {
    pub fn from_model(model: &Model) -> Result<Self, ExportError> {
        let vertex_format = model
            .objects_of::<Blob>()
            .find(|(_, b)| matches!(b.kind, BlobKind::VertexFormat))
            .map(|(_, b)| b.data.clone())
            .ok_or(ExportError::TemplateMissing("vertex format"))?;
        let (_, metadata) = model
            .objects_of::<TexMetadata>()
            .next()
            .ok_or(ExportError::TemplateMissing("texture metadata"))?;
        Ok(Self {
            vertex_format,
            material_lead: metadata.unk_data_1.clone(),
            material_words: metadata.unk_data_2,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("Failed to read template: {:?}", path))?;
        let model = Model::read(&data)
            .with_context(|| format!("Failed to parse template: {:?}", path))?;
        Ok(Self::from_model(&model)?)
    }
}

/// Build a model around `geometry`
pub fn mesh_model(geometry: &MeshGeometry, template: &Template) -> rw4_common::Result<Model> {
    let mut model = Model::new(FileType::Model);
    let skeleton_id = fnv_hash(SKELETON_NAME);
    let joint_name = fnv_hash(JOINT_NAME);

    model.add_object(
        Anim {
            skeleton_id,
            length: CLIP_LENGTH,
            flags: CLIP_FLAGS,
            channels: vec![AnimChannel {
                name: joint_name,
                poses: vec![JointPose {
                    time: CLIP_LENGTH,
                    ..JointPose::default()
                }],
            }],
            padding: 0,
        },
        type_code::ANIM,
    );
    let vertex_format = model.add_object(
        Blob::new(BlobKind::VertexFormat, template.vertex_format.clone()),
        type_code::VERTEX_FORMAT,
    );
    let mat4 = model.add_object(
        Matrices::new(vec![Mat4x4 { m: JOINT_BIND }]),
        type_code::MATRICES_4X4,
    );
    let mat3 = model.add_object(
        Matrices::new(vec![Mat4x3::default()]),
        type_code::MATRICES_4X3,
    );
    model.section_mut(mat3)?.fixup_offsets.push(16);

    // Forward references point at an earlier section until their target exists
    let skeleton = model.add_object(Skeleton::new(mat3, mat3, mat4), type_code::SKELETON);

    let triangle_buffer = model.add_object(
        Buffer::new(geometry.triangles.clone()),
        type_code::BUFFER,
    );
    let triangle_array = model.add_object(
        TriangleArray::new(triangle_buffer),
        type_code::TRIANGLE_ARRAY,
    );
    let mesh = model.add_object(Mesh::new(triangle_array, triangle_array), type_code::MESH);
    let metadata = model.add_object(
        TexMetadata {
            texture: mesh,
            unk_data_1: template.material_lead.clone(),
            unk_data_2: template.material_words,
        },
        type_code::TEX_METADATA,
    );
    model.add_object(
        MeshMaterialAssignment {
            mesh,
            materials: vec![metadata],
        },
        type_code::MESH_MATERIAL_ASSIGNMENT,
    );
    let joints = model.add_object(
        HierarchyInfo {
            id: skeleton_id,
            items: vec![Joint {
                name_fnv: joint_name,
                flags: 1,
                parent: None,
            }],
        },
        type_code::HIERARCHY_INFO,
    );
    model.object_mut::<Skeleton>(skeleton)?.joints = joints;

    let vertex_buffer = model.add_object(
        Buffer::new(geometry.vertices.clone()),
        type_code::BUFFER,
    );
    let vertex_array = model.add_object(
        VertexArray::new(vertex_format, vertex_buffer),
        type_code::VERTEX_ARRAY,
    );
    model.object_mut::<Mesh>(mesh)?.vertices = Some(vertex_array);

    let size = u32::from(PLACEHOLDER_SIZE);
    let texture_data = model.add_object(
        Blob::new(
            BlobKind::TextureData,
            vec![0; DdsImage::dxt5_size(size, size, PLACEHOLDER_MIPMAP_INFO / 0x100)],
        ),
        type_code::TEXTURE_DATA,
    );
    let texture = model.add_object(
        Texture {
            texture_type: DXT5,
            unk1: 0,
            width: PLACEHOLDER_SIZE,
            height: PLACEHOLDER_SIZE,
            mipmap_info: PLACEHOLDER_MIPMAP_INFO,
            data: texture_data,
        },
        type_code::TEXTURE,
    );
    model.object_mut::<TexMetadata>(metadata)?.texture = texture;

    Ok(model)
}

/// Texture model holding `image`
pub fn texture_model(image: &DdsImage) -> Model {
    let mut model = Model::new(FileType::Texture);
    let data = model.add_object(
        Blob::new(BlobKind::TextureData, image.data.clone()),
        type_code::TEXTURE_DATA,
    );
    model.add_object(
        Texture {
            texture_type: image.fourcc,
            unk1: 0,
            // dimensions were checked to fit 16 bits when the DDS was read
            width: image.width as u16,
            height: image.height as u16,
            mipmap_info: image.mipmap_info(),
            data,
        },
        type_code::TEXTURE,
    );
    model
}

fn write_model(model: &mut Model, output: &Path) -> Result<()> {
    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    model
        .write(BufWriter::new(file))?
        .flush()
        .with_context(|| format!("Failed to write {:?}", output))
}

/// Ogre mesh XML → model RW4
pub fn pack_mesh(input: &Path, template: &Path, output: &Path) -> Result<()> {
    let template = Template::from_file(template)?;
    let geometry = MeshGeometry::from_document(&Element::read_file(input)?)
        .with_context(|| format!("Invalid mesh XML: {:?}", input))?;
    let mut model = mesh_model(&geometry, &template)?;
    write_model(&mut model, output)?;

    tracing::info!(
        "Packed mesh: {} vertices, {} triangles -> {:?}",
        geometry.vertices.len(),
        geometry.triangles.len(),
        output
    );
    Ok(())
}

/// DDS → texture RW4
pub fn pack_texture(input: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    let image = DdsImage::read(&data).with_context(|| format!("Invalid DDS: {:?}", input))?;
    write_model(&mut texture_model(&image), output)?;

    tracing::info!(
        "Packed texture: {}x{}, {} mips -> {:?}",
        image.width,
        image.height,
        image.mip_count,
        output
    );
    Ok(())
}
