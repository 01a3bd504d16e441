//! RW4 → interchange files
//!
//! A model file becomes an Ogre mesh XML, plus a skeleton XML and the raw
//! animation dump when it carries exactly one skeleton. A texture file
//! becomes a DDS.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rw4_common::{
    Anim, Blob, Buffer, FileType, Mesh, Model, ObjectLookup, Skeleton, Texture, Triangle,
    TriangleArray, Vertex, VertexArray,
};
use rw4_shared::NameLookup;

use crate::config::{Config, OutputConfig};
use crate::dds::DdsImage;
use crate::error::ExportError;
use crate::mesh_xml::MeshGeometry;
use crate::skeleton_xml::{animation_info_document, animation_name, skeleton_document};

/// What one unpack produced
#[derive(Debug, Clone)]
pub struct UnpackReport {
    pub file_type: FileType,
    pub files: Vec<PathBuf>,
    /// Names given to the animations in the skeleton XML
    pub animations: Vec<String>,
}

/// Read `input` and unpack it into `output_dir`, creating the directory
pub fn unpack_file(
    input: &Path,
    output_dir: &Path,
    config: &Config,
    names: &impl NameLookup,
) -> Result<UnpackReport> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    let model = Model::read_with(&data, config.read.options())
        .with_context(|| format!("Failed to parse RW4: {:?}", input))?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
    unpack_model(&model, output_dir, &config.output, names)
}

pub fn unpack_model(
    model: &Model,
    dir: &Path,
    output: &OutputConfig,
    names: &impl NameLookup,
) -> Result<UnpackReport> {
    match model.file_type() {
        FileType::Model => unpack_mesh(model, dir, output, names),
        FileType::Texture => unpack_texture(model, dir, output),
    }
}

/// Geometry of the single mesh of a model
pub fn mesh_geometry(model: &Model) -> Result<MeshGeometry> {
    let meshes: Vec<&Mesh> = model.objects_of::<Mesh>().map(|(_, m)| m).collect();
    let [mesh] = meshes[..] else {
        return Err(ExportError::MeshCount(meshes.len()).into());
    };
    let vertex_array = mesh.vertices.ok_or(ExportError::NoVertexArray)?;

    let vertex_array = model.lookup::<VertexArray>(vertex_array)?;
    let vertices = model.lookup::<Buffer<Vertex>>(vertex_array.vertices)?;
    let triangle_array = model.lookup::<TriangleArray>(mesh.triangles)?;
    let triangles = model.lookup::<Buffer<Triangle>>(triangle_array.triangles)?;

    Ok(MeshGeometry {
        vertices: vertices.items.clone(),
        triangles: triangles.items.clone(),
    })
}

fn unpack_mesh(
    model: &Model,
    dir: &Path,
    output: &OutputConfig,
    names: &impl NameLookup,
) -> Result<UnpackReport> {
    let geometry = mesh_geometry(model)?;
    let mesh_path = dir.join(&output.mesh_file);
    geometry.to_document().write_file(&mesh_path)?;
    tracing::debug!(
        "Wrote {} vertices, {} triangles to {:?}",
        geometry.vertices.len(),
        geometry.triangles.len(),
        mesh_path
    );

    let mut report = UnpackReport {
        file_type: FileType::Model,
        files: vec![mesh_path],
        animations: Vec::new(),
    };

    let skeletons: Vec<&Skeleton> = model.objects_of::<Skeleton>().map(|(_, s)| s).collect();
    if let [skeleton] = skeletons[..] {
        let skeleton_path = dir.join(&output.skeleton_file);
        skeleton_document(model, skeleton, names)?.write_file(&skeleton_path)?;
        report.files.push(skeleton_path);

        let animation_path = dir.join(&output.animation_file);
        animation_info_document(model, names)?.write_file(&animation_path)?;
        report.files.push(animation_path);

        report.animations = (0..model.objects_of::<Anim>().count())
            .map(animation_name)
            .collect();
    } else if !skeletons.is_empty() {
        tracing::warn!(
            "{} skeletons in one model, skipping skeleton output",
            skeletons.len()
        );
    }

    Ok(report)
}

fn unpack_texture(model: &Model, dir: &Path, output: &OutputConfig) -> Result<UnpackReport> {
    let textures: Vec<&Texture> = model.objects_of::<Texture>().map(|(_, t)| t).collect();
    let [texture] = textures[..] else {
        return Err(ExportError::TextureCount(textures.len()).into());
    };
    let data = model.lookup::<Blob>(texture.data)?;
    let image = DdsImage::from_texture(texture, &data.data);

    let path = dir.join(&output.texture_file);
    let file = File::create(&path).with_context(|| format!("Failed to create output: {:?}", path))?;
    image
        .write(BufWriter::new(file))?
        .flush()
        .with_context(|| format!("Failed to write {:?}", path))?;
    tracing::debug!(
        "Wrote {}x{} texture with {} mips to {:?}",
        image.width,
        image.height,
        image.mip_count,
        path
    );

    Ok(UnpackReport {
        file_type: FileType::Texture,
        files: vec![path],
        animations: Vec::new(),
    })
}
