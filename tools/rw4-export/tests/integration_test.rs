//! Integration tests for rw4-export
//!
//! Drives the binary end to end: build inputs -> pack/unpack -> check output

use std::path::Path;
use std::process::{Command, Output};

use rw4_common::{DXT5, Triangle, Vertex};
use rw4_export::xml::Element;
use rw4_export::{DdsImage, MeshGeometry, Template, mesh_model};
use tempfile::tempdir;

fn rw4_export(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rw4-export"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run rw4-export")
}

fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = rw4_export(dir, args);
    assert!(
        output.status.success(),
        "rw4-export {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn image() -> DdsImage {
    DdsImage {
        width: 16,
        height: 8,
        fourcc: DXT5,
        mip_count: 3,
        data: (0..DdsImage::dxt5_size(16, 8, 3)).map(|i| i as u8).collect(),
    }
}

fn geometry() -> MeshGeometry {
    let vertex = |x: f32, y: f32| Vertex {
        position: [x, y, 0.5],
        normal: Vertex::pack_normal([0.0, 0.0, 1.0]),
        tangent: Vertex::pack_normal([1.0, 0.0, 0.0]),
        uv: [x * 0.25, y * 0.5],
        bone_indices: 0,
        bone_weights: 255,
    };
    MeshGeometry {
        vertices: vec![
            vertex(0.0, 0.0),
            vertex(1.0, 0.0),
            vertex(1.0, 1.0),
            vertex(0.0, 1.0),
        ],
        triangles: vec![Triangle::new(0, 1, 2), Triangle::new(0, 2, 3)],
    }
}

fn write_template(path: &Path) {
    let template = Template {
        vertex_format: (0..0x40).collect(),
        material_lead: vec![0xAB; 8],
        material_words: [2; 36],
    };
    let bytes = mesh_model(&geometry(), &template)
        .and_then(|mut model| model.to_bytes())
        .expect("Failed to build template");
    std::fs::write(path, bytes).expect("Failed to write template");
}

fn write_texture_rw4(dir: &Path, name: &str) -> std::path::PathBuf {
    let dds_path = dir.join(format!("{name}.dds"));
    let rw4_path = dir.join(format!("{name}.rw4"));
    std::fs::write(&dds_path, image().write(Vec::new()).unwrap()).unwrap();
    run_ok(
        dir,
        &["pack-texture", dds_path.to_str().unwrap(), "-o", rw4_path.to_str().unwrap()],
    );
    rw4_path
}

// ============================================================================
// Textures
// ============================================================================

/// DDS -> RW4 -> DDS gives the same file back
#[test]
fn test_texture_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let rw4_path = write_texture_rw4(dir.path(), "tex");
    assert!(rw4_path.exists(), "texture RW4 should exist");

    let out = dir.path().join("unpacked");
    run_ok(
        dir.path(),
        &["unpack", rw4_path.to_str().unwrap(), "-o", out.to_str().unwrap()],
    );

    let original = std::fs::read(dir.path().join("tex.dds")).unwrap();
    let unpacked = std::fs::read(out.join("texture.dds")).expect("texture.dds should exist");
    assert_eq!(unpacked, original);
}

#[test]
fn test_pack_texture_rejects_dxt1() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut dxt1 = image();
    dxt1.fourcc = u32::from_le_bytes(*b"DXT1");
    let dds_path = dir.path().join("dxt1.dds");
    std::fs::write(&dds_path, dxt1.write(Vec::new()).unwrap()).unwrap();

    let output = rw4_export(dir.path(), &["pack-texture", dds_path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DDS013"));
}

// ============================================================================
// Meshes
// ============================================================================

/// Mesh XML -> RW4 -> mesh, skeleton and animation XML
#[test]
fn test_mesh_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let template_path = dir.path().join("template.rw4");
    write_template(&template_path);

    let xml_path = dir.path().join("quad.mesh.xml");
    geometry().to_document().write_file(&xml_path).unwrap();

    // picked up from the working directory
    std::fs::write(dir.path().join("names.txt"), "skeleton1\n").unwrap();
    std::fs::write(
        dir.path().join("rw4-export.toml"),
        "[names]\nregistries = [\"names.txt\"]\n",
    )
    .unwrap();

    let rw4_path = dir.path().join("quad.rw4");
    run_ok(
        dir.path(),
        &[
            "pack-mesh",
            xml_path.to_str().unwrap(),
            "--template",
            template_path.to_str().unwrap(),
            "-o",
            rw4_path.to_str().unwrap(),
        ],
    );

    let out = dir.path().join("quad");
    run_ok(dir.path(), &["unpack", rw4_path.to_str().unwrap()]);

    let mesh = Element::read_file(&out.join("model.mesh.xml")).unwrap();
    assert_eq!(MeshGeometry::from_document(&mesh).unwrap(), geometry());

    let skeleton = Element::read_file(&out.join("model.skeleton.xml")).unwrap();
    let bone = skeleton.find("bones").unwrap().find("bone").unwrap();
    assert_eq!(bone.get("name"), Some("joint1"));
    let animation = skeleton.find("animations").unwrap().find("animation").unwrap();
    assert_eq!(animation.get("length"), Some("1.25"));

    let info = Element::read_file(&out.join("anim.xml")).unwrap();
    let anim = info.find("anims").unwrap().find("anim").unwrap();
    assert_eq!(anim.get("skeleton"), Some("skeleton1"));
}

#[test]
fn test_pack_mesh_needs_template_sections() {
    let dir = tempdir().expect("Failed to create temp dir");
    // a texture file has neither a vertex format nor texture metadata
    let texture = write_texture_rw4(dir.path(), "tex");
    let xml_path = dir.path().join("quad.mesh.xml");
    geometry().to_document().write_file(&xml_path).unwrap();

    let output = rw4_export(
        dir.path(),
        &[
            "pack-mesh",
            xml_path.to_str().unwrap(),
            "-t",
            texture.to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("vertex format"));
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn test_info_and_verify() {
    let dir = tempdir().expect("Failed to create temp dir");
    let template_path = dir.path().join("model.rw4");
    write_template(&template_path);

    let listing = run_ok(dir.path(), &["info", template_path.to_str().unwrap()]);
    assert!(listing.contains("15 sections"));
    assert!(listing.contains("0x7000c Skeleton"));
    assert!(listing.contains("0x20003 Texture"));

    let verified = run_ok(dir.path(), &["verify", template_path.to_str().unwrap()]);
    assert!(verified.contains("identical"));
}

#[test]
fn test_batch_tallies_failures() {
    let dir = tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("assets");
    std::fs::create_dir_all(root.join("good")).unwrap();
    std::fs::create_dir_all(root.join("bad")).unwrap();

    let texture = write_texture_rw4(dir.path(), "tex");
    std::fs::copy(&texture, root.join("good/raw.rw4")).unwrap();
    std::fs::write(root.join("bad/raw.rw4"), [0u8; 64]).unwrap();

    let summary = run_ok(dir.path(), &["batch", root.to_str().unwrap()]);
    assert!(summary.contains("Converted 1/2 files."), "{summary}");
    assert!(summary.contains("H000: 1"), "{summary}");
    assert!(root.join("good/raw/texture.dds").exists());
}
