//! rw4-export library
//!
//! Converts RW4 models and textures to and from interchange formats:
//! Ogre mesh/skeleton XML and DXT5 DDS. The CLI in `main.rs` is a thin
//! layer over these modules.

pub mod batch;
pub mod config;
pub mod dds;
pub mod error;
pub mod inspect;
pub mod mesh_xml;
pub mod pack;
pub mod skeleton_xml;
pub mod unpack;
pub mod xml;

pub use batch::{BatchReport, run_batch};
pub use config::Config;
pub use dds::DdsImage;
pub use error::{ExportError, error_code};
pub use mesh_xml::MeshGeometry;
pub use pack::{Template, mesh_model, pack_mesh, pack_texture, texture_model};
pub use unpack::{UnpackReport, unpack_file, unpack_model};
