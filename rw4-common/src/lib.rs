//! RW4 container codec
//!
//! RW4 is a section-table container: a fixed header, a table of typed
//! sections, and payload objects that refer to each other by section number.
//! This crate reads such files into a [`Model`], lets callers edit the
//! object graph, and writes it back with freshly packed positions.
//!
//! # Modules
//!
//! - [`error`] - the format violation error and its short codes
//! - [`stream`] - little-endian reader/writer with expect/padding helpers
//! - [`formats`] - header framing and the object type registry
//! - [`model`] - section arena, read/write and the packing algorithm
//!
//! # Example
//!
//! ```
//! use rw4_common::{BBox, FileType, Model, type_code};
//!
//! let mut model = Model::new(FileType::Model);
//! model.add_object(BBox::default(), type_code::BBOX);
//! let bytes = model.to_bytes().unwrap();
//!
//! let read = Model::read(&bytes).unwrap();
//! assert_eq!(read.len(), 1);
//! ```

pub mod error;
pub mod formats;
pub mod model;
pub mod stream;

pub use error::{Error, FormatError, Result};
pub use formats::*;
pub use model::{Model, ReadOptions, Section};
