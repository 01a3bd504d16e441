//! Shared types for the RW4 asset tools.
//!
//! - [`math`] - translation·rotation matrices, quaternions and bind-pose
//!   rotation extraction
//! - [`names`] - FNV-1 name hashing and the hash → name lookup context

pub mod math;
pub mod names;

pub use math::{Point, Quaternion, TMatrix, TransformError, Vector};
pub use names::{NameLookup, NameRegistry, fnv_hash};
