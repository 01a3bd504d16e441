//! Keyframe record

use std::io::Write;

use rw4_shared::{Quaternion, TMatrix, Vector};

use crate::error::Result;
use crate::formats::buffer::Record;
use crate::stream::{Rw4Reader, Rw4Writer};

/// Pose format word stored per channel (rotation, translation, scale, time)
pub const POSE_COMPONENTS: u32 = 0x601;

/// One keyframe of one channel, 48 bytes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointPose {
    /// Unit quaternion, xyzw
    pub rotation: [f32; 4],
    pub translation: [f32; 3],
    pub scale: [f32; 3],
    pub time: f32,
}

impl Default for JointPose {
    fn default() -> Self {
        Self {
            rotation: [0.0, 0.0, 0.0, 1.0],
            translation: [0.0; 3],
            scale: [1.0; 3],
            time: 0.0,
        }
    }
}

impl JointPose {
    pub fn quaternion(&self) -> Quaternion {
        let [x, y, z, w] = self.rotation.map(f64::from);
        Quaternion { x, y, z, w }
    }

    pub fn translation_vector(&self) -> Vector {
        let [x, y, z] = self.translation.map(f64::from);
        Vector::new(x, y, z)
    }

    /// Translation then the conjugate rotation
    pub fn to_matrix(&self) -> TMatrix {
        TMatrix::translation(self.translation_vector()) * (-self.quaternion()).to_matrix()
    }
}

impl Record for JointPose {
    const SIZE: u32 = 48;

    fn read(r: &mut Rw4Reader<'_>) -> Result<Self> {
        let rotation = [r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let translation = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let scale = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        r.expect(0, "JP001")?;
        let time = r.read_f32()?;
        Ok(Self {
            rotation,
            translation,
            scale,
            time,
        })
    }

    fn write<W: Write>(&self, w: &mut Rw4Writer<W>) -> Result<()> {
        for c in self.rotation.iter().chain(&self.translation).chain(&self.scale) {
            w.write_f32(*c)?;
        }
        w.write_u32(0)?;
        w.write_f32(self.time)
    }
}
