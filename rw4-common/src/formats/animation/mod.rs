//! Skeletal animation clip (type 0x70001)
//!
//! # Layout
//! ```text
//! Header (48 bytes):
//! 0x00: p1 u32          - section_start + 48 (channel names)
//! 0x04: channels u32
//! 0x08: skeleton_id u32 - HierarchyInfo id of the animated skeleton
//! 0x0C: 0 u32
//! 0x10: p3 u32          - first keyframe
//! 0x14: p4 u32          - end of keyframes and padding
//! 0x18: channels u32
//! 0x1C: 0 u32
//! 0x20: length f32      - clip length in seconds
//! 0x24: 12 u32
//! 0x28: flags u32
//! 0x2C: p2 u32          - p1 + 4 * channels (channel table)
//!
//! p1: channels x name hash u32
//! p2: channels x (offset u32, pose size u32 = 48, components u32 = 0x601)
//!     offset is relative to the section start
//! p3: channels x keyframes x JointPose, channel-major
//!     zero padding up to p4
//! ```
//!
//! The keyframe count is not stored. With two or more channels it is the
//! second channel's offset divided by the keyframe stride. A single-channel
//! clip only has the p3..p4 span, which also covers the padding: keyframes
//! are read until one whose time equals the clip length, and everything
//! after it is padding.

mod pose;

#[cfg(test)]
mod tests;

use std::io::Write;

pub use pose::{JointPose, POSE_COMPONENTS};

use crate::error::Result;
use crate::formats::buffer::Record;
use crate::formats::object::{Codec, Decoder, Encoder};
use crate::formats::section::SectionEntry;
use crate::formats::type_code;

const HEADER_SIZE: u32 = 48;
/// Name hash plus the three-word channel table entry
const CHANNEL_OVERHEAD: u32 = 16;

/// Keyframes of one joint
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimChannel {
    /// Joint name hash, matching a [`crate::Joint::name_fnv`]
    pub name: u32,
    pub poses: Vec<JointPose>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Anim {
    pub skeleton_id: u32,
    /// Seconds
    pub length: f32,
    pub flags: u32,
    /// All channels hold the same number of keyframes
    pub channels: Vec<AnimChannel>,
    /// Zero bytes after the keyframes
    pub padding: u32,
}

impl Anim {
    pub fn keyframe_count(&self) -> usize {
        self.channels.first().map_or(0, |c| c.poses.len())
    }

    fn keyframe_offset(&self) -> u32 {
        HEADER_SIZE + CHANNEL_OVERHEAD * self.channels.len() as u32
    }

    fn keyframe_bytes(&self) -> u32 {
        (self.channels.len() * self.keyframe_count()) as u32 * JointPose::SIZE
    }
}

impl Codec for Anim {
    fn decode(d: &mut Decoder<'_>, entry: &SectionEntry) -> Result<Self> {
        if entry.type_code != type_code::ANIM {
            return Err(d.error_value("AN000", format!("0x{:x}", entry.type_code)));
        }
        let p1 = d.read_u32()?;
        let channel_count = d.read_u32()?;
        let skeleton_id = d.read_u32()?;
        d.expect(0, "AN001")?;
        let p3 = d.read_u32()?;
        let p4 = d.read_u32()?;
        d.expect(channel_count, "AN002")?;
        d.expect(0, "AN003")?;
        let length = d.read_f32()?;
        d.expect(12, "AN010")?;
        let flags = d.read_u32()?;
        let p2 = d.read_u32()?;

        let n = u64::from(channel_count);
        if u64::from(p1) != d.position() {
            return Err(d.error_value("AN100", p1));
        }
        if u64::from(p2) != u64::from(p1) + 4 * n {
            return Err(d.error_value("AN101", p2));
        }
        if u64::from(p3) != u64::from(p2) + 12 * n {
            return Err(d.error_value("AN102", p3));
        }

        let mut channels = Vec::new();
        for _ in 0..channel_count {
            channels.push(AnimChannel {
                name: d.read_u32()?,
                poses: Vec::new(),
            });
        }

        let base = HEADER_SIZE.wrapping_add(CHANNEL_OVERHEAD.wrapping_mul(channel_count));
        let mut keyframe_count = 0u32;
        for i in 0..channel_count {
            let offset = d.read_u32()?.wrapping_sub(base);
            let pose_size = d.read_u32()?;
            let components = d.read_u32()?;
            if components != POSE_COMPONENTS || pose_size != JointPose::SIZE {
                return Err(d.error_value("AN200", format!("0x{components:x}")));
            }
            if i == 1 {
                keyframe_count = offset / JointPose::SIZE;
            } else if i > 1
                && u64::from(offset) != u64::from(i) * u64::from(JointPose::SIZE * keyframe_count)
            {
                return Err(d.error_value("AN201", i));
            }
        }

        let single = channel_count == 1;
        if single {
            keyframe_count = p4.wrapping_sub(p3) / JointPose::SIZE;
        }

        for channel in &mut channels {
            for _ in 0..keyframe_count {
                let pose = JointPose::read(d)?;
                channel.poses.push(pose);
                if single && pose.time == length {
                    break;
                }
            }
        }

        let mut anim = Self {
            skeleton_id,
            length,
            flags,
            channels,
            padding: 0,
        };
        let padding = i64::from(p4) - i64::from(p3) - i64::from(anim.keyframe_bytes());
        d.read_padding(padding)?;
        anim.padding = padding as u32;
        Ok(anim)
    }

    fn encode<W: Write>(&self, e: &mut Encoder<'_, W>) -> Result<()> {
        let keyframe_count = self.keyframe_count();
        if let Some(i) = self
            .channels
            .iter()
            .position(|c| c.poses.len() != keyframe_count)
        {
            return Err(e.error_value("AN300", i));
        }

        let c = self.channels.len() as u32;
        let p1 = e.position() as u32 + HEADER_SIZE;
        let p2 = p1 + 4 * c;
        let p3 = p2 + 12 * c;
        let p4 = p3 + self.keyframe_bytes() + self.padding;

        e.write_u32s(&[p1, c, self.skeleton_id, 0, p3, p4, c, 0])?;
        e.write_f32(self.length)?;
        e.write_u32s(&[12, self.flags, p2])?;

        for channel in &self.channels {
            e.write_u32(channel.name)?;
        }
        let stride = JointPose::SIZE * keyframe_count as u32;
        for i in 0..c {
            e.write_u32s(&[self.keyframe_offset() + i * stride, JointPose::SIZE, POSE_COMPONENTS])?;
        }
        for channel in &self.channels {
            for pose in &channel.poses {
                pose.write(e)?;
            }
        }
        e.write_padding(i64::from(self.padding))
    }

    fn computed_size(&self) -> Option<u32> {
        Some(self.keyframe_offset() + self.keyframe_bytes() + self.padding)
    }
}
