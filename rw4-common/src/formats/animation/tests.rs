//! Tests for the animation clip codec

use super::*;
use crate::formats::FileType;
use crate::model::Model;

fn pose_at(time: f32) -> JointPose {
    JointPose {
        time,
        ..Default::default()
    }
}

fn zero_pose() -> JointPose {
    JointPose {
        rotation: [0.0; 4],
        translation: [0.0; 3],
        scale: [0.0; 3],
        time: 0.0,
    }
}

fn write_anim(anim: Anim) -> (Vec<u8>, u32) {
    let mut model = Model::new(FileType::Model);
    let key = model.add_object(anim, type_code::ANIM);
    let bytes = model.to_bytes().unwrap();
    let position = model.section(key).unwrap().position;
    (bytes, position)
}

fn read_anim(bytes: &[u8]) -> crate::Result<Anim> {
    let model = Model::read(bytes)?;
    let (_, anim) = model.objects_of::<Anim>().next().expect("anim section");
    Ok(anim.clone())
}

// ========================================================================
// Keyframe count inference
// ========================================================================

#[test]
fn test_single_channel_truncates_at_clip_length() {
    let anim = Anim {
        skeleton_id: 0x1234,
        length: 1.0,
        flags: 2,
        channels: vec![AnimChannel {
            name: 0xabcd,
            poses: vec![pose_at(0.0), pose_at(0.5), pose_at(1.0), zero_pose(), zero_pose()],
        }],
        padding: 0,
    };
    let (bytes, _) = write_anim(anim);

    let read = read_anim(&bytes).unwrap();
    assert_eq!(read.keyframe_count(), 3);
    assert_eq!(read.channels[0].poses[2].time, 1.0);
    // the two trailing keyframes become padding
    assert_eq!(read.padding, 2 * JointPose::SIZE);

    let mut model = Model::new(FileType::Model);
    model.add_object(read, type_code::ANIM);
    assert_eq!(model.to_bytes().unwrap(), bytes);
}

#[test]
fn test_single_channel_without_end_keyframe() {
    let anim = Anim {
        length: 2.0,
        channels: vec![AnimChannel {
            name: 1,
            poses: vec![pose_at(0.0), pose_at(1.0)],
        }],
        ..Default::default()
    };
    let (bytes, _) = write_anim(anim.clone());
    assert_eq!(read_anim(&bytes).unwrap(), anim);
}

#[test]
fn test_multi_channel_count_from_offsets() {
    let anim = Anim {
        skeleton_id: 7,
        length: 0.5,
        flags: 1,
        channels: (0..3)
            .map(|c| AnimChannel {
                name: 100 + c,
                poses: vec![pose_at(0.0), pose_at(0.5), pose_at(0.5)],
            })
            .collect(),
        padding: 16,
    };
    let (bytes, _) = write_anim(anim.clone());
    let read = read_anim(&bytes).unwrap();
    // no truncation with more than one channel, even at the clip length
    assert_eq!(read.keyframe_count(), 3);
    assert_eq!(read, anim);
}

// ========================================================================
// Validation
// ========================================================================

#[test]
fn test_channel_offset_mismatch() {
    let anim = Anim {
        length: 1.0,
        channels: (0..3)
            .map(|c| AnimChannel {
                name: c,
                poses: vec![pose_at(0.0), pose_at(1.0)],
            })
            .collect(),
        ..Default::default()
    };
    let (mut bytes, position) = write_anim(anim);
    // third channel table entry: header + 3 names + 2 entries
    let at = (position + 48 + 12 + 2 * 12) as usize;
    bytes[at] = bytes[at].wrapping_add(4);
    assert_eq!(read_anim(&bytes).unwrap_err().code(), "AN201");
}

#[test]
fn test_pose_format_checked() {
    let anim = Anim {
        length: 1.0,
        channels: vec![AnimChannel {
            name: 0,
            poses: vec![pose_at(1.0)],
        }],
        ..Default::default()
    };
    let (mut bytes, position) = write_anim(anim);
    let components = (position + 48 + 4 + 8) as usize;
    bytes[components] = 0x02;
    assert_eq!(read_anim(&bytes).unwrap_err().code(), "AN200");
}

#[test]
fn test_uneven_channels_rejected_on_write() {
    let anim = Anim {
        channels: vec![
            AnimChannel {
                name: 0,
                poses: vec![pose_at(0.0)],
            },
            AnimChannel {
                name: 1,
                poses: vec![],
            },
        ],
        ..Default::default()
    };
    let mut model = Model::new(FileType::Model);
    model.add_object(anim, type_code::ANIM);
    assert_eq!(model.to_bytes().unwrap_err().code(), "AN300");
}

// ========================================================================
// Pose
// ========================================================================

#[test]
fn test_pose_record_size() {
    let mut w = crate::stream::Rw4Writer::new(Vec::new());
    pose_at(0.25).write(&mut w).unwrap();
    assert_eq!(w.position(), u64::from(JointPose::SIZE));
}

#[test]
fn test_identity_pose_matrix() {
    let m = JointPose::default().to_matrix();
    let p = rw4_shared::Point::new(1.0, 2.0, 3.0);
    assert!((m.transform_point(p) - p).length() < 1e-12);
}
