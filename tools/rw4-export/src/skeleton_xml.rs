//! Ogre skeleton XML and the raw animation dump
//!
//! RW4 stores one inverse bind matrix per joint. The Ogre skeleton wants
//! each bone relative to its parent, so for joint `j` with parent `p`:
//!
//! ```text
//! bind(j)     = inverse(inv_bind(j))
//! relative(j) = inv_bind(p) * bind(j)        (bind(j) for a root)
//! bone        = position relative.column(3), rotation -relative.rotation
//! ```
//!
//! Keyframes are expressed against the same relative bind: with
//! `pose = T(translation) * conjugate(rotation)`, a key rotates by
//! `-(inverse(relative) * pose).rotation` and translates by
//! `pose.column(3) - relative.column(3)`. These sign and inversion choices
//! are what existing skeleton consumers expect; keep them as they are.

use anyhow::Result;
use hashbrown::HashMap;

use rw4_common::{Anim, HierarchyInfo, Mat4x4, Matrices, Model, ObjectLookup, POSE_COMPONENTS, Skeleton};
use rw4_shared::{NameLookup, Quaternion, TMatrix, Vector};

use crate::error::ExportError;
use crate::xml::Element;

/// A skeleton's joints with their decoded bind matrices
pub struct BindPose<'a> {
    pub skeleton: &'a Skeleton,
    pub hierarchy: &'a HierarchyInfo,
    /// Inverse bind matrices as stored
    pub raw: &'a [Mat4x4],
    inverse_binds: Vec<TMatrix>,
    joint_by_name: HashMap<u32, usize>,
}

impl<'a> BindPose<'a> {
    pub fn new(model: &'a Model, skeleton: &'a Skeleton) -> Result<Self> {
        let hierarchy = model.lookup::<HierarchyInfo>(skeleton.joints)?;
        let raw: &[Mat4x4] = &model.lookup::<Matrices<Mat4x4>>(skeleton.mat4)?.items;
        if raw.len() < hierarchy.items.len() {
            return Err(ExportError::BindMatrixCount {
                joints: hierarchy.items.len(),
                matrices: raw.len(),
            }
            .into());
        }
        // stored bottom row is (0, 0, ?, 0)
        if let Some(i) = raw
            .iter()
            .position(|m| m.m[3] != 0.0 || m.m[7] != 0.0 || m.m[15] != 0.0)
        {
            return Err(ExportError::ExtraMatrixCells(i).into());
        }
        let joint_count = hierarchy.items.len();
        for (joint, item) in hierarchy.items.iter().enumerate() {
            if let Some(parent) = item.parent
                && parent >= joint_count
            {
                return Err(ExportError::ParentOutOfRange { joint, parent }.into());
            }
        }
        let inverse_binds = raw.iter().map(|m| TMatrix::from_f32_array(&m.m)).collect();
        let joint_by_name = hierarchy
            .items
            .iter()
            .enumerate()
            .map(|(i, joint)| (joint.name_fnv, i))
            .collect();
        Ok(Self {
            skeleton,
            hierarchy,
            raw,
            inverse_binds,
            joint_by_name,
        })
    }

    pub fn bind(&self, joint: usize) -> TMatrix {
        self.inverse_binds[joint].inverse()
    }

    /// Bind transform of every joint relative to its parent. Parent
    /// indices were range-checked in [`BindPose::new`].
    pub fn relative_binds(&self) -> Vec<TMatrix> {
        self.hierarchy
            .items
            .iter()
            .enumerate()
            .map(|(i, joint)| match joint.parent {
                Some(parent) => self.inverse_binds[parent] * self.bind(i),
                None => self.bind(i),
            })
            .collect()
    }

    pub fn joint_index(&self, name_fnv: u32) -> Result<usize, ExportError> {
        self.joint_by_name
            .get(&name_fnv)
            .copied()
            .ok_or(ExportError::UnknownJoint(name_fnv))
    }
}

/// Animations carry no name of their own in the file
pub fn animation_name(index: usize) -> String {
    format!("anim{index}")
}

fn vector(name: &str, v: Vector) -> Element {
    Element::new(name).xyz(v.to_array())
}

fn angle_axis(name: &str, axis_name: &str, q: Quaternion) -> Element {
    Element::new(name)
        .attr("angle", q.angle())
        .child(vector(axis_name, q.axis()))
}

// ============================================================================
// Ogre skeleton
// ============================================================================

/// Ogre skeleton of `skeleton`, with every animation of the model
pub fn skeleton_document(
    model: &Model,
    skeleton: &Skeleton,
    names: &impl NameLookup,
) -> Result<Element> {
    let pose = BindPose::new(model, skeleton)?;
    let relative = pose.relative_binds();
    let joints = &pose.hierarchy.items;

    let mut bones = Vec::with_capacity(joints.len());
    for (i, joint) in joints.iter().enumerate() {
        let rel = relative[i];
        let rotation = -rel.get_rotation()?;
        bones.push(
            Element::new("bone")
                .attr("id", i)
                .attr("name", names.to_name(joint.name_fnv))
                .child(vector("position", rel.column(3)))
                .child(angle_axis("rotation", "axis", rotation)),
        );
    }

    let hierarchy = joints.iter().filter_map(|joint| {
        let parent = joints.get(joint.parent?)?;
        Some(
            Element::new("boneparent")
                .attr("bone", names.to_name(joint.name_fnv))
                .attr("parent", names.to_name(parent.name_fnv)),
        )
    });

    let mut animations = Vec::new();
    for (index, (_, anim)) in model.objects_of::<Anim>().enumerate() {
        animations.push(animation_element(index, anim, &pose, &relative, names)?);
    }

    Ok(Element::new("skeleton")
        .child(Element::new("bones").children(bones))
        .child(Element::new("bonehierarchy").children(hierarchy))
        .child(Element::new("animations").children(animations)))
}

fn animation_element(
    index: usize,
    anim: &Anim,
    pose: &BindPose<'_>,
    relative: &[TMatrix],
    names: &impl NameLookup,
) -> Result<Element> {
    let mut tracks = Vec::with_capacity(anim.channels.len());
    for channel in &anim.channels {
        let rel = relative[pose.joint_index(channel.name)?];
        let bind_rotation = rel.inverse();
        let bind_position = rel.column(3);

        let mut keyframes = Vec::with_capacity(channel.poses.len());
        for key in &channel.poses {
            let matrix = key.to_matrix();
            let rotation = -(bind_rotation * matrix).get_rotation()?;
            let translation = matrix.column(3) - bind_position;
            keyframes.push(
                Element::new("keyframe")
                    .attr("time", key.time)
                    .child(vector("translate", translation))
                    .child(angle_axis("rotate", "axis", rotation))
                    .child(Element::new("scale").xyz(key.scale)),
            );
        }

        tracks.push(
            Element::new("track")
                .attr("bone", names.to_name(channel.name))
                .child(Element::new("keyframes").children(keyframes)),
        );
    }

    Ok(Element::new("animation")
        .attr("name", animation_name(index))
        .attr("length", anim.length)
        .child(Element::new("tracks").children(tracks)))
}

// ============================================================================
// Raw animation info
// ============================================================================

/// Stored animation and skeleton values, for inspection
pub fn animation_info_document(model: &Model, names: &impl NameLookup) -> Result<Element> {
    let anims = model
        .objects_of::<Anim>()
        .enumerate()
        .map(|(index, (_, anim))| raw_anim(index, anim, names));

    let mut skeletons = Vec::new();
    for (_, skeleton) in model.objects_of::<Skeleton>() {
        skeletons.push(raw_skeleton(&BindPose::new(model, skeleton)?, names)?);
    }

    Ok(Element::new("raw_animation_info")
        .child(Element::new("anims").children(anims))
        .child(Element::new("skeletons").children(skeletons)))
}

fn raw_anim(index: usize, anim: &Anim, names: &impl NameLookup) -> Element {
    let channels = anim.channels.iter().map(|channel| {
        let frames = channel.poses.iter().map(|pose| {
            let [x, y, z, s] = pose.rotation;
            Element::new("frame")
                .attr("time", pose.time)
                .child(Element::new("Translation").xyz(pose.translation))
                .child(
                    Element::new("Rotation")
                        .xyz([x, y, z])
                        .attr("s", s),
                )
                .child(Element::new("Scale").xyz(pose.scale))
        });
        Element::new("channel")
            .attr("name", names.to_name(channel.name))
            .child(Element::new("frames").children(frames))
    });

    Element::new("anim")
        .attr("name", animation_name(index))
        .attr("flags", format!("0x{:X}", anim.flags))
        .attr("length", anim.length)
        .attr("skeleton", names.to_name(anim.skeleton_id))
        .attr("components", format!("0x{POSE_COMPONENTS:X}"))
        .attr("padding", anim.padding)
        .child(Element::new("channels").children(channels))
}

fn raw_skeleton(pose: &BindPose<'_>, names: &impl NameLookup) -> Result<Element> {
    let joints = &pose.hierarchy.items;
    let mut elements = Vec::with_capacity(joints.len());
    for (i, joint) in joints.iter().enumerate() {
        let bind = pose.bind(i);
        let rotation = bind.inverse().get_rotation()?;
        let axis = rotation.axis().to_array();
        let m = &pose.raw[i].m;

        let mut element = Element::new("joint")
            .attr("name", names.to_name(joint.name_fnv))
            .attr("flags", format!("0x{:X}", joint.flags));
        if let Some(parent) = joint.parent.and_then(|p| joints.get(p)) {
            element = element.attr("parent", names.to_name(parent.name_fnv));
        }
        elements.push(
            element
                .child(
                    Element::new("Transform")
                        .child(vector("position", bind.column(3)))
                        .child(
                            Element::new("rotation")
                                .attr("angle", rotation.angle())
                                .xyz(axis),
                        ),
                )
                .child(
                    Element::new("RawInverseBindMatrix")
                        .child(Element::new("rx").xyz([m[0], m[1], m[2]]))
                        .child(Element::new("ry").xyz([m[4], m[5], m[6]]))
                        .child(Element::new("rz").xyz([m[8], m[9], m[10]]))
                        .child(Element::new("t").xyz([m[12], m[13], m[14]])),
                ),
        );
    }

    Ok(Element::new("skeleton")
        .attr("name", names.to_name(pose.hierarchy.id))
        .attr("unk1", format!("0x{:X}", pose.skeleton.unk1))
        .child(Element::new("joints").children(elements)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw4_common::{AnimChannel, FileType, Joint, JointPose, Mat4x3, type_code};
    use rw4_shared::{NameRegistry, fnv_hash};
    use std::f64::consts::FRAC_PI_2;

    fn stored(inverse_bind: TMatrix) -> Mat4x4 {
        let mut m = inverse_bind.to_cols_array().map(|v| v as f32);
        m[15] = 0.0;
        Mat4x4 { m }
    }

    /// Root at (0, 0, 1); child one unit along x from it, turned 90° about z
    fn model_with_skeleton(channel_name: u32) -> Model {
        let root_bind = TMatrix::translation(Vector::new(0.0, 0.0, 1.0));
        let child_bind = root_bind
            * TMatrix::translation(Vector::new(1.0, 0.0, 0.0))
            * Quaternion::new(FRAC_PI_2, Vector::Z).to_matrix();

        let mut model = Model::new(FileType::Model);
        model.add_object(
            Anim {
                skeleton_id: fnv_hash("skeleton1"),
                length: 1.0,
                flags: 3,
                channels: vec![AnimChannel {
                    name: channel_name,
                    poses: vec![
                        JointPose {
                            translation: [0.0, 0.0, 1.0],
                            ..Default::default()
                        },
                        JointPose {
                            translation: [0.0, 0.0, 2.0],
                            time: 1.0,
                            ..Default::default()
                        },
                    ],
                }],
                padding: 0,
            },
            type_code::ANIM,
        );
        let mat4 = model.add_object(
            Matrices::new(vec![stored(root_bind.inverse()), stored(child_bind.inverse())]),
            type_code::MATRICES_4X4,
        );
        let mat3 = model.add_object(
            Matrices::new(vec![Mat4x3::default(); 2]),
            type_code::MATRICES_4X3,
        );
        let joints = model.add_object(
            HierarchyInfo {
                id: fnv_hash("skeleton1"),
                items: vec![
                    Joint {
                        name_fnv: fnv_hash("root"),
                        flags: 1,
                        parent: None,
                    },
                    Joint {
                        name_fnv: fnv_hash("child"),
                        flags: 2,
                        parent: Some(0),
                    },
                ],
            },
            type_code::HIERARCHY_INFO,
        );
        model.add_object(Skeleton::new(mat3, joints, mat4), type_code::SKELETON);
        model
    }

    fn names() -> NameRegistry {
        let mut names = NameRegistry::new();
        names
            .load_str("root\nchild\nskeleton1\n", true)
            .unwrap();
        names
    }

    fn float(e: &Element, key: &str) -> f64 {
        e.get(key).unwrap().parse().unwrap()
    }

    fn skeleton_of(model: &Model) -> &Skeleton {
        model.objects_of::<Skeleton>().next().unwrap().1
    }

    // ========================================================================
    // Ogre skeleton
    // ========================================================================

    #[test]
    fn test_bones_relative_to_parent() {
        let model = model_with_skeleton(fnv_hash("root"));
        let doc = skeleton_document(&model, skeleton_of(&model), &names()).unwrap();
        let bones: Vec<_> = doc.find("bones").unwrap().elements("bone").collect();
        assert_eq!(bones.len(), 2);

        let root = bones[0];
        assert_eq!(root.get("name"), Some("root"));
        let position = root.find("position").unwrap();
        assert!((float(position, "z") - 1.0).abs() < 1e-6);
        assert!(float(root.find("rotation").unwrap(), "angle").abs() < 1e-6);

        let child = bones[1];
        let position = child.find("position").unwrap();
        assert!((float(position, "x") - 1.0).abs() < 1e-6);
        assert!(float(position, "z").abs() < 1e-6);
        let rotation = child.find("rotation").unwrap();
        assert!((float(rotation, "angle") - FRAC_PI_2).abs() < 1e-5);
        let axis = rotation.find("axis").unwrap();
        assert!((float(axis, "z").abs() - 1.0).abs() < 1e-5);

        let parents: Vec<_> = doc
            .find("bonehierarchy")
            .unwrap()
            .elements("boneparent")
            .collect();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].get("bone"), Some("child"));
        assert_eq!(parents[0].get("parent"), Some("root"));
    }

    #[test]
    fn test_keyframes_against_bind() {
        let model = model_with_skeleton(fnv_hash("root"));
        let doc = skeleton_document(&model, skeleton_of(&model), &names()).unwrap();
        let animation = doc.find("animations").unwrap().find("animation").unwrap();
        assert_eq!(animation.get("name"), Some("anim0"));
        let track = animation.find("tracks").unwrap().find("track").unwrap();
        assert_eq!(track.get("bone"), Some("root"));

        let keys: Vec<_> = track.find("keyframes").unwrap().elements("keyframe").collect();
        assert_eq!(keys.len(), 2);
        // first key sits exactly on the bind pose
        let translate = keys[0].find("translate").unwrap();
        assert!(float(translate, "z").abs() < 1e-9);
        assert!(float(keys[0].find("rotate").unwrap(), "angle").abs() < 1e-6);
        let translate = keys[1].find("translate").unwrap();
        assert!((float(translate, "z") - 1.0).abs() < 1e-6);
        assert_eq!(keys[1].find("scale").unwrap().get("x"), Some("1"));
    }

    #[test]
    fn test_channel_for_unknown_joint() {
        let model = model_with_skeleton(0xdead);
        let err = skeleton_document(&model, skeleton_of(&model), &names()).unwrap_err();
        assert_eq!(crate::error::error_code(&err), "EX004");
    }

    // ========================================================================
    // Raw animation info
    // ========================================================================

    #[test]
    fn test_raw_info() {
        let model = model_with_skeleton(fnv_hash("root"));
        let doc = animation_info_document(&model, &names()).unwrap();

        let anim = doc.find("anims").unwrap().find("anim").unwrap();
        assert_eq!(anim.get("flags"), Some("0x3"));
        assert_eq!(anim.get("skeleton"), Some("skeleton1"));
        assert_eq!(anim.get("components"), Some("0x601"));

        let skeleton = doc.find("skeletons").unwrap().find("skeleton").unwrap();
        assert_eq!(skeleton.get("unk1"), Some("0x8D6DA0"));
        let joints: Vec<_> = skeleton.find("joints").unwrap().elements("joint").collect();
        assert_eq!(joints[0].get("parent"), None);
        assert_eq!(joints[1].get("parent"), Some("root"));

        let raw = joints[0].find("RawInverseBindMatrix").unwrap();
        assert_eq!(raw.find("t").unwrap().get("z"), Some("-1"));
        let transform = joints[0].find("Transform").unwrap();
        assert!((float(transform.find("position").unwrap(), "z") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_too_few_bind_matrices() {
        let mut model = model_with_skeleton(fnv_hash("root"));
        let mat4 = skeleton_of(&model).mat4;
        model
            .object_mut::<Matrices<Mat4x4>>(mat4)
            .unwrap()
            .items
            .pop();
        let err = animation_info_document(&model, &names()).unwrap_err();
        assert_eq!(crate::error::error_code(&err), "EX005");
    }

    #[test]
    fn test_bind_matrix_extra_cells() {
        let mut model = model_with_skeleton(fnv_hash("root"));
        let mat4 = skeleton_of(&model).mat4;
        model.object_mut::<Matrices<Mat4x4>>(mat4).unwrap().items[1].m[15] = 1.0;
        let err = animation_info_document(&model, &names()).unwrap_err();
        assert_eq!(crate::error::error_code(&err), "EX006");
    }

    #[test]
    fn test_parent_outside_skeleton() {
        let mut model = model_with_skeleton(fnv_hash("root"));
        let joints = skeleton_of(&model).joints;
        model.object_mut::<HierarchyInfo>(joints).unwrap().items[1].parent = Some(7);
        let err = skeleton_document(&model, skeleton_of(&model), &names()).unwrap_err();
        assert_eq!(crate::error::error_code(&err), "EX007");
        let err = animation_info_document(&model, &names()).unwrap_err();
        assert_eq!(crate::error::error_code(&err), "EX007");
    }
}
