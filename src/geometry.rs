//! Placement of generated proxies relative to their bone.
//!
//! Bone-local space runs +Y from head to tail. Proxy objects are built with +X as their forward
//! axis, so every bone-space vector that ends up inside a proxy goes through
//! [`bone_to_object_space`]. Bone-parented (passive) proxies are positioned relative to the
//! bone tail, in bone-local axes; armature-parented (active) proxies live in armature space.
//!
//! Everything here is pure: identical inputs give bit-identical outputs, which the scheduler
//! relies on to converge.

use crate::model::{BodyType, BoneRigidBodyData, Euler};
use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Hitbox cross-section relative to the bone length, in bone-local axes.
pub const HITBOX_PROFILE: Vec3 = Vec3::new(0.5, 1.0, 0.5);

/// Head, tail and orientation of a bone in armature space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub head: Vec3,
    pub tail: Vec3,
    /// Maps bone-local axes onto armature axes.
    pub rotation: Quat,
}

impl BonePose {
    pub fn new(head: Vec3, tail: Vec3, rotation: Quat) -> Self {
        Self { head, tail, rotation }
    }

    /// Orientation derived from the head-to-tail direction, rolled about the bone axis.
    pub fn from_head_tail(head: Vec3, tail: Vec3, roll: f32) -> Self {
        let direction = (tail - head).normalize_or_zero();
        let align = if direction == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_arc(Vec3::Y, direction)
        };
        Self { head, tail, rotation: align * Quat::from_rotation_y(roll) }
    }

    pub fn length(&self) -> f32 {
        self.head.distance(self.tail)
    }

    pub fn center(&self) -> Vec3 {
        (self.head + self.tail) * 0.5
    }

    /// Bone center expressed in the tail-relative frame used by bone-parented proxies.
    pub fn local_center(&self) -> Vec3 {
        Vec3::new(0.0, -self.length() * 0.5, 0.0)
    }
}

/// Rotation taking proxy axes onto bone axes (proxy +X becomes bone +Y).
pub fn axis_conversion() -> Quat {
    Quat::from_rotation_z(FRAC_PI_2)
}

/// Re-expresses a bone-local vector in proxy axes. Exact inverse of [`axis_conversion`].
pub fn bone_to_object_space(v: Vec3) -> Vec3 {
    Vec3::new(v.y, -v.x, v.z)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxPlacement {
    pub location: Vec3,
    pub rotation: Euler,
    pub dimensions: Vec3,
}

pub fn hitbox_dimensions(pose: &BonePose, data: &BoneRigidBodyData) -> Vec3 {
    let extents = data.scale * HITBOX_PROFILE * pose.length();
    bone_to_object_space(extents).abs()
}

pub fn hitbox_location(pose: &BonePose, data: &BoneRigidBodyData, body_type: BodyType) -> Vec3 {
    let length = pose.length();
    let pivot = length * (data.origin - 0.5);

    let mut location = data.rotation.to_quat() * Vec3::new(0.0, -pivot * data.scale.y, 0.0);
    location.y += pivot - length * 0.5;
    location += data.location;

    match body_type {
        BodyType::Passive => location,
        BodyType::Active => pose.tail + pose.rotation * location,
    }
}

pub fn hitbox_rotation(pose: &BonePose, data: &BoneRigidBodyData, body_type: BodyType) -> Euler {
    let user = data.rotation.to_quat();
    let rotation = match body_type {
        BodyType::Active => pose.rotation * user * axis_conversion(),
        BodyType::Passive => user * axis_conversion(),
    };
    Euler::from_quat(rotation)
}

pub fn hitbox_placement(pose: &BonePose, data: &BoneRigidBodyData, body_type: BodyType) -> HitboxPlacement {
    HitboxPlacement {
        location: hitbox_location(pose, data, body_type),
        rotation: hitbox_rotation(pose, data, body_type),
        dimensions: hitbox_dimensions(pose, data),
    }
}

/// Constraint anchors sit at the bone center, shifted by the bone-local `location` offset.
pub fn constraint_location(pose: &BonePose, data: &BoneRigidBodyData) -> Vec3 {
    pose.center() + pose.rotation * data.location
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upright(length: f32) -> BonePose {
        BonePose::from_head_tail(Vec3::ZERO, Vec3::new(0.0, 0.0, length), 0.0)
    }

    #[test]
    fn object_space_conversion_inverts_axis_rotation() {
        let v = Vec3::new(0.25, -1.5, 3.0);
        let rotated = axis_conversion() * bone_to_object_space(v);
        assert!(rotated.abs_diff_eq(v, 1e-6));
    }

    #[test]
    fn from_head_tail_points_bone_y_at_tail() {
        let pose = upright(2.0);
        assert!((pose.rotation * Vec3::Y).abs_diff_eq(Vec3::Z, 1e-6));
        assert_eq!(pose.length(), 2.0);
        assert_eq!(pose.center(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn degenerate_bone_keeps_identity_orientation() {
        let pose = BonePose::from_head_tail(Vec3::ONE, Vec3::ONE, 0.0);
        assert_eq!(pose.rotation, Quat::IDENTITY);
        assert_eq!(hitbox_dimensions(&pose, &BoneRigidBodyData::default()), Vec3::ZERO);
    }

    #[test]
    fn active_rotation_forward_axis_follows_bone() {
        let pose = upright(1.0);
        let data = BoneRigidBodyData::default();
        let rotation = hitbox_rotation(&pose, &data, BodyType::Active).to_quat();
        assert!((rotation * Vec3::X).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn passive_rotation_forward_axis_is_bone_local_y() {
        let pose = upright(1.0);
        let data = BoneRigidBodyData::default();
        let rotation = hitbox_rotation(&pose, &data, BodyType::Passive).to_quat();
        assert!((rotation * Vec3::X).abs_diff_eq(Vec3::Y, 1e-5));
    }
}
