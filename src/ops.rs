//! One-shot operations on bone records: mass from hitbox volume and copying settings.

use crate::error::{RigError, RigResult};
use crate::geometry::hitbox_dimensions;
use crate::host::{BoneId, SkeletonHost};
use crate::model::CollisionShape;
use glam::Vec3;
use std::f32::consts::PI;

/// Volume of a collision shape fitted to hitbox `dimensions` (proxy axes, +X along the bone).
/// Hull and mesh shapes use the bounding box.
pub fn shape_volume(dimensions: Vec3, shape: CollisionShape) -> f32 {
    let length = dimensions.x;
    let radius = dimensions.y.max(dimensions.z) * 0.5;
    match shape {
        CollisionShape::Box | CollisionShape::ConvexHull | CollisionShape::Mesh => {
            dimensions.x * dimensions.y * dimensions.z
        }
        CollisionShape::Sphere => {
            let radius = dimensions.max_element() * 0.5;
            4.0 / 3.0 * PI * radius.powi(3)
        }
        CollisionShape::Capsule => {
            let body = (length - 2.0 * radius).max(0.0);
            PI * radius * radius * body + 4.0 / 3.0 * PI * radius.powi(3)
        }
        CollisionShape::Cylinder => PI * radius * radius * length,
        CollisionShape::Cone => PI * radius * radius * length / 3.0,
    }
}

pub fn calculate_mass(dimensions: Vec3, shape: CollisionShape, density: f32) -> f32 {
    shape_volume(dimensions, shape) * density
}

/// Mass the bone's hitbox would have at `density`, from its current pose and settings.
pub fn calculate_bone_mass<H: SkeletonHost + ?Sized>(host: &H, bone: BoneId, density: f32) -> RigResult<f32> {
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = host.bone_data(bone).ok_or(RigError::UnknownBone(bone))?;
    Ok(calculate_mass(hitbox_dimensions(&pose, data), data.collision_shape, density))
}

/// Writes the calculated mass into each bone's rigid-body parameters. Returns the masses in
/// the order given.
pub fn apply_calculated_mass<H: SkeletonHost + ?Sized>(
    host: &mut H,
    bones: &[BoneId],
    density: f32,
) -> RigResult<Vec<f32>> {
    let mut masses = Vec::with_capacity(bones.len());
    for &bone in bones {
        let mass = calculate_bone_mass(host, bone, density)?;
        host.bone_data_mut(bone).ok_or(RigError::UnknownBone(bone))?.rigid_body.mass = mass;
        masses.push(mass);
    }
    Ok(masses)
}

/// Copies physics settings from `source` onto every other bone in `targets`.
pub fn copy_settings<H: SkeletonHost + ?Sized>(
    host: &mut H,
    source: BoneId,
    targets: &[BoneId],
) -> RigResult<usize> {
    let settings = host.bone_data(source).ok_or(RigError::UnknownBone(source))?.clone();
    let mut copied = 0;
    for &bone in targets.iter().filter(|bone| **bone != source) {
        host.bone_data_mut(bone).ok_or(RigError::UnknownBone(bone))?.copy_settings_from(&settings);
        copied += 1;
    }
    Ok(copied)
}
