use crate::error::{RigError, RigResult};
use crate::host::ProxyHandle;
use glam::{EulerRot, Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyType {
    /// Driven by the solver, writes back onto the bone.
    #[default]
    Active,
    /// Driven by the bone, read-only to the solver.
    Passive,
}

impl BodyType {
    pub fn label(self) -> &'static str {
        match self {
            BodyType::Active => "active",
            BodyType::Passive => "passive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionShape {
    #[default]
    Box,
    Sphere,
    Capsule,
    Cylinder,
    Cone,
    ConvexHull,
    Mesh,
}

impl CollisionShape {
    pub fn label(self) -> &'static str {
        match self {
            CollisionShape::Box => "box",
            CollisionShape::Sphere => "sphere",
            CollisionShape::Capsule => "capsule",
            CollisionShape::Cylinder => "cylinder",
            CollisionShape::Cone => "cone",
            CollisionShape::ConvexHull => "convex_hull",
            CollisionShape::Mesh => "mesh",
        }
    }

    /// Primitive shapes are displayed as their bounds; hull and mesh shapes as wireframe.
    pub fn shows_bounds(self) -> bool {
        !matches!(self, CollisionShape::ConvexHull | CollisionShape::Mesh)
    }
}

/// XYZ Euler angles in radians, applied X first.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Euler {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Euler {
    pub const IDENTITY: Euler = Euler { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.z, self.y, self.x)
    }

    /// Decomposes through the rotation matrix so orientations at gimbal lock (Y at +-90
    /// degrees, e.g. every upright bone's active hitbox) still round-trip.
    pub fn from_quat(rotation: Quat) -> Self {
        let m = Mat3::from_quat(rotation.normalize());
        let cy = m.x_axis.x.hypot(m.x_axis.y);
        if cy > 16.0 * f32::EPSILON {
            Self {
                x: m.y_axis.z.atan2(m.z_axis.z),
                y: (-m.x_axis.z).atan2(cy),
                z: m.x_axis.y.atan2(m.x_axis.x),
            }
        } else {
            Self { x: (-m.z_axis.y).atan2(m.y_axis.y), y: (-m.x_axis.z).atan2(cy), z: 0.0 }
        }
    }
}

/// Parameters handed to the physics engine for a hitbox body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyParams {
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub use_margin: bool,
    pub collision_margin: f32,
    /// One bit per collision group; bit 0 is the first group.
    pub collision_groups: u32,
    pub use_deactivation: bool,
    pub use_start_deactivated: bool,
    pub deactivate_linear_velocity: f32,
    pub deactivate_angular_velocity: f32,
}

impl Default for RigidBodyParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
            linear_damping: 0.04,
            angular_damping: 0.1,
            use_margin: false,
            collision_margin: 0.04,
            collision_groups: 1,
            use_deactivation: false,
            use_start_deactivated: false,
            deactivate_linear_velocity: 0.4,
            deactivate_angular_velocity: 0.5,
        }
    }
}

/// Parameters handed to the physics engine for a fixed joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintParams {
    pub disable_collisions: bool,
    pub use_breaking: bool,
    pub breaking_threshold: f32,
    pub use_override_solver_iterations: bool,
    pub solver_iterations: u32,
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self {
            disable_collisions: true,
            use_breaking: false,
            breaking_threshold: 10.0,
            use_override_solver_iterations: false,
            solver_iterations: 10,
        }
    }
}

/// Handle of a generated hitbox plus the body type it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitboxRef {
    pub handle: ProxyHandle,
    pub body_type: BodyType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedParent {
    /// Empty when the bone had no parent.
    pub name: String,
    pub use_connect: bool,
}

impl SavedParent {
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}

/// Physics record attached to every bone and persisted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneRigidBodyData {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub body_type: BodyType,
    pub collision_shape: CollisionShape,
    pub location: Vec3,
    pub rotation: Euler,
    pub scale: Vec3,
    /// Pivot along the bone: 0 is the head, 1 the tail.
    pub origin: f32,
    pub rigid_body: RigidBodyParams,
    pub rigid_body_constraint: ConstraintParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hitbox: Option<HitboxRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ProxyHandle>,
    /// Name remembered when this bone became another bone's saved parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_parent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_use_connect: Option<bool>,
}

impl Default for BoneRigidBodyData {
    fn default() -> Self {
        Self {
            enabled: false,
            body_type: BodyType::Active,
            collision_shape: CollisionShape::Box,
            location: Vec3::ZERO,
            rotation: Euler::IDENTITY,
            scale: Vec3::ONE,
            origin: 0.5,
            rigid_body: RigidBodyParams::default(),
            rigid_body_constraint: ConstraintParams::default(),
            hitbox: None,
            constraint: None,
            name: None,
            saved_parent_name: None,
            saved_use_connect: None,
        }
    }
}

impl BoneRigidBodyData {
    pub fn enabled_as(body_type: BodyType) -> Self {
        Self { enabled: true, body_type, ..Self::default() }
    }

    pub fn is_active_body(&self) -> bool {
        self.enabled && self.body_type == BodyType::Active
    }

    /// Saved parent fields, checked for pairing. `bone` only labels the error.
    pub fn saved_parent(&self, bone: &str) -> RigResult<Option<SavedParent>> {
        match (&self.saved_parent_name, self.saved_use_connect) {
            (Some(name), Some(use_connect)) => Ok(Some(SavedParent { name: name.clone(), use_connect })),
            (None, None) => Ok(None),
            (name, connect) => Err(RigError::UnpairedSavedParent {
                bone: bone.to_string(),
                name_set: name.is_some(),
                connect_set: connect.is_some(),
            }),
        }
    }

    /// True when either saved field is present.
    pub fn has_saved_parent(&self) -> bool {
        self.saved_parent_name.is_some() || self.saved_use_connect.is_some()
    }

    pub(crate) fn set_saved_parent(&mut self, saved: SavedParent) {
        self.saved_parent_name = Some(saved.name);
        self.saved_use_connect = Some(saved.use_connect);
    }

    pub(crate) fn clear_saved_parent(&mut self) {
        self.saved_parent_name = None;
        self.saved_use_connect = None;
    }

    /// Copies user-editable settings, leaving owned handles and hierarchy state untouched.
    pub fn copy_settings_from(&mut self, other: &BoneRigidBodyData) {
        self.enabled = other.enabled;
        self.body_type = other.body_type;
        self.collision_shape = other.collision_shape;
        self.location = other.location;
        self.rotation = other.rotation;
        self.scale = other.scale;
        self.origin = other.origin;
        self.rigid_body = other.rigid_body;
        self.rigid_body_constraint = other.rigid_body_constraint;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_parent_pairs_round_trip() {
        let mut data = BoneRigidBodyData::default();
        assert_eq!(data.saved_parent("Arm").unwrap(), None);
        data.set_saved_parent(SavedParent { name: "Spine".into(), use_connect: true });
        let saved = data.saved_parent("Arm").unwrap().expect("saved parent present");
        assert_eq!(saved.name, "Spine");
        assert!(saved.use_connect);
        data.clear_saved_parent();
        assert!(!data.has_saved_parent());
    }

    #[test]
    fn unpaired_fields_from_disk_are_rejected() {
        let data: BoneRigidBodyData =
            serde_json::from_str(r#"{ "enabled": true, "saved_parent_name": "Spine" }"#)
                .expect("parse record");
        let err = data.saved_parent("Arm").unwrap_err();
        assert_eq!(
            err,
            RigError::UnpairedSavedParent { bone: "Arm".into(), name_set: true, connect_set: false }
        );
    }

    #[test]
    fn record_defaults_fill_missing_fields() {
        let data: BoneRigidBodyData = serde_json::from_str(r#"{ "type": "PASSIVE" }"#).expect("parse record");
        assert_eq!(data.body_type, BodyType::Passive);
        assert_eq!(data.scale, Vec3::ONE);
        assert_eq!(data.origin, 0.5);
        assert!(!data.enabled);
    }

    #[test]
    fn euler_matches_x_then_y_then_z() {
        let euler = Euler::new(0.3, -0.2, 1.1);
        let expected =
            Quat::from_rotation_z(1.1) * Quat::from_rotation_y(-0.2) * Quat::from_rotation_x(0.3);
        assert!(euler.to_quat().abs_diff_eq(expected, 1e-6));
        let back = Euler::from_quat(euler.to_quat());
        assert!((back.x - 0.3).abs() < 1e-5);
        assert!((back.y + 0.2).abs() < 1e-5);
        assert!((back.z - 1.1).abs() < 1e-5);
    }

    #[test]
    fn euler_survives_gimbal_lock() {
        let rotation = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)
            * Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let back = Euler::from_quat(rotation).to_quat();
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            assert!((back * axis).abs_diff_eq(rotation * axis, 1e-5), "axis {axis:?} diverged");
        }
    }
}
