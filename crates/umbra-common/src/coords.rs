//! World-space math helpers shared by the gameplay systems.
//!
//! Positions and facings are owned by the presentation layer; the core only
//! reads them through these helpers. All angle arguments are in degrees,
//! matching the tuning tables.

use glam::Vec3;

/// Distance between two world positions.
#[must_use]
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

/// Normalized direction from `from` to `to`, or `None` when the points
/// coincide.
#[must_use]
pub fn direction_to(from: Vec3, to: Vec3) -> Option<Vec3> {
    let delta = to - from;
    if delta.length_squared() < 1e-8 {
        None
    } else {
        Some(delta.normalize())
    }
}

/// Direction from `from` to `to` projected onto the ground plane, or `None`
/// when the points share a vertical axis.
#[must_use]
pub fn planar_direction_to(from: Vec3, to: Vec3) -> Option<Vec3> {
    let delta = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    if delta.length_squared() < 1e-8 {
        None
    } else {
        Some(delta.normalize())
    }
}

/// Angle in degrees between a facing vector and the direction toward a
/// target. Returns 180 when either vector degenerates, so degenerate input
/// never passes a field-of-view test.
#[must_use]
pub fn angle_between_deg(facing: Vec3, from: Vec3, to: Vec3) -> f32 {
    let Some(dir) = direction_to(from, to) else {
        return 180.0;
    };
    if facing.length_squared() < 1e-8 {
        return 180.0;
    }
    let cos = facing.normalize().dot(dir).clamp(-1.0, 1.0);
    cos.acos().to_degrees().clamp(0.0, 180.0)
}

/// Whether `point` lies in the rear half-space of an entity at `position`
/// facing along `facing`, within `range` distance units.
///
/// Used for the backstab-exposure window: the target has to stand behind
/// the entity and close enough to reach its back.
#[must_use]
pub fn is_behind_within(position: Vec3, facing: Vec3, point: Vec3, range: f32) -> bool {
    if distance(position, point) > range {
        return false;
    }
    angle_between_deg(facing, position, point) > 90.0
}

/// Yaw angle in degrees that faces `from` toward `to` on the ground plane.
/// Returns `None` when the positions coincide on the plane.
#[must_use]
pub fn face_toward_deg(from: Vec3, to: Vec3) -> Option<f32> {
    planar_direction_to(from, to).map(|dir| dir.x.atan2(dir.z).to_degrees())
}
