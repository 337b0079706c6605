//! Planar distance and stereo displacement helpers

use glam::Vec3;

/// Per-axis stereo pan, each component in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl StereoPoint {
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Euclidean distance between two points on the x/y plane.
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    distance_xy(a.x, a.y, b.x, b.y)
}

pub fn distance_xy(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    length_of_xy(ax - bx, ay - by)
}

pub fn length_of_xy(dx: f32, dy: f32) -> f32 {
    (dx * dx + dy * dy).sqrt()
}

/// Clamp to `[-1, 1]`. A NaN ratio (zero over zero) collapses to center.
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Stereo displacement of `emitter` as heard from `listener`.
///
/// The audible range is `distance * volume`; each axis is the listener to
/// emitter offset divided by that range, clamped and negated so an emitter to
/// the right of the listener pans right.
///
/// The z offset is taken between the listener and itself, so `z` is always
/// zero and vertical separation never attenuates. Callers depend on this.
pub fn stereo_displacement(listener: Vec3, emitter: Vec3, volume: f32, distance: f32) -> StereoPoint {
    let max_distance = distance * volume;

    let dist_x = listener.x - emitter.x;
    let dist_y = listener.y - emitter.y;
    // FIXME: listener minus listener; vertical distance is ignored.
    let dist_z = listener.z - listener.z;

    StereoPoint {
        x: -clamp_unit(dist_x / max_distance),
        y: -clamp_unit(dist_y / max_distance),
        z: -clamp_unit(dist_z / max_distance),
    }
}
