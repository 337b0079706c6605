//! Value types shared by the audio subsystems

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a moving emitter in the host game (an NPC, a projectile, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an entity ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed emission point for a positional sound.
///
/// `distance` is the attenuation distance: the range at which the sound
/// reaches the edge of the stereo field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioPoint {
    pub position: Vec3,
    pub distance: f32,
}

impl AudioPoint {
    /// Create an emission point on the ground plane (z = 0)
    pub fn new(x: f32, y: f32, distance: f32) -> Self {
        Self {
            position: Vec3::new(x, y, 0.0),
            distance,
        }
    }

    /// Create an emission point from a full 3D position
    pub fn at(position: Vec3, distance: f32) -> Self {
        Self { position, distance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_point_on_ground_plane() {
        let point = AudioPoint::new(3.0, -2.0, 15.0);
        assert_eq!(point.position, Vec3::new(3.0, -2.0, 0.0));
        assert_eq!(point.distance, 15.0);
    }

    #[test]
    fn test_entity_ids_are_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
    }
}
