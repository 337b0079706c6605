//! Listener-relative panning and gain

use glam::Vec3;
use soundstage_core::{stereo_displacement, AudioPoint, StereoPoint};

/// Listener state for positional audio calculations.
///
/// Supplied by the host and only ever read by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Listener {
    pub position: Vec3,
}

impl Listener {
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }
}

/// Parameters computed for a positional sound relative to the listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoPlacement {
    /// Per-axis pan pushed to the playback engine, each in `[-1, 1]`
    pub pan: StereoPoint,
    /// Output gain (0.0–1.0)
    pub gain: f32,
}

/// Compute the stereo placement of an emitter for the current listener.
///
/// `relative_volume` narrows the audible range (`distance * volume`);
/// the output gain is `(1 - |pan.z|) * global_volume`. Since `pan.z` is
/// always zero, gain does not fall off with distance: attenuation is left
/// to the engine's own panning.
pub fn compute_placement(
    listener: &Listener,
    emitter: &AudioPoint,
    relative_volume: f32,
    global_volume: f32,
) -> StereoPlacement {
    let pan = stereo_displacement(
        listener.position,
        emitter.position,
        relative_volume,
        emitter.distance,
    );

    StereoPlacement {
        pan,
        gain: (1.0 - pan.z.abs()) * global_volume,
    }
}
