//! Contracts for the collaborators that actually make sound.
//!
//! The subsystems in this crate only orchestrate: decoding, mixing and
//! oscillator synthesis live behind these traits. [`kira`] provides
//! implementations on top of the kira audio library.

pub mod kira;

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::sprite::SpriteTable;

/// Playback handle assigned by a [`PlaybackEngine`].
///
/// Unique among concurrently playing sounds; never minted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoundId(pub u64);

/// Notifications from a [`PlaybackEngine`], drained with `poll_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Loaded,
    LoadError(String),
    /// The sound was stopped explicitly
    Stopped(SoundId),
    /// The sound reached the end of its sprite
    Ended(SoundId),
}

/// Sprite-sheet playback engine
pub trait PlaybackEngine {
    /// Whether sources with this file extension can be decoded here
    fn supports_codec(&self, extension: &str) -> bool;

    /// Begin loading `source`. Completion is reported as a
    /// [`PlaybackEvent::Loaded`] or [`PlaybackEvent::LoadError`].
    fn load(&mut self, source: &str, format: Option<&str>, sprites: &SpriteTable, volume: f32);

    /// Start a sprite. `None` when the engine refuses.
    fn play(&mut self, sprite: &str) -> Option<SoundId>;

    fn stop(&mut self, id: SoundId);

    fn is_playing(&self, id: SoundId) -> bool;

    /// Engine-wide volume (0.0–1.0). New sounds start at it; live sounds
    /// keep the per-sound volume last set on them.
    fn set_master_volume(&mut self, volume: f32);

    fn master_volume(&self) -> f32;

    /// Volume of one sound (0.0–1.0)
    fn set_volume(&mut self, id: SoundId, volume: f32);

    /// Per-axis stereo pan of one sound, each axis in `[-1, 1]`
    fn set_position(&mut self, id: SoundId, pan: Vec3);

    fn poll_events(&mut self) -> Vec<PlaybackEvent>;
}

/// A sample-based instrument voice bank
pub trait SampleInstrument {
    fn is_loaded(&self) -> bool;

    /// `velocity` is normalized to 0.0–1.0
    fn trigger_attack(&mut self, note: &str, velocity: f32);

    fn trigger_release(&mut self, note: &str);

    /// Instruments with their own damper handling override this
    fn set_pedal(&mut self, _down: bool) {}

    fn set_volume_db(&mut self, db: f32);
}

/// Oscillator waveform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sawtooth,
    Sine,
    Square,
    Triangle,
}

impl Waveform {
    /// One period of the waveform at `phase` in `[0, 1)`, range `[-1, 1]`
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Handle to one oscillator voice, assigned by an [`OscillatorBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u64);

/// Gain a releasing voice ramps down to before it is stopped
pub const SILENCE_GAIN: f32 = 0.00001;

/// Oscillator + gain node source
pub trait OscillatorBackend {
    /// Start a connected oscillator at `frequency` Hz and `gain`
    fn start(&mut self, waveform: Waveform, frequency: f32, gain: f32) -> VoiceId;

    fn set_gain(&mut self, voice: VoiceId, gain: f32);

    /// After `delay`, ramp the gain exponentially to [`SILENCE_GAIN`] over
    /// `ramp`, then stop and disconnect the voice.
    fn release(&mut self, voice: VoiceId, delay: Duration, ramp: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveforms_stay_in_range() {
        for waveform in [
            Waveform::Sawtooth,
            Waveform::Sine,
            Waveform::Square,
            Waveform::Triangle,
        ] {
            for step in 0..64 {
                let value = waveform.sample(step as f32 / 64.0);
                assert!((-1.0..=1.0).contains(&value), "{waveform:?}: {value}");
            }
        }
    }

    #[test]
    fn triangle_peaks_mid_cycle() {
        assert!((Waveform::Triangle.sample(0.5) - 1.0).abs() < f32::EPSILON);
        assert!((Waveform::Triangle.sample(0.0) + 1.0).abs() < f32::EPSILON);
    }
}
