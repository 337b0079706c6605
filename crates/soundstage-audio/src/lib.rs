//! Soundstage Audio - Game audio subsystems on top of kira
//!
//! Provides a positional sprite player, sampled pianos, an oscillator synth
//! and the [`AudioEngine`] that ties them to one set of volume settings.

pub mod backend;
mod config;
mod error;
mod manager;
pub mod piano;
mod spatial;
mod sprite;
mod synth;

#[cfg(test)]
mod testutil;

pub use backend::kira::{KiraContext, KiraOscillators, KiraPlayback, KiraSampler};
pub use backend::{
    OscillatorBackend, PlaybackEngine, PlaybackEvent, SampleInstrument, SoundId, VoiceId, Waveform,
};
pub use config::{
    default_store, FileStore, MemoryStore, SettingsStore, VolumeSettings, SETTINGS_KEY,
};
pub use error::AudioError;
pub use manager::{AudioEngine, EngineOptions, Ticker, UpdateStrategy};
pub use piano::{PedalMode, PianoRouter, PianoSampler};
pub use spatial::{compute_placement, Listener, StereoPlacement};
pub use sprite::{
    select_source, LoadState, PlayingSound, SelectedSource, SoundKind, Sprite, SpriteOptions,
    SpritePlayer, SpriteTable, DEFAULT_SOUND_VOLUME,
};
pub use synth::SynthEngine;
