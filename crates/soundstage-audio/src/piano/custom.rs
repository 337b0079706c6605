//! User-registered sample instruments with a configurable pedal

use crate::backend::SampleInstrument;

use super::{normalize_velocity, playable_name, release_every_note, volume_to_db, PianoSampler};

/// How a key-up interacts with the sustain pedal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PedalMode {
    /// Key-ups release unless the pedal is held. Lifting the pedal does not
    /// replay the releases it swallowed; only a new key-up silences a note.
    #[default]
    Dynamic,
    /// Every key-up releases; the pedal is ignored
    AlwaysOn,
    /// Key-ups never release; notes ring until reset
    AlwaysOff,
}

/// A sampler built from a caller-supplied sample set
pub struct CustomSampler {
    instrument: Box<dyn SampleInstrument>,
    mode: PedalMode,
    pedal: bool,
    playing: Vec<u8>,
    volume: f32,
}

impl CustomSampler {
    pub fn new(instrument: Box<dyn SampleInstrument>, mode: PedalMode) -> Self {
        Self {
            instrument,
            mode,
            pedal: false,
            playing: Vec::new(),
            volume: 100.0,
        }
    }

    pub fn mode(&self) -> PedalMode {
        self.mode
    }

    pub fn is_loaded(&self) -> bool {
        self.instrument.is_loaded()
    }
}

impl PianoSampler for CustomSampler {
    fn key_down(&mut self, note: u8, velocity: u8) {
        if !self.instrument.is_loaded() {
            return;
        }
        let Some(name) = playable_name(note) else {
            return;
        };
        if !self.playing.contains(&note) {
            self.playing.push(note);
        }
        self.instrument.trigger_attack(name, normalize_velocity(velocity));
    }

    fn key_up(&mut self, note: u8, _velocity: u8) {
        if !self.instrument.is_loaded() {
            return;
        }
        let Some(name) = playable_name(note) else {
            return;
        };
        self.playing.retain(|n| *n != note);

        let release = match self.mode {
            PedalMode::AlwaysOn => true,
            PedalMode::AlwaysOff => false,
            PedalMode::Dynamic => !self.pedal,
        };
        if release {
            self.instrument.trigger_release(name);
        }
    }

    fn pedal_down(&mut self) {
        if self.mode == PedalMode::Dynamic {
            self.pedal = true;
        }
    }

    fn pedal_up(&mut self) {
        if self.mode == PedalMode::Dynamic {
            self.pedal = false;
        }
    }

    fn reset(&mut self) {
        release_every_note(self);
        self.playing.clear();
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, value: f32) {
        self.volume = value;
        self.instrument.set_volume_db(volume_to_db(value));
    }

    fn playing_notes(&self) -> &[u8] {
        &self.playing
    }
}
