//! Sampled piano instruments
//!
//! A [`PianoRouter`] owns one default sampler plus any number of named
//! samplers and forwards key, pedal and volume events by instrument name.
//! Unknown names fall back to the default.

mod custom;
mod sampler;

use std::collections::BTreeMap;

use soundstage_core::notes::{self, NoteTable};
use tracing::{debug, info};

use crate::backend::SampleInstrument;

pub use custom::{CustomSampler, PedalMode};
pub use sampler::DefaultPiano;

/// Capability shared by every piano sampler
pub trait PianoSampler {
    fn key_down(&mut self, note: u8, velocity: u8);
    fn key_up(&mut self, note: u8, velocity: u8);
    fn pedal_down(&mut self);
    fn pedal_up(&mut self);
    /// Pedal up, release every note in the table, forget what was held
    fn reset(&mut self);
    /// Volume percentage (0–100)
    fn volume(&self) -> f32;
    fn set_volume(&mut self, value: f32);
    /// MIDI indices currently held, in press order
    fn playing_notes(&self) -> &[u8];

    fn readable_playing_notes(&self) -> Vec<&'static str> {
        self.playing_notes()
            .iter()
            .filter_map(|index| notes::note(*index))
            .map(|entry| entry.name.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Sampler volume percentage to instrument gain in decibels
pub(crate) fn volume_to_db(value: f32) -> f32 {
    value - 100.0
}

/// MIDI velocity (0–127) to 0.0–1.0
pub(crate) fn normalize_velocity(velocity: u8) -> f32 {
    velocity.min(127) as f32 / 127.0
}

/// Name an instrument can play for `index`, if any
pub(crate) fn playable_name(index: u8) -> Option<&'static str> {
    match notes::note(index) {
        Some(entry) if !entry.name.is_empty() => Some(entry.name.as_str()),
        _ => {
            debug!("No playable note for index {}", index);
            None
        }
    }
}

/// Full pedal-up and key-release cycle over the whole note table
pub(crate) fn release_every_note(sampler: &mut dyn PianoSampler) {
    for entry in NoteTable::get().iter() {
        sampler.pedal_up();
        sampler.key_up(entry.index, 0);
    }
}

/// Multiplexes piano events across the default sampler and named samplers.
pub struct PianoRouter {
    default: Box<dyn PianoSampler>,
    samplers: BTreeMap<String, Box<dyn PianoSampler>>,
    volume: f32,
}

impl PianoRouter {
    /// Router whose default sampler plays through `instrument`
    pub fn new(instrument: Box<dyn SampleInstrument>) -> Self {
        Self::with_default(Box::new(DefaultPiano::new(instrument)))
    }

    pub fn with_default(default: Box<dyn PianoSampler>) -> Self {
        let mut router = Self {
            default,
            samplers: BTreeMap::new(),
            volume: 100.0,
        };
        router.set_volume(router.volume);
        router
    }

    /// Resolve an instrument name, falling back to the default sampler
    pub fn sampler_mut(&mut self, name: &str) -> &mut dyn PianoSampler {
        match self.samplers.get_mut(name) {
            Some(sampler) => sampler.as_mut(),
            None => self.default.as_mut(),
        }
    }

    pub fn sampler(&self, name: &str) -> &dyn PianoSampler {
        match self.samplers.get(name) {
            Some(sampler) => sampler.as_ref(),
            None => self.default.as_ref(),
        }
    }

    pub fn key_down(&mut self, name: &str, note: u8, velocity: u8) {
        self.sampler_mut(name).key_down(note, velocity);
    }

    pub fn key_up(&mut self, name: &str, note: u8, velocity: u8) {
        self.sampler_mut(name).key_up(note, velocity);
    }

    pub fn pedal_down(&mut self, name: &str) {
        self.sampler_mut(name).pedal_down();
    }

    pub fn pedal_up(&mut self, name: &str) {
        self.sampler_mut(name).pedal_up();
    }

    /// Silence every sampler
    pub fn reset(&mut self) {
        self.for_each(|sampler| sampler.reset());
    }

    /// Router-level volume, passed verbatim to every sampler
    pub fn set_volume(&mut self, value: f32) {
        self.volume = value.clamp(0.0, 100.0);
        let volume = self.volume;
        self.for_each(|sampler| sampler.set_volume(volume));
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Held notes across all samplers, without duplicates
    pub fn playing_notes(&self) -> Vec<u8> {
        let mut all = Vec::new();
        let samplers = std::iter::once(&self.default).chain(self.samplers.values());
        for sampler in samplers {
            for note in sampler.playing_notes() {
                if !all.contains(note) {
                    all.push(*note);
                }
            }
        }
        all
    }

    /// Register a sample-set instrument under `name`, replacing any
    /// sampler already registered there.
    pub fn add_custom(&mut self, name: &str, instrument: Box<dyn SampleInstrument>, pedal: PedalMode) {
        self.add_sampler(name, Box::new(CustomSampler::new(instrument, pedal)));
    }

    pub fn add_sampler(&mut self, name: &str, mut sampler: Box<dyn PianoSampler>) {
        sampler.set_volume(self.volume);
        info!("Registered piano sampler '{}'", name);
        self.samplers.insert(name.to_string(), sampler);
    }

    /// Silence and drop a named sampler. The default cannot be removed.
    pub fn remove_custom(&mut self, name: &str) -> bool {
        match self.samplers.remove(name) {
            Some(mut sampler) => {
                sampler.reset();
                info!("Removed piano sampler '{}'", name);
                true
            }
            None => false,
        }
    }

    pub fn has_sampler(&self, name: &str) -> bool {
        self.samplers.contains_key(name)
    }

    fn for_each(&mut self, mut f: impl FnMut(&mut dyn PianoSampler)) {
        f(self.default.as_mut());
        for sampler in self.samplers.values_mut() {
            f(sampler.as_mut());
        }
    }
}
