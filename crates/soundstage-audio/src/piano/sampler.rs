//! The bundled default piano

use crate::backend::SampleInstrument;

use super::{normalize_velocity, playable_name, release_every_note, volume_to_db, PianoSampler};

/// The bundled piano. Damper handling belongs to the instrument, so pedal
/// changes are forwarded and every key-up is a real release.
pub struct DefaultPiano {
    instrument: Box<dyn SampleInstrument>,
    playing: Vec<u8>,
    volume: f32,
    pedal: bool,
}

impl DefaultPiano {
    pub fn new(instrument: Box<dyn SampleInstrument>) -> Self {
        Self {
            instrument,
            playing: Vec::new(),
            volume: 100.0,
            pedal: false,
        }
    }

    pub fn pedal(&self) -> bool {
        self.pedal
    }

    pub fn is_loaded(&self) -> bool {
        self.instrument.is_loaded()
    }
}

impl PianoSampler for DefaultPiano {
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
        self.instrument.trigger_release(name);
    }

    fn pedal_down(&mut self) {
        self.pedal = true;
        self.instrument.set_pedal(true);
    }

    fn pedal_up(&mut self) {
        self.pedal = false;
        self.instrument.set_pedal(false);
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
