//! Oscillator synth
//!
//! One voice per (waveform, note) pair. Keys toggle voices on and off,
//! and untracked tones are faded out after their duration.

use std::collections::BTreeMap;
use std::time::Duration;

use soundstage_core::notes::{self, NoteEntry};
use tracing::warn;

use crate::backend::{OscillatorBackend, VoiceId, Waveform};
use crate::error::AudioError;

/// Fade applied when a voice is released
pub const RELEASE_RAMP: Duration = Duration::from_millis(40);

/// One oscillator per (waveform, note) key, sharing a global gain.
pub struct SynthEngine {
    backend: Box<dyn OscillatorBackend>,
    active: BTreeMap<(Waveform, u8), VoiceId>,
    /// Volume percentage (0–100)
    volume: f32,
}

impl SynthEngine {
    pub fn new(backend: Box<dyn OscillatorBackend>) -> Self {
        Self {
            backend,
            active: BTreeMap::new(),
            volume: 100.0,
        }
    }

    fn gain(&self) -> f32 {
        self.volume / 100.0
    }

    /// Start or release the voice for `(waveform, index)`.
    ///
    /// Both directions are no-ops when the voice is already in that state.
    /// Indices outside the note table are logged and skipped.
    pub fn toggle_note(&mut self, waveform: Waveform, index: u8, on: bool) {
        let entry = match lookup(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        let key = (waveform, index);
        if on {
            if !self.active.contains_key(&key) {
                let voice = self.backend.start(waveform, entry.frequency, self.gain());
                self.active.insert(key, voice);
            }
        } else if let Some(voice) = self.active.remove(&key) {
            self.backend.release(voice, Duration::ZERO, RELEASE_RAMP);
        }
    }

    /// Press a key by note name (`C4`, `Db5`). Unknown names are ignored.
    pub fn key_down(&mut self, waveform: Waveform, note: &str) {
        if let Some(index) = notes::index_of(note) {
            self.toggle_note(waveform, index, true);
        }
    }

    pub fn key_up(&mut self, waveform: Waveform, note: &str) {
        if let Some(index) = notes::index_of(note) {
            self.toggle_note(waveform, index, false);
        }
    }

    /// Fire-and-forget tone at an arbitrary frequency, faded out after
    /// `duration`. Not tracked: `reset_all` leaves it alone.
    pub fn play_tone(&mut self, waveform: Waveform, frequency: f32, duration: Duration) {
        let voice = self.backend.start(waveform, frequency, self.gain());
        self.backend.release(voice, duration, RELEASE_RAMP);
    }

    /// Fade out every held note
    pub fn reset_all(&mut self) {
        for (_, voice) in std::mem::take(&mut self.active) {
            self.backend.release(voice, Duration::ZERO, RELEASE_RAMP);
        }
    }

    /// Set the volume percentage; held notes change gain immediately.
    pub fn set_volume(&mut self, percent: f32) {
        self.volume = percent.clamp(0.0, 100.0);
        let gain = self.gain();
        for voice in self.active.values() {
            self.backend.set_gain(*voice, gain);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Names of the held notes, lowest first, without duplicates across
    /// waveforms. Sub-audible indices have no name and are left out.
    pub fn playing_notes(&self) -> Vec<&'static str> {
        let mut indices: Vec<u8> = self.active.keys().map(|(_, index)| *index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .filter_map(notes::note)
            .filter(|entry| !entry.name.is_empty())
            .map(|entry| entry.name.as_str())
            .collect()
    }

    pub fn is_active(&self, waveform: Waveform, index: u8) -> bool {
        self.active.contains_key(&(waveform, index))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

fn lookup(index: u8) -> Result<&'static NoteEntry, AudioError> {
    notes::note(index).ok_or(AudioError::UnknownNote(index))
}
