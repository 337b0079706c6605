//! Recording stand-ins for the audio collaborators. Each fake is a cheap
//! handle over shared state so a test can keep one clone for assertions and
//! give the other to the code under test.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;

use crate::backend::{
    OscillatorBackend, PlaybackEngine, PlaybackEvent, SampleInstrument, SoundId, VoiceId,
    Waveform,
};
use crate::sprite::SpriteTable;

#[derive(Debug, Default)]
pub struct FakePlaybackState {
    pub codecs: Vec<String>,
    pub loaded_source: Option<String>,
    pub load_calls: usize,
    pub sprites: SpriteTable,
    pub next_id: u64,
    pub plays: Vec<(SoundId, String)>,
    pub playing: BTreeSet<SoundId>,
    pub stopped: Vec<SoundId>,
    pub master_volume: f32,
    pub volumes: BTreeMap<SoundId, f32>,
    pub volume_writes: usize,
    pub positions: BTreeMap<SoundId, Vec3>,
    pub position_writes: usize,
    pub events: Vec<PlaybackEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct FakePlayback {
    state: Rc<RefCell<FakePlaybackState>>,
}

impl FakePlayback {
    pub fn new(codecs: &[&str]) -> Self {
        let fake = Self::default();
        fake.state_mut().codecs = codecs.iter().map(|c| c.to_string()).collect();
        fake
    }

    pub fn state(&self) -> Ref<'_, FakePlaybackState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, FakePlaybackState> {
        self.state.borrow_mut()
    }

    pub fn finish_loading(&self) {
        self.state_mut().events.push(PlaybackEvent::Loaded);
    }

    pub fn fail_loading(&self, reason: &str) {
        self.state_mut()
            .events
            .push(PlaybackEvent::LoadError(reason.to_string()));
    }

    /// Simulate a sound reaching the end of its sprite
    pub fn end(&self, id: SoundId) {
        let mut state = self.state_mut();
        state.playing.remove(&id);
        state.events.push(PlaybackEvent::Ended(id));
    }

    pub fn last_id(&self) -> Option<SoundId> {
        self.state().plays.last().map(|(id, _)| *id)
    }

    pub fn volume_of(&self, id: SoundId) -> Option<f32> {
        self.state().volumes.get(&id).copied()
    }

    pub fn position_of(&self, id: SoundId) -> Option<Vec3> {
        self.state().positions.get(&id).copied()
    }
}

impl PlaybackEngine for FakePlayback {
    fn supports_codec(&self, extension: &str) -> bool {
        self.state().codecs.iter().any(|c| c == extension)
    }

    fn load(&mut self, source: &str, _format: Option<&str>, sprites: &SpriteTable, volume: f32) {
        let mut state = self.state_mut();
        state.loaded_source = Some(source.to_string());
        state.load_calls += 1;
        state.sprites = sprites.clone();
        state.master_volume = volume;
    }

    fn play(&mut self, sprite: &str) -> Option<SoundId> {
        let mut state = self.state_mut();
        if !state.sprites.contains_key(sprite) {
            return None;
        }
        state.next_id += 1;
        let id = SoundId(state.next_id);
        state.plays.push((id, sprite.to_string()));
        state.playing.insert(id);
        Some(id)
    }

    fn stop(&mut self, id: SoundId) {
        let mut state = self.state_mut();
        state.stopped.push(id);
        if state.playing.remove(&id) {
            state.events.push(PlaybackEvent::Stopped(id));
        }
    }

    fn is_playing(&self, id: SoundId) -> bool {
        self.state().playing.contains(&id)
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.state_mut().master_volume = volume;
    }

    fn master_volume(&self) -> f32 {
        self.state().master_volume
    }

    fn set_volume(&mut self, id: SoundId, volume: f32) {
        let mut state = self.state_mut();
        state.volumes.insert(id, volume);
        state.volume_writes += 1;
    }

    fn set_position(&mut self, id: SoundId, pan: Vec3) {
        let mut state = self.state_mut();
        state.positions.insert(id, pan);
        state.position_writes += 1;
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.state_mut().events)
    }
}

#[derive(Debug, Default)]
pub struct FakeInstrumentState {
    pub loaded: bool,
    pub attacks: Vec<(String, f32)>,
    pub releases: Vec<String>,
    pub pedal: bool,
    pub pedal_changes: usize,
    pub volume_db: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeInstrument {
    state: Rc<RefCell<FakeInstrumentState>>,
}

impl FakeInstrument {
    pub fn loaded() -> Self {
        let fake = Self::default();
        fake.state_mut().loaded = true;
        fake
    }

    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, FakeInstrumentState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, FakeInstrumentState> {
        self.state.borrow_mut()
    }
}

impl SampleInstrument for FakeInstrument {
    fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    fn trigger_attack(&mut self, note: &str, velocity: f32) {
        self.state_mut().attacks.push((note.to_string(), velocity));
    }

    fn trigger_release(&mut self, note: &str) {
        self.state_mut().releases.push(note.to_string());
    }

    fn set_pedal(&mut self, down: bool) {
        let mut state = self.state_mut();
        state.pedal = down;
        state.pedal_changes += 1;
    }

    fn set_volume_db(&mut self, db: f32) {
        self.state_mut().volume_db = Some(db);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeVoice {
    pub waveform: Waveform,
    pub frequency: f32,
    pub gain: f32,
}

#[derive(Debug, Default)]
pub struct FakeOscillatorState {
    pub next_id: u64,
    /// Voices started and not yet released
    pub live: BTreeMap<VoiceId, FakeVoice>,
    pub started: usize,
    pub releases: Vec<(VoiceId, Duration, Duration)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeOscillators {
    state: Rc<RefCell<FakeOscillatorState>>,
}

impl FakeOscillators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, FakeOscillatorState> {
        self.state.borrow()
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }
}

impl OscillatorBackend for FakeOscillators {
    fn start(&mut self, waveform: Waveform, frequency: f32, gain: f32) -> VoiceId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.started += 1;
        let id = VoiceId(state.next_id);
        state.live.insert(
            id,
            FakeVoice {
                waveform,
                frequency,
                gain,
            },
        );
        id
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        if let Some(v) = self.state.borrow_mut().live.get_mut(&voice) {
            v.gain = gain;
        }
    }

    fn release(&mut self, voice: VoiceId, delay: Duration, ramp: Duration) {
        let mut state = self.state.borrow_mut();
        state.live.remove(&voice);
        state.releases.push((voice, delay, ramp));
    }
}
