//! Collaborators backed by kira.
//!
//! All of them share one [`AudioManager`] through a [`KiraContext`]. kira
//! has no completion callbacks, so [`KiraPlayback`] reports finished sounds
//! by checking handle state whenever its events are polled.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use kira::Frame;
use kira::manager::backend::DefaultBackend;
use kira::manager::{AudioManager, AudioManagerSettings};
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle, StaticSoundSettings};
use kira::sound::{PlaybackRate, PlaybackState};
use kira::tween::Tween;
use kira::StartTime;
use soundstage_core::notes;
use tracing::{info, warn};

use super::{
    OscillatorBackend, PlaybackEngine, PlaybackEvent, SampleInstrument, SoundId, VoiceId,
    Waveform,
};
use crate::error::AudioError;
use crate::sprite::SpriteTable;

/// Extensions kira decodes with its default symphonia features
const SUPPORTED_EXTENSIONS: [&str; 5] = ["wav", "ogg", "oga", "mp3", "flac"];

/// Fade used when a sampled note is released
const NOTE_RELEASE: Duration = Duration::from_millis(100);

/// Sample rate oscillator voices are rendered at
const OSCILLATOR_SAMPLE_RATE: u32 = 48_000;

/// Shortest rendered oscillator loop, in frames
const MIN_LOOP_FRAMES: f32 = 4_096.0;

fn tween(duration: Duration) -> Tween {
    Tween {
        duration,
        ..Default::default()
    }
}

/// Shared handle to the kira audio manager
#[derive(Clone)]
pub struct KiraContext {
    manager: Rc<RefCell<AudioManager<DefaultBackend>>>,
}

impl KiraContext {
    pub fn new() -> Result<Self, AudioError> {
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|e| AudioError::InitFailed(e.to_string()))?;

        info!("Audio backend initialized");

        Ok(Self {
            manager: Rc::new(RefCell::new(manager)),
        })
    }

    fn play(&self, data: StaticSoundData) -> Result<StaticSoundHandle, AudioError> {
        self.manager
            .borrow_mut()
            .play(data)
            .map_err(|e| AudioError::PlaybackFailed(e.to_string()))
    }
}

/// Sprite-sheet playback: one decoded file, sliced per sprite.
pub struct KiraPlayback {
    context: KiraContext,
    sprites: HashMap<String, (StaticSoundData, bool)>,
    handles: BTreeMap<SoundId, StaticSoundHandle>,
    stopping: HashSet<SoundId>,
    events: Vec<PlaybackEvent>,
    next_id: u64,
    master_volume: f32,
}

impl KiraPlayback {
    pub fn new(context: KiraContext) -> Self {
        Self {
            context,
            sprites: HashMap::new(),
            handles: BTreeMap::new(),
            stopping: HashSet::new(),
            events: Vec::new(),
            next_id: 0,
            master_volume: 1.0,
        }
    }

    fn decode(&mut self, source: &str, sprites: &SpriteTable) -> Result<(), String> {
        let data = StaticSoundData::from_file(source).map_err(|e| e.to_string())?;

        for (name, sprite) in sprites {
            let start = sprite.offset().as_secs_f64();
            let end = start + sprite.duration().as_secs_f64();
            self.sprites
                .insert(name.clone(), (data.slice(start..end), sprite.looping));
        }
        Ok(())
    }
}

impl PlaybackEngine for KiraPlayback {
    fn supports_codec(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        SUPPORTED_EXTENSIONS.contains(&extension.as_str())
    }

    fn load(&mut self, source: &str, _format: Option<&str>, sprites: &SpriteTable, volume: f32) {
        self.master_volume = volume;
        match self.decode(source, sprites) {
            Ok(()) => {
                info!("Decoded {} ({} sprites)", source, sprites.len());
                self.events.push(PlaybackEvent::Loaded);
            }
            Err(reason) => self.events.push(PlaybackEvent::LoadError(reason)),
        }
    }

    fn play(&mut self, sprite: &str) -> Option<SoundId> {
        let (data, looping) = self.sprites.get(sprite)?;

        let mut settings = StaticSoundSettings::new().volume(self.master_volume as f64);
        if *looping {
            settings = settings.loop_region(..);
        }

        match self.context.play(data.with_settings(settings)) {
            Ok(handle) => {
                self.next_id += 1;
                let id = SoundId(self.next_id);
                self.handles.insert(id, handle);
                Some(id)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn stop(&mut self, id: SoundId) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.stop(Tween::default());
            self.stopping.insert(id);
        }
    }

    fn is_playing(&self, id: SoundId) -> bool {
        self.handles
            .get(&id)
            .is_some_and(|h| h.state() == PlaybackState::Playing)
    }

    /// Live sounds keep their own volume: it already includes the master
    /// scale and is rewritten by the player's rebroadcast.
    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
    }

    fn master_volume(&self) -> f32 {
        self.master_volume
    }

    fn set_volume(&mut self, id: SoundId, volume: f32) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.set_volume(volume as f64, Tween::default());
        }
    }

    /// kira pans in stereo only: the x axis maps onto left/right.
    fn set_position(&mut self, id: SoundId, pan: Vec3) {
        if let Some(handle) = self.handles.get_mut(&id) {
            let panning = ((pan.x.clamp(-1.0, 1.0) + 1.0) / 2.0) as f64;
            handle.set_panning(panning, Tween::default());
        }
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        let finished: Vec<SoundId> = self
            .handles
            .iter()
            .filter(|(_, h)| h.state() == PlaybackState::Stopped)
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            self.handles.remove(&id);
            if self.stopping.remove(&id) {
                self.events.push(PlaybackEvent::Stopped(id));
            } else {
                self.events.push(PlaybackEvent::Ended(id));
            }
        }

        std::mem::take(&mut self.events)
    }
}

/// Sample-set instrument. Notes without their own sample are repitched from
/// the nearest sampled note.
pub struct KiraSampler {
    context: KiraContext,
    samples: BTreeMap<u8, StaticSoundData>,
    voices: HashMap<String, Vec<StaticSoundHandle>>,
    gain: f64,
    loaded: bool,
}

impl KiraSampler {
    /// Decode every sample in `samples` (note name to file). Failures are
    /// logged and leave the instrument unloaded, which silences it.
    pub fn load(context: KiraContext, samples: &BTreeMap<String, PathBuf>) -> Self {
        let mut decoded = BTreeMap::new();
        let mut loaded = true;

        for (note, path) in samples {
            let Some(index) = notes::index_of(note) else {
                warn!("Ignoring sample for unknown note '{}'", note);
                continue;
            };
            match StaticSoundData::from_file(path) {
                Ok(data) => {
                    decoded.insert(index, data);
                }
                Err(e) => {
                    let err = AudioError::LoadFailed(display(path), e.to_string());
                    warn!("{}", err);
                    loaded = false;
                }
            }
        }

        Self {
            context,
            samples: decoded,
            voices: HashMap::new(),
            gain: 1.0,
            loaded,
        }
    }

    fn nearest_sample(&self, index: u8) -> Option<(u8, &StaticSoundData)> {
        self.samples
            .iter()
            .min_by_key(|(source, _)| (**source as i16 - index as i16).abs())
            .map(|(source, data)| (*source, data))
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl SampleInstrument for KiraSampler {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn trigger_attack(&mut self, note: &str, velocity: f32) {
        let Some(index) = notes::index_of(note) else {
            return;
        };
        let Some((source, data)) = self.nearest_sample(index) else {
            return;
        };

        let rate = 2.0_f64.powf((index as f64 - source as f64) / 12.0);
        let settings = StaticSoundSettings::new()
            .volume(self.gain * velocity as f64)
            .playback_rate(PlaybackRate::Factor(rate));

        match self.context.play(data.with_settings(settings)) {
            Ok(handle) => {
                let voices = self.voices.entry(note.to_string()).or_default();
                voices.retain(|h| h.state() != PlaybackState::Stopped);
                voices.push(handle);
            }
            Err(e) => warn!("{}", e),
        }
    }

    fn trigger_release(&mut self, note: &str) {
        if let Some(voices) = self.voices.remove(note) {
            for mut handle in voices {
                handle.stop(tween(NOTE_RELEASE));
            }
        }
    }

    fn set_volume_db(&mut self, db: f32) {
        self.gain = 10.0_f64.powf(db as f64 / 20.0);
        for handle in self.voices.values_mut().flatten() {
            handle.set_volume(self.gain, Tween::default());
        }
    }
}

/// Oscillator voices rendered as short seamless loops.
pub struct KiraOscillators {
    context: KiraContext,
    voices: HashMap<VoiceId, StaticSoundHandle>,
    next_id: u64,
}

impl KiraOscillators {
    pub fn new(context: KiraContext) -> Self {
        Self {
            context,
            voices: HashMap::new(),
            next_id: 0,
        }
    }
}

/// A whole number of cycles of `waveform` at roughly `frequency`, long
/// enough to loop without an audible seam.
fn render_cycles(waveform: Waveform, frequency: f32) -> Vec<Frame> {
    let period = OSCILLATOR_SAMPLE_RATE as f32 / frequency.max(1.0);
    let cycles = (MIN_LOOP_FRAMES / period).ceil().max(1.0);
    let len = (period * cycles).round().max(1.0) as usize;

    (0..len)
        .map(|i| {
            let phase = (i as f32 * cycles / len as f32).fract();
            Frame::from_mono(waveform.sample(phase))
        })
        .collect()
}

impl OscillatorBackend for KiraOscillators {
    fn start(&mut self, waveform: Waveform, frequency: f32, gain: f32) -> VoiceId {
        self.voices
            .retain(|_, h| h.state() != PlaybackState::Stopped);

        self.next_id += 1;
        let id = VoiceId(self.next_id);

        let frames: Arc<[Frame]> = render_cycles(waveform, frequency).into();
        let data = StaticSoundData {
            sample_rate: OSCILLATOR_SAMPLE_RATE,
            frames,
            settings: StaticSoundSettings::new().volume(gain as f64).loop_region(..),
            slice: None,
        };

        match self.context.play(data) {
            Ok(handle) => {
                self.voices.insert(id, handle);
            }
            Err(e) => warn!("{}", e),
        }
        id
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        if let Some(handle) = self.voices.get_mut(&voice) {
            handle.set_volume(gain as f64, Tween::default());
        }
    }

    fn release(&mut self, voice: VoiceId, delay: Duration, ramp: Duration) {
        if let Some(mut handle) = self.voices.remove(&voice) {
            handle.stop(Tween {
                start_time: StartTime::Delayed(delay),
                duration: ramp,
                ..Default::default()
            });
        }
    }
}
