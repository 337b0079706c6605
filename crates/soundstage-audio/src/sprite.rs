//! Positional sprite playback
//!
//! One decoded asset is cut into named sprites. Positional sounds are
//! re-panned against the listener on every tick; volume changes reach the
//! live sounds through a debounced rebroadcast.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use soundstage_core::{AudioPoint, Clock, Debounce, EntityId};
use tracing::{debug, info, warn};

use crate::backend::{PlaybackEngine, PlaybackEvent, SoundId};
use crate::error::AudioError;
use crate::spatial::{compute_placement, Listener};

/// Relative volume used when the caller does not pick one
pub const DEFAULT_SOUND_VOLUME: u8 = 100;

/// Window that coalesces bursts of volume changes into one rebroadcast
pub const REBROADCAST_DEBOUNCE: Duration = Duration::from_millis(50);

/// A named region of the decoded sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub offset_ms: u64,
    pub duration_ms: u64,
    #[serde(default)]
    pub looping: bool,
}

impl Sprite {
    pub fn new(offset_ms: u64, duration_ms: u64) -> Self {
        Self {
            offset_ms,
            duration_ms,
            looping: false,
        }
    }

    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.offset_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Sprite name to region
pub type SpriteTable = BTreeMap<String, Sprite>;

/// Sprite player set-up: candidate sources in preference order, the sprite
/// table shared by all of them and the initial listener position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpriteOptions {
    pub sources: Vec<String>,
    pub sprites: SpriteTable,
    #[serde(default)]
    pub listener: Vec3,
}

/// The candidate source chosen for this platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSource {
    pub uri: String,
    /// Extension passed to the engine as a format hint
    pub format: Option<String>,
}

/// Pick the first candidate whose extension the engine can decode.
///
/// A candidate without an extension is only used when nothing else fits.
pub fn select_source(
    candidates: &[String],
    supports_codec: impl Fn(&str) -> bool,
) -> Result<SelectedSource, AudioError> {
    let extension_of = |uri: &str| {
        Path::new(uri)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_string)
    };

    for uri in candidates {
        if let Some(ext) = extension_of(uri) {
            if supports_codec(&ext) {
                return Ok(SelectedSource {
                    uri: uri.clone(),
                    format: Some(ext),
                });
            }
        }
    }

    candidates
        .iter()
        .find(|uri| extension_of(uri).is_none())
        .map(|uri| SelectedSource {
            uri: uri.clone(),
            format: None,
        })
        .ok_or_else(|| AudioError::UnsupportedFormat {
            candidates: candidates.to_vec(),
        })
}

/// Where a playing sound is heard from
#[derive(Debug, Clone, PartialEq)]
pub enum SoundKind {
    /// Center pan, follows only the channel volume
    Static,
    /// Fixed emission point, re-panned every tick
    Positional { point: AudioPoint },
    /// Bound to a moving emitter. Nothing creates these yet; a tracker
    /// would poll the entity's position each tick.
    Entity { entity: EntityId },
}

/// A sound the player is tracking
#[derive(Debug, Clone, PartialEq)]
pub struct PlayingSound {
    pub id: SoundId,
    /// Relative volume (0.0–1.0)
    pub volume: f32,
    /// Sprite name, for debugging
    pub label: Option<String>,
    pub kind: SoundKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Plays sprites from a single decoded asset and keeps positional sounds
/// panned relative to a listener.
///
/// The source is only loaded once the volume first becomes non-zero.
/// Sounds leave the catalogue only when the engine reports them stopped or
/// ended.
pub struct SpritePlayer {
    engine: Box<dyn PlaybackEngine>,
    clock: Rc<dyn Clock>,
    source: SelectedSource,
    sprites: SpriteTable,
    listener: Listener,
    /// Engine-wide volume (0.0–1.0)
    volume: f32,
    state: LoadState,
    playing: BTreeMap<SoundId, PlayingSound>,
    positional: BTreeSet<SoundId>,
    rebroadcast: Debounce,
}

impl SpritePlayer {
    /// Negotiate a source format. Nothing is loaded yet.
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        clock: Rc<dyn Clock>,
        options: SpriteOptions,
    ) -> Result<Self, AudioError> {
        let source = select_source(&options.sources, |ext| engine.supports_codec(ext))?;
        info!("Sprite source selected: {}", source.uri);

        Ok(Self {
            engine,
            clock,
            source,
            sprites: options.sprites,
            listener: Listener::new(options.listener),
            volume: 0.0,
            state: LoadState::Uninitialized,
            playing: BTreeMap::new(),
            positional: BTreeSet::new(),
            rebroadcast: Debounce::new(REBROADCAST_DEBOUNCE),
        })
    }

    pub fn source(&self) -> &SelectedSource {
        &self.source
    }

    pub fn load_state(&self) -> LoadState {
        self.state
    }

    fn init(&mut self) {
        if self.state != LoadState::Uninitialized || self.volume == 0.0 {
            return;
        }

        info!("Loading sprite source {}", self.source.uri);
        self.state = LoadState::Loading;
        self.engine.load(
            &self.source.uri,
            self.source.format.as_deref(),
            &self.sprites,
            self.volume,
        );
    }

    /// Drain engine notifications: load completion and finished sounds.
    pub fn pump_events(&mut self) {
        for event in self.engine.poll_events() {
            self.handle_event(event);
        }
        self.flush_due();
    }

    pub fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Loaded => {
                if self.state == LoadState::Loading {
                    info!("Sprite source loaded");
                    self.state = LoadState::Ready;
                }
            }
            PlaybackEvent::LoadError(reason) => {
                let err = AudioError::LoadFailed(self.source.uri.clone(), reason);
                warn!("{}", err);
                self.state = LoadState::Failed;
            }
            PlaybackEvent::Stopped(id) | PlaybackEvent::Ended(id) => self.forget(id),
        }
    }

    /// Evict a sound from every index.
    fn forget(&mut self, id: SoundId) {
        if let Some(sound) = self.playing.remove(&id) {
            if matches!(sound.kind, SoundKind::Positional { .. }) {
                self.positional.remove(&id);
            }
        }
    }

    fn play_file(&mut self, sprite: &str, volume: f32) -> Option<SoundId> {
        self.pump_events();

        if self.state != LoadState::Ready || sprite.is_empty() {
            return None;
        }
        if self.volume == 0.0 || volume == 0.0 {
            return None;
        }

        self.engine.play(sprite)
    }

    /// Play a sprite at center pan. `volume` is a percentage of the channel
    /// volume. Returns false when nothing could be started.
    pub fn play_static(&mut self, sprite: &str, volume: u8) -> bool {
        let volume = volume.min(100) as f32 / 100.0;
        let Some(id) = self.play_file(sprite, volume) else {
            return false;
        };

        self.engine.set_volume(id, volume * self.volume);
        self.playing.insert(
            id,
            PlayingSound {
                id,
                volume,
                label: Some(sprite.to_string()),
                kind: SoundKind::Static,
            },
        );
        true
    }

    /// Play a sprite from a fixed point in the world.
    pub fn play_on_pos(&mut self, sprite: &str, point: AudioPoint, volume: u8) -> Option<SoundId> {
        let volume = volume.min(100) as f32 / 100.0;
        let id = self.play_file(sprite, volume)?;

        let sound = PlayingSound {
            id,
            volume,
            label: Some(sprite.to_string()),
            kind: SoundKind::Positional { point },
        };
        place(self.engine.as_mut(), &self.listener, &sound, self.volume);
        self.playing.insert(id, sound);
        self.positional.insert(id);
        Some(id)
    }

    pub fn is_playing(&self, id: SoundId) -> bool {
        self.state == LoadState::Ready && self.engine.is_playing(id)
    }

    /// Debug label of a tracked sound
    pub fn sprite_name(&self, id: SoundId) -> Option<&str> {
        self.playing.get(&id).and_then(|s| s.label.as_deref())
    }

    /// Per-tick update: flush a due volume rebroadcast, then re-pan every
    /// positional sound for the current listener.
    pub fn update(&mut self) {
        if self.state != LoadState::Ready {
            return;
        }

        self.flush_due();

        for id in &self.positional {
            if let Some(sound) = self.playing.get(id) {
                place(self.engine.as_mut(), &self.listener, sound, self.volume);
            }
        }
    }

    /// Ask the engine to stop everything. Sounds are forgotten once the
    /// engine confirms.
    pub fn stop_all(&mut self) {
        for id in self.playing.keys() {
            self.engine.stop(*id);
        }
    }

    pub fn set_listener(&mut self, position: Vec3) {
        self.listener.position = position;
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Set the engine-wide volume as a percentage.
    pub fn set_volume(&mut self, percent: f32) {
        self.flush_due();

        self.volume = (percent / 100.0).clamp(0.0, 1.0);
        if self.volume > 0.0 {
            self.init();
        }

        if self.state == LoadState::Uninitialized {
            return;
        }
        self.engine.set_master_volume(self.volume);
        self.rebroadcast.trigger(self.clock.now());
    }

    /// Engine-wide volume as a percentage
    pub fn volume(&self) -> f32 {
        self.volume * 100.0
    }

    /// Rebroadcast if the debounce window has closed
    fn flush_due(&mut self) {
        if self.rebroadcast.fire_if_due(self.clock.now()) {
            self.rebroadcast_volumes();
        }
    }

    /// Rebroadcast a pending volume change now, for owners that time the
    /// debounce window themselves.
    pub fn flush_rebroadcast(&mut self) {
        if self.rebroadcast.is_pending() {
            self.rebroadcast.cancel();
            self.rebroadcast_volumes();
        }
    }

    pub fn rebroadcast_pending(&self) -> bool {
        self.rebroadcast.is_pending()
    }

    pub fn rebroadcast_window(&self) -> Duration {
        self.rebroadcast.window()
    }

    fn rebroadcast_volumes(&mut self) {
        let current = self.engine.master_volume();
        for sound in self.playing.values() {
            self.engine.set_volume(sound.id, sound.volume * current);
        }
    }

    pub fn sounds(&self) -> impl Iterator<Item = &PlayingSound> {
        self.playing.values()
    }

    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    pub fn positional_count(&self) -> usize {
        self.positional.len()
    }
}

fn place(engine: &mut dyn PlaybackEngine, listener: &Listener, sound: &PlayingSound, global: f32) {
    let SoundKind::Positional { point } = &sound.kind else {
        return;
    };

    let placement = compute_placement(listener, point, sound.volume, global);
    engine.set_volume(sound.id, placement.gain);
    engine.set_position(sound.id, placement.pan.to_vec3());

    debug!(
        "{} X:{:.2} Y:{:.2} Z:{:.2}",
        sound.label.as_deref().unwrap_or("?"),
        placement.pan.x,
        placement.pan.y,
        placement.pan.z
    );
}
