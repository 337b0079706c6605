//! The top-level audio engine and its update scheduler

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use glam::Vec3;
use soundstage_core::{AudioPoint, Clock, SystemClock};
use tokio::task::{JoinHandle, LocalSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::{OscillatorBackend, PlaybackEngine, SampleInstrument, SoundId, Waveform};
use crate::config::{default_store, SettingsStore, VolumeSettings, SETTINGS_KEY};
use crate::error::AudioError;
use crate::piano::{PedalMode, PianoRouter};
use crate::sprite::{SpriteOptions, SpritePlayer};
use crate::synth::SynthEngine;

/// Tick period used when no interval is given
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// Cadence of the frame-synchronized strategy
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// How the engine's `update` tick is driven.
///
/// `Interval` and `AnimationFrame` run as a task on the [`LocalSet`] given
/// with [`EngineOptions::with_local_set`]; the host drives that set.
pub enum UpdateStrategy {
    Interval(Duration),
    AnimationFrame,
    /// Handed the ticker once, at construction. There is no way to cancel
    /// a custom driver: after `destroy` its ticks return
    /// [`AudioError::Destroyed`].
    Custom(Box<dyn FnOnce(Ticker)>),
}

impl Default for UpdateStrategy {
    fn default() -> Self {
        Self::Interval(DEFAULT_UPDATE_INTERVAL)
    }
}

impl std::fmt::Debug for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(period) => f.debug_tuple("Interval").field(period).finish(),
            Self::AnimationFrame => f.write_str("AnimationFrame"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Everything the engine is built from.
pub struct EngineOptions {
    pub strategy: UpdateStrategy,
    /// Without sprite options the engine has no sprite player and every
    /// sprite call fails softly.
    pub sprites: Option<SpriteOptions>,
    pub playback: Box<dyn PlaybackEngine>,
    /// Initial settings. When absent they are read from `store`.
    pub settings: Option<VolumeSettings>,
    pub store: Box<dyn SettingsStore>,
    pub instrument: Box<dyn SampleInstrument>,
    pub oscillators: Box<dyn OscillatorBackend>,
    pub clock: Rc<dyn Clock>,
    /// Runs the scheduler and the volume debounce timer. Without one, only
    /// `Custom` scheduling is possible and debounced volume changes land
    /// on the next call into the sprite player.
    pub local: Option<Rc<LocalSet>>,
}

impl EngineOptions {
    /// Options with the default strategy, no sprites, the platform settings
    /// store and the system clock.
    pub fn new(
        playback: Box<dyn PlaybackEngine>,
        instrument: Box<dyn SampleInstrument>,
        oscillators: Box<dyn OscillatorBackend>,
    ) -> Self {
        Self {
            strategy: UpdateStrategy::default(),
            sprites: None,
            playback,
            settings: None,
            store: default_store(),
            instrument,
            oscillators,
            clock: Rc::new(SystemClock::new()),
            local: None,
        }
    }

    pub fn with_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_sprites(mut self, sprites: SpriteOptions) -> Self {
        self.sprites = Some(sprites);
        self
    }

    pub fn with_settings(mut self, settings: VolumeSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_store(mut self, store: Box<dyn SettingsStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_local_set(mut self, local: Rc<LocalSet>) -> Self {
        self.local = Some(local);
        self
    }
}

struct EngineState {
    sprites: Option<SpritePlayer>,
    piano: PianoRouter,
    synth: SynthEngine,
    settings: VolumeSettings,
    store: Box<dyn SettingsStore>,
    destroyed: bool,
}

impl EngineState {
    fn update(&mut self) {
        if let Some(sprites) = &mut self.sprites {
            sprites.pump_events();
            sprites.update();
        }
    }

    fn apply_sprite_volume(&mut self) {
        let volume = self.settings.effective_sprite_volume();
        if let Some(sprites) = &mut self.sprites {
            sprites.set_volume(volume);
        }
    }

    fn apply_piano_volume(&mut self) {
        self.piano.set_volume(self.settings.effective_piano_volume());
    }

    fn apply_synth_volume(&mut self) {
        self.synth.set_volume(self.settings.effective_synth_volume());
    }

    fn persist(&mut self) {
        let saved = self
            .settings
            .to_toml()
            .and_then(|content| self.store.save(SETTINGS_KEY, &content));
        if let Err(e) = saved {
            warn!("Failed to persist volume settings: {}", e);
        }
    }

    fn flush_rebroadcast(&mut self) {
        if self.destroyed {
            return;
        }
        if let Some(sprites) = &mut self.sprites {
            sprites.flush_rebroadcast();
        }
    }

    fn stop_all(&mut self) {
        if let Some(sprites) = &mut self.sprites {
            sprites.stop_all();
        }
        self.piano.reset();
        self.synth.reset_all();
    }
}

/// Handle to the engine's update tick.
///
/// Cloned into whatever drives the tick; keeps the engine state alive.
#[derive(Clone)]
pub struct Ticker {
    state: Rc<RefCell<EngineState>>,
}

impl Ticker {
    /// Run one update. Fails once the engine is destroyed.
    pub fn tick(&self) -> Result<(), AudioError> {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            return Err(AudioError::Destroyed);
        }
        state.update();
        Ok(())
    }
}

/// Top-level audio engine: a positional sprite player, a piano router and a
/// synth behind one set of volume knobs.
pub struct AudioEngine {
    state: Rc<RefCell<EngineState>>,
    local: Option<Rc<LocalSet>>,
    task: Option<JoinHandle<()>>,
    rebroadcast_timer: RefCell<Option<JoinHandle<()>>>,
}

impl AudioEngine {
    /// Build the subsystems, apply the initial volumes and start the
    /// scheduler.
    ///
    /// Fails when a timed strategy has no [`LocalSet`] to run on, or when
    /// none of the sprite sources is playable.
    pub fn new(options: EngineOptions) -> Result<Self, AudioError> {
        let EngineOptions {
            strategy,
            sprites,
            playback,
            settings,
            store,
            instrument,
            oscillators,
            clock,
            local,
        } = options;

        if local.is_none() && !matches!(strategy, UpdateStrategy::Custom(_)) {
            return Err(AudioError::InitFailed(format!(
                "{:?} scheduling needs a LocalSet",
                strategy
            )));
        }

        let sprites = match sprites {
            Some(sprite_options) => Some(SpritePlayer::new(playback, clock, sprite_options)?),
            None => None,
        };
        let settings = settings.unwrap_or_else(|| VolumeSettings::load_or_default(store.as_ref()));

        let mut state = EngineState {
            sprites,
            piano: PianoRouter::new(instrument),
            synth: SynthEngine::new(oscillators),
            settings,
            store,
            destroyed: false,
        };
        state.apply_sprite_volume();
        state.apply_piano_volume();
        state.apply_synth_volume();

        info!(
            "Audio engine initialized (master {}, sprite {}, piano {}, synth {})",
            settings.master, settings.sprite, settings.piano, settings.synth
        );

        let mut engine = Self {
            state: Rc::new(RefCell::new(state)),
            local,
            task: None,
            rebroadcast_timer: RefCell::new(None),
        };
        engine.task = engine.schedule(strategy);
        engine.arm_rebroadcast();
        Ok(engine)
    }

    fn schedule(&self, strategy: UpdateStrategy) -> Option<JoinHandle<()>> {
        let ticker = self.ticker();
        let (period, missed) = match strategy {
            UpdateStrategy::Interval(period) => (period, MissedTickBehavior::Delay),
            UpdateStrategy::AnimationFrame => (FRAME_INTERVAL, MissedTickBehavior::Skip),
            UpdateStrategy::Custom(driver) => {
                driver(ticker);
                return None;
            }
        };
        let local = self.local.as_ref()?;

        debug!("Scheduling audio updates every {:?}", period);
        Some(local.spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(missed);
            loop {
                interval.tick().await;
                if ticker.tick().is_err() {
                    break;
                }
            }
        }))
    }

    /// (Re)start the debounce timer for a pending sprite volume rebroadcast.
    /// Each call replaces the previous timer, so a burst of volume changes
    /// is rebroadcast once, a full window after the last of them.
    fn arm_rebroadcast(&self) {
        let Some(local) = &self.local else {
            return;
        };
        let window = match &self.state.borrow().sprites {
            Some(sprites) if sprites.rebroadcast_pending() => sprites.rebroadcast_window(),
            _ => return,
        };

        let state: Weak<RefCell<EngineState>> = Rc::downgrade(&self.state);
        let timer = local.spawn_local(async move {
            tokio::time::sleep(window).await;
            if let Some(state) = state.upgrade() {
                state.borrow_mut().flush_rebroadcast();
            }
        });
        if let Some(previous) = self.rebroadcast_timer.replace(Some(timer)) {
            previous.abort();
        }
    }

    /// The tick handle, for hosts driving updates themselves
    pub fn ticker(&self) -> Ticker {
        Ticker {
            state: Rc::clone(&self.state),
        }
    }

    /// Run one update now, outside the schedule
    pub fn update(&self) -> Result<(), AudioError> {
        self.ticker().tick()
    }

    /// Stop every sound and voice, cancel the scheduler and poison the tick.
    pub fn destroy(&mut self) {
        let mut state = self.state.borrow_mut();
        state.stop_all();
        state.destroyed = true;
        drop(state);

        self.cancel_tasks();
        info!("Audio engine destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    // ---- Sprites ----

    /// Play a sprite at center pan. Returns false when nothing started.
    pub fn play_static(&self, sprite: &str, volume: u8) -> bool {
        match &mut self.state.borrow_mut().sprites {
            Some(sprites) => sprites.play_static(sprite, volume),
            None => false,
        }
    }

    /// Play a sprite from a point in the world.
    pub fn play_on_pos(&self, sprite: &str, point: AudioPoint, volume: u8) -> Option<SoundId> {
        self.state
            .borrow_mut()
            .sprites
            .as_mut()
            .and_then(|sprites| sprites.play_on_pos(sprite, point, volume))
    }

    pub fn is_playing(&self, id: SoundId) -> bool {
        self.state
            .borrow()
            .sprites
            .as_ref()
            .is_some_and(|sprites| sprites.is_playing(id))
    }

    /// Stop every sprite, piano note and synth voice
    pub fn stop_all(&self) {
        self.state.borrow_mut().stop_all();
    }

    pub fn set_sound_listener(&self, position: Vec3) {
        if let Some(sprites) = &mut self.state.borrow_mut().sprites {
            sprites.set_listener(position);
        }
    }

    // ---- Piano ----

    pub fn piano_key_down(&self, instrument: &str, note: u8, velocity: u8) {
        self.state.borrow_mut().piano.key_down(instrument, note, velocity);
    }

    pub fn piano_key_up(&self, instrument: &str, note: u8, velocity: u8) {
        self.state.borrow_mut().piano.key_up(instrument, note, velocity);
    }

    pub fn piano_pedal_down(&self, instrument: &str) {
        self.state.borrow_mut().piano.pedal_down(instrument);
    }

    pub fn piano_pedal_up(&self, instrument: &str) {
        self.state.borrow_mut().piano.pedal_up(instrument);
    }

    pub fn piano_reset(&self) {
        self.state.borrow_mut().piano.reset();
    }

    pub fn piano_playing_notes(&self) -> Vec<u8> {
        self.state.borrow().piano.playing_notes()
    }

    pub fn add_piano_sampler(&self, name: &str, instrument: Box<dyn SampleInstrument>, pedal: PedalMode) {
        self.state.borrow_mut().piano.add_custom(name, instrument, pedal);
    }

    pub fn remove_piano_sampler(&self, name: &str) -> bool {
        self.state.borrow_mut().piano.remove_custom(name)
    }

    // ---- Synth ----

    pub fn synth_toggle_note(&self, waveform: Waveform, index: u8, on: bool) {
        self.state.borrow_mut().synth.toggle_note(waveform, index, on);
    }

    pub fn synth_key_down(&self, waveform: Waveform, note: &str) {
        self.state.borrow_mut().synth.key_down(waveform, note);
    }

    pub fn synth_key_up(&self, waveform: Waveform, note: &str) {
        self.state.borrow_mut().synth.key_up(waveform, note);
    }

    pub fn play_tone(&self, waveform: Waveform, frequency: f32, duration: Duration) {
        self.state
            .borrow_mut()
            .synth
            .play_tone(waveform, frequency, duration);
    }

    pub fn synth_reset(&self) {
        self.state.borrow_mut().synth.reset_all();
    }

    pub fn synth_playing_notes(&self) -> Vec<&'static str> {
        self.state.borrow().synth.playing_notes()
    }

    // ---- Volume ----

    pub fn settings(&self) -> VolumeSettings {
        self.state.borrow().settings
    }

    pub fn master_volume(&self) -> u8 {
        self.state.borrow().settings.master
    }

    pub fn sprite_volume(&self) -> u8 {
        self.state.borrow().settings.sprite
    }

    pub fn piano_volume(&self) -> u8 {
        self.state.borrow().settings.piano
    }

    pub fn synth_volume(&self) -> u8 {
        self.state.borrow().settings.synth
    }

    /// Rescales every channel, then persists once.
    pub fn set_master_volume(&self, value: u8) {
        {
            let mut state = self.state.borrow_mut();
            state.settings.master = value.min(100);
            state.apply_sprite_volume();
            state.apply_piano_volume();
            state.apply_synth_volume();
            state.persist();
        }
        self.arm_rebroadcast();
    }

    pub fn set_sprite_volume(&self, value: u8) {
        {
            let mut state = self.state.borrow_mut();
            state.settings.sprite = value.min(100);
            state.apply_sprite_volume();
            state.persist();
        }
        self.arm_rebroadcast();
    }

    pub fn set_piano_volume(&self, value: u8) {
        let mut state = self.state.borrow_mut();
        state.settings.piano = value.min(100);
        state.apply_piano_volume();
        state.persist();
    }

    pub fn set_synth_volume(&self, value: u8) {
        let mut state = self.state.borrow_mut();
        state.settings.synth = value.min(100);
        state.apply_synth_volume();
        state.persist();
    }
}

impl AudioEngine {
    fn cancel_tasks(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(timer) = self.rebroadcast_timer.get_mut().take() {
            timer.abort();
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::sprite::{Sprite, SpriteTable};
    use crate::testutil::{FakeInstrument, FakeOscillators, FakePlayback};
    use soundstage_core::ManualClock;

    struct Fakes {
        playback: FakePlayback,
        instrument: FakeInstrument,
        oscillators: FakeOscillators,
        store: MemoryStore,
        clock: ManualClock,
    }

    impl Fakes {
        fn new() -> Self {
            Self {
                playback: FakePlayback::new(&["ogg"]),
                instrument: FakeInstrument::loaded(),
                oscillators: FakeOscillators::new(),
                store: MemoryStore::new(),
                clock: ManualClock::new(),
            }
        }

        fn options(&self, strategy: UpdateStrategy) -> EngineOptions {
            let mut sprites = SpriteTable::new();
            sprites.insert("boom".to_string(), Sprite::new(0, 800));

            EngineOptions::new(
                Box::new(self.playback.clone()),
                Box::new(self.instrument.clone()),
                Box::new(self.oscillators.clone()),
            )
            .with_strategy(strategy)
            .with_sprites(SpriteOptions {
                sources: vec!["sfx.ogg".to_string()],
                sprites,
                listener: Vec3::ZERO,
            })
            .with_store(Box::new(self.store.clone()))
            .with_clock(Rc::new(self.clock.clone()))
        }
    }

    fn manual() -> UpdateStrategy {
        UpdateStrategy::Custom(Box::new(|_| {}))
    }

    #[test]
    fn initial_volumes_are_pushed() {
        let fakes = Fakes::new();
        let engine = AudioEngine::new(fakes.options(manual())).unwrap();

        let state = engine.state.borrow();
        assert!((state.sprites.as_ref().unwrap().volume() - 50.0).abs() < 1e-4);
        assert_eq!(state.piano.volume(), 75.0);
        assert_eq!(state.synth.volume(), 10.0);
        assert_eq!(fakes.playback.state().load_calls, 1);
    }

    #[test]
    fn master_volume_cascades() {
        let fakes = Fakes::new();
        let engine = AudioEngine::new(fakes.options(manual())).unwrap();

        engine.set_master_volume(50);

        let state = engine.state.borrow();
        assert!((state.sprites.as_ref().unwrap().volume() - 25.0).abs() < 1e-4);
        assert!((state.piano.volume() - 37.5).abs() < 1e-4);
        assert!((state.synth.volume() - 5.0).abs() < 1e-4);
        assert_eq!(fakes.instrument.state().volume_db, Some(37.5 - 100.0));
    }

    #[test]
    fn setters_persist_and_clamp() {
        let fakes = Fakes::new();
        let engine = AudioEngine::new(fakes.options(manual())).unwrap();
        assert!(fakes.store.get(SETTINGS_KEY).is_none());

        engine.set_synth_volume(250);
        assert_eq!(engine.synth_volume(), 100);

        let saved = VolumeSettings::from_toml(&fakes.store.get(SETTINGS_KEY).unwrap()).unwrap();
        assert_eq!(saved.synth, 100);
        assert_eq!(saved.master, 100);
    }

    #[test]
    fn stored_settings_are_used_when_none_given() {
        let fakes = Fakes::new();
        let mut store = fakes.store.clone();
        store.save(SETTINGS_KEY, "master = 20\npiano = 50\n").unwrap();

        let engine = AudioEngine::new(fakes.options(manual())).unwrap();
        assert_eq!(engine.master_volume(), 20);
        assert_eq!(engine.piano_volume(), 50);
        assert_eq!(engine.sprite_volume(), 50);
        assert!((engine.state.borrow().piano.volume() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn explicit_settings_win_over_store() {
        let fakes = Fakes::new();
        let mut store = fakes.store.clone();
        store.save(SETTINGS_KEY, "master = 20\n").unwrap();

        let options = fakes.options(manual()).with_settings(VolumeSettings {
            master: 80,
            ..Default::default()
        });
        let engine = AudioEngine::new(options).unwrap();
        assert_eq!(engine.master_volume(), 80);
    }

    #[test]
    fn unknown_instrument_routes_to_default() {
        let fakes = Fakes::new();
        let engine = AudioEngine::new(fakes.options(manual())).unwrap();

        engine.piano_key_down("nonexistent-instrument", 60, 100);
        assert_eq!(engine.piano_playing_notes(), vec![60]);
        assert_eq!(fakes.instrument.state().attacks.len(), 1);
    }

    #[test]
    fn custom_driver_ticks_until_destroyed() {
        let fakes = Fakes::new();
        let slot: Rc<RefCell<Option<Ticker>>> = Rc::default();
        let driver_slot = Rc::clone(&slot);
        let strategy = UpdateStrategy::Custom(Box::new(move |ticker| {
            *driver_slot.borrow_mut() = Some(ticker);
        }));

        let mut engine = AudioEngine::new(fakes.options(strategy)).unwrap();
        let ticker = slot.borrow_mut().take().unwrap();

        fakes.playback.finish_loading();
        ticker.tick().unwrap();
        let id = engine
            .play_on_pos("boom", AudioPoint::new(5.0, 0.0, 10.0), 100)
            .unwrap();
        let writes = fakes.playback.state().position_writes;
        ticker.tick().unwrap();
        assert_eq!(fakes.playback.state().position_writes, writes + 1);
        assert!(engine.is_playing(id));

        engine.destroy();
        assert!(matches!(ticker.tick(), Err(AudioError::Destroyed)));
        assert!(matches!(engine.update(), Err(AudioError::Destroyed)));
        assert_eq!(fakes.playback.state().position_writes, writes + 1);
    }

    #[test]
    fn destroy_silences_everything() {
        let fakes = Fakes::new();
        let mut engine = AudioEngine::new(fakes.options(manual())).unwrap();
        fakes.playback.finish_loading();
        assert!(engine.play_static("boom", 100));
        engine.piano_key_down("default", 64, 90);
        engine.synth_toggle_note(Waveform::Sine, 69, true);

        engine.destroy();

        assert_eq!(fakes.playback.state().stopped.len(), 1);
        assert!(engine.piano_playing_notes().is_empty());
        assert_eq!(fakes.oscillators.live_count(), 0);
        assert!(engine.is_destroyed());
    }

    #[test]
    fn play_before_load_fails_softly() {
        let fakes = Fakes::new();
        let engine = AudioEngine::new(fakes.options(manual())).unwrap();
        assert!(!engine.play_static("boom", 100));
        assert_eq!(engine.state.borrow().sprites.as_ref().unwrap().playing_count(), 0);
    }

    #[test]
    fn no_sprite_options_means_no_sprites() {
        let fakes = Fakes::new();
        let mut options = fakes.options(manual());
        options.sprites = None;
        let engine = AudioEngine::new(options).unwrap();

        assert!(!engine.play_static("boom", 100));
        assert!(engine.play_on_pos("boom", AudioPoint::new(0.0, 0.0, 10.0), 100).is_none());
        engine.update().unwrap();
    }

    #[test]
    fn unplayable_sources_fail_construction() {
        let fakes = Fakes::new();
        let mut options = fakes.options(manual());
        if let Some(sprites) = &mut options.sprites {
            sprites.sources = vec!["sfx.webm".to_string()];
        }
        assert!(matches!(
            AudioEngine::new(options),
            Err(AudioError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn synth_pass_throughs() {
        let fakes = Fakes::new();
        let engine = AudioEngine::new(fakes.options(manual())).unwrap();

        engine.synth_key_down(Waveform::Square, "A4");
        engine.synth_key_down(Waveform::Square, "A4");
        assert_eq!(fakes.oscillators.live_count(), 1);
        assert_eq!(engine.synth_playing_notes(), vec!["A4"]);

        engine.play_tone(Waveform::Sine, 880.0, Duration::from_millis(200));
        assert_eq!(fakes.oscillators.state().started, 2);

        engine.synth_reset();
        assert!(engine.synth_playing_notes().is_empty());
    }

    #[test]
    fn timed_strategies_need_a_local_set() {
        let fakes = Fakes::new();
        let options = fakes.options(UpdateStrategy::default());
        assert!(options.local.is_none());
        assert!(matches!(
            AudioEngine::new(options),
            Err(AudioError::InitFailed(_))
        ));
        assert!(matches!(
            AudioEngine::new(fakes.options(UpdateStrategy::AnimationFrame)),
            Err(AudioError::InitFailed(_))
        ));
    }

    #[test]
    fn default_options_use_the_default_strategy() {
        let fakes = Fakes::new();
        let options = EngineOptions::new(
            Box::new(fakes.playback.clone()),
            Box::new(fakes.instrument.clone()),
            Box::new(fakes.oscillators.clone()),
        );
        assert!(matches!(
            options.strategy,
            UpdateStrategy::Interval(period) if period == DEFAULT_UPDATE_INTERVAL
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn volume_rebroadcast_lands_without_ticks() {
        let local = Rc::new(LocalSet::new());
        local
            .run_until(async {
                let fakes = Fakes::new();
                let engine =
                    AudioEngine::new(fakes.options(manual()).with_local_set(Rc::clone(&local)))
                        .unwrap();

                fakes.playback.finish_loading();
                assert!(engine.play_static("boom", 50));
                let id = fakes.playback.last_id().unwrap();
                assert!((fakes.playback.volume_of(id).unwrap() - 0.25).abs() < 1e-6);

                engine.set_sprite_volume(100);
                tokio::time::sleep(Duration::from_millis(30)).await;
                engine.set_sprite_volume(80);

                // The second change restarts the window.
                tokio::time::sleep(Duration::from_millis(40)).await;
                assert!((fakes.playback.volume_of(id).unwrap() - 0.25).abs() < 1e-6);

                tokio::time::sleep(Duration::from_millis(20)).await;
                assert!((fakes.playback.volume_of(id).unwrap() - 0.4).abs() < 1e-6);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_cancels_a_pending_rebroadcast() {
        let local = Rc::new(LocalSet::new());
        local
            .run_until(async {
                let fakes = Fakes::new();
                let mut engine =
                    AudioEngine::new(fakes.options(manual()).with_local_set(Rc::clone(&local)))
                        .unwrap();

                fakes.playback.finish_loading();
                assert!(engine.play_static("boom", 50));
                engine.set_master_volume(50);
                let writes = fakes.playback.state().volume_writes;

                engine.destroy();
                tokio::time::sleep(Duration::from_millis(200)).await;
                assert_eq!(fakes.playback.state().volume_writes, writes);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_strategy_ticks_until_destroyed() {
        let local = Rc::new(LocalSet::new());
        local
            .run_until(async {
                let fakes = Fakes::new();
                let strategy = UpdateStrategy::Interval(Duration::from_millis(100));
                let mut engine = AudioEngine::new(
                    fakes.options(strategy).with_local_set(Rc::clone(&local)),
                )
                .unwrap();

                fakes.playback.finish_loading();
                engine
                    .play_on_pos("boom", AudioPoint::new(1.0, 1.0, 10.0), 100)
                    .unwrap();
                let before = fakes.playback.state().position_writes;

                tokio::time::sleep(Duration::from_millis(350)).await;
                let during = fakes.playback.state().position_writes;
                assert!(during >= before + 3, "{before} -> {during}");

                engine.destroy();
                tokio::time::sleep(Duration::from_millis(500)).await;
                assert_eq!(fakes.playback.state().position_writes, during);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn frame_strategy_runs_at_frame_rate() {
        let local = Rc::new(LocalSet::new());
        local
            .run_until(async {
                let fakes = Fakes::new();
                let engine = AudioEngine::new(
                    fakes
                        .options(UpdateStrategy::AnimationFrame)
                        .with_local_set(Rc::clone(&local)),
                )
                .unwrap();

                fakes.playback.finish_loading();
                engine
                    .play_on_pos("boom", AudioPoint::new(1.0, 1.0, 10.0), 100)
                    .unwrap();
                let before = fakes.playback.state().position_writes;

                tokio::time::sleep(Duration::from_millis(1000)).await;
                let frames = fakes.playback.state().position_writes - before;
                assert!((58..=62).contains(&frames), "{frames} frames");
            })
            .await;
    }
}
