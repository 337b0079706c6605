//! Volume settings and their persistence
//!
//! The default store writes `~/.config/soundstage/<key>.toml`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AudioError;

/// Key the settings are stored under
pub const SETTINGS_KEY: &str = "soundstage";

/// Volume knobs, each a percentage (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    pub master: u8,
    pub sprite: u8,
    pub piano: u8,
    pub synth: u8,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            master: 100,
            sprite: 50,
            piano: 75,
            synth: 10,
        }
    }
}

impl VolumeSettings {
    /// Scale a channel percentage by the master percentage
    pub fn effective(&self, channel: u8) -> f32 {
        channel as f32 * (self.master as f32 / 100.0)
    }

    /// Effective sprite volume (sprite * master / 100).
    pub fn effective_sprite_volume(&self) -> f32 {
        self.effective(self.sprite)
    }

    /// Effective piano volume (piano * master / 100).
    pub fn effective_piano_volume(&self) -> f32 {
        self.effective(self.piano)
    }

    /// Effective synth volume (synth * master / 100).
    pub fn effective_synth_volume(&self) -> f32 {
        self.effective(self.synth)
    }

    pub fn to_toml(&self) -> Result<String, AudioError> {
        toml::to_string_pretty(self).map_err(|e| AudioError::SettingsSerialize(e.to_string()))
    }

    pub fn from_toml(content: &str) -> Result<Self, AudioError> {
        toml::from_str(content).map_err(|e| AudioError::SettingsParse(e.to_string()))
    }

    /// Load from a store, falling back to defaults on absence or failure
    pub fn load_or_default(store: &dyn SettingsStore) -> Self {
        match store.load(SETTINGS_KEY) {
            Ok(Some(content)) => match Self::from_toml(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("{}, using defaults", e);
                    Self::default()
                }
            },
            Ok(None) => {
                info!("No stored volume settings, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("Failed to read volume settings: {}, using defaults", e);
                Self::default()
            }
        }
    }
}

/// Somewhere serialized settings live between sessions
pub trait SettingsStore {
    fn load(&self, key: &str) -> Result<Option<String>, AudioError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), AudioError>;
}

/// One TOML file per key under a config directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform config directory, if one exists
    pub fn from_config_dir() -> Option<Self> {
        config_dir().map(Self::new)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.toml"))
    }
}

impl SettingsStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, AudioError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| AudioError::SettingsIo(path, e))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), AudioError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| AudioError::SettingsIo(self.dir.clone(), e))?;
        }

        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| AudioError::SettingsIo(path.clone(), e))?;
        info!("Saved volume settings to {:?}", path);
        Ok(())
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("soundstage"))
}

/// The platform config directory store, or an in-memory one when the
/// platform has no config directory.
pub fn default_store() -> Box<dyn SettingsStore> {
    store_at(config_dir())
}

fn store_at(dir: Option<PathBuf>) -> Box<dyn SettingsStore> {
    match dir {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => {
            warn!("Could not determine config directory, volume settings will not persist");
            Box::new(MemoryStore::new())
        }
    }
}

/// In-process store. Clones share contents, so a test can keep one and
/// hand the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, AudioError> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), AudioError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
