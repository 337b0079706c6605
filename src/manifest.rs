//! Sprite manifests
//!
//! A manifest is a TOML file naming the candidate sources of one sprite
//! sheet, its sprite table and, optionally, the samples of a piano:
//!
//! ```toml
//! sources = ["sfx.ogg", "sfx.mp3"]
//! listener = [0.0, 0.0, 0.0]
//!
//! [sprites.boom]
//! offset_ms = 0
//! duration_ms = 800
//!
//! [piano]
//! C4 = "piano/C4.wav"
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use soundstage_audio::{SpriteOptions, SpriteTable};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub sources: Vec<String>,
    #[serde(default)]
    pub listener: Vec3,
    #[serde(default)]
    pub sprites: SpriteTable,
    /// Note name to sample file
    #[serde(default)]
    pub piano: BTreeMap<String, PathBuf>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        let mut manifest: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {:?}", path))?;

        if let Some(base) = path.parent() {
            manifest.resolve(base);
        }
        info!(
            "Loaded manifest {:?} ({} sprites, {} piano samples)",
            path,
            manifest.sprites.len(),
            manifest.piano.len()
        );
        Ok(manifest)
    }

    fn resolve(&mut self, base: &Path) {
        for source in &mut self.sources {
            if Path::new(source).is_relative() {
                *source = base.join(&*source).to_string_lossy().into_owned();
            }
        }
        for sample in self.piano.values_mut() {
            if sample.is_relative() {
                *sample = base.join(&*sample);
            }
        }
    }

    pub fn sprite_options(&self) -> SpriteOptions {
        SpriteOptions {
            sources: self.sources.clone(),
            sprites: self.sprites.clone(),
            listener: self.listener,
        }
    }
}
