//! Soundstage - command-line host for the Soundstage audio engine
//!
//! Plays sprites and tones through the engine and edits the persisted
//! volume settings.

mod manifest;

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{crate_version, Parser, Subcommand};
use soundstage_audio::{
    AudioEngine, EngineOptions, FileStore, KiraContext, KiraOscillators, KiraPlayback,
    KiraSampler, SettingsStore, VolumeSettings, Waveform, DEFAULT_SOUND_VOLUME, SETTINGS_KEY,
};
use soundstage_core::{AudioPoint, NoteTable};
use tokio::task::LocalSet;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::manifest::Manifest;

#[derive(Parser)]
#[clap(version = crate_version!(), about = "Positional game audio from the command line.")]
struct Cli {
    /// Log debug output, including per-sound panning.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the note table.
    Notes {},
    /// Plays a sprite from a manifest, optionally from a point in the world.
    Play {
        /// The path to the sprite manifest.
        manifest: PathBuf,
        /// The sprite to play.
        sprite: String,
        /// Emission point as x,y. Plays at center pan when absent.
        #[arg(short, long, value_parser = parse_point)]
        at: Option<(f32, f32)>,
        /// Audible distance of the emission point.
        #[arg(short, long, default_value_t = 10.0)]
        distance: f32,
        /// Relative volume percentage.
        #[arg(long, default_value_t = DEFAULT_SOUND_VOLUME)]
        volume: u8,
        /// How long to keep the engine running.
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Plays a synth tone.
    Tone {
        /// A note name such as A4 or Db5, or a frequency in Hz.
        note: String,
        #[arg(short, long, default_value = "sine", value_parser = parse_waveform)]
        waveform: Waveform,
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
    },
    /// Shows or changes the persisted volume settings.
    Volume {
        #[arg(long)]
        master: Option<u8>,
        #[arg(long)]
        sprite: Option<u8>,
        #[arg(long)]
        piano: Option<u8>,
        #[arg(long)]
        synth: Option<u8>,
    },
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

fn parse_waveform(s: &str) -> Result<Waveform, String> {
    match s.to_ascii_lowercase().as_str() {
        "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
        "sine" => Ok(Waveform::Sine),
        "square" => Ok(Waveform::Square),
        "triangle" => Ok(Waveform::Triangle),
        _ => Err(format!("unknown waveform '{s}'")),
    }
}

/// Frequency of a note name, or a literal frequency
fn parse_frequency(note: &str) -> Result<f32> {
    if let Some(index) = soundstage_core::notes::index_of(note) {
        if let Some(entry) = soundstage_core::notes::note(index) {
            return Ok(entry.frequency);
        }
    }
    note.parse()
        .with_context(|| format!("'{}' is neither a note name nor a frequency", note))
}

fn settings_store() -> Result<FileStore> {
    FileStore::from_config_dir().context("Could not determine config directory")
}

fn build_engine(
    context: &KiraContext,
    local: Rc<LocalSet>,
    manifest: Option<&Manifest>,
) -> Result<AudioEngine> {
    let samples = manifest.map(|m| m.piano.clone()).unwrap_or_default();

    let mut options = EngineOptions::new(
        Box::new(KiraPlayback::new(context.clone())),
        Box::new(KiraSampler::load(context.clone(), &samples)),
        Box::new(KiraOscillators::new(context.clone())),
    )
    .with_local_set(local);
    if let Some(manifest) = manifest {
        options = options.with_sprites(manifest.sprite_options());
    }

    Ok(AudioEngine::new(options)?)
}

async fn play(
    local: Rc<LocalSet>,
    manifest: PathBuf,
    sprite: String,
    at: Option<(f32, f32)>,
    distance: f32,
    volume: u8,
    duration: Duration,
) -> Result<()> {
    let manifest = Manifest::load(&manifest)?;
    let context = KiraContext::new()?;
    let mut engine = build_engine(&context, local, Some(&manifest))?;

    // Loading completes asynchronously; retry until the sprite starts.
    let mut started = false;
    for _ in 0..50 {
        started = match at {
            Some((x, y)) => engine
                .play_on_pos(&sprite, AudioPoint::new(x, y, distance), volume)
                .is_some(),
            None => engine.play_static(&sprite, volume),
        };
        if started {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if !started {
        anyhow::bail!("Could not play sprite '{}'", sprite);
    }

    info!("Playing '{}'", sprite);
    tokio::time::sleep(duration).await;
    engine.destroy();
    Ok(())
}

async fn tone(
    local: Rc<LocalSet>,
    note: String,
    waveform: Waveform,
    duration: Duration,
) -> Result<()> {
    let frequency = parse_frequency(&note)?;
    let context = KiraContext::new()?;
    let mut engine = build_engine(&context, local, None)?;

    info!("Playing {:?} tone at {} Hz", waveform, frequency);
    engine.play_tone(waveform, frequency, duration);
    tokio::time::sleep(duration + Duration::from_millis(100)).await;
    engine.destroy();
    Ok(())
}

fn volume(
    master: Option<u8>,
    sprite: Option<u8>,
    piano: Option<u8>,
    synth: Option<u8>,
) -> Result<()> {
    let mut store = settings_store()?;
    let mut settings = VolumeSettings::load_or_default(&store);

    let changed = [master, sprite, piano, synth].iter().any(Option::is_some);
    let set = |slot: &mut u8, value: Option<u8>| {
        if let Some(value) = value {
            *slot = value.min(100);
        }
    };
    set(&mut settings.master, master);
    set(&mut settings.sprite, sprite);
    set(&mut settings.piano, piano);
    set(&mut settings.synth, synth);

    if changed {
        store.save(SETTINGS_KEY, &settings.to_toml()?)?;
    }

    println!("master: {}", settings.master);
    println!("sprite: {} (effective {})", settings.sprite, settings.effective_sprite_volume());
    println!("piano:  {} (effective {})", settings.piano, settings.effective_piano_volume());
    println!("synth:  {} (effective {})", settings.synth, settings.effective_synth_volume());
    Ok(())
}

fn notes() {
    for entry in NoteTable::get().iter() {
        if entry.name.is_empty() {
            println!("{:>3}        {:>9.2}", entry.index, entry.frequency);
        } else {
            println!("{:>3} {:<6} {:>9.2}", entry.index, entry.name, entry.frequency);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let local = Rc::new(LocalSet::new());

    match cli.command {
        Commands::Notes {} => notes(),
        Commands::Play {
            manifest,
            sprite,
            at,
            distance,
            volume,
            duration_ms,
        } => local.block_on(
            &runtime,
            play(
                Rc::clone(&local),
                manifest,
                sprite,
                at,
                distance,
                volume,
                Duration::from_millis(duration_ms),
            ),
        )?,
        Commands::Tone {
            note,
            waveform,
            duration_ms,
        } => local.block_on(
            &runtime,
            tone(Rc::clone(&local), note, waveform, Duration::from_millis(duration_ms)),
        )?,
        Commands::Volume {
            master,
            sprite,
            piano,
            synth,
        } => volume(master, sprite, piano, synth)?,
    }

    Ok(())
}
