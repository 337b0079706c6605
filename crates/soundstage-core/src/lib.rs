//! Soundstage Core - Foundation types for the Soundstage audio layer
//!
//! This crate provides the pieces the audio subsystems share:
//! - Planar distance and stereo displacement math
//! - The 128-entry MIDI note/frequency table
//! - Emission points and entity identifiers
//! - Clocks and the debounce used for deferred recomputation

pub mod geometry;
pub mod notes;
pub mod time;
pub mod types;

pub use glam::Vec3;
pub use geometry::{distance, stereo_displacement, StereoPoint};
pub use notes::{NoteEntry, NoteTable, NOTE_COUNT};
pub use time::{Clock, Debounce, ManualClock, SystemClock};
pub use types::{AudioPoint, EntityId};
