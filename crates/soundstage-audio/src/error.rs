//! Error types for the audio subsystems

use std::path::PathBuf;

/// Errors that can occur in the audio system.
///
/// Playback requests that simply cannot start (nothing loaded yet, volume at
/// zero, the backend refusing) are not errors: they come back as `false` or
/// `None` from the play calls.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no playable audio source among {candidates:?}")]
    UnsupportedFormat { candidates: Vec<String> },

    #[error("failed to load audio source '{0}': {1}")]
    LoadFailed(String, String),

    #[error("note index {0} is outside the note table")]
    UnknownNote(u8),

    #[error("audio engine has been destroyed")]
    Destroyed,

    #[error("failed to initialize audio backend: {0}")]
    InitFailed(String),

    #[error("audio playback failed: {0}")]
    PlaybackFailed(String),

    #[error("settings I/O error at '{0}': {1}")]
    SettingsIo(PathBuf, #[source] std::io::Error),

    #[error("failed to parse settings: {0}")]
    SettingsParse(String),

    #[error("failed to serialize settings: {0}")]
    SettingsSerialize(String),
}
