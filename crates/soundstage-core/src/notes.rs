//! MIDI note table
//!
//! Maps the 128 MIDI note indices to a display name and fundamental
//! frequency, plus the inverse name lookup. Indices below A0 (21) are
//! sub-audible for a piano and carry an empty name.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Number of entries in the table (MIDI 0..=127)
pub const NOTE_COUNT: usize = 128;

/// Lowest index that carries a note name (A0)
pub const LOWEST_NAMED: u8 = 21;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const FLAT_NAMES: [Option<&str>; 12] = [
    None,
    Some("Db"),
    None,
    Some("Eb"),
    None,
    None,
    Some("Gb"),
    None,
    Some("Ab"),
    None,
    Some("Bb"),
    None,
];

/// One row of the note table
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEntry {
    pub index: u8,
    /// Scientific pitch name such as `C#4`; empty below A0
    pub name: String,
    /// Fundamental frequency in Hz, rounded to two decimals
    pub frequency: f32,
}

/// The immutable table plus its inverse name map
pub struct NoteTable {
    entries: Vec<NoteEntry>,
    by_name: HashMap<String, u8>,
}

static TABLE: LazyLock<NoteTable> = LazyLock::new(NoteTable::build);

impl NoteTable {
    /// The process-wide table, built on first access
    pub fn get() -> &'static NoteTable {
        &TABLE
    }

    fn build() -> Self {
        let mut entries = Vec::with_capacity(NOTE_COUNT);
        let mut by_name = HashMap::new();

        for index in 0..NOTE_COUNT as u8 {
            let pitch_class = (index % 12) as usize;
            let octave = (index / 12) as i32 - 1;

            let name = if index >= LOWEST_NAMED {
                let sharp = format!("{}{}", SHARP_NAMES[pitch_class], octave);
                by_name.insert(sharp.clone(), index);
                if let Some(flat) = FLAT_NAMES[pitch_class] {
                    by_name.insert(format!("{flat}{octave}"), index);
                }
                sharp
            } else {
                String::new()
            };

            entries.push(NoteEntry {
                index,
                name,
                frequency: frequency_of(index),
            });
        }

        Self { entries, by_name }
    }

    /// Look up an entry by MIDI index
    pub fn note(&self, index: u8) -> Option<&NoteEntry> {
        self.entries.get(index as usize)
    }

    /// Resolve a note name (sharp or flat spelling) to its MIDI index
    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Equal-tempered frequency with A4 (69) at 440 Hz
fn frequency_of(index: u8) -> f32 {
    let exact = 440.0_f64 * 2.0_f64.powf((index as f64 - 69.0) / 12.0);
    ((exact * 100.0).round() / 100.0) as f32
}

/// Shorthand for `NoteTable::get().note(index)`
pub fn note(index: u8) -> Option<&'static NoteEntry> {
    NoteTable::get().note(index)
}

/// Shorthand for `NoteTable::get().index_of(name)`
pub fn index_of(name: &str) -> Option<u8> {
    NoteTable::get().index_of(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_every_midi_index() {
        let table = NoteTable::get();
        assert_eq!(table.len(), NOTE_COUNT);
        for (i, entry) in table.iter().enumerate() {
            assert_eq!(entry.index as usize, i);
            assert!(entry.frequency > 0.0);
        }
    }

    #[test]
    fn test_reference_frequencies() {
        assert_eq!(note(69).unwrap().frequency, 440.0);
        assert_eq!(note(60).unwrap().frequency, 261.63);
        assert_eq!(note(0).unwrap().frequency, 8.18);
        assert_eq!(note(21).unwrap().frequency, 27.5);
        assert_eq!(note(127).unwrap().frequency, 12543.85);
    }

    #[test]
    fn test_names() {
        assert_eq!(note(20).unwrap().name, "");
        assert_eq!(note(21).unwrap().name, "A0");
        assert_eq!(note(60).unwrap().name, "C4");
        assert_eq!(note(61).unwrap().name, "C#4");
        assert_eq!(note(108).unwrap().name, "C8");
        assert_eq!(note(127).unwrap().name, "G9");
    }

    #[test]
    fn test_inverse_lookup() {
        assert_eq!(index_of("A4"), Some(69));
        assert_eq!(index_of("C#4"), Some(61));
        assert_eq!(index_of("Db4"), Some(61));
        assert_eq!(index_of("Bb0"), Some(22));
        assert_eq!(index_of(""), None);
        assert_eq!(index_of("H2"), None);
        assert_eq!(index_of("G#-1"), None);
    }

    #[test]
    fn test_out_of_range_index() {
        assert!(note(128).is_none());
    }
}
