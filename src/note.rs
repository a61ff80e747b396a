//! The fixed pitch palette that patterns trigger from.
//!
//! Notes are static configuration, not something the engine computes: an
//! ordered pentatonic selection spanning three octaves. A [`Note`] is an
//! index into that table, which keeps the type `Copy` and makes "note
//! index" the natural unit for the mutation API.

/// Name and MIDI number for each palette entry, lowest first.
const NOTE_TABLE: [(&str, u8); 18] = [
    ("C3", 48),
    ("D3", 50),
    ("E3", 52),
    ("G3", 55),
    ("A3", 57),
    ("C4", 60),
    ("D4", 62),
    ("E4", 64),
    ("G4", 67),
    ("A4", 69),
    ("C5", 72),
    ("D5", 74),
    ("E5", 76),
    ("G5", 79),
    ("A5", 81),
    ("C6", 84),
    ("D6", 86),
    ("E6", 88),
];

/// Number of pitches in the palette.
pub const NOTE_COUNT: usize = NOTE_TABLE.len();

/// A pitch from the fixed palette, stored as its palette index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note(usize);

impl Note {
    /// Look up a note by palette index. Returns `None` past the palette end.
    pub fn from_index(index: usize) -> Option<Note> {
        (index < NOTE_COUNT).then_some(Note(index))
    }

    /// The palette index of this note.
    pub fn index(&self) -> usize {
        self.0
    }

    /// The note name, e.g. `"C4"`.
    pub fn name(&self) -> &'static str {
        NOTE_TABLE[self.0].0
    }

    /// The MIDI note number.
    pub fn midi(&self) -> u8 {
        NOTE_TABLE[self.0].1
    }

    /// Frequency in Hz: f = 440 * 2^((midi - 69) / 12).
    pub fn frequency(&self) -> f64 {
        440.0 * 2.0_f64.powf((self.midi() as f64 - 69.0) / 12.0)
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_bounds() {
        assert!(Note::from_index(0).is_some());
        assert!(Note::from_index(NOTE_COUNT - 1).is_some());
        assert!(Note::from_index(NOTE_COUNT).is_none());
    }

    #[test]
    fn test_palette_is_ordered() {
        let midis: Vec<u8> = (0..NOTE_COUNT)
            .map(|i| Note::from_index(i).unwrap().midi())
            .collect();
        let mut sorted = midis.clone();
        sorted.sort_unstable();
        assert_eq!(midis, sorted);
    }

    #[test]
    fn test_frequency() {
        // A4 is concert pitch.
        let a4 = Note::from_index(9).unwrap();
        assert_eq!(a4.name(), "A4");
        assert!((a4.frequency() - 440.0).abs() < 1e-9);

        // C4 is middle C, roughly 261.63 Hz.
        let c4 = Note::from_index(5).unwrap();
        assert!((c4.frequency() - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_display() {
        assert_eq!(Note::from_index(0).unwrap().to_string(), "C3");
    }
}
