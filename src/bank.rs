//! The ordered collection of live patterns.
//!
//! The bank is the single source of truth the rendering and audio layers
//! read from. Insertion order is meaningful for rendering (it decides
//! radius and stacking) but carries no scheduling semantics. Removal goes
//! through the bank so that a pattern's schedule is always released before
//! the pattern itself is dropped; an orphaned schedule on the transport is
//! the one leak this design refuses to allow.

use crate::color::next_color;
use crate::note::{Note, NOTE_COUNT};
use crate::pattern::Pattern;
use crate::transport::{ScheduleHandle, Transport};
use rand::{thread_rng, Rng};

/// Bounds for randomized initial step counts: `ons, offs ∈ [1, 10)`.
const INITIAL_COUNT_RANGE: std::ops::Range<u32> = 1..10;

/// An ordered, mutable collection of [`Pattern`]s.
#[derive(Default)]
pub struct PatternBank {
    patterns: Vec<Pattern>,
}

impl PatternBank {
    pub fn new() -> Self {
        PatternBank {
            patterns: Vec::new(),
        }
    }

    /// Create a pattern with randomized on/off counts, a random palette
    /// note and the next allocator color, and append it to the bank.
    ///
    /// Returns the new pattern's position. The pattern's sequence is
    /// registered on the transport immediately.
    pub fn add(&mut self, transport: &mut Transport) -> usize {
        let mut rng = thread_rng();
        let ons = rng.gen_range(INITIAL_COUNT_RANGE);
        let offs = rng.gen_range(INITIAL_COUNT_RANGE);
        let note = Note::from_index(rng.gen_range(0..NOTE_COUNT))
            .expect("random index is within the palette");
        let pattern = Pattern::new(transport, ons, offs, note, next_color())
            .expect("randomized counts are within bounds");
        self.patterns.push(pattern);
        self.patterns.len() - 1
    }

    /// Dispose the pattern at `index` and remove it from the bank.
    ///
    /// Dispose-before-remove is handled here, not left to the caller: the
    /// schedule is cancelled synchronously, then the pattern is dropped.
    /// Returns `false` (and removes nothing) for an out-of-range index.
    pub fn remove(&mut self, transport: &mut Transport, index: usize) -> bool {
        if index >= self.patterns.len() {
            return false;
        }
        self.patterns[index].dispose(transport);
        self.patterns.remove(index);
        true
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Pattern> {
        self.patterns.get_mut(index)
    }

    /// Iterate patterns in insertion (rendering) order.
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pattern> {
        self.patterns.iter_mut()
    }

    /// Find the position of the pattern owning a schedule handle.
    ///
    /// This is how transport firings are routed back to their pattern.
    pub fn position_of(&self, handle: ScheduleHandle) -> Option<usize> {
        self.patterns.iter().position(|p| p.schedule() == Some(handle))
    }
}
