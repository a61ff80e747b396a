//! Display colors for pattern identity.
//!
//! Colors only distinguish patterns visually; they never affect scheduling.
//! The allocator deals the fixed ten-color palette out like a deck of
//! cards: every color appears exactly once per pass, the order is shuffled
//! per pass, and a fresh shuffled pass begins when the deck runs out. Two
//! draws straddling a pass boundary may repeat; that is acceptable.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::sync::Mutex;

/// The fixed display palette.
pub const PALETTE: [Color; 10] = [
    Color("#1f77b4"),
    Color("#ff7f0e"),
    Color("#2ca02c"),
    Color("#d62728"),
    Color("#9467bd"),
    Color("#8c564b"),
    Color("#e377c2"),
    Color("#7f7f7f"),
    Color("#bcbd22"),
    Color("#17becf"),
];

/// A display color as a hex string, e.g. `"#1f77b4"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub &'static str);

impl Color {
    /// The `#rrggbb` form of this color.
    pub fn as_hex(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deals colors from the palette, one shuffled pass at a time.
#[derive(Debug)]
pub struct ColorAllocator {
    /// Colors not yet handed out in the current pass. Drawn from the back.
    remaining: Vec<Color>,
}

impl ColorAllocator {
    /// Create an allocator with an empty pass; the first draw reshuffles.
    pub fn new() -> Self {
        ColorAllocator {
            remaining: Vec::new(),
        }
    }

    /// Draw the next color, starting a fresh shuffled pass when the
    /// current one is exhausted.
    pub fn next(&mut self) -> Color {
        if self.remaining.is_empty() {
            self.remaining = PALETTE.to_vec();
            self.remaining.shuffle(&mut thread_rng());
        }
        self.remaining.pop().expect("palette is non-empty")
    }
}

impl Default for ColorAllocator {
    fn default() -> Self {
        ColorAllocator::new()
    }
}

static ALLOCATOR: Lazy<Mutex<ColorAllocator>> = Lazy::new(|| Mutex::new(ColorAllocator::new()));

/// Draw from the process-wide allocator.
///
/// The allocator lives for the whole session and exposes no reset; every
/// pattern created anywhere in the process shares one deal order.
pub fn next_color() -> Color {
    ALLOCATOR
        .lock()
        .expect("color allocator lock poisoned")
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_full_pass_covers_palette() {
        let mut alloc = ColorAllocator::new();
        let pass: HashSet<Color> = (0..PALETTE.len()).map(|_| alloc.next()).collect();
        assert_eq!(pass.len(), PALETTE.len(), "a pass repeated a color");
        for color in PALETTE {
            assert!(pass.contains(&color), "missing {} from the pass", color);
        }
    }

    #[test]
    fn test_second_pass_also_covers_palette() {
        let mut alloc = ColorAllocator::new();
        for _ in 0..PALETTE.len() {
            alloc.next();
        }
        let second: HashSet<Color> = (0..PALETTE.len()).map(|_| alloc.next()).collect();
        assert_eq!(second.len(), PALETTE.len());
    }

    #[test]
    fn test_global_allocator_yields_palette_colors() {
        for _ in 0..25 {
            let color = next_color();
            assert!(PALETTE.contains(&color));
        }
    }
}
