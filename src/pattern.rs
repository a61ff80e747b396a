//! Pattern is the stateful entity tying a Euclidean rhythm to playback.
//!
//! A `Pattern` holds its on/off counts, rotation, note and color, and owns
//! one registered step sequence on the shared [`Transport`]. The bit
//! sequence is always derived on demand from the current parameters; the
//! registered sequence is rebuilt from scratch by every setter. A full
//! cancel-and-replace on each mutation is deliberate: incrementally
//! patching a cyclically-indexed event list is where the bugs live, and a
//! rebuild costs next to nothing at this scale.

use crate::color::Color;
use crate::note::{Note, NOTE_COUNT};
use crate::rhythm::{euclidean, rotate};
use crate::transport::{ScheduleHandle, Transport};

/// Inclusive bounds for the mutation API.
pub const MIN_ONS: u32 = 1;
pub const MAX_ONS: u32 = 10;
pub const MAX_OFFS: u32 = 10;
pub const MAX_ROTATION: i32 = 6;

/// Seconds a step highlight stays lit after its trigger.
pub const FLASH_SECONDS: f64 = 0.1;

/// A value rejected at the mutation boundary. The pattern it was aimed at
/// is left exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternError {
    OnsOutOfRange(u32),
    OffsOutOfRange(u32),
    RotationOutOfRange(i32),
    NoteOutOfRange(usize),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::OnsOutOfRange(v) => {
                write!(f, "on count {} outside {}..={}", v, MIN_ONS, MAX_ONS)
            }
            PatternError::OffsOutOfRange(v) => {
                write!(f, "off count {} outside 0..={}", v, MAX_OFFS)
            }
            PatternError::RotationOutOfRange(v) => {
                write!(
                    f,
                    "rotation {} outside -{}..={}",
                    v, MAX_ROTATION, MAX_ROTATION
                )
            }
            PatternError::NoteOutOfRange(v) => {
                write!(f, "note index {} outside 0..{}", v, NOTE_COUNT)
            }
        }
    }
}

impl std::error::Error for PatternError {}

/// A Euclidean rhythm bound to a schedulable step sequence.
pub struct Pattern {
    ons: u32,
    offs: u32,
    rotation: i32,
    note: Note,
    color: Color,
    muted: bool,
    schedule: Option<ScheduleHandle>,
    /// Transport time of the most recent sounding step, for the highlight.
    last_trigger: Option<f64>,
}

impl Pattern {
    /// Create a pattern and register its sequence immediately.
    ///
    /// The initial rotation is zero. The sequence is live on the transport
    /// from this point on (inert until the transport starts).
    pub fn new(
        transport: &mut Transport,
        ons: u32,
        offs: u32,
        note: Note,
        color: Color,
    ) -> Result<Pattern, PatternError> {
        if !(MIN_ONS..=MAX_ONS).contains(&ons) {
            return Err(PatternError::OnsOutOfRange(ons));
        }
        if offs > MAX_OFFS {
            return Err(PatternError::OffsOutOfRange(offs));
        }
        let mut pattern = Pattern {
            ons,
            offs,
            rotation: 0,
            note,
            color,
            muted: false,
            schedule: None,
            last_trigger: None,
        };
        pattern.rebuild(transport);
        Ok(pattern)
    }

    // ============================================
    // Read accessors (for rendering and audio)
    // ============================================

    pub fn ons(&self) -> u32 {
        self.ons
    }

    pub fn offs(&self) -> u32 {
        self.offs
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn note(&self) -> Note {
        self.note
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Total step count. Always `ons + offs`.
    pub fn len(&self) -> usize {
        (self.ons + self.offs) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The handle of the currently registered sequence, if any.
    pub fn schedule(&self) -> Option<ScheduleHandle> {
        self.schedule
    }

    /// The current bit sequence, derived from (ons, offs, rotation).
    ///
    /// Exactly `ons` entries are `true`; rotation only moves them.
    pub fn steps(&self) -> Vec<bool> {
        rotate(
            &euclidean(self.ons as usize, self.offs as usize),
            self.rotation as i64,
        )
    }

    /// The step currently sounding, per the transport's clock.
    ///
    /// Uses the same absolute-step mapping the transport fires by, so a
    /// renderer polling this stays in lock-step with the trigger stream.
    pub fn step_index(&self, transport: &Transport) -> usize {
        self.step_index_at(transport, transport.now())
    }

    /// Like [`Pattern::step_index`], for an arbitrary observer time.
    pub fn step_index_at(&self, transport: &Transport, time: f64) -> usize {
        (transport.step_at(time) % self.len() as u64) as usize
    }

    // ============================================
    // Mutation protocol
    // ============================================

    /// Set the on-step count and rebuild the sequence.
    pub fn set_ons(&mut self, transport: &mut Transport, ons: u32) -> Result<(), PatternError> {
        if !(MIN_ONS..=MAX_ONS).contains(&ons) {
            return Err(PatternError::OnsOutOfRange(ons));
        }
        self.ons = ons;
        self.rebuild(transport);
        Ok(())
    }

    /// Set the off-step count and rebuild the sequence.
    ///
    /// Zero is valid and produces an all-on rhythm.
    pub fn set_offs(&mut self, transport: &mut Transport, offs: u32) -> Result<(), PatternError> {
        if offs > MAX_OFFS {
            return Err(PatternError::OffsOutOfRange(offs));
        }
        self.offs = offs;
        self.rebuild(transport);
        Ok(())
    }

    /// Set the rotation and rebuild the sequence.
    pub fn set_rotation(
        &mut self,
        transport: &mut Transport,
        rotation: i32,
    ) -> Result<(), PatternError> {
        if !(-MAX_ROTATION..=MAX_ROTATION).contains(&rotation) {
            return Err(PatternError::RotationOutOfRange(rotation));
        }
        self.rotation = rotation;
        self.rebuild(transport);
        Ok(())
    }

    /// Set the note by palette index and rebuild the sequence.
    pub fn set_note(
        &mut self,
        transport: &mut Transport,
        index: usize,
    ) -> Result<(), PatternError> {
        let note = Note::from_index(index).ok_or(PatternError::NoteOutOfRange(index))?;
        self.note = note;
        self.rebuild(transport);
        Ok(())
    }

    /// Suppress the audible trigger. The bit sequence and schedule are
    /// untouched; step highlights keep firing.
    pub fn mute(&mut self) {
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Release the registered sequence.
    ///
    /// Must be called before a pattern is dropped from its registry;
    /// otherwise the transport keeps firing an orphaned sequence. After
    /// dispose, no firing carries this pattern's handle.
    pub fn dispose(&mut self, transport: &mut Transport) {
        if let Some(handle) = self.schedule.take() {
            transport.cancel(handle);
        }
    }

    // ============================================
    // Visual highlight
    // ============================================

    /// Record a sounding step for the highlight. Fire-and-forget: the
    /// highlight reverts on its own after [`FLASH_SECONDS`].
    pub fn flash(&mut self, time: f64) {
        self.last_trigger = Some(time);
    }

    /// Whether the highlight is currently lit at observer time `now`.
    pub fn is_flashing(&self, now: f64) -> bool {
        match self.last_trigger {
            Some(t) => now >= t && now - t < FLASH_SECONDS,
            None => false,
        }
    }

    /// Cancel the old sequence, then register one built from the current
    /// parameters. Cancel-before-replace: there is never a window where
    /// two sequences for this pattern are live.
    fn rebuild(&mut self, transport: &mut Transport) {
        if let Some(handle) = self.schedule.take() {
            transport.cancel(handle);
        }
        let note = self.note;
        let events = self
            .steps()
            .into_iter()
            .map(|on| on.then_some(note))
            .collect();
        self.schedule = Some(transport.schedule(events));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportConfig;

    fn note(i: usize) -> Note {
        Note::from_index(i).unwrap()
    }

    fn color() -> Color {
        crate::color::PALETTE[0]
    }

    fn pattern(transport: &mut Transport, ons: u32, offs: u32) -> Pattern {
        Pattern::new(transport, ons, offs, note(0), color()).unwrap()
    }

    #[test]
    fn test_new_registers_schedule() {
        let mut transport = Transport::default();
        let p = pattern(&mut transport, 3, 5);
        assert!(p.schedule().is_some());
        assert_eq!(transport.schedule_count(), 1);
        assert_eq!(p.len(), 8);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let mut transport = Transport::default();
        assert_eq!(
            Pattern::new(&mut transport, 0, 5, note(0), color()).err(),
            Some(PatternError::OnsOutOfRange(0))
        );
        assert_eq!(
            Pattern::new(&mut transport, 3, 11, note(0), color()).err(),
            Some(PatternError::OffsOutOfRange(11))
        );
        // Nothing was registered by the failed constructions.
        assert_eq!(transport.schedule_count(), 0);
    }

    #[test]
    fn test_steps_match_generator() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        assert_eq!(p.steps(), euclidean(3, 5));
        p.set_rotation(&mut transport, 2).unwrap();
        assert_eq!(p.steps(), rotate(&euclidean(3, 5), 2));
    }

    #[test]
    fn test_setter_rebuilds_and_cancels_old() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        let old = p.schedule().unwrap();
        p.set_ons(&mut transport, 4).unwrap();
        let new = p.schedule().unwrap();
        assert_ne!(old, new, "setter must replace the schedule");
        assert_eq!(transport.schedule_count(), 1, "old schedule leaked");
        assert_eq!(p.len(), 9);
    }

    #[test]
    fn test_rejected_setter_leaves_state_untouched() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        let handle = p.schedule();

        assert!(p.set_ons(&mut transport, 11).is_err());
        assert!(p.set_offs(&mut transport, 11).is_err());
        assert!(p.set_rotation(&mut transport, 7).is_err());
        assert!(p.set_note(&mut transport, NOTE_COUNT).is_err());

        assert_eq!(p.ons(), 3);
        assert_eq!(p.offs(), 5);
        assert_eq!(p.rotation(), 0);
        assert_eq!(p.note(), note(0));
        assert_eq!(p.schedule(), handle, "rejected setter touched schedule");
    }

    #[test]
    fn test_setting_current_value_is_clean_rebuild() {
        let mut transport = Transport::new(TransportConfig::default());
        let mut p = pattern(&mut transport, 3, 5);
        let before = p.steps();
        transport.start();
        transport.advance(0.0);

        p.set_ons(&mut transport, 3).unwrap();
        assert_eq!(p.steps(), before, "bit sequence changed");
        assert_eq!(transport.schedule_count(), 1);

        // One firing per step boundary, no duplicates from the rebuild.
        let firings = transport.advance(1.0);
        assert_eq!(firings.len(), 4);
    }

    #[test]
    fn test_mute_does_not_touch_sequence() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        let handle = p.schedule();
        let steps = p.steps();
        p.mute();
        assert!(p.is_muted());
        assert_eq!(p.schedule(), handle);
        assert_eq!(p.steps(), steps);
        p.toggle_mute();
        assert!(!p.is_muted());
    }

    #[test]
    fn test_dispose_stops_firings() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        transport.start();
        transport.advance(0.5);
        p.dispose(&mut transport);
        assert!(p.schedule().is_none());
        assert!(
            transport.advance(5.0).is_empty(),
            "disposed pattern still fires"
        );
    }

    #[test]
    fn test_step_index_tracks_transport() {
        let mut transport = Transport::default(); // 4 steps/s
        let p = pattern(&mut transport, 3, 5); // length 8
        transport.start();
        transport.advance(0.0);
        assert_eq!(p.step_index(&transport), 0);
        transport.advance(1.0); // absolute step 4
        assert_eq!(p.step_index(&transport), 4);
        transport.advance(2.5); // absolute step 10 -> 10 % 8
        assert_eq!(p.step_index(&transport), 2);
    }

    #[test]
    fn test_flash_reverts() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        assert!(!p.is_flashing(0.0));
        p.flash(1.0);
        assert!(p.is_flashing(1.0));
        assert!(p.is_flashing(1.0 + FLASH_SECONDS / 2.0));
        assert!(!p.is_flashing(1.0 + FLASH_SECONDS));
    }

    #[test]
    fn test_degenerate_all_on() {
        let mut transport = Transport::default();
        let mut p = pattern(&mut transport, 3, 5);
        p.set_offs(&mut transport, 0).unwrap();
        assert_eq!(p.steps(), vec![true; 3]);
    }
}
