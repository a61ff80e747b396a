//! The control surface that ties the transport, the pattern bank and
//! trigger delivery together.
//!
//! A [`Session`] owns the shared clock and the bank, exposes one method
//! per UI control (add, remove, the four setters, mute, global start), and
//! pumps the transport with [`Session::advance`]. Advancing is pull-based:
//! it returns the audible [`NoteTrigger`]s for the caller to hand to
//! whatever plays sound, having already applied muting and recorded the
//! visual step highlights. Everything happens on one thread; the optional
//! [`run_session`] driver below moves that whole loop onto a background
//! thread controlled through a channel, for real-time use.

use crate::bank::PatternBank;
use crate::note::Note;
use crate::pattern::PatternError;
use crate::transport::{Transport, TransportConfig};

/// Something that can sound a note. The audio engine implements this; so
/// can a console printer or a test collector.
pub trait TriggerSink {
    /// Sound `note` at `time` seconds past transport zero.
    fn trigger(&mut self, note: Note, time: f64);
}

/// Prints triggers instead of playing them, for debugging.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl TriggerSink for ConsoleSink {
    fn trigger(&mut self, note: Note, time: f64) {
        println!("[{:>8.3}s] {}", time, note);
    }
}

/// An audible trigger produced by one advance.
#[derive(Debug, Clone)]
pub struct NoteTrigger {
    /// Position of the owning pattern in the bank at delivery time.
    pub pattern: usize,
    /// Step index within that pattern's cycle.
    pub step: usize,
    /// Seconds past transport zero.
    pub time: f64,
    /// The pitch to sound.
    pub note: Note,
}

/// Errors from the session's control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// No pattern at the given bank position.
    UnknownPattern(usize),
    /// A parameter was rejected at the mutation boundary.
    Pattern(PatternError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::UnknownPattern(i) => write!(f, "no pattern at position {}", i),
            SessionError::Pattern(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<PatternError> for SessionError {
    fn from(e: PatternError) -> Self {
        SessionError::Pattern(e)
    }
}

/// The composition being played: one clock, one bank.
pub struct Session {
    transport: Transport,
    bank: PatternBank,
}

impl Session {
    pub fn new(config: TransportConfig) -> Self {
        Session {
            transport: Transport::new(config),
            bank: PatternBank::new(),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn bank(&self) -> &PatternBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut PatternBank {
        &mut self.bank
    }

    // ============================================
    // Control surface
    // ============================================

    /// Create a new randomized pattern; returns its bank position.
    pub fn add_pattern(&mut self) -> usize {
        self.bank.add(&mut self.transport)
    }

    /// Dispose and remove the pattern at `index`.
    pub fn remove_pattern(&mut self, index: usize) -> Result<(), SessionError> {
        if self.bank.remove(&mut self.transport, index) {
            Ok(())
        } else {
            Err(SessionError::UnknownPattern(index))
        }
    }

    /// Set the on-count of the pattern at `index` and rebuild it.
    pub fn set_ons(&mut self, index: usize, ons: u32) -> Result<(), SessionError> {
        let pattern = self
            .bank
            .get_mut(index)
            .ok_or(SessionError::UnknownPattern(index))?;
        pattern.set_ons(&mut self.transport, ons)?;
        Ok(())
    }

    /// Set the off-count of the pattern at `index` and rebuild it.
    pub fn set_offs(&mut self, index: usize, offs: u32) -> Result<(), SessionError> {
        let pattern = self
            .bank
            .get_mut(index)
            .ok_or(SessionError::UnknownPattern(index))?;
        pattern.set_offs(&mut self.transport, offs)?;
        Ok(())
    }

    /// Set the rotation of the pattern at `index` and rebuild it.
    pub fn set_rotation(&mut self, index: usize, rotation: i32) -> Result<(), SessionError> {
        let pattern = self
            .bank
            .get_mut(index)
            .ok_or(SessionError::UnknownPattern(index))?;
        pattern.set_rotation(&mut self.transport, rotation)?;
        Ok(())
    }

    /// Set the note (by palette index) of the pattern at `index`.
    pub fn set_note(&mut self, index: usize, note_index: usize) -> Result<(), SessionError> {
        let pattern = self
            .bank
            .get_mut(index)
            .ok_or(SessionError::UnknownPattern(index))?;
        pattern.set_note(&mut self.transport, note_index)?;
        Ok(())
    }

    /// Toggle the mute flag of the pattern at `index`.
    pub fn toggle_mute(&mut self, index: usize) -> Result<(), SessionError> {
        let pattern = self
            .bank
            .get_mut(index)
            .ok_or(SessionError::UnknownPattern(index))?;
        pattern.toggle_mute();
        Ok(())
    }

    /// The global start action: transition the shared clock to started.
    ///
    /// All registered sequences begin together at time zero. This is the
    /// only control path that flips the started flag; calling it again is
    /// a no-op.
    pub fn start(&mut self) {
        self.transport.start();
    }

    // ============================================
    // Advancing
    // ============================================

    /// Pump the clock to `now` and collect the audible triggers.
    ///
    /// Every sounding step flashes its pattern's highlight, muted or not;
    /// only unmuted patterns produce a [`NoteTrigger`]. Rests produce
    /// neither sound nor flash.
    pub fn advance(&mut self, now: f64) -> Vec<NoteTrigger> {
        let firings = self.transport.advance(now);
        let mut triggers = Vec::new();
        for firing in firings {
            let note = match firing.note {
                Some(note) => note,
                None => continue,
            };
            let index = match self.bank.position_of(firing.handle) {
                Some(index) => index,
                None => continue,
            };
            let pattern = self
                .bank
                .get_mut(index)
                .expect("position came from the bank");
            pattern.flash(firing.time);
            if !pattern.is_muted() {
                triggers.push(NoteTrigger {
                    pattern: index,
                    step: firing.step,
                    time: firing.time,
                    note,
                });
            }
        }
        triggers
    }

    /// Like [`Session::advance`], forwarding the triggers to a sink.
    pub fn advance_into(&mut self, now: f64, sink: &mut dyn TriggerSink) {
        for trigger in self.advance(now) {
            sink.trigger(trigger.note, trigger.time);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(TransportConfig::default())
    }
}

// Native-only real-time driver using a thread and a control channel.
#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use crossbeam_channel::{bounded, Sender};
    use log::debug;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Control messages sent to the session thread, one per UI action.
    enum SessionMessage {
        AddPattern,
        RemovePattern(usize),
        SetOns(usize, u32),
        SetOffs(usize, u32),
        SetRotation(usize, i32),
        SetNote(usize, usize),
        ToggleMute(usize),
        Start,
        Shutdown,
    }

    /// Configuration for the real-time driver.
    #[derive(Debug, Clone)]
    pub struct RunConfig {
        pub transport: TransportConfig,
        /// How often the session thread pumps the clock, in seconds.
        pub tick_interval: f64,
    }

    impl Default for RunConfig {
        fn default() -> Self {
            RunConfig {
                transport: TransportConfig::default(),
                tick_interval: 0.01,
            }
        }
    }

    /// Handle to control a running session from another thread.
    pub struct SessionHandle {
        sender: Sender<SessionMessage>,
        running: Arc<AtomicBool>,
    }

    impl SessionHandle {
        pub fn add_pattern(&self) {
            let _ = self.sender.send(SessionMessage::AddPattern);
        }

        pub fn remove_pattern(&self, index: usize) {
            let _ = self.sender.send(SessionMessage::RemovePattern(index));
        }

        pub fn set_ons(&self, index: usize, ons: u32) {
            let _ = self.sender.send(SessionMessage::SetOns(index, ons));
        }

        pub fn set_offs(&self, index: usize, offs: u32) {
            let _ = self.sender.send(SessionMessage::SetOffs(index, offs));
        }

        pub fn set_rotation(&self, index: usize, rotation: i32) {
            let _ = self
                .sender
                .send(SessionMessage::SetRotation(index, rotation));
        }

        pub fn set_note(&self, index: usize, note_index: usize) {
            let _ = self.sender.send(SessionMessage::SetNote(index, note_index));
        }

        pub fn toggle_mute(&self, index: usize) {
            let _ = self.sender.send(SessionMessage::ToggleMute(index));
        }

        /// The global start action.
        pub fn start(&self) {
            let _ = self.sender.send(SessionMessage::Start);
        }

        /// Stop the driver thread. The transport flag itself has no stop
        /// transition; this ends the session as a whole.
        pub fn shutdown(&self) {
            self.running.store(false, Ordering::SeqCst);
            let _ = self.sender.send(SessionMessage::Shutdown);
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    /// Start a session on a background thread, delivering triggers to
    /// `sink`. Returns a handle for the control surface.
    pub fn run_session<S>(config: RunConfig, mut sink: S) -> SessionHandle
    where
        S: TriggerSink + Send + 'static,
    {
        let (tx, rx) = bounded::<SessionMessage>(64);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        thread::spawn(move || {
            let mut session = Session::new(config.transport);
            // Wall-clock origin of transport time; set on Start.
            let mut origin: Option<Instant> = None;

            debug!("session thread up");
            while running_clone.load(Ordering::SeqCst) {
                while let Ok(msg) = rx.try_recv() {
                    let result = match msg {
                        SessionMessage::AddPattern => {
                            session.add_pattern();
                            Ok(())
                        }
                        SessionMessage::RemovePattern(i) => session.remove_pattern(i),
                        SessionMessage::SetOns(i, v) => session.set_ons(i, v),
                        SessionMessage::SetOffs(i, v) => session.set_offs(i, v),
                        SessionMessage::SetRotation(i, v) => session.set_rotation(i, v),
                        SessionMessage::SetNote(i, v) => session.set_note(i, v),
                        SessionMessage::ToggleMute(i) => session.toggle_mute(i),
                        SessionMessage::Start => {
                            if origin.is_none() {
                                origin = Some(Instant::now());
                            }
                            session.start();
                            Ok(())
                        }
                        SessionMessage::Shutdown => {
                            running_clone.store(false, Ordering::SeqCst);
                            return;
                        }
                    };
                    if let Err(e) = result {
                        debug!("control message rejected: {}", e);
                    }
                }

                if let Some(origin) = origin {
                    let now = origin.elapsed().as_secs_f64();
                    session.advance_into(now, &mut sink);
                }

                thread::sleep(Duration::from_secs_f64(config.tick_interval));
            }
        });

        SessionHandle {
            sender: tx,
            running,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{run_session, RunConfig, SessionHandle};

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects triggers for assertions.
    #[derive(Default)]
    struct Collector {
        notes: Vec<(Note, f64)>,
    }

    impl TriggerSink for Collector {
        fn trigger(&mut self, note: Note, time: f64) {
            self.notes.push((note, time));
        }
    }

    #[test]
    fn test_start_fires_existing_patterns_from_zero() {
        let mut session = Session::default();
        session.add_pattern();
        assert!(session.advance(1.0).is_empty(), "fired before start");

        session.start();
        let triggers = session.advance(0.0);
        // Every generated rhythm with ons >= 1 puts an onset at step 0.
        assert!(!triggers.is_empty());
        assert!(triggers.iter().all(|t| t.time == 0.0 && t.step == 0));
    }

    #[test]
    fn test_mute_suppresses_triggers_but_flashes() {
        let mut session = Session::default();
        let i = session.add_pattern();
        session.set_ons(i, 1).unwrap();
        session.set_offs(i, 1).unwrap(); // onsets at even steps
        session.toggle_mute(i).unwrap();
        session.start();
        assert!(session.advance(2.0).is_empty(), "muted pattern sounded");
        // The highlight still fired: absolute step 8 sounds at t = 2.0.
        let now = session.transport().now();
        assert!(session.bank().get(i).unwrap().is_flashing(now));

        session.toggle_mute(i).unwrap();
        assert!(!session.advance(4.0).is_empty(), "unmuted pattern silent");
    }

    #[test]
    fn test_control_surface_validates_indices() {
        let mut session = Session::default();
        assert_eq!(
            session.set_ons(0, 4),
            Err(SessionError::UnknownPattern(0))
        );
        assert_eq!(
            session.remove_pattern(3),
            Err(SessionError::UnknownPattern(3))
        );
        let i = session.add_pattern();
        assert_eq!(
            session.set_rotation(i, 9),
            Err(SessionError::Pattern(PatternError::RotationOutOfRange(9)))
        );
    }

    #[test]
    fn test_remove_stops_pattern() {
        let mut session = Session::default();
        let i = session.add_pattern();
        session.start();
        session.advance(0.5);
        session.remove_pattern(i).unwrap();
        assert!(session.advance(5.0).is_empty());
        assert_eq!(session.transport().schedule_count(), 0);
    }

    #[test]
    fn test_advance_into_forwards_to_sink() {
        let mut session = Session::default();
        let i = session.add_pattern();
        let expected = session.bank().get(i).unwrap().note();
        session.start();
        let mut sink = Collector::default();
        session.advance_into(1.0, &mut sink);
        assert!(!sink.notes.is_empty());
        assert!(sink.notes.iter().all(|(n, _)| *n == expected));
    }

    #[test]
    fn test_triggers_follow_bit_sequence() {
        let mut session = Session::default();
        let i = session.add_pattern();
        session.set_ons(i, 3).unwrap();
        session.set_offs(i, 5).unwrap();
        session.start();
        // 4 steps/s for 1.75s: absolute steps 0..=7, one full cycle.
        let triggers = session.advance(1.75);
        let steps: Vec<usize> = triggers.iter().map(|t| t.step).collect();
        assert_eq!(steps, vec![0, 3, 6], "triggers must match E(3,8) onsets");
    }
}
