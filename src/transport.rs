//! The shared transport clock that all patterns schedule against.
//!
//! The transport defines one notion of "now" and one started/stopped flag.
//! Patterns register cyclic step sequences with it; [`Transport::advance`]
//! fires every step boundary that has passed since the previous call, in
//! time order. All sequences are indexed from the transport's time zero,
//! never from their registration time, so patterns of different lengths
//! stay phase-aligned no matter when they were added or rebuilt.
//!
//! The model is single-threaded and cooperative: `advance` returns owned
//! [`Firing`]s rather than calling back into the registry, so a schedule
//! can never be cancelled or replaced while it is mid-delivery.

use crate::note::Note;
use log::debug;

/// Configuration for the transport clock.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Step boundaries per second. Default: 4.0 (eighth notes at 120 BPM).
    pub steps_per_second: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            steps_per_second: 4.0,
        }
    }
}

/// Identifies a registered step sequence.
///
/// Handles are unique for the lifetime of a transport; a cancelled handle
/// is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

/// One step boundary crossing for one registered sequence.
#[derive(Debug, Clone)]
pub struct Firing {
    /// The sequence this firing belongs to.
    pub handle: ScheduleHandle,
    /// Step index within the sequence's own cycle.
    pub step: usize,
    /// Absolute step count since transport zero.
    pub absolute_step: u64,
    /// Seconds since transport zero.
    pub time: f64,
    /// The payload: a note on an "on" step, `None` on a rest.
    pub note: Option<Note>,
}

struct Schedule {
    handle: ScheduleHandle,
    /// One entry per step; `None` entries are rests.
    events: Vec<Option<Note>>,
}

/// The shared clock.
///
/// Only one control path is meant to call [`Transport::start`]; there is
/// no stop transition. Everything else — registration, cancellation,
/// advancing — is valid in either state, but nothing fires until started.
pub struct Transport {
    config: TransportConfig,
    started: bool,
    now: f64,
    /// Absolute step index fired through (inclusive), once anything fired.
    fired_through: Option<u64>,
    schedules: Vec<Schedule>,
    next_handle: u64,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Transport {
            config,
            started: false,
            now: 0.0,
            fired_through: None,
            schedules: Vec::new(),
            next_handle: 0,
        }
    }

    /// Whether the clock has been started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Seconds since transport zero. Zero until started.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Steps per second, as configured.
    pub fn steps_per_second(&self) -> f64 {
        self.config.steps_per_second
    }

    /// The absolute step index at `time` seconds past transport zero.
    ///
    /// This is the same mapping `advance` fires by, so observers deriving
    /// a current step from it stay in lock-step with the event stream.
    pub fn step_at(&self, time: f64) -> u64 {
        if time <= 0.0 {
            return 0;
        }
        (time * self.config.steps_per_second).floor() as u64
    }

    /// Transition to started and rewind to time zero.
    ///
    /// All registered sequences begin from their step zero. Calling start
    /// on a started transport is a no-op; the stopped-to-started
    /// transition happens once per session.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.now = 0.0;
        self.fired_through = None;
        debug!(
            "transport started, {} sequence(s) at time zero",
            self.schedules.len()
        );
    }

    /// Register a cyclic step sequence.
    ///
    /// While the transport is stopped, the sequence is primed but inert.
    /// While it runs, the sequence joins at the current absolute step, so
    /// it is phase-aligned with every other sequence and never replays
    /// steps that already passed.
    pub fn schedule(&mut self, events: Vec<Option<Note>>) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        debug!("schedule {:?}: {} step(s)", handle, events.len());
        self.schedules.push(Schedule { handle, events });
        handle
    }

    /// Cancel a registered sequence.
    ///
    /// Removal is synchronous: after this returns, no later `advance` can
    /// produce a firing for `handle`. Cancelling an unknown or already
    /// cancelled handle is a no-op.
    pub fn cancel(&mut self, handle: ScheduleHandle) {
        let before = self.schedules.len();
        self.schedules.retain(|s| s.handle != handle);
        if self.schedules.len() < before {
            debug!("cancel {:?}", handle);
        }
    }

    /// Number of live registered sequences.
    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }

    /// Move the clock forward to `to` seconds past transport zero and
    /// collect every firing due since the previous call.
    ///
    /// Firings come out in time order, then registration order within one
    /// step boundary. A stopped transport produces nothing. Time never
    /// moves backwards; passing an earlier `to` is a no-op.
    pub fn advance(&mut self, to: f64) -> Vec<Firing> {
        if !self.started || to < self.now {
            return Vec::new();
        }
        self.now = to;

        let target = self.step_at(to);
        let first = match self.fired_through {
            None => 0,
            Some(n) if n < target => n + 1,
            Some(_) => return Vec::new(),
        };

        let mut firings = Vec::new();
        for absolute_step in first..=target {
            let time = absolute_step as f64 / self.config.steps_per_second;
            for schedule in &self.schedules {
                let len = schedule.events.len();
                if len == 0 {
                    continue;
                }
                let step = (absolute_step % len as u64) as usize;
                firings.push(Firing {
                    handle: schedule.handle,
                    step,
                    absolute_step,
                    time,
                    note: schedule.events[step],
                });
            }
        }
        self.fired_through = Some(target);
        firings
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::new(TransportConfig::default())
    }
}
