//! # rondo
//!
//! A Euclidean rhythm engine: generate maximally-even step patterns and
//! drive independently timed note triggers from them, phase-aligned
//! against one shared transport clock.
//!
//! ## Core Concepts
//!
//! - **Euclidean rhythm**: a binary cyclic sequence distributing a number
//!   of onsets as evenly as possible over a number of steps, built with
//!   Bjorklund's construction.
//! - **Pattern**: a mutable entity holding on/off counts, rotation, note
//!   and color. Every mutation rebuilds its registered step sequence.
//! - **Transport**: the shared clock. All sequences are indexed from its
//!   time zero, so patterns of different lengths never drift apart.
//! - **Session**: the control surface tying the transport, the pattern
//!   bank and trigger delivery together.
//!
//! ## Example
//!
//! ```rust
//! use rondo::prelude::*;
//!
//! // The classic tresillo: three onsets over eight steps.
//! let steps = euclidean(3, 5);
//! assert_eq!(steps.iter().filter(|b| **b).count(), 3);
//!
//! // Drive a composition from the shared clock.
//! let mut session = Session::default();
//! let i = session.add_pattern();
//! session.set_ons(i, 3).unwrap();
//! session.set_offs(i, 5).unwrap();
//! session.start();
//! let triggers = session.advance(2.0);
//! assert!(!triggers.is_empty());
//! ```
//!
//! ## Playing Patterns
//!
//! With the `audio` feature, triggers can be sent straight to the default
//! output device:
//!
//! ```rust,ignore
//! use rondo::audio::AudioEngine;
//! use rondo::session::{run_session, RunConfig};
//!
//! let engine = AudioEngine::new().unwrap();
//! let handle = run_session(RunConfig::default(), engine);
//! handle.add_pattern();
//! handle.start();
//! ```

// Core modules
pub mod bank;
pub mod color;
pub mod note;
pub mod pattern;
pub mod rhythm;
pub mod session;
pub mod transport;

#[cfg(feature = "audio")]
pub mod audio;

// WASM bindings
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export core types
pub use bank::PatternBank;
pub use color::{next_color, Color, ColorAllocator, PALETTE};
pub use note::{Note, NOTE_COUNT};
pub use pattern::{Pattern, PatternError, FLASH_SECONDS, MAX_OFFS, MAX_ONS, MAX_ROTATION, MIN_ONS};
pub use rhythm::{euclidean, rotate};
pub use session::{ConsoleSink, NoteTrigger, Session, SessionError, TriggerSink};
pub use transport::{Firing, ScheduleHandle, Transport, TransportConfig};

// Re-export the real-time driver (native only)
#[cfg(not(target_arch = "wasm32"))]
pub use session::{run_session, RunConfig, SessionHandle};

// Re-export audio (when feature enabled)
#[cfg(feature = "audio")]
pub use audio::{AudioEngine, AudioError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bank::PatternBank;
    pub use crate::color::{next_color, Color, ColorAllocator};
    pub use crate::note::{Note, NOTE_COUNT};
    pub use crate::pattern::{Pattern, PatternError};
    pub use crate::rhythm::{euclidean, rotate};
    pub use crate::session::{NoteTrigger, Session, SessionError, TriggerSink};
    pub use crate::transport::{Firing, Transport, TransportConfig};

    #[cfg(not(target_arch = "wasm32"))]
    pub use crate::session::{run_session, RunConfig};

    #[cfg(feature = "audio")]
    pub use crate::audio::AudioEngine;
}
