//! Synheart Interact - On-device capture of page interaction events
//!
//! Interact turns the raw signals a host document produces (pointer, keyboard,
//! scroll, visibility, media, clipboard) into one normalized, timestamped
//! stream of event records: signal → rate control → classification →
//! normalization → sink.
//!
//! ## Modules
//!
//! - **Pipeline**: [`InteractionTracker`] owns the session and all timers
//! - **Classifier**: stable semantic types and identifiers for elements
//! - **Rate control**: per-source throttle and debounce slots
//! - **Idle machine / Visibility**: derived session state

pub mod classifier;
pub mod clock;
pub mod config;
pub mod dom;
pub mod error;
pub mod idle;
pub mod normalizer;
pub mod pipeline;
pub mod rate;
pub mod session;
pub mod signal;
pub mod sink;
pub mod types;
pub mod visibility;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigPatch, TrackerConfig};
pub use dom::Node;
pub use error::TrackerError;
pub use pipeline::{replay, replay_ndjson, InteractionTracker};
pub use signal::{Signal, TimedSignal};
pub use sink::{ConsoleSink, JsonLinesSink, MemorySink, Sink};
pub use types::{EventKind, EventRecord, Payload, SessionStats};

/// Interact version
pub const INTERACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by tooling
pub const PRODUCER_NAME: &str = "synheart-interact";
