//! Pilot-facing advisory logic.
//!
//! [`tone`] maps AOA against per-flap thresholds to an audio cue; a bug
//! there means a pilot gets the wrong cue near stall, so it is kept as pure
//! functions with exhaustive tests. [`command`] is the lock-free cell the
//! audio collaborator consumes. [`alerts`] holds the housekeeping
//! calculators (over-G, Vno chime, 3D audio, volume) and [`audio_test`] the
//! scripted self-test task.

pub mod alerts;
pub mod command;
pub mod tone;

pub use command::{AudioCommand, ToneKind, Voice};
pub use tone::{calculate_tone, calculate_tone_muted, select_tone, ToneResult, ToneThresholds};
