//! Per-source audio probing and activity labeling.
//!
//! Each control-loop tick probes every configured microphone for one short
//! window, producing a loudness measurement (dBFS) and a voice-activity
//! label. Capture faults collapse to a silence sentinel so one broken
//! microphone never halts the loop.

/// Sample rate the VAD engines expect; probe windows are resampled to it.
pub const VAD_RATE: u32 = 16_000;

mod meter;
mod probe;
mod resample;
mod vad;

pub use meter::{rms_db, SILENCE_FLOOR_DB};
pub use probe::{sample_all, CpalProbe, LevelProbe, Measurement};
pub use vad::{build_vad_engine, label_window, SimpleThresholdVad, VadDecision, VadEngine};
