//! Default values and limits shared by the CLI definition and validation.

use super::VadEngineKind;

pub const DEFAULT_RESOLUTION: &str = "1920x1080";
pub const DEFAULT_FRAMERATE: u32 = 30;
pub const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -45.0;
pub const DEFAULT_HOLD_TIME_MS: u64 = 2_500;
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_PROBE_WINDOW_MS: u64 = 100;
pub const DEFAULT_SEGMENT_SECONDS: u32 = 300;
pub const DEFAULT_STOP_GRACE_MS: u64 = 1_000;
pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

pub(super) const MIN_TICK_MS: u64 = 20;
pub(super) const MAX_TICK_MS: u64 = 5_000;
pub(super) const MIN_PROBE_WINDOW_MS: u64 = 10;
pub(super) const MIN_HOLD_TIME_MS: u64 = 1;
pub(super) const MAX_HOLD_TIME_MS: u64 = 600_000;
pub(super) const MAX_STOP_GRACE_MS: u64 = 10_000;
pub(super) const MAX_FRAMERATE: u32 = 120;
pub(super) const MAX_SOURCES: usize = 16;
pub(super) const MAX_RENDERER_ARG_BYTES: usize = 4_096;

/// Characters never allowed in device strings handed to the renderer argv.
pub(super) const FORBIDDEN_DEVICE_CHARS: &[char] =
    &['$', '`', ';', '|', '&', '<', '>', '"', '\'', '*', '?'];

pub fn default_vad_engine() -> VadEngineKind {
    #[cfg(feature = "vad_earshot")]
    {
        VadEngineKind::Earshot
    }
    #[cfg(not(feature = "vad_earshot"))]
    {
        VadEngineKind::Simple
    }
}
