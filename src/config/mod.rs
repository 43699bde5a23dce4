//! Command-line parsing, sources file loading, and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::{
    default_vad_engine, DEFAULT_FONT, DEFAULT_FRAMERATE, DEFAULT_HOLD_TIME_MS,
    DEFAULT_PROBE_WINDOW_MS, DEFAULT_RESOLUTION, DEFAULT_SEGMENT_SECONDS,
    DEFAULT_SILENCE_THRESHOLD_DB, DEFAULT_STOP_GRACE_MS, DEFAULT_TICK_MS,
};

/// CLI options for the autocam daemon. Validated values keep the renderer
/// subprocess and the control loop safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Auto camera switcher daemon", author, version)]
pub struct AppConfig {
    /// Path to the sources file (YAML or JSON list of camera/mic pairs)
    #[arg(long, env = "AUTOCAM_SOURCES", default_value = "/etc/autocam/sources.yaml")]
    pub sources: PathBuf,

    /// Capture resolution requested from each camera (WIDTHxHEIGHT)
    #[arg(long, default_value = DEFAULT_RESOLUTION)]
    pub resolution: String,

    /// Capture frame rate requested from each camera
    #[arg(long, default_value_t = DEFAULT_FRAMERATE)]
    pub framerate: u32,

    /// Silence threshold (dBFS); levels at or below it count as silence
    #[arg(long = "silence-threshold-db", default_value_t = DEFAULT_SILENCE_THRESHOLD_DB, allow_hyphen_values = true)]
    pub silence_threshold_db: f32,

    /// Minimum time after a switch before falling back to the home camera (milliseconds)
    #[arg(long = "hold-time-ms", default_value_t = DEFAULT_HOLD_TIME_MS)]
    pub hold_time_ms: u64,

    /// Control loop tick interval (milliseconds)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Audio probe window per source per tick (milliseconds)
    #[arg(long = "probe-window-ms", default_value_t = DEFAULT_PROBE_WINDOW_MS)]
    pub probe_window_ms: u64,

    /// How the active source is picked from per-tick measurements
    #[arg(long = "activity-policy", value_enum, default_value_t = ActivityPolicyKind::Loudest)]
    pub activity_policy: ActivityPolicyKind,

    /// Voice activity detector implementation (vad policy only)
    #[arg(long = "vad-engine", value_enum, default_value_t = default_vad_engine())]
    pub vad_engine: VadEngineKind,

    /// Where the renderer sends the selected camera
    #[arg(long, value_enum, default_value_t = TopologyKind::Fbdev)]
    pub topology: TopologyKind,

    /// Framebuffer device for the fbdev topology
    #[arg(long = "framebuffer-device", default_value = "/dev/fb0")]
    pub framebuffer_device: PathBuf,

    /// v4l2 loopback device for the virtual camera topology
    #[arg(long = "virtual-camera-device", default_value = "/dev/video100")]
    pub virtual_camera_device: PathBuf,

    /// Directory for recorded segments; recording is off when unset
    #[arg(long = "recording-dir", env = "AUTOCAM_RECORDING_DIR")]
    pub recording_dir: Option<PathBuf>,

    /// Length of each recorded segment (seconds)
    #[arg(long = "segment-seconds", default_value_t = DEFAULT_SEGMENT_SECONDS)]
    pub segment_seconds: u32,

    /// Font file used for the on-screen source label
    #[arg(long, default_value = DEFAULT_FONT)]
    pub font: PathBuf,

    /// Renderer binary location
    #[arg(long = "renderer-cmd", env = "AUTOCAM_RENDERER", default_value = "ffmpeg")]
    pub renderer_cmd: String,

    /// Extra arguments appended to the renderer command line
    #[arg(long = "renderer-args", default_value = "", allow_hyphen_values = true)]
    pub renderer_args: String,

    /// Grace period between SIGTERM and SIGKILL when stopping the renderer (milliseconds)
    #[arg(long = "stop-grace-ms", default_value_t = DEFAULT_STOP_GRACE_MS)]
    pub stop_grace_ms: u64,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Sample each configured source once, print levels, and exit
    #[arg(long = "probe-levels", default_value_t = false)]
    pub probe_levels: bool,

    /// Emit logs as JSON
    #[arg(long = "log-json", env = "AUTOCAM_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", env = "AUTOCAM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// One camera+microphone pairing, fixed for the process lifetime.
///
/// The index in the configured list is the source's identifier; index 0
/// is the fallback ("home") camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Video capture device node, e.g. `/dev/video0`
    pub video: PathBuf,
    /// Audio capture device name, e.g. `hw:1,0`
    pub audio: String,
    /// Human-readable label rendered as the on-screen overlay
    pub label: String,
}

/// Snapshot of everything the switching components need, constructed once
/// at startup and passed by reference into each component.
#[derive(Debug, Clone)]
pub struct SwitcherConfig {
    pub sources: Vec<Source>,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub silence_threshold_db: f32,
    pub hold_time: Duration,
    pub tick_interval: Duration,
    pub probe_window: Duration,
    pub activity_policy: ActivityPolicyKind,
    pub vad_engine: VadEngineKind,
    pub topology: TopologyKind,
    pub framebuffer_device: PathBuf,
    pub virtual_camera_device: PathBuf,
    pub recording_dir: Option<PathBuf>,
    pub segment_seconds: u32,
    pub font: PathBuf,
    pub renderer_cmd: String,
    pub renderer_extra_args: Vec<String>,
    pub stop_grace: Duration,
}

impl SwitcherConfig {
    /// Index of the fallback source selected when every input is silent.
    pub const FALLBACK_SOURCE: usize = 0;
}

/// Strategies for turning one tick's measurements into an active-source pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPolicyKind {
    /// Loudest source above the silence threshold; ties break to the lowest index
    Loudest,
    /// Lowest-indexed source whose window is classified as speech
    Vad,
}

impl ActivityPolicyKind {
    pub fn label(self) -> &'static str {
        match self {
            ActivityPolicyKind::Loudest => "loudest",
            ActivityPolicyKind::Vad => "vad",
        }
    }
}

/// Available runtime-selectable VAD implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VadEngineKind {
    Earshot,
    Simple,
}

impl VadEngineKind {
    pub fn label(self) -> &'static str {
        match self {
            VadEngineKind::Earshot => "earshot",
            VadEngineKind::Simple => "simple",
        }
    }
}

/// Render target topologies: framebuffer overlay, virtual camera sink,
/// record-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyKind {
    /// Blit the selected camera to a framebuffer with a label overlay
    Fbdev,
    /// Feed the selected camera into a v4l2 loopback device
    V4l2,
    /// Record timestamped segments only, no live sink
    Segments,
}

impl TopologyKind {
    pub fn label(self) -> &'static str {
        match self {
            TopologyKind::Fbdev => "fbdev",
            TopologyKind::V4l2 => "v4l2",
            TopologyKind::Segments => "segments",
        }
    }
}
