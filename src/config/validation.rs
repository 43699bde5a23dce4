use super::defaults::{
    FORBIDDEN_DEVICE_CHARS, MAX_FRAMERATE, MAX_HOLD_TIME_MS, MAX_RENDERER_ARG_BYTES, MAX_SOURCES,
    MAX_STOP_GRACE_MS, MAX_TICK_MS, MIN_HOLD_TIME_MS, MIN_PROBE_WINDOW_MS, MIN_TICK_MS,
};
use super::{AppConfig, Source, SwitcherConfig, TopologyKind};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

fn resolution_regex() -> &'static Regex {
    static RESOLUTION_RE: OnceLock<Regex> = OnceLock::new();
    RESOLUTION_RE.get_or_init(|| {
        Regex::new(r"^([1-9]\d{1,4})x([1-9]\d{1,4})$").expect("static resolution regex is valid")
    })
}

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the renderer command. Failures here are
    /// fatal: the control loop must not start on a bad configuration.
    pub fn validate(&mut self) -> Result<()> {
        self.parse_resolution()?;

        if !(1..=MAX_FRAMERATE).contains(&self.framerate) {
            bail!(
                "--framerate must be between 1 and {MAX_FRAMERATE}, got {}",
                self.framerate
            );
        }
        if !(-120.0..=0.0).contains(&self.silence_threshold_db) {
            bail!(
                "--silence-threshold-db must be between -120.0 and 0.0 dBFS, got {}",
                self.silence_threshold_db
            );
        }
        if !(MIN_HOLD_TIME_MS..=MAX_HOLD_TIME_MS).contains(&self.hold_time_ms) {
            bail!(
                "--hold-time-ms must be between {MIN_HOLD_TIME_MS} and {MAX_HOLD_TIME_MS}, got {}",
                self.hold_time_ms
            );
        }
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.tick_ms) {
            bail!(
                "--tick-ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}, got {}",
                self.tick_ms
            );
        }
        if self.probe_window_ms < MIN_PROBE_WINDOW_MS || self.probe_window_ms > self.tick_ms {
            bail!(
                "--probe-window-ms must be between {MIN_PROBE_WINDOW_MS} and --tick-ms ({}), got {}",
                self.tick_ms,
                self.probe_window_ms
            );
        }
        if !(50..=MAX_STOP_GRACE_MS).contains(&self.stop_grace_ms) {
            bail!(
                "--stop-grace-ms must be between 50 and {MAX_STOP_GRACE_MS}, got {}",
                self.stop_grace_ms
            );
        }
        if !(10..=3_600).contains(&self.segment_seconds) {
            bail!(
                "--segment-seconds must be between 10 and 3600, got {}",
                self.segment_seconds
            );
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            bail!(
                "--log-level must be one of {LOG_LEVELS:?}, got '{}'",
                self.log_level
            );
        }
        if matches!(self.topology, TopologyKind::Segments) && self.recording_dir.is_none() {
            bail!("--topology segments requires --recording-dir");
        }

        #[cfg(not(feature = "vad_earshot"))]
        if matches!(self.vad_engine, super::VadEngineKind::Earshot) {
            bail!("--vad-engine earshot requires building with the 'vad_earshot' feature");
        }

        self.renderer_cmd = sanitize_binary(&self.renderer_cmd, "--renderer-cmd", &["ffmpeg"])?;

        // The device paths end up verbatim in the renderer argv.
        check_device_string(self.framebuffer_device.as_path(), "--framebuffer-device")?;
        check_device_string(self.virtual_camera_device.as_path(), "--virtual-camera-device")?;

        let extra = self.renderer_extra_args()?;
        let total_arg_bytes: usize = extra.iter().map(|arg| arg.len()).sum();
        if total_arg_bytes > MAX_RENDERER_ARG_BYTES {
            bail!("--renderer-args exceeds {MAX_RENDERER_ARG_BYTES} bytes");
        }

        Ok(())
    }

    /// Width and height from the `WIDTHxHEIGHT` CLI string.
    pub fn parse_resolution(&self) -> Result<(u32, u32)> {
        let captures = resolution_regex()
            .captures(self.resolution.trim())
            .ok_or_else(|| {
                anyhow!(
                    "--resolution must look like 1920x1080, got '{}'",
                    self.resolution
                )
            })?;
        let width = captures[1].parse::<u32>()?;
        let height = captures[2].parse::<u32>()?;
        Ok((width, height))
    }

    /// Split `--renderer-args` the way a shell would.
    pub fn renderer_extra_args(&self) -> Result<Vec<String>> {
        let trimmed = self.renderer_args.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        shell_words::split(trimmed)
            .with_context(|| format!("failed to parse --renderer-args '{trimmed}'"))
    }

    /// Load the sources file and snapshot everything the switching
    /// components need. Separate from `validate` so one-shot modes that
    /// never touch devices can still run without a sources file.
    pub fn switcher_config(&self) -> Result<SwitcherConfig> {
        let (width, height) = self.parse_resolution()?;
        let sources = load_sources(&self.sources)?;

        Ok(SwitcherConfig {
            sources,
            width,
            height,
            framerate: self.framerate,
            silence_threshold_db: self.silence_threshold_db,
            hold_time: Duration::from_millis(self.hold_time_ms),
            tick_interval: Duration::from_millis(self.tick_ms),
            probe_window: Duration::from_millis(self.probe_window_ms),
            activity_policy: self.activity_policy,
            vad_engine: self.vad_engine,
            topology: self.topology,
            framebuffer_device: self.framebuffer_device.clone(),
            virtual_camera_device: self.virtual_camera_device.clone(),
            recording_dir: self.recording_dir.clone(),
            segment_seconds: self.segment_seconds,
            font: self.font.clone(),
            renderer_cmd: self.renderer_cmd.clone(),
            renderer_extra_args: self.renderer_extra_args()?,
            stop_grace: Duration::from_millis(self.stop_grace_ms),
        })
    }
}

/// Read and check the fixed source list. The set of sources is
/// configuration, not derived state: an empty or malformed list is fatal.
pub(super) fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read sources file '{}'", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let sources: Vec<Source> = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse sources file '{}'", path.display()))?,
        "json" => serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse sources file '{}'", path.display()))?,
        other => bail!("sources file must be .yaml, .yml, or .json, got '.{other}'"),
    };

    if sources.is_empty() {
        bail!("sources file '{}' lists no sources", path.display());
    }
    if sources.len() > MAX_SOURCES {
        bail!(
            "sources file '{}' lists {} sources (max {MAX_SOURCES})",
            path.display(),
            sources.len()
        );
    }
    for (index, source) in sources.iter().enumerate() {
        if source.label.trim().is_empty() {
            bail!("source {index} has an empty label");
        }
        if source.label.len() > 32 {
            bail!("source {index} label exceeds 32 characters");
        }
        check_device_string(source.video.as_path(), &format!("source {index} video"))?;
        if source.audio.trim().is_empty() {
            bail!("source {index} has an empty audio device");
        }
        if source.audio.len() > 256
            || source
                .audio
                .chars()
                .any(|ch| ch.is_control() || FORBIDDEN_DEVICE_CHARS.contains(&ch))
        {
            bail!(
                "source {index} audio device '{}' must be <=256 characters with no control or shell metacharacters",
                source.audio
            );
        }
    }
    Ok(sources)
}

/// Device paths are handed verbatim to the renderer argv, so keep them simple.
fn check_device_string(path: &Path, label: &str) -> Result<()> {
    let value = path
        .to_str()
        .ok_or_else(|| anyhow!("{label} must be valid UTF-8"))?;
    if value.trim().is_empty() {
        bail!("{label} cannot be empty");
    }
    if value.len() > 256
        || value
            .chars()
            .any(|ch| ch.is_control() || FORBIDDEN_DEVICE_CHARS.contains(&ch))
    {
        bail!("{label} '{value}' must be <=256 characters with no control or shell metacharacters");
    }
    Ok(())
}

/// Allow either a known binary name or an existing executable path.
pub(super) fn sanitize_binary(value: &str, flag: &str, allowlist: &[&str]) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if let Some(allowed) = allowlist
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(trimmed))
    {
        return Ok((*allowed).to_string());
    }

    let path = Path::new(trimmed);
    if path.is_absolute() || trimmed.contains(std::path::MAIN_SEPARATOR) {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to canonicalize {flag} '{trimmed}'"))?;
        let metadata = fs::metadata(&canonical)
            .with_context(|| format!("failed to inspect {flag} '{}'", canonical.display()))?;
        if !metadata.is_file() {
            bail!("{flag} '{}' is not a file", canonical.display());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                bail!(
                    "{flag} '{}' exists but is not executable (mode {:o})",
                    canonical.display(),
                    mode
                );
            }
        }
        return canonical
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("{flag} must be valid UTF-8"));
    }

    bail!("{flag} must be one of {allowlist:?} or an existing binary path");
}
