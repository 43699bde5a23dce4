//! Derivation of the renderer command line from the active source.

use crate::config::{SwitcherConfig, TopologyKind};
use std::path::PathBuf;

/// Value describing how the active source should be rendered. Derived
/// deterministically from the switch state plus configuration; recomputed
/// on every accepted switch and replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSpec {
    pub source: usize,
    pub label: String,
    pub video_device: PathBuf,
    pub audio_device: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub topology: TopologyKind,
    pub framebuffer_device: PathBuf,
    pub virtual_camera_device: PathBuf,
    pub recording_dir: Option<PathBuf>,
    pub segment_seconds: u32,
    pub font: PathBuf,
    /// Operator extras, spliced in right after the global options.
    pub extra_args: Vec<String>,
}

impl RenderSpec {
    /// Caller guarantees `source` indexes into `cfg.sources`; the decision
    /// engine maintains that invariant for its whole lifetime.
    pub fn for_source(cfg: &SwitcherConfig, source: usize) -> Self {
        let source_cfg = &cfg.sources[source];
        Self {
            source,
            label: source_cfg.label.clone(),
            video_device: source_cfg.video.clone(),
            audio_device: source_cfg.audio.clone(),
            width: cfg.width,
            height: cfg.height,
            framerate: cfg.framerate,
            topology: cfg.topology,
            framebuffer_device: cfg.framebuffer_device.clone(),
            virtual_camera_device: cfg.virtual_camera_device.clone(),
            recording_dir: cfg.recording_dir.clone(),
            segment_seconds: cfg.segment_seconds,
            font: cfg.font.clone(),
            extra_args: cfg.renderer_extra_args.clone(),
        }
    }

    /// Whether the renderer needs the source's microphone. The live sinks
    /// are video-only; audio is pulled in only when segments are recorded,
    /// which also keeps the device free for the per-tick probes.
    fn wants_audio(&self) -> bool {
        self.recording_dir.is_some() || matches!(self.topology, TopologyKind::Segments)
    }

    /// Full renderer argv (everything after the binary name).
    pub fn renderer_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-loglevel".into(), "error".into()];
        args.extend(self.extra_args.iter().cloned());

        args.extend([
            "-f".into(),
            "v4l2".into(),
            "-input_format".into(),
            "mjpeg".into(),
            "-video_size".into(),
            format!("{}x{}", self.width, self.height),
            "-framerate".into(),
            self.framerate.to_string(),
            "-i".into(),
            self.video_device.display().to_string(),
        ]);
        if self.wants_audio() {
            args.extend([
                "-f".into(),
                "alsa".into(),
                "-ac".into(),
                "2".into(),
                "-i".into(),
                self.audio_device.clone(),
            ]);
        }

        args.extend(["-filter_complex".into(), self.filter_complex()]);

        match self.topology {
            TopologyKind::Fbdev => {
                args.extend([
                    "-map".into(),
                    "[display]".into(),
                    "-f".into(),
                    "fbdev".into(),
                    "-pix_fmt".into(),
                    "rgb565le".into(),
                    self.framebuffer_device.display().to_string(),
                ]);
                self.push_audio_segments(&mut args);
            }
            TopologyKind::V4l2 => {
                args.extend([
                    "-map".into(),
                    "[display]".into(),
                    "-f".into(),
                    "v4l2".into(),
                    self.virtual_camera_device.display().to_string(),
                ]);
                self.push_audio_segments(&mut args);
            }
            TopologyKind::Segments => {
                args.extend([
                    "-map".into(),
                    "[display]".into(),
                    "-map".into(),
                    "[audio]".into(),
                    "-c:v".into(),
                    "libx264".into(),
                    "-preset".into(),
                    "veryfast".into(),
                    "-c:a".into(),
                    "aac".into(),
                    "-b:a".into(),
                    "192k".into(),
                ]);
                self.push_segment_muxer(&mut args);
            }
        }

        args
    }

    fn filter_complex(&self) -> String {
        let overlay = format!(
            "drawtext=fontfile={}:text='{}':x=20:y=20:fontsize=36:fontcolor=white:box=1:boxcolor=black@0.5",
            self.font.display(),
            drawtext_escape(&self.label),
        );
        let video = match self.topology {
            TopologyKind::Fbdev => format!("[0:v]format=rgb565le,{overlay}[display]"),
            TopologyKind::V4l2 => format!("[0:v]{overlay},format=yuv420p[display]"),
            TopologyKind::Segments => format!("[0:v]{overlay}[display]"),
        };
        if self.wants_audio() {
            format!("{video};[1:a]volume=2.0[audio]")
        } else {
            video
        }
    }

    /// Audio-only recording branch for the live-sink topologies.
    fn push_audio_segments(&self, args: &mut Vec<String>) {
        if self.recording_dir.is_none() {
            return;
        }
        args.extend([
            "-map".into(),
            "[audio]".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
        ]);
        self.push_segment_muxer(args);
    }

    fn push_segment_muxer(&self, args: &mut Vec<String>) {
        let dir = self
            .recording_dir
            .as_deref()
            .expect("segment muxer requires a recording dir");
        args.extend([
            "-f".into(),
            "segment".into(),
            "-segment_time".into(),
            self.segment_seconds.to_string(),
            "-strftime".into(),
            "1".into(),
            dir.join("rec_%Y%m%d_%H%M%S.mp4").display().to_string(),
        ]);
    }
}

/// Keep the overlay label safe inside the single-quoted drawtext argument.
/// Quotes are stripped (they cannot be escaped in place); the other
/// filter-language specials get a backslash.
fn drawtext_escape(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for ch in label.chars() {
        match ch {
            '\'' => {}
            '\\' | ':' | '%' | ',' | ';' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActivityPolicyKind, Source, VadEngineKind};
    use std::time::Duration;

    fn test_config(topology: TopologyKind, recording_dir: Option<PathBuf>) -> SwitcherConfig {
        SwitcherConfig {
            sources: vec![
                Source {
                    video: PathBuf::from("/dev/video0"),
                    audio: "hw:1,0".to_string(),
                    label: "CAM1".to_string(),
                },
                Source {
                    video: PathBuf::from("/dev/video2"),
                    audio: "hw:2,0".to_string(),
                    label: "CAM2".to_string(),
                },
            ],
            width: 1920,
            height: 1080,
            framerate: 30,
            silence_threshold_db: -45.0,
            hold_time: Duration::from_millis(2_500),
            tick_interval: Duration::from_millis(100),
            probe_window: Duration::from_millis(100),
            activity_policy: ActivityPolicyKind::Loudest,
            vad_engine: VadEngineKind::Simple,
            topology,
            framebuffer_device: PathBuf::from("/dev/fb0"),
            virtual_camera_device: PathBuf::from("/dev/video100"),
            recording_dir,
            segment_seconds: 300,
            font: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            renderer_cmd: "ffmpeg".to_string(),
            renderer_extra_args: Vec::new(),
            stop_grace: Duration::from_millis(1_000),
        }
    }

    #[test]
    fn spec_reflects_the_selected_source() {
        let cfg = test_config(TopologyKind::Fbdev, None);
        let spec = RenderSpec::for_source(&cfg, 1);
        assert_eq!(spec.source, 1);
        assert_eq!(spec.label, "CAM2");
        assert_eq!(spec.video_device, PathBuf::from("/dev/video2"));
        assert_eq!(spec.audio_device, "hw:2,0");
    }

    #[test]
    fn fbdev_args_target_the_framebuffer() {
        let cfg = test_config(TopologyKind::Fbdev, None);
        let args = RenderSpec::for_source(&cfg, 0).renderer_args();
        assert!(args.contains(&"fbdev".to_string()));
        assert!(args.contains(&"/dev/fb0".to_string()));
        assert!(args.contains(&"1920x1080".to_string()));
        // No recording dir: the microphone stays free for the probes.
        assert!(!args.contains(&"alsa".to_string()));
        assert!(!args.contains(&"segment".to_string()));
    }

    #[test]
    fn fbdev_with_recording_adds_audio_segments() {
        let cfg = test_config(TopologyKind::Fbdev, Some(PathBuf::from("/recordings")));
        let args = RenderSpec::for_source(&cfg, 0).renderer_args();
        assert!(args.contains(&"alsa".to_string()));
        assert!(args.contains(&"segment".to_string()));
        assert!(args.contains(&"/recordings/rec_%Y%m%d_%H%M%S.mp4".to_string()));
    }

    #[test]
    fn v4l2_args_target_the_loopback_device() {
        let cfg = test_config(TopologyKind::V4l2, None);
        let args = RenderSpec::for_source(&cfg, 0).renderer_args();
        assert!(args.contains(&"/dev/video100".to_string()));
        let filter = args
            .iter()
            .position(|arg| arg == "-filter_complex")
            .map(|index| args[index + 1].clone())
            .expect("filter_complex present");
        assert!(filter.contains("format=yuv420p"));
    }

    #[test]
    fn segments_args_encode_video_and_audio() {
        let cfg = test_config(TopologyKind::Segments, Some(PathBuf::from("/recordings")));
        let args = RenderSpec::for_source(&cfg, 0).renderer_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.contains(&"segment".to_string()));
        assert!(!args.contains(&"fbdev".to_string()));
    }

    #[test]
    fn overlay_carries_the_source_label() {
        let cfg = test_config(TopologyKind::Fbdev, None);
        let args = RenderSpec::for_source(&cfg, 1).renderer_args();
        let filter = args
            .iter()
            .position(|arg| arg == "-filter_complex")
            .map(|index| args[index + 1].clone())
            .expect("filter_complex present");
        assert!(filter.contains("text='CAM2'"));
    }

    #[test]
    fn extra_args_are_spliced_after_global_options() {
        let mut cfg = test_config(TopologyKind::Fbdev, None);
        cfg.renderer_extra_args = vec!["-threads".to_string(), "2".to_string()];
        let args = RenderSpec::for_source(&cfg, 0).renderer_args();
        let threads = args.iter().position(|arg| arg == "-threads").unwrap();
        let input = args.iter().position(|arg| arg == "-i").unwrap();
        assert!(threads < input);
    }

    #[test]
    fn drawtext_escape_neutralizes_filter_specials() {
        assert_eq!(drawtext_escape("CAM 1"), "CAM 1");
        assert_eq!(drawtext_escape("A:B"), "A\\:B");
        assert_eq!(drawtext_escape("it's"), "its");
        assert_eq!(drawtext_escape("a,b;c"), "a\\,b\\;c");
        assert_eq!(drawtext_escape("50%"), "50\\%");
    }

    #[test]
    fn specs_for_the_same_source_are_identical() {
        let cfg = test_config(TopologyKind::Fbdev, None);
        assert_eq!(
            RenderSpec::for_source(&cfg, 0),
            RenderSpec::for_source(&cfg, 0)
        );
    }
}
