//! Fixed-cadence control loop and shutdown signal plumbing.
//!
//! The loop has two states: Idle (no renderer yet) and Streaming. Startup
//! applies the fallback source once; after that every tick either switches
//! (Streaming -> Streaming) or is a no-op. The loop only ends when the
//! shutdown flag is raised, and the renderer is released on every exit
//! path through the supervisor's owned handle.

use crate::audio::{sample_all, LevelProbe};
use crate::classify::ActivityClassifier;
use crate::config::SwitcherConfig;
use crate::engine::SwitchDecisionEngine;
use crate::pipeline::{Health, PipelineSupervisor, RenderSpec};
use anyhow::{bail, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the flag the loop polls at tick boundaries.
/// The current tick always finishes; no new tick starts afterwards.
pub fn install_signal_handlers() -> Result<()> {
    // SAFETY: the handler only stores to an atomic, which is
    // async-signal-safe; the sigaction structs are fully initialized.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = request_shutdown as usize;
        libc::sigemptyset(&mut action.sa_mask);
        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                bail!(
                    "failed to install handler for signal {signal}: {}",
                    io::Error::last_os_error()
                );
            }
        }
    }
    Ok(())
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

#[cfg(test)]
fn reset_shutdown_flag() {
    SHUTDOWN.store(false, Ordering::SeqCst);
}

/// Top-level driver: sample, classify, decide, apply, at a fixed cadence,
/// for the lifetime of the process.
pub struct ControlLoop<P: LevelProbe> {
    cfg: SwitcherConfig,
    probe: P,
    classifier: ActivityClassifier,
    engine: SwitchDecisionEngine,
    supervisor: PipelineSupervisor,
}

impl<P: LevelProbe> ControlLoop<P> {
    pub fn new(cfg: SwitcherConfig, probe: P) -> Self {
        let classifier = ActivityClassifier::new(cfg.activity_policy, cfg.silence_threshold_db);
        let engine = SwitchDecisionEngine::new(
            SwitcherConfig::FALLBACK_SOURCE,
            cfg.hold_time,
            Instant::now(),
        );
        let supervisor = PipelineSupervisor::new(cfg.renderer_cmd.clone(), cfg.stop_grace);
        Self {
            cfg,
            probe,
            classifier,
            engine,
            supervisor,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        // Idle -> Streaming: bring up the fallback source once. A failure
        // here is recoverable; the health path retries on the next tick.
        let spec = RenderSpec::for_source(&self.cfg, self.engine.active());
        if let Err(err) = self.supervisor.apply(&spec) {
            warn!(error = %err, "initial renderer start failed; retrying next tick");
        }

        while !shutdown_requested() {
            let tick_start = Instant::now();
            self.tick(tick_start);
            if let Some(remainder) = self.cfg.tick_interval.checked_sub(tick_start.elapsed()) {
                thread::sleep(remainder);
            }
        }

        info!("shutdown requested, stopping renderer");
        self.supervisor.stop();
        Ok(())
    }

    /// One cadence step. Never fails: capture faults collapse to silence
    /// upstream, renderer faults are logged and retried on a later tick.
    fn tick(&mut self, now: Instant) {
        let measurements = sample_all(&self.probe, &self.cfg.sources, self.cfg.probe_window);
        let active = self.classifier.classify(&measurements);
        debug!(?active, current = self.engine.active(), "tick classified");

        if let Some(next) = self.engine.decide(active, now) {
            let spec = RenderSpec::for_source(&self.cfg, next);
            info!(source = next, label = %spec.label, "switching active source");
            if let Err(err) = self.supervisor.apply(&spec) {
                warn!(error = %err, "renderer start failed; retrying next tick");
            }
        } else if self.supervisor.healthcheck() == Health::Dead {
            // Covers an unexpected renderer death as well as a failed start
            // on an earlier tick; at most one attempt per tick.
            let spec = RenderSpec::for_source(&self.cfg, self.engine.active());
            info!(
                source = spec.source,
                label = %spec.label,
                "renderer not running; re-applying current source"
            );
            if let Err(err) = self.supervisor.apply(&spec) {
                warn!(error = %err, "renderer start failed; retrying next tick");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Measurement, VadDecision};
    use crate::config::{ActivityPolicyKind, Source, TopologyKind, VadEngineKind};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    /// Serializes tests that touch the process-wide shutdown flag.
    fn shutdown_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn test_config() -> SwitcherConfig {
        SwitcherConfig {
            sources: (0..4)
                .map(|index| Source {
                    video: PathBuf::from(format!("/dev/video{}", index * 2)),
                    audio: format!("hw:{},0", index + 1),
                    label: format!("CAM{}", index + 1),
                })
                .collect(),
            width: 1920,
            height: 1080,
            framerate: 30,
            silence_threshold_db: -45.0,
            hold_time: Duration::from_millis(2_500),
            tick_interval: Duration::from_millis(100),
            probe_window: Duration::from_millis(1),
            activity_policy: ActivityPolicyKind::Loudest,
            vad_engine: VadEngineKind::Simple,
            topology: TopologyKind::Fbdev,
            framebuffer_device: PathBuf::from("/dev/fb0"),
            virtual_camera_device: PathBuf::from("/dev/video100"),
            recording_dir: None,
            segment_seconds: 300,
            font: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            // The args are nonsense to `sleep`, so spawned renderers exit
            // immediately; the loop under test only cares that spawning works.
            renderer_cmd: "sleep".to_string(),
            renderer_extra_args: Vec::new(),
            stop_grace: Duration::from_millis(100),
        }
    }

    /// Probe replaying one scripted level set per tick.
    struct SequencedProbe {
        ticks: Vec<Vec<f32>>,
        current: AtomicUsize,
    }

    impl SequencedProbe {
        fn new(ticks: Vec<Vec<f32>>) -> Self {
            Self {
                ticks,
                current: AtomicUsize::new(0),
            }
        }

        fn advance(&self) {
            self.current.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl LevelProbe for &SequencedProbe {
        fn sample(&self, index: usize, _source: &Source, _window: Duration) -> Measurement {
            let tick = self.current.load(Ordering::SeqCst).min(self.ticks.len() - 1);
            let level_db = self.ticks[tick][index];
            let decision = if level_db > -45.0 {
                VadDecision::Speech
            } else {
                VadDecision::Silence
            };
            Measurement {
                source: index,
                level_db,
                decision,
                taken_at: Instant::now(),
            }
        }
    }

    #[test]
    fn ticks_follow_the_hold_time_scenario() {
        let probe = SequencedProbe::new(vec![
            vec![-60.0, -50.0, -30.0, -60.0],
            vec![-60.0, -60.0, -60.0, -60.0],
            vec![-60.0, -60.0, -60.0, -60.0],
        ]);
        let mut control = ControlLoop::new(test_config(), &probe);

        let t0 = Instant::now();
        control.tick(t0);
        assert_eq!(control.engine.active(), 2);

        probe.advance();
        control.tick(t0 + Duration::from_millis(1_000));
        assert_eq!(control.engine.active(), 2);

        probe.advance();
        control.tick(t0 + Duration::from_millis(3_000));
        assert_eq!(control.engine.active(), 0);
    }

    #[test]
    fn a_tick_without_a_switch_heals_a_dead_renderer() {
        let probe = SequencedProbe::new(vec![vec![-60.0, -60.0, -60.0, -60.0]]);
        let mut control = ControlLoop::new(test_config(), &probe);

        assert!(!control.supervisor.has_renderer());
        control.tick(Instant::now());
        assert_eq!(control.engine.active(), 0);
        assert!(control.supervisor.has_renderer());
    }

    #[test]
    fn a_failed_renderer_start_keeps_the_new_source_and_retries() {
        let mut cfg = test_config();
        cfg.renderer_cmd = "/nonexistent/renderer-binary".to_string();
        let probe = SequencedProbe::new(vec![vec![-60.0, -60.0, -30.0, -60.0]]);
        let mut control = ControlLoop::new(cfg, &probe);

        let t0 = Instant::now();
        control.tick(t0);
        // The switch is accepted even though the renderer never came up.
        assert_eq!(control.engine.active(), 2);
        assert!(!control.supervisor.has_renderer());

        // Unchanged audio on the next tick re-attempts the same spec
        // through the health path instead of crashing or giving up.
        control.tick(t0 + Duration::from_millis(100));
        assert_eq!(control.engine.active(), 2);
        assert!(!control.supervisor.has_renderer());
    }

    #[test]
    fn shutdown_signal_raises_the_flag() {
        let _guard = shutdown_lock().lock().unwrap();
        install_signal_handlers().expect("install handlers");
        // SAFETY: raising a signal we just installed a handler for.
        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(shutdown_requested());
        reset_shutdown_flag();
    }

    #[test]
    fn run_stops_promptly_once_shutdown_is_requested() {
        let _guard = shutdown_lock().lock().unwrap();
        SHUTDOWN.store(true, Ordering::SeqCst);
        let probe = SequencedProbe::new(vec![vec![-60.0, -60.0, -60.0, -60.0]]);
        let mut control = ControlLoop::new(test_config(), &probe);
        control.run().expect("run returns cleanly");
        assert!(!control.supervisor.has_renderer());
        reset_shutdown_flag();
    }
}
