//! Per-source audio level probe built on CPAL.
//!
//! A probe opens the configured input device, collects one downmixed mono
//! window, and reduces it to a loudness measurement plus a voice-activity
//! label. Failures collapse to a silence sentinel instead of propagating.

use super::meter::rms_db;
use super::vad::{build_vad_engine, label_window, VadDecision};
use crate::config::{Source, VadEngineKind};
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::bounded;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// A single loudness/activity reading for one source at one point in time.
/// Produced and consumed within one control-loop tick, never persisted.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub source: usize,
    pub level_db: f32,
    pub decision: VadDecision,
    pub taken_at: Instant,
}

impl Measurement {
    /// Sentinel for a failed or empty capture: minimum level, silent.
    pub fn silence(source: usize, taken_at: Instant) -> Self {
        Self {
            source,
            level_db: super::SILENCE_FLOOR_DB,
            decision: VadDecision::Silence,
            taken_at,
        }
    }
}

/// Seam between the control loop and the capture hardware. `sample` is
/// bounded by the window duration and must never fail: a malfunctioning
/// microphone reads as silence.
pub trait LevelProbe: Sync {
    fn sample(&self, index: usize, source: &Source, window: Duration) -> Measurement;
}

/// Probe implementation backed by the system audio host.
pub struct CpalProbe {
    vad_engine: VadEngineKind,
    threshold_db: f32,
}

impl CpalProbe {
    pub fn new(vad_engine: VadEngineKind, threshold_db: f32) -> Self {
        Self {
            vad_engine,
            threshold_db,
        }
    }

    /// List input device names so the CLI can expose a selector.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Record one window from the source's microphone, normalize the format,
    /// and return mono samples at the device rate.
    fn capture_window(&self, source: &Source, window: Duration) -> Result<(Vec<f32>, u32)> {
        let device = resolve_input_device(&source.audio)?;
        let default_config = device
            .default_input_config()
            .context("no default input config")?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));

        // cpal delivers samples on a callback thread; collect them in a
        // shared buffer so ownership stays on the caller side.
        let expected_samples = (window.as_secs_f64() * device_rate as f64).ceil() as usize;
        let buffer = Arc::new(Mutex::new(Vec::<f32>::with_capacity(expected_samples)));
        let buffer_clone = buffer.clone();
        let err_fn = |err| debug!(%err, "audio stream error");

        let stream = match format {
            SampleFormat::F32 => device.build_input_stream(
                &device_config,
                move |data: &[f32], _| {
                    if let Ok(mut buf) = buffer_clone.lock() {
                        append_downmixed(&mut buf, data, channels, |sample| sample);
                    }
                },
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    if let Ok(mut buf) = buffer_clone.lock() {
                        append_downmixed(&mut buf, data, channels, |sample| {
                            sample as f32 / 32_768.0_f32
                        });
                    }
                },
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    if let Ok(mut buf) = buffer_clone.lock() {
                        append_downmixed(&mut buf, data, channels, |sample| {
                            sample as f32 / 32_768.0_f32 - 1.0
                        });
                    }
                },
                err_fn,
                None,
            )?,
            other => return Err(anyhow!("unsupported sample format {other:?}")),
        };

        stream
            .play()
            .with_context(|| format!("failed to start capture on '{}'", source.audio))?;
        thread::sleep(window);
        drop(stream);

        let samples = buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();
        Ok((samples, device_rate))
    }
}

impl LevelProbe for CpalProbe {
    fn sample(&self, index: usize, source: &Source, window: Duration) -> Measurement {
        let taken_at = Instant::now();
        match self.capture_window(source, window) {
            Ok((samples, device_rate)) if !samples.is_empty() => {
                let level_db = rms_db(&samples);
                let mut engine = build_vad_engine(self.vad_engine, self.threshold_db);
                let decision = label_window(engine.as_mut(), &samples, device_rate);
                Measurement {
                    source: index,
                    level_db,
                    decision,
                    taken_at,
                }
            }
            Ok(_) => {
                debug!(source = index, "empty capture window, reading as silence");
                Measurement::silence(index, taken_at)
            }
            Err(err) => {
                debug!(source = index, %err, "capture failed, reading as silence");
                Measurement::silence(index, taken_at)
            }
        }
    }
}

/// Probe every source once, concurrently, and return the measurements in
/// source order. One worker per source keeps the whole batch close to a
/// single window long; workers never outlive the tick.
pub fn sample_all<P>(probe: &P, sources: &[Source], window: Duration) -> Vec<Measurement>
where
    P: LevelProbe + ?Sized,
{
    let (tx, rx) = bounded(sources.len().max(1));
    let mut measurements = thread::scope(|scope| {
        for (index, source) in sources.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send(probe.sample(index, source, window));
            });
        }
        drop(tx);
        rx.iter().collect::<Vec<_>>()
    });
    measurements.sort_by_key(|measurement| measurement.source);
    measurements
}

fn resolve_input_device(name: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();
    let mut devices = host.input_devices().context("no input devices available")?;
    devices
        .find(|device| {
            device
                .name()
                .map(|candidate| candidate == name || candidate.contains(name))
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("input device '{name}' not found"))
}

/// Collapse interleaved multi-channel frames into mono while converting the
/// native sample type to f32.
fn append_downmixed<T: Copy>(
    buffer: &mut Vec<f32>,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) {
    for frame in data.chunks(channels.max(1)) {
        let sum: f32 = frame.iter().map(|sample| convert(*sample)).sum();
        buffer.push(sum / frame.len() as f32);
    }
}
