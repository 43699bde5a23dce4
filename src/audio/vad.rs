//! Voice activity labeling for probe windows.
//!
//! Engines classify one fixed-size frame at a time; `label_window` votes
//! over all frames in a probe window to label the whole window.

use super::resample::to_vad_rate;
use super::VAD_RATE;
use crate::config::VadEngineKind;
use std::cmp::Ordering as CmpOrdering;

/// Frame duration fed to the engines. Earshot accepts 10/20/30 ms at 16 kHz.
pub(crate) const VAD_FRAME_MS: u32 = 20;

/// Voice Activity Detection engine that processes audio frames.
///
/// # Frame Size Contract
/// Implementations may require specific frame sizes. For example, Earshot
/// expects frames of 10ms, 20ms, or 30ms duration at 16kHz sample rate.
///
/// Callers must ensure frames passed to `process_frame` match the engine's
/// expected frame size, or the VAD may produce incorrect results.
pub trait VadEngine: Send {
    fn process_frame(&mut self, samples: &[f32]) -> VadDecision;
    fn reset(&mut self);
    fn name(&self) -> &'static str {
        "unknown_vad"
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
    Uncertain,
}

impl VadDecision {
    pub fn label(self) -> &'static str {
        match self {
            VadDecision::Speech => "speech",
            VadDecision::Silence => "silence",
            VadDecision::Uncertain => "uncertain",
        }
    }
}

/// Lightweight VAD that operates on RMS energy. Always available; also the
/// fallback when Earshot is compiled out.
#[derive(Debug, Clone)]
pub struct SimpleThresholdVad {
    threshold_db: f32,
}

impl SimpleThresholdVad {
    pub fn new(threshold_db: f32) -> Self {
        Self { threshold_db }
    }
}

impl VadEngine for SimpleThresholdVad {
    fn process_frame(&mut self, samples: &[f32]) -> VadDecision {
        if samples.is_empty() {
            return VadDecision::Uncertain;
        }
        let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        let rms = energy.sqrt().max(1e-6);
        let db = 20.0 * rms.log10();
        if db >= self.threshold_db {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "simple_threshold_vad"
    }
}

/// Construct the configured engine. Validation rejects the earshot kind on
/// builds without the feature, so the fallback arm is a safety net only.
pub fn build_vad_engine(kind: VadEngineKind, threshold_db: f32) -> Box<dyn VadEngine> {
    match kind {
        VadEngineKind::Simple => Box::new(SimpleThresholdVad::new(threshold_db)),
        VadEngineKind::Earshot => {
            #[cfg(feature = "vad_earshot")]
            {
                Box::new(crate::vad_earshot::EarshotVad::new(threshold_db))
            }
            #[cfg(not(feature = "vad_earshot"))]
            {
                Box::new(SimpleThresholdVad::new(threshold_db))
            }
        }
    }
}

/// Majority label for one probe window: resample to the VAD rate, split into
/// engine-sized frames, and vote. Windows too short for a single frame come
/// back `Uncertain`.
pub fn label_window(engine: &mut dyn VadEngine, samples: &[f32], sample_rate: u32) -> VadDecision {
    if samples.is_empty() {
        return VadDecision::Silence;
    }
    let resampled = to_vad_rate(samples, sample_rate);
    let frame_samples = ((VAD_RATE * VAD_FRAME_MS) / 1000) as usize;
    let mut speech = 0usize;
    let mut silence = 0usize;
    for frame in resampled.chunks(frame_samples) {
        if frame.len() < frame_samples {
            break;
        }
        match engine.process_frame(frame) {
            VadDecision::Speech => speech += 1,
            VadDecision::Silence => silence += 1,
            VadDecision::Uncertain => {}
        }
    }
    if speech == 0 && silence == 0 {
        return VadDecision::Uncertain;
    }
    match speech.cmp(&silence) {
        CmpOrdering::Greater => VadDecision::Speech,
        CmpOrdering::Less => VadDecision::Silence,
        CmpOrdering::Equal => VadDecision::Uncertain,
    }
}
