//! Active-source selection from one tick's measurements.
//!
//! Pure policy, no I/O: the sampler already reduced each probe window to a
//! level and a voice-activity label, so classification is a deterministic
//! pick over that snapshot.

use crate::audio::{Measurement, VadDecision};
use crate::config::ActivityPolicyKind;

/// Applies the configured activity policy to one tick's measurements.
///
/// Returns the active source index, or `None` when every input reads as
/// silent — the decision engine treats `None` as "fall back to home".
#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    policy: ActivityPolicyKind,
    threshold_db: f32,
}

impl ActivityClassifier {
    pub fn new(policy: ActivityPolicyKind, threshold_db: f32) -> Self {
        Self {
            policy,
            threshold_db,
        }
    }

    pub fn classify(&self, measurements: &[Measurement]) -> Option<usize> {
        match self.policy {
            ActivityPolicyKind::Loudest => self.loudest_above_threshold(measurements),
            ActivityPolicyKind::Vad => first_speaking(measurements),
        }
    }

    /// Loudest source strictly above the silence threshold. Scanning keeps
    /// the first maximum, so ties break to the lowest index.
    fn loudest_above_threshold(&self, measurements: &[Measurement]) -> Option<usize> {
        let mut winner: Option<&Measurement> = None;
        for measurement in measurements {
            if measurement.level_db <= self.threshold_db {
                continue;
            }
            let louder = winner
                .map(|best| measurement.level_db > best.level_db)
                .unwrap_or(true);
            if louder {
                winner = Some(measurement);
            }
        }
        winner.map(|measurement| measurement.source)
    }
}

/// Lowest-indexed source whose window was classified as speech.
/// `Uncertain` counts as not speaking.
fn first_speaking(measurements: &[Measurement]) -> Option<usize> {
    measurements
        .iter()
        .find(|measurement| measurement.decision == VadDecision::Speech)
        .map(|measurement| measurement.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn measurement(source: usize, level_db: f32, decision: VadDecision) -> Measurement {
        Measurement {
            source,
            level_db,
            decision,
            taken_at: Instant::now(),
        }
    }

    fn levels(levels: &[f32]) -> Vec<Measurement> {
        levels
            .iter()
            .enumerate()
            .map(|(source, &level_db)| {
                let decision = if level_db > -45.0 {
                    VadDecision::Speech
                } else {
                    VadDecision::Silence
                };
                measurement(source, level_db, decision)
            })
            .collect()
    }

    #[test]
    fn loudest_picks_the_loudest_above_threshold() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Loudest, -45.0);
        let snapshot = levels(&[-60.0, -50.0, -30.0, -60.0]);
        assert_eq!(classifier.classify(&snapshot), Some(2));
    }

    #[test]
    fn loudest_returns_none_when_everything_is_silent() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Loudest, -45.0);
        let snapshot = levels(&[-60.0, -60.0, -60.0, -60.0]);
        assert_eq!(classifier.classify(&snapshot), None);
    }

    #[test]
    fn loudest_treats_threshold_level_as_silence() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Loudest, -45.0);
        let snapshot = levels(&[-45.0, -45.0]);
        assert_eq!(classifier.classify(&snapshot), None);
    }

    #[test]
    fn loudest_breaks_ties_to_the_lowest_index() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Loudest, -45.0);
        let snapshot = levels(&[-60.0, -30.0, -30.0, -60.0]);
        assert_eq!(classifier.classify(&snapshot), Some(1));
    }

    #[test]
    fn loudest_can_pick_the_fallback_source() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Loudest, -45.0);
        let snapshot = levels(&[-20.0, -60.0, -60.0, -60.0]);
        assert_eq!(classifier.classify(&snapshot), Some(0));
    }

    #[test]
    fn vad_picks_the_first_speaking_source() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Vad, -45.0);
        let snapshot = vec![
            measurement(0, -60.0, VadDecision::Silence),
            measurement(1, -40.0, VadDecision::Speech),
            measurement(2, -30.0, VadDecision::Speech),
        ];
        assert_eq!(classifier.classify(&snapshot), Some(1));
    }

    #[test]
    fn vad_ignores_uncertain_windows() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Vad, -45.0);
        let snapshot = vec![
            measurement(0, -60.0, VadDecision::Uncertain),
            measurement(1, -60.0, VadDecision::Silence),
        ];
        assert_eq!(classifier.classify(&snapshot), None);
    }

    #[test]
    fn classify_handles_empty_snapshot() {
        let classifier = ActivityClassifier::new(ActivityPolicyKind::Loudest, -45.0);
        assert_eq!(classifier.classify(&[]), None);
    }
}
