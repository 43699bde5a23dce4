//! Switch decision engine: asymmetric hysteresis over the classifier output.
//!
//! Switching toward a named speaker is immediate; switching back to the
//! fallback on silence is gated by the hold time. A symmetric debounce
//! would change observable behavior (a speaker change mid-pause would lag),
//! so the asymmetry is deliberate and covered by tests.

use std::time::{Duration, Instant};

/// The engine's only persistent state: who is on air and since when.
///
/// Invariant: `active` always indexes into the configured source list.
/// Mutated only by [`SwitchDecisionEngine::decide`], exactly once per
/// accepted switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    pub active: usize,
    pub last_switch: Instant,
}

pub struct SwitchDecisionEngine {
    state: SwitchState,
    fallback: usize,
    hold_time: Duration,
}

impl SwitchDecisionEngine {
    /// Start on the fallback source, as if it had just been switched to.
    pub fn new(fallback: usize, hold_time: Duration, now: Instant) -> Self {
        Self {
            state: SwitchState {
                active: fallback,
                last_switch: now,
            },
            fallback,
            hold_time,
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub fn active(&self) -> usize {
        self.state.active
    }

    /// Decide whether the classifier result warrants a camera change.
    ///
    /// Returns the new active source when a switch is accepted; `None`
    /// leaves the state untouched. Calling again with identical inputs and
    /// an unchanged `now` never produces a second switch.
    pub fn decide(&mut self, active: Option<usize>, now: Instant) -> Option<usize> {
        let target = match active {
            Some(source) if source != self.state.active => Some(source),
            Some(_) => None,
            None => {
                let held = now.duration_since(self.state.last_switch) < self.hold_time;
                if self.state.active != self.fallback && !held {
                    Some(self.fallback)
                } else {
                    None
                }
            }
        };
        if let Some(next) = target {
            self.state = SwitchState {
                active: next,
                last_switch: now,
            };
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_millis(2_500);

    fn engine_at(now: Instant) -> SwitchDecisionEngine {
        SwitchDecisionEngine::new(0, HOLD, now)
    }

    #[test]
    fn switches_immediately_toward_a_speaker() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        assert_eq!(engine.decide(Some(2), start), Some(2));
        assert_eq!(engine.active(), 2);
        assert_eq!(engine.state().last_switch, start);
    }

    #[test]
    fn speaker_switch_ignores_hold_time() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        assert_eq!(engine.decide(Some(2), start), Some(2));
        // A different speaker a moment later still switches instantly.
        let shortly_after = start + Duration::from_millis(100);
        assert_eq!(engine.decide(Some(3), shortly_after), Some(3));
    }

    #[test]
    fn silence_before_hold_time_does_not_fall_back() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        engine.decide(Some(2), start);
        let one_second = start + Duration::from_secs(1);
        assert_eq!(engine.decide(None, one_second), None);
        assert_eq!(engine.active(), 2);
        assert_eq!(engine.state().last_switch, start);
    }

    #[test]
    fn silence_after_hold_time_falls_back() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        engine.decide(Some(2), start);
        let three_seconds = start + Duration::from_secs(3);
        assert_eq!(engine.decide(None, three_seconds), Some(0));
        assert_eq!(engine.active(), 0);
        assert_eq!(engine.state().last_switch, three_seconds);
    }

    #[test]
    fn silence_at_exactly_hold_time_falls_back() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        engine.decide(Some(1), start);
        assert_eq!(engine.decide(None, start + HOLD), Some(0));
    }

    #[test]
    fn silence_on_the_fallback_is_a_no_op() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        let much_later = start + Duration::from_secs(60);
        assert_eq!(engine.decide(None, much_later), None);
        assert_eq!(engine.active(), 0);
        assert_eq!(engine.state().last_switch, start);
    }

    #[test]
    fn naming_the_current_source_is_a_no_op() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        engine.decide(Some(2), start);
        let later = start + Duration::from_secs(10);
        assert_eq!(engine.decide(Some(2), later), None);
        assert_eq!(engine.state().last_switch, start);
    }

    #[test]
    fn decide_is_idempotent_for_unchanged_inputs() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        assert_eq!(engine.decide(Some(2), start), Some(2));
        assert_eq!(engine.decide(Some(2), start), None);
        assert_eq!(engine.decide(Some(2), start), None);

        let after_hold = start + Duration::from_secs(5);
        assert_eq!(engine.decide(None, after_hold), Some(0));
        assert_eq!(engine.decide(None, after_hold), None);
    }

    #[test]
    fn spec_scenario_hold_time_round_trip() {
        // S0(fallback)..S3, threshold -45 dB, hold 2.5s. The classifier
        // feeds [-60,-50,-30,-60] -> S2, then silence at t=1.0 and t=3.0.
        let t0 = Instant::now();
        let mut engine = engine_at(t0);

        assert_eq!(engine.decide(Some(2), t0), Some(2));

        let t1 = t0 + Duration::from_millis(1_000);
        assert_eq!(engine.decide(None, t1), None);

        let t3 = t0 + Duration::from_millis(3_000);
        assert_eq!(engine.decide(None, t3), Some(0));
    }

    #[test]
    fn hold_clock_restarts_on_every_switch() {
        let t0 = Instant::now();
        let mut engine = engine_at(t0);
        engine.decide(Some(2), t0);

        // Speaker change at t=2.0 restarts the hold clock.
        let t2 = t0 + Duration::from_secs(2);
        assert_eq!(engine.decide(Some(1), t2), Some(1));

        // Silence at t=4.0 is only 2.0s after the last switch: still held.
        let t4 = t0 + Duration::from_secs(4);
        assert_eq!(engine.decide(None, t4), None);

        // Silence at t=5.0 clears the hold.
        let t5 = t0 + Duration::from_secs(5);
        assert_eq!(engine.decide(None, t5), Some(0));
    }
}
