//! Auto-stop decision engine.
//!
//! Two independent detectors run on every telemetry sample while a set is
//! active; either can request the single, idempotent stop action:
//!
//! - **Velocity stall** (gated by the per-set stall-detection toggle):
//!   two-tier hysteresis on the larger absolute cable velocity. Below
//!   `stall_low` the cables are definitely stalled, above `stall_high`
//!   definitely moving; between the bounds the previous determination is
//!   held so the timer does not flicker near the threshold.
//! - **Position release** (always on): handles completely at rest start a
//!   short timer regardless of ROM state, which catches a set abandoned
//!   before any rep was recorded; once a meaningful range exists, sitting in
//!   the danger zone while released starts the same timer.
//!
//! AMRAP and Just Lift sets get a startup grace window that suppresses both
//! detectors until either the window elapses or a meaningful range is
//! established, whichever comes first.

use crate::rep_counter::RepCounter;
use liftctl_config::AutoStopCfg;
use liftctl_traits::MetricSample;

/// Why a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Sustained near-zero velocity mid-set.
    Stall,
    /// Handles released / parked in the danger zone.
    HandlesReleased,
    /// Working-rep target reached.
    TargetReached,
    /// Timed set ran its configured duration.
    DurationElapsed,
    /// Explicit user action.
    User,
}

/// Countdown surfaced to the UI while a detector timer is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopCountdownUi {
    pub reason: StopReason,
    /// 0.0..=1.0 of the way to the stop firing.
    pub progress: f32,
    pub seconds_remaining: f32,
}

/// Delay before the stall countdown is surfaced to the UI (ms).
const STALL_UI_DELAY_MS: u64 = 1_000;

#[derive(Debug)]
pub struct AutoStopEngine {
    cfg: AutoStopCfg,
    /// ms timestamp of Active entry; `None` outside a set.
    active_since_ms: Option<u64>,
    /// Whether the startup grace window applies to this set (AMRAP/Just Lift).
    grace_applies: bool,
    /// Hysteresis state: holds between the two velocity bounds.
    currently_stalled: bool,
    stall_started_ms: Option<u64>,
    release_started_ms: Option<u64>,
    /// One-shot: only the first stop request in a set proceeds.
    stop_requested: bool,
}

impl AutoStopEngine {
    pub fn new(cfg: AutoStopCfg) -> Self {
        Self {
            cfg,
            active_since_ms: None,
            grace_applies: false,
            currently_stalled: false,
            stall_started_ms: None,
            release_started_ms: None,
            stop_requested: false,
        }
    }

    pub fn cfg(&self) -> &AutoStopCfg {
        &self.cfg
    }

    /// Arm the engine at Active entry. `grace_applies` is true for AMRAP and
    /// Just Lift sets, which get the startup suppression window.
    pub fn begin_set(&mut self, now_ms: u64, grace_applies: bool) {
        self.reset();
        self.active_since_ms = Some(now_ms);
        self.grace_applies = grace_applies;
    }

    /// Clear all per-set transient state at a set boundary.
    pub fn reset(&mut self) {
        self.active_since_ms = None;
        self.grace_applies = false;
        self.currently_stalled = false;
        self.stall_started_ms = None;
        self.release_started_ms = None;
        self.stop_requested = false;
    }

    /// Drop any in-flight detector timers without touching the stop latch or
    /// the grace window. Used when resuming a paused set.
    pub fn clear_timers(&mut self) {
        self.currently_stalled = false;
        self.stall_started_ms = None;
        self.release_started_ms = None;
    }

    /// One-shot stop request; returns true only for the first caller in a
    /// set. Safe to call from both detectors and the rep-target path.
    pub fn request_stop(&mut self, reason: StopReason) -> bool {
        if self.stop_requested {
            tracing::debug!(?reason, "stop already requested; ignoring");
            return false;
        }
        self.stop_requested = true;
        tracing::info!(?reason, "auto-stop requested");
        true
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// True while the AMRAP/Just-Lift startup window suppresses detectors:
    /// ends at `startup_grace_ms` after Active entry or as soon as a
    /// meaningful range exists, whichever comes first.
    pub fn in_grace_window(&self, now_ms: u64, counter: &RepCounter) -> bool {
        if !self.grace_applies {
            return false;
        }
        if counter.has_meaningful_range(self.cfg.meaningful_range) {
            return false;
        }
        match self.active_since_ms {
            Some(t0) => now_ms.saturating_sub(t0) < self.cfg.startup_grace_ms,
            None => false,
        }
    }

    /// Run both detectors against one sample. Returns the stop reason the
    /// first time a timer expires; every later call returns `None`.
    pub fn evaluate(
        &mut self,
        sample: &MetricSample,
        counter: &RepCounter,
        stall_enabled: bool,
        now_ms: u64,
    ) -> Option<StopReason> {
        if self.stop_requested || self.active_since_ms.is_none() {
            return None;
        }
        let in_grace = self.in_grace_window(now_ms, counter);

        if let Some(reason) = self.evaluate_stall(sample, counter, stall_enabled, now_ms, in_grace)
        {
            return self.request_stop(reason).then_some(reason);
        }
        if let Some(reason) = self.evaluate_release(sample, counter, now_ms, in_grace) {
            return self.request_stop(reason).then_some(reason);
        }
        None
    }

    fn evaluate_stall(
        &mut self,
        sample: &MetricSample,
        counter: &RepCounter,
        stall_enabled: bool,
        now_ms: u64,
        in_grace: bool,
    ) -> Option<StopReason> {
        if !stall_enabled {
            self.stall_started_ms = None;
            self.currently_stalled = false;
            return None;
        }

        let v = sample.max_abs_velocity();
        if v < self.cfg.stall_low {
            self.currently_stalled = true;
        } else if v > self.cfg.stall_high {
            // Definitely moving: clear the timer.
            self.currently_stalled = false;
            self.stall_started_ms = None;
        }
        // Between the bounds: hold the previous state and timer.

        if self.currently_stalled && self.stall_started_ms.is_none() {
            let max_pos = sample.max_position();
            let at_rest = max_pos < self.cfg.handle_rest_threshold;
            let has_range = counter.has_meaningful_range(self.cfg.meaningful_range);
            let position_gate = max_pos > self.cfg.stall_min_position || has_range || at_rest;
            if position_gate && has_range && !in_grace {
                self.stall_started_ms = Some(now_ms);
                tracing::debug!(velocity = v, position = max_pos, "stall timer armed");
            }
        }

        let start = self.stall_started_ms?;
        (now_ms.saturating_sub(start) >= self.cfg.stall_duration_ms).then_some(StopReason::Stall)
    }

    fn evaluate_release(
        &mut self,
        sample: &MetricSample,
        counter: &RepCounter,
        now_ms: u64,
        in_grace: bool,
    ) -> Option<StopReason> {
        let max_pos = sample.max_position();
        let at_rest = max_pos < self.cfg.handle_rest_threshold;

        let holding = if in_grace {
            false
        } else if at_rest {
            // Regardless of ROM state: catches abandoning the set before any
            // rep established a range.
            true
        } else if counter.has_meaningful_range(self.cfg.meaningful_range) {
            let danger = counter.is_in_danger_zone(
                sample.position_a,
                sample.position_b,
                self.cfg.danger_zone_fraction,
                self.cfg.meaningful_range,
            );
            let released = self.cable_released(sample, counter);
            danger && released
        } else {
            false
        };

        if !holding {
            self.release_started_ms = None;
            return None;
        }
        let start = *self.release_started_ms.get_or_insert(now_ms);
        (now_ms.saturating_sub(start) >= self.cfg.release_duration_ms)
            .then_some(StopReason::HandlesReleased)
    }

    /// A cable counts as released when it sits within `release_proximity` of
    /// its recorded minimum, or below the rest threshold outright.
    fn cable_released(&self, sample: &MetricSample, counter: &RepCounter) -> bool {
        let r = counter.ranges();
        let a_released = sample.position_a != 0.0
            && (r.a.near_min(sample.position_a, self.cfg.release_proximity)
                || sample.position_a < self.cfg.handle_rest_threshold);
        let b_released = sample.position_b != 0.0
            && (r.b.near_min(sample.position_b, self.cfg.release_proximity)
                || sample.position_b < self.cfg.handle_rest_threshold);
        a_released || b_released
    }

    /// Firmware "deload occurred" fast path: arms the stall timer directly
    /// when in Just Lift/AMRAP + Active, under the same grace-window and
    /// meaningful-range gating as the velocity detector.
    pub fn arm_stall_from_deload(
        &mut self,
        counter: &RepCounter,
        stall_enabled: bool,
        now_ms: u64,
    ) {
        if !stall_enabled || self.stop_requested || self.active_since_ms.is_none() {
            return;
        }
        if self.in_grace_window(now_ms, counter)
            || !counter.has_meaningful_range(self.cfg.meaningful_range)
        {
            return;
        }
        if self.stall_started_ms.is_none() {
            self.currently_stalled = true;
            self.stall_started_ms = Some(now_ms);
            tracing::debug!("stall timer armed from firmware deload flag");
        }
    }

    /// Countdown surfaced for the UI. The stall timer takes display priority
    /// when both detectors are running; it only appears after a 1 s delay so
    /// brief pauses between reps don't flash a countdown.
    pub fn ui(&self, now_ms: u64) -> Option<StopCountdownUi> {
        if let Some(start) = self.stall_started_ms {
            let elapsed = now_ms.saturating_sub(start);
            if elapsed >= STALL_UI_DELAY_MS {
                return Some(countdown_ui(
                    StopReason::Stall,
                    elapsed,
                    self.cfg.stall_duration_ms,
                ));
            }
        }
        if let Some(start) = self.release_started_ms {
            let elapsed = now_ms.saturating_sub(start);
            return Some(countdown_ui(
                StopReason::HandlesReleased,
                elapsed,
                self.cfg.release_duration_ms,
            ));
        }
        None
    }
}

fn countdown_ui(reason: StopReason, elapsed_ms: u64, total_ms: u64) -> StopCountdownUi {
    let total = total_ms.max(1) as f32;
    let progress = (elapsed_ms as f32 / total).clamp(0.0, 1.0);
    StopCountdownUi {
        reason,
        progress,
        seconds_remaining: ((total - elapsed_ms as f32).max(0.0)) / 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pos: f32, vel: f32) -> MetricSample {
        MetricSample {
            position_a: pos,
            position_b: pos,
            velocity_a: vel,
            velocity_b: vel,
            load_a: 10.0,
            load_b: 10.0,
            total_load: 20.0,
            timestamp_ms: 0,
        }
    }

    fn calibrated_counter() -> RepCounter {
        let mut rc = RepCounter::new();
        rc.update_position_ranges(5.0, 5.0);
        rc.update_position_ranges(105.0, 105.0);
        rc
    }

    #[test]
    fn stall_fires_after_configured_duration() {
        let cfg = AutoStopCfg::default();
        let mut eng = AutoStopEngine::new(cfg);
        let rc = calibrated_counter();
        eng.begin_set(0, false);

        assert_eq!(eng.evaluate(&sample(50.0, 1.0), &rc, true, 100), None);
        assert_eq!(eng.evaluate(&sample(50.0, 1.0), &rc, true, 4_000), None);
        assert_eq!(
            eng.evaluate(&sample(50.0, 1.0), &rc, true, 5_200),
            Some(StopReason::Stall)
        );
        // one-shot: a second expiry yields nothing
        assert_eq!(eng.evaluate(&sample(50.0, 1.0), &rc, true, 6_000), None);
    }

    #[test]
    fn hysteresis_band_holds_previous_state() {
        let cfg = AutoStopCfg::default();
        let mut eng = AutoStopEngine::new(cfg);
        let rc = calibrated_counter();
        eng.begin_set(0, false);

        // Arm the timer with a definite stall.
        eng.evaluate(&sample(50.0, 1.0), &rc, true, 100);
        assert!(eng.stall_started_ms.is_some());
        // Oscillation inside the 2.5–10 band never clears the timer.
        let mut t = 200;
        for v in [3.0, 8.0, 4.5, 9.9, 2.6] {
            eng.evaluate(&sample(50.0, v), &rc, true, t);
            assert!(eng.stall_started_ms.is_some(), "cleared at v={v}");
            t += 100;
        }
        // A definite move clears it.
        eng.evaluate(&sample(50.0, 15.0), &rc, true, t);
        assert!(eng.stall_started_ms.is_none());
    }

    #[test]
    fn band_velocity_never_arms_a_fresh_timer() {
        let cfg = AutoStopCfg::default();
        let mut eng = AutoStopEngine::new(cfg);
        let rc = calibrated_counter();
        eng.begin_set(0, false);
        // Oscillating strictly inside the band from a moving start: the
        // initial not-stalled determination is held throughout.
        let mut t = 0;
        for v in [3.0, 8.0, 3.0, 8.0, 3.0] {
            eng.evaluate(&sample(50.0, v), &rc, true, t);
            assert!(eng.stall_started_ms.is_none());
            t += 2_000;
        }
    }

    #[test]
    fn stall_detector_respects_toggle() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = calibrated_counter();
        eng.begin_set(0, false);
        assert_eq!(eng.evaluate(&sample(50.0, 1.0), &rc, false, 10_000), None);
        assert!(eng.stall_started_ms.is_none());
    }

    #[test]
    fn rest_timer_fires_without_any_range() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = RepCounter::new(); // no calibration at all
        eng.begin_set(0, false);
        assert_eq!(eng.evaluate(&sample(1.0, 0.0), &rc, true, 100), None);
        assert_eq!(
            eng.evaluate(&sample(1.0, 0.0), &rc, true, 2_700),
            Some(StopReason::HandlesReleased)
        );
    }

    #[test]
    fn grace_window_suppresses_then_expires() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = RepCounter::new();
        eng.begin_set(0, true); // AMRAP

        // Handles at rest throughout the grace window: no stop.
        let mut t = 0;
        while t < 7_999 {
            assert_eq!(eng.evaluate(&sample(1.0, 0.0), &rc, true, t), None);
            t += 250;
        }
        // Past the window (and still no meaningful range) the rest timer
        // arms and runs its own 2.5 s.
        assert_eq!(eng.evaluate(&sample(1.0, 0.0), &rc, true, 8_001), None);
        assert_eq!(
            eng.evaluate(&sample(1.0, 0.0), &rc, true, 8_001 + 2_500),
            Some(StopReason::HandlesReleased)
        );
    }

    #[test]
    fn meaningful_range_ends_grace_early() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = calibrated_counter();
        eng.begin_set(0, true);
        assert!(!eng.in_grace_window(1_000, &rc));
    }

    #[test]
    fn danger_zone_plus_release_fires() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = calibrated_counter(); // range 5..105, zone ends at 10.0
        eng.begin_set(0, false);
        // position 9: in danger zone, within 10 of min, not at rest
        assert_eq!(eng.evaluate(&sample(9.0, 0.1), &rc, true, 0), None);
        assert_eq!(
            eng.evaluate(&sample(9.0, 0.1), &rc, true, 2_500),
            Some(StopReason::HandlesReleased)
        );
    }

    #[test]
    fn leaving_danger_zone_resets_release_timer_only() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = calibrated_counter();
        eng.begin_set(0, false);
        eng.evaluate(&sample(9.0, 1.0), &rc, true, 0);
        assert!(eng.release_started_ms.is_some());
        assert!(eng.stall_started_ms.is_some());
        // Move out of the zone but stay stalled: release clears, stall holds.
        eng.evaluate(&sample(60.0, 1.0), &rc, true, 1_000);
        assert!(eng.release_started_ms.is_none());
        assert!(eng.stall_started_ms.is_some());
    }

    #[test]
    fn deload_arms_stall_timer_directly() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = calibrated_counter();
        eng.begin_set(0, false);
        eng.arm_stall_from_deload(&rc, true, 1_000);
        assert!(eng.stall_started_ms.is_some());
        // but not without a meaningful range
        let mut eng2 = AutoStopEngine::new(AutoStopCfg::default());
        eng2.begin_set(0, false);
        eng2.arm_stall_from_deload(&RepCounter::new(), true, 1_000);
        assert!(eng2.stall_started_ms.is_none());
    }

    #[test]
    fn request_stop_is_idempotent() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        eng.begin_set(0, false);
        assert!(eng.request_stop(StopReason::TargetReached));
        assert!(!eng.request_stop(StopReason::Stall));
        assert!(!eng.request_stop(StopReason::User));
    }

    #[test]
    fn stall_ui_has_priority_and_delay() {
        let mut eng = AutoStopEngine::new(AutoStopCfg::default());
        let rc = calibrated_counter();
        eng.begin_set(0, false);
        eng.evaluate(&sample(9.0, 1.0), &rc, true, 0); // arms both timers
        // Stall hidden inside its 1s delay; release shown instead.
        let ui = eng.ui(500).expect("release countdown");
        assert_eq!(ui.reason, StopReason::HandlesReleased);
        let ui = eng.ui(1_500).expect("stall countdown");
        assert_eq!(ui.reason, StopReason::Stall);
        assert!(ui.progress > 0.0 && ui.progress < 1.0);
    }
}
