//! Rep counting and range-of-motion tracking.
//!
//! The firmware's rep notifications are authoritative for counts; raw
//! telemetry is authoritative for the observed min/max position range. The
//! two are folded together here so the auto-stop engine can ask one object
//! about both "how many reps" and "where is the danger zone".

use liftctl_traits::RepNotification;

/// Per-set counting targets; set via [`RepCounter::configure`] before a set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepTargets {
    pub warmup: u32,
    pub working: u32,
    pub just_lift: bool,
    pub stop_at_top: bool,
    pub amrap: bool,
}

/// Rep counts for the current set. Mutated only by [`RepCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepCount {
    pub warmup_reps: u32,
    pub working_reps: u32,
    pub total_reps: u32,
}

/// Observed min/max for one cable. `None` until the first meaningful sample;
/// zero positions are excluded because the machine reports 0 for a cable
/// that is not attached.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CableRange {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl CableRange {
    fn fold(&mut self, pos: f32) {
        if pos == 0.0 || !pos.is_finite() {
            return;
        }
        self.min = Some(self.min.map_or(pos, |m| m.min(pos)));
        self.max = Some(self.max.map_or(pos, |m| m.max(pos)));
    }

    /// Width of the observed range; 0 until both bounds exist.
    pub fn span(&self) -> f32 {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0.0,
        }
    }

    pub fn is_meaningful(&self, threshold: f32) -> bool {
        self.span() > threshold
    }

    /// True if `pos` sits in the bottom `fraction` of a meaningful range.
    pub fn in_danger_zone(&self, pos: f32, fraction: f32, meaningful: f32) -> bool {
        if !self.is_meaningful(meaningful) || pos == 0.0 {
            return false;
        }
        match self.min {
            Some(lo) => pos <= lo + self.span() * fraction,
            None => false,
        }
    }

    /// True if `pos` is within `proximity` of the recorded minimum.
    pub fn near_min(&self, pos: f32, proximity: f32) -> bool {
        match self.min {
            Some(lo) => pos <= lo + proximity,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RepRanges {
    pub a: CableRange,
    pub b: CableRange,
}

/// Lifting-phase direction derived from position, for animated UI feedback.
/// Does not affect counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LiftPhase {
    #[default]
    Idle,
    Raising,
    Lowering,
}

/// Minimum position change before the phase tracker flips direction.
const PHASE_EPSILON: f32 = 0.5;

#[derive(Debug, Default)]
pub struct RepCounter {
    counts: RepCount,
    ranges: RepRanges,
    targets: RepTargets,
    phase: LiftPhase,
    last_phase_pos: Option<f32>,
    // UI zero-reference, independent of the min/max range.
    baseline_a: Option<f32>,
    baseline_b: Option<f32>,
    // Last observed firmware counters; `None` until the first notification,
    // so counter resets re-baseline instead of producing huge deltas.
    last_rom_count: Option<u32>,
    last_set_count: Option<u32>,
    // Rep tops observed this set; runs one ahead of `total_reps` while a
    // rep's eccentric is still in flight.
    tops_seen: u32,
    last_top_counter: Option<u32>,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set per-set targets. Must be called before `process` /
    /// `should_stop_workout` are meaningful.
    pub fn configure(
        &mut self,
        warmup_target: u32,
        working_target: u32,
        just_lift: bool,
        stop_at_top: bool,
        amrap: bool,
    ) {
        self.targets = RepTargets {
            warmup: warmup_target,
            working: working_target,
            just_lift,
            stop_at_top,
            amrap,
        };
    }

    pub fn counts(&self) -> RepCount {
        self.counts
    }

    pub fn ranges(&self) -> &RepRanges {
        &self.ranges
    }

    pub fn phase(&self) -> LiftPhase {
        self.phase
    }

    pub fn targets(&self) -> RepTargets {
        self.targets
    }

    /// Authoritative rep-counting step driven by a firmware notification.
    ///
    /// Legacy hardware never populates `reps_set_count`, so reps are derived
    /// from `top_counter` increments instead; the format flag is honored
    /// per-notification because some firmware interleaves both formats during
    /// a transition. Positions ride along and widen the ROM range.
    pub fn process(&mut self, n: &RepNotification, pos_a: f32, pos_b: f32) {
        self.ranges.a.fold(pos_a);
        self.ranges.b.fold(pos_b);

        if n.legacy_format {
            // Legacy firmware counts reps at the top, so tops and reps are
            // the same stream.
            let delta = counter_delta(&mut self.last_top_counter, n.top_counter);
            self.tops_seen += delta;
            self.add_reps(delta);
        } else {
            self.tops_seen += counter_delta(&mut self.last_top_counter, n.top_counter);
            let warmup_delta = counter_delta(&mut self.last_rom_count, n.reps_rom_count);
            let working_delta = counter_delta(&mut self.last_set_count, n.reps_set_count);
            // Working-rep increments are counted directly; ROM increments
            // only fill the warmup quota.
            if working_delta > 0 {
                self.counts.working_reps += working_delta;
            } else if warmup_delta > 0 && self.counts.warmup_reps < self.targets.warmup {
                let room = self.targets.warmup - self.counts.warmup_reps;
                self.counts.warmup_reps += warmup_delta.min(room);
            }
            self.counts.total_reps = self.counts.warmup_reps + self.counts.working_reps;
        }
        tracing::trace!(
            warmup = self.counts.warmup_reps,
            working = self.counts.working_reps,
            legacy = n.legacy_format,
            "rep notification processed"
        );
    }

    /// Fill the warmup quota first, then count working reps.
    fn add_reps(&mut self, delta: u32) {
        let mut remaining = delta;
        if self.counts.warmup_reps < self.targets.warmup {
            let room = self.targets.warmup - self.counts.warmup_reps;
            let take = remaining.min(room);
            self.counts.warmup_reps += take;
            remaining -= take;
        }
        self.counts.working_reps += remaining;
        self.counts.total_reps = self.counts.warmup_reps + self.counts.working_reps;
    }

    /// Unconditionally widen the ROM range from raw telemetry, independent of
    /// rep events. Required for Just Lift/AMRAP where no rep events exist to
    /// establish a range, and for pre-workout idle calibration.
    pub fn update_position_ranges(&mut self, pos_a: f32, pos_b: f32) {
        self.ranges.a.fold(pos_a);
        self.ranges.b.fold(pos_b);
    }

    /// Track lifting-phase direction from the larger of the two positions.
    pub fn update_phase(&mut self, pos_a: f32, pos_b: f32) {
        let pos = pos_a.max(pos_b);
        if let Some(prev) = self.last_phase_pos {
            if pos > prev + PHASE_EPSILON {
                self.phase = LiftPhase::Raising;
            } else if pos < prev - PHASE_EPSILON {
                self.phase = LiftPhase::Lowering;
            }
        }
        self.last_phase_pos = Some(pos);
    }

    /// True if either cable has observed a range wider than `threshold`.
    pub fn has_meaningful_range(&self, threshold: f32) -> bool {
        self.ranges.a.is_meaningful(threshold) || self.ranges.b.is_meaningful(threshold)
    }

    /// True if either cable with a meaningful range currently sits in the
    /// bottom `fraction` of that range.
    pub fn is_in_danger_zone(
        &self,
        pos_a: f32,
        pos_b: f32,
        fraction: f32,
        meaningful: f32,
    ) -> bool {
        self.ranges.a.in_danger_zone(pos_a, fraction, meaningful)
            || self.ranges.b.in_danger_zone(pos_b, fraction, meaningful)
    }

    /// True once the working-rep target is reached. AMRAP and Just Lift sets
    /// have no fixed target and never stop on count. With `stop_at_top` the
    /// set ends at the peak of the final rep, before its eccentric finishes.
    pub fn should_stop_workout(&self) -> bool {
        if self.targets.amrap || self.targets.just_lift || self.targets.working == 0 {
            return false;
        }
        if self.counts.working_reps >= self.targets.working {
            return true;
        }
        self.targets.stop_at_top
            && self.counts.working_reps + 1 == self.targets.working
            && self.tops_seen > self.counts.total_reps
    }

    /// Anchor a zero-reference for UI display, independent of the range.
    pub fn set_initial_baseline(&mut self, pos_a: f32, pos_b: f32) {
        if pos_a != 0.0 {
            self.baseline_a = Some(pos_a);
        }
        if pos_b != 0.0 {
            self.baseline_b = Some(pos_b);
        }
    }

    pub fn baseline(&self) -> (Option<f32>, Option<f32>) {
        (self.baseline_a, self.baseline_b)
    }

    /// Full reset at a set boundary: counts, ranges, phase, baselines.
    pub fn reset(&mut self) {
        let targets = self.targets;
        *self = Self::default();
        self.targets = targets;
    }

    /// Zero the counts but keep the calibrated ranges; used when resuming
    /// Just Lift so ROM calibration survives an auto-restart.
    pub fn reset_counts_only(&mut self) {
        self.counts = RepCount::default();
        self.last_rom_count = None;
        self.last_set_count = None;
        self.last_top_counter = None;
        self.tops_seen = 0;
    }
}

/// Positive increment of a monotonic firmware counter. A first observation or
/// a counter reset (value went backwards) re-baselines and yields 0.
fn counter_delta(last: &mut Option<u32>, current: u32) -> u32 {
    let delta = match *last {
        Some(prev) if current >= prev => current - prev,
        Some(_) => 0,
        // Firmware counters restart from zero at each set, so the first
        // observed value is itself the accumulated delta.
        None => current,
    };
    *last = Some(current);
    delta
}
