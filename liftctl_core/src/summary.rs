//! Streaming set-summary statistics.
//!
//! Samples are folded in as they arrive so the summary is O(1) in memory
//! and ready the instant a set ends.

use liftctl_traits::{MetricSample, SessionRecord};

/// Velocity below this magnitude is treated as holding, not moving, and
/// attributed to neither phase.
const PHASE_VELOCITY_EPSILON: f32 = 0.5;

/// Gravity in m/s^2, for volume-to-work conversion.
const GRAVITY: f32 = 9.81;
/// Joules per kilocalorie.
const JOULES_PER_KCAL: f32 = 4184.0;
/// Rough human efficiency for resistance work; lifted work / metabolic cost.
const METABOLIC_EFFICIENCY: f32 = 0.22;
/// Position units per metre of cable travel.
const UNITS_PER_METRE: f32 = 100.0;

#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    started_at_ms: u64,
    last_sample_ms: u64,
    peak_concentric: f32,
    peak_eccentric: f32,
    sum_concentric: f64,
    concentric_samples: u64,
    sum_eccentric: f64,
    eccentric_samples: u64,
    rom_span: f32,
}

impl SummaryAccumulator {
    pub fn start(now_ms: u64) -> Self {
        Self {
            started_at_ms: now_ms,
            last_sample_ms: now_ms,
            ..Self::default()
        }
    }

    pub fn ingest(&mut self, sample: &MetricSample) {
        self.last_sample_ms = self.last_sample_ms.max(sample.timestamp_ms);
        let load = sample.total_load;
        if !load.is_finite() || load <= 0.0 {
            return;
        }
        // Attribute the sample to the phase the faster cable is in.
        let velocity = if sample.velocity_a.abs() >= sample.velocity_b.abs() {
            sample.velocity_a
        } else {
            sample.velocity_b
        };
        if velocity > PHASE_VELOCITY_EPSILON {
            self.peak_concentric = self.peak_concentric.max(load);
            self.sum_concentric += f64::from(load);
            self.concentric_samples += 1;
        } else if velocity < -PHASE_VELOCITY_EPSILON {
            self.peak_eccentric = self.peak_eccentric.max(load);
            self.sum_eccentric += f64::from(load);
            self.eccentric_samples += 1;
        }
    }

    pub fn set_rom_span(&mut self, span: f32) {
        self.rom_span = span.max(0.0);
    }

    fn avg(sum: f64, count: u64) -> f32 {
        if count == 0 {
            0.0
        } else {
            (sum / count as f64) as f32
        }
    }

    /// Fold the accumulated statistics into a persistent record.
    pub fn finish(
        &self,
        exercise_name: &str,
        weight_per_cable_kg: f32,
        working_reps: u32,
        warmup_reps: u32,
        now_ms: u64,
    ) -> SessionRecord {
        let total_reps = working_reps + warmup_reps;
        // Both cables carry the configured weight.
        let total_volume_kg = weight_per_cable_kg * 2.0 * total_reps as f32;
        let rom_metres = self.rom_span / UNITS_PER_METRE;
        let work_joules = total_volume_kg * GRAVITY * rom_metres;
        let estimated_kcal = work_joules / JOULES_PER_KCAL / METABOLIC_EFFICIENCY;

        SessionRecord {
            exercise: exercise_name.to_owned(),
            weight_per_cable_kg,
            working_reps,
            warmup_reps,
            duration_ms: now_ms.saturating_sub(self.started_at_ms),
            peak_force_concentric: self.peak_concentric,
            avg_force_concentric: Self::avg(self.sum_concentric, self.concentric_samples),
            peak_force_eccentric: self.peak_eccentric,
            avg_force_eccentric: Self::avg(self.sum_eccentric, self.eccentric_samples),
            estimated_kcal,
            total_volume_kg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: u64, vel: f32, load: f32) -> MetricSample {
        MetricSample {
            position_a: 50.0,
            position_b: 50.0,
            velocity_a: vel,
            velocity_b: 0.0,
            load_a: load / 2.0,
            load_b: load / 2.0,
            total_load: load,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn phases_split_by_velocity_sign() {
        let mut acc = SummaryAccumulator::start(0);
        acc.ingest(&sample(100, 12.0, 40.0));
        acc.ingest(&sample(200, 14.0, 44.0));
        acc.ingest(&sample(300, -11.0, 50.0));
        // holding: attributed to neither phase
        acc.ingest(&sample(400, 0.1, 99.0));
        let rec = acc.finish("row", 20.0, 10, 0, 1_000);
        assert_eq!(rec.peak_force_concentric, 44.0);
        assert_eq!(rec.avg_force_concentric, 42.0);
        assert_eq!(rec.peak_force_eccentric, 50.0);
        assert_eq!(rec.avg_force_eccentric, 50.0);
        assert_eq!(rec.duration_ms, 1_000);
    }

    #[test]
    fn volume_counts_both_cables_and_all_reps() {
        let acc = SummaryAccumulator::start(0);
        let rec = acc.finish("press", 25.0, 8, 2, 60_000);
        assert_eq!(rec.total_volume_kg, 25.0 * 2.0 * 10.0);
        assert_eq!(rec.working_reps, 8);
        assert_eq!(rec.warmup_reps, 2);
    }

    #[test]
    fn kcal_scales_with_rom() {
        let mut short = SummaryAccumulator::start(0);
        short.set_rom_span(40.0);
        let mut long = SummaryAccumulator::start(0);
        long.set_rom_span(80.0);
        let a = short.finish("x", 20.0, 10, 0, 1).estimated_kcal;
        let b = long.finish("x", 20.0, 10, 0, 1).estimated_kcal;
        assert!(b > a);
        assert!((b / a - 2.0).abs() < 1e-4);
    }

    #[test]
    fn nonpositive_load_ignored() {
        let mut acc = SummaryAccumulator::start(0);
        acc.ingest(&sample(100, 12.0, 0.0));
        acc.ingest(&sample(200, 12.0, -5.0));
        let rec = acc.finish("x", 20.0, 1, 0, 300);
        assert_eq!(rec.peak_force_concentric, 0.0);
        assert_eq!(rec.avg_force_concentric, 0.0);
    }
}
