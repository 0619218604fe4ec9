//! Property tests over the counting and detection invariants.

use liftctl_config::AutoStopCfg;
use liftctl_core::auto_stop::AutoStopEngine;
use liftctl_core::rep_counter::RepCounter;
use liftctl_core::{MetricSample, RepNotification, StopReason};
use proptest::prelude::*;

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

proptest! {
    /// The recorded range always brackets every non-zero finite position it
    /// has seen, and zero positions never contribute.
    #[test]
    fn range_brackets_all_nonzero_positions(positions in prop::collection::vec(0.0f32..500.0, 1..200)) {
        let mut rc = RepCounter::new();
        for &p in &positions {
            rc.update_position_ranges(p, 0.0);
        }
        let nonzero: Vec<f32> = positions.iter().copied().filter(|p| *p != 0.0).collect();
        let r = rc.ranges().a;
        match (r.min, r.max) {
            (Some(lo), Some(hi)) => {
                prop_assert!(lo <= hi);
                for p in &nonzero {
                    prop_assert!(lo <= *p && *p <= hi);
                }
                prop_assert!(nonzero.contains(&lo));
                prop_assert!(nonzero.contains(&hi));
            }
            _ => prop_assert!(nonzero.is_empty()),
        }
        prop_assert_eq!(r.in_danger_zone(0.0, 0.05, 50.0), false);
    }

    /// Total reps never decrease, whatever mix of formats and counter values
    /// the firmware produces, and totals always reconcile.
    #[test]
    fn rep_totals_are_monotonic(
        notifications in prop::collection::vec((0u32..50, 0u32..50, 0u32..50, any::<bool>()), 1..100)
    ) {
        let mut rc = RepCounter::new();
        rc.configure(2, 10, false, false, false);
        let mut last_total = 0;
        for (rom, set, top, legacy) in notifications {
            let n = RepNotification {
                reps_rom_count: rom,
                reps_set_count: set,
                top_counter: top,
                complete_counter: top,
                legacy_format: legacy,
            };
            rc.process(&n, 10.0, 10.0);
            let c = rc.counts();
            prop_assert!(c.total_reps >= last_total);
            prop_assert_eq!(c.total_reps, c.warmup_reps + c.working_reps);
            prop_assert!(c.warmup_reps <= 2);
            last_total = c.total_reps;
        }
    }

    /// Once the stall timer is armed, velocity oscillation inside the
    /// hysteresis band cannot silence it: the stop still fires on schedule.
    #[test]
    fn band_oscillation_never_clears_an_armed_stall(
        band_vels in prop::collection::vec(2.6f32..9.9, 1..60)
    ) {
        let cfg = AutoStopCfg::default();
        let duration = cfg.stall_duration_ms;
        let mut eng = AutoStopEngine::new(cfg);
        let mut rc = RepCounter::new();
        rc.update_position_ranges(5.0, 5.0);
        rc.update_position_ranges(105.0, 105.0);
        eng.begin_set(0, false);

        // Arm with a definite stall, then oscillate inside the band.
        prop_assert_eq!(eng.evaluate(&sample(50.0, 1.0), &rc, true, 0), None);
        let mut t = 100;
        let mut fired = None;
        for v in band_vels {
            fired = eng.evaluate(&sample(50.0, v), &rc, true, t);
            if fired.is_some() {
                break;
            }
            t += 200;
        }
        if fired.is_none() {
            fired = eng.evaluate(&sample(50.0, 3.0), &rc, true, duration + 1);
        }
        prop_assert_eq!(fired, Some(StopReason::Stall));
    }
}
