//! Session assembly and execution against the scripted link.
//!
//! The real BLE transport lives outside this workspace, so `run` and
//! `just-lift` replay a synthetic telemetry timeline derived from the
//! routine: grab, auto-start countdown, reps, and (for open-ended sets) a
//! release long enough to trip the position-release detector. Timings come
//! from the same config the engine runs with, so the script and the decision
//! engine always agree on countdown, rest, and grace windows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use liftctl_config::Config;
use liftctl_core::mocks::{MemorySessionStore, StaticPreferences};
use liftctl_core::runner::run_session;
use liftctl_core::{SessionEngine, StepRef, TelemetryFeed, WorkoutState, next_step};
use liftctl_link::script::ScriptBuilder;
use liftctl_link::{RecordingLink, ScriptedMachine};
use liftctl_traits::clock::MonotonicClock;
use liftctl_traits::{HandleState, Routine, SessionRecord, TelemetryEvent};

/// Simulation pacing knobs from the command line.
pub struct SimKnobs {
    /// Duration of one simulated rep (ms).
    pub rep_ms: u64,
    /// Reps replayed for AMRAP sets before the handles go down.
    pub amrap_reps: Option<u32>,
}

/// How the script plays one set out.
enum SetPlan {
    /// Fixed rep target; the engine stops the set itself at quota.
    Target(u32),
    /// Open-ended; lift `n` reps then release and let the detector stop it.
    OpenEnded(u32),
    /// Timed set; keep moving until the duration timer fires.
    Timed(u64),
}

fn plan_for(routine: &Routine, step: StepRef, knobs: &SimKnobs) -> SetPlan {
    let ex = &routine.exercises[step.exercise];
    if let Some(secs) = ex.duration_secs {
        return SetPlan::Timed(u64::from(secs) * 1_000);
    }
    let open_reps = knobs.amrap_reps.unwrap_or(ex.default_reps.max(1));
    let is_last = step.set + 1 == ex.set_count();
    match ex.set_reps.get(step.set) {
        Some(Some(n)) => SetPlan::Target(*n),
        Some(None) => SetPlan::OpenEnded(open_reps),
        None if ex.amrap_last_set && is_last => SetPlan::OpenEnded(open_reps),
        None => SetPlan::Target(ex.default_reps.max(1)),
    }
}

/// Build the full telemetry timeline for a routine run.
///
/// Margins are deliberately generous (700 ms after every timer boundary) so
/// scheduling jitter between the replay thread and the engine's own clock
/// never lands an event in the wrong state.
pub fn script_for_routine(
    routine: &Routine,
    cfg: &Config,
    knobs: &SimKnobs,
) -> Vec<(u64, TelemetryEvent)> {
    const MARGIN_MS: u64 = 700;
    let countdown_ms = u64::from(cfg.auto_start.countdown_secs) * 1_000;
    let rest_ms = u64::from(cfg.session.rest_secs) * 1_000;
    let release_tail_ms =
        cfg.auto_stop.startup_grace_ms + cfg.auto_stop.release_duration_ms + 1_000;

    let mut b = ScriptBuilder::new(20).connected().pause(200);
    let mut step = Some(StepRef::new(0, 0));
    let mut first = true;
    while let Some(s) = step {
        let ex = &routine.exercises[s.exercise];
        if !first {
            b = b.pause(rest_ms + MARGIN_MS);
        }
        first = false;

        let weight = ex
            .set_weights_per_cable_kg
            .get(s.set)
            .copied()
            .unwrap_or(ex.default_weight_kg);
        b = b
            .handle(HandleState::Grabbed)
            .pause(countdown_ms + MARGIN_MS);

        match plan_for(routine, s, knobs) {
            SetPlan::Target(n) => {
                b = b.reps(n, 80.0, weight, knobs.rep_ms);
            }
            SetPlan::OpenEnded(n) => {
                b = b
                    .reps(n, 80.0, weight, knobs.rep_ms)
                    .handle(HandleState::Released)
                    .at_rest(release_tail_ms);
            }
            SetPlan::Timed(dur_ms) => {
                let n = (dur_ms / knobs.rep_ms.max(1)) as u32 + 2;
                b = b.reps(n, 80.0, weight, knobs.rep_ms);
            }
        }
        step = next_step(routine, s);
    }
    b.build()
}

/// Timeline for a single open-ended just-lift block.
pub fn script_for_just_lift(cfg: &Config, weight: f32, reps: u32, rep_ms: u64) -> Vec<(u64, TelemetryEvent)> {
    let countdown_ms = u64::from(cfg.auto_start.countdown_secs) * 1_000;
    let release_tail_ms =
        cfg.auto_stop.startup_grace_ms + cfg.auto_stop.release_duration_ms + 1_000;
    ScriptBuilder::new(20)
        .connected()
        .pause(200)
        .handle(HandleState::Grabbed)
        .pause(countdown_ms + 700)
        .reps(reps.max(1), 80.0, weight, rep_ms)
        .handle(HandleState::Released)
        .at_rest(release_tail_ms)
        .build()
}

/// Assemble an engine over the scripted timeline and drive it to the end.
/// Returns the final state and every set record the run saved.
pub fn run_scripted(
    cfg: Config,
    events: Vec<(u64, TelemetryEvent)>,
    routine: Option<Routine>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<(WorkoutState, Vec<SessionRecord>)> {
    let feed_cfg = cfg.feed;
    // The engine takes the countdown length from the preference seam; with
    // no interactive user here, the config file value stands in for it.
    let prefs = StaticPreferences {
        countdown_secs: cfg.auto_start.countdown_secs,
        ..StaticPreferences::default()
    };
    let store = MemorySessionStore::new();
    let state = store.state();

    let mut engine = SessionEngine::builder()
        .with_link(RecordingLink::new())
        .with_store(store)
        .with_config(cfg)
        .with_preferences(prefs)
        .build()
        .wrap_err("assembling session engine")?;

    match routine {
        Some(r) => engine.load_routine(r).wrap_err("loading routine")?,
        None => engine.begin_just_lift().wrap_err("entering just-lift")?,
    }

    let feed = TelemetryFeed::spawn(ScriptedMachine::new(events), feed_cfg, MonotonicClock::new());
    let final_state = run_session(&mut engine, &feed, &feed_cfg, || {
        shutdown.load(Ordering::Relaxed)
    })?;

    let records = state
        .lock()
        .map(|s| s.sessions.clone())
        .unwrap_or_default();
    Ok((final_state, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftctl_traits::RoutineExercise;

    fn one_exercise(set_reps: Vec<Option<u32>>) -> Routine {
        Routine {
            name: "r".into(),
            exercises: vec![RoutineExercise {
                name: "press".into(),
                set_reps,
                set_weights_per_cable_kg: vec![],
                default_reps: 8,
                default_weight_kg: 15.0,
                superset_id: None,
                order_in_superset: 0,
                amrap_last_set: false,
                stall_detection_enabled: true,
                duration_secs: None,
            }],
        }
    }

    #[test]
    fn script_has_one_grab_per_set() {
        let routine = one_exercise(vec![Some(5), Some(5), None]);
        let knobs = SimKnobs {
            rep_ms: 400,
            amrap_reps: Some(3),
        };
        let events = script_for_routine(&routine, &Config::default(), &knobs);
        let grabs = events
            .iter()
            .filter(|(_, e)| matches!(e, TelemetryEvent::Handle(HandleState::Grabbed)))
            .count();
        assert_eq!(grabs, 3);
        // The AMRAP set ends with a release.
        let releases = events
            .iter()
            .filter(|(_, e)| matches!(e, TelemetryEvent::Handle(HandleState::Released)))
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn target_sets_emit_exactly_their_quota() {
        let routine = one_exercise(vec![Some(4)]);
        let knobs = SimKnobs {
            rep_ms: 400,
            amrap_reps: None,
        };
        let events = script_for_routine(&routine, &Config::default(), &knobs);
        let reps = events
            .iter()
            .filter(|(_, e)| matches!(e, TelemetryEvent::Rep(_)))
            .count();
        assert_eq!(reps, 4);
    }
}
