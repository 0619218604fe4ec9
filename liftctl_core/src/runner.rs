//! Session orchestration loop.
//!
//! Pulls events off a [`TelemetryFeed`], pushes them through a
//! [`SessionEngine`], and ticks the engine's timers on every iteration. The
//! loop ends when the routine completes, the link dies, or the caller's
//! stop check fires (after the running set has been stopped and saved).

use std::time::Duration;

use crate::error::Result;
use crate::feed::TelemetryFeed;
use crate::session::{SessionEngine, WorkoutState};
use liftctl_config::FeedCfg;
use liftctl_traits::clock::{Clock, MonotonicClock};
use liftctl_traits::{ConnectionState, TelemetryEvent};

/// Whether an event may be silently dropped while the set is paused.
/// Control-flow events (handle, connection, deload) always go through.
#[inline]
fn droppable_while_paused(ev: &TelemetryEvent) -> bool {
    matches!(ev, TelemetryEvent::Sample(_) | TelemetryEvent::Rep(_))
}

#[inline]
fn set_running(state: WorkoutState) -> bool {
    matches!(state, WorkoutState::Active | WorkoutState::Paused)
}

/// Drive the engine until the session ends. Returns the final state.
///
/// `stop_check` is polled every iteration (wire it to Ctrl-C); when it turns
/// true the running set is stopped and saved before the loop exits, so an
/// interrupt never loses a set.
pub fn run_session<F>(
    engine: &mut SessionEngine,
    feed: &TelemetryFeed,
    cfg: &FeedCfg,
    mut stop_check: F,
) -> Result<WorkoutState>
where
    F: FnMut() -> bool,
{
    let clock = MonotonicClock::new();
    let epoch = feed.epoch();
    let read_timeout = Duration::from_millis(cfg.read_timeout_ms);
    let mut stop_sent = false;

    loop {
        if !stop_sent && stop_check() {
            stop_sent = true;
            if set_running(engine.state()) {
                tracing::info!("stop requested; closing out the running set");
                engine.request_user_stop()?;
            } else {
                return Ok(engine.state());
            }
        }

        match feed.recv(read_timeout) {
            Some(ev) => {
                if engine.state() == WorkoutState::Paused && droppable_while_paused(&ev) {
                    // Paused sets ignore telemetry; don't let it queue up.
                } else {
                    engine.handle_event(ev)?;
                }
                if ev == TelemetryEvent::Connection(ConnectionState::Disconnected) {
                    tracing::warn!("link closed; ending session loop");
                    return Ok(engine.state());
                }
            }
            None => {
                let now = clock.ms_since(epoch);
                if feed.is_stale(now) && set_running(engine.state()) {
                    tracing::warn!(
                        silent_ms = feed.silent_for(now),
                        "telemetry watchdog tripped mid-set"
                    );
                    engine.handle_event(TelemetryEvent::Connection(
                        ConnectionState::Disconnected,
                    ))?;
                    return Ok(engine.state());
                }
            }
        }

        engine.tick()?;
        match engine.state() {
            WorkoutState::Completed => return Ok(WorkoutState::Completed),
            state if stop_sent && !set_running(state) => return Ok(state),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MemorySessionStore, StaticPreferences};
    use liftctl_link::{RecordingLink, ScriptedMachine};
    use liftctl_traits::{
        MetricSample, RepNotification, Routine, RoutineExercise, SummaryCountdown,
    };

    fn routine(sets: usize, reps: u32) -> Routine {
        Routine {
            name: "r".into(),
            exercises: vec![RoutineExercise {
                name: "row".into(),
                set_reps: vec![Some(reps); sets],
                set_weights_per_cable_kg: vec![20.0; sets],
                default_reps: reps,
                default_weight_kg: 20.0,
                superset_id: None,
                order_in_superset: 0,
                amrap_last_set: false,
                stall_detection_enabled: true,
                duration_secs: None,
            }],
        }
    }

    fn sample(pos: f32, vel: f32) -> TelemetryEvent {
        TelemetryEvent::Sample(MetricSample {
            position_a: pos,
            position_b: pos,
            velocity_a: vel,
            velocity_b: vel,
            load_a: 10.0,
            load_b: 10.0,
            total_load: 20.0,
            timestamp_ms: 0,
        })
    }

    fn rep(i: u32) -> TelemetryEvent {
        TelemetryEvent::Rep(RepNotification {
            reps_rom_count: i,
            reps_set_count: i,
            top_counter: i,
            complete_counter: i,
            legacy_format: false,
        })
    }

    fn engine(store: &MemorySessionStore) -> SessionEngine {
        SessionEngine::builder()
            .with_link(RecordingLink::new())
            .with_store(store.clone())
            .with_preferences(StaticPreferences {
                summary: SummaryCountdown::Skip,
                ..StaticPreferences::default()
            })
            .build()
            .expect("engine")
    }

    #[test]
    fn scripted_set_runs_to_completion() {
        let store = MemorySessionStore::new();
        let mut engine = engine(&store);
        engine.load_routine(routine(1, 2)).expect("routine");
        engine.start_workout().expect("start");

        let source = ScriptedMachine::immediate(vec![
            (0, sample(50.0, 20.0)),
            (0, rep(1)),
            (0, rep(2)),
        ]);
        let feed = TelemetryFeed::spawn(source, FeedCfg::default(), MonotonicClock::new());
        let state =
            run_session(&mut engine, &feed, &FeedCfg::default(), || false).expect("run");
        assert_eq!(state, WorkoutState::Completed);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn stop_check_saves_the_running_set_before_exit() {
        let store = MemorySessionStore::new();
        let mut engine = engine(&store);
        engine.load_routine(routine(1, 10)).expect("routine");
        engine.start_workout().expect("start");

        let source = ScriptedMachine::immediate(vec![(0, sample(50.0, 20.0)), (0, rep(1))]);
        let feed = TelemetryFeed::spawn(source, FeedCfg::default(), MonotonicClock::new());
        let state =
            run_session(&mut engine, &feed, &FeedCfg::default(), || true).expect("run");
        assert_eq!(state, WorkoutState::Completed);
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.state().lock().unwrap().sessions[0].working_reps, 0);
    }

    #[test]
    fn disconnect_ends_the_loop() {
        let store = MemorySessionStore::new();
        let mut engine = engine(&store);
        // Idle engine, script immediately exhausts into a disconnect.
        let source = ScriptedMachine::immediate(vec![]);
        let feed = TelemetryFeed::spawn(source, FeedCfg::default(), MonotonicClock::new());
        let state =
            run_session(&mut engine, &feed, &FeedCfg::default(), || false).expect("run");
        assert_eq!(state, WorkoutState::Idle);
        assert_eq!(store.session_count(), 0);
    }
}
