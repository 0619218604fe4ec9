#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Session control engine for a connected resistance-training machine
//! (transport-agnostic).
//!
//! This crate turns a live stream of cable telemetry and firmware rep
//! notifications into rep counts, range-of-motion calibration, auto-stop and
//! auto-start decisions, and a workout/routine progression state machine.
//! All machine and storage interactions go through `liftctl_traits`.
//!
//! ## Architecture
//!
//! - **Rep counting / ROM**: warmup/working counts plus per-cable min/max
//!   ranges (`rep_counter` module)
//! - **Auto-stop**: velocity-stall hysteresis and position-release detectors
//!   with a startup grace window (`auto_stop`)
//! - **Auto-start**: handle-grab countdown with late-cancellation guards
//!   (`auto_start`)
//! - **Session**: the Idle → Countdown → Active → Resting/SetSummary →
//!   Completed state machine and its one-shot stop/completion guards
//!   (`session`)
//! - **Progression**: linear and superset next/previous step computation
//!   (`routine`) and per-set parameter resolution (`params`)
//! - **Feed**: background telemetry thread with a connection watchdog
//!   (`feed`)
//!
//! All timing goes through `liftctl_traits::Clock`; decision code never reads
//! the wall clock directly.

pub mod auto_start;
pub mod auto_stop;
pub mod builder;
pub mod error;
pub mod feed;
pub mod mocks;
pub mod params;
pub mod rep_counter;
pub mod routine;
pub mod runner;
pub mod session;
pub mod summary;
pub mod timers;

pub use auto_start::{AutoStartEngine, AutoStartEvent};
pub use auto_stop::{AutoStopEngine, StopCountdownUi, StopReason};
pub use builder::SessionEngineBuilder;
pub use error::{BuildError, EngineError, Result};
pub use feed::TelemetryFeed;
pub use params::{WorkoutMode, WorkoutParameters, resolve_set_parameters};
pub use rep_counter::{LiftPhase, RepCount, RepCounter, RepRanges};
pub use routine::{StepRef, next_step, previous_step};
pub use session::{SessionEngine, WorkoutState};

// Shared value types from the seam crate, re-exported for convenience.
pub use liftctl_traits::{
    ConnectionState, HandleState, MetricSample, RepNotification, Routine, RoutineExercise,
    SessionRecord, TelemetryEvent,
};
