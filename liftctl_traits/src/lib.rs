//! Collaborator seams for the lift-session control engine.
//!
//! Everything the core engine talks to (the machine link, telemetry source,
//! persistence, preferences, gamification) is a trait defined here, so the
//! engine stays transport- and storage-agnostic. The plain data types those
//! traits exchange live in [`frame`].

pub mod clock;
pub mod frame;

pub use clock::{Clock, MonotonicClock};
pub use frame::{
    ConnectionState, HandleState, MetricSample, PrType, RepNotification, Routine, RoutineExercise,
    SessionCue, SessionRecord, SummaryCountdown, TelemetryEvent, WeightUnit,
};

use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Inbound side of the machine connection: one multiplexed event stream.
///
/// `next_event` blocks until the machine produces the next event or the
/// timeout elapses. Implementations own whatever transport (BLE, playback
/// script) sits underneath.
pub trait TelemetrySource {
    fn next_event(&mut self, timeout: Duration) -> Result<TelemetryEvent, BoxError>;
}

/// Outbound side of the machine connection.
///
/// Commands are opaque frames built elsewhere; the higher-level helpers map
/// to the machine's well-known control frames. All calls are fire-and-forget
/// from the engine's perspective; the engine sequences them with small delays
/// to respect the device's processing rate.
pub trait MachineLink {
    fn send_command(&mut self, frame: &[u8]) -> Result<(), BoxError>;
    fn stop_workout(&mut self) -> Result<(), BoxError>;
    fn start_active_workout_polling(&mut self) -> Result<(), BoxError>;
    fn restart_monitor_polling(&mut self) -> Result<(), BoxError>;
    fn enable_handle_detection(&mut self, enabled: bool) -> Result<(), BoxError>;
    fn enable_just_lift_waiting_mode(&mut self) -> Result<(), BoxError>;
}

/// Builds the machine's opaque command frames. The byte layout is entirely
/// this collaborator's concern; the engine only sequences the frames.
pub trait PacketFactory {
    /// Pre-clear frame sent before configuring a new set. Losing it is
    /// tolerated by the machine.
    fn init_frame(&self) -> Vec<u8>;
    fn config_frame(
        &self,
        weight_per_cable_kg: f32,
        target_reps: Option<u32>,
        eccentric_pct: u32,
        echo_level: u8,
    ) -> Vec<u8>;
    fn start_frame(&self) -> Vec<u8>;
}

/// Persistence for completed sets and their raw metric traces.
pub trait SessionStore {
    /// Persist one completed set; returns the stored session id.
    fn save_session(&mut self, record: &SessionRecord) -> Result<u64, BoxError>;
    fn save_metrics(&mut self, session_id: u64, metrics: &[MetricSample]) -> Result<(), BoxError>;
}

/// Persistence for workout routines.
pub trait RoutineStore {
    fn all_routines(&mut self) -> Result<Vec<Routine>, BoxError>;
    fn save_routine(&mut self, routine: &Routine) -> Result<(), BoxError>;
    fn delete_routine(&mut self, name: &str) -> Result<(), BoxError>;
}

/// Personal-record and gamification hooks, evaluated after each saved set.
/// Failures here are non-critical; callers log and continue.
pub trait PrTracker {
    fn update_prs_if_better(&mut self, record: &SessionRecord) -> Result<Vec<PrType>, BoxError>;
    fn update_stats(&mut self) -> Result<(), BoxError>;
    fn check_and_award_badges(&mut self) -> Result<Vec<String>, BoxError>;
}

/// User-configurable settings, re-read at point of use (never cached across
/// decision passes).
pub trait Preferences {
    fn stall_detection_enabled(&self) -> bool;
    fn auto_start_countdown_secs(&self) -> u32;
    fn summary_countdown(&self) -> SummaryCountdown;
    fn weight_unit(&self) -> WeightUnit;
}

/// Haptic/sound/visual cue sink. Best effort; must not fail.
pub trait Notifier {
    fn cue(&mut self, cue: SessionCue);
}
