#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and routine-file parsing for the lift-session engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every threshold the decision engine uses (hysteresis bounds, danger-zone
//!   fraction, grace window, countdown lengths) lives here rather than as a
//!   literal in the core, since the values are empirically tuned per hardware
//!   revision.
//! - `RoutineFile` is the on-disk routine schema, converted into the shared
//!   `liftctl_traits::Routine` type.

pub mod store;

pub use store::FsRoutineStore;

use liftctl_traits::{Routine, RoutineExercise};
use serde::{Deserialize, Serialize};

/// Velocity-stall and position-release thresholds.
///
/// Distances are in machine distance units, velocities in units per tick.
/// Defaults match the shipped hardware revision.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AutoStopCfg {
    /// Below this speed the cables are definitely stalled.
    pub stall_low: f32,
    /// Above this speed the cables are definitely moving. Between the two
    /// bounds the previous stalled/moving determination is held.
    pub stall_high: f32,
    /// The stall timer only arms above this position (or with a calibrated
    /// range, or with handles fully at rest).
    pub stall_min_position: f32,
    /// Below this position the handles count as completely at rest.
    pub handle_rest_threshold: f32,
    /// Sustained stall duration before a stop is requested (ms).
    pub stall_duration_ms: u64,
    /// Sustained rest/danger-zone duration before a stop is requested (ms).
    pub release_duration_ms: u64,
    /// Detector suppression window after an AMRAP/Just-Lift set goes active (ms).
    pub startup_grace_ms: u64,
    /// Bottom fraction of a calibrated range treated as the danger zone.
    pub danger_zone_fraction: f32,
    /// A handle within this distance of its recorded minimum counts as released.
    pub release_proximity: f32,
    /// A cable range wider than this is a meaningful (calibrated) range.
    pub meaningful_range: f32,
}

impl Default for AutoStopCfg {
    fn default() -> Self {
        Self {
            stall_low: 2.5,
            stall_high: 10.0,
            stall_min_position: 10.0,
            handle_rest_threshold: 2.5,
            stall_duration_ms: 5_000,
            release_duration_ms: 2_500,
            startup_grace_ms: 8_000,
            danger_zone_fraction: 0.05,
            release_proximity: 10.0,
            meaningful_range: 50.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AutoStartCfg {
    /// Seconds counted down after a grab before the set auto-starts.
    pub countdown_secs: u32,
    /// Re-enabling handle detection within this window is a no-op.
    pub enable_debounce_ms: u64,
}

impl Default for AutoStartCfg {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            enable_debounce_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SessionCfg {
    /// Default rest between sets (seconds).
    pub rest_secs: u32,
    /// Delay inserted between consecutive machine commands (ms); the device
    /// drops frames sent faster than it can process them.
    pub command_gap_ms: u64,
    /// Seconds the set summary stays up before auto-advancing; 0 skips the
    /// summary entirely.
    pub summary_secs: u32,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            rest_secs: 60,
            command_gap_ms: 100,
            summary_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FeedCfg {
    /// Max wait per telemetry read (ms).
    pub read_timeout_ms: u64,
    /// Connection watchdog: no event for this long means the link is stale.
    pub stale_after_ms: u64,
}

impl Default for FeedCfg {
    fn default() -> Self {
        Self {
            read_timeout_ms: 150,
            stale_after_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub auto_stop: AutoStopCfg,
    pub auto_start: AutoStartCfg,
    pub session: SessionCfg,
    pub feed: FeedCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        let a = &self.auto_stop;
        if !a.stall_low.is_finite() || a.stall_low < 0.0 {
            eyre::bail!("stall_low must be finite and >= 0");
        }
        if !a.stall_high.is_finite() || a.stall_high <= a.stall_low {
            eyre::bail!("stall_high must be > stall_low");
        }
        if a.stall_duration_ms == 0 {
            eyre::bail!("stall_duration_ms must be > 0");
        }
        if a.release_duration_ms == 0 {
            eyre::bail!("release_duration_ms must be > 0");
        }
        if !(0.0..1.0).contains(&a.danger_zone_fraction) {
            eyre::bail!("danger_zone_fraction must be in [0, 1)");
        }
        if !a.meaningful_range.is_finite() || a.meaningful_range <= 0.0 {
            eyre::bail!("meaningful_range must be > 0");
        }
        if !a.handle_rest_threshold.is_finite() || a.handle_rest_threshold < 0.0 {
            eyre::bail!("handle_rest_threshold must be >= 0");
        }
        if self.auto_start.countdown_secs == 0 {
            eyre::bail!("countdown_secs must be > 0");
        }
        if self.feed.read_timeout_ms == 0 {
            eyre::bail!("read_timeout_ms must be >= 1");
        }
        if self.feed.stale_after_ms <= self.feed.read_timeout_ms {
            eyre::bail!("stale_after_ms must exceed read_timeout_ms");
        }
        Ok(())
    }
}

/// Routine file schema.
///
/// Example:
/// ```toml
/// name = "push day"
///
/// [[exercise]]
/// name = "bench press"
/// reps = [10, 10, 0]        # 0 marks that set AMRAP
/// weights_kg = [20.0, 22.5, 22.5]
/// default_reps = 10
/// default_weight_kg = 20.0
/// ```
#[derive(Debug, Deserialize, Serialize)]
pub struct RoutineFile {
    pub name: String,
    #[serde(rename = "exercise", default)]
    pub exercises: Vec<ExerciseFile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExerciseFile {
    pub name: String,
    /// Per-set rep targets; 0 marks that set AMRAP.
    pub reps: Vec<u32>,
    #[serde(default)]
    pub weights_kg: Vec<f32>,
    #[serde(default)]
    pub default_reps: Option<u32>,
    #[serde(default)]
    pub default_weight_kg: Option<f32>,
    #[serde(default)]
    pub superset_id: Option<String>,
    #[serde(default)]
    pub order_in_superset: u32,
    #[serde(default)]
    pub amrap_last_set: bool,
    #[serde(default = "default_true")]
    pub stall_detection: bool,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

fn default_true() -> bool {
    true
}

pub fn load_routine_toml(s: &str) -> eyre::Result<Routine> {
    let file: RoutineFile = toml::from_str(s)?;
    file.into_routine()
}

impl RoutineFile {
    /// Inverse of [`Self::into_routine`]; AMRAP sets serialize back to the
    /// `0` sentinel.
    pub fn from_routine(routine: &Routine) -> Self {
        Self {
            name: routine.name.clone(),
            exercises: routine
                .exercises
                .iter()
                .map(|ex| ExerciseFile {
                    name: ex.name.clone(),
                    reps: ex.set_reps.iter().map(|r| r.unwrap_or(0)).collect(),
                    weights_kg: ex.set_weights_per_cable_kg.clone(),
                    default_reps: Some(ex.default_reps),
                    default_weight_kg: Some(ex.default_weight_kg),
                    superset_id: ex.superset_id.clone(),
                    order_in_superset: ex.order_in_superset,
                    amrap_last_set: ex.amrap_last_set,
                    stall_detection: ex.stall_detection_enabled,
                    duration_secs: ex.duration_secs,
                })
                .collect(),
        }
    }

    pub fn into_routine(self) -> eyre::Result<Routine> {
        if self.exercises.is_empty() {
            eyre::bail!("routine '{}' has no exercises", self.name);
        }
        let mut exercises = Vec::with_capacity(self.exercises.len());
        for ex in self.exercises {
            if ex.reps.is_empty() {
                eyre::bail!("exercise '{}' has no sets", ex.name);
            }
            for (i, w) in ex.weights_kg.iter().enumerate() {
                if !w.is_finite() || *w < 0.0 {
                    eyre::bail!("exercise '{}' set {} has invalid weight", ex.name, i);
                }
            }
            let default_reps = ex
                .default_reps
                .or_else(|| ex.reps.iter().copied().find(|r| *r > 0))
                .unwrap_or(0);
            let default_weight_kg = ex
                .default_weight_kg
                .or_else(|| ex.weights_kg.first().copied())
                .unwrap_or(0.0);
            exercises.push(RoutineExercise {
                name: ex.name,
                set_reps: ex
                    .reps
                    .iter()
                    .map(|&r| if r == 0 { None } else { Some(r) })
                    .collect(),
                set_weights_per_cable_kg: ex.weights_kg,
                default_reps,
                default_weight_kg,
                superset_id: ex.superset_id,
                order_in_superset: ex.order_in_superset,
                amrap_last_set: ex.amrap_last_set,
                stall_detection_enabled: ex.stall_detection,
                duration_secs: ex.duration_secs,
            });
        }
        Ok(Routine {
            name: self.name,
            exercises,
        })
    }
}
