//! Per-set workout parameters and their resolution at routine transitions.
//!
//! `WorkoutParameters` is an immutable snapshot replaced wholesale at every
//! transition (copy-on-write); nothing mutates it in place, so a decision
//! pass can never observe a half-updated configuration.

use crate::routine::StepRef;
use liftctl_traits::Routine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkoutMode {
    #[default]
    Standard,
    /// Adaptive resistance tracking the user's force output.
    Echo,
    JustLift,
    /// Duration-based set (timed/bodyweight).
    Timed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutParameters {
    pub mode: WorkoutMode,
    /// `None` means AMRAP: no fixed target.
    pub target_reps: Option<u32>,
    pub weight_per_cable_kg: f32,
    pub warmup_target: u32,
    pub just_lift: bool,
    pub amrap: bool,
    pub use_auto_start: bool,
    pub stall_detection_enabled: bool,
    pub stop_at_top: bool,
    pub progression_delta_kg: f32,
    pub eccentric_pct: u32,
    pub echo_level: u8,
    pub duration_secs: Option<u32>,
    pub exercise_name: String,
}

impl Default for WorkoutParameters {
    fn default() -> Self {
        Self {
            mode: WorkoutMode::Standard,
            target_reps: None,
            weight_per_cable_kg: 0.0,
            warmup_target: 0,
            just_lift: false,
            amrap: false,
            use_auto_start: true,
            stall_detection_enabled: true,
            stop_at_top: false,
            progression_delta_kg: 0.0,
            eccentric_pct: 100,
            echo_level: 0,
            duration_secs: None,
            exercise_name: String::new(),
        }
    }
}

impl WorkoutParameters {
    /// Freeform mode: auto-start on grab, auto-stop on release/stall, no
    /// routine and no targets.
    pub fn just_lift() -> Self {
        Self {
            mode: WorkoutMode::JustLift,
            just_lift: true,
            amrap: true,
            exercise_name: "Just Lift".into(),
            ..Self::default()
        }
    }
}

/// Resolve the parameter snapshot for entering `step`, from highest to
/// lowest precedence:
///
/// - weight: one-shot rest-edit override, else the per-set value, else the
///   exercise default;
/// - reps: the per-set entry, where `None` marks that specific set AMRAP,
///   else the exercise default;
/// - the legacy exercise-level "last set AMRAP" flag is honored only when
///   the set being entered is structurally the exercise's last. An explicit
///   per-set rep target wins over the legacy flag when they disagree.
///
/// Timed exercises force the warmup target to zero and carry no rep target.
/// Mode-level switches (auto-start, eccentric load, echo level) carry over
/// from `previous` unchanged.
pub fn resolve_set_parameters(
    routine: &Routine,
    step: StepRef,
    previous: &WorkoutParameters,
    rest_override_kg: Option<f32>,
) -> WorkoutParameters {
    let Some(ex) = routine.exercises.get(step.exercise) else {
        tracing::warn!(
            exercise = step.exercise,
            "parameter resolution for out-of-bounds exercise; keeping previous"
        );
        return previous.clone();
    };

    let weight_per_cable_kg = rest_override_kg
        .or_else(|| ex.set_weights_per_cable_kg.get(step.set).copied())
        .unwrap_or(ex.default_weight_kg);

    let is_last_set = step.set + 1 == ex.set_count();
    let (target_reps, amrap) = match ex.set_reps.get(step.set) {
        Some(None) => (None, true),
        Some(Some(n)) => {
            if ex.amrap_last_set && is_last_set {
                // Two sources of truth disagree; the explicit per-set target
                // wins, but this is worth surfacing.
                tracing::warn!(
                    exercise = %ex.name,
                    set = step.set,
                    reps = n,
                    "per-set rep target overrides legacy last-set AMRAP flag"
                );
            }
            (Some(*n), false)
        }
        None if ex.amrap_last_set && is_last_set => (None, true),
        None => (Some(ex.default_reps), false),
    };

    if let Some(duration) = ex.duration_secs {
        return WorkoutParameters {
            mode: WorkoutMode::Timed,
            target_reps: None,
            weight_per_cable_kg,
            warmup_target: 0,
            just_lift: false,
            amrap: false,
            stall_detection_enabled: ex.stall_detection_enabled,
            stop_at_top: false,
            duration_secs: Some(duration),
            exercise_name: ex.name.clone(),
            ..previous.clone()
        };
    }

    WorkoutParameters {
        mode: if previous.mode == WorkoutMode::Echo {
            WorkoutMode::Echo
        } else {
            WorkoutMode::Standard
        },
        target_reps,
        weight_per_cable_kg,
        warmup_target: previous.warmup_target,
        just_lift: false,
        amrap,
        stall_detection_enabled: ex.stall_detection_enabled,
        duration_secs: None,
        exercise_name: ex.name.clone(),
        ..previous.clone()
    }
}
