//! Plain value types exchanged across the collaborator seams.
//!
//! These are deliberately dependency-free: the traits crate sits under every
//! other member, so it carries only std types.

/// One machine tick of cable telemetry. Immutable; consumed, never mutated.
///
/// Positions are in machine distance units, velocities signed
/// (positive = concentric pull), loads in kilograms-force per cable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub position_a: f32,
    pub position_b: f32,
    pub velocity_a: f32,
    pub velocity_b: f32,
    pub load_a: f32,
    pub load_b: f32,
    pub total_load: f32,
    /// Milliseconds since the source's epoch.
    pub timestamp_ms: u64,
}

impl MetricSample {
    /// Larger of the two cable positions; the machine reports 0 for a cable
    /// that is not attached.
    #[inline]
    pub fn max_position(&self) -> f32 {
        self.position_a.max(self.position_b)
    }

    /// Larger of the two absolute cable velocities.
    #[inline]
    pub fn max_abs_velocity(&self) -> f32 {
        self.velocity_a.abs().max(self.velocity_b.abs())
    }
}

/// Discrete rep event emitted by the machine firmware.
///
/// More authoritative than re-deriving reps from position. `legacy_format`
/// selects the alternate counting algorithm for hardware variants whose
/// firmware never populates `reps_set_count`; it is a per-notification flag
/// because some firmware interleaves both formats during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepNotification {
    pub reps_rom_count: u32,
    pub reps_set_count: u32,
    pub top_counter: u32,
    pub complete_counter: u32,
    pub legacy_format: bool,
}

/// Handle-activity signal reported by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    WaitingForRest,
    Grabbed,
    Moving,
    Active,
    Released,
}

/// BLE connection lifecycle as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Scanning,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Multiplexed inbound event stream from the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryEvent {
    Sample(MetricSample),
    Rep(RepNotification),
    Handle(HandleState),
    /// Firmware detected cable tension dropping to baseline (handles let go).
    Deload,
    Connection(ConnectionState),
}

/// One exercise within a routine.
///
/// A `None` entry in `set_reps` at index i means set i is AMRAP (no fixed
/// target). Held immutable for the whole session; navigation moves indices
/// into the routine, never the routine itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineExercise {
    pub name: String,
    /// Per-set rep targets; `None` marks that set as AMRAP.
    pub set_reps: Vec<Option<u32>>,
    /// Per-set weight per cable in kg; indexes past the end fall back to
    /// `default_weight_kg`.
    pub set_weights_per_cable_kg: Vec<f32>,
    pub default_reps: u32,
    pub default_weight_kg: f32,
    pub superset_id: Option<String>,
    pub order_in_superset: u32,
    /// Legacy exercise-level flag: the structurally last set is AMRAP.
    pub amrap_last_set: bool,
    pub stall_detection_enabled: bool,
    /// For timed/bodyweight exercises: run the set for this long instead of
    /// counting toward a rep target.
    pub duration_secs: Option<u32>,
}

impl RoutineExercise {
    pub fn set_count(&self) -> usize {
        self.set_reps.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Routine {
    pub name: String,
    pub exercises: Vec<RoutineExercise>,
}

/// Completed-set record handed to the session store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub exercise: String,
    pub weight_per_cable_kg: f32,
    pub working_reps: u32,
    pub warmup_reps: u32,
    pub duration_ms: u64,
    pub peak_force_concentric: f32,
    pub peak_force_eccentric: f32,
    pub avg_force_concentric: f32,
    pub avg_force_eccentric: f32,
    pub estimated_kcal: f32,
    pub total_volume_kg: f32,
}

/// Personal-record categories a saved set can improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrType {
    HeaviestWeight,
    MostRepsAtWeight,
    PeakForce,
    TotalVolume,
}

/// What to do with the set-summary screen once a set completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryCountdown {
    /// Go straight to rest, never show the summary.
    Skip,
    /// Show the summary, auto-advance after this many seconds.
    AutoAdvance(u32),
    /// Show the summary until the user acts.
    WaitForUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    Kilograms,
    Pounds,
}

/// Haptic/sound cues emitted at session milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCue {
    WorkoutStarted,
    WorkoutStopped,
    RestFinished,
    PersonalRecord,
}
