//! The workout state machine.
//!
//! `SessionEngine` owns the per-set decision components (rep counter,
//! auto-stop, auto-start, timers) and the boxed collaborator seams, and
//! sequences them through Idle → Countdown → Active → SetSummary/Resting →
//! Completed. Two one-shot guards protect the set boundary:
//!
//! - `stop_in_progress` is set synchronously before the hardware stop goes
//!   out, so concurrent detector firings collapse into a single stop command.
//!   A failed stop clears the guard and leaves the state untouched so the
//!   stop can be retried.
//! - `completion_in_progress` is set at the start of set completion and held
//!   until the next set begins, so a completed set is summarized and saved
//!   exactly once no matter how many events straggle in afterwards.
//!
//! All timing goes through the injected [`Clock`]; the engine never reads
//! the wall clock directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;

use crate::auto_start::{AutoStartEngine, AutoStartEvent};
use crate::auto_stop::{AutoStopEngine, StopCountdownUi, StopReason};
use crate::error::{self, Result};
use crate::params::{WorkoutMode, WorkoutParameters, resolve_set_parameters};
use crate::rep_counter::{LiftPhase, RepCount, RepCounter};
use crate::routine::{StepRef, next_step, previous_step};
use crate::summary::SummaryAccumulator;
use crate::timers::{TimerEvent, TimerKind, TimerSet};
use liftctl_config::Config;
use liftctl_traits::{
    Clock, ConnectionState, MachineLink, MetricSample, Notifier, PacketFactory, Preferences,
    PrTracker, RepNotification, Routine, SessionCue, SessionRecord, SessionStore,
    SummaryCountdown, TelemetryEvent,
};

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutState {
    /// No set running; auto-start may be armed.
    Idle,
    /// Machine start sequence in flight.
    Initializing,
    /// Auto-start countdown running.
    Countdown { remaining_secs: u32 },
    Active,
    Paused,
    /// Post-set summary screen; `None` means waiting for the user.
    SetSummary { remaining_secs: Option<u32> },
    /// Rest between sets; the next step is already selected.
    Resting { remaining_secs: u32 },
    /// Routine exhausted.
    Completed,
}

pub struct SessionEngine {
    cfg: Config,
    clock: Arc<dyn Clock>,
    epoch: Instant,

    link: Box<dyn MachineLink>,
    packets: Box<dyn PacketFactory>,
    store: Box<dyn SessionStore>,
    prefs: Box<dyn Preferences>,
    notifier: Box<dyn Notifier>,
    prs: Box<dyn PrTracker>,

    state: WorkoutState,
    params: WorkoutParameters,
    routine: Option<Routine>,
    step: StepRef,

    counter: RepCounter,
    auto_stop: AutoStopEngine,
    auto_start: AutoStartEngine,
    timers: TimerSet,

    summary: SummaryAccumulator,
    metrics: Vec<MetricSample>,
    last_sample: Option<MetricSample>,
    last_record: Option<SessionRecord>,

    stop_in_progress: bool,
    completion_in_progress: bool,
    baseline_pending: bool,
    /// Remaining SetDuration seconds captured at pause.
    paused_duration_secs: Option<u32>,
    /// One-shot weight override entered during rest; consumed at the next
    /// parameter resolution.
    rest_weight_override: Option<f32>,
}

impl SessionEngine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        mut cfg: Config,
        clock: Arc<dyn Clock>,
        link: Box<dyn MachineLink>,
        packets: Box<dyn PacketFactory>,
        store: Box<dyn SessionStore>,
        prefs: Box<dyn Preferences>,
        notifier: Box<dyn Notifier>,
        prs: Box<dyn PrTracker>,
    ) -> Self {
        // The user preference for the countdown length wins over the config
        // file value.
        cfg.auto_start.countdown_secs = prefs.auto_start_countdown_secs().max(1);
        let epoch = clock.now();
        let auto_stop = AutoStopEngine::new(cfg.auto_stop);
        let auto_start = AutoStartEngine::new(cfg.auto_start);
        Self {
            cfg,
            clock,
            epoch,
            link,
            packets,
            store,
            prefs,
            notifier,
            prs,
            state: WorkoutState::Idle,
            params: WorkoutParameters::default(),
            routine: None,
            step: StepRef::new(0, 0),
            counter: RepCounter::new(),
            auto_stop,
            auto_start,
            timers: TimerSet::new(),
            summary: SummaryAccumulator::start(0),
            metrics: Vec::new(),
            last_sample: None,
            last_record: None,
            stop_in_progress: false,
            completion_in_progress: false,
            baseline_pending: false,
            paused_duration_secs: None,
            rest_weight_override: None,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn state(&self) -> WorkoutState {
        self.state
    }

    pub fn params(&self) -> &WorkoutParameters {
        &self.params
    }

    pub fn step(&self) -> StepRef {
        self.step
    }

    pub fn counts(&self) -> RepCount {
        self.counter.counts()
    }

    pub fn phase(&self) -> LiftPhase {
        self.counter.phase()
    }

    pub fn last_record(&self) -> Option<&SessionRecord> {
        self.last_record.as_ref()
    }

    /// Stop countdown currently surfaced to the UI, if any detector timer is
    /// running.
    pub fn stop_countdown(&self) -> Option<StopCountdownUi> {
        self.auto_stop.ui(self.now_ms())
    }

    /// Select a routine and position at its first set. The machine's handle
    /// detection is armed so the first set can auto-start.
    pub fn load_routine(&mut self, routine: Routine) -> Result<()> {
        if routine.exercises.is_empty() {
            eyre::bail!("routine '{}' has no exercises", routine.name);
        }
        self.step = StepRef::new(0, 0);
        self.params = resolve_set_parameters(
            &routine,
            self.step,
            &WorkoutParameters::default(),
            None,
        );
        self.routine = Some(routine);
        self.state = WorkoutState::Idle;
        self.arm_handle_detection()
    }

    /// Enter freeform Just Lift mode: no routine, auto-start on grab,
    /// auto-stop on release or stall.
    pub fn begin_just_lift(&mut self) -> Result<()> {
        self.routine = None;
        self.params = WorkoutParameters::just_lift();
        self.state = WorkoutState::Idle;
        self.arm_handle_detection()
    }

    /// Manual start: skips any countdown and goes straight to Active.
    pub fn start_workout(&mut self) -> Result<()> {
        match self.state {
            WorkoutState::Idle
            | WorkoutState::Countdown { .. }
            | WorkoutState::Resting { .. }
            | WorkoutState::SetSummary { .. } => {}
            other => eyre::bail!("cannot start a set from {other:?}"),
        }
        self.auto_start.cancel();
        self.launch_set()
    }

    /// Explicit user stop of the running set.
    pub fn request_user_stop(&mut self) -> Result<()> {
        match self.state {
            WorkoutState::Active | WorkoutState::Paused => self.complete_set(StopReason::User),
            other => eyre::bail!("no running set to stop in {other:?}"),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != WorkoutState::Active {
            eyre::bail!("can only pause an active set");
        }
        let now = self.now_ms();
        self.paused_duration_secs = self.timers.remaining(TimerKind::SetDuration, now);
        self.timers.cancel(TimerKind::SetDuration);
        self.state = WorkoutState::Paused;
        tracing::info!("set paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != WorkoutState::Paused {
            eyre::bail!("no paused set to resume");
        }
        let now = self.now_ms();
        if let Some(secs) = self.paused_duration_secs.take() {
            self.timers.start(TimerKind::SetDuration, now, secs);
        }
        // Detector timers run on wall time; anything armed before the pause
        // would otherwise fire on the first sample after it.
        self.auto_stop.clear_timers();
        self.state = WorkoutState::Active;
        tracing::info!("set resumed");
        Ok(())
    }

    /// Dismiss the summary screen (user tapped through).
    pub fn advance_from_summary(&mut self) -> Result<()> {
        if !matches!(self.state, WorkoutState::SetSummary { .. }) {
            eyre::bail!("no summary to dismiss");
        }
        self.timers.cancel(TimerKind::Summary);
        self.after_summary()
    }

    /// End the rest early and start the selected set.
    pub fn skip_rest(&mut self) -> Result<()> {
        if !matches!(self.state, WorkoutState::Resting { .. }) {
            eyre::bail!("not resting");
        }
        self.launch_set()
    }

    pub fn extend_rest(&mut self, extra_secs: u32) -> Result<()> {
        if !matches!(self.state, WorkoutState::Resting { .. }) {
            eyre::bail!("not resting");
        }
        let now = self.now_ms();
        let remaining = self.timers.remaining(TimerKind::Rest, now).unwrap_or(0);
        let total = remaining + extra_secs;
        self.timers.start(TimerKind::Rest, now, total);
        self.state = WorkoutState::Resting {
            remaining_secs: total,
        };
        Ok(())
    }

    /// One-shot weight edit for the upcoming set, entered between sets.
    pub fn override_next_weight(&mut self, kg: f32) -> Result<()> {
        match self.state {
            WorkoutState::Resting { .. } | WorkoutState::SetSummary { .. } | WorkoutState::Idle => {
                self.rest_weight_override = Some(kg);
                Ok(())
            }
            other => eyre::bail!("cannot edit weight in {other:?}"),
        }
    }

    /// Switch upcoming sets to Echo adaptive resistance at `level`, or back
    /// to standard counting with level 0. Only valid between sets; the mode
    /// then carries across routine transitions until switched back.
    pub fn set_echo_mode(&mut self, level: u8) -> Result<()> {
        match self.state {
            WorkoutState::Idle | WorkoutState::Resting { .. } | WorkoutState::SetSummary { .. } => {
            }
            other => eyre::bail!("cannot change mode in {other:?}"),
        }
        let mut next = self.params.clone();
        next.mode = if level > 0 {
            WorkoutMode::Echo
        } else {
            WorkoutMode::Standard
        };
        next.echo_level = level;
        self.params = next;
        tracing::info!(level, "echo mode updated");
        Ok(())
    }

    /// Skip forward one step in the routine while between sets.
    pub fn skip_to_next_step(&mut self) -> Result<()> {
        self.navigate(|routine, step| next_step(routine, step))
    }

    /// Step back one step in the routine while between sets.
    pub fn back_to_previous_step(&mut self) -> Result<()> {
        self.navigate(|routine, step| previous_step(routine, step))
    }

    fn navigate(&mut self, f: impl Fn(&Routine, StepRef) -> Option<StepRef>) -> Result<()> {
        match self.state {
            WorkoutState::Idle | WorkoutState::Resting { .. } | WorkoutState::SetSummary { .. } => {
            }
            other => eyre::bail!("cannot navigate the routine in {other:?}"),
        }
        let Some(routine) = &self.routine else {
            eyre::bail!("no routine loaded");
        };
        match f(routine, self.step) {
            Some(step) => {
                self.step = step;
                tracing::info!(exercise = step.exercise, set = step.set, "step selected");
                Ok(())
            }
            None => {
                tracing::debug!("navigation hit the routine boundary");
                Ok(())
            }
        }
    }

    /// Feed one telemetry event through the state machine.
    pub fn handle_event(&mut self, event: TelemetryEvent) -> Result<()> {
        let now = self.now_ms();
        match event {
            TelemetryEvent::Sample(s) => self.on_sample(s, now),
            TelemetryEvent::Rep(n) => self.on_rep(&n),
            TelemetryEvent::Handle(h) => {
                let eligible = self.auto_start_eligible();
                let ev = self.auto_start.on_handle(h, now, eligible);
                self.apply_auto_start(ev)
            }
            TelemetryEvent::Deload => {
                // Fast path is limited to the open-ended modes; a standard
                // set keeps its fixed rep target despite firmware deloads.
                if self.state == WorkoutState::Active
                    && (self.params.amrap || self.params.just_lift)
                {
                    let stall = self.stall_enabled();
                    self.auto_stop.arm_stall_from_deload(&self.counter, stall, now);
                }
                Ok(())
            }
            TelemetryEvent::Connection(c) => self.on_connection(c),
        }
    }

    /// Advance time-driven behavior: countdowns, timers, timed-set expiry.
    /// Call regularly (each telemetry read or read timeout).
    pub fn tick(&mut self) -> Result<()> {
        let now = self.now_ms();
        if self.auto_start.counting_down() {
            let eligible = self.auto_start_eligible();
            let ev = self.auto_start.poll(now, eligible, self.params.use_auto_start);
            self.apply_auto_start(ev)?;
        }
        match self.state {
            WorkoutState::Active => {
                if self.timers.poll(TimerKind::SetDuration, now) == TimerEvent::Expired {
                    return self.complete_set(StopReason::DurationElapsed);
                }
            }
            WorkoutState::SetSummary { .. } => match self.timers.poll(TimerKind::Summary, now) {
                TimerEvent::Expired => return self.after_summary(),
                TimerEvent::Tick(n) => {
                    self.state = WorkoutState::SetSummary {
                        remaining_secs: Some(n),
                    };
                }
                TimerEvent::Inactive => {}
            },
            WorkoutState::Resting { .. } => match self.timers.poll(TimerKind::Rest, now) {
                TimerEvent::Expired => {
                    self.notifier.cue(SessionCue::RestFinished);
                    self.state = WorkoutState::Idle;
                    self.arm_handle_detection()?;
                }
                TimerEvent::Tick(n) => {
                    self.state = WorkoutState::Resting { remaining_secs: n };
                }
                TimerEvent::Inactive => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn on_sample(&mut self, s: MetricSample, now: u64) -> Result<()> {
        match self.state {
            WorkoutState::Active => {}
            // Idle telemetry still widens the ROM calibration.
            WorkoutState::Idle | WorkoutState::Countdown { .. } => {
                self.counter.update_position_ranges(s.position_a, s.position_b);
                self.last_sample = Some(s);
                return Ok(());
            }
            _ => return Ok(()),
        }
        if self.baseline_pending {
            self.counter.set_initial_baseline(s.position_a, s.position_b);
            self.baseline_pending = false;
        }
        self.counter.update_position_ranges(s.position_a, s.position_b);
        self.counter.update_phase(s.position_a, s.position_b);
        self.summary.ingest(&s);
        self.metrics.push(s);
        self.last_sample = Some(s);

        let stall = self.stall_enabled();
        if let Some(reason) = self.auto_stop.evaluate(&s, &self.counter, stall, now) {
            self.complete_set(reason)?;
        }
        Ok(())
    }

    fn on_rep(&mut self, n: &RepNotification) -> Result<()> {
        if self.state != WorkoutState::Active {
            return Ok(());
        }
        let (pos_a, pos_b) = self
            .last_sample
            .map_or((0.0, 0.0), |s| (s.position_a, s.position_b));
        self.counter.process(n, pos_a, pos_b);
        if self.counter.should_stop_workout() && self.auto_stop.request_stop(StopReason::TargetReached)
        {
            return self.complete_set(StopReason::TargetReached);
        }
        Ok(())
    }

    fn on_connection(&mut self, c: ConnectionState) -> Result<()> {
        tracing::info!(state = ?c, "connection state");
        if c == ConnectionState::Disconnected
            && matches!(self.state, WorkoutState::Active | WorkoutState::Paused)
        {
            tracing::warn!("link lost mid-set; saving what we have");
            // Nothing left to stop on the machine side.
            self.stop_in_progress = true;
            return self.complete_set(StopReason::User);
        }
        Ok(())
    }

    fn apply_auto_start(&mut self, ev: AutoStartEvent) -> Result<()> {
        match ev {
            AutoStartEvent::Idle => Ok(()),
            AutoStartEvent::CountdownTick(n) => {
                if matches!(
                    self.state,
                    WorkoutState::Idle
                        | WorkoutState::Countdown { .. }
                        | WorkoutState::SetSummary { .. }
                ) {
                    self.state = WorkoutState::Countdown { remaining_secs: n };
                }
                Ok(())
            }
            AutoStartEvent::Cancelled => {
                if matches!(self.state, WorkoutState::Countdown { .. }) {
                    self.state = WorkoutState::Idle;
                }
                Ok(())
            }
            AutoStartEvent::Started => {
                if let Err(e) = self.launch_set() {
                    // The countdown is spent; fall back to Idle so the user
                    // can retry manually.
                    if matches!(self.state, WorkoutState::Countdown { .. }) {
                        self.state = WorkoutState::Idle;
                    }
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// Whether the current state permits arming/continuing an auto-start.
    fn auto_start_eligible(&self) -> bool {
        if !self.params.use_auto_start {
            return false;
        }
        match self.state {
            WorkoutState::Idle | WorkoutState::Countdown { .. } => true,
            WorkoutState::SetSummary { .. } => self.params.just_lift,
            _ => false,
        }
    }

    /// Stall detection only runs when both the per-set flag and the user
    /// preference agree; the preference is re-read on every decision.
    fn stall_enabled(&self) -> bool {
        self.params.stall_detection_enabled && self.prefs.stall_detection_enabled()
    }

    fn launch_set(&mut self) -> Result<()> {
        self.timers.cancel(TimerKind::Rest);
        self.timers.cancel(TimerKind::Summary);
        if let Some(routine) = &self.routine {
            self.params = resolve_set_parameters(
                routine,
                self.step,
                &self.params,
                self.rest_weight_override.take(),
            );
        }
        self.begin_active()
    }

    fn begin_active(&mut self) -> Result<()> {
        // A failed start sequence rolls the state machine back untouched.
        let prior = self.state;
        self.state = WorkoutState::Initializing;
        if let Err(e) = self
            .send_start_sequence()
            .wrap_err("machine start sequence failed")
        {
            self.state = prior;
            return Err(e);
        }
        let now = self.now_ms();
        if self.params.just_lift {
            // ROM calibration survives a Just Lift auto-restart.
            self.counter.reset_counts_only();
        } else {
            self.counter.reset();
        }
        self.counter.configure(
            self.params.warmup_target,
            self.params.target_reps.unwrap_or(0),
            self.params.just_lift,
            self.params.stop_at_top,
            self.params.amrap,
        );
        self.auto_stop
            .begin_set(now, self.params.amrap || self.params.just_lift);
        self.summary = SummaryAccumulator::start(now);
        self.metrics.clear();
        self.baseline_pending = true;
        self.stop_in_progress = false;
        self.completion_in_progress = false;
        self.paused_duration_secs = None;
        if let Some(d) = self.params.duration_secs {
            self.timers.start(TimerKind::SetDuration, now, d);
        }
        self.notifier.cue(SessionCue::WorkoutStarted);
        self.state = WorkoutState::Active;
        tracing::info!(
            exercise = %self.params.exercise_name,
            weight_kg = self.params.weight_per_cable_kg,
            reps = ?self.params.target_reps,
            "set started"
        );
        Ok(())
    }

    /// Command sequence bringing the machine into an active set. The init
    /// frame and polling-mode switches are best effort; the config and start
    /// frames are required and abort the start when they fail.
    fn send_start_sequence(&mut self) -> Result<()> {
        let gap = Duration::from_millis(self.cfg.session.command_gap_ms);
        if let Err(e) = self.link.restart_monitor_polling() {
            tracing::warn!(error = %e, "restart_monitor_polling failed; continuing");
        }
        self.clock.sleep(gap);
        if let Err(e) = self.link.send_command(&self.packets.init_frame()) {
            tracing::warn!(error = %e, "init frame lost; machine tolerates this");
        }
        self.clock.sleep(gap);
        let config = self.packets.config_frame(
            self.params.weight_per_cable_kg,
            self.params.target_reps,
            self.params.eccentric_pct,
            self.params.echo_level,
        );
        self.link
            .send_command(&config)
            .map_err(|e| eyre::Report::new(error::map_link_error(&*e)))
            .wrap_err("config frame rejected")?;
        self.clock.sleep(gap);
        self.link
            .send_command(&self.packets.start_frame())
            .map_err(|e| eyre::Report::new(error::map_link_error(&*e)))
            .wrap_err("start frame rejected")?;
        self.clock.sleep(gap);
        if let Err(e) = self.link.start_active_workout_polling() {
            tracing::warn!(error = %e, "start_active_workout_polling failed; continuing");
        }
        Ok(())
    }

    /// Close out the running set: stop the machine, summarize, persist,
    /// advance. Exactly-once under the two guards; see the module docs.
    fn complete_set(&mut self, reason: StopReason) -> Result<()> {
        if self.completion_in_progress {
            tracing::debug!(?reason, "set completion already in progress");
            return Ok(());
        }
        self.completion_in_progress = true;

        if !self.stop_in_progress {
            self.stop_in_progress = true;
            if let Err(e) = self.link.stop_workout() {
                // Retryable: clear both guards, keep the state.
                self.stop_in_progress = false;
                self.completion_in_progress = false;
                return Err(eyre::Report::new(error::map_link_error(&*e)))
                    .wrap_err("failed to stop the machine");
            }
        }
        self.timers.cancel(TimerKind::SetDuration);

        let now = self.now_ms();
        let ranges = self.counter.ranges();
        self.summary
            .set_rom_span(ranges.a.span().max(ranges.b.span()));
        let counts = self.counter.counts();
        let record = self.summary.finish(
            &self.params.exercise_name,
            self.params.weight_per_cable_kg,
            counts.working_reps,
            counts.warmup_reps,
            now,
        );
        tracing::info!(
            ?reason,
            working = counts.working_reps,
            warmup = counts.warmup_reps,
            "set completed"
        );

        match self.store.save_session(&record) {
            Ok(id) => {
                if let Err(e) = self.store.save_metrics(id, &self.metrics) {
                    tracing::warn!(error = %e, session = id, "metric trace not saved");
                }
                self.run_pr_hooks(&record);
            }
            Err(e) => {
                tracing::error!(error = %e, "session not saved; advancing anyway");
            }
        }
        self.metrics.clear();
        self.notifier.cue(SessionCue::WorkoutStopped);
        self.last_record = Some(record);
        self.enter_summary()
    }

    /// Gamification is best effort and never blocks the session flow.
    fn run_pr_hooks(&mut self, record: &SessionRecord) {
        match self.prs.update_prs_if_better(record) {
            Ok(prs) if !prs.is_empty() => {
                tracing::info!(?prs, "personal records improved");
                self.notifier.cue(SessionCue::PersonalRecord);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "PR update failed"),
        }
        if let Err(e) = self.prs.update_stats() {
            tracing::warn!(error = %e, "stats update failed");
        }
        match self.prs.check_and_award_badges() {
            Ok(badges) if !badges.is_empty() => tracing::info!(?badges, "badges awarded"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "badge check failed"),
        }
    }

    fn enter_summary(&mut self) -> Result<()> {
        match self.prefs.summary_countdown() {
            SummaryCountdown::Skip => self.after_summary(),
            SummaryCountdown::AutoAdvance(secs) => {
                let now = self.now_ms();
                self.timers.start(TimerKind::Summary, now, secs);
                self.state = WorkoutState::SetSummary {
                    remaining_secs: Some(secs),
                };
                Ok(())
            }
            SummaryCountdown::WaitForUser => {
                self.state = WorkoutState::SetSummary {
                    remaining_secs: None,
                };
                Ok(())
            }
        }
    }

    /// Leave the summary: pick the next step and rest, or finish the routine,
    /// or re-arm Just Lift.
    fn after_summary(&mut self) -> Result<()> {
        if self.params.just_lift {
            self.counter.reset_counts_only();
            self.auto_stop.reset();
            self.state = WorkoutState::Idle;
            return self.arm_handle_detection();
        }
        let next = self
            .routine
            .as_ref()
            .and_then(|r| next_step(r, self.step));
        match next {
            Some(step) => {
                self.step = step;
                let now = self.now_ms();
                let rest = self.cfg.session.rest_secs;
                self.timers.start(TimerKind::Rest, now, rest);
                self.state = WorkoutState::Resting {
                    remaining_secs: rest,
                };
                self.arm_handle_detection()
            }
            None => {
                self.timers.cancel_all();
                self.state = WorkoutState::Completed;
                tracing::info!("routine completed");
                Ok(())
            }
        }
    }

    /// Re-arm the machine's handle detection, debounced so duplicate calls
    /// within the window cannot reset the detection state mid-grab.
    fn arm_handle_detection(&mut self) -> Result<()> {
        let now = self.now_ms();
        if !self.auto_start.enable_detection(now) {
            return Ok(());
        }
        self.link
            .enable_handle_detection(true)
            .map_err(|e| eyre::Report::new(error::map_link_error(&*e)))
            .wrap_err("enable_handle_detection rejected")?;
        if self.params.just_lift {
            self.clock
                .sleep(Duration::from_millis(self.cfg.session.command_gap_ms));
            self.link
                .enable_just_lift_waiting_mode()
                .map_err(|e| eyre::Report::new(error::map_link_error(&*e)))
                .wrap_err("enable_just_lift_waiting_mode rejected")?;
        }
        Ok(())
    }
}
