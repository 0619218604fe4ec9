//! Stand-ins for the BLE machine link.
//!
//! The real transport lives outside this workspace; what the engine needs for
//! development and testing is a [`TelemetrySource`] that replays a scripted
//! event timeline and a [`MachineLink`] that records the commands it was
//! asked to send. `script` builds realistic set timelines (grab, reps,
//! stall, release) without hand-writing every sample.

pub mod error;
pub mod script;

use error::LinkError;
use liftctl_traits::{MachineLink, TelemetryEvent, TelemetrySource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Replays a pre-built event timeline, pacing events by their scheduled
/// offsets. `next_event` blocks (sleeps) until the next event is due or the
/// caller's timeout expires; an exhausted script reports `Disconnected`.
pub struct ScriptedMachine {
    events: VecDeque<(u64, TelemetryEvent)>,
    epoch: Instant,
    /// When true, scheduled offsets are ignored and events are handed out
    /// immediately; used by tests that drive time themselves.
    immediate: bool,
}

impl ScriptedMachine {
    pub fn new(events: Vec<(u64, TelemetryEvent)>) -> Self {
        Self {
            events: events.into(),
            epoch: Instant::now(),
            immediate: false,
        }
    }

    /// Build a machine that ignores scheduling and replays as fast as the
    /// consumer polls.
    pub fn immediate(events: Vec<(u64, TelemetryEvent)>) -> Self {
        let mut m = Self::new(events);
        m.immediate = true;
        m
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl TelemetrySource for ScriptedMachine {
    fn next_event(&mut self, timeout: Duration) -> Result<TelemetryEvent, BoxError> {
        let Some(&(due_ms, _)) = self.events.front() else {
            return Err(Box::new(LinkError::Disconnected));
        };
        if !self.immediate {
            let elapsed = self.epoch.elapsed();
            let due = Duration::from_millis(due_ms);
            if due > elapsed {
                let wait = due - elapsed;
                if wait > timeout {
                    std::thread::sleep(timeout);
                    return Err(Box::new(LinkError::Timeout));
                }
                std::thread::sleep(wait);
            }
        }
        // front() above guarantees an element
        let (_, ev) = self
            .events
            .pop_front()
            .ok_or_else(|| Box::new(LinkError::Disconnected) as BoxError)?;
        Ok(ev)
    }
}

/// Commands a [`RecordingLink`] has been asked to send, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Raw(Vec<u8>),
    StopWorkout,
    StartActiveWorkoutPolling,
    RestartMonitorPolling,
    EnableHandleDetection(bool),
    EnableJustLiftWaitingMode,
}

/// Shared handle onto a [`RecordingLink`]'s command log.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<Command>>>);

impl CommandLog {
    pub fn commands(&self) -> Vec<Command> {
        self.0.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn count_of(&self, wanted: &Command) -> usize {
        self.commands().iter().filter(|c| *c == wanted).count()
    }

    fn push(&self, c: Command) {
        if let Ok(mut g) = self.0.lock() {
            g.push(c);
        }
    }
}

/// Shared one-shot failure trigger for a [`RecordingLink`]. Arming it makes
/// the link's next command fail with `CommandRejected`, even after the link
/// has been boxed away behind a trait object.
#[derive(Debug, Clone, Default)]
pub struct FailSwitch(Arc<AtomicBool>);

impl FailSwitch {
    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// MachineLink that records every command instead of transmitting it.
/// The [`FailSwitch`] injects a single send failure for abort-path tests.
#[derive(Debug, Default)]
pub struct RecordingLink {
    log: CommandLog,
    fail: FailSwitch,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Make the next command fail with `CommandRejected`.
    pub fn fail_next(&mut self) {
        self.fail.arm();
    }

    /// Cloneable handle to arm failures after the link is moved.
    pub fn fail_switch(&self) -> FailSwitch {
        self.fail.clone()
    }

    fn record(&mut self, c: Command) -> Result<(), BoxError> {
        if self.fail.take() {
            tracing::debug!(?c, "injected command failure");
            return Err(Box::new(LinkError::CommandRejected(format!("{c:?}"))));
        }
        tracing::trace!(?c, "link command");
        self.log.push(c);
        Ok(())
    }
}

impl MachineLink for RecordingLink {
    fn send_command(&mut self, frame: &[u8]) -> Result<(), BoxError> {
        self.record(Command::Raw(frame.to_vec()))
    }
    fn stop_workout(&mut self) -> Result<(), BoxError> {
        self.record(Command::StopWorkout)
    }
    fn start_active_workout_polling(&mut self) -> Result<(), BoxError> {
        self.record(Command::StartActiveWorkoutPolling)
    }
    fn restart_monitor_polling(&mut self) -> Result<(), BoxError> {
        self.record(Command::RestartMonitorPolling)
    }
    fn enable_handle_detection(&mut self, enabled: bool) -> Result<(), BoxError> {
        self.record(Command::EnableHandleDetection(enabled))
    }
    fn enable_just_lift_waiting_mode(&mut self) -> Result<(), BoxError> {
        self.record(Command::EnableJustLiftWaitingMode)
    }
}
