//! Auto-start decision engine.
//!
//! Watches handle-activity transitions and runs a configurable countdown
//! once the handles are grabbed in an eligible session state. A release at
//! any point cancels immediately, and countdown expiry re-validates every
//! precondition before reporting a start. The cooperative runtime means a
//! cancellation and the final tick can interleave, so the expiry path
//! carries a generation token ("is this still my countdown?") rather than
//! trusting that it was never cancelled.

use liftctl_config::AutoStartCfg;
use liftctl_traits::HandleState;

/// Outcome of feeding the engine a handle event or polling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStartEvent {
    /// Nothing to report.
    Idle,
    /// Countdown running; remaining whole seconds.
    CountdownTick(u32),
    /// Countdown completed with all preconditions still holding.
    Started,
    /// A running countdown was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    generation: u64,
    started_ms: u64,
    total_secs: u32,
    last_reported: u32,
}

#[derive(Debug)]
pub struct AutoStartEngine {
    cfg: AutoStartCfg,
    handle_state: HandleState,
    countdown: Option<Countdown>,
    /// Bumped on every cancel; a countdown whose generation no longer
    /// matches is stale and must not start anything.
    generation: u64,
    last_enable_ms: Option<u64>,
}

impl AutoStartEngine {
    pub fn new(cfg: AutoStartCfg) -> Self {
        Self {
            cfg,
            handle_state: HandleState::WaitingForRest,
            countdown: None,
            generation: 0,
            last_enable_ms: None,
        }
    }

    pub fn handle_state(&self) -> HandleState {
        self.handle_state
    }

    pub fn counting_down(&self) -> bool {
        self.countdown.is_some()
    }

    /// Record a handle-activity transition. `eligible` is whether the
    /// session state currently permits auto-start (Idle, or SetSummary in
    /// Just Lift) with the preference enabled.
    pub fn on_handle(&mut self, state: HandleState, now_ms: u64, eligible: bool) -> AutoStartEvent {
        self.handle_state = state;
        match state {
            HandleState::Grabbed if eligible && self.countdown.is_none() => {
                let total = self.cfg.countdown_secs.max(1);
                self.countdown = Some(Countdown {
                    generation: self.generation,
                    started_ms: now_ms,
                    total_secs: total,
                    last_reported: total,
                });
                tracing::debug!(total, "auto-start countdown armed");
                AutoStartEvent::CountdownTick(total)
            }
            HandleState::Released => {
                if self.cancel() {
                    AutoStartEvent::Cancelled
                } else {
                    AutoStartEvent::Idle
                }
            }
            _ => AutoStartEvent::Idle,
        }
    }

    /// Drive the countdown. `still_eligible` and `use_auto_start` are
    /// re-read by the caller at this instant; together with the generation
    /// and handle-state checks they form the final guard before a start.
    pub fn poll(&mut self, now_ms: u64, still_eligible: bool, use_auto_start: bool) -> AutoStartEvent {
        let Some(cd) = self.countdown else {
            return AutoStartEvent::Idle;
        };
        if cd.generation != self.generation {
            // Cancelled after this copy was taken; drop it silently.
            self.countdown = None;
            return AutoStartEvent::Idle;
        }
        let elapsed_secs = (now_ms.saturating_sub(cd.started_ms) / 1_000) as u32;
        if elapsed_secs >= cd.total_secs {
            self.countdown = None;
            let handles_held = matches!(
                self.handle_state,
                HandleState::Grabbed | HandleState::Moving | HandleState::Active
            );
            if handles_held && use_auto_start && still_eligible {
                tracing::info!("auto-start countdown complete");
                return AutoStartEvent::Started;
            }
            tracing::debug!(
                ?self.handle_state,
                use_auto_start,
                still_eligible,
                "auto-start aborted at final guard"
            );
            return AutoStartEvent::Idle;
        }
        let remaining = cd.total_secs - elapsed_secs;
        if remaining != cd.last_reported {
            if let Some(c) = self.countdown.as_mut() {
                c.last_reported = remaining;
            }
            return AutoStartEvent::CountdownTick(remaining);
        }
        AutoStartEvent::Idle
    }

    /// Cancel any running countdown; returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.countdown.take().is_some()
    }

    /// Debounced arming of handle detection: a second call within the
    /// debounce window is a no-op, so duplicate UI triggers can't reset the
    /// machine's detection state mid-grab. Returns whether the caller should
    /// actually send the enable command.
    pub fn enable_detection(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_enable_ms
            && now_ms.saturating_sub(last) < self.cfg.enable_debounce_ms
        {
            tracing::debug!("handle-detection enable debounced");
            return false;
        }
        self.last_enable_ms = Some(now_ms);
        self.handle_state = HandleState::WaitingForRest;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AutoStartEngine {
        AutoStartEngine::new(AutoStartCfg::default())
    }

    #[test]
    fn grab_starts_countdown_and_ticks_down() {
        let mut e = engine();
        assert_eq!(
            e.on_handle(HandleState::Grabbed, 0, true),
            AutoStartEvent::CountdownTick(5)
        );
        assert_eq!(e.poll(1_100, true, true), AutoStartEvent::CountdownTick(4));
        assert_eq!(e.poll(1_200, true, true), AutoStartEvent::Idle); // no repeat tick
        assert_eq!(e.poll(4_900, true, true), AutoStartEvent::CountdownTick(1));
        assert_eq!(e.poll(5_000, true, true), AutoStartEvent::Started);
        assert!(!e.counting_down());
    }

    #[test]
    fn release_cancels_immediately() {
        let mut e = engine();
        e.on_handle(HandleState::Grabbed, 0, true);
        assert_eq!(
            e.on_handle(HandleState::Released, 2_000, true),
            AutoStartEvent::Cancelled
        );
        assert_eq!(e.poll(5_000, true, true), AutoStartEvent::Idle);
    }

    #[test]
    fn release_then_regrab_restarts_countdown() {
        let mut e = engine();
        e.on_handle(HandleState::Grabbed, 0, true);
        e.on_handle(HandleState::Released, 4_000, true);
        // fresh grab 1s before the original countdown would have completed
        assert_eq!(
            e.on_handle(HandleState::Grabbed, 4_000, true),
            AutoStartEvent::CountdownTick(5)
        );
        // the original deadline passes without starting; the fresh countdown
        // is still ticking
        assert_eq!(e.poll(5_000, true, true), AutoStartEvent::CountdownTick(4));
        assert_eq!(e.poll(9_000, true, true), AutoStartEvent::Started);
    }

    #[test]
    fn final_guard_rechecks_preconditions() {
        // auto-start preference flipped off between arm and expiry
        let mut e = engine();
        e.on_handle(HandleState::Grabbed, 0, true);
        assert_eq!(e.poll(5_000, true, false), AutoStartEvent::Idle);

        // session state left eligibility between arm and expiry
        let mut e = engine();
        e.on_handle(HandleState::Grabbed, 0, true);
        assert_eq!(e.poll(5_000, false, true), AutoStartEvent::Idle);

        // moving handles still count as held at expiry
        let mut e = engine();
        e.on_handle(HandleState::Grabbed, 0, true);
        e.on_handle(HandleState::Moving, 3_000, true);
        assert_eq!(e.poll(5_000, true, true), AutoStartEvent::Started);
    }

    #[test]
    fn grab_while_ineligible_does_not_arm() {
        let mut e = engine();
        assert_eq!(
            e.on_handle(HandleState::Grabbed, 0, false),
            AutoStartEvent::Idle
        );
        assert!(!e.counting_down());
    }

    #[test]
    fn enable_detection_debounces_duplicates() {
        let mut e = engine();
        assert!(e.enable_detection(1_000));
        assert!(!e.enable_detection(1_300)); // inside 500ms window
        assert!(e.enable_detection(1_600));
    }
}
