//! Cancellable countdown timers for the session state machine.
//!
//! At most one timer of each kind runs at a time: starting a new one cancels
//! the prior instance. Expiry is delivered exactly once, from `poll`, on the
//! caller's thread; there are no background timer tasks to race with.

/// The timer kinds the session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Rest between sets.
    Rest,
    /// Set-summary auto-advance.
    Summary,
    /// Timed/bodyweight set duration.
    SetDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Inactive,
    /// Remaining whole seconds changed.
    Tick(u32),
    /// Fired once; the timer is gone afterwards.
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    kind: TimerKind,
    started_ms: u64,
    total_secs: u32,
    last_reported: u32,
}

#[derive(Debug, Default)]
pub struct TimerSet {
    active: Vec<Countdown>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer of `kind`.
    pub fn start(&mut self, kind: TimerKind, now_ms: u64, secs: u32) {
        self.cancel(kind);
        let secs = secs.max(1);
        self.active.push(Countdown {
            kind,
            started_ms: now_ms,
            total_secs: secs,
            last_reported: secs,
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.active.retain(|c| c.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.active.clear();
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.active.iter().any(|c| c.kind == kind)
    }

    /// Remaining whole seconds, if the timer is running.
    pub fn remaining(&self, kind: TimerKind, now_ms: u64) -> Option<u32> {
        self.active.iter().find(|c| c.kind == kind).map(|c| {
            let elapsed = (now_ms.saturating_sub(c.started_ms) / 1_000) as u32;
            c.total_secs.saturating_sub(elapsed)
        })
    }

    /// Advance the timer of `kind`. Expiry removes the timer, so a stale
    /// caller polling again gets `Inactive` rather than a second expiry.
    pub fn poll(&mut self, kind: TimerKind, now_ms: u64) -> TimerEvent {
        let Some(idx) = self.active.iter().position(|c| c.kind == kind) else {
            return TimerEvent::Inactive;
        };
        let cd = self.active[idx];
        let elapsed_secs = (now_ms.saturating_sub(cd.started_ms) / 1_000) as u32;
        if elapsed_secs >= cd.total_secs {
            self.active.swap_remove(idx);
            return TimerEvent::Expired;
        }
        let remaining = cd.total_secs - elapsed_secs;
        if remaining != cd.last_reported {
            self.active[idx].last_reported = remaining;
            return TimerEvent::Tick(remaining);
        }
        TimerEvent::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_fires_exactly_once() {
        let mut t = TimerSet::new();
        t.start(TimerKind::Rest, 0, 2);
        assert_eq!(t.poll(TimerKind::Rest, 1_000), TimerEvent::Tick(1));
        assert_eq!(t.poll(TimerKind::Rest, 2_000), TimerEvent::Expired);
        assert_eq!(t.poll(TimerKind::Rest, 3_000), TimerEvent::Inactive);
    }

    #[test]
    fn restart_replaces_prior_instance() {
        let mut t = TimerSet::new();
        t.start(TimerKind::Summary, 0, 5);
        t.start(TimerKind::Summary, 3_000, 5);
        // the original 5s deadline passes without expiring the new timer
        assert_eq!(t.poll(TimerKind::Summary, 5_000), TimerEvent::Tick(3));
        assert_eq!(t.poll(TimerKind::Summary, 8_000), TimerEvent::Expired);
    }

    #[test]
    fn kinds_are_independent() {
        let mut t = TimerSet::new();
        t.start(TimerKind::Rest, 0, 10);
        t.start(TimerKind::SetDuration, 0, 2);
        assert_eq!(t.poll(TimerKind::SetDuration, 2_000), TimerEvent::Expired);
        assert!(t.is_running(TimerKind::Rest));
        assert_eq!(t.remaining(TimerKind::Rest, 4_000), Some(6));
    }

    #[test]
    fn cancel_all_leaves_nothing_running() {
        let mut t = TimerSet::new();
        t.start(TimerKind::Rest, 0, 10);
        t.start(TimerKind::Summary, 0, 10);
        t.cancel_all();
        assert_eq!(t.poll(TimerKind::Rest, 20_000), TimerEvent::Inactive);
        assert_eq!(t.poll(TimerKind::Summary, 20_000), TimerEvent::Inactive);
    }
}
