//! Background telemetry pump.
//!
//! Spawns a thread that owns the `TelemetrySource`, forwards its events over
//! a bounded channel, and tracks the last-event timestamp for the connection
//! watchdog. Read timeouts are normal (the machine is quiet between sets);
//! any other source error is surfaced as a `Disconnected` event and ends the
//! thread.
//!
//! Safety: each `TelemetryFeed` spawns exactly one thread that is shut down
//! when the feed is dropped, preventing thread leaks.

use crossbeam_channel as xch;
use liftctl_config::FeedCfg;
use liftctl_traits::clock::Clock;
use liftctl_traits::{ConnectionState, TelemetryEvent, TelemetrySource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::EngineError;

/// Events are small and frequent; a modest buffer absorbs consumer hiccups
/// without hiding sustained backpressure.
const FEED_CAPACITY: usize = 64;

pub struct TelemetryFeed {
    rx: xch::Receiver<TelemetryEvent>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    stale_after_ms: u64,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryFeed {
    pub fn spawn<S, C>(mut source: S, cfg: FeedCfg, clock: C) -> Self
    where
        S: TelemetrySource + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(FEED_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let timeout = Duration::from_millis(cfg.read_timeout_ms);
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("telemetry feed received shutdown signal");
                    break;
                }
                match source.next_event(timeout) {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            tracing::debug!("telemetry consumer disconnected, exiting thread");
                            break;
                        }
                        last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Err(e) => {
                        if matches!(crate::error::map_link_error(&*e), EngineError::Timeout) {
                            // Quiet link; the watchdog decides if it is stale.
                            continue;
                        }
                        tracing::warn!(error = %e, "telemetry source failed; closing feed");
                        let _ =
                            tx.send(TelemetryEvent::Connection(ConnectionState::Disconnected));
                        break;
                    }
                }
            }
            tracing::trace!("telemetry feed thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            stale_after_ms: cfg.stale_after_ms,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Next event, waiting up to `timeout`. `None` on timeout or when the
    /// feed thread has exited.
    pub fn recv(&self, timeout: Duration) -> Option<TelemetryEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drain without blocking.
    pub fn try_recv(&self) -> Option<TelemetryEvent> {
        self.rx.try_recv().ok()
    }

    /// Milliseconds since the last successfully forwarded event.
    pub fn silent_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Connection watchdog verdict against the configured staleness budget.
    pub fn is_stale(&self, now_ms: u64) -> bool {
        self.silent_for(now_ms) > self.stale_after_ms
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after at most one read timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("telemetry feed thread joined"),
                Err(e) => tracing::warn!(?e, "telemetry feed thread panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftctl_link::ScriptedMachine;
    use liftctl_traits::MonotonicClock;

    #[test]
    fn forwards_events_then_reports_disconnect() {
        let source = ScriptedMachine::immediate(vec![
            (0, TelemetryEvent::Connection(ConnectionState::Connected)),
            (0, TelemetryEvent::Deload),
        ]);
        let feed = TelemetryFeed::spawn(source, FeedCfg::default(), MonotonicClock::new());
        let wait = Duration::from_secs(1);
        assert_eq!(
            feed.recv(wait),
            Some(TelemetryEvent::Connection(ConnectionState::Connected))
        );
        assert_eq!(feed.recv(wait), Some(TelemetryEvent::Deload));
        // Script exhausted: the feed closes with a synthetic disconnect.
        assert_eq!(
            feed.recv(wait),
            Some(TelemetryEvent::Connection(ConnectionState::Disconnected))
        );
        assert_eq!(feed.recv(Duration::from_millis(50)), None);
    }

    #[test]
    fn drop_joins_the_thread() {
        let source = ScriptedMachine::new(vec![(60_000, TelemetryEvent::Deload)]);
        let feed = TelemetryFeed::spawn(source, FeedCfg::default(), MonotonicClock::new());
        // Dropping while the source is mid-wait must not hang.
        drop(feed);
    }
}
