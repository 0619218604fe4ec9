//! Timeline builder for scripted machine sessions.
//!
//! Produces the `(offset_ms, event)` pairs a [`crate::ScriptedMachine`]
//! replays. Rep motion is a triangle wave between the handle rest position
//! and the top of the range, with a firmware rep notification fired at each
//! completed cycle, matching the shape of real cable telemetry closely
//! enough for the decision engine.

use liftctl_traits::{
    ConnectionState, HandleState, MetricSample, RepNotification, TelemetryEvent,
};

pub struct ScriptBuilder {
    events: Vec<(u64, TelemetryEvent)>,
    now_ms: u64,
    tick_ms: u64,
    rep_total: u32,
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new(20)
    }
}

impl ScriptBuilder {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            events: Vec::new(),
            now_ms: 0,
            tick_ms: tick_ms.max(1),
            rep_total: 0,
        }
    }

    pub fn build(self) -> Vec<(u64, TelemetryEvent)> {
        self.events
    }

    /// Current timeline position (ms since script start).
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advance the timeline without emitting anything; radio silence.
    pub fn pause(mut self, ms: u64) -> Self {
        self.now_ms += ms;
        self
    }

    pub fn connected(mut self) -> Self {
        self.push(TelemetryEvent::Connection(ConnectionState::Connected));
        self
    }

    pub fn handle(mut self, state: HandleState) -> Self {
        self.push(TelemetryEvent::Handle(state));
        self
    }

    pub fn deload(mut self) -> Self {
        self.push(TelemetryEvent::Deload);
        self
    }

    /// Handles sitting at rest (both cables near zero) for `ms`.
    pub fn at_rest(mut self, ms: u64) -> Self {
        let ticks = (ms / self.tick_ms).max(1);
        for _ in 0..ticks {
            let s = self.sample(1.0, 1.0, 0.0, 0.0);
            self.push(TelemetryEvent::Sample(s));
            self.now_ms += self.tick_ms;
        }
        self
    }

    /// Handles held still at `position` for `ms` (a mid-set stall).
    pub fn stalled_at(mut self, position: f32, load: f32, ms: u64) -> Self {
        let ticks = (ms / self.tick_ms).max(1);
        for _ in 0..ticks {
            let s = self.sample(position, position, 0.5, load);
            self.push(TelemetryEvent::Sample(s));
            self.now_ms += self.tick_ms;
        }
        self
    }

    /// `count` full reps from near-rest up to `top` and back, one rep
    /// notification per completed cycle.
    pub fn reps(mut self, count: u32, top: f32, load: f32, rep_ms: u64) -> Self {
        let ticks_per_rep = (rep_ms / self.tick_ms).max(4);
        let half = ticks_per_rep / 2;
        for _ in 0..count {
            for t in 0..ticks_per_rep {
                let frac = if t < half {
                    t as f32 / half as f32
                } else {
                    (ticks_per_rep - t) as f32 / half as f32
                };
                let pos = 2.0 + frac * (top - 2.0);
                let vel = if t < half { 25.0 } else { -25.0 };
                let s = self.sample(pos, pos, vel, load);
                self.push(TelemetryEvent::Sample(s));
                self.now_ms += self.tick_ms;
            }
            self.rep_total += 1;
            let rep = RepNotification {
                reps_rom_count: self.rep_total,
                reps_set_count: self.rep_total,
                top_counter: self.rep_total,
                complete_counter: self.rep_total,
                legacy_format: false,
            };
            self.push(TelemetryEvent::Rep(rep));
        }
        self
    }

    fn sample(&self, pos_a: f32, pos_b: f32, vel: f32, load: f32) -> MetricSample {
        MetricSample {
            position_a: pos_a,
            position_b: pos_b,
            velocity_a: vel,
            velocity_b: vel,
            load_a: load,
            load_b: load,
            total_load: load * 2.0,
            timestamp_ms: self.now_ms,
        }
    }

    fn push(&mut self, ev: TelemetryEvent) {
        self.events.push((self.now_ms, ev));
    }
}
