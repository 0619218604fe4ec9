//! In-memory collaborator implementations for tests and offline runs.
//!
//! Each mock hands out a cloneable [`Arc`] view of its captured state so a
//! test can keep inspecting saves after the engine has taken ownership of
//! the boxed trait object.

use std::sync::{Arc, Mutex};

use liftctl_traits::{
    MetricSample, Notifier, PacketFactory, Preferences, PrTracker, PrType, SessionCue,
    SessionRecord, SessionStore, SummaryCountdown, WeightUnit,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Default)]
pub struct StoreState {
    pub sessions: Vec<SessionRecord>,
    pub metrics: Vec<(u64, Vec<MetricSample>)>,
    pub fail_next_save: bool,
}

/// Session store backed by a vector, with one-shot failure injection.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle onto the captured state.
    pub fn state(&self) -> Arc<Mutex<StoreState>> {
        Arc::clone(&self.state)
    }

    pub fn fail_next_save(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_next_save = true;
        }
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().map(|s| s.sessions.len()).unwrap_or(0)
    }
}

impl SessionStore for MemorySessionStore {
    fn save_session(&mut self, record: &SessionRecord) -> Result<u64, BoxError> {
        let mut s = self.state.lock().map_err(|_| "store mutex poisoned")?;
        if s.fail_next_save {
            s.fail_next_save = false;
            return Err("injected save failure".into());
        }
        s.sessions.push(record.clone());
        Ok(s.sessions.len() as u64)
    }

    fn save_metrics(&mut self, session_id: u64, metrics: &[MetricSample]) -> Result<(), BoxError> {
        let mut s = self.state.lock().map_err(|_| "store mutex poisoned")?;
        s.metrics.push((session_id, metrics.to_vec()));
        Ok(())
    }
}

/// Preferences with fixed answers, settable per test.
#[derive(Debug, Clone)]
pub struct StaticPreferences {
    pub stall_detection: bool,
    pub countdown_secs: u32,
    pub summary: SummaryCountdown,
    pub unit: WeightUnit,
}

impl Default for StaticPreferences {
    fn default() -> Self {
        Self {
            stall_detection: true,
            countdown_secs: 5,
            summary: SummaryCountdown::Skip,
            unit: WeightUnit::Kilograms,
        }
    }
}

impl Preferences for StaticPreferences {
    fn stall_detection_enabled(&self) -> bool {
        self.stall_detection
    }

    fn auto_start_countdown_secs(&self) -> u32 {
        self.countdown_secs
    }

    fn summary_countdown(&self) -> SummaryCountdown {
        self.summary
    }

    fn weight_unit(&self) -> WeightUnit {
        self.unit
    }
}

/// Cue sink that records what it was asked to play.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    cues: Arc<Mutex<Vec<SessionCue>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<SessionCue> {
        self.cues.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn cue(&mut self, cue: SessionCue) {
        if let Ok(mut c) = self.cues.lock() {
            c.push(cue);
        }
    }
}

/// Cue sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn cue(&mut self, _cue: SessionCue) {}
}

/// PR tracker that never awards anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPrTracker;

impl PrTracker for NoopPrTracker {
    fn update_prs_if_better(&mut self, _record: &SessionRecord) -> Result<Vec<PrType>, BoxError> {
        Ok(Vec::new())
    }

    fn update_stats(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn check_and_award_badges(&mut self) -> Result<Vec<String>, BoxError> {
        Ok(Vec::new())
    }
}

/// Packet factory producing tagged placeholder frames; tests assert on the
/// leading tag byte to verify command ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPacketFactory;

impl StubPacketFactory {
    pub const INIT_TAG: u8 = 0x01;
    pub const CONFIG_TAG: u8 = 0x02;
    pub const START_TAG: u8 = 0x03;
}

impl PacketFactory for StubPacketFactory {
    fn init_frame(&self) -> Vec<u8> {
        vec![Self::INIT_TAG]
    }

    fn config_frame(
        &self,
        weight_per_cable_kg: f32,
        target_reps: Option<u32>,
        eccentric_pct: u32,
        echo_level: u8,
    ) -> Vec<u8> {
        let mut frame = vec![Self::CONFIG_TAG];
        frame.extend_from_slice(&weight_per_cable_kg.to_le_bytes());
        frame.push(target_reps.map(|r| r.min(255) as u8).unwrap_or(0));
        frame.push(eccentric_pct.min(255) as u8);
        frame.push(echo_level);
        frame
    }

    fn start_frame(&self) -> Vec<u8> {
        vec![Self::START_TAG]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failure_injection_is_one_shot() {
        let store = MemorySessionStore::new();
        let mut boxed: Box<dyn SessionStore> = Box::new(store.clone());
        store.fail_next_save();
        let record = SessionRecord {
            exercise: "row".into(),
            weight_per_cable_kg: 20.0,
            working_reps: 10,
            warmup_reps: 0,
            duration_ms: 1,
            peak_force_concentric: 0.0,
            peak_force_eccentric: 0.0,
            avg_force_concentric: 0.0,
            avg_force_eccentric: 0.0,
            estimated_kcal: 0.0,
            total_volume_kg: 400.0,
        };
        assert!(boxed.save_session(&record).is_err());
        assert_eq!(boxed.save_session(&record).unwrap(), 1);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn stub_frames_carry_tags() {
        let f = StubPacketFactory;
        assert_eq!(f.init_frame()[0], StubPacketFactory::INIT_TAG);
        assert_eq!(f.start_frame()[0], StubPacketFactory::START_TAG);
        let cfg = f.config_frame(22.5, Some(10), 100, 0);
        assert_eq!(cfg[0], StubPacketFactory::CONFIG_TAG);
        assert_eq!(cfg[5], 10);
    }
}
