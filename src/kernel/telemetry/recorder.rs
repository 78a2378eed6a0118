use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::event::TelemetryEvent;
use super::metrics::{ActivityStats, RunningSummary};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub stats: ActivityStats,
    pub rms: RunningSummary,
    pub noise_floor_db: RunningSummary,
    pub snr_db: RunningSummary,
}

/// Keeps aggregate counters plus a bounded window of recent events.
/// Eviction from the window never touches the counters.
#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
    snapshot: TelemetrySnapshot,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(1024),
            snapshot: TelemetrySnapshot::default(),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        self.snapshot.stats.apply(&event);
        if let TelemetryEvent::Signal { level, .. } = &event {
            self.snapshot.rms.push(level.rms);
            self.snapshot.noise_floor_db.push(level.noise_floor_db());
            self.snapshot.snr_db.push(level.snr_db);
        }

        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn stats(&self) -> &ActivityStats {
        &self.snapshot.stats
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.clone()
    }

    pub fn recent(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.buffer.iter()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
