// src/pipeline/metrics.rs
//
// Per-session counters, logged in the final summary and saved with the
// session report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_without_line: Arc<AtomicU64>,
    pub gate_rejections: Arc<AtomicU64>,
    pub samples_recorded: Arc<AtomicU64>,
    pub alerts_fired: Arc<AtomicU64>,
    pub alert_failures: Arc<AtomicU64>,
    pub skipped_frames: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_without_line: Arc::new(AtomicU64::new(0)),
            gate_rejections: Arc::new(AtomicU64::new(0)),
            samples_recorded: Arc::new(AtomicU64::new(0)),
            alerts_fired: Arc::new(AtomicU64::new(0)),
            alert_failures: Arc::new(AtomicU64::new(0)),
            skipped_frames: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            frames_without_line: self.frames_without_line.load(Ordering::Relaxed),
            gate_rejections: self.gate_rejections.load(Ordering::Relaxed),
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
            alert_failures: self.alert_failures.load(Ordering::Relaxed),
            skipped_frames: self.skipped_frames.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_without_line: u64,
    pub gate_rejections: u64,
    pub samples_recorded: u64,
    pub alerts_fired: u64,
    pub alert_failures: u64,
    pub skipped_frames: u64,
    pub elapsed_secs: f64,
}
