// src/pipeline/report.rs
//
// End-of-session summary: counters, trend figures and timing.

use super::metrics::MetricsSummary;
use super::session::StopReason;
use crate::trend::{TrendError, TrendModel};
use crate::types::Roi;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub roi: Option<Roi>,
    pub sample_count: usize,
    pub metrics: MetricsSummary,
    pub trend: Option<TrendModel>,
    pub trend_error: Option<String>,
}

impl SessionReport {
    pub fn new(
        started_at: DateTime<Utc>,
        stop_reason: StopReason,
        roi: Option<Roi>,
        sample_count: usize,
        metrics: MetricsSummary,
        trend: &Result<TrendModel, TrendError>,
    ) -> Self {
        let (trend, trend_error) = match trend {
            Ok(model) => (Some(model.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            started_at,
            stopped_at: Utc::now(),
            stop_reason,
            roi,
            sample_count,
            metrics,
            trend,
            trend_error,
        }
    }

    pub fn log(&self) {
        let m = &self.metrics;
        info!("\n========================================");
        info!("Session finished ({:?})", self.stop_reason);
        info!("========================================");
        info!("  Total frames: {}", m.total_frames);
        info!(
            "  Samples recorded: {} ({:.1}%)",
            self.sample_count,
            100.0 * self.sample_count as f64 / m.total_frames.max(1) as f64
        );
        info!("  Frames without a line: {}", m.frames_without_line);
        info!("  Rejected by slope gate: {}", m.gate_rejections);
        if m.skipped_frames > 0 {
            warn!("  Skipped frames: {}", m.skipped_frames);
        }
        info!("  🔔 Alerts fired: {}", m.alerts_fired);
        if m.alert_failures > 0 {
            warn!("  🔕 Alert failures: {}", m.alert_failures);
        }
        info!("  Processing speed: {:.1} FPS", m.fps);
    }

    /// Write the report as pretty JSON, replacing any earlier file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write session report {}", path.display()))?;
        info!("💾 Session report saved to {}", path.display());
        Ok(())
    }
}

pub fn log_trend(model: &TrendModel) {
    info!("📈 Predicted heights: {:?}", model.predicted);
    if model.r_squared_defined() {
        info!("  R² score: {:.4}", model.r_squared);
    } else {
        warn!("  R² score undefined: every height was identical");
    }
    info!("  Intercept: {:.4}", model.intercept);
    info!("  Slope: {:.4}", model.slope);
    info!("  Mean squared error: {:.4}", model.mse);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::metrics::SessionMetrics;
    use crate::trend::fit_trend;
    use crate::types::HeightSample;

    fn samples() -> Vec<HeightSample> {
        [100.0, 102.0, 104.0]
            .iter()
            .enumerate()
            .map(|(index, &height)| HeightSample { index, height })
            .collect()
    }

    #[test]
    fn test_report_carries_trend() {
        let fit = fit_trend(&samples());
        let report = SessionReport::new(
            Utc::now(),
            StopReason::EndOfStream,
            Some(Roi::new(0, 0, 10, 10)),
            3,
            SessionMetrics::new().summary(),
            &fit,
        );
        let model = report.trend.as_ref().unwrap();
        assert!((model.slope - 2.0).abs() < 1e-9);
        assert!(report.trend_error.is_none());
        assert!(report.stopped_at >= report.started_at);
    }

    #[test]
    fn test_report_records_insufficient_samples() {
        let fit = fit_trend(&samples()[..1]);
        let report = SessionReport::new(
            Utc::now(),
            StopReason::QuitKey,
            None,
            1,
            SessionMetrics::new().summary(),
            &fit,
        );
        assert!(report.trend.is_none());
        assert!(report.trend_error.unwrap().contains("got 1"));
    }

    #[test]
    fn test_save_writes_json() {
        let path = std::env::temp_dir().join(format!(
            "level_monitor_report_{}.json",
            std::process::id()
        ));
        let fit = fit_trend(&samples());
        let report = SessionReport::new(
            Utc::now(),
            StopReason::Interrupted,
            None,
            3,
            SessionMetrics::new().summary(),
            &fit,
        );
        report.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["stop_reason"], "Interrupted");
        assert_eq!(value["sample_count"], 3);
        assert_eq!(value["trend"]["predicted"].as_array().unwrap().len(), 3);
        fs::remove_file(&path).ok();
    }
}
