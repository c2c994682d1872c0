use crate::types::{Config, ResetMode};
use anyhow::{bail, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.preprocess;
        if p.canny_low < 0.0 || p.canny_low > p.canny_high {
            bail!(
                "preprocess: need 0 <= canny_low <= canny_high (got {} / {})",
                p.canny_low,
                p.canny_high
            );
        }

        let h = &self.hough;
        if h.rho <= 0.0 || h.theta_deg <= 0.0 || h.theta_deg > 180.0 {
            bail!("hough: rho must be > 0 and theta_deg in (0, 180]");
        }
        if h.threshold == 0 || h.max_lines == 0 {
            bail!("hough: threshold and max_lines must be at least 1");
        }

        let e = &self.extractor;
        if !(e.min_slope <= e.max_slope) {
            bail!(
                "extractor: min_slope {} exceeds max_slope {}",
                e.min_slope,
                e.max_slope
            );
        }

        let a = &self.alert;
        if a.reset == ResetMode::Hysteresis && a.hysteresis_margin < 0.0 {
            bail!("alert: hysteresis_margin must not be negative");
        }

        if let Some(roi) = self.roi {
            if roi.is_empty() {
                bail!("roi: width and height must be non-zero");
            }
        }

        Ok(())
    }
}
