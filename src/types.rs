use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub roi: Option<Roi>,
    pub preprocess: PreprocessConfig,
    pub hough: HoughConfig,
    pub extractor: ExtractorConfig,
    pub height: HeightConfig,
    pub alert: AlertConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub device_index: i32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Directory of still images used instead of the camera.
    pub frames_dir: Option<String>,
    pub headless: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            frame_width: 640,
            frame_height: 480,
            frames_dir: None,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorConversion {
    /// Luma (ITU-R BT.601) grayscale
    Gray,
    /// HSV value channel, max(r, g, b)
    HsvValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub color: ColorConversion,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Thresholds for the edge view shown next to the annotated crop
    pub display_canny_low: f32,
    pub display_canny_high: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            color: ColorConversion::Gray,
            canny_low: 100.0,
            canny_high: 120.0,
            display_canny_low: 1.0,
            display_canny_high: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    pub rho: f32,
    pub theta_deg: f32,
    pub threshold: u32,
    pub min_line_length: u32,
    pub max_line_gap: u32,
    pub max_lines: usize,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta_deg: 1.0,
            threshold: 20,
            min_line_length: 20,
            max_line_gap: 480,
            max_lines: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// First segment in detector output order
    First,
    Longest,
    /// Segment whose slope is the median of all detected slopes
    MedianSlope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub selection: SelectionStrategy,
    pub min_slope: f64,
    pub max_slope: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            selection: SelectionStrategy::First,
            min_slope: 0.0,
            max_slope: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightConfig {
    /// Height is `reference - y2` in ROI pixel rows
    pub reference: f64,
}

impl Default for HeightConfig {
    fn default() -> Self {
        Self { reference: 150.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    Always,
    Hysteresis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: f64,
    pub reset: ResetMode,
    pub hysteresis_margin: f64,
    pub sound_path: String,
    /// External player invoked as `<player> <sound_path>`. Defaults to the
    /// platform player; `none` only logs the alert.
    pub player: Option<String>,
    pub background: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 100.0,
            reset: ResetMode::Always,
            hysteresis_margin: 10.0,
            sound_path: "sound.mp3".to_string(),
            player: default_player().map(str::to_string),
            background: false,
        }
    }
}

impl AlertConfig {
    /// The player to run, if any. `none` (any case) and blank disable playback.
    pub fn player_command(&self) -> Option<&str> {
        self.player
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("none"))
    }
}

fn default_player() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("afplay")
    } else if cfg!(target_os = "linux") {
        Some("paplay")
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub samples_path: String,
    pub plot_path: Option<String>,
    pub report_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            samples_path: "Saved.txt".to_string(),
            plot_path: Some("trend.png".to_string()),
            report_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One acquisition instant, RGB.
pub type Frame = RgbImage;

/// Binary edge raster, 0 or 255, same size as the cropped ROI.
pub type EdgeMap = GrayImage;

/// Region of interest in source-frame pixels. Fixed for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    #[cfg(any(test, feature = "camera"))]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the ROI is non-empty and lies inside a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

/// Line segment in ROI pixel coordinates, as returned by the Hough transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Segment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Δy/Δx; a vertical segment has slope +inf.
    pub fn slope(&self) -> f64 {
        let dx = self.x2 - self.x1;
        if dx == 0 {
            return f64::INFINITY;
        }
        (self.y2 - self.y1) as f64 / dx as f64
    }

    pub fn length(&self) -> f64 {
        let dx = (self.x2 - self.x1) as f64;
        let dy = (self.y2 - self.y1) as f64;
        dx.hypot(dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightSample {
    pub index: usize,
    pub height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_segment_has_infinite_slope() {
        assert_eq!(Segment::new(5, 0, 5, 30).slope(), f64::INFINITY);
    }

    #[test]
    fn test_slope_sign_follows_image_rows() {
        assert!((Segment::new(0, 10, 20, 12).slope() - 0.1).abs() < 1e-12);
        assert!(Segment::new(0, 12, 20, 10).slope() < 0.0);
    }

    #[test]
    fn test_roi_bounds() {
        assert!(Roi::new(10, 10, 100, 50).fits_within(640, 480));
        assert!(Roi::new(600, 0, 40, 480).fits_within(640, 480));
        assert!(!Roi::new(600, 0, 41, 480).fits_within(640, 480));
        assert!(!Roi::new(0, 0, 0, 10).fits_within(640, 480));
        assert!(!Roi::new(u32::MAX, 0, 2, 2).fits_within(640, 480));
    }

    #[test]
    fn test_partial_config_uses_reference_defaults() {
        let config: Config = serde_yaml::from_str("alert:\n  threshold: 120\n").unwrap();
        assert_eq!(config.alert.threshold, 120.0);
        assert_eq!(config.alert.reset, ResetMode::Always);
        assert_eq!(config.height.reference, 150.0);
        assert_eq!(config.hough.threshold, 20);
        assert_eq!(config.extractor.selection, SelectionStrategy::First);
        assert!(config.roi.is_none());
    }
}
