// src/plot.rs
//
// Measured-vs-predicted chart of the session's heights.

use crate::trend::TrendModel;
use crate::types::HeightSample;
use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use std::path::PathBuf;
use tracing::info;

pub const CHART_WIDTH: u32 = 800;
pub const CHART_HEIGHT: u32 = 500;
pub const CHART_MARGIN: u32 = 60;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

pub const CHART_TITLE: &str = "Water Level Over Time";
const X_LABEL: &str = "Time (frames)";
const Y_LABEL: &str = "Height (pixels)";

static CHART_FONT: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/DejaVuSans.ttf"
));

/// Receives the final chart once the session is over.
pub trait PlotSink {
    fn present(&mut self, samples: &[HeightSample], model: &TrendModel) -> Result<()>;
}

pub struct PngPlotSink {
    path: PathBuf,
}

impl PngPlotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlotSink for PngPlotSink {
    fn present(&mut self, samples: &[HeightSample], model: &TrendModel) -> Result<()> {
        let chart = render_chart(samples, &model.predicted)?;
        chart
            .save(&self.path)
            .with_context(|| format!("Failed to save chart {}", self.path.display()))?;
        info!("📈 Trend chart saved to {}", self.path.display());
        Ok(())
    }
}

/// Maps data coordinates onto the plot area inside the margins.
struct Axes {
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Axes {
    fn fit(samples: &[HeightSample], predicted: &[f64]) -> Self {
        let x_max = samples.iter().map(|s| s.index).max().unwrap_or(0).max(1) as f64;
        let ys = samples.iter().map(|s| s.height).chain(predicted.iter().copied());
        let (mut y_min, mut y_max) = ys
            .filter(|y| y.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
                (lo.min(y), hi.max(y))
            });
        if !y_min.is_finite() {
            (y_min, y_max) = (0.0, 1.0);
        }
        if y_max - y_min < 1e-9 {
            y_min -= 1.0;
            y_max += 1.0;
        }
        let pad = (y_max - y_min) * 0.05;
        Self {
            x_max,
            y_min: y_min - pad,
            y_max: y_max + pad,
        }
    }

    fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let plot_w = (CHART_WIDTH - 2 * CHART_MARGIN) as f64;
        let plot_h = (CHART_HEIGHT - 2 * CHART_MARGIN) as f64;
        let px = CHART_MARGIN as f64 + x / self.x_max * plot_w;
        let py = (CHART_HEIGHT - CHART_MARGIN) as f64
            - (y - self.y_min) / (self.y_max - self.y_min) * plot_h;
        (px as f32, py as f32)
    }
}

/// Black dots for measured heights, a blue line for the fitted trend, with
/// title, axis labels and legend.
pub fn render_chart(samples: &[HeightSample], predicted: &[f64]) -> Result<RgbImage> {
    let font = FontRef::try_from_slice(CHART_FONT).context("Chart font is unreadable")?;
    let mut img = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let axes = Axes::fit(samples, predicted);

    let left = CHART_MARGIN as f32;
    let right = (CHART_WIDTH - CHART_MARGIN) as f32;
    let top = CHART_MARGIN as f32;
    let bottom = (CHART_HEIGHT - CHART_MARGIN) as f32;

    for i in 1..5 {
        let y = top + (bottom - top) * i as f32 / 5.0;
        draw_line_segment_mut(&mut img, (left, y), (right, y), GRID);
    }
    draw_line_segment_mut(&mut img, (left, bottom), (right, bottom), BLACK);
    draw_line_segment_mut(&mut img, (left, top), (left, bottom), BLACK);

    for (s, p) in samples.windows(2).zip(predicted.windows(2)) {
        let a = axes.to_pixel(s[0].index as f64, p[0]);
        let b = axes.to_pixel(s[1].index as f64, p[1]);
        draw_line_segment_mut(&mut img, a, b, BLUE);
    }

    for s in samples {
        let (x, y) = axes.to_pixel(s.index as f64, s.height);
        draw_filled_circle_mut(&mut img, (x.round() as i32, y.round() as i32), 2, BLACK);
    }

    draw_labels(&mut img, &font, &axes);
    Ok(img)
}

fn draw_labels(img: &mut RgbImage, font: &FontRef<'_>, axes: &Axes) {
    let title = PxScale::from(24.0);
    let label = PxScale::from(16.0);
    let small = PxScale::from(13.0);

    let centered = |scale: PxScale, text: &str| {
        let (w, _) = text_size(scale, font, text);
        (CHART_WIDTH as i32 - w as i32) / 2
    };

    draw_text_mut(img, BLACK, centered(title, CHART_TITLE), 18, title, font, CHART_TITLE);
    let x_label_y = (CHART_HEIGHT - CHART_MARGIN) as i32 + 26;
    draw_text_mut(img, BLACK, centered(label, X_LABEL), x_label_y, label, font, X_LABEL);
    draw_text_mut(img, BLACK, 8, CHART_MARGIN as i32 - 22, label, font, Y_LABEL);

    // Axis extents
    let left = CHART_MARGIN as i32;
    let bottom = (CHART_HEIGHT - CHART_MARGIN) as i32;
    let y_max = format!("{:.0}", axes.y_max);
    let y_min = format!("{:.0}", axes.y_min);
    let x_max = format!("{:.0}", axes.x_max);
    draw_text_mut(img, BLACK, 8, CHART_MARGIN as i32, small, font, &y_max);
    draw_text_mut(img, BLACK, 8, bottom - 14, small, font, &y_min);
    draw_text_mut(img, BLACK, left, bottom + 4, small, font, "0");
    let (w, _) = text_size(small, font, &x_max);
    let right = (CHART_WIDTH - CHART_MARGIN) as i32;
    draw_text_mut(img, BLACK, right - w as i32, bottom + 4, small, font, &x_max);

    // Legend, top right of the plot area
    let lx = right - 120;
    let ly = CHART_MARGIN as i32 + 10;
    draw_filled_circle_mut(img, (lx + 10, ly + 8), 3, BLACK);
    draw_text_mut(img, BLACK, lx + 28, ly, label, font, "Measured");
    draw_line_segment_mut(
        img,
        (lx as f32, (ly + 30) as f32),
        ((lx + 20) as f32, (ly + 30) as f32),
        BLUE,
    );
    draw_text_mut(img, BLUE, lx + 28, ly + 22, label, font, "Predicted");
}
