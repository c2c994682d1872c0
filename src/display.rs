// src/display.rs
//
// Outer-surface traits: where frames are shown and how the ROI is chosen.

use crate::types::{Frame, Roi};
use anyhow::{bail, Result};
use image::{GrayImage, RgbImage};
use tracing::trace;

pub const LINE_WINDOW: &str = "Detected Line";
pub const EDGE_WINDOW: &str = "Edged Frame";

#[derive(Clone, Copy)]
pub enum DisplayImage<'a> {
    Rgb(&'a RgbImage),
    Gray(&'a GrayImage),
}

impl DisplayImage<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DisplayImage::Rgb(img) => img.dimensions(),
            DisplayImage::Gray(img) => img.dimensions(),
        }
    }
}

/// Purely observational sink for per-frame visuals.
pub trait DisplaySink {
    fn show(&mut self, window: &str, image: DisplayImage<'_>) -> Result<()>;

    /// Poll for the quit key. Called once per loop iteration.
    fn quit_requested(&mut self) -> Result<bool>;
}

/// Headless runs: nothing is shown and quitting is left to Ctrl-C.
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn show(&mut self, window: &str, image: DisplayImage<'_>) -> Result<()> {
        let (w, h) = image.dimensions();
        trace!("{}: {}x{} frame not shown (headless)", window, w, h);
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Chooses the ROI once from the first frame.
pub trait RoiSelector {
    fn select(&mut self, first_frame: &Frame) -> Result<Roi>;
}

/// ROI taken from configuration.
pub struct FixedRoi(pub Roi);

impl RoiSelector for FixedRoi {
    fn select(&mut self, first_frame: &Frame) -> Result<Roi> {
        let (w, h) = first_frame.dimensions();
        if !self.0.fits_within(w, h) {
            bail!("Configured ROI {:?} does not fit in a {}x{} frame", self.0, w, h);
        }
        Ok(self.0)
    }
}
