// src/preprocessing.rs

use crate::types::{ColorConversion, EdgeMap, Frame, PreprocessConfig, Roi};
use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("ROI {roi:?} does not fit in a {width}x{height} frame")]
    RoiOutOfBounds { roi: Roi, width: u32, height: u32 },
}

/// ROI crop of one frame together with its edge map.
pub struct Preprocessed {
    pub crop: RgbImage,
    pub edges: EdgeMap,
}

pub struct FramePreprocessor {
    color: ColorConversion,
    canny_low: f32,
    canny_high: f32,
}

impl FramePreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            color: config.color,
            canny_low: config.canny_low,
            canny_high: config.canny_high,
        }
    }

    /// Crop to the ROI, convert to a single channel and run Canny.
    pub fn process(&self, frame: &Frame, roi: Roi) -> Result<Preprocessed, PreprocessError> {
        let crop = crop_to_roi(frame, roi)?;
        let channel = convert_color(&crop, self.color);
        let edges = canny(&channel, self.canny_low, self.canny_high);
        Ok(Preprocessed { crop, edges })
    }
}

pub fn crop_to_roi(frame: &Frame, roi: Roi) -> Result<RgbImage, PreprocessError> {
    let (width, height) = frame.dimensions();
    if !roi.fits_within(width, height) {
        return Err(PreprocessError::RoiOutOfBounds { roi, width, height });
    }
    Ok(imageops::crop_imm(frame, roi.x, roi.y, roi.width, roi.height).to_image())
}

pub fn convert_color(image: &RgbImage, conversion: ColorConversion) -> GrayImage {
    match conversion {
        ColorConversion::Gray => imageops::grayscale(image),
        ColorConversion::HsvValue => GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b] = image.get_pixel(x, y).0;
            Luma([r.max(g).max(b)])
        }),
    }
}

/// Edge view of an (annotated) crop for display.
pub fn edge_visualization(image: &RgbImage, low: f32, high: f32) -> GrayImage {
    canny(&imageops::grayscale(image), low, high)
}
