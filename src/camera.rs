// src/camera.rs
//
// OpenCV-backed collaborators: live capture, interactive ROI selection,
// HighGUI windows and the end-of-session chart window.

use crate::display::{DisplayImage, DisplaySink, RoiSelector};
use crate::plot::{render_chart, PlotSink, CHART_TITLE};
use crate::trend::TrendModel;
use crate::types::{Frame, HeightSample, Roi, VideoConfig};
use crate::video_processor::FrameSource;
use anyhow::{bail, Context, Result};
use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, CV_8UC1, CV_8UC3},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use tracing::info;

const ROI_WINDOW: &str = "Select ROI";

pub struct CameraSource {
    cap: VideoCapture,
}

impl CameraSource {
    pub fn open(config: &VideoConfig) -> Result<Self> {
        info!("Opening camera {}", config.device_index);

        let mut cap = VideoCapture::new(config.device_index, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            bail!("Failed to open camera {}", config.device_index);
        }

        cap.set(videoio::CAP_PROP_FRAME_WIDTH, config.frame_width as f64)?;
        cap.set(videoio::CAP_PROP_FRAME_HEIGHT, config.frame_height as f64)?;

        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)?;
        info!("Camera properties: {}x{}", width, height);

        Ok(Self { cap })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }
        Ok(Some(mat_to_rgb(&mat)?))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.cap.release();
    }
}

fn mat_to_rgb(bgr: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let data = rgb.data_bytes()?.to_vec();
    RgbImage::from_raw(rgb.cols() as u32, rgb.rows() as u32, data)
        .context("Frame buffer size does not match its dimensions")
}

fn rgb_to_mat(img: &RgbImage) -> Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        img.height() as i32,
        img.width() as i32,
        CV_8UC3,
        core::Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(img.as_raw());

    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

fn gray_to_mat(img: &GrayImage) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        img.height() as i32,
        img.width() as i32,
        CV_8UC1,
        core::Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(img.as_raw());
    Ok(mat)
}

/// HighGUI windows; `q` quits.
pub struct HighGuiDisplay;

impl DisplaySink for HighGuiDisplay {
    fn show(&mut self, window: &str, image: DisplayImage<'_>) -> Result<()> {
        let mat = match image {
            DisplayImage::Rgb(img) => rgb_to_mat(img)?,
            DisplayImage::Gray(img) => gray_to_mat(img)?,
        };
        highgui::imshow(window, &mat)?;
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool> {
        let key = highgui::wait_key(1)?;
        Ok(key & 0xFF == 'q' as i32)
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}

/// Lets the operator drag the ROI over the first frame.
pub struct HighGuiRoiSelector;

impl RoiSelector for HighGuiRoiSelector {
    fn select(&mut self, first_frame: &Frame) -> Result<Roi> {
        let mat = rgb_to_mat(first_frame)?;
        let rect = highgui::select_roi_def(ROI_WINDOW, &mat)?;
        highgui::destroy_window(ROI_WINDOW)?;

        if rect.width <= 0 || rect.height <= 0 {
            bail!("ROI selection was cancelled or empty");
        }
        let roi = Roi::new(
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        );
        info!("✓ ROI selected: {:?}", roi);
        Ok(roi)
    }
}

/// Shows the chart and blocks until a key is pressed.
pub struct HighGuiPlotSink;

impl PlotSink for HighGuiPlotSink {
    fn present(&mut self, samples: &[HeightSample], model: &TrendModel) -> Result<()> {
        let chart = rgb_to_mat(&render_chart(samples, &model.predicted)?)?;
        highgui::imshow(CHART_TITLE, &chart)?;
        info!("📈 Showing trend chart, press any key to close");
        highgui::wait_key(0)?;
        highgui::destroy_window(CHART_TITLE)?;
        Ok(())
    }
}
