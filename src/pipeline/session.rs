// src/pipeline/session.rs
//
// The acquisition loop and the per-session state it owns. Every frame goes
// preprocess -> extract -> estimate -> alert -> display before the next one
// is pulled from the source.

use super::frame_context::FrameContext;
use super::metrics::SessionMetrics;
use crate::alert::{AlertController, AlertSink, AlertState};
use crate::debug::visualize_line;
use crate::display::{DisplayImage, DisplaySink, RoiSelector, EDGE_WINDOW, LINE_WINDOW};
use crate::height::{HeightEstimator, SampleSequence};
use crate::line_detection::{LineExtractor, LineOutcome};
use crate::preprocessing::{edge_visualization, FramePreprocessor, PreprocessError};
use crate::types::{Config, Frame, HeightSample, Roi, Segment};
use crate::video_processor::FrameSource;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    EndOfStream,
    QuitKey,
    Interrupted,
    SourceError,
}

pub struct SessionContext {
    roi: Roi,
    preprocessor: FramePreprocessor,
    extractor: LineExtractor,
    estimator: HeightEstimator,
    alert: AlertController,
    samples: SampleSequence,
    last_height: Option<f64>,
    display_canny: (f32, f32),
    frames_seen: u64,
    metrics: SessionMetrics,
}

impl SessionContext {
    pub fn new(config: &Config, roi: Roi, sink: Box<dyn AlertSink>) -> Self {
        Self {
            roi,
            preprocessor: FramePreprocessor::new(&config.preprocess),
            extractor: LineExtractor::new(&config.hough, &config.extractor),
            estimator: HeightEstimator::new(&config.height),
            alert: AlertController::new(&config.alert, sink),
            samples: SampleSequence::new(),
            last_height: None,
            display_canny: (
                config.preprocess.display_canny_low,
                config.preprocess.display_canny_high,
            ),
            frames_seen: 0,
            metrics: SessionMetrics::new(),
        }
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn samples(&self) -> &[HeightSample] {
        self.samples.as_slice()
    }

    pub fn alert_state(&self) -> AlertState {
        self.alert.state()
    }

    pub fn last_height(&self) -> Option<f64> {
        self.last_height
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Run one frame through the whole pipeline.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        display: &mut dyn DisplaySink,
    ) -> Result<FrameContext, PreprocessError> {
        let frame_id = self.frames_seen;
        self.frames_seen += 1;
        self.metrics.inc(&self.metrics.total_frames);

        let pre = self.preprocessor.process(frame, self.roi)?;
        let outcome = self.extractor.extract(&pre.edges);
        let mut ctx = FrameContext::new(frame_id, outcome);

        match outcome {
            LineOutcome::NoLine => self.metrics.inc(&self.metrics.frames_without_line),
            LineOutcome::Rejected { .. } => self.metrics.inc(&self.metrics.gate_rejections),
            LineOutcome::Accepted { segment, .. } => {
                let height = self.estimator.estimate(&segment);

                let sample = self.samples.push(height);
                self.metrics.inc(&self.metrics.samples_recorded);

                let decision = self.alert.evaluate(height);
                if decision.fired {
                    self.metrics.inc(&self.metrics.alerts_fired);
                }
                if decision.sink_failed {
                    self.metrics.inc(&self.metrics.alert_failures);
                }

                self.last_height = Some(height);
                self.show_detection(&pre.crop, &segment, display);

                ctx.sample = Some(sample);
                ctx.alert = Some(decision);
            }
        }

        Ok(ctx)
    }

    fn show_detection(&self, crop: &Frame, segment: &Segment, display: &mut dyn DisplaySink) {
        let annotated = visualize_line(crop, segment);
        let (low, high) = self.display_canny;
        let edged = edge_visualization(&annotated, low, high);

        let shown = display
            .show(LINE_WINDOW, DisplayImage::Rgb(&annotated))
            .and_then(|_| display.show(EDGE_WINDOW, DisplayImage::Gray(&edged)));
        if let Err(e) = shown {
            warn!("Display update failed: {:#}", e);
        }
    }

    pub fn into_samples(self) -> SampleSequence {
        self.samples
    }
}

/// Pull the first frame and fix the ROI for the rest of the session.
pub fn select_roi(source: &mut dyn FrameSource, selector: &mut dyn RoiSelector) -> Result<Roi> {
    let first = source
        .next_frame()?
        .context("Video source produced no frames")?;
    let roi = selector.select(&first)?;
    let (width, height) = first.dimensions();
    if !roi.fits_within(width, height) {
        bail!("ROI {:?} does not fit in a {}x{} frame", roi, width, height);
    }
    info!(
        "✓ ROI fixed at ({}, {}) {}x{}",
        roi.x, roi.y, roi.width, roi.height
    );
    Ok(roi)
}

/// Drive the loop until the stream ends, the quit key is pressed or `stop`
/// is raised. A frame is always finished before the stop conditions are
/// checked again.
pub fn run(
    session: &mut SessionContext,
    source: &mut dyn FrameSource,
    display: &mut dyn DisplaySink,
    stop: &AtomicBool,
) -> StopReason {
    loop {
        if stop.load(Ordering::SeqCst) {
            info!("⚠️ Interrupt received, stopping acquisition");
            return StopReason::Interrupted;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("End of stream");
                return StopReason::EndOfStream;
            }
            Err(e) => {
                error!("Frame acquisition failed: {:#}", e);
                return StopReason::SourceError;
            }
        };

        match session.process_frame(&frame, display) {
            Ok(ctx) => log_frame(&ctx),
            Err(e) => {
                warn!("Frame skipped: {}", e);
                session.metrics.inc(&session.metrics.skipped_frames);
            }
        }

        match display.quit_requested() {
            Ok(true) => {
                info!("Quit key pressed");
                return StopReason::QuitKey;
            }
            Ok(false) => {}
            Err(e) => warn!("Key poll failed: {:#}", e),
        }
    }
}

fn log_frame(ctx: &FrameContext) {
    match (ctx.outcome, ctx.sample, ctx.alert) {
        (LineOutcome::Accepted { slope, .. }, Some(sample), Some(alert)) => debug!(
            "Frame {}: detected height {} (sample {}, slope {:.3}, alert {:?}{})",
            ctx.frame_id,
            sample.height,
            sample.index,
            slope,
            alert.state,
            if ctx.alert_fired() { ", fired" } else { "" }
        ),
        (LineOutcome::Rejected { segment, slope }, _, _) => debug!(
            "Frame {}: line at row {} rejected, slope {:.3}",
            ctx.frame_id, segment.y2, slope
        ),
        _ => debug!("Frame {}: no line", ctx.frame_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertError;
    use crate::display::{FixedRoi, NullDisplay};
    use crate::types::ResetMode;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    const ROI: Roi = Roi {
        x: 20,
        y: 20,
        width: 160,
        height: 120,
    };

    struct VecSource {
        frames: std::vec::IntoIter<Frame>,
    }

    impl VecSource {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                frames: frames.into_iter(),
            }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.next())
        }
    }

    struct CountingSink(Arc<AtomicUsize>);

    impl AlertSink for CountingSink {
        fn trigger(&mut self, _sound: &str) -> Result<(), AlertError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Counts frames shown; asks to quit after `quit_after` polls.
    struct ScriptedDisplay {
        shown: usize,
        polls: usize,
        quit_after: Option<usize>,
    }

    impl DisplaySink for ScriptedDisplay {
        fn show(&mut self, _window: &str, _image: DisplayImage<'_>) -> Result<()> {
            self.shown += 1;
            Ok(())
        }

        fn quit_requested(&mut self) -> Result<bool> {
            self.polls += 1;
            Ok(self.quit_after.is_some_and(|n| self.polls >= n))
        }
    }

    /// Liquid surface at `level` rows below the top of the ROI.
    fn level_frame(level: u32) -> Frame {
        let boundary = ROI.y + level;
        RgbImage::from_fn(200, 160, |_, y| match y.cmp(&boundary) {
            std::cmp::Ordering::Less => Rgb([15, 15, 15]),
            std::cmp::Ordering::Equal => Rgb([125, 125, 125]),
            std::cmp::Ordering::Greater => Rgb([235, 235, 235]),
        })
    }

    /// Dark left half, bright right half: a vertical edge.
    fn wall_frame() -> Frame {
        RgbImage::from_fn(200, 160, |x, _| {
            if x < 100 {
                Rgb([15, 15, 15])
            } else {
                Rgb([235, 235, 235])
            }
        })
    }

    fn session(reset: ResetMode) -> (SessionContext, Arc<AtomicUsize>) {
        let mut config = Config::default();
        config.alert.reset = reset;
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink(calls.clone());
        (SessionContext::new(&config, ROI, Box::new(sink)), calls)
    }

    #[test]
    fn test_level_line_becomes_sample() {
        let (mut s, _) = session(ResetMode::Always);
        let ctx = s.process_frame(&level_frame(90), &mut NullDisplay).unwrap();

        let sample = ctx.sample.expect("flat surface should give a sample");
        assert_eq!(sample.index, 0);
        // 150 - ~90
        assert!((58.0..=62.0).contains(&sample.height), "{}", sample.height);
        assert_eq!(s.samples().len(), 1);
        assert_eq!(s.last_height(), Some(sample.height));
    }

    #[test]
    fn test_blank_frame_changes_nothing() {
        let (mut s, calls) = session(ResetMode::Hysteresis);
        s.process_frame(&level_frame(20), &mut NullDisplay).unwrap();
        assert_eq!(s.alert_state(), AlertState::Latched);

        let blank = RgbImage::from_pixel(200, 160, Rgb([128, 128, 128]));
        let ctx = s.process_frame(&blank, &mut NullDisplay).unwrap();

        assert_eq!(ctx.outcome, LineOutcome::NoLine);
        assert_eq!(s.samples().len(), 1);
        assert_eq!(s.alert_state(), AlertState::Latched);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_steep_line_is_gated_out() {
        let (mut s, calls) = session(ResetMode::Always);
        let mut display = ScriptedDisplay {
            shown: 0,
            polls: 0,
            quit_after: None,
        };
        let ctx = s.process_frame(&wall_frame(), &mut display).unwrap();

        assert!(matches!(ctx.outcome, LineOutcome::Rejected { .. }));
        assert!(ctx.sample.is_none());
        assert!(s.samples().is_empty());
        assert_eq!(display.shown, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_high_level_fires_on_every_frame_with_always_reset() {
        let (mut s, calls) = session(ResetMode::Always);
        for _ in 0..2 {
            let ctx = s.process_frame(&level_frame(20), &mut NullDisplay).unwrap();
            assert!(ctx.alert_fired());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_high_level_fires_once_with_hysteresis() {
        let (mut s, calls) = session(ResetMode::Hysteresis);
        s.process_frame(&level_frame(20), &mut NullDisplay).unwrap();
        s.process_frame(&level_frame(19), &mut NullDisplay).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.metrics().summary().alerts_fired, 1);
    }

    #[test]
    fn test_run_until_end_of_stream() {
        let (mut s, _) = session(ResetMode::Always);
        let frames = vec![level_frame(90), wall_frame(), level_frame(80)];
        let mut source = VecSource::new(frames);
        let mut display = ScriptedDisplay {
            shown: 0,
            polls: 0,
            quit_after: None,
        };

        let reason = run(&mut s, &mut source, &mut display, &AtomicBool::new(false));

        assert_eq!(reason, StopReason::EndOfStream);
        assert_eq!(s.samples().len(), 2);
        assert_eq!(display.polls, 3);
        // Line and edge windows per qualifying frame
        assert_eq!(display.shown, 4);
        let summary = s.metrics().summary();
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.gate_rejections, 1);
    }

    #[test]
    fn test_quit_key_stops_after_current_frame() {
        let (mut s, _) = session(ResetMode::Always);
        let mut source = VecSource::new(vec![level_frame(90); 5]);
        let mut display = ScriptedDisplay {
            shown: 0,
            polls: 0,
            quit_after: Some(2),
        };

        let reason = run(&mut s, &mut source, &mut display, &AtomicBool::new(false));

        assert_eq!(reason, StopReason::QuitKey);
        assert_eq!(s.samples().len(), 2);
    }

    #[test]
    fn test_raised_stop_flag_interrupts_before_reading() {
        let (mut s, _) = session(ResetMode::Always);
        let mut source = VecSource::new(vec![level_frame(90)]);
        let reason = run(&mut s, &mut source, &mut NullDisplay, &AtomicBool::new(true));
        assert_eq!(reason, StopReason::Interrupted);
        assert!(s.samples().is_empty());
    }

    #[test]
    fn test_frame_too_small_for_roi_is_skipped() {
        let (mut s, _) = session(ResetMode::Always);
        let tiny = RgbImage::new(50, 50);
        let mut source = VecSource::new(vec![tiny, level_frame(90)]);
        let reason = run(&mut s, &mut source, &mut NullDisplay, &AtomicBool::new(false));
        assert_eq!(reason, StopReason::EndOfStream);
        assert_eq!(s.samples().len(), 1);
        assert_eq!(s.metrics().summary().skipped_frames, 1);
    }

    #[test]
    fn test_roi_comes_from_first_frame() {
        let mut source = VecSource::new(vec![level_frame(10), level_frame(90)]);
        let roi = select_roi(&mut source, &mut FixedRoi(ROI)).unwrap();
        assert_eq!(roi, ROI);

        // First frame was consumed by the selection
        let (mut s, _) = session(ResetMode::Always);
        run(&mut s, &mut source, &mut NullDisplay, &AtomicBool::new(false));
        assert_eq!(s.samples().len(), 1);
        assert!(s.samples()[0].height < 100.0);
    }

    struct CancelledSelection;

    impl RoiSelector for CancelledSelection {
        fn select(&mut self, _first_frame: &Frame) -> Result<Roi> {
            bail!("ROI selection was cancelled or empty")
        }
    }

    #[test]
    fn test_cancelled_selection_is_an_error() {
        let mut source = VecSource::new(vec![level_frame(10)]);
        let err = select_roi(&mut source, &mut CancelledSelection).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_roi_outside_first_frame_is_an_error() {
        let mut source = VecSource::new(vec![RgbImage::new(100, 100)]);
        assert!(select_roi(&mut source, &mut FixedRoi(ROI)).is_err());
    }

    #[test]
    fn test_empty_source_cannot_select_roi() {
        let mut source = VecSource::new(Vec::new());
        assert!(select_roi(&mut source, &mut FixedRoi(ROI)).is_err());
    }
}
