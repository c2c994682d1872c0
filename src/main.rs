// src/main.rs

mod alert;
#[cfg(feature = "camera")]
mod camera;
mod config;
mod debug;
mod display;
mod height;
mod hough;
mod line_detection;
mod pipeline;
mod plot;
mod preprocessing;
mod sample_log;
mod trend;
mod types;
mod video_processor;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use display::{DisplaySink, FixedRoi, NullDisplay, RoiSelector};
use pipeline::{log_trend, SessionContext, SessionReport, StopReason};
use plot::{PlotSink, PngPlotSink};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trend::TrendError;
use types::Config;
use video_processor::{FrameSource, ImageSequenceSource};

#[derive(Parser, Debug)]
#[command(version, about = "Liquid level line monitor")]
struct Args {
    /// Path to the YAML configuration
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Replay a directory of image frames instead of the camera
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Camera device index (overrides video.device_index)
    #[arg(long)]
    camera: Option<i32>,

    /// Run without any windows
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(dir) = &args.frames {
        config.video.frames_dir = Some(dir.to_string_lossy().into_owned());
    }
    if let Some(index) = args.camera {
        config.video.device_index = index;
    }
    config.video.headless |= args.headless;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("level_monitor={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("💧 Liquid Level Monitor Starting");
    info!("✓ Configuration loaded from {}", args.config);
    info!(
        "Alert threshold {} ({:?} reset), slope gate [{}, {}]",
        config.alert.threshold,
        config.alert.reset,
        config.extractor.min_slope,
        config.extractor.max_slope
    );

    let started_at = Utc::now();
    info!("Start time: {}", started_at.format("%Y-%m-%d %H:%M:%S"));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    // The frame loop is synchronous and owns HighGUI state, so it runs in
    // place on this worker rather than being moved to another thread.
    let outcome = tokio::task::block_in_place(|| run_session(&config, &stop))?;

    finish_session(&config, started_at, outcome)
}

struct SessionOutcome {
    stop_reason: StopReason,
    roi: types::Roi,
    samples: Vec<types::HeightSample>,
    metrics: pipeline::metrics::MetricsSummary,
}

fn run_session(config: &Config, stop: &AtomicBool) -> Result<SessionOutcome> {
    let mut source = open_source(config)?;
    let mut selector = roi_selector(config)?;
    let mut display = display_sink(config);

    let roi = pipeline::select_roi(source.as_mut(), selector.as_mut())
        .context("Could not establish the ROI")?;

    let sink = alert::sink_from_config(&config.alert)?;
    let mut session = SessionContext::new(config, roi, sink);

    info!("🎬 Monitoring started, press q in a window or Ctrl-C to stop");
    let stop_reason = pipeline::run(&mut session, source.as_mut(), display.as_mut(), stop);

    info!(
        "Recorded {} samples, last height {:?}, alert {:?}",
        session.samples().len(),
        session.last_height(),
        session.alert_state()
    );
    let metrics = session.metrics().summary();
    Ok(SessionOutcome {
        stop_reason,
        roi: session.roi(),
        samples: session.into_samples().into_vec(),
        metrics,
    })
}

fn finish_session(
    config: &Config,
    started_at: chrono::DateTime<Utc>,
    outcome: SessionOutcome,
) -> Result<()> {
    let samples = &outcome.samples;

    let log_path = Path::new(&config.output.samples_path);
    match sample_log::append_samples(log_path, samples) {
        Ok(()) => match sample_log::read_samples(log_path) {
            Ok(all) => info!("Sample log now holds {} samples", all.len()),
            Err(e) => warn!("Sample log could not be read back: {:#}", e),
        },
        Err(e) => error!("Failed to persist samples: {:#}", e),
    }

    let fit = trend::fit_trend(samples);
    match &fit {
        Ok(model) => {
            log_trend(model);
            for mut plot in plot_sinks(config) {
                if let Err(e) = plot.present(samples, model) {
                    warn!("Could not present trend chart: {:#}", e);
                }
            }
        }
        Err(TrendError::InsufficientSamples { count }) => {
            warn!("⚠️ Only {} sample(s) recorded, skipping trend analysis", count);
        }
    }

    let report = SessionReport::new(
        started_at,
        outcome.stop_reason,
        Some(outcome.roi),
        samples.len(),
        outcome.metrics,
        &fit,
    );
    report.log();
    info!("Stop time: {}", report.stopped_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(path) = &config.output.report_path {
        if let Err(e) = report.save(Path::new(path)) {
            error!("{:#}", e);
        }
    }

    Ok(())
}

fn open_source(config: &Config) -> Result<Box<dyn FrameSource>> {
    if let Some(dir) = &config.video.frames_dir {
        let source = ImageSequenceSource::open(Path::new(dir))?;
        info!("Replaying {} frames", source.len());
        return Ok(Box::new(source));
    }

    #[cfg(feature = "camera")]
    return Ok(Box::new(camera::CameraSource::open(&config.video)?));

    #[cfg(not(feature = "camera"))]
    bail!("No frames directory given and the camera feature is not enabled");
}

fn roi_selector(config: &Config) -> Result<Box<dyn RoiSelector>> {
    if let Some(roi) = config.roi {
        info!("Using configured ROI {:?}", roi);
        return Ok(Box::new(FixedRoi(roi)));
    }

    #[cfg(feature = "camera")]
    {
        if !config.video.headless {
            return Ok(Box::new(camera::HighGuiRoiSelector));
        }
    }
    bail!("No ROI configured and interactive selection is unavailable")
}

fn display_sink(config: &Config) -> Box<dyn DisplaySink> {
    #[cfg(feature = "camera")]
    {
        if !config.video.headless {
            return Box::new(camera::HighGuiDisplay);
        }
    }
    let _ = config;
    Box::new(NullDisplay)
}

fn plot_sinks(config: &Config) -> Vec<Box<dyn PlotSink>> {
    let mut sinks: Vec<Box<dyn PlotSink>> = Vec::new();
    if let Some(path) = &config.output.plot_path {
        sinks.push(Box::new(PngPlotSink::new(path.as_str())));
    }
    #[cfg(feature = "camera")]
    {
        if !config.video.headless {
            sinks.push(Box::new(camera::HighGuiPlotSink));
        }
    }
    sinks
}
