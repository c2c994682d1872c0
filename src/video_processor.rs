// src/video_processor.rs

use crate::types::Frame;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Pull-based frame source. `Ok(None)` means the stream has ended.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Replays a directory of still images in file-name order.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let image_extensions = ["png", "jpg", "jpeg", "bmp", "PNG", "JPG", "JPEG", "BMP"];

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| image_extensions.contains(&ext))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            bail!("No image frames found in {}", dir.display());
        }
        info!("Found {} frames in {}", paths.len(), dir.display());

        Ok(Self { paths, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        debug!("Reading frame {}", path.display());
        let frame = image::open(path)
            .with_context(|| format!("Failed to read frame {}", path.display()))?
            .to_rgb8();
        Ok(Some(frame))
    }
}
