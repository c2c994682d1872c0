// src/sample_log.rs
//
// Plain-text sample log, one `<index>,<height>` line per sample.

use crate::types::HeightSample;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Append every sample to `path`, creating the file if needed.
pub fn append_samples(path: &Path, samples: &[HeightSample]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open sample log {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    for sample in samples {
        writeln!(writer, "{},{}", sample.index, sample.height)?;
    }
    writer.flush()?;

    info!("✓ Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Parse a sample log back into samples, in file order.
pub fn read_samples(path: &Path) -> Result<Vec<HeightSample>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open sample log {}", path.display()))?;

    let mut samples = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (index, height) = line
            .split_once(',')
            .with_context(|| format!("line {}: expected `<index>,<height>`", line_no + 1))?;
        samples.push(HeightSample {
            index: index
                .trim()
                .parse()
                .with_context(|| format!("line {}: bad index {:?}", line_no + 1, index))?,
            height: height
                .trim()
                .parse()
                .with_context(|| format!("line {}: bad height {:?}", line_no + 1, height))?,
        });
    }
    Ok(samples)
}
