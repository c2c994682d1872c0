use crate::types::{HeightConfig, HeightSample, Segment};

pub struct HeightEstimator {
    reference: f64,
}

impl HeightEstimator {
    pub fn new(config: &HeightConfig) -> Self {
        Self {
            reference: config.reference,
        }
    }

    /// Height above the segment's second endpoint: `reference - y2`.
    pub fn estimate(&self, segment: &Segment) -> f64 {
        self.reference - segment.y2 as f64
    }
}

/// Ordered, append-only height measurements for one session.
#[derive(Debug, Clone, Default)]
pub struct SampleSequence {
    samples: Vec<HeightSample>,
}

impl SampleSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a height; the index is the position in the sequence.
    pub fn push(&mut self, height: f64) -> HeightSample {
        let sample = HeightSample {
            index: self.samples.len(),
            height,
        };
        self.samples.push(sample);
        sample
    }

    pub fn as_slice(&self) -> &[HeightSample] {
        &self.samples
    }

    pub fn into_vec(self) -> Vec<HeightSample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_uses_second_endpoint() {
        let estimator = HeightEstimator::new(&HeightConfig::default());
        assert_eq!(estimator.estimate(&Segment::new(0, 60, 80, 50)), 100.0);
        assert_eq!(estimator.estimate(&Segment::new(0, 49, 80, 49)), 101.0);
        assert_eq!(estimator.estimate(&Segment::new(0, 0, 80, 200)), -50.0);
    }

    #[test]
    fn test_indices_follow_sequence_position() {
        let mut seq = SampleSequence::new();
        seq.push(12.0);
        seq.push(14.5);
        let third = seq.push(13.0);
        assert_eq!(third.index, 2);
        let indices: Vec<usize> = seq.as_slice().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
