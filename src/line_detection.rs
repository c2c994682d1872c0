use crate::hough::ProbabilisticHough;
use crate::types::{EdgeMap, ExtractorConfig, HoughConfig, Segment, SelectionStrategy};
use tracing::debug;

/// What the extractor made of one edge map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineOutcome {
    NoLine,
    /// Selected segment failed the slope gate
    Rejected { segment: Segment, slope: f64 },
    Accepted { segment: Segment, slope: f64 },
}

/// Inclusive slope window for near-horizontal lines.
#[derive(Debug, Clone, Copy)]
pub struct SlopeGate {
    pub min: f64,
    pub max: f64,
}

impl SlopeGate {
    /// An infinite (vertical) slope never passes.
    pub fn admits(&self, slope: f64) -> bool {
        slope.is_finite() && self.min <= slope && slope <= self.max
    }
}

pub fn select_segment(segments: &[Segment], strategy: SelectionStrategy) -> Option<Segment> {
    match strategy {
        SelectionStrategy::First => segments.first().copied(),
        SelectionStrategy::Longest => segments
            .iter()
            .copied()
            .max_by(|a, b| a.length().total_cmp(&b.length())),
        SelectionStrategy::MedianSlope => {
            let mut by_slope: Vec<Segment> = segments.to_vec();
            by_slope.sort_by(|a, b| a.slope().total_cmp(&b.slope()));
            by_slope.get(by_slope.len() / 2).copied()
        }
    }
}

pub struct LineExtractor {
    hough: ProbabilisticHough,
    strategy: SelectionStrategy,
    gate: SlopeGate,
}

impl LineExtractor {
    pub fn new(hough: &HoughConfig, extractor: &ExtractorConfig) -> Self {
        Self {
            hough: ProbabilisticHough::new(hough),
            strategy: extractor.selection,
            gate: SlopeGate {
                min: extractor.min_slope,
                max: extractor.max_slope,
            },
        }
    }

    pub fn extract(&self, edges: &EdgeMap) -> LineOutcome {
        let segments = self.hough.detect(edges);
        self.choose(&segments)
    }

    /// Selection and gating over an already-detected segment list.
    pub fn choose(&self, segments: &[Segment]) -> LineOutcome {
        let Some(segment) = select_segment(segments, self.strategy) else {
            return LineOutcome::NoLine;
        };

        let slope = segment.slope();
        if self.gate.admits(slope) {
            LineOutcome::Accepted { segment, slope }
        } else {
            debug!(
                "Segment ({},{})-({},{}) rejected, slope {:.3}",
                segment.x1, segment.y1, segment.x2, segment.y2, slope
            );
            LineOutcome::Rejected { segment, slope }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn extractor(strategy: SelectionStrategy) -> LineExtractor {
        LineExtractor::new(
            &HoughConfig::default(),
            &ExtractorConfig {
                selection: strategy,
                ..ExtractorConfig::default()
            },
        )
    }

    #[test]
    fn test_gate_bounds_are_inclusive() {
        let gate = SlopeGate { min: 0.0, max: 0.15 };
        assert!(gate.admits(0.0));
        assert!(gate.admits(0.15));
        assert!(!gate.admits(0.150001));
        assert!(!gate.admits(-0.01));
        assert!(!gate.admits(f64::INFINITY));
        assert!(!gate.admits(f64::NAN));
    }

    #[test]
    fn test_no_segments_means_no_line() {
        let ex = extractor(SelectionStrategy::First);
        assert_eq!(ex.choose(&[]), LineOutcome::NoLine);
    }

    #[test]
    fn test_first_strategy_ignores_better_later_segments() {
        let ex = extractor(SelectionStrategy::First);
        // Steep first segment, flat second one
        let segments = [Segment::new(0, 0, 10, 20), Segment::new(0, 50, 100, 52)];
        assert!(matches!(ex.choose(&segments), LineOutcome::Rejected { .. }));
    }

    #[test]
    fn test_longest_strategy() {
        let segments = [Segment::new(0, 0, 10, 0), Segment::new(0, 5, 90, 5)];
        assert_eq!(
            select_segment(&segments, SelectionStrategy::Longest),
            Some(segments[1])
        );
    }

    #[test]
    fn test_median_slope_strategy() {
        let segments = [
            Segment::new(0, 0, 10, 10),
            Segment::new(0, 0, 100, 5),
            Segment::new(0, 0, 10, 0),
        ];
        assert_eq!(
            select_segment(&segments, SelectionStrategy::MedianSlope),
            Some(segments[1])
        );
    }

    #[test]
    fn test_negative_slope_is_rejected() {
        let ex = extractor(SelectionStrategy::First);
        let outcome = ex.choose(&[Segment::new(0, 40, 100, 30)]);
        assert!(matches!(outcome, LineOutcome::Rejected { slope, .. } if slope < 0.0));
    }

    #[test]
    fn test_vertical_segment_is_rejected() {
        let ex = extractor(SelectionStrategy::First);
        let outcome = ex.choose(&[Segment::new(30, 0, 30, 60)]);
        assert!(matches!(outcome, LineOutcome::Rejected { .. }));
    }

    #[test]
    fn test_extract_accepts_flat_edge() {
        let mut edges = GrayImage::new(120, 80);
        for x in 5..115 {
            edges.put_pixel(x, 40, Luma([255]));
        }
        let outcome = extractor(SelectionStrategy::First).extract(&edges);
        let LineOutcome::Accepted { segment, .. } = outcome else {
            panic!("flat edge should pass the gate, got {:?}", outcome);
        };
        assert!((39..=41).contains(&segment.y2));
    }
}
