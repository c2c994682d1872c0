// src/pipeline/frame_context.rs
//
// What happened to one frame on its way through the pipeline.

use crate::alert::AlertDecision;
use crate::line_detection::LineOutcome;
use crate::types::HeightSample;

#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub frame_id: u64,
    pub outcome: LineOutcome,
    pub sample: Option<HeightSample>,
    pub alert: Option<AlertDecision>,
}

impl FrameContext {
    pub fn new(frame_id: u64, outcome: LineOutcome) -> Self {
        Self {
            frame_id,
            outcome,
            sample: None,
            alert: None,
        }
    }

    pub fn alert_fired(&self) -> bool {
        self.alert.is_some_and(|a| a.fired)
    }
}
