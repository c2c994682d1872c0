// src/pipeline/mod.rs

pub mod frame_context;
pub mod metrics;
pub mod report;
pub mod session;

pub use report::{log_trend, SessionReport};
pub use session::{run, select_roi, SessionContext, StopReason};
