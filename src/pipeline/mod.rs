mod controller;
mod session;

pub use controller::{PipelineConfig, PipelineController, PipelineState, RunReport, StopReason};
pub use session::PipelineSession;
