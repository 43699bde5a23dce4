pub mod audio;
pub mod classify;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod pipeline;
pub mod telemetry;
#[cfg(feature = "vad_earshot")]
pub mod vad_earshot;

pub use classify::ActivityClassifier;
pub use daemon::ControlLoop;
pub use engine::{SwitchDecisionEngine, SwitchState};
pub use pipeline::{PipelineSupervisor, RenderSpec};
