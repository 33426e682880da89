//! Episode harness: the agent-facing layer over the world stepper.

pub mod action;
pub mod eval;
pub mod observation;
pub mod reward;
pub mod session;

pub use action::ActionPreset;
pub use eval::{evaluate, EpisodeMetrics, EvalSummary, Policy};
pub use observation::{Observation, OBS_LEN};
pub use reward::RewardBreakdown;
pub use session::{EpisodeStatus, Session, StepInfo, StepResult};
