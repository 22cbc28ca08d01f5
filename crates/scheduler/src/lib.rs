//! Runs opt-out workflows against many targets.
//!
//! [`TargetRunner`] owns one target's browser session from open to close and
//! turns every failure into a [`RunOutcome`]. [`Orchestrator`] applies the
//! skip policy and fans runnable targets out over a bounded worker pool.

pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod runner;

pub use model::{OutcomeCounts, RunOutcome, RunReport, TargetOutcome};
pub use optout_state_center::SkipReason;
pub use orchestrator::{Orchestrator, RunOptions};
pub use runner::TargetRunner;
