//! Opt-out workflow runner
//!
//! Loads declarative per-site workflows, runs them in a browser for one
//! identity and remembers which sites are done so later runs resume.

pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod pipeline;
pub mod workflows;

pub use config::Config;
pub use errors::ConfigurationError;
pub use identity::{resolve_identity, IdentityInput};
pub use pipeline::{execute_plan, RunPlan, RunSummary};
