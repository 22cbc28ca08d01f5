pub mod app;
pub mod commands;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod profile;
pub mod run;
pub mod runtime;
pub mod targets;

pub use profile::{cmd_profile, ProfileArgs};
pub use run::{cmd_run, RunArgs};
pub use targets::{cmd_targets, TargetsArgs};
