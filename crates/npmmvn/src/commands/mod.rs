//! npmmvn runs
//!
//! Implements the two runs: deploy and restore.

pub mod deploy;
pub mod restore;

pub use deploy::{deploy_project, DeployOptions, DeployResult};
pub use restore::{restore_project, RestoreOptions, RestoreOutcome};
