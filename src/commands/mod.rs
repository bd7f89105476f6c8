//! Command implementations for the provisioner CLI

pub mod cache;
pub mod completions;
pub mod compose;
pub mod helpers;
pub mod run;
pub mod status;
pub mod wait;
