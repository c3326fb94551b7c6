//! Command handlers.

pub mod config;
pub mod progress;
pub mod run;
