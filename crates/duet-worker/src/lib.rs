//! Composition worker.
//!
//! This crate provides:
//! - The composition orchestrator and its state machine
//! - Per-run scratch workspaces with guaranteed cleanup
//! - Environment-driven configuration
//! - Structured run logging and Prometheus metrics

pub mod composer;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod workspace;

pub use composer::{Composer, RunControl};
pub use config::{ComposerConfig, ThumbnailPolicy};
pub use error::{ComposeError, ComposeResult};
pub use logging::RunLogger;
pub use workspace::ScratchWorkspace;
