//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for composition runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use duet_models::RunId;

/// Run logger for structured logging with consistent formatting.
///
/// Every event carries the run ID and the requesting user so that a run can
/// be followed end to end in aggregated logs.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    user_id: String,
}

impl RunLogger {
    /// Create a new logger for a run.
    pub fn new(run_id: &RunId, user_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Log the start of a run.
    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            user_id = %self.user_id,
            "Composition started: {}", message
        );
    }

    /// Log a step transition or other progress.
    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            user_id = %self.user_id,
            "Composition progress: {}", message
        );
    }

    /// Log a degraded but non-fatal condition.
    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            user_id = %self.user_id,
            "Composition warning: {}", message
        );
    }

    /// Log a fatal failure.
    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            user_id = %self.user_id,
            "Composition error: {}", message
        );
    }

    /// Log successful completion.
    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            user_id = %self.user_id,
            "Composition completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "composition",
            run_id = %self.run_id,
            user_id = %self.user_id
        )
    }
}
