//! Probed media facts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stream composition and duration of a single local media file.
///
/// Recomputed for every file; never cached across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbedMediaInfo {
    /// Whether the file carries at least one audio stream
    pub has_audio_track: bool,
    /// Duration in milliseconds
    pub duration_milliseconds: u64,
}
