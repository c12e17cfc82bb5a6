//! Run identity and lifecycle state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used where a compact identifier is enough.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two source clips an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipRole {
    /// The short reaction clip (always present, always first).
    Reaction,
    /// The optional product demo clip (appended after the reaction).
    Demo,
}

impl ClipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipRole::Reaction => "reaction",
            ClipRole::Demo => "demo",
        }
    }

    /// Scratch filename for the downloaded source.
    pub fn source_filename(&self) -> String {
        format!("{}.source", self.as_str())
    }

    /// Scratch filename for the normalized output.
    pub fn normalized_filename(&self) -> String {
        format!("{}.mp4", self.as_str())
    }
}

impl fmt::Display for ClipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classification carried by a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    Workspace,
    Fetch,
    Probe,
    Normalization,
    Concat,
    Thumbnail,
    Publish,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Workspace => "workspace",
            FailureKind::Fetch => "fetch",
            FailureKind::Probe => "probe",
            FailureKind::Normalization => "normalization",
            FailureKind::Concat => "concat",
            FailureKind::Thumbnail => "thumbnail",
            FailureKind::Publish => "publish",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a composition run.
///
/// Runs move forward through the working states and end in exactly one of
/// `Done` or `Failed`. There is no retry or partial-result state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum CompositionState {
    #[default]
    Created,
    Fetching,
    Normalizing,
    Concatenating,
    Thumbnailing,
    Publishing,
    Done,
    Failed(FailureKind),
}

impl CompositionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionState::Created => "created",
            CompositionState::Fetching => "fetching",
            CompositionState::Normalizing => "normalizing",
            CompositionState::Concatenating => "concatenating",
            CompositionState::Thumbnailing => "thumbnailing",
            CompositionState::Publishing => "publishing",
            CompositionState::Done => "done",
            CompositionState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CompositionState::Done | CompositionState::Failed(_))
    }
}

impl fmt::Display for CompositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionState::Failed(kind) => write!(f, "failed({})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_short_respects_char_boundaries() {
        let id = RunId::from_string("ééééééééé-run");
        assert_eq!(id.short(), "éééééééé");
        assert_eq!(RunId::from_string("abc").short(), "abc");
        assert_eq!(RunId::from_string("").short(), "");
    }

    #[test]
    fn test_clip_role_filenames() {
        assert_eq!(ClipRole::Reaction.source_filename(), "reaction.source");
        assert_eq!(ClipRole::Demo.normalized_filename(), "demo.mp4");
    }

    #[test]
    fn test_terminal_states() {
        assert!(CompositionState::Done.is_terminal());
        assert!(CompositionState::Failed(FailureKind::Fetch).is_terminal());
        assert!(!CompositionState::Publishing.is_terminal());
        assert_eq!(
            CompositionState::Failed(FailureKind::Concat).to_string(),
            "failed(concat)"
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&CompositionState::Failed(FailureKind::Probe)).unwrap();
        assert_eq!(json, r#"{"state":"failed","kind":"probe"}"#);
    }
}
