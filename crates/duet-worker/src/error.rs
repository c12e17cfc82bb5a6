//! Composition error types.

use thiserror::Error;

use duet_media::MediaError;
use duet_models::{ClipRole, FailureKind};
use duet_storage::StorageError;

pub type ComposeResult<T> = Result<T, ComposeError>;

/// Why a composition run failed. Each variant keeps the originating error.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Scratch workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Fetching {clip} clip failed: {source}")]
    Fetch {
        clip: ClipRole,
        #[source]
        source: MediaError,
    },

    #[error("Probing {clip} clip failed: {source}")]
    Probe {
        clip: ClipRole,
        #[source]
        source: MediaError,
    },

    #[error("Normalizing {clip} clip failed: {source}")]
    Normalization {
        clip: ClipRole,
        #[source]
        source: MediaError,
    },

    #[error("Concatenation failed: {0}")]
    Concat(#[source] MediaError),

    #[error("Thumbnail extraction failed: {0}")]
    Thumbnail(#[source] MediaError),

    #[error("Publishing {asset} failed: {source}")]
    Publish {
        asset: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("Composition cancelled")]
    Cancelled,
}

impl ComposeError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn fetch(clip: ClipRole, source: MediaError) -> Self {
        Self::Fetch { clip, source }
    }

    pub fn probe(clip: ClipRole, source: MediaError) -> Self {
        Self::Probe { clip, source }
    }

    pub fn normalization(clip: ClipRole, source: MediaError) -> Self {
        Self::Normalization { clip, source }
    }

    pub fn publish(asset: &'static str, source: StorageError) -> Self {
        Self::Publish { asset, source }
    }

    /// Failure classification for state reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            ComposeError::InvalidRequest(_) => FailureKind::InvalidRequest,
            ComposeError::Workspace(_) => FailureKind::Workspace,
            ComposeError::Fetch { .. } => FailureKind::Fetch,
            ComposeError::Probe { .. } => FailureKind::Probe,
            ComposeError::Normalization { .. } => FailureKind::Normalization,
            ComposeError::Concat(_) => FailureKind::Concat,
            ComposeError::Thumbnail(_) => FailureKind::Thumbnail,
            ComposeError::Publish { .. } => FailureKind::Publish,
            ComposeError::Cancelled => FailureKind::Cancelled,
        }
    }

    /// The clip the failure belongs to, when it belongs to one.
    pub fn clip(&self) -> Option<ClipRole> {
        match self {
            ComposeError::Fetch { clip, .. }
            | ComposeError::Probe { clip, .. }
            | ComposeError::Normalization { clip, .. } => Some(*clip),
            _ => None,
        }
    }

    /// Tool diagnostics (stderr tail) when the failure came from a subprocess.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            ComposeError::Fetch { source, .. }
            | ComposeError::Probe { source, .. }
            | ComposeError::Normalization { source, .. }
            | ComposeError::Concat(source)
            | ComposeError::Thumbnail(source) => source.stderr(),
            _ => None,
        }
    }
}
