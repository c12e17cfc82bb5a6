//! Shared data models for the Duet composition pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Composition requests and their published artifacts
//! - Probed media facts
//! - Run identity and lifecycle state
//! - The canonical normalization profile
//! - Storage key naming for published assets

pub mod artifact_key;
pub mod composition;
pub mod encoding;
pub mod media;
pub mod run;

// Re-export common types
pub use artifact_key::{sanitize_user_id, ArtifactKey, DEFAULT_STORAGE_PREFIX};
pub use composition::{ComposedArtifact, CompositionRequest};
pub use encoding::NormalizationProfile;
pub use media::ProbedMediaInfo;
pub use run::{ClipRole, CompositionState, FailureKind, RunId};
