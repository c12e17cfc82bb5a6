//! Artifact publishing to Cloudflare R2.
//!
//! This crate provides:
//! - The `ArtifactPublisher` seam the orchestrator uploads through
//! - An R2 (S3 API) client and publisher returning public URLs
//! - An in-memory publisher for tests and dry runs

pub mod client;
pub mod error;
pub mod publisher;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use publisher::{ArtifactPublisher, MemoryPublisher, R2Publisher, StoredObject};
