//! FFmpeg CLI wrapper for the composition pipeline.
//!
//! This crate provides:
//! - A narrow, mockable tool runner over `ffmpeg`/`ffprobe`
//! - Stream probing (audio presence, duration)
//! - Normalization into the canonical layout, with silent-track synthesis
//! - Stream-copy concatenation
//! - First-frame thumbnails
//! - HTTP download of source clips

pub mod command;
pub mod concat;
pub mod download;
pub mod error;
pub mod normalize;
pub mod probe;
pub mod thumbnail;

pub use command::{
    check_ffmpeg, check_ffprobe, FfmpegCommand, MediaTool, MediaToolchain, ProcessToolchain,
    ToolOutput, ToolPaths,
};
pub use concat::concat_clips;
pub use download::download_to_file;
pub use error::{MediaError, MediaResult};
pub use normalize::{normalize_clip, NormalizedClip};
pub use probe::probe_media;
pub use thumbnail::extract_thumbnail;
