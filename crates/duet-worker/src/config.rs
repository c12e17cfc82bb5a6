//! Composer configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use duet_media::{MediaResult, ToolPaths};
use duet_models::encoding::{DEFAULT_CRF, DEFAULT_PRESET, THUMBNAIL_SCALE_WIDTH};
use duet_models::{NormalizationProfile, DEFAULT_STORAGE_PREFIX};

/// What to do when the thumbnail cannot be extracted or published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailPolicy {
    /// Fail the whole run.
    #[default]
    Required,
    /// Publish the video without a thumbnail.
    BestEffort,
}

impl FromStr for ThumbnailPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" | "fatal" => Ok(ThumbnailPolicy::Required),
            "best_effort" | "best-effort" | "optional" => Ok(ThumbnailPolicy::BestEffort),
            other => Err(format!("unknown thumbnail policy '{}'", other)),
        }
    }
}

impl fmt::Display for ThumbnailPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailPolicy::Required => f.write_str("required"),
            ThumbnailPolicy::BestEffort => f.write_str("best_effort"),
        }
    }
}

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Parent directory for per-run scratch workspaces
    pub work_dir: PathBuf,
    /// Explicit FFmpeg binary; resolved from PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit FFprobe binary; resolved from PATH when unset
    pub ffprobe_path: Option<PathBuf>,
    /// Bound on each clip download, body included
    pub fetch_timeout: Duration,
    /// Bound on each probe/normalize/concat/thumbnail step
    pub tool_timeout: Duration,
    /// Bound on each upload
    pub publish_timeout: Duration,
    /// Fetch and normalize the two clips concurrently
    pub parallel_clips: bool,
    /// Thumbnail failure handling
    pub thumbnail_policy: ThumbnailPolicy,
    /// Thumbnail width in pixels
    pub thumbnail_width: u32,
    /// Top-level storage prefix for published assets
    pub storage_prefix: String,
    /// Quality settings for normalization
    pub profile: NormalizationProfile,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("duet"),
            ffmpeg_path: None,
            ffprobe_path: None,
            fetch_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(600),
            publish_timeout: Duration::from_secs(120),
            parallel_clips: true,
            thumbnail_policy: ThumbnailPolicy::Required,
            thumbnail_width: THUMBNAIL_SCALE_WIDTH,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            profile: NormalizationProfile::default(),
        }
    }
}

impl ComposerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let crf = lookup("COMPOSE_CRF")
            .and_then(|s| s.parse::<u8>().ok())
            .unwrap_or(DEFAULT_CRF);
        let preset = lookup("COMPOSE_PRESET").unwrap_or_else(|| DEFAULT_PRESET.to_string());

        Self {
            work_dir: lookup("COMPOSE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_path: lookup("FFMPEG_PATH").map(PathBuf::from),
            ffprobe_path: lookup("FFPROBE_PATH").map(PathBuf::from),
            fetch_timeout: secs("COMPOSE_FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
            tool_timeout: secs("COMPOSE_TOOL_TIMEOUT_SECS", defaults.tool_timeout),
            publish_timeout: secs("COMPOSE_PUBLISH_TIMEOUT_SECS", defaults.publish_timeout),
            parallel_clips: lookup("COMPOSE_PARALLEL_CLIPS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.parallel_clips),
            thumbnail_policy: lookup("COMPOSE_THUMBNAIL_POLICY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.thumbnail_policy),
            thumbnail_width: lookup("COMPOSE_THUMBNAIL_WIDTH")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.thumbnail_width),
            storage_prefix: lookup("COMPOSE_STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            profile: NormalizationProfile::default()
                .with_crf(crf)
                .with_preset(preset),
        }
    }

    /// Tool binaries: configured paths win, the rest come from PATH.
    pub fn tool_paths(&self) -> MediaResult<ToolPaths> {
        let ffmpeg = match &self.ffmpeg_path {
            Some(path) => path.clone(),
            None => duet_media::check_ffmpeg()?,
        };
        let ffprobe = match &self.ffprobe_path {
            Some(path) => path.clone(),
            None => duet_media::check_ffprobe()?,
        };
        Ok(ToolPaths::new(ffmpeg, ffprobe))
    }
}
