//! Canonical normalization profile.
//!
//! Every clip is re-encoded to these settings before concatenation so that the
//! concat demuxer can join them with stream copy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical video codec (H.264)
pub const CANONICAL_VIDEO_CODEC: &str = "libx264";
/// Canonical H.264 profile
pub const CANONICAL_VIDEO_PROFILE: &str = "high";
/// Canonical pixel format
pub const CANONICAL_PIXEL_FORMAT: &str = "yuv420p";
/// Canonical frame rate
pub const CANONICAL_FRAME_RATE: u32 = 30;
/// Canonical frame size (portrait)
pub const CANONICAL_WIDTH: u32 = 1080;
pub const CANONICAL_HEIGHT: u32 = 1920;

/// Canonical audio codec
pub const CANONICAL_AUDIO_CODEC: &str = "aac";
/// Canonical audio sample rate
pub const CANONICAL_SAMPLE_RATE: u32 = 48_000;
/// Canonical audio channel count
pub const CANONICAL_AUDIO_CHANNELS: u32 = 2;
/// Canonical audio bitrate
pub const CANONICAL_AUDIO_BITRATE: &str = "128k";

/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;

/// Shortest silent track ever synthesized, in milliseconds.
pub const MIN_SYNTHESIZED_AUDIO_MS: u64 = 100;

/// Thumbnail generation settings
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
/// Offset of the captured frame, in seconds.
pub const THUMBNAIL_OFFSET_SECS: f64 = 0.0;

/// Normalization settings. Only the quality target and preset are tunable;
/// everything that affects bitstream layout is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizationProfile {
    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}

impl Default for NormalizationProfile {
    fn default() -> Self {
        Self {
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
        }
    }
}

impl NormalizationProfile {
    /// Returns a new profile with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    /// Returns a new profile with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Video filter that letterboxes any input into the canonical frame.
    pub fn video_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps}",
            w = CANONICAL_WIDTH,
            h = CANONICAL_HEIGHT,
            fps = CANONICAL_FRAME_RATE,
        )
    }

    /// lavfi source for a silent track in the canonical audio layout.
    pub fn silent_audio_source(&self) -> String {
        format!(
            "anullsrc=channel_layout=stereo:sample_rate={}",
            CANONICAL_SAMPLE_RATE
        )
    }

    /// Convert to FFmpeg output arguments (codecs, quality, layout).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            CANONICAL_VIDEO_CODEC.to_string(),
            "-profile:v".to_string(),
            CANONICAL_VIDEO_PROFILE.to_string(),
            "-pix_fmt".to_string(),
            CANONICAL_PIXEL_FORMAT.to_string(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-r".to_string(),
            CANONICAL_FRAME_RATE.to_string(),
            "-c:a".to_string(),
            CANONICAL_AUDIO_CODEC.to_string(),
            "-ar".to_string(),
            CANONICAL_SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            CANONICAL_AUDIO_CHANNELS.to_string(),
            "-b:a".to_string(),
            CANONICAL_AUDIO_BITRATE.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = NormalizationProfile::default();
        assert_eq!(profile.crf, 23);
        assert_eq!(profile.preset, "veryfast");
    }

    #[test]
    fn test_ffmpeg_args_fix_layout() {
        let args = NormalizationProfile::default().with_crf(30).to_ffmpeg_args();
        let pairs: Vec<_> = args.chunks(2).map(|c| (c[0].as_str(), c[1].as_str())).collect();
        assert!(pairs.contains(&("-c:v", "libx264")));
        assert!(pairs.contains(&("-pix_fmt", "yuv420p")));
        assert!(pairs.contains(&("-crf", "30")));
        assert!(pairs.contains(&("-ar", "48000")));
        assert!(pairs.contains(&("-ac", "2")));
    }

    #[test]
    fn test_crf_is_clamped() {
        assert_eq!(NormalizationProfile::default().with_crf(99).crf, 51);
    }

    #[test]
    fn test_filters() {
        let profile = NormalizationProfile::default();
        assert!(profile.video_filter().starts_with("scale=1080:1920"));
        assert!(profile.video_filter().ends_with("fps=30"));
        assert_eq!(
            profile.silent_audio_source(),
            "anullsrc=channel_layout=stereo:sample_rate=48000"
        );
    }
}
