//! Stream normalization.
//!
//! Re-encodes a clip into the canonical layout so that several clips can be
//! joined with stream copy. Clips without audio get a silent stereo track.

use std::path::{Path, PathBuf};

use tracing::info;

use duet_models::encoding::MIN_SYNTHESIZED_AUDIO_MS;
use duet_models::{NormalizationProfile, ProbedMediaInfo};

use crate::command::{FfmpegCommand, MediaToolchain};
use crate::error::MediaResult;

/// A clip re-encoded into the canonical layout.
///
/// Lives inside the run's scratch workspace and is removed with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedClip {
    /// Location of the normalized file
    pub path: PathBuf,
    /// Probed duration of the source clip in milliseconds
    pub duration_ms: u64,
    /// Whether a silent track was synthesized
    pub synthesized_audio: bool,
}

/// Length of the silent track for a clip of the given duration.
pub fn silent_track_duration_ms(video_duration_ms: u64) -> u64 {
    video_duration_ms.max(MIN_SYNTHESIZED_AUDIO_MS)
}

/// Build the FFmpeg invocation for one clip.
pub fn build_normalize_command(
    input: &Path,
    output: &Path,
    info: &ProbedMediaInfo,
    profile: &NormalizationProfile,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, output);

    let cmd = if info.has_audio_track {
        cmd.map("0:v:0").map("0:a:0")
    } else {
        let silence_secs = silent_track_duration_ms(info.duration_milliseconds) as f64 / 1000.0;
        cmd.add_input(profile.silent_audio_source())
            .format("lavfi")
            .duration(silence_secs)
            .map("0:v:0")
            .map("1:a:0")
    };

    cmd.video_filter(profile.video_filter())
        .output_args(profile.to_ffmpeg_args())
}

/// Re-encode `input` into `output` using the layout `info` describes.
///
/// `info` comes from [`crate::probe_media`] on the same input.
pub async fn normalize_clip(
    toolchain: &dyn MediaToolchain,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    info: &ProbedMediaInfo,
    profile: &NormalizationProfile,
) -> MediaResult<NormalizedClip> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        input = %input.display(),
        output = %output.display(),
        has_audio = info.has_audio_track,
        duration_ms = info.duration_milliseconds,
        "Normalizing clip"
    );

    let cmd = build_normalize_command(input, output, info, profile);
    cmd.run(toolchain).await?;

    Ok(NormalizedClip {
        path: output.to_path_buf(),
        duration_ms: info.duration_milliseconds,
        synthesized_audio: !info.has_audio_track,
    })
}
