//! FFprobe stream inspection.

use serde::Deserialize;
use std::path::Path;

use duet_models::ProbedMediaInfo;

use crate::command::{MediaTool, MediaToolchain};
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

impl FfprobeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }
}

/// Probe a local file for audio presence and duration.
pub async fn probe_media(
    toolchain: &dyn MediaToolchain,
    path: impl AsRef<Path>,
) -> MediaResult<ProbedMediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.to_string_lossy().to_string(),
    ];

    let output = toolchain.run(MediaTool::Ffprobe, &args).await?;
    let info = parse_probe_output(&output.stdout)?;

    tracing::debug!(
        path = %path.display(),
        has_audio = info.has_audio_track,
        duration_ms = info.duration_milliseconds,
        "Probed media"
    );

    Ok(info)
}

/// Interpret `ffprobe -show_format -show_streams` JSON.
///
/// Duration comes from the container, falling back to the longest video
/// stream. A file without audio streams is valid.
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<ProbedMediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_streams: Vec<&FfprobeStream> = probe.streams.iter().filter(|s| s.is("video")).collect();
    if video_streams.is_empty() {
        return Err(MediaError::ProbeOutput("no video stream found".to_string()));
    }

    let has_audio_track = probe.streams.iter().any(|s| s.is("audio"));

    let container_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_duration);

    let stream_duration = video_streams
        .iter()
        .filter_map(|s| s.duration.as_deref().and_then(parse_duration))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

    let duration_secs = container_duration
        .or(stream_duration)
        .ok_or_else(|| MediaError::ProbeOutput("no readable duration".to_string()))?;

    Ok(ProbedMediaInfo {
        has_audio_track,
        duration_milliseconds: (duration_secs * 1000.0).round() as u64,
    })
}

/// Parse an FFprobe duration field ("12.345000" or "N/A").
fn parse_duration(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}
