//! Thumbnail generation.

use std::path::Path;

use duet_models::encoding::{THUMBNAIL_SCALE_WIDTH, THUMBNAIL_OFFSET_SECS};

use crate::command::{FfmpegCommand, MediaToolchain};
use crate::error::{MediaError, MediaResult};

/// Build the FFmpeg invocation for a still of the first frame.
pub fn build_thumbnail_command(video_path: &Path, output_path: &Path, width: u32) -> FfmpegCommand {
    let width = if width == 0 { THUMBNAIL_SCALE_WIDTH } else { width };

    FfmpegCommand::new(video_path, output_path)
        .seek(THUMBNAIL_OFFSET_SECS)
        .single_frame()
        .video_filter(format!("scale={}:-2", width))
        .output_arg("-q:v")
        .output_arg("2")
        .log_level("error")
}

/// Capture the frame at offset zero of `video_path` as a still image.
pub async fn extract_thumbnail(
    toolchain: &dyn MediaToolchain,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    width: u32,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    build_thumbnail_command(video_path, output_path, width)
        .run(toolchain)
        .await?;

    // FFmpeg exits cleanly when there is no frame to write.
    if !output_path.exists() {
        return Err(MediaError::invalid_media(format!(
            "no frame written to {}",
            output_path.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{MockMediaToolchain, ToolOutput};

    #[test]
    fn test_thumbnail_filter() {
        let args = build_thumbnail_command(Path::new("v.mp4"), Path::new("t.jpg"), 480).build_args();
        assert!(args.contains(&"scale=480:-2".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-ss" && w[1] == "0.000"));
        assert!(args.windows(2).any(|w| w[0] == "-frames:v" && w[1] == "1"));
    }

    #[test]
    fn test_zero_width_uses_default() {
        let args = build_thumbnail_command(Path::new("v.mp4"), Path::new("t.jpg"), 0).build_args();
        assert!(args.contains(&format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH)));
    }

    #[tokio::test]
    async fn test_missing_output_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut toolchain = MockMediaToolchain::new();
        toolchain.expect_run().returning(|_, _| Ok(ToolOutput::default()));

        let err = extract_thumbnail(
            &toolchain,
            dir.path().join("final.mp4"),
            dir.path().join("thumb.jpg"),
            480,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }
}
