//! Stream-copy concatenation of normalized clips.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::command::{FfmpegCommand, MediaToolchain};
use crate::error::{MediaError, MediaResult};
use crate::normalize::NormalizedClip;

/// Removes the concat list file when dropped, whatever the outcome.
struct ConcatListGuard {
    path: PathBuf,
}

impl Drop for ConcatListGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove concat list {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Quote a path for the concat demuxer list grammar.
///
/// Inside single quotes nothing is special except the quote itself, which is
/// written as `'\''` (close, escaped quote, reopen).
pub fn escape_concat_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// Render the list file for the concat demuxer.
///
/// The demuxer resolves relative entries against the list's own directory,
/// so every entry is written as an absolute path.
pub fn build_concat_list(clips: &[NormalizedClip]) -> MediaResult<String> {
    let mut list = String::from("ffconcat version 1.0\n");
    for clip in clips {
        let raw = clip.path.to_string_lossy();
        if raw.contains('\n') || raw.contains('\r') {
            return Err(MediaError::invalid_media(format!(
                "clip path cannot be listed for concat: {:?}",
                clip.path
            )));
        }
        let path = std::path::absolute(&clip.path)?;
        list.push_str("file ");
        list.push_str(&escape_concat_path(&path));
        list.push('\n');
    }
    Ok(list)
}

/// Join clips in order into `output` without re-encoding.
///
/// Returns the summed duration of the inputs. A single clip is copied
/// directly and the concat demuxer is not involved.
pub async fn concat_clips(
    toolchain: &dyn MediaToolchain,
    clips: &[NormalizedClip],
    output: impl AsRef<Path>,
) -> MediaResult<u64> {
    let output = output.as_ref();
    let total_ms: u64 = clips.iter().map(|c| c.duration_ms).sum();

    match clips {
        [] => {
            return Err(MediaError::invalid_media("no clips to concatenate"));
        }
        [single] => {
            tokio::fs::copy(&single.path, output).await?;
            info!(
                output = %output.display(),
                duration_ms = total_ms,
                "Single clip, copied without concat"
            );
            return Ok(total_ms);
        }
        _ => {}
    }

    let list_path = output.with_extension("concat.txt");
    let list = build_concat_list(clips)?;
    let _guard = ConcatListGuard {
        path: list_path.clone(),
    };
    tokio::fs::write(&list_path, list).await?;

    let cmd = FfmpegCommand::new(&list_path, output)
        .format("concat")
        .input_arg("-safe")
        .input_arg("0")
        .codec_copy()
        .output_arg("-movflags")
        .output_arg("+faststart");

    cmd.run(toolchain).await?;

    info!(
        clips = clips.len(),
        output = %output.display(),
        duration_ms = total_ms,
        "Concatenated clips with stream copy"
    );

    Ok(total_ms)
}
