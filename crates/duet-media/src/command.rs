//! FFmpeg command builder and tool runner.
//!
//! Every tool invocation goes through [`MediaToolchain`], an argument-vector
//! interface with no shell in between. [`ProcessToolchain`] is the production
//! implementation; tests substitute their own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Number of trailing stderr lines kept in failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// External tools the pipeline shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaTool {
    Ffmpeg,
    Ffprobe,
}

impl MediaTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaTool::Ffmpeg => "ffmpeg",
            MediaTool::Ffprobe => "ffprobe",
        }
    }

    fn failed(&self, message: String, stderr: Option<String>, exit_code: Option<i32>) -> MediaError {
        match self {
            MediaTool::Ffmpeg => MediaError::ffmpeg_failed(message, stderr, exit_code),
            MediaTool::Ffprobe => MediaError::ffprobe_failed(message, stderr, exit_code),
        }
    }

    fn not_found(&self, path: &Path) -> MediaError {
        let path = path.display().to_string();
        match self {
            MediaTool::Ffmpeg => MediaError::FfmpegNotFound(path),
            MediaTool::Ffprobe => MediaError::FfprobeNotFound(path),
        }
    }
}

impl fmt::Display for MediaTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Narrow seam over the media tools.
///
/// Implementations must return an error for any non-zero exit and must not
/// leave the child running when the returned future is dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Run `tool` with an explicit argument vector.
    async fn run(&self, tool: MediaTool, args: &[String]) -> MediaResult<ToolOutput>;
}

/// Binary locations for the media tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn path_for(&self, tool: MediaTool) -> &Path {
        match tool {
            MediaTool::Ffmpeg => &self.ffmpeg,
            MediaTool::Ffprobe => &self.ffprobe,
        }
    }
}

/// Runs the media tools as child processes.
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    paths: ToolPaths,
    timeout: Option<Duration>,
}

impl ProcessToolchain {
    /// Create a runner for the given binaries.
    pub fn new(paths: ToolPaths) -> Self {
        Self {
            paths,
            timeout: None,
        }
    }

    /// Bound every invocation; the child is killed when the bound is hit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl MediaToolchain for ProcessToolchain {
    async fn run(&self, tool: MediaTool, args: &[String]) -> MediaResult<ToolOutput> {
        let program = self.paths.path_for(tool);
        debug!(tool = %tool, "Running {} {}", program.display(), args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => tool.not_found(program),
                _ => MediaError::Io(e),
            })?;

        // Dropping the wait future drops the child, which kills it.
        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        tool = %tool,
                        "{} timed out after {} seconds, killing process",
                        tool,
                        timeout.as_secs()
                    );
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(tool.failed(
                format!("{} exited with {}", tool, output.status),
                Some(stderr_tail(&stderr)),
                output.status.code(),
            ));
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }
}

/// Keep the last few lines of stderr, which is where FFmpeg reports the cause.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// One `-i` input and the arguments that precede it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                args: Vec::new(),
                source: input.as_ref().to_string_lossy().to_string(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Append another input. Subsequent `input_arg` calls apply to it.
    pub fn add_input(mut self, source: impl Into<String>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            source: source.into(),
        });
        self
    }

    /// Add an argument before the most recently added `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the demuxer of the current input.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format_secs(seconds))
    }

    /// Limit the current input's duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format_secs(seconds))
    }

    /// Select a stream for the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Run through a toolchain.
    pub async fn run(&self, toolchain: &dyn MediaToolchain) -> MediaResult<ToolOutput> {
        toolchain.run(MediaTool::Ffmpeg, &self.build_args()).await
    }
}

/// Seconds with millisecond precision, the way FFmpeg time options expect.
pub fn format_secs(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|e| MediaError::FfmpegNotFound(e.to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|e| MediaError::FfprobeNotFound(e.to_string()))
}
