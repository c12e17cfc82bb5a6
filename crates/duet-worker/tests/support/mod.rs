//! Shared fixtures for orchestrator tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use duet_media::{MediaError, MediaResult, MediaTool, MediaToolchain, ToolOutput};
use duet_worker::ComposerConfig;

/// Pipeline step a scripted fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Probe,
    Normalize,
    Concat,
    Thumbnail,
}

/// What a source clip looks like to the fake prober.
#[derive(Debug, Clone, Copy)]
pub struct ClipFixture {
    pub has_audio: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub step: Step,
    pub args: Vec<String>,
}

impl Invocation {
    /// Whether `flag` is immediately followed by `value`.
    pub fn has_pair(&self, flag: &str, value: &str) -> bool {
        self.args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    pub fn mentions(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a.contains(needle))
    }

    /// File name of the first `-i` input.
    pub fn first_input_name(&self) -> Option<String> {
        let index = self.args.iter().position(|a| a == "-i")?;
        file_name(self.args.get(index + 1)?)
    }
}

/// Fake media toolchain.
///
/// Reports fixture facts for probed sources, writes a small file at every
/// FFmpeg output path, and can fail or hang at a chosen step.
#[derive(Default)]
pub struct ScriptedToolchain {
    fixtures: HashMap<String, ClipFixture>,
    fail_at: Option<Step>,
    hang_at: Option<Step>,
    invocations: Mutex<Vec<Invocation>>,
    active: Arc<AtomicUsize>,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the fixture for a downloaded source file, e.g. `reaction.source`.
    pub fn with_clip(mut self, source_name: &str, fixture: ClipFixture) -> Self {
        self.fixtures.insert(source_name.to_string(), fixture);
        self
    }

    pub fn failing_at(mut self, step: Step) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn hanging_at(mut self, step: Step) -> Self {
        self.hang_at = Some(step);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocations_of(&self, step: Step) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.step == step)
            .collect()
    }

    /// Tool calls whose futures are still alive.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn classify(tool: MediaTool, args: &[String]) -> Step {
        if tool == MediaTool::Ffprobe {
            Step::Probe
        } else if args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat") {
            Step::Concat
        } else if args.iter().any(|a| a == "-frames:v") {
            Step::Thumbnail
        } else {
            Step::Normalize
        }
    }

    fn failure(step: Step) -> MediaError {
        match step {
            Step::Probe => MediaError::ffprobe_failed(
                "ffprobe exited with exit status: 1",
                Some("moov atom not found".to_string()),
                Some(1),
            ),
            _ => MediaError::ffmpeg_failed(
                "ffmpeg exited with exit status: 1",
                Some("Conversion failed!".to_string()),
                Some(1),
            ),
        }
    }

    fn probe_json(&self, path: &str) -> MediaResult<Vec<u8>> {
        let name = file_name(path).unwrap_or_default();
        let fixture = self
            .fixtures
            .get(&name)
            .ok_or_else(|| MediaError::ProbeOutput(format!("no fixture for {}", name)))?;

        let secs = format!("{:.3}", fixture.duration_ms as f64 / 1000.0);
        let mut streams = vec![serde_json::json!({
            "index": 0, "codec_type": "video", "codec_name": "h264", "duration": secs
        })];
        if fixture.has_audio {
            streams.push(serde_json::json!({
                "index": 1, "codec_type": "audio", "codec_name": "aac", "duration": secs
            }));
        }

        let body = serde_json::json!({ "streams": streams, "format": { "duration": secs } });
        Ok(serde_json::to_vec(&body)?)
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaToolchain for ScriptedToolchain {
    async fn run(&self, tool: MediaTool, args: &[String]) -> MediaResult<ToolOutput> {
        let step = Self::classify(tool, args);
        self.invocations.lock().unwrap().push(Invocation {
            step,
            args: args.to_vec(),
        });

        self.active.fetch_add(1, Ordering::SeqCst);
        let _guard = ActiveGuard(Arc::clone(&self.active));

        if self.hang_at == Some(step) {
            std::future::pending::<()>().await;
        }
        if self.fail_at == Some(step) {
            return Err(Self::failure(step));
        }

        let last = args.last().cloned().unwrap_or_default();
        match step {
            Step::Probe => Ok(ToolOutput {
                stdout: self.probe_json(&last)?,
                stderr: String::new(),
            }),
            _ => {
                let content = format!("{:?}:{}", step, file_name(&last).unwrap_or_default());
                tokio::fs::write(&last, content).await?;
                Ok(ToolOutput::default())
            }
        }
    }
}

fn file_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
}

pub const WITH_AUDIO_3S: ClipFixture = ClipFixture {
    has_audio: true,
    duration_ms: 3_000,
};

pub const SILENT_4_5S: ClipFixture = ClipFixture {
    has_audio: false,
    duration_ms: 4_500,
};

/// HTTP server hosting `/reaction.mp4` and `/demo.mp4`; anything else is 404.
pub async fn clip_server() -> MockServer {
    let server = MockServer::start().await;
    for name in ["/reaction.mp4", "/demo.mp4"] {
        Mock::given(method("GET"))
            .and(path(name))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;
    }
    server
}

/// Config rooted in a fresh temp dir with short bounds.
pub fn test_config(root: &TempDir) -> ComposerConfig {
    ComposerConfig {
        work_dir: root.path().join("work"),
        fetch_timeout: Duration::from_secs(5),
        tool_timeout: Duration::from_secs(5),
        publish_timeout: Duration::from_secs(5),
        ffmpeg_path: Some(PathBuf::from("/unused/ffmpeg")),
        ffprobe_path: Some(PathBuf::from("/unused/ffprobe")),
        ..Default::default()
    }
}

/// Entries left under the work dir; a missing dir counts as empty.
pub fn leftover_entries(config: &ComposerConfig) -> Vec<PathBuf> {
    match std::fs::read_dir(&config.work_dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
