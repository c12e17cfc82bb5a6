//! Composition orchestrator.
//!
//! Drives one run through fetch, normalize, concat, thumbnail and publish,
//! reporting each state transition. The scratch workspace is released on
//! every exit path, cancellation included.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tokio::sync::{mpsc, watch};
use tracing::{warn, Instrument};
use validator::Validate;

use duet_media::download::parse_clip_url;
use duet_media::{
    concat_clips, download_to_file, extract_thumbnail, normalize_clip, probe_media, MediaError,
    MediaResult, MediaToolchain, NormalizedClip,
};
use duet_models::{
    ArtifactKey, ClipRole, ComposedArtifact, CompositionRequest, CompositionState, RunId,
};
use duet_storage::{ArtifactPublisher, StorageError};

use crate::config::{ComposerConfig, ThumbnailPolicy};
use crate::error::{ComposeError, ComposeResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::workspace::ScratchWorkspace;

const COMPOSED_FILENAME: &str = "composed.mp4";
const THUMBNAIL_FILENAME: &str = "thumbnail.jpg";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";
const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-side hooks for a single run.
#[derive(Debug, Default)]
pub struct RunControl {
    cancel: Option<watch::Receiver<bool>>,
    observer: Option<mpsc::UnboundedSender<CompositionState>>,
}

impl RunControl {
    /// Cancel the run once the channel holds `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Receive every state the run enters, terminal state last.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<CompositionState>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Tracks the current state of a run and reports transitions.
struct StateTracker {
    logger: RunLogger,
    observer: Option<mpsc::UnboundedSender<CompositionState>>,
    current: CompositionState,
    entered_at: Instant,
}

impl StateTracker {
    fn new(logger: RunLogger, observer: Option<mpsc::UnboundedSender<CompositionState>>) -> Self {
        let tracker = Self {
            logger,
            observer,
            current: CompositionState::Created,
            entered_at: Instant::now(),
        };
        tracker.notify();
        tracker
    }

    fn enter(&mut self, next: CompositionState) {
        // Terminal states are final.
        if self.current.is_terminal() {
            return;
        }

        if self.current != CompositionState::Created {
            metrics::record_step_duration(self.current.as_str(), self.entered_at.elapsed());
        }

        self.logger
            .log_progress(&format!("{} -> {}", self.current, next));
        self.current = next;
        self.entered_at = Instant::now();
        self.notify();
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            // A dropped receiver only means nobody is watching any more.
            let _ = observer.send(self.current);
        }
    }
}

/// Composition orchestrator.
///
/// Every external dependency is injected, so the same orchestrator runs
/// against real FFmpeg and R2 in production and against fakes in tests.
pub struct Composer {
    config: ComposerConfig,
    toolchain: Arc<dyn MediaToolchain>,
    publisher: Arc<dyn ArtifactPublisher>,
    http: reqwest::Client,
}

impl Composer {
    pub fn new(
        config: ComposerConfig,
        toolchain: Arc<dyn MediaToolchain>,
        publisher: Arc<dyn ArtifactPublisher>,
    ) -> Self {
        let http = download_client().unwrap_or_else(|e| {
            warn!(error = %e, "Download client setup failed, using defaults without connect timeout");
            reqwest::Client::new()
        });

        Self {
            config,
            toolchain,
            publisher,
            http,
        }
    }

    /// Use a preconfigured HTTP client for clip downloads.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Run one composition to completion.
    pub async fn compose(&self, request: &CompositionRequest) -> ComposeResult<ComposedArtifact> {
        self.compose_with(request, RunControl::default()).await
    }

    /// Run one composition with cancellation and state observation.
    pub async fn compose_with(
        &self,
        request: &CompositionRequest,
        control: RunControl,
    ) -> ComposeResult<ComposedArtifact> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, &request.user_id);
        let span = logger.create_span();

        async move {
            let started = Instant::now();
            let mut tracker = StateTracker::new(logger.clone(), control.observer);

            metrics::record_run_started();
            logger.log_start(&format!(
                "{} clip(s), thumbnail policy {}",
                request.clips().len(),
                self.config.thumbnail_policy
            ));

            let result = self
                .execute(request, &run_id, &logger, &mut tracker, control.cancel)
                .await;

            match &result {
                Ok(artifact) => {
                    tracker.enter(CompositionState::Done);
                    metrics::record_run_completed(started.elapsed());
                    logger.log_completion(&format!(
                        "{} ({} ms)",
                        artifact.video_url, artifact.total_duration_milliseconds
                    ));
                }
                Err(e) => {
                    tracker.enter(CompositionState::Failed(e.kind()));
                    metrics::record_run_failed(e.kind(), started.elapsed());
                    match e.diagnostics() {
                        Some(stderr) => logger.log_error(&format!("{} | stderr: {}", e, stderr)),
                        None => logger.log_error(&e.to_string()),
                    }
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &CompositionRequest,
        run_id: &RunId,
        logger: &RunLogger,
        tracker: &mut StateTracker,
        cancel: Option<watch::Receiver<bool>>,
    ) -> ComposeResult<ComposedArtifact> {
        validate_request(request)?;

        let workspace = ScratchWorkspace::create(&self.config.work_dir, run_id)
            .await
            .map_err(ComposeError::Workspace)?;

        let outcome = tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                logger.log_warning("cancel requested, stopping in-flight work");
                Err(ComposeError::Cancelled)
            }
            result = self.run_steps(request, run_id, logger, &workspace, tracker) => result,
        };

        // Children of dropped steps are killed but may not have exited yet;
        // close() retries once for late writes.
        if let Err(e) = workspace.close().await {
            logger.log_warning(&format!("scratch workspace cleanup failed: {}", e));
        }

        outcome
    }

    async fn run_steps(
        &self,
        request: &CompositionRequest,
        run_id: &RunId,
        logger: &RunLogger,
        workspace: &ScratchWorkspace,
        tracker: &mut StateTracker,
    ) -> ComposeResult<ComposedArtifact> {
        let clips = request.clips();

        tracker.enter(CompositionState::Fetching);
        let sources = if self.config.parallel_clips {
            try_join_all(
                clips
                    .iter()
                    .map(|(role, url)| self.fetch_clip(*role, url, workspace)),
            )
            .await?
        } else {
            let mut sources = Vec::with_capacity(clips.len());
            for (role, url) in &clips {
                sources.push(self.fetch_clip(*role, url, workspace).await?);
            }
            sources
        };

        tracker.enter(CompositionState::Normalizing);
        let normalized = if self.config.parallel_clips {
            try_join_all(
                sources
                    .iter()
                    .map(|(role, source)| self.normalize(*role, source, workspace)),
            )
            .await?
        } else {
            let mut normalized = Vec::with_capacity(sources.len());
            for (role, source) in &sources {
                normalized.push(self.normalize(*role, source, workspace).await?);
            }
            normalized
        };

        for (clip, (role, _)) in normalized.iter().zip(&sources) {
            if clip.synthesized_audio {
                logger.log_progress(&format!(
                    "{} clip has no audio, synthesized a silent track",
                    role
                ));
            }
        }

        tracker.enter(CompositionState::Concatenating);
        let composed = workspace.file(COMPOSED_FILENAME);
        let total_duration_ms = self
            .bounded(concat_clips(self.toolchain.as_ref(), &normalized, &composed))
            .await
            .map_err(ComposeError::Concat)?;

        tracker.enter(CompositionState::Thumbnailing);
        let thumbnail = self.thumbnail(&composed, workspace, logger).await?;

        tracker.enter(CompositionState::Publishing);
        let key = ArtifactKey::now(&self.config.storage_prefix, &request.user_id, run_id);

        let video_url = self
            .publish_file(&composed, &key.video(), VIDEO_CONTENT_TYPE, "video")
            .await?;

        let thumbnail_url = match thumbnail {
            Some(path) => {
                match self
                    .publish_file(&path, &key.thumbnail(), THUMBNAIL_CONTENT_TYPE, "thumbnail")
                    .await
                {
                    Ok(url) => Some(url),
                    Err(e) if self.config.thumbnail_policy == ThumbnailPolicy::BestEffort => {
                        logger.log_warning(&format!("publishing without thumbnail: {}", e));
                        metrics::record_thumbnail_skipped();
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };

        Ok(ComposedArtifact {
            video_url,
            thumbnail_url,
            total_duration_milliseconds: total_duration_ms,
        })
    }

    async fn fetch_clip(
        &self,
        role: ClipRole,
        url: &str,
        workspace: &ScratchWorkspace,
    ) -> ComposeResult<(ClipRole, PathBuf)> {
        let dest = workspace.file(&role.source_filename());
        download_to_file(&self.http, url, &dest, self.config.fetch_timeout)
            .await
            .map_err(|e| ComposeError::fetch(role, e))?;
        Ok((role, dest))
    }

    async fn normalize(
        &self,
        role: ClipRole,
        source: &Path,
        workspace: &ScratchWorkspace,
    ) -> ComposeResult<NormalizedClip> {
        let info = self
            .bounded(probe_media(self.toolchain.as_ref(), source))
            .await
            .map_err(|e| ComposeError::probe(role, e))?;

        let output = workspace.file(&role.normalized_filename());
        self.bounded(normalize_clip(
            self.toolchain.as_ref(),
            source,
            &output,
            &info,
            &self.config.profile,
        ))
        .await
        .map_err(|e| ComposeError::normalization(role, e))
    }

    /// Extract the thumbnail, applying the configured failure policy.
    async fn thumbnail(
        &self,
        composed: &Path,
        workspace: &ScratchWorkspace,
        logger: &RunLogger,
    ) -> ComposeResult<Option<PathBuf>> {
        let output = workspace.file(THUMBNAIL_FILENAME);
        let result = self
            .bounded(extract_thumbnail(
                self.toolchain.as_ref(),
                composed,
                &output,
                self.config.thumbnail_width,
            ))
            .await;

        match (result, self.config.thumbnail_policy) {
            (Ok(()), _) => Ok(Some(output)),
            (Err(e), ThumbnailPolicy::Required) => Err(ComposeError::Thumbnail(e)),
            (Err(e), ThumbnailPolicy::BestEffort) => {
                logger.log_warning(&format!("thumbnail skipped: {}", e));
                metrics::record_thumbnail_skipped();
                Ok(None)
            }
        }
    }

    async fn publish_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
        asset: &'static str,
    ) -> ComposeResult<String> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ComposeError::publish(asset, StorageError::Io(e)))?;

        let timeout = self.config.publish_timeout;
        tokio::time::timeout(timeout, self.publisher.upload(content, key, content_type))
            .await
            .unwrap_or_else(|_| Err(StorageError::Timeout(timeout.as_secs())))
            .map_err(|e| ComposeError::publish(asset, e))
    }

    /// Bound a tool step; an elapsed deadline counts as a tool failure.
    async fn bounded<T>(&self, step: impl Future<Output = MediaResult<T>>) -> MediaResult<T> {
        let timeout = self.config.tool_timeout;
        tokio::time::timeout(timeout, step)
            .await
            .unwrap_or_else(|_| Err(MediaError::Timeout(timeout.as_secs())))
    }
}

fn download_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

fn validate_request(request: &CompositionRequest) -> ComposeResult<()> {
    request
        .validate()
        .map_err(|e| ComposeError::invalid_request(e.to_string()))?;

    for (role, url) in request.clips() {
        parse_clip_url(url)
            .map_err(|e| ComposeError::invalid_request(format!("{} clip: {}", role, e)))?;
    }
    Ok(())
}

/// Resolves once cancellation is requested; never resolves without a signal.
async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = cancel {
        if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_media::{ProcessToolchain, ToolPaths};
    use duet_storage::MemoryPublisher;

    #[test]
    fn test_validation_rejects_bad_requests() {
        let missing_user = CompositionRequest::new("https://cdn.example.com/r.mp4", "");
        assert!(matches!(
            validate_request(&missing_user),
            Err(ComposeError::InvalidRequest(_))
        ));

        let ftp = CompositionRequest::new("ftp://cdn.example.com/r.mp4", "u1");
        assert!(matches!(
            validate_request(&ftp),
            Err(ComposeError::InvalidRequest(_))
        ));

        let ok = CompositionRequest::new("https://cdn.example.com/r.mp4", "u1")
            .with_demo("http://cdn.example.com/d.mp4");
        assert!(validate_request(&ok).is_ok());
    }

    #[tokio::test]
    async fn test_tracker_reports_once_terminal() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = RunLogger::new(&RunId::new(), "u1");
        let mut tracker = StateTracker::new(logger, Some(tx));

        tracker.enter(CompositionState::Fetching);
        tracker.enter(CompositionState::Done);
        tracker.enter(CompositionState::Publishing);
        drop(tracker);

        let mut seen = Vec::new();
        while let Some(state) = rx.recv().await {
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                CompositionState::Created,
                CompositionState::Fetching,
                CompositionState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_waits_for_signal() {
        let (tx, rx) = watch::channel(false);
        let wait = tokio::spawn(cancelled(Some(rx)));

        tokio::task::yield_now().await;
        assert!(!wait.is_finished());

        tx.send(true).unwrap();
        wait.await.unwrap();
    }

    #[test]
    fn test_download_client_builds() {
        assert!(download_client().is_ok());
    }

    #[tokio::test]
    async fn test_missing_source_fails_at_inspection() {
        let root = tempfile::TempDir::new().unwrap();
        let config = ComposerConfig {
            work_dir: root.path().to_path_buf(),
            ..Default::default()
        };
        let toolchain = ProcessToolchain::new(ToolPaths::new("/unused/ffmpeg", "/unused/ffprobe"));
        let composer = Composer::new(
            config,
            Arc::new(toolchain),
            Arc::new(MemoryPublisher::new()),
        );

        let workspace = ScratchWorkspace::create(root.path(), &RunId::new()).await.unwrap();
        let missing = workspace.file("demo.source");
        let err = composer
            .normalize(ClipRole::Demo, &missing, &workspace)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ComposeError::Probe {
                clip: ClipRole::Demo,
                source: MediaError::FileNotFound(_)
            }
        ));
        assert_eq!(err.kind(), duet_models::FailureKind::Probe);
        workspace.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_cancel_channel_never_fires() {
        let result =
            tokio::time::timeout(Duration::from_millis(20), cancelled(None)).await;
        assert!(result.is_err());
    }
}
