//! Source clip download over HTTP.
//!
//! Clips are streamed straight to the scratch file; nothing is buffered whole
//! in memory. There is no retry: a failed fetch fails the run.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Check that a clip location is an absolute http(s) URL.
pub fn parse_clip_url(raw: &str) -> MediaResult<Url> {
    let url = Url::parse(raw).map_err(|e| MediaError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MediaError::InvalidUrl(format!(
            "unsupported scheme '{}' in {}",
            other, raw
        ))),
    }
}

/// Download `url` into `dest`, returning the number of bytes written.
///
/// `timeout` bounds the whole transfer, body included. A partial file is
/// removed on any failure.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<u64> {
    let dest = dest.as_ref();
    let url = parse_clip_url(url)?;

    info!(url = %url, dest = %dest.display(), "Downloading clip");

    match fetch(client, &url, dest, timeout).await {
        Ok(bytes) => {
            info!(
                url = %url,
                size_mb = bytes as f64 / (1024.0 * 1024.0),
                "Downloaded clip successfully"
            );
            Ok(bytes)
        }
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(dest).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial download {}: {}", dest.display(), rm);
                }
            }
            Err(e)
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &Url,
    dest: &Path,
    timeout: Duration,
) -> MediaResult<u64> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_transport_error(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::download_failed(
            format!("GET {} returned {}", url, status),
            Some(status.as_u16()),
        ));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| map_transport_error(e, timeout))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    debug!(url = %url, bytes = written, "Body fully written");

    if written == 0 {
        return Err(MediaError::download_failed(
            format!("GET {} returned an empty body", url),
            Some(status.as_u16()),
        ));
    }

    Ok(written)
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> MediaError {
    if e.is_timeout() {
        MediaError::Timeout(timeout.as_secs())
    } else {
        MediaError::download_failed(e.to_string(), e.status().map(|s| s.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_parse_clip_url() {
        assert!(parse_clip_url("https://cdn.example.com/a.mp4").is_ok());
        assert!(parse_clip_url("http://10.0.0.1:9000/a.mp4").is_ok());
        assert!(matches!(
            parse_clip_url("file:///etc/passwd"),
            Err(MediaError::InvalidUrl(_))
        ));
        assert!(parse_clip_url("relative/path.mp4").is_err());
    }

    #[tokio::test]
    async fn test_download_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clips/reaction.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("reaction.source");
        let url = format!("{}/clips/reaction.mp4", server.uri());

        let written = download_to_file(&reqwest::Client::new(), &url, &dest, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(written, 4096);
        assert_eq!(tokio::fs::read(&dest).await.unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_not_found_is_a_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("demo.source");
        let url = format!("{}/missing.mp4", server.uri());

        let err = download_to_file(&reqwest::Client::new(), &url, &dest, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed { status: Some(404), .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("demo.source");

        let err = download_to_file(&reqwest::Client::new(), &server.uri(), &dest, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed { .. }));
        assert!(!dest.exists(), "partial file must be removed");
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 16])
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("reaction.source");

        let err = download_to_file(
            &reqwest::Client::new(),
            &server.uri(),
            &dest,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)));
    }
}
