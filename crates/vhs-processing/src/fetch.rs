//! Download a video from a URL.
//!
//! The URL is first fetched directly. Pages that are not media (HTML responses, error
//! statuses, network failures) are handed to `yt-dlp`, which knows how to extract the
//! video from hosting sites.

use crate::error::{FetchError, FetchResult};
use futures::StreamExt;
use reqwest::Url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub ytdlp_path: String,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout: Duration::from_secs(300),
            ytdlp_path: "yt-dlp".to_string(),
            user_agent: format!("vhs-cloud/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchMethod {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "yt-dlp")]
    YtDlp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub method: FetchMethod,
    pub size_bytes: u64,
}

/// Parse and check a user supplied URL. Only absolute http(s) URLs with a host are accepted.
pub fn validate_url(url: &str) -> FetchResult<Url> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FetchError::InvalidUrl("URL is empty".to_string()));
    }

    let parsed = Url::parse(url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl(format!(
            "Only HTTP and HTTPS URLs are allowed: {}",
            url
        )));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("URL has no host: {}", url)));
    }

    Ok(parsed)
}

/// Local file name for a direct download: the last path segment of the URL,
/// or `download-{uuid}` when the URL has none.
fn target_filename(url: &Url) -> String {
    let from_url = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|name| {
            name.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        })
        .filter(|name| !name.trim_matches('.').is_empty());

    from_url.unwrap_or_else(|| format!("download-{}", Uuid::new_v4()))
}

pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Fetcher { client, config })
    }

    /// Download `url` into `dest_dir`, falling back to yt-dlp when the direct download fails.
    #[tracing::instrument(skip(self, dest_dir), fields(dest_dir = %dest_dir.display()))]
    pub async fn fetch(&self, url: &str, dest_dir: &Path) -> FetchResult<FetchOutcome> {
        let url = validate_url(url)?;
        tokio::fs::create_dir_all(dest_dir).await?;

        match self.download_direct(&url, dest_dir).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Direct download failed, trying yt-dlp");
                self.download_with_ytdlp(&url, dest_dir, e.to_string()).await
            }
        }
    }

    async fn download_direct(&self, url: &Url, dest_dir: &Path) -> FetchResult<FetchOutcome> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Direct(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FetchError::Direct(format!(
                "URL returned status code: {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("application/octet-stream")
            .split(';')
            .next()
            .unwrap_or("application/octet-stream")
            .trim()
            .to_ascii_lowercase();

        if content_type == "text/html" {
            return Err(FetchError::Direct(
                "URL points to an HTML page, not a media file".to_string(),
            ));
        }

        let path = dest_dir.join(target_filename(url));

        let size_bytes = match write_body(response, &path).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::debug!(
                        path = %path.display(),
                        error = %remove_err,
                        "No partial download to remove"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            url = %url,
            path = %path.display(),
            content_type = %content_type,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Direct download successful"
        );

        Ok(FetchOutcome {
            path,
            method: FetchMethod::Direct,
            size_bytes,
        })
    }

    async fn download_with_ytdlp(
        &self,
        url: &Url,
        dest_dir: &Path,
        direct: String,
    ) -> FetchResult<FetchOutcome> {
        let template = dest_dir.join("%(title)s.%(ext)s");

        let output = Command::new(&self.config.ytdlp_path)
            .arg("--no-playlist")
            .arg("-o")
            .arg(&template)
            .arg("--print")
            .arg("after_move:filepath")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(ytdlp_path = %self.config.ytdlp_path, "yt-dlp executable not found");
                return Err(FetchError::FallbackUnavailable { direct });
            }
            Err(e) => return Err(FetchError::IoError(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(FetchError::FallbackFailed { direct, stderr });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(line) = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
            return Err(FetchError::FallbackFailed {
                direct,
                stderr: "yt-dlp did not report a downloaded file".to_string(),
            });
        };

        let path = PathBuf::from(line);
        let size_bytes = tokio::fs::metadata(&path).await?.len();

        tracing::info!(
            url = %url,
            path = %path.display(),
            size_bytes,
            "yt-dlp download successful"
        );

        Ok(FetchOutcome {
            path,
            method: FetchMethod::YtDlp,
            size_bytes,
        })
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> FetchResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut size: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| FetchError::Direct(format!("Failed to read response body: {}", e)))?;
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(size)
}
