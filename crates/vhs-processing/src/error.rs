use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Direct download failed: {0}")]
    Direct(String),

    #[error("Direct download failed ({direct}) and yt-dlp is not available")]
    FallbackUnavailable { direct: String },

    #[error("Direct download failed ({direct}) and yt-dlp failed: {stderr}")]
    FallbackFailed { direct: String, stderr: String },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unsupported video format: {0}")]
    InvalidFormat(String),

    #[error("Invalid combine request: {0}")]
    InvalidRequest(String),

    #[error("No frame images found in {}", .0.display())]
    NoFrames(PathBuf),

    #[error("ffmpeg not found at {0}")]
    FfmpegUnavailable(String),

    #[error("FFmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;
pub type ProcessingResult<T> = Result<T, ProcessingError>;
