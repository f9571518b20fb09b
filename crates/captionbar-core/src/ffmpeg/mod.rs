//! FFmpeg Integration Module
//!
//! Provides the FFmpeg functionality the caption pipeline needs:
//! - Binary detection (configured paths, common install locations, PATH)
//! - Media probing via FFprobe
//! - Audio extraction to PCM WAV for transcription
//! - Progress parsing for long-running encodes

mod detection;
mod progress;
mod runner;

pub use detection::*;
pub use progress::{calculate_encode_progress, parse_ffmpeg_progress_line, EncodeProgress, FFmpegProgressData};
pub use runner::{AudioExtractOptions, AudioStreamInfo, FFmpegRunner, MediaInfo, VideoStreamInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or configure its path.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_display() {
        let err = FFmpegError::NotFound;
        assert!(err.to_string().contains("FFmpeg not found"));

        let err = FFmpegError::ExecutionFailed("exit code 1".to_string());
        assert!(err.to_string().contains("exit code 1"));
    }
}
