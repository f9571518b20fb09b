//! captionbar Error Definitions
//!
//! Defines the error taxonomy shared by every stage of the pipeline.

use thiserror::Error;

use crate::captions::TimestampError;
use crate::ffmpeg::FFmpegError;
use crate::text::RasterError;
use crate::transcription::TranscriptionError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Input missing: {0}")]
    InputMissing(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // =========================================================================
    // Cue Errors
    // =========================================================================
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No usable cues: {0}")]
    EmptyResult(String),

    // =========================================================================
    // Media Errors
    // =========================================================================
    #[error("Media I/O error: {0}")]
    MediaIo(String),

    #[error("Resource unavailable: {0}")]
    Resource(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<TimestampError> for CoreError {
    fn from(err: TimestampError) -> Self {
        match err {
            TimestampError::InvalidArgument(_) => CoreError::InvalidArgument(err.to_string()),
            TimestampError::Malformed(_) => CoreError::Parse(err.to_string()),
        }
    }
}

impl From<FFmpegError> for CoreError {
    fn from(err: FFmpegError) -> Self {
        match err {
            FFmpegError::NotFound => CoreError::Resource(err.to_string()),
            FFmpegError::InvalidInput(path) => CoreError::InputMissing(path),
            other => CoreError::MediaIo(other.to_string()),
        }
    }
}

impl From<RasterError> for CoreError {
    fn from(err: RasterError) -> Self {
        CoreError::Resource(err.to_string())
    }
}

impl From<TranscriptionError> for CoreError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::ModelNotFound(_)
            | TranscriptionError::ModelLoadError(_)
            | TranscriptionError::FeatureNotEnabled => CoreError::Resource(err.to_string()),
            TranscriptionError::AudioNotFound(path) => CoreError::InputMissing(path),
            other => CoreError::Transcription(other.to_string()),
        }
    }
}

impl CoreError {
    /// Short machine-readable category, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InputMissing(_) => "input_missing",
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::Parse(_) => "parse_error",
            CoreError::EmptyResult(_) => "empty_result",
            CoreError::MediaIo(_) | CoreError::IoError(_) => "media_io_error",
            CoreError::Resource(_) => "resource_error",
            CoreError::Transcription(_) => "transcription_error",
            CoreError::JsonError(_) => "json_error",
        }
    }
}
