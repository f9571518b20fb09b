//! Transcription Module
//!
//! Speech-to-text behind the [`Transcriber`] trait. The pipeline holds a
//! [`SharedTranscriber`] that loads its engine on first use; the concrete
//! engine is whisper.cpp (feature `whisper`).

mod audio;
mod shared;
mod whisper;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::captions::Segment;

pub use audio::{load_audio_samples, WHISPER_SAMPLE_RATE};
pub use shared::{EngineFactory, LazyTranscriber, SharedTranscriber};
pub use whisper::{
    default_models_dir, is_whisper_available, WhisperEngine, WhisperModel, WhisperTranscriber,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during transcription
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// Whisper model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Failed to load Whisper model
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    /// Audio file not found
    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    /// Failed to read audio samples
    #[error("Failed to read audio: {0}")]
    AudioReadError(String),

    /// Transcription inference failed
    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    /// Whisper feature not enabled
    #[error("Whisper feature not enabled. Rebuild with --features whisper")]
    FeatureNotEnabled,
}

/// Result type for transcription operations
pub type TranscriptionResult<T> = Result<T, TranscriptionError>;

// =============================================================================
// Options and Results
// =============================================================================

/// Options for transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionOptions {
    /// Language code (e.g., "en", "ko", "ja") or "auto" for detection
    pub language: Option<String>,
    /// Whether to translate to English
    pub translate: bool,
    /// Number of threads to use (0 = auto)
    pub threads: u32,
    /// Initial prompt to guide the model
    pub initial_prompt: Option<String>,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: Some("auto".to_string()),
            translate: false,
            threads: 0,
            initial_prompt: None,
        }
    }
}

impl TranscriptionOptions {
    /// Options with the language replaced when one is given
    pub fn with_language(&self, language: Option<&str>) -> Self {
        let mut options = self.clone();
        if let Some(lang) = language {
            options.language = Some(lang.to_string());
        }
        options
    }
}

/// A single transcription segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    /// Converts this segment to a cue-writable segment
    pub fn to_segment(&self) -> Segment {
        Segment::new(self.start, self.end, self.text.clone())
    }
}

/// Full result of one transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// Full transcript text
    pub text: String,
    /// Detected or requested language
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Builds a transcript whose text joins the trimmed segment texts
    pub fn from_segments(language: impl Into<String>, segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text,
            language: language.into(),
            segments,
        }
    }

    pub fn to_segments(&self) -> Vec<Segment> {
        self.segments.iter().map(TranscriptSegment::to_segment).collect()
    }
}

// =============================================================================
// Transcriber Trait
// =============================================================================

/// Speech-to-text engine
///
/// Implementations:
/// - `WhisperTranscriber`: whisper.cpp on 16kHz mono WAV files
/// - `LazyTranscriber`: loads another transcriber on first use
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Transcribes an audio file. `language` of None uses the engine default.
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> TranscriptionResult<Transcript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_transcription_options_default() {
        let options = TranscriptionOptions::default();
        assert_eq!(options.language, Some("auto".to_string()));
        assert!(!options.translate);
        assert_eq!(options.threads, 0);
        assert!(options.initial_prompt.is_none());
    }

    #[test]
    fn test_options_language_override() {
        let options = TranscriptionOptions::default();
        assert_eq!(options.with_language(Some("ko")).language.as_deref(), Some("ko"));
        assert_eq!(options.with_language(None).language.as_deref(), Some("auto"));
    }

    #[test]
    fn test_transcript_text_joins_segments() {
        let transcript = Transcript::from_segments(
            "en",
            vec![
                segment(0.0, 1.0, " Hello "),
                segment(1.0, 1.5, "  "),
                segment(1.5, 2.0, "world"),
            ],
        );
        assert_eq!(transcript.text, "Hello world");
        assert_eq!(transcript.segments.len(), 3);
    }

    #[test]
    fn test_transcript_to_segments() {
        let transcript = Transcript::from_segments("en", vec![segment(1.5, 3.0, "Hello world")]);
        let segments = transcript.to_segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.5);
        assert_eq!(segments[0].end, 3.0);
        assert_eq!(segments[0].text, "Hello world");
    }
}
