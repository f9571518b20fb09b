//! Whisper Transcription Engine
//!
//! Speech-to-text using whisper.cpp via whisper-rs. The engine is compiled
//! when the `whisper` feature is enabled; otherwise a stub reports
//! `FeatureNotEnabled`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{
    Transcriber, Transcript, TranscriptionError, TranscriptionOptions, TranscriptionResult,
};

// =============================================================================
// Whisper Model Types
// =============================================================================

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhisperModel {
    /// Tiny model (~75MB) - fastest, lowest accuracy
    Tiny,
    /// Base model (~142MB) - good balance
    #[default]
    Base,
    Small,
    Medium,
    /// Large model (~2.9GB) - highest accuracy
    Large,
}

impl WhisperModel {
    /// Returns the filename for this model size
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large.bin",
        }
    }

    /// Location of this model under [`default_models_dir`]
    pub fn default_path(&self) -> PathBuf {
        default_models_dir().join(self.filename())
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = TranscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(TranscriptionError::ModelLoadError(format!(
                "Unknown model size: {}",
                s
            ))),
        }
    }
}

// =============================================================================
// Whisper Engine - Feature-gated Implementation
// =============================================================================

#[cfg(feature = "whisper")]
mod engine_impl {
    use super::*;
    use crate::transcription::{load_audio_samples, TranscriptSegment};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Whisper transcription engine
    pub struct WhisperEngine {
        context: WhisperContext,
        model_name: String,
    }

    impl std::fmt::Debug for WhisperEngine {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WhisperEngine")
                .field("model_name", &self.model_name)
                .finish()
        }
    }

    impl WhisperEngine {
        /// Loads the model at `model_path` (.bin)
        pub fn new(model_path: &Path) -> TranscriptionResult<Self> {
            if !model_path.exists() {
                return Err(TranscriptionError::ModelNotFound(
                    model_path.to_string_lossy().to_string(),
                ));
            }

            let params = WhisperContextParameters::default();
            let context = WhisperContext::new_with_params(
                model_path.to_str().unwrap_or_default(),
                params,
            )
            .map_err(|e| TranscriptionError::ModelLoadError(e.to_string()))?;

            let model_name = model_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();

            Ok(Self {
                context,
                model_name,
            })
        }

        pub fn model_name(&self) -> &str {
            &self.model_name
        }

        /// Transcribes 16kHz mono samples normalized to [-1.0, 1.0]
        pub fn transcribe(
            &self,
            samples: &[f32],
            options: &TranscriptionOptions,
        ) -> TranscriptionResult<Transcript> {
            let failed = |e: whisper_rs::WhisperError| {
                TranscriptionError::TranscriptionError(e.to_string())
            };

            let mut state = self.context.create_state().map_err(failed)?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            let requested = requested_language(options);
            params.set_language(Some(requested));
            params.set_translate(options.translate);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            if options.threads > 0 {
                params.set_n_threads(options.threads as i32);
            }
            if let Some(ref prompt) = options.initial_prompt {
                params.set_initial_prompt(prompt);
            }

            state.full(params, samples).map_err(failed)?;

            let num_segments = state.full_n_segments().map_err(failed)?;
            let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
            for i in 0..num_segments {
                // timestamps are in centiseconds
                let start = state.full_get_segment_t0(i).map_err(failed)? as f64 / 100.0;
                let end = state.full_get_segment_t1(i).map_err(failed)? as f64 / 100.0;
                let text = state.full_get_segment_text(i).map_err(failed)?;
                segments.push(TranscriptSegment {
                    start,
                    end: end.max(start),
                    text: text.trim().to_string(),
                });
            }

            let detected = state
                .full_lang_id_from_state()
                .ok()
                .and_then(whisper_rs::get_lang_str);
            let language = reported_language(requested, detected);

            Ok(Transcript::from_segments(language, segments))
        }

        /// Transcribes a 16kHz mono WAV file
        pub fn transcribe_file(
            &self,
            wav_path: &Path,
            options: &TranscriptionOptions,
        ) -> TranscriptionResult<Transcript> {
            let samples = load_audio_samples(wav_path)?;
            self.transcribe(&samples, options)
        }
    }
}

#[cfg(feature = "whisper")]
pub use engine_impl::WhisperEngine;

#[cfg_attr(not(feature = "whisper"), allow(dead_code))]
/// Language passed to whisper.cpp; `"auto"` turns on detection, since an
/// unset language falls back to English.
fn requested_language(options: &TranscriptionOptions) -> &str {
    match options.language.as_deref().map(str::trim) {
        Some(lang) if !lang.is_empty() => lang,
        _ => "auto",
    }
}

#[cfg_attr(not(feature = "whisper"), allow(dead_code))]
/// Language recorded on the transcript: the detected one under `"auto"`.
fn reported_language(requested: &str, detected: Option<&str>) -> String {
    if requested != "auto" {
        return requested.to_string();
    }
    detected
        .filter(|lang| !lang.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

// =============================================================================
// Stub Implementation (when whisper feature is disabled)
// =============================================================================

#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine;

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Creates a new WhisperEngine (stub - returns error)
    pub fn new(_model_path: &Path) -> TranscriptionResult<Self> {
        Err(TranscriptionError::FeatureNotEnabled)
    }

    pub fn model_name(&self) -> &str {
        ""
    }

    /// Transcribes a WAV file (stub - returns error)
    pub fn transcribe_file(
        &self,
        _wav_path: &Path,
        _options: &TranscriptionOptions,
    ) -> TranscriptionResult<Transcript> {
        Err(TranscriptionError::FeatureNotEnabled)
    }
}

// =============================================================================
// Transcriber Adapter
// =============================================================================

/// [`Transcriber`] over a loaded [`WhisperEngine`]; inference runs on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    engine: Arc<WhisperEngine>,
    options: TranscriptionOptions,
}

impl WhisperTranscriber {
    pub fn new(engine: WhisperEngine, options: TranscriptionOptions) -> Self {
        Self {
            engine: Arc::new(engine),
            options,
        }
    }

    /// Loads the model at `model_path`. Blocking.
    pub fn load(model_path: &Path, options: TranscriptionOptions) -> TranscriptionResult<Self> {
        info!(model = %model_path.display(), "Loading whisper model");
        let engine = WhisperEngine::new(model_path)?;
        Ok(Self::new(engine, options))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> TranscriptionResult<Transcript> {
        let engine = Arc::clone(&self.engine);
        let options = self.options.with_language(language);
        let path = audio_path.to_path_buf();

        tokio::task::spawn_blocking(move || engine.transcribe_file(&path, &options))
            .await
            .map_err(|e| TranscriptionError::TranscriptionError(e.to_string()))?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Checks if whisper transcription is available
pub fn is_whisper_available() -> bool {
    cfg!(feature = "whisper")
}

/// Returns the recommended model directory
pub fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("captionbar")
        .join("models")
        .join("whisper")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_model_filename() {
        assert_eq!(WhisperModel::Tiny.filename(), "ggml-tiny.bin");
        assert_eq!(WhisperModel::default().filename(), "ggml-base.bin");
        assert!(WhisperModel::Large
            .default_path()
            .ends_with("whisper/ggml-large.bin"));
    }

    #[test]
    fn test_whisper_model_from_str() {
        assert_eq!("tiny".parse::<WhisperModel>().unwrap(), WhisperModel::Tiny);
        assert_eq!(
            "Medium".parse::<WhisperModel>().unwrap(),
            WhisperModel::Medium
        );
        assert!("invalid".parse::<WhisperModel>().is_err());
    }

    #[test]
    fn test_requested_language_defaults_to_auto() {
        let options = TranscriptionOptions::default();
        assert_eq!(requested_language(&options), "auto");
        assert_eq!(requested_language(&options.with_language(None)), "auto");
        assert_eq!(requested_language(&options.with_language(Some("ko"))), "ko");

        let unset = TranscriptionOptions {
            language: None,
            ..TranscriptionOptions::default()
        };
        assert_eq!(requested_language(&unset), "auto");
        assert_eq!(requested_language(&unset.with_language(Some(" "))), "auto");
    }

    #[test]
    fn test_reported_language_prefers_detection_under_auto() {
        assert_eq!(reported_language("auto", Some("de")), "de");
        assert_eq!(reported_language("auto", None), "unknown");
        assert_eq!(reported_language("ko", Some("en")), "ko");
    }

    #[test]
    fn test_is_whisper_available() {
        let available = is_whisper_available();
        #[cfg(feature = "whisper")]
        assert!(available);
        #[cfg(not(feature = "whisper"))]
        assert!(!available);
    }

    #[test]
    fn test_missing_model() {
        let result = WhisperTranscriber::load(
            Path::new("/nonexistent/ggml-base.bin"),
            TranscriptionOptions::default(),
        );
        #[cfg(feature = "whisper")]
        assert!(matches!(result, Err(TranscriptionError::ModelNotFound(_))));
        #[cfg(not(feature = "whisper"))]
        assert!(matches!(result, Err(TranscriptionError::FeatureNotEnabled)));
    }
}
