//! Lazily initialized transcription engine shared between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use super::{
    Transcriber, Transcript, TranscriptionError, TranscriptionOptions, TranscriptionResult,
    WhisperTranscriber,
};

/// Builds the underlying engine. Runs on the blocking pool.
pub type EngineFactory =
    Arc<dyn Fn() -> TranscriptionResult<Arc<dyn Transcriber>> + Send + Sync>;

/// Handle injected into every pipeline run
pub type SharedTranscriber = Arc<LazyTranscriber>;

/// Transcriber that builds its engine on first use.
///
/// Concurrent first callers wait on the same initialization. A failed
/// initialization is not cached; the next call tries again.
pub struct LazyTranscriber {
    label: String,
    factory: EngineFactory,
    engine: OnceCell<Arc<dyn Transcriber>>,
}

impl std::fmt::Debug for LazyTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTranscriber")
            .field("label", &self.label)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl LazyTranscriber {
    pub fn new(label: impl Into<String>, factory: EngineFactory) -> Self {
        Self {
            label: label.into(),
            factory,
            engine: OnceCell::new(),
        }
    }

    /// Shared handle that loads the whisper model at `model_path` on first use
    pub fn whisper(model_path: impl Into<PathBuf>, options: TranscriptionOptions) -> SharedTranscriber {
        let model_path: PathBuf = model_path.into();
        let label = format!("whisper:{}", model_path.display());
        let factory: EngineFactory = Arc::new(move || {
            let engine = WhisperTranscriber::load(&model_path, options.clone())?;
            Ok(Arc::new(engine) as Arc<dyn Transcriber>)
        });
        Arc::new(Self::new(label, factory))
    }

    /// Wraps an already constructed engine
    pub fn ready(engine: Arc<dyn Transcriber>) -> SharedTranscriber {
        let label = engine.name().to_string();
        let cell = OnceCell::new_with(Some(Arc::clone(&engine)));
        let factory: EngineFactory = Arc::new(move || Ok(Arc::clone(&engine)));
        Arc::new(Self {
            label,
            factory,
            engine: cell,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    /// Returns the engine, building it on first call
    pub async fn engine(&self) -> TranscriptionResult<Arc<dyn Transcriber>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!(engine = %self.label, "Initializing transcription engine");
                let factory = Arc::clone(&self.factory);
                tokio::task::spawn_blocking(move || factory())
                    .await
                    .map_err(|e| TranscriptionError::ModelLoadError(e.to_string()))?
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

#[async_trait]
impl Transcriber for LazyTranscriber {
    fn name(&self) -> &str {
        &self.label
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> TranscriptionResult<Transcript> {
        let engine = self.engine().await?;
        engine.transcribe(audio_path, language).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptSegment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        fn name(&self) -> &str {
            "echo"
        }

        async fn transcribe(
            &self,
            audio_path: &Path,
            language: Option<&str>,
        ) -> TranscriptionResult<Transcript> {
            Ok(Transcript::from_segments(
                language.unwrap_or("en"),
                vec![TranscriptSegment {
                    start: 0.0,
                    end: 1.0,
                    text: audio_path.display().to_string(),
                }],
            ))
        }
    }

    fn counting(counter: Arc<AtomicUsize>) -> SharedTranscriber {
        let factory: EngineFactory = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(EchoTranscriber) as Arc<dyn Transcriber>)
        });
        Arc::new(LazyTranscriber::new("counting", factory))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_initializes_once_under_concurrency() {
        let counter = Arc::new(AtomicUsize::new(0));
        let shared = counting(Arc::clone(&counter));
        assert!(!shared.is_initialized());

        let mut handles = Vec::new();
        for i in 0..8 {
            let shared = Arc::clone(&shared);
            handles.push(tokio::spawn(async move {
                let path = PathBuf::from(format!("audio_{}.wav", i));
                shared.transcribe(&path, Some("ko")).await
            }));
        }
        for handle in handles {
            let transcript = handle.await.unwrap().unwrap();
            assert_eq!(transcript.language, "ko");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(shared.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let factory: EngineFactory = Arc::new(move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TranscriptionError::ModelNotFound("model.bin".to_string()))
            } else {
                Ok(Arc::new(EchoTranscriber) as Arc<dyn Transcriber>)
            }
        });
        let shared = LazyTranscriber::new("flaky", factory);

        assert!(matches!(
            shared.engine().await,
            Err(TranscriptionError::ModelNotFound(_))
        ));
        assert!(!shared.is_initialized());
        assert!(shared.engine().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_engine_skips_factory() {
        let shared = LazyTranscriber::ready(Arc::new(EchoTranscriber));
        assert!(shared.is_initialized());
        let transcript = shared.transcribe(Path::new("a.wav"), None).await.unwrap();
        assert_eq!(transcript.text, "a.wav");
    }
}
