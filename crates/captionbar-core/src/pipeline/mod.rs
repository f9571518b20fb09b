//! Pipeline Coordinator
//!
//! Runs one upload through persistence, audio extraction, transcription,
//! cue writing and compositing. Each run is sequential; runs share nothing
//! but the transcription engine handle.

mod naming;
mod stage;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::captions::write_cue_document;
use crate::ffmpeg::{EncodeProgress, FFmpegRunner};
use crate::render::{BurnRequest, CaptionCompositor};
use crate::settings::PipelineSettings;
use crate::transcription::{SharedTranscriber, Transcriber};
use crate::{CoreError, CoreResult};

pub use naming::{identity_hash, WorkNames};
pub use stage::{RunStage, RunTracker};

/// Outcome of one run. Never carries both an error and an output path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub output_video_path: Option<PathBuf>,
    pub transcript_text: Option<String>,
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn success(output: PathBuf, transcript: String) -> Self {
        Self {
            output_video_path: Some(output),
            transcript_text: Some(transcript),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, transcript: Option<String>) -> Self {
        Self {
            output_video_path: None,
            transcript_text: transcript,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.output_video_path.is_some()
    }
}

/// Burns transcribed captions into uploaded videos
pub struct Pipeline {
    settings: PipelineSettings,
    ffmpeg: FFmpegRunner,
    compositor: CaptionCompositor,
    transcriber: SharedTranscriber,
    progress_tx: Option<Sender<EncodeProgress>>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        ffmpeg: FFmpegRunner,
        transcriber: SharedTranscriber,
    ) -> Self {
        let compositor = CaptionCompositor::new(ffmpeg.clone(), settings.encode.clone());
        Self {
            settings,
            ffmpeg,
            compositor,
            transcriber,
            progress_tx: None,
        }
    }

    /// Sends encode progress of every run to `tx`
    pub fn with_progress(mut self, tx: Sender<EncodeProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Names this pipeline would use for an upload
    pub fn work_names(&self, name: &str, size: u64, prefix: &str) -> WorkNames {
        WorkNames::new(
            &self.settings.paths.work_dir,
            &self.settings.paths.output_dir,
            prefix,
            name,
            size,
            std::process::id(),
        )
    }

    /// Processes one upload read from `reader`.
    ///
    /// `name` and `size` identify the upload; `prefix` is prepended to every
    /// file name of the run. Failures are reported in the result, together
    /// with the transcript when transcription had finished.
    pub async fn process<R>(&self, reader: R, name: &str, size: u64, prefix: &str) -> PipelineResult
    where
        R: AsyncRead + Unpin,
    {
        let names = self.work_names(name, size, prefix);
        let mut tracker = RunTracker::new(names.base.clone());
        let mut transcript: Option<String> = None;

        match self.run(reader, &names, &mut tracker, &mut transcript).await {
            Ok(output) => {
                tracker.advance();
                info!(output = %output.display(), "Run finished");
                PipelineResult::success(output, transcript.unwrap_or_default())
            }
            Err(e) => {
                tracker.fail(format!("{} ({})", e, e.kind()));
                PipelineResult::failure(e.to_string(), transcript)
            }
        }
    }

    async fn run<R>(
        &self,
        mut reader: R,
        names: &WorkNames,
        tracker: &mut RunTracker,
        transcript_out: &mut Option<String>,
    ) -> CoreResult<PathBuf>
    where
        R: AsyncRead + Unpin,
    {
        tokio::fs::create_dir_all(&self.settings.paths.work_dir).await?;
        tokio::fs::create_dir_all(&self.settings.paths.output_dir).await?;

        // Received -> Persisted
        let written = persist_upload(&mut reader, &names.upload).await?;
        debug!(bytes = written, path = %names.upload.display(), "Upload persisted");
        tracker.advance();

        // Persisted -> AudioExtracted
        let media = self.ffmpeg.probe(&names.upload).await?;
        if media.audio.is_none() {
            return Err(CoreError::MediaIo(format!(
                "no audio stream in {}",
                names.upload.display()
            )));
        }
        self.ffmpeg
            .extract_audio(&names.upload, &names.audio, &self.settings.transcription.audio)
            .await?;
        tracker.advance();

        // AudioExtracted -> Transcribed
        let language = self
            .settings
            .transcription
            .options
            .language
            .as_deref()
            .filter(|lang| *lang != "auto");
        let transcript = self.transcriber.transcribe(&names.audio, language).await?;
        info!(
            segments = transcript.segments.len(),
            language = %transcript.language,
            "Transcription finished"
        );
        *transcript_out = Some(transcript.text.clone());
        tracker.advance();

        // Transcribed -> CuesWritten
        let document = write_cue_document(&transcript.to_segments())?;
        tokio::fs::write(&names.cues, document).await?;
        tracker.advance();

        // CuesWritten -> Composited
        remove_stale_output(&names.output).await;
        let request = BurnRequest {
            video_path: names.upload.clone(),
            cues_path: names.cues.clone(),
            output_path: names.output.clone(),
            bar_percent: self.settings.caption.bar_percent,
            style: self.settings.caption.style.clone(),
        };
        let result = self.compositor.burn(&request, self.progress_tx.clone()).await?;
        tracker.advance();

        Ok(result.output_path)
    }
}

async fn persist_upload<R>(reader: &mut R, path: &Path) -> CoreResult<u64>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(path).await?;
    let written = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    if written == 0 {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(CoreError::InvalidArgument("uploaded video is empty".to_string()));
    }
    Ok(written)
}

async fn remove_stale_output(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed stale output"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale output"),
        }
    }
}
