//! Run stage tracking.

use std::fmt;

use tracing::{info, warn};

/// Stage of one pipeline run. `Failed` is absorbing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStage {
    Received,
    Persisted,
    AudioExtracted,
    Transcribed,
    CuesWritten,
    Composited,
    Done,
    Failed(String),
}

impl RunStage {
    /// The stage that follows this one on success
    pub fn next(&self) -> Option<RunStage> {
        match self {
            RunStage::Received => Some(RunStage::Persisted),
            RunStage::Persisted => Some(RunStage::AudioExtracted),
            RunStage::AudioExtracted => Some(RunStage::Transcribed),
            RunStage::Transcribed => Some(RunStage::CuesWritten),
            RunStage::CuesWritten => Some(RunStage::Composited),
            RunStage::Composited => Some(RunStage::Done),
            RunStage::Done | RunStage::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed(_))
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Received => write!(f, "received"),
            RunStage::Persisted => write!(f, "persisted"),
            RunStage::AudioExtracted => write!(f, "audio_extracted"),
            RunStage::Transcribed => write!(f, "transcribed"),
            RunStage::CuesWritten => write!(f, "cues_written"),
            RunStage::Composited => write!(f, "composited"),
            RunStage::Done => write!(f, "done"),
            RunStage::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Logs every stage transition of a run
#[derive(Debug)]
pub struct RunTracker {
    run: String,
    stage: RunStage,
}

impl RunTracker {
    pub fn new(run: impl Into<String>) -> Self {
        let run = run.into();
        info!(run = %run, stage = %RunStage::Received, "Run started");
        Self {
            run,
            stage: RunStage::Received,
        }
    }

    pub fn stage(&self) -> &RunStage {
        &self.stage
    }

    /// Moves to the next stage; no-op once terminal
    pub fn advance(&mut self) -> &RunStage {
        if let Some(next) = self.stage.next() {
            info!(run = %self.run, from = %self.stage, to = %next, "Run stage");
            self.stage = next;
        }
        &self.stage
    }

    /// Enters `Failed`; the first failure is kept
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.stage.is_terminal() {
            return;
        }
        let reason = reason.into();
        warn!(run = %self.run, at = %self.stage, reason = %reason, "Run failed");
        self.stage = RunStage::Failed(reason);
    }
}
