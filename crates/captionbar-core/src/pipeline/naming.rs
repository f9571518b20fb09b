//! Run-scoped file names.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Files produced by one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkNames {
    /// `{prefix}{stem}_{pid}_{hash8}`
    pub base: String,
    /// Persisted upload in the work directory
    pub upload: PathBuf,
    /// Extracted PCM audio
    pub audio: PathBuf,
    /// Cue document next to the audio
    pub cues: PathBuf,
    /// Final video in the output directory
    pub output: PathBuf,
}

impl WorkNames {
    pub fn new(
        work_dir: &Path,
        output_dir: &Path,
        prefix: &str,
        name: &str,
        size: u64,
        pid: u32,
    ) -> Self {
        let original = Path::new(name);
        let stem = original
            .file_stem()
            .map(|s| sanitize(&s.to_string_lossy()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let extension = original
            .extension()
            .map(|e| sanitize(&e.to_string_lossy()).to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "mp4".to_string());

        let base = format!(
            "{}{}_{}_{}",
            sanitize(prefix),
            stem,
            pid,
            identity_hash(name, size)
        );
        let audio_stem = format!("{}_extracted_audio", base);

        Self {
            upload: work_dir.join(format!("{}.{}", base, extension)),
            audio: work_dir.join(format!("{}.wav", audio_stem)),
            cues: work_dir.join(format!("{}.srt", audio_stem)),
            output: output_dir.join(format!("{}_with_subs.mp4", base)),
            base,
        }
    }
}

/// First 8 hex characters of SHA-256 over the upload's name and size
pub fn identity_hash(name: &str, size: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(size.to_le_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Keeps file names portable
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
