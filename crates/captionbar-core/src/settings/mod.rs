//! Settings Persistence
//!
//! Pipeline configuration with:
//! - Per-section defaults (missing fields fall back individually)
//! - Tolerant normalization of out-of-range values
//! - Atomic file writes (temp file + rename)
//!
//! Default location: {config_dir}/captionbar/settings.json

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::captions::CaptionStyle;
use crate::ffmpeg::AudioExtractOptions;
use crate::render::{EncodeSettings, DEFAULT_BAR_PERCENT};
use crate::transcription::{TranscriptionOptions, WhisperModel};
use crate::{CoreError, CoreResult};

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Root directory for captionbar's own data
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("captionbar")
}

/// Default settings file path
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("captionbar")
        .join(SETTINGS_FILE)
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub caption: CaptionSettings,
    #[serde(default)]
    pub encode: EncodeSettings,
    #[serde(default)]
    pub transcription: TranscriptionSettings,
    #[serde(default)]
    pub ffmpeg: FFmpegSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            paths: PathSettings::default(),
            caption: CaptionSettings::default(),
            encode: EncodeSettings::default(),
            transcription: TranscriptionSettings::default(),
            ffmpeg: FFmpegSettings::default(),
        }
    }
}

/// Working and output directories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PathSettings {
    /// Uploads, extracted audio and cue documents
    pub work_dir: PathBuf,
    /// Finished videos
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let root = default_data_dir();
        Self {
            work_dir: root.join("work"),
            output_dir: root.join("output"),
        }
    }
}

/// Caption bar appearance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionSettings {
    /// Bar height as a percentage of the video height
    pub bar_percent: f64,
    #[serde(flatten)]
    pub style: CaptionStyle,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            bar_percent: DEFAULT_BAR_PERCENT,
            style: CaptionStyle::default(),
        }
    }
}

/// Speech-to-text engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    /// Explicit model file; overrides `model`
    pub model_path: Option<PathBuf>,
    /// Model size name ("tiny", "base", ...) looked up in the models dir
    pub model: String,
    #[serde(flatten)]
    pub options: TranscriptionOptions,
    /// Layout of the extracted audio
    pub audio: AudioExtractOptions,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            model: "base".to_string(),
            options: TranscriptionOptions::default(),
            audio: AudioExtractOptions::default(),
        }
    }
}

impl TranscriptionSettings {
    /// Model file to load
    pub fn resolved_model_path(&self) -> PathBuf {
        match &self.model_path {
            Some(path) => path.clone(),
            None => self
                .model
                .parse::<WhisperModel>()
                .unwrap_or_default()
                .default_path(),
        }
    }
}

/// FFmpeg binary locations (None = auto-detect)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FFmpegSettings {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl PipelineSettings {
    /// Corrects out-of-range values instead of failing.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        let caption = &mut self.caption;
        caption.bar_percent = if caption.bar_percent.is_finite() {
            caption.bar_percent.clamp(0.0, 100.0)
        } else {
            DEFAULT_BAR_PERCENT
        };
        let style = &mut caption.style;
        style.padding_x_ratio = clamp_ratio(style.padding_x_ratio, 0.03, 0.45);
        style.padding_y_ratio = clamp_ratio(style.padding_y_ratio, 0.10, 0.45);
        style.line_spacing_ratio = clamp_ratio(style.line_spacing_ratio, 0.25, 2.0);
        style.min_font_size = style.min_font_size.clamp(4, 200);

        self.encode.crf = self.encode.crf.min(51);
        if self.encode.threads == Some(0) {
            self.encode.threads = None;
        }
        self.encode.preset = normalize_enum(
            &self.encode.preset,
            &[
                "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow",
                "slower", "veryslow",
            ],
            "medium".to_string(),
        );

        if self.transcription.model.parse::<WhisperModel>().is_err() {
            warn!(model = %self.transcription.model, "Unknown whisper model, using base");
            self.transcription.model = "base".to_string();
        }
    }

    /// Loads settings from `path`. Missing fields take their defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::InputMissing(format!(
                "cannot read settings {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut settings: PipelineSettings = serde_json::from_str(&content)?;
        if settings.version < SETTINGS_VERSION {
            info!(
                "Migrating settings from version {} to {}",
                settings.version, SETTINGS_VERSION
            );
        }
        settings.normalize();
        Ok(settings)
    }

    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "Settings file not found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Saves settings using an atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let mut normalized = self.clone();
        normalized.normalize();
        let content = serde_json::to_string_pretty(&normalized)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("json.tmp");
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        // rename does not overwrite on Windows
        if cfg!(windows) && path.exists() {
            fs::remove_file(path)?;
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        info!("Settings saved to {:?}", path);
        Ok(())
    }
}

fn clamp_ratio(value: f32, fallback: f32, max: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(0.0, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.caption.bar_percent, 15.0);
        assert_eq!(settings.encode.crf, 23);
        assert_eq!(settings.encode.preset, "medium");
        assert_eq!(settings.transcription.audio.sample_rate, Some(16000));
        assert!(settings.paths.work_dir.ends_with("captionbar/work"));
        assert!(settings.ffmpeg.ffmpeg_path.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r##"{
            "caption": { "barPercent": 20, "textColor": { "r": 255, "g": 255, "b": 0, "a": 255 } },
            "encode": { "crf": 18 }
        }"##;
        let settings: PipelineSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.caption.bar_percent, 20.0);
        assert_eq!(settings.caption.style.text_color.b, 0);
        assert_eq!(settings.caption.style.min_font_size, 10);
        assert_eq!(settings.encode.crf, 18);
        assert_eq!(settings.encode.preset, "medium");
        assert_eq!(settings.transcription.model, "base");
    }

    #[test]
    fn test_normalize_corrects_bad_values() {
        let mut settings = PipelineSettings::default();
        settings.caption.bar_percent = f64::NAN;
        settings.caption.style.padding_x_ratio = 3.0;
        settings.encode.crf = 99;
        settings.encode.threads = Some(0);
        settings.encode.preset = "FAST".to_string();
        settings.transcription.model = "enormous".to_string();

        settings.normalize();

        assert_eq!(settings.caption.bar_percent, 15.0);
        assert!((settings.caption.style.padding_x_ratio - 0.45).abs() < 1e-6);
        assert_eq!(settings.encode.crf, 51);
        assert_eq!(settings.encode.threads, None);
        assert_eq!(settings.encode.preset, "fast");
        assert_eq!(settings.transcription.model, "base");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut settings = PipelineSettings::default();
        settings.paths.work_dir = dir.path().join("work");
        settings.caption.bar_percent = 12.0;
        settings.transcription.options.language = Some("ja".to_string());
        settings.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = PipelineSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);

        // overwrite in place
        settings.encode.crf = 30;
        settings.save(&path).unwrap();
        assert_eq!(PipelineSettings::load(&path).unwrap().encode.crf, 30);
    }

    #[test]
    fn test_load_or_default_tolerates_bad_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(
            PipelineSettings::load_or_default(&missing),
            PipelineSettings::default()
        );

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert!(matches!(
            PipelineSettings::load(&corrupt),
            Err(CoreError::JsonError(_))
        ));
        assert_eq!(
            PipelineSettings::load_or_default(&corrupt),
            PipelineSettings::default()
        );
    }

    #[test]
    fn test_resolved_model_path() {
        let mut transcription = TranscriptionSettings::default();
        assert!(transcription
            .resolved_model_path()
            .ends_with("ggml-base.bin"));

        transcription.model_path = Some(PathBuf::from("/models/custom.bin"));
        assert_eq!(
            transcription.resolved_model_path(),
            PathBuf::from("/models/custom.bin")
        );
    }
}
