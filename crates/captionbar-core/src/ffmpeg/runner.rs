//! FFmpeg Runner Module
//!
//! Runs FFprobe for media inspection and FFmpeg for audio extraction, and
//! hands out configured commands for the caption encoder.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Media information extracted by FFprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration_sec: f64,
    /// Video stream info (if present)
    pub video: Option<VideoStreamInfo>,
    /// Audio stream info (if present)
    pub audio: Option<AudioStreamInfo>,
    /// Container format
    pub format: String,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Video stream information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate (frames per second)
    pub fps: f64,
    /// Frame rate exactly as ffprobe reported it (e.g. "30000/1001")
    pub frame_rate: String,
    /// Codec name (e.g., "h264", "vp9")
    pub codec: String,
    pub pixel_format: String,
}

/// Audio stream information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u8,
    /// Codec name (e.g., "aac", "mp3")
    pub codec: String,
}

/// Output layout for extracted transcription audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioExtractOptions {
    /// Resample to this rate (None = keep source rate)
    pub sample_rate: Option<u32>,
    /// Downmix to this many channels (None = keep source layout)
    pub channels: Option<u8>,
}

impl Default for AudioExtractOptions {
    /// 16kHz mono, the layout whisper models expect
    fn default() -> Self {
        Self {
            sample_rate: Some(16000),
            channels: Some(1),
        }
    }
}

/// FFmpeg Runner for executing media commands
#[derive(Clone, Debug)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// A tokio command for the ffmpeg binary with platform flags applied
    pub fn ffmpeg_command(&self) -> tokio::process::Command {
        configured_command(&self.info.ffmpeg_path)
    }

    /// Probe media file to get information
    pub async fn probe(&self, input: &Path) -> FFmpegResult<MediaInfo> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let output = configured_command(&self.info.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input)
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!("FFprobe failed: {}", stderr)));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&json_str)
    }

    /// Extracts the first audio stream to a PCM s16le WAV file.
    pub async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        options: &AudioExtractOptions,
    ) -> FFmpegResult<()> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(FFmpegError::OutputError(format!(
                    "Output directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let args = build_audio_extract_args(input, output, options);
        debug!(?args, "Extracting audio");

        let result = self
            .ffmpeg_command()
            .args(&args)
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Audio extraction failed: {}",
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(FFmpegError::OutputError(format!(
                "Audio file was not created: {}",
                output.display()
            )));
        }

        Ok(())
    }
}

fn configured_command(program: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.kill_on_drop(true);
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

fn build_audio_extract_args(
    input: &Path,
    output: &Path,
    options: &AudioExtractOptions,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-map".to_string(),
        "0:a:0".to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
    ];
    if let Some(rate) = options.sample_rate {
        args.push("-ar".to_string());
        args.push(rate.to_string());
    }
    if let Some(channels) = options.channels {
        args.push("-ac".to_string());
        args.push(channels.to_string());
    }
    args.push("-y".to_string());
    args.push(output.to_string_lossy().to_string());
    args
}

/// Parse FFprobe JSON output
fn parse_probe_output(json_str: &str) -> FFmpegResult<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = json
        .get("format")
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;

    let duration_sec = format
        .get("duration")
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size_bytes = format
        .get("size")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut video_info: Option<VideoStreamInfo> = None;
    let mut audio_info: Option<AudioStreamInfo> = None;

    for stream in streams {
        match stream.get("codec_type").and_then(|c| c.as_str()) {
            Some("video") if video_info.is_none() && !is_attached_picture(&stream) => {
                video_info = Some(parse_video_stream(&stream));
            }
            Some("audio") if audio_info.is_none() => {
                audio_info = Some(parse_audio_stream(&stream));
            }
            _ => {}
        }
    }

    Ok(MediaInfo {
        duration_sec,
        video: video_info,
        audio: audio_info,
        format: format_name,
        size_bytes,
    })
}

/// Cover art is reported as a video stream; it is not the picture track.
fn is_attached_picture(stream: &serde_json::Value) -> bool {
    stream
        .get("disposition")
        .and_then(|d| d.get("attached_pic"))
        .and_then(|v| v.as_u64())
        == Some(1)
}

/// Parses "30/1" or "30000/1001" style rates
fn parse_frame_rate(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den > 0.0 && num > 0.0).then(|| num / den)
        }
        None => value.parse().ok().filter(|fps: &f64| *fps > 0.0),
    }
}

fn parse_video_stream(stream: &serde_json::Value) -> VideoStreamInfo {
    let width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;

    // avg_frame_rate reflects variable-rate sources better than r_frame_rate
    let (frame_rate, fps) = ["avg_frame_rate", "r_frame_rate"]
        .iter()
        .filter_map(|key| stream.get(*key).and_then(|f| f.as_str()))
        .find_map(|raw| parse_frame_rate(raw).map(|fps| (raw.trim().to_string(), fps)))
        .unwrap_or_else(|| ("30".to_string(), 30.0));

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    let pixel_format = stream
        .get("pix_fmt")
        .and_then(|p| p.as_str())
        .unwrap_or("unknown")
        .to_string();

    VideoStreamInfo {
        width,
        height,
        fps,
        frame_rate,
        codec,
        pixel_format,
    }
}

fn parse_audio_stream(stream: &serde_json::Value) -> AudioStreamInfo {
    let sample_rate = stream
        .get("sample_rate")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(44100);

    let channels = stream.get("channels").and_then(|c| c.as_u64()).unwrap_or(2) as u8;

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    AudioStreamInfo {
        sample_rate,
        channels,
        codec,
    }
}
