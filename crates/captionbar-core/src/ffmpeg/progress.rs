//! FFmpeg Progress Parsing
//!
//! Parses the key/value blocks FFmpeg writes with `-progress pipe:1`.

use serde::{Deserialize, Serialize};

/// Encode progress update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeProgress {
    /// Current frame number
    pub frame: u64,
    /// Total frames expected
    pub total_frames: u64,
    /// Progress percentage (0-100)
    pub percent: f32,
    /// Current encoding FPS
    pub fps: f32,
    /// Estimated time remaining in seconds
    pub eta_seconds: u64,
}

/// Parsed FFmpeg progress line data
#[derive(Debug, Clone, Default)]
pub struct FFmpegProgressData {
    pub frame: u64,
    pub fps: f32,
    /// Current output time in seconds
    pub time_sec: f64,
    /// Speed multiplier (e.g., 2.5x)
    pub speed: Option<f32>,
}

/// Parse one FFmpeg progress output line into `data`.
///
/// ```text
/// frame=100
/// fps=30.0
/// out_time_ms=3333333
/// speed=2.5x
/// progress=continue
/// ```
///
/// Returns true when the line was recognized. A `progress=` line marks the
/// end of a block.
pub fn parse_ffmpeg_progress_line(line: &str, data: &mut FFmpegProgressData) -> bool {
    let line = line.trim();

    if let Some(value) = line.strip_prefix("frame=") {
        data.frame = value.trim().parse().unwrap_or(data.frame);
        return true;
    }

    if let Some(value) = line.strip_prefix("fps=") {
        data.fps = value.trim().parse().unwrap_or(data.fps);
        return true;
    }

    if let Some(value) = line.strip_prefix("out_time_ms=") {
        // out_time_ms is in microseconds despite the name
        if let Ok(microseconds) = value.trim().parse::<u64>() {
            data.time_sec = microseconds as f64 / 1_000_000.0;
        }
        return true;
    }

    if let Some(value) = line.strip_prefix("speed=") {
        if let Some(num_str) = value.trim().strip_suffix('x') {
            data.speed = num_str.trim().parse().ok();
        }
        return true;
    }

    line.starts_with("progress=")
}

/// Calculate encode progress from parsed data
pub fn calculate_encode_progress(
    data: &FFmpegProgressData,
    total_duration_sec: f64,
    total_frames: u64,
) -> EncodeProgress {
    let percent = if total_duration_sec > 0.0 {
        ((data.time_sec / total_duration_sec) * 100.0).clamp(0.0, 100.0) as f32
    } else if total_frames > 0 {
        ((data.frame as f64 / total_frames as f64) * 100.0).min(100.0) as f32
    } else {
        0.0
    };

    let remaining_time = (total_duration_sec - data.time_sec).max(0.0);
    let eta_seconds = match data.speed {
        Some(speed) if speed > 0.0 => (remaining_time / speed as f64) as u64,
        _ => 0,
    };

    EncodeProgress {
        frame: data.frame,
        total_frames,
        percent,
        fps: data.fps,
        eta_seconds,
    }
}
