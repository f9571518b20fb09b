//! SRT Timestamp Codec
//!
//! Converts seconds to `HH:MM:SS,mmm` and back with millisecond precision.
//! Hours are unbounded; both `,` and `.` are accepted as the millisecond
//! separator when decoding.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors produced by the timestamp codec
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimestampError {
    /// Seconds value outside the encodable domain (negative, NaN or infinite)
    #[error("Timestamp must be a finite, non-negative number of seconds: {0}")]
    InvalidArgument(f64),

    /// Text does not follow `HH:MM:SS,mmm`
    #[error("Invalid timestamp: {0}")]
    Malformed(String),
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})$").expect("static timestamp pattern")
    })
}

/// Formats seconds as an SRT timestamp (00:00:00,000)
pub fn format_srt_timestamp(seconds: f64) -> Result<String, TimestampError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TimestampError::InvalidArgument(seconds));
    }

    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    Ok(format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms))
}

/// Parses an SRT timestamp (e.g., "00:01:23,456" or "00:01:23.456") into seconds
pub fn parse_srt_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let trimmed = ts.trim();
    let malformed = || TimestampError::Malformed(trimmed.to_string());

    let caps = timestamp_regex().captures(trimmed).ok_or_else(malformed)?;
    let field = |i: usize| -> Result<u64, TimestampError> {
        caps[i].parse::<u64>().map_err(|_| malformed())
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let millis = field(4)?;

    if minutes >= 60 || seconds >= 60 {
        return Err(malformed());
    }

    let total_ms = hours
        .checked_mul(60)
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(malformed)?;
    Ok(total_ms as f64 / 1000.0)
}

/// Alias used by callers that think in codec terms
pub use format_srt_timestamp as encode;
/// Alias used by callers that think in codec terms
pub use parse_srt_timestamp as decode;
