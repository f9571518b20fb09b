//! Cue Document (SRT) Writer and Parser
//!
//! # Format
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! First caption text
//!
//! 2
//! 00:00:05,500 --> 00:00:08,000
//! Second caption text
//! with multiple lines
//! ```
//!
//! The writer always emits `,` as the millisecond separator. The parser
//! accepts `,` or `.` and skips malformed blocks individually.

use tracing::{debug, warn};

use super::timestamp::{format_srt_timestamp, parse_srt_timestamp, TimestampError};
use super::{Cue, Segment};
use crate::{CoreError, CoreResult};

// =============================================================================
// Writer
// =============================================================================

/// Serializes transcript segments into a cue document.
///
/// Segments whose trimmed text is empty are skipped; indices stay contiguous
/// over the emitted blocks.
pub fn write_cue_document(segments: &[Segment]) -> Result<String, TimestampError> {
    let mut output = String::new();
    let mut index = 0usize;

    for segment in segments {
        let text = normalize_text(&segment.text);
        if text.is_empty() {
            continue;
        }
        index += 1;

        let start = format_srt_timestamp(segment.start)?;
        let end = format_srt_timestamp(segment.end)?;

        output.push_str(&format!("{}\n", index));
        output.push_str(&format!("{} --> {}\n", start, end));
        output.push_str(&text);
        output.push_str("\n\n");
    }

    debug!(blocks = index, skipped = segments.len() - index, "Serialized cue document");
    Ok(output)
}

/// Trims each line, drops blank lines and joins with `\n`.
///
/// A blank line inside a block would end it early when read back.
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Parser
// =============================================================================

/// A block the parser could not use
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedBlock {
    /// 1-based line number where the block starts
    pub line: usize,
    /// Why the block was rejected
    pub reason: String,
}

/// Result of parsing a cue document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CueParseOutcome {
    /// Recovered cues in document order
    pub cues: Vec<Cue>,
    /// Malformed blocks that were skipped
    pub skipped: Vec<SkippedBlock>,
    /// Blocks that parsed but carried no text
    pub empty_blocks: usize,
    /// True when the document had content but yielded no cues
    pub empty_result: bool,
}

impl CueParseOutcome {
    /// Escalates the empty-result advisory into an error.
    pub fn require_cues(self) -> CoreResult<Vec<Cue>> {
        if self.cues.is_empty() {
            let detail = if self.empty_result {
                format!(
                    "cue document has content but no usable cues ({} malformed blocks)",
                    self.skipped.len()
                )
            } else {
                "cue document is empty".to_string()
            };
            return Err(CoreError::EmptyResult(detail));
        }
        Ok(self.cues)
    }
}

/// Parses a cue document into an ordered cue list.
///
/// Never fails: malformed blocks are logged and reported in
/// [`CueParseOutcome::skipped`].
pub fn parse_cue_document(content: &str) -> CueParseOutcome {
    let normalized = content
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let mut outcome = CueParseOutcome::default();

    for (line, block) in split_blocks(&normalized) {
        match parse_block(&block) {
            Ok(Some((start, end, text))) => {
                let index = outcome.cues.len() + 1;
                outcome.cues.push(Cue {
                    index,
                    start,
                    end,
                    text,
                });
            }
            Ok(None) => outcome.empty_blocks += 1,
            Err(reason) => {
                warn!(line, %reason, "Skipping malformed cue block");
                outcome.skipped.push(SkippedBlock { line, reason });
            }
        }
    }

    if outcome.cues.is_empty() && !normalized.trim().is_empty() {
        warn!(
            skipped = outcome.skipped.len(),
            "Cue document has content but no cues were recovered"
        );
        outcome.empty_result = true;
    }

    outcome
}

/// Groups non-blank lines into blocks, remembering each block's first line
fn split_blocks(content: &str) -> Vec<(usize, Vec<&str>)> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 0;

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push((start_line, std::mem::take(&mut current)));
            }
            continue;
        }
        if current.is_empty() {
            start_line = i + 1;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push((start_line, current));
    }

    blocks
}

/// Parses one block; `Ok(None)` means the block is well-formed but has no text
fn parse_block(lines: &[&str]) -> Result<Option<(f64, f64, String)>, String> {
    let mut rest = lines.iter();

    let index_line = rest.next().ok_or("empty block")?.trim();
    if index_line.is_empty() || !index_line.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("expected cue index, found '{}'", index_line));
    }

    let timing_line = rest.next().ok_or("missing timing line")?;
    let (start, end) = parse_timing_line(timing_line)?;

    let text = rest.copied().collect::<Vec<_>>().join("\n");
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some((start, end, text.to_string())))
}

/// Parses a timing line (e.g., "00:00:01,000 --> 00:00:04,000")
fn parse_timing_line(line: &str) -> Result<(f64, f64), String> {
    let (start_part, end_part) = line
        .split_once("-->")
        .ok_or_else(|| format!("expected 'start --> end', found '{}'", line.trim()))?;

    // Trailing cue settings (e.g. "X1:40") are ignored.
    let end_str = end_part.split_whitespace().next().unwrap_or_default();

    let start = parse_srt_timestamp(start_part).map_err(|e| e.to_string())?;
    let end = parse_srt_timestamp(end_str).map_err(|e| e.to_string())?;

    if end < start {
        return Err(format!("end {} precedes start {}", end_str, start_part.trim()));
    }

    Ok((start, end))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment::new(start, end, text)
    }

    // -------------------------------------------------------------------------
    // Writer Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_write_basic_document() {
        let doc = write_cue_document(&[
            seg(1.0, 4.0, " Hello World "),
            seg(5.5, 8.0, "Second caption"),
        ])
        .unwrap();

        assert_eq!(
            doc,
            "1\n00:00:01,000 --> 00:00:04,000\nHello World\n\n\
             2\n00:00:05,500 --> 00:00:08,000\nSecond caption\n\n"
        );
    }

    #[test]
    fn test_write_skips_empty_text_and_keeps_indices_contiguous() {
        let doc = write_cue_document(&[
            seg(0.0, 1.0, "first"),
            seg(1.0, 2.0, "   "),
            seg(2.0, 3.0, "third"),
        ])
        .unwrap();

        assert!(doc.contains("1\n00:00:00,000"));
        assert!(doc.contains("2\n00:00:02,000 --> 00:00:03,000\nthird"));
        assert!(!doc.contains("3\n"));
    }

    #[test]
    fn test_write_rejects_negative_timestamp() {
        let result = write_cue_document(&[seg(-1.0, 1.0, "bad")]);
        assert!(matches!(result, Err(TimestampError::InvalidArgument(_))));
    }

    #[test]
    fn test_write_drops_interior_blank_lines() {
        let doc = write_cue_document(&[seg(0.0, 1.0, "  first  \n\n \n second ")]).unwrap();
        assert_eq!(doc, "1\n00:00:00,000 --> 00:00:01,000\nfirst\nsecond\n\n");
    }

    #[test]
    fn test_write_empty_input_gives_empty_document() {
        assert_eq!(write_cue_document(&[]).unwrap(), "");
    }

    // -------------------------------------------------------------------------
    // Parser Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_basic() {
        let srt = "1\n00:00:01,000 --> 00:00:04,000\nHello World\n\n\
                   2\n00:00:05,500 --> 00:00:08,000\nSecond caption\n";

        let outcome = parse_cue_document(srt);
        assert_eq!(outcome.cues.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert!(!outcome.empty_result);

        assert_eq!(outcome.cues[0].index, 1);
        assert_eq!(outcome.cues[0].start, 1.0);
        assert_eq!(outcome.cues[0].end, 4.0);
        assert_eq!(outcome.cues[0].text, "Hello World");
        assert_eq!(outcome.cues[1].start, 5.5);
        assert_eq!(outcome.cues[1].text, "Second caption");
    }

    #[test]
    fn test_parse_multiline_crlf_and_dot_separator() {
        let srt = "\u{feff}1\r\n00:00:00.000 --> 00:00:05.000\r\nLine one\r\nLine two\r\n";

        let cues = parse_cue_document(srt).require_cues().unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Line one\nLine two");
        assert_eq!(cues[0].end, 5.0);
    }

    #[test]
    fn test_parse_ignores_trailing_cue_settings() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000 X1:40 X2:600\nPositioned\n";
        let cues = parse_cue_document(srt).cues;
        assert_eq!(cues[0].end, 2.0);
    }

    #[test]
    fn test_parse_skips_only_malformed_block() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nfirst\n\n\
                   2\n00:00:invalid --> 00:00:04,000\nbroken\n\n\
                   3\n00:00:05,000 --> 00:00:06,000\nthird\n";

        let outcome = parse_cue_document(srt);
        assert_eq!(outcome.cues.len(), 2);
        assert_eq!(outcome.cues[0].text, "first");
        assert_eq!(outcome.cues[1].text, "third");
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].line, 5);
    }

    #[test]
    fn test_parse_survives_overflowing_timestamp() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nfirst\n\n\
                   2\n10000000000000000:00:00,000 --> 10000000000000000:00:01,000\nhuge\n\n\
                   3\n00:00:05,000 --> 00:00:06,000\nthird\n";

        let outcome = parse_cue_document(srt);
        assert_eq!(outcome.cues.len(), 2);
        assert_eq!(outcome.cues[0].text, "first");
        assert_eq!(outcome.cues[1].text, "third");
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].line, 5);
    }

    #[test]
    fn test_parse_rejects_missing_index_and_reversed_times() {
        let srt = "00:00:01,000 --> 00:00:02,000\nno index\n\n\
                   2\n00:00:05,000 --> 00:00:04,000\nreversed\n\n\
                   3\n00:00:06,000 --> 00:00:07,000\nok\n";

        let outcome = parse_cue_document(srt);
        assert_eq!(outcome.cues.len(), 1);
        assert_eq!(outcome.cues[0].text, "ok");
        assert_eq!(outcome.cues[0].index, 1);
        assert_eq!(outcome.skipped.len(), 2);
    }

    #[test]
    fn test_parse_drops_blocks_without_text() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\n\n\
                   2\n00:00:03,000 --> 00:00:04,000\nkept\n";

        let outcome = parse_cue_document(srt);
        assert_eq!(outcome.cues.len(), 1);
        assert_eq!(outcome.empty_blocks, 1);
    }

    #[test]
    fn test_parse_keeps_document_order() {
        let srt = "1\n00:00:05,000 --> 00:00:06,000\nlater\n\n\
                   2\n00:00:01,000 --> 00:00:02,000\nearlier\n";

        let cues = parse_cue_document(srt).cues;
        assert_eq!(cues[0].text, "later");
        assert_eq!(cues[1].text, "earlier");
    }

    #[test]
    fn test_parse_garbage_reports_empty_result() {
        let outcome = parse_cue_document("this is not\na cue document\n");
        assert!(outcome.cues.is_empty());
        assert!(outcome.empty_result);

        let err = outcome.require_cues().unwrap_err();
        assert!(matches!(err, CoreError::EmptyResult(_)));
    }

    #[test]
    fn test_parse_blank_document_is_not_flagged() {
        let outcome = parse_cue_document("  \n\n");
        assert!(outcome.cues.is_empty());
        assert!(!outcome.empty_result);
        assert!(outcome.require_cues().is_err());
    }

    // -------------------------------------------------------------------------
    // Roundtrip Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_write_then_parse_keeps_paragraphs_in_one_cue() {
        let segments = vec![
            seg(0.0, 2.0, "first paragraph\n\nsecond paragraph"),
            seg(2.0, 3.0, "next"),
        ];

        let outcome = parse_cue_document(&write_cue_document(&segments).unwrap());
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.cues.len(), 2);
        assert_eq!(outcome.cues[0].text, "first paragraph\nsecond paragraph");
        assert_eq!(outcome.cues[1].text, "next");
    }

    #[test]
    fn test_write_then_parse_matches_segments() {
        let segments = vec![
            seg(0.0, 1.25, "  Hello  "),
            seg(1.25, 1.25, ""),
            seg(2.0, 4.5, "Second\r\nMultiline"),
            seg(3.0, 9.999, "overlapping and out of order"),
            seg(0.5, 0.75, "earlier"),
        ];

        let doc = write_cue_document(&segments).unwrap();
        let cues = parse_cue_document(&doc).require_cues().unwrap();

        let expected: Vec<&Segment> = segments
            .iter()
            .filter(|s| !s.text.trim().is_empty())
            .collect();
        assert_eq!(cues.len(), expected.len());
        for (cue, segment) in cues.iter().zip(expected) {
            assert!((cue.start - segment.start).abs() < 0.001);
            assert!((cue.end - segment.end).abs() < 0.001);
            assert_eq!(cue.text, normalize_text(&segment.text));
        }
    }
}
