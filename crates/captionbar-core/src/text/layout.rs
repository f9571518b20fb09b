//! Caption Text Layout
//!
//! Greedy word wrapping, line measurement and the font-size fit search used
//! before a cue is drawn into the caption bar.

use super::font::FontFace;

/// Font sizes are reduced by this many pixels per fit attempt.
pub const FONT_SIZE_STEP: u32 = 2;

/// Lower bound on the wrap budget, in characters.
pub const MIN_CHARS_PER_LINE: usize = 10;

/// Geometry and spacing constraints for fitting text into a box
#[derive(Debug, Clone, PartialEq)]
pub struct FitRequest {
    pub box_width: u32,
    pub box_height: u32,
    pub initial_font_size: u32,
    pub min_font_size: u32,
    /// Horizontal padding per side as a fraction of `box_width`
    pub padding_x_ratio: f32,
    /// Vertical padding per side as a fraction of `box_height`
    pub padding_y_ratio: f32,
    /// Inter-line gap as a fraction of the font size
    pub line_spacing_ratio: f32,
}

impl FitRequest {
    pub fn padding_x(&self) -> u32 {
        (self.box_width as f32 * self.padding_x_ratio) as u32
    }

    pub fn padding_y(&self) -> u32 {
        (self.box_height as f32 * self.padding_y_ratio) as u32
    }

    /// Width available to text after horizontal padding
    pub fn text_area_width(&self) -> f32 {
        self.box_width.saturating_sub(2 * self.padding_x()) as f32
    }

    /// Height available to text after vertical padding
    pub fn text_area_height(&self) -> f32 {
        self.box_height.saturating_sub(2 * self.padding_y()) as f32
    }
}

/// Accepted layout from the fit search
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub font_size: u32,
    pub lines: Vec<String>,
    pub line_height: f32,
    pub ascent: f32,
    pub spacing: f32,
    pub block_height: f32,
    /// False when the floor size was reached and the block still overflows
    pub fits: bool,
    /// Every size tried, in order
    pub attempts: Vec<u32>,
}

/// Wraps text greedily to at most `max_chars` per line.
///
/// Whitespace runs (including line breaks) collapse to single spaces and
/// words are never broken; a word longer than the budget gets its own line.
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Rendered width of a single line at `px`
pub fn measure_line(face: &FontFace, line: &str, px: f32) -> f32 {
    let mut width = 0.0;
    let mut prev: Option<char> = None;
    for ch in line.chars() {
        if let Some(p) = prev {
            width += face.kern(p, ch, px);
        }
        width += face.advance(ch, px);
        prev = Some(ch);
    }
    width
}

/// Height of a block of `line_count` lines
pub fn block_height(line_count: usize, line_height: f32, spacing: f32) -> f32 {
    if line_count == 0 {
        return 0.0;
    }
    line_count as f32 * line_height + (line_count - 1) as f32 * spacing
}

/// Average glyph width estimated from a two-character sample
fn average_char_width(face: &FontFace, px: f32) -> f32 {
    let sample = measure_line(face, "Ww", px) / 2.0;
    if sample > 0.0 {
        sample
    } else {
        px * 0.6
    }
}

/// Searches for the largest font size (descending) at which the wrapped
/// text fits the padded box height.
///
/// The size decreases monotonically by [`FONT_SIZE_STEP`] and stops at
/// `min_font_size`, so the loop runs at most
/// `(initial - min) / FONT_SIZE_STEP + 2` times.
pub fn fit_text(face: &FontFace, text: &str, request: &FitRequest) -> FitOutcome {
    let min_size = request.min_font_size.max(1);
    let mut size = request.initial_font_size.max(min_size);
    let max_height = request.text_area_height();
    let area_width = request.text_area_width();
    let mut attempts = Vec::new();

    loop {
        attempts.push(size);
        let px = size as f32;

        let avg_width = average_char_width(face, px);
        let chars_per_line = ((area_width / avg_width) as usize).max(MIN_CHARS_PER_LINE);
        let lines = wrap_words(text, chars_per_line);

        let metrics = face.line_metrics(px);
        let spacing = (px * request.line_spacing_ratio).max(0.0);
        let height = block_height(lines.len(), metrics.height(), spacing);
        let fits = height <= max_height;

        if !fits && size > min_size {
            size = size.saturating_sub(FONT_SIZE_STEP).max(min_size);
            continue;
        }

        return FitOutcome {
            font_size: size,
            lines,
            line_height: metrics.height(),
            ascent: metrics.ascent,
            spacing,
            block_height: height,
            fits,
            attempts,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u32, height: u32, initial: u32) -> FitRequest {
        FitRequest {
            box_width: width,
            box_height: height,
            initial_font_size: initial,
            min_font_size: 10,
            padding_x_ratio: 0.03,
            padding_y_ratio: 0.10,
            line_spacing_ratio: 0.25,
        }
    }

    #[test]
    fn test_wrap_words_greedy() {
        let lines = wrap_words("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(
            lines,
            vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]
        );
    }

    #[test]
    fn test_wrap_words_collapses_whitespace_and_keeps_long_words() {
        let lines = wrap_words("  a\n\n supercalifragilistic   b ", 10);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_wrap_words_empty() {
        assert!(wrap_words("   ", 10).is_empty());
    }

    #[test]
    fn test_measure_line_builtin() {
        let face = FontFace::builtin();
        assert_eq!(measure_line(&face, "abc", 10.0), 30.0);
        assert_eq!(measure_line(&face, "", 10.0), 0.0);
    }

    #[test]
    fn test_block_height() {
        assert_eq!(block_height(0, 10.0, 2.0), 0.0);
        assert_eq!(block_height(1, 10.0, 2.0), 10.0);
        assert_eq!(block_height(3, 10.0, 2.0), 34.0);
    }

    #[test]
    fn test_fit_short_text_keeps_initial_size() {
        let face = FontFace::builtin();
        let outcome = fit_text(&face, "hello", &request(1280, 108, 32));
        assert_eq!(outcome.font_size, 32);
        assert_eq!(outcome.attempts, vec![32]);
        assert!(outcome.fits);
        assert_eq!(outcome.lines, vec!["hello"]);
    }

    #[test]
    fn test_fit_overflowing_text_shrinks_monotonically() {
        let face = FontFace::builtin();
        let text = "this caption is far too long to fit on one or two lines at the \
                    starting size so the search has to shrink the font several times";
        let outcome = fit_text(&face, text, &request(640, 108, 32));

        assert!(outcome.attempts.len() > 1);
        assert!(outcome.attempts.windows(2).all(|w| w[1] < w[0]));
        assert!(outcome.font_size < 32);
        assert!(outcome.fits);
        assert!(outcome.block_height <= request(640, 108, 32).text_area_height());
    }

    #[test]
    fn test_fit_stops_at_floor_when_nothing_fits() {
        let face = FontFace::builtin();
        let text = "word ".repeat(400);
        let req = request(200, 50, 31);
        let outcome = fit_text(&face, &text, &req);

        assert_eq!(outcome.font_size, 10);
        assert!(!outcome.fits);
        // 31, 29, ..., 11, 10
        assert!(outcome.attempts.len() <= ((31 - 10) / FONT_SIZE_STEP + 2) as usize);
        assert_eq!(*outcome.attempts.last().unwrap(), 10);
    }

    #[test]
    fn test_fit_initial_below_floor_starts_at_floor() {
        let face = FontFace::builtin();
        let outcome = fit_text(&face, "hi", &request(400, 60, 4));
        assert_eq!(outcome.attempts, vec![10]);
    }

    #[test]
    fn test_chars_per_line_never_below_minimum() {
        let face = FontFace::builtin();
        // 100px wide box at 30px -> ~3 chars, clamped to 10
        let outcome = fit_text(&face, "abcdefghi jklmnopqr", &request(100, 1000, 30));
        assert_eq!(outcome.lines, vec!["abcdefghi", "jklmnopqr"]);
    }
}
