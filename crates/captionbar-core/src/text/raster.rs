//! Caption Bitmap Rendering
//!
//! Draws a fitted layout into an RGBA buffer with straight (non-premultiplied)
//! alpha over a transparent background.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use super::font::FontFace;
use super::layout::{fit_text, measure_line, FitOutcome, FitRequest};
use super::RasterError;
use crate::captions::{CaptionStyle, Color, TextAlignment};

/// Renders cue text into bar-sized bitmaps with a shared font face.
#[derive(Debug, Clone)]
pub struct CaptionRasterizer {
    face: Arc<FontFace>,
    style: CaptionStyle,
}

impl CaptionRasterizer {
    pub fn new(face: FontFace, style: CaptionStyle) -> Self {
        Self {
            face: Arc::new(face),
            style,
        }
    }

    /// Resolves the style's font (with fallback) and builds a rasterizer
    pub fn from_style(style: CaptionStyle) -> Self {
        let face = FontFace::resolve(style.font_path.as_deref());
        Self::new(face, style)
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn style(&self) -> &CaptionStyle {
        &self.style
    }

    /// Fit request for a box using this rasterizer's style
    pub fn request(&self, width: u32, height: u32, initial_font_size: u32) -> FitRequest {
        FitRequest {
            box_width: width,
            box_height: height,
            initial_font_size,
            min_font_size: self.style.min_font_size,
            padding_x_ratio: self.style.padding_x_ratio,
            padding_y_ratio: self.style.padding_y_ratio,
            line_spacing_ratio: self.style.line_spacing_ratio,
        }
    }

    /// Renders `text` into a `width` x `height` bitmap.
    ///
    /// Always returns a buffer of exactly the requested size; on failure the
    /// buffer is fully transparent.
    pub fn render(&self, text: &str, width: u32, height: u32, initial_font_size: u32) -> RgbaImage {
        let request = self.request(width, height, initial_font_size);
        match render_text(
            &self.face,
            text,
            &request,
            self.style.text_color,
            self.style.alignment,
        ) {
            Ok((image, outcome)) => {
                debug!(
                    font_size = outcome.font_size,
                    lines = outcome.lines.len(),
                    attempts = outcome.attempts.len(),
                    fits = outcome.fits,
                    "Rasterized caption"
                );
                image
            }
            Err(e) => {
                let preview: String = text.chars().take(30).collect();
                warn!(error = %e, text = %preview, "Caption rasterization failed, using blank bitmap");
                RgbaImage::new(width, height)
            }
        }
    }
}

/// Fits and draws text, returning the bitmap and the accepted layout.
pub fn render_text(
    face: &FontFace,
    text: &str,
    request: &FitRequest,
    color: Color,
    alignment: TextAlignment,
) -> Result<(RgbaImage, FitOutcome), RasterError> {
    let (width, height) = (request.box_width, request.box_height);
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions { width, height });
    }

    let outcome = fit_text(face, text, request);
    let mut image = RgbaImage::new(width, height);
    if outcome.lines.is_empty() {
        return Ok((image, outcome));
    }

    let px = outcome.font_size as f32;
    let pad_x = request.padding_x() as f32;
    let pad_y = request.padding_y() as f32;

    let line_widths: Vec<f32> = outcome
        .lines
        .iter()
        .map(|line| measure_line(face, line, px))
        .collect();
    let block_width = line_widths.iter().copied().fold(0.0_f32, f32::max);

    let block_x = match alignment {
        TextAlignment::Center => (width as f32 - block_width) / 2.0,
        TextAlignment::Right => width as f32 - block_width - pad_x,
        TextAlignment::Left => pad_x,
    }
    .max(pad_x);
    let block_y = ((height as f32 - outcome.block_height) / 2.0).max(pad_y);

    for (i, (line, line_width)) in outcome.lines.iter().zip(&line_widths).enumerate() {
        let line_x = match alignment {
            TextAlignment::Center => block_x + (block_width - line_width) / 2.0,
            TextAlignment::Right => block_x + (block_width - line_width),
            TextAlignment::Left => block_x,
        };
        let baseline =
            block_y + i as f32 * (outcome.line_height + outcome.spacing) + outcome.ascent;
        draw_line(&mut image, face, line, px, line_x, baseline, color);
    }

    Ok((image, outcome))
}

fn draw_line(
    image: &mut RgbaImage,
    face: &FontFace,
    line: &str,
    px: f32,
    x: f32,
    baseline: f32,
    color: Color,
) {
    let mut pen_x = x;
    let mut prev: Option<char> = None;

    for ch in line.chars() {
        if let Some(p) = prev {
            pen_x += face.kern(p, ch, px);
        }
        let glyph = face.rasterize(ch, px);
        if glyph.width > 0 && glyph.height > 0 {
            let left = (pen_x + glyph.xmin as f32).round() as i64;
            let top = (baseline - glyph.ymin as f32 - glyph.height as f32).round() as i64;
            for row in 0..glyph.height {
                for col in 0..glyph.width {
                    let coverage = glyph.coverage[row * glyph.width + col];
                    if coverage == 0 {
                        continue;
                    }
                    blend_coverage(image, left + col as i64, top + row as i64, coverage, color);
                }
            }
        }
        pen_x += face.advance(ch, px);
        prev = Some(ch);
    }
}

/// Source-over blend of `color` at `coverage` into a straight-alpha pixel
fn blend_coverage(image: &mut RgbaImage, x: i64, y: i64, coverage: u8, color: Color) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    let src_a = (coverage as f32 / 255.0) * (color.a as f32 / 255.0);
    if src_a <= 0.0 {
        return;
    }

    let dst = image.get_pixel(x as u32, y as u32).0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    let channel = |src: u8, dst: u8| -> u8 {
        let value = (src as f32 * src_a + dst as f32 * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    image.put_pixel(
        x as u32,
        y as u32,
        Rgba([
            channel(color.r, dst[0]),
            channel(color.g, dst[1]),
            channel(color.b, dst[2]),
            (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        ]),
    );
}

/// True when every pixel of the bitmap is fully transparent
pub fn is_blank(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p.0[3] == 0)
}
