//! Caption Bar Frame Generator
//!
//! Produces raw RGBA frames for the caption bar, one per output frame.
//! Bitmaps are rasterized when their span first becomes active and dropped
//! when it ends.

use image::RgbaImage;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::timeline::CueTimeline;
use crate::captions::Color;
use crate::text::{is_blank, CaptionRasterizer};

/// Blends a straight-alpha bitmap over an opaque background color.
pub fn composite_over(bitmap: &RgbaImage, background: Color) -> Vec<u8> {
    let bg = background.to_array();
    let mut out = Vec::with_capacity(bitmap.as_raw().len());
    for px in bitmap.as_raw().chunks_exact(4) {
        let alpha = px[3] as u32;
        for c in 0..3 {
            let value = (px[c] as u32 * alpha + bg[c] as u32 * (255 - alpha) + 127) / 255;
            out.push(value as u8);
        }
        out.push(255);
    }
    out
}

struct ActiveSpan {
    span: usize,
    /// None when the cue rasterized to nothing
    frame: Option<Vec<u8>>,
}

/// Resolves each output frame to its caption bar contents
pub struct BarFrameGenerator {
    timeline: CueTimeline,
    rasterizer: CaptionRasterizer,
    width: u32,
    height: u32,
    fps: f64,
    initial_font_size: u32,
    blank: Vec<u8>,
    active: Option<ActiveSpan>,
    rasterized: usize,
}

impl BarFrameGenerator {
    pub fn new(
        timeline: CueTimeline,
        rasterizer: CaptionRasterizer,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Self {
        let bar_color = rasterizer.style().bar_color;
        let blank = composite_over(&RgbaImage::new(width, height), bar_color);
        let initial_font_size = rasterizer.style().initial_font_size(height);
        Self {
            timeline,
            rasterizer,
            width,
            height,
            fps,
            initial_font_size,
            blank,
            active: None,
            rasterized: 0,
        }
    }

    /// Byte length of every frame
    pub fn frame_len(&self) -> usize {
        self.blank.len()
    }

    /// Number of cue bitmaps rasterized so far
    pub fn rasterized_count(&self) -> usize {
        self.rasterized
    }

    /// Frames needed to cover `duration` seconds
    pub fn frame_count(&self, duration: f64) -> u64 {
        (duration * self.fps).ceil().max(0.0) as u64 + 1
    }

    /// RGBA bytes of frame `index` (shown at `index / fps`)
    pub fn frame(&mut self, index: u64) -> &[u8] {
        let time_sec = index as f64 / self.fps;
        let Some(span_idx) = self.timeline.span_index_at(time_sec) else {
            if self.active.take().is_some() {
                trace!(time_sec, "Caption span ended");
            }
            return &self.blank;
        };

        let stale = self.active.as_ref().map_or(true, |a| a.span != span_idx);
        if stale {
            let span = self.timeline.spans()[span_idx];
            let cue = &self.timeline.cues()[span.cue];
            let bitmap =
                self.rasterizer
                    .render(&cue.text, self.width, self.height, self.initial_font_size);
            self.rasterized += 1;
            debug!(
                cue = cue.index,
                start = span.start,
                end = span.end,
                "Rasterized caption for span"
            );
            let frame = (!is_blank(&bitmap))
                .then(|| composite_over(&bitmap, self.rasterizer.style().bar_color));
            self.active = Some(ActiveSpan {
                span: span_idx,
                frame,
            });
        }

        match self.active.as_ref().and_then(|a| a.frame.as_deref()) {
            Some(frame) => frame,
            None => &self.blank,
        }
    }

    /// Writes frames `0..total` to `writer`.
    ///
    /// Returns the number of frames written. A reader that closes early
    /// (broken pipe) ends the stream without error.
    pub async fn write_frames<W>(&mut self, writer: &mut W, total: u64) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0;
        while written < total {
            let result = {
                let frame = self.frame(written);
                writer.write_all(frame).await
            };
            match result {
                Ok(()) => written += 1,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!(written, total, "Frame reader closed early");
                    return Ok(written);
                }
                Err(e) => return Err(e),
            }
        }
        if let Err(e) = writer.flush().await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e);
            }
        }
        Ok(written)
    }
}
