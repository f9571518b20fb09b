//! Canvas Geometry
//!
//! Sizes the caption bar appended below the source picture.

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Bar height as a percentage of the source height
pub const DEFAULT_BAR_PERCENT: f64 = 15.0;

/// Minimum bar height in pixels
const MIN_BAR_PX: u32 = 50;

/// Dimensions of the extended frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasGeometry {
    pub original_width: u32,
    pub original_height: u32,
    /// Height of the caption bar (always even)
    pub bar_height: u32,
    /// original_height + bar_height
    pub total_height: u32,
}

impl CanvasGeometry {
    /// Computes the bar for a source of `width` x `height`.
    ///
    /// The bar is `bar_percent` of the height, raised to at least
    /// `max(50, 10% of height)`, capped at 25% of the height and made even.
    pub fn compute(width: u32, height: u32, bar_percent: f64) -> CoreResult<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidArgument(format!(
                "video dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if !bar_percent.is_finite() || bar_percent < 0.0 {
            return Err(CoreError::InvalidArgument(format!(
                "bar percentage must be a non-negative number, got {}",
                bar_percent
            )));
        }

        let raw = (height as f64 * bar_percent / 100.0).floor() as u32;
        let floor = MIN_BAR_PX.max(height / 10);
        let cap = height / 4;

        let mut bar = raw.max(floor).min(cap);
        if bar % 2 == 1 {
            bar = if bar < cap { bar + 1 } else { bar - 1 };
        }
        // yuv420p needs at least two rows
        let bar = bar.max(2);

        Ok(Self {
            original_width: width,
            original_height: height,
            bar_height: bar,
            total_height: height + bar,
        })
    }

    /// Source width as encoded (yuv420p needs even dimensions)
    pub fn encoded_width(&self) -> u32 {
        self.original_width & !1
    }

    /// Source height as encoded
    pub fn encoded_source_height(&self) -> u32 {
        self.original_height & !1
    }

    /// Height of the encoded output frame
    pub fn encoded_total_height(&self) -> u32 {
        self.encoded_source_height() + self.bar_height
    }

    /// Byte length of one RGBA bar frame
    pub fn bar_frame_len(&self) -> usize {
        self.encoded_width() as usize * self.bar_height as usize * 4
    }
}
