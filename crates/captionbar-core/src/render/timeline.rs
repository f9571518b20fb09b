//! Cue Timeline
//!
//! Binds cues to playback intervals and flattens them into non-overlapping
//! spans. Intervals are clipped to `[0, duration]`; where cues overlap, the
//! cue that starts later is shown (ties go to the later cue in document
//! order). Lookups use `[start, end)` semantics.

use tracing::debug;

use crate::captions::Cue;

/// One non-overlapping interval showing a single cue
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CueSpan {
    pub start: f64,
    pub end: f64,
    /// Position of the shown cue in [`CueTimeline::cues`]
    pub cue: usize,
}

/// Flattened cue timeline
#[derive(Clone, Debug, Default)]
pub struct CueTimeline {
    cues: Vec<Cue>,
    spans: Vec<CueSpan>,
}

impl CueTimeline {
    /// Builds the timeline for a video of `duration` seconds.
    ///
    /// A non-positive or non-finite duration leaves the end unbounded.
    pub fn build(cues: Vec<Cue>, duration: f64) -> Self {
        let limit = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            f64::INFINITY
        };

        // (clipped start, clipped end, cue position)
        let bindings: Vec<(f64, f64, usize)> = cues
            .iter()
            .enumerate()
            .filter_map(|(pos, cue)| {
                let start = cue.start.max(0.0);
                let end = cue.end.min(limit);
                (end > start).then_some((start, end, pos))
            })
            .collect();

        let mut bounds: Vec<f64> = bindings.iter().flat_map(|b| [b.0, b.1]).collect();
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();

        let mut spans: Vec<CueSpan> = Vec::new();
        for window in bounds.windows(2) {
            let (lo, hi) = (window[0], window[1]);
            let winner = bindings
                .iter()
                .filter(|b| b.0 <= lo && b.1 >= hi)
                .max_by(|a, b| {
                    cues[a.2]
                        .start
                        .total_cmp(&cues[b.2].start)
                        .then(a.2.cmp(&b.2))
                });
            let Some(&(_, _, cue)) = winner else {
                continue;
            };

            match spans.last_mut() {
                Some(last) if last.cue == cue && last.end == lo => last.end = hi,
                _ => spans.push(CueSpan {
                    start: lo,
                    end: hi,
                    cue,
                }),
            }
        }

        debug!(
            cues = cues.len(),
            bound = bindings.len(),
            spans = spans.len(),
            "Built cue timeline"
        );

        Self { cues, spans }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Spans in ascending time order
    pub fn spans(&self) -> &[CueSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Index of the span active at `time_sec`, if any
    pub fn span_index_at(&self, time_sec: f64) -> Option<usize> {
        let after = self.spans.partition_point(|span| span.start <= time_sec);
        let idx = after.checked_sub(1)?;
        (time_sec < self.spans[idx].end).then_some(idx)
    }

    /// Cue shown at `time_sec`, if any
    pub fn active_at(&self, time_sec: f64) -> Option<&Cue> {
        self.span_index_at(time_sec)
            .map(|idx| &self.cues[self.spans[idx].cue])
    }
}
