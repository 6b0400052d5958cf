// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mapping between frames and dense sample indices.

use ordoplay_editor_sequencer::{FrameNumber, FrameRange, FrameRate};

/// Evenly spaced frames `start, start + step, ..., end`, addressed by index.
///
/// `end` always equals `start + step * (count - 1)`; a requested end that
/// does not land on a step is pulled back to the last whole step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimeByIndex {
    /// First sampled frame (ticks)
    pub start: FrameNumber,
    /// Last sampled frame (ticks)
    pub end: FrameNumber,
    /// Distance between samples (ticks, at least 1)
    pub step: FrameNumber,
    /// Number of samples (at least 1)
    pub count: usize,
    /// Resolution the frames are expressed in
    pub tick_resolution: FrameRate,
}

impl FrameTimeByIndex {
    /// Sample `range` every `step` ticks
    pub fn new(range: FrameRange, step: FrameNumber, tick_resolution: FrameRate) -> Self {
        let step = FrameNumber(step.0.max(1));
        let span = (i64::from(range.end.0) - i64::from(range.start.0)).max(0);
        let steps = span / i64::from(step.0);
        let count = usize::try_from(steps).unwrap_or(0) + 1;
        let end = i64::from(range.start.0) + i64::from(step.0) * steps;
        let end = FrameNumber(end.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);
        Self {
            start: range.start,
            end,
            step,
            count,
            tick_resolution,
        }
    }

    /// Index of the sample at or just before `frame`, clamped to the range
    pub fn index(&self, frame: FrameNumber) -> usize {
        if frame <= self.start {
            return 0;
        }
        if frame >= self.end {
            return self.count - 1;
        }
        ((i64::from(frame.0) - i64::from(self.start.0)) / i64::from(self.step.0)) as usize
    }

    /// Frame of the sample at `index`; indices past the last sample give `end`
    pub fn frame(&self, index: usize) -> FrameNumber {
        let offset = i64::from(self.step.0).saturating_mul(i64::try_from(index).unwrap_or(i64::MAX));
        let frame = i64::from(self.start.0).saturating_add(offset).min(i64::from(self.end.0));
        FrameNumber(frame as i32)
    }

    /// Time of the sample at `index` in seconds
    pub fn seconds(&self, index: usize) -> f64 {
        self.tick_resolution.as_seconds(self.frame(index))
    }

    /// Frame range covered by the samples
    pub fn range(&self) -> FrameRange {
        FrameRange::new(self.start, self.end)
    }

    /// Whether `frame` lies inside the sampled range
    pub fn contains(&self, frame: FrameNumber) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Index range `[first, last]` for the samples inside `range`, if any
    pub fn index_range(&self, range: FrameRange) -> Option<(usize, usize)> {
        let overlap = self.range().intersection(&range)?;
        let mut first = self.index(overlap.start);
        if self.frame(first) < overlap.start {
            first += 1;
        }
        let last = self.index(overlap.end);
        (first <= last).then_some((first, last))
    }
}
