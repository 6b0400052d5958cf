// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame numbers and frame rates.
//!
//! All key times inside a sequence are stored in ticks of the sequence's
//! tick resolution. The display rate is only used when the editor steps
//! or snaps by whole "visible" frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A whole frame at some frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FrameNumber(pub i32);

impl FrameNumber {
    /// Frame zero
    pub const ZERO: Self = Self(0);

    /// Raw frame value
    pub fn value(self) -> i32 {
        self.0
    }
}

impl Add for FrameNumber {
    type Output = FrameNumber;

    fn add(self, rhs: FrameNumber) -> FrameNumber {
        FrameNumber(self.0.saturating_add(rhs.0))
    }
}

impl Sub for FrameNumber {
    type Output = FrameNumber;

    fn sub(self, rhs: FrameNumber) -> FrameNumber {
        FrameNumber(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rational frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Frames per `denominator` seconds
    pub numerator: u32,
    /// Seconds per `numerator` frames
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Whole frames per second
    pub const fn fps(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    /// Frames per second as a float
    pub fn as_decimal(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        f64::from(self.numerator) / f64::from(self.denominator)
    }

    /// Length of one frame in seconds
    pub fn as_interval(&self) -> f64 {
        if self.numerator == 0 {
            return 0.0;
        }
        f64::from(self.denominator) / f64::from(self.numerator)
    }

    /// Convert a frame to seconds
    pub fn as_seconds(&self, frame: FrameNumber) -> f64 {
        f64::from(frame.0) * self.as_interval()
    }

    /// Convert seconds to a fractional frame
    pub fn as_frame_time(&self, seconds: f64) -> f64 {
        seconds * self.as_decimal()
    }

    /// Convert seconds to the nearest whole frame
    pub fn as_frame_number(&self, seconds: f64) -> FrameNumber {
        FrameNumber(self.as_frame_time(seconds).round() as i32)
    }

    /// Convert a frame between two rates, rounding to the nearest frame
    pub fn transform_time(frame: FrameNumber, from: FrameRate, to: FrameRate) -> FrameNumber {
        to.as_frame_number(from.as_seconds(frame))
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::fps(30)
    }
}

/// An inclusive range of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame
    pub start: FrameNumber,
    /// Last frame (inclusive)
    pub end: FrameNumber,
}

impl FrameRange {
    /// Create a range, swapping the bounds if needed
    pub fn new(start: FrameNumber, end: FrameNumber) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Whether the frame lies inside the range
    pub fn contains(&self, frame: FrameNumber) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Overlap of two ranges
    pub fn intersection(&self, other: &FrameRange) -> Option<FrameRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(FrameRange { start, end })
    }

    /// Grow the range so that it includes `frame`
    pub fn include(&mut self, frame: FrameNumber) {
        self.start = self.start.min(frame);
        self.end = self.end.max(frame);
    }

    /// Clamp a frame into the range
    pub fn clamp(&self, frame: FrameNumber) -> FrameNumber {
        frame.clamp(self.start, self.end)
    }
}
