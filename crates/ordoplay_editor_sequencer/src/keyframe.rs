// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframes, float channels and interpolation helpers.

use crate::time::FrameNumber;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpolation mode between keyframes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Constant (step)
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Auto-smooth
    Auto,
}

/// A keyframe on a float channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyframe {
    /// Unique keyframe ID
    pub id: KeyframeId,
    /// Time in ticks
    pub time: FrameNumber,
    /// Value at this keyframe
    pub value: f64,
    /// Interpolation mode to next keyframe
    pub interpolation: InterpolationMode,
}

impl Keyframe {
    /// Create a new keyframe
    pub fn new(time: FrameNumber, value: f64) -> Self {
        Self {
            id: KeyframeId::new(),
            time,
            value,
            interpolation: InterpolationMode::Linear,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// Hermite spline interpolation (for auto-smooth)
    pub fn hermite(p0: f64, m0: f64, p1: f64, m1: f64, t: f64) -> f64 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }

    /// Interpolate Vec3
    pub fn lerp_vec3(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
        ]
    }

    /// Spherical linear interpolation for quaternions (x, y, z, w)
    pub fn slerp(a: [f64; 4], b: [f64; 4], t: f64) -> [f64; 4] {
        let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];

        // Take the short way round
        let mut b = b;
        if dot < 0.0 {
            b = [-b[0], -b[1], -b[2], -b[3]];
            dot = -dot;
        }

        // Nearly parallel, fall back to normalized lerp
        if dot > 0.9995 {
            let result = [
                Self::lerp(a[0], b[0], t),
                Self::lerp(a[1], b[1], t),
                Self::lerp(a[2], b[2], t),
                Self::lerp(a[3], b[3], t),
            ];
            let len = (result[0] * result[0] + result[1] * result[1]
                     + result[2] * result[2] + result[3] * result[3]).sqrt();
            if len <= f64::EPSILON {
                return a;
            }
            return [result[0] / len, result[1] / len, result[2] / len, result[3] / len];
        }

        let theta_0 = dot.acos();
        let theta = theta_0 * t;
        let sin_theta = theta.sin();
        let sin_theta_0 = theta_0.sin();

        let s0 = (theta_0 - theta).cos() - dot * sin_theta / sin_theta_0;
        let s1 = sin_theta / sin_theta_0;

        [
            a[0] * s0 + b[0] * s1,
            a[1] * s0 + b[1] * s1,
            a[2] * s0 + b[2] * s1,
            a[3] * s0 + b[3] * s1,
        ]
    }
}

/// A keyed float curve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloatChannel {
    keys: Vec<Keyframe>,
}

impl FloatChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel from `(time, value)` pairs
    pub fn from_keys(keys: impl IntoIterator<Item = (FrameNumber, f64)>) -> Self {
        let mut channel = Self::new();
        for (time, value) in keys {
            channel.set_key(time, value);
        }
        channel
    }

    /// Get all keyframes, sorted by time
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Whether the channel has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get keyframe count
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Add a keyframe
    pub fn add_key(&mut self, keyframe: Keyframe) {
        self.keys.push(keyframe);
        self.sort_keys();
    }

    /// Insert or update the keyframe at exactly `time`
    pub fn set_key(&mut self, time: FrameNumber, value: f64) {
        if let Some(key) = self.keys.iter_mut().find(|k| k.time == time) {
            key.value = value;
        } else {
            self.add_key(Keyframe::new(time, value));
        }
    }

    /// Index of the keyframe at exactly `time`
    pub fn key_index_at(&self, time: FrameNumber) -> Option<usize> {
        self.keys.iter().position(|k| k.time == time)
    }

    /// Remove the keyframe at exactly `time`
    pub fn remove_key_at(&mut self, time: FrameNumber) -> Option<Keyframe> {
        let index = self.key_index_at(time)?;
        Some(self.keys.remove(index))
    }

    /// Move the keyframe at `from` to `to`, replacing any key already there
    pub fn move_key(&mut self, from: FrameNumber, to: FrameNumber) -> bool {
        if self.key_index_at(from).is_none() {
            return false;
        }
        if from != to {
            self.keys.retain(|k| k.time != to);
        }
        if let Some(key) = self.keys.iter_mut().find(|k| k.time == from) {
            key.time = to;
        }
        self.sort_keys();
        true
    }

    /// Sort keyframes by time
    fn sort_keys(&mut self) {
        self.keys.sort_by_key(|k| k.time);
    }

    /// Evaluate the channel, or `None` if it has no keys
    pub fn evaluate(&self, time: FrameNumber) -> Option<f64> {
        self.evaluate_at(f64::from(time.0))
    }

    /// Evaluate the channel at a fractional tick
    pub fn evaluate_at(&self, time: f64) -> Option<f64> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;

        if time <= f64::from(first.time.0) {
            return Some(first.value);
        }
        if time >= f64::from(last.time.0) {
            return Some(last.value);
        }

        let next = self.keys.partition_point(|k| f64::from(k.time.0) <= time);
        let a = &self.keys[next - 1];
        let b = &self.keys[next];
        let span = f64::from(b.time.0 - a.time.0);
        if span <= 0.0 {
            return Some(b.value);
        }
        let t = (time - f64::from(a.time.0)) / span;

        let value = match a.interpolation {
            InterpolationMode::Constant => a.value,
            InterpolationMode::Linear => Interpolation::lerp(a.value, b.value, t),
            InterpolationMode::Auto => {
                let m0 = self.slope(next - 1) * span;
                let m1 = self.slope(next) * span;
                Interpolation::hermite(a.value, m0, b.value, m1, t)
            }
        };
        Some(value)
    }

    /// Catmull-Rom style slope at a key, in value per tick
    fn slope(&self, index: usize) -> f64 {
        let prev = index.checked_sub(1).map(|i| &self.keys[i]);
        let next = self.keys.get(index + 1);
        match (prev, next) {
            (Some(p), Some(n)) if n.time != p.time => {
                (n.value - p.value) / f64::from(n.time.0 - p.time.0)
            }
            _ => 0.0,
        }
    }
}
