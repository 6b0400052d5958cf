// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dense, partially filled transform storage.

use ordoplay_editor_sequencer::Transform;
use std::cell::RefCell;
use std::rc::Rc;

/// A transform array shared between a control rig's control trails
pub type SharedTransforms = Rc<RefCell<TransformArray>>;

/// Transforms addressed by frame index.
///
/// Only indices that the evaluation engine has written hold meaningful
/// data; callers track which ones those are.
#[derive(Debug, Clone, Default)]
pub struct TransformArray {
    transforms: Vec<Transform>,
}

impl TransformArray {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an array of `len` identity transforms
    pub fn with_len(len: usize) -> Self {
        Self {
            transforms: vec![Transform::IDENTITY; len],
        }
    }

    /// Wrap for sharing
    pub fn shared(len: usize) -> SharedTransforms {
        Rc::new(RefCell::new(Self::with_len(len)))
    }

    /// Logical length
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Set the logical length, keeping existing entries
    pub fn resize(&mut self, len: usize) {
        self.transforms.resize(len, Transform::IDENTITY);
    }

    /// Get the transform at `index`
    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    /// Write the transform at `index`; out of range writes are dropped
    pub fn set(&mut self, index: usize, transform: Transform) {
        if let Some(slot) = self.transforms.get_mut(index) {
            *slot = transform;
        }
    }

    /// All entries
    pub fn as_slice(&self) -> &[Transform] {
        &self.transforms
    }

    /// Interpolate at `time` across the valid samples.
    ///
    /// `valid_indices[i]` holds the sample taken at `valid_times[i]`; times
    /// must be ascending. Outside the valid times the nearest end sample is
    /// returned. With no valid samples the identity is returned, which
    /// callers treat as "not available yet".
    pub fn interpolate(&self, time: f64, valid_indices: &[usize], valid_times: &[f64]) -> Transform {
        let len = valid_indices.len().min(valid_times.len());
        if len == 0 {
            return Transform::IDENTITY;
        }
        let sample = |i: usize| self.get(valid_indices[i]).copied().unwrap_or(Transform::IDENTITY);

        if time <= valid_times[0] {
            return sample(0);
        }
        if time >= valid_times[len - 1] {
            return sample(len - 1);
        }

        // First valid time strictly after `time`; it has a predecessor here
        let upper = valid_times[..len].partition_point(|t| *t <= time);
        let lower = upper - 1;
        let span = valid_times[upper] - valid_times[lower];
        if span <= 0.0 {
            return sample(upper);
        }
        let t = (time - valid_times[lower]) / span;
        Transform::blend(&sample(lower), &sample(upper), t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64) -> Transform {
        Transform::from_translation([x, 0.0, 0.0])
    }

    fn filled() -> TransformArray {
        let mut array = TransformArray::with_len(5);
        array.set(0, at(0.0));
        array.set(2, at(20.0));
        array.set(4, at(40.0));
        array
    }

    #[test]
    fn test_interpolate_between_samples() {
        let array = filled();
        let t = array.interpolate(0.5, &[0, 2, 4], &[0.0, 1.0, 2.0]);
        assert!((t.translation[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_clamps_at_ends() {
        let array = filled();
        assert_eq!(array.interpolate(-3.0, &[0, 2, 4], &[0.0, 1.0, 2.0]), at(0.0));
        assert_eq!(array.interpolate(9.0, &[0, 2, 4], &[0.0, 1.0, 2.0]), at(40.0));
    }

    #[test]
    fn test_interpolate_exact_sample() {
        let array = filled();
        let t = array.interpolate(1.0, &[0, 2, 4], &[0.0, 1.0, 2.0]);
        assert!(t.equals(&at(20.0), 1e-9));
    }

    #[test]
    fn test_interpolate_without_samples_is_identity() {
        let array = filled();
        assert_eq!(array.interpolate(1.0, &[], &[]), Transform::IDENTITY);
    }

    #[test]
    fn test_resize_keeps_contents() {
        let mut array = filled();
        array.resize(3);
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(2), Some(&at(20.0)));
        array.resize(6);
        assert_eq!(array.get(2), Some(&at(20.0)));
        assert_eq!(array.get(5), Some(&Transform::IDENTITY));
    }

    #[test]
    fn test_out_of_range_write_is_dropped() {
        let mut array = TransformArray::with_len(2);
        array.set(5, at(1.0));
        assert_eq!(array.len(), 2);
    }
}
