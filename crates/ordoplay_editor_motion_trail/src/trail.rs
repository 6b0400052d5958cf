// SPDX-License-Identifier: MIT OR Apache-2.0
//! A single motion trail and its cache lifecycle.

use crate::buffer::{SharedTransforms, TransformArray};
use crate::dependency::SequencerTransformDependencies;
use crate::frame_index::FrameTimeByIndex;
use crate::object::{TrailId, TrailObject};
use ordoplay_editor_sequencer::{FrameNumber, Transform};

/// Validity of a trail's cached samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Every sample in the evaluation range is current
    UpToDate,
    /// Dependencies changed; a rescan is pending
    Stale,
    /// The followed object no longer exists
    Dead,
    /// A scan is in progress or was interrupted
    NotUpdated,
}

/// Something that happened to a trail's cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// The dependency snapshot differs from the stored one
    DependenciesChanged,
    /// Re-evaluation was requested regardless of dependencies
    Invalidated,
    /// The followed object stopped resolving
    ObjectGone,
    /// The engine ran a batch that included this trail
    BatchEvaluated {
        /// The scan finished with this batch
        done: bool,
    },
}

impl CacheState {
    /// State after `event`
    pub fn on(self, event: CacheEvent) -> CacheState {
        match (self, event) {
            (CacheState::Dead, _) | (_, CacheEvent::ObjectGone) => CacheState::Dead,
            (_, CacheEvent::DependenciesChanged | CacheEvent::Invalidated) => CacheState::Stale,
            (CacheState::UpToDate, CacheEvent::BatchEvaluated { .. }) => CacheState::UpToDate,
            (_, CacheEvent::BatchEvaluated { done: true }) => CacheState::UpToDate,
            (_, CacheEvent::BatchEvaluated { done: false }) => CacheState::NotUpdated,
        }
    }
}

/// Frame the trail is drawn relative to
#[derive(Debug, Clone)]
struct TrailSpace {
    object: TrailObject,
    transforms: TransformArray,
    evaluated: Vec<bool>,
}

/// Cached motion of one object over the evaluation range
#[derive(Debug, Clone)]
pub struct Trail {
    id: TrailId,
    object: TrailObject,
    /// Display name
    pub name: String,
    /// Colour
    pub color: [u8; 3],
    state: CacheState,
    dependencies: SequencerTransformDependencies,
    transforms: TransformArray,
    evaluated: Vec<bool>,
    parent: Option<SharedTransforms>,
    space: Option<TrailSpace>,
    offset: Option<Transform>,
    important_frames: Vec<FrameNumber>,
}

impl Trail {
    /// Create a trail; it starts stale
    pub fn new(object: TrailObject, name: impl Into<String>, color: [u8; 3]) -> Self {
        Self::with_id(TrailId::new(), object, name, color)
    }

    /// Create a trail with a known identity
    pub fn with_id(id: TrailId, object: TrailObject, name: impl Into<String>, color: [u8; 3]) -> Self {
        Self {
            id,
            object,
            name: name.into(),
            color,
            state: CacheState::Stale,
            dependencies: SequencerTransformDependencies::default(),
            transforms: TransformArray::new(),
            evaluated: Vec::new(),
            parent: None,
            space: None,
            offset: None,
            important_frames: Vec::new(),
        }
    }

    /// Trail ID
    pub fn id(&self) -> TrailId {
        self.id
    }

    /// Followed object
    pub fn object(&self) -> &TrailObject {
        &self.object
    }

    /// Cache state
    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Apply a cache event and return the new state
    pub fn apply(&mut self, event: CacheEvent) -> CacheState {
        let next = self.state.on(event);
        if next != self.state {
            tracing::debug!(trail = %self.id, from = ?self.state, to = ?next, "Trail cache state changed");
            self.state = next;
        }
        next
    }

    /// Report the end of an engine batch
    pub fn update_finished(&mut self, done: bool) {
        self.apply(CacheEvent::BatchEvaluated { done });
    }

    /// Dependency snapshot taken at the last refresh
    pub fn dependencies(&self) -> &SequencerTransformDependencies {
        &self.dependencies
    }

    /// Replace the snapshot; returns whether it differed
    pub fn set_dependencies(&mut self, dependencies: SequencerTransformDependencies) -> bool {
        let changed = self.dependencies.compare(&dependencies);
        self.dependencies = dependencies;
        changed
    }

    /// Raw samples: world transforms, or component-space ones for controls
    pub fn transforms(&self) -> &TransformArray {
        &self.transforms
    }

    /// Shared rig parent buffer, for controls
    pub fn parent(&self) -> Option<&SharedTransforms> {
        self.parent.as_ref()
    }

    /// Attach the shared rig parent buffer
    pub fn set_parent(&mut self, parent: Option<SharedTransforms>) {
        self.parent = parent;
    }

    /// Constant post-transform applied before display
    pub fn offset(&self) -> Option<&Transform> {
        self.offset.as_ref()
    }

    /// Set or clear the offset
    pub fn set_offset(&mut self, offset: Option<Transform>) {
        self.offset = offset;
    }

    /// Object the trail is drawn relative to
    pub fn space(&self) -> Option<&TrailObject> {
        self.space.as_ref().map(|s| &s.object)
    }

    /// Set or clear the space object
    pub fn set_space(&mut self, space: Option<TrailObject>) {
        let len = self.transforms.len();
        self.space = space.map(|object| TrailSpace {
            object,
            transforms: TransformArray::with_len(len),
            evaluated: vec![false; len],
        });
    }

    /// Times the user cares about, evaluated first
    pub fn important_frames(&self) -> &[FrameNumber] {
        &self.important_frames
    }

    /// Replace the important frames
    pub fn set_important_frames(&mut self, frames: Vec<FrameNumber>) {
        self.important_frames = frames;
    }

    /// Match a new index layout; all samples become invalid
    pub fn resize(&mut self, count: usize) {
        self.transforms.resize(count);
        self.evaluated.clear();
        self.evaluated.resize(count, false);
        if let Some(space) = &mut self.space {
            space.transforms.resize(count);
            space.evaluated.clear();
            space.evaluated.resize(count, false);
        }
    }

    /// Store the sample at `index`
    pub fn write_sample(&mut self, index: usize, transform: Transform) {
        self.transforms.set(index, transform);
        if let Some(flag) = self.evaluated.get_mut(index) {
            *flag = true;
        }
    }

    /// Store the space object's sample at `index`
    pub fn write_space_sample(&mut self, index: usize, transform: Transform) {
        if let Some(space) = &mut self.space {
            space.transforms.set(index, transform);
            if let Some(flag) = space.evaluated.get_mut(index) {
                *flag = true;
            }
        }
    }

    /// Whether `index` holds a displayable sample
    pub fn is_valid(&self, index: usize) -> bool {
        self.evaluated.get(index).copied().unwrap_or(false)
            && self
                .space
                .as_ref()
                .map_or(true, |s| s.evaluated.get(index).copied().unwrap_or(false))
    }

    /// Number of displayable samples
    pub fn valid_count(&self) -> usize {
        (0..self.evaluated.len()).filter(|&i| self.is_valid(i)).count()
    }

    /// Indices holding displayable samples, ascending
    pub fn valid_indices(&self) -> Vec<usize> {
        (0..self.evaluated.len()).filter(|&i| self.is_valid(i)).collect()
    }

    /// Sample times in seconds, parallel to [`Trail::valid_indices`]
    pub fn valid_times(&self, frames: &FrameTimeByIndex) -> Vec<f64> {
        self.valid_indices().into_iter().map(|i| frames.seconds(i)).collect()
    }

    /// World transform at `index`, before offset and space
    pub fn world_at(&self, index: usize) -> Option<Transform> {
        if !self.evaluated.get(index).copied().unwrap_or(false) {
            return None;
        }
        let sample = *self.transforms.get(index)?;
        match &self.parent {
            Some(parent) => {
                let parent = parent.borrow().get(index).copied().unwrap_or(Transform::IDENTITY);
                Some(sample.then(&parent))
            }
            None => Some(sample),
        }
    }

    /// Transform shown at `index`.
    ///
    /// With a space object the sample is expressed relative to the space at
    /// that index, then placed where the space is at `current_index`.
    pub fn display_at(&self, index: usize, current_index: usize) -> Option<Transform> {
        let mut world = self.world_at(index)?;
        if let Some(offset) = &self.offset {
            world = offset.then(&world);
        }
        match &self.space {
            Some(space) => {
                let at_sample = space.transforms.get(index).filter(|_| space.evaluated.get(index) == Some(&true))?;
                let at_current = space
                    .transforms
                    .get(current_index)
                    .filter(|_| space.evaluated.get(current_index) == Some(&true))?;
                Some(world.relative_to(at_sample).then(at_current))
            }
            None => Some(world),
        }
    }

    /// Displayed transform at `seconds`, interpolated between valid samples
    pub fn interpolate(&self, seconds: f64, frames: &FrameTimeByIndex, current_index: usize) -> Option<Transform> {
        self.interpolate_all(&[seconds], frames, current_index).pop()
    }

    /// Displayed transforms at each of `seconds`, sharing one pass over the samples.
    ///
    /// Empty when the trail has no displayable samples.
    pub fn interpolate_all(&self, seconds: &[f64], frames: &FrameTimeByIndex, current_index: usize) -> Vec<Transform> {
        let mut display = TransformArray::with_len(self.transforms.len());
        let mut indices = Vec::new();
        for index in self.valid_indices() {
            if let Some(transform) = self.display_at(index, current_index) {
                display.set(index, transform);
                indices.push(index);
            }
        }
        if indices.is_empty() {
            return Vec::new();
        }
        let times: Vec<f64> = indices.iter().map(|&i| frames.seconds(i)).collect();
        seconds
            .iter()
            .map(|&t| display.interpolate(t, &indices, &times))
            .collect()
    }
}
