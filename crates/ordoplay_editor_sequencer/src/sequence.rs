// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequence containing bindings and their tracks.

use crate::binding::{BindingId, EntityId, ObjectBinding};
use crate::time::{FrameNumber, FrameRange, FrameRate};
use crate::track::{Track, TrackId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub Uuid);

impl SequenceId {
    /// Create a new random sequence ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

/// A sequence of bound tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    /// Unique sequence ID
    pub id: SequenceId,
    /// Sequence name
    pub name: String,
    /// Bound objects
    bindings: IndexMap<BindingId, ObjectBinding>,
    /// Tracks in this sequence
    tracks: IndexMap<TrackId, Track>,
    /// Resolution that key times are stored in
    pub tick_resolution: FrameRate,
    /// Rate the editor displays and steps by
    pub display_rate: FrameRate,
    /// Playback range in ticks
    pub playback_range: FrameRange,
}

impl Sequence {
    /// Create a new sequence
    pub fn new(name: impl Into<String>) -> Self {
        let tick_resolution = FrameRate::fps(24000);
        Self {
            id: SequenceId::new(),
            name: name.into(),
            bindings: IndexMap::new(),
            tracks: IndexMap::new(),
            tick_resolution,
            display_rate: FrameRate::fps(30),
            playback_range: FrameRange::new(FrameNumber(0), tick_resolution.as_frame_number(10.0)),
        }
    }

    /// Add a binding
    pub fn add_binding(&mut self, binding: ObjectBinding) -> BindingId {
        let id = binding.id;
        self.bindings.insert(id, binding);
        id
    }

    /// Bind an entity, returning the new binding ID
    pub fn bind(&mut self, name: impl Into<String>, entity: EntityId) -> BindingId {
        self.add_binding(ObjectBinding::new(name, entity))
    }

    /// Remove a binding and all of its tracks
    pub fn remove_binding(&mut self, binding_id: BindingId) -> Option<ObjectBinding> {
        self.tracks.retain(|_, t| t.binding != binding_id);
        self.bindings.shift_remove(&binding_id)
    }

    /// Get a binding
    pub fn binding(&self, binding_id: BindingId) -> Option<&ObjectBinding> {
        self.bindings.get(&binding_id)
    }

    /// Get a mutable binding
    pub fn binding_mut(&mut self, binding_id: BindingId) -> Option<&mut ObjectBinding> {
        self.bindings.get_mut(&binding_id)
    }

    /// Get all bindings
    pub fn bindings(&self) -> impl Iterator<Item = &ObjectBinding> {
        self.bindings.values()
    }

    /// Find the binding for an entity
    pub fn binding_for_entity(&self, entity: EntityId) -> Option<&ObjectBinding> {
        self.bindings.values().find(|b| b.entity() == entity)
    }

    /// Add a track
    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.insert(id, track);
        id
    }

    /// Remove a track
    pub fn remove_track(&mut self, track_id: TrackId) -> Option<Track> {
        self.tracks.shift_remove(&track_id)
    }

    /// Get a track
    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// Get a mutable track
    pub fn track_mut(&mut self, track_id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&track_id)
    }

    /// Get all tracks
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Get track count
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Tracks owned by a binding
    pub fn tracks_for_binding(&self, binding_id: BindingId) -> impl Iterator<Item = &Track> {
        self.tracks.values().filter(move |t| t.binding == binding_id)
    }

    /// Unmuted tracks on a binding that can move the bound object
    pub fn transform_affecting_tracks(&self, binding_id: BindingId) -> impl Iterator<Item = &Track> {
        self.tracks_for_binding(binding_id)
            .filter(|t| !t.is_muted() && t.kind().affects_transform())
    }

    /// Convert a display-rate frame to ticks
    pub fn display_to_ticks(&self, frame: FrameNumber) -> FrameNumber {
        FrameRate::transform_time(frame, self.display_rate, self.tick_resolution)
    }

    /// Convert ticks to the nearest display-rate frame
    pub fn ticks_to_display(&self, ticks: FrameNumber) -> FrameNumber {
        FrameRate::transform_time(ticks, self.tick_resolution, self.display_rate)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new("Untitled Sequence")
    }
}
