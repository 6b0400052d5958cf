// SPDX-License-Identifier: MIT OR Apache-2.0
//! The contract between motion trails and the timeline runtime.
//!
//! Trails never evaluate animation themselves. They ask a [`TimelineHost`]
//! which tracks affect an object, and later ask it to evaluate the timeline
//! at a sparse set of frames for all trailed objects at once.

mod scene;
mod sequence_host;

pub use scene::{ControlRigInstance, Scene, SceneComponent, SceneEntity};
pub use sequence_host::SequenceHost;

use crate::frame_index::FrameTimeByIndex;
use crate::object::TrailObject;
use indexmap::IndexSet;
use ordoplay_editor_sequencer::{
    BindingId, ControlRigId, EntityId, FrameNumber, FrameRate, Signature, TrackId, TrackKind,
    Transform, TransformSection,
};
use std::collections::HashMap;

/// A track that can move the object it is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDependency {
    /// Track
    pub track: TrackId,
    /// Track kind
    pub kind: TrackKind,
    /// Content signature at query time
    pub signature: Signature,
    /// Entity an attach or path track points at, resolved through bindings
    pub target: Option<EntityId>,
}

/// One host evaluation call
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    /// Frame layout the indices refer to
    pub frames: &'a FrameTimeByIndex,
    /// Indices to evaluate, in evaluation order
    pub indices: &'a [usize],
    /// Objects to report transforms for
    pub objects: &'a [TrailObject],
    /// Tracks the objects depend on; others may be skipped
    pub dependent_tracks: &'a IndexSet<TrackId>,
}

/// Result of one host evaluation call.
///
/// Every vector runs parallel to [`EvaluationRequest::indices`]. Objects
/// the host could not resolve are left out.
#[derive(Debug, Clone, Default)]
pub struct EvaluatedTransforms {
    /// World transforms; component-space transforms for controls
    pub objects: HashMap<TrailObject, Vec<Transform>>,
    /// World transform of each rig's owning component
    pub rig_parents: HashMap<ControlRigId, Vec<Transform>>,
}

/// Timeline runtime queried by the dependency walk and the evaluation engine
pub trait TimelineHost {
    /// Whether a world is available to evaluate in
    fn has_world(&self) -> bool;

    /// Whether the object still resolves
    fn object_exists(&self, object: &TrailObject) -> bool;

    /// Entity whose bindings drive the object; the rig owner for controls
    fn owning_entity(&self, object: &TrailObject) -> Option<EntityId>;

    /// Binding of an entity, if it is bound in the sequence
    fn binding_for_entity(&self, entity: EntityId) -> Option<BindingId>;

    /// Binding-level signature
    fn binding_signature(&self, binding: BindingId) -> Option<Signature>;

    /// Tracks on a binding that can move its object
    fn transform_affecting_tracks(&self, binding: BindingId) -> Vec<TrackDependency>;

    /// World-placement parent that the timeline does not drive
    fn scene_parent(&self, entity: EntityId) -> Option<EntityId>;

    /// Frames the user cares about for this object, usually key times
    fn important_frames(&self, _object: &TrailObject) -> Vec<FrameNumber> {
        Vec::new()
    }

    /// Evaluate the timeline at exactly the requested indices
    fn calculate_world_transforms(&mut self, request: &EvaluationRequest<'_>) -> EvaluatedTransforms;
}

/// Timeline runtime access needed to edit keys shown on a trail
pub trait KeyEditingHost {
    /// Rate the editor steps by
    fn display_rate(&self) -> FrameRate;

    /// Rate key times are stored in
    fn tick_resolution(&self) -> FrameRate;

    /// Transform channels that position the object
    fn transform_section(&self, object: &TrailObject) -> Option<&TransformSection>;

    /// Mutable transform channels; editing them changes the track signature
    fn transform_section_mut(&mut self, object: &TrailObject) -> Option<&mut TransformSection>;
}
