// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline/sequencer model for OrdoPlay Editor.
//!
//! This crate provides the movie-scene data that editor tools evaluate:
//! - Object bindings tying scene entities to the sequence
//! - Transform, control rig, attach, path and skeletal animation tracks
//! - Keyed float channels with tick-resolution key times
//! - Content signatures regenerated on every edit
//!
//! ## Architecture
//!
//! A [`Sequence`] owns bindings and tracks in insertion order. Tracks expose
//! their content read-only; every mutable accessor regenerates the track's
//! [`Signature`], so consumers can detect edits by comparing signatures
//! instead of diffing content.

pub mod time;
pub mod signature;
pub mod transform;
pub mod keyframe;
pub mod track;
pub mod binding;
pub mod sequence;

pub use time::{FrameNumber, FrameRate, FrameRange};
pub use signature::Signature;
pub use transform::Transform;
pub use keyframe::{Keyframe, KeyframeId, InterpolationMode, Interpolation, FloatChannel};
pub use track::{
    Track, TrackId, TrackKind, TrackData,
    TransformSection, ControlRigSection, ControlRigId, AttachSection, AttachTarget, SocketRef,
    PathSection, SkeletalAnimationSection, EventMarker,
};
pub use binding::{BindingId, EntityId, ObjectBinding};
pub use sequence::{Sequence, SequenceId};
