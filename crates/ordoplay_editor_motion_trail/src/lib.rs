// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion trails for OrdoPlay Editor.
//!
//! This crate computes and caches the world-space paths that animated
//! objects follow over a sequence:
//! - Dependency snapshots that detect edits by comparing signatures
//! - A budgeted sampler that evaluates a few frames per tick
//! - Per-trail caches with an explicit lifecycle
//! - Key selection and editing on top of the cached path
//!
//! ## Architecture
//!
//! A [`TrailHierarchy`] owns every [`Trail`]. On each editor tick it
//! re-snapshots each trail's [`SequencerTransformDependencies`], marks
//! changed trails stale, and lets the [`TrailEvaluationEngine`] run one
//! batch from the [`FrameSampleScheduler`] through a single
//! [`TimelineHost::calculate_world_transforms`] call.
//!
//! Nothing in the tick path fails: missing worlds skip the tick and vanished
//! objects turn trails [`CacheState::Dead`]. Only user actions such as
//! pinning or key edits return [`TrailError`].

pub mod buffer;
pub mod dependency;
pub mod display;
pub mod engine;
pub mod error;
pub mod frame_index;
pub mod hierarchy;
pub mod host;
pub mod keys;
pub mod object;
pub mod options;
pub mod scheduler;
pub mod trail;

pub use buffer::{SharedTransforms, TransformArray};
pub use dependency::SequencerTransformDependencies;
pub use display::{DisplayContext, TrailDrawInterface, TrailHit, TrailPoint, TrailProjection};
pub use engine::{EngineTick, TickContext, TrailEvaluationEngine};
pub use error::{Result, TrailError};
pub use frame_index::FrameTimeByIndex;
pub use hierarchy::{TrailHierarchy, UpdateReport};
pub use host::{
    EvaluatedTransforms, EvaluationRequest, KeyEditingHost, Scene, SequenceHost, TimelineHost,
    TrackDependency,
};
pub use keys::{find_key_time, KeyEditingOverlay, SelectMode};
pub use object::{TrailId, TrailObject};
pub use options::{PinnedTrail, TrailOptions, TrailStyle};
pub use scheduler::{EvaluationBatch, FrameSampleScheduler, SchedulerState};
pub use trail::{CacheEvent, CacheState, Trail};
