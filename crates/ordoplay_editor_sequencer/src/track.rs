// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions for the sequencer.

use crate::binding::{BindingId, EntityId};
use crate::keyframe::FloatChannel;
use crate::signature::Signature;
use crate::time::{FrameNumber, FrameRange};
use crate::transform::Transform;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a control rig instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlRigId(pub Uuid);

impl ControlRigId {
    /// Create a new random control rig ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ControlRigId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// 3D transform (location, rotation, scale)
    Transform3D,
    /// Control rig controls
    ControlRig,
    /// Attach to another object for a section of time
    Attach,
    /// Follow a spline path
    Path,
    /// Skeletal animation driving sockets
    SkeletalAnimation,
    /// Event triggers
    Event,
}

impl TrackKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transform3D => "Transform",
            Self::ControlRig => "Control Rig",
            Self::Attach => "Attach",
            Self::Path => "Path",
            Self::SkeletalAnimation => "Animation",
            Self::Event => "Event",
        }
    }

    /// Get the track color
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Transform3D => [100, 150, 255],
            Self::ControlRig => [150, 255, 100],
            Self::Attach => [255, 150, 50],
            Self::Path => [50, 200, 200],
            Self::SkeletalAnimation => [200, 100, 255],
            Self::Event => [255, 200, 100],
        }
    }

    /// Whether tracks of this kind can move the bound object
    pub fn affects_transform(&self) -> bool {
        !matches!(self, Self::Event)
    }
}

/// Location, rotation (degrees) and scale channels of a transform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformSection {
    channels: [FloatChannel; 9],
    /// Section range in ticks; `None` means infinite
    pub range: Option<FrameRange>,
}

impl TransformSection {
    /// Location X channel index
    pub const LOCATION_X: usize = 0;
    /// Rotation X (roll) channel index
    pub const ROTATION_X: usize = 3;
    /// Scale X channel index
    pub const SCALE_X: usize = 6;
    /// Number of channels
    pub const CHANNEL_COUNT: usize = 9;

    /// Create an empty, infinite section
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a channel
    pub fn channel(&self, index: usize) -> Option<&FloatChannel> {
        self.channels.get(index)
    }

    /// Get a mutable channel
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut FloatChannel> {
        self.channels.get_mut(index)
    }

    /// All channels in order
    pub fn channels(&self) -> &[FloatChannel] {
        &self.channels
    }

    /// All channels in order, mutably
    pub fn channels_mut(&mut self) -> &mut [FloatChannel] {
        &mut self.channels
    }

    /// The three location channels
    pub fn location_channels(&self) -> &[FloatChannel] {
        &self.channels[Self::LOCATION_X..Self::ROTATION_X]
    }

    /// Key every channel with the components of `transform`
    pub fn set_transform_key(&mut self, time: FrameNumber, transform: &Transform) {
        let rotation = transform.euler_degrees();
        let values = [
            transform.translation[0],
            transform.translation[1],
            transform.translation[2],
            rotation[0],
            rotation[1],
            rotation[2],
            transform.scale[0],
            transform.scale[1],
            transform.scale[2],
        ];
        for (channel, value) in self.channels.iter_mut().zip(values) {
            channel.set_key(time, value);
        }
        self.expand_to_frame(time);
    }

    /// Key only the location channels
    pub fn set_location_key(&mut self, time: FrameNumber, location: [f64; 3]) {
        for (channel, value) in self.channels[Self::LOCATION_X..Self::ROTATION_X].iter_mut().zip(location) {
            channel.set_key(time, value);
        }
        self.expand_to_frame(time);
    }

    /// Grow a finite range so that it contains `frame`
    pub fn expand_to_frame(&mut self, frame: FrameNumber) {
        if let Some(range) = &mut self.range {
            range.include(frame);
        }
    }

    /// Whether the section is active at `frame`
    pub fn is_active(&self, frame: FrameNumber) -> bool {
        self.range.map_or(true, |r| r.contains(frame))
    }

    /// Evaluate at a fractional tick, falling back to `default` for unkeyed channels
    pub fn evaluate(&self, time: f64, default: &Transform) -> Transform {
        let default_rotation = default.euler_degrees();
        let defaults = [
            default.translation[0],
            default.translation[1],
            default.translation[2],
            default_rotation[0],
            default_rotation[1],
            default_rotation[2],
            default.scale[0],
            default.scale[1],
            default.scale[2],
        ];
        let mut values = [0.0; 9];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.channels[i].evaluate_at(time).unwrap_or(defaults[i]);
        }
        Transform::from_components(
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        )
    }

    /// Whether any channel has keys
    pub fn has_keys(&self) -> bool {
        self.channels.iter().any(|c| !c.is_empty())
    }
}

/// What an attach or path section points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachTarget {
    /// Another object bound in this sequence
    Binding(BindingId),
    /// An entity placed in the world but not bound
    Entity(EntityId),
}

/// Named socket on a component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketRef {
    /// Component name
    pub component: String,
    /// Socket name
    pub socket: String,
}

/// Control rig keys, one transform section per control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRigSection {
    /// Rig instance driven by this section
    pub rig: ControlRigId,
    /// Per-control channels, in component space
    pub controls: IndexMap<String, TransformSection>,
}

/// Attach section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachSection {
    /// Parent object
    pub target: AttachTarget,
    /// Optional socket on the parent
    pub socket: Option<SocketRef>,
    /// Active range in ticks
    pub range: FrameRange,
}

/// Path-follow section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSection {
    /// Spline owner
    pub target: AttachTarget,
    /// Active range in ticks
    pub range: FrameRange,
    /// Progress along the spline (0..1); linear over the range when unkeyed
    pub progress: FloatChannel,
}

impl PathSection {
    /// Progress along the path at a fractional tick
    pub fn progress_at(&self, time: f64) -> f64 {
        if let Some(value) = self.progress.evaluate_at(time) {
            return value.clamp(0.0, 1.0);
        }
        let start = f64::from(self.range.start.0);
        let span = f64::from(self.range.end.0) - start;
        if span <= 0.0 {
            return 0.0;
        }
        ((time - start) / span).clamp(0.0, 1.0)
    }
}

/// Skeletal animation section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletalAnimationSection {
    /// Animation asset name
    pub animation: String,
    /// Active range in ticks
    pub range: FrameRange,
    /// Offset into the animation in ticks
    pub start_offset: FrameNumber,
    /// Playback speed multiplier
    pub play_rate: f64,
    /// Animated socket transforms, relative to their component
    pub sockets: IndexMap<String, TransformSection>,
}

impl SkeletalAnimationSection {
    /// Map a sequence tick to a tick in animation time
    pub fn animation_time(&self, time: f64) -> f64 {
        let local = time.clamp(f64::from(self.range.start.0), f64::from(self.range.end.0))
            - f64::from(self.range.start.0);
        f64::from(self.start_offset.0) + local * self.play_rate
    }
}

/// An event marker on the timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMarker {
    /// Time of the event in ticks
    pub time: FrameNumber,
    /// Event name/type
    pub event_name: String,
}

/// Typed track content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrackData {
    /// 3D transform
    Transform(TransformSection),
    /// Control rig
    ControlRig(ControlRigSection),
    /// Attach
    Attach(AttachSection),
    /// Path
    Path(PathSection),
    /// Skeletal animation
    SkeletalAnimation(SkeletalAnimationSection),
    /// Events
    Event(Vec<EventMarker>),
}

impl TrackData {
    /// Kind of this content
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Transform(_) => TrackKind::Transform3D,
            Self::ControlRig(_) => TrackKind::ControlRig,
            Self::Attach(_) => TrackKind::Attach,
            Self::Path(_) => TrackKind::Path,
            Self::SkeletalAnimation(_) => TrackKind::SkeletalAnimation,
            Self::Event(_) => TrackKind::Event,
        }
    }
}

/// A track in the sequencer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Owning binding
    pub binding: BindingId,
    /// Track content
    data: TrackData,
    /// Whether the track is muted
    muted: bool,
    /// Content signature
    signature: Signature,
}

impl Track {
    /// Create a new track on a binding
    pub fn new(name: impl Into<String>, binding: BindingId, data: TrackData) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            binding,
            data,
            muted: false,
            signature: Signature::new(),
        }
    }

    /// Convenience constructor for a transform track
    pub fn transform(binding: BindingId, section: TransformSection) -> Self {
        Self::new("Transform", binding, TrackData::Transform(section))
    }

    /// Kind of this track
    pub fn kind(&self) -> TrackKind {
        self.data.kind()
    }

    /// Current signature
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Mark the track as edited
    pub fn mark_changed(&mut self) {
        self.signature.regenerate();
    }

    /// Track content
    pub fn data(&self) -> &TrackData {
        &self.data
    }

    /// Mutable track content; regenerates the signature
    pub fn data_mut(&mut self) -> &mut TrackData {
        self.mark_changed();
        &mut self.data
    }

    /// Whether the track is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Mute or unmute the track
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted != muted {
            self.muted = muted;
            self.mark_changed();
        }
    }

    /// Transform section, if this is a transform track
    pub fn transform_section(&self) -> Option<&TransformSection> {
        match &self.data {
            TrackData::Transform(section) => Some(section),
            _ => None,
        }
    }

    /// Mutable transform section; regenerates the signature
    pub fn transform_section_mut(&mut self) -> Option<&mut TransformSection> {
        match self.data_mut() {
            TrackData::Transform(section) => Some(section),
            _ => None,
        }
    }

    /// Entity-or-binding this track makes its owner depend on
    pub fn attach_target(&self) -> Option<AttachTarget> {
        match &self.data {
            TrackData::Attach(section) => Some(section.target),
            TrackData::Path(section) => Some(section.target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_regenerates_signature() {
        let mut track = Track::transform(BindingId::new(), TransformSection::new());
        let before = track.signature();
        assert_eq!(before, track.signature());

        if let Some(section) = track.transform_section_mut() {
            section.set_location_key(FrameNumber(0), [1.0, 2.0, 3.0]);
        }
        assert_ne!(before, track.signature());
    }

    #[test]
    fn test_section_evaluate_defaults() {
        let mut section = TransformSection::new();
        section.set_location_key(FrameNumber(0), [0.0, 0.0, 0.0]);
        section.set_location_key(FrameNumber(10), [10.0, 0.0, 0.0]);

        let default = Transform::from_components([0.0, 0.0, 7.0], [0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let t = section.evaluate(5.0, &default);
        assert!((t.translation[0] - 5.0).abs() < 1e-9);
        // Location Z is keyed to zero, scale falls back to the default
        assert!(t.translation[2].abs() < 1e-9);
        assert!((t.scale[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_path_progress_linear_without_keys() {
        let section = PathSection {
            target: AttachTarget::Entity(EntityId::new()),
            range: FrameRange::new(FrameNumber(0), FrameNumber(100)),
            progress: FloatChannel::new(),
        };
        assert_eq!(section.progress_at(50.0), 0.5);
        assert_eq!(section.progress_at(200.0), 1.0);
    }

    #[test]
    fn test_event_kind_does_not_affect_transform() {
        assert!(!TrackKind::Event.affects_transform());
        assert!(TrackKind::Attach.affects_transform());
    }
}
