// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference host that evaluates a [`Sequence`] against a [`Scene`].
//!
//! World placement of an entity at a tick:
//! 1. local transform from its first active transform track, else its placement
//! 2. parented by an active attach section, else
//! 3. positioned by an active path section, else
//! 4. parented by its manual scene parent.
//!
//! Sockets follow skeletal animation sections; controls come out in
//! component space with the rig's component world reported separately.

use super::{
    EvaluatedTransforms, EvaluationRequest, KeyEditingHost, Scene, TimelineHost, TrackDependency,
};
use crate::object::TrailObject;
use indexmap::IndexSet;
use ordoplay_editor_sequencer::{
    AttachTarget, BindingId, ControlRigId, EntityId, FrameNumber, FrameRate, Sequence, Signature,
    Track, TrackData, TrackId, Transform, TransformSection,
};

/// Attach chains deeper than this stop resolving parents
const MAX_ATTACH_DEPTH: usize = 16;

/// A sequence bound to the scene it animates
#[derive(Debug, Clone)]
pub struct SequenceHost {
    sequence: Sequence,
    scene: Scene,
    world_available: bool,
    evaluation_calls: usize,
    last_indices: Vec<usize>,
}

impl SequenceHost {
    /// Create a host with a world available
    pub fn new(sequence: Sequence, scene: Scene) -> Self {
        Self {
            sequence,
            scene,
            world_available: true,
            evaluation_calls: 0,
            last_indices: Vec::new(),
        }
    }

    /// The sequence
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// The sequence, for editing
    pub fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }

    /// The scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene, for editing
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Simulate the world being torn down or brought back
    pub fn set_world_available(&mut self, available: bool) {
        self.world_available = available;
    }

    /// Number of evaluation calls served
    pub fn evaluation_calls(&self) -> usize {
        self.evaluation_calls
    }

    /// Indices of the most recent evaluation call
    pub fn last_indices(&self) -> &[usize] {
        &self.last_indices
    }

    fn resolve_target(&self, target: AttachTarget) -> Option<EntityId> {
        match target {
            AttachTarget::Binding(binding) => self.sequence.binding(binding).map(|b| b.entity()),
            AttachTarget::Entity(entity) => Some(entity),
        }
    }

    /// Transform track of the object, and the control inside it for rigs
    fn key_track(&self, object: &TrailObject) -> Option<(TrackId, Option<String>)> {
        match object {
            TrailObject::Actor(entity) => {
                let binding = self.sequence.binding_for_entity(*entity)?;
                self.sequence
                    .tracks_for_binding(binding.id)
                    .find(|t| t.transform_section().is_some())
                    .map(|t| (t.id, None))
            }
            TrailObject::Control { rig, control } => {
                let owner = self.scene.rig(*rig)?.owner;
                let binding = self.sequence.binding_for_entity(owner)?;
                self.sequence
                    .tracks_for_binding(binding.id)
                    .find(|t| match t.data() {
                        TrackData::ControlRig(section) => {
                            section.rig == *rig && section.controls.contains_key(control)
                        }
                        _ => false,
                    })
                    .map(|t| (t.id, Some(control.clone())))
            }
            TrailObject::Component { .. } | TrailObject::Socket { .. } => None,
        }
    }
}

/// Evaluation of one tick, restricted to a set of tracks
struct TickEvaluator<'a> {
    host: &'a SequenceHost,
    tracks: &'a IndexSet<TrackId>,
    tick: FrameNumber,
}

impl TickEvaluator<'_> {
    fn time(&self) -> f64 {
        f64::from(self.tick.0)
    }

    fn tracks_of(&self, entity: EntityId) -> Vec<&Track> {
        let Some(binding) = self.host.sequence.binding_for_entity(entity) else {
            return Vec::new();
        };
        self.host
            .sequence
            .transform_affecting_tracks(binding.id)
            .filter(|t| self.tracks.contains(&t.id))
            .collect()
    }

    fn entity_world(&self, entity: EntityId, depth: usize) -> Option<Transform> {
        let scene_entity = self.host.scene.entity(entity)?;
        let tracks = self.tracks_of(entity);

        let local = tracks
            .iter()
            .filter_map(|t| t.transform_section())
            .find(|s| s.is_active(self.tick))
            .map_or(scene_entity.transform, |s| {
                s.evaluate(self.time(), &scene_entity.transform)
            });

        if depth >= MAX_ATTACH_DEPTH {
            tracing::warn!(depth, "Attach chain too deep, ignoring parents");
            return Some(local);
        }

        for track in &tracks {
            if let TrackData::Attach(section) = track.data() {
                if !section.range.contains(self.tick) {
                    continue;
                }
                let Some(target) = self.host.resolve_target(section.target) else {
                    continue;
                };
                let parent = match &section.socket {
                    Some(socket) => self.socket_world(target, &socket.component, &socket.socket, depth + 1),
                    None => self.entity_world(target, depth + 1),
                };
                if let Some(parent) = parent {
                    return Some(local.then(&parent));
                }
            }
        }

        for track in &tracks {
            if let TrackData::Path(section) = track.data() {
                if !section.range.contains(self.tick) {
                    continue;
                }
                let Some(target) = self.host.resolve_target(section.target) else {
                    continue;
                };
                let point = self
                    .host
                    .scene
                    .entity(target)
                    .and_then(|e| e.spline_point(section.progress_at(self.time())));
                if let (Some(point), Some(target_world)) = (point, self.entity_world(target, depth + 1)) {
                    return Some(Transform {
                        translation: target_world.transform_point(point),
                        ..local
                    });
                }
            }
        }

        if let Some(parent) = scene_entity.parent {
            if let Some(parent_world) = self.entity_world(parent, depth + 1) {
                return Some(local.then(&parent_world));
            }
        }
        Some(local)
    }

    fn component_world(&self, entity: EntityId, component: &str, depth: usize) -> Option<Transform> {
        let relative = self.host.scene.entity(entity)?.components.get(component)?.relative;
        Some(relative.then(&self.entity_world(entity, depth)?))
    }

    fn socket_world(&self, entity: EntityId, component: &str, socket: &str, depth: usize) -> Option<Transform> {
        let rest = *self
            .host
            .scene
            .entity(entity)?
            .components
            .get(component)?
            .sockets
            .get(socket)?;

        let animated = self.tracks_of(entity).into_iter().find_map(|t| match t.data() {
            TrackData::SkeletalAnimation(section) if section.range.contains(self.tick) => section
                .sockets
                .get(socket)
                .map(|s| s.evaluate(section.animation_time(self.time()), &rest)),
            _ => None,
        });

        let relative = animated.unwrap_or(rest);
        Some(relative.then(&self.component_world(entity, component, depth)?))
    }

    fn control_local(&self, rig: ControlRigId, control: &str) -> Option<Transform> {
        let instance = self.host.scene.rig(rig)?;
        let initial = *instance.controls.get(control)?;
        let animated = self.tracks_of(instance.owner).into_iter().find_map(|t| match t.data() {
            TrackData::ControlRig(section) if section.rig == rig => section
                .controls
                .get(control)
                .filter(|s| s.is_active(self.tick))
                .map(|s| s.evaluate(self.time(), &initial)),
            _ => None,
        });
        Some(animated.unwrap_or(initial))
    }

    fn rig_parent(&self, rig: ControlRigId) -> Option<Transform> {
        let instance = self.host.scene.rig(rig)?;
        self.component_world(instance.owner, &instance.component, 0)
    }

    fn object(&self, object: &TrailObject) -> Option<Transform> {
        match object {
            TrailObject::Actor(entity) => self.entity_world(*entity, 0),
            TrailObject::Component { entity, component } => self.component_world(*entity, component, 0),
            TrailObject::Socket { entity, component, socket } => {
                self.socket_world(*entity, component, socket, 0)
            }
            TrailObject::Control { rig, control } => self.control_local(*rig, control),
        }
    }
}

impl TimelineHost for SequenceHost {
    fn has_world(&self) -> bool {
        self.world_available
    }

    fn object_exists(&self, object: &TrailObject) -> bool {
        self.scene.object_exists(object)
    }

    fn owning_entity(&self, object: &TrailObject) -> Option<EntityId> {
        object
            .entity()
            .or_else(|| object.rig().and_then(|rig| self.scene.rig(rig)).map(|r| r.owner))
    }

    fn binding_for_entity(&self, entity: EntityId) -> Option<BindingId> {
        self.sequence.binding_for_entity(entity).map(|b| b.id)
    }

    fn binding_signature(&self, binding: BindingId) -> Option<Signature> {
        self.sequence.binding(binding).map(|b| b.signature())
    }

    fn transform_affecting_tracks(&self, binding: BindingId) -> Vec<TrackDependency> {
        self.sequence
            .transform_affecting_tracks(binding)
            .map(|track| TrackDependency {
                track: track.id,
                kind: track.kind(),
                signature: track.signature(),
                target: track.attach_target().and_then(|t| self.resolve_target(t)),
            })
            .collect()
    }

    fn scene_parent(&self, entity: EntityId) -> Option<EntityId> {
        self.scene.entity(entity)?.parent
    }

    fn important_frames(&self, object: &TrailObject) -> Vec<FrameNumber> {
        let Some(section) = self.transform_section(object) else {
            return Vec::new();
        };
        let mut frames: Vec<FrameNumber> = section
            .location_channels()
            .iter()
            .flat_map(|c| c.keys().iter().map(|k| k.time))
            .collect();
        frames.sort();
        frames.dedup();
        frames
    }

    fn calculate_world_transforms(&mut self, request: &EvaluationRequest<'_>) -> EvaluatedTransforms {
        self.evaluation_calls += 1;
        self.last_indices = request.indices.to_vec();

        let mut result = EvaluatedTransforms::default();
        let mut rigs: Vec<ControlRigId> = Vec::new();
        for object in request.objects {
            if let Some(rig) = object.rig() {
                if !rigs.contains(&rig) {
                    rigs.push(rig);
                }
            }
        }

        let host: &SequenceHost = self;
        let evaluators: Vec<TickEvaluator<'_>> = request
            .indices
            .iter()
            .map(|&index| TickEvaluator {
                host,
                tracks: request.dependent_tracks,
                tick: request.frames.frame(index),
            })
            .collect();

        for object in request.objects {
            let values: Option<Vec<Transform>> = evaluators.iter().map(|e| e.object(object)).collect();
            match values {
                Some(values) => {
                    result.objects.insert(object.clone(), values);
                }
                None => tracing::debug!(object = %object.label(), "Object did not resolve"),
            }
        }
        for rig in rigs {
            let values: Option<Vec<Transform>> = evaluators.iter().map(|e| e.rig_parent(rig)).collect();
            if let Some(values) = values {
                result.rig_parents.insert(rig, values);
            }
        }
        result
    }
}

impl KeyEditingHost for SequenceHost {
    fn display_rate(&self) -> FrameRate {
        self.sequence.display_rate
    }

    fn tick_resolution(&self) -> FrameRate {
        self.sequence.tick_resolution
    }

    fn transform_section(&self, object: &TrailObject) -> Option<&TransformSection> {
        let (track, control) = self.key_track(object)?;
        match (self.sequence.track(track)?.data(), control) {
            (TrackData::Transform(section), None) => Some(section),
            (TrackData::ControlRig(section), Some(control)) => section.controls.get(&control),
            _ => None,
        }
    }

    fn transform_section_mut(&mut self, object: &TrailObject) -> Option<&mut TransformSection> {
        let (track, control) = self.key_track(object)?;
        match (self.sequence.track_mut(track)?.data_mut(), control) {
            (TrackData::Transform(section), None) => Some(section),
            (TrackData::ControlRig(section), Some(control)) => section.controls.get_mut(&control),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_index::FrameTimeByIndex;
    use crate::host::SceneComponent;
    use indexmap::IndexMap;
    use ordoplay_editor_sequencer::{
        AttachSection, ControlRigSection, FrameRange, PathSection, SkeletalAnimationSection,
    };

    fn frames() -> FrameTimeByIndex {
        FrameTimeByIndex::new(
            FrameRange::new(FrameNumber(0), FrameNumber(24000)),
            FrameNumber(800),
            FrameRate::fps(24000),
        )
    }

    fn all_tracks(host: &SequenceHost) -> IndexSet<TrackId> {
        host.sequence().tracks().map(|t| t.id).collect()
    }

    fn evaluate(host: &mut SequenceHost, objects: &[TrailObject], indices: &[usize]) -> EvaluatedTransforms {
        let frames = frames();
        let tracks = all_tracks(host);
        host.calculate_world_transforms(&EvaluationRequest {
            frames: &frames,
            indices,
            objects,
            dependent_tracks: &tracks,
        })
    }

    fn moving_actor(scene: &mut Scene, sequence: &mut Sequence, name: &str) -> EntityId {
        let entity = scene.spawn(name, Transform::IDENTITY);
        let binding = sequence.bind(name, entity);
        let mut section = TransformSection::new();
        section.set_location_key(FrameNumber(0), [0.0, 0.0, 0.0]);
        section.set_location_key(FrameNumber(24000), [300.0, 0.0, 0.0]);
        sequence.add_track(Track::transform(binding, section));
        entity
    }

    #[test]
    fn test_animated_actor_world() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let actor = moving_actor(&mut scene, &mut sequence, "Cube");
        let mut host = SequenceHost::new(sequence, scene);

        let object = TrailObject::Actor(actor);
        let result = evaluate(&mut host, &[object.clone()], &[0, 15, 30]);
        let values = &result.objects[&object];
        assert_eq!(values.len(), 3);
        assert!((values[1].translation[0] - 150.0).abs() < 1e-9);
        assert!((values[2].translation[0] - 300.0).abs() < 1e-9);
        assert_eq!(host.evaluation_calls(), 1);
        assert_eq!(host.last_indices(), &[0, 15, 30]);
    }

    #[test]
    fn test_untracked_dependencies_are_skipped() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let actor = moving_actor(&mut scene, &mut sequence, "Cube");
        let mut host = SequenceHost::new(sequence, scene);

        let frames = frames();
        let object = TrailObject::Actor(actor);
        let none = IndexSet::new();
        let result = host.calculate_world_transforms(&EvaluationRequest {
            frames: &frames,
            indices: &[30],
            objects: std::slice::from_ref(&object),
            dependent_tracks: &none,
        });
        assert_eq!(result.objects[&object][0], Transform::IDENTITY);
    }

    #[test]
    fn test_attach_section_parents_within_range() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let parent = moving_actor(&mut scene, &mut sequence, "Parent");
        let child = scene.spawn("Child", Transform::from_translation([0.0, 10.0, 0.0]));
        let child_binding = sequence.bind("Child", child);
        sequence.add_track(Track::new(
            "Attach",
            child_binding,
            TrackData::Attach(AttachSection {
                target: AttachTarget::Entity(parent),
                socket: None,
                range: FrameRange::new(FrameNumber(0), FrameNumber(12000)),
            }),
        ));
        let mut host = SequenceHost::new(sequence, scene);

        let object = TrailObject::Actor(child);
        let result = evaluate(&mut host, &[object.clone()], &[10, 20]);
        let values = &result.objects[&object];
        assert!((values[0].translation[0] - 100.0).abs() < 1e-9);
        assert!((values[0].translation[1] - 10.0).abs() < 1e-9);
        // Detached after the section ends
        assert!(values[1].translation[0].abs() < 1e-9);
    }

    #[test]
    fn test_path_section_follows_spline() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let path = scene.spawn("Path", Transform::from_translation([0.0, 0.0, 50.0]));
        scene.entity_mut(path).unwrap().spline = vec![[0.0, 0.0, 0.0], [0.0, 100.0, 0.0]];
        let rider = scene.spawn("Rider", Transform::IDENTITY);
        let binding = sequence.bind("Rider", rider);
        sequence.add_track(Track::new(
            "Path",
            binding,
            TrackData::Path(PathSection {
                target: AttachTarget::Entity(path),
                range: FrameRange::new(FrameNumber(0), FrameNumber(24000)),
                progress: Default::default(),
            }),
        ));
        let mut host = SequenceHost::new(sequence, scene);

        let object = TrailObject::Actor(rider);
        let result = evaluate(&mut host, &[object.clone()], &[15]);
        assert_eq!(result.objects[&object][0].translation, [0.0, 50.0, 50.0]);
    }

    #[test]
    fn test_socket_follows_skeletal_animation() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let actor = scene.spawn("Character", Transform::from_translation([5.0, 0.0, 0.0]));
        scene.add_component(
            actor,
            "Mesh",
            SceneComponent::new(Transform::IDENTITY).with_socket("hand", Transform::IDENTITY),
        );
        let binding = sequence.bind("Character", actor);
        let mut hand = TransformSection::new();
        hand.set_location_key(FrameNumber(0), [0.0, 0.0, 0.0]);
        hand.set_location_key(FrameNumber(24000), [0.0, 0.0, 20.0]);
        let mut sockets = IndexMap::new();
        sockets.insert("hand".to_string(), hand);
        sequence.add_track(Track::new(
            "Anim",
            binding,
            TrackData::SkeletalAnimation(SkeletalAnimationSection {
                animation: "Wave".to_string(),
                range: FrameRange::new(FrameNumber(0), FrameNumber(24000)),
                start_offset: FrameNumber(0),
                play_rate: 1.0,
                sockets,
            }),
        ));
        let mut host = SequenceHost::new(sequence, scene);

        let object = TrailObject::Socket {
            entity: actor,
            component: "Mesh".to_string(),
            socket: "hand".to_string(),
        };
        let result = evaluate(&mut host, &[object.clone()], &[15]);
        let value = result.objects[&object][0];
        assert!((value.translation[0] - 5.0).abs() < 1e-9);
        assert!((value.translation[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_controls_report_component_space_and_rig_parent_once() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let owner = moving_actor(&mut scene, &mut sequence, "Rigged");
        let rig = scene.add_rig(
            owner,
            "Root",
            [
                ("hand".to_string(), Transform::from_translation([0.0, 1.0, 0.0])),
                ("foot".to_string(), Transform::from_translation([0.0, -1.0, 0.0])),
            ],
        );
        let binding = sequence.binding_for_entity(owner).unwrap().id;
        let mut hand = TransformSection::new();
        hand.set_location_key(FrameNumber(0), [0.0, 1.0, 0.0]);
        hand.set_location_key(FrameNumber(24000), [0.0, 1.0, 8.0]);
        let mut controls = IndexMap::new();
        controls.insert("hand".to_string(), hand);
        sequence.add_track(Track::new(
            "Rig",
            binding,
            TrackData::ControlRig(ControlRigSection { rig, controls }),
        ));
        let mut host = SequenceHost::new(sequence, scene);

        let hand = TrailObject::Control { rig, control: "hand".to_string() };
        let foot = TrailObject::Control { rig, control: "foot".to_string() };
        let result = evaluate(&mut host, &[hand.clone(), foot.clone()], &[15]);

        assert_eq!(result.objects[&hand][0].translation, [0.0, 1.0, 4.0]);
        assert_eq!(result.objects[&foot][0].translation, [0.0, -1.0, 0.0]);
        assert_eq!(result.rig_parents.len(), 1);
        assert!((result.rig_parents[&rig][0].translation[0] - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_object_is_left_out() {
        let mut host = SequenceHost::new(Sequence::new("Test"), Scene::new());
        let object = TrailObject::Actor(EntityId::new());
        let result = evaluate(&mut host, &[object.clone()], &[0]);
        assert!(!result.objects.contains_key(&object));
    }

    #[test]
    fn test_key_editing_section_changes_signature() {
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Test");
        let actor = moving_actor(&mut scene, &mut sequence, "Cube");
        let mut host = SequenceHost::new(sequence, scene);
        let object = TrailObject::Actor(actor);

        let binding = host.binding_for_entity(actor).unwrap();
        let before = host.transform_affecting_tracks(binding)[0].signature;
        assert_eq!(host.important_frames(&object), vec![FrameNumber(0), FrameNumber(24000)]);

        let section = host.transform_section_mut(&object).unwrap();
        section.set_location_key(FrameNumber(8000), [1.0, 1.0, 1.0]);
        let after = host.transform_affecting_tracks(binding)[0].signature;
        assert_ne!(before, after);
    }
}
