// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change detection for trail caches.
//!
//! A snapshot records the signature of every track and binding that can move
//! an object. Comparing a fresh snapshot with the stored one tells whether
//! the cached trail is stale.

use crate::host::TimelineHost;
use crate::object::TrailObject;
use indexmap::{IndexMap, IndexSet};
use ordoplay_editor_sequencer::{EntityId, Signature, TrackId, TrackKind};
use std::collections::{HashSet, VecDeque};

/// Tracks and actors a trail's transforms depend on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerTransformDependencies {
    /// Transform-affecting tracks with their signatures
    pub tracked_tracks: IndexMap<TrackId, Signature>,
    /// Sequencer-bound actors that move the object, with binding signatures
    pub tracked_actors: IndexMap<EntityId, Signature>,
    /// Parents that move the object but that no sequence drives
    pub non_sequencer_actors: IndexSet<EntityId>,
}

impl SequencerTransformDependencies {
    /// Snapshot the dependencies of `object`
    pub fn calculate(host: &impl TimelineHost, object: &TrailObject) -> Self {
        let mut deps = Self::default();
        if let Some(root) = host.owning_entity(object) {
            deps.walk(host, root);
        }
        deps
    }

    /// Snapshot the dependencies of `object` drawn relative to `space`
    pub fn calculate_with_space(host: &impl TimelineHost, object: &TrailObject, space: Option<&TrailObject>) -> Self {
        let mut deps = Self::calculate(host, object);
        if let Some(space) = space {
            deps.merge(Self::calculate(host, space));
        }
        deps
    }

    fn walk(&mut self, host: &impl TimelineHost, root: EntityId) {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root]);

        while let Some(entity) = queue.pop_front() {
            if !visited.insert(entity) {
                continue;
            }

            match host.binding_for_entity(entity) {
                Some(binding) => {
                    if entity != root {
                        if let Some(signature) = host.binding_signature(binding) {
                            self.tracked_actors.insert(entity, signature);
                        }
                    }
                    for dependency in host.transform_affecting_tracks(binding) {
                        let followed = match dependency.kind {
                            TrackKind::Transform3D | TrackKind::ControlRig | TrackKind::SkeletalAnimation => true,
                            TrackKind::Attach | TrackKind::Path => {
                                if let Some(target) = dependency.target {
                                    queue.push_back(target);
                                }
                                true
                            }
                            TrackKind::Event => false,
                        };
                        if followed {
                            self.tracked_tracks.insert(dependency.track, dependency.signature);
                        }
                    }
                }
                None if entity != root => {
                    self.non_sequencer_actors.insert(entity);
                }
                None => {}
            }

            if let Some(parent) = host.scene_parent(entity) {
                queue.push_back(parent);
            }
        }
    }

    /// Add another snapshot's entries
    pub fn merge(&mut self, other: Self) {
        self.tracked_tracks.extend(other.tracked_tracks);
        self.tracked_actors.extend(other.tracked_actors);
        self.non_sequencer_actors.extend(other.non_sequencer_actors);
    }

    /// Whether `other` differs from this snapshot.
    ///
    /// Order is ignored: only the key sets and the signatures matter.
    pub fn compare(&self, other: &Self) -> bool {
        fn differs<K: std::hash::Hash + Eq>(a: &IndexMap<K, Signature>, b: &IndexMap<K, Signature>) -> bool {
            a.len() != b.len() || a.iter().any(|(key, signature)| b.get(key) != Some(signature))
        }

        differs(&self.tracked_tracks, &other.tracked_tracks)
            || differs(&self.tracked_actors, &other.tracked_actors)
            || self.non_sequencer_actors.len() != other.non_sequencer_actors.len()
            || self
                .non_sequencer_actors
                .iter()
                .any(|e| !other.non_sequencer_actors.contains(e))
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.tracked_tracks.is_empty() && self.tracked_actors.is_empty() && self.non_sequencer_actors.is_empty()
    }

    /// Whether moving `entity` outside the timeline affects this object
    pub fn depends_on_actor(&self, entity: EntityId) -> bool {
        self.non_sequencer_actors.contains(&entity) || self.tracked_actors.contains_key(&entity)
    }

    /// Tracked track IDs
    pub fn tracks(&self) -> impl Iterator<Item = &TrackId> {
        self.tracked_tracks.keys()
    }
}
