// SPDX-License-Identifier: MIT OR Apache-2.0
//! The set of live trails and the per-tick update.
//!
//! Trails exist because something is selected or pinned. Every update:
//! 1. trails marked dead on the previous update are removed
//! 2. each visible trail's dependencies are re-snapshotted; changes mark it stale
//! 3. the evaluation engine advances stale trails by one batch

use crate::dependency::SequencerTransformDependencies;
use crate::engine::{TickContext, TrailEvaluationEngine};
use crate::error::{Result, TrailError};
use crate::frame_index::FrameTimeByIndex;
use crate::host::TimelineHost;
use crate::object::{TrailId, TrailObject};
use crate::options::{PinnedTrail, TrailOptions};
use crate::trail::{CacheEvent, CacheState, Trail};
use indexmap::{IndexMap, IndexSet};
use ordoplay_editor_sequencer::{EntityId, FrameNumber, FrameRange, FrameRate, Transform};
use std::collections::HashSet;

/// What one update did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Trails whose dependencies changed this update
    pub stale: Vec<TrailId>,
    /// Trails whose object disappeared this update
    pub dead: Vec<TrailId>,
    /// Trails removed at the start of this update
    pub removed: Vec<TrailId>,
    /// Frame indices evaluated this update
    pub evaluated: Vec<usize>,
    /// The evaluation scan finished this update
    pub finished: bool,
    /// No world was available; nothing was evaluated
    pub skipped: bool,
}

/// All trails of the editor
#[derive(Debug)]
pub struct TrailHierarchy {
    options: TrailOptions,
    trails: IndexMap<TrailId, Trail>,
    engine: TrailEvaluationEngine,
    selected: IndexSet<TrailId>,
    control_selected: IndexSet<TrailId>,
    always_visible: IndexSet<TrailId>,
    inactive_mask: HashSet<TrailId>,
}

impl Default for TrailHierarchy {
    fn default() -> Self {
        Self::new(TrailOptions::default())
    }
}

impl TrailHierarchy {
    /// Create an empty hierarchy
    pub fn new(options: TrailOptions) -> Self {
        Self {
            engine: TrailEvaluationEngine::new(options.indices_per_bucket),
            options,
            trails: IndexMap::new(),
            selected: IndexSet::new(),
            control_selected: IndexSet::new(),
            always_visible: IndexSet::new(),
            inactive_mask: HashSet::new(),
        }
    }

    /// Options
    pub fn options(&self) -> &TrailOptions {
        &self.options
    }

    /// Replace the options, keeping the pinned list.
    ///
    /// Lowering `max_pinned` unpins the most recently pinned trails over the
    /// new limit.
    pub fn set_options(&mut self, mut options: TrailOptions) {
        options.pinned = std::mem::take(&mut self.options.pinned);
        self.engine.set_indices_per_bucket(options.indices_per_bucket);
        self.options = options;

        while self.always_visible.len() > self.options.max_pinned {
            let Some(id) = self.always_visible.pop() else {
                break;
            };
            tracing::warn!(trail = %id, max = self.options.max_pinned, "Unpinned trail over the pinned limit");
            if !self.is_selected(id) {
                self.discard_trail(id);
            }
        }
    }

    /// The evaluation engine
    pub fn engine(&self) -> &TrailEvaluationEngine {
        &self.engine
    }

    /// Frame layout of the cached samples
    pub fn frames(&self) -> Option<&FrameTimeByIndex> {
        self.engine.frames()
    }

    /// Get a trail
    pub fn trail(&self, id: TrailId) -> Option<&Trail> {
        self.trails.get(&id)
    }

    /// All trails
    pub fn trails(&self) -> impl Iterator<Item = &Trail> {
        self.trails.values()
    }

    /// Number of trails
    pub fn len(&self) -> usize {
        self.trails.len()
    }

    /// Whether there are no trails
    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    /// Trail following `object`
    pub fn find(&self, object: &TrailObject) -> Option<TrailId> {
        self.trails.values().find(|t| t.object() == object).map(|t| t.id())
    }

    /// Trail IDs drawn greyed out because their scan is incomplete
    pub fn inactive_mask(&self) -> &HashSet<TrailId> {
        &self.inactive_mask
    }

    /// Whether a trail is drawn greyed out
    pub fn is_inactive(&self, id: TrailId) -> bool {
        self.inactive_mask.contains(&id)
    }

    /// Whether a trail is selected, control-selected, or pinned
    pub fn is_visible(&self, id: TrailId) -> bool {
        self.selected.contains(&id) || self.control_selected.contains(&id) || self.always_visible.contains(&id)
    }

    /// Whether a trail belongs to the current selection
    pub fn is_selected(&self, id: TrailId) -> bool {
        self.selected.contains(&id) || self.control_selected.contains(&id)
    }

    /// Whether a trail is pinned
    pub fn is_pinned(&self, id: TrailId) -> bool {
        self.always_visible.contains(&id)
    }

    /// Pinned trail IDs
    pub fn pinned(&self) -> impl Iterator<Item = &TrailId> {
        self.always_visible.iter()
    }

    /// Follow `object`, reusing its trail when one exists.
    ///
    /// The trail is only evaluated while it is selected or pinned.
    pub fn add_trail(&mut self, object: TrailObject) -> TrailId {
        if let Some(id) = self.find(&object) {
            return id;
        }
        let trail = Trail::new(object.clone(), object.label(), self.options.default_color);
        self.insert_trail(trail)
    }

    fn insert_trail(&mut self, mut trail: Trail) -> TrailId {
        let id = trail.id();
        if let Some(rig) = trail.object().rig() {
            trail.set_parent(Some(self.engine.rig_parent(rig)));
        }
        if let Some(frames) = self.engine.frames() {
            trail.resize(frames.count);
        }
        tracing::debug!(trail = %id, object = %trail.object().label(), "Trail created");
        self.trails.insert(id, trail);
        self.engine.schedule(id);
        id
    }

    /// Stop following a trail's object
    pub fn remove_trail(&mut self, id: TrailId) -> Option<Trail> {
        let trail = self.trails.shift_remove(&id)?;
        self.selected.shift_remove(&id);
        self.control_selected.shift_remove(&id);
        self.always_visible.shift_remove(&id);
        self.inactive_mask.remove(&id);
        self.engine.unschedule(id);
        tracing::debug!(trail = %id, "Trail removed");
        Some(trail)
    }

    /// Remove a trail and release rig buffers it was the last holder of
    fn discard_trail(&mut self, id: TrailId) {
        if self.remove_trail(id).is_some() {
            self.engine.prune_rig_parents();
        }
    }

    /// Show trails for the selected actors, components, and sockets
    pub fn sync_selection(&mut self, objects: &[TrailObject]) -> Vec<TrailId> {
        let ids: IndexSet<TrailId> = objects.iter().map(|o| self.add_trail(o.clone())).collect();
        let previous = std::mem::replace(&mut self.selected, ids);
        for id in previous {
            if !self.is_visible(id) {
                self.discard_trail(id);
            }
        }
        self.selected.iter().copied().collect()
    }

    /// Show trails for the selected control rig controls
    pub fn set_control_selection(&mut self, objects: &[TrailObject]) -> Vec<TrailId> {
        let ids: IndexSet<TrailId> = objects
            .iter()
            .filter(|o| o.is_control())
            .map(|o| self.add_trail(o.clone()))
            .collect();
        let previous = std::mem::replace(&mut self.control_selected, ids);
        for id in previous {
            if !self.is_visible(id) {
                self.discard_trail(id);
            }
        }
        self.control_selected.iter().copied().collect()
    }

    /// Keep a trail visible regardless of selection
    pub fn pin(&mut self, id: TrailId) -> Result<()> {
        if !self.trails.contains_key(&id) {
            return Err(TrailError::TrailNotFound(id));
        }
        if self.always_visible.contains(&id) {
            return Ok(());
        }
        if self.always_visible.len() >= self.options.max_pinned {
            tracing::warn!(max = self.options.max_pinned, "Pinned trail limit reached");
            return Err(TrailError::PinLimitExceeded {
                max: self.options.max_pinned,
            });
        }
        self.always_visible.insert(id);
        tracing::info!(trail = %id, "Trail pinned");
        Ok(())
    }

    /// Stop pinning a trail; unselected trails go away
    pub fn unpin(&mut self, id: TrailId) -> Result<()> {
        if !self.trails.contains_key(&id) {
            return Err(TrailError::TrailNotFound(id));
        }
        if !self.always_visible.shift_remove(&id) {
            return Ok(());
        }
        if !self.is_selected(id) {
            self.discard_trail(id);
        }
        Ok(())
    }

    /// Unpin a trail and forget its persisted entry
    pub fn delete_pinned(&mut self, id: TrailId) -> Result<()> {
        self.unpin(id)?;
        self.options.pinned.retain(|p| p.id != id);
        if self.trails.contains_key(&id) {
            self.force_evaluate(id)?;
        }
        Ok(())
    }

    /// Apply a constant post-transform to a trail
    pub fn set_offset(&mut self, id: TrailId, offset: Transform) -> Result<()> {
        let trail = self.trails.get_mut(&id).ok_or(TrailError::TrailNotFound(id))?;
        trail.set_offset(Some(offset));
        self.force_evaluate(id)
    }

    /// Remove a trail's offset
    pub fn clear_offset(&mut self, id: TrailId) -> Result<()> {
        let trail = self.trails.get_mut(&id).ok_or(TrailError::TrailNotFound(id))?;
        trail.set_offset(None);
        self.force_evaluate(id)
    }

    /// Draw a trail relative to another object, or in world space with `None`
    pub fn set_space(&mut self, id: TrailId, space: Option<TrailObject>) -> Result<()> {
        let trail = self.trails.get_mut(&id).ok_or(TrailError::TrailNotFound(id))?;
        trail.set_space(space);
        self.force_evaluate(id)
    }

    /// Rescan a trail regardless of its dependencies
    pub fn force_evaluate(&mut self, id: TrailId) -> Result<()> {
        let trail = self.trails.get_mut(&id).ok_or(TrailError::TrailNotFound(id))?;
        trail.apply(CacheEvent::Invalidated);
        self.engine.schedule(id);
        Ok(())
    }

    /// Rescan every live trail
    pub fn force_evaluate_all(&mut self) {
        for (id, trail) in self.trails.iter_mut() {
            if trail.state() != CacheState::Dead {
                trail.apply(CacheEvent::Invalidated);
                self.engine.schedule(*id);
            }
        }
    }

    /// An entity moved outside the timeline; rescan trails it affects
    pub fn notify_actor_moved(&mut self, entity: EntityId) -> Vec<TrailId> {
        let mut affected = Vec::new();
        for (id, trail) in self.trails.iter_mut() {
            let moves_trail = trail.object().entity() == Some(entity)
                || trail.space().and_then(TrailObject::entity) == Some(entity)
                || trail.dependencies().depends_on_actor(entity);
            if moves_trail && trail.state() != CacheState::Dead {
                trail.apply(CacheEvent::DependenciesChanged);
                self.engine.schedule(*id);
                affected.push(*id);
            }
        }
        affected
    }

    /// An object was deleted; trails following it die
    pub fn notify_object_deleted(&mut self, object: &TrailObject) -> Vec<TrailId> {
        let deleted_entity = match object {
            TrailObject::Actor(entity) => Some(*entity),
            _ => None,
        };
        let mut dead = Vec::new();
        for (id, trail) in self.trails.iter_mut() {
            let gone = trail.object() == object
                || (deleted_entity.is_some() && trail.object().entity() == deleted_entity);
            if gone && trail.state() != CacheState::Dead {
                trail.apply(CacheEvent::ObjectGone);
                self.engine.unschedule(*id);
                dead.push(*id);
            }
        }
        dead
    }

    /// Advance trails by one tick
    pub fn update(&mut self, host: &mut impl TimelineHost, ctx: &TickContext) -> UpdateReport {
        let mut report = UpdateReport::default();

        let dead: Vec<TrailId> = self
            .trails
            .values()
            .filter(|t| t.state() == CacheState::Dead)
            .map(|t| t.id())
            .collect();
        for id in dead {
            self.discard_trail(id);
            report.removed.push(id);
        }

        if !host.has_world() {
            report.skipped = true;
            return report;
        }

        for (id, trail) in self.trails.iter_mut() {
            let visible =
                self.selected.contains(id) || self.control_selected.contains(id) || self.always_visible.contains(id);
            if !visible {
                self.engine.unschedule(*id);
                continue;
            }

            if !host.object_exists(trail.object()) {
                tracing::info!(trail = %id, object = %trail.object().label(), "Trail object is gone");
                trail.apply(CacheEvent::ObjectGone);
                self.engine.unschedule(*id);
                report.dead.push(*id);
                continue;
            }

            trail.set_important_frames(host.important_frames(trail.object()));
            let dependencies =
                SequencerTransformDependencies::calculate_with_space(&*host, trail.object(), trail.space());
            if trail.set_dependencies(dependencies) {
                trail.apply(CacheEvent::DependenciesChanged);
                self.engine.schedule(*id);
                report.stale.push(*id);
            } else if trail.state() != CacheState::UpToDate && !self.engine.is_evaluating(*id) {
                // Became visible with an unfinished scan
                self.engine.schedule(*id);
            }
        }

        let tick = self.engine.tick(host, ctx, &mut self.trails);
        self.inactive_mask = if tick.done {
            HashSet::new()
        } else {
            self.engine.evaluating().copied().collect()
        };

        report.evaluated = tick.indices;
        report.finished = tick.done;
        report.skipped = tick.skipped;
        report
    }

    /// Frames shown for trails at `ctx`, in ticks
    pub fn display_range(&self, ctx: &TickContext) -> FrameRange {
        if self.options.show_full_trail {
            return ctx.playback_range;
        }
        let to_ticks = |frames: i32| FrameRate::transform_time(FrameNumber(frames), ctx.display_rate, ctx.tick_resolution);
        let window = FrameRange::new(
            ctx.current_frame - to_ticks(self.options.frames_before),
            ctx.current_frame + to_ticks(self.options.frames_after),
        );
        window.intersection(&ctx.playback_range).unwrap_or(window)
    }

    /// Pinned trails as they would be persisted
    pub fn pinned_trails(&self) -> Vec<PinnedTrail> {
        self.always_visible
            .iter()
            .filter_map(|id| self.trails.get(id))
            .map(|trail| PinnedTrail {
                id: trail.id(),
                name: trail.name.clone(),
                color: trail.color,
                has_offset: trail.offset().is_some(),
                object: trail.object().clone(),
                offset: trail.offset().copied(),
            })
            .collect()
    }

    /// Write pinned trails into the options
    pub fn persist_pinned(&mut self) -> &[PinnedTrail] {
        self.options.pinned = self.pinned_trails();
        tracing::info!(count = self.options.pinned.len(), "Persisted pinned trails");
        &self.options.pinned
    }

    /// Recreate pinned trails from the options; returns how many were restored
    pub fn restore_pinned(&mut self, host: &impl TimelineHost) -> usize {
        let mut restored = 0;
        for pinned in self.options.pinned.clone() {
            if !host.object_exists(&pinned.object) {
                tracing::warn!(trail = %pinned.id, name = %pinned.name, "Pinned trail object not found");
                continue;
            }

            let id = match self.find(&pinned.object) {
                Some(id) => id,
                None => {
                    let mut trail = Trail::with_id(pinned.id, pinned.object.clone(), pinned.name.clone(), pinned.color);
                    if pinned.has_offset {
                        trail.set_offset(pinned.offset);
                    }
                    self.insert_trail(trail)
                }
            };

            match self.pin(id) {
                Ok(()) => restored += 1,
                Err(e) => {
                    tracing::warn!(trail = %id, "Could not restore pinned trail: {}", e);
                    if !self.is_visible(id) {
                        self.discard_trail(id);
                    }
                }
            }
        }
        tracing::info!(restored, "Restored pinned trails");
        restored
    }

    /// Persist pinned trails and hand back the options
    pub fn shutdown(mut self) -> TrailOptions {
        self.persist_pinned();
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Scene, SequenceHost};
    use ordoplay_editor_sequencer::{AttachSection, AttachTarget, Sequence, Track, TrackData, TransformSection};

    struct Fixture {
        host: SequenceHost,
        actor: EntityId,
        hierarchy: TrailHierarchy,
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ordoplay_editor_motion_trail=debug")
            .with_test_writer()
            .try_init();
    }

    /// Actor keyed at frames 0, 10, 20 moving along x, sampled every frame
    fn fixture() -> Fixture {
        init_tracing();
        let mut scene = Scene::new();
        let mut sequence = Sequence::new("Shot");
        sequence.tick_resolution = FrameRate::fps(30);
        sequence.display_rate = FrameRate::fps(30);
        sequence.playback_range = FrameRange::new(FrameNumber(0), FrameNumber(20));

        let actor = scene.spawn("Cube", Transform::IDENTITY);
        let binding = sequence.bind("Cube", actor);
        let mut section = TransformSection::new();
        section.set_location_key(FrameNumber(0), [0.0, 0.0, 0.0]);
        section.set_location_key(FrameNumber(10), [50.0, 0.0, 0.0]);
        section.set_location_key(FrameNumber(20), [100.0, 0.0, 0.0]);
        sequence.add_track(Track::transform(binding, section));

        Fixture {
            host: SequenceHost::new(sequence, scene),
            actor,
            hierarchy: TrailHierarchy::default(),
        }
    }

    fn ctx(f: &Fixture) -> TickContext {
        TickContext::for_sequence(f.host.sequence(), FrameNumber(0))
    }

    fn update(f: &mut Fixture) -> UpdateReport {
        let ctx = ctx(f);
        f.hierarchy.update(&mut f.host, &ctx)
    }

    #[test]
    fn test_trail_lifecycle() {
        let mut f = fixture();
        let ids = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)]);
        let id = ids[0];

        let first = update(&mut f);
        assert_eq!(first.stale, vec![id]);
        assert!(!first.finished);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::NotUpdated);
        assert!(f.hierarchy.is_inactive(id));

        let second = update(&mut f);
        assert!(second.finished);
        let trail = f.hierarchy.trail(id).unwrap();
        assert_eq!(trail.state(), CacheState::UpToDate);
        assert_eq!(trail.valid_count(), 21);
        let frames = f.hierarchy.frames().unwrap();
        let at_five = trail
            .transforms()
            .interpolate(frames.seconds(5), &trail.valid_indices(), &trail.valid_times(frames));
        assert!((at_five.translation[0] - 25.0).abs() < 1e-9);
        assert!((trail.world_at(10).unwrap().translation[0] - 50.0).abs() < 1e-9);
        assert!(!f.hierarchy.is_inactive(id));
        assert_eq!(f.host.evaluation_calls(), 2);

        // Editing a key makes the trail stale and starts a new scan
        let binding = f.host.sequence().binding_for_entity(f.actor).unwrap().id;
        let track_id = f.host.sequence().tracks_for_binding(binding).next().unwrap().id;
        let track = f.host.sequence_mut().track_mut(track_id).unwrap();
        track
            .transform_section_mut()
            .unwrap()
            .set_location_key(FrameNumber(10), [0.0, 0.0, 0.0]);

        let third = update(&mut f);
        assert_eq!(third.stale, vec![id]);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::NotUpdated);
        let fourth = update(&mut f);
        assert!(fourth.finished);
        let trail = f.hierarchy.trail(id).unwrap();
        assert_eq!(trail.state(), CacheState::UpToDate);
        assert!(trail.world_at(10).unwrap().translation[0].abs() < 1e-9);

        // Nothing changed: no further host calls
        let calls = f.host.evaluation_calls();
        let idle = update(&mut f);
        assert!(idle.stale.is_empty());
        assert_eq!(f.host.evaluation_calls(), calls);

        // Deleting the actor kills the trail, the next update removes it
        f.host.scene_mut().remove_entity(f.actor);
        let fifth = update(&mut f);
        assert_eq!(fifth.dead, vec![id]);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::Dead);
        let sixth = update(&mut f);
        assert_eq!(sixth.removed, vec![id]);
        assert!(f.hierarchy.trail(id).is_none());
    }

    #[test]
    fn test_no_world_skips_evaluation() {
        let mut f = fixture();
        f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)]);
        f.host.set_world_available(false);
        let report = update(&mut f);
        assert!(report.skipped);
        assert_eq!(f.host.evaluation_calls(), 0);
    }

    #[test]
    fn test_one_host_call_per_tick_for_many_trails() {
        let mut f = fixture();
        let other = f.host.scene_mut().spawn("Sphere", Transform::IDENTITY);
        f.hierarchy
            .sync_selection(&[TrailObject::Actor(f.actor), TrailObject::Actor(other)]);
        update(&mut f);
        assert_eq!(f.host.evaluation_calls(), 1);
        assert_eq!(f.host.last_indices().last(), Some(&0));
    }

    #[test]
    fn test_deselect_removes_unpinned_trails() {
        let mut f = fixture();
        let other = f.host.scene_mut().spawn("Sphere", Transform::IDENTITY);
        let ids = f
            .hierarchy
            .sync_selection(&[TrailObject::Actor(f.actor), TrailObject::Actor(other)]);
        f.hierarchy.pin(ids[1]).unwrap();

        f.hierarchy.sync_selection(&[]);
        assert!(f.hierarchy.trail(ids[0]).is_none());
        assert!(f.hierarchy.trail(ids[1]).is_some());
        assert!(f.hierarchy.is_visible(ids[1]));

        f.hierarchy.unpin(ids[1]).unwrap();
        assert!(f.hierarchy.is_empty());
    }

    #[test]
    fn test_pin_limit() {
        let mut f = fixture();
        let mut options = TrailOptions::default();
        options.max_pinned = 1;
        f.hierarchy.set_options(options);

        let other = f.host.scene_mut().spawn("Sphere", Transform::IDENTITY);
        let ids = f
            .hierarchy
            .sync_selection(&[TrailObject::Actor(f.actor), TrailObject::Actor(other)]);
        f.hierarchy.pin(ids[0]).unwrap();
        assert!(matches!(
            f.hierarchy.pin(ids[1]),
            Err(TrailError::PinLimitExceeded { max: 1 })
        ));
        assert!(!f.hierarchy.is_pinned(ids[1]));
    }

    #[test]
    fn test_persist_and_restore_pinned() {
        let mut f = fixture();
        let ids = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)]);
        f.hierarchy.pin(ids[0]).unwrap();
        f.hierarchy
            .set_offset(ids[0], Transform::from_translation([0.0, 0.0, 5.0]))
            .unwrap();
        let options = f.hierarchy.shutdown();
        assert_eq!(options.pinned.len(), 1);
        assert!(options.pinned[0].has_offset);

        let restored_options = TrailOptions::from_ron(&options.to_ron().unwrap()).unwrap();
        let mut hierarchy = TrailHierarchy::new(restored_options);
        assert_eq!(hierarchy.restore_pinned(&f.host), 1);
        let trail = hierarchy.trail(ids[0]).unwrap();
        assert_eq!(trail.offset(), Some(&Transform::from_translation([0.0, 0.0, 5.0])));
        assert!(hierarchy.is_pinned(ids[0]));
    }

    #[test]
    fn test_restore_skips_missing_objects() {
        let f = fixture();
        let mut options = TrailOptions::default();
        options.pinned.push(PinnedTrail {
            id: TrailId::new(),
            name: "Gone".to_string(),
            color: [1, 2, 3],
            has_offset: false,
            object: TrailObject::Actor(EntityId::new()),
            offset: None,
        });
        let mut hierarchy = TrailHierarchy::new(options);
        assert_eq!(hierarchy.restore_pinned(&f.host), 0);
        assert!(hierarchy.is_empty());
    }

    #[test]
    fn test_notify_actor_moved_restarts_scan() {
        let mut f = fixture();
        let holder = f.host.scene_mut().spawn("Holder", Transform::IDENTITY);
        f.host.scene_mut().set_parent(f.actor, Some(holder));
        let id = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)])[0];
        update(&mut f);
        update(&mut f);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::UpToDate);

        f.host.scene_mut().entity_mut(holder).unwrap().transform = Transform::from_translation([0.0, 7.0, 0.0]);
        assert_eq!(f.hierarchy.notify_actor_moved(holder), vec![id]);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::Stale);
        update(&mut f);
        update(&mut f);
        let trail = f.hierarchy.trail(id).unwrap();
        assert_eq!(trail.state(), CacheState::UpToDate);
        assert!((trail.world_at(0).unwrap().translation[1] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_hidden_trails_are_not_evaluated() {
        let mut f = fixture();
        let id = f.hierarchy.add_trail(TrailObject::Actor(f.actor));
        assert!(!f.hierarchy.is_visible(id));

        let report = update(&mut f);
        assert!(report.stale.is_empty());
        assert!(report.evaluated.is_empty());
        assert_eq!(f.host.evaluation_calls(), 0);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::Stale);

        // Pinning makes it visible and the scan starts
        f.hierarchy.pin(id).unwrap();
        let report = update(&mut f);
        assert_eq!(report.stale, vec![id]);
        assert_eq!(f.host.evaluation_calls(), 1);
        update(&mut f);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::UpToDate);
    }

    #[test]
    fn test_layout_change_rescans_visible_trails_only() {
        let mut f = fixture();
        let shown = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)])[0];
        let other = f.host.scene_mut().spawn("Sphere", Transform::IDENTITY);
        let hidden = f.hierarchy.add_trail(TrailObject::Actor(other));
        update(&mut f);
        update(&mut f);
        assert_eq!(f.hierarchy.trail(shown).unwrap().state(), CacheState::UpToDate);
        let calls = f.host.evaluation_calls();

        let mut ctx = ctx(&f);
        ctx.playback_range = FrameRange::new(FrameNumber(0), FrameNumber(40));
        ctx.view_range = ctx.playback_range;
        f.hierarchy.update(&mut f.host, &ctx);

        assert_eq!(f.host.evaluation_calls(), calls + 1);
        assert_eq!(f.hierarchy.frames().unwrap().count, 41);
        assert_eq!(f.hierarchy.trail(shown).unwrap().state(), CacheState::NotUpdated);
        assert_eq!(f.hierarchy.trail(hidden).unwrap().state(), CacheState::Stale);
        assert!(!f.hierarchy.engine().is_evaluating(hidden));
    }

    #[test]
    fn test_unbound_attach_parent_needs_push_invalidation() {
        let mut f = fixture();
        let holder = f.host.scene_mut().spawn("Holder", Transform::IDENTITY);
        let binding = f.host.sequence().binding_for_entity(f.actor).unwrap().id;
        f.host.sequence_mut().add_track(Track::new(
            "Attach",
            binding,
            TrackData::Attach(AttachSection {
                target: AttachTarget::Entity(holder),
                socket: None,
                range: FrameRange::new(FrameNumber(0), FrameNumber(20)),
            }),
        ));
        let id = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)])[0];
        update(&mut f);
        update(&mut f);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::UpToDate);

        // Moving an unbound parent re-signs nothing, so polling misses it
        f.host.scene_mut().entity_mut(holder).unwrap().transform = Transform::from_translation([0.0, 7.0, 0.0]);
        let report = update(&mut f);
        assert!(report.stale.is_empty());
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::UpToDate);

        assert_eq!(f.hierarchy.notify_actor_moved(holder), vec![id]);
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::Stale);
        update(&mut f);
        update(&mut f);
        let trail = f.hierarchy.trail(id).unwrap();
        assert_eq!(trail.state(), CacheState::UpToDate);
        assert!((trail.world_at(0).unwrap().translation[1] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_unpin_unpinned_trail_is_noop() {
        let mut f = fixture();
        let id = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)])[0];
        assert!(f.hierarchy.unpin(id).is_ok());
        assert!(f.hierarchy.trail(id).is_some());
        assert!(matches!(
            f.hierarchy.unpin(TrailId::new()),
            Err(TrailError::TrailNotFound(_))
        ));
    }

    #[test]
    fn test_lowering_pin_limit_unpins_newest() {
        let mut f = fixture();
        let other = f.host.scene_mut().spawn("Sphere", Transform::IDENTITY);
        let third = f.host.scene_mut().spawn("Cone", Transform::IDENTITY);
        let ids = f.hierarchy.sync_selection(&[
            TrailObject::Actor(f.actor),
            TrailObject::Actor(other),
            TrailObject::Actor(third),
        ]);
        for id in &ids {
            f.hierarchy.pin(*id).unwrap();
        }
        // Only the first stays selected
        f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)]);

        let mut options = TrailOptions::default();
        options.max_pinned = 1;
        f.hierarchy.set_options(options);
        assert_eq!(f.hierarchy.pinned().copied().collect::<Vec<_>>(), vec![ids[0]]);
        assert!(f.hierarchy.trail(ids[1]).is_none());
        assert!(f.hierarchy.trail(ids[2]).is_none());

        let mut options = TrailOptions::default();
        options.max_pinned = 0;
        f.hierarchy.set_options(options);
        assert_eq!(f.hierarchy.pinned().count(), 0);
        // Still selected, so it stays
        assert!(f.hierarchy.trail(ids[0]).is_some());
    }

    #[test]
    fn test_notify_object_deleted() {
        let mut f = fixture();
        let object = TrailObject::Actor(f.actor);
        let id = f.hierarchy.sync_selection(std::slice::from_ref(&object))[0];
        assert_eq!(f.hierarchy.notify_object_deleted(&object), vec![id]);
        let report = update(&mut f);
        assert_eq!(report.removed, vec![id]);
    }

    #[test]
    fn test_interactive_ticks_keep_trail_inactive() {
        let mut f = fixture();
        let id = f.hierarchy.sync_selection(&[TrailObject::Actor(f.actor)])[0];
        let mut ctx = ctx(&f);
        ctx.interactive = true;
        for _ in 0..3 {
            let report = f.hierarchy.update(&mut f.host, &ctx);
            assert!(!report.finished);
        }
        assert_eq!(f.hierarchy.trail(id).unwrap().state(), CacheState::NotUpdated);
        assert!(f.hierarchy.is_inactive(id));
    }

    #[test]
    fn test_display_range_window() {
        let mut f = fixture();
        let mut options = TrailOptions::default();
        options.show_full_trail = false;
        options.frames_before = 2;
        options.frames_after = 3;
        f.hierarchy.set_options(options);

        let mut ctx = ctx(&f);
        ctx.current_frame = FrameNumber(10);
        assert_eq!(
            f.hierarchy.display_range(&ctx),
            FrameRange::new(FrameNumber(8), FrameNumber(13))
        );
        ctx.current_frame = FrameNumber(19);
        assert_eq!(
            f.hierarchy.display_range(&ctx),
            FrameRange::new(FrameNumber(17), FrameNumber(20))
        );
    }
}
