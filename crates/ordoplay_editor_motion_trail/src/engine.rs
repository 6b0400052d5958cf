// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-tick evaluation of stale trails.
//!
//! The engine owns the frame layout, the sample scheduler, and the rig
//! parent buffers. Each tick it asks the scheduler for a batch, makes one
//! host call covering every trail being evaluated, and scatters the results
//! back into the trails.

use crate::buffer::{SharedTransforms, TransformArray};
use crate::frame_index::FrameTimeByIndex;
use crate::host::{EvaluationRequest, TimelineHost};
use crate::object::{TrailId, TrailObject};
use crate::scheduler::FrameSampleScheduler;
use crate::trail::{CacheEvent, CacheState, Trail};
use indexmap::{IndexMap, IndexSet};
use ordoplay_editor_sequencer::{ControlRigId, FrameNumber, FrameRange, FrameRate, Sequence, TrackId};
use std::collections::HashMap;
use std::rc::Rc;

/// Editor state sampled at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    /// Current time (ticks)
    pub current_frame: FrameNumber,
    /// Visible part of the timeline (ticks)
    pub view_range: FrameRange,
    /// Range trails are evaluated over (ticks)
    pub playback_range: FrameRange,
    /// Rate the editor steps by
    pub display_rate: FrameRate,
    /// Rate frames are expressed in
    pub tick_resolution: FrameRate,
    /// A mouse button is held
    pub interactive: bool,
}

impl TickContext {
    /// Context for `sequence` with the whole playback range in view
    pub fn for_sequence(sequence: &Sequence, current_frame: FrameNumber) -> Self {
        Self {
            current_frame,
            view_range: sequence.playback_range,
            playback_range: sequence.playback_range,
            display_rate: sequence.display_rate,
            tick_resolution: sequence.tick_resolution,
            interactive: false,
        }
    }

    /// One display frame in ticks
    pub fn frame_step(&self) -> FrameNumber {
        let step = FrameRate::transform_time(FrameNumber(1), self.display_rate, self.tick_resolution);
        FrameNumber(step.0.max(1))
    }
}

/// What one engine tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineTick {
    /// Indices handed to the host, in order
    pub indices: Vec<usize>,
    /// Trails that received samples
    pub trails: Vec<TrailId>,
    /// The scan finished this tick
    pub done: bool,
    /// No world was available
    pub skipped: bool,
}

/// Schedules and runs trail evaluation
#[derive(Debug)]
pub struct TrailEvaluationEngine {
    scheduler: FrameSampleScheduler,
    frames: Option<FrameTimeByIndex>,
    view_range: Option<FrameRange>,
    evaluating: IndexSet<TrailId>,
    rig_parents: HashMap<ControlRigId, SharedTransforms>,
}

impl Default for TrailEvaluationEngine {
    fn default() -> Self {
        Self::new(crate::options::DEFAULT_INDICES_PER_BUCKET)
    }
}

impl TrailEvaluationEngine {
    /// Create an idle engine
    pub fn new(indices_per_bucket: usize) -> Self {
        Self {
            scheduler: FrameSampleScheduler::new(indices_per_bucket),
            frames: None,
            view_range: None,
            evaluating: IndexSet::new(),
            rig_parents: HashMap::new(),
        }
    }

    /// Current frame layout, once the first tick has run
    pub fn frames(&self) -> Option<&FrameTimeByIndex> {
        self.frames.as_ref()
    }

    /// The sample scheduler
    pub fn scheduler(&self) -> &FrameSampleScheduler {
        &self.scheduler
    }

    /// Change the per-bucket budget
    pub fn set_indices_per_bucket(&mut self, indices_per_bucket: usize) {
        self.scheduler.set_indices_per_bucket(indices_per_bucket);
    }

    /// Whether the trail is part of the current scan
    pub fn is_evaluating(&self, id: TrailId) -> bool {
        self.evaluating.contains(&id)
    }

    /// Trails in the current scan
    pub fn evaluating(&self) -> impl Iterator<Item = &TrailId> {
        self.evaluating.iter()
    }

    /// Add a trail to the scan and restart it
    pub fn schedule(&mut self, id: TrailId) {
        self.evaluating.insert(id);
        self.scheduler.cancel();
    }

    /// Drop a trail from the scan
    pub fn unschedule(&mut self, id: TrailId) {
        self.evaluating.shift_remove(&id);
    }

    /// Parent buffer shared by the control trails of `rig`
    pub fn rig_parent(&mut self, rig: ControlRigId) -> SharedTransforms {
        let len = self.frames.map_or(0, |f| f.count);
        Rc::clone(
            self.rig_parents
                .entry(rig)
                .or_insert_with(|| TransformArray::shared(len)),
        )
    }

    /// Release parent buffers no trail holds anymore
    pub fn prune_rig_parents(&mut self) {
        self.rig_parents.retain(|_, parent| Rc::strong_count(parent) > 1);
    }

    /// Number of live rig parent buffers
    pub fn rig_parent_count(&self) -> usize {
        self.rig_parents.len()
    }

    /// Run one tick of evaluation
    pub fn tick(
        &mut self,
        host: &mut impl TimelineHost,
        ctx: &TickContext,
        trails: &mut IndexMap<TrailId, Trail>,
    ) -> EngineTick {
        if !host.has_world() {
            return EngineTick {
                skipped: true,
                ..EngineTick::default()
            };
        }

        self.evaluating
            .retain(|id| trails.get(id).is_some_and(|t| t.state() != CacheState::Dead));

        let frames = FrameTimeByIndex::new(ctx.playback_range, ctx.frame_step(), ctx.tick_resolution);
        if self.frames != Some(frames) {
            self.relayout(frames, trails);
        }
        if self.view_range != Some(ctx.view_range) {
            self.view_range = Some(ctx.view_range);
            self.scheduler.cancel();
        }

        if self.evaluating.is_empty() {
            return EngineTick {
                done: true,
                ..EngineTick::default()
            };
        }

        let current = frames.index(ctx.current_frame);
        let must_have = self.must_have_indices(&frames, ctx, trails);
        if self.scheduler.keep_calculating() {
            self.scheduler.set_must_have(&must_have, current);
        } else {
            self.scheduler.reset(Self::ranges(&frames, ctx.view_range), &must_have, current);
        }

        let batch = self.scheduler.next_batch(ctx.interactive);
        let mut evaluated = Vec::new();

        if !batch.indices_to_calculate.is_empty() {
            let mut objects: Vec<TrailObject> = Vec::new();
            let mut dependent_tracks: IndexSet<TrackId> = IndexSet::new();
            for trail in self.evaluating.iter().filter_map(|id| trails.get(id)) {
                for object in std::iter::once(trail.object()).chain(trail.space()) {
                    if !objects.contains(object) {
                        objects.push(object.clone());
                    }
                }
                dependent_tracks.extend(trail.dependencies().tracks().copied());
            }

            let result = host.calculate_world_transforms(&EvaluationRequest {
                frames: &frames,
                indices: &batch.indices_to_calculate,
                objects: &objects,
                dependent_tracks: &dependent_tracks,
            });

            for id in &self.evaluating {
                let Some(trail) = trails.get_mut(id) else {
                    continue;
                };
                if let Some(values) = result.objects.get(trail.object()) {
                    for (&index, transform) in batch.indices_to_calculate.iter().zip(values) {
                        trail.write_sample(index, *transform);
                    }
                    evaluated.push(*id);
                }
                if let Some(values) = trail.space().and_then(|space| result.objects.get(space)) {
                    for (&index, transform) in batch.indices_to_calculate.iter().zip(values) {
                        trail.write_space_sample(index, *transform);
                    }
                }
            }

            for (rig, values) in &result.rig_parents {
                if let Some(parent) = self.rig_parents.get(rig) {
                    let mut parent = parent.borrow_mut();
                    for (&index, transform) in batch.indices_to_calculate.iter().zip(values) {
                        parent.set(index, *transform);
                    }
                }
            }
        }

        for id in &self.evaluating {
            if let Some(trail) = trails.get_mut(id) {
                trail.update_finished(batch.done);
            }
        }
        if batch.done {
            tracing::debug!(trails = self.evaluating.len(), "Trail evaluation finished");
            self.evaluating.clear();
        }

        EngineTick {
            indices: batch.indices_to_calculate,
            trails: evaluated,
            done: batch.done,
            skipped: false,
        }
    }

    /// Adopt a new frame layout; every live trail is invalidated.
    ///
    /// Trails that had been scanned are rescheduled here. Trails still stale
    /// keep whatever scheduling their owner gave them.
    fn relayout(&mut self, frames: FrameTimeByIndex, trails: &mut IndexMap<TrailId, Trail>) {
        tracing::debug!(
            start = frames.start.0,
            end = frames.end.0,
            step = frames.step.0,
            count = frames.count,
            "Trail frame layout changed"
        );
        self.frames = Some(frames);
        for (id, trail) in trails.iter_mut() {
            trail.resize(frames.count);
            let state = trail.state();
            if state != CacheState::Dead {
                trail.apply(CacheEvent::Invalidated);
                if state != CacheState::Stale {
                    self.evaluating.insert(*id);
                }
            }
        }
        for parent in self.rig_parents.values() {
            parent.borrow_mut().resize(frames.count);
        }
        self.scheduler.cancel();
    }

    /// View and evaluation bounds plus key times of the trails being evaluated
    fn must_have_indices(
        &self,
        frames: &FrameTimeByIndex,
        ctx: &TickContext,
        trails: &IndexMap<TrailId, Trail>,
    ) -> Vec<usize> {
        let mut must_have = vec![
            frames.index(ctx.view_range.start),
            frames.index(ctx.view_range.end),
            0,
            frames.count - 1,
        ];
        for trail in self.evaluating.iter().filter_map(|id| trails.get(id)) {
            must_have.extend(
                trail
                    .important_frames()
                    .iter()
                    .filter(|f| frames.contains(**f))
                    .map(|f| frames.index(*f)),
            );
        }
        must_have
    }

    /// Visible indices first, then the rest of the range before and after
    fn ranges(frames: &FrameTimeByIndex, view_range: FrameRange) -> Vec<(usize, usize)> {
        let last = frames.count - 1;
        match frames.index_range(view_range) {
            Some((first, end)) => {
                let mut ranges = vec![(first, end)];
                if first > 0 {
                    ranges.push((0, first - 1));
                }
                if end < last {
                    ranges.push((end + 1, last));
                }
                ranges
            }
            None => vec![(0, last)],
        }
    }
}
