// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selecting and editing the transform keys shown on a trail.
//!
//! Keys are the union of key times on the location channels. Edits go
//! through the host's transform section and then force the trail to
//! re-evaluate, since the edit itself only changes the track signature.

use crate::display::{TrailDrawInterface, TrailHit, TrailProjection};
use crate::error::{Result, TrailError};
use crate::frame_index::FrameTimeByIndex;
use crate::hierarchy::TrailHierarchy;
use crate::host::KeyEditingHost;
use crate::object::{TrailId, TrailObject};
use crate::options::TrailOptions;
use crate::trail::Trail;
use egui::{Color32, Pos2, Rect};
use ordoplay_editor_sequencer::{FrameNumber, FrameRate, TransformSection};
use std::collections::BTreeSet;

/// How a pick changes the key selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Replace the selection
    #[default]
    Replace,
    /// Add to the selection
    Add,
    /// Remove from the selection
    Remove,
    /// Toggle selection state
    Toggle,
}

const KEY_SIZE: f32 = 6.0;

/// Key time on the location channels at `frame`, or one tick either side
pub fn find_key_time(section: &TransformSection, frame: FrameNumber) -> Option<FrameNumber> {
    [frame, frame + FrameNumber(1), frame - FrameNumber(1)]
        .into_iter()
        .find(|candidate| {
            section
                .location_channels()
                .iter()
                .any(|c| c.key_index_at(*candidate).is_some())
        })
}

/// Editable keys of one trail
#[derive(Debug, Clone)]
pub struct KeyEditingOverlay {
    trail: TrailId,
    object: TrailObject,
    keys: Vec<FrameNumber>,
    selected: BTreeSet<FrameNumber>,
}

impl KeyEditingOverlay {
    /// Create an overlay for `trail`; call [`KeyEditingOverlay::build_keys`] to fill it
    pub fn new(trail: &Trail) -> Self {
        Self {
            trail: trail.id(),
            object: trail.object().clone(),
            keys: Vec::new(),
            selected: BTreeSet::new(),
        }
    }

    /// Trail being edited
    pub fn trail(&self) -> TrailId {
        self.trail
    }

    /// Key times (ticks), ascending
    pub fn keys(&self) -> &[FrameNumber] {
        &self.keys
    }

    /// Selected key times (ticks)
    pub fn selected_keys(&self) -> impl Iterator<Item = &FrameNumber> {
        self.selected.iter()
    }

    /// Whether a key is selected
    pub fn is_selected(&self, frame: FrameNumber) -> bool {
        self.selected.contains(&frame)
    }

    /// Read key times from the object's transform section.
    ///
    /// Selected keys that no longer exist drop out of the selection.
    pub fn build_keys(&mut self, host: &impl KeyEditingHost) -> Result<usize> {
        let section = host
            .transform_section(&self.object)
            .ok_or(TrailError::NoTransformTrack(self.trail))?;
        self.keys = Self::key_times(section);
        let keys = &self.keys;
        self.selected.retain(|frame| keys.binary_search(frame).is_ok());
        Ok(self.keys.len())
    }

    fn key_times(section: &TransformSection) -> Vec<FrameNumber> {
        let mut keys: Vec<FrameNumber> = section
            .location_channels()
            .iter()
            .flat_map(|c| c.keys().iter().map(|k| k.time))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Displayed key positions, interpolated along the trail
    pub fn key_positions(
        &self,
        trail: &Trail,
        frames: &FrameTimeByIndex,
        current_index: usize,
    ) -> Vec<(FrameNumber, [f64; 3])> {
        let seconds: Vec<f64> = self
            .keys
            .iter()
            .map(|&frame| frames.tick_resolution.as_seconds(frame))
            .collect();
        self.keys
            .iter()
            .zip(trail.interpolate_all(&seconds, frames, current_index))
            .map(|(&frame, t)| (frame, t.translation))
            .collect()
    }

    /// Closest key within `radius` pixels of `pointer`
    pub fn hit_test(
        &self,
        view: &dyn TrailProjection,
        positions: &[(FrameNumber, [f64; 3])],
        pointer: Pos2,
        radius: f32,
    ) -> Option<FrameNumber> {
        positions
            .iter()
            .filter_map(|(frame, position)| {
                let distance = view.project(*position)?.distance(pointer);
                (distance <= radius).then_some((*frame, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(frame, _)| frame)
    }

    fn apply(&mut self, frame: FrameNumber, mode: SelectMode) {
        match mode {
            SelectMode::Replace | SelectMode::Add => {
                self.selected.insert(frame);
            }
            SelectMode::Remove => {
                self.selected.remove(&frame);
            }
            SelectMode::Toggle => {
                if !self.selected.remove(&frame) {
                    self.selected.insert(frame);
                }
            }
        }
    }

    /// Apply a click; a click on empty space with `Replace` clears the selection
    pub fn handle_click(&mut self, hit: Option<FrameNumber>, mode: SelectMode) -> bool {
        let before = self.selected.clone();
        if mode == SelectMode::Replace {
            self.selected.clear();
        }
        if let Some(frame) = hit.filter(|f| self.keys.contains(f)) {
            self.apply(frame, mode);
        }
        before != self.selected
    }

    /// Select keys whose projection lies in a screen rectangle
    pub fn box_select(
        &mut self,
        view: &dyn TrailProjection,
        positions: &[(FrameNumber, [f64; 3])],
        rect: Rect,
        mode: SelectMode,
    ) -> usize {
        self.select_where(positions, mode, |position| {
            view.project(position).is_some_and(|p| rect.contains(p))
        })
    }

    /// Select keys inside a view frustum
    pub fn frustum_select(
        &mut self,
        positions: &[(FrameNumber, [f64; 3])],
        inside: impl Fn([f64; 3]) -> bool,
        mode: SelectMode,
    ) -> usize {
        self.select_where(positions, mode, inside)
    }

    fn select_where(
        &mut self,
        positions: &[(FrameNumber, [f64; 3])],
        mode: SelectMode,
        inside: impl Fn([f64; 3]) -> bool,
    ) -> usize {
        if mode == SelectMode::Replace {
            self.selected.clear();
        }
        let mut count = 0;
        for (frame, position) in positions {
            if inside(*position) {
                self.apply(*frame, mode);
                count += 1;
            }
        }
        count
    }

    /// Resolve every selected key before any edit happens
    fn resolve_selection(&self, section: &TransformSection) -> Result<Vec<FrameNumber>> {
        if self.selected.is_empty() {
            return Err(TrailError::NoKeysSelected);
        }
        self.selected
            .iter()
            .map(|&frame| find_key_time(section, frame).ok_or(TrailError::KeyNotFound(frame)))
            .collect()
    }

    /// Move selected keys by `direction` display frames
    pub fn translate_selected_keys(
        &mut self,
        host: &mut impl KeyEditingHost,
        hierarchy: &mut TrailHierarchy,
        direction: i32,
    ) -> Result<usize> {
        let delta = FrameRate::transform_time(FrameNumber(direction), host.display_rate(), host.tick_resolution());
        let section = host
            .transform_section_mut(&self.object)
            .ok_or(TrailError::NoTransformTrack(self.trail))?;
        let mut frames = self.resolve_selection(section)?;

        // Move the leading key first so no key lands on one still to be moved
        if delta.0 > 0 {
            frames.reverse();
        }
        let mut moved = BTreeSet::new();
        for frame in frames {
            let target = frame + delta;
            for channel in &mut section.channels_mut()[TransformSection::LOCATION_X..TransformSection::ROTATION_X] {
                channel.move_key(frame, target);
            }
            section.expand_to_frame(target);
            moved.insert(target);
        }

        self.keys = Self::key_times(section);
        self.selected = moved;
        tracing::debug!(trail = %self.trail, count = self.selected.len(), delta = delta.0, "Moved trail keys");
        hierarchy.force_evaluate(self.trail)?;
        Ok(self.selected.len())
    }

    /// Delete selected keys
    pub fn delete_selected_keys(&mut self, host: &mut impl KeyEditingHost, hierarchy: &mut TrailHierarchy) -> Result<usize> {
        let section = host
            .transform_section_mut(&self.object)
            .ok_or(TrailError::NoTransformTrack(self.trail))?;
        let frames = self.resolve_selection(section)?;

        for frame in &frames {
            for channel in &mut section.channels_mut()[TransformSection::LOCATION_X..TransformSection::ROTATION_X] {
                channel.remove_key_at(*frame);
            }
        }

        self.keys = Self::key_times(section);
        self.selected.clear();
        tracing::debug!(trail = %self.trail, count = frames.len(), "Deleted trail keys");
        hierarchy.force_evaluate(self.trail)?;
        Ok(frames.len())
    }

    /// Draw keys as points that can be clicked
    pub fn render(
        &self,
        positions: &[(FrameNumber, [f64; 3])],
        options: &TrailOptions,
        draw: &mut dyn TrailDrawInterface,
    ) {
        if !options.show_keys {
            return;
        }
        for (frame, position) in positions {
            let color = if self.is_selected(*frame) {
                options.selected_color
            } else {
                options.default_color
            };
            draw.draw_point(
                *position,
                Color32::from_rgb(color[0], color[1], color[2]),
                KEY_SIZE,
                Some(TrailHit::Key {
                    trail: self.trail,
                    frame: *frame,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TickContext;
    use crate::host::{Scene, SequenceHost};
    use crate::trail::CacheState;
    use ordoplay_editor_sequencer::{EntityId, FrameRange, Sequence, Track, Transform};

    struct TopDown;

    impl TrailProjection for TopDown {
        fn project(&self, point: [f64; 3]) -> Option<Pos2> {
            Some(Pos2::new(point[0] as f32, point[1] as f32))
        }
    }

    struct Fixture {
        host: SequenceHost,
        hierarchy: TrailHierarchy,
        overlay: KeyEditingOverlay,
        actor: EntityId,
    }

    /// Keys at frames 0, 10, 20 moving along x from 0 to 100
    fn fixture() -> Fixture {
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

        let host = SequenceHost::new(sequence, scene);
        let mut hierarchy = TrailHierarchy::default();
        let id = hierarchy.sync_selection(&[TrailObject::Actor(actor)])[0];
        let mut overlay = KeyEditingOverlay::new(hierarchy.trail(id).unwrap());
        overlay.build_keys(&host).unwrap();
        Fixture {
            host,
            hierarchy,
            overlay,
            actor,
        }
    }

    fn evaluate(f: &mut Fixture) {
        let ctx = TickContext::for_sequence(f.host.sequence(), FrameNumber(0));
        f.hierarchy.update(&mut f.host, &ctx);
        f.hierarchy.update(&mut f.host, &ctx);
    }

    fn section(f: &Fixture) -> &TransformSection {
        f.host.transform_section(&TrailObject::Actor(f.actor)).unwrap()
    }

    #[test]
    fn test_build_keys_dedups_channel_times() {
        let f = fixture();
        assert_eq!(f.overlay.keys(), &[FrameNumber(0), FrameNumber(10), FrameNumber(20)]);
    }

    #[test]
    fn test_find_key_time_probes_neighbours() {
        let f = fixture();
        assert_eq!(find_key_time(section(&f), FrameNumber(11)), Some(FrameNumber(10)));
        assert_eq!(find_key_time(section(&f), FrameNumber(9)), Some(FrameNumber(10)));
        assert_eq!(find_key_time(section(&f), FrameNumber(12)), None);
    }

    #[test]
    fn test_key_positions_follow_trail() {
        let mut f = fixture();
        evaluate(&mut f);
        let trail = f.hierarchy.trail(f.overlay.trail()).unwrap();
        let frames = f.hierarchy.frames().unwrap();
        let positions = f.overlay.key_positions(trail, frames, 0);
        assert_eq!(positions.len(), 3);
        assert!((positions[1].1[0] - 50.0).abs() < 1e-9);

        let hit = f.overlay.hit_test(&TopDown, &positions, Pos2::new(52.0, 1.0), 5.0);
        assert_eq!(hit, Some(FrameNumber(10)));
        assert_eq!(f.overlay.hit_test(&TopDown, &positions, Pos2::new(75.0, 0.0), 5.0), None);
    }

    #[test]
    fn test_click_modes() {
        let mut f = fixture();
        assert!(f.overlay.handle_click(Some(FrameNumber(0)), SelectMode::Replace));
        f.overlay.handle_click(Some(FrameNumber(10)), SelectMode::Add);
        assert!(f.overlay.is_selected(FrameNumber(0)) && f.overlay.is_selected(FrameNumber(10)));
        f.overlay.handle_click(Some(FrameNumber(0)), SelectMode::Toggle);
        assert!(!f.overlay.is_selected(FrameNumber(0)));
        f.overlay.handle_click(Some(FrameNumber(10)), SelectMode::Remove);
        assert_eq!(f.overlay.selected_keys().count(), 0);
        f.overlay.handle_click(Some(FrameNumber(20)), SelectMode::Add);
        assert!(f.overlay.handle_click(None, SelectMode::Replace));
        assert_eq!(f.overlay.selected_keys().count(), 0);
    }

    #[test]
    fn test_box_and_frustum_select() {
        let mut f = fixture();
        evaluate(&mut f);
        let trail = f.hierarchy.trail(f.overlay.trail()).unwrap();
        let positions = f.overlay.key_positions(trail, f.hierarchy.frames().unwrap(), 0);

        let rect = Rect::from_min_max(Pos2::new(40.0, -5.0), Pos2::new(120.0, 5.0));
        assert_eq!(f.overlay.box_select(&TopDown, &positions, rect, SelectMode::Replace), 2);
        assert!(!f.overlay.is_selected(FrameNumber(0)));

        assert_eq!(f.overlay.frustum_select(&positions, |p| p[0] < 1.0, SelectMode::Replace), 1);
        assert!(f.overlay.is_selected(FrameNumber(0)));
        assert!(!f.overlay.is_selected(FrameNumber(10)));
    }

    #[test]
    fn test_translate_selected_keys() {
        let mut f = fixture();
        evaluate(&mut f);
        f.overlay.handle_click(Some(FrameNumber(10)), SelectMode::Replace);
        let moved = f
            .overlay
            .translate_selected_keys(&mut f.host, &mut f.hierarchy, -1)
            .unwrap();
        assert_eq!(moved, 1);
        assert_eq!(f.overlay.keys(), &[FrameNumber(0), FrameNumber(9), FrameNumber(20)]);
        assert!(f.overlay.is_selected(FrameNumber(9)));
        assert_eq!(section(&f).location_channels()[0].evaluate(FrameNumber(9)), Some(50.0));
        let trail = f.hierarchy.trail(f.overlay.trail()).unwrap();
        assert_eq!(trail.state(), CacheState::Stale);
    }

    #[test]
    fn test_translate_adjacent_keys_keeps_both() {
        let mut f = fixture();
        f.host
            .transform_section_mut(&TrailObject::Actor(f.actor))
            .unwrap()
            .set_location_key(FrameNumber(11), [60.0, 0.0, 0.0]);
        f.overlay.build_keys(&f.host).unwrap();
        f.overlay.handle_click(Some(FrameNumber(10)), SelectMode::Replace);
        f.overlay.handle_click(Some(FrameNumber(11)), SelectMode::Add);

        f.overlay.translate_selected_keys(&mut f.host, &mut f.hierarchy, 1).unwrap();
        assert_eq!(
            f.overlay.keys(),
            &[FrameNumber(0), FrameNumber(11), FrameNumber(12), FrameNumber(20)]
        );
        assert_eq!(section(&f).location_channels()[0].evaluate(FrameNumber(12)), Some(60.0));
    }

    #[test]
    fn test_delete_selected_keys() {
        let mut f = fixture();
        f.overlay.handle_click(Some(FrameNumber(0)), SelectMode::Replace);
        let deleted = f.overlay.delete_selected_keys(&mut f.host, &mut f.hierarchy).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(f.overlay.keys(), &[FrameNumber(10), FrameNumber(20)]);
        assert_eq!(f.overlay.selected_keys().count(), 0);
    }

    #[test]
    fn test_edit_without_selection_fails() {
        let mut f = fixture();
        assert!(matches!(
            f.overlay.delete_selected_keys(&mut f.host, &mut f.hierarchy),
            Err(TrailError::NoKeysSelected)
        ));
        assert_eq!(f.overlay.keys().len(), 3);
    }

    #[test]
    fn test_object_without_transform_track() {
        let mut scene = Scene::new();
        let actor = scene.spawn("Static", Transform::IDENTITY);
        let host = SequenceHost::new(Sequence::new("Shot"), scene);
        let trail = Trail::new(TrailObject::Actor(actor), "Static", [0, 0, 0]);
        let mut overlay = KeyEditingOverlay::new(&trail);
        assert!(matches!(
            overlay.build_keys(&host),
            Err(TrailError::NoTransformTrack(_))
        ));
    }
}
