// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion trail options.
//!
//! This module holds the user-facing trail settings:
//! - Visibility and drawing style
//! - How much of the timeline a trail covers
//! - Sampling budget per tick
//! - Pinned trails restored across editing sessions
//!
//! Options are handed to the trail hierarchy when it is created and are
//! stored as RON next to the other editor settings.

use crate::error::Result;
use crate::object::{TrailId, TrailObject};
use ordoplay_editor_sequencer::Transform;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default maximum number of pinned trails
pub const DEFAULT_MAX_PINNED: usize = 10;

/// Default number of frame indices evaluated per bucket
pub const DEFAULT_INDICES_PER_BUCKET: usize = 60;

/// Options file name
pub const OPTIONS_FILE_NAME: &str = "motion_trails.ron";

/// How trail segments are coloured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrailStyle {
    /// One colour for the whole trail
    #[default]
    Default,
    /// Alternating drawn and skipped segments
    Dashed,
    /// Different colours before and after the current frame
    Time,
    /// Coloured by speed, slow to fast
    HeatMap,
}

impl TrailStyle {
    /// Get display name for this style
    pub fn display_name(&self) -> &'static str {
        match self {
            TrailStyle::Default => "Default",
            TrailStyle::Dashed => "Dashed",
            TrailStyle::Time => "Time",
            TrailStyle::HeatMap => "Heat Map",
        }
    }

    /// Get all available styles
    pub fn all() -> &'static [TrailStyle] {
        &[
            TrailStyle::Default,
            TrailStyle::Dashed,
            TrailStyle::Time,
            TrailStyle::HeatMap,
        ]
    }
}

/// A pinned trail remembered between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedTrail {
    /// Trail identity
    pub id: TrailId,
    /// Display name
    pub name: String,
    /// Trail colour
    pub color: [u8; 3],
    /// Whether the trail had an offset applied
    pub has_offset: bool,
    /// Followed object
    pub object: TrailObject,
    /// The offset, when `has_offset` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Transform>,
}

/// Motion trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailOptions {
    /// Draw trails at all
    pub show_trails: bool,
    /// Segment colouring
    pub trail_style: TrailStyle,
    /// Cover the whole evaluation range instead of a window around the current frame
    pub show_full_trail: bool,
    /// Display frames shown before the current frame
    pub frames_before: i32,
    /// Display frames shown after the current frame
    pub frames_after: i32,
    /// Maximum number of pinned trails
    pub max_pinned: usize,
    /// Frame indices evaluated per bucket and tick
    pub indices_per_bucket: usize,
    /// Draw editable keys
    pub show_keys: bool,
    /// Draw frame tick marks
    pub show_ticks: bool,
    /// Display frames between tick marks
    pub tick_step: i32,
    /// Screen-space length of a tick mark
    pub tick_size: f32,
    /// Trail colour when nothing else applies
    pub default_color: [u8; 3],
    /// Colour of selected keys
    pub selected_color: [u8; 3],
    /// Time style colour before the current frame
    pub time_pre_color: [u8; 3],
    /// Time style colour after the current frame
    pub time_post_color: [u8; 3],
    /// Colour for trails still being evaluated
    pub inactive_color: [u8; 3],
    /// Pinned trails to restore
    pub pinned: Vec<PinnedTrail>,
}

impl Default for TrailOptions {
    fn default() -> Self {
        Self {
            show_trails: true,
            trail_style: TrailStyle::Default,
            show_full_trail: true,
            frames_before: 30,
            frames_after: 30,
            max_pinned: DEFAULT_MAX_PINNED,
            indices_per_bucket: DEFAULT_INDICES_PER_BUCKET,
            show_keys: true,
            show_ticks: true,
            tick_step: 1,
            tick_size: 4.0,
            default_color: [255, 255, 255],
            selected_color: [255, 200, 0],
            time_pre_color: [255, 80, 80],
            time_post_color: [80, 160, 255],
            inactive_color: [128, 128, 128],
            pinned: Vec::new(),
        }
    }
}

impl TrailOptions {
    /// Parse options from RON
    pub fn from_ron(content: &str) -> Result<Self> {
        let mut options: TrailOptions = ron::from_str(content)?;
        options.sanitize();
        Ok(options)
    }

    /// Write options as pretty RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load options from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options = Self::from_ron(&content)?;
        tracing::info!("Loaded motion trail options from {:?}", path);
        Ok(options)
    }

    /// Save options to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_ron()?;
        std::fs::write(path, content)?;
        tracing::info!("Saved motion trail options to {:?}", path);
        Ok(())
    }

    /// Clamp values that would stall sampling or drawing
    fn sanitize(&mut self) {
        self.indices_per_bucket = self.indices_per_bucket.max(1);
        self.tick_step = self.tick_step.max(1);
        self.frames_before = self.frames_before.max(0);
        self.frames_after = self.frames_after.max(0);
        if self.pinned.len() > self.max_pinned {
            tracing::warn!(
                "Dropping {} pinned trails over the limit of {}",
                self.pinned.len() - self.max_pinned,
                self.max_pinned
            );
            self.pinned.truncate(self.max_pinned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_editor_sequencer::EntityId;

    #[test]
    fn test_default_options() {
        let options = TrailOptions::default();
        assert_eq!(options.max_pinned, 10);
        assert_eq!(options.indices_per_bucket, 60);
        assert!(options.pinned.is_empty());
    }

    #[test]
    fn test_serialization() {
        let mut options = TrailOptions {
            trail_style: TrailStyle::HeatMap,
            ..TrailOptions::default()
        };
        options.pinned.push(PinnedTrail {
            id: TrailId::new(),
            name: "Cube".to_string(),
            color: [1, 2, 3],
            has_offset: true,
            object: TrailObject::Actor(EntityId::new()),
            offset: Some(Transform::from_translation([0.0, 0.0, 10.0])),
        });

        let ron_str = options.to_ron().unwrap();
        let loaded = TrailOptions::from_ron(&ron_str).unwrap();
        assert_eq!(loaded.trail_style, TrailStyle::HeatMap);
        assert_eq!(loaded.pinned, options.pinned);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = TrailOptions::from_ron("(show_trails: false, indices_per_bucket: 0)").unwrap();
        assert!(!loaded.show_trails);
        assert_eq!(loaded.indices_per_bucket, 1);
        assert_eq!(loaded.max_pinned, DEFAULT_MAX_PINNED);
    }

    #[test]
    fn test_pinned_list_is_capped_on_load() {
        let mut options = TrailOptions {
            max_pinned: 1,
            ..TrailOptions::default()
        };
        for _ in 0..3 {
            options.pinned.push(PinnedTrail {
                id: TrailId::new(),
                name: "Pin".to_string(),
                color: [0, 0, 0],
                has_offset: false,
                object: TrailObject::Actor(EntityId::new()),
                offset: None,
            });
        }
        let loaded = TrailOptions::from_ron(&options.to_ron().unwrap()).unwrap();
        assert_eq!(loaded.pinned.len(), 1);
    }
}
