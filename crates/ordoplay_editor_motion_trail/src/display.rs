// SPDX-License-Identifier: MIT OR Apache-2.0
//! Turning cached samples into drawable trail geometry.

use crate::engine::TickContext;
use crate::frame_index::FrameTimeByIndex;
use crate::hierarchy::TrailHierarchy;
use crate::object::TrailId;
use crate::options::{TrailOptions, TrailStyle};
use crate::trail::{CacheState, Trail};
use egui::{Color32, Pos2, Vec2};
use ordoplay_editor_sequencer::{FrameNumber, FrameRange, FrameRate};

/// World to screen mapping of the viewport being drawn
pub trait TrailProjection {
    /// Screen position of a world point; `None` when behind the camera
    fn project(&self, point: [f64; 3]) -> Option<Pos2>;
}

/// What a drawn element selects when clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailHit {
    /// The trail line
    Trail(TrailId),
    /// A key on a trail
    Key {
        /// Owning trail
        trail: TrailId,
        /// Key time (ticks)
        frame: FrameNumber,
    },
}

/// Sink for trail drawing
pub trait TrailDrawInterface {
    /// World-space line segment
    fn draw_line(&mut self, from: [f64; 3], to: [f64; 3], color: Color32, thickness: f32, hit: Option<TrailHit>);
    /// World-space point
    fn draw_point(&mut self, at: [f64; 3], color: Color32, size: f32, hit: Option<TrailHit>);
    /// Screen-space line segment
    fn draw_screen_line(&mut self, from: Pos2, to: Pos2, color: Color32);
}

/// A displayed trail sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    /// Displayed position
    pub position: [f64; 3],
    /// Sample time (ticks)
    pub frame: FrameNumber,
    /// Sample index
    pub index: usize,
}

/// Everything needed to draw one trail
#[derive(Debug, Clone, Copy)]
pub struct DisplayContext<'a> {
    /// Frame layout of the samples
    pub frames: &'a FrameTimeByIndex,
    /// Frames to draw (ticks)
    pub range: FrameRange,
    /// Current time (ticks)
    pub current_frame: FrameNumber,
    /// Distance between ticks (ticks)
    pub tick_step: FrameNumber,
    /// Drawing options
    pub options: &'a TrailOptions,
    /// Draw greyed out
    pub inactive: bool,
    /// Draw with the selection colour
    pub selected: bool,
}

impl DisplayContext<'_> {
    fn current_index(&self) -> usize {
        self.frames.index(self.current_frame)
    }
}

const TRAIL_THICKNESS: f32 = 2.0;
const HEAT_SLOW: [u8; 3] = [40, 90, 255];
const HEAT_FAST: [u8; 3] = [255, 60, 40];

fn rgb(color: [u8; 3]) -> Color32 {
    Color32::from_rgb(color[0], color[1], color[2])
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2) + (b[2] - a[2]).powi(2)).sqrt()
}

fn lerp_color(a: [u8; 3], b: [u8; 3], t: f64) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let channel = |i: usize| (f64::from(a[i]) + (f64::from(b[i]) - f64::from(a[i])) * t).round() as u8;
    Color32::from_rgb(channel(0), channel(1), channel(2))
}

impl Trail {
    /// Displayed samples inside `range`, in time order
    pub fn trajectory_points_for_display(
        &self,
        frames: &FrameTimeByIndex,
        range: FrameRange,
        current_index: usize,
    ) -> Vec<TrailPoint> {
        self.valid_indices()
            .into_iter()
            .filter(|&index| range.contains(frames.frame(index)))
            .filter_map(|index| {
                self.display_at(index, current_index).map(|t| TrailPoint {
                    position: t.translation,
                    frame: frames.frame(index),
                    index,
                })
            })
            .collect()
    }

    /// Screen-space tick marks every `tick_step`, perpendicular to the trail
    pub fn tick_points_for_display(
        &self,
        view: &dyn TrailProjection,
        ctx: &DisplayContext<'_>,
    ) -> Vec<(Pos2, Pos2)> {
        let points = self.trajectory_points_for_display(ctx.frames, ctx.range, ctx.current_index());
        let step = ctx.tick_step.0.max(1);
        let half = ctx.options.tick_size / 2.0;

        let mut ticks = Vec::new();
        for (i, point) in points.iter().enumerate() {
            if (point.frame.0 - ctx.frames.start.0).rem_euclid(step) != 0 {
                continue;
            }
            let neighbour = points.get(i + 1).or_else(|| i.checked_sub(1).and_then(|p| points.get(p)));
            let (Some(neighbour), Some(at)) = (neighbour, view.project(point.position)) else {
                continue;
            };
            let Some(other) = view.project(neighbour.position) else {
                continue;
            };
            let along = other - at;
            if along.length_sq() <= f32::EPSILON {
                continue;
            }
            let normal = Vec2::new(-along.y, along.x).normalized() * half;
            ticks.push((at - normal, at + normal));
        }
        ticks
    }

    /// Draw the trail line and its ticks; returns the number of segments drawn
    pub fn render(&self, view: &dyn TrailProjection, draw: &mut dyn TrailDrawInterface, ctx: &DisplayContext<'_>) -> usize {
        let points = self.trajectory_points_for_display(ctx.frames, ctx.range, ctx.current_index());
        let hit = Some(TrailHit::Trail(self.id()));
        let options = ctx.options;
        let base = if ctx.selected { options.selected_color } else { self.color };

        if let [only] = points.as_slice() {
            let color = if ctx.inactive { rgb(options.inactive_color) } else { rgb(base) };
            draw.draw_point(only.position, color, TRAIL_THICKNESS * 2.0, hit);
            return 0;
        }

        let max_speed = points
            .windows(2)
            .map(|w| speed(&w[0], &w[1], ctx.frames.tick_resolution))
            .fold(0.0_f64, f64::max);

        let mut drawn = 0;
        for (segment, pair) in points.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            let color = if ctx.inactive {
                rgb(options.inactive_color)
            } else {
                match options.trail_style {
                    TrailStyle::Default => rgb(base),
                    TrailStyle::Dashed => {
                        if segment % 2 == 1 {
                            continue;
                        }
                        rgb(base)
                    }
                    TrailStyle::Time => {
                        if b.frame <= ctx.current_frame {
                            rgb(options.time_pre_color)
                        } else {
                            rgb(options.time_post_color)
                        }
                    }
                    TrailStyle::HeatMap => {
                        let t = if max_speed > 0.0 {
                            speed(a, b, ctx.frames.tick_resolution) / max_speed
                        } else {
                            0.0
                        };
                        lerp_color(HEAT_SLOW, HEAT_FAST, t)
                    }
                }
            };
            draw.draw_line(a.position, b.position, color, TRAIL_THICKNESS, hit);
            drawn += 1;
        }

        if options.show_ticks {
            let color = if ctx.inactive { rgb(options.inactive_color) } else { rgb(base) };
            for (from, to) in self.tick_points_for_display(view, ctx) {
                draw.draw_screen_line(from, to, color);
            }
        }
        drawn
    }
}

fn speed(a: &TrailPoint, b: &TrailPoint, rate: FrameRate) -> f64 {
    let seconds = rate.as_seconds(b.frame) - rate.as_seconds(a.frame);
    if seconds <= 0.0 {
        return 0.0;
    }
    distance(a.position, b.position) / seconds
}

impl TrailHierarchy {
    /// Draw every visible trail; returns the number of trails drawn
    pub fn render(&self, view: &dyn TrailProjection, draw: &mut dyn TrailDrawInterface, ctx: &TickContext) -> usize {
        if !self.options().show_trails {
            return 0;
        }
        let Some(frames) = self.frames() else {
            return 0;
        };
        let tick_step = FrameRate::transform_time(
            FrameNumber(self.options().tick_step),
            ctx.display_rate,
            ctx.tick_resolution,
        );
        let range = self.display_range(ctx);

        let mut drawn = 0;
        for trail in self.trails() {
            let id = trail.id();
            if trail.state() == CacheState::Dead || !self.is_visible(id) {
                continue;
            }
            let display = DisplayContext {
                frames,
                range,
                current_frame: ctx.current_frame,
                tick_step,
                options: self.options(),
                inactive: self.is_inactive(id),
                selected: self.is_selected(id),
            };
            trail.render(view, draw, &display);
            drawn += 1;
        }
        drawn
    }
}
