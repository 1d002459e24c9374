use image::RgbaImage;
use std::collections::VecDeque;

use crate::color::Color;
use crate::history::HistoryManager;
use crate::mapper::{self, Uv};
use crate::mask::Mask;
use crate::raster::{self, Scratch};
use crate::sticker::Sticker;
use crate::surface::{Composite, SurfaceBuffer};
use crate::tools::Tool;

pub const DEFAULT_MAX_UV_DISTANCE: f32 = 0.1;
/// Screen pixels per millisecond.
pub const DEFAULT_MAX_VELOCITY: f32 = 2.0;
pub const DEFAULT_VELOCITY_WINDOW: usize = 5;

// ============================================================================
// BRUSH SETTINGS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct BrushSettings {
    pub brush_size: f32,
    /// The eraser keeps its own size and always works at full opacity.
    pub eraser_size: f32,
    pub opacity: f32,
    pub color: Color,
    pub sticker_size: u32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            brush_size: 20.0,
            eraser_size: 30.0,
            opacity: 1.0,
            color: Color::new(255, 0, 0),
            sticker_size: 100,
        }
    }
}

/// Rate limits deciding between a connecting line and a single stamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeLimits {
    pub max_uv_distance: f32,
    pub max_velocity: f32,
}

impl Default for StrokeLimits {
    fn default() -> Self {
        Self {
            max_uv_distance: DEFAULT_MAX_UV_DISTANCE,
            max_velocity: DEFAULT_MAX_VELOCITY,
        }
    }
}

// ============================================================================
// VELOCITY TRACKING
// ============================================================================

/// Pointer position in screen pixels with its timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ScreenSample {
    pub x: f32,
    pub y: f32,
    pub time_ms: f64,
}

/// Rolling window of the most recent pointer samples.
#[derive(Clone, Debug)]
pub struct VelocityTracker {
    samples: VecDeque<ScreenSample>,
    window: usize,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_VELOCITY_WINDOW)
    }
}

impl VelocityTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn push(&mut self, sample: ScreenSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Average speed between the oldest and newest sample, in px/ms.
    /// Zero with fewer than two samples or no elapsed time.
    pub fn velocity(&self) -> f32 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let dt = last.time_ms - first.time_ms;
        if dt == 0.0 {
            return 0.0;
        }
        let dx = last.x - first.x;
        let dy = last.y - first.y;
        ((dx * dx + dy * dy).sqrt() as f64 / dt) as f32
    }
}

// ============================================================================
// STROKE SESSION
// ============================================================================

/// Per-gesture state.  `last_point == None` means the next accepted sample
/// begins a new stroke.
#[derive(Clone, Debug, Default)]
pub struct StrokeSession {
    pub active: bool,
    pub last_point: Option<Uv>,
    pub tracker: VelocityTracker,
    /// A sticker was already placed during this gesture.
    pub sticker_placed: bool,
}

/// Everything a commit reads or writes.
pub struct CommitTarget<'a> {
    pub surface: &'a mut SurfaceBuffer,
    pub history: &'a mut HistoryManager,
    /// Pristine base texture at surface resolution.
    pub base: &'a RgbaImage,
    /// `None` means unrestricted.
    pub mask: Option<&'a Mask>,
}

/// What a single accepted sample did to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeOutcome {
    /// First sample of a stroke: one dot.
    Dot,
    /// Connected to the previous point.
    Line,
    /// A rate limit failed; only the current point was stamped.
    Stamp,
    Sticker,
    /// Erase start point lies outside the active mask.
    Suppressed,
    /// Nothing to do for this tool or state.
    Ignored,
}

// ============================================================================
// STROKE ENGINE
// ============================================================================

pub struct StrokeEngine {
    paint_limits: StrokeLimits,
    erase_limits: StrokeLimits,
    sticker_repeat_on_drag: bool,
    session: StrokeSession,
}

impl Default for StrokeEngine {
    fn default() -> Self {
        Self::new(StrokeLimits::default(), StrokeLimits::default(), DEFAULT_VELOCITY_WINDOW)
    }
}

impl StrokeEngine {
    pub fn new(paint_limits: StrokeLimits, erase_limits: StrokeLimits, velocity_window: usize) -> Self {
        Self {
            paint_limits,
            erase_limits,
            sticker_repeat_on_drag: false,
            session: StrokeSession {
                tracker: VelocityTracker::new(velocity_window),
                ..Default::default()
            },
        }
    }

    /// Place a sticker on every accepted move instead of once per gesture.
    pub fn with_sticker_repeat(mut self, repeat: bool) -> Self {
        self.sticker_repeat_on_drag = repeat;
        self
    }

    pub fn session(&self) -> &StrokeSession {
        &self.session
    }

    pub fn limits_for(&self, tool: Tool) -> StrokeLimits {
        match tool {
            Tool::Erase => self.erase_limits,
            _ => self.paint_limits,
        }
    }

    /// Pointer went down: start a gesture with an empty velocity window.
    pub fn start_gesture(&mut self) {
        self.session.active = true;
        self.session.last_point = None;
        self.session.sticker_placed = false;
        self.session.tracker.clear();
    }

    /// Feed every pointer move into the velocity window, painting or not.
    pub fn track(&mut self, sample: ScreenSample) {
        self.session.tracker.push(sample);
    }

    /// Pointer up or leave.  Never touches the surface.
    pub fn end_stroke(&mut self) {
        self.session.active = false;
        self.session.last_point = None;
        self.session.sticker_placed = false;
        self.session.tracker.clear();
    }

    /// Route one surface hit of an active gesture to the matching commit.
    pub fn apply(
        &mut self,
        uv: Uv,
        tool: Tool,
        brush: &BrushSettings,
        sticker: Option<&Sticker>,
        target: CommitTarget<'_>,
    ) -> StrokeOutcome {
        if !self.session.active {
            return StrokeOutcome::Ignored;
        }
        match tool {
            Tool::Rotate => StrokeOutcome::Ignored,
            Tool::Paint | Tool::Erase => {
                let outcome = match self.session.last_point {
                    None => self.begin_stroke(uv, tool, brush, target),
                    Some(previous) => self.continue_stroke(uv, previous, tool, brush, target),
                };
                self.session.last_point = Some(uv);
                outcome
            }
            Tool::Sticker => {
                if self.session.sticker_placed && !self.sticker_repeat_on_drag {
                    return StrokeOutcome::Ignored;
                }
                let Some(sticker) = sticker else {
                    return StrokeOutcome::Ignored;
                };
                let outcome = place_sticker(uv, sticker, brush.sticker_size, target);
                self.session.sticker_placed = true;
                outcome
            }
        }
    }

    /// Snapshot history, then commit a single dot.
    pub fn begin_stroke(
        &mut self,
        uv: Uv,
        tool: Tool,
        brush: &BrushSettings,
        target: CommitTarget<'_>,
    ) -> StrokeOutcome {
        let Some(description) = tool.stroke_description() else {
            return StrokeOutcome::Ignored;
        };
        target.history.snapshot(description, target.surface);

        if tool == Tool::Erase && !erase_allowed_at(uv, &target) {
            return StrokeOutcome::Suppressed;
        }
        commit_dot(uv, tool, brush, target);
        StrokeOutcome::Dot
    }

    /// Connect `previous` to `uv`, or stamp `uv` alone when a rate limit
    /// fails.
    pub fn continue_stroke(
        &mut self,
        uv: Uv,
        previous: Uv,
        tool: Tool,
        brush: &BrushSettings,
        target: CommitTarget<'_>,
    ) -> StrokeOutcome {
        if tool.stroke_description().is_none() {
            return StrokeOutcome::Ignored;
        }
        if tool == Tool::Erase && !erase_allowed_at(uv, &target) {
            return StrokeOutcome::Suppressed;
        }

        let limits = self.limits_for(tool);
        let distance = mapper::uv_distance(previous, uv);
        let velocity = self.session.tracker.velocity();

        if distance > limits.max_uv_distance {
            crate::log_info!("UV jump of {:.3} on {}, stamping", distance, tool.as_str());
            commit_dot(uv, tool, brush, target);
            return StrokeOutcome::Stamp;
        }
        if velocity > limits.max_velocity {
            crate::log_info!("Fast movement ({:.2} px/ms) on {}, stamping", velocity, tool.as_str());
            commit_dot(uv, tool, brush, target);
            return StrokeOutcome::Stamp;
        }

        commit_line(previous, uv, tool, brush, target);
        StrokeOutcome::Line
    }
}

// ============================================================================
// COMMITS
// ============================================================================

fn erase_allowed_at(uv: Uv, target: &CommitTarget<'_>) -> bool {
    match target.mask {
        None => true,
        Some(mask) => {
            let p = mapper::to_pixel(uv, target.surface.width(), target.surface.height());
            mask.alpha_at(p.x, p.y) != 0
        }
    }
}

/// Shape parameters per tool: (diameter, colour, opacity).
fn tip(tool: Tool, brush: &BrushSettings) -> (f32, [u8; 3], f32) {
    match tool {
        Tool::Erase => (brush.eraser_size, [0, 0, 0], 1.0),
        _ => (brush.brush_size, brush.color.rgb(), brush.opacity),
    }
}

fn commit_dot(uv: Uv, tool: Tool, brush: &BrushSettings, target: CommitTarget<'_>) {
    let (w, h) = (target.surface.width(), target.surface.height());
    let (size, color, opacity) = tip(tool, brush);
    let scratch = raster::circle(mapper::to_pixel(uv, w, h), size / 2.0, color, opacity, w, h);
    commit(scratch, tool, target);
}

fn commit_line(previous: Uv, uv: Uv, tool: Tool, brush: &BrushSettings, target: CommitTarget<'_>) {
    let (w, h) = (target.surface.width(), target.surface.height());
    let (size, color, opacity) = tip(tool, brush);
    let scratch = raster::line(
        mapper::to_pixel(previous, w, h),
        mapper::to_pixel(uv, w, h),
        size,
        color,
        opacity,
        w,
        h,
    );
    commit(scratch, tool, target);
}

fn place_sticker(uv: Uv, sticker: &Sticker, size: u32, target: CommitTarget<'_>) -> StrokeOutcome {
    target.history.snapshot("Sticker", target.surface);
    let (w, h) = (target.surface.width(), target.surface.height());
    let scratch = raster::sticker(sticker.bitmap(), mapper::to_pixel(uv, w, h), size, w, h);
    commit(scratch, Tool::Sticker, target);
    StrokeOutcome::Sticker
}

/// Mask the scratch shape and composite it with the tool's blend rule.
fn commit(scratch: Option<Scratch>, tool: Tool, target: CommitTarget<'_>) {
    let Some(mut scratch) = scratch else {
        return;
    };
    if let Some(mask) = target.mask {
        mask.clip(&mut scratch);
    }
    if scratch.is_empty() {
        return;
    }
    let mode = match tool {
        Tool::Erase => Composite::EraseToBase(target.base),
        _ => Composite::Over,
    };
    target.surface.composite(&scratch, mode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{build_mask, half_mask_source, MaskId};
    use image::Rgba;

    struct Fixture {
        surface: SurfaceBuffer,
        history: HistoryManager,
        base: RgbaImage,
        mask: Option<Mask>,
    }

    impl Fixture {
        fn new(size: u32, base_color: Rgba<u8>) -> Self {
            let base = RgbaImage::from_pixel(size, size, base_color);
            Self {
                surface: SurfaceBuffer::from_base(&base, size, size),
                history: HistoryManager::default(),
                base,
                mask: None,
            }
        }

        fn target(&mut self) -> CommitTarget<'_> {
            CommitTarget {
                surface: &mut self.surface,
                history: &mut self.history,
                base: &self.base,
                mask: self.mask.as_ref(),
            }
        }
    }

    fn blue_brush(size: f32) -> BrushSettings {
        BrushSettings {
            brush_size: size,
            color: Color::new(0, 0, 255),
            ..Default::default()
        }
    }

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn test_velocity_window() {
        let mut tracker = VelocityTracker::new(5);
        assert_eq!(tracker.velocity(), 0.0);
        tracker.push(ScreenSample { x: 0.0, y: 0.0, time_ms: 0.0 });
        assert_eq!(tracker.velocity(), 0.0);
        tracker.push(ScreenSample { x: 30.0, y: 40.0, time_ms: 10.0 });
        assert!((tracker.velocity() - 5.0).abs() < 1e-6);

        let mut same_time = VelocityTracker::new(5);
        same_time.push(ScreenSample { x: 0.0, y: 0.0, time_ms: 5.0 });
        same_time.push(ScreenSample { x: 100.0, y: 0.0, time_ms: 5.0 });
        assert_eq!(same_time.velocity(), 0.0);

        for i in 0..10 {
            tracker.push(ScreenSample { x: i as f32, y: 0.0, time_ms: 100.0 + i as f64 });
        }
        assert_eq!(tracker.len(), 5);
        assert!((tracker.velocity() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_first_sample_snapshots_and_dots() {
        let mut fx = Fixture::new(64, WHITE);
        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let brush = blue_brush(8.0);
        let outcome = engine.apply(Uv::new(0.5, 0.5), Tool::Paint, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Dot);
        assert_eq!(fx.history.undo_count(), 1);
        assert_eq!(fx.surface.get_pixel(32, 32), BLUE);
        assert_eq!(engine.session().last_point, Some(Uv::new(0.5, 0.5)));
    }

    #[test]
    fn test_uv_distance_fallback_stamps() {
        let mut fx = Fixture::new(100, WHITE);
        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let brush = blue_brush(4.0);
        engine.apply(Uv::new(0.1, 0.5), Tool::Paint, &brush, None, fx.target());
        let outcome = engine.apply(Uv::new(0.9, 0.5), Tool::Paint, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Stamp);
        assert_eq!(fx.surface.get_pixel(90, 50), BLUE);
        assert_eq!(fx.surface.get_pixel(50, 50), WHITE);
        assert_eq!(fx.history.undo_count(), 1);
    }

    #[test]
    fn test_close_points_connect() {
        let mut fx = Fixture::new(100, WHITE);
        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let brush = blue_brush(4.0);
        engine.apply(Uv::new(0.40, 0.5), Tool::Paint, &brush, None, fx.target());
        let outcome = engine.apply(Uv::new(0.48, 0.5), Tool::Paint, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Line);
        for x in 40..48 {
            assert_eq!(fx.surface.get_pixel(x, 50), BLUE, "gap at {}", x);
        }
    }

    #[test]
    fn test_velocity_fallback_stamps() {
        let mut fx = Fixture::new(100, WHITE);
        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let brush = blue_brush(4.0);
        engine.track(ScreenSample { x: 0.0, y: 0.0, time_ms: 0.0 });
        engine.apply(Uv::new(0.40, 0.5), Tool::Paint, &brush, None, fx.target());
        engine.track(ScreenSample { x: 300.0, y: 0.0, time_ms: 10.0 });
        let outcome = engine.apply(Uv::new(0.48, 0.5), Tool::Paint, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Stamp);
        assert_eq!(fx.surface.get_pixel(44, 50), WHITE);
        assert_eq!(fx.surface.get_pixel(48, 50), BLUE);
    }

    #[test]
    fn test_per_tool_limits() {
        let strict = StrokeLimits { max_uv_distance: 0.01, max_velocity: 2.0 };
        let mut fx = Fixture::new(100, WHITE);
        fx.surface.replace_with(&RgbaImage::from_pixel(100, 100, BLUE));
        let mut engine = StrokeEngine::new(StrokeLimits::default(), strict, 5);
        assert_eq!(engine.limits_for(Tool::Erase), strict);
        assert_eq!(engine.limits_for(Tool::Paint), StrokeLimits::default());

        engine.start_gesture();
        let brush = BrushSettings { eraser_size: 4.0, ..Default::default() };
        engine.apply(Uv::new(0.40, 0.5), Tool::Erase, &brush, None, fx.target());
        let outcome = engine.apply(Uv::new(0.48, 0.5), Tool::Erase, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Stamp);
        assert_eq!(fx.surface.get_pixel(44, 50), BLUE);
        assert_eq!(fx.surface.get_pixel(48, 50), WHITE);
    }

    #[test]
    fn test_paint_outside_mask_is_unchanged() {
        let mut fx = Fixture::new(8, WHITE);
        fx.mask = Some(build_mask(MaskId::new("head"), &half_mask_source(8, 8), 8, 8));
        fx.surface.consume_dirty();
        let before = fx.surface.snapshot();

        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let brush = blue_brush(4.0);
        engine.apply(Uv::new(0.8, 0.5), Tool::Paint, &brush, None, fx.target());
        assert_eq!(fx.surface.snapshot(), before);
        assert!(!fx.surface.is_dirty());

        engine.end_stroke();
        engine.start_gesture();
        engine.apply(Uv::new(0.2, 0.5), Tool::Paint, &brush, None, fx.target());
        assert_eq!(fx.surface.get_pixel(1, 4), BLUE);
        assert!(fx.surface.is_dirty());
    }

    #[test]
    fn test_erase_restores_base() {
        let base_color = Rgba([200, 100, 50, 255]);
        let mut fx = Fixture::new(32, base_color);
        let mut engine = StrokeEngine::default();
        let brush = BrushSettings { brush_size: 10.0, eraser_size: 10.0, color: Color::new(0, 0, 255), ..Default::default() };

        engine.start_gesture();
        engine.apply(Uv::new(0.5, 0.5), Tool::Paint, &brush, None, fx.target());
        engine.end_stroke();
        assert_eq!(fx.surface.get_pixel(16, 16), BLUE);

        engine.start_gesture();
        let outcome = engine.apply(Uv::new(0.5, 0.5), Tool::Erase, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Dot);
        assert_eq!(fx.surface.get_pixel(16, 16), base_color);
    }

    #[test]
    fn test_erase_outside_mask_snapshots_once() {
        let mut fx = Fixture::new(8, WHITE);
        fx.mask = Some(build_mask(MaskId::new("head"), &half_mask_source(8, 8), 8, 8));
        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let brush = BrushSettings::default();
        let outcome = engine.apply(Uv::new(0.9, 0.5), Tool::Erase, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Suppressed);
        assert_eq!(fx.history.undo_count(), 1);
        let outcome = engine.apply(Uv::new(0.9, 0.55), Tool::Erase, &brush, None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Suppressed);
        assert_eq!(fx.history.undo_count(), 1);
    }

    #[test]
    fn test_sticker_once_per_gesture() {
        let mut fx = Fixture::new(32, WHITE);
        let sticker = Sticker::from_image("dot", RgbaImage::from_pixel(2, 2, BLUE));
        let brush = BrushSettings { sticker_size: 4, ..Default::default() };

        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        assert_eq!(engine.apply(Uv::new(0.25, 0.5), Tool::Sticker, &brush, Some(&sticker), fx.target()), StrokeOutcome::Sticker);
        assert_eq!(engine.apply(Uv::new(0.75, 0.5), Tool::Sticker, &brush, Some(&sticker), fx.target()), StrokeOutcome::Ignored);
        assert_eq!(fx.surface.get_pixel(8, 16), BLUE);
        assert_eq!(fx.surface.get_pixel(24, 16), WHITE);
        assert_eq!(fx.history.undo_count(), 1);

        let mut repeat = StrokeEngine::default().with_sticker_repeat(true);
        repeat.start_gesture();
        repeat.apply(Uv::new(0.75, 0.5), Tool::Sticker, &brush, Some(&sticker), fx.target());
        repeat.apply(Uv::new(0.75, 0.25), Tool::Sticker, &brush, Some(&sticker), fx.target());
        assert_eq!(fx.history.undo_count(), 3);
        assert_eq!(fx.surface.get_pixel(24, 16), BLUE);
    }

    #[test]
    fn test_sticker_without_selection_is_noop() {
        let mut fx = Fixture::new(8, WHITE);
        let mut engine = StrokeEngine::default();
        engine.start_gesture();
        let outcome = engine.apply(Uv::new(0.5, 0.5), Tool::Sticker, &BrushSettings::default(), None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Ignored);
        assert_eq!(fx.history.undo_count(), 0);
    }

    #[test]
    fn test_inactive_gesture_ignored() {
        let mut fx = Fixture::new(8, WHITE);
        let mut engine = StrokeEngine::default();
        let outcome = engine.apply(Uv::new(0.5, 0.5), Tool::Paint, &BrushSettings::default(), None, fx.target());
        assert_eq!(outcome, StrokeOutcome::Ignored);
        assert_eq!(fx.history.undo_count(), 0);
    }
}
