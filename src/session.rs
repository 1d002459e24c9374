use image::RgbaImage;
use std::collections::HashMap;
use uuid::Uuid;

use crate::color::{Color, ColorHistory};
use crate::error::{PaintError, Result};
use crate::history::HistoryManager;
use crate::mapper::Uv;
use crate::mask::{MaskId, MaskRegistry};
use crate::settings::PainterSettings;
use crate::sticker::Sticker;
use crate::store::{SavedWork, WorkStore};
use crate::stroke::{BrushSettings, CommitTarget, ScreenSample, StrokeEngine, StrokeOutcome};
use crate::surface::{SurfaceBuffer, decode_png, fit_to};
use crate::tools::{CameraControl, CursorUpdate, Tool, ToolController};

// ============================================================================
// POINTER INPUT
// ============================================================================

/// One pointer sample with the result of the host's raycast.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PointerSample {
    /// Screen position in pixels.
    pub x: f32,
    pub y: f32,
    pub time_ms: f64,
    /// `None` when the ray missed the character.
    pub uv: Option<Uv>,
}

impl PointerSample {
    pub fn hit(uv: Uv, x: f32, y: f32, time_ms: f64) -> Self {
        Self { x, y, time_ms, uv: Some(uv) }
    }

    pub fn miss(x: f32, y: f32, time_ms: f64) -> Self {
        Self { x, y, time_ms, uv: None }
    }

    fn screen(&self) -> ScreenSample {
        ScreenSample { x: self.x, y: self.y, time_ms: self.time_ms }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Leave,
}

/// Raw pointer event as delivered by the windowing layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
    pub time_ms: f64,
}

/// The renderer's picking service: maps a screen event to the UV of the
/// front-most paintable surface under it.
pub trait SurfaceRaycaster {
    fn ray_hit(&mut self, event: &PointerEvent) -> Option<Uv>;
}

// ============================================================================
// PAINT SESSION
// ============================================================================

/// Live surface plus the pristine base it was seeded from, both at surface
/// resolution.
struct Canvas {
    surface: SurfaceBuffer,
    base: RgbaImage,
}

/// The painting context of one loaded character.
///
/// Gesture methods never fail: before a base texture is attached, with no
/// surface hit, outside a mask or with nothing selected they simply leave the
/// surface untouched.
pub struct PaintSession {
    id: Uuid,
    canvas: Option<Canvas>,
    masks: MaskRegistry,
    history: HistoryManager,
    engine: StrokeEngine,
    tools: ToolController,
    camera: Box<dyn CameraControl>,
    brush: BrushSettings,
    selected_sticker: Option<Sticker>,
    color_history: ColorHistory,
    autosave_interval_ms: u64,
    last_autosave_ms: Option<u64>,
    saved_generation: Option<u64>,
}

impl PaintSession {
    pub fn new(settings: &PainterSettings, camera: Box<dyn CameraControl>) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            canvas: None,
            masks: MaskRegistry::new(),
            history: HistoryManager::new(settings.history_limit)
                .with_memory_limit(settings.history_memory_bytes()),
            engine: StrokeEngine::new(
                settings.paint_limits,
                settings.erase_limits,
                settings.velocity_window,
            )
            .with_sticker_repeat(settings.sticker_repeat_on_drag),
            tools: ToolController::new(),
            camera,
            brush: settings.brush(),
            selected_sticker: None,
            color_history: settings.color_history.clone(),
            autosave_interval_ms: settings.autosave_seconds.saturating_mul(1000),
            last_autosave_ms: None,
            saved_generation: None,
        };
        session.tools.set_tool(Tool::Rotate, &mut *session.camera);
        crate::log_info!("[session {}] created", session.id);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Create the surface at `width`×`height`, seeded with `base` scaled to
    /// fit.  The surface size is fixed from here on.
    pub fn attach_base(&mut self, base: &RgbaImage, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(PaintError::InvalidFormat(
                "Surface dimensions cannot be zero".into(),
            ));
        }
        if self.canvas.is_some() {
            return Err(PaintError::InvalidFormat(
                "Surface already created for this session".into(),
            ));
        }
        let base = fit_to(base, width, height);
        let surface = SurfaceBuffer::from_base(&base, width, height);
        self.canvas = Some(Canvas { surface, base });
        crate::log_info!("[session {}] surface {}x{} ready", self.id, width, height);
        Ok(())
    }

    /// Build the region masks at surface resolution.  Sources that are
    /// `None` stay unrestricted.
    pub fn load_masks(&mut self, sources: HashMap<MaskId, Option<RgbaImage>>) {
        let Some(canvas) = self.canvas.as_ref() else {
            crate::log_warn!("[session {}] masks ignored, no surface yet", self.id);
            return;
        };
        let (w, h) = (canvas.surface.width(), canvas.surface.height());
        self.masks = MaskRegistry::from_sources(sources, w, h);
        let ids: Vec<&str> = self.masks.ids().into_iter().map(MaskId::as_str).collect();
        crate::log_info!("[session {}] masks loaded: [{}]", self.id, ids.join(", "));
    }

    pub fn surface(&self) -> Option<&SurfaceBuffer> {
        self.canvas.as_ref().map(|c| &c.surface)
    }

    pub fn masks(&self) -> &MaskRegistry {
        &self.masks
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn engine(&self) -> &StrokeEngine {
        &self.engine
    }

    // ========================================================================
    // TOOL AND BRUSH STATE
    // ========================================================================

    pub fn tool(&self) -> Tool {
        self.tools.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.set_tool(tool, &mut *self.camera);
    }

    pub fn active_mask(&self) -> Option<&MaskId> {
        self.tools.active_mask()
    }

    /// Ids without a built mask are accepted and paint unrestricted.
    pub fn set_active_mask(&mut self, mask: Option<MaskId>) {
        if let Some(id) = &mask
            && !self.masks.contains(id)
        {
            crate::log_warn!("[session {}] mask '{}' not loaded, painting unrestricted", self.id, id);
        }
        self.tools.set_active_mask(mask);
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    /// Sets the eraser size while the eraser is active, the brush size
    /// otherwise.
    pub fn set_brush_size(&mut self, size: f32) {
        if !size.is_finite() {
            return;
        }
        let size = size.max(1.0);
        if self.tools.tool() == Tool::Erase {
            self.brush.eraser_size = size;
        } else {
            self.brush.brush_size = size;
        }
    }

    pub fn set_eraser_size(&mut self, size: f32) {
        if size.is_finite() {
            self.brush.eraser_size = size.max(1.0);
        }
    }

    pub fn set_brush_opacity(&mut self, opacity: f32) {
        if opacity.is_finite() {
            self.brush.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Parse `#rrggbb`, make it the brush colour and record it in the recent
    /// colours.
    pub fn set_brush_color(&mut self, hex: &str) -> Result<()> {
        let color = Color::from_hex(hex)?;
        self.brush.color = color;
        self.color_history.record(color);
        Ok(())
    }

    pub fn color_history(&self) -> &ColorHistory {
        &self.color_history
    }

    pub fn set_sticker_size(&mut self, size: u32) {
        self.brush.sticker_size = size.max(1);
    }

    pub fn selected_sticker(&self) -> Option<&Sticker> {
        self.selected_sticker.as_ref()
    }

    pub fn set_selected_sticker(&mut self, sticker: Option<Sticker>) {
        if let Some(s) = &sticker {
            crate::log_info!("[session {}] sticker '{}' selected", self.id, s.name());
        }
        self.selected_sticker = sticker;
    }

    /// Copy the user-adjustable state back into `settings` for saving.
    pub fn store_into(&self, settings: &mut PainterSettings) {
        settings.brush_size = self.brush.brush_size;
        settings.eraser_size = self.brush.eraser_size;
        settings.brush_opacity = self.brush.opacity;
        settings.brush_color = self.brush.color;
        settings.sticker_size = self.brush.sticker_size;
        settings.color_history = self.color_history.clone();
    }

    // ========================================================================
    // GESTURES
    // ========================================================================

    /// Ignored entirely in rotate mode, where the camera owns the pointer.
    pub fn on_pointer_down(&mut self, sample: PointerSample) -> StrokeOutcome {
        if self.tools.tool() == Tool::Rotate {
            return StrokeOutcome::Ignored;
        }
        self.engine.start_gesture();
        match sample.uv {
            Some(uv) => self.apply_hit(uv),
            None => StrokeOutcome::Ignored,
        }
    }

    pub fn on_pointer_move(&mut self, sample: PointerSample) -> StrokeOutcome {
        self.engine.track(sample.screen());
        if self.tools.tool() != Tool::Rotate {
            self.tools.cursor_mut().request_update(sample.x, sample.y);
        }
        if !self.engine.session().active {
            return StrokeOutcome::Ignored;
        }
        match sample.uv {
            Some(uv) => self.apply_hit(uv),
            None => StrokeOutcome::Ignored,
        }
    }

    pub fn on_pointer_up(&mut self) {
        self.engine.end_stroke();
    }

    pub fn on_pointer_leave(&mut self) {
        self.engine.end_stroke();
        self.tools.cursor_mut().hide();
    }

    /// Route a raw event through the host's raycaster.
    pub fn handle_pointer_event(
        &mut self,
        event: &PointerEvent,
        raycaster: &mut dyn SurfaceRaycaster,
    ) -> StrokeOutcome {
        match event.kind {
            PointerKind::Down | PointerKind::Move => {
                let uv = if self.tools.tool() == Tool::Rotate {
                    None
                } else {
                    raycaster.ray_hit(event)
                };
                let sample = PointerSample { x: event.x, y: event.y, time_ms: event.time_ms, uv };
                if event.kind == PointerKind::Down {
                    self.on_pointer_down(sample)
                } else {
                    self.on_pointer_move(sample)
                }
            }
            PointerKind::Up => {
                self.on_pointer_up();
                StrokeOutcome::Ignored
            }
            PointerKind::Leave => {
                self.on_pointer_leave();
                StrokeOutcome::Ignored
            }
        }
    }

    fn apply_hit(&mut self, uv: Uv) -> StrokeOutcome {
        let Some(canvas) = self.canvas.as_mut() else {
            return StrokeOutcome::Ignored;
        };
        let target = CommitTarget {
            surface: &mut canvas.surface,
            history: &mut self.history,
            base: &canvas.base,
            mask: self.masks.get(self.tools.active_mask()),
        };
        self.engine.apply(
            uv,
            self.tools.tool(),
            &self.brush,
            self.selected_sticker.as_ref(),
            target,
        )
    }

    // ========================================================================
    // CURSOR OVERLAY
    // ========================================================================

    /// Call once per display refresh.  Yields at most one cursor redraw,
    /// never in rotate mode.
    pub fn on_display_refresh(&mut self) -> Option<CursorUpdate> {
        let diameter = match self.tools.tool() {
            Tool::Rotate => return None,
            Tool::Paint => self.brush.brush_size,
            Tool::Erase => self.brush.eraser_size,
            Tool::Sticker => self.brush.sticker_size as f32,
        };
        self.tools.cursor_mut().on_display_refresh(diameter)
    }

    pub fn cursor_visible(&self) -> bool {
        self.tools.cursor().is_visible()
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn undo(&mut self) -> Option<String> {
        let canvas = self.canvas.as_mut()?;
        let description = self.history.undo(&mut canvas.surface)?;
        crate::log_info!("[session {}] undo: {}", self.id, description);
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        let canvas = self.canvas.as_mut()?;
        let description = self.history.redo(&mut canvas.surface)?;
        crate::log_info!("[session {}] redo: {}", self.id, description);
        Some(description)
    }

    /// Reset the surface to the base texture as one undoable step and drop
    /// the saved work from `store`.
    pub fn clear(&mut self, store: Option<&mut dyn WorkStore>) {
        let Some(canvas) = self.canvas.as_mut() else { return };
        self.history.snapshot("Clear", &canvas.surface);
        canvas.surface.replace_with(&canvas.base);
        if let Some(store) = store {
            store.clear();
        }
        crate::log_info!("[session {}] cleared to base texture", self.id);
    }

    // ========================================================================
    // RENDERER HAND-OFF AND EXPORT
    // ========================================================================

    pub fn is_dirty(&self) -> bool {
        self.canvas.as_ref().is_some_and(|c| c.surface.is_dirty())
    }

    /// Returns whether the texture needs re-uploading and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        self.canvas.as_mut().is_some_and(|c| c.surface.consume_dirty())
    }

    /// Current surface as PNG bytes.
    pub fn export_bitmap(&self) -> Result<Vec<u8>> {
        let canvas = self.canvas.as_ref().ok_or_else(no_surface)?;
        canvas.surface.encode_png()
    }

    pub fn export_rgba(&self) -> Option<RgbaImage> {
        self.canvas.as_ref().map(|c| c.surface.pixels().clone())
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    pub fn save_work(&mut self, store: &mut dyn WorkStore) -> Result<()> {
        self.save_work_at(store, crate::logger::now_millis())
    }

    fn save_work_at(&mut self, store: &mut dyn WorkStore, timestamp_ms: u64) -> Result<()> {
        let canvas = self.canvas.as_ref().ok_or_else(no_surface)?;
        let png = canvas.surface.encode_png()?;
        let work = SavedWork::new(
            timestamp_ms,
            canvas.surface.width(),
            canvas.surface.height(),
            png,
        );
        store.save(&work.encode()?)?;
        self.saved_generation = Some(canvas.surface.generation());
        crate::log_info!("[session {}] work saved ({} bytes of PNG)", self.id, work.png.len());
        Ok(())
    }

    /// Replace the surface with previously saved work and start the undo
    /// history afresh.  Returns `false` and leaves the surface and history as
    /// they are when nothing usable is stored.
    pub fn restore_work(&mut self, store: &dyn WorkStore) -> bool {
        let Some(canvas) = self.canvas.as_mut() else { return false };
        let Some(raw) = store.load() else { return false };

        let work = match SavedWork::decode(&raw) {
            Ok(work) => work,
            Err(e) => {
                crate::log_warn!("[session {}] saved work ignored: {}", self.id, e);
                return false;
            }
        };
        let (w, h) = (canvas.surface.width(), canvas.surface.height());
        if (work.width, work.height) != (w, h) {
            crate::log_warn!(
                "[session {}] saved work is {}x{}, surface is {}x{}; ignored",
                self.id,
                work.width,
                work.height,
                w,
                h
            );
            return false;
        }
        let image = match decode_png(&work.png) {
            Ok(image) if image.dimensions() == (w, h) => image,
            Ok(image) => {
                crate::log_warn!(
                    "[session {}] saved PNG is {}x{}, expected {}x{}; ignored",
                    self.id,
                    image.width(),
                    image.height(),
                    w,
                    h
                );
                return false;
            }
            Err(e) => {
                crate::log_warn!("[session {}] saved work ignored: {}", self.id, e);
                return false;
            }
        };
        canvas.surface.replace_with(&image);
        self.history.clear();
        self.saved_generation = Some(canvas.surface.generation());
        crate::log_info!("[session {}] restored work saved at {}", self.id, work.timestamp_ms);
        true
    }

    /// Drive periodic auto-save from the host's clock.  The first tick arms
    /// the timer; later ticks save once the interval has elapsed and the
    /// surface changed since the last save.  Returns `true` when it saved.
    pub fn autosave_tick(&mut self, now_ms: u64, store: &mut dyn WorkStore) -> bool {
        if self.autosave_interval_ms == 0 || self.canvas.is_none() {
            return false;
        }
        let Some(last) = self.last_autosave_ms else {
            self.last_autosave_ms = Some(now_ms);
            return false;
        };
        if now_ms.saturating_sub(last) < self.autosave_interval_ms {
            return false;
        }
        self.last_autosave_ms = Some(now_ms);

        let generation = self.canvas.as_ref().map(|c| c.surface.generation());
        if generation == self.saved_generation {
            return false;
        }
        match self.save_work_at(store, now_ms) {
            Ok(()) => true,
            Err(e) => {
                crate::log_err!("[session {}] auto-save failed: {}", self.id, e);
                false
            }
        }
    }
}

fn no_surface() -> PaintError {
    PaintError::InvalidFormat("No surface: base texture not loaded".into())
}
