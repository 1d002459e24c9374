use std::fmt;

use crate::mask::MaskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    /// Camera orbit; pointer input never paints.
    #[default]
    Rotate,
    Paint,
    Erase,
    Sticker,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Rotate, Tool::Paint, Tool::Erase, Tool::Sticker];

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Rotate => "rotate",
            Tool::Paint => "paint",
            Tool::Erase => "erase",
            Tool::Sticker => "sticker",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rotate" => Some(Tool::Rotate),
            "paint" | "brush" => Some(Tool::Paint),
            "erase" | "eraser" => Some(Tool::Erase),
            "sticker" => Some(Tool::Sticker),
            _ => None,
        }
    }

    /// History label for strokes of this tool; `None` for tools without
    /// line strokes.
    pub fn stroke_description(self) -> Option<&'static str> {
        match self {
            Tool::Paint => Some("Brush Stroke"),
            Tool::Erase => Some("Eraser Stroke"),
            Tool::Rotate | Tool::Sticker => None,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COLLABORATORS
// ============================================================================

/// The orbit-camera controls owned by the host application.
pub trait CameraControl {
    fn set_enabled(&mut self, enabled: bool);
}

/// Stand-in for hosts without a camera (headless replay, tests).
#[derive(Default, Debug)]
pub struct NoCamera {
    pub enabled: bool,
}

impl CameraControl for NoCamera {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

// ============================================================================
// CURSOR OVERLAY
// ============================================================================

/// One redraw of the brush-size cursor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorUpdate {
    pub x: f32,
    pub y: f32,
    pub diameter: f32,
    /// The diameter differs from the last emitted update.
    pub size_changed: bool,
}

/// Coalesces pointer-driven cursor redraws to one per display refresh.
#[derive(Debug, Default)]
pub struct CursorOverlay {
    pending: Option<(f32, f32)>,
    last_size: Option<f32>,
    visible: bool,
}

impl CursorOverlay {
    /// Record the latest pointer position.  Repeated requests between two
    /// refreshes overwrite each other.
    pub fn request_update(&mut self, x: f32, y: f32) {
        self.pending = Some((x, y));
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Emit at most one update, sized to `diameter`.
    pub fn on_display_refresh(&mut self, diameter: f32) -> Option<CursorUpdate> {
        let (x, y) = self.pending.take()?;
        let size_changed = self.last_size != Some(diameter);
        self.last_size = Some(diameter);
        self.visible = true;
        Some(CursorUpdate { x, y, diameter, size_changed })
    }

    /// Forget the last size so the next refresh recomputes it.
    pub fn reset_size(&mut self) {
        self.last_size = None;
    }

    pub fn hide(&mut self) {
        self.pending = None;
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

// ============================================================================
// TOOL MODE CONTROLLER
// ============================================================================

#[derive(Debug, Default)]
pub struct ToolController {
    tool: Tool,
    mask: Option<MaskId>,
    cursor: CursorOverlay,
}

impl ToolController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn active_mask(&self) -> Option<&MaskId> {
        self.mask.as_ref()
    }

    /// Switch tools.  The camera orbits only in rotate mode.
    pub fn set_tool(&mut self, tool: Tool, camera: &mut dyn CameraControl) {
        if tool != self.tool {
            crate::log_info!("Tool: {} -> {}", self.tool, tool);
        }
        self.tool = tool;
        camera.set_enabled(tool == Tool::Rotate);
        if tool != Tool::Rotate {
            self.cursor.reset_size();
        }
        self.cursor.hide();
    }

    /// Takes effect on the next commit; strokes already on the surface keep
    /// the mask they were drawn with.
    pub fn set_active_mask(&mut self, mask: Option<MaskId>) {
        self.mask = mask;
    }

    pub fn cursor(&self) -> &CursorOverlay {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut CursorOverlay {
        &mut self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_enabled_only_in_rotate() {
        let mut controller = ToolController::new();
        let mut camera = NoCamera::default();
        for tool in Tool::ALL {
            controller.set_tool(tool, &mut camera);
            assert_eq!(camera.enabled, tool == Tool::Rotate, "{}", tool);
            assert_eq!(controller.tool(), tool);
        }
    }

    #[test]
    fn test_parse_names() {
        for tool in Tool::ALL {
            assert_eq!(Tool::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(Tool::parse("Eraser"), Some(Tool::Erase));
        assert_eq!(Tool::parse("smudge"), None);
    }

    #[test]
    fn test_cursor_coalesces_per_refresh() {
        let mut cursor = CursorOverlay::default();
        assert!(cursor.on_display_refresh(20.0).is_none());
        cursor.request_update(1.0, 1.0);
        cursor.request_update(5.0, 6.0);
        cursor.request_update(9.0, 9.0);
        let update = cursor.on_display_refresh(20.0).unwrap();
        assert_eq!((update.x, update.y), (9.0, 9.0));
        assert!(update.size_changed);
        assert!(cursor.on_display_refresh(20.0).is_none());

        cursor.request_update(2.0, 2.0);
        assert!(!cursor.on_display_refresh(20.0).unwrap().size_changed);
        cursor.request_update(2.0, 2.0);
        assert!(cursor.on_display_refresh(30.0).unwrap().size_changed);
    }

    #[test]
    fn test_tool_switch_resets_cursor() {
        let mut controller = ToolController::new();
        let mut camera = NoCamera::default();
        controller.set_tool(Tool::Paint, &mut camera);
        controller.cursor_mut().request_update(3.0, 3.0);
        controller.cursor_mut().on_display_refresh(20.0);
        assert!(controller.cursor().is_visible());

        controller.cursor_mut().request_update(4.0, 4.0);
        controller.set_tool(Tool::Erase, &mut camera);
        assert!(!controller.cursor().is_visible());
        assert!(!controller.cursor().has_pending());

        controller.cursor_mut().request_update(4.0, 4.0);
        assert!(controller.cursor_mut().on_display_refresh(20.0).unwrap().size_changed);
    }

    #[test]
    fn test_mask_selection() {
        let mut controller = ToolController::new();
        assert!(controller.active_mask().is_none());
        controller.set_active_mask(MaskId::parse("head"));
        assert_eq!(controller.active_mask().map(|m| m.as_str()), Some("head"));
        controller.set_active_mask(MaskId::parse("none"));
        assert!(controller.active_mask().is_none());
    }
}
