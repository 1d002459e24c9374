//! SkinPaint: the texture-painting engine of a 3D character customiser.
//!
//! A host application renders the character, raycasts pointer events to UV
//! hits and feeds them to a [`PaintSession`], which paints into a fixed-size
//! [`SurfaceBuffer`] under optional region masks, with undo/redo.  The host
//! polls [`PaintSession::consume_dirty`] once per frame and re-uploads the
//! texture when it returns `true`.

pub mod logger;

pub mod cli;
pub mod color;
pub mod error;
pub mod history;
pub mod mapper;
pub mod mask;
pub mod raster;
pub mod script;
pub mod session;
pub mod settings;
pub mod sticker;
pub mod store;
pub mod stroke;
pub mod surface;
pub mod tools;

pub use color::{Color, ColorHistory};
pub use error::{PaintError, Result};
pub use history::HistoryManager;
pub use mapper::{PixelPos, Uv};
pub use mask::{Mask, MaskId, MaskRegistry};
pub use session::{PaintSession, PointerEvent, PointerKind, PointerSample, SurfaceRaycaster};
pub use settings::PainterSettings;
pub use sticker::Sticker;
pub use store::{FileStore, MemoryStore, SavedWork, WorkStore};
pub use stroke::{BrushSettings, StrokeLimits, StrokeOutcome};
pub use surface::SurfaceBuffer;
pub use tools::{CameraControl, CursorUpdate, NoCamera, Tool};
