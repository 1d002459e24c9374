// ============================================================================
// GESTURE SCRIPTS: recorded pointer input replayed against a session
// ============================================================================
//
// One command per line; a word starting with `#` begins a comment:
//
//   tool paint
//   mask head
//   color #0044ff
//   down 0.50 0.50 0 400 300     # u v [time_ms screen_x screen_y]
//   move 0.52 0.50 16 410 300
//   miss 32 420 300              # pointer off the model
//   up
//   undo
//
// When time and screen position are omitted the pointer stays where it was
// and the clock advances by one frame.

use std::path::{Path, PathBuf};

use crate::color::Color;
use crate::error::{PaintError, Result};
use crate::mapper::Uv;
use crate::mask::MaskId;
use crate::session::{PaintSession, PointerSample};
use crate::sticker::Sticker;
use crate::store::WorkStore;
use crate::stroke::StrokeOutcome;
use crate::tools::Tool;

/// Clock step for pointer lines without an explicit timestamp.
const FRAME_MS: f64 = 16.0;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Tool(Tool),
    Mask(Option<MaskId>),
    Color(Color),
    Opacity(f32),
    Brush(f32),
    Eraser(f32),
    Sticker(PathBuf),
    StickerSize(u32),
    Down(PointerSample),
    Move(PointerSample),
    Up,
    Leave,
    Undo,
    Redo,
    Clear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: Command,
}

/// Tally of what a replay did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub commands: usize,
    pub dots: usize,
    pub lines: usize,
    pub stamps: usize,
    pub stickers: usize,
    pub suppressed: usize,
    pub undos: usize,
    pub redos: usize,
}

impl ReplaySummary {
    fn count(&mut self, outcome: StrokeOutcome) {
        match outcome {
            StrokeOutcome::Dot => self.dots += 1,
            StrokeOutcome::Line => self.lines += 1,
            StrokeOutcome::Stamp => self.stamps += 1,
            StrokeOutcome::Sticker => self.stickers += 1,
            StrokeOutcome::Suppressed => self.suppressed += 1,
            StrokeOutcome::Ignored => {}
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

pub fn parse(source: &str) -> Result<Vec<ScriptLine>> {
    let mut out = Vec::new();
    let mut clock = PointerClock::default();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let words = words_before_comment(raw);
        let Some((&keyword, args)) = words.split_first() else { continue };
        let args = args.to_vec();
        let err = |message: String| PaintError::Script { line, message };

        let command = match keyword {
            "tool" => {
                let name = single(&args).map_err(err)?;
                Command::Tool(Tool::parse(name).ok_or_else(|| err(format!("unknown tool '{}'", name)))?)
            }
            "mask" => Command::Mask(MaskId::parse(single(&args).map_err(err)?)),
            "color" => {
                let hex = single(&args).map_err(err)?;
                Command::Color(Color::from_hex(hex).map_err(|e| err(e.to_string()))?)
            }
            "opacity" => Command::Opacity(number(single(&args).map_err(err)?).map_err(err)?),
            "brush" => Command::Brush(number(single(&args).map_err(err)?).map_err(err)?),
            "eraser" => Command::Eraser(number(single(&args).map_err(err)?).map_err(err)?),
            "sticker" => {
                if args.is_empty() {
                    return Err(err("expected a sticker path".into()));
                }
                Command::Sticker(PathBuf::from(args.join(" ")))
            }
            "sticker-size" => {
                let val = single(&args).map_err(err)?;
                Command::StickerSize(
                    val.parse()
                        .map_err(|_| err(format!("'{}' is not a whole number", val)))?,
                )
            }
            "down" | "move" => {
                let sample = clock.hit(&args).map_err(err)?;
                if keyword == "down" {
                    Command::Down(sample)
                } else {
                    Command::Move(sample)
                }
            }
            "miss" => Command::Move(clock.miss(&args).map_err(err)?),
            "up" => no_args(&args, Command::Up).map_err(err)?,
            "leave" => no_args(&args, Command::Leave).map_err(err)?,
            "undo" => no_args(&args, Command::Undo).map_err(err)?,
            "redo" => no_args(&args, Command::Redo).map_err(err)?,
            "clear" => no_args(&args, Command::Clear).map_err(err)?,
            other => return Err(err(format!("unknown command '{}'", other))),
        };
        out.push(ScriptLine { line, command });
    }
    Ok(out)
}

/// Tracks the implicit pointer position and time between lines.
#[derive(Default)]
struct PointerClock {
    x: f32,
    y: f32,
    time_ms: f64,
    started: bool,
}

impl PointerClock {
    fn advance(&mut self, rest: &[&str]) -> std::result::Result<(), String> {
        match rest.len() {
            0 => {
                if self.started {
                    self.time_ms += FRAME_MS;
                }
            }
            3 => {
                self.time_ms = number(rest[0])? as f64;
                self.x = number(rest[1])?;
                self.y = number(rest[2])?;
            }
            n => return Err(format!("expected 0 or 3 values for time and position, got {}", n)),
        }
        self.started = true;
        Ok(())
    }

    fn hit(&mut self, args: &[&str]) -> std::result::Result<PointerSample, String> {
        if args.len() < 2 {
            return Err("expected u and v".into());
        }
        let u = number(args[0])?;
        let v = number(args[1])?;
        self.advance(&args[2..])?;
        Ok(PointerSample::hit(Uv::new(u, v), self.x, self.y, self.time_ms))
    }

    fn miss(&mut self, args: &[&str]) -> std::result::Result<PointerSample, String> {
        self.advance(args)?;
        Ok(PointerSample::miss(self.x, self.y, self.time_ms))
    }
}

/// Split a line into words, dropping everything from a word starting with
/// `#` onwards.  The argument of `color` is a hex value, not a comment.
fn words_before_comment(raw: &str) -> Vec<&str> {
    let mut words: Vec<&str> = Vec::new();
    for word in raw.split_whitespace() {
        if word.starts_with('#') && !(words.len() == 1 && words[0] == "color") {
            break;
        }
        words.push(word);
    }
    words
}

fn single<'a>(args: &[&'a str]) -> std::result::Result<&'a str, String> {
    match args {
        [one] => Ok(*one),
        _ => Err(format!("expected one argument, got {}", args.len())),
    }
}

fn no_args(args: &[&str], command: Command) -> std::result::Result<Command, String> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(format!("unexpected argument '{}'", args[0]))
    }
}

fn number(text: &str) -> std::result::Result<f32, String> {
    text.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{}' is not a number", text))
}

// ============================================================================
// REPLAY
// ============================================================================

/// Feed `lines` to `session`.  Sticker paths are resolved against
/// `base_dir`.  Only sticker loading can fail.
pub fn replay(
    session: &mut PaintSession,
    lines: &[ScriptLine],
    base_dir: &Path,
    mut store: Option<&mut dyn WorkStore>,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for entry in lines {
        summary.commands += 1;
        match &entry.command {
            Command::Tool(tool) => session.set_tool(*tool),
            Command::Mask(mask) => session.set_active_mask(mask.clone()),
            Command::Color(color) => {
                session.set_brush_color(&color.to_hex())?;
            }
            Command::Opacity(v) => session.set_brush_opacity(*v),
            Command::Brush(v) => session.set_brush_size(*v),
            Command::Eraser(v) => session.set_eraser_size(*v),
            Command::Sticker(path) => {
                let path = if path.is_absolute() { path.clone() } else { base_dir.join(path) };
                let sticker = Sticker::load(&path).map_err(|e| PaintError::Script {
                    line: entry.line,
                    message: format!("sticker {}: {}", path.display(), e),
                })?;
                session.set_selected_sticker(Some(sticker));
            }
            Command::StickerSize(v) => session.set_sticker_size(*v),
            Command::Down(sample) => summary.count(session.on_pointer_down(*sample)),
            Command::Move(sample) => summary.count(session.on_pointer_move(*sample)),
            Command::Up => session.on_pointer_up(),
            Command::Leave => session.on_pointer_leave(),
            Command::Undo => {
                if session.undo().is_some() {
                    summary.undos += 1;
                }
            }
            Command::Redo => {
                if session.redo().is_some() {
                    summary.redos += 1;
                }
            }
            Command::Clear => match store.as_mut() {
                Some(store) => session.clear(Some(&mut **store)),
                None => session.clear(None),
            },
        }
    }
    Ok(summary)
}
