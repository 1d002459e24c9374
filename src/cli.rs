// ============================================================================
// SkinPaint CLI: replay recorded gestures against a base texture, headless
// ============================================================================
//
// Usage examples:
//   skinpaint --base albedo.png --script strokes.txt --output painted.png
//   skinpaint -b albedo.png --mask head=head_mask.png --mask jacket=jacket_mask.png \
//             -s strokes.txt -o painted.png --size 1024
//   skinpaint -b albedo.png -s more.txt -o out.png --work session.b64
//
// The replay drives the same `PaintSession` a host application would, with
// surface hits taken from the script instead of a raycaster.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::RgbaImage;

use crate::error::{PaintError, Result};
use crate::mask::MaskId;
use crate::script::{self, ReplaySummary};
use crate::session::PaintSession;
use crate::settings::PainterSettings;
use crate::store::{FileStore, WorkStore};
use crate::surface::decode_image;
use crate::tools::NoCamera;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// SkinPaint headless gesture replay.
#[derive(Parser, Debug)]
#[command(
    name = "skinpaint",
    about = "SkinPaint headless texture painter",
    long_about = "Replay a gesture script (tool changes, pointer down/move/up with UV\n\
                  hits, undo/redo) against a base texture and write the painted\n\
                  texture as PNG.\n\n\
                  Example:\n  \
                  skinpaint --base albedo.png --script strokes.txt --output painted.png"
)]
pub struct CliArgs {
    /// Base (albedo) texture. Seeds the surface and is revealed by the eraser.
    #[arg(short, long, value_name = "IMAGE")]
    pub base: PathBuf,

    /// Region mask as ID=IMAGE; the image's red channel marks the region.
    /// May be given several times.
    #[arg(short, long, value_name = "ID=IMAGE")]
    pub mask: Vec<String>,

    /// Gesture script to replay.
    #[arg(short, long, value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Output PNG path.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Square surface size in pixels. Defaults to the base texture's size.
    #[arg(long, value_name = "PIXELS")]
    pub size: Option<u32>,

    /// Settings file (key=value). Defaults to the per-user settings file.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Saved-work file: restored before the replay, written after it.
    #[arg(long, value_name = "FILE")]
    pub work: Option<PathBuf>,

    /// Session log file. Defaults to the platform data directory.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print a replay summary and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the replay and return an OS exit code.
/// `0` = output written, `1` = any failure.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match run_replay(&args) {
        Ok(summary) => {
            if args.verbose {
                println!(
                    "{} commands: {} dots, {} lines, {} stamps, {} stickers, {} suppressed, {} undo, {} redo",
                    summary.commands,
                    summary.dots,
                    summary.lines,
                    summary.stamps,
                    summary.stickers,
                    summary.suppressed,
                    summary.undos,
                    summary.redos
                );
                println!(
                    "  → {} ({:.0}ms)",
                    args.output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                if let Some(path) = crate::logger::log_path() {
                    println!("  log: {}", path.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("CLI replay failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Replay pipeline
// ============================================================================

fn run_replay(args: &CliArgs) -> Result<ReplaySummary> {
    // -- Step 1: Settings and base texture -------------------------------
    let settings = match &args.settings {
        Some(path) => PainterSettings::load_from(path),
        None => PainterSettings::load(),
    };
    let base = load_image(&args.base)?;
    let (width, height) = match args.size {
        Some(size) => (size, size),
        None => base.dimensions(),
    };

    let mut session = PaintSession::new(&settings, Box::new(NoCamera::default()));
    session.attach_base(&base, width, height)?;

    // -- Step 2: Masks ---------------------------------------------------
    let mut sources = HashMap::new();
    for arg in &args.mask {
        let (id, path) = parse_mask_arg(arg)?;
        let image = match load_image(&path) {
            Ok(image) => Some(image),
            Err(e) => {
                eprintln!("warning: mask '{}' unavailable ({}), painting unrestricted", id, e);
                None
            }
        };
        sources.insert(id, image);
    }
    session.load_masks(sources);

    // -- Step 3: Saved work ----------------------------------------------
    let mut store = args.work.as_ref().map(FileStore::new);
    if let Some(store) = &store
        && session.restore_work(store)
        && args.verbose
    {
        println!("restored saved work from {}", store.path().display());
    }

    // -- Step 4: Replay --------------------------------------------------
    let source = std::fs::read_to_string(&args.script)?;
    let lines = script::parse(&source)?;
    let base_dir = args.script.parent().unwrap_or_else(|| Path::new("."));
    let summary = script::replay(
        &mut session,
        &lines,
        base_dir,
        store.as_mut().map(|s| s as &mut dyn WorkStore),
    )?;

    // -- Step 5: Write ---------------------------------------------------
    std::fs::write(&args.output, session.export_bitmap()?)?;
    if let Some(store) = store.as_mut() {
        session.save_work(store)?;
    }
    crate::log_info!(
        "Replayed {} commands from {} into {}",
        summary.commands,
        args.script.display(),
        args.output.display()
    );
    Ok(summary)
}

// ============================================================================
// Helpers
// ============================================================================

fn load_image(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// `head=masks/head.png` → (`head`, `masks/head.png`)
fn parse_mask_arg(arg: &str) -> Result<(MaskId, PathBuf)> {
    let bad = || PaintError::InvalidFormat(format!("mask '{}' must be ID=IMAGE", arg));
    let (id, path) = arg.split_once('=').ok_or_else(bad)?;
    let id = MaskId::parse(id).ok_or_else(bad)?;
    if path.trim().is_empty() {
        return Err(bad());
    }
    Ok((id, PathBuf::from(path.trim())))
}
