use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{PaintError, Result};
use crate::raster::Scratch;

// ============================================================================
// SURFACE BUFFER - the live texture being painted
// ============================================================================

/// How a scratch shape is combined with the surface.
#[derive(Clone, Copy)]
pub enum Composite<'a> {
    /// Normal alpha-over (paint, stickers).
    Over,
    /// Remove surface content by scratch alpha, then reveal the pristine base
    /// image underneath the removed area.
    EraseToBase(&'a RgbaImage),
}

/// Fixed-size RGBA8 raster backing the painted texture.
///
/// The dimensions never change after creation.  Every mutation marks the
/// buffer dirty; the renderer polls [`SurfaceBuffer::consume_dirty`] once per
/// frame to decide whether to re-upload the texture.
pub struct SurfaceBuffer {
    pixels: RgbaImage,
    dirty: bool,
    /// Bumped on every mutation, wraps.
    generation: u64,
}

/// Full lossless copy of the pixel store.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceSnapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SurfaceSnapshot {
    pub fn memory_bytes(&self) -> usize {
        self.pixels.len()
    }
}

impl SurfaceBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            dirty: true,
            generation: 0,
        }
    }

    /// Create a buffer seeded with `base`, scaled to `width`×`height` when the
    /// sizes differ.
    pub fn from_base(base: &RgbaImage, width: u32, height: u32) -> Self {
        Self {
            pixels: fit_to(base, width, height),
            dirty: true,
            generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the dirty flag and reset it.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            width: self.width(),
            height: self.height(),
            pixels: self.pixels.as_raw().clone(),
        }
    }

    /// Restore a snapshot taken from this buffer.  Snapshots of another size
    /// are rejected, the buffer keeps its content.
    pub fn restore(&mut self, snapshot: &SurfaceSnapshot) -> bool {
        if snapshot.width != self.width()
            || snapshot.height != self.height()
            || snapshot.pixels.len() != self.pixels.as_raw().len()
        {
            crate::log_warn!(
                "SurfaceBuffer::restore: snapshot {}x{} does not match surface {}x{}",
                snapshot.width,
                snapshot.height,
                self.width(),
                self.height()
            );
            return false;
        }
        self.pixels.copy_from_slice(&snapshot.pixels);
        self.mark_dirty();
        true
    }

    /// Overwrite the whole buffer with `image`, scaling it to fit.
    pub fn replace_with(&mut self, image: &RgbaImage) {
        if image.dimensions() == self.pixels.dimensions() {
            self.pixels.copy_from_slice(image.as_raw());
        } else {
            self.pixels = fit_to(image, self.width(), self.height());
        }
        self.mark_dirty();
    }

    /// Composite a scratch shape onto the buffer.  Returns `true` when at
    /// least one pixel changed; the buffer is only marked dirty in that case.
    pub fn composite(&mut self, scratch: &Scratch, mode: Composite<'_>) -> bool {
        let width = self.width();
        let stride = width as usize * 4;
        let (sx, sy) = (scratch.x, scratch.y);
        let sw = scratch.image.width().min(width.saturating_sub(sx));
        let sh = scratch.image.height().min(self.height().saturating_sub(sy));
        if sw == 0 || sh == 0 {
            return false;
        }

        if let Composite::EraseToBase(base) = mode
            && base.dimensions() != self.pixels.dimensions()
        {
            crate::log_err!("SurfaceBuffer::composite: base image size differs from surface");
            return false;
        }

        let scratch_stride = scratch.image.width() as usize * 4;
        let scratch_raw = scratch.image.as_raw();
        let raw: &mut [u8] = &mut self.pixels;

        let changed = raw
            .par_chunks_mut(stride)
            .skip(sy as usize)
            .take(sh as usize)
            .enumerate()
            .map(|(row, dst_row)| {
                let src_row = &scratch_raw[row * scratch_stride..(row + 1) * scratch_stride];
                let y = sy as usize + row;
                let mut row_changed = false;
                for col in 0..sw as usize {
                    let s = &src_row[col * 4..col * 4 + 4];
                    if s[3] == 0 {
                        continue;
                    }
                    let di = (sx as usize + col) * 4;
                    let current = Rgba([dst_row[di], dst_row[di + 1], dst_row[di + 2], dst_row[di + 3]]);
                    let next = match mode {
                        Composite::Over => blend_over(current, Rgba([s[0], s[1], s[2], s[3]])),
                        Composite::EraseToBase(base) => {
                            let bi = y * stride + di;
                            let b = base.as_raw();
                            let base_px = Rgba([b[bi], b[bi + 1], b[bi + 2], b[bi + 3]]);
                            erase_to_base(current, s[3], base_px)
                        }
                    };
                    if next != current {
                        dst_row[di..di + 4].copy_from_slice(&next.0);
                        row_changed = true;
                    }
                }
                row_changed
            })
            .reduce(|| false, |a, b| a || b);

        if changed {
            self.mark_dirty();
        }
        changed
    }

    /// Encode the current content as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.pixels)
    }
}

/// Scale `image` to exactly `width`×`height`, copying when already that size.
pub(crate) fn fit_to(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

/// Decode any supported bitmap into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.into_rgba8())
}

pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| PaintError::InvalidFormat(format!("not a PNG: {}", e)))?;
    Ok(img.into_rgba8())
}

// ============================================================================
// PIXEL BLENDING
// ============================================================================

/// Straight-alpha source-over.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let top_a = top[3] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Destination-out by `erase_alpha`, then destination-over with `base`.
/// A fully erased pixel becomes exactly the base pixel.
pub fn erase_to_base(current: Rgba<u8>, erase_alpha: u8, base: Rgba<u8>) -> Rgba<u8> {
    if erase_alpha == 0 {
        return current;
    }
    let keep = 1.0 - erase_alpha as f32 / 255.0;
    let remaining = (current[3] as f32 * keep).round() as u8;
    blend_over(base, Rgba([current[0], current[1], current[2], remaining]))
}
