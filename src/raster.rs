use image::{Rgba, RgbaImage};

use crate::mapper::PixelPos;

// ============================================================================
// SCRATCH SHAPES - rasterised before masking and compositing
// ============================================================================

/// A rasterised shape covering the region `(x, y)..(x + w, y + h)` of the
/// surface, in straight-alpha RGBA.  Only the shape's clipped bounds are
/// allocated; everything outside is implicitly transparent.
pub struct Scratch {
    pub x: u32,
    pub y: u32,
    pub image: RgbaImage,
}

impl Scratch {
    /// True when no pixel has any alpha.
    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|p| p[3] == 0)
    }
}

/// Pixel-space bounds clipped to the surface, `None` when nothing remains.
fn clipped_bounds(
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let x0 = min_x.floor().max(0.0).min(width as f32) as u32;
    let y0 = min_y.floor().max(0.0).min(height as f32) as u32;
    let x1 = max_x.ceil().max(0.0).min(width as f32) as u32;
    let y1 = max_y.ceil().max(0.0).min(height as f32) as u32;
    if x0 >= x1 || y0 >= y1 {
        None
    } else {
        Some((x0, y0, x1, y1))
    }
}

/// One-pixel anti-aliased edge: full coverage inside `radius - 0.5`, none
/// beyond `radius + 0.5`.
fn edge_coverage(dist: f32, radius: f32) -> f32 {
    (radius + 0.5 - dist).clamp(0.0, 1.0)
}

/// Distance from `p` to the segment from `a` to `b`.
fn segment_distance(px: f32, py: f32, a: PixelPos, b: PixelPos) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.x + dx * t;
    let cy = a.y + dy * t;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Filled circle of the given radius.  `opacity` scales the coverage alpha.
pub fn circle(
    center: PixelPos,
    radius: f32,
    color: [u8; 3],
    opacity: f32,
    width: u32,
    height: u32,
) -> Option<Scratch> {
    line(center, center, radius * 2.0, color, opacity, width, height)
}

/// Straight segment with round caps, `stroke_width` wide.  A zero-length
/// segment degenerates to a filled circle.
pub fn line(
    start: PixelPos,
    end: PixelPos,
    stroke_width: f32,
    color: [u8; 3],
    opacity: f32,
    width: u32,
    height: u32,
) -> Option<Scratch> {
    let radius = stroke_width / 2.0;
    if radius <= 0.0 || opacity <= 0.0 {
        return None;
    }

    let pad = radius + 1.0;
    let (x0, y0, x1, y1) = clipped_bounds(
        start.x.min(end.x) - pad,
        start.y.min(end.y) - pad,
        start.x.max(end.x) + pad,
        start.y.max(end.y) + pad,
        width,
        height,
    )?;

    let opacity = opacity.clamp(0.0, 1.0);
    let mut image = RgbaImage::new(x1 - x0, y1 - y0);
    for (lx, ly, px) in image.enumerate_pixels_mut() {
        let cx = (x0 + lx) as f32 + 0.5;
        let cy = (y0 + ly) as f32 + 0.5;
        let coverage = edge_coverage(segment_distance(cx, cy, start, end), radius);
        if coverage > 0.0 {
            let a = (coverage * opacity * 255.0).round() as u8;
            *px = Rgba([color[0], color[1], color[2], a]);
        }
    }

    Some(Scratch { x: x0, y: y0, image })
}

/// Bilinear sample with edge pixels extended past the border.
fn bilinear_clamped(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let max_x = img.width() as i64 - 1;
    let max_y = img.height() as i64 - 1;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |px: i64, py: i64| -> [f32; 4] {
        let p = img.get_pixel(px.clamp(0, max_x) as u32, py.clamp(0, max_y) as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Blit `bitmap` stretched to `size`×`size`, centred on `center`.
pub fn sticker(
    bitmap: &RgbaImage,
    center: PixelPos,
    size: u32,
    width: u32,
    height: u32,
) -> Option<Scratch> {
    if size == 0 || bitmap.width() == 0 || bitmap.height() == 0 {
        return None;
    }

    let left = (center.x - size as f32 / 2.0).round() as i64;
    let top = (center.y - size as f32 / 2.0).round() as i64;

    let x0 = left.clamp(0, width as i64) as u32;
    let y0 = top.clamp(0, height as i64) as u32;
    let x1 = (left + size as i64).clamp(0, width as i64) as u32;
    let y1 = (top + size as i64).clamp(0, height as i64) as u32;
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    // Only the visible part is sampled, straight from the source bitmap
    let sx = bitmap.width() as f32 / size as f32;
    let sy = bitmap.height() as f32 / size as f32;
    let image = RgbaImage::from_fn(x1 - x0, y1 - y0, |lx, ly| {
        let u = ((x0 + lx) as i64 - left) as f32 + 0.5;
        let v = ((y0 + ly) as i64 - top) as f32 + 0.5;
        bilinear_clamped(bitmap, u * sx - 0.5, v * sy - 0.5)
    });

    Some(Scratch { x: x0, y: y0, image })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(s: &Scratch, x: u32, y: u32) -> u8 {
        if x < s.x || y < s.y || x >= s.x + s.image.width() || y >= s.y + s.image.height() {
            return 0;
        }
        s.image.get_pixel(x - s.x, y - s.y)[3]
    }

    #[test]
    fn test_circle_covers_center_only() {
        let s = circle(PixelPos { x: 32.0, y: 32.0 }, 4.0, [255, 0, 0], 1.0, 64, 64).unwrap();
        assert_eq!(alpha_at(&s, 32, 32), 255);
        assert_eq!(alpha_at(&s, 31, 31), 255);
        assert_eq!(alpha_at(&s, 40, 32), 0);
        assert_eq!(alpha_at(&s, 0, 0), 0);
        assert_eq!(s.image.get_pixel(32 - s.x, 32 - s.y).0[..3], [255, 0, 0]);
    }

    #[test]
    fn test_opacity_scales_alpha() {
        let s = circle(PixelPos { x: 8.0, y: 8.0 }, 4.0, [0, 0, 0], 0.5, 16, 16).unwrap();
        assert_eq!(alpha_at(&s, 8, 8), 128);
    }

    #[test]
    fn test_line_connects_endpoints() {
        let s = line(
            PixelPos { x: 5.0, y: 10.0 },
            PixelPos { x: 50.0, y: 10.0 },
            4.0,
            [0, 0, 255],
            1.0,
            64,
            64,
        )
        .unwrap();
        for x in 5..50 {
            assert_eq!(alpha_at(&s, x, 10), 255, "gap at x={}", x);
        }
        assert_eq!(alpha_at(&s, 27, 20), 0);
    }

    #[test]
    fn test_clipped_outside_surface() {
        assert!(circle(PixelPos { x: -50.0, y: -50.0 }, 4.0, [0, 0, 0], 1.0, 16, 16).is_none());
        let s = circle(PixelPos { x: 0.0, y: 0.0 }, 4.0, [0, 0, 0], 1.0, 16, 16).unwrap();
        assert_eq!((s.x, s.y), (0, 0));
        assert!(s.image.width() <= 6);
    }

    #[test]
    fn test_sticker_centered_and_clipped() {
        let bitmap = RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255]));
        let s = sticker(&bitmap, PixelPos { x: 10.0, y: 10.0 }, 4, 32, 32).unwrap();
        assert_eq!((s.x, s.y), (8, 8));
        assert_eq!(s.image.dimensions(), (4, 4));
        assert_eq!(*s.image.get_pixel(0, 0), Rgba([9, 8, 7, 255]));

        let edge = sticker(&bitmap, PixelPos { x: 0.0, y: 0.0 }, 4, 32, 32).unwrap();
        assert_eq!((edge.x, edge.y), (0, 0));
        assert_eq!(edge.image.dimensions(), (2, 2));
    }

    #[test]
    fn test_sticker_samples_exact_size() {
        let bitmap = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 0, 255]));
        let s = sticker(&bitmap, PixelPos { x: 10.0, y: 10.0 }, 4, 32, 32).unwrap();
        assert_eq!(s.image, bitmap);
    }

    #[test]
    fn test_huge_sticker_only_rasterises_visible_part() {
        let bitmap = RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255]));
        let s = sticker(&bitmap, PixelPos { x: 32.0, y: 32.0 }, 2_000_000_000, 64, 64).unwrap();
        assert_eq!((s.x, s.y), (0, 0));
        assert_eq!(s.image.dimensions(), (64, 64));
        assert!(s.image.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }
}
