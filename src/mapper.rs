/// Normalised texture-space coordinate produced by a surface hit.
/// Both axes are in `0.0..=1.0`, with V growing upwards.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Uv {
    pub x: f32,
    pub y: f32,
}

impl Uv {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Sub-pixel position on the surface buffer, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PixelPos {
    pub x: f32,
    pub y: f32,
}

/// Map a UV hit to surface pixels.  V is flipped because texture rows are
/// addressed top-down while UV space grows bottom-up.  No clamping: the UV
/// must come from a real surface hit.
pub fn to_pixel(uv: Uv, width: u32, height: u32) -> PixelPos {
    PixelPos {
        x: uv.x * width as f32,
        y: (1.0 - uv.y) * height as f32,
    }
}

/// Straight-line distance between two UV points.
pub fn uv_distance(a: Uv, b: Uv) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners() {
        assert_eq!(to_pixel(Uv::new(0.0, 0.0), 1024, 512), PixelPos { x: 0.0, y: 512.0 });
        assert_eq!(to_pixel(Uv::new(1.0, 1.0), 1024, 512), PixelPos { x: 1024.0, y: 0.0 });
    }

    #[test]
    fn test_affine_map() {
        for &(u, v) in &[(0.25_f32, 0.75_f32), (0.5, 0.5), (0.1, 0.9), (0.999, 0.001)] {
            let p = to_pixel(Uv::new(u, v), 1024, 1024);
            assert_eq!(p.x, u * 1024.0);
            assert_eq!(p.y, (1.0 - v) * 1024.0);
        }
    }

    #[test]
    fn test_uv_distance() {
        let d = uv_distance(Uv::new(0.0, 0.0), Uv::new(0.5, 0.5));
        assert!((d - 0.70710677).abs() < 1e-6);
        assert_eq!(uv_distance(Uv::new(0.3, 0.3), Uv::new(0.3, 0.3)), 0.0);
    }
}
