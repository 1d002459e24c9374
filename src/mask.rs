use image::RgbaImage;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;

use crate::raster::Scratch;
use crate::surface::fit_to;

// ============================================================================
// REGION MASKS
// ============================================================================

/// Name of a paintable region ("head", "jacket", ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskId(String);

impl MaskId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Parse a user-facing mask name.  `"none"` and the empty string mean
    /// "unrestricted" and yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alpha stencil at surface resolution.  RGB is always white; alpha carries
/// the source image's red channel.
pub struct Mask {
    id: MaskId,
    stencil: RgbaImage,
}

impl Mask {
    pub fn id(&self) -> &MaskId {
        &self.id
    }

    pub fn stencil(&self) -> &RgbaImage {
        &self.stencil
    }

    /// Point-sample the stencil.  Out-of-bounds samples are fully masked.
    pub fn alpha_at(&self, x: f32, y: f32) -> u8 {
        if x < 0.0 || y < 0.0 {
            return 0;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.stencil.width() || y >= self.stencil.height() {
            return 0;
        }
        self.stencil.get_pixel(x, y)[3]
    }

    /// Destination-in: multiply the scratch alpha by the stencil alpha.
    pub fn clip(&self, scratch: &mut Scratch) {
        let (ox, oy) = (scratch.x, scratch.y);
        for (lx, ly, px) in scratch.image.enumerate_pixels_mut() {
            if px[3] == 0 {
                continue;
            }
            let (gx, gy) = (ox + lx, oy + ly);
            let m = if gx < self.stencil.width() && gy < self.stencil.height() {
                self.stencil.get_pixel(gx, gy)[3]
            } else {
                0
            };
            px[3] = ((px[3] as u16 * m as u16 + 127) / 255) as u8;
        }
    }
}

/// Scale `source` to `width`×`height` and turn its red channel into alpha.
pub fn build_mask(id: MaskId, source: &RgbaImage, width: u32, height: u32) -> Mask {
    let mut stencil = fit_to(source, width, height);
    let raw: &mut [u8] = &mut stencil;
    raw.par_chunks_mut(4).for_each(|px| {
        let red = px[0];
        px.copy_from_slice(&[255, 255, 255, red]);
    });
    Mask { id, stencil }
}

/// All masks of a session, built once and immutable afterwards.
#[derive(Default)]
pub struct MaskRegistry {
    masks: HashMap<MaskId, Mask>,
}

impl MaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every mask whose source image is available.  Missing sources are
    /// skipped; lookups for them behave as unrestricted.
    pub fn from_sources(
        sources: HashMap<MaskId, Option<RgbaImage>>,
        width: u32,
        height: u32,
    ) -> Self {
        let mut registry = Self::new();
        for (id, source) in sources {
            match source {
                Some(image) => {
                    crate::log_info!(
                        "Mask '{}' built from {}x{} source at {}x{}",
                        id,
                        image.width(),
                        image.height(),
                        width,
                        height
                    );
                    registry.insert(build_mask(id, &image, width, height));
                }
                None => {
                    crate::log_warn!("Mask '{}' has no source image, region left unrestricted", id);
                }
            }
        }
        registry
    }

    pub fn insert(&mut self, mask: Mask) {
        self.masks.insert(mask.id.clone(), mask);
    }

    /// `None` means unrestricted.
    pub fn get(&self, id: Option<&MaskId>) -> Option<&Mask> {
        id.and_then(|id| self.masks.get(id))
    }

    pub fn contains(&self, id: &MaskId) -> bool {
        self.masks.contains_key(id)
    }

    /// Known mask ids in sorted order.
    pub fn ids(&self) -> Vec<&MaskId> {
        let mut ids: Vec<&MaskId> = self.masks.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// Convenience for building a source where the left half is inside the
/// region, used by tests across the crate.
#[cfg(test)]
pub(crate) fn half_mask_source(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_red_channel_becomes_alpha() {
        let source = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 20, 255]));
        let mask = build_mask(MaskId::new("head"), &source, 4, 4);
        assert_eq!(*mask.stencil().get_pixel(2, 2), Rgba([255, 255, 255, 200]));
    }

    #[test]
    fn test_mask_scaled_to_surface() {
        let source = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mask = build_mask(MaskId::new("jacket"), &source, 8, 8);
        assert_eq!(mask.stencil().dimensions(), (8, 8));
        assert_eq!(mask.alpha_at(7.5, 7.5), 255);
        assert_eq!(mask.alpha_at(8.0, 0.0), 0);
        assert_eq!(mask.alpha_at(-1.0, 0.0), 0);
    }

    #[test]
    fn test_parse_none() {
        assert_eq!(MaskId::parse("none"), None);
        assert_eq!(MaskId::parse(""), None);
        assert_eq!(MaskId::parse("head"), Some(MaskId::new("head")));
    }

    #[test]
    fn test_registry_skips_missing_sources() {
        let mut sources = HashMap::new();
        sources.insert(MaskId::new("head"), Some(half_mask_source(4, 4)));
        sources.insert(MaskId::new("jacket"), None);
        sources.insert(MaskId::new("arms"), Some(half_mask_source(2, 2)));
        let registry = MaskRegistry::from_sources(sources, 4, 4);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![&MaskId::new("arms"), &MaskId::new("head")]);
        assert!(registry.get(Some(&MaskId::new("head"))).is_some());
        assert!(registry.get(Some(&MaskId::new("jacket"))).is_none());
        assert!(registry.get(None).is_none());
    }

    #[test]
    fn test_clip_multiplies_alpha() {
        let mask = build_mask(MaskId::new("head"), &half_mask_source(4, 4), 4, 4);
        let mut scratch = Scratch {
            x: 0,
            y: 0,
            image: RgbaImage::from_pixel(4, 1, Rgba([0, 0, 255, 255])),
        };
        mask.clip(&mut scratch);
        assert_eq!(scratch.image.get_pixel(0, 0)[3], 255);
        assert_eq!(scratch.image.get_pixel(1, 0)[3], 255);
        assert_eq!(scratch.image.get_pixel(2, 0)[3], 0);
        assert_eq!(scratch.image.get_pixel(3, 0)[3], 0);
    }
}
