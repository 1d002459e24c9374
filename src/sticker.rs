use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::Path;
use uuid::Uuid;

use crate::error::{PaintError, Result};
use crate::surface::decode_image;

/// Imported bitmaps larger than this on either side are scaled down.
pub const MAX_STICKER_DIM: u32 = 512;

/// A bitmap that can be stamped onto the surface.
#[derive(Clone, Debug)]
pub struct Sticker {
    id: Uuid,
    name: String,
    bitmap: RgbaImage,
}

impl Sticker {
    /// Wrap an already decoded bitmap, capping it at [`MAX_STICKER_DIM`].
    pub fn from_image(name: &str, bitmap: RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bitmap: fit_within(bitmap, MAX_STICKER_DIM),
        }
    }

    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let bitmap = decode_image(bytes)?;
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(PaintError::InvalidFormat(format!("sticker '{}' is empty", name)));
        }
        Ok(Self::from_image(name, bitmap))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sticker".to_string());
        let sticker = Self::from_bytes(&name, &bytes)?;
        crate::log_info!(
            "Sticker '{}' loaded from {} ({}x{})",
            sticker.name,
            path.display(),
            sticker.bitmap.width(),
            sticker.bitmap.height()
        );
        Ok(sticker)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }
}

/// Scale down preserving aspect ratio so neither side exceeds `max`.
fn fit_within(bitmap: RgbaImage, max: u32) -> RgbaImage {
    let (w, h) = bitmap.dimensions();
    if w <= max && h <= max {
        return bitmap;
    }
    let scale = (max as f32 / w as f32).min(max as f32 / h as f32);
    let nw = ((w as f32 * scale).floor() as u32).max(1);
    let nh = ((h as f32 * scale).floor() as u32).max(1);
    imageops::resize(&bitmap, nw, nh, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::encode_png;
    use image::Rgba;

    #[test]
    fn test_large_sticker_downscaled() {
        let sticker = Sticker::from_image("wide", RgbaImage::new(2048, 1024));
        assert_eq!(sticker.bitmap().dimensions(), (512, 256));
    }

    #[test]
    fn test_small_sticker_untouched() {
        let sticker = Sticker::from_image("small", RgbaImage::new(40, 30));
        assert_eq!(sticker.bitmap().dimensions(), (40, 30));
        assert_eq!(sticker.name(), "small");
    }

    #[test]
    fn test_from_bytes() {
        let png = encode_png(&RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255]))).unwrap();
        let sticker = Sticker::from_bytes("star", &png).unwrap();
        assert_eq!(*sticker.bitmap().get_pixel(1, 1), Rgba([1, 2, 3, 255]));
        assert!(Sticker::from_bytes("junk", b"junk").is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Sticker::from_image("a", RgbaImage::new(1, 1));
        let b = Sticker::from_image("a", RgbaImage::new(1, 1));
        assert_ne!(a.id(), b.id());
    }
}
