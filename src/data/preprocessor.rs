// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns decoded images of any size and colour type into the
// fixed-size RGB layout the backbone was trained on.
//
// Steps:
//   1. Resize to image_size × image_size (exact, no crop)
//   2. Convert to 8-bit RGB, stored row-major HWC
//   3. At batch time: HWC u8 → CHW f32 with fixed standardisation
//
// Fixed standardisation is what the casia-webface weights expect:
//   x' = (x - 127.5) / 128   →   0 ↦ -0.996, 255 ↦ 0.996

use image::{imageops::FilterType, DynamicImage};

/// Number of colour channels fed to the network
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    image_size: u32,
}

impl Preprocessor {
    pub fn new(image_size: u32) -> Self {
        Self { image_size }
    }

    /// Resize and convert one image; returns HWC RGB bytes.
    pub fn prepare(&self, image: &DynamicImage) -> Vec<u8> {
        image
            .resize_exact(self.image_size, self.image_size, FilterType::Triangle)
            .to_rgb8()
            .into_raw()
    }
}

/// Map one 8-bit channel value into roughly [-1, 1].
pub fn standardize(value: u8) -> f32 {
    (value as f32 - 127.5) / 128.0
}

/// Reorder HWC bytes into standardised CHW floats.
///
/// `hwc.len()` must equal `size * size * CHANNELS`.
pub fn hwc_to_chw(hwc: &[u8], size: usize) -> Vec<f32> {
    let plane = size * size;
    let mut out = vec![0.0f32; plane * CHANNELS];
    for (i, px) in hwc.chunks_exact(CHANNELS).enumerate() {
        for (c, &v) in px.iter().enumerate() {
            out[c * plane + i] = standardize(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_standardize_range() {
        assert!((standardize(0) + 0.996).abs() < 1e-3);
        assert!((standardize(255) - 0.996).abs() < 1e-3);
        assert!(standardize(128).abs() < 0.01);
    }

    #[test]
    fn test_prepare_resizes_to_square_rgb() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 6, Rgb([1, 2, 3])));
        let bytes = Preprocessor::new(4).prepare(&img);
        assert_eq!(bytes.len(), 4 * 4 * CHANNELS);
        assert_eq!(&bytes[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_hwc_to_chw_splits_planes() {
        // 2×2 image: every pixel is (255, 0, 128)
        let hwc = [255u8, 0, 128].repeat(4);
        let chw = hwc_to_chw(&hwc, 2);
        assert_eq!(chw.len(), 12);
        assert!(chw[..4].iter().all(|&v| v > 0.99));
        assert!(chw[4..8].iter().all(|&v| v < -0.99));
        assert!(chw[8..].iter().all(|&v| v.abs() < 0.01));
    }
}
