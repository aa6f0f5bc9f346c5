use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

/// Which side of the threshold counts as foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Dark,
    Bright,
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise. A non-positive sigma leaves the image untouched.
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    gaussian_blur_f32(img, sigma)
}

/// Fixed threshold if given, Otsu's level otherwise.
pub fn threshold_level(img: &GrayImage, fixed: Option<u8>) -> u8 {
    fixed.unwrap_or_else(|| otsu_level(img))
}

/// Binary mask (255 = foreground) from a grayscale image.
pub fn binarize(img: &GrayImage, level: u8, polarity: Polarity) -> GrayImage {
    let mut binary = img.clone();
    for p in binary.pixels_mut() {
        let fg = match polarity {
            Polarity::Dark => p.0[0] < level,
            Polarity::Bright => p.0[0] > level,
        };
        *p = if fg { Luma([255]) } else { Luma([0]) };
    }
    binary
}
