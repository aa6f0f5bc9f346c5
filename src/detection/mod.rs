pub mod contours;
pub mod heuristic;
pub mod preprocessing;

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::point::Point;

use crate::models::BoundingBox;

pub use heuristic::{DarkSpotRefiner, ThresholdDetector};

/// One object reported by a primary detector.
#[derive(Debug, Clone)]
pub struct Detection {
    pub class_label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub contour: Vec<Point<i32>>,
}

/// Whole-image object segmentation.
///
/// Calls block until the model answers; there is no implicit timeout.
pub trait PrimaryDetector {
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>>;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;
}

/// Prompted segmentation run on an isolated view of a single object.
///
/// Returns zero or more binary masks with the dimensions of the input image.
pub trait RefinementDetector {
    fn refine(&mut self, image: &RgbImage, prompt: &str) -> anyhow::Result<Vec<GrayImage>>;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;
}

impl<T: PrimaryDetector + ?Sized> PrimaryDetector for Box<T> {
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        (**self).detect(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: RefinementDetector + ?Sized> RefinementDetector for Box<T> {
    fn refine(&mut self, image: &RgbImage, prompt: &str) -> anyhow::Result<Vec<GrayImage>> {
        (**self).refine(image, prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
