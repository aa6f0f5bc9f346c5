//! Model-free detectors built from classic image processing.
//!
//! They let the stages run end to end without model weights; real segmentation
//! models plug in through the same traits.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use tracing::debug;

use super::contours::{self, find_regions};
use super::preprocessing::{self, Polarity};
use super::{Detection, PrimaryDetector, RefinementDetector};

/// Foreground segmentation: blur, threshold, split into connected regions.
pub struct ThresholdDetector {
    pub blur_sigma: f32,
    /// Fixed threshold; Otsu's level when `None`
    pub threshold: Option<u8>,
    pub polarity: Polarity,
    pub min_area: u32,
    pub class_label: String,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            threshold: None,
            polarity: Polarity::Bright,
            min_area: 100,
            class_label: "object".to_string(),
        }
    }
}

impl PrimaryDetector for ThresholdDetector {
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        let gray = preprocessing::to_grayscale(image);
        let blurred = preprocessing::apply_blur(&gray, self.blur_sigma);
        let level = preprocessing::threshold_level(&blurred, self.threshold);
        let binary = preprocessing::binarize(&blurred, level, self.polarity);

        let found = find_regions(&binary, self.min_area);
        debug!(level, regions = found.regions.len(), "thresholded image");

        let mut detections = Vec::new();
        for region in &found.regions {
            let mask = region.mask(&found.labels);
            let Some(outline) = contours::external_contours(&mask)
                .into_iter()
                .max_by_key(|c| c.len())
            else {
                continue;
            };

            detections.push(Detection {
                class_label: self.class_label.clone(),
                confidence: (region.fill_ratio() * 10_000.0).round() / 10_000.0,
                bbox: region.bbox(),
                contour: outline,
            });
        }

        Ok(detections)
    }

    fn name(&self) -> &str {
        "Threshold Detector"
    }
}

/// Finds dark spots inside the visible (non-neutral) part of an isolated view.
///
/// The text prompt is accepted for interface compatibility and ignored.
pub struct DarkSpotRefiner {
    /// Gray values strictly below this count as dark
    pub dark_threshold: u8,
    pub min_area: u32,
}

impl Default for DarkSpotRefiner {
    fn default() -> Self {
        Self {
            dark_threshold: 60,
            min_area: 4,
        }
    }
}

impl RefinementDetector for DarkSpotRefiner {
    fn refine(&mut self, image: &RgbImage, prompt: &str) -> anyhow::Result<Vec<GrayImage>> {
        let gray = image::imageops::grayscale(image);
        let mut binary = GrayImage::new(image.width(), image.height());
        for (x, y, px) in image.enumerate_pixels() {
            // Neutral pixels are masked-out area, not dark content.
            if px.0 == [0, 0, 0] {
                continue;
            }
            if gray.get_pixel(x, y)[0] < self.dark_threshold {
                binary.put_pixel(x, y, Luma([255]));
            }
        }

        let found = find_regions(&binary, self.min_area);
        debug!(prompt, spots = found.regions.len(), "dark spot search");

        Ok(found
            .regions
            .iter()
            .map(|r| r.mask(&found.labels))
            .collect())
    }

    fn name(&self) -> &str {
        "Dark Spot Refiner"
    }
}
