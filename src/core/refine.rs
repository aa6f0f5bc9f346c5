use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::core::masking::isolate_object;
use crate::detection::RefinementDetector;
use crate::detection::contours::mask_to_contours;
use crate::models::{AnnotationMap, AnnotationRecord, EncodedContour, ObjectRecord, SubFeatures};

#[derive(Debug, Clone)]
pub struct RefineOptions {
    /// Text prompt handed to the refinement detector
    pub prompt: String,
    /// Re-query objects whose previous attempt found nothing
    pub retry_empty: bool,
    /// Where isolated views are written, if anywhere
    pub debug_dir: Option<PathBuf>,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            prompt: "eyes".to_string(),
            retry_empty: true,
            debug_dir: None,
        }
    }
}

/// Counters for one refinement run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefineSummary {
    pub images_visited: usize,
    pub images_skipped: usize,
    pub objects_refined: usize,
    pub objects_empty: usize,
    pub objects_skipped: usize,
    pub cancelled: bool,
}

/// Fills in sub-features object by object, never touching finished objects.
pub struct IncrementalRefiner<D> {
    detector: D,
    options: RefineOptions,
}

impl<D: RefinementDetector> IncrementalRefiner<D> {
    pub fn new(detector: D, options: RefineOptions) -> Self {
        Self { detector, options }
    }

    pub fn options(&self) -> &RefineOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RefineOptions) {
        self.options = options;
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Refine every record, loading images from `image_root`.
    ///
    /// Records with no outstanding objects are not even opened. On cancellation the
    /// loop stops before the next detector call and returns; whatever was written
    /// into `data` so far stays there for the caller to persist.
    pub fn refine_all(
        &mut self,
        data: &mut AnnotationMap,
        image_root: &Path,
        cancel: &CancelToken,
    ) -> RefineSummary {
        let mut summary = RefineSummary::default();

        for (img_name, record) in data.iter_mut() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let pending = record
                .objects
                .iter()
                .filter(|o| o.sub_features.needs_refinement(self.options.retry_empty))
                .count();
            if pending == 0 {
                summary.objects_skipped += record.objects.len();
                debug!(image = %img_name, "All objects refined, skipping image");
                continue;
            }

            let img_path = image_root.join(img_name);
            let image = match image::open(&img_path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    warn!(path = %img_path.display(), "Unreadable image, skipping: {}", e);
                    summary.images_skipped += 1;
                    continue;
                }
            };

            info!(image = %img_name, pending, "Refining");
            summary.images_visited += 1;
            self.refine_record(img_name, record, &image, cancel, &mut summary);
            if summary.cancelled {
                break;
            }
        }

        summary
    }

    /// Refine the outstanding objects of one record against its decoded image.
    pub fn refine_record(
        &mut self,
        img_name: &str,
        record: &mut AnnotationRecord,
        image: &RgbImage,
        cancel: &CancelToken,
        summary: &mut RefineSummary,
    ) {
        for index in 0..record.objects.len() {
            let obj = &record.objects[index];
            if !obj.sub_features.needs_refinement(self.options.retry_empty) {
                debug!(
                    object_id = obj.object_id,
                    class = %obj.class_label,
                    "Sub-features present, skipping"
                );
                summary.objects_skipped += 1;
                continue;
            }

            if cancel.is_cancelled() {
                summary.cancelled = true;
                return;
            }

            let found = self.refine_object(img_name, image, &record.objects, index);
            if found.is_empty() {
                summary.objects_empty += 1;
            } else {
                summary.objects_refined += 1;
            }
            record.objects[index].sub_features = SubFeatures::Refined(found);
        }
    }

    /// Query the detector for one object. Failures yield an empty result.
    fn refine_object(
        &mut self,
        img_name: &str,
        image: &RgbImage,
        objects: &[ObjectRecord],
        index: usize,
    ) -> Vec<EncodedContour> {
        let obj = &objects[index];
        let Some(isolated) = isolate_object(image, objects, index) else {
            return Vec::new();
        };
        self.save_debug_view(img_name, obj, &isolated);

        let masks = match self.detector.refine(&isolated, &self.options.prompt) {
            Ok(masks) => masks,
            Err(e) => {
                warn!(
                    object_id = obj.object_id,
                    detector = self.detector.name(),
                    "Refinement failed, marking as empty: {:#}", e
                );
                return Vec::new();
            }
        };

        let found: Vec<EncodedContour> = masks
            .iter()
            .flat_map(|mask| mask_to_contours(mask))
            .map(|points| EncodedContour::encode(&points))
            .collect();

        if found.is_empty() {
            info!(
                object_id = obj.object_id,
                class = %obj.class_label,
                prompt = %self.options.prompt,
                "No sub-features found"
            );
        } else {
            info!(
                object_id = obj.object_id,
                class = %obj.class_label,
                count = found.len(),
                "Added sub-features"
            );
        }
        found
    }

    fn save_debug_view(&self, img_name: &str, obj: &ObjectRecord, isolated: &RgbImage) {
        let Some(dir) = &self.options.debug_dir else {
            return;
        };
        let stem = Path::new(img_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(img_name);
        let out = dir.join(format!("{}_obj{}.png", stem, obj.object_id));
        match isolated.save(&out) {
            Ok(()) => debug!(path = %out.display(), "Saved isolated view"),
            Err(e) => warn!(path = %out.display(), "Failed to save isolated view: {}", e),
        }
    }
}
