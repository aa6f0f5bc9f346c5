use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::core::{IncrementalRefiner, RefineOptions, geometry};
use crate::detection::{PrimaryDetector, RefinementDetector};
use crate::models::{AnnotationMap, AnnotationRecord, EncodedContour, ObjectId, ObjectRecord};
use crate::pipeline::{PipelineContext, PipelineStep, StepOutcome};
use crate::visualize::{self, ClassPalette};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Image files directly inside `folder`, sorted by name.
pub fn list_images(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if let (true, Some(name)) = (is_image, path.file_name().and_then(|n| n.to_str())) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Run the primary detector on images that have no record yet
pub struct DetectionStep<D> {
    pub detector: D,
}

impl<D: PrimaryDetector> DetectionStep<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: PrimaryDetector> PipelineStep for DetectionStep<D> {
    fn process(&mut self, data: &mut AnnotationMap, context: &PipelineContext) -> Result<StepOutcome> {
        let folder = &context.image_root;
        if !folder.is_dir() {
            anyhow::bail!("Image folder does not exist: {}", folder.display());
        }
        let images = list_images(folder)?;
        if images.is_empty() {
            anyhow::bail!("Image folder is empty: {}", folder.display());
        }

        let new_images: Vec<&String> = images.iter().filter(|n| !data.contains_key(*n)).collect();
        info!(
            found = images.len(),
            new = new_images.len(),
            detector = self.detector.name(),
            "Detecting objects"
        );

        for img_name in new_images {
            if context.cancel.is_cancelled() {
                return Ok(StepOutcome::Cancelled);
            }

            let path = folder.join(img_name);
            let img = match image::open(&path) {
                Ok(img) => img,
                Err(e) => {
                    warn!(path = %path.display(), "Unreadable image, skipping: {}", e);
                    continue;
                }
            };

            let detections = match self.detector.detect(&img) {
                Ok(d) => d,
                Err(e) => {
                    warn!(image = %img_name, "Detection failed, skipping: {:#}", e);
                    continue;
                }
            };

            let objects: Vec<ObjectRecord> = detections
                .into_iter()
                .enumerate()
                .map(|(i, d)| {
                    ObjectRecord::new(
                        i as ObjectId,
                        d.class_label,
                        d.confidence,
                        d.bbox,
                        EncodedContour::encode(&d.contour),
                    )
                })
                .collect();

            info!(image = %img_name, objects = objects.len(), "Detected");
            data.insert(
                img_name.clone(),
                AnnotationRecord::new(img.width(), img.height(), objects),
            );
        }

        Ok(StepOutcome::Completed)
    }

    fn name(&self) -> &str {
        "Object Detection"
    }

    fn requires_document(&self) -> bool {
        false
    }
}

/// Fill in sub-features for objects that have none yet
pub struct RefinementStep<D> {
    refiner: IncrementalRefiner<D>,
}

impl<D: RefinementDetector> RefinementStep<D> {
    /// Isolated views go to the pipeline's debug directory when debug mode is on,
    /// unless `options.debug_dir` already names one.
    pub fn new(detector: D, options: RefineOptions) -> Self {
        Self {
            refiner: IncrementalRefiner::new(detector, options),
        }
    }
}

impl<D: RefinementDetector> PipelineStep for RefinementStep<D> {
    fn process(&mut self, data: &mut AnnotationMap, context: &PipelineContext) -> Result<StepOutcome> {
        if self.refiner.options().debug_dir.is_none() {
            if let Some(dir) = context.debug.as_ref().and_then(|d| d.dir()) {
                let mut options = self.refiner.options().clone();
                options.debug_dir = Some(dir.clone());
                self.refiner.set_options(options);
            }
        }

        let summary = self.refiner.refine_all(data, &context.image_root, &context.cancel);
        info!(
            visited = summary.images_visited,
            unreadable = summary.images_skipped,
            refined = summary.objects_refined,
            empty = summary.objects_empty,
            skipped = summary.objects_skipped,
            "Refinement finished"
        );

        Ok(if summary.cancelled {
            StepOutcome::Cancelled
        } else {
            StepOutcome::Completed
        })
    }

    fn name(&self) -> &str {
        "Sub-feature Refinement"
    }
}

/// Where measurement overlays are written
pub struct VisualOutput {
    pub output_dir: PathBuf,
    pub palette: ClassPalette,
}

/// Compute landmarks, distances and pairs; optionally draw overlays
pub struct MeasurementStep {
    pub visuals: Option<VisualOutput>,
}

impl MeasurementStep {
    pub fn new() -> Self {
        Self { visuals: None }
    }

    pub fn with_visuals(mut self, output_dir: PathBuf, palette: ClassPalette) -> Self {
        self.visuals = Some(VisualOutput { output_dir, palette });
        self
    }
}

impl Default for MeasurementStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MeasurementStep {
    fn process(&mut self, data: &mut AnnotationMap, context: &PipelineContext) -> Result<StepOutcome> {
        let summary = geometry::measure_all(data);
        info!(
            images = summary.images,
            measured = summary.qualifying_objects,
            pairs = summary.pairs,
            "Measurement finished"
        );

        if let Some(visuals) = &mut self.visuals {
            visualize::write_overlays(
                data,
                &context.image_root,
                &visuals.output_dir,
                &mut visuals.palette,
            )?;
        }

        Ok(StepOutcome::Completed)
    }

    fn name(&self) -> &str {
        "Measurement"
    }
}
