use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::models::AnnotationMap;
use crate::store::AnnotationStore;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

impl DebugConfig {
    /// Output directory if debug mode is on
    pub fn dir(&self) -> Option<&PathBuf> {
        self.enabled.then_some(&self.output_dir)
    }
}

/// Context available to all pipeline steps
#[derive(Clone, Debug)]
pub struct PipelineContext {
    /// Folder the record keys (image filenames) are relative to
    pub image_root: PathBuf,
    pub cancel: CancelToken,
    pub debug: Option<DebugConfig>,
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Stopped early on the cancel token; the data holds its partial progress
    Cancelled,
}

/// One stage of the annotation workflow
pub trait PipelineStep {
    /// Mutate the document in place. Whatever the step has written is persisted
    /// afterwards, even when it returns an error or is cancelled.
    fn process(&mut self, data: &mut AnnotationMap, context: &PipelineContext) -> Result<StepOutcome>;

    /// Human-readable name for this step (used in log output)
    fn name(&self) -> &str;

    /// Whether the annotation document must already exist before this step runs
    fn requires_document(&self) -> bool {
        true
    }
}

/// Composable pipeline builder: loads the document, runs steps in order and
/// persists after every step.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    store: AnnotationStore,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new(store: AnnotationStore, image_root: impl Into<PathBuf>) -> Self {
        Self {
            steps: Vec::new(),
            store,
            context: PipelineContext {
                image_root: image_root.into(),
                cancel: CancelToken::new(),
                debug: None,
            },
        }
    }

    /// Share a cancel token with the caller (e.g. a signal handler)
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.context.cancel = cancel;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: impl PipelineStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Helper method to add an already boxed step
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Run every step in order and return the final document.
    ///
    /// Loading the document is a setup step: if it fails nothing is mutated. After
    /// that the store is written after every step regardless of how the step
    /// ended; a cancelled step prevents the remaining ones from starting.
    pub fn run(&mut self) -> Result<AnnotationMap> {
        let needs_document = self.steps.first().is_some_and(|s| s.requires_document());
        let mut data = if needs_document {
            self.store.load()
        } else {
            self.store.load_or_default()
        }
        .with_context(|| format!("Failed to load {:?}", self.store.path()))?;

        for step in self.steps.iter_mut() {
            let step_name = step.name().to_string();
            info!(step = %step_name, images = data.len(), "Running step");

            let outcome = step.process(&mut data, &self.context);

            let saved = self.store.save(&data);
            if let Err(e) = &saved {
                error!(step = %step_name, "Failed to save progress: {}", e);
            }

            let outcome = outcome.with_context(|| format!("Step '{}' failed", step_name))?;
            saved.with_context(|| format!("Failed to save after step '{}'", step_name))?;

            if outcome == StepOutcome::Cancelled {
                warn!(step = %step_name, "Run cancelled, progress saved, remaining steps skipped");
                break;
            }
        }

        Ok(data)
    }
}
