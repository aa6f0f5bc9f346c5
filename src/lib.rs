pub mod cancel;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod steps;
pub mod store;
pub mod visualize;

pub use cancel::CancelToken;
pub use config::Settings;
pub use error::{ContourError, GroundTruthError, StoreError};
pub use models::{
    AnnotationMap, AnnotationRecord, BoundingBox, EncodedContour, Landmark, ObjectId,
    ObjectRecord, PairRecord, SubFeatures,
};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineStep, StepOutcome};
pub use store::AnnotationStore;
