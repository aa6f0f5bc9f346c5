mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from annomeasure for tests
pub use annomeasure::core::{IncrementalRefiner, RefineOptions, RefineSummary};
pub use annomeasure::{
    AnnotationMap, AnnotationRecord, AnnotationStore, BoundingBox, CancelToken, EncodedContour,
    Landmark, ObjectRecord, PairRecord, SubFeatures,
};
