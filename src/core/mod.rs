pub mod geometry;
pub mod masking;
pub mod refine;
pub mod verify;

pub use geometry::{MeasureSummary, measure_all, measure_record, pair_distance, polygon_centroid};
pub use masking::{NEUTRAL, isolate_object};
pub use refine::{IncrementalRefiner, RefineOptions, RefineSummary};
pub use verify::{
    ComputedDistances, GroundTruthRow, MeasurementKind, Outcome, VerdictThresholds,
    VerificationReport, Verdict, read_ground_truth, verify,
};
