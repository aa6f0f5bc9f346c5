//! Landmark centroids and the distances derived from them.
//!
//! An object qualifies for measurement when it carries exactly two sub-feature
//! contours. Its two centroids become the left and right landmarks (by ascending
//! x, input order on ties). Pairs are built between the right landmarks of every
//! two qualifying objects in the same image.

use imageproc::point::Point;
use tracing::{debug, warn};

use crate::error::ContourError;
use crate::models::{
    AnnotationMap, AnnotationRecord, EncodedContour, Landmark, ObjectId, PairRecord,
    canonical_pair,
};

/// Totals for one measurement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasureSummary {
    pub images: usize,
    pub qualifying_objects: usize,
    pub pairs: usize,
}

/// Round to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Area-weighted centroid of a polygon.
///
/// Falls back to the arithmetic mean of the points when the signed area is zero
/// (collinear or repeated points). Returns `None` only for an empty slice.
pub fn polygon_centroid(points: &[Point<i32>]) -> Option<Landmark> {
    if points.is_empty() {
        return None;
    }

    let n = points.len();
    // Exact integer sums: twice the signed area and six times area-weighted moments.
    // i128 holds them for any pair of i32 coordinates.
    let mut area2: i128 = 0;
    let mut mx: i128 = 0;
    let mut my: i128 = 0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let (px, py, qx, qy) = (p.x as i128, p.y as i128, q.x as i128, q.y as i128);
        let cross = px * qy - qx * py;
        area2 += cross;
        mx += (px + qx) * cross;
        my += (py + qy) * cross;
    }

    if area2 == 0 {
        let sx: i64 = points.iter().map(|p| p.x as i64).sum();
        let sy: i64 = points.iter().map(|p| p.y as i64).sum();
        return Some(Landmark::new(sx as f64 / n as f64, sy as f64 / n as f64));
    }

    let denom = 3.0 * area2 as f64;
    Some(Landmark::new(mx as f64 / denom, my as f64 / denom))
}

/// Left and right landmark of exactly two sub-feature contours, sorted by x.
pub fn landmarks(contours: &[EncodedContour; 2]) -> Result<(Landmark, Landmark), ContourError> {
    let mut centroids = Vec::with_capacity(2);
    for contour in contours {
        let points = contour.decode()?;
        centroids.push(polygon_centroid(&points).ok_or(ContourError::Empty)?);
    }
    // Stable: equal x keeps input order.
    centroids.sort_by(|a, b| a.x.total_cmp(&b.x));
    Ok((centroids[0], centroids[1]))
}

/// Recompute landmarks, intra-object distances and the pair list of one record.
///
/// Non-qualifying objects lose any earlier measurement; the pair list is rebuilt
/// from scratch. Returns `(qualifying objects, pairs)`.
pub fn measure_record(record: &mut AnnotationRecord) -> (usize, usize) {
    let mut qualifying: Vec<(ObjectId, Landmark)> = Vec::new();

    for obj in record.objects.iter_mut() {
        obj.clear_measurement();

        let Ok(pair) = <&[EncodedContour; 2]>::try_from(obj.sub_features.contours()) else {
            continue;
        };
        match landmarks(pair) {
            Ok((left, right)) => {
                obj.landmark_left = Some(left);
                obj.landmark_right = Some(right);
                obj.intra_distance = Some(round2(left.distance(&right)));
                qualifying.push((obj.object_id, right));
            }
            Err(e) => warn!(
                object_id = obj.object_id,
                "Sub-feature contour unreadable, object not measured: {}", e
            ),
        }
    }

    let mut pairs = Vec::new();
    for (i, (id_a, right_a)) in qualifying.iter().enumerate() {
        for (id_b, right_b) in &qualifying[i + 1..] {
            pairs.push(PairRecord {
                object_1_id: *id_a,
                object_2_id: *id_b,
                distance: round2(right_a.distance(right_b)),
            });
        }
    }

    let counts = (qualifying.len(), pairs.len());
    record.pairs = Some(pairs);
    counts
}

/// Measure every record in the mapping.
pub fn measure_all(data: &mut AnnotationMap) -> MeasureSummary {
    let mut summary = MeasureSummary::default();
    for (img_name, record) in data.iter_mut() {
        let (objects, pairs) = measure_record(record);
        debug!(image = %img_name, objects, pairs, "Measured");
        summary.images += 1;
        summary.qualifying_objects += objects;
        summary.pairs += pairs;
    }
    summary
}

/// Stored distance between two objects' right landmarks, in either argument order.
pub fn pair_distance(record: &AnnotationRecord, a: ObjectId, b: ObjectId) -> Option<f64> {
    let key = canonical_pair(a, b);
    record
        .pairs
        .as_deref()?
        .iter()
        .find(|p| p.canonical_ids() == key)
        .map(|p| p.distance)
}
