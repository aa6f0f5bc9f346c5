use std::collections::BTreeMap;

use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::error::ContourError;

/// Identifier of an object within one image. Assigned at detection time, never reused.
pub type ObjectId = u32;

/// The whole persisted document: image filename -> record.
/// A `BTreeMap` keeps the serialized key order deterministic.
pub type AnnotationMap = BTreeMap<String, AnnotationRecord>;

/// Axis-aligned box in image pixels, `[x1, y1, x2, y2]` with `x1 < x2`, `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        self.width().max(0) as i64 * self.height().max(0) as i64
    }

    /// Half-open containment: `x1 <= x < x2`, `y1 <= y < y2`.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Clamp the box to an image of the given size. May produce an empty box.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let w = width as i32;
        let h = height as i32;
        Self {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        }
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Polygon stored as compact JSON text, e.g. `"[[10,20],[30,20],[30,40]]"`.
///
/// Decoding is deferred until a stage needs the geometry, so a single corrupt
/// contour never prevents the document from loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawContour", into = "String")]
pub struct EncodedContour(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContour {
    Text(String),
    Points(Vec<[f64; 2]>),
    /// Anything else is kept verbatim and fails when decoded
    Other(serde_json::Value),
}

impl From<RawContour> for EncodedContour {
    fn from(raw: RawContour) -> Self {
        match raw {
            RawContour::Text(text) => Self(text),
            RawContour::Points(points) => {
                let ints: Vec<[i64; 2]> = points.iter().map(|p| [p[0] as i64, p[1] as i64]).collect();
                Self(serde_json::to_string(&ints).unwrap_or_default())
            }
            RawContour::Other(value) => Self(value.to_string()),
        }
    }
}

impl From<EncodedContour> for String {
    fn from(c: EncodedContour) -> Self {
        c.0
    }
}

impl EncodedContour {
    /// Wrap already-encoded text without validating it.
    pub fn from_raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn encode(points: &[Point<i32>]) -> Self {
        let mut out = String::with_capacity(points.len() * 10 + 2);
        out.push('[');
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format!("[{},{}]", p.x, p.y));
        }
        out.push(']');
        Self(out)
    }

    /// Parse the polygon. Fractional coordinates are truncated to whole pixels.
    pub fn decode(&self) -> Result<Vec<Point<i32>>, ContourError> {
        let raw: Vec<[f64; 2]> = serde_json::from_str(&self.0)?;
        if raw.is_empty() {
            return Err(ContourError::Empty);
        }
        raw.into_iter()
            .map(|[x, y]| {
                for v in [x, y] {
                    if !v.is_finite() || v.abs() > i32::MAX as f64 {
                        return Err(ContourError::OutOfRange(v));
                    }
                }
                Ok(Point::new(x as i32, y as i32))
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Refinement state of an object's sub-features.
///
/// On disk `Pending` is an absent (or `null`) field and `Refined` is an array,
/// which makes "never attempted" and "attempted, nothing found" distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Vec<EncodedContour>>", into = "Option<Vec<EncodedContour>>")]
pub enum SubFeatures {
    #[default]
    Pending,
    Refined(Vec<EncodedContour>),
}

impl From<Option<Vec<EncodedContour>>> for SubFeatures {
    fn from(v: Option<Vec<EncodedContour>>) -> Self {
        match v {
            Some(contours) => SubFeatures::Refined(contours),
            None => SubFeatures::Pending,
        }
    }
}

impl From<SubFeatures> for Option<Vec<EncodedContour>> {
    fn from(s: SubFeatures) -> Self {
        match s {
            SubFeatures::Pending => None,
            SubFeatures::Refined(contours) => Some(contours),
        }
    }
}

impl SubFeatures {
    pub fn is_pending(&self) -> bool {
        matches!(self, SubFeatures::Pending)
    }

    pub fn contours(&self) -> &[EncodedContour] {
        match self {
            SubFeatures::Pending => &[],
            SubFeatures::Refined(contours) => contours,
        }
    }

    /// Whether the refiner should query the detector for this object.
    /// Objects that already carry contours are never reprocessed.
    pub fn needs_refinement(&self, retry_empty: bool) -> bool {
        match self {
            SubFeatures::Pending => true,
            SubFeatures::Refined(contours) => contours.is_empty() && retry_empty,
        }
    }
}

/// A sub-feature centroid in image pixels, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Landmark {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<Landmark> for [f64; 2] {
    fn from(l: Landmark) -> Self {
        [l.x, l.y]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub object_id: ObjectId,
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub segmentation: EncodedContour,
    #[serde(default, skip_serializing_if = "SubFeatures::is_pending")]
    pub sub_features: SubFeatures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark_left: Option<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark_right: Option<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intra_distance: Option<f64>,
}

impl ObjectRecord {
    pub fn new(
        object_id: ObjectId,
        class_label: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
        segmentation: EncodedContour,
    ) -> Self {
        Self {
            object_id,
            class_label: class_label.into(),
            confidence,
            bbox,
            segmentation,
            sub_features: SubFeatures::Pending,
            landmark_left: None,
            landmark_right: None,
            intra_distance: None,
        }
    }

    /// Left landmark, right landmark and their distance, when measured.
    pub fn measurement(&self) -> Option<(Landmark, Landmark, f64)> {
        match (self.landmark_left, self.landmark_right, self.intra_distance) {
            (Some(l), Some(r), Some(d)) => Some((l, r, d)),
            _ => None,
        }
    }

    pub fn clear_measurement(&mut self) {
        self.landmark_left = None;
        self.landmark_right = None;
        self.intra_distance = None;
    }
}

/// Distance between the right landmarks of two objects. Refers to objects by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub object_1_id: ObjectId,
    pub object_2_id: ObjectId,
    pub distance: f64,
}

impl PairRecord {
    pub fn canonical_ids(&self) -> (ObjectId, ObjectId) {
        canonical_pair(self.object_1_id, self.object_2_id)
    }
}

/// Order-independent key for an unordered pair of objects.
pub fn canonical_pair(a: ObjectId, b: ObjectId) -> (ObjectId, ObjectId) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub width: u32,
    pub height: u32,
    pub objects_found: usize,
    pub objects: Vec<ObjectRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<Vec<PairRecord>>,
}

impl AnnotationRecord {
    pub fn new(width: u32, height: u32, objects: Vec<ObjectRecord>) -> Self {
        Self {
            width,
            height,
            objects_found: objects.len(),
            objects,
            pairs: None,
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.objects.iter().find(|o| o.object_id == id)
    }

    pub fn has_metrics(&self) -> bool {
        self.objects.iter().any(|o| o.intra_distance.is_some())
    }
}
