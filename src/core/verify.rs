use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GroundTruthError;
use crate::models::{AnnotationMap, ObjectId, canonical_pair};

const COL_IMAGE: &str = "Image_Name";
const COL_TYPE: &str = "Type";
const COL_ID_1: &str = "Obj_ID_1";
const COL_ID_2: &str = "Obj_ID_2";
const COL_EXPECTED: &str = "Expected_Dist";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    /// Distance between the two landmarks of one object
    Individual,
    /// Distance between the right landmarks of two objects
    Pair,
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementKind::Individual => write!(f, "Individual"),
            MeasurementKind::Pair => write!(f, "Pair"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruthRow {
    pub image_name: String,
    pub kind: MeasurementKind,
    pub object_1: ObjectId,
    /// Present for `Pair` rows only
    pub object_2: Option<ObjectId>,
    pub expected: f64,
}

impl GroundTruthRow {
    fn ids_label(&self) -> String {
        match self.object_2 {
            Some(b) => format!("{}-{}", self.object_1, b),
            None => self.object_1.to_string(),
        }
    }
}

/// Read a ground-truth CSV file.
pub fn read_ground_truth(path: &Path) -> Result<Vec<GroundTruthRow>, GroundTruthError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            GroundTruthError::NotFound(path.to_path_buf())
        } else {
            GroundTruthError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_ground_truth(&text)
}

/// Parse ground-truth CSV text. Columns are located by header name; rows that
/// cannot be understood are logged and skipped.
pub fn parse_ground_truth(text: &str) -> Result<Vec<GroundTruthRow>, GroundTruthError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = split_fields(lines.next().ok_or(GroundTruthError::Empty)?);
    let column = |name: &'static str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or(GroundTruthError::MissingColumn(name))
    };
    let image_col = column(COL_IMAGE)?;
    let type_col = column(COL_TYPE)?;
    let id1_col = column(COL_ID_1)?;
    let id2_col = column(COL_ID_2)?;
    let expected_col = column(COL_EXPECTED)?;

    let mut rows = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let parts = split_fields(line);
        let field = |idx: usize| parts.get(idx).map(String::as_str).unwrap_or("");

        let kind = match field(type_col) {
            "Individual" => MeasurementKind::Individual,
            "Pair" => MeasurementKind::Pair,
            other => {
                warn!(line = line_no + 2, "Unknown measurement type {:?}, row skipped", other);
                continue;
            }
        };
        let Some(object_1) = parse_id(field(id1_col)) else {
            warn!(line = line_no + 2, "Bad object id, row skipped");
            continue;
        };
        let object_2 = match kind {
            MeasurementKind::Individual => None,
            MeasurementKind::Pair => match parse_id(field(id2_col)) {
                Some(id) => Some(id),
                None => {
                    warn!(line = line_no + 2, "Pair row without second object id, skipped");
                    continue;
                }
            },
        };
        let Ok(expected) = field(expected_col).parse::<f64>() else {
            warn!(line = line_no + 2, "Bad expected distance, row skipped");
            continue;
        };

        rows.push(GroundTruthRow {
            image_name: field(image_col).to_string(),
            kind,
            object_1,
            object_2,
            expected,
        });
    }

    Ok(rows)
}

/// Split one CSV line into trimmed fields. Double-quoted fields may contain
/// commas, and `""` inside quotes is a literal quote. Quoted line breaks are
/// not supported.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Accepts `3` as well as spreadsheet-style `3.0`.
fn parse_id(s: &str) -> Option<ObjectId> {
    s.parse::<ObjectId>().ok().or_else(|| {
        let v = s.parse::<f64>().ok()?;
        (v.fract() == 0.0 && v >= 0.0 && v <= ObjectId::MAX as f64).then_some(v as ObjectId)
    })
}

/// Computed distances indexed for ground-truth lookup. Pair keys are canonical.
#[derive(Debug, Clone, Default)]
pub struct ComputedDistances {
    individual: HashMap<(String, ObjectId), f64>,
    pairs: HashMap<(String, (ObjectId, ObjectId)), f64>,
}

impl ComputedDistances {
    pub fn from_annotations(data: &AnnotationMap) -> Self {
        let mut computed = Self::default();
        for (img_name, record) in data {
            for obj in &record.objects {
                if let Some(d) = obj.intra_distance {
                    computed
                        .individual
                        .insert((img_name.clone(), obj.object_id), d);
                }
            }
            for pair in record.pairs.iter().flatten() {
                computed
                    .pairs
                    .insert((img_name.clone(), pair.canonical_ids()), pair.distance);
            }
        }
        computed
    }

    pub fn lookup(&self, row: &GroundTruthRow) -> Option<f64> {
        match (row.kind, row.object_2) {
            (MeasurementKind::Individual, _) => self
                .individual
                .get(&(row.image_name.clone(), row.object_1))
                .copied(),
            (MeasurementKind::Pair, Some(b)) => self
                .pairs
                .get(&(row.image_name.clone(), canonical_pair(row.object_1, b)))
                .copied(),
            (MeasurementKind::Pair, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Both values present; `error` is the absolute difference
    Match { computed: f64, error: f64 },
    /// The object or pair never reached the measurement stage
    Miss,
    /// Computed exactly zero where a non-zero distance was expected
    DetectionFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    pub row: GroundTruthRow,
    pub outcome: Outcome,
}

/// MAE bands for the informational verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictThresholds {
    pub excellent_below: f64,
    pub passable_below: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            excellent_below: 5.0,
            passable_below: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Excellent,
    Passable,
    FlagForReview,
    NoData,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Excellent => "excellent",
            Verdict::Passable => "passable",
            Verdict::FlagForReview => "flag for review",
            Verdict::NoData => "no comparable data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub rows: Vec<RowResult>,
    pub matches: usize,
    pub misses: usize,
    pub failures: usize,
    pub total_abs_error: f64,
    pub thresholds: VerdictThresholds,
}

impl VerificationReport {
    /// Mean absolute error over matched rows only.
    pub fn mae(&self) -> Option<f64> {
        (self.matches > 0).then(|| self.total_abs_error / self.matches as f64)
    }

    pub fn verdict(&self) -> Verdict {
        match self.mae() {
            None => Verdict::NoData,
            Some(mae) if mae < self.thresholds.excellent_below => Verdict::Excellent,
            Some(mae) if mae < self.thresholds.passable_below => Verdict::Passable,
            Some(_) => Verdict::FlagForReview,
        }
    }
}

/// Classify every ground-truth row against the computed distances.
pub fn verify(
    rows: &[GroundTruthRow],
    computed: &ComputedDistances,
    thresholds: VerdictThresholds,
) -> VerificationReport {
    let mut report = VerificationReport {
        rows: Vec::with_capacity(rows.len()),
        matches: 0,
        misses: 0,
        failures: 0,
        total_abs_error: 0.0,
        thresholds,
    };

    for row in rows {
        let outcome = match computed.lookup(row) {
            None => {
                report.misses += 1;
                Outcome::Miss
            }
            Some(actual) if actual == 0.0 && row.expected != 0.0 => {
                report.failures += 1;
                Outcome::DetectionFailure
            }
            Some(actual) => {
                let error = (actual - row.expected).abs();
                report.matches += 1;
                report.total_abs_error += error;
                Outcome::Match {
                    computed: actual,
                    error,
                }
            }
        };
        report.rows.push(RowResult {
            row: row.clone(),
            outcome,
        });
    }

    report
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<18} | {:<10} | {:<10} | {:<10} | {:<10} | {}",
            "Image", "Type", "Objects", "Expected", "Computed", "Error"
        )?;
        writeln!(f, "{}", "-".repeat(85))?;
        for r in &self.rows {
            let name: String = r.row.image_name.chars().take(18).collect();
            let (computed, error) = match r.outcome {
                Outcome::Match { computed, error } => {
                    (format!("{:.2}", computed), format!("{:.2}", error))
                }
                Outcome::Miss => ("MISS".to_string(), "N/A".to_string()),
                Outcome::DetectionFailure => ("0.00".to_string(), "detection failure".to_string()),
            };
            writeln!(
                f,
                "{:<18} | {:<10} | {:<10} | {:<10.2} | {:<10} | {}",
                name,
                r.row.kind.to_string(),
                r.row.ids_label(),
                r.row.expected,
                computed,
                error
            )?;
        }
        writeln!(f, "{}", "-".repeat(85))?;
        writeln!(f, "Matched:            {}", self.matches)?;
        writeln!(f, "Missed:             {}", self.misses)?;
        writeln!(f, "Detection failures: {}", self.failures)?;
        match self.mae() {
            Some(mae) => writeln!(f, "MAE:                {:.3} px", mae)?,
            None => writeln!(f, "MAE:                n/a")?,
        }
        write!(f, "Verdict:            {}", self.verdict())
    }
}
