//! Integration tests for ground-truth verification.

mod common;

use annomeasure::GroundTruthError;
use annomeasure::core::verify::parse_ground_truth;
use annomeasure::core::{
    ComputedDistances, GroundTruthRow, MeasurementKind, Outcome, Verdict, VerdictThresholds,
    measure_all, read_ground_truth, verify,
};

use common::*;

fn individual(image: &str, id: u32, expected: f64) -> GroundTruthRow {
    GroundTruthRow {
        image_name: image.to_string(),
        kind: MeasurementKind::Individual,
        object_1: id,
        object_2: None,
        expected,
    }
}

fn pair(image: &str, a: u32, b: u32, expected: f64) -> GroundTruthRow {
    GroundTruthRow {
        image_name: image.to_string(),
        kind: MeasurementKind::Pair,
        object_1: a,
        object_2: Some(b),
        expected,
    }
}

fn measured_scene() -> AnnotationMap {
    let mut data = AnnotationMap::new();
    data.insert("scene.png".to_string(), measured_scene_record());
    measure_all(&mut data);
    data
}

#[test]
fn test_single_row_mae() {
    let mut data = AnnotationMap::new();
    let mut record = AnnotationRecord::new(100, 100, vec![make_object(0, [0, 0, 50, 50])]);
    record.objects[0].intra_distance = Some(22.5);
    data.insert("img.png".to_string(), record);

    let computed = ComputedDistances::from_annotations(&data);
    let report = verify(
        &[individual("img.png", 0, 20.0)],
        &computed,
        VerdictThresholds::default(),
    );

    assert_eq!(report.matches, 1);
    assert_eq!(report.misses, 0);
    assert_close(report.mae().expect("one match"), 2.5);
    assert_eq!(report.verdict(), Verdict::Excellent);
}

#[test]
fn test_scene_matches_expected_table() {
    let data = measured_scene();
    let rows = vec![
        individual("scene.png", 0, 20.0),
        individual("scene.png", 1, 20.0),
        // Pair ids in reverse order still match
        pair("scene.png", 1, 0, 100.0),
    ];

    let report = verify(
        &rows,
        &ComputedDistances::from_annotations(&data),
        VerdictThresholds::default(),
    );

    assert_eq!(report.matches, 3);
    assert_close(report.mae().expect("matches"), 0.0);
    assert!(
        report
            .rows
            .iter()
            .all(|r| matches!(r.outcome, Outcome::Match { .. }))
    );
}

#[test]
fn test_missing_values_are_misses_not_errors() {
    let data = measured_scene();
    let rows = vec![
        individual("scene.png", 0, 20.0),
        individual("scene.png", 9, 20.0),
        individual("other.png", 0, 20.0),
        pair("scene.png", 0, 9, 50.0),
    ];

    let report = verify(
        &rows,
        &ComputedDistances::from_annotations(&data),
        VerdictThresholds::default(),
    );

    assert_eq!(report.matches, 1);
    assert_eq!(report.misses, 3);
    assert_close(report.mae().expect("one match"), 0.0);
    assert_eq!(report.rows[1].outcome, Outcome::Miss);
}

#[test]
fn test_zero_distance_is_detection_failure() {
    let mut data = AnnotationMap::new();
    let mut record = AnnotationRecord::new(100, 100, vec![make_object(0, [0, 0, 50, 50])]);
    record.objects[0].intra_distance = Some(0.0);
    data.insert("img.png".to_string(), record);

    let report = verify(
        &[individual("img.png", 0, 15.0)],
        &ComputedDistances::from_annotations(&data),
        VerdictThresholds::default(),
    );

    assert_eq!(report.failures, 1);
    assert_eq!(report.matches, 0);
    assert_eq!(report.mae(), None);
    assert_eq!(report.verdict(), Verdict::NoData);
}

#[test]
fn test_verdict_bands() {
    let mut data = AnnotationMap::new();
    let mut record = AnnotationRecord::new(100, 100, vec![make_object(0, [0, 0, 50, 50])]);
    record.objects[0].intra_distance = Some(30.0);
    data.insert("img.png".to_string(), record);
    let computed = ComputedDistances::from_annotations(&data);
    let thresholds = VerdictThresholds::default();

    let verdict = |expected| verify(&[individual("img.png", 0, expected)], &computed, thresholds).verdict();
    assert_eq!(verdict(27.0), Verdict::Excellent);
    assert_eq!(verdict(23.0), Verdict::Passable);
    assert_eq!(verdict(10.0), Verdict::FlagForReview);
    assert_eq!(Verdict::FlagForReview.to_string(), "flag for review");
}

#[test]
fn test_parse_ground_truth_table() -> anyhow::Result<()> {
    let text = "\u{feff}Type,Image_Name,Obj_ID_1,Obj_ID_2,Expected_Dist\n\
                Individual,a.jpg,0,,20.5\n\
                Pair,a.jpg,1.0,0,101.25\n\
                \n\
                Pair,a.jpg,2,,40\n\
                Unknown,a.jpg,0,,1\n\
                Individual,b.jpg,x,,3\n\
                Individual,b.jpg,3,,abc\n";

    let rows = parse_ground_truth(text)?;
    assert_eq!(
        rows,
        vec![individual("a.jpg", 0, 20.5), pair("a.jpg", 1, 0, 101.25)]
    );

    Ok(())
}

#[test]
fn test_parse_ground_truth_errors() {
    assert!(matches!(parse_ground_truth(""), Err(GroundTruthError::Empty)));
    assert!(matches!(
        parse_ground_truth("Image_Name,Type,Obj_ID_1,Expected_Dist\n"),
        Err(GroundTruthError::MissingColumn("Obj_ID_2"))
    ));
}

#[test]
fn test_read_ground_truth_file() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("ground_truth.csv");

    assert!(matches!(
        read_ground_truth(&path),
        Err(GroundTruthError::NotFound(_))
    ));

    std::fs::write(
        &path,
        "Image_Name,Type,Obj_ID_1,Obj_ID_2,Expected_Dist\nscene.png,Individual,0,,20\n",
    )?;
    let rows = read_ground_truth(&path)?;
    assert_eq!(rows, vec![individual("scene.png", 0, 20.0)]);

    Ok(())
}

#[test]
fn test_report_table_lists_every_row() {
    let data = measured_scene();
    let rows = vec![individual("scene.png", 0, 21.0), individual("scene.png", 5, 3.0)];
    let report = verify(
        &rows,
        &ComputedDistances::from_annotations(&data),
        VerdictThresholds::default(),
    );

    let table = report.to_string();
    assert!(table.contains("MISS"));
    assert!(table.contains("20.00"));
    assert!(table.contains("MAE:                1.000 px"));
    assert!(table.contains("Verdict:            excellent"));
}

#[test]
fn test_parse_quoted_fields() -> anyhow::Result<()> {
    let text = "\"Image_Name\",\"Type\",\"Obj_ID_1\",\"Obj_ID_2\",\"Expected_Dist\"\n\
                \"cat.jpg\",\"Individual\",\"0\",,\"20.0\"\n\
                \"dogs, two.jpg\", \"Pair\" ,1,\"2\",55.5\n\
                \"say \"\"hi\"\".png\",Individual,3,,7\n";

    let rows = parse_ground_truth(text)?;
    assert_eq!(
        rows,
        vec![
            individual("cat.jpg", 0, 20.0),
            pair("dogs, two.jpg", 1, 2, 55.5),
            individual("say \"hi\".png", 3, 7.0),
        ]
    );

    Ok(())
}
