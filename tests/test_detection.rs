//! Integration tests for the built-in detectors and contour tracing.

mod common;

use annomeasure::detection::contours::{
    external_contours, find_regions, mask_to_contours, open_polygon, simplify_chain,
};
use annomeasure::detection::preprocessing::{Polarity, binarize};
use annomeasure::detection::{DarkSpotRefiner, PrimaryDetector, RefinementDetector, ThresholdDetector};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::point::Point;

use common::*;

#[test]
fn test_threshold_detector_finds_scene_objects() -> anyhow::Result<()> {
    let mut detector = ThresholdDetector {
        blur_sigma: 0.0,
        threshold: Some(128),
        class_label: "card".to_string(),
        ..ThresholdDetector::default()
    };

    let detections = detector.detect(&DynamicImage::ImageRgb8(scene_image()))?;

    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].bbox, BoundingBox::new(30, 30, 90, 70));
    assert_eq!(detections[1].bbox, BoundingBox::new(130, 30, 190, 70));
    assert_eq!(detections[0].class_label, "card");
    // The dark spots are holes, not part of the outline
    assert_eq!(detections[0].contour.len(), 4);
    assert!(detections[0].confidence > 0.85 && detections[0].confidence < 1.0);

    Ok(())
}

#[test]
fn test_threshold_detector_drops_small_regions() -> anyhow::Result<()> {
    let mut img = uniform_image(50, 50, image::Rgb([0, 0, 0]));
    img.put_pixel(10, 10, WHITE);
    img.put_pixel(11, 10, WHITE);
    let mut detector = ThresholdDetector {
        blur_sigma: 0.0,
        threshold: Some(128),
        ..ThresholdDetector::default()
    };

    assert!(detector.detect(&DynamicImage::ImageRgb8(img))?.is_empty());

    Ok(())
}

#[test]
fn test_dark_spot_refiner_ignores_neutral_pixels() -> anyhow::Result<()> {
    // Black everywhere (masked out) except a white window with one dark spot
    let mut view = uniform_image(100, 100, image::Rgb([0, 0, 0]));
    for y in 20..80 {
        for x in 20..80 {
            view.put_pixel(x, y, WHITE);
        }
    }
    for y in 45..56 {
        for x in 45..56 {
            view.put_pixel(x, y, SPOT);
        }
    }

    let masks = DarkSpotRefiner::default().refine(&view, "eyes")?;

    assert_eq!(masks.len(), 1);
    assert_eq!(masks[0].dimensions(), (100, 100));
    assert_eq!(masks[0].get_pixel(50, 50)[0], 255);
    assert_eq!(masks[0].get_pixel(5, 5)[0], 0);

    Ok(())
}

#[test]
fn test_square_mask_traces_to_corners() {
    let mask = square_mask(40, 40, 20, 20, 5);
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);

    let mut corners = contours[0].clone();
    corners.sort_by_key(|p| (p.y, p.x));
    assert_eq!(
        corners,
        vec![
            Point::new(15, 15),
            Point::new(25, 15),
            Point::new(15, 25),
            Point::new(25, 25),
        ]
    );
}

#[test]
fn test_nested_regions_are_ignored() {
    // Ring with a dot inside its hole: only the ring's outer border counts
    let mut mask = GrayImage::new(50, 50);
    for y in 10..40 {
        for x in 10..40 {
            let ring = !(15..35).contains(&x) || !(15..35).contains(&y);
            if ring {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    for y in 23..27 {
        for x in 23..27 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    let contours = mask_to_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert!(contours[0].contains(&Point::new(10, 10)));
}

#[test]
fn test_find_regions_orders_by_position() {
    let mut binary = GrayImage::new(30, 30);
    for (x, y) in [(20, 2), (21, 2), (2, 2), (2, 3), (5, 20)] {
        binary.put_pixel(x, y, Luma([255]));
    }

    let found = find_regions(&binary, 1);
    let corners: Vec<(u32, u32)> = found.regions.iter().map(|r| (r.min_x, r.min_y)).collect();
    assert_eq!(corners, vec![(2, 2), (20, 2), (5, 20)]);

    let found = find_regions(&binary, 2);
    assert_eq!(found.regions.len(), 2);
}

#[test]
fn test_simplify_and_open_polygon() {
    let chain = [
        Point::new(0, 0),
        Point::new(1, 0),
        Point::new(2, 0),
        Point::new(2, 1),
        Point::new(2, 2),
        Point::new(0, 2),
    ];
    assert_eq!(
        simplify_chain(&chain),
        vec![
            Point::new(0, 0),
            Point::new(2, 0),
            Point::new(2, 2),
            Point::new(0, 2)
        ]
    );

    let closed = [Point::new(0, 0), Point::new(3, 0), Point::new(3, 3), Point::new(0, 0)];
    assert_eq!(open_polygon(&closed).len(), 3);
}

#[test]
fn test_binarize_polarity() {
    let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 10 } else { 200 }]));
    let bright = binarize(&img, 100, Polarity::Bright);
    let dark = binarize(&img, 100, Polarity::Dark);
    assert_eq!((bright.get_pixel(0, 0)[0], bright.get_pixel(1, 0)[0]), (0, 255));
    assert_eq!((dark.get_pixel(0, 0)[0], dark.get_pixel(1, 0)[0]), (255, 0));
}
