use std::path::{Path, PathBuf};

use annomeasure::CancelToken;
use annomeasure::detection::{Detection, PrimaryDetector, RefinementDetector};
use annomeasure::{AnnotationRecord, BoundingBox, EncodedContour, ObjectId, ObjectRecord, SubFeatures};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::point::Point;
use imageproc::rect::Rect;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const SPOT: Rgb<u8> = Rgb([20, 20, 20]);

/// Corner points of an axis-aligned square spanning `cx±half`, `cy±half`.
pub fn square(cx: i32, cy: i32, half: i32) -> Vec<Point<i32>> {
    vec![
        Point::new(cx - half, cy - half),
        Point::new(cx + half, cy - half),
        Point::new(cx + half, cy + half),
        Point::new(cx - half, cy + half),
    ]
}

pub fn square_contour(cx: i32, cy: i32, half: i32) -> EncodedContour {
    EncodedContour::encode(&square(cx, cy, half))
}

/// Object whose primary contour is the outline of its bounding box.
pub fn make_object(id: ObjectId, bbox: [i32; 4]) -> ObjectRecord {
    let [x1, y1, x2, y2] = bbox;
    let outline = vec![
        Point::new(x1, y1),
        Point::new(x2 - 1, y1),
        Point::new(x2 - 1, y2 - 1),
        Point::new(x1, y2 - 1),
    ];
    ObjectRecord::new(
        id,
        "object",
        0.9,
        BoundingBox::from(bbox),
        EncodedContour::encode(&outline),
    )
}

/// Object that already carries the given sub-feature contours.
pub fn refined_object(id: ObjectId, bbox: [i32; 4], contours: Vec<EncodedContour>) -> ObjectRecord {
    let mut obj = make_object(id, bbox);
    obj.sub_features = SubFeatures::Refined(contours);
    obj
}

/// The measurement example: two objects, each with two square sub-features,
/// centred at (50,50)/(70,50) and (150,50)/(170,50).
pub fn measured_scene_record() -> AnnotationRecord {
    AnnotationRecord::new(
        200,
        200,
        vec![
            refined_object(
                0,
                [30, 30, 90, 70],
                vec![square_contour(50, 50, 5), square_contour(70, 50, 5)],
            ),
            refined_object(
                1,
                [130, 30, 190, 70],
                vec![square_contour(150, 50, 5), square_contour(170, 50, 5)],
            ),
        ],
    )
}

/// 200x200 black image with two white rectangles, each holding two dark square spots
/// at the positions used by [`measured_scene_record`].
pub fn scene_image() -> RgbImage {
    let mut img = RgbImage::new(200, 200);
    for x0 in [30, 130] {
        draw_filled_rect_mut(&mut img, Rect::at(x0, 30).of_size(60, 40), WHITE);
        for cx in [x0 + 20, x0 + 40] {
            draw_filled_rect_mut(&mut img, Rect::at(cx - 5, 45).of_size(11, 11), SPOT);
        }
    }
    img
}

pub fn uniform_image(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}

/// Save `img` as `dir/name` and return the path.
pub fn save_image(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("Failed to save test image");
    path
}

/// Binary mask with a filled square spanning `cx±half`, `cy±half`.
pub fn square_mask(width: u32, height: u32, cx: i32, cy: i32, half: i32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let side = (2 * half + 1) as u32;
    draw_filled_rect_mut(&mut mask, Rect::at(cx - half, cy - half).of_size(side, side), Luma([255]));
    mask
}

/// Refinement detector returning the same masks on every call.
pub struct ScriptedRefiner {
    pub masks: Vec<GrayImage>,
    pub calls: usize,
    pub prompts: Vec<String>,
}

impl ScriptedRefiner {
    pub fn new(masks: Vec<GrayImage>) -> Self {
        Self {
            masks,
            calls: 0,
            prompts: Vec::new(),
        }
    }

    /// Two 11x11 squares centred at (40,50) and (60,50) on a 100x100 canvas.
    pub fn two_spots() -> Self {
        Self::new(vec![
            square_mask(100, 100, 40, 50, 5),
            square_mask(100, 100, 60, 50, 5),
        ])
    }
}

impl RefinementDetector for ScriptedRefiner {
    fn refine(&mut self, _image: &RgbImage, prompt: &str) -> anyhow::Result<Vec<GrayImage>> {
        self.calls += 1;
        self.prompts.push(prompt.to_string());
        Ok(self.masks.clone())
    }

    fn name(&self) -> &str {
        "Scripted Refiner"
    }
}

/// Refinement detector that always errors.
pub struct FailingRefiner {
    pub calls: usize,
}

impl RefinementDetector for FailingRefiner {
    fn refine(&mut self, _image: &RgbImage, _prompt: &str) -> anyhow::Result<Vec<GrayImage>> {
        self.calls += 1;
        anyhow::bail!("model unavailable")
    }

    fn name(&self) -> &str {
        "Failing Refiner"
    }
}

/// Answers like [`ScriptedRefiner`] but trips the cancel token after its first call.
pub struct CancellingRefiner {
    pub inner: ScriptedRefiner,
    pub token: CancelToken,
}

impl RefinementDetector for CancellingRefiner {
    fn refine(&mut self, image: &RgbImage, prompt: &str) -> anyhow::Result<Vec<GrayImage>> {
        let masks = self.inner.refine(image, prompt)?;
        self.token.cancel();
        Ok(masks)
    }

    fn name(&self) -> &str {
        "Cancelling Refiner"
    }
}

/// Primary detector returning fixed detections for every image.
pub struct StubDetector {
    pub detections: Vec<Detection>,
    pub calls: usize,
}

impl StubDetector {
    /// Two boxes matching [`scene_image`].
    pub fn scene() -> Self {
        let detection = |x1: i32| Detection {
            class_label: "object".to_string(),
            confidence: 0.95,
            bbox: BoundingBox::new(x1, 30, x1 + 60, 70),
            contour: vec![
                Point::new(x1, 30),
                Point::new(x1 + 59, 30),
                Point::new(x1 + 59, 69),
                Point::new(x1, 69),
            ],
        };
        Self {
            detections: vec![detection(30), detection(130)],
            calls: 0,
        }
    }
}

impl PrimaryDetector for StubDetector {
    fn detect(&mut self, _image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        self.calls += 1;
        Ok(self.detections.clone())
    }

    fn name(&self) -> &str {
        "Stub Detector"
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
