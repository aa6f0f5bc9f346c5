use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use image::{Rgb, RgbImage};
use ab_glyph::{FontRef, PxScale};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::models::{AnnotationMap, AnnotationRecord, Landmark};

const INTRA_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const PAIR_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const LEFT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RIGHT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LANDMARK_RADIUS: i32 = 4;
const LABEL_SCALE: f32 = 14.0;

static LABEL_FONT: &[u8] = include_bytes!("../resources/fonts/DejaVuSans.ttf");

/// Class label -> overlay color, owned by one run and passed to the drawing code.
///
/// Colors are drawn from a seeded generator, so the same seed and the same order of
/// first appearance give the same colors.
#[derive(Debug, Clone)]
pub struct ClassPalette {
    colors: HashMap<String, Rgb<u8>>,
    rng: StdRng,
}

impl ClassPalette {
    pub fn new(seed: u64) -> Self {
        Self {
            colors: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Channels are drawn from 50..=255 so overlays stay visible on dark images.
    pub fn color_for(&mut self, class_label: &str) -> Rgb<u8> {
        if let Some(c) = self.colors.get(class_label) {
            return *c;
        }
        let rng = &mut self.rng;
        let color = Rgb([
            rng.gen_range(50..=255),
            rng.gen_range(50..=255),
            rng.gen_range(50..=255),
        ]);
        self.colors.insert(class_label.to_string(), color);
        color
    }
}

impl Default for ClassPalette {
    fn default() -> Self {
        Self::new(0x5eed)
    }
}

fn to_f32(l: &Landmark) -> (f32, f32) {
    (l.x as f32, l.y as f32)
}

fn to_i32(l: &Landmark) -> (i32, i32) {
    (l.x.round() as i32, l.y.round() as i32)
}

fn draw_segment(canvas: &mut RgbImage, a: &Landmark, b: &Landmark, color: Rgb<u8>) {
    draw_line_segment_mut(canvas, to_f32(a), to_f32(b), color);
    draw_filled_circle_mut(canvas, to_i32(a), LANDMARK_RADIUS, LEFT_COLOR);
    draw_filled_circle_mut(canvas, to_i32(b), LANDMARK_RADIUS, RIGHT_COLOR);
}

fn label_font() -> Option<FontRef<'static>> {
    match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Label font unusable, drawing without values: {}", e);
            None
        }
    }
}

/// Value label just above and to the right of the segment midpoint.
fn draw_label(
    canvas: &mut RgbImage,
    font: &FontRef,
    a: &Landmark,
    b: &Landmark,
    text: &str,
    color: Rgb<u8>,
) {
    let x = ((a.x + b.x) / 2.0).round() as i32 + 4;
    let y = ((a.y + b.y) / 2.0).round() as i32 - 18;
    draw_text_mut(canvas, color, x, y, PxScale::from(LABEL_SCALE), font, text);
}

/// Draw boxes, landmark segments and right-to-right pair segments onto `canvas`,
/// labelled `PD:<distance>` and `RR:<distance>`.
pub fn draw_record(canvas: &mut RgbImage, record: &AnnotationRecord, palette: &mut ClassPalette) {
    let font = label_font();

    for obj in &record.objects {
        let b = obj.bbox;
        if b.width() > 0 && b.height() > 0 {
            let rect = Rect::at(b.x1, b.y1).of_size(b.width() as u32, b.height() as u32);
            draw_hollow_rect_mut(canvas, rect, palette.color_for(&obj.class_label));
        }
        if let Some((left, right, distance)) = obj.measurement() {
            draw_segment(canvas, &left, &right, INTRA_COLOR);
            if let Some(font) = &font {
                let text = format!("PD:{:.2}", distance);
                draw_label(canvas, font, &left, &right, &text, INTRA_COLOR);
            }
        }
    }

    for pair in record.pairs.iter().flatten() {
        let right = |id| record.object(id).and_then(|o| o.landmark_right);
        if let (Some(a), Some(b)) = (right(pair.object_1_id), right(pair.object_2_id)) {
            draw_line_segment_mut(canvas, to_f32(&a), to_f32(&b), PAIR_COLOR);
            if let Some(font) = &font {
                let text = format!("RR:{:.2}", pair.distance);
                draw_label(canvas, font, &a, &b, &text, PAIR_COLOR);
            }
        }
    }
}

/// Write `res_<image>` overlays for every measured record. Returns how many were written.
pub fn write_overlays(
    data: &AnnotationMap,
    image_root: &Path,
    output_dir: &Path,
    palette: &mut ClassPalette,
) -> anyhow::Result<usize> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output folder {:?}", output_dir))?;

    let mut written = 0;
    for (img_name, record) in data {
        if !record.has_metrics() {
            continue;
        }
        let src = image_root.join(img_name);
        let mut canvas = match image::open(&src) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!(path = %src.display(), "Cannot read image for overlay: {}", e);
                continue;
            }
        };
        draw_record(&mut canvas, record, palette);

        let out = output_dir.join(format!("res_{}", img_name));
        canvas
            .save(&out)
            .with_context(|| format!("Failed to save overlay {:?}", out))?;
        written += 1;
    }

    info!(images = data.len(), written, "Wrote overlays");
    Ok(written)
}
