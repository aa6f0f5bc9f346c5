use image::{Rgb, RgbImage};
use tracing::warn;

use crate::detection::contours::fill_polygon;
use crate::models::ObjectRecord;

/// Fill value for masked-out pixels.
pub const NEUTRAL: Rgb<u8> = Rgb([0, 0, 0]);

/// Isolate `objects[target]` from its siblings.
///
/// Every other object's primary contour is filled with [`NEUTRAL`], then every
/// pixel outside the target's bounding box is neutral as well. A sibling whose
/// contour cannot be parsed is treated as absent. Returns `None` when `target`
/// is out of range.
pub fn isolate_object(base: &RgbImage, objects: &[ObjectRecord], target: usize) -> Option<RgbImage> {
    let target_obj = objects.get(target)?;

    let mut clean = base.clone();
    for (idx, other) in objects.iter().enumerate() {
        if idx == target {
            continue;
        }
        match other.segmentation.decode() {
            Ok(points) => fill_polygon(&mut clean, &points, NEUTRAL),
            Err(e) => warn!(
                object_id = other.object_id,
                "Sibling contour unreadable, not masked: {}", e
            ),
        }
    }

    let (width, height) = base.dimensions();
    let bbox = target_obj.bbox.clamped(width, height);
    let mut isolated = RgbImage::from_pixel(width, height, NEUTRAL);
    if bbox.width() > 0 && bbox.height() > 0 {
        let window = image::imageops::crop_imm(
            &clean,
            bbox.x1 as u32,
            bbox.y1 as u32,
            bbox.width() as u32,
            bbox.height() as u32,
        )
        .to_image();
        image::imageops::replace(&mut isolated, &window, bbox.x1 as i64, bbox.y1 as i64);
    }

    Some(isolated)
}
