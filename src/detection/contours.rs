use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::{Canvas, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashMap;

use crate::models::BoundingBox;

/// Contours with this many points or fewer are degenerate and dropped.
pub const DEGENERATE_POINT_COUNT: usize = 3;

/// A connected foreground region of a binary image
#[derive(Debug, Clone)]
pub struct Region {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Box in the half-open `[x1, y1, x2, y2]` convention used by records
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.min_x as i32,
            self.min_y as i32,
            self.max_x as i32 + 1,
            self.max_y as i32 + 1,
        )
    }

    /// Share of the bounding box covered by the region
    pub fn fill_ratio(&self) -> f64 {
        self.pixel_count as f64 / (self.width() as f64 * self.height() as f64)
    }

    /// Full-size binary mask of this region only.
    pub fn mask(&self, labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> GrayImage {
        let mut mask = GrayImage::new(labels.width(), labels.height());
        for y in self.min_y..=self.max_y {
            for x in self.min_x..=self.max_x {
                if labels.get_pixel(x, y)[0] == self.label {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }
}

/// Connected regions of a binary image together with the label image they index into.
pub struct Regions {
    pub labels: ImageBuffer<Luma<u32>, Vec<u32>>,
    pub regions: Vec<Region>,
}

/// Label connected foreground regions and keep those with at least `min_area` pixels.
/// Regions are ordered by the top-left corner of their box, top to bottom then left to right.
pub fn find_regions(binary: &GrayImage, min_area: u32) -> Regions {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0]));

    let mut stats: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // background
        }

        stats
            .entry(label_val)
            .and_modify(|(min_x, min_y, max_x, max_y, count)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
            })
            .or_insert((x, y, x, y, 1));
    }

    let mut regions: Vec<Region> = stats
        .into_iter()
        .map(|(label, (min_x, min_y, max_x, max_y, count))| Region {
            label,
            min_x,
            min_y,
            max_x,
            max_y,
            pixel_count: count,
        })
        .filter(|r| r.pixel_count >= min_area)
        .collect();
    regions.sort_by_key(|r| (r.min_y, r.min_x, r.label));

    Regions { labels, regions }
}

/// Trace the external borders of a mask. Every non-zero pixel is foreground.
/// Hole borders and regions nested inside holes are ignored; collinear runs are
/// collapsed so straight edges keep only their end points.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| simplify_chain(&c.points))
        .collect()
}

/// External contours of a mask with degenerate (≤3 point) contours removed.
pub fn mask_to_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    external_contours(mask)
        .into_iter()
        .filter(|c| c.len() > DEGENERATE_POINT_COUNT)
        .collect()
}

/// Drop points lying strictly inside a straight run of a closed chain.
pub fn simplify_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    points
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            let (ax, ay) = ((p.x - prev.x) as i64, (p.y - prev.y) as i64);
            let (bx, by) = ((next.x - p.x) as i64, (next.y - p.y) as i64);
            let cross = ax * by - ay * bx;
            let dot = ax * bx + ay * by;
            !(cross == 0 && dot > 0)
        })
        .map(|(_, p)| *p)
        .collect()
}

/// Polygon without a repeated closing point.
pub fn open_polygon(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut poly = points.to_vec();
    while poly.len() > 1 && poly[0] == poly[poly.len() - 1] {
        poly.pop();
    }
    poly
}

/// Fill a polygon region. Polygons with fewer than three distinct corners
/// enclose no area and are left undrawn.
pub fn fill_polygon<C: Canvas>(canvas: &mut C, points: &[Point<i32>], color: C::Pixel) {
    let poly = open_polygon(points);
    if poly.len() < 3 {
        return;
    }
    draw_polygon_mut(canvas, &poly, color);
}
