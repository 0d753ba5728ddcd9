use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use tracing::debug;

use crate::config::DetectionConfig;

/// Axis-aligned detected region in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Inclusive HSV range describing the marker's color signature.
#[derive(Debug, Clone, Copy)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }
}

/// RGB to HSV using the OpenCV 8-bit convention: H in 0..180, S and V in 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let h = if delta > 0.0 {
        let h_deg = if max == rf {
            60.0 * (gf - bf) / delta
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };
        h_deg / 2.0
    } else {
        0.0
    };

    [h.round() as u8, s.round() as u8, v.round() as u8]
}

/// Color segmentation: 255 where the pixel's HSV triple lies inside `range`.
/// Pure function of the frame and the range.
pub fn segment(frame: &RgbImage, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(frame.width(), frame.height());
    for (x, y, pixel) in frame.enumerate_pixels() {
        let hsv = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        if range.contains(hsv) {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}

/// One erosion pass then one dilation pass with a 5x5 square structuring
/// element (L-inf norm, radius 2). Removes speckle noise while preserving
/// the shape of larger regions.
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let eroded = erode(mask, Norm::LInf, 2);
    dilate(&eroded, Norm::LInf, 2)
}

/// Reduce each connected region of the mask to its minimal enclosing
/// axis-aligned bounding box. Border following keeps both outer and hole
/// borders, so nested regions each produce a box. Output order follows
/// discovery order and carries no meaning.
pub fn extract_regions(mask: &GrayImage) -> Vec<BoundingBox> {
    let contours = find_contours::<i32>(mask);
    let mut regions = Vec::with_capacity(contours.len());

    for contour in contours {
        if contour.points.is_empty() {
            continue;
        }
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        regions.push(BoundingBox::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ));
    }

    regions
}

/// Noise rejection: keep only boxes whose pixel area strictly exceeds
/// `min_area`. Area is the sole criterion, so a very wide thin box can pass.
pub fn filter_regions(regions: Vec<BoundingBox>, min_area: u32) -> Vec<BoundingBox> {
    regions.into_iter().filter(|r| r.area() > min_area).collect()
}

/// Per-cycle detection output. `cleaned` feeds only the overlay/diagnostic
/// path; `regions` are extracted from the raw mask.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub mask: GrayImage,
    pub cleaned: GrayImage,
    pub regions: Vec<BoundingBox>,
}

/// Color-based marker detector: segmentation, cleaning, region extraction
/// and area filtering for one frame.
pub struct Detector {
    range: HsvRange,
    min_area: u32,
}

impl Detector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            range: HsvRange {
                lower: config.hsv_lower,
                upper: config.hsv_upper,
            },
            min_area: config.min_area,
        }
    }

    pub fn detect(&self, frame: &RgbImage) -> Result<DetectionOutcome> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(anyhow!("cannot run detection on an empty frame"));
        }

        let mask = segment(frame, &self.range);
        let cleaned = clean_mask(&mask);
        let regions = filter_regions(extract_regions(&mask), self.min_area);

        debug!(
            "detection: {} region(s) above area {} in {}x{} frame",
            regions.len(),
            self.min_area,
            frame.width(),
            frame.height()
        );

        Ok(DetectionOutcome {
            mask,
            cleaned,
            regions,
        })
    }
}
