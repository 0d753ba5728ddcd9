use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::safety::AlertState;
use crate::vision::BoundingBox;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 3;

/// Outline each surviving region with a fixed-color, fixed-thickness
/// rectangle. Successive outlines are inset by one pixel to build up the
/// line thickness.
pub fn draw_regions(frame: &mut RgbImage, regions: &[BoundingBox]) {
    for region in regions {
        for inset in 0..BOX_THICKNESS {
            if region.width <= 2 * inset || region.height <= 2 * inset {
                break;
            }
            let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32)
                .of_size(region.width - 2 * inset, region.height - 2 * inset);
            draw_hollow_rect_mut(frame, rect, BOX_COLOR);
        }
    }
}

/// 50/50 blend of the frame with a flat red image, the visually distinct
/// alert rendering.
pub fn red_alert(frame: &RgbImage) -> RgbImage {
    let mut blended = frame.clone();
    for pixel in blended.pixels_mut() {
        pixel[0] = blend_channel(pixel[0], 255);
        pixel[1] = blend_channel(pixel[1], 0);
        pixel[2] = blend_channel(pixel[2], 0);
    }
    blended
}

fn blend_channel(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16 + 1) / 2) as u8
}

/// Produce the operator feedback frame. Purely observational: the output
/// never feeds back into detection or the safety decision.
pub fn render(frame: &RgbImage, regions: &[BoundingBox], alert: AlertState) -> RgbImage {
    let mut annotated = frame.clone();
    draw_regions(&mut annotated, regions);
    if alert.is_alert() {
        annotated = red_alert(&annotated);
    }
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_are_outlined_with_thickness() {
        let mut frame = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        draw_regions(&mut frame, &[BoundingBox::new(10, 10, 40, 30)]);

        // Top edge painted across the full thickness
        for inset in 0..3 {
            assert_eq!(*frame.get_pixel(20, 10 + inset), BOX_COLOR);
        }
        // Interior untouched
        assert_eq!(*frame.get_pixel(30, 25), Rgb([0, 0, 0]));
        // Outside untouched
        assert_eq!(*frame.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn tiny_regions_do_not_panic() {
        let mut frame = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        draw_regions(&mut frame, &[BoundingBox::new(3, 3, 2, 2)]);
        assert_eq!(*frame.get_pixel(3, 3), BOX_COLOR);
    }

    #[test]
    fn red_alert_blends_evenly() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let blended = red_alert(&frame);
        let p = blended.get_pixel(2, 2);
        assert_eq!(p[0], 178); // (100 + 255 + 1) / 2
        assert_eq!(p[1], 50);
        assert_eq!(p[2], 50);
    }

    #[test]
    fn render_is_plain_when_clear() {
        let frame = RgbImage::from_pixel(16, 16, Rgb([42, 42, 42]));
        let rendered = render(&frame, &[], AlertState::Clear);
        assert_eq!(rendered.as_raw(), frame.as_raw());
    }

    #[test]
    fn render_tints_red_when_alerted() {
        let frame = RgbImage::from_pixel(16, 16, Rgb([42, 42, 42]));
        let rendered = render(&frame, &[], AlertState::Alert);
        let p = rendered.get_pixel(8, 8);
        assert!(p[0] > p[1] && p[0] > p[2]);
    }
}
