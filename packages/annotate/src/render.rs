//! Equipment overlay rendering.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use ppe_vision_models::{DetectionStatus, Person};

use crate::classify::{PixelRect, classify};

/// Overlay color for equipment at or above the threshold.
pub const DETECTED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Overlay color for equipment below the threshold.
pub const INDETERMINATE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Opacity of the rectangle fill.
const FILL_ALPHA: f32 = 0.3;

/// Outline thickness in pixels.
const STROKE_WIDTH: u32 = 2;

/// Returns the overlay color for a status, or `None` if the status is not
/// drawn.
#[must_use]
pub const fn status_color(status: DetectionStatus) -> Option<Rgb<u8>> {
    match status {
        DetectionStatus::Detected => Some(DETECTED_COLOR),
        DetectionStatus::Indeterminate => Some(INDETERMINATE_COLOR),
        DetectionStatus::NotDetected => None,
    }
}

/// Draws a person's equipment onto a copy of `source`.
///
/// Every detection classified as detected or indeterminate gets a
/// semi-transparent fill plus a solid outline. Body parts and their
/// detections are painted in detector order, later over earlier.
/// `source` is never modified.
#[must_use]
pub fn render_person(source: &RgbImage, person: &Person, threshold: f64) -> RgbImage {
    let mut canvas = source.clone();
    let (width, height) = canvas.dimensions();

    for equipment in person.equipment() {
        let classified = classify(equipment, width, height, threshold);
        let Some(color) = status_color(classified.status) else {
            continue;
        };
        let Some(rect) = clamp_rect(&classified.rect, width, height) else {
            log::debug!(
                "Skipping {} overlay outside {width}x{height} image: {:?}",
                equipment.equipment_type,
                classified.rect
            );
            continue;
        };
        fill_rect(&mut canvas, rect, color);
        stroke_rect(&mut canvas, rect, color);
    }

    canvas
}

/// Clamps a pixel rectangle to the image, returning `None` if nothing of
/// it remains visible.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn clamp_rect(rect: &PixelRect, width: u32, height: u32) -> Option<Rect> {
    if !rect.width.is_finite() || !rect.height.is_finite() {
        return None;
    }
    let right = rect.x.saturating_add(rect.width.round() as i64);
    let bottom = rect.y.saturating_add(rect.height.round() as i64);

    let x0 = rect.x.clamp(0, i64::from(width));
    let y0 = rect.y.clamp(0, i64::from(height));
    let x1 = right.clamp(0, i64::from(width));
    let y1 = bottom.clamp(0, i64::from(height));

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fill_rect(canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    let x0 = rect.left() as u32;
    let y0 = rect.top() as u32;
    for y in y0..y0 + rect.height() {
        for x in x0..x0 + rect.width() {
            let pixel = canvas.get_pixel_mut(x, y);
            for (channel, target) in pixel.0.iter_mut().zip(color.0) {
                let blended =
                    f32::from(*channel).mul_add(1.0 - FILL_ALPHA, f32::from(target) * FILL_ALPHA);
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn stroke_rect(canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    for inset in 0..STROKE_WIDTH {
        let width = rect.width().saturating_sub(2 * inset);
        let height = rect.height().saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let inner =
            Rect::at(rect.left() + inset as i32, rect.top() + inset as i32).of_size(width, height);
        draw_hollow_rect_mut(canvas, inner, color);
    }
}

#[cfg(test)]
mod tests {
    use ppe_vision_models::{BodyPart, BodyPartName, BoundingBox, EquipmentDetection, EquipmentType};

    use super::*;

    const GREY: Rgb<u8> = Rgb([100, 100, 100]);

    fn person_with(detections: Vec<EquipmentDetection>) -> Person {
        Person {
            id: 0,
            confidence: 99.0,
            bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            body_parts: vec![BodyPart {
                name: BodyPartName::Head,
                confidence: 99.0,
                equipment_detections: detections,
            }],
        }
    }

    fn head_cover(confidence: f64, bbox: BoundingBox) -> EquipmentDetection {
        EquipmentDetection {
            equipment_type: EquipmentType::HeadCover,
            confidence,
            bounding_box: bbox,
            covers_body_part: None,
        }
    }

    #[test]
    fn detected_equipment_is_outlined_green_and_filled() {
        let source = RgbImage::from_pixel(100, 100, GREY);
        let person = person_with(vec![head_cover(90.0, BoundingBox::new(0.2, 0.2, 0.4, 0.4))]);

        let out = render_person(&source, &person, 80.0);

        assert_eq!(*out.get_pixel(20, 20), DETECTED_COLOR);
        assert_eq!(*out.get_pixel(21, 30), DETECTED_COLOR);
        let inside = out.get_pixel(40, 40);
        assert_ne!(*inside, GREY);
        assert!(inside.0[1] > inside.0[0]);
        assert_eq!(*out.get_pixel(5, 5), GREY);
    }

    #[test]
    fn indeterminate_is_yellow_and_not_detected_is_skipped() {
        let source = RgbImage::from_pixel(100, 100, GREY);
        let person = person_with(vec![
            head_cover(50.0, BoundingBox::new(0.0, 0.0, 0.3, 0.3)),
            head_cover(0.0, BoundingBox::new(0.6, 0.6, 0.3, 0.3)),
        ]);

        let out = render_person(&source, &person, 80.0);

        assert_eq!(*out.get_pixel(0, 0), INDETERMINATE_COLOR);
        assert_eq!(*out.get_pixel(60, 60), GREY);
        assert_eq!(*out.get_pixel(75, 75), GREY);
    }

    #[test]
    fn later_rectangles_paint_over_earlier_ones() {
        let source = RgbImage::from_pixel(50, 50, GREY);
        let person = person_with(vec![
            head_cover(90.0, BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            head_cover(50.0, BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
        ]);

        let out = render_person(&source, &person, 80.0);

        assert_eq!(*out.get_pixel(0, 0), INDETERMINATE_COLOR);
    }

    #[test]
    fn overflowing_boxes_are_clamped() {
        let source = RgbImage::from_pixel(40, 40, GREY);
        let person = person_with(vec![
            head_cover(90.0, BoundingBox::new(0.8, 0.8, 0.5, 0.5)),
            head_cover(90.0, BoundingBox::new(1.5, 1.5, 0.2, 0.2)),
            head_cover(90.0, BoundingBox::new(0.1, 0.1, f64::NAN, 0.2)),
        ]);

        let out = render_person(&source, &person, 80.0);

        assert_eq!(*out.get_pixel(32, 32), DETECTED_COLOR);
        assert_eq!(*out.get_pixel(39, 39), DETECTED_COLOR);
    }

    #[test]
    fn independent_passes_do_not_touch_the_source() {
        let source = RgbImage::from_pixel(60, 60, GREY);
        let original = source.clone();
        let first = person_with(vec![head_cover(90.0, BoundingBox::new(0.0, 0.0, 0.5, 0.5))]);
        let second = person_with(vec![head_cover(90.0, BoundingBox::new(0.5, 0.5, 0.5, 0.5))]);

        let a = render_person(&source, &first, 80.0);
        let b = render_person(&source, &second, 80.0);

        assert_eq!(source, original);
        assert_eq!(*a.get_pixel(45, 45), GREY);
        assert_eq!(*b.get_pixel(10, 10), GREY);
        assert_eq!(*a.get_pixel(0, 0), DETECTED_COLOR);
        assert_eq!(*b.get_pixel(30, 30), DETECTED_COLOR);
    }
}
