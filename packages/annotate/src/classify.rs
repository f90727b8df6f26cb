//! Geometry and status classification of a single equipment detection.

use ppe_vision_models::{BoundingBox, DetectionStatus, EquipmentDetection};

/// A normalized box scaled to pixel space.
///
/// The origin is floored so crops and overlays share integer pixel
/// alignment; width and height are scaled without flooring. Values are
/// not clamped to the image: a box that spills over the edge produces a
/// rectangle that does too.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    /// Left edge in pixels.
    pub x: i64,
    /// Top edge in pixels.
    pub y: i64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl PixelRect {
    /// Scales a normalized box by the image dimensions.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_normalized(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Self {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        Self {
            x: (bbox.left * w).floor() as i64,
            y: (bbox.top * h).floor() as i64,
            width: bbox.width * w,
            height: bbox.height * h,
        }
    }
}

/// Result of classifying one equipment detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedEquipment {
    /// Status of the detection against the threshold.
    pub status: DetectionStatus,
    /// Detection box in pixel space.
    pub rect: PixelRect,
}

/// Classifies an equipment detection for an image of the given size.
#[must_use]
pub fn classify(
    equipment: &EquipmentDetection,
    image_width: u32,
    image_height: u32,
    threshold: f64,
) -> ClassifiedEquipment {
    ClassifiedEquipment {
        status: DetectionStatus::classify(Some(equipment.confidence), threshold),
        rect: PixelRect::from_normalized(&equipment.bounding_box, image_width, image_height),
    }
}
