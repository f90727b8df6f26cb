//! Per-person cropping.

use image::RgbImage;
use image::imageops;
use ppe_vision_models::BoundingBox;

use crate::AnnotateError;

/// Pixel region of a person within the full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CropRegion {
    /// Computes the floored pixel region of a normalized box, clamped to
    /// the image.
    ///
    /// Boxes reaching past any edge are trimmed to the part that overlaps
    /// the image.
    ///
    /// # Errors
    ///
    /// * [`AnnotateError::RegionOutOfBounds`] if the box has a non-finite
    ///   coordinate or does not overlap the image at all.
    /// * [`AnnotateError::DegenerateRegion`] if the floored width or height
    ///   is zero or negative.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_normalized(
        bbox: &BoundingBox,
        image_width: u32,
        image_height: u32,
    ) -> Result<Self, AnnotateError> {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let [left, top, width, height] =
            [bbox.left * w, bbox.top * h, bbox.width * w, bbox.height * h].map(f64::floor);

        if [left, top, width, height].iter().any(|v| !v.is_finite()) {
            return Err(AnnotateError::RegionOutOfBounds { bbox: *bbox });
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(AnnotateError::DegenerateRegion {
                width: width.clamp(0.0, f64::from(u32::MAX)) as u32,
                height: height.clamp(0.0, f64::from(u32::MAX)) as u32,
            });
        }

        let x0 = left.clamp(0.0, w);
        let y0 = top.clamp(0.0, h);
        let x1 = (left + width).clamp(0.0, w);
        let y1 = (top + height).clamp(0.0, h);
        if x1 <= x0 || y1 <= y0 {
            return Err(AnnotateError::RegionOutOfBounds { bbox: *bbox });
        }

        Ok(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Extracts a person's region from an annotated image as a standalone
/// image.
///
/// Regions that spill past an edge are trimmed to the image.
///
/// # Errors
///
/// Returns the errors of [`CropRegion::from_normalized`].
pub fn crop_person(image: &RgbImage, bbox: &BoundingBox) -> Result<RgbImage, AnnotateError> {
    let region = CropRegion::from_normalized(bbox, image.width(), image.height())?;
    Ok(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn floors_every_coordinate() {
        let region =
            CropRegion::from_normalized(&BoundingBox::new(0.1237, 0.251, 0.3339, 0.5), 1000, 800)
                .unwrap();
        assert_eq!(
            region,
            CropRegion {
                x: 123,
                y: 200,
                width: 333,
                height: 400,
            }
        );
    }

    #[test]
    fn repeated_crops_are_identical() {
        let image = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 7]));
        let bbox = BoundingBox::new(0.25, 0.25, 0.5, 0.5);

        let a = crop_person(&image, &bbox).unwrap();
        let b = crop_person(&image, &bbox).unwrap();

        assert_eq!(a.dimensions(), (32, 24));
        assert_eq!(a, b);
        assert_eq!(*a.get_pixel(0, 0), *image.get_pixel(16, 12));
    }

    #[test]
    fn overflowing_region_is_trimmed() {
        let image = RgbImage::new(100, 100);
        let cropped = crop_person(&image, &BoundingBox::new(0.9, 0.5, 0.5, 0.8)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 50));
    }

    #[test]
    fn degenerate_region_fails() {
        let image = RgbImage::new(100, 100);
        let err = crop_person(&image, &BoundingBox::new(0.1, 0.1, 0.005, 0.5)).unwrap_err();
        assert!(matches!(err, AnnotateError::DegenerateRegion { width: 0, .. }));
    }

    #[test]
    fn out_of_bounds_region_fails() {
        let image = RgbImage::new(100, 100);
        assert!(matches!(
            crop_person(&image, &BoundingBox::new(1.0, 0.0, 0.2, 0.2)),
            Err(AnnotateError::RegionOutOfBounds { .. })
        ));
        assert!(matches!(
            crop_person(&image, &BoundingBox::new(-0.3, 0.0, 0.2, 0.2)),
            Err(AnnotateError::RegionOutOfBounds { .. })
        ));
        assert!(matches!(
            crop_person(&image, &BoundingBox::new(0.1, f64::NAN, 0.2, 0.2)),
            Err(AnnotateError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn region_past_left_and_top_edges_is_clamped() {
        let region =
            CropRegion::from_normalized(&BoundingBox::new(-0.002, -0.01, 0.3, 0.8), 1000, 800)
                .unwrap();
        assert_eq!(
            region,
            CropRegion {
                x: 0,
                y: 0,
                width: 298,
                height: 632,
            }
        );

        let image = RgbImage::new(100, 100);
        let cropped = crop_person(&image, &BoundingBox::new(-0.1, 0.0, 0.2, 0.2)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 20));
    }
}
