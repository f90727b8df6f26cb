#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Equipment overlay rendering and per-person cropping.
//!
//! Takes the normalized boxes returned by the detector, classifies each
//! piece of equipment against the request threshold ([`classify`]),
//! paints overlays onto a full-resolution copy of the source
//! ([`render`]), and cuts out one person's region ([`crop`]).
//!
//! Every function here is pure with respect to its inputs: the source
//! image is shared read-only between persons and only copies are drawn
//! on.

pub mod classify;
pub mod crop;
pub mod render;

use std::io::{BufWriter, Write as _};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use ppe_vision_models::{BoundingBox, ImageMetadata};
use thiserror::Error;

/// JPEG quality used for generated crops.
const JPEG_QUALITY: u8 = 90;

/// Errors that can occur while decoding, annotating or writing images.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// The uploaded bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// A crop could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The person's region floors to zero width or height.
    #[error("Degenerate crop region {width}x{height}")]
    DegenerateRegion {
        /// Floored width in pixels.
        width: u32,
        /// Floored height in pixels.
        height: u32,
    },

    /// The person's region starts outside the image or is not finite.
    #[error("Crop region out of bounds: {bbox:?}")]
    RegionOutOfBounds {
        /// The offending normalized box.
        bbox: BoundingBox,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded upload ready for annotation.
pub struct DecodedImage {
    /// Pixels converted to 8-bit RGB.
    pub pixels: RgbImage,
    /// Dimensions and format of the upload.
    pub metadata: ImageMetadata,
}

/// Decodes uploaded bytes, guessing the format from the content.
///
/// # Errors
///
/// Returns [`AnnotateError::Decode`] if the bytes are not a supported
/// image.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, AnnotateError> {
    let format = image::guess_format(bytes).map_err(AnnotateError::Decode)?;
    let decoded =
        image::load_from_memory_with_format(bytes, format).map_err(AnnotateError::Decode)?;

    let metadata = ImageMetadata {
        width: decoded.width(),
        height: decoded.height(),
        format: format_name(format),
    };

    Ok(DecodedImage {
        pixels: decoded.into_rgb8(),
        metadata,
    })
}

/// Lower-case name of an image format.
#[must_use]
pub fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        other => other
            .extensions_str()
            .first()
            .map_or_else(|| format!("{other:?}").to_lowercase(), |ext| (*ext).to_string()),
    }
}

/// Writes an image to `path` as JPEG.
///
/// # Errors
///
/// Returns [`AnnotateError::Io`] if the file cannot be created or
/// written and [`AnnotateError::Encode`] if encoding fails.
pub fn save_jpeg(image: &RgbImage, path: &Path) -> Result<(), AnnotateError> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))
        .map_err(AnnotateError::Encode)?;
    writer.flush()?;
    Ok(())
}
