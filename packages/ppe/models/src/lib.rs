#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! PPE detection domain types and status classification rules.
//!
//! This crate defines the shapes shared by every stage of the pipeline:
//! the raw per-person detections returned by the cloud detector
//! ([`Person`], [`BodyPart`], [`EquipmentDetection`]), the tri-state
//! [`DetectionStatus`] derived from a confidence and a threshold, and the
//! client-facing [`PersonResult`] record consumed by the UI and report
//! layers.

use serde::ser::SerializeStruct as _;
use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Normalized rectangle relative to the image dimensions.
///
/// Every field is expected to lie in `[0, 1]` with `left + width <= 1` and
/// `top + height <= 1`, but the detector does not guarantee it. Consumers
/// that rasterize a box must clamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Left edge as a fraction of the image width.
    pub left: f64,
    /// Top edge as a fraction of the image height.
    pub top: f64,
    /// Width as a fraction of the image width.
    pub width: f64,
    /// Height as a fraction of the image height.
    pub height: f64,
}

impl BoundingBox {
    /// Creates a bounding box from normalized coordinates.
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Kind of protective equipment reported by the detector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentType {
    /// Hard hat, helmet or other head protection.
    HeadCover,
    /// Face mask or shield.
    FaceCover,
    /// Gloves.
    HandCover,
    /// A type this build does not know about.
    #[serde(other)]
    Unknown,
}

impl EquipmentType {
    /// The equipment types every detection request asks for.
    pub const REQUIRED: &[Self] = &[Self::FaceCover, Self::HandCover, Self::HeadCover];
}

/// Anatomical region on which equipment detections are anchored.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyPartName {
    /// Face region.
    Face,
    /// Head region.
    Head,
    /// Left hand.
    LeftHand,
    /// Right hand.
    RightHand,
    /// A region this build does not know about.
    #[serde(other)]
    Unknown,
}

/// A single piece of equipment found on a body part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentDetection {
    /// Equipment kind.
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    /// Detector confidence, 0-100.
    pub confidence: f64,
    /// Location of the equipment in the full image.
    pub bounding_box: BoundingBox,
    /// Whether the detector believes the equipment covers the body part.
    pub covers_body_part: Option<bool>,
}

/// A detected body part and the equipment anchored to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPart {
    /// Region name.
    pub name: BodyPartName,
    /// Detector confidence that the region was located, 0-100.
    pub confidence: f64,
    /// Equipment found on this region, in detector order.
    pub equipment_detections: Vec<EquipmentDetection>,
}

/// One person found by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Detector-assigned identifier, unique within one image.
    pub id: i32,
    /// Detector confidence that this is a person, 0-100.
    pub confidence: f64,
    /// Location of the person in the full image.
    pub bounding_box: BoundingBox,
    /// Body parts in detector order.
    pub body_parts: Vec<BodyPart>,
}

impl Person {
    /// Iterates over every equipment detection of this person, body parts
    /// first, then detections within each body part, in detector order.
    pub fn equipment(&self) -> impl Iterator<Item = &EquipmentDetection> {
        self.body_parts
            .iter()
            .flat_map(|part| part.equipment_detections.iter())
    }
}

/// Tri-state classification of a confidence against a threshold.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum DetectionStatus {
    /// Confidence at or above the threshold.
    Detected,
    /// Confidence above zero but below the threshold.
    Indeterminate,
    /// Zero, negative, non-finite or missing confidence.
    NotDetected,
}

impl DetectionStatus {
    /// Classifies a confidence against a threshold.
    ///
    /// `None`, NaN, zero and negative confidences are always
    /// [`Self::NotDetected`], whatever the threshold.
    #[must_use]
    pub fn classify(confidence: Option<f64>, threshold: f64) -> Self {
        match confidence {
            Some(c) if c.is_nan() || c <= 0.0 => Self::NotDetected,
            Some(c) if c >= threshold => Self::Detected,
            Some(_) => Self::Indeterminate,
            None => Self::NotDetected,
        }
    }
}

/// PPE categories the detector can report on.
///
/// The order of [`PpeCategory::ALL`] is the order in which categories are
/// assembled and re-classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum PpeCategory {
    /// Head protection.
    HardHat,
    /// Face protection.
    FaceMask,
    /// Left-hand protection.
    HandProtectionL,
    /// Right-hand protection.
    HandProtectionR,
}

impl PpeCategory {
    /// All supported categories in assembly order.
    pub const ALL: &[Self] = &[
        Self::HardHat,
        Self::FaceMask,
        Self::HandProtectionL,
        Self::HandProtectionR,
    ];

    /// Equipment type that satisfies this category.
    #[must_use]
    pub const fn equipment_type(self) -> EquipmentType {
        match self {
            Self::HardHat => EquipmentType::HeadCover,
            Self::FaceMask => EquipmentType::FaceCover,
            Self::HandProtectionL | Self::HandProtectionR => EquipmentType::HandCover,
        }
    }

    /// Body parts on which this category's equipment is anchored.
    ///
    /// Both hand categories cover both hands: the detector does not report
    /// which glove is on which hand.
    #[must_use]
    pub const fn body_parts(self) -> &'static [BodyPartName] {
        match self {
            Self::HardHat => &[BodyPartName::Head],
            Self::FaceMask => &[BodyPartName::Face],
            Self::HandProtectionL | Self::HandProtectionR => {
                &[BodyPartName::LeftHand, BodyPartName::RightHand]
            }
        }
    }
}

/// Status and confidence of one supported PPE category for one person.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PpeItem {
    /// Classified status.
    pub status: DetectionStatus,
    /// Confidence of the matching equipment detection, or 0.
    pub confidence: f64,
    /// Confidence of the body part region, when the detector found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part_confidence: Option<f64>,
}

impl PpeItem {
    /// An item with no matching detection and no matching body part.
    pub const ABSENT: Self = Self {
        status: DetectionStatus::NotDetected,
        confidence: 0.0,
        body_part_confidence: None,
    };

    /// Re-derives the status of a found item against `threshold`.
    ///
    /// Items that were never found stay [`DetectionStatus::NotDetected`].
    pub fn reclassify(&mut self, threshold: f64) {
        if self.status != DetectionStatus::NotDetected {
            self.status = DetectionStatus::classify(Some(self.confidence), threshold);
        }
    }
}

/// Fixed sentinel for categories the detector cannot report on.
///
/// Always serializes as `{"status": "Not Supported", "confidence": 0}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnsupportedItem;

impl UnsupportedItem {
    /// Status string reported for unsupported categories.
    pub const STATUS: &'static str = "Not Supported";
}

impl Serialize for UnsupportedItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("UnsupportedItem", 2)?;
        s.serialize_field("status", Self::STATUS)?;
        s.serialize_field("confidence", &0)?;
        s.end()
    }
}

/// Client-facing result for one detected person.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonResult {
    /// Detector-assigned person identifier.
    pub person_id: i32,
    /// Person detection confidence, 0-100.
    pub confidence: f64,
    /// URL of the annotated crop, or of the placeholder image.
    #[serde(rename = "imageURL")]
    pub image_url: String,
    /// Location of the person in the full image.
    pub bounding_box: BoundingBox,
    /// Head protection.
    pub hard_hat: PpeItem,
    /// Face protection.
    pub face_mask: PpeItem,
    /// Left-hand protection.
    pub hand_protection_l: PpeItem,
    /// Right-hand protection.
    pub hand_protection_r: PpeItem,
    /// Not reported by the detector.
    pub safety_vest: UnsupportedItem,
    /// Not reported by the detector.
    pub boots: UnsupportedItem,
}

impl PersonResult {
    /// Returns the item for a supported category.
    #[must_use]
    pub const fn item(&self, category: PpeCategory) -> &PpeItem {
        match category {
            PpeCategory::HardHat => &self.hard_hat,
            PpeCategory::FaceMask => &self.face_mask,
            PpeCategory::HandProtectionL => &self.hand_protection_l,
            PpeCategory::HandProtectionR => &self.hand_protection_r,
        }
    }

    /// Returns the item for a supported category mutably.
    pub const fn item_mut(&mut self, category: PpeCategory) -> &mut PpeItem {
        match category {
            PpeCategory::HardHat => &mut self.hard_hat,
            PpeCategory::FaceMask => &mut self.face_mask,
            PpeCategory::HandProtectionL => &mut self.hand_protection_l,
            PpeCategory::HandProtectionR => &mut self.hand_protection_r,
        }
    }

    /// Re-classifies every supported category against `threshold`.
    pub fn reclassify(&mut self, threshold: f64) {
        for category in PpeCategory::ALL {
            self.item_mut(*category).reclassify(threshold);
        }
    }

    /// Whether every supported category is [`DetectionStatus::Detected`].
    #[must_use]
    pub fn is_fully_compliant(&self) -> bool {
        PpeCategory::ALL
            .iter()
            .all(|c| self.item(*c).status == DetectionStatus::Detected)
    }
}

/// Dimensions and encoding of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Lower-case format name (`jpeg`, `png`).
    pub format: String,
}

/// Per-request compliance counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Number of persons in the result set.
    pub total_persons: usize,
    /// Persons with every supported category detected.
    pub fully_compliant: usize,
    /// Persons missing at least one supported category.
    pub non_compliant: usize,
}

impl ComplianceSummary {
    /// Counts compliance over a result set.
    #[must_use]
    pub fn from_results(results: &[PersonResult]) -> Self {
        let fully_compliant = results.iter().filter(|r| r.is_fully_compliant()).count();
        Self {
            total_persons: results.len(),
            fully_compliant,
            non_compliant: results.len() - fully_compliant,
        }
    }
}
