//! Mapping detected persons to client-facing result records.

use ppe_vision_models::{
    BodyPart, DetectionStatus, EquipmentDetection, EquipmentType, Person, PersonResult,
    PpeCategory, PpeItem, UnsupportedItem,
};

/// Builds the result record for one person.
///
/// For each supported category the first matching equipment detection (in
/// body-part order) is taken as found. Found items are then classified
/// against `threshold`; missing items stay not-detected with confidence 0,
/// carrying the confidence of the body-part region when the detector
/// located one. Categories whose equipment is not in `required` are
/// reported as absent.
#[must_use]
pub fn assemble_person(
    person: &Person,
    image_url: String,
    required: &[EquipmentType],
    threshold: f64,
) -> PersonResult {
    let item = |category: PpeCategory| {
        if required.contains(&category.equipment_type()) {
            lookup(person, category)
        } else {
            PpeItem::ABSENT
        }
    };

    let mut result = PersonResult {
        person_id: person.id,
        confidence: person.confidence,
        image_url,
        bounding_box: person.bounding_box,
        hard_hat: item(PpeCategory::HardHat),
        face_mask: item(PpeCategory::FaceMask),
        hand_protection_l: item(PpeCategory::HandProtectionL),
        hand_protection_r: item(PpeCategory::HandProtectionR),
        safety_vest: UnsupportedItem,
        boots: UnsupportedItem,
    };
    result.reclassify(threshold);
    result
}

fn lookup(person: &Person, category: PpeCategory) -> PpeItem {
    if let Some((part, detection)) = first_detection(person, category.equipment_type()) {
        return PpeItem {
            status: DetectionStatus::Detected,
            confidence: detection.confidence,
            body_part_confidence: Some(part.confidence),
        };
    }

    let region = person
        .body_parts
        .iter()
        .find(|part| category.body_parts().contains(&part.name));

    PpeItem {
        body_part_confidence: region.map(|part| part.confidence),
        ..PpeItem::ABSENT
    }
}

fn first_detection(
    person: &Person,
    equipment_type: EquipmentType,
) -> Option<(&BodyPart, &EquipmentDetection)> {
    person.body_parts.iter().find_map(|part| {
        part.equipment_detections
            .iter()
            .find(|d| d.equipment_type == equipment_type)
            .map(|d| (part, d))
    })
}
