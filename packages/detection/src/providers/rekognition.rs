//! AWS Rekognition provider using `DetectProtectiveEquipment`.

use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{
    self as rekognition, BodyPart as RekognitionBodyPart, Image, ProtectiveEquipmentBodyPart,
    ProtectiveEquipmentPerson, ProtectiveEquipmentSummarizationAttributes,
    ProtectiveEquipmentType,
};
use ppe_vision_models::{
    BodyPart, BodyPartName, BoundingBox, EquipmentDetection, EquipmentType, Person,
};

use crate::{DetectionError, DetectionRequest, PpeDetector};

/// AWS Rekognition PPE detector.
///
/// Authentication uses the standard AWS credential chain (env vars, IAM
/// role, `~/.aws/credentials`). Images are sent inline as bytes, so the
/// service's 5 MB inline limit applies.
pub struct RekognitionDetector {
    client: aws_sdk_rekognition::Client,
}

impl RekognitionDetector {
    /// Creates a new Rekognition detector.
    ///
    /// Loads AWS configuration from the environment, overriding the region
    /// when one is given.
    pub async fn new(region: Option<String>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region));
        }

        let config = config_loader.load().await;
        let client = aws_sdk_rekognition::Client::new(&config);

        Self { client }
    }
}

#[async_trait::async_trait]
impl PpeDetector for RekognitionDetector {
    async fn detect(&self, request: &DetectionRequest<'_>) -> Result<Vec<Person>, DetectionError> {
        let required: Vec<ProtectiveEquipmentType> = request
            .required_equipment
            .iter()
            .filter_map(|t| to_rekognition_type(*t))
            .collect();

        let summarization = ProtectiveEquipmentSummarizationAttributes::builder()
            .min_confidence(request.min_confidence)
            .set_required_equipment_types(Some(required))
            .build()
            .map_err(|e| DetectionError::Config {
                message: format!("Failed to build summarization attributes: {e}"),
            })?;

        let image = Image::builder()
            .bytes(Blob::new(request.image.to_vec()))
            .build();

        let response = self
            .client
            .detect_protective_equipment()
            .image(image)
            .summarization_attributes(summarization)
            .send()
            .await
            .map_err(|e| DetectionError::Service {
                message: format!(
                    "Rekognition DetectProtectiveEquipment error: {}",
                    DisplayErrorContext(&e)
                ),
            })?;

        log::debug!(
            "Rekognition returned {} person(s), model version {:?}",
            response.persons().len(),
            response.protective_equipment_model_version()
        );

        Ok(response
            .persons()
            .iter()
            .enumerate()
            .map(|(index, person)| convert_person(index, person))
            .collect())
    }
}

/// Converts a Rekognition person, defaulting anything the service omitted.
fn convert_person(index: usize, person: &ProtectiveEquipmentPerson) -> Person {
    Person {
        id: person
            .id()
            .unwrap_or_else(|| i32::try_from(index).unwrap_or(i32::MAX)),
        confidence: person.confidence().map_or(0.0, f64::from),
        bounding_box: convert_box(person.bounding_box()),
        body_parts: person.body_parts().iter().map(convert_body_part).collect(),
    }
}

fn convert_body_part(part: &ProtectiveEquipmentBodyPart) -> BodyPart {
    let name = match part.name() {
        Some(RekognitionBodyPart::Face) => BodyPartName::Face,
        Some(RekognitionBodyPart::Head) => BodyPartName::Head,
        Some(RekognitionBodyPart::LeftHand) => BodyPartName::LeftHand,
        Some(RekognitionBodyPart::RightHand) => BodyPartName::RightHand,
        _ => BodyPartName::Unknown,
    };

    BodyPart {
        name,
        confidence: part.confidence().map_or(0.0, f64::from),
        equipment_detections: part
            .equipment_detections()
            .iter()
            .map(|detection| EquipmentDetection {
                equipment_type: from_rekognition_type(detection.r#type()),
                confidence: detection.confidence().map_or(0.0, f64::from),
                bounding_box: convert_box(detection.bounding_box()),
                covers_body_part: detection
                    .covers_body_part()
                    .map(rekognition::CoversBodyPart::value),
            })
            .collect(),
    }
}

fn convert_box(bbox: Option<&rekognition::BoundingBox>) -> BoundingBox {
    bbox.map_or_else(BoundingBox::default, |b| BoundingBox {
        left: b.left().map_or(0.0, f64::from),
        top: b.top().map_or(0.0, f64::from),
        width: b.width().map_or(0.0, f64::from),
        height: b.height().map_or(0.0, f64::from),
    })
}

const fn to_rekognition_type(t: EquipmentType) -> Option<ProtectiveEquipmentType> {
    match t {
        EquipmentType::HeadCover => Some(ProtectiveEquipmentType::HeadCover),
        EquipmentType::FaceCover => Some(ProtectiveEquipmentType::FaceCover),
        EquipmentType::HandCover => Some(ProtectiveEquipmentType::HandCover),
        EquipmentType::Unknown => None,
    }
}

fn from_rekognition_type(t: Option<&ProtectiveEquipmentType>) -> EquipmentType {
    match t {
        Some(ProtectiveEquipmentType::HeadCover) => EquipmentType::HeadCover,
        Some(ProtectiveEquipmentType::FaceCover) => EquipmentType::FaceCover,
        Some(ProtectiveEquipmentType::HandCover) => EquipmentType::HandCover,
        _ => EquipmentType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_person_with_missing_fields() {
        let person = ProtectiveEquipmentPerson::builder()
            .body_parts(
                ProtectiveEquipmentBodyPart::builder()
                    .name(RekognitionBodyPart::Head)
                    .confidence(97.5)
                    .equipment_detections(
                        rekognition::EquipmentDetection::builder()
                            .r#type(ProtectiveEquipmentType::HeadCover)
                            .confidence(90.0)
                            .bounding_box(
                                rekognition::BoundingBox::builder()
                                    .left(0.25)
                                    .top(0.5)
                                    .width(0.25)
                                    .height(0.125)
                                    .build(),
                            )
                            .build(),
                    )
                    .build(),
            )
            .build();

        let converted = convert_person(3, &person);

        assert_eq!(converted.id, 3);
        assert!(converted.confidence.abs() < f64::EPSILON);
        assert_eq!(converted.bounding_box, BoundingBox::default());
        assert_eq!(converted.body_parts.len(), 1);
        assert_eq!(converted.body_parts[0].name, BodyPartName::Head);

        let detection = &converted.body_parts[0].equipment_detections[0];
        assert_eq!(detection.equipment_type, EquipmentType::HeadCover);
        assert!((detection.confidence - 90.0).abs() < f64::EPSILON);
        assert!((detection.bounding_box.left - 0.25).abs() < f64::EPSILON);
        assert!((detection.bounding_box.height - 0.125).abs() < f64::EPSILON);
    }

    #[test]
    fn maps_required_equipment_both_ways() {
        for t in EquipmentType::REQUIRED {
            let remote = to_rekognition_type(*t).unwrap();
            assert_eq!(from_rekognition_type(Some(&remote)), *t);
        }
        assert!(to_rekognition_type(EquipmentType::Unknown).is_none());
        assert_eq!(from_rekognition_type(None), EquipmentType::Unknown);
    }
}
