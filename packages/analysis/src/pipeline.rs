//! Per-person annotation, cropping and assembly.
//!
//! Each person is handled independently on the blocking pool; the only
//! shared inputs are the read-only source image and the artifact registry.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use ppe_vision_annotate::{AnnotateError, crop, render, save_jpeg};
use ppe_vision_artifacts::{ArtifactRegistry, GeneratedArtifact};
use ppe_vision_models::{EquipmentType, Person, PersonResult};

use crate::AnalysisError;
use crate::assemble::assemble_person;

/// Read-only inputs shared by every person of one request.
pub struct PersonContext {
    /// Decoded upload.
    pub source: Arc<RgbImage>,
    /// Request threshold, 0-100.
    pub threshold: f64,
    /// Equipment the detector was asked for.
    pub required: &'static [EquipmentType],
    /// Where crops are written.
    pub registry: Arc<ArtifactRegistry>,
    /// URL substituted when a crop cannot be produced.
    pub placeholder_url: String,
}

/// The result for one person plus the artifact written for it, if any.
#[derive(Debug, Clone)]
pub struct PersonOutcome {
    /// Assembled result record.
    pub result: PersonResult,
    /// Crop file, absent when the placeholder was used.
    pub artifact: Option<PathBuf>,
}

/// Renders, crops and writes one person's artifact.
///
/// # Errors
///
/// Returns [`AnnotateError`] if the person's region cannot be cropped or
/// the crop cannot be written. Nothing is left on disk on failure.
pub fn render_artifact(
    source: &RgbImage,
    person: &Person,
    index: usize,
    threshold: f64,
    registry: &ArtifactRegistry,
) -> Result<GeneratedArtifact, AnnotateError> {
    let annotated = render::render_person(source, person, threshold);
    let cropped = crop::crop_person(&annotated, &person.bounding_box)?;

    let artifact = registry.allocate(index, "jpg");
    if let Err(e) = save_jpeg(&cropped, &artifact.file_path) {
        registry.delete(&artifact.file_path);
        return Err(e);
    }
    Ok(artifact)
}

/// Processes one person, downgrading rendering failures to the
/// placeholder image.
#[must_use]
pub fn process_person(ctx: &PersonContext, index: usize, person: &Person) -> PersonOutcome {
    let (image_url, artifact) =
        match render_artifact(&ctx.source, person, index, ctx.threshold, &ctx.registry) {
            Ok(artifact) => (artifact.url, Some(artifact.file_path)),
            Err(e) => {
                log::warn!(
                    "Person {index} (id {}): using placeholder image: {e}",
                    person.id
                );
                (ctx.placeholder_url.clone(), None)
            }
        };

    PersonOutcome {
        result: assemble_person(person, image_url, ctx.required, ctx.threshold),
        artifact,
    }
}

/// Runs `f` over `items` concurrently and returns the outputs in input
/// order, whatever order they complete in.
pub async fn map_ordered<T, R, F, Fut>(items: Vec<T>, mut f: F) -> Vec<R>
where
    F: FnMut(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    futures::future::join_all(
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| f(index, item)),
    )
    .await
}

/// Processes every person concurrently on the blocking pool.
///
/// Results are in detector order. If any worker dies, artifacts already
/// written for this request are deleted and an error is returned.
///
/// # Errors
///
/// Returns [`AnalysisError::Internal`] if a worker task panics or is
/// cancelled.
pub async fn process_persons(
    ctx: Arc<PersonContext>,
    persons: Vec<Person>,
) -> Result<Vec<PersonOutcome>, AnalysisError> {
    let joined = map_ordered(persons, |index, person| {
        let ctx = Arc::clone(&ctx);
        tokio::task::spawn_blocking(move || process_person(&ctx, index, &person))
    })
    .await;

    let mut outcomes = Vec::with_capacity(joined.len());
    let mut failure = None;
    for result in joined {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => failure = Some(e),
        }
    }

    if let Some(e) = failure {
        let written: Vec<PathBuf> = outcomes.into_iter().filter_map(|o| o.artifact).collect();
        ctx.registry.delete_all(&written);
        return Err(AnalysisError::internal(e));
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::Rgb;
    use ppe_vision_artifacts::SystemClock;
    use ppe_vision_models::{BodyPart, BodyPartName, BoundingBox, EquipmentDetection};

    use super::*;

    fn context(width: u32, height: u32) -> PersonContext {
        let dir = std::env::temp_dir().join(format!(
            "ppe_pipeline_{}",
            uuid::Uuid::new_v4().simple()
        ));
        PersonContext {
            source: Arc::new(RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))),
            threshold: 80.0,
            required: EquipmentType::REQUIRED,
            registry: Arc::new(
                ArtifactRegistry::new(dir, "/artifacts", Arc::new(SystemClock)).unwrap(),
            ),
            placeholder_url: "/artifacts/placeholder.jpg".to_string(),
        }
    }

    fn person(id: i32, bbox: BoundingBox) -> Person {
        Person {
            id,
            confidence: 99.0,
            bounding_box: bbox,
            body_parts: vec![BodyPart {
                name: BodyPartName::Head,
                confidence: 99.0,
                equipment_detections: vec![EquipmentDetection {
                    equipment_type: EquipmentType::HeadCover,
                    confidence: 90.0,
                    bounding_box: BoundingBox::new(0.3, 0.1, 0.2, 0.1),
                    covers_body_part: Some(true),
                }],
            }],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn map_ordered_preserves_input_order() {
        let delays = vec![30_u64, 10, 0, 20];

        let out = map_ordered(delays, |index, delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            index
        })
        .await;

        assert_eq!(out, vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_first_person_keeps_its_slot() {
        let ids = vec![1, 2];

        let out = map_ordered(ids, |_, id| async move {
            if id == 1 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            id
        })
        .await;

        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn writes_crop_for_valid_person() {
        let ctx = context(200, 100);
        let outcome = process_person(&ctx, 0, &person(7, BoundingBox::new(0.25, 0.0, 0.5, 1.0)));

        let path = outcome.artifact.expect("artifact written");
        assert!(path.exists());
        assert!(outcome.result.image_url.starts_with("/artifacts/person_0_"));
        let crop = image::open(&path).unwrap();
        assert_eq!((crop.width(), crop.height()), (100, 100));

        let _ = std::fs::remove_dir_all(ctx.registry.dir());
    }

    #[test]
    fn degenerate_person_gets_placeholder() {
        let ctx = context(200, 100);
        let outcome = process_person(&ctx, 0, &person(7, BoundingBox::new(0.5, 0.5, 0.0, 0.0)));

        assert!(outcome.artifact.is_none());
        assert_eq!(outcome.result.image_url, "/artifacts/placeholder.jpg");
        assert_eq!(outcome.result.person_id, 7);
        assert!(ctx.registry.is_empty());

        let _ = std::fs::remove_dir_all(ctx.registry.dir());
    }

    #[tokio::test]
    async fn one_failing_person_does_not_fail_the_batch() {
        let ctx = Arc::new(context(200, 100));
        let persons = vec![
            person(10, BoundingBox::new(0.0, 0.0, 0.5, 1.0)),
            person(11, BoundingBox::new(2.0, 2.0, 0.5, 0.5)),
            person(12, BoundingBox::new(0.5, 0.0, 0.5, 1.0)),
        ];

        let outcomes = process_persons(Arc::clone(&ctx), persons).await.unwrap();

        let ids: Vec<i32> = outcomes.iter().map(|o| o.result.person_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert!(outcomes[0].artifact.is_some());
        assert!(outcomes[1].artifact.is_none());
        assert!(outcomes[2].artifact.is_some());

        let _ = std::fs::remove_dir_all(ctx.registry.dir());
    }

    #[test]
    fn person_past_left_edge_still_gets_crop() {
        let ctx = context(1000, 800);
        let outcome =
            process_person(&ctx, 0, &person(3, BoundingBox::new(-0.002, 0.1, 0.3, 0.8)));

        let path = outcome.artifact.expect("artifact written");
        assert!(outcome.result.image_url.starts_with("/artifacts/person_0_"));
        let crop = image::open(&path).unwrap();
        assert_eq!((crop.width(), crop.height()), (298, 640));

        let _ = std::fs::remove_dir_all(ctx.registry.dir());
    }
}
