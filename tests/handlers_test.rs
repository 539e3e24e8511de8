mod common;

use common::*;

use datatask_core::models::{
    AnnotationStatus, DatasetVersion, FileFilter, JobKind, JobStatus, Label, LabelType, UnitParams,
    WorkUnit,
};
use datatask_core::orchestration::{ClaimOutcome, HandlerOutcome, InMemoryAdapters, TaskClaimLoop};
use datatask_core::DataTaskError;

async fn dispatch(adapters: &InMemoryAdapters, job: datatask_core::Job) -> ClaimOutcome {
    adapters.jobs.insert(job);
    let claim_loop = TaskClaimLoop::with_default_handlers(adapters.context(test_config()).unwrap());
    let outcome = claim_loop.run_once().await.unwrap();
    claim_loop.context().wait_for_background().await;
    outcome
}

fn published(outcome: &ClaimOutcome) -> (String, usize, usize) {
    match outcome {
        ClaimOutcome::Dispatched {
            outcome: Some(HandlerOutcome::Published { queue_key, units, files }),
            ..
        } => (queue_key.clone(), *units, *files),
        other => panic!("expected a publish, got {other:?}"),
    }
}

fn payloads(adapters: &InMemoryAdapters, queue_key: &str) -> Vec<WorkUnit> {
    let detail_prefix = queue_key.replacen("task_queue", "task_detail", 1);
    adapters
        .queue
        .members(queue_key)
        .iter()
        .map(|member| {
            let raw = adapters
                .queue
                .detail(&format!("{detail_prefix}:{member}"))
                .expect("detail written for member");
            serde_json::from_str(&raw).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_imagenet_datasets_route_to_imagenet_queue() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7)
        .with_label_type(LabelType::ImageNet)
        .build(&adapters.metadata);
    seed_files(&adapters.metadata, 7, 1, 20, AnnotationStatus::NotAnnotated, None);

    let outcome = dispatch(&adapters, job(9, JobKind::StandardAnnotation, 7)).await;
    let (queue_key, units, files) = published(&outcome);

    assert_eq!(queue_key, "task_queue:imagenet:7:9");
    assert_eq!((units, files), (2, 20));
    let units = payloads(&adapters, &queue_key);
    assert!(units.iter().all(|u| u.label_type == Some(LabelType::ImageNet)));
    assert!(units
        .iter()
        .flat_map(|u| &u.files)
        .all(|f| f.url.starts_with("/nfs/dataset/7/origin/")));
}

#[tokio::test]
async fn test_model_service_replaces_tag_segment() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7).build(&adapters.metadata);
    seed_files(&adapters.metadata, 7, 1, 3, AnnotationStatus::NotAnnotated, None);
    let mut job = job(9, JobKind::StandardAnnotation, 7);
    job.model_service_id = Some(31);

    let outcome = dispatch(&adapters, job).await;
    let (queue_key, _, _) = published(&outcome);
    assert_eq!(queue_key, "task_queue:31:7:9");
    assert_eq!(payloads(&adapters, &queue_key).len(), 1);
}

#[tokio::test]
async fn test_annotation_clears_existing_annotations_after_partitioning() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7).build(&adapters.metadata);
    seed_files(&adapters.metadata, 7, 1, 4, AnnotationStatus::AutoAnnotated, None);
    let mut job = job(1, JobKind::StandardAnnotation, 7);
    job.file_filter = FileFilter::HaveAnnotation;

    let outcome = dispatch(&adapters, job).await;
    let (_, _, files) = published(&outcome);

    assert_eq!(files, 4);
    assert!(adapters
        .metadata
        .files_in_dataset(7)
        .iter()
        .all(|f| f.annotation_status == AnnotationStatus::NotAnnotated));
}

#[tokio::test]
async fn test_not_annotated_filter_keeps_annotations() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7).build(&adapters.metadata);
    seed_files(&adapters.metadata, 7, 1, 2, AnnotationStatus::NotAnnotated, None);
    seed_files(&adapters.metadata, 7, 3, 2, AnnotationStatus::ManualAnnotated, None);
    let mut job = job(1, JobKind::StandardAnnotation, 7);
    job.file_filter = FileFilter::NotAnnotated;

    let outcome = dispatch(&adapters, job).await;
    assert_eq!(published(&outcome).2, 2);
    assert_eq!(
        adapters.metadata.file(3).unwrap().annotation_status,
        AnnotationStatus::ManualAnnotated
    );
}

#[tokio::test]
async fn test_reannotation_resets_then_publishes_every_file() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7).build(&adapters.metadata);
    seed_files(&adapters.metadata, 7, 1, 5, AnnotationStatus::ManualAnnotated, None);
    let mut job = job(2, JobKind::ReAnnotation, 7);
    job.file_filter = FileFilter::NotAnnotated;

    let outcome = dispatch(&adapters, job).await;
    let (queue_key, _, files) = published(&outcome);

    assert_eq!(queue_key, "task_queue:annotation:7:2");
    assert_eq!(files, 5);
}

#[tokio::test]
async fn test_text_classification_clears_search_index() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(6)
        .with_label_type(LabelType::Text)
        .build(&adapters.metadata);
    seed_files(&adapters.metadata, 6, 1, 3, AnnotationStatus::AutoAnnotated, None);

    let outcome = dispatch(&adapters, job(4, JobKind::TextClassification, 6)).await;
    let (queue_key, _, _) = published(&outcome);

    assert_eq!(queue_key, "task_queue:text_classification:6:4");
    assert_eq!(adapters.search_index.cleared_datasets(), vec![6]);
}

#[tokio::test]
async fn test_format_conversion_publishes_dataset_path_and_labels() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(3).with_version("V0001").build(&adapters.metadata);
    seed_files(&adapters.metadata, 3, 1, 10, AnnotationStatus::ManualAnnotated, Some("V0001"));
    adapters.metadata.add_labels(
        3,
        vec![Label {
            id: 5,
            name: "dog".to_string(),
        }],
    );
    adapters.metadata.add_version(DatasetVersion {
        id: 70,
        dataset_id: 3,
        version_name: "V0001".to_string(),
        version_url: "dataset/3/versionFile/V0001".to_string(),
    });
    let mut job = job(8, JobKind::FormatConversion, 3);
    job.dataset_version_id = Some(70);
    job.total = 10;

    let outcome = dispatch(&adapters, job).await;
    let (queue_key, units, files) = published(&outcome);
    assert_eq!(queue_key, "task_queue:ofrecord:3:8");
    assert_eq!((units, files), (1, 10));

    let unit = &payloads(&adapters, &queue_key)[0];
    match &unit.params {
        UnitParams::FormatConversion {
            dataset_path,
            labels,
            dataset_version_id,
            ..
        } => {
            assert_eq!(dataset_path, "dataset/dataset/3/versionFile/V0001");
            assert_eq!(labels[0].name, "dog");
            assert_eq!(*dataset_version_id, Some(70));
        }
        other => panic!("unexpected params {other:?}"),
    }
}

#[tokio::test]
async fn test_format_conversion_unknown_version_fails() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(3).build(&adapters.metadata);
    let mut job = job(8, JobKind::FormatConversion, 3);
    job.dataset_version_id = Some(999);

    match dispatch(&adapters, job).await {
        ClaimOutcome::Dispatched { status, error, .. } => {
            assert_eq!(status, JobStatus::Done);
            assert_eq!(
                error,
                Some(DataTaskError::not_found("dataset version", 999).to_string())
            );
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_tracking_publishes_single_unit_of_current_version() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(5).with_version("V0002").build(&adapters.metadata);
    seed_files(&adapters.metadata, 5, 1, 30, AnnotationStatus::AutoTracked, Some("V0002"));
    seed_files(&adapters.metadata, 5, 31, 10, AnnotationStatus::AutoTracked, None);

    let outcome = dispatch(&adapters, job(6, JobKind::Tracking, 5)).await;
    let (queue_key, units, files) = published(&outcome);
    assert_eq!(queue_key, "task_queue:track:5:6");
    assert_eq!((units, files), (1, 30));

    let unit = &payloads(&adapters, &queue_key)[0];
    match &unit.params {
        UnitParams::Tracking { version_path, .. } => {
            assert_eq!(version_path, "/nfs/dataset/dataset/5/versionFile/V0002");
        }
        other => panic!("unexpected params {other:?}"),
    }
}

#[tokio::test]
async fn test_augmentation_skips_derived_files() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(4).with_version("V0001").build(&adapters.metadata);
    seed_files(&adapters.metadata, 4, 1, 6, AnnotationStatus::ManualAnnotated, Some("V0001"));
    adapters.metadata.mark_derived(5);
    adapters.metadata.mark_derived(6);
    let mut job = job(3, JobKind::Augmentation, 4);
    job.enhance_types = vec![1, 3];

    let outcome = dispatch(&adapters, job).await;
    let (queue_key, units, files) = published(&outcome);
    assert_eq!(queue_key, "task_queue:imgprocess:4:3");
    assert_eq!((units, files), (1, 4));

    let unit = &payloads(&adapters, &queue_key)[0];
    assert_eq!(unit.version_name.as_deref(), Some("V0001"));
    assert_eq!(
        unit.params,
        UnitParams::Augmentation {
            enhance_types: vec![1, 3]
        }
    );
}

#[tokio::test]
async fn test_medical_clears_annotations_and_routes_to_lung_segmentation() {
    let adapters = InMemoryAdapters::new();
    seed_medical_files(&adapters.metadata, 12, 20);

    let outcome = dispatch(&adapters, job(2, JobKind::MedicalAnnotation, 12)).await;
    let (queue_key, units, files) = published(&outcome);
    assert_eq!(queue_key, "task_queue:lung_segmentation:12:2");
    assert_eq!((units, files), (2, 20));
}

#[tokio::test]
async fn test_dataset_copy_is_submitted_in_background() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(1).with_version("V0003").build(&adapters.metadata);
    DatasetBuilder::new(2).build(&adapters.metadata);
    seed_files(&adapters.metadata, 1, 1, 12, AnnotationStatus::ManualAnnotated, Some("V0003"));
    let mut job = job(10, JobKind::DatasetCopy, 1);
    job.target_dataset_id = Some(2);

    let outcome = dispatch(&adapters, job).await;
    assert!(matches!(
        outcome,
        ClaimOutcome::Dispatched {
            outcome: Some(HandlerOutcome::CopySubmitted { target_dataset_id: 2 }),
            ..
        }
    ));

    let requests = adapters.copier.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].version_name, "V0003");
    assert_eq!(requests[0].files.len(), 12);
    assert_eq!(requests[0].target.id, 2);
    assert!(adapters.queue.queue_keys().is_empty());
}

#[tokio::test]
async fn test_dataset_copy_without_target_fails_validation() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(1).with_version("V0001").build(&adapters.metadata);

    match dispatch(&adapters, job(11, JobKind::DatasetCopy, 1)).await {
        ClaimOutcome::Dispatched { error: Some(error), .. } => {
            assert!(error.contains("no target dataset"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(adapters.copier.requests().is_empty());
}

#[tokio::test]
async fn test_empty_selection_publishes_nothing() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7).build(&adapters.metadata);

    let outcome = dispatch(&adapters, job(1, JobKind::StandardAnnotation, 7)).await;
    let (_, units, files) = published(&outcome);
    assert_eq!((units, files), (0, 0));
    assert_eq!(adapters.queue.total_writes(), 0);
}
