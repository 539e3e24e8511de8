mod common;

use common::*;

use datatask_core::models::{
    AnnotationStatus, DatasetVersion, FileFilter, JobKind, Label, QueueTag, UnitParams,
};
use datatask_core::orchestration::InMemoryAdapters;

fn version_fixture(adapters: &InMemoryAdapters, files: usize) -> DatasetVersion {
    DatasetBuilder::new(3).with_version("V0002").build(&adapters.metadata);
    seed_files(&adapters.metadata, 3, 1, files, AnnotationStatus::ManualAnnotated, Some("V0002"));
    let version = DatasetVersion {
        id: 77,
        dataset_id: 3,
        version_name: "V0002".to_string(),
        version_url: "dataset/3/versionFile/V0002".to_string(),
    };
    adapters.metadata.add_version(version.clone());
    version
}

#[tokio::test]
async fn test_format_conversion_uses_256_parts_with_overflow_in_last() {
    let adapters = InMemoryAdapters::new();
    let k = 3;
    let r = 5;
    let total = 256 * k + r;
    let version = version_fixture(&adapters, total);
    let ctx = adapters.context(test_config()).unwrap();

    let mut job = job(1, JobKind::FormatConversion, 3);
    job.total = total as i64;
    job.dataset_version_id = Some(version.id);
    let labels = vec![Label {
        id: 1,
        name: "cat".to_string(),
    }];

    let units = ctx
        .partitioner
        .partition_format_conversion(&job, &version, "dataset/dataset/3/versionFile/V0002", &labels)
        .await
        .unwrap();

    assert_eq!(units.len(), 256);
    for (idx, unit) in units.iter().enumerate() {
        assert_eq!(unit.part_num(), Some(idx));
        assert_eq!(unit.algorithm, QueueTag::Ofrecord);
        let expected = if idx < 255 { k } else { k + r };
        assert_eq!(unit.file_count(), expected, "part {idx}");
    }
    let covered: usize = units.iter().map(|u| u.file_count()).sum();
    assert_eq!(covered, total);
}

#[tokio::test]
async fn test_format_conversion_small_total_is_single_part() {
    let adapters = InMemoryAdapters::new();
    let version = version_fixture(&adapters, 200);
    let ctx = adapters.context(test_config()).unwrap();

    let mut job = job(2, JobKind::FormatConversion, 3);
    job.total = 200;

    let units = ctx
        .partitioner
        .partition_format_conversion(&job, &version, "dataset/x", &[])
        .await
        .unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].file_count(), 200);
    match &units[0].params {
        UnitParams::FormatConversion { part_num, dataset_path, .. } => {
            assert_eq!(*part_num, 0);
            assert_eq!(dataset_path, "dataset/x");
        }
        other => panic!("unexpected params {other:?}"),
    }
}

#[tokio::test]
async fn test_filter_pages_until_empty_and_tags_version() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(8).with_version("V0005").build(&adapters.metadata);
    seed_files(&adapters.metadata, 8, 1, 2_500, AnnotationStatus::NotAnnotated, None);
    let mut config = test_config();
    config.partition.page_size = 1_000;
    let ctx = adapters.context(config).unwrap();

    let units = ctx
        .partitioner
        .partition_by_filter(&job(5, JobKind::StandardAnnotation, 8), QueueTag::Annotation)
        .await
        .unwrap();

    // pages of 1000, 1000, 500 → 63 + 63 + 32 units of at most 16 files
    assert_eq!(units.len(), 158);
    assert!(units.iter().all(|u| u.file_count() <= 16));
    assert!(units.iter().all(|u| u.version_name.as_deref() == Some("V0005")));
    let covered: usize = units.iter().map(|u| u.file_count()).sum();
    assert_eq!(covered, 2_500);
}

#[tokio::test]
async fn test_filter_selects_matching_statuses_only() {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(9).build(&adapters.metadata);
    seed_files(&adapters.metadata, 9, 1, 10, AnnotationStatus::NotAnnotated, None);
    seed_files(&adapters.metadata, 9, 11, 5, AnnotationStatus::AutoAnnotated, None);
    let ctx = adapters.context(test_config()).unwrap();

    let mut job = job(6, JobKind::StandardAnnotation, 9);
    job.file_filter = FileFilter::AutoAnnotated;
    let units = ctx
        .partitioner
        .partition_by_filter(&job, QueueTag::Annotation)
        .await
        .unwrap();

    assert_eq!(units.len(), 1);
    let ids: Vec<i64> = units[0].files.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![11, 12, 13, 14, 15]);
}

#[tokio::test]
async fn test_missing_dataset_is_not_found() {
    let adapters = InMemoryAdapters::new();
    seed_files(&adapters.metadata, 404, 1, 3, AnnotationStatus::NotAnnotated, None);
    let ctx = adapters.context(test_config()).unwrap();

    let err = ctx
        .partitioner
        .partition_by_filter(&job(1, JobKind::StandardAnnotation, 404), QueueTag::Annotation)
        .await
        .unwrap_err();
    assert_eq!(err, datatask_core::DataTaskError::not_found("dataset", 404));
}

#[tokio::test]
async fn test_medical_units_carry_annotation_path() {
    let adapters = InMemoryAdapters::new();
    seed_medical_files(&adapters.metadata, 12, 40);
    let ctx = adapters.context(test_config()).unwrap();

    let units = ctx
        .partitioner
        .partition_medical(&job(9, JobKind::MedicalAnnotation, 12))
        .await
        .unwrap();

    let sizes: Vec<usize> = units.iter().map(|u| u.file_count()).collect();
    assert_eq!(sizes, vec![16, 16, 8]);
    match &units[0].params {
        UnitParams::Medical { medicine_id, annotation_path } => {
            assert_eq!(*medicine_id, 12);
            assert_eq!(annotation_path, "/nfs/dataset/dcm/12/annotation/1.2.840");
        }
        other => panic!("unexpected params {other:?}"),
    }
}
