//! Builders for seeding the in-memory adapters

use datatask_core::models::{
    AnnotationStatus, Dataset, FileRecord, Job, JobKind, LabelType, MarkStatus, MedicalFile,
};
use datatask_core::store::InMemoryMetadataStore;

/// Builder for datasets registered in an [`InMemoryMetadataStore`]
pub struct DatasetBuilder {
    id: i64,
    version: Option<String>,
    label_type: Option<LabelType>,
}

impl DatasetBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            version: None,
            label_type: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_label_type(mut self, label_type: LabelType) -> Self {
        self.label_type = Some(label_type);
        self
    }

    pub fn build(self, metadata: &InMemoryMetadataStore) -> Dataset {
        let dataset = Dataset {
            id: self.id,
            name: format!("dataset-{}", self.id),
            uri: format!("dataset/{}", self.id),
            current_version_name: self.version,
        };
        metadata.add_dataset(dataset.clone(), self.label_type);
        dataset
    }
}

/// A plain image file record under the dataset's origin directory
pub fn image_file(id: i64, dataset_id: i64, status: AnnotationStatus) -> FileRecord {
    FileRecord {
        id,
        dataset_id,
        name: format!("{id}.jpg"),
        url: format!("dataset/{dataset_id}/origin/{id}.jpg"),
        annotation_status: status,
        mark_status: MarkStatus::Unmarked,
        exclude_header: false,
    }
}

/// Seed `count` files with ids `first_id..first_id + count`
pub fn seed_files(
    metadata: &InMemoryMetadataStore,
    dataset_id: i64,
    first_id: i64,
    count: usize,
    status: AnnotationStatus,
    version: Option<&str>,
) {
    for id in first_id..first_id + count as i64 {
        metadata.add_file(image_file(id, dataset_id, status), version);
    }
}

pub fn seed_medical_files(metadata: &InMemoryMetadataStore, medicine_id: i64, count: usize) {
    for id in 1..=count as i64 {
        metadata.add_medical_file(MedicalFile {
            id,
            medicine_id,
            url: format!("dataset/dcm/{medicine_id}/origin/1.2.840/IM_{id:04}.dcm"),
            annotation_status: AnnotationStatus::NotAnnotated,
        });
    }
}

pub fn job(id: i64, kind: JobKind, dataset_id: i64) -> Job {
    Job::new(id, kind, dataset_id)
}
