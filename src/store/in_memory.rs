//! In-memory adapters for tests and local runs.
//!
//! Each store keeps its data behind a `parking_lot` lock (or a `DashMap` for
//! per-dataset state) and reproduces the atomicity of the real backend: the
//! job claim and the dataset state swap are both check-and-set under one lock.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use super::traits::{
    CopyRequest, DatasetCopier, DatasetStateStore, FileMetadataProvider, FileWriter,
    IndexDocument, JobStore, MarkSummary, SearchIndex,
};
use crate::error::Result;
use crate::models::{
    AnnotationStatus, Dataset, DatasetVersion, FileRecord, Job, JobStatus, Label, LabelType,
    MarkStatus, MedicalFile, NewFileRecord, VersionFile,
};
use crate::state_machine::DatasetState;

/// Job backlog keyed by id; lowest pending id is handed out first
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<BTreeMap<i64, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    pub fn get(&self, job_id: i64) -> Option<Job> {
        self.jobs.lock().get(&job_id).cloned()
    }

    pub fn status(&self, job_id: i64) -> Option<JobStatus> {
        self.jobs.lock().get(&job_id).map(|job| job.status)
    }

    pub fn pending_count(&self) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .count()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn claim_one_pending(&self) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .values()
            .find(|job| job.status == JobStatus::Pending)
            .cloned())
    }

    async fn transition(&self, job_id: i64, from: JobStatus, to: JobStatus) -> Result<u64> {
        if !from.can_transition_to(to) {
            return Ok(0);
        }
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == from => {
                job.status = to;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[derive(Debug, Default)]
struct Catalog {
    datasets: HashMap<i64, Dataset>,
    label_types: HashMap<i64, LabelType>,
    labels: HashMap<i64, Vec<Label>>,
    versions: HashMap<i64, DatasetVersion>,
    files: BTreeMap<i64, FileRecord>,
    /// Files created by augmentation; excluded from enhancement input
    derived_files: BTreeSet<i64>,
    version_members: HashMap<(i64, String), BTreeSet<i64>>,
    medical_files: BTreeMap<i64, MedicalFile>,
    file_texts: HashMap<i64, String>,
    next_file_id: i64,
}

impl Catalog {
    fn version_file_ids(&self, dataset_id: i64, version_name: &str) -> Vec<i64> {
        self.version_members
            .get(&(dataset_id, version_name.to_string()))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Dataset and file catalogue implementing both the read and write seams
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dataset(&self, dataset: Dataset, label_type: Option<LabelType>) {
        let mut catalog = self.catalog.write();
        if let Some(label_type) = label_type {
            catalog.label_types.insert(dataset.id, label_type);
        }
        catalog.datasets.insert(dataset.id, dataset);
    }

    pub fn add_labels(&self, dataset_id: i64, labels: Vec<Label>) {
        self.catalog
            .write()
            .labels
            .entry(dataset_id)
            .or_default()
            .extend(labels);
    }

    pub fn add_version(&self, version: DatasetVersion) {
        self.catalog.write().versions.insert(version.id, version);
    }

    /// Insert a file, optionally registering it in a version
    pub fn add_file(&self, file: FileRecord, version_name: Option<&str>) {
        let mut catalog = self.catalog.write();
        catalog.next_file_id = catalog.next_file_id.max(file.id);
        if let Some(version_name) = version_name {
            catalog
                .version_members
                .entry((file.dataset_id, version_name.to_string()))
                .or_default()
                .insert(file.id);
        }
        catalog.files.insert(file.id, file);
    }

    /// Mark a file as produced by augmentation
    pub fn mark_derived(&self, file_id: i64) {
        self.catalog.write().derived_files.insert(file_id);
    }

    pub fn add_medical_file(&self, file: MedicalFile) {
        self.catalog.write().medical_files.insert(file.id, file);
    }

    pub fn set_mark_status(&self, file_id: i64, mark_status: MarkStatus) {
        if let Some(file) = self.catalog.write().files.get_mut(&file_id) {
            file.mark_status = mark_status;
        }
    }

    pub fn file(&self, file_id: i64) -> Option<FileRecord> {
        self.catalog.read().files.get(&file_id).cloned()
    }

    pub fn file_text(&self, file_id: i64) -> Option<String> {
        self.catalog.read().file_texts.get(&file_id).cloned()
    }

    pub fn files_in_dataset(&self, dataset_id: i64) -> Vec<FileRecord> {
        self.catalog
            .read()
            .files
            .values()
            .filter(|file| file.dataset_id == dataset_id)
            .cloned()
            .collect()
    }

    pub fn medical_file(&self, file_id: i64) -> Option<MedicalFile> {
        self.catalog.read().medical_files.get(&file_id).cloned()
    }

    pub fn version_file_count(&self, dataset_id: i64, version_name: &str) -> usize {
        self.catalog
            .read()
            .version_file_ids(dataset_id, version_name)
            .len()
    }
}

#[async_trait]
impl FileMetadataProvider for InMemoryMetadataStore {
    async fn list_files(
        &self,
        dataset_id: i64,
        statuses: &[AnnotationStatus],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        Ok(self
            .catalog
            .read()
            .files
            .values()
            .filter(|file| file.dataset_id == dataset_id && statuses.contains(&file.annotation_status))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_version_files(
        &self,
        dataset_id: i64,
        version_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        let catalog = self.catalog.read();
        Ok(catalog
            .version_file_ids(dataset_id, version_name)
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| catalog.files.get(&id).cloned())
            .collect())
    }

    async fn list_files_for_enhancement(
        &self,
        dataset_id: i64,
        version_name: Option<&str>,
    ) -> Result<Vec<FileRecord>> {
        let catalog = self.catalog.read();
        let ids: Vec<i64> = match version_name {
            Some(version_name) => catalog.version_file_ids(dataset_id, version_name),
            None => catalog
                .files
                .values()
                .filter(|file| file.dataset_id == dataset_id)
                .map(|file| file.id)
                .collect(),
        };
        Ok(ids
            .into_iter()
            .filter(|id| !catalog.derived_files.contains(id))
            .filter_map(|id| catalog.files.get(&id).cloned())
            .collect())
    }

    async fn list_files_by_ids(&self, file_ids: &[i64]) -> Result<Vec<FileRecord>> {
        let catalog = self.catalog.read();
        Ok(file_ids
            .iter()
            .filter_map(|id| catalog.files.get(id).cloned())
            .collect())
    }

    async fn list_medical_files(
        &self,
        medicine_id: i64,
        statuses: &[AnnotationStatus],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MedicalFile>> {
        Ok(self
            .catalog
            .read()
            .medical_files
            .values()
            .filter(|file| {
                file.medicine_id == medicine_id && statuses.contains(&file.annotation_status)
            })
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn dataset(&self, dataset_id: i64) -> Result<Option<Dataset>> {
        Ok(self.catalog.read().datasets.get(&dataset_id).cloned())
    }

    async fn dataset_version(&self, version_id: i64) -> Result<Option<DatasetVersion>> {
        Ok(self.catalog.read().versions.get(&version_id).cloned())
    }

    async fn labels(&self, dataset_id: i64) -> Result<Vec<Label>> {
        Ok(self
            .catalog
            .read()
            .labels
            .get(&dataset_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn label_type(&self, dataset_id: i64) -> Result<Option<LabelType>> {
        Ok(self.catalog.read().label_types.get(&dataset_id).copied())
    }

    async fn version_files(&self, dataset_id: i64, version_name: &str) -> Result<Vec<VersionFile>> {
        let catalog = self.catalog.read();
        Ok(catalog
            .version_file_ids(dataset_id, version_name)
            .into_iter()
            .filter_map(|id| catalog.files.get(&id))
            .map(|file| VersionFile {
                dataset_id,
                version_name: version_name.to_string(),
                file_id: file.id,
                file_name: file.name.clone(),
                annotation_status: file.annotation_status,
            })
            .collect())
    }

    async fn mark_summary(&self, dataset_id: i64) -> Result<MarkSummary> {
        let catalog = self.catalog.read();
        let mut summary = MarkSummary::default();
        for file in catalog.files.values().filter(|f| f.dataset_id == dataset_id) {
            summary.total += 1;
            if file.mark_status != MarkStatus::ManualMarked {
                summary.unmarked += 1;
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl FileWriter for InMemoryMetadataStore {
    async fn clear_annotations(&self, dataset_id: i64) -> Result<u64> {
        let mut catalog = self.catalog.write();
        let mut cleared = 0;
        for file in catalog
            .files
            .values_mut()
            .filter(|file| file.dataset_id == dataset_id)
        {
            if file.annotation_status != AnnotationStatus::NotAnnotated {
                file.annotation_status = AnnotationStatus::NotAnnotated;
                cleared += 1;
            }
        }
        debug!(dataset_id = dataset_id, cleared = cleared, "Cleared annotations");
        Ok(cleared)
    }

    async fn clear_medical_annotations(&self, medicine_id: i64) -> Result<u64> {
        let mut catalog = self.catalog.write();
        let mut cleared = 0;
        for file in catalog
            .medical_files
            .values_mut()
            .filter(|file| file.medicine_id == medicine_id)
        {
            if file.annotation_status != AnnotationStatus::NotAnnotated {
                file.annotation_status = AnnotationStatus::NotAnnotated;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn save_files(&self, dataset_id: i64, files: &[NewFileRecord]) -> Result<Vec<FileRecord>> {
        let mut catalog = self.catalog.write();
        let mut saved = Vec::with_capacity(files.len());
        for new_file in files {
            catalog.next_file_id += 1;
            let record = FileRecord {
                id: catalog.next_file_id,
                dataset_id,
                name: new_file.name.clone(),
                url: new_file.url.clone(),
                annotation_status: AnnotationStatus::NotAnnotated,
                mark_status: MarkStatus::Unmarked,
                exclude_header: false,
            };
            catalog.file_texts.insert(record.id, new_file.text.clone());
            catalog.files.insert(record.id, record.clone());
            saved.push(record);
        }
        Ok(saved)
    }

    async fn register_version_files(
        &self,
        dataset_id: i64,
        version_name: &str,
        files: &[FileRecord],
    ) -> Result<()> {
        let mut catalog = self.catalog.write();
        catalog
            .version_members
            .entry((dataset_id, version_name.to_string()))
            .or_default()
            .extend(files.iter().map(|file| file.id));
        Ok(())
    }
}

/// Records indexed documents so tests can inspect them
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: Mutex<Vec<IndexDocument>>,
    cleared: Mutex<Vec<i64>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<IndexDocument> {
        self.documents.lock().clone()
    }

    pub fn cleared_datasets(&self) -> Vec<i64> {
        self.cleared.lock().clone()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index(&self, documents: Vec<IndexDocument>) -> Result<()> {
        self.documents.lock().extend(documents);
        Ok(())
    }

    async fn clear_dataset(&self, dataset_id: i64) -> Result<()> {
        self.documents
            .lock()
            .retain(|document| document.dataset_id != dataset_id);
        self.cleared.lock().push(dataset_id);
        Ok(())
    }
}

/// Search index used when none is configured; accepts and drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSearchIndex;

#[async_trait]
impl SearchIndex for DisabledSearchIndex {
    async fn index(&self, documents: Vec<IndexDocument>) -> Result<()> {
        debug!(documents = documents.len(), "Search index disabled, skipping");
        Ok(())
    }

    async fn clear_dataset(&self, _dataset_id: i64) -> Result<()> {
        Ok(())
    }
}

/// Dataset lifecycle states, one entry per dataset
#[derive(Debug, Default)]
pub struct InMemoryDatasetStateStore {
    states: DashMap<i64, DatasetState>,
}

impl InMemoryDatasetStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, dataset_id: i64, state: DatasetState) {
        self.states.insert(dataset_id, state);
    }

    pub fn get(&self, dataset_id: i64) -> Option<DatasetState> {
        self.states.get(&dataset_id).map(|entry| *entry)
    }
}

#[async_trait]
impl DatasetStateStore for InMemoryDatasetStateStore {
    async fn current_state(&self, dataset_id: i64) -> Result<Option<DatasetState>> {
        Ok(self.get(dataset_id))
    }

    async fn compare_and_swap(
        &self,
        dataset_id: i64,
        expected: DatasetState,
        next: DatasetState,
    ) -> Result<bool> {
        // get_mut holds the shard lock for the whole check-and-set
        match self.states.get_mut(&dataset_id) {
            Some(mut state) if *state == expected => {
                *state = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Copier that records requests instead of copying
#[derive(Debug, Default)]
pub struct RecordingDatasetCopier {
    requests: Mutex<Vec<CopyRequest>>,
}

impl RecordingDatasetCopier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CopyRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DatasetCopier for RecordingDatasetCopier {
    async fn copy_dataset(&self, request: CopyRequest) -> Result<()> {
        self.requests.lock().push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobKind;
    use std::sync::Arc;

    fn file(id: i64, dataset_id: i64, status: AnnotationStatus) -> FileRecord {
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

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let store = InMemoryJobStore::new();
        store.insert(Job::new(1, JobKind::StandardAnnotation, 7));

        assert_eq!(
            store.transition(1, JobStatus::Pending, JobStatus::Claimed).await.unwrap(),
            1
        );
        assert_eq!(
            store.transition(1, JobStatus::Pending, JobStatus::Claimed).await.unwrap(),
            0
        );
        assert_eq!(
            store.transition(404, JobStatus::Pending, JobStatus::Claimed).await.unwrap(),
            0
        );
        assert_eq!(store.status(1), Some(JobStatus::Claimed));
    }

    #[tokio::test]
    async fn test_oldest_pending_is_selected() {
        let store = InMemoryJobStore::new();
        store.insert(Job::new(5, JobKind::Tracking, 1));
        store.insert(Job::new(2, JobKind::Tracking, 1));
        let job = store.claim_one_pending().await.unwrap().unwrap();
        assert_eq!(job.id, 2);
    }

    #[tokio::test]
    async fn test_list_files_pages_by_filter() {
        let store = InMemoryMetadataStore::new();
        for id in 1..=5 {
            store.add_file(file(id, 1, AnnotationStatus::NotAnnotated), None);
        }
        store.add_file(file(6, 1, AnnotationStatus::AutoAnnotated), None);
        store.add_file(file(7, 2, AnnotationStatus::NotAnnotated), None);

        let statuses = [AnnotationStatus::NotAnnotated];
        let first = store.list_files(1, &statuses, 0, 3).await.unwrap();
        let second = store.list_files(1, &statuses, 3, 3).await.unwrap();
        let third = store.list_files(1, &statuses, 6, 3).await.unwrap();

        assert_eq!(first.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(second.iter().map(|f| f.id).collect::<Vec<_>>(), vec![4, 5]);
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_save_files_assigns_fresh_ids() {
        let store = InMemoryMetadataStore::new();
        store.add_file(file(10, 1, AnnotationStatus::NotAnnotated), None);

        let saved = store
            .save_files(
                1,
                &[NewFileRecord {
                    name: "t_1.txt".to_string(),
                    url: "dataset/1/origin/t_1.txt".to_string(),
                    text: "hello".to_string(),
                }],
            )
            .await
            .unwrap();

        assert_eq!(saved[0].id, 11);
        assert_eq!(store.file_text(11).as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_compare_and_swap_has_single_winner() {
        let store = Arc::new(InMemoryDatasetStateStore::new());
        store.set(3, DatasetState::Labeling);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap(3, DatasetState::Labeling, DatasetState::Published)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.get(3), Some(DatasetState::Published));
    }

    #[tokio::test]
    async fn test_mark_summary() {
        let store = InMemoryMetadataStore::new();
        store.add_file(file(1, 1, AnnotationStatus::ManualAnnotated), None);
        store.add_file(file(2, 1, AnnotationStatus::ManualAnnotated), None);
        store.set_mark_status(1, MarkStatus::ManualMarked);

        let summary = store.mark_summary(1).await.unwrap();
        assert_eq!(summary, MarkSummary { total: 2, unmarked: 1 });
    }
}
