//! Postgres dataset/file catalogue.
//!
//! Reads back the `data_dataset`, `data_file`, `data_version_file`,
//! `data_label` and `data_medicine_file` tables. Status columns are
//! `SMALLINT` codes and are mapped to the model enums here.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{DataTaskError, Result};
use crate::models::{
    AnnotationStatus, Dataset, DatasetVersion, FileRecord, Label, LabelType, MarkStatus,
    MedicalFile, NewFileRecord, VersionFile,
};
use crate::store::{FileMetadataProvider, FileWriter, MarkSummary};

const FILE_COLUMNS: &str =
    "f.id, f.dataset_id, f.name, f.url, f.annotation_status, f.mark_status, f.exclude_header";

/// Offset/limit as bind values; `usize::MAX` means unbounded
fn page_bound(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn status_codes(statuses: &[AnnotationStatus]) -> Vec<i16> {
    statuses.iter().map(AnnotationStatus::code).collect()
}

fn annotation_status(code: i16) -> Result<AnnotationStatus> {
    AnnotationStatus::from_code(code)
        .ok_or_else(|| DataTaskError::DatabaseError(format!("unknown annotation status {code}")))
}

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: i64,
    dataset_id: i64,
    name: String,
    url: String,
    annotation_status: i16,
    mark_status: i16,
    exclude_header: bool,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = DataTaskError;

    fn try_from(row: FileRow) -> Result<Self> {
        Ok(FileRecord {
            id: row.id,
            dataset_id: row.dataset_id,
            name: row.name,
            url: row.url,
            annotation_status: annotation_status(row.annotation_status)?,
            mark_status: MarkStatus::from_code(row.mark_status),
            exclude_header: row.exclude_header,
        })
    }
}

fn into_records(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
    rows.into_iter().map(FileRecord::try_from).collect()
}

#[derive(Debug, sqlx::FromRow)]
struct DatasetRow {
    id: i64,
    name: String,
    uri: String,
    current_version_name: Option<String>,
}

impl From<DatasetRow> for Dataset {
    fn from(row: DatasetRow) -> Self {
        Dataset {
            id: row.id,
            name: row.name,
            uri: row.uri,
            current_version_name: row.current_version_name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MedicalFileRow {
    id: i64,
    medicine_id: i64,
    url: String,
    annotation_status: i16,
}

#[derive(Debug, sqlx::FromRow)]
struct VersionFileRow {
    file_id: i64,
    name: String,
    annotation_status: i16,
}

#[derive(Debug, Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileMetadataProvider for PgMetadataStore {
    async fn list_files(
        &self,
        dataset_id: i64,
        statuses: &[AnnotationStatus],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM data_file f \
             WHERE f.dataset_id = $1 AND f.annotation_status = ANY($2) \
             ORDER BY f.id OFFSET $3 LIMIT $4"
        );
        let rows = sqlx::query_as::<_, FileRow>(&sql)
            .bind(dataset_id)
            .bind(status_codes(statuses))
            .bind(page_bound(offset))
            .bind(page_bound(limit))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn list_version_files(
        &self,
        dataset_id: i64,
        version_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM data_file f \
             JOIN data_version_file v ON v.file_id = f.id \
             WHERE v.dataset_id = $1 AND v.version_name = $2 \
             ORDER BY f.id OFFSET $3 LIMIT $4"
        );
        let rows = sqlx::query_as::<_, FileRow>(&sql)
            .bind(dataset_id)
            .bind(version_name)
            .bind(page_bound(offset))
            .bind(page_bound(limit))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn list_files_for_enhancement(
        &self,
        dataset_id: i64,
        version_name: Option<&str>,
    ) -> Result<Vec<FileRecord>> {
        let rows = match version_name {
            Some(version_name) => {
                let sql = format!(
                    "SELECT {FILE_COLUMNS} FROM data_file f \
                     JOIN data_version_file v ON v.file_id = f.id \
                     WHERE v.dataset_id = $1 AND v.version_name = $2 AND NOT f.derived \
                     ORDER BY f.id"
                );
                sqlx::query_as::<_, FileRow>(&sql)
                    .bind(dataset_id)
                    .bind(version_name)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {FILE_COLUMNS} FROM data_file f \
                     WHERE f.dataset_id = $1 AND NOT f.derived ORDER BY f.id"
                );
                sqlx::query_as::<_, FileRow>(&sql)
                    .bind(dataset_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        into_records(rows)
    }

    async fn list_files_by_ids(&self, file_ids: &[i64]) -> Result<Vec<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM data_file f WHERE f.id = ANY($1) ORDER BY f.id");
        let rows = sqlx::query_as::<_, FileRow>(&sql)
            .bind(file_ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn list_medical_files(
        &self,
        medicine_id: i64,
        statuses: &[AnnotationStatus],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MedicalFile>> {
        let rows = sqlx::query_as::<_, MedicalFileRow>(
            r#"
            SELECT id, medicine_id, url, annotation_status
            FROM data_medicine_file
            WHERE medicine_id = $1 AND annotation_status = ANY($2)
            ORDER BY id OFFSET $3 LIMIT $4
            "#,
        )
        .bind(medicine_id)
        .bind(status_codes(statuses))
        .bind(page_bound(offset))
        .bind(page_bound(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MedicalFile {
                    id: row.id,
                    medicine_id: row.medicine_id,
                    url: row.url,
                    annotation_status: annotation_status(row.annotation_status)?,
                })
            })
            .collect()
    }

    async fn dataset(&self, dataset_id: i64) -> Result<Option<Dataset>> {
        let row = sqlx::query_as::<_, DatasetRow>(
            "SELECT id, name, uri, current_version_name FROM data_dataset WHERE id = $1",
        )
        .bind(dataset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Dataset::from))
    }

    async fn dataset_version(&self, version_id: i64) -> Result<Option<DatasetVersion>> {
        let row = sqlx::query_as::<_, (i64, i64, String, String)>(
            "SELECT id, dataset_id, version_name, version_url FROM data_dataset_version WHERE id = $1",
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, dataset_id, version_name, version_url)| DatasetVersion {
            id,
            dataset_id,
            version_name,
            version_url,
        }))
    }

    async fn labels(&self, dataset_id: i64) -> Result<Vec<Label>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM data_label WHERE dataset_id = $1 ORDER BY id",
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, name)| Label { id, name }).collect())
    }

    async fn label_type(&self, dataset_id: i64) -> Result<Option<LabelType>> {
        let code = sqlx::query_scalar::<_, Option<i16>>(
            "SELECT label_type FROM data_dataset WHERE id = $1",
        )
        .bind(dataset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code.flatten().and_then(LabelType::from_code))
    }

    async fn version_files(&self, dataset_id: i64, version_name: &str) -> Result<Vec<VersionFile>> {
        let rows = sqlx::query_as::<_, VersionFileRow>(
            r#"
            SELECT f.id AS file_id, f.name, f.annotation_status
            FROM data_version_file v
            JOIN data_file f ON f.id = v.file_id
            WHERE v.dataset_id = $1 AND v.version_name = $2
            ORDER BY f.id
            "#,
        )
        .bind(dataset_id)
        .bind(version_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(VersionFile {
                    dataset_id,
                    version_name: version_name.to_string(),
                    file_id: row.file_id,
                    file_name: row.name,
                    annotation_status: annotation_status(row.annotation_status)?,
                })
            })
            .collect()
    }

    async fn mark_summary(&self, dataset_id: i64) -> Result<MarkSummary> {
        let (total, unmarked) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE mark_status <> $2)
            FROM data_file
            WHERE dataset_id = $1
            "#,
        )
        .bind(dataset_id)
        .bind(MarkStatus::ManualMarked.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(MarkSummary {
            total: u64::try_from(total).unwrap_or(0),
            unmarked: u64::try_from(unmarked).unwrap_or(0),
        })
    }
}

#[async_trait]
impl FileWriter for PgMetadataStore {
    async fn clear_annotations(&self, dataset_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE data_file SET annotation_status = $2 WHERE dataset_id = $1 AND annotation_status <> $2",
        )
        .bind(dataset_id)
        .bind(AnnotationStatus::NotAnnotated.code())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn clear_medical_annotations(&self, medicine_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE data_medicine_file SET annotation_status = $2 WHERE medicine_id = $1 AND annotation_status <> $2",
        )
        .bind(medicine_id)
        .bind(AnnotationStatus::NotAnnotated.code())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn save_files(&self, dataset_id: i64, files: &[NewFileRecord]) -> Result<Vec<FileRecord>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let urls: Vec<String> = files.iter().map(|f| f.url.clone()).collect();
        let texts: Vec<String> = files.iter().map(|f| f.text.clone()).collect();

        // UNNEST preserves input order, and ids come from one sequence in that order
        let rows = sqlx::query_as::<_, FileRow>(
            r#"
            INSERT INTO data_file (dataset_id, name, url, text_content, annotation_status, mark_status)
            SELECT $1, name, url, text_content, $5, $6
            FROM UNNEST($2::text[], $3::text[], $4::text[]) AS t(name, url, text_content)
            RETURNING id, dataset_id, name, url, annotation_status, mark_status, exclude_header
            "#,
        )
        .bind(dataset_id)
        .bind(names)
        .bind(urls)
        .bind(texts)
        .bind(AnnotationStatus::NotAnnotated.code())
        .bind(MarkStatus::Unmarked.code())
        .fetch_all(&self.pool)
        .await?;

        let mut saved = into_records(rows)?;
        saved.sort_by_key(|file| file.id);
        Ok(saved)
    }

    async fn register_version_files(
        &self,
        dataset_id: i64,
        version_name: &str,
        files: &[FileRecord],
    ) -> Result<()> {
        let ids: Vec<i64> = files.iter().map(|f| f.id).collect();
        sqlx::query(
            r#"
            INSERT INTO data_version_file (dataset_id, version_name, file_id)
            SELECT $1, $2, UNNEST($3::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(dataset_id)
        .bind(version_name)
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
