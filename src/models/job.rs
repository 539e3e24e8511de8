//! # Job Model
//!
//! A dataset-processing job claimed once from the shared backlog.
//!
//! ## Overview
//!
//! Jobs are created by the API layer (out of scope here) and sit in the job
//! store with status `pending`. The claim loop moves them through
//! `pending → claimed → done` (or `failed` under the opt-in failure policy).
//! Status is the only mutable coordination field; everything else is fixed
//! at creation.
//!
//! ## Database Schema
//!
//! Maps to the `data_task` table:
//! - `id`: Primary key (BIGINT)
//! - `kind`: Job kind code (SMALLINT, see [`JobKind`])
//! - `status`: 0 pending, 1 claimed, 2 done, 3 failed (SMALLINT)
//! - `dataset_id`, `dataset_version_id`, `target_dataset_id`
//! - `file_filter`: File selection code (SMALLINT, see [`FileFilter`])
//! - `total`: File count snapshot taken at creation (BIGINT)
//! - `merge_columns`, `enhance_types`, `file_ids`, `model_service_id`

use serde::{Deserialize, Serialize};
use std::fmt;

use super::file::AnnotationStatus;
use crate::constants::job_status;

/// Job kinds understood by the dispatcher, keyed by their persisted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    StandardAnnotation,
    FormatConversion,
    Augmentation,
    Tracking,
    MedicalAnnotation,
    TextClassification,
    /// Clears in-progress annotations, then behaves like `StandardAnnotation`
    ReAnnotation,
    TableImport,
    DatasetCopy,
}

impl JobKind {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::StandardAnnotation),
            1 => Some(Self::FormatConversion),
            3 => Some(Self::Augmentation),
            4 => Some(Self::Tracking),
            6 => Some(Self::MedicalAnnotation),
            7 => Some(Self::TextClassification),
            8 => Some(Self::ReAnnotation),
            10 => Some(Self::TableImport),
            11 => Some(Self::DatasetCopy),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            Self::StandardAnnotation => 0,
            Self::FormatConversion => 1,
            Self::Augmentation => 3,
            Self::Tracking => 4,
            Self::MedicalAnnotation => 6,
            Self::TextClassification => 7,
            Self::ReAnnotation => 8,
            Self::TableImport => 10,
            Self::DatasetCopy => 11,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandardAnnotation => "standard_annotation",
            Self::FormatConversion => "format_conversion",
            Self::Augmentation => "augmentation",
            Self::Tracking => "tracking",
            Self::MedicalAnnotation => "medical_annotation",
            Self::TextClassification => "text_classification",
            Self::ReAnnotation => "re_annotation",
            Self::TableImport => "table_import",
            Self::DatasetCopy => "dataset_copy",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim-coordination status. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Claimed,
    Done,
    /// Only written when the failure policy is `mark_failed`
    Failed,
}

impl JobStatus {
    pub fn code(&self) -> i16 {
        match self {
            Self::Pending => job_status::PENDING,
            Self::Claimed => job_status::CLAIMED,
            Self::Done => job_status::DONE,
            Self::Failed => job_status::FAILED,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            job_status::PENDING => Some(Self::Pending),
            job_status::CLAIMED => Some(Self::Claimed),
            job_status::DONE => Some(Self::Done),
            job_status::FAILED => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self → next` is a legal forward move
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Claimed) | (Self::Claimed, Self::Done) | (Self::Claimed, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Claimed => write!(f, "claimed"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Which files of the dataset a job operates on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFilter {
    #[default]
    All,
    NotAnnotated,
    HaveAnnotation,
    AutoAnnotated,
    ManualAnnotated,
}

impl FileFilter {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::All),
            1 => Some(Self::NotAnnotated),
            2 => Some(Self::HaveAnnotation),
            3 => Some(Self::AutoAnnotated),
            4 => Some(Self::ManualAnnotated),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            Self::All => 0,
            Self::NotAnnotated => 1,
            Self::HaveAnnotation => 2,
            Self::AutoAnnotated => 3,
            Self::ManualAnnotated => 4,
        }
    }

    /// Annotation statuses matched by this filter
    pub fn annotation_statuses(&self) -> Vec<AnnotationStatus> {
        use AnnotationStatus::*;
        match self {
            Self::All => vec![NotAnnotated, ManualAnnotating, AutoAnnotated, ManualAnnotated, AutoTracked],
            Self::NotAnnotated => vec![NotAnnotated],
            Self::HaveAnnotation => vec![ManualAnnotating, AutoAnnotated, ManualAnnotated, AutoTracked],
            Self::AutoAnnotated => vec![AutoAnnotated],
            Self::ManualAnnotated => vec![ManualAnnotating, ManualAnnotated],
        }
    }

    /// Selections that include annotated files overwrite existing annotations
    pub fn clears_existing_annotations(&self) -> bool {
        matches!(self, Self::All | Self::HaveAnnotation)
    }
}

/// A job as read from the job store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// Raw kind code; unknown codes are kept so the loop can log and finalise them
    pub kind_code: i16,
    pub status: JobStatus,
    pub dataset_id: i64,
    pub dataset_version_id: Option<i64>,
    /// Destination of a dataset-copy job
    pub target_dataset_id: Option<i64>,
    /// Source version of a dataset-copy job
    pub version_name: Option<String>,
    pub file_filter: FileFilter,
    pub total: i64,
    /// Table import: comma-separated column indices to merge into the row text
    pub merge_columns: Option<String>,
    /// Augmentation: enhancement type codes
    pub enhance_types: Vec<i32>,
    /// Table import: source file ids
    pub file_ids: Vec<i64>,
    /// Alternate worker deployment; replaces the queue tag when present
    pub model_service_id: Option<i64>,
}

impl Job {
    /// A pending job of the given kind with every optional field empty
    pub fn new(id: i64, kind: JobKind, dataset_id: i64) -> Self {
        Self {
            id,
            kind_code: kind.code(),
            status: JobStatus::Pending,
            dataset_id,
            dataset_version_id: None,
            target_dataset_id: None,
            version_name: None,
            file_filter: FileFilter::All,
            total: 0,
            merge_columns: None,
            enhance_types: Vec::new(),
            file_ids: Vec::new(),
            model_service_id: None,
        }
    }

    pub fn kind(&self) -> Option<JobKind> {
        JobKind::from_code(self.kind_code)
    }

    /// Parsed merge-column indices; malformed entries are skipped
    pub fn merge_column_indices(&self) -> Vec<usize> {
        self.merge_columns
            .as_deref()
            .map(|columns| {
                columns
                    .split(',')
                    .filter_map(|c| c.trim().parse::<usize>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}
