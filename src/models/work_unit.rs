//! # Work Unit Model
//!
//! A bounded batch of files plus the metadata a worker needs, produced by the
//! partitioner and published as one queue entry. The sub-task id is empty
//! until the publisher assigns it; after that the unit is never modified.
//!
//! ## Wire envelope
//!
//! Units serialise to a flat JSON object. Common fields (`job_id`,
//! `dataset_id`, `algorithm`, `re_task_id`, `files`, `version_name`,
//! `label_type`) are always present; kind-specific parameters are flattened
//! in next to them, discriminated by `payload`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::dataset::{Label, LabelType};
use super::file::FileRecord;

/// Algorithm tag: the routing segment of both queue keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueTag {
    Annotation,
    Imagenet,
    Ofrecord,
    Track,
    Imgprocess,
    LungSegmentation,
    TextClassification,
}

impl QueueTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annotation => "annotation",
            Self::Imagenet => "imagenet",
            Self::Ofrecord => "ofrecord",
            Self::Track => "track",
            Self::Imgprocess => "imgprocess",
            Self::LungSegmentation => "lung_segmentation",
            Self::TextClassification => "text_classification",
        }
    }
}

impl fmt::Display for QueueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file reference inside a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFile {
    pub id: i64,
    pub url: String,
}

impl From<&FileRecord> for UnitFile {
    fn from(file: &FileRecord) -> Self {
        Self {
            id: file.id,
            url: file.url.clone(),
        }
    }
}

/// Kind-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum UnitParams {
    /// Standard, re-annotation and text-classification units
    Annotation { label_ids: Vec<i64> },
    FormatConversion {
        part_num: usize,
        /// `{bucket}/{version_url}`
        dataset_path: String,
        labels: Vec<Label>,
        dataset_version_id: Option<i64>,
    },
    Tracking {
        label_ids: Vec<i64>,
        /// Absolute directory of the tracked version
        version_path: String,
    },
    Augmentation { enhance_types: Vec<i32> },
    Medical {
        medicine_id: i64,
        /// Directory the worker writes its annotation output to
        annotation_path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    #[serde(rename = "re_task_id", default, skip_serializing_if = "Option::is_none")]
    pub sub_task_id: Option<String>,
    pub job_id: i64,
    pub dataset_id: i64,
    pub algorithm: QueueTag,
    pub files: Vec<UnitFile>,
    pub version_name: Option<String>,
    pub label_type: Option<LabelType>,
    #[serde(flatten)]
    pub params: UnitParams,
}

impl WorkUnit {
    pub fn new(
        job_id: i64,
        dataset_id: i64,
        algorithm: QueueTag,
        files: Vec<UnitFile>,
        params: UnitParams,
    ) -> Self {
        Self {
            sub_task_id: None,
            job_id,
            dataset_id,
            algorithm,
            files,
            version_name: None,
            label_type: None,
            params,
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Part number for format-conversion units
    pub fn part_num(&self) -> Option<usize> {
        match self.params {
            UnitParams::FormatConversion { part_num, .. } => Some(part_num),
            _ => None,
        }
    }
}
