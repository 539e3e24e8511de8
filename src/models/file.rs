use serde::{Deserialize, Serialize};

/// Annotation progress of a dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    NotAnnotated,
    ManualAnnotating,
    AutoAnnotated,
    ManualAnnotated,
    AutoTracked,
}

impl AnnotationStatus {
    pub fn code(&self) -> i16 {
        match self {
            Self::NotAnnotated => 101,
            Self::ManualAnnotating => 102,
            Self::AutoAnnotated => 103,
            Self::ManualAnnotated => 104,
            Self::AutoTracked => 105,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            101 => Some(Self::NotAnnotated),
            102 => Some(Self::ManualAnnotating),
            103 => Some(Self::AutoAnnotated),
            104 => Some(Self::ManualAnnotated),
            105 => Some(Self::AutoTracked),
            _ => None,
        }
    }
}

/// Whether an operator confirmed a file's labels; gates dataset publishing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkStatus {
    #[default]
    Unmarked,
    AutoMarked,
    ManualMarked,
}

impl MarkStatus {
    pub fn code(&self) -> i16 {
        match self {
            Self::Unmarked => 0,
            Self::AutoMarked => 1,
            Self::ManualMarked => 2,
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::AutoMarked,
            2 => Self::ManualMarked,
            _ => Self::Unmarked,
        }
    }
}

/// A stored dataset file. `url` is relative to the file store root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub dataset_id: i64,
    pub name: String,
    pub url: String,
    pub annotation_status: AnnotationStatus,
    pub mark_status: MarkStatus,
    /// Table sources only: first row is a header
    pub exclude_header: bool,
}

impl FileRecord {
    /// Last path segment of the url
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    /// Lower-cased extension of the url, if any
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        name.rfind('.')
            .map(|idx| name[idx + 1..].to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// A file produced by table import, before it has an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub name: String,
    pub url: String,
    pub text: String,
}

/// A medical image file (DICOM) belonging to a medical dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalFile {
    pub id: i64,
    pub medicine_id: i64,
    pub url: String,
    pub annotation_status: AnnotationStatus,
}

/// Membership of a file in a dataset version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionFile {
    pub dataset_id: i64,
    pub version_name: String,
    pub file_id: i64,
    pub file_name: String,
    pub annotation_status: AnnotationStatus,
}
