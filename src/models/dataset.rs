use serde::{Deserialize, Serialize};

/// Label taxonomy of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    ImageNet,
    Coco,
    AutoAnnotation,
    Custom,
    Text,
}

impl LabelType {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::ImageNet),
            2 => Some(Self::Coco),
            3 => Some(Self::AutoAnnotation),
            4 => Some(Self::Custom),
            5 => Some(Self::Text),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            Self::ImageNet => 1,
            Self::Coco => 2,
            Self::AutoAnnotation => 3,
            Self::Custom => 4,
            Self::Text => 5,
        }
    }
}

/// Dataset record. Lifecycle state is deliberately absent: only the state
/// machine reads or writes it, through `DatasetStateStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    /// Storage-relative directory of the dataset
    pub uri: String,
    pub current_version_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub id: i64,
    pub dataset_id: i64,
    pub version_name: String,
    /// Storage-relative directory of the version snapshot
    pub version_url: String,
}
