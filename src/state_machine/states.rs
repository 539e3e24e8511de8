use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetState {
    /// Created, nothing imported yet
    NotSampled,
    /// Files or table rows are being imported
    Importing,
    /// Files are available for (manual) labeling
    Labeling,
    /// An automatic annotation job is running
    AutoLabeling,
    /// All files confirmed and the version published
    Published,
    DifficultCasePublishing,
    DifficultCaseFailedToPublish,
}

impl DatasetState {
    pub const ALL: [DatasetState; 7] = [
        Self::NotSampled,
        Self::Importing,
        Self::Labeling,
        Self::AutoLabeling,
        Self::Published,
        Self::DifficultCasePublishing,
        Self::DifficultCaseFailedToPublish,
    ];

    /// Check if a background operation owns the dataset
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Importing | Self::AutoLabeling | Self::DifficultCasePublishing
        )
    }

    /// Persisted code of the `status` column
    pub fn code(&self) -> i16 {
        match self {
            Self::NotSampled => 101,
            Self::Importing => 102,
            Self::Labeling => 103,
            Self::AutoLabeling => 104,
            Self::Published => 105,
            Self::DifficultCasePublishing => 106,
            Self::DifficultCaseFailedToPublish => 107,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }
}

impl fmt::Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSampled => write!(f, "not_sampled"),
            Self::Importing => write!(f, "importing"),
            Self::Labeling => write!(f, "labeling"),
            Self::AutoLabeling => write!(f, "auto_labeling"),
            Self::Published => write!(f, "published"),
            Self::DifficultCasePublishing => write!(f, "difficult_case_publishing"),
            Self::DifficultCaseFailedToPublish => write!(f, "difficult_case_failed_to_publish"),
        }
    }
}

impl std::str::FromStr for DatasetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_sampled" => Ok(Self::NotSampled),
            "importing" => Ok(Self::Importing),
            "labeling" => Ok(Self::Labeling),
            "auto_labeling" => Ok(Self::AutoLabeling),
            "published" => Ok(Self::Published),
            "difficult_case_publishing" => Ok(Self::DifficultCasePublishing),
            "difficult_case_failed_to_publish" => Ok(Self::DifficultCaseFailedToPublish),
            _ => Err(format!("Invalid dataset state: {s}")),
        }
    }
}
