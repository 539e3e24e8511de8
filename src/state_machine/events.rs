use serde::{Deserialize, Serialize};
use std::fmt;

/// Events that drive the dataset lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetEvent {
    Import,
    ImportFinished,
    ImportFailed,
    /// Fired by the table import pipeline after each source file
    TableImportFinished,
    AutoLabelStarted,
    AutoLabelFinished,
    PublishRequested,
    DifficultCasePublishRequested,
    DifficultCasePublished,
    PublishFailed,
}

impl DatasetEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::ImportFinished => "import_finished",
            Self::ImportFailed => "import_failed",
            Self::TableImportFinished => "table_import_finished",
            Self::AutoLabelStarted => "auto_label_started",
            Self::AutoLabelFinished => "auto_label_finished",
            Self::PublishRequested => "publish_requested",
            Self::DifficultCasePublishRequested => "difficult_case_publish_requested",
            Self::DifficultCasePublished => "difficult_case_published",
            Self::PublishFailed => "publish_failed",
        }
    }
}

impl fmt::Display for DatasetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

impl std::str::FromStr for DatasetEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(Self::Import),
            "import_finished" => Ok(Self::ImportFinished),
            "import_failed" => Ok(Self::ImportFailed),
            "table_import_finished" => Ok(Self::TableImportFinished),
            "auto_label_started" => Ok(Self::AutoLabelStarted),
            "auto_label_finished" => Ok(Self::AutoLabelFinished),
            "publish_requested" => Ok(Self::PublishRequested),
            "difficult_case_publish_requested" => Ok(Self::DifficultCasePublishRequested),
            "difficult_case_published" => Ok(Self::DifficultCasePublished),
            "publish_failed" => Ok(Self::PublishFailed),
            _ => Err(format!("Unknown dataset event: {s}")),
        }
    }
}
