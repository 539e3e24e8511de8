//! # Job Handlers
//!
//! One handler per job kind. The claim loop looks the handler up in a
//! [`HandlerRegistry`] after winning the claim and runs it exactly once;
//! whatever the handler returns, the job is finalised afterwards.

pub mod annotation;
pub mod augmentation;
pub mod dataset_copy;
pub mod format_conversion;
pub mod medical;
pub mod table_import;
pub mod tracking;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::context::DispatchContext;
use crate::error::Result;
use crate::messaging::PublishReport;
use crate::models::{Job, JobKind};

pub use annotation::{AnnotationHandler, AnnotationMode};
pub use augmentation::AugmentationHandler;
pub use dataset_copy::DatasetCopyHandler;
pub use format_conversion::FormatConversionHandler;
pub use medical::MedicalAnnotationHandler;
pub use table_import::{read_table_rows, TableImportHandler};
pub use tracking::TrackingHandler;

/// What a handler did with its job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Published {
        queue_key: String,
        units: usize,
        files: usize,
    },
    Imported {
        source_files: usize,
        failed_files: usize,
        rows: usize,
    },
    CopySubmitted {
        target_dataset_id: i64,
    },
}

impl From<PublishReport> for HandlerOutcome {
    fn from(report: PublishReport) -> Self {
        Self::Published {
            files: report.total_files(),
            units: report.units.len(),
            queue_key: report.queue_key,
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome>;
}

/// Handlers keyed by job kind
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a handler for every known job kind
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AnnotationHandler::new(AnnotationMode::Standard)));
        registry.register(Arc::new(AnnotationHandler::new(AnnotationMode::ReAnnotation)));
        registry.register(Arc::new(AnnotationHandler::new(AnnotationMode::TextClassification)));
        registry.register(Arc::new(FormatConversionHandler));
        registry.register(Arc::new(TrackingHandler));
        registry.register(Arc::new(AugmentationHandler));
        registry.register(Arc::new(MedicalAnnotationHandler));
        registry.register(Arc::new(TableImportHandler));
        registry.register(Arc::new(DatasetCopyHandler));
        registry
    }

    /// Register a handler, replacing any previous one for its kind
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<JobKind> {
        let mut kinds: Vec<JobKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.code());
        kinds
    }
}
