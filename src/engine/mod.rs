//! Segment export engine

use crate::domain::model::ExportOptions;
use crate::ports::EnginePorts;

pub mod args;
pub mod artifacts;
pub mod batch;
pub mod chapters;
pub mod concat;
pub mod cutter;
pub mod progress;
pub mod smart_cut;

pub use batch::{BatchRequest, BatchSequencer};
pub use concat::{ConcatEngine, ConcatOutcome, ConcatRequest};
pub use cutter::{CutRequest, RangeCutter};
pub use smart_cut::{SegmentExporter, SegmentRequest};

/// Default number of parallel probes during a merge
pub const DEFAULT_PROBE_CONCURRENCY: usize = 2;

/// Collaborators plus the batch-wide options every engine step reads
#[derive(Clone)]
pub struct ExportContext {
    pub ports: EnginePorts,
    pub options: ExportOptions,
    /// Upper bound on concurrent probes of merge parts
    pub probe_concurrency: usize,
}

impl ExportContext {
    pub fn new(ports: EnginePorts, options: ExportOptions) -> Self {
        Self {
            ports,
            options,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }
}
