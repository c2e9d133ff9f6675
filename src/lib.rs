//! SmartCut segment export library
//!
//! Cuts time ranges out of media files through an external ffmpeg,
//! stream-copying wherever a cut lands on a keyframe and re-encoding only
//! the short span before the first keyframe when it does not.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod job;
pub mod ports;
pub mod streams;
pub mod utils;

// Re-export commonly used types
pub use config::ExportConfig;
pub use domain::model::{
    CutStrategy, ExportOptions, ExportSegment, FileFacts, Segment, SegmentOutcome,
    StreamSelection,
};
pub use engine::{BatchRequest, BatchSequencer, ExportContext, SegmentExporter};
pub use error::{ExportError, ExportResult};
pub use job::ExportJob;
pub use ports::EnginePorts;
