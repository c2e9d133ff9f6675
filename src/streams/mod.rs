//! Stream selection mapping and per-stream metadata arguments

use serde::Serialize;

pub mod mapper;
pub mod metadata;

pub use mapper::StreamMapper;

/// Where one retained input stream lands in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamMapping {
    /// Engine input number the stream is read from
    pub input_index: usize,
    /// Stream index inside that input
    pub stream_index: usize,
    /// Position in the output file
    pub output_index: usize,
}
