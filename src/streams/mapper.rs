//! Stream mapping utilities

use std::path::Path;

use crate::domain::model::StreamSelection;
use crate::domain::rules::output_stream_index;
use crate::streams::StreamMapping;

/// Stream mapper turning an ordered selection into engine `-map` arguments
pub struct StreamMapper<'a> {
    selection: &'a StreamSelection,
    first_input_index: usize,
}

impl<'a> StreamMapper<'a> {
    /// Create a mapper; `first_input_index` is the engine input number of
    /// the first file that contributes streams.
    pub fn new(selection: &'a StreamSelection, first_input_index: usize) -> Self {
        Self {
            selection,
            first_input_index,
        }
    }

    /// Input files that take part, in input order
    pub fn input_files(&self) -> Vec<&'a Path> {
        self.selection
            .filtered()
            .into_iter()
            .map(|f| f.path.as_path())
            .collect()
    }

    /// Mapping for every retained stream. Files that contribute no stream
    /// get no input number at all.
    pub fn mappings(&self) -> Vec<StreamMapping> {
        let mut mappings = Vec::new();
        for (position, file) in self.selection.filtered().into_iter().enumerate() {
            for stream_index in &file.stream_indices {
                let Some(output_index) =
                    output_stream_index(self.selection, &file.path, *stream_index)
                else {
                    continue;
                };
                mappings.push(StreamMapping {
                    input_index: self.first_input_index + position,
                    stream_index: *stream_index,
                    output_index,
                });
            }
        }
        mappings
    }

    /// `-map <input>:<stream>` pairs in output order
    pub fn map_args(&self) -> Vec<String> {
        self.mappings()
            .iter()
            .flat_map(|m| {
                [
                    "-map".to_string(),
                    format!("{}:{}", m.input_index, m.stream_index),
                ]
            })
            .collect()
    }
}
