pub mod config;
pub mod constants;
pub mod processor;
pub mod record;
pub mod codec;
pub mod scratch;
pub mod chunk;
pub mod merger;
pub mod dedup;


pub use config::DedupConfig;
pub use processor::ExternalSortProcessor;
pub use record::{Record, SortOrder};
pub use codec::{CodecError, RecordReader, RecordWriter};

use anyhow::Result;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub total_records: usize,
    pub unique_records: usize,
    pub duplicates_removed: usize,
    pub segments_created: usize,
    pub resegments_created: usize,
    pub processing_time_ms: u64,
    pub sort_time_ms: u64,
    pub merge_time_ms: u64,
}

pub async fn dedup_file(
    input_file: &Path,
    output_file: &Path,
    config: DedupConfig,
) -> Result<DedupStats> {
    let mut processor = ExternalSortProcessor::new(config)?;
    processor.process(input_file, output_file).await
}
