use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::external_sort::codec::{RecordReader, RecordWriter};
use crate::external_sort::scratch::ScratchSpace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    pub records_kept: usize,
    pub duplicates_removed: usize,
}

pub struct AdjacentDeduplicator {
    io_buffer_size: usize,
}

impl AdjacentDeduplicator {
    pub fn new(io_buffer_size: usize) -> Self {
        Self { io_buffer_size }
    }

    /// Streams a content-ordered file and keeps the first record of every run of
    /// equal-content records.
    pub fn dedup(&self, input: &Path, scratch: &ScratchSpace) -> Result<(PathBuf, DedupOutcome)> {
        let mut reader = RecordReader::open(input, self.io_buffer_size)
            .with_context(|| format!("Failed to open record stream {}", input.display()))?;

        let output = scratch.allocate();
        let mut writer = RecordWriter::create(&output, self.io_buffer_size)
            .with_context(|| format!("Failed to create dedup output {}", output.display()))?;

        let mut outcome = DedupOutcome::default();
        let mut last_content: Option<String> = None;

        while reader.has_next() {
            let record = reader
                .read()
                .with_context(|| format!("Failed to decode record in {}", input.display()))?;

            if last_content.as_deref() == Some(record.content()) {
                outcome.duplicates_removed += 1;
                continue;
            }

            writer.write(&record)?;
            outcome.records_kept += 1;
            last_content = Some(record.into_content());
        }

        writer.finish()?;
        drop(reader);
        scratch.release(input);

        debug!(
            "Dedup kept {} records, removed {} duplicates",
            outcome.records_kept, outcome.duplicates_removed
        );
        Ok((output, outcome))
    }
}
