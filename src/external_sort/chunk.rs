use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::external_sort::codec::{self, RecordReader, RecordWriter};
use crate::external_sort::record::SortOrder;
use crate::external_sort::scratch::ScratchSpace;

#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    pub chunk_id: usize,
    pub file_path: PathBuf,
    pub record_count: usize,
}

pub struct ChunkProcessor {
    io_buffer_size: usize,
}

impl ChunkProcessor {
    pub fn new(io_buffer_size: usize) -> Self {
        Self { io_buffer_size }
    }

    /// Splits a record stream into scratch files of at most `records_per_chunk` records.
    ///
    /// Concatenating the returned chunks in order reproduces the input stream. An empty
    /// stream still yields one (empty) chunk.
    pub fn segment(
        &self,
        input: &Path,
        records_per_chunk: usize,
        scratch: &ScratchSpace,
    ) -> Result<Vec<ChunkMetadata>> {
        if records_per_chunk == 0 {
            anyhow::bail!("Records per segment must be positive");
        }

        let mut reader = RecordReader::open(input, self.io_buffer_size)
            .with_context(|| format!("Failed to open record stream {}", input.display()))?;
        let mut chunks = Vec::new();

        let mut current_path = scratch.allocate();
        let mut writer = self.create_writer(&current_path)?;

        while reader.has_next() {
            let record = reader
                .read()
                .with_context(|| format!("Failed to decode record in {}", input.display()))?;

            if writer.records_written() == records_per_chunk {
                let record_count = writer.finish()?;
                chunks.push(ChunkMetadata {
                    chunk_id: chunks.len(),
                    file_path: current_path,
                    record_count,
                });
                current_path = scratch.allocate();
                writer = self.create_writer(&current_path)?;
            }

            writer.write(&record)?;
        }

        let record_count = writer.finish()?;
        chunks.push(ChunkMetadata {
            chunk_id: chunks.len(),
            file_path: current_path,
            record_count,
        });

        debug!(
            "Segmented {} into {} chunks of at most {} records",
            input.display(),
            chunks.len(),
            records_per_chunk
        );
        Ok(chunks)
    }

    /// Loads one chunk into memory, sorts it by `order` and rewrites it in place.
    pub fn sort_chunk(&self, chunk: &ChunkMetadata, order: SortOrder) -> Result<()> {
        let mut records = codec::read_all(&chunk.file_path, self.io_buffer_size)
            .with_context(|| format!("Failed to load chunk {}", chunk.chunk_id))?;

        records.par_sort_by(|a, b| order.compare(a, b));

        codec::write_all(&chunk.file_path, &records, self.io_buffer_size)
            .with_context(|| format!("Failed to rewrite chunk {}", chunk.chunk_id))?;

        debug!("Sorted chunk {} ({} records) by {}", chunk.chunk_id, records.len(), order);
        Ok(())
    }

    fn create_writer(&self, path: &Path) -> Result<RecordWriter> {
        RecordWriter::create(path, self.io_buffer_size)
            .with_context(|| format!("Failed to create chunk file {}", path.display()))
    }
}
