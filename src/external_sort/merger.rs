use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::external_sort::codec::{RecordReader, RecordWriter};
use crate::external_sort::constants::PROGRESS_REPORT_INTERVAL_RECORDS;
use crate::external_sort::record::{Record, SortOrder};
use crate::external_sort::scratch::ScratchSpace;

/// Merges sorted chunk files through a binary merge tree. Every tree node is a
/// streaming two-way merge that holds one lookahead record per side.
pub struct ChunkMerger {
    io_buffer_size: usize,
}

impl ChunkMerger {
    pub fn new(io_buffer_size: usize) -> Self {
        Self { io_buffer_size }
    }

    /// Merges `chunks` (each sorted by `order`) into a single sorted file.
    ///
    /// On equal keys the record from the earlier chunk comes first. Intermediate
    /// inputs are released to `scratch` as soon as they are consumed; a single chunk
    /// is returned unchanged.
    pub fn merge(&self, chunks: &[PathBuf], order: SortOrder, scratch: &ScratchSpace) -> Result<PathBuf> {
        match chunks {
            [] => anyhow::bail!("Cannot merge an empty chunk list"),
            [single] => Ok(single.clone()),
            [left, right] => self.merge_pair(left, right, order, scratch),
            _ => {
                let mid = chunks.len() / 2;
                let left = self.merge(&chunks[..mid], order, scratch)?;
                let right = self.merge(&chunks[mid..], order, scratch)?;
                self.merge_pair(&left, &right, order, scratch)
            }
        }
    }

    fn merge_pair(&self, left: &Path, right: &Path, order: SortOrder, scratch: &ScratchSpace) -> Result<PathBuf> {
        let mut left_reader = self.open(left)?;
        let mut right_reader = self.open(right)?;

        let output = scratch.allocate();
        let mut writer = RecordWriter::create(&output, self.io_buffer_size)
            .with_context(|| format!("Failed to create merge output {}", output.display()))?;

        let mut left_next = Self::next_record(&mut left_reader, left)?;
        let mut right_next = Self::next_record(&mut right_reader, right)?;

        loop {
            match (left_next.take(), right_next.take()) {
                (Some(l), Some(r)) => {
                    if order.compare(&l, &r) != Ordering::Greater {
                        writer.write(&l)?;
                        left_next = Self::next_record(&mut left_reader, left)?;
                        right_next = Some(r);
                    } else {
                        writer.write(&r)?;
                        right_next = Self::next_record(&mut right_reader, right)?;
                        left_next = Some(l);
                    }
                }
                (Some(l), None) => {
                    writer.write(&l)?;
                    left_next = Self::next_record(&mut left_reader, left)?;
                }
                (None, Some(r)) => {
                    writer.write(&r)?;
                    right_next = Self::next_record(&mut right_reader, right)?;
                }
                (None, None) => break,
            }

            if writer.records_written() % PROGRESS_REPORT_INTERVAL_RECORDS == 0 {
                debug!("Merge progress: {} records written to {}", writer.records_written(), output.display());
            }
        }

        let records_written = writer.finish()?;
        debug!(
            "Merged {} + {} -> {} ({} records, {} order)",
            left.display(),
            right.display(),
            output.display(),
            records_written,
            order
        );

        drop(left_reader);
        drop(right_reader);
        scratch.release(left);
        scratch.release(right);

        Ok(output)
    }

    fn open(&self, path: &Path) -> Result<RecordReader> {
        RecordReader::open(path, self.io_buffer_size)
            .with_context(|| format!("Failed to open merge input {}", path.display()))
    }

    fn next_record(reader: &mut RecordReader, path: &Path) -> Result<Option<Record>> {
        if !reader.has_next() {
            return Ok(None);
        }
        let record = reader
            .read()
            .with_context(|| format!("Failed to decode record in {}", path.display()))?;
        Ok(Some(record))
    }
}
