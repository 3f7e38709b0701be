use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info};

use crate::constants::BYTES_PER_MB;
use crate::external_sort::constants::UTF8_BOM;
use crate::external_sort::chunk::{ChunkMetadata, ChunkProcessor};
use crate::external_sort::codec::{RecordReader, RecordWriter};
use crate::external_sort::dedup::AdjacentDeduplicator;
use crate::external_sort::merger::ChunkMerger;
use crate::external_sort::record::{Record, SortOrder};
use crate::external_sort::scratch::ScratchSpace;
use crate::external_sort::{DedupConfig, DedupStats};

/// Drives the full pipeline: encode, segment, sort by content, merge, dedup,
/// segment, sort by position, merge, decode.
pub struct ExternalSortProcessor {
    config: DedupConfig,
    chunk_processor: ChunkProcessor,
    merger: ChunkMerger,
    deduplicator: AdjacentDeduplicator,
}

impl ExternalSortProcessor {
    pub fn new(config: DedupConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.temp_directory).with_context(|| {
            format!("Failed to create temp directory {}", config.temp_directory.display())
        })?;

        let io_buffer_size = config.io_buffer_size_bytes();
        Ok(Self {
            chunk_processor: ChunkProcessor::new(io_buffer_size),
            merger: ChunkMerger::new(io_buffer_size),
            deduplicator: AdjacentDeduplicator::new(io_buffer_size),
            config,
        })
    }

    /// Deduplicates `input` into `output`. Scratch files are removed whether the run
    /// succeeds or fails; on failure the state of `output` is undefined.
    pub async fn process(&mut self, input: &Path, output: &Path) -> Result<DedupStats> {
        let scratch = ScratchSpace::create(&self.config.temp_directory, self.config.keep_scratch_files)?;
        let result = self.run_stages(input, output, &scratch).await;
        scratch.cleanup();
        result
    }

    async fn run_stages(&self, input: &Path, output: &Path, scratch: &ScratchSpace) -> Result<DedupStats> {
        let start_time = Instant::now();
        let mut stats = DedupStats::default();

        info!("Encoding {}", input.display());
        let (encoded, total_records) = self.encode(input, scratch)?;
        stats.total_records = total_records;
        self.log_memory_estimate(input, total_records);

        info!("Segmenting {} records into chunks of {}", total_records, self.config.records_per_segment);
        let chunks = self
            .chunk_processor
            .segment(&encoded, self.config.records_per_segment, scratch)?;
        scratch.release(&encoded);
        stats.segments_created = chunks.len();

        let sorted = self.sort_and_merge(chunks, SortOrder::Content, scratch, &mut stats).await?;

        info!("Removing adjacent duplicates");
        let (deduped, outcome) = self.deduplicator.dedup(&sorted, scratch)?;
        stats.unique_records = outcome.records_kept;
        stats.duplicates_removed = outcome.duplicates_removed;

        let resegment = self.config.resegment_size();
        info!("Re-segmenting {} unique records into chunks of {}", outcome.records_kept, resegment);
        let chunks = self.chunk_processor.segment(&deduped, resegment, scratch)?;
        scratch.release(&deduped);
        stats.resegments_created = chunks.len();

        let restored = self.sort_and_merge(chunks, SortOrder::Position, scratch, &mut stats).await?;

        info!("Decoding to {}", output.display());
        self.decode(&restored, output)?;
        scratch.release(&restored);

        stats.processing_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(stats)
    }

    async fn sort_and_merge(
        &self,
        chunks: Vec<ChunkMetadata>,
        order: SortOrder,
        scratch: &ScratchSpace,
        stats: &mut DedupStats,
    ) -> Result<PathBuf> {
        info!("Sorting {} chunks by {}", chunks.len(), order);
        let sort_start = Instant::now();
        self.sort_chunks(&chunks, order).await?;
        stats.sort_time_ms += sort_start.elapsed().as_millis() as u64;

        info!("Merging {} chunks by {}", chunks.len(), order);
        let merge_start = Instant::now();
        let paths: Vec<PathBuf> = chunks.into_iter().map(|c| c.file_path).collect();
        let merged = self.merger.merge(&paths, order, scratch)?;
        stats.merge_time_ms += merge_start.elapsed().as_millis() as u64;

        Ok(merged)
    }

    /// Sorts every chunk on a bounded pool of blocking tasks and waits for all of them.
    /// The first failure cancels the chunks not yet started and fails the run.
    pub(crate) async fn sort_chunks(&self, chunks: &[ChunkMetadata], order: SortOrder) -> Result<()> {
        let mut tasks = JoinSet::new();

        for chunk in chunks {
            while tasks.len() >= self.config.sort_threads {
                if let Some(result) = tasks.join_next().await {
                    if let Err(e) = Self::sort_task_result(result) {
                        Self::abort_remaining(&mut tasks).await;
                        return Err(e);
                    }
                }
            }

            let chunk_processor = ChunkProcessor::new(self.config.io_buffer_size_bytes());
            let chunk = chunk.clone();
            tasks.spawn_blocking(move || chunk_processor.sort_chunk(&chunk, order));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = Self::sort_task_result(result) {
                Self::abort_remaining(&mut tasks).await;
                return Err(e);
            }
        }

        debug!("All {} chunks sorted by {}", chunks.len(), order);
        Ok(())
    }

    fn sort_task_result(result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
        result.context("Chunk sort task failed to complete")?
    }

    async fn abort_remaining(tasks: &mut JoinSet<Result<()>>) {
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }

    /// Reads the input line by line and writes one positioned record per line.
    fn encode(&self, input: &Path, scratch: &ScratchSpace) -> Result<(PathBuf, usize)> {
        let file = File::open(input)
            .with_context(|| format!("Failed to open input file {}", input.display()))?;
        let mut reader = BufReader::with_capacity(self.config.io_buffer_size_bytes(), file);

        let encoded = scratch.allocate();
        let mut writer = RecordWriter::create(&encoded, self.config.io_buffer_size_bytes())
            .with_context(|| format!("Failed to create record stream {}", encoded.display()))?;

        let mut line = String::new();
        let mut position: u64 = 0;
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).with_context(|| {
                format!("Failed to read line {} of {}", position + 1, input.display())
            })?;
            if bytes_read == 0 {
                break;
            }

            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            if position == 0 && line.starts_with(UTF8_BOM) {
                line.replace_range(..UTF8_BOM.len_utf8(), "");
            }

            writer.write(&Record::new(line.as_str(), position))?;
            position += 1;
        }

        let total_records = writer.finish()?;
        Ok((encoded, total_records))
    }

    /// Writes each record's content as one `\n`-terminated line and syncs the output.
    fn decode(&self, input: &Path, output: &Path) -> Result<()> {
        let mut reader = RecordReader::open(input, self.config.io_buffer_size_bytes())
            .with_context(|| format!("Failed to open record stream {}", input.display()))?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory {}", parent.display())
                })?;
            }
        }
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file {}", output.display()))?;
        let mut writer = BufWriter::with_capacity(self.config.io_buffer_size_bytes(), file);

        while reader.has_next() {
            let record = reader
                .read()
                .with_context(|| format!("Failed to decode record in {}", input.display()))?;
            writer.write_all(record.content().as_bytes())?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn log_memory_estimate(&self, input: &Path, total_records: usize) {
        let input_bytes = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0) as usize;
        let avg_line_bytes = input_bytes / total_records.max(1);
        let segment_bytes = self.config.estimated_segment_bytes(avg_line_bytes);
        let available = DedupConfig::available_memory_bytes();

        debug!(
            "Estimated segment footprint {:.2} MB per sort task, {:.2} MB available",
            segment_bytes as f64 / BYTES_PER_MB as f64,
            available as f64 / BYTES_PER_MB as f64
        );
    }
}
