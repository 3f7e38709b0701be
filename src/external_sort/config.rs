use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::constants::BYTES_PER_KB;
use crate::external_sort::constants::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub records_per_segment: usize,
    pub resegment_records: Option<usize>,
    pub sort_threads: usize,
    pub io_buffer_size_kb: usize,
    pub temp_directory: PathBuf,
    pub keep_scratch_files: bool,
    pub verbose: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            records_per_segment: DEFAULT_RECORDS_PER_SEGMENT,
            resegment_records: None,
            sort_threads: DEFAULT_SORT_THREADS,
            io_buffer_size_kb: DEFAULT_IO_BUFFER_SIZE_KB,
            temp_directory: std::env::temp_dir().join(TEMP_DIR_NAME),
            keep_scratch_files: false,
            verbose: false,
        }
    }
}

impl DedupConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.records_per_segment < MIN_RECORDS_PER_SEGMENT {
            return Err(anyhow::anyhow!(
                "Records per segment must be at least {}",
                MIN_RECORDS_PER_SEGMENT
            ));
        }

        if let Some(resegment) = self.resegment_records {
            if resegment < MIN_RECORDS_PER_SEGMENT {
                return Err(anyhow::anyhow!(
                    "Resegment record count must be at least {}",
                    MIN_RECORDS_PER_SEGMENT
                ));
            }
        }

        if self.sort_threads < MIN_SORT_THREADS || self.sort_threads > MAX_SORT_THREADS {
            return Err(anyhow::anyhow!(
                "Sort threads must be between {} and {}",
                MIN_SORT_THREADS, MAX_SORT_THREADS
            ));
        }

        if self.io_buffer_size_kb < MIN_IO_BUFFER_SIZE_KB {
            return Err(anyhow::anyhow!(
                "I/O buffer size must be at least {} KB",
                MIN_IO_BUFFER_SIZE_KB
            ));
        }

        Ok(())
    }

    /// Segment size used after deduplication, when the position pass re-chunks the stream.
    pub fn resegment_size(&self) -> usize {
        self.resegment_records.unwrap_or(self.records_per_segment)
    }

    pub fn io_buffer_size_bytes(&self) -> usize {
        self.io_buffer_size_kb * BYTES_PER_KB
    }

    /// Rough in-memory footprint of one segment for lines of `avg_line_bytes`.
    pub fn estimated_segment_bytes(&self, avg_line_bytes: usize) -> usize {
        self.records_per_segment
            .saturating_mul(avg_line_bytes.saturating_add(ESTIMATED_RECORD_OVERHEAD_BYTES))
    }

    pub fn available_memory_bytes() -> u64 {
        use sysinfo::System;
        let mut system = System::new();
        system.refresh_memory();
        system.available_memory()
    }
}
