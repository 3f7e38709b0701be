pub const DEFAULT_RECORDS_PER_SEGMENT: usize = 100;
pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;
pub const DEFAULT_SORT_THREADS: usize = 4;

pub const MIN_RECORDS_PER_SEGMENT: usize = 1;
pub const MIN_IO_BUFFER_SIZE_KB: usize = 1;
pub const MIN_SORT_THREADS: usize = 1;
pub const MAX_SORT_THREADS: usize = 32;

pub const TEMP_DIR_NAME: &str = "line_sift_temp";
pub const RUN_DIR_PREFIX: &str = "run_";
pub const SCRATCH_FILE_PREFIX: &str = "scratch_";
pub const SCRATCH_FILE_EXTENSION: &str = ".rec";

pub const RECORD_MAGIC: &[u8; 5] = b"LSREC";
pub const RECORD_FORMAT_VERSION: u8 = 1;
pub const RECORD_HEADER_LEN: u64 = 8;
pub const RECORD_FIXED_LEN: u64 = 12;

// In-memory footprint of one record beyond its content bytes.
pub const ESTIMATED_RECORD_OVERHEAD_BYTES: usize = 48;

pub const PROGRESS_REPORT_INTERVAL_RECORDS: usize = 100_000;
pub const UTF8_BOM: char = '\u{FEFF}';
