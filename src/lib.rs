// External sort pipeline - the main implementation
pub mod external_sort;

// Constants shared by the binaries and external_sort
pub mod constants;

// Logging setup and formatting helpers
pub mod utils;

// Re-export main types for convenience
pub use external_sort::{dedup_file, DedupConfig, DedupStats, ExternalSortProcessor};
