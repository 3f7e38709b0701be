use anyhow::Result;
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::info;

use line_sift::constants::{BYTES_PER_GB, DEFAULT_VERBOSITY, PERCENT_100, VERBOSE_VERBOSITY};
use line_sift::utils::{format_bytes, format_duration, setup_logging};
use line_sift::{DedupConfig, ExternalSortProcessor};

#[derive(Parser, Debug)]
#[command(name = "dedup")]
#[command(about = "Remove duplicate lines from a text file of any size, keeping first occurrences in their original order")]
#[command(version)]
struct Args {
    #[arg(help = "Input text file")]
    input: PathBuf,

    #[arg(help = "Output file for the deduplicated lines")]
    output: PathBuf,

    #[arg(help = "Records per in-memory sort segment [default: 100]")]
    records_per_segment: Option<NonZeroUsize>,

    #[arg(short, long, help = "Configuration file (created with defaults if missing)")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,

    #[arg(long, help = "Directory for scratch files")]
    temp_dir: Option<PathBuf>,

    #[arg(long, help = "Number of parallel segment sorts")]
    threads: Option<usize>,

    #[arg(long, help = "Keep scratch files after the run")]
    keep_scratch: bool,
}

fn load_config(args: &Args) -> Result<DedupConfig> {
    let mut config = match &args.config {
        Some(path) if path.exists() => DedupConfig::from_file(path)?,
        Some(path) => {
            let default_config = DedupConfig::default();
            default_config.to_file(path)?;
            default_config
        }
        None => DedupConfig::default(),
    };

    if let Some(records) = args.records_per_segment {
        config.records_per_segment = records.get();
    }
    if let Some(temp_dir) = &args.temp_dir {
        config.temp_directory = temp_dir.clone();
    }
    if let Some(threads) = args.threads {
        config.sort_threads = threads;
    }
    if args.keep_scratch {
        config.keep_scratch_files = true;
    }
    if args.verbose {
        config.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let verbosity = if config.verbose { VERBOSE_VERBOSITY } else { DEFAULT_VERBOSITY };
    setup_logging(verbosity)?;

    if let Some(path) = &args.config {
        info!("Config: {}", path.display());
    }
    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());
    info!("Records per segment: {}", config.records_per_segment);
    info!("Sort threads: {}", config.sort_threads);
    info!(
        "Available memory: {:.2} GB",
        DedupConfig::available_memory_bytes() as f64 / BYTES_PER_GB
    );

    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }
    let input_size = std::fs::metadata(&args.input)?.len();
    info!("Input size: {}", format_bytes(input_size));

    let mut processor = ExternalSortProcessor::new(config)?;
    let stats = processor.process(&args.input, &args.output).await?;

    info!("Deduplication completed successfully!");
    info!("Total lines: {}", stats.total_records);
    info!("Unique lines: {}", stats.unique_records);
    info!(
        "Duplicates removed: {} ({:.2}%)",
        stats.duplicates_removed,
        PERCENT_100 * stats.duplicates_removed as f64 / stats.total_records.max(1) as f64
    );
    info!("Segments: {} content pass, {} position pass", stats.segments_created, stats.resegments_created);
    info!(
        "Sort time: {}, merge time: {}",
        format_duration(stats.sort_time_ms as f64 / 1000.0),
        format_duration(stats.merge_time_ms as f64 / 1000.0)
    );
    info!("Processing time: {}", format_duration(stats.processing_time_ms as f64 / 1000.0));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_positional_args_use_default_segment_size() {
        let args = Args::try_parse_from(["dedup", "in.txt", "out.txt"]).unwrap();
        assert_eq!(args.input, PathBuf::from("in.txt"));
        assert_eq!(args.output, PathBuf::from("out.txt"));
        assert!(args.records_per_segment.is_none());

        let config = load_config(&args).unwrap();
        assert_eq!(config.records_per_segment, 100);
    }

    #[test]
    fn test_segment_size_argument() {
        let args = Args::try_parse_from(["dedup", "in.txt", "out.txt", "7"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.records_per_segment, 7);
    }

    #[test]
    fn test_rejects_wrong_arity() {
        assert!(Args::try_parse_from(["dedup"]).is_err());
        assert!(Args::try_parse_from(["dedup", "in.txt"]).is_err());
        assert!(Args::try_parse_from(["dedup", "in.txt", "out.txt", "5", "extra"]).is_err());
    }

    #[test]
    fn test_rejects_non_positive_segment_size() {
        assert!(Args::try_parse_from(["dedup", "in.txt", "out.txt", "0"]).is_err());
        assert!(Args::try_parse_from(["dedup", "in.txt", "out.txt", "-3"]).is_err());
        assert!(Args::try_parse_from(["dedup", "in.txt", "out.txt", "ten"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "dedup", "in.txt", "out.txt", "--threads", "2", "--temp-dir", "/tmp/sift", "--keep-scratch", "-v",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.sort_threads, 2);
        assert_eq!(config.temp_directory, PathBuf::from("/tmp/sift"));
        assert!(config.keep_scratch_files);
        assert!(config.verbose);
    }

    #[test]
    fn test_invalid_thread_count_fails_validation() {
        let args = Args::try_parse_from(["dedup", "in.txt", "out.txt", "--threads", "0"]).unwrap();
        assert!(load_config(&args).is_err());
    }
}
