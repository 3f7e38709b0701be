use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use line_sift::{dedup_file, DedupConfig, DedupStats};

/// Helper to build a configuration whose scratch space lives inside the test directory
fn create_test_config(temp_dir: &TempDir, records_per_segment: usize) -> DedupConfig {
    DedupConfig {
        records_per_segment,
        sort_threads: 3,
        io_buffer_size_kb: 4,
        temp_directory: temp_dir.path().join("temp"),
        ..DedupConfig::default()
    }
}

fn write_input(temp_dir: &TempDir, name: &str, content: &str) -> Result<PathBuf> {
    let path = temp_dir.path().join(name);
    fs::write(&path, content)?;
    Ok(path)
}

async fn run(temp_dir: &TempDir, input: &Path, output_name: &str, records_per_segment: usize) -> Result<(String, DedupStats)> {
    let output = temp_dir.path().join(output_name);
    let stats = dedup_file(input, &output, create_test_config(temp_dir, records_per_segment)).await?;
    Ok((fs::read_to_string(&output)?, stats))
}

/// In-memory reference: keep the first occurrence of every line
fn first_occurrences(lines: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    lines.iter().filter(|line| seen.insert(line.as_str())).cloned().collect()
}

/// Same shape as the gen_test_input binary, with a deterministic user sequence
fn login_log(num_users: u32, num_lines: u32) -> Vec<String> {
    let mut lines = Vec::new();
    for uid in 0..num_users {
        lines.push(format!("User {:05} logged in", uid));
    }
    for i in 0..num_lines {
        lines.push(format!("User {:05} logged in", (i * 7 + 3) % num_users));
    }
    for uid in 0..num_users {
        lines.push(format!("User {:05} logged out", uid));
    }
    lines
}

fn to_text(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

#[tokio::test]
async fn test_matches_first_occurrence_reference() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let lines: Vec<String> = ["pear", "apple", "pear", "fig", "", "apple", "kiwi", "", "fig", "date"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let input = write_input(&temp_dir, "input.txt", &to_text(&lines))?;

    let (output, stats) = run(&temp_dir, &input, "output.txt", 3).await?;

    let expected = first_occurrences(&lines);
    assert_eq!(output, to_text(&expected));
    assert_eq!(stats.total_records, lines.len());
    assert_eq!(stats.unique_records, expected.len());
    assert_eq!(stats.duplicates_removed, lines.len() - expected.len());
    Ok(())
}

#[tokio::test]
async fn test_segment_size_invariance() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let lines = login_log(13, 60);
    let input = write_input(&temp_dir, "input.txt", &to_text(&lines))?;

    let expected = to_text(&first_occurrences(&lines));
    for (i, records_per_segment) in [1, 2, 5, 100, lines.len() + 1].into_iter().enumerate() {
        let (output, _) = run(&temp_dir, &input, &format!("output_{}.txt", i), records_per_segment).await?;
        assert_eq!(output, expected, "records_per_segment = {}", records_per_segment);
    }
    Ok(())
}

#[tokio::test]
async fn test_rerun_on_output_is_identical() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let lines = login_log(9, 40);
    let input = write_input(&temp_dir, "input.txt", &to_text(&lines))?;

    let (first, _) = run(&temp_dir, &input, "first.txt", 4).await?;
    let (second, stats) = run(&temp_dir, &temp_dir.path().join("first.txt"), "second.txt", 4).await?;

    assert_eq!(first, second);
    assert_eq!(stats.duplicates_removed, 0);
    Ok(())
}

#[tokio::test]
async fn test_output_is_duplicate_free_subsequence() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let lines = login_log(20, 150);
    let input = write_input(&temp_dir, "input.txt", &to_text(&lines))?;

    let (output, _) = run(&temp_dir, &input, "output.txt", 7).await?;
    let output_lines: Vec<&str> = output.lines().collect();

    let unique: HashSet<&str> = output_lines.iter().copied().collect();
    assert_eq!(unique.len(), output_lines.len());

    let mut remaining = lines.iter();
    for line in &output_lines {
        assert!(remaining.any(|l| *l == **line), "{} out of order", line);
    }
    assert_eq!(output_lines.len(), 40);
    Ok(())
}

#[tokio::test]
async fn test_unique_input_round_trips() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let content = "zeta\nalpha\n  indented\ttab\nunicode ünïcödé\nmu\n";
    let input = write_input(&temp_dir, "input.txt", content)?;

    let (output, stats) = run(&temp_dir, &input, "output.txt", 2).await?;

    assert_eq!(output, content);
    assert_eq!(stats.duplicates_removed, 0);
    Ok(())
}

#[tokio::test]
async fn test_line_terminators_are_normalized() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, "input.txt", "a\r\nb\na\nc")?;

    let (output, stats) = run(&temp_dir, &input, "output.txt", 100).await?;

    assert_eq!(output, "a\nb\nc\n");
    assert_eq!(stats.total_records, 4);
    Ok(())
}

#[tokio::test]
async fn test_creates_output_parent_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, "input.txt", "x\nx\ny\n")?;
    let output = temp_dir.path().join("nested").join("dir").join("out.txt");

    dedup_file(&input, &output, create_test_config(&temp_dir, 2)).await?;

    assert_eq!(fs::read_to_string(&output)?, "x\ny\n");
    Ok(())
}

#[tokio::test]
async fn test_invalid_utf8_input_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("binary.txt");
    fs::write(&input, [b'o', b'k', b'\n', 0xff, 0xfe, b'\n'])?;
    let output = temp_dir.path().join("output.txt");

    let result = dedup_file(&input, &output, create_test_config(&temp_dir, 2)).await;

    assert!(result.is_err());
    assert_eq!(fs::read_dir(temp_dir.path().join("temp"))?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");
    let output = temp_dir.path().join("output.txt");

    let config = DedupConfig {
        records_per_segment: 0,
        ..create_test_config(&temp_dir, 1)
    };

    assert!(dedup_file(&input, &output, config).await.is_err());
}

#[tokio::test]
async fn test_concurrent_runs_share_temp_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let first_lines = login_log(11, 80);
    let second_lines = login_log(17, 50);
    let first_input = write_input(&temp_dir, "first_input.txt", &to_text(&first_lines))?;
    let second_input = write_input(&temp_dir, "second_input.txt", &to_text(&second_lines))?;
    let first_output = temp_dir.path().join("first_output.txt");
    let second_output = temp_dir.path().join("second_output.txt");

    let (first, second) = tokio::join!(
        dedup_file(&first_input, &first_output, create_test_config(&temp_dir, 3)),
        dedup_file(&second_input, &second_output, create_test_config(&temp_dir, 3)),
    );
    first?;
    second?;

    assert_eq!(fs::read_to_string(&first_output)?, to_text(&first_occurrences(&first_lines)));
    assert_eq!(fs::read_to_string(&second_output)?, to_text(&first_occurrences(&second_lines)));
    assert_eq!(fs::read_dir(temp_dir.path().join("temp"))?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_leading_bom_is_stripped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, "input.txt", "\u{FEFF}a\nb\na\n")?;

    let (output, stats) = run(&temp_dir, &input, "output.txt", 2).await?;

    assert_eq!(output, "a\nb\n");
    assert_eq!(stats.duplicates_removed, 1);
    Ok(())
}

#[tokio::test]
async fn test_unwritable_output_directory_names_path() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, "input.txt", "a\n")?;
    write_input(&temp_dir, "blocker", "not a directory")?;
    let output = temp_dir.path().join("blocker").join("out.txt");

    let err = dedup_file(&input, &output, create_test_config(&temp_dir, 2))
        .await
        .unwrap_err();

    let report = format!("{:#}", err);
    assert!(report.contains("Failed to create output directory"), "{}", report);
    assert!(report.contains("blocker"), "{}", report);
    Ok(())
}
