use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use line_sift::constants::{BYTES_PER_KB, DEFAULT_TEST_INPUT_FILE};

/// Writes a duplicate-heavy log for exercising `dedup`: every user logs in once in
/// order, then `num_lines` random logins, then every user logs out in order.
#[derive(Parser)]
#[command(name = "gen_test_input")]
#[command(about = "Generate a login/logout log with many duplicate lines")]
struct Args {
    #[arg(help = "Number of distinct users")]
    num_users: u32,

    #[arg(help = "Number of random login lines")]
    num_lines: u64,

    #[arg(short, long, default_value = DEFAULT_TEST_INPUT_FILE, help = "Output file")]
    output: PathBuf,
}

fn login_line(uid: u32) -> String {
    format!("User {:05} logged in", uid)
}

fn logout_line(uid: u32) -> String {
    format!("User {:05} logged out", uid)
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.num_users == 0 {
        anyhow::bail!("Number of users must be positive");
    }

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::with_capacity(64 * BYTES_PER_KB, file);
    let mut rng = rand::thread_rng();

    for uid in 0..args.num_users {
        writeln!(writer, "{}", login_line(uid))?;
    }
    for _ in 0..args.num_lines {
        writeln!(writer, "{}", login_line(rng.gen_range(0..args.num_users)))?;
    }
    for uid in 0..args.num_users {
        writeln!(writer, "{}", logout_line(uid))?;
    }

    writer.flush()?;
    println!(
        "Wrote {} lines to {}",
        2 * args.num_users as u64 + args.num_lines,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_formats_zero_pad_user_ids() {
        assert_eq!(login_line(0), "User 00000 logged in");
        assert_eq!(login_line(42), "User 00042 logged in");
        assert_eq!(logout_line(7), "User 00007 logged out");
        assert_eq!(logout_line(123456), "User 123456 logged out");
    }
}
