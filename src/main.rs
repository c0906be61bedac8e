//! SmallBank CLI
//!
//! Runs a CSV file of ledger invocations and outputs the final account
//! states.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin smallbank -- invocations.csv > accounts.csv
//! ```
//!
//! # Environment Variables
//!
//! - `SMALLBANK_WORKERS`: worker threads (default 1). Above 1, the leading
//!   `create_account` rows run first, then the rest concurrently, and the
//!   per-function read conflict counts show the contention.
//! - `RUST_LOG`: Set to `debug`, `info` or `warn` to control logging verbosity

use log::info;
use smallbank::{read_invocations, LedgerError, Result, RunSummary, SmallbankEngine};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(LedgerError::MissingArgument);
    }

    let input_path = &args[1];
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let engine = SmallbankEngine::new();
    let summary = match workers()? {
        1 => engine.process_csv(reader)?,
        workers => {
            let (invocations, malformed) = read_invocations(reader);
            let mut summary = engine.process_batch(&invocations, workers);
            summary.malformed += malformed;
            summary
        }
    };
    log_summary(&summary);

    let stdout = io::stdout();
    let handle = stdout.lock();
    engine.write_output(handle)?;

    Ok(())
}

fn workers() -> Result<usize> {
    match env::var("SMALLBANK_WORKERS") {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(LedgerError::InvalidWorkers(raw)),
        Err(_) => Ok(1),
    }
}

fn log_summary(summary: &RunSummary) {
    for (function, stats) in &summary.functions {
        info!(
            "{}: {} succeeded, {} failed, {} read conflicts, {} retries",
            function, stats.succeeded, stats.failed, stats.conflicts, stats.retries
        );
    }
    info!(
        "{} succeeded, {} failed, {} malformed, conflict ratio {:.4}",
        summary.succeeded(),
        summary.failed(),
        summary.malformed,
        summary.conflict_ratio()
    );
}
