//! Writes a SmallBank workload as an invocation CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin smallbank-gen -- <num_accounts> <num_operations> [seed] > invocations.csv
//! ```
//!
//! # Environment Variables
//!
//! - `SMALLBANK_SKEW`: Zipf exponent for hot accounts (default 1.0)
//! - `SMALLBANK_WRITE_RATIO`: percentage of writes, 0-100 (default 50)
//! - `SMALLBANK_HOT_ACCOUNT`: `all`, `sender`, `recipient` or `none` (default)
//! - `SMALLBANK_FUNCTIONS`: `all` (default) or `payment`
//! - `RUST_LOG`: logging verbosity

use log::info;
use smallbank::{Workload, WorkloadConfig, WorkloadError};
use std::env;
use std::io;
use std::process;
use std::str::FromStr;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), WorkloadError> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        return Err(WorkloadError::Usage);
    }

    let accounts: usize = parse_count("account count", &args[1])?;
    let operations: usize = parse_count("operation count", &args[2])?;
    let seed: u64 = match args.get(3) {
        Some(raw) => parse_count("seed", raw)?,
        None => 0,
    };

    let config = WorkloadConfig::from_env(accounts, operations, seed)?;
    info!("Generating workload: {:?}", config);

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(io::stdout().lock());
    for invocation in Workload::new(config)? {
        writer.write_record(invocation.to_record())?;
    }
    writer.flush()?;

    Ok(())
}

fn parse_count<T: FromStr>(name: &'static str, raw: &str) -> Result<T, WorkloadError> {
    raw.parse().map_err(|_| WorkloadError::InvalidCount {
        name,
        value: raw.to_string(),
    })
}
