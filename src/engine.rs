//! Batch engine driving ledger invocations through the transactional host.
//!
//! Reads invocations from CSV in streaming fashion, runs each one as its own
//! atomic unit and reports the final account states. Batches can also be run
//! on several threads, in which case the per-function conflict counts show
//! how much the invocations contended.

use crate::account::Account;
use crate::error::Result;
use crate::host::{HostConfig, MemoryHost};
use crate::ledger;
use crate::operation::{Function, Invocation};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Outcome counts for one function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FunctionStats {
    pub succeeded: u64,
    pub failed: u64,
    /// Read conflicts hit at commit, whether retried or reported.
    pub conflicts: u64,
    /// Re-runs after a read conflict.
    pub retries: u64,
}

impl FunctionStats {
    fn merge(&mut self, other: &FunctionStats) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.conflicts += other.conflicts;
        self.retries += other.retries;
    }
}

/// What happened during one [`SmallbankEngine::process_csv`] or
/// [`SmallbankEngine::process_parallel`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Per-function counts keyed by canonical function name (or the raw name
    /// for unknown functions).
    pub functions: BTreeMap<String, FunctionStats>,

    /// Rows that could not be read as CSV at all.
    pub malformed: u64,
}

impl RunSummary {
    pub fn succeeded(&self) -> u64 {
        self.functions.values().map(|s| s.succeeded).sum()
    }

    pub fn failed(&self) -> u64 {
        self.functions.values().map(|s| s.failed).sum()
    }

    pub fn conflicts(&self) -> u64 {
        self.functions.values().map(|s| s.conflicts).sum()
    }

    /// Share of commit attempts rejected with a read conflict:
    /// `conflicts / (succeeded + conflicts)`, or 0 when nothing ran.
    pub fn conflict_ratio(&self) -> f64 {
        let conflicts = self.conflicts();
        let attempts = self.succeeded() + conflicts;
        if attempts == 0 {
            return 0.0;
        }
        conflicts as f64 / attempts as f64
    }

    /// Counts one finished invocation that was re-run `retries` times.
    fn record<T>(&mut self, function: &str, result: &Result<T>, retries: u32) {
        let stats = self.functions.entry(function.to_string()).or_default();
        stats.retries += u64::from(retries);
        stats.conflicts += u64::from(retries);
        match result {
            Ok(_) => stats.succeeded += 1,
            Err(e) => {
                if e.is_retryable() {
                    stats.conflicts += 1;
                }
                stats.failed += 1;
            }
        }
    }

    fn merge(&mut self, other: RunSummary) {
        for (function, stats) in &other.functions {
            self.functions.entry(function.clone()).or_default().merge(stats);
        }
        self.malformed += other.malformed;
    }
}

/// The SmallBank engine.
///
/// # Input format
///
/// Headerless CSV, one invocation per row: `function,arg1,...,argN`. Rows may
/// have different widths; fields are trimmed and lines starting with `#` are
/// ignored.
///
/// # Output ordering
///
/// Final account states are written sorted by account id.
pub struct SmallbankEngine {
    host: MemoryHost,
}

impl SmallbankEngine {
    /// Creates an engine over an empty store.
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        SmallbankEngine {
            host: MemoryHost::with_config(config),
        }
    }

    pub fn host(&self) -> &MemoryHost {
        &self.host
    }

    /// Validates and runs a single invocation atomically.
    ///
    /// Returns the account for `query`, `None` for every other function.
    pub fn invoke(&self, invocation: &Invocation) -> Result<Option<Account>> {
        self.invoke_counted(invocation).0
    }

    /// Same as [`SmallbankEngine::invoke`], also returning the number of
    /// conflict retries the host needed.
    pub fn invoke_counted(&self, invocation: &Invocation) -> (Result<Option<Account>>, u32) {
        match invocation.parse() {
            Ok(op) => self.host.execute_counted(|store| ledger::apply(store, &op)),
            Err(e) => (Err(e), 0),
        }
    }

    /// Looks up one account.
    pub fn account(&self, id: &str) -> Result<Account> {
        self.host.execute(|store| ledger::query(store, id))
    }

    /// Processes invocations from a CSV reader in streaming fashion.
    ///
    /// Failed invocations are logged at warn level with their error payload
    /// and do not stop the run.
    pub fn process_csv<R: Read>(&self, reader: R) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for (row_idx, result) in csv_reader(reader).records().enumerate() {
            let row_num = row_idx + 1;

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                    summary.malformed += 1;
                    continue;
                }
            };

            let Some(invocation) = invocation_from_record(&record) else {
                warn!("Row {}: Empty invocation row", row_num);
                summary.malformed += 1;
                continue;
            };

            self.process_one(row_num, &invocation, &mut summary);
        }

        Ok(summary)
    }

    /// Runs `invocations` on `workers` threads sharing this engine.
    ///
    /// The batch is split into contiguous chunks, one per worker. Rows in
    /// different chunks interleave freely, so invocations that depend on each
    /// other (an account's creation and its first use) belong in the same
    /// chunk or in an earlier batch.
    pub fn process_parallel(&self, invocations: &[Invocation], workers: usize) -> RunSummary {
        self.run_workers(invocations, workers, 0)
    }

    fn run_workers(&self, invocations: &[Invocation], workers: usize, first_row: usize) -> RunSummary {
        let chunk_len = invocations.len().div_ceil(workers.max(1)).max(1);
        let mut summary = RunSummary::default();

        std::thread::scope(|scope| {
            let handles: Vec<_> = invocations
                .chunks(chunk_len)
                .enumerate()
                .map(|(chunk_idx, chunk)| {
                    scope.spawn(move || {
                        let mut part = RunSummary::default();
                        for (offset, invocation) in chunk.iter().enumerate() {
                            let row_num = first_row + chunk_idx * chunk_len + offset + 1;
                            self.process_one(row_num, invocation, &mut part);
                        }
                        part
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(part) => summary.merge(part),
                    Err(_) => warn!("Worker thread panicked; its counts are lost"),
                }
            }
        });

        summary
    }

    /// Runs a benchmark batch: the leading `create_account` rows serially as
    /// the setup phase, then everything after them on `workers` threads.
    pub fn process_batch(&self, invocations: &[Invocation], workers: usize) -> RunSummary {
        let setup_len = invocations
            .iter()
            .take_while(|inv| Function::from_name(&inv.function) == Some(Function::CreateAccount))
            .count();
        let (setup, rest) = invocations.split_at(setup_len);

        let mut summary = RunSummary::default();
        for (row_idx, invocation) in setup.iter().enumerate() {
            self.process_one(row_idx + 1, invocation, &mut summary);
        }
        info!("Setup phase done: {} accounts", setup_len);

        summary.merge(self.run_workers(rest, workers, setup_len));
        summary
    }

    fn process_one(&self, row_num: usize, invocation: &Invocation, summary: &mut RunSummary) {
        let label = Function::from_name(&invocation.function)
            .map(Function::name)
            .unwrap_or(invocation.function.as_str());

        let (result, retries) = self.invoke_counted(invocation);
        if retries > 0 {
            debug!("Row {}: {} retried {} times", row_num, label, retries);
        }
        summary.record(label, &result, retries);

        match result {
            Ok(Some(account)) => {
                let json = account
                    .encode()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default();
                info!("Row {}: query {}", row_num, json);
            }
            Ok(None) => debug!("Row {}: {} ok", row_num, label),
            Err(e) => warn!("Row {}: {} failed: {}", row_num, label, e.payload()),
        }
    }

    /// Writes final account states to CSV, sorted by id.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "checking", "savings"])?;

        for account in self.host.accounts() {
            csv_writer.write_record([
                account.id,
                account.name,
                account.checking_balance.to_string(),
                account.savings_balance.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for SmallbankEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader)
}

/// Reads every invocation row from `reader` up front.
///
/// Returns the invocations and the number of rows skipped as malformed.
pub fn read_invocations<R: Read>(reader: R) -> (Vec<Invocation>, u64) {
    let mut invocations = Vec::new();
    let mut malformed = 0;
    for (row_idx, result) in csv_reader(reader).records().enumerate() {
        let invocation = match result {
            Ok(record) => invocation_from_record(&record),
            Err(e) => {
                warn!("Row {}: CSV parse error: {}", row_idx + 1, e);
                None
            }
        };
        match invocation {
            Some(invocation) => invocations.push(invocation),
            None => malformed += 1,
        }
    }
    (invocations, malformed)
}

fn invocation_from_record(record: &StringRecord) -> Option<Invocation> {
    let mut fields = record.iter();
    let function = fields.next().filter(|f| !f.is_empty())?;
    Some(Invocation::new(function, fields))
}
