//! SmallBank benchmark workload generator.
//!
//! Produces a stream of [`Invocation`]s: one `create_account` per account
//! (`<i>`, `n_<i>`, 1000 checking, 500 savings), then a mix of queries and
//! value-moving writes of amount 1. Account ids can be skewed towards a few
//! "hot" accounts with a Zipf distribution to provoke contention.

use crate::operation::{Function, Invocation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use thiserror::Error;

pub const ENV_SKEW: &str = "SMALLBANK_SKEW";
pub const ENV_WRITE_RATIO: &str = "SMALLBANK_WRITE_RATIO";
pub const ENV_HOT_ACCOUNT: &str = "SMALLBANK_HOT_ACCOUNT";
pub const ENV_FUNCTIONS: &str = "SMALLBANK_FUNCTIONS";

const INITIAL_CHECKING: i64 = 1000;
const INITIAL_SAVINGS: i64 = 500;
const AMOUNT: i64 = 1;

/// Writers picked from when the mix is [`FunctionMix::All`].
const WRITERS: [Function; 5] = [
    Function::SendPayment,
    Function::WriteCheck,
    Function::TransactSavings,
    Function::DepositChecking,
    Function::Amalgamate,
];

#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("Invalid value {value:?} for {name}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("Workload needs at least one account")]
    NoAccounts,

    /// The hot-account table for this many accounts cannot be allocated
    #[error("Too many accounts for a skewed workload: {0}")]
    TooManyAccounts(usize),

    #[error("Usage: smallbank-gen <num_accounts> <num_operations> [seed]")]
    Usage,

    #[error("Invalid {name} {value:?}. Usage: smallbank-gen <num_accounts> <num_operations> [seed]")]
    InvalidCount { name: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),
}

/// Which account roles are drawn from the skewed distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotAccount {
    /// Every id, including query targets.
    All,
    Sender,
    Recipient,
    /// Uniform everywhere.
    None,
}

impl FromStr for HotAccount {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(HotAccount::All),
            "sender" => Ok(HotAccount::Sender),
            "recipient" => Ok(HotAccount::Recipient),
            "none" | "null" => Ok(HotAccount::None),
            _ => Err(()),
        }
    }
}

/// Which write functions the workload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionMix {
    /// Uniform over the five value-moving functions.
    All,
    /// `send_payment` only.
    Payment,
}

impl FromStr for FunctionMix {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(FunctionMix::All),
            "payment" | "send_payment" => Ok(FunctionMix::Payment),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub accounts: usize,
    pub operations: usize,
    /// Percentage (0..=100) of operations that are writes; the rest are queries.
    pub write_ratio: u32,
    pub functions: FunctionMix,
    pub hot_account: HotAccount,
    /// Zipf exponent for hot account selection.
    pub skew: f64,
    pub seed: u64,
}

impl WorkloadConfig {
    pub fn new(accounts: usize, operations: usize, seed: u64) -> Self {
        WorkloadConfig {
            accounts,
            operations,
            write_ratio: 50,
            functions: FunctionMix::All,
            hot_account: HotAccount::None,
            skew: 1.0,
            seed,
        }
    }

    /// Builds a config from the `SMALLBANK_*` environment variables, falling
    /// back to defaults for unset ones.
    pub fn from_env(accounts: usize, operations: usize, seed: u64) -> Result<Self, WorkloadError> {
        Self::from_lookup(accounts, operations, seed, |name| std::env::var(name).ok())
    }

    /// Same as [`WorkloadConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(
        accounts: usize,
        operations: usize,
        seed: u64,
        lookup: F,
    ) -> Result<Self, WorkloadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(accounts, operations, seed);

        if let Some(value) = lookup(ENV_SKEW) {
            config.skew = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| invalid(ENV_SKEW, &value))?;
        }
        if let Some(value) = lookup(ENV_WRITE_RATIO) {
            config.write_ratio = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|r| *r <= 100)
                .ok_or_else(|| invalid(ENV_WRITE_RATIO, &value))?;
        }
        if let Some(value) = lookup(ENV_HOT_ACCOUNT) {
            config.hot_account = value.parse().map_err(|_| invalid(ENV_HOT_ACCOUNT, &value))?;
        }
        if let Some(value) = lookup(ENV_FUNCTIONS) {
            config.functions = value.parse().map_err(|_| invalid(ENV_FUNCTIONS, &value))?;
        }

        Ok(config)
    }
}

fn invalid(name: &'static str, value: &str) -> WorkloadError {
    WorkloadError::InvalidSetting {
        name,
        value: value.to_string(),
    }
}

/// Zipf distribution over `0..n` via an inverted cumulative table.
#[derive(Debug, Clone)]
pub struct Zipf {
    cdf: Vec<f64>,
}

impl Zipf {
    /// Builds the table for `n` ranks.
    ///
    /// Fails with [`WorkloadError::TooManyAccounts`] when the table does not
    /// fit in memory.
    pub fn new(n: usize, skew: f64) -> Result<Self, WorkloadError> {
        let mut cdf: Vec<f64> = Vec::new();
        cdf.try_reserve_exact(n)
            .map_err(|_| WorkloadError::TooManyAccounts(n))?;

        let mut acc = 0.0;
        for rank in 1..=n {
            acc += (rank as f64).powf(-skew);
            cdf.push(acc);
        }
        for c in &mut cdf {
            *c /= acc;
        }
        Ok(Zipf { cdf })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        self.cdf
            .partition_point(|c| *c < u)
            .min(self.cdf.len().saturating_sub(1))
    }
}

/// Iterator over the generated invocations, setup rows first.
pub struct Workload {
    config: WorkloadConfig,
    rng: StdRng,
    /// Only built when some role is hot.
    zipf: Option<Zipf>,
    emitted: usize,
}

impl Workload {
    pub fn new(config: WorkloadConfig) -> Result<Self, WorkloadError> {
        if config.accounts == 0 {
            return Err(WorkloadError::NoAccounts);
        }
        if config.accounts.checked_add(config.operations).is_none() {
            return Err(WorkloadError::TooManyAccounts(config.accounts));
        }

        let zipf = match config.hot_account {
            HotAccount::None => None,
            _ => Some(Zipf::new(config.accounts, config.skew)?),
        };
        Ok(Workload {
            rng: StdRng::seed_from_u64(config.seed),
            zipf,
            emitted: 0,
            config,
        })
    }

    /// Opening balance injected per account by the setup phase.
    pub fn initial_total(&self) -> i128 {
        (INITIAL_CHECKING as i128 + INITIAL_SAVINGS as i128) * self.config.accounts as i128
    }

    fn uniform(&mut self) -> usize {
        self.rng.gen_range(0..self.config.accounts)
    }

    fn hot(&mut self) -> usize {
        match &self.zipf {
            Some(zipf) => zipf.sample(&mut self.rng),
            None => self.uniform(),
        }
    }

    fn pick(&mut self, hot: bool) -> String {
        let id = if hot { self.hot() } else { self.uniform() };
        id.to_string()
    }

    fn next_operation(&mut self) -> Invocation {
        let hot = self.config.hot_account;

        if self.rng.gen_range(1..=100) > self.config.write_ratio {
            let id = self.pick(hot == HotAccount::All);
            return Invocation::new(Function::Query.name(), [id]);
        }

        let function = match self.config.functions {
            FunctionMix::All => WRITERS[self.rng.gen_range(0..WRITERS.len())],
            FunctionMix::Payment => Function::SendPayment,
        };

        let source = self.pick(matches!(hot, HotAccount::All | HotAccount::Sender));
        let dest = self.pick(matches!(hot, HotAccount::All | HotAccount::Recipient));
        let id = self.pick(hot != HotAccount::None);
        let amount = AMOUNT.to_string();

        match function {
            Function::SendPayment => Invocation::new(function.name(), [amount, dest, source]),
            Function::Amalgamate => Invocation::new(function.name(), [dest, source]),
            _ => Invocation::new(function.name(), [amount, id]),
        }
    }
}

impl Iterator for Workload {
    type Item = Invocation;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.emitted;
        if index >= self.config.accounts + self.config.operations {
            return None;
        }
        self.emitted += 1;

        if index < self.config.accounts {
            return Some(Invocation::new(
                Function::CreateAccount.name(),
                [
                    index.to_string(),
                    format!("n_{}", index),
                    INITIAL_CHECKING.to_string(),
                    INITIAL_SAVINGS.to_string(),
                ],
            ));
        }
        Some(self.next_operation())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.config.accounts + self.config.operations - self.emitted;
        (remaining, Some(remaining))
    }
}
