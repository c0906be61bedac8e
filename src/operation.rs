//! Invocation models: raw string calls and their validated, typed form.

use crate::error::{LedgerError, Result};

/// The ledger functions callers may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
    CreateAccount,
    DepositChecking,
    WriteCheck,
    TransactSavings,
    SendPayment,
    Amalgamate,
    Query,
}

impl Function {
    pub const ALL: [Function; 7] = [
        Function::CreateAccount,
        Function::DepositChecking,
        Function::WriteCheck,
        Function::TransactSavings,
        Function::SendPayment,
        Function::Amalgamate,
        Function::Query,
    ];

    /// Resolves a function name.
    ///
    /// Accepts the snake-case names as well as the exported method names used
    /// by existing benchmark clients (`SendPayment`, `amalgamate`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name.trim() {
            "create_account" | "CreateAccount" => Function::CreateAccount,
            "deposit_checking" | "DepositChecking" => Function::DepositChecking,
            "write_check" | "WriteCheck" => Function::WriteCheck,
            "transact_savings" | "TransactSavings" => Function::TransactSavings,
            "send_payment" | "SendPayment" => Function::SendPayment,
            "amalgamate" | "Amalgamate" => Function::Amalgamate,
            "query" | "Query" => Function::Query,
            _ => return None,
        };
        Some(function)
    }

    /// Canonical snake-case name.
    pub fn name(self) -> &'static str {
        match self {
            Function::CreateAccount => "create_account",
            Function::DepositChecking => "deposit_checking",
            Function::WriteCheck => "write_check",
            Function::TransactSavings => "transact_savings",
            Function::SendPayment => "send_payment",
            Function::Amalgamate => "amalgamate",
            Function::Query => "query",
        }
    }

    /// Exact number of string arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            Function::CreateAccount => 4,
            Function::SendPayment => 3,
            Function::DepositChecking
            | Function::WriteCheck
            | Function::TransactSavings
            | Function::Amalgamate => 2,
            Function::Query => 1,
        }
    }
}

/// A raw call: function name plus ordered string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub function: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, A>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Invocation {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Validates arity and numeric arguments without touching any store.
    pub fn parse(&self) -> Result<Operation> {
        let function = Function::from_name(&self.function)
            .ok_or_else(|| LedgerError::UnknownFunction(self.function.clone()))?;
        Operation::parse(function, &self.args)
    }

    /// Flattens the call into a single CSV row: `function,arg1,...`.
    pub fn to_record(&self) -> Vec<&str> {
        std::iter::once(self.function.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// A validated call with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateAccount {
        id: String,
        name: String,
        checking: i64,
        savings: i64,
    },
    DepositChecking {
        amount: i64,
        id: String,
    },
    WriteCheck {
        amount: i64,
        id: String,
    },
    /// `amount` may be negative to withdraw from savings.
    TransactSavings {
        amount: i64,
        id: String,
    },
    SendPayment {
        amount: i64,
        dest: String,
        source: String,
    },
    /// Moves all of `source`'s savings into `dest`'s checking.
    Amalgamate {
        dest: String,
        source: String,
    },
    Query {
        id: String,
    },
}

impl Operation {
    /// Builds an operation from ordered string arguments.
    ///
    /// Fails with [`LedgerError::BadArguments`] on any arity mismatch or on a
    /// numeric argument that is not a base-10 integer.
    pub fn parse(function: Function, args: &[String]) -> Result<Self> {
        let name = function.name();
        if args.len() != function.arity() {
            return Err(LedgerError::bad_arguments(
                name,
                format!("expected {} arguments, got {}", function.arity(), args.len()),
            ));
        }

        let op = match function {
            Function::CreateAccount => Operation::CreateAccount {
                id: args[0].clone(),
                name: args[1].clone(),
                checking: parse_integer(name, "checking", &args[2])?,
                savings: parse_integer(name, "saving", &args[3])?,
            },
            Function::DepositChecking => Operation::DepositChecking {
                amount: parse_integer(name, "amount", &args[0])?,
                id: args[1].clone(),
            },
            Function::WriteCheck => Operation::WriteCheck {
                amount: parse_integer(name, "amount", &args[0])?,
                id: args[1].clone(),
            },
            Function::TransactSavings => Operation::TransactSavings {
                amount: parse_integer(name, "amount", &args[0])?,
                id: args[1].clone(),
            },
            Function::SendPayment => Operation::SendPayment {
                amount: parse_integer(name, "amount", &args[0])?,
                dest: args[1].clone(),
                source: args[2].clone(),
            },
            Function::Amalgamate => Operation::Amalgamate {
                dest: args[0].clone(),
                source: args[1].clone(),
            },
            Function::Query => Operation::Query {
                id: args[0].clone(),
            },
        };

        Ok(op)
    }

    pub fn function(&self) -> Function {
        match self {
            Operation::CreateAccount { .. } => Function::CreateAccount,
            Operation::DepositChecking { .. } => Function::DepositChecking,
            Operation::WriteCheck { .. } => Function::WriteCheck,
            Operation::TransactSavings { .. } => Function::TransactSavings,
            Operation::SendPayment { .. } => Function::SendPayment,
            Operation::Amalgamate { .. } => Function::Amalgamate,
            Operation::Query { .. } => Function::Query,
        }
    }
}

fn parse_integer(function: &'static str, field: &str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        LedgerError::bad_arguments(function, format!("{} must be an integer, got {:?}", field, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_account() {
        let op = Invocation::new("create_account", ["A", "Alice", "100", "50"])
            .parse()
            .unwrap();
        assert_eq!(
            op,
            Operation::CreateAccount {
                id: "A".into(),
                name: "Alice".into(),
                checking: 100,
                savings: 50,
            }
        );
    }

    #[test]
    fn test_parse_send_payment_argument_order() {
        let op = Invocation::new("send_payment", ["30", "B", "A"]).parse().unwrap();
        assert_eq!(
            op,
            Operation::SendPayment {
                amount: 30,
                dest: "B".into(),
                source: "A".into(),
            }
        );
    }

    #[test]
    fn test_parse_accepts_method_names() {
        let op = Invocation::new("TransactSavings", ["-5", "A"]).parse().unwrap();
        assert_eq!(
            op,
            Operation::TransactSavings {
                amount: -5,
                id: "A".into(),
            }
        );
        assert_eq!(op.function().name(), "transact_savings");
    }

    #[test]
    fn test_parse_trims_numeric_whitespace() {
        let op = Invocation::new("deposit_checking", [" 10 ", "A"]).parse().unwrap();
        assert!(matches!(op, Operation::DepositChecking { amount: 10, .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_function() {
        let err = Invocation::new("withdraw", ["1", "A"]).parse().unwrap_err();
        assert!(matches!(err, LedgerError::UnknownFunction(name) if name == "withdraw"));
    }

    #[test]
    fn test_parse_rejects_every_wrong_arity() {
        for function in Function::ALL {
            for len in 0..6 {
                if len == function.arity() {
                    continue;
                }
                let args = vec!["1".to_string(); len];
                let err = Operation::parse(function, &args).unwrap_err();
                assert!(
                    matches!(err, LedgerError::BadArguments { function: f, .. } if f == function.name()),
                    "{} with {} args",
                    function.name(),
                    len
                );
            }
        }
    }

    #[test]
    fn test_parse_rejects_non_integer_amount() {
        for raw in ["abc", "1.5", "", "1e3"] {
            let err = Invocation::new("write_check", [raw, "A"]).parse().unwrap_err();
            assert!(matches!(err, LedgerError::BadArguments { .. }), "{:?}", raw);
        }
    }

    #[test]
    fn test_parse_rejects_non_integer_balance() {
        let err = Invocation::new("create_account", ["A", "Alice", "100", "fifty"])
            .parse()
            .unwrap_err();
        assert!(err.to_string().contains("saving must be an integer"));
    }

    #[test]
    fn test_to_record_flattens_call() {
        let invocation = Invocation::new("amalgamate", ["B", "A"]);
        assert_eq!(invocation.to_record(), vec!["amalgamate", "B", "A"]);
    }
}
