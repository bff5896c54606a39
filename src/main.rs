use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use csv_async::{AsyncDeserializer, AsyncSerializer};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::File;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bank_ledger::{
    AccountId, AccountStore, AccountsHandler, CreateAccountRequest, DepositRequest,
    ErrorCategory, InMemoryStore, Ledger, LedgerError, RequestError, StoreConfig, TransactionId,
    TransactionRecord, TransferRequest, UserId, WithdrawalRequest,
};

/// An account represented by a row of the accounts CSV
#[derive(Deserialize)]
struct CsvAccount {
    user: u64,
    account_type: Option<String>,
    initial_balance: Option<Decimal>,
}

/// An operation type represented by the CSV field `type`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CsvOperationType {
    Deposit,
    Withdrawal,
    Transfer,
    Cancel,
}

/// An operation represented by a row of the operations CSV
#[derive(Deserialize)]
struct CsvOperation {
    #[serde(rename = "type")]
    op_type: CsvOperationType,
    user: u64,
    account: Option<u64>,
    /// Destination account id of a transfer
    to: Option<u64>,
    amount: Option<Decimal>,
    description: Option<String>,
    /// Transaction to cancel
    tx: Option<u64>,
}

/// Why a row was not applied
#[derive(Debug, Error)]
enum Rejection {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl Rejection {
    fn category(&self) -> ErrorCategory {
        match self {
            Rejection::Request(_) => ErrorCategory::Validation,
            Rejection::Ledger(e) => e.category(),
        }
    }
}

/// Ledger replay: opens accounts, applies operations concurrently, prints final balances
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Accounts filename (user,account_type,initial_balance)
    #[clap(value_parser, value_name = "ACCOUNTS_FILE", value_hint = clap::ValueHint::FilePath)]
    accounts_filename: PathBuf,
    /// Operations filename (type,user,account,to,amount,description,tx)
    #[clap(value_parser, value_name = "OPERATIONS_FILE", value_hint = clap::ValueHint::FilePath)]
    operations_filename: PathBuf,
    /// How long an operation waits for an account lock, in milliseconds
    #[clap(long, value_parser, default_value_t = 5000)]
    lock_timeout_ms: u64,
    /// Maximum number of operations in flight; unbounded when omitted
    #[clap(long, value_parser)]
    concurrency: Option<usize>,
}

async fn open(path: &Path) -> Result<File> {
    File::open(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn execute(
    op: CsvOperation,
    ledger: &Ledger<InMemoryStore>,
) -> Result<TransactionRecord, Rejection> {
    let user_id = UserId(op.user);
    let account_id = op.account.map(AccountId);
    let record = match op.op_type {
        CsvOperationType::Deposit => {
            let request = DepositRequest::parse(account_id, op.amount, op.description)?;
            ledger
                .deposit(user_id, request.account_id, request.amount, request.description)
                .await?
        }
        CsvOperationType::Withdrawal => {
            let request = WithdrawalRequest::parse(account_id, op.amount, op.description)?;
            ledger
                .withdrawal(user_id, request.account_id, request.amount, request.description)
                .await?
        }
        CsvOperationType::Transfer => {
            // the file names destinations by id, the ledger by number
            let to_number = match op.to {
                Some(to) => Some(
                    ledger
                        .store()
                        .find_account(AccountId(to))
                        .await
                        .map_err(LedgerError::from)?
                        .ok_or_else(|| LedgerError::AccountNotFound(to.to_string()))?
                        .number,
                ),
                None => None,
            };
            let request = TransferRequest::parse(account_id, to_number, op.amount, op.description)?;
            ledger
                .transfer(
                    user_id,
                    request.from_account_id,
                    &request.to_account_number,
                    request.amount,
                    request.description,
                )
                .await?
        }
        CsvOperationType::Cancel => {
            let tx = op.tx.ok_or_else(|| RequestError {
                errors: vec!["tx is required for a cancel".to_string()],
            })?;
            ledger.cancel_transaction(TransactionId(tx), user_id).await?
        }
    };
    Ok(record)
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr, stdout is reserved for the CSV report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let store = Arc::new(InMemoryStore::with_config(StoreConfig {
        lock_timeout: Duration::from_millis(args.lock_timeout_ms),
    }));
    let accounts = AccountsHandler::new(Arc::clone(&store));
    let ledger = Ledger::new(Arc::clone(&store));

    // open accounts in file order so ids follow row order
    let mut reader = AsyncDeserializer::from_reader(open(&args.accounts_filename).await?);
    let rows = reader.deserialize::<CsvAccount>();
    futures::pin_mut!(rows);
    let mut line = 1;
    while let Some(row) = rows.try_next().await? {
        line += 1;
        let request = CreateAccountRequest::parse(row.account_type.as_deref(), row.initial_balance)
            .with_context(|| format!("Invalid account on line {line}"))?;
        accounts
            .open_account(UserId(row.user), request)
            .await
            .with_context(|| format!("Failed to open account on line {line}"))?;
    }

    // process operations
    let committed = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let mut reader = AsyncDeserializer::from_reader(open(&args.operations_filename).await?);
    let operations = reader.deserialize::<CsvOperation>();
    operations
        .try_for_each_concurrent(args.concurrency, |op| {
            let ledger = ledger.clone();
            let committed = committed.clone();
            let rejected = rejected.clone();
            async move {
                let op_type = format!("{:?}", op.op_type);
                match execute(op, &ledger).await {
                    Ok(_) => {
                        committed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        rejected.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            operation = %op_type,
                            category = ?e.category(),
                            error = %e,
                            "row skipped"
                        );
                    }
                }
                Ok(())
            }
        })
        .await?;
    info!(
        committed = committed.load(Ordering::Relaxed),
        rejected = rejected.load(Ordering::Relaxed),
        "finished replay"
    );

    // print accounts
    let mut writer = AsyncSerializer::from_writer(tokio::io::stdout());
    for snapshot in accounts.snapshot_accounts().await? {
        writer.serialize(&snapshot).await?;
    }
    writer.flush().await?;

    Ok(())
}
