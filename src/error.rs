//! # Errors
//!
//! Typed failures of the ledger, the store contract and request parsing.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, TransactionId, TransactionStatus};

/// Broad class of a [`LedgerError`], used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Authorization,
    NotFound,
    StateConflict,
    Transient,
}

/// Business outcome of a rejected ledger operation
///
/// Every variant except [`LedgerError::Storage`] means the operation was rejected before
/// commit and left no trace. A `Storage` failure on a mutating call has an unknown outcome:
/// re-query the transaction history before submitting it again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("account {0} is not authorized for this user")]
    NotAuthorized(AccountId),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("account {0} is inactive")]
    AccountInactive(AccountId),

    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("balance of account {0} would exceed the representable range")]
    BalanceOverflow(AccountId),

    #[error("only pending transactions can be cancelled (transaction {id} is {status})")]
    InvalidState {
        id: TransactionId,
        status: TransactionStatus,
    },

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        use LedgerError::*;
        match self {
            InvalidAmount(_) | SameAccountTransfer => ErrorCategory::Validation,
            NotAuthorized(_) => ErrorCategory::Authorization,
            AccountNotFound(_) | TransactionNotFound(_) => ErrorCategory::NotFound,
            AccountInactive(_)
            | InsufficientFunds { .. }
            | BalanceOverflow(_)
            | InvalidState { .. } => ErrorCategory::StateConflict,
            Storage(_) => ErrorCategory::Transient,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountMissing(id) => LedgerError::AccountNotFound(id.to_string()),
            StoreError::AccountInactive(id) => LedgerError::AccountInactive(id),
            StoreError::Overdrawn {
                account,
                balance,
                requested,
            } => LedgerError::InsufficientFunds {
                account,
                balance,
                requested,
            },
            StoreError::Overflow(id) => LedgerError::BalanceOverflow(id),
            StoreError::TransactionMissing(id) => LedgerError::TransactionNotFound(id),
            StoreError::StatusConflict { id, actual } => {
                LedgerError::InvalidState { id, status: actual }
            }
            other => LedgerError::Storage(other),
        }
    }
}

/// Failure reported by an [`AccountStore`](crate::AccountStore) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("account {0} does not exist")]
    AccountMissing(AccountId),

    #[error("account {0} is inactive")]
    AccountInactive(AccountId),

    #[error("account {account} would be overdrawn: balance {balance}, requested {requested}")]
    Overdrawn {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("balance of account {0} would overflow")]
    Overflow(AccountId),

    #[error("transaction {0} does not exist")]
    TransactionMissing(TransactionId),

    #[error("transaction {id} is {actual}")]
    StatusConflict {
        id: TransactionId,
        actual: TransactionStatus,
    },

    #[error("duplicate value for unique field {0}")]
    Duplicate(&'static str),

    #[error("timed out waiting for the lock on account {0}")]
    LockTimeout(AccountId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Field errors collected while parsing an inbound request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request: {}", .errors.join("; "))]
pub struct RequestError {
    pub errors: Vec<String>,
}

impl RequestError {
    pub(crate) fn from_errors(errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }
}
