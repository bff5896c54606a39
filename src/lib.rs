//! # Bank Ledger
//!
//! `bank_ledger` is a library for moving money between user accounts: deposits, withdrawals
//! and transfers executed as atomic units against an injected [`AccountStore`], with
//! ownership checks in front of every mutation and a paginated view over the recorded
//! transactions.

use std::fmt;

use serde::{Deserialize, Serialize};

mod account;
mod accounts_handler;
mod error;
mod guard;
mod ledger;
mod memory;
mod query;
mod request;
mod store;
mod transaction;

pub use account::{Account, AccountBalance, AccountNumber, AccountSnapshot, AccountType};
pub use accounts_handler::AccountsHandler;
pub use error::{ErrorCategory, LedgerError, RequestError, StoreError};
pub use guard::OwnershipGuard;
pub use ledger::Ledger;
pub use memory::{InMemoryStore, StoreConfig};
pub use query::TransactionQuery;
pub use request::{
    CreateAccountRequest, DepositRequest, LedgerCommand, PageRequest, TransactionRequest,
    TransferRequest, WithdrawalRequest,
};
pub use store::{
    AccountStore, Batch, NewAccount, Page, Pagination, Posting, StoreResult, TransactionFilter,
};
pub use transaction::{
    Amount, NewTransaction, TransactionKind, TransactionRecord, TransactionStatus,
};

/// Identifier of a user, as resolved by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifier of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

/// Identifier of a transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
