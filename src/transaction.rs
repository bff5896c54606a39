//! # Transaction
//!
//! `transaction` is a module describing ledger entries: the record of one money movement
//! and the validated values needed to create one.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccountId, LedgerError, TransactionId, UserId};

/// A strictly positive monetary amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Validate a raw decimal, rejecting zero and negative values
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

/// Lifecycle status of a ledger entry
///
/// The ledger only ever writes `Completed` entries. `Pending` entries come from other
/// producers and may be cancelled; `Failed` is reserved for deferred settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(status)
    }
}

/// A ledger entry waiting to be written by the store
///
/// The constructors fix the account shape of each kind, so a deposit can never carry a
/// source account and a transfer always carries both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub(crate) reference: String,
    pub(crate) amount: Amount,
    pub(crate) kind: TransactionKind,
    pub(crate) status: TransactionStatus,
    pub(crate) description: Option<String>,
    pub(crate) from_account: Option<AccountId>,
    pub(crate) to_account: Option<AccountId>,
    pub(crate) user_id: UserId,
}

impl NewTransaction {
    fn new(
        kind: TransactionKind,
        user_id: UserId,
        amount: Amount,
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        description: Option<String>,
    ) -> Self {
        Self {
            reference: new_reference(),
            amount,
            kind,
            status: TransactionStatus::Completed,
            description,
            from_account,
            to_account,
            user_id,
        }
    }

    /// Money entering `to`
    pub fn deposit(
        user_id: UserId,
        to: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Self {
        Self::new(TransactionKind::Deposit, user_id, amount, None, Some(to), description)
    }

    /// Money leaving `from`
    pub fn withdrawal(
        user_id: UserId,
        from: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Self {
        Self::new(TransactionKind::Withdrawal, user_id, amount, Some(from), None, description)
    }

    /// Money moving from `from` to `to`
    pub fn transfer(
        user_id: UserId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<Self, LedgerError> {
        if from == to {
            return Err(LedgerError::SameAccountTransfer);
        }
        Ok(Self::new(
            TransactionKind::Transfer,
            user_id,
            amount,
            Some(from),
            Some(to),
            description,
        ))
    }

    /// Override the initial status (defaults to `Completed`)
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Turn into a stored record with the id and timestamp assigned by the store
    pub(crate) fn into_record(self, id: TransactionId, now: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            reference: self.reference,
            amount: self.amount.value(),
            kind: self.kind,
            status: self.status,
            description: self.description,
            from_account: self.from_account,
            to_account: self.to_account,
            user_id: self.user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stored ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Unique reference string
    pub reference: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub description: Option<String>,
    /// Source account, set for withdrawals and transfers
    pub from_account: Option<AccountId>,
    /// Destination account, set for deposits and transfers
    pub to_account: Option<AccountId>,
    /// Initiating user
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether the entry moved money into or out of `account`
    pub fn touches(&self, account: AccountId) -> bool {
        self.from_account == Some(account) || self.to_account == Some(account)
    }
}

fn new_reference() -> String {
    format!("TXN-{}", Uuid::new_v4().simple()).to_uppercase()
}
