//! # Store
//!
//! `store` is the contract between the ledger and whatever persists accounts and
//! transaction records.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Account, AccountId, AccountNumber, AccountType, NewTransaction, PageRequest, StoreError,
    TransactionId, TransactionRecord, TransactionStatus, UserId,
};

/// Result of a store call
pub type StoreResult<T> = Result<T, StoreError>;

/// Signed balance change applied to one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub account: AccountId,
    pub delta: Decimal,
}

impl Posting {
    /// Money entering `account`
    pub fn credit(account: AccountId, amount: Decimal) -> Self {
        Self {
            account,
            delta: amount,
        }
    }

    /// Money leaving `account`
    pub fn debit(account: AccountId, amount: Decimal) -> Self {
        Self {
            account,
            delta: -amount,
        }
    }
}

/// One atomic unit of work: balance postings plus the record describing them
///
/// Postings are kept sorted by ascending account id with at most one posting per
/// account. Stores lock rows in this order, which is the only lock order used anywhere,
/// so two units touching the same pair of accounts can never deadlock.
///
/// Merging postings on the same account fails with [`StoreError::Overflow`] when their sum
/// does not fit a `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    postings: Vec<Posting>,
    entry: NewTransaction,
}

impl Batch {
    pub fn new(
        entry: NewTransaction,
        postings: impl IntoIterator<Item = Posting>,
    ) -> StoreResult<Self> {
        let mut merged: Vec<Posting> = Vec::new();
        let mut postings: Vec<Posting> = postings.into_iter().collect();
        postings.sort_by_key(|p| p.account);
        for posting in postings {
            match merged.last_mut() {
                Some(last) if last.account == posting.account => {
                    last.delta = last
                        .delta
                        .checked_add(posting.delta)
                        .ok_or(StoreError::Overflow(posting.account))?;
                }
                _ => merged.push(posting),
            }
        }
        Ok(Self {
            postings: merged,
            entry,
        })
    }

    /// Postings in canonical lock order
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn entry(&self) -> &NewTransaction {
        &self.entry
    }

    pub fn into_entry(self) -> NewTransaction {
        self.entry
    }
}

/// Account row to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub number: AccountNumber,
    pub account_type: AccountType,
    pub initial_balance: Decimal,
    pub user_id: UserId,
}

/// Which records a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    /// Records initiated by the user
    User(UserId),
    /// Records with the account on either side
    Account(AccountId),
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        match *self {
            TransactionFilter::User(user) => record.user_id == user,
            TransactionFilter::Account(account) => record.touches(account),
        }
    }
}

/// Pagination metadata of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Slice an already ordered result set
    pub fn from_ordered(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let limit = u64::from(request.limit());
        let data = items
            .into_iter()
            .skip(request.offset())
            .take(request.limit() as usize)
            .collect();
        Self {
            data,
            pagination: Pagination {
                page: request.page(),
                limit: request.limit(),
                total,
                pages: (total + limit - 1) / limit,
            },
        }
    }
}

/// Persistence of accounts and ledger entries
///
/// Implementations must make [`AccountStore::apply`] a single serializable unit: rows are
/// held exclusively in the batch's posting order, every touched account is checked to
/// exist, be active and stay non-negative, and then either all postings and the record
/// are written or nothing is.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn find_account_by_number(&self, number: &AccountNumber)
        -> StoreResult<Option<Account>>;

    /// All accounts of a user, active or not, in id order
    async fn accounts_of_user(&self, user_id: UserId) -> StoreResult<Vec<Account>>;

    /// All accounts, in id order
    async fn all_accounts(&self) -> StoreResult<Vec<Account>>;

    /// Insert a new account; `StoreError::Duplicate` if the number is taken
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    /// Flip the active flag; `None` if the account does not exist
    async fn set_active(&self, id: AccountId, active: bool) -> StoreResult<Option<Account>>;

    /// Atomically apply the batch's postings and write its record
    async fn apply(&self, batch: Batch) -> StoreResult<TransactionRecord>;

    /// Write a record without any balance effect, for producers other than the ledger
    async fn insert_transaction(&self, entry: NewTransaction) -> StoreResult<TransactionRecord>;

    async fn find_transaction(&self, id: TransactionId) -> StoreResult<Option<TransactionRecord>>;

    /// Compare-and-set the status of a record
    async fn transition_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> StoreResult<TransactionRecord>;

    /// Matching records, newest first
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<TransactionRecord>>;
}
