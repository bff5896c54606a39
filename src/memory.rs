//! # In-memory store
//!
//! `memory` is a module providing an [`AccountStore`] kept entirely in memory. Each account
//! row sits behind its own async mutex so a unit of work can hold several rows across
//! `.await` points, exactly as a database holds row locks inside a transaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::store::StoreResult;
use crate::{
    Account, AccountId, AccountNumber, AccountStore, Batch, NewAccount, NewTransaction, Page,
    PageRequest, StoreError, TransactionFilter, TransactionId, TransactionRecord,
    TransactionStatus, UserId,
};

/// Tuning of the in-memory store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// How long a unit of work waits for a row lock before giving up
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

type Row = Arc<Mutex<Account>>;

/// Account store for tests, demos and the replay tool
pub struct InMemoryStore {
    config: StoreConfig,
    /// Map of account id to account row
    accounts: DashMap<AccountId, Row>,
    /// Map of account number to account id, used to ensure global uniqueness of numbers
    numbers: DashMap<AccountNumber, AccountId>,
    /// Map of transaction id to ledger entry
    transactions: DashMap<TransactionId, TransactionRecord>,
    next_account_id: AtomicU64,
    next_transaction_id: AtomicU64,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            accounts: DashMap::new(),
            numbers: DashMap::new(),
            transactions: DashMap::new(),
            next_account_id: AtomicU64::new(1),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    fn row(&self, id: AccountId) -> Option<Row> {
        self.accounts.get(&id).map(|row| Arc::clone(row.value()))
    }

    /// Rows in ascending id order, without holding any map shard
    fn rows(&self) -> Vec<(AccountId, Row)> {
        let mut rows: Vec<_> = self
            .accounts
            .iter()
            .map(|row| (*row.key(), Arc::clone(row.value())))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows
    }

    async fn lock(&self, id: AccountId, row: Row) -> StoreResult<OwnedMutexGuard<Account>> {
        tokio::time::timeout(self.config.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(id))
    }

    async fn read(&self, id: AccountId, row: Row) -> StoreResult<Account> {
        Ok(self.lock(id, row).await?.clone())
    }

    fn write_record(&self, entry: NewTransaction) -> TransactionRecord {
        let id = TransactionId(self.next_transaction_id.fetch_add(1, Ordering::SeqCst));
        let record = entry.into_record(id, Utc::now());
        self.transactions.insert(id, record.clone());
        record
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        match self.row(id) {
            Some(row) => Ok(Some(self.read(id, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_account_by_number(
        &self,
        number: &AccountNumber,
    ) -> StoreResult<Option<Account>> {
        let id = self.numbers.get(number).map(|id| *id.value());
        match id {
            Some(id) => self.find_account(id).await,
            None => Ok(None),
        }
    }

    async fn accounts_of_user(&self, user_id: UserId) -> StoreResult<Vec<Account>> {
        let mut accounts = Vec::new();
        for (id, row) in self.rows() {
            let account = self.read(id, row).await?;
            if account.user_id == user_id {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    async fn all_accounts(&self) -> StoreResult<Vec<Account>> {
        let mut accounts = Vec::new();
        for (id, row) in self.rows() {
            accounts.push(self.read(id, row).await?);
        }
        Ok(accounts)
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let id = match self.numbers.entry(account.number.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Duplicate("account number")),
            Entry::Vacant(slot) => {
                let id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
                slot.insert(id);
                id
            }
        };
        let now = Utc::now();
        let account = Account {
            id,
            number: account.number,
            account_type: account.account_type,
            balance: account.initial_balance,
            active: true,
            user_id: account.user_id,
            created_at: now,
            updated_at: now,
        };
        self.accounts
            .insert(id, Arc::new(Mutex::new(account.clone())));
        debug!(account = %id, number = %account.number, user = %account.user_id, "account inserted");
        Ok(account)
    }

    async fn set_active(&self, id: AccountId, active: bool) -> StoreResult<Option<Account>> {
        let row = match self.row(id) {
            Some(row) => row,
            None => return Ok(None),
        };
        let mut account = self.lock(id, row).await?;
        account.active = active;
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn apply(&self, batch: Batch) -> StoreResult<TransactionRecord> {
        // lock every touched row in canonical order
        let mut guards = Vec::with_capacity(batch.postings().len());
        for posting in batch.postings() {
            let row = self
                .row(posting.account)
                .ok_or(StoreError::AccountMissing(posting.account))?;
            guards.push(self.lock(posting.account, row).await?);
        }

        // check every row before touching any of them
        let mut balances = Vec::with_capacity(guards.len());
        for (account, posting) in guards.iter().zip(batch.postings()) {
            if !account.active {
                return Err(StoreError::AccountInactive(account.id));
            }
            let balance = account
                .balance
                .checked_add(posting.delta)
                .ok_or(StoreError::Overflow(account.id))?;
            if balance < Decimal::ZERO {
                return Err(StoreError::Overdrawn {
                    account: account.id,
                    balance: account.balance,
                    requested: -posting.delta,
                });
            }
            balances.push(balance);
        }

        let now = Utc::now();
        for (account, balance) in guards.iter_mut().zip(balances) {
            account.balance = balance;
            account.updated_at = now;
        }
        let record = self.write_record(batch.into_entry());
        debug!(
            transaction = %record.id,
            kind = ?record.kind,
            amount = %record.amount,
            "unit committed"
        );
        Ok(record)
    }

    async fn insert_transaction(&self, entry: NewTransaction) -> StoreResult<TransactionRecord> {
        Ok(self.write_record(entry))
    }

    async fn find_transaction(&self, id: TransactionId) -> StoreResult<Option<TransactionRecord>> {
        Ok(self.transactions.get(&id).map(|record| record.value().clone()))
    }

    async fn transition_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> StoreResult<TransactionRecord> {
        let mut record = self
            .transactions
            .get_mut(&id)
            .ok_or(StoreError::TransactionMissing(id))?;
        if record.status != from {
            return Err(StoreError::StatusConflict {
                id,
                actual: record.status,
            });
        }
        record.status = to;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> = self
            .transactions
            .iter()
            .filter(|record| filter.matches(record.value()))
            .map(|record| record.value().clone())
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_ordered(records, page))
    }
}
