//! # Ledger
//!
//! `ledger` is the module that moves money. Every operation validates its input, checks
//! ownership, and hands the store one [`Batch`]: the balance postings and the record that
//! describes them, committed together or not at all.
//!
//! The ledger never retries. A transient store failure on a mutating call leaves the
//! outcome unknown to the caller, who must look at the transaction history before trying
//! again.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    Account, AccountId, AccountNumber, AccountStore, Amount, Batch, LedgerError, NewTransaction,
    OwnershipGuard, Posting, TransactionId, TransactionRecord, TransactionStatus, UserId,
};

/// Ledger engine over an injected store
pub struct Ledger<S> {
    store: Arc<S>,
    guard: OwnershipGuard<S>,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            guard: self.guard.clone(),
        }
    }
}

fn ensure_active(account: &Account) -> Result<(), LedgerError> {
    if account.active {
        Ok(())
    } else {
        Err(LedgerError::AccountInactive(account.id))
    }
}

fn describe(description: Option<String>, fallback: impl FnOnce() -> String) -> Option<String> {
    Some(
        description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(fallback),
    )
}

/// Log the outcome of an operation and pass it through
fn logged(
    operation: &'static str,
    user_id: UserId,
    result: Result<TransactionRecord, LedgerError>,
) -> Result<TransactionRecord, LedgerError> {
    match &result {
        Ok(record) => debug!(
            operation,
            user = %user_id,
            transaction = %record.id,
            amount = %record.amount,
            status = %record.status,
            "ledger operation committed"
        ),
        Err(e) => warn!(
            operation,
            user = %user_id,
            category = ?e.category(),
            error = %e,
            "ledger operation rejected"
        ),
    }
    result
}

impl<S: AccountStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        let guard = OwnershipGuard::new(Arc::clone(&store));
        Self { store, guard }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Deposit funds into one of the user's accounts
    pub async fn deposit(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self
            .try_deposit(user_id, account_id, amount, description)
            .await;
        logged("deposit", user_id, result)
    }

    async fn try_deposit(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        let amount = Amount::new(amount)?;
        let account = self.guard.authorize(user_id, account_id).await?;
        ensure_active(&account)?;

        let description = describe(description, || {
            format!("Deposit to account {}", account.number)
        });
        let entry = NewTransaction::deposit(user_id, account.id, amount, description);
        let batch = Batch::new(entry, [Posting::credit(account.id, amount.value())])?;
        Ok(self.store.apply(batch).await?)
    }

    /// Withdraw funds from one of the user's accounts
    ///
    /// The balance check happens inside the store's unit of work, so a balance that looked
    /// sufficient before the call can still be rejected with `InsufficientFunds`.
    pub async fn withdrawal(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self
            .try_withdrawal(user_id, account_id, amount, description)
            .await;
        logged("withdrawal", user_id, result)
    }

    async fn try_withdrawal(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        let amount = Amount::new(amount)?;
        let account = self.guard.authorize(user_id, account_id).await?;
        ensure_active(&account)?;

        let description = describe(description, || {
            format!("Withdrawal from account {}", account.number)
        });
        let entry = NewTransaction::withdrawal(user_id, account.id, amount, description);
        let batch = Batch::new(entry, [Posting::debit(account.id, amount.value())])?;
        Ok(self.store.apply(batch).await?)
    }

    /// Transfer funds from one of the user's accounts to any account number
    pub async fn transfer(
        &self,
        user_id: UserId,
        from_account_id: AccountId,
        to_account_number: &AccountNumber,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self
            .try_transfer(user_id, from_account_id, to_account_number, amount, description)
            .await;
        logged("transfer", user_id, result)
    }

    async fn try_transfer(
        &self,
        user_id: UserId,
        from_account_id: AccountId,
        to_account_number: &AccountNumber,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        let amount = Amount::new(amount)?;
        let from = self.guard.authorize(user_id, from_account_id).await?;
        let to = self
            .store
            .find_account_by_number(to_account_number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(to_account_number.to_string()))?;

        let description = describe(description, || format!("Transfer to {}", to.number));
        let entry = NewTransaction::transfer(user_id, from.id, to.id, amount, description)?;
        ensure_active(&from)?;
        ensure_active(&to)?;

        let batch = Batch::new(
            entry,
            [
                Posting::debit(from.id, amount.value()),
                Posting::credit(to.id, amount.value()),
            ],
        )?;
        Ok(self.store.apply(batch).await?)
    }

    /// Cancel a pending transaction initiated by the user
    ///
    /// Only `PENDING` entries can be cancelled, and cancelling never touches balances.
    /// Settled money is reversed by a new compensating transaction, never by rewriting
    /// history.
    pub async fn cancel_transaction(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self.try_cancel(transaction_id, user_id).await;
        logged("cancel", user_id, result)
    }

    async fn try_cancel(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self
            .store
            .find_transaction(transaction_id)
            .await?
            .filter(|record| record.user_id == user_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        if record.status != TransactionStatus::Pending {
            return Err(LedgerError::InvalidState {
                id: record.id,
                status: record.status,
            });
        }
        Ok(self
            .store
            .transition_status(
                transaction_id,
                TransactionStatus::Pending,
                TransactionStatus::Cancelled,
            )
            .await?)
    }
}
