//! # Transaction Query
//!
//! Read-only, paginated access to recorded transactions.

use std::sync::Arc;

use crate::{
    AccountId, AccountStore, LedgerError, OwnershipGuard, Page, PageRequest, TransactionFilter,
    TransactionId, TransactionRecord, UserId,
};

/// Transaction history scoped to the requesting user
pub struct TransactionQuery<S> {
    store: Arc<S>,
    guard: OwnershipGuard<S>,
}

impl<S: AccountStore> TransactionQuery<S> {
    /// Create a query service over the store
    pub fn new(store: Arc<S>) -> Self {
        let guard = OwnershipGuard::new(Arc::clone(&store));
        Self { store, guard }
    }

    /// Transactions initiated by the user, newest first
    pub async fn list_user_transactions(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, LedgerError> {
        Ok(self
            .store
            .list_transactions(TransactionFilter::User(user_id), page)
            .await?)
    }

    /// Transactions on either side of one of the user's accounts, newest first
    pub async fn list_account_transactions(
        &self,
        user_id: UserId,
        account_id: AccountId,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, LedgerError> {
        if !self.guard.owns(user_id, account_id).await? {
            return Err(LedgerError::NotAuthorized(account_id));
        }
        Ok(self
            .store
            .list_transactions(TransactionFilter::Account(account_id), page)
            .await?)
    }

    /// A single transaction initiated by the user
    pub async fn get_transaction(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
    ) -> Result<TransactionRecord, LedgerError> {
        self.store
            .find_transaction(transaction_id)
            .await?
            .filter(|record| record.user_id == user_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountNumber, AccountType, InMemoryStore, Ledger, NewAccount};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn account_listing_requires_ownership() {
        let store = Arc::new(InMemoryStore::new());
        let account = store
            .insert_account(NewAccount {
                number: AccountNumber::generate(),
                account_type: AccountType::Checking,
                initial_balance: dec!(0),
                user_id: UserId(1),
            })
            .await
            .unwrap();
        let query = TransactionQuery::new(Arc::clone(&store));

        assert_eq!(
            query
                .list_account_transactions(UserId(2), account.id, PageRequest::default())
                .await
                .unwrap_err(),
            LedgerError::NotAuthorized(account.id)
        );
    }

    #[tokio::test]
    async fn get_transaction_is_scoped_to_initiator() {
        let store = Arc::new(InMemoryStore::new());
        let account = store
            .insert_account(NewAccount {
                number: AccountNumber::generate(),
                account_type: AccountType::Checking,
                initial_balance: dec!(0),
                user_id: UserId(1),
            })
            .await
            .unwrap();
        let ledger = Ledger::new(Arc::clone(&store));
        let record = ledger
            .deposit(UserId(1), account.id, dec!(3), None)
            .await
            .unwrap();
        let query = TransactionQuery::new(store);

        assert_eq!(query.get_transaction(record.id, UserId(1)).await.unwrap(), record);
        assert_eq!(
            query.get_transaction(record.id, UserId(2)).await.unwrap_err(),
            LedgerError::TransactionNotFound(record.id)
        );
    }
}
