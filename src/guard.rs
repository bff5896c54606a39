//! # Ownership Guard
//!
//! Binds a user to an account before anything is allowed to touch it.

use std::sync::Arc;

use crate::{Account, AccountId, AccountStore, LedgerError, UserId};

/// Read-only ownership checks against the store
pub struct OwnershipGuard<S> {
    store: Arc<S>,
}

impl<S> Clone for OwnershipGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: AccountStore> OwnershipGuard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whether `user_id` owns `account_id`; `false` when the account does not exist
    pub async fn owns(&self, user_id: UserId, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self
            .store
            .find_account(account_id)
            .await?
            .map_or(false, |account| account.is_owned_by(user_id)))
    }

    /// Load the account if `user_id` owns it, failing closed with `NotAuthorized` otherwise
    pub async fn authorize(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        match self.store.find_account(account_id).await? {
            Some(account) if account.is_owned_by(user_id) => Ok(account),
            _ => Err(LedgerError::NotAuthorized(account_id)),
        }
    }
}
