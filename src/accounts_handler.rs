//! # Accounts Handler
//!
//! `accounts_handler` is a module providing functionality for managing the accounts of
//! multiple users: opening, listing, balance lookup and deactivation.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    Account, AccountBalance, AccountId, AccountNumber, AccountSnapshot, AccountStore,
    CreateAccountRequest, LedgerError, NewAccount, OwnershipGuard, StoreError, UserId,
};

/// Attempts at generating an unused account number before giving up
const NUMBER_ATTEMPTS: usize = 5;

/// Accounts handler for multiple users
pub struct AccountsHandler<S> {
    store: Arc<S>,
    guard: OwnershipGuard<S>,
}

impl<S: AccountStore> AccountsHandler<S> {
    /// Create a new accounts handler
    pub fn new(store: Arc<S>) -> Self {
        let guard = OwnershipGuard::new(Arc::clone(&store));
        Self { store, guard }
    }

    /// Open an account for the user under a freshly generated number
    pub async fn open_account(
        &self,
        user_id: UserId,
        request: CreateAccountRequest,
    ) -> Result<Account, LedgerError> {
        if request.initial_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(request.initial_balance));
        }
        let mut last_err = StoreError::Duplicate("account number");
        for _ in 0..NUMBER_ATTEMPTS {
            let new = NewAccount {
                number: AccountNumber::generate(),
                account_type: request.account_type,
                initial_balance: request.initial_balance,
                user_id,
            };
            match self.store.insert_account(new).await {
                Ok(account) => {
                    info!(
                        user = %user_id,
                        account = %account.id,
                        number = %account.number,
                        "account opened"
                    );
                    return Ok(account);
                }
                // ensure number is unique
                Err(e @ StoreError::Duplicate(_)) => {
                    warn!(user = %user_id, "account number collision, regenerating");
                    last_err = e;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Storage(last_err))
    }

    /// Active accounts of the user, in id order
    pub async fn user_accounts(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.store.accounts_of_user(user_id).await?;
        accounts.retain(|account| account.active);
        Ok(accounts)
    }

    /// One of the user's accounts; not found unless owned by the user
    pub async fn account(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.guard
            .authorize(user_id, account_id)
            .await
            .map_err(|e| match e {
                LedgerError::NotAuthorized(id) => LedgerError::AccountNotFound(id.to_string()),
                other => other,
            })
    }

    /// Balance of one of the user's accounts
    pub async fn balance(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<AccountBalance, LedgerError> {
        let account = self.account(user_id, account_id).await?;
        Ok(AccountBalance::from(&account))
    }

    /// Soft-delete one of the user's accounts
    pub async fn deactivate(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.guard.authorize(user_id, account_id).await?;
        let account = self
            .store
            .set_active(account_id, false)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        info!(user = %user_id, account = %account_id, "account deactivated");
        Ok(account)
    }

    /// Get snapshots of all accounts, in id order
    pub async fn snapshot_accounts(&self) -> Result<Vec<AccountSnapshot>, LedgerError> {
        Ok(self
            .store
            .all_accounts()
            .await?
            .iter()
            .map(Account::snapshot)
            .collect())
    }
}
