//! # Account
//!
//! `account` is a module describing a single bank account and the values derived from it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, UserId};

/// Prefix shared by every generated account number
const ACCOUNT_NUMBER_PREFIX: &str = "ACC";

/// Kind of account offered to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
            AccountType::Business => "BUSINESS",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHECKING" => Ok(AccountType::Checking),
            "SAVINGS" => Ok(AccountType::Savings),
            "BUSINESS" => Ok(AccountType::Business),
            other => Err(format!(
                "account type must be CHECKING, SAVINGS or BUSINESS, got {other:?}"
            )),
        }
    }
}

/// Human readable account number, e.g. `ACC837261940042`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Generate a fresh account number from the clock and a random suffix.
    ///
    /// Uniqueness is only probable; the store has the final word at insertion.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis().rem_euclid(100_000_000);
        let random: u16 = rand::thread_rng().gen_range(0..10_000);
        Self(format!("{ACCOUNT_NUMBER_PREFIX}{millis:08}{random:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountNumber {
    fn from(number: &str) -> Self {
        Self(number.to_owned())
    }
}

impl From<String> for AccountNumber {
    fn from(number: String) -> Self {
        Self(number)
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account's ID
    pub id: AccountId,
    /// Unique account number
    pub number: AccountNumber,
    /// Account type
    pub account_type: AccountType,
    /// Current balance, never negative once committed
    pub balance: Decimal,
    /// Cleared when the account is deactivated
    pub active: bool,
    /// Owning user
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether `user_id` owns this account
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Get a snapshot of the account
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id,
            number: self.number.clone(),
            user_id: self.user_id,
            account_type: self.account_type,
            balance: self.balance,
            active: self.active,
        }
    }
}

/// Serializable snapshot of an account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccountSnapshot {
    /// Account's ID
    #[serde(rename = "account")]
    pub id: AccountId,
    /// Account number
    pub number: AccountNumber,
    /// Owning user
    #[serde(rename = "user")]
    pub user_id: UserId,
    /// Account type
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Balance
    pub balance: Decimal,
    /// Active status
    pub active: bool,
}

/// Balance view returned to the account owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub balance: Decimal,
    pub account_number: AccountNumber,
    pub account_type: AccountType,
}

impl From<&Account> for AccountBalance {
    fn from(account: &Account) -> Self {
        Self {
            balance: account.balance,
            account_number: account.number.clone(),
            account_type: account.account_type,
        }
    }
}
