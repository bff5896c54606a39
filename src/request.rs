//! # Requests
//!
//! Typed inbound requests. Each `parse` constructor checks every field and reports all
//! problems at once, so callers can hand the full list back to the client.

use rust_decimal::Decimal;

use crate::{AccountId, AccountNumber, AccountType, RequestError, TransactionKind};

/// Largest page a listing will return
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Page size used when none is given
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Page selection for listings, always within bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Clamp `page` to at least 1 and `limit` to `1..=100`
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Build from optional query parameters, falling back to the defaults
    pub fn from_query(page: Option<u32>, limit: Option<u32>) -> Self {
        Self::new(page.unwrap_or(1), limit.unwrap_or(DEFAULT_PAGE_LIMIT))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items skipped before this page
    pub fn offset(&self) -> usize {
        let offset = u64::from(self.page - 1) * u64::from(self.limit);
        usize::try_from(offset).unwrap_or(usize::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT)
    }
}

/// Request to open an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountRequest {
    pub account_type: AccountType,
    pub initial_balance: Decimal,
}

impl CreateAccountRequest {
    pub fn parse(
        account_type: Option<&str>,
        initial_balance: Option<Decimal>,
    ) -> Result<Self, RequestError> {
        let mut errors = Vec::new();
        let account_type = match account_type.map(str::parse::<AccountType>) {
            None => AccountType::default(),
            Some(Ok(account_type)) => account_type,
            Some(Err(e)) => {
                errors.push(e);
                AccountType::default()
            }
        };
        let initial_balance = initial_balance.unwrap_or(Decimal::ZERO);
        if initial_balance < Decimal::ZERO {
            errors.push("initial balance must not be negative".to_string());
        }
        RequestError::from_errors(errors)?;
        Ok(Self {
            account_type,
            initial_balance,
        })
    }
}

impl Default for CreateAccountRequest {
    fn default() -> Self {
        Self {
            account_type: AccountType::default(),
            initial_balance: Decimal::ZERO,
        }
    }
}

fn check_amount(amount: Option<Decimal>, errors: &mut Vec<String>) -> Decimal {
    match amount {
        None => {
            errors.push("amount is required".to_string());
            Decimal::ZERO
        }
        Some(amount) => {
            if amount <= Decimal::ZERO {
                errors.push("amount must be positive".to_string());
            }
            amount
        }
    }
}

fn require<T>(value: Option<T>, message: &str, errors: &mut Vec<String>) -> Option<T> {
    if value.is_none() {
        errors.push(message.to_string());
    }
    value
}

fn non_empty(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

/// Deposit into one of the caller's accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl DepositRequest {
    pub fn parse(
        account_id: Option<AccountId>,
        amount: Option<Decimal>,
        description: Option<String>,
    ) -> Result<Self, RequestError> {
        let mut errors = Vec::new();
        let account_id = require(account_id, "account id is required", &mut errors);
        let amount = check_amount(amount, &mut errors);
        RequestError::from_errors(errors)?;
        let account_id = account_id.ok_or_else(|| RequestError {
            errors: vec!["account id is required".to_string()],
        })?;
        Ok(Self {
            account_id,
            amount,
            description: non_empty(description),
        })
    }
}

/// Withdrawal from one of the caller's accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl WithdrawalRequest {
    pub fn parse(
        account_id: Option<AccountId>,
        amount: Option<Decimal>,
        description: Option<String>,
    ) -> Result<Self, RequestError> {
        let DepositRequest {
            account_id,
            amount,
            description,
        } = DepositRequest::parse(account_id, amount, description)?;
        Ok(Self {
            account_id,
            amount,
            description,
        })
    }
}

/// Transfer from one of the caller's accounts to any account number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_number: AccountNumber,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl TransferRequest {
    pub fn parse(
        from_account_id: Option<AccountId>,
        to_account_number: Option<AccountNumber>,
        amount: Option<Decimal>,
        description: Option<String>,
    ) -> Result<Self, RequestError> {
        let mut errors = Vec::new();
        let from_account_id = require(
            from_account_id,
            "source account id is required",
            &mut errors,
        );
        let to_account_number = require(
            to_account_number.filter(|n| !n.as_str().is_empty()),
            "destination account number is required",
            &mut errors,
        );
        let amount = check_amount(amount, &mut errors);
        RequestError::from_errors(errors)?;
        match (from_account_id, to_account_number) {
            (Some(from_account_id), Some(to_account_number)) => Ok(Self {
                from_account_id,
                to_account_number,
                amount,
                description: non_empty(description),
            }),
            _ => Err(RequestError {
                errors: vec!["source and destination are required".to_string()],
            }),
        }
    }
}

/// Generic transaction payload naming its kind and the accounts on each side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub kind: Option<TransactionKind>,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

/// A fully validated ledger instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Deposit {
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
    Withdrawal {
        from: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
}

impl TransactionRequest {
    /// Check the payload, including which accounts each kind requires
    pub fn parse(self) -> Result<LedgerCommand, RequestError> {
        let mut errors = Vec::new();
        let amount = check_amount(self.amount, &mut errors);
        let description = non_empty(self.description);
        let kind = require(
            self.kind,
            "transaction type must be DEPOSIT, WITHDRAWAL or TRANSFER",
            &mut errors,
        );
        let command = match kind {
            Some(TransactionKind::Deposit) => match self.to_account_id {
                Some(to) => Some(LedgerCommand::Deposit {
                    to,
                    amount,
                    description,
                }),
                None => {
                    errors.push("to account id is required for a deposit".to_string());
                    None
                }
            },
            Some(TransactionKind::Withdrawal) => match self.from_account_id {
                Some(from) => Some(LedgerCommand::Withdrawal {
                    from,
                    amount,
                    description,
                }),
                None => {
                    errors.push("from account id is required for a withdrawal".to_string());
                    None
                }
            },
            Some(TransactionKind::Transfer) => match (self.from_account_id, self.to_account_id) {
                (Some(from), Some(to)) => Some(LedgerCommand::Transfer {
                    from,
                    to,
                    amount,
                    description,
                }),
                _ => {
                    errors.push(
                        "from and to account ids are required for a transfer".to_string(),
                    );
                    None
                }
            },
            None => None,
        };
        RequestError::from_errors(errors)?;
        command.ok_or_else(|| RequestError {
            errors: vec!["incomplete transaction request".to_string()],
        })
    }
}
