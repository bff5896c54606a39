use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bank_ledger::{
    Account, AccountId, AccountStore, AccountType, AccountsHandler, Amount, CreateAccountRequest,
    ErrorCategory, InMemoryStore, Ledger, LedgerError, NewTransaction, PageRequest,
    TransactionKind, TransactionQuery, TransactionStatus, UserId,
};

struct Bank {
    store: Arc<InMemoryStore>,
    accounts: AccountsHandler<InMemoryStore>,
    ledger: Ledger<InMemoryStore>,
    query: TransactionQuery<InMemoryStore>,
}

impl Bank {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            accounts: AccountsHandler::new(Arc::clone(&store)),
            ledger: Ledger::new(Arc::clone(&store)),
            query: TransactionQuery::new(Arc::clone(&store)),
            store,
        }
    }

    async fn open(&self, user: u64, balance: Decimal) -> Account {
        self.accounts
            .open_account(
                UserId(user),
                CreateAccountRequest {
                    account_type: AccountType::Checking,
                    initial_balance: balance,
                },
            )
            .await
            .unwrap()
    }

    async fn balance(&self, id: AccountId) -> Decimal {
        self.store.find_account(id).await.unwrap().unwrap().balance
    }

    async fn record_count(&self, user: u64) -> u64 {
        self.query
            .list_user_transactions(UserId(user), PageRequest::default())
            .await
            .unwrap()
            .pagination
            .total
    }
}

#[tokio::test]
async fn deposit_scenario() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(1000.00)).await;

    let record = bank
        .ledger
        .deposit(UserId(1), account.id, dec!(500.00), None)
        .await
        .unwrap();

    assert_eq!(bank.balance(account.id).await, dec!(1500.00));
    assert_eq!(record.kind, TransactionKind::Deposit);
    assert_eq!(record.status, TransactionStatus::Completed);
    assert_eq!(record.amount, dec!(500.00));
    assert_eq!(record.to_account, Some(account.id));
    assert_eq!(record.from_account, None);
    assert_eq!(bank.record_count(1).await, 1);
}

#[tokio::test]
async fn insufficient_withdrawal_scenario() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(100.00)).await;

    let err = bank
        .ledger
        .withdrawal(UserId(1), account.id, dec!(150.00), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(err.category(), ErrorCategory::StateConflict);
    assert_eq!(bank.balance(account.id).await, dec!(100.00));
    assert_eq!(bank.record_count(1).await, 0);
}

#[tokio::test]
async fn transfer_to_self_scenario() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(100.00)).await;

    let err = bank
        .ledger
        .transfer(UserId(1), account.id, &account.number, dec!(10.00), None)
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::SameAccountTransfer);
    assert_eq!(bank.balance(account.id).await, dec!(100.00));
    assert_eq!(bank.record_count(1).await, 0);
}

#[tokio::test]
async fn transfer_scenario_conserves_money() {
    let bank = Bank::new();
    let x = bank.open(1, dec!(1000.00)).await;
    let y = bank.open(2, dec!(500.00)).await;

    let record = bank
        .ledger
        .transfer(UserId(1), x.id, &y.number, dec!(250.00), Some("rent".into()))
        .await
        .unwrap();

    assert_eq!(bank.balance(x.id).await, dec!(750.00));
    assert_eq!(bank.balance(y.id).await, dec!(750.00));
    assert_eq!(record.kind, TransactionKind::Transfer);
    assert_eq!(record.status, TransactionStatus::Completed);
    assert_eq!(record.from_account, Some(x.id));
    assert_eq!(record.to_account, Some(y.id));
    assert_eq!(record.amount, dec!(250.00));
    assert_eq!(record.description.as_deref(), Some("rent"));
}

#[tokio::test]
async fn transfer_from_foreign_account_is_not_authorized() {
    let bank = Bank::new();
    let x = bank.open(1, dec!(100.00)).await;
    let y = bank.open(2, dec!(0)).await;

    let err = bank
        .ledger
        .transfer(UserId(2), x.id, &y.number, dec!(10.00), None)
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::NotAuthorized(x.id));
    assert_eq!(bank.balance(x.id).await, dec!(100.00));
    assert_eq!(bank.balance(y.id).await, dec!(0));
}

#[tokio::test]
async fn repeated_rejection_is_stable() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(100.00)).await;

    for _ in 0..2 {
        let err = bank
            .ledger
            .withdrawal(UserId(1), account.id, dec!(0), None)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount(dec!(0)));
        assert_eq!(bank.balance(account.id).await, dec!(100.00));
        assert_eq!(bank.record_count(1).await, 0);
    }
}

#[tokio::test]
async fn deactivated_account_rejects_mutations() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(100.00)).await;
    let other = bank.open(2, dec!(100.00)).await;
    bank.accounts.deactivate(UserId(1), account.id).await.unwrap();

    assert_eq!(
        bank.ledger
            .withdrawal(UserId(1), account.id, dec!(1), None)
            .await
            .unwrap_err(),
        LedgerError::AccountInactive(account.id)
    );
    assert_eq!(
        bank.ledger
            .transfer(UserId(2), other.id, &account.number, dec!(1), None)
            .await
            .unwrap_err(),
        LedgerError::AccountInactive(account.id)
    );
    assert_eq!(bank.balance(account.id).await, dec!(100.00));
    assert_eq!(bank.balance(other.id).await, dec!(100.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_never_double_spend() {
    const N: usize = 16;
    let bank = Arc::new(Bank::new());
    let amount = dec!(25.00);
    let account = bank.open(1, amount * Decimal::from(N - 1)).await;

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let ledger = bank.ledger.clone();
            let id = account.id;
            tokio::spawn(async move { ledger.withdrawal(UserId(1), id, amount, None).await })
        })
        .collect();

    let mut successes = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientFunds { .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, N - 1);
    assert_eq!(insufficient, 1);
    assert_eq!(bank.balance(account.id).await, dec!(0));
    assert_eq!(bank.record_count(1).await, (N - 1) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_do_not_deadlock() {
    let bank = Arc::new(Bank::new());
    let x = bank.open(1, dec!(1000)).await;
    let y = bank.open(2, dec!(1000)).await;

    let mut handles = Vec::new();
    for i in 0..50 {
        let ledger = bank.ledger.clone();
        let (user, from, to) = if i % 2 == 0 {
            (UserId(1), x.id, y.number.clone())
        } else {
            (UserId(2), y.id, x.number.clone())
        };
        handles.push(tokio::spawn(async move {
            ledger.transfer(user, from, &to, dec!(7), None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(bank.balance(x.id).await, dec!(1000));
    assert_eq!(bank.balance(y.id).await, dec!(1000));
}

#[tokio::test]
async fn completed_transaction_cannot_be_cancelled() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(0)).await;
    let record = bank
        .ledger
        .deposit(UserId(1), account.id, dec!(10), None)
        .await
        .unwrap();

    assert_eq!(
        bank.ledger
            .cancel_transaction(record.id, UserId(1))
            .await
            .unwrap_err(),
        LedgerError::InvalidState {
            id: record.id,
            status: TransactionStatus::Completed,
        }
    );
    let stored = bank.query.get_transaction(record.id, UserId(1)).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert_eq!(bank.balance(account.id).await, dec!(10));
}

#[tokio::test]
async fn pending_transaction_can_be_cancelled_once() {
    let bank = Bank::new();
    let account = bank.open(1, dec!(0)).await;
    let entry = NewTransaction::deposit(
        UserId(1),
        account.id,
        Amount::new(dec!(10)).unwrap(),
        None,
    )
    .with_status(TransactionStatus::Pending);
    let pending = bank.store.insert_transaction(entry).await.unwrap();

    let cancelled = bank
        .ledger
        .cancel_transaction(pending.id, UserId(1))
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(bank.balance(account.id).await, dec!(0));

    assert_eq!(
        bank.ledger
            .cancel_transaction(pending.id, UserId(1))
            .await
            .unwrap_err(),
        LedgerError::InvalidState {
            id: pending.id,
            status: TransactionStatus::Cancelled,
        }
    );
}

#[tokio::test]
async fn listings_are_paginated_newest_first() {
    let bank = Bank::new();
    let x = bank.open(1, dec!(0)).await;
    let y = bank.open(2, dec!(0)).await;
    for i in 1..=12 {
        bank.ledger
            .deposit(UserId(1), x.id, Decimal::from(i), None)
            .await
            .unwrap();
    }
    bank.ledger
        .transfer(UserId(1), x.id, &y.number, dec!(1), None)
        .await
        .unwrap();

    let first = bank
        .query
        .list_user_transactions(UserId(1), PageRequest::new(1, 5))
        .await
        .unwrap();
    assert_eq!(first.pagination.total, 13);
    assert_eq!(first.pagination.pages, 3);
    assert_eq!(first.data.len(), 5);
    assert_eq!(first.data[0].kind, TransactionKind::Transfer);
    assert!(first
        .data
        .windows(2)
        .all(|w| (w[0].created_at, w[0].id) > (w[1].created_at, w[1].id)));

    let last = bank
        .query
        .list_user_transactions(UserId(1), PageRequest::new(3, 5))
        .await
        .unwrap();
    assert_eq!(last.data.len(), 3);

    // the receiving side sees the transfer on its account listing
    let incoming = bank
        .query
        .list_account_transactions(UserId(2), y.id, PageRequest::new(1, 1000))
        .await
        .unwrap();
    assert_eq!(incoming.pagination.limit, 100);
    assert_eq!(incoming.data.len(), 1);
    assert_eq!(bank.record_count(2).await, 0);

    let ids: HashSet<_> = bank
        .query
        .list_account_transactions(UserId(1), x.id, PageRequest::new(1, 100))
        .await
        .unwrap()
        .data
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids.len(), 13);
}

#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, i64),
    Withdrawal(usize, i64),
    Transfer(usize, usize, i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 1..50_000i64).prop_map(|(a, c)| Op::Deposit(a, c)),
        (0..3usize, 1..50_000i64).prop_map(|(a, c)| Op::Withdrawal(a, c)),
        (0..3usize, 0..3usize, 1..50_000i64).prop_map(|(a, b, c)| Op::Transfer(a, b, c)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: any sequence of operations keeps every balance non-negative, and the
    /// total only moves by committed deposits and withdrawals.
    #[test]
    fn balances_stay_non_negative(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let bank = Bank::new();
            let mut accounts = Vec::new();
            for _ in 0..3 {
                accounts.push(bank.open(1, dec!(100.00)).await);
            }
            let mut expected_total = dec!(300.00);

            for op in ops {
                match op {
                    Op::Deposit(a, cents) => {
                        let amount = Decimal::new(cents, 2);
                        bank.ledger.deposit(UserId(1), accounts[a].id, amount, None).await.unwrap();
                        expected_total += amount;
                    }
                    Op::Withdrawal(a, cents) => {
                        let amount = Decimal::new(cents, 2);
                        let before = bank.balance(accounts[a].id).await;
                        match bank.ledger.withdrawal(UserId(1), accounts[a].id, amount, None).await {
                            Ok(_) => expected_total -= amount,
                            Err(LedgerError::InsufficientFunds { .. }) => {
                                prop_assert!(before < amount);
                                prop_assert_eq!(bank.balance(accounts[a].id).await, before);
                            }
                            Err(e) => prop_assert!(false, "unexpected error: {}", e),
                        }
                    }
                    Op::Transfer(a, b, cents) => {
                        let amount = Decimal::new(cents, 2);
                        let (from, to) = (&accounts[a], &accounts[b]);
                        let before = (bank.balance(from.id).await, bank.balance(to.id).await);
                        match bank.ledger.transfer(UserId(1), from.id, &to.number, amount, None).await {
                            Ok(_) => {
                                prop_assert_eq!(bank.balance(from.id).await, before.0 - amount);
                                prop_assert_eq!(bank.balance(to.id).await, before.1 + amount);
                            }
                            Err(LedgerError::SameAccountTransfer) => {
                                prop_assert_eq!(a, b);
                            }
                            Err(LedgerError::InsufficientFunds { .. }) => {
                                prop_assert!(before.0 < amount);
                            }
                            Err(e) => prop_assert!(false, "unexpected error: {}", e),
                        }
                    }
                }
                for account in &accounts {
                    prop_assert!(bank.balance(account.id).await >= Decimal::ZERO);
                }
            }

            let mut total = Decimal::ZERO;
            for account in &accounts {
                total += bank.balance(account.id).await;
            }
            prop_assert_eq!(total, expected_total);
            Ok(())
        })?;
    }
}
