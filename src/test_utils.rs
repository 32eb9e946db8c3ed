//! Shared test utilities for the ledger core.
//!
//! Accounts and budgets belong to collaborating layers, so these helpers insert them
//! directly instead of going through the ledger.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::{
    core::{ledger::NewTransaction, money::Money},
    entities::{Account, BudgetPeriodType, TransactionType, account, budget},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, DatabaseConnection, EntityTrait, Set};
use std::time::Duration;
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database served by a pool of several connections,
/// so concurrent tasks run their transactions on separate connections.
///
/// The returned `TempDir` owns the database file; keep it alive for the whole test.
pub async fn setup_shared_test_db(connections: u32) -> Result<(TempDir, DatabaseConnection)> {
    let dir = tempfile::tempdir().expect("temporary directory");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.sqlite").display());

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(connections)
        .min_connections(connections)
        .sqlx_logging(false)
        .map_sqlx_sqlite_opts(|opts| opts.busy_timeout(Duration::from_secs(30)));
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((dir, db))
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parses a literal amount, panicking on malformed test input.
pub fn money(amount: &str) -> Money {
    amount.parse().expect("valid test amount")
}

/// Creates an active account with an opening balance.
///
/// # Arguments
/// * `db` - Database connection
/// * `owner_id` - Owning user
/// * `name` - Account name
/// * `balance` - Opening balance, e.g. `"1000.00"`
pub async fn create_test_account(
    db: &DatabaseConnection,
    owner_id: &str,
    name: &str,
    balance: &str,
) -> Result<account::Model> {
    let now = Utc::now();
    let account = account::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        name: Set(name.to_string()),
        balance_minor: Set(money(balance).to_minor()?),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(account.insert(db).await?)
}

/// Overwrites an account balance the way the account-management layer does.
pub async fn set_account_balance(
    db: &DatabaseConnection,
    account_id: i64,
    balance: Money,
) -> Result<account::Model> {
    let model = Account::find_by_id(account_id).one(db).await?.expect("account exists");
    let mut active: account::ActiveModel = model.into();
    active.balance_minor = Set(balance.to_minor()?);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Marks an account inactive.
pub async fn deactivate_account(db: &DatabaseConnection, account_id: i64) -> Result<()> {
    let model = Account::find_by_id(account_id).one(db).await?.expect("account exists");
    let mut active: account::ActiveModel = model.into();
    active.is_active = Set(false);
    active.update(db).await?;
    Ok(())
}

/// Builds a posting request with category 1 and a fixed description.
pub fn new_transaction(
    account_id: i64,
    transaction_type: TransactionType,
    amount: &str,
    date: DateTime<Utc>,
) -> NewTransaction {
    new_categorized(account_id, 1, transaction_type, amount, date)
}

/// Builds a posting request for a specific category.
pub fn new_categorized(
    account_id: i64,
    category_id: i64,
    transaction_type: TransactionType,
    amount: &str,
    date: DateTime<Utc>,
) -> NewTransaction {
    NewTransaction {
        account_id,
        category_id,
        transaction_type,
        amount: money(amount),
        date,
        description: "Test transaction".to_string(),
        notes: None,
    }
}

/// Creates a budget with an explicit stored period.
pub async fn create_test_budget(
    db: &DatabaseConnection,
    owner_id: &str,
    category_id: i64,
    limit: &str,
    period_type: BudgetPeriodType,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<budget::Model> {
    let budget = budget::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        category_id: Set(category_id),
        amount_minor: Set(money(limit).to_minor()?),
        period_type: Set(period_type),
        start_date: Set(start_date),
        end_date: Set(end_date),
        ..Default::default()
    };
    Ok(budget.insert(db).await?)
}
