//! Ledger store - Posts transactions against accounts while keeping balances consistent.
//!
//! Every mutation runs inside one database transaction: the transaction row write and
//! the account balance adjustment either both commit or both roll back. The balance is
//! never read, modified in Rust and written back; it is adjusted with a single
//! `UPDATE accounts SET balance_minor = balance_minor + ?` statement, so concurrent
//! postings against the same account cannot lose each other's updates.
//!
//! An account's balance satisfies
//! `balance == balance at creation + direct edits + Σ effect(tx)` for every
//! transaction currently posted to it. Because direct edits exist, each posting is an
//! incremental adjustment and the balance is never recomputed from zero.
//!
//! The first statement of every mutation is an ownership-checked write. `SQLite`
//! cannot upgrade a deferred read transaction to a write while another connection
//! is writing, so a mutation that read first would fail with `SQLITE_BUSY` instead
//! of waiting out the busy timeout.

use crate::{
    config::engine::{EngineConfig, TransferPolicy},
    core::money::Money,
    entities::{Account, Transaction, TransactionType, account, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, error, info, instrument};

/// Input for [`post_transaction`]. The owner always comes from the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_id: i64,
    pub category_id: i64,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub description: String,
    pub notes: Option<String>,
}

/// Partial edit for [`update_transaction`]; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub account_id: Option<i64>,
    pub category_id: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<Money>,
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
}

/// The signed delta a transaction applies to its account's balance.
///
/// This is the only place the direction of a transaction type is decided.
/// `Transfer` carries no effect on either side.
#[must_use]
pub fn effect(transaction_type: TransactionType, amount: Money) -> Money {
    match transaction_type {
        TransactionType::Income => amount,
        TransactionType::Expense => -amount,
        TransactionType::Transfer => Money::ZERO,
    }
}

/// The additive inverse of [`effect`].
#[must_use]
pub fn revert_effect(transaction_type: TransactionType, amount: Money) -> Money {
    -effect(transaction_type, amount)
}

fn validate_posting(
    config: &EngineConfig,
    transaction_type: TransactionType,
    amount: Money,
) -> Result<()> {
    if amount.is_negative() {
        return Err(Error::invalid(format!(
            "transaction amount must not be negative (got {amount})"
        )));
    }
    if transaction_type == TransactionType::Transfer
        && config.transfer_policy == TransferPolicy::Reject
    {
        return Err(Error::invalid(
            "transfer transactions are not accepted by the current transfer policy",
        ));
    }
    Ok(())
}

async fn find_owned_account<C>(conn: &C, owner_id: &str, account_id: i64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    Account::find_by_id(account_id)
        .filter(account::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("account", account_id))
}

/// Applies `delta` to an account only if the caller owns it and it is active.
///
/// The update runs even for a zero delta so that it always takes the write lock.
/// When no row matches, the account is looked up to report why.
async fn apply_owned_delta<C>(
    conn: &C,
    owner_id: &str,
    account_id: i64,
    delta: Money,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let delta_minor = delta.to_minor()?;
    let result = Account::update_many()
        .col_expr(
            account::Column::BalanceMinor,
            Expr::col(account::Column::BalanceMinor).add(delta_minor),
        )
        .col_expr(account::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::OwnerId.eq(owner_id))
        .filter(account::Column::IsActive.eq(true))
        .exec(conn)
        .await?;

    match result.rows_affected {
        1 => {
            debug!(account_id, delta = %delta, "Applied balance delta");
            Ok(())
        }
        0 => {
            let account = find_owned_account(conn, owner_id, account_id).await?;
            if account.is_active {
                return Err(Error::ConsistencyFailure {
                    account_id,
                    reason: "owned active account was not updated".to_string(),
                });
            }
            Err(Error::Forbidden {
                reason: format!("account {account_id} is inactive"),
            })
        }
        rows => {
            error!(account_id, rows, "Balance adjustment touched more than one account");
            Err(Error::ConsistencyFailure {
                account_id,
                reason: format!("balance update touched {rows} rows instead of 1"),
            })
        }
    }
}

/// Takes the write lock through the caller's transaction row, failing with
/// `NotFound` when the row does not exist or belongs to someone else.
async fn claim_owned_transaction<C>(conn: &C, owner_id: &str, transaction_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Transaction::update_many()
        .col_expr(transaction::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("transaction", transaction_id));
    }
    Ok(())
}

async fn find_owned_transaction<C>(
    conn: &C,
    owner_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("transaction", transaction_id))
}

/// Atomically adds `delta` to an account's stored balance.
///
/// Issues a single `UPDATE accounts SET balance_minor = balance_minor + delta`
/// statement, so no separate read step exists for a concurrent writer to slip into.
/// Must be called with the same database transaction as the row write it belongs to.
///
/// # Errors
/// `ConsistencyFailure` if the statement does not touch exactly one account row.
pub async fn apply_balance_delta<C>(conn: &C, account_id: i64, delta: Money) -> Result<()>
where
    C: ConnectionTrait,
{
    if delta.is_zero() {
        return Ok(());
    }
    let delta_minor = delta.to_minor()?;

    let result = Account::update_many()
        .col_expr(
            account::Column::BalanceMinor,
            Expr::col(account::Column::BalanceMinor).add(delta_minor),
        )
        .col_expr(account::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(account::Column::Id.eq(account_id))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        error!(
            account_id,
            rows = result.rows_affected,
            "Balance adjustment did not apply to exactly one account"
        );
        return Err(Error::ConsistencyFailure {
            account_id,
            reason: format!(
                "balance update touched {} rows instead of 1",
                result.rows_affected
            ),
        });
    }

    debug!(account_id, delta = %delta, "Applied balance delta");
    Ok(())
}

async fn commit(txn: DatabaseTransaction, account_id: i64) -> Result<()> {
    txn.commit().await.map_err(|e| {
        error!(account_id, "Commit of ledger mutation failed: {}", e);
        Error::ConsistencyFailure {
            account_id,
            reason: format!("commit failed: {e}"),
        }
    })
}

/// Records a transaction and applies its effect to the target account in one unit.
///
/// # Errors
/// - `InvalidInput` for a negative amount or a transfer refused by the transfer policy
/// - `NotFound` if the account does not exist or belongs to someone else
/// - `Forbidden` if the account is inactive
/// - `ConsistencyFailure` if the balance adjustment or commit fails (nothing is kept)
#[instrument(skip(db, config, new), fields(account_id = new.account_id))]
pub async fn post_transaction(
    db: &DatabaseConnection,
    config: &EngineConfig,
    owner_id: &str,
    new: NewTransaction,
) -> Result<transaction::Model> {
    validate_posting(config, new.transaction_type, new.amount)?;
    let amount_minor = new.amount.to_minor()?;

    let txn = db.begin().await?;

    apply_owned_delta(
        &txn,
        owner_id,
        new.account_id,
        effect(new.transaction_type, new.amount),
    )
    .await?;

    let now = Utc::now();
    let transaction_model = transaction::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        account_id: Set(new.account_id),
        category_id: Set(new.category_id),
        transaction_type: Set(new.transaction_type),
        amount_minor: Set(amount_minor),
        date: Set(new.date),
        description: Set(new.description),
        notes: Set(new.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let posted = transaction_model.insert(&txn).await?;

    commit(txn, posted.account_id).await?;

    info!(
        transaction_id = posted.id,
        "Posted {:?} of {}",
        posted.transaction_type,
        posted.amount()
    );
    Ok(posted)
}

/// Edits a transaction so the final balances equal those of posting the patched
/// transaction directly: the old effect is reverted on the old account and the new
/// effect applied to the (possibly different) new account.
///
/// # Errors
/// Same conditions as [`post_transaction`], plus `NotFound` for an unknown or
/// foreign transaction id.
#[instrument(skip(db, config, patch))]
pub async fn update_transaction(
    db: &DatabaseConnection,
    config: &EngineConfig,
    owner_id: &str,
    transaction_id: i64,
    patch: TransactionPatch,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    claim_owned_transaction(&txn, owner_id, transaction_id).await?;
    let old = find_owned_transaction(&txn, owner_id, transaction_id).await?;

    let new_account_id = patch.account_id.unwrap_or(old.account_id);
    let new_type = patch.transaction_type.unwrap_or(old.transaction_type);
    let new_amount = patch.amount.unwrap_or_else(|| old.amount());
    validate_posting(config, new_type, new_amount)?;
    let new_amount_minor = new_amount.to_minor()?;

    apply_balance_delta(
        &txn,
        old.account_id,
        revert_effect(old.transaction_type, old.amount()),
    )
    .await?;
    if new_account_id == old.account_id {
        apply_balance_delta(&txn, new_account_id, effect(new_type, new_amount)).await?;
    } else {
        apply_owned_delta(&txn, owner_id, new_account_id, effect(new_type, new_amount)).await?;
    }

    let mut active_model: transaction::ActiveModel = old.clone().into();
    active_model.account_id = Set(new_account_id);
    active_model.transaction_type = Set(new_type);
    active_model.amount_minor = Set(new_amount_minor);
    if let Some(category_id) = patch.category_id {
        active_model.category_id = Set(category_id);
    }
    if let Some(date) = patch.date {
        active_model.date = Set(date);
    }
    if let Some(description) = patch.description {
        active_model.description = Set(description);
    }
    if let Some(notes) = patch.notes {
        active_model.notes = Set(notes);
    }
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(&txn).await?;

    commit(txn, new_account_id).await?;

    info!(
        transaction_id,
        old_account = old.account_id,
        new_account = new_account_id,
        "Updated transaction"
    );
    Ok(updated)
}

/// Reverts a transaction's effect and removes it, as one unit.
///
/// # Errors
/// `NotFound` for an unknown or foreign transaction id, `ConsistencyFailure` if the
/// reversal cannot be applied.
#[instrument(skip(db))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    owner_id: &str,
    transaction_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;

    claim_owned_transaction(&txn, owner_id, transaction_id).await?;
    let transaction = find_owned_transaction(&txn, owner_id, transaction_id).await?;
    let account_id = transaction.account_id;
    let reversal = revert_effect(transaction.transaction_type, transaction.amount());

    transaction.delete(&txn).await?;
    apply_balance_delta(&txn, account_id, reversal).await?;

    commit(txn, account_id).await?;

    info!(transaction_id, account_id, "Deleted transaction");
    Ok(())
}

/// Fetches an account owned by the caller.
///
/// # Errors
/// `NotFound` if the account does not exist or belongs to someone else.
pub async fn get_account_by_id(
    db: &DatabaseConnection,
    owner_id: &str,
    account_id: i64,
) -> Result<account::Model> {
    find_owned_account(db, owner_id, account_id).await
}

/// Fetches a transaction owned by the caller.
///
/// # Errors
/// `NotFound` if the transaction does not exist or belongs to someone else.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    owner_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model> {
    find_owned_transaction(db, owner_id, transaction_id).await
}

/// Active accounts of an owner, ordered by name.
pub async fn get_accounts_for_owner(
    db: &DatabaseConnection,
    owner_id: &str,
) -> Result<Vec<account::Model>> {
    Account::find()
        .filter(account::Column::OwnerId.eq(owner_id))
        .filter(account::Column::IsActive.eq(true))
        .order_by_asc(account::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All transactions posted to one of the caller's accounts, newest first.
pub async fn get_transactions_for_account(
    db: &DatabaseConnection,
    owner_id: &str,
    account_id: i64,
) -> Result<Vec<transaction::Model>> {
    find_owned_account(db, owner_id, account_id).await?;
    Transaction::find()
        .filter(transaction::Column::AccountId.eq(account_id))
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
