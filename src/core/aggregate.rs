//! Aggregation engine - Every numeric view of the dashboard, derived on read.
//!
//! Each query reads through a single database transaction so all of its reads see
//! the same snapshot of the owner's transactions. Transfers are neither income nor
//! expense in any aggregate.

use crate::{
    config::engine::{BudgetPeriodSource, EngineConfig},
    core::{
        money::{Money, round_percent},
        period::{
            Bucket, DateRange, Granularity, Period, bucket_key, enumerate_buckets,
            previous_comparable, resolve, shift_months,
        },
    },
    entities::{Account, Budget, BudgetPeriodType, Transaction, TransactionType, account, budget, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

/// Income, expense and savings for one period, compared with the period before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub income: Money,
    pub expense: Money,
    pub net_savings: Money,
    /// Percent of income kept, two decimals
    pub savings_rate: Decimal,
    /// Savings rate minus the previous period's savings rate, in percentage points
    pub trend_vs_previous_period: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdownEntry {
    pub category_id: i64,
    pub amount: Money,
    /// Share of total expense, rounded to a whole percent
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub bucket_key: String,
    pub label: String,
    pub income: Money,
    pub expense: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceHistoryPoint {
    pub bucket_key: String,
    pub label: String,
    /// Reconstructed total balance at the end of this bucket
    pub balance: Money,
    pub income: Money,
    pub expense: Money,
}

/// Health of a budget in its active period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Exceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatusEntry {
    pub budget: budget::Model,
    pub spent: Money,
    pub limit: Money,
    /// Limit minus spent; negative once the budget is overrun
    pub remaining: Money,
    /// Spent as a percent of the limit, two decimals (0 for a zero limit)
    pub percentage: Decimal,
    pub status: BudgetStatus,
}

async fn transactions_in_range<C>(
    conn: &C,
    owner_id: &str,
    range: DateRange,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::Date.gte(range.start))
        .filter(transaction::Column::Date.lt(range.end))
        .order_by_asc(transaction::Column::Date)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// (income, expense) over a set of transactions.
fn totals<'a, I>(transactions: I) -> (Money, Money)
where
    I: IntoIterator<Item = &'a transaction::Model>,
{
    transactions
        .into_iter()
        .fold((Money::ZERO, Money::ZERO), |(income, expense), tx| {
            match tx.transaction_type {
                TransactionType::Income => (income + tx.amount(), expense),
                TransactionType::Expense => (income, expense + tx.amount()),
                TransactionType::Transfer => (income, expense),
            }
        })
}

fn savings_rate(income: Money, expense: Money) -> Decimal {
    if income > Money::ZERO {
        (income - expense).percent_of(income)
    } else {
        Decimal::ZERO
    }
}

/// Income and expense for an owner over an arbitrary range.
pub async fn range_totals<C>(conn: &C, owner_id: &str, range: DateRange) -> Result<(Money, Money)>
where
    C: ConnectionTrait,
{
    let transactions = transactions_in_range(conn, owner_id, range).await?;
    Ok(totals(&transactions))
}

/// Summarizes a period and compares its savings rate with the previous comparable one.
#[instrument(skip(db))]
pub async fn summary(
    db: &DatabaseConnection,
    owner_id: &str,
    period: Period,
    now: DateTime<Utc>,
) -> Result<PeriodSummary> {
    let range = resolve(period, now)?;
    let previous = previous_comparable(range, period)?;

    let txn = db.begin().await?;
    let current = transactions_in_range(&txn, owner_id, range).await?;
    let prior = transactions_in_range(&txn, owner_id, previous).await?;
    txn.commit().await?;

    let (income, expense) = totals(&current);
    let (prior_income, prior_expense) = totals(&prior);
    let rate = savings_rate(income, expense);
    let prior_rate = savings_rate(prior_income, prior_expense);

    debug!(
        transactions = current.len(),
        previous_transactions = prior.len(),
        "Computed period summary"
    );

    Ok(PeriodSummary {
        income,
        expense,
        net_savings: income - expense,
        savings_rate: round_percent(rate, 2),
        trend_vs_previous_period: round_percent(rate - prior_rate, 2),
    })
}

/// Expense per category in the period, largest first.
///
/// Ties are ordered by category id so the output is deterministic.
#[instrument(skip(db))]
pub async fn spending_by_category(
    db: &DatabaseConnection,
    owner_id: &str,
    period: Period,
    now: DateTime<Utc>,
) -> Result<Vec<CategoryBreakdownEntry>> {
    let range = resolve(period, now)?;
    let txn = db.begin().await?;
    let transactions = transactions_in_range(&txn, owner_id, range).await?;
    txn.commit().await?;

    let mut per_category: BTreeMap<i64, Money> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|tx| tx.transaction_type == TransactionType::Expense)
    {
        *per_category.entry(tx.category_id).or_default() += tx.amount();
    }
    let total: Money = per_category.values().copied().sum();

    let mut entries: Vec<CategoryBreakdownEntry> = per_category
        .into_iter()
        .map(|(category_id, amount)| CategoryBreakdownEntry {
            category_id,
            amount,
            percentage: round_percent(amount.percent_of(total), 0)
                .to_u32()
                .unwrap_or(0),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    Ok(entries)
}

/// Zero-filled (bucket, income, expense) series covering `range`.
fn bucket_totals(
    range: DateRange,
    granularity: Granularity,
    transactions: &[transaction::Model],
) -> Vec<(Bucket, Money, Money)> {
    let mut per_key: HashMap<String, (Money, Money)> = HashMap::new();
    for tx in transactions {
        let (income, expense) = totals(std::iter::once(tx));
        let slot = per_key
            .entry(bucket_key(tx.date, granularity))
            .or_insert((Money::ZERO, Money::ZERO));
        slot.0 += income;
        slot.1 += expense;
    }

    enumerate_buckets(range, granularity)
        .into_iter()
        .map(|bucket| {
            let (income, expense) = per_key
                .get(&bucket.key)
                .copied()
                .unwrap_or((Money::ZERO, Money::ZERO));
            (bucket, income, expense)
        })
        .collect()
}

/// Income and expense per bucket, oldest first, with empty buckets present.
#[instrument(skip(db))]
pub async fn trends(
    db: &DatabaseConnection,
    owner_id: &str,
    period: Period,
    now: DateTime<Utc>,
) -> Result<Vec<TrendPoint>> {
    let range = resolve(period, now)?;
    let txn = db.begin().await?;
    let transactions = transactions_in_range(&txn, owner_id, range).await?;
    txn.commit().await?;

    Ok(
        bucket_totals(range, Granularity::for_period(period), &transactions)
            .into_iter()
            .map(|(bucket, income, expense)| TrendPoint {
                bucket_key: bucket.key,
                label: bucket.label,
                income,
                expense,
            })
            .collect(),
    )
}

/// Reconstructed total balance per bucket, oldest first.
///
/// Starts from the current total balance of the owner's active accounts and walks
/// backwards, subtracting each bucket's `income - expense`. This is a point-in-time
/// approximation, not a historical snapshot: direct balance edits and transactions
/// outside the window are not reflected in the reconstructed past. The last point
/// always equals the current total balance.
#[instrument(skip(db))]
pub async fn balance_history(
    db: &DatabaseConnection,
    owner_id: &str,
    period: Period,
    now: DateTime<Utc>,
) -> Result<Vec<BalanceHistoryPoint>> {
    let range = resolve(period, now)?;

    let txn = db.begin().await?;
    let accounts = Account::find()
        .filter(account::Column::OwnerId.eq(owner_id))
        .filter(account::Column::IsActive.eq(true))
        .all(&txn)
        .await?;
    let transactions = transactions_in_range(&txn, owner_id, range).await?;
    txn.commit().await?;

    let current_total: Money = accounts.iter().map(account::Model::balance).sum();
    let tracked: Vec<transaction::Model> = transactions
        .into_iter()
        .filter(|tx| accounts.iter().any(|a| a.id == tx.account_id))
        .collect();

    let series = bucket_totals(range, Granularity::for_period(period), &tracked);
    let mut running = current_total;
    let mut points = Vec::with_capacity(series.len());
    for (bucket, income, expense) in series.into_iter().rev() {
        points.push(BalanceHistoryPoint {
            bucket_key: bucket.key,
            label: bucket.label,
            balance: running,
            income,
            expense,
        });
        running -= income - expense;
    }
    points.reverse();
    Ok(points)
}

/// The range a budget is measured against.
pub fn active_budget_range(
    budget: &budget::Model,
    source: BudgetPeriodSource,
    today: NaiveDate,
) -> Result<DateRange> {
    match source {
        BudgetPeriodSource::Recomputed => match budget.period_type {
            BudgetPeriodType::Monthly => DateRange::calendar_month(today),
            BudgetPeriodType::Yearly => DateRange::calendar_year(today.year()),
        },
        BudgetPeriodSource::Stored => {
            if let Some(end) = budget.end_date {
                return DateRange::from_dates(budget.start_date, end);
            }
            let months = match budget.period_type {
                BudgetPeriodType::Monthly => 1,
                BudgetPeriodType::Yearly => 12,
            };
            let last = budget
                .start_date
                .checked_add_months(Months::new(months))
                .and_then(|d| d.pred_opt())
                .ok_or_else(|| {
                    Error::invalid(format!("budget {} has an out-of-range start date", budget.id))
                })?;
            DateRange::from_dates(budget.start_date, last)
        }
    }
}

/// `exceeded` from 100%, `warning` from `warning_percent`, otherwise `ok`.
///
/// Compared against the unrounded percentage.
#[must_use]
pub fn classify_budget(percentage: Decimal, warning_percent: Decimal) -> BudgetStatus {
    if percentage >= Decimal::ONE_HUNDRED {
        BudgetStatus::Exceeded
    } else if percentage >= warning_percent {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Ok
    }
}

/// Spent, remaining and status for each of the owner's budgets, in creation order.
#[instrument(skip(db, config))]
pub async fn budget_status(
    db: &DatabaseConnection,
    config: &EngineConfig,
    owner_id: &str,
    today: NaiveDate,
) -> Result<Vec<BudgetStatusEntry>> {
    let txn = db.begin().await?;
    let entries = budget_status_in(&txn, config, owner_id, today).await?;
    txn.commit().await?;
    Ok(entries)
}

/// [`budget_status`] evaluated on a caller-supplied connection or transaction.
pub(crate) async fn budget_status_in<C>(
    conn: &C,
    config: &EngineConfig,
    owner_id: &str,
    today: NaiveDate,
) -> Result<Vec<BudgetStatusEntry>>
where
    C: ConnectionTrait,
{
    let budgets = Budget::find()
        .filter(budget::Column::OwnerId.eq(owner_id))
        .order_by_asc(budget::Column::Id)
        .all(conn)
        .await?;

    let mut entries = Vec::with_capacity(budgets.len());
    for budget in budgets {
        let range = active_budget_range(&budget, config.budget_period_source, today)?;
        let spent: Money = Transaction::find()
            .filter(transaction::Column::OwnerId.eq(owner_id))
            .filter(transaction::Column::CategoryId.eq(budget.category_id))
            .filter(transaction::Column::TransactionType.eq(TransactionType::Expense))
            .filter(transaction::Column::Date.gte(range.start))
            .filter(transaction::Column::Date.lt(range.end))
            .all(conn)
            .await?
            .iter()
            .map(transaction::Model::amount)
            .sum();

        let limit = budget.limit();
        let percentage = spent.percent_of(limit);
        let status = classify_budget(percentage, config.budget_warning_percent);
        debug!(budget_id = budget.id, spent = %spent, limit = %limit, ?status, "Budget evaluated");

        entries.push(BudgetStatusEntry {
            budget,
            spent,
            limit,
            remaining: limit - spent,
            percentage: round_percent(percentage, 2),
            status,
        });
    }
    Ok(entries)
}

/// The calendar month before the one containing `today`.
pub fn previous_month_range(today: NaiveDate) -> Result<DateRange> {
    let this_month = DateRange::calendar_month(today)?;
    Ok(DateRange {
        start: shift_months(this_month.start, -1)?,
        end: this_month.start,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        config::engine::EngineConfig,
        core::ledger::post_transaction,
        test_utils::*,
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const OWNER: &str = "owner_1";

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn post(
        db: &DatabaseConnection,
        account_id: i64,
        category_id: i64,
        kind: TransactionType,
        amount: &str,
        when: DateTime<Utc>,
    ) -> Result<transaction::Model> {
        post_transaction(
            db,
            &EngineConfig::default(),
            OWNER,
            new_categorized(account_id, category_id, kind, amount, when),
        )
        .await
    }

    #[tokio::test]
    async fn test_summary_with_previous_period() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, OWNER, "Checking", "0.00").await?;
        let now = at(2024, 6, 15);

        post(&db, account.id, 1, TransactionType::Income, "2000.00", at(2024, 6, 1)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "500.00", at(2024, 6, 5)).await?;
        post(&db, account.id, 2, TransactionType::Transfer, "999.00", at(2024, 6, 6)).await?;
        // May: 50% savings
        post(&db, account.id, 1, TransactionType::Income, "1000.00", at(2024, 5, 2)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "500.00", at(2024, 5, 31)).await?;
        // Another owner's activity never leaks in
        let other = create_test_account(&db, "owner_2", "Other", "0.00").await?;
        post_transaction(
            &db,
            &EngineConfig::default(),
            "owner_2",
            new_transaction(other.id, TransactionType::Income, "10.00", at(2024, 6, 2)),
        )
        .await?;

        let summary = summary(&db, OWNER, Period::Month, now).await?;
        assert_eq!(summary.income, money("2000.00"));
        assert_eq!(summary.expense, money("500.00"));
        assert_eq!(summary.net_savings, money("1500.00"));
        assert_eq!(summary.savings_rate, dec!(75));
        assert_eq!(summary.trend_vs_previous_period, dec!(25));
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_without_income() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, OWNER, "Checking", "0.00").await?;
        post(&db, account.id, 2, TransactionType::Expense, "40.00", at(2024, 6, 3)).await?;

        let summary = summary(&db, OWNER, Period::Month, at(2024, 6, 15)).await?;
        assert_eq!(summary.savings_rate, Decimal::ZERO);
        assert_eq!(summary.trend_vs_previous_period, Decimal::ZERO);
        assert_eq!(summary.net_savings, money("-40.00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_savings_rate_is_rounded_to_two_places() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, OWNER, "Checking", "0.00").await?;
        post(&db, account.id, 1, TransactionType::Income, "3.00", at(2024, 6, 3)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "1.00", at(2024, 6, 4)).await?;

        let summary = summary(&db, OWNER, Period::Month, at(2024, 6, 15)).await?;
        assert_eq!(summary.savings_rate, dec!(66.67));
        Ok(())
    }

    #[tokio::test]
    async fn test_spending_by_category() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, OWNER, "Checking", "0.00").await?;
        let now = at(2024, 6, 15);

        post(&db, account.id, 10, TransactionType::Expense, "10.00", at(2024, 6, 2)).await?;
        post(&db, account.id, 20, TransactionType::Expense, "10.00", at(2024, 6, 3)).await?;
        post(&db, account.id, 30, TransactionType::Expense, "5.00", at(2024, 6, 4)).await?;
        post(&db, account.id, 30, TransactionType::Expense, "5.00", at(2024, 6, 5)).await?;
        post(&db, account.id, 40, TransactionType::Income, "90.00", at(2024, 6, 6)).await?;

        let breakdown = spending_by_category(&db, OWNER, Period::Month, now).await?;
        let ids: Vec<i64> = breakdown.iter().map(|e| e.category_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        let shares: Vec<u32> = breakdown.iter().map(|e| e.percentage).collect();
        assert_eq!(shares, vec![33, 33, 33]);

        let total: u32 = shares.iter().sum();
        assert!((98..=102).contains(&total));
        Ok(())
    }

    #[tokio::test]
    async fn test_spending_by_category_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let breakdown = spending_by_category(&db, OWNER, Period::Year, at(2024, 6, 15)).await?;
        assert!(breakdown.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_year_trends_zero_filled() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, OWNER, "Checking", "0.00").await?;
        let now = at(2024, 6, 15);
        post(&db, account.id, 1, TransactionType::Income, "100.00", at(2024, 2, 29)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "25.50", at(2024, 6, 1)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "4.50", at(2024, 6, 14)).await?;

        let points = trends(&db, OWNER, Period::Year, now).await?;
        let range = resolve(Period::Year, now)?;
        assert_eq!(points.len(), enumerate_buckets(range, Granularity::Month).len());
        assert_eq!(points.len(), 12);
        assert_eq!(points[0].bucket_key, "2024-01");
        assert_eq!(points[11].bucket_key, "2024-12");

        assert_eq!(points[1].income, money("100.00"));
        assert_eq!(points[5].expense, money("30.00"));
        assert_eq!(points[0].income, Money::ZERO);
        assert_eq!(points[11].expense, Money::ZERO);

        let keys: Vec<&str> = points.iter().map(|p| p.bucket_key.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);

        // Nothing dropped
        let expense: Money = points.iter().map(|p| p.expense).sum();
        let income: Money = points.iter().map(|p| p.income).sum();
        assert_eq!((income, expense), (money("100.00"), money("30.00")));
        Ok(())
    }

    #[tokio::test]
    async fn test_month_trends_use_iso_weeks() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, OWNER, "Checking", "0.00").await?;
        post(&db, account.id, 2, TransactionType::Expense, "12.00", at(2024, 6, 1)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "8.00", at(2024, 6, 30)).await?;

        let points = trends(&db, OWNER, Period::Month, at(2024, 6, 15)).await?;
        let keys: Vec<&str> = points.iter().map(|p| p.bucket_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-W22", "2024-W23", "2024-W24", "2024-W25", "2024-W26"]);
        assert_eq!(points[0].expense, money("12.00"));
        assert_eq!(points[4].expense, money("8.00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_balance_history_walks_backwards() -> Result<()> {
        let db = setup_test_db().await?;
        let checking = create_test_account(&db, OWNER, "Checking", "100.00").await?;
        let savings = create_test_account(&db, OWNER, "Savings", "400.00").await?;
        let now = at(2024, 6, 15);

        post(&db, checking.id, 1, TransactionType::Income, "300.00", at(2024, 3, 10)).await?;
        post(&db, savings.id, 2, TransactionType::Expense, "50.00", at(2024, 5, 10)).await?;
        // Current total: 100 + 300 + 400 - 50 = 750

        let points = balance_history(&db, OWNER, Period::Year, now).await?;
        assert_eq!(points.len(), 12);
        assert_eq!(points[11].balance, money("750.00"));
        assert_eq!(points[4].balance, money("750.00"));
        assert_eq!(points[3].balance, money("800.00"));
        assert_eq!(points[2].balance, money("800.00"));
        assert_eq!(points[1].balance, money("500.00"));
        assert_eq!(points[0].balance, money("500.00"));
        assert_eq!(points[2].income, money("300.00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_balance_history_ignores_inactive_accounts() -> Result<()> {
        let db = setup_test_db().await?;
        let active = create_test_account(&db, OWNER, "Checking", "10.00").await?;
        let closed = create_test_account(&db, OWNER, "Closed", "1000.00").await?;
        post(&db, closed.id, 1, TransactionType::Income, "5.00", at(2024, 6, 12)).await?;
        deactivate_account(&db, closed.id).await?;

        let points = balance_history(&db, OWNER, Period::Week, at(2024, 6, 15)).await?;
        assert_eq!(points.len(), 8);
        assert!(points.iter().all(|p| p.balance == active.balance()));
        assert!(points.iter().all(|p| p.income == Money::ZERO));
        Ok(())
    }

    #[test]
    fn test_classify_budget_thresholds() {
        let warn = dec!(90);
        let cases = [
            (dec!(0), BudgetStatus::Ok),
            (dec!(89.99), BudgetStatus::Ok),
            (dec!(90), BudgetStatus::Warning),
            (dec!(99.999), BudgetStatus::Warning),
            (dec!(100), BudgetStatus::Exceeded),
            (dec!(250), BudgetStatus::Exceeded),
        ];
        for (percentage, expected) in cases {
            assert_eq!(classify_budget(percentage, warn), expected, "at {percentage}");
        }
    }

    #[tokio::test]
    async fn test_budget_status_warning_at_ninety_five_percent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = EngineConfig::default();
        let account = create_test_account(&db, OWNER, "Checking", "1000.00").await?;
        create_test_budget(
            &db,
            OWNER,
            7,
            "500.00",
            BudgetPeriodType::Monthly,
            date(2024, 1, 1),
            Some(date(2024, 1, 31)),
        )
        .await?;

        post(&db, account.id, 7, TransactionType::Expense, "400.00", at(2024, 6, 3)).await?;
        post(&db, account.id, 7, TransactionType::Expense, "75.00", at(2024, 6, 14)).await?;
        // Outside the active month, another category, and income do not count
        post(&db, account.id, 7, TransactionType::Expense, "60.00", at(2024, 5, 31)).await?;
        post(&db, account.id, 8, TransactionType::Expense, "60.00", at(2024, 6, 5)).await?;
        post(&db, account.id, 7, TransactionType::Income, "60.00", at(2024, 6, 5)).await?;

        let statuses = budget_status(&db, &config, OWNER, date(2024, 6, 15)).await?;
        assert_eq!(statuses.len(), 1);
        let entry = &statuses[0];
        assert_eq!(entry.spent, money("475.00"));
        assert_eq!(entry.limit, money("500.00"));
        assert_eq!(entry.remaining, money("25.00"));
        assert_eq!(entry.percentage, dec!(95));
        assert_eq!(entry.status, BudgetStatus::Warning);
        Ok(())
    }

    #[tokio::test]
    async fn test_budget_status_exceeded_and_zero_limit() -> Result<()> {
        let db = setup_test_db().await?;
        let config = EngineConfig::default();
        let account = create_test_account(&db, OWNER, "Checking", "1000.00").await?;
        create_test_budget(&db, OWNER, 1, "100.00", BudgetPeriodType::Yearly, date(2024, 1, 1), None).await?;
        create_test_budget(&db, OWNER, 2, "0.00", BudgetPeriodType::Monthly, date(2024, 6, 1), None).await?;

        post(&db, account.id, 1, TransactionType::Expense, "80.00", at(2024, 2, 3)).await?;
        post(&db, account.id, 1, TransactionType::Expense, "40.00", at(2024, 6, 3)).await?;
        post(&db, account.id, 2, TransactionType::Expense, "5.00", at(2024, 6, 3)).await?;

        let statuses = budget_status(&db, &config, OWNER, date(2024, 6, 15)).await?;
        assert_eq!(statuses[0].spent, money("120.00"));
        assert_eq!(statuses[0].percentage, dec!(120));
        assert_eq!(statuses[0].remaining, money("-20.00"));
        assert_eq!(statuses[0].status, BudgetStatus::Exceeded);

        assert_eq!(statuses[1].percentage, Decimal::ZERO);
        assert_eq!(statuses[1].status, BudgetStatus::Ok);
        Ok(())
    }

    #[tokio::test]
    async fn test_budget_status_stored_period_source() -> Result<()> {
        let db = setup_test_db().await?;
        let stored = EngineConfig {
            budget_period_source: BudgetPeriodSource::Stored,
            ..EngineConfig::default()
        };
        let account = create_test_account(&db, OWNER, "Checking", "1000.00").await?;
        create_test_budget(
            &db,
            OWNER,
            3,
            "200.00",
            BudgetPeriodType::Monthly,
            date(2024, 5, 15),
            Some(date(2024, 6, 14)),
        )
        .await?;
        post(&db, account.id, 3, TransactionType::Expense, "50.00", at(2024, 5, 20)).await?;
        post(&db, account.id, 3, TransactionType::Expense, "30.00", at(2024, 6, 10)).await?;
        post(&db, account.id, 3, TransactionType::Expense, "99.00", at(2024, 6, 14)).await?;
        post(&db, account.id, 3, TransactionType::Expense, "20.00", at(2024, 6, 15)).await?;

        let today = date(2024, 6, 15);
        let by_stored = budget_status(&db, &stored, OWNER, today).await?;
        assert_eq!(by_stored[0].spent, money("179.00"));

        let by_calendar = budget_status(&db, &EngineConfig::default(), OWNER, today).await?;
        assert_eq!(by_calendar[0].spent, money("149.00"));
        Ok(())
    }

    #[test]
    fn test_stored_range_without_end_date() {
        let budget = budget::Model {
            id: 1,
            owner_id: OWNER.to_string(),
            category_id: 1,
            amount_minor: 100,
            period_type: BudgetPeriodType::Monthly,
            start_date: date(2024, 1, 31),
            end_date: None,
        };
        let range = active_budget_range(&budget, BudgetPeriodSource::Stored, date(2024, 6, 1)).unwrap();
        assert_eq!(range.start, at(2024, 1, 31) - chrono::TimeDelta::hours(12));
        // Jan 31 + 1 month clamps to Feb 29, so the last included day is Feb 28
        assert_eq!(range.end, at(2024, 2, 29) - chrono::TimeDelta::hours(12));
    }

    #[test]
    fn test_previous_month_range() {
        let range = previous_month_range(date(2024, 3, 31)).unwrap();
        assert_eq!(range.start, at(2024, 2, 1) - chrono::TimeDelta::hours(12));
        assert_eq!(range.end, at(2024, 3, 1) - chrono::TimeDelta::hours(12));
    }
}
