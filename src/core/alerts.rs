//! Alert evaluator - Turns budget status, upcoming bills and month-over-month
//! spending into dashboard alerts.
//!
//! The "near limit" check here uses `alert_near_limit_ratio` (80% by default), which
//! is independent of the 90% warning threshold used by `budget_status`.

use crate::{
    config::engine::EngineConfig,
    core::{
        aggregate::{BudgetStatusEntry, budget_status_in, previous_month_range, range_totals},
        money::{Money, round_percent},
        period::DateRange,
    },
    entities::{Account, Transaction, account, transaction},
    errors::{Error, Result},
};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, PaginatorTrait, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A recurring bill as provided by the bills layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringBill {
    pub name: String,
    pub amount: Money,
    /// Day of month the bill is due, 1-31; clamped in shorter months
    pub due_day: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    BudgetExceeded,
    BudgetNearLimit,
    BillDueSoon,
    SpendingInsight,
    Welcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

fn last_day_of_month(year: i32, month: u32) -> Result<u32> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .ok_or_else(|| Error::invalid(format!("no such month {year}-{month:02}")))
}

fn clamped_due_date(year: i32, month: u32, due_day: u32) -> Result<NaiveDate> {
    let day = due_day.min(last_day_of_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::invalid(format!("no such date {year}-{month:02}-{day:02}")))
}

/// Next date the bill falls due on or after `today`.
///
/// A `due_day` of 31 lands on the 30th in April and on Feb 28/29.
///
/// # Errors
/// `InvalidInput` if `due_day` is outside 1-31.
pub fn next_due_date(due_day: u32, today: NaiveDate) -> Result<NaiveDate> {
    if !(1..=31).contains(&due_day) {
        return Err(Error::invalid(format!("due day {due_day} is not between 1 and 31")));
    }
    let this_month = clamped_due_date(today.year(), today.month(), due_day)?;
    if this_month >= today {
        return Ok(this_month);
    }
    let next = today
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .ok_or_else(|| Error::invalid(format!("date {today} is out of range")))?;
    clamped_due_date(next.year(), next.month(), due_day)
}

/// Exceeded when spent is over the limit, otherwise near limit when spent is over
/// `near_limit_ratio` of it. At most one alert per budget.
#[must_use]
pub fn budget_alerts(statuses: &[BudgetStatusEntry], near_limit_ratio: Decimal) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for entry in statuses {
        let category = entry.budget.category_id;
        if entry.spent > entry.limit {
            alerts.push(Alert {
                kind: AlertKind::BudgetExceeded,
                severity: Severity::Critical,
                title: "Budget exceeded".to_string(),
                message: format!(
                    "Spending in category {category} is {} over its {} budget",
                    entry.spent - entry.limit,
                    entry.limit
                ),
            });
        } else if entry.spent.amount() > entry.limit.amount() * near_limit_ratio {
            alerts.push(Alert {
                kind: AlertKind::BudgetNearLimit,
                severity: Severity::Warning,
                title: "Budget almost used".to_string(),
                message: format!(
                    "Category {category} has used {}% of its {} budget",
                    round_percent(entry.spent.percent_of(entry.limit), 0),
                    entry.limit
                ),
            });
        }
    }
    alerts
}

/// Alerts for active bills due within `window_days` of `today`, soonest first.
pub fn bill_alerts(
    bills: &[RecurringBill],
    today: NaiveDate,
    window_days: i64,
) -> Result<Vec<Alert>> {
    let mut due: Vec<(NaiveDate, &RecurringBill)> = Vec::new();
    for bill in bills.iter().filter(|b| b.is_active) {
        let date = next_due_date(bill.due_day, today)?;
        if (date - today).num_days() <= window_days {
            due.push((date, bill));
        }
    }
    due.sort_by_key(|(date, _)| *date);

    Ok(due
        .into_iter()
        .map(|(date, bill)| {
            let days = (date - today).num_days();
            let when = match days {
                0 => "today".to_string(),
                1 => "tomorrow".to_string(),
                n => format!("in {n} days"),
            };
            Alert {
                kind: AlertKind::BillDueSoon,
                severity: if days <= 1 {
                    Severity::Warning
                } else {
                    Severity::Info
                },
                title: "Bill due soon".to_string(),
                message: format!("{} ({}) is due {when}", bill.name, bill.amount),
            }
        })
        .collect())
}

/// Compares this month's expense with last month's; `None` below the threshold or
/// when there was no spending last month.
#[must_use]
pub fn spending_insight(
    this_month: Money,
    last_month: Money,
    threshold_percent: Decimal,
) -> Option<Alert> {
    if last_month.is_zero() {
        return None;
    }
    let change = (this_month - last_month).percent_of(last_month);
    if change.abs() < threshold_percent {
        return None;
    }
    let direction = if change.is_sign_positive() { "up" } else { "down" };
    Some(Alert {
        kind: AlertKind::SpendingInsight,
        severity: Severity::Info,
        title: format!("Spending {direction} {}%", round_percent(change.abs(), 0)),
        message: format!(
            "You have spent {this_month} this month compared with {last_month} last month"
        ),
    })
}

fn welcome() -> Alert {
    Alert {
        kind: AlertKind::Welcome,
        severity: Severity::Info,
        title: "Welcome".to_string(),
        message: "Add an account and record your first transaction to start tracking"
            .to_string(),
    }
}

/// Everything the evaluator reads, taken from one database snapshot.
#[derive(Debug, Clone)]
struct AlertInputs {
    statuses: Vec<BudgetStatusEntry>,
    account_count: u64,
    transaction_count: u64,
    this_month_expense: Money,
    last_month_expense: Money,
}

async fn read_alert_inputs(
    db: &DatabaseConnection,
    config: &EngineConfig,
    owner_id: &str,
    today: NaiveDate,
) -> Result<AlertInputs> {
    let txn = db.begin().await?;
    let statuses = budget_status_in(&txn, config, owner_id, today).await?;
    let account_count = Account::find()
        .filter(account::Column::OwnerId.eq(owner_id))
        .count(&txn)
        .await?;
    let transaction_count = Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .count(&txn)
        .await?;
    let (_, this_month_expense) =
        range_totals(&txn, owner_id, DateRange::calendar_month(today)?).await?;
    let (_, last_month_expense) =
        range_totals(&txn, owner_id, previous_month_range(today)?).await?;
    txn.commit().await?;

    Ok(AlertInputs {
        statuses,
        account_count,
        transaction_count,
        this_month_expense,
        last_month_expense,
    })
}

/// All alerts for an owner as of `today`: budgets first, then bills by due date,
/// then the spending insight. An owner with no data at all gets a single welcome.
#[instrument(skip(db, config, bills))]
pub async fn evaluate_alerts(
    db: &DatabaseConnection,
    config: &EngineConfig,
    owner_id: &str,
    today: NaiveDate,
    bills: &[RecurringBill],
) -> Result<Vec<Alert>> {
    let inputs = read_alert_inputs(db, config, owner_id, today).await?;

    if inputs.statuses.is_empty()
        && bills.is_empty()
        && inputs.account_count == 0
        && inputs.transaction_count == 0
    {
        debug!("No data for owner, emitting welcome");
        return Ok(vec![welcome()]);
    }

    let mut alerts = budget_alerts(&inputs.statuses, config.alert_near_limit_ratio);
    alerts.extend(bill_alerts(bills, today, config.bill_due_window_days)?);
    alerts.extend(spending_insight(
        inputs.this_month_expense,
        inputs.last_month_expense,
        config.insight_change_percent,
    ));

    debug!(count = alerts.len(), "Evaluated alerts");
    Ok(alerts)
}
