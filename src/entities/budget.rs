//! Budget entity - A spending limit for one category over a month or a year.
//!
//! Budgets are written by the category/budget management layer; the engine only
//! reads them to derive spent, remaining and status on demand.

use crate::core::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Length of a budget's active period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriodType {
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

/// Budget database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: String,
    /// Category whose expenses count against this budget
    pub category_id: i64,
    /// Limit in cents
    pub amount_minor: i64,
    pub period_type: BudgetPeriodType,
    /// Stored period start; only consulted with `BudgetPeriodSource::Stored`
    pub start_date: Date,
    /// Stored period end (inclusive); only consulted with `BudgetPeriodSource::Stored`
    pub end_date: Option<Date>,
}

impl Model {
    /// Budget limit as an exact amount.
    #[must_use]
    pub fn limit(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }
}

/// Budgets reference categories owned by an external collaborator; no relations here
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
