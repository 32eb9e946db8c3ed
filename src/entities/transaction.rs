//! Transaction entity - One posting against exactly one account.
//!
//! `amount_minor` is always non-negative; the direction comes from `transaction_type`.

use crate::core::money::Money;
use crate::errors::Error;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed set of transaction kinds, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming into the account
    #[sea_orm(string_value = "income")]
    Income,
    /// Money leaving the account
    #[sea_orm(string_value = "expense")]
    Expense,
    /// Movement between accounts; see `TransferPolicy`
    #[sea_orm(string_value = "transfer")]
    Transfer,
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(Error::invalid(format!("unknown transaction type '{other}'"))),
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the transaction (always the caller that posted it)
    pub owner_id: String,
    /// Account whose balance this transaction affects
    pub account_id: i64,
    /// Category used for breakdowns and budgets
    pub category_id: i64,
    /// Income, expense or transfer
    pub transaction_type: TransactionType,
    /// Non-negative amount in cents
    pub amount_minor: i64,
    /// User-assigned date; may be backdated or in the future
    pub date: DateTimeUtc,
    /// Short description shown in lists
    pub description: String,
    /// Optional free-form notes
    pub notes: Option<String>,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// When the row was last written
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Transaction amount as an exact value.
    #[must_use]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
