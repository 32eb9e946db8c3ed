//! Financial account entity - Holds the stored balance that the ledger keeps consistent.
//!
//! The balance is kept in integer minor units (`balance_minor`) so that the atomic
//! `balance_minor = balance_minor + delta` update is exact. Accounts are created and
//! edited by the account-management layer and soft-disabled through `is_active`.

use crate::core::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Authenticated owner of the account
    pub owner_id: String,
    /// Display name (e.g., "Checking")
    pub name: String,
    /// Current balance in cents
    pub balance_minor: i64,
    /// Soft-disable flag; inactive accounts accept no new postings
    pub is_active: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account row was last written
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Current balance as an exact amount.
    #[must_use]
    pub fn balance(&self) -> Money {
        Money::from_minor(self.balance_minor)
    }
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
