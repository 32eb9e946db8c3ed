//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the tables the ledger core reads and writes.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod budget;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use budget::{
    BudgetPeriodType, Column as BudgetColumn, Entity as Budget, Model as BudgetModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionType,
};
